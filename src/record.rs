// src/record.rs
//! Scraped trainer record, as produced by a [`crate::source::RecordSource`].

use once_cell::sync::Lazy;
use regex::Regex;
use serde::{Deserialize, Deserializer, Serialize};

/// Profile page base; ids are appended.
pub const PROFILE_URL_BASE: &str = "https://uma-global.pure-db.com/#/user/";

/// One result row. Field aliases accept the raw producer's key names.
#[derive(Debug, Clone, Default, PartialEq, Eq, Serialize, Deserialize)]
pub struct Record {
    #[serde(default, alias = "trainer_id", deserialize_with = "de_entity_id")]
    pub entity_id: Option<String>,
    #[serde(default)]
    pub site_id: Option<String>,
    #[serde(default, alias = "id_url")]
    pub profile_url: Option<String>,
    #[serde(default)]
    pub source_url: Option<String>,

    #[serde(default, alias = "blue_list")]
    pub blue: Vec<String>,
    #[serde(default, alias = "pink_list")]
    pub pink: Vec<String>,
    #[serde(default, alias = "unique_list")]
    pub unique: Vec<String>,
    /// Change-relevant list: the fingerprint is taken over this one.
    #[serde(default, alias = "white_list")]
    pub white: Vec<String>,

    #[serde(default, deserialize_with = "de_count")]
    pub white_count: Option<u32>,
    #[serde(default, deserialize_with = "de_count")]
    pub g1_count: Option<u32>,
}

impl Record {
    /// Non-empty, trimmed id; `None` means the record cannot be diffed.
    pub fn entity_id(&self) -> Option<&str> {
        self.entity_id
            .as_deref()
            .map(str::trim)
            .filter(|s| !s.is_empty())
    }

    pub fn change_tags(&self) -> &[String] {
        &self.white
    }

    /// Scraped white count, falling back to the list length.
    pub fn white_count(&self) -> u32 {
        self.white_count
            .unwrap_or_else(|| self.white.len().try_into().unwrap_or(u32::MAX))
    }

    pub fn g1_count(&self) -> u32 {
        self.g1_count.unwrap_or(0)
    }

    /// Explicit profile URL, or one derived from the id.
    pub fn profile_url(&self) -> Option<String> {
        match self.profile_url.as_deref().map(str::trim) {
            Some(u) if !u.is_empty() => Some(u.to_string()),
            _ => self.entity_id().map(|id| format!("{PROFILE_URL_BASE}{id}")),
        }
    }
}

// Ids are digit runs upstream and sometimes arrive as JSON numbers.
fn de_entity_id<'de, D>(deserializer: D) -> Result<Option<String>, D::Error>
where
    D: Deserializer<'de>,
{
    let v = Option::<serde_json::Value>::deserialize(deserializer)?;
    Ok(match v {
        Some(serde_json::Value::String(s)) => Some(s),
        Some(serde_json::Value::Number(n)) => Some(n.to_string()),
        _ => None,
    })
}

// Counts are display-only; anything that is not a non-negative whole number is dropped.
fn de_count<'de, D>(deserializer: D) -> Result<Option<u32>, D::Error>
where
    D: Deserializer<'de>,
{
    let v = Option::<serde_json::Value>::deserialize(deserializer)?;
    Ok(match v {
        Some(serde_json::Value::Number(n)) => n
            .as_u64()
            .or_else(|| n.as_f64().filter(|f| f.fract() == 0.0 && *f >= 0.0).map(|f| f as u64))
            .and_then(|n| u32::try_from(n).ok()),
        Some(serde_json::Value::String(s)) => s.trim().parse::<u32>().ok(),
        _ => None,
    })
}

static RE_TRAINER_ID: Lazy<Regex> = Lazy::new(|| Regex::new(r"(\d{6,})").expect("id regex"));

/// First run of six or more digits in a profile href.
pub fn trainer_id_from_href(href: &str) -> Option<String> {
    RE_TRAINER_ID
        .captures(href)
        .and_then(|c| c.get(1))
        .map(|m| m.as_str().to_string())
}
