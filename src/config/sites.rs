// src/config/sites.rs
use serde::Deserialize;
use serde_json::{Map, Value};

#[derive(Debug, Clone, Default, Deserialize)]
pub struct SitesConfig {
    #[serde(default)]
    pub sites: Vec<SiteConfig>,
}

#[derive(Debug, Clone, Deserialize)]
pub struct SiteConfig {
    /// Producer name, e.g. `uma_global`.
    pub source_site: String,
    /// State namespace; defaults to `source_site`.
    #[serde(default)]
    pub site_id: Option<String>,
    #[serde(default)]
    pub searches: Vec<SearchConfig>,
}

impl SiteConfig {
    pub fn site_id(&self) -> &str {
        self.site_id
            .as_deref()
            .filter(|s| !s.trim().is_empty())
            .unwrap_or(&self.source_site)
    }
}

#[derive(Debug, Clone, Deserialize)]
pub struct SearchConfig {
    pub url: String,
    #[serde(default)]
    pub detect_updates: Option<bool>,
    #[serde(default)]
    pub per_run_max: Option<usize>,
    /// `options` table, `preset` and inline scraper option keys.
    #[serde(flatten)]
    pub extra: Map<String, Value>,
}

impl SearchConfig {
    pub fn new(url: impl Into<String>) -> Self {
        Self {
            url: url.into(),
            detect_updates: None,
            per_run_max: None,
            extra: Map::new(),
        }
    }

    /// Nested `options` table, if present.
    pub fn options_table(&self) -> Option<&Map<String, Value>> {
        self.extra.get("options").and_then(Value::as_object)
    }
}
