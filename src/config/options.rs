// src/config/options.rs
//! Layered per-search options: defaults, then a named preset, then explicit overrides.

use anyhow::{anyhow, bail, Result};
use serde_json::{json, Map, Value};
use std::str::FromStr;
use tracing::{debug, warn};

use super::sites::SearchConfig;
use crate::select::SelectOptions;

/// Keys a search entry (or its `options` table) may override.
pub const ALLOWED_KEYS: &[&str] = &[
    "mode",
    "max_pages",
    "headless",
    "search_timeout_ms",
    "settle_ms",
    "verbose",
    "fixture",
];

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum Mode {
    /// Only the first record of the first page.
    First,
    /// First record of each page, up to `max_pages`.
    FirstPerPage,
    /// Every record per page.
    All,
}

impl FromStr for Mode {
    type Err = anyhow::Error;

    fn from_str(s: &str) -> Result<Self> {
        match s.trim().to_ascii_lowercase().as_str() {
            "first" => Ok(Mode::First),
            "first_per_page" => Ok(Mode::FirstPerPage),
            "all" => Ok(Mode::All),
            other => Err(anyhow!("unknown mode {other:?} (first | first_per_page | all)")),
        }
    }
}

#[derive(Debug, Clone, PartialEq, Eq)]
pub struct ScrapeOptions {
    pub mode: Mode,
    /// 0 = all pages.
    pub max_pages: u32,
    pub headless: bool,
    pub search_timeout_ms: u64,
    pub settle_ms: u64,
    pub verbose: bool,
    /// Path to a JSON file of raw records, for file-backed producers.
    pub fixture: Option<String>,
}

impl Default for ScrapeOptions {
    fn default() -> Self {
        Self {
            mode: Mode::First,
            max_pages: 1,
            headless: true,
            search_timeout_ms: 90_000,
            settle_ms: 250,
            verbose: false,
            fixture: None,
        }
    }
}

fn preset(name: &str) -> Option<Value> {
    match name {
        "staging" => Some(json!({ "headless": true, "mode": "first", "verbose": true })),
        "prod" => Some(json!({ "headless": true, "mode": "first", "verbose": false })),
        _ => None,
    }
}

/// Resolve scraper options for one search. Pure apart from logging.
pub fn resolve_options(search: &SearchConfig) -> Result<ScrapeOptions> {
    let sources: Vec<&Map<String, Value>> = search
        .options_table()
        .into_iter()
        .chain(std::iter::once(&search.extra))
        .collect();

    let mut layer: Map<String, Value> = Map::new();

    // the search entry's preset wins over the options table's
    let preset_name = sources
        .iter()
        .filter_map(|m| m.get("preset").and_then(Value::as_str))
        .last();
    if let Some(name) = preset_name {
        match preset(name).as_ref().and_then(Value::as_object) {
            Some(p) => layer.extend(p.clone()),
            None => warn!(target: "config", preset = name, url = %search.url, "unknown preset ignored"),
        }
    }

    for src in &sources {
        for (k, v) in src.iter() {
            if ALLOWED_KEYS.contains(&k.as_str()) {
                layer.insert(k.clone(), v.clone());
            } else if k != "preset" && k != "options" {
                debug!(target: "config", key = %k, "option key not in allow-list, ignored");
            }
        }
    }

    let mut opts = ScrapeOptions::default();
    for (k, v) in &layer {
        match k.as_str() {
            "mode" => opts.mode = as_string(k, v)?.parse()?,
            "max_pages" => {
                opts.max_pages = u32::try_from(as_uint(k, v)?)
                    .map_err(|_| anyhow!("option max_pages out of range"))?
            }
            "headless" => opts.headless = as_bool(k, v)?,
            "search_timeout_ms" => opts.search_timeout_ms = as_uint(k, v)?,
            "settle_ms" => opts.settle_ms = as_uint(k, v)?,
            "verbose" => opts.verbose = as_bool(k, v)?,
            "fixture" => opts.fixture = Some(as_string(k, v)?),
            _ => {}
        }
    }
    Ok(opts)
}

/// Selection options: search entry fields first, then the `options` table.
pub fn resolve_select_options(search: &SearchConfig) -> Result<SelectOptions> {
    let mut opts = SelectOptions::default();
    let table = search.options_table();

    if let Some(v) = search.detect_updates {
        opts.detect_updates = v;
    } else if let Some(v) = table.and_then(|t| t.get("detect_updates")) {
        opts.detect_updates = as_bool("detect_updates", v)?;
    }

    if let Some(v) = search.per_run_max {
        opts.per_run_max = v;
    } else if let Some(v) = table.and_then(|t| t.get("per_run_max")) {
        opts.per_run_max = usize::try_from(as_uint("per_run_max", v)?)
            .map_err(|_| anyhow!("option per_run_max out of range"))?;
    }
    Ok(opts)
}

fn as_string(key: &str, v: &Value) -> Result<String> {
    match v {
        Value::String(s) => Ok(s.clone()),
        Value::Number(n) => Ok(n.to_string()),
        _ => bail!("option {key} must be a string"),
    }
}

fn as_uint(key: &str, v: &Value) -> Result<u64> {
    match v {
        Value::Number(n) => n
            .as_u64()
            .or_else(|| n.as_f64().filter(|f| *f >= 0.0).map(|f| f as u64))
            .ok_or_else(|| anyhow!("option {key} must be a non-negative integer")),
        Value::String(s) => s
            .trim()
            .parse::<u64>()
            .map_err(|_| anyhow!("option {key} must be a non-negative integer, got {s:?}")),
        _ => bail!("option {key} must be a non-negative integer"),
    }
}

fn as_bool(key: &str, v: &Value) -> Result<bool> {
    match v {
        Value::Bool(b) => Ok(*b),
        Value::Number(n) => Ok(n.as_f64().is_some_and(|f| f != 0.0)),
        Value::String(s) => match s.trim().to_ascii_lowercase().as_str() {
            "true" | "yes" | "on" | "1" => Ok(true),
            "false" | "no" | "off" | "0" | "" => Ok(false),
            _ => bail!("option {key} must be a boolean, got {s:?}"),
        },
        Value::Null => Ok(false),
        _ => bail!("option {key} must be a boolean"),
    }
}
