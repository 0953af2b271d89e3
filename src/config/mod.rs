// src/config/mod.rs
//! Sites/outputs configuration documents (TOML or JSON).

pub mod options;
pub mod outputs;
pub mod sites;

use anyhow::{Context, Result};
use serde::de::DeserializeOwned;
use std::fs;
use std::path::Path;

pub use options::{resolve_options, resolve_select_options, Mode, ScrapeOptions};
pub use outputs::{OutputSpec, OutputsConfig};
pub use sites::{SearchConfig, SiteConfig, SitesConfig};

/// Load a config document. The extension picks the parser; the other format is
/// tried as a fallback.
pub fn load_document<T: DeserializeOwned>(path: &Path) -> Result<T> {
    let content = fs::read_to_string(path)
        .with_context(|| format!("reading config from {}", path.display()))?;
    let ext = path
        .extension()
        .and_then(|s| s.to_str())
        .unwrap_or_default()
        .to_ascii_lowercase();
    parse_document(&content, ext.as_str())
        .with_context(|| format!("parsing config {}", path.display()))
}

pub(crate) fn parse_document<T: DeserializeOwned>(s: &str, hint_ext: &str) -> Result<T> {
    let toml_first =
        hint_ext == "toml" || (hint_ext != "json" && !s.trim_start().starts_with('{'));
    let (primary, fallback): (fn(&str) -> Result<T>, fn(&str) -> Result<T>) = if toml_first {
        (parse_toml::<T>, parse_json::<T>)
    } else {
        (parse_json::<T>, parse_toml::<T>)
    };
    // On double failure, surface the preferred parser's error.
    primary(s).or_else(|e| fallback(s).map_err(|_| e))
}

fn parse_toml<T: DeserializeOwned>(s: &str) -> Result<T> {
    Ok(toml::from_str(s)?)
}

fn parse_json<T: DeserializeOwned>(s: &str) -> Result<T> {
    Ok(serde_json::from_str(s)?)
}

#[cfg(test)]
mod tests {
    use super::*;
    use std::fs;

    #[test]
    fn loads_toml_and_json_sites() {
        let dir = tempfile::tempdir().unwrap();

        let p_toml = dir.path().join("sites.toml");
        fs::write(
            &p_toml,
            r#"
[[sites]]
source_site = "uma_global"

[[sites.searches]]
url = "https://x.test/s?a=1"
per_run_max = 5
"#,
        )
        .unwrap();
        let t: SitesConfig = load_document(&p_toml).unwrap();
        assert_eq!(t.sites.len(), 1);
        assert_eq!(t.sites[0].searches[0].per_run_max, Some(5));

        let p_json = dir.path().join("sites.json");
        fs::write(
            &p_json,
            r#"{"sites":[{"source_site":"uma_global","searches":[{"url":"https://x.test/s"}]}]}"#,
        )
        .unwrap();
        let j: SitesConfig = load_document(&p_json).unwrap();
        assert_eq!(j.sites[0].site_id(), "uma_global");
    }

    #[test]
    fn falls_back_when_extension_lies() {
        let v: SitesConfig =
            parse_document(r#"{"sites":[]}"#, "toml").unwrap();
        assert!(v.sites.is_empty());
    }

    #[test]
    fn garbage_is_an_error() {
        let r: Result<SitesConfig> = parse_document("sites = [[[", "toml");
        assert!(r.is_err());
    }
}
