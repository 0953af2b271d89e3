// src/state.rs
//! Per-search persistent state: identity, seeded flag, digest ledger, retention window.
//!
//! One JSON file per (site id, canonical search URL). Files are replaced atomically
//! (write temp, then rename), so a crash mid-save leaves the previous snapshot intact.

use std::collections::BTreeMap;
use std::fs;
use std::io::{self, Write};
use std::path::{Path, PathBuf};

use chrono::{DateTime, Utc};
use serde::{Deserialize, Serialize};
use tracing::{debug, warn};
use unicode_normalization::UnicodeNormalization;
use url::{form_urlencoded, Url};

use crate::error::StateError;
use crate::fingerprint::{fingerprint, hex_digest};
use crate::record::Record;

pub const STATE_VERSION: u32 = 1;
pub const DEFAULT_WINDOW_LIMIT: usize = 2000;

pub const ENV_STATE_DIR: &str = "UMA_STATE_DIR";
pub const ENV_ENV_NAME: &str = "UMA_ENV_NAME";
pub const ENV_REPOSITORY: &str = "GITHUB_REPOSITORY";

fn default_window_limit() -> usize {
    DEFAULT_WINDOW_LIMIT
}

#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct SearchState {
    pub version: u32,
    pub site_id: String,
    pub search_url: String,
    pub seeded: bool,
    /// entity id -> fingerprint of its white list
    #[serde(default)]
    pub digests: BTreeMap<String, String>,
    #[serde(default = "default_window_limit")]
    pub window_limit: usize,
    pub created_at: DateTime<Utc>,
    #[serde(default)]
    pub updated_at: Option<DateTime<Utc>>,
}

impl SearchState {
    /// Fresh, unseeded state. Not persisted until [`StateStore::save`].
    pub fn new(site_id: &str, url: &str) -> Self {
        Self {
            version: STATE_VERSION,
            site_id: site_id.to_string(),
            search_url: canonical_url(url),
            seeded: false,
            digests: BTreeMap::new(),
            window_limit: DEFAULT_WINDOW_LIMIT,
            created_at: Utc::now(),
            updated_at: None,
        }
    }
}

/// Absorb a baseline batch without emitting anything. No-op once seeded.
pub fn seed_from_records(state: &mut SearchState, records: &[Record]) {
    if state.seeded {
        return;
    }
    for r in records {
        let Some(id) = r.entity_id() else {
            warn!(target: "state", site = %state.site_id, "seed: record without id skipped");
            continue;
        };
        state
            .digests
            .insert(id.to_string(), fingerprint(r.change_tags()));
    }
    state.seeded = true;
}

/// Bound the ledger to `window_limit` entries, keeping the lexicographically last ids.
///
/// Heuristic: upstream ids are issued in increasing order, so the highest ids
/// approximate the most recently created profiles. Not a recency guarantee.
pub fn trim_window(state: &mut SearchState) {
    let len = state.digests.len();
    if len <= state.window_limit {
        return;
    }
    let excess = len - state.window_limit;
    match state.digests.keys().nth(excess).cloned() {
        Some(pivot) => state.digests = state.digests.split_off(&pivot),
        None => state.digests.clear(),
    }
    debug!(target: "state", evicted = excess, kept = state.digests.len(), "window trimmed");
}

// ------------------------------------------------------------
// Storage keys
// ------------------------------------------------------------

/// Canonical form of a search URL, used for state identity.
///
/// Lower-cases scheme and host, strips one trailing slash (except the root path),
/// sorts query pairs by key then value and drops the fragment. Route fragments
/// (`#/...`, `#!/...`) are kept and canonicalized like path + query.
pub fn canonical_url(raw: &str) -> String {
    let s: String = raw.trim().nfkc().collect();
    let (base, fragment) = match s.split_once('#') {
        Some((b, f)) => (b, Some(f)),
        None => (s.as_str(), None),
    };
    let route = fragment.and_then(canonical_route);
    let base = strip_trailing_slash(base);

    let mut out = match Url::parse(base) {
        Ok(mut url) => {
            let mut pairs: Vec<(String, String)> = url
                .query_pairs()
                .map(|(k, v)| (k.into_owned(), v.into_owned()))
                .collect();
            if pairs.is_empty() {
                url.set_query(None);
            } else {
                pairs.sort();
                url.query_pairs_mut().clear().extend_pairs(pairs);
            }
            let path = url.path().to_string();
            if path.len() > 1 && path.ends_with('/') {
                url.set_path(&path[..path.len() - 1]);
            }
            url.set_fragment(None);
            url.to_string()
        }
        Err(_) => base.to_string(),
    };
    if let Some(route) = route {
        out.push('#');
        out.push_str(&route);
    }
    out
}

// The root path comes back from `Url` serialization on its own.
fn strip_trailing_slash(s: &str) -> &str {
    match s.strip_suffix('/') {
        Some(rest) if !rest.is_empty() && !rest.ends_with('/') => rest,
        _ => s,
    }
}

fn canonical_route(fragment: &str) -> Option<String> {
    let prefix = if fragment.starts_with("!/") {
        "!"
    } else if fragment.starts_with('/') {
        ""
    } else {
        return None;
    };
    let fragment = strip_trailing_slash(&fragment[prefix.len()..]);
    let (path, query) = match fragment.split_once('?') {
        Some((p, q)) => (p, Some(q)),
        None => (fragment, None),
    };
    let path = if path.len() > 1 {
        path.strip_suffix('/').unwrap_or(path)
    } else {
        path
    };
    let mut out = format!("{prefix}{path}");
    if let Some(q) = query {
        let mut pairs: Vec<(String, String)> = form_urlencoded::parse(q.as_bytes())
            .map(|(k, v)| (k.into_owned(), v.into_owned()))
            .collect();
        if !pairs.is_empty() {
            pairs.sort();
            let q = form_urlencoded::Serializer::new(String::new())
                .extend_pairs(pairs)
                .finish();
            out.push('?');
            out.push_str(&q);
        }
    }
    Some(out)
}

/// Stable storage key: SHA-256 of `site_id || canonical_url`.
pub fn search_key(site_id: &str, url: &str) -> String {
    let raw = format!("{site_id}||{}", canonical_url(url));
    hex_digest(raw.as_bytes())
}

/// Default state directory, namespaced by repository and environment name:
/// `$UMA_STATE_DIR/<repo>/<env>/state` (base defaults to `~/.uma_monitor`).
pub fn default_state_dir() -> PathBuf {
    let base = std::env::var(ENV_STATE_DIR)
        .ok()
        .filter(|s| !s.trim().is_empty())
        .map(PathBuf::from)
        .unwrap_or_else(|| {
            let home = std::env::var("HOME").unwrap_or_else(|_| ".".to_string());
            PathBuf::from(home).join(".uma_monitor")
        });
    let repo = std::env::var(ENV_REPOSITORY)
        .unwrap_or_else(|_| "local_repo".to_string())
        .replace('/', "_");
    let env_name = std::env::var(ENV_ENV_NAME).unwrap_or_else(|_| "repo".to_string());
    base.join(repo).join(env_name).join("state")
}

// ------------------------------------------------------------
// Store
// ------------------------------------------------------------

/// File-backed store, one JSON document per search.
#[derive(Debug, Clone)]
pub struct StateStore {
    dir: PathBuf,
}

impl StateStore {
    pub fn new(dir: impl Into<PathBuf>) -> Self {
        Self { dir: dir.into() }
    }

    /// Store rooted at [`default_state_dir`].
    pub fn from_env() -> Self {
        Self::new(default_state_dir())
    }

    pub fn dir(&self) -> &Path {
        &self.dir
    }

    pub fn state_path(&self, site_id: &str, url: &str) -> PathBuf {
        self.dir.join(format!("{}.json", search_key(site_id, url)))
    }

    /// Load the state for a search. A missing file yields a fresh state; a file
    /// that cannot be read is [`StateError::Io`] and one that does not parse is
    /// [`StateError::Corrupt`]. Either way the file is left alone.
    pub fn load(&self, site_id: &str, url: &str) -> Result<SearchState, StateError> {
        let path = self.state_path(site_id, url);
        let data = match fs::read(&path) {
            Ok(bytes) => bytes,
            Err(e) if e.kind() == io::ErrorKind::NotFound => {
                debug!(target: "state", path = %path.display(), "no prior state");
                return Ok(SearchState::new(site_id, url));
            }
            Err(source) => return Err(StateError::Io { path, source }),
        };
        let state: SearchState = serde_json::from_slice(&data).map_err(|source| {
            StateError::Corrupt {
                path: path.clone(),
                source,
            }
        })?;
        if state.version > STATE_VERSION {
            return Err(StateError::UnsupportedVersion {
                path,
                found: state.version,
                supported: STATE_VERSION,
            });
        }
        Ok(state)
    }

    /// Stamp `updated_at` and replace the file atomically.
    pub fn save(&self, site_id: &str, url: &str, state: &mut SearchState) -> Result<(), StateError> {
        state.updated_at = Some(Utc::now());
        let path = self.state_path(site_id, url);
        let json = serde_json::to_vec_pretty(state)?;
        write_atomic(&path, &json).map_err(|source| StateError::Io {
            path: path.clone(),
            source,
        })?;
        debug!(target: "state", path = %path.display(), entries = state.digests.len(), "state saved");
        Ok(())
    }
}

fn write_atomic(path: &Path, bytes: &[u8]) -> io::Result<()> {
    if let Some(parent) = path.parent() {
        fs::create_dir_all(parent)?;
    }
    let tmp = path.with_extension("json.tmp");
    let written = fs::File::create(&tmp).and_then(|mut f| {
        f.write_all(bytes)?;
        f.sync_all()
    });
    if let Err(e) = written {
        let _ = fs::remove_file(&tmp);
        return Err(e);
    }
    fs::rename(&tmp, path).inspect_err(|_| {
        let _ = fs::remove_file(&tmp);
    })
}

#[cfg(test)]
mod tests {
    use super::*;

    fn rec(id: &str, white: &[&str]) -> Record {
        Record {
            entity_id: Some(id.to_string()),
            white: white.iter().map(|s| s.to_string()).collect(),
            ..Default::default()
        }
    }

    #[test]
    fn failed_replace_removes_temp_file() {
        let dir = tempfile::tempdir().unwrap();
        // a non-empty directory where the state file should go
        let path = dir.path().join("k.json");
        fs::create_dir(&path).unwrap();
        fs::write(path.join("keep"), "x").unwrap();

        assert!(write_atomic(&path, b"{}").is_err());
        assert!(!path.with_extension("json.tmp").exists());
        assert!(path.join("keep").exists());
    }

    #[test]
    fn canonical_url_sorts_query_and_folds_case() {
        assert_eq!(
            canonical_url("https://x.test/s?b=2&a=1"),
            canonical_url("https://X.test/s?a=1&b=2/")
        );
        assert_eq!(canonical_url("HTTPS://X.test/s/"), "https://x.test/s");
        assert_eq!(canonical_url("https://x.test/"), "https://x.test/");
        assert_eq!(canonical_url("https://x.test"), "https://x.test/");
    }

    #[test]
    fn canonical_url_sorts_equal_keys_by_value() {
        assert_eq!(
            canonical_url("https://x.test/s?a=2&a=1"),
            "https://x.test/s?a=1&a=2"
        );
    }

    #[test]
    fn canonical_url_drops_plain_fragment() {
        assert_eq!(canonical_url("https://x.test/s?a=1#top"), "https://x.test/s?a=1");
    }

    #[test]
    fn canonical_url_keeps_route_fragment() {
        let a = canonical_url("https://uma-global.pure-db.com/#/search?w=1&b=2");
        let b = canonical_url("https://UMA-global.pure-db.com/#/search?b=2&w=1/");
        assert_eq!(a, b);
        assert_eq!(a, "https://uma-global.pure-db.com/#/search?b=2&w=1");
        assert_ne!(a, canonical_url("https://uma-global.pure-db.com/#/search?b=3&w=1"));
    }

    #[test]
    fn search_key_is_per_site() {
        assert_ne!(search_key("a", "https://x.test/s"), search_key("b", "https://x.test/s"));
        assert_eq!(search_key("a", "https://x.test/s/"), search_key("a", "https://X.test/s"));
    }

    #[test]
    fn seeding_is_idempotent() {
        let mut st = SearchState::new("s", "https://x.test/");
        seed_from_records(&mut st, &[rec("1", &["X"]), Record::default()]);
        assert!(st.seeded);
        assert_eq!(st.digests.len(), 1);
        seed_from_records(&mut st, &[rec("2", &["Y"])]);
        assert_eq!(st.digests.len(), 1);
    }

    #[test]
    fn seeding_empty_batch_still_flips_flag() {
        let mut st = SearchState::new("s", "https://x.test/");
        seed_from_records(&mut st, &[]);
        assert!(st.seeded);
        assert!(st.digests.is_empty());
    }

    #[test]
    fn trim_keeps_last_ids_deterministically() {
        let mut st = SearchState::new("s", "https://x.test/");
        st.window_limit = 3;
        for id in ["105", "101", "104", "102", "103"] {
            st.digests.insert(id.into(), "d".into());
        }
        let mut again = st.clone();
        trim_window(&mut st);
        trim_window(&mut again);
        let kept: Vec<&str> = st.digests.keys().map(String::as_str).collect();
        assert_eq!(kept, vec!["103", "104", "105"]);
        assert_eq!(st, again);
    }

    #[test]
    fn trim_to_zero_clears() {
        let mut st = SearchState::new("s", "https://x.test/");
        st.window_limit = 0;
        st.digests.insert("1".into(), "d".into());
        trim_window(&mut st);
        assert!(st.digests.is_empty());
    }

    #[test]
    fn trim_under_limit_is_noop() {
        let mut st = SearchState::new("s", "https://x.test/");
        st.digests.insert("1".into(), "d".into());
        let before = st.clone();
        trim_window(&mut st);
        assert_eq!(st, before);
    }
}
