// src/source/uma_global.rs
//! `uma_global` producer. Reads a JSON array of raw result records (one per results
//! page, in page order) from the search's `fixture` option.

use anyhow::{bail, Context, Result};
use serde_json::Value;
use tracing::{debug, warn};

use super::RecordSource;
use crate::config::{Mode, ScrapeOptions, SearchConfig};
use crate::record::{trainer_id_from_href, Record};

pub const SITE_ID: &str = "uma_global";

#[derive(Debug, Default, Clone)]
pub struct UmaGlobalSource;

impl UmaGlobalSource {
    pub fn new() -> Self {
        Self
    }
}

/// Parse raw records, dropping entries that are not record-shaped.
pub fn parse_records(json: &str) -> Result<Vec<Record>> {
    let raw: Value = serde_json::from_str(json).context("records file is not JSON")?;
    let Value::Array(items) = raw else {
        bail!("records file must hold a JSON array");
    };
    let mut out = Vec::with_capacity(items.len());
    for (i, item) in items.into_iter().enumerate() {
        match serde_json::from_value::<Record>(item) {
            Ok(r) => out.push(r),
            Err(e) => warn!(target: "source", index = i, error = %e, "malformed record dropped"),
        }
    }
    Ok(out)
}

/// Stamp provenance and recover ids from profile links.
fn finish_record(mut r: Record, search_url: &str) -> Record {
    if r.site_id.is_none() {
        r.site_id = Some(SITE_ID.to_string());
    }
    if r.entity_id().is_none() {
        r.entity_id = r.profile_url.as_deref().and_then(trainer_id_from_href);
    }
    r.source_url = Some(search_url.to_string());
    r
}

/// Apply the page mode to records that each stand for one results page.
pub fn apply_mode(records: Vec<Record>, opts: &ScrapeOptions) -> Vec<Record> {
    match opts.mode {
        Mode::First => records.into_iter().take(1).collect(),
        Mode::FirstPerPage | Mode::All if opts.max_pages == 0 => records,
        Mode::FirstPerPage | Mode::All => records
            .into_iter()
            .take(opts.max_pages as usize)
            .collect(),
    }
}

#[async_trait::async_trait]
impl RecordSource for UmaGlobalSource {
    fn name(&self) -> &str {
        SITE_ID
    }

    async fn fetch(&self, search: &SearchConfig, opts: &ScrapeOptions) -> Result<Vec<Record>> {
        let Some(path) = opts.fixture.as_deref() else {
            warn!(target: "source", url = %search.url, "no records file configured for search");
            return Ok(Vec::new());
        };
        let data = tokio::fs::read_to_string(path)
            .await
            .with_context(|| format!("reading records file {path}"))?;
        let records: Vec<Record> = parse_records(&data)?
            .into_iter()
            .map(|r| finish_record(r, &search.url))
            .collect();
        let records = apply_mode(records, opts);
        if opts.verbose {
            debug!(target: "source", url = %search.url, records = records.len(), mode = ?opts.mode, "fetched");
        }
        Ok(records)
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn malformed_entries_are_dropped() {
        let rs = parse_records(
            r#"[{"trainer_id":"111111"}, {"white_list": "not a list"}, {"trainer_id":"222222"}]"#,
        )
        .unwrap();
        assert_eq!(rs.len(), 2);
        assert!(parse_records(r#"{"trainer_id":"1"}"#).is_err());
    }

    #[test]
    fn odd_counts_do_not_drop_the_record() {
        let rs = parse_records(
            r#"[{"trainer_id":"133102601857","white_list":["A"],"white_count":"15"},
                {"trainer_id":"133102601858","white_list":["B"],"white_count":-1,"g1_count":1.0}]"#,
        )
        .unwrap();
        assert_eq!(rs.len(), 2);
        assert_eq!(rs[0].white_count(), 15);
        assert_eq!(rs[1].white_count(), 1);
        assert_eq!(rs[1].g1_count(), 1);
    }

    #[test]
    fn id_recovered_from_profile_link() {
        let r = Record {
            profile_url: Some("https://uma-global.pure-db.com/#/user/133102601857".into()),
            ..Default::default()
        };
        let r = finish_record(r, "https://x.test/s");
        assert_eq!(r.entity_id(), Some("133102601857"));
        assert_eq!(r.site_id.as_deref(), Some(SITE_ID));
        assert_eq!(r.source_url.as_deref(), Some("https://x.test/s"));
    }

    #[test]
    fn modes_limit_pages() {
        let recs: Vec<Record> = (0..4)
            .map(|i| Record {
                entity_id: Some(format!("10000{i}")),
                ..Default::default()
            })
            .collect();
        let mut opts = ScrapeOptions::default();
        assert_eq!(apply_mode(recs.clone(), &opts).len(), 1);

        opts.mode = Mode::FirstPerPage;
        opts.max_pages = 3;
        assert_eq!(apply_mode(recs.clone(), &opts).len(), 3);

        opts.max_pages = 0;
        assert_eq!(apply_mode(recs, &opts).len(), 4);
    }

    #[tokio::test]
    async fn missing_fixture_yields_nothing() {
        let src = UmaGlobalSource::new();
        let search = SearchConfig::new("https://x.test/s");
        let out = src.fetch(&search, &ScrapeOptions::default()).await.unwrap();
        assert!(out.is_empty());
    }
}
