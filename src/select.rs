// src/select.rs
//! Emit-or-skip decision per scraped record.
//!
//! Unseeded searches absorb their first batch silently. Seeded searches emit
//! records whose white-list fingerprint is new or changed, capped per run.

use serde::{Deserialize, Serialize};
use tracing::{debug, warn};

use crate::fingerprint::fingerprint;
use crate::record::Record;
use crate::state::{seed_from_records, trim_window, SearchState};

pub const DEFAULT_PER_RUN_MAX: usize = 50;

fn default_true() -> bool {
    true
}
fn default_per_run_max() -> usize {
    DEFAULT_PER_RUN_MAX
}

#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
pub struct SelectOptions {
    /// `false` switches to firehose mode: emit up to the cap, ledger untouched.
    #[serde(default = "default_true")]
    pub detect_updates: bool,
    #[serde(default = "default_per_run_max")]
    pub per_run_max: usize,
}

impl Default for SelectOptions {
    fn default() -> Self {
        Self {
            detect_updates: true,
            per_run_max: DEFAULT_PER_RUN_MAX,
        }
    }
}

/// Outcome of one selection pass.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct Selection {
    pub emitted: Vec<Record>,
    /// True when this pass performed the one-time seeding.
    pub seeded_now: bool,
    /// Records dropped for lack of an id.
    pub skipped: usize,
}

/// Run one selection pass. `state` is updated in place; the caller persists it.
///
/// Batch order is preserved and is the only ordering signal: when more than
/// `per_run_max` records qualify, the earliest ones win and the rest are
/// reconsidered on the next run.
pub fn select(state: &mut SearchState, opts: &SelectOptions, records: Vec<Record>) -> Selection {
    let (valid, skipped): (Vec<Record>, Vec<Record>) =
        records.into_iter().partition(|r| r.entity_id().is_some());
    if !skipped.is_empty() {
        warn!(target: "select", site = %state.site_id, skipped = skipped.len(), "records without id skipped");
    }
    let skipped = skipped.len();

    if !state.seeded {
        seed_from_records(state, &valid);
        debug!(target: "select", site = %state.site_id, baseline = state.digests.len(), "seeded");
        return Selection {
            emitted: Vec::new(),
            seeded_now: true,
            skipped,
        };
    }

    if !opts.detect_updates {
        let emitted: Vec<Record> = valid.into_iter().take(opts.per_run_max).collect();
        return Selection {
            emitted,
            seeded_now: false,
            skipped,
        };
    }

    let mut emitted = Vec::new();
    for r in valid {
        if emitted.len() >= opts.per_run_max {
            break;
        }
        let Some(id) = r.entity_id() else { continue };
        let fp = fingerprint(r.change_tags());
        if state.digests.get(id) == Some(&fp) {
            continue;
        }
        debug!(target: "select", entity_id = id, new = !state.digests.contains_key(id), "changed");
        state.digests.insert(id.to_string(), fp);
        emitted.push(r);
    }
    trim_window(state);

    Selection {
        emitted,
        seeded_now: false,
        skipped,
    }
}
