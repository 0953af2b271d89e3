// src/lib.rs
// Public library surface for the binary and integration tests.

pub mod config;
pub mod error;
pub mod fingerprint;
pub mod format;
pub mod normalize;
pub mod record;
pub mod runner;
pub mod select;
pub mod source;
pub mod state;

// Delivery sinks (Discord forum, Slack)
pub mod notify;

// ---- Re-exports for stable public API ----
pub use crate::error::StateError;
pub use crate::fingerprint::fingerprint;
pub use crate::normalize::normalize;
pub use crate::record::Record;
pub use crate::select::{select, SelectOptions, Selection};
pub use crate::state::{seed_from_records, trim_window, SearchState, StateStore};
