// src/source/mod.rs
//! Record producers. Page automation lives outside this crate; producers here
//! only hand the run driver a batch of raw records per search.

pub mod uma_global;

use anyhow::Result;
use std::collections::HashMap;

use crate::config::{ScrapeOptions, SearchConfig};
use crate::record::Record;

#[async_trait::async_trait]
pub trait RecordSource: Send + Sync {
    fn name(&self) -> &str;
    /// Records in page order. An empty batch means "nothing this cycle".
    async fn fetch(&self, search: &SearchConfig, opts: &ScrapeOptions) -> Result<Vec<Record>>;
}

/// Producers by `source_site` name.
#[derive(Default)]
pub struct SourceRegistry {
    sources: HashMap<String, Box<dyn RecordSource>>,
}

impl SourceRegistry {
    pub fn new() -> Self {
        Self::default()
    }

    /// Registry with the built-in producers.
    pub fn with_builtins() -> Self {
        let mut r = Self::new();
        r.register(Box::new(uma_global::UmaGlobalSource::new()));
        r
    }

    pub fn register(&mut self, source: Box<dyn RecordSource>) {
        self.sources.insert(source.name().to_string(), source);
    }

    pub fn get(&self, name: &str) -> Option<&dyn RecordSource> {
        self.sources.get(name).map(|b| b.as_ref())
    }
}
