// src/runner.rs
//! Run driver: every configured search, one after another, isolated from each other.

use anyhow::{anyhow, Result};
use metrics::{counter, describe_counter, describe_gauge, gauge};
use once_cell::sync::OnceCell;
use std::time::Duration;
use tracing::{info, info_span, warn, Instrument};

use crate::config::{resolve_options, resolve_select_options, SearchConfig, SiteConfig, SitesConfig};
use crate::format::make_title_and_body;
use crate::notify::NotifierMux;
use crate::select::select;
use crate::source::SourceRegistry;
use crate::state::StateStore;

fn ensure_metrics_described() {
    static ONCE: OnceCell<()> = OnceCell::new();
    ONCE.get_or_init(|| {
        describe_counter!("monitor_searches_total", "Searches processed.");
        describe_counter!(
            "monitor_search_errors_total",
            "Searches skipped because of a config, state or persistence error."
        );
        describe_counter!("monitor_records_scraped_total", "Records returned by producers.");
        describe_counter!("monitor_records_emitted_total", "Records selected for posting.");
        describe_counter!("monitor_records_skipped_total", "Records dropped for lack of an id.");
        describe_counter!("monitor_posts_failed_total", "Sink deliveries that failed.");
        describe_gauge!("monitor_last_run_ts", "Unix ts when the monitor last ran.");
    });
}

#[derive(Debug, Clone)]
pub struct RunOptions {
    /// Render and log posts instead of delivering them.
    pub dry_run: bool,
    /// Persist state even in dry-run mode (normally a dry run consumes nothing).
    pub persist_in_dry_run: bool,
    /// Pause between posts.
    pub post_delay: Duration,
}

impl Default for RunOptions {
    fn default() -> Self {
        Self {
            dry_run: false,
            persist_in_dry_run: false,
            post_delay: Duration::from_secs(1),
        }
    }
}

#[derive(Debug, Clone, Default, PartialEq, Eq)]
pub struct RunSummary {
    pub searches: usize,
    pub searches_failed: usize,
    pub records_scraped: usize,
    pub records_emitted: usize,
    pub posts_failed: usize,
}

impl RunSummary {
    pub fn all_failed(&self) -> bool {
        self.searches > 0 && self.searches_failed == self.searches
    }
}

#[derive(Debug, Default)]
struct SearchOutcome {
    scraped: usize,
    emitted: usize,
    posts_failed: usize,
}

/// Process every search in configuration order. Errors stay local to their search.
pub async fn run(
    sites: &SitesConfig,
    store: &StateStore,
    sources: &SourceRegistry,
    mux: &NotifierMux,
    opts: &RunOptions,
) -> RunSummary {
    ensure_metrics_described();
    let mut summary = RunSummary::default();

    for site in &sites.sites {
        for search in &site.searches {
            summary.searches += 1;
            counter!("monitor_searches_total").increment(1);
            let span = info_span!("search", site = site.site_id(), url = %search.url);
            match run_search(site, search, store, sources, mux, opts)
                .instrument(span)
                .await
            {
                Ok(out) => {
                    summary.records_scraped += out.scraped;
                    summary.records_emitted += out.emitted;
                    summary.posts_failed += out.posts_failed;
                }
                Err(e) => {
                    warn!(target: "runner", site = site.site_id(), url = %search.url, error = %format!("{e:#}"), "search skipped");
                    counter!("monitor_search_errors_total").increment(1);
                    summary.searches_failed += 1;
                }
            }
        }
    }

    let now = chrono::Utc::now().timestamp().max(0);
    gauge!("monitor_last_run_ts").set(now as f64);
    info!(
        target: "runner",
        searches = summary.searches,
        failed = summary.searches_failed,
        scraped = summary.records_scraped,
        emitted = summary.records_emitted,
        posts_failed = summary.posts_failed,
        dry_run = opts.dry_run,
        "run finished"
    );
    summary
}

async fn run_search(
    site: &SiteConfig,
    search: &SearchConfig,
    store: &StateStore,
    sources: &SourceRegistry,
    mux: &NotifierMux,
    opts: &RunOptions,
) -> Result<SearchOutcome> {
    let scrape_opts = resolve_options(search)?;
    let select_opts = resolve_select_options(search)?;
    let source = sources
        .get(&site.source_site)
        .ok_or_else(|| anyhow!("unknown source_site {:?}", site.source_site))?;

    let records = match source.fetch(search, &scrape_opts).await {
        Ok(r) => r,
        Err(e) => {
            warn!(target: "runner", error = %format!("{e:#}"), "producer failed, no records this cycle");
            return Ok(SearchOutcome::default());
        }
    };
    if records.is_empty() {
        info!(target: "runner", "no records for search");
        return Ok(SearchOutcome::default());
    }
    let scraped = records.len();
    counter!("monitor_records_scraped_total").increment(scraped as u64);

    let site_id = site.site_id();
    // An unreadable or corrupt file aborts here, before anything could overwrite it.
    let mut state = store.load(site_id, &search.url)?;
    let selection = select(&mut state, &select_opts, records);
    counter!("monitor_records_skipped_total").increment(selection.skipped as u64);

    if !opts.dry_run || opts.persist_in_dry_run {
        store.save(site_id, &search.url, &mut state)?;
    }
    if selection.seeded_now {
        info!(target: "runner", baseline = state.digests.len(), "first scan absorbed, nothing posted");
        return Ok(SearchOutcome {
            scraped,
            ..Default::default()
        });
    }

    let emitted = selection.emitted.len();
    counter!("monitor_records_emitted_total").increment(emitted as u64);
    let mut posts_failed = 0;
    for (i, r) in selection.emitted.iter().enumerate() {
        let (title, body) = match make_title_and_body(r) {
            Ok(tb) => tb,
            Err(e) => {
                warn!(target: "runner", error = %e, "record not renderable");
                posts_failed += 1;
                continue;
            }
        };
        if i > 0 && !opts.post_delay.is_zero() {
            tokio::time::sleep(opts.post_delay).await;
        }
        posts_failed += mux.notify(&title, &body).await;
        info!(target: "runner", entity_id = r.entity_id().unwrap_or_default(), dry_run = opts.dry_run, "posted");
    }

    Ok(SearchOutcome {
        scraped,
        emitted,
        posts_failed,
    })
}
