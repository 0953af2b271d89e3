// src/notify/mod.rs
//! Delivery sinks for rendered posts.

pub mod discord;
pub mod slack;

use anyhow::{bail, Result};
use metrics::counter;

use crate::config::{OutputSpec, OutputsConfig};

pub use discord::DiscordForumNotifier;
pub use slack::SlackNotifier;

#[async_trait::async_trait]
pub trait Notifier: Send + Sync {
    fn name(&self) -> &str;
    async fn send(&self, title: &str, body: &str) -> Result<()>;
}

/// Fans a post out to every configured sink.
#[derive(Default)]
pub struct NotifierMux {
    sinks: Vec<Box<dyn Notifier>>,
}

impl NotifierMux {
    pub fn new(sinks: Vec<Box<dyn Notifier>>) -> Self {
        Self { sinks }
    }

    /// Build every sink up front, so a misconfigured output fails before any state is touched.
    pub fn from_config(cfg: &OutputsConfig, dry_run: bool) -> Result<Self> {
        let sinks = cfg
            .outputs
            .iter()
            .map(|spec| build_notifier(spec, dry_run))
            .collect::<Result<Vec<_>>>()?;
        Ok(Self { sinks })
    }

    pub fn len(&self) -> usize {
        self.sinks.len()
    }

    pub fn is_empty(&self) -> bool {
        self.sinks.is_empty()
    }

    /// Deliver to all sinks. A failing sink is logged and skipped. Returns the failure count.
    pub async fn notify(&self, title: &str, body: &str) -> usize {
        let mut failed = 0;
        for sink in &self.sinks {
            if let Err(e) = sink.send(title, body).await {
                tracing::warn!(target: "notify", sink = sink.name(), error = %format!("{e:#}"), "delivery failed");
                counter!("monitor_posts_failed_total").increment(1);
                failed += 1;
            }
        }
        failed
    }
}

pub fn build_notifier(spec: &OutputSpec, dry_run: bool) -> Result<Box<dyn Notifier>> {
    match spec.kind.to_ascii_lowercase().as_str() {
        "discord" => Ok(Box::new(DiscordForumNotifier::from_settings(
            &spec.settings,
            dry_run,
        )?)),
        "slack" => Ok(Box::new(SlackNotifier::from_settings(&spec.settings, dry_run)?)),
        other => bail!("unknown output type {other:?}"),
    }
}

/// Resolve a webhook URL from the env var named in settings. Optional in dry-run mode.
pub(crate) fn webhook_from_env(env_name: &str, dry_run: bool) -> Result<Option<String>> {
    let url = std::env::var(env_name)
        .ok()
        .filter(|s| !s.trim().is_empty());
    match url {
        Some(u) => Ok(Some(u)),
        None if dry_run => Ok(None),
        None if env_name.is_empty() => bail!("webhook_env not set in output settings"),
        None => bail!("webhook URL not provided; expected env var {env_name}"),
    }
}

/// Clip to `n` chars, ending in `…` when shortened.
pub fn clip(s: &str, n: usize) -> String {
    if s.chars().count() <= n {
        return s.to_string();
    }
    let mut out: String = s.chars().take(n.saturating_sub(1)).collect();
    out.push('…');
    out
}

#[cfg(test)]
mod tests {
    use super::*;
    use std::sync::atomic::{AtomicUsize, Ordering};
    use std::sync::Arc;

    struct Flaky {
        fail: bool,
        calls: Arc<AtomicUsize>,
    }

    #[async_trait::async_trait]
    impl Notifier for Flaky {
        fn name(&self) -> &str {
            "flaky"
        }
        async fn send(&self, _title: &str, _body: &str) -> Result<()> {
            self.calls.fetch_add(1, Ordering::SeqCst);
            if self.fail {
                bail!("boom")
            }
            Ok(())
        }
    }

    #[tokio::test]
    async fn failing_sink_does_not_stop_others() {
        let calls = Arc::new(AtomicUsize::new(0));
        let mux = NotifierMux::new(vec![
            Box::new(Flaky { fail: true, calls: calls.clone() }),
            Box::new(Flaky { fail: false, calls: calls.clone() }),
        ]);
        assert_eq!(mux.notify("t", "b").await, 1);
        assert_eq!(calls.load(Ordering::SeqCst), 2);
    }

    #[test]
    fn clip_counts_chars() {
        assert_eq!(clip("abc", 3), "abc");
        assert_eq!(clip("abcd", 3), "ab…");
        assert_eq!(clip("ééééé", 2), "é…");
        assert_eq!(clip("abc", 0), "…");
    }

    #[test]
    fn unknown_output_type_is_rejected() {
        let spec = OutputSpec {
            kind: "pigeon".into(),
            settings: Default::default(),
        };
        assert!(build_notifier(&spec, true).is_err());
    }
}
