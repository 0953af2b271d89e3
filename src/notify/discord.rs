// src/notify/discord.rs
//! Discord forum-channel webhook: every post opens a new thread.

use anyhow::{anyhow, bail, Context, Result};
use reqwest::{header::RETRY_AFTER, Client, StatusCode};
use serde::{Deserialize, Serialize};
use serde_json::{Map, Value};
use std::time::Duration;
use tracing::info;

use super::{clip, webhook_from_env, Notifier};

/// Hard limit on message content.
pub const DISCORD_CONTENT_LIMIT: usize = 2000;
/// Forum thread titles are short.
pub const SAFE_TITLE_LIMIT: usize = 96;
const MAX_RETRY_AFTER_SECS: f64 = 5.0;

#[derive(Debug, Clone, Deserialize)]
struct DiscordSettings {
    #[serde(default)]
    webhook_env: String,
    #[serde(default)]
    channel_kind: Option<String>,
    #[serde(default)]
    max_chars: Option<usize>,
    #[serde(default)]
    applied_tags: Option<Vec<Value>>,
}

#[derive(Debug, Clone, PartialEq, Serialize)]
pub struct ForumPayload {
    pub thread_name: String,
    pub content: String,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub applied_tags: Option<Vec<Value>>,
}

#[derive(Clone)]
pub struct DiscordForumNotifier {
    webhook: Option<String>,
    client: Client,
    timeout: Duration,
    max_chars: usize,
    applied_tags: Option<Vec<Value>>,
    dry_run: bool,
}

impl DiscordForumNotifier {
    pub fn new(webhook: String) -> Self {
        Self {
            webhook: Some(webhook),
            client: Client::new(),
            timeout: Duration::from_secs(20),
            max_chars: DISCORD_CONTENT_LIMIT,
            applied_tags: None,
            dry_run: false,
        }
    }

    /// Build from an output's `settings` table. Only forum channels are supported.
    pub fn from_settings(settings: &Map<String, Value>, dry_run: bool) -> Result<Self> {
        let s: DiscordSettings = serde_json::from_value(Value::Object(settings.clone()))
            .context("discord output settings")?;
        if s.channel_kind.as_deref() != Some("forum") {
            bail!("discord output supports forum posts only; set channel_kind = \"forum\"");
        }
        let webhook = webhook_from_env(&s.webhook_env, dry_run)?;
        Ok(Self {
            webhook,
            client: Client::new(),
            timeout: Duration::from_secs(20),
            max_chars: s.max_chars.unwrap_or(DISCORD_CONTENT_LIMIT),
            applied_tags: s.applied_tags,
            dry_run,
        })
    }

    pub fn with_timeout(mut self, secs: u64) -> Self {
        self.timeout = Duration::from_secs(secs);
        self
    }

    pub fn with_max_chars(mut self, n: usize) -> Self {
        self.max_chars = n;
        self
    }

    pub fn with_applied_tags(mut self, tags: Vec<Value>) -> Self {
        self.applied_tags = Some(tags);
        self
    }

    pub fn payload(&self, title: &str, body: &str) -> ForumPayload {
        ForumPayload {
            thread_name: clip(title, SAFE_TITLE_LIMIT),
            content: clip(body, self.max_chars.min(DISCORD_CONTENT_LIMIT)),
            applied_tags: self.applied_tags.clone(),
        }
    }

    async fn post(&self, url: &str, payload: &ForumPayload) -> Result<reqwest::Response> {
        self.client
            .post(url)
            .timeout(self.timeout)
            .json(payload)
            .send()
            .await
            .context("discord webhook request")
    }
}

/// Delay for a 429: `Retry-After` seconds, default 1, capped.
pub fn retry_after_delay(header: Option<&str>) -> Duration {
    let secs = header
        .and_then(|v| v.trim().parse::<f64>().ok())
        .filter(|s| s.is_finite())
        .unwrap_or(1.0)
        .clamp(0.0, MAX_RETRY_AFTER_SECS);
    Duration::from_secs_f64(secs)
}

#[async_trait::async_trait]
impl Notifier for DiscordForumNotifier {
    fn name(&self) -> &str {
        "discord"
    }

    async fn send(&self, title: &str, body: &str) -> Result<()> {
        let payload = self.payload(title, body);

        if self.dry_run {
            info!(
                target: "notify",
                thread_name = %payload.thread_name,
                content_len = payload.content.chars().count(),
                "[dry run] would post to discord forum"
            );
            return Ok(());
        }
        let url = self
            .webhook
            .as_deref()
            .ok_or_else(|| anyhow!("discord webhook URL missing"))?;

        let mut rsp = self.post(url, &payload).await?;
        if rsp.status() == StatusCode::TOO_MANY_REQUESTS {
            let delay = retry_after_delay(
                rsp.headers()
                    .get(RETRY_AFTER)
                    .and_then(|v| v.to_str().ok()),
            );
            tracing::debug!(target: "notify", ?delay, "discord rate limited, retrying once");
            tokio::time::sleep(delay).await;
            rsp = self.post(url, &payload).await?;
        }
        rsp.error_for_status()
            .map_err(|e| anyhow!("discord webhook HTTP error: {e}"))?;
        Ok(())
    }
}
