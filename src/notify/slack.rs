use anyhow::{anyhow, Context, Result};
use reqwest::Client;
use serde::Deserialize;
use serde_json::{Map, Value};
use std::time::Duration;

use super::{webhook_from_env, Notifier};

#[derive(Debug, Clone, Deserialize)]
struct SlackSettings {
    #[serde(default)]
    webhook_env: String,
}

pub struct SlackNotifier {
    webhook_url: Option<String>,
    client: Client,
    timeout: Duration,
    dry_run: bool,
}

impl SlackNotifier {
    /// Optional builder for tests/tools
    pub fn new(url: String) -> Self {
        Self {
            webhook_url: Some(url),
            client: Client::new(),
            timeout: Duration::from_secs(20),
            dry_run: false,
        }
    }

    pub fn from_settings(settings: &Map<String, Value>, dry_run: bool) -> Result<Self> {
        let s: SlackSettings = serde_json::from_value(Value::Object(settings.clone()))
            .context("slack output settings")?;
        Ok(Self {
            webhook_url: webhook_from_env(&s.webhook_env, dry_run)?,
            client: Client::new(),
            timeout: Duration::from_secs(20),
            dry_run,
        })
    }

    pub fn with_timeout(mut self, secs: u64) -> Self {
        self.timeout = Duration::from_secs(secs);
        self
    }
}

pub fn slack_text(title: &str, body: &str) -> String {
    format!("*{title}*\n{body}")
}

#[async_trait::async_trait]
impl Notifier for SlackNotifier {
    fn name(&self) -> &str {
        "slack"
    }

    async fn send(&self, title: &str, body: &str) -> Result<()> {
        let text = slack_text(title, body);
        if self.dry_run {
            tracing::info!(target: "notify", title, text_len = text.chars().count(), "[dry run] would post to slack");
            return Ok(());
        }
        let url = self
            .webhook_url
            .as_deref()
            .ok_or_else(|| anyhow!("slack webhook URL missing"))?;
        let body = serde_json::json!({ "text": text });

        self.client
            .post(url)
            .timeout(self.timeout)
            .json(&body)
            .send()
            .await
            .context("slack post")?
            .error_for_status()
            .context("slack non-2xx")?;
        Ok(())
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn text_bolds_title() {
        assert_eq!(slack_text("t", "b"), "*t*\nb");
    }
}
