use std::fmt;

use async_trait::async_trait;
use chrono::Utc;
use serde::Serialize;
use tracing::info;

use super::ChangeNotifier;
use crate::{
    error::{RegionsError, Result},
    types::{ChangeSummary, Regions},
};

const TIMESTAMP_FORMAT: &str = "%Y-%m-%d %H:%M:%S";

/// Webhook request body.
#[derive(Debug, Clone, Default, PartialEq, Serialize)]
pub struct SlackMessage {
    #[serde(skip_serializing_if = "Option::is_none")]
    pub text: Option<String>,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub channel: Option<String>,
    #[serde(skip_serializing_if = "Vec::is_empty")]
    pub attachments: Vec<SlackAttachment>,
}

/// Legacy message attachment.
#[derive(Debug, Clone, Default, PartialEq, Serialize)]
pub struct SlackAttachment {
    pub color: String,
    pub title: String,
    pub text: String,
    pub fields: Vec<SlackField>,
    #[serde(rename = "ts")]
    pub timestamp: i64,
}

#[derive(Debug, Clone, PartialEq, Serialize)]
pub struct SlackField {
    pub title: String,
    pub value: String,
    pub short: bool,
}

impl SlackField {
    fn short<T: Into<String>, V: Into<String>>(title: T, value: V) -> Self {
        Self {
            title: title.into(),
            value: value.into(),
            short: true,
        }
    }

    fn long<T: Into<String>, V: Into<String>>(title: T, value: V) -> Self {
        Self {
            title: title.into(),
            value: value.into(),
            short: false,
        }
    }
}

/// Posts events to a Slack-compatible incoming webhook.
#[derive(Clone)]
pub struct SlackWebhookNotifier {
    client: reqwest::Client,
    webhook_url: String,
    error_channel: Option<String>,
    changes_channel: Option<String>,
}

impl fmt::Debug for SlackWebhookNotifier {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.debug_struct("SlackWebhookNotifier")
            .field("webhook_url", &"***")
            .field("error_channel", &self.error_channel)
            .field("changes_channel", &self.changes_channel)
            .finish()
    }
}

impl SlackWebhookNotifier {
    /// Notifier posting to `webhook_url` with the webhook's default channel.
    pub fn new<S: Into<String>>(
        client: reqwest::Client,
        webhook_url: S,
    ) -> Self {
        Self {
            client,
            webhook_url: webhook_url.into(),
            error_channel: None,
            changes_channel: None,
        }
    }

    /// Route error events to `channel` (with or without a leading `#`).
    pub fn with_error_channel(mut self, channel: Option<String>) -> Self {
        self.error_channel = channel.as_deref().and_then(normalize_channel);
        self
    }

    /// Route change events to `channel` (with or without a leading `#`).
    pub fn with_changes_channel(mut self, channel: Option<String>) -> Self {
        self.changes_channel = channel.as_deref().and_then(normalize_channel);
        self
    }

    /// Plain text message, mainly for checking webhook wiring.
    pub async fn send_text(
        &self,
        text: &str,
        channel: Option<&str>,
    ) -> Result<()> {
        let message = SlackMessage {
            text: Some(text.to_string()),
            channel: channel.and_then(normalize_channel),
            attachments: Vec::new(),
        };
        self.post(&message).await?;
        info!("Slack notification sent successfully");
        Ok(())
    }

    /// Danger attachment for a failed fetch.
    pub fn error_message(
        &self,
        provider: &str,
        error: &RegionsError,
    ) -> SlackMessage {
        let now = Utc::now();
        SlackMessage {
            text: None,
            channel: self.error_channel.clone(),
            attachments: vec![SlackAttachment {
                color: "danger".to_string(),
                title: "🚨 Provider Regions Fetch Failed".to_string(),
                text: format!(
                    "Failed to fetch regions for provider: *{provider}*"
                ),
                fields: vec![
                    SlackField::short("Provider", provider),
                    SlackField::long("Error", error.to_string()),
                    SlackField::short(
                        "Timestamp",
                        now.format(TIMESTAMP_FORMAT).to_string(),
                    ),
                ],
                timestamp: now.timestamp(),
            }],
        }
    }

    /// Warning attachment with region counts and a bounded change list.
    pub fn changed_message(
        &self,
        provider: &str,
        previous: &Regions,
        current: &Regions,
    ) -> SlackMessage {
        let now = Utc::now();
        let summary = ChangeSummary::between(previous, current);
        SlackMessage {
            text: None,
            channel: self.changes_channel.clone(),
            attachments: vec![SlackAttachment {
                color: "warning".to_string(),
                title: "🔄 Provider Regions Changed".to_string(),
                text: format!(
                    "Regions have changed for provider: *{provider}*"
                ),
                fields: vec![
                    SlackField::short("Provider", provider),
                    SlackField::short(
                        "Storage Regions Count",
                        format!(
                            "Old: {} → New: {}",
                            summary.storage_before, summary.storage_after
                        ),
                    ),
                    SlackField::short(
                        "Compute Regions Count",
                        format!(
                            "Old: {} → New: {}",
                            summary.compute_before, summary.compute_after
                        ),
                    ),
                    SlackField::long("Changes", summary.details()),
                    SlackField::short(
                        "Timestamp",
                        now.format(TIMESTAMP_FORMAT).to_string(),
                    ),
                ],
                timestamp: now.timestamp(),
            }],
        }
    }

    async fn post(&self, message: &SlackMessage) -> Result<()> {
        let response = self
            .client
            .post(&self.webhook_url)
            .json(message)
            .send()
            .await
            .map_err(|e| {
                RegionsError::Notification(format!(
                    "failed to send slack notification: {e}"
                ))
            })?;

        let status = response.status();
        if !status.is_success() {
            return Err(RegionsError::Notification(format!(
                "slack notification failed with status: {}",
                status.as_u16()
            )));
        }
        Ok(())
    }
}

#[async_trait]
impl ChangeNotifier for SlackWebhookNotifier {
    async fn notify_error(
        &self,
        provider: &str,
        error: &RegionsError,
    ) -> Result<()> {
        self.post(&self.error_message(provider, error)).await
    }

    async fn notify_changed(
        &self,
        provider: &str,
        previous: &Regions,
        current: &Regions,
    ) -> Result<()> {
        self.post(&self.changed_message(provider, previous, current)).await
    }
}

fn normalize_channel(channel: &str) -> Option<String> {
    let trimmed = channel.trim().trim_start_matches('#');
    if trimmed.is_empty() {
        None
    } else {
        Some(format!("#{trimmed}"))
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    fn notifier() -> SlackWebhookNotifier {
        SlackWebhookNotifier::new(
            reqwest::Client::new(),
            "http://localhost/hook",
        )
        .with_error_channel(Some("alerts".into()))
        .with_changes_channel(Some("#changes".into()))
    }

    #[test]
    fn channels_are_prefixed_once() {
        assert_eq!(normalize_channel("ops"), Some("#ops".into()));
        assert_eq!(normalize_channel("#ops"), Some("#ops".into()));
        assert_eq!(normalize_channel("  "), None);
    }

    #[test]
    fn error_message_shape() {
        let message = notifier().error_message(
            "Vultr",
            &RegionsError::Serialization("bad payload".into()),
        );
        let json = serde_json::to_value(&message).unwrap();

        assert_eq!(json["channel"], "#alerts");
        assert!(json.get("text").is_none());
        let attachment = &json["attachments"][0];
        assert_eq!(attachment["color"], "danger");
        assert_eq!(
            attachment["text"],
            "Failed to fetch regions for provider: *Vultr*"
        );
        assert_eq!(attachment["fields"][0]["value"], "Vultr");
        assert_eq!(attachment["fields"][1]["short"], false);
        assert!(attachment["ts"].as_i64().unwrap() > 0);
    }

    #[test]
    fn changed_message_reports_counts() {
        let previous = Regions::default().with_storage("a", "A");
        let current = Regions::default()
            .with_storage("a", "A")
            .with_storage("b", "B")
            .with_compute("c", "C");

        let message = notifier().changed_message("Linode", &previous, &current);
        let attachment = &message.attachments[0];

        assert_eq!(message.channel.as_deref(), Some("#changes"));
        assert_eq!(attachment.color, "warning");
        assert_eq!(attachment.fields[1].value, "Old: 1 → New: 2");
        assert_eq!(attachment.fields[2].value, "Old: 0 → New: 1");
        assert!(attachment.fields[3].value.contains("+ b: B"));
    }
}
