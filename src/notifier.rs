//! Webhook alerts for failed or degraded probes.
//!
//! Delivery is best effort: a missing webhook, a transport error or a non-2xx
//! answer is logged and otherwise ignored.

use chrono::{SecondsFormat, Utc};
use serde::Serialize;
use tracing::{debug, warn};

const DEFAULT_TITLE: &str = "Health check failed";

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum Severity {
    Error,
    Warning,
}

impl Severity {
    pub fn color(self) -> u32 {
        match self {
            Severity::Error => 16007990,
            Severity::Warning => 16761095,
        }
    }
}

#[derive(Debug, Clone)]
pub struct AlertParams {
    pub description: String,
    pub severity: Severity,
    pub fields: Vec<(String, String)>,
    pub title: Option<String>,
    pub footer: Option<String>,
}

impl AlertParams {
    pub fn new(severity: Severity, description: impl Into<String>) -> Self {
        Self {
            description: description.into(),
            severity,
            fields: Vec::new(),
            title: None,
            footer: None,
        }
    }

    pub fn field(mut self, name: impl Into<String>, value: impl Into<String>) -> Self {
        self.fields.push((name.into(), value.into()));
        self
    }
}

#[derive(Debug, Serialize)]
pub struct WebhookPayload {
    pub embeds: Vec<Embed>,
}

#[derive(Debug, Serialize)]
pub struct Embed {
    #[serde(rename = "type")]
    pub kind: &'static str,
    pub title: String,
    pub description: String,
    pub color: u32,
    pub fields: Vec<EmbedField>,
    pub footer: EmbedFooter,
}

#[derive(Debug, Serialize)]
pub struct EmbedField {
    pub name: String,
    pub value: String,
}

#[derive(Debug, Serialize)]
pub struct EmbedFooter {
    pub text: String,
}

impl From<AlertParams> for WebhookPayload {
    fn from(alert: AlertParams) -> Self {
        let footer = alert
            .footer
            .unwrap_or_else(|| Utc::now().to_rfc3339_opts(SecondsFormat::Secs, true));
        WebhookPayload {
            embeds: vec![Embed {
                kind: "rich",
                title: alert.title.unwrap_or_else(|| DEFAULT_TITLE.to_string()),
                description: alert.description,
                color: alert.severity.color(),
                fields: alert
                    .fields
                    .into_iter()
                    .map(|(name, value)| EmbedField { name, value })
                    .collect(),
                footer: EmbedFooter { text: footer },
            }],
        }
    }
}

#[derive(Debug, Clone)]
pub struct Notifier {
    webhook_url: Option<String>,
    http_client: reqwest::Client,
}

impl Notifier {
    pub fn new(webhook_url: Option<String>, http_client: reqwest::Client) -> Self {
        Self {
            webhook_url: webhook_url.filter(|url| !url.is_empty()),
            http_client,
        }
    }

    pub fn is_enabled(&self) -> bool {
        self.webhook_url.is_some()
    }

    pub async fn notify(&self, alert: AlertParams) {
        let Some(url) = &self.webhook_url else {
            debug!(description = %alert.description, "Webhook URL is not set, skipping alert");
            return;
        };

        let payload = WebhookPayload::from(alert);
        match self.http_client.post(url).json(&payload).send().await {
            Ok(resp) if resp.status().is_success() => {
                debug!(status = resp.status().as_u16(), "Alert delivered");
            }
            Ok(resp) => {
                warn!(status = resp.status().as_u16(), "Webhook returned non-success status");
            }
            Err(e) => {
                warn!(error = %e, "Failed to send webhook alert");
            }
        }
    }
}
