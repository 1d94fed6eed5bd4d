use serde::{Deserialize, Serialize};
use chrono::{DateTime, Utc};
use std::collections::HashMap;
use std::sync::Arc;

/// Verdict of a single probe.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct CheckResult {
    pub url: String,
    /// 0 when no response was received.
    pub status_code: u16,
    pub time_taken: String,
    pub status: bool,
    pub last_checked: DateTime<Utc>,
}

impl CheckResult {
    /// Result for a probe that never got a response.
    pub fn unreachable(url: &str, last_checked: DateTime<Utc>) -> Self {
        Self {
            url: url.to_string(),
            status_code: 0,
            time_taken: "0".into(),
            status: false,
            last_checked,
        }
    }
}

#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "UPPERCASE")]
pub enum HistoryStatus {
    Up,
    Down,
}

impl From<bool> for HistoryStatus {
    fn from(healthy: bool) -> Self {
        if healthy { HistoryStatus::Up } else { HistoryStatus::Down }
    }
}

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct HistoryEntry {
    pub url: String,
    pub status: HistoryStatus,
    pub timestamp: DateTime<Utc>,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub message: Option<String>,
}

impl From<&CheckResult> for HistoryEntry {
    fn from(result: &CheckResult) -> Self {
        Self {
            url: result.url.clone(),
            status: result.status.into(),
            timestamp: result.last_checked,
            message: None,
        }
    }
}

pub type ResultsSnapshot = HashMap<String, CheckResult>;
pub type HistorySnapshot = Vec<HistoryEntry>;

/// Message pushed to live subscribers.
#[derive(Debug, Clone, Serialize)]
#[serde(tag = "type", content = "data", rename_all = "lowercase")]
pub enum Envelope {
    Results(Arc<ResultsSnapshot>),
    History(Arc<HistorySnapshot>),
}

impl Envelope {
    pub fn kind(&self) -> &'static str {
        match self {
            Envelope::Results(_) => "results",
            Envelope::History(_) => "history",
        }
    }
}
