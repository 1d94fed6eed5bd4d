use anyhow::{Context, Result};
use chrono::Utc;
use reqwest::header::{HeaderName, HeaderValue};
use reqwest::{Method, Request};
use std::time::{Duration, Instant};
use tracing::{debug, info, warn};

use crate::config::Target;
use crate::models::CheckResult;
use crate::notifier::{AlertParams, Notifier, Severity};

const MICROS_PER_MILLI: f64 = 1_000.0;
const MICROS_PER_SECOND: u128 = 1_000_000;

/// Runs single HTTP probes and turns the outcome into a verdict.
#[derive(Debug, Clone)]
pub struct Prober {
    http_client: reqwest::Client,
    notifier: Notifier,
}

impl Prober {
    /// `timeout` bounds the whole request/response cycle of every probe and alert.
    pub fn new(timeout: Duration, webhook_url: Option<String>) -> Result<Self> {
        let http_client = reqwest::Client::builder()
            .timeout(timeout)
            .build()
            .context("Failed to create HTTP client")?;
        let notifier = Notifier::new(webhook_url, http_client.clone());
        Ok(Self { http_client, notifier })
    }

    pub fn notifier(&self) -> &Notifier {
        &self.notifier
    }

    /// Probes `target` once. Failures are encoded in the returned result and
    /// reported through the notifier.
    pub async fn probe(&self, target: &Target) -> CheckResult {
        let checked_at = Utc::now();

        let request = match self.build_request(target) {
            Ok(request) => request,
            Err(e) => {
                warn!(url = %target.url, error = %e, "Failed to create request");
                self.notifier
                    .notify(
                        AlertParams::new(Severity::Error, "Failed to create request")
                            .field("URL", &target.url),
                    )
                    .await;
                return CheckResult::unreachable(&target.url, checked_at);
            }
        };

        let start = Instant::now();
        let response = match self.http_client.execute(request).await {
            Ok(response) => response,
            Err(e) => {
                warn!(url = %target.url, error = %e, "Failed to connect to server");
                self.notifier
                    .notify(
                        AlertParams::new(Severity::Error, "Failed to connect to server")
                            .field("URL", &target.url),
                    )
                    .await;
                return CheckResult::unreachable(&target.url, checked_at);
            }
        };
        let elapsed = start.elapsed();

        let status_code = response.status().as_u16();
        let body = match response.text().await {
            Ok(body) => body,
            Err(e) => {
                warn!(url = %target.url, error = %e, "Failed to read response body");
                String::new()
            }
        };
        let time_taken = format_time_taken(elapsed);

        let result = |status: bool| CheckResult {
            url: target.url.clone(),
            status_code,
            time_taken: time_taken.clone(),
            status,
            last_checked: checked_at,
        };
        let details = |description: String, severity: Severity| {
            AlertParams::new(severity, description)
                .field("URL", &target.url)
                .field("Status Code", status_code.to_string())
                .field("Time Taken", &time_taken)
        };

        if let Some(threshold) = target.speed_threshold() {
            if elapsed.as_millis() > threshold.as_millis() {
                warn!(url = %target.url, time_taken = %time_taken, threshold_ms = target.speed, "Response too slow");
                self.notifier
                    .notify(details(
                        "Server responded successfully, but it was too slow.".into(),
                        Severity::Warning,
                    ))
                    .await;
                return result(true);
            }
        }

        let expected = target.expected_status();
        if status_code != expected {
            warn!(url = %target.url, expected, actual = status_code, "Unexpected status code");
            self.notifier
                .notify(details(
                    format!("Expected status is {expected}, but actual status is {status_code}"),
                    Severity::Error,
                ))
                .await;
            return result(false);
        }

        if let Some(text) = target.required_text() {
            if !body.contains(text) {
                warn!(url = %target.url, text, "Required text not found in response");
                self.notifier
                    .notify(details(
                        format!("String `{text}` not found in HTTP response"),
                        Severity::Error,
                    ))
                    .await;
                return result(false);
            }
        }

        info!(url = %target.url, status = status_code, time_taken = %time_taken, "Succeeded");
        result(true)
    }

    fn build_request(&self, target: &Target) -> Result<Request> {
        let Some(over) = &target.request else {
            return self
                .http_client
                .get(target.url.as_str())
                .build()
                .context("invalid request");
        };

        let method = if over.method.is_empty() {
            Method::GET
        } else {
            Method::from_bytes(over.method.as_bytes())
                .with_context(|| format!("invalid method {:?}", over.method))?
        };

        let mut request = self
            .http_client
            .request(method, target.url.as_str())
            .body(over.body.clone())
            .build()
            .context("invalid request")?;
        // Same-named headers replace each other, names compare case-insensitively.
        for (name, value) in &over.headers {
            let name = HeaderName::from_bytes(name.as_bytes())
                .with_context(|| format!("invalid header name {name:?}"))?;
            let value = HeaderValue::from_str(value)
                .with_context(|| format!("invalid value for header {name}"))?;
            request.headers_mut().insert(name, value);
        }
        debug!(url = %target.url, method = %request.method(), "Built request override");
        Ok(request)
    }
}

/// Formats a latency as milliseconds below one second and as seconds above,
/// both with three decimals.
pub fn format_time_taken(elapsed: Duration) -> String {
    let micros = elapsed.as_micros();
    if micros < MICROS_PER_SECOND {
        format!("{:.3} ms", micros as f64 / MICROS_PER_MILLI)
    } else {
        format!("{:.3} s", micros as f64 / MICROS_PER_SECOND as f64)
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::config::RequestOverride;

    #[test]
    fn formats_sub_second_as_millis() {
        assert_eq!(format_time_taken(Duration::from_micros(123_456)), "123.456 ms");
        assert_eq!(format_time_taken(Duration::from_micros(999_999)), "999.999 ms");
        assert_eq!(format_time_taken(Duration::ZERO), "0.000 ms");
    }

    #[test]
    fn formats_second_and_above_as_seconds() {
        assert_eq!(format_time_taken(Duration::from_micros(1_000_000)), "1.000 s");
        assert_eq!(format_time_taken(Duration::from_millis(2_345)), "2.345 s");
    }

    #[test]
    fn empty_override_method_defaults_to_get() {
        let prober = Prober::new(Duration::from_secs(1), None).unwrap();
        let mut target = Target::new("http://localhost/health");
        target.request = Some(RequestOverride::default());
        let request = prober.build_request(&target).unwrap();
        assert_eq!(request.method(), Method::GET);
    }

    #[test]
    fn invalid_header_fails_to_build() {
        let prober = Prober::new(Duration::from_secs(1), None).unwrap();
        let mut target = Target::new("http://localhost/health");
        let mut over = RequestOverride::default();
        over.headers.insert("bad header".into(), "x".into());
        target.request = Some(over);
        assert!(prober.build_request(&target).is_err());
    }

    #[tokio::test]
    async fn unparsable_url_yields_unreachable_result() {
        let prober = Prober::new(Duration::from_secs(1), None).unwrap();
        let result = prober.probe(&Target::new("not a url")).await;
        assert_eq!(result.status_code, 0);
        assert_eq!(result.time_taken, "0");
        assert!(!result.status);
    }
}
