//! Kairo HTTP security scanner client.

use std::time::{Duration, Instant};

use async_trait::async_trait;
use secrecy::{ExposeSecret, SecretString};
use serde::Deserialize;
use serde_json::json;

use crate::error::ProviderError;
use crate::providers::{ScanDecision, SecurityScanResult, SecurityScanner};

const PROVIDER: &str = "kairo";

#[derive(Debug, Deserialize)]
struct KairoResponse {
    #[serde(default)]
    decision: String,
    #[serde(default)]
    decision_reason: Option<String>,
    #[serde(default)]
    risk_score: Option<f64>,
    #[serde(default)]
    summary: Option<KairoSummary>,
}

#[derive(Debug, Deserialize)]
#[serde(untagged)]
enum KairoSummary {
    Text(String),
    Counts {
        total: Option<u64>,
        critical: Option<u64>,
        high: Option<u64>,
        medium: Option<u64>,
        low: Option<u64>,
    },
}

impl KairoSummary {
    fn render(&self) -> String {
        match self {
            Self::Text(text) => text.clone(),
            Self::Counts {
                total,
                critical,
                high,
                medium,
                low,
            } => {
                let parts: Vec<String> = [
                    ("total", total),
                    ("critical", critical),
                    ("high", high),
                    ("medium", medium),
                    ("low", low),
                ]
                .into_iter()
                .filter_map(|(label, count)| count.map(|c| format!("{label}={c}")))
                .collect();
                if parts.is_empty() {
                    String::new()
                } else {
                    format!("Findings: {}", parts.join(", "))
                }
            }
        }
    }
}

impl From<KairoResponse> for SecurityScanResult {
    fn from(response: KairoResponse) -> Self {
        let reason = response.decision_reason.unwrap_or_default();
        let summary = response
            .summary
            .map(|s| s.render())
            .filter(|s| !s.is_empty())
            .or_else(|| Some(reason.clone()).filter(|r| !r.is_empty()))
            .unwrap_or_else(|| "Kairo analysis completed".to_string());
        Self {
            decision: ScanDecision::from_label(&response.decision),
            reason,
            risk_score: response.risk_score.unwrap_or(0.0),
            summary,
        }
    }
}

#[derive(Debug)]
pub struct KairoScanner {
    http: reqwest::Client,
    api_url: String,
    api_key: SecretString,
    severity_threshold: String,
}

impl KairoScanner {
    pub fn new(
        api_url: &str,
        api_key: SecretString,
        severity_threshold: &str,
        timeout: Duration,
    ) -> Result<Self, ProviderError> {
        url::Url::parse(api_url).map_err(|e| {
            ProviderError::request_failed(PROVIDER, format!("invalid scanner URL: {e}"))
        })?;
        let http = reqwest::Client::builder()
            .timeout(timeout)
            .build()
            .map_err(|e| ProviderError::request_failed(PROVIDER, e))?;
        Ok(Self {
            http,
            api_url: api_url.to_string(),
            api_key,
            severity_threshold: severity_threshold.to_string(),
        })
    }

    pub fn api_url(&self) -> &str {
        &self.api_url
    }
}

#[async_trait]
impl SecurityScanner for KairoScanner {
    fn name(&self) -> &str {
        PROVIDER
    }

    async fn analyze(&self, source_code: &str) -> Result<SecurityScanResult, ProviderError> {
        let start = Instant::now();
        let body = json!({
            "source": {
                "type": "inline",
                "files": [{ "path": "Contract.sol", "content": source_code }]
            },
            "config": {
                "severity_threshold": self.severity_threshold,
                "include_suggestions": true
            }
        });

        let response = self
            .http
            .post(&self.api_url)
            .bearer_auth(self.api_key.expose_secret())
            .json(&body)
            .send()
            .await
            .map_err(|e| ProviderError::request_failed(PROVIDER, e))?;

        let status = response.status();
        if !status.is_success() {
            return Err(ProviderError::HttpStatus {
                provider: PROVIDER.to_string(),
                status: status.as_u16(),
            });
        }

        let parsed: KairoResponse = response
            .json()
            .await
            .map_err(|e| ProviderError::invalid_response(PROVIDER, e))?;
        let result = SecurityScanResult::from(parsed);
        tracing::debug!(
            "Kairo responded in {:?} with decision {}",
            start.elapsed(),
            result.decision.as_str()
        );
        Ok(result)
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn count_summary_is_formatted() {
        let response: KairoResponse = serde_json::from_str(
            r#"{"decision":"WARN","decision_reason":"Medium findings","risk_score":5.5,
                "summary":{"total":3,"critical":0,"high":1,"medium":2}}"#,
        )
        .unwrap();
        let result = SecurityScanResult::from(response);
        assert_eq!(result.decision, ScanDecision::Warn);
        assert_eq!(result.summary, "Findings: total=3, critical=0, high=1, medium=2");
        assert_eq!(result.risk_score, 5.5);
    }

    #[test]
    fn missing_summary_falls_back_to_reason() {
        let response: KairoResponse =
            serde_json::from_str(r#"{"decision":"ALLOW","decision_reason":"Clean"}"#).unwrap();
        let result = SecurityScanResult::from(response);
        assert_eq!(result.summary, "Clean");
        assert_eq!(result.risk_score, 0.0);
    }

    #[test]
    fn unrecognized_decision_escalates() {
        let response: KairoResponse =
            serde_json::from_str(r#"{"decision":"MANUAL_REVIEW","summary":"odd"}"#).unwrap();
        let result = SecurityScanResult::from(response);
        assert_eq!(result.decision, ScanDecision::Escalate);
        assert_eq!(result.summary, "odd");
    }
}
