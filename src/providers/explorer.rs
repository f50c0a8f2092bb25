//! Etherscan-compatible source registry.

use std::time::Duration;

use async_trait::async_trait;
use secrecy::{ExposeSecret, SecretString};
use serde::Deserialize;
use serde_json::Value;

use crate::error::ProviderError;
use crate::providers::{ContractSource, SourceRegistry};

const PROVIDER: &str = "etherscan";

#[derive(Debug, Deserialize)]
struct ExplorerResponse {
    status: String,
    #[serde(default)]
    message: String,
    #[serde(default)]
    result: Value,
}

#[derive(Debug, Deserialize)]
struct SourceEntry {
    #[serde(rename = "SourceCode", default)]
    source_code: String,
    #[serde(rename = "ContractName", default)]
    contract_name: String,
}

#[derive(Debug)]
pub struct EtherscanRegistry {
    http: reqwest::Client,
    api_url: String,
    api_key: Option<SecretString>,
}

impl EtherscanRegistry {
    pub fn new(
        api_url: &str,
        api_key: Option<SecretString>,
        timeout: Duration,
    ) -> Result<Self, ProviderError> {
        url::Url::parse(api_url).map_err(|e| {
            ProviderError::request_failed(PROVIDER, format!("invalid explorer URL: {e}"))
        })?;
        let http = reqwest::Client::builder()
            .timeout(timeout)
            .build()
            .map_err(|e| ProviderError::request_failed(PROVIDER, e))?;
        Ok(Self {
            http,
            api_url: api_url.to_string(),
            api_key,
        })
    }

    pub fn api_url(&self) -> &str {
        &self.api_url
    }
}

/// Interpret a `getsourcecode` response body.
fn parse_source_response(body: ExplorerResponse) -> Result<ContractSource, ProviderError> {
    if body.status != "1" {
        tracing::debug!("Explorer returned status {}: {}", body.status, body.message);
        return Ok(ContractSource::unverified());
    }

    let entries: Vec<SourceEntry> = serde_json::from_value(body.result)
        .map_err(|e| ProviderError::invalid_response(PROVIDER, e))?;
    let Some(entry) = entries.into_iter().next() else {
        return Ok(ContractSource::unverified());
    };

    Ok(ContractSource {
        verified: !entry.source_code.trim().is_empty(),
        source_code: entry.source_code,
        name: entry.contract_name,
    })
}

#[async_trait]
impl SourceRegistry for EtherscanRegistry {
    fn name(&self) -> &str {
        PROVIDER
    }

    async fn fetch_source(&self, address: &str) -> Result<ContractSource, ProviderError> {
        let mut query = vec![
            ("module", "contract"),
            ("action", "getsourcecode"),
            ("address", address),
        ];
        if let Some(key) = &self.api_key {
            query.push(("apikey", key.expose_secret()));
        }

        let response = self
            .http
            .get(&self.api_url)
            .query(&query)
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

        let body: ExplorerResponse = response
            .json()
            .await
            .map_err(|e| ProviderError::invalid_response(PROVIDER, e))?;
        parse_source_response(body)
    }
}
