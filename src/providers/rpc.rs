//! Minimal Ethereum JSON-RPC client plus the chain reader and node-managed
//! signer built on it.

use std::sync::Arc;
use std::sync::atomic::{AtomicU64, Ordering};
use std::time::Duration;

use async_trait::async_trait;
use serde::Deserialize;
use serde::de::DeserializeOwned;
use serde_json::{Value, json};

use crate::encoding::{parse_quantity, to_quantity};
use crate::error::ProviderError;
use crate::providers::{ChainReader, SendOutcome, Signer};

const PROVIDER: &str = "rpc";
const RECEIPT_POLL_INTERVAL: Duration = Duration::from_secs(1);
const RECEIPT_POLL_ATTEMPTS: u32 = 60;

#[derive(Debug, Deserialize)]
struct RpcResponse {
    #[serde(default)]
    result: Option<Value>,
    #[serde(default)]
    error: Option<RpcErrorBody>,
}

#[derive(Debug, Deserialize)]
struct RpcErrorBody {
    code: i64,
    message: String,
}

/// JSON-RPC 2.0 over HTTP.
#[derive(Debug)]
pub struct RpcClient {
    http: reqwest::Client,
    url: String,
    timeout: Duration,
    next_id: AtomicU64,
}

impl RpcClient {
    pub fn new(url: &str, timeout: Duration) -> Result<Self, ProviderError> {
        url::Url::parse(url)
            .map_err(|e| ProviderError::request_failed(PROVIDER, format!("invalid RPC URL: {e}")))?;
        let http = reqwest::Client::builder()
            .timeout(timeout)
            .build()
            .map_err(|e| ProviderError::request_failed(PROVIDER, e))?;
        Ok(Self {
            http,
            url: url.to_string(),
            timeout,
            next_id: AtomicU64::new(1),
        })
    }

    pub fn url(&self) -> &str {
        &self.url
    }

    /// Call `method` and decode its `result`. A JSON `null` result decodes
    /// into `Option::None` when `T` is an option.
    pub async fn call<T: DeserializeOwned>(
        &self,
        method: &str,
        params: Value,
    ) -> Result<T, ProviderError> {
        let id = self.next_id.fetch_add(1, Ordering::Relaxed);
        let body = json!({
            "jsonrpc": "2.0",
            "id": id,
            "method": method,
            "params": params,
        });

        let response = self
            .http
            .post(&self.url)
            .json(&body)
            .send()
            .await
            .map_err(|e| {
                if e.is_timeout() {
                    ProviderError::Timeout {
                        provider: PROVIDER.to_string(),
                        timeout: self.timeout,
                    }
                } else {
                    ProviderError::request_failed(PROVIDER, e)
                }
            })?;

        let status = response.status();
        if !status.is_success() {
            return Err(ProviderError::HttpStatus {
                provider: PROVIDER.to_string(),
                status: status.as_u16(),
            });
        }

        let envelope: RpcResponse = response
            .json()
            .await
            .map_err(|e| ProviderError::invalid_response(PROVIDER, e))?;

        if let Some(error) = envelope.error {
            return Err(ProviderError::Rpc {
                provider: PROVIDER.to_string(),
                code: error.code,
                message: error.message,
            });
        }

        serde_json::from_value(envelope.result.unwrap_or(Value::Null))
            .map_err(|e| ProviderError::invalid_response(PROVIDER, format!("{method}: {e}")))
    }

    pub async fn quantity(&self, method: &str, params: Value) -> Result<u128, ProviderError> {
        let raw: String = self.call(method, params).await?;
        parse_quantity(&raw).ok_or_else(|| {
            ProviderError::invalid_response(PROVIDER, format!("{method}: bad quantity '{raw}'"))
        })
    }

    pub async fn get_balance(&self, address: &str) -> Result<u128, ProviderError> {
        self.quantity("eth_getBalance", json!([address, "latest"])).await
    }
}

/// Chain reader backed by a JSON-RPC node.
#[derive(Debug, Clone)]
pub struct RpcChain {
    client: Arc<RpcClient>,
}

impl RpcChain {
    pub fn new(client: Arc<RpcClient>) -> Self {
        Self { client }
    }
}

#[async_trait]
impl ChainReader for RpcChain {
    fn name(&self) -> &str {
        PROVIDER
    }

    async fn chain_id(&self) -> Result<u64, ProviderError> {
        let id = self.client.quantity("eth_chainId", json!([])).await?;
        u64::try_from(id).map_err(|e| ProviderError::invalid_response(PROVIDER, e))
    }

    async fn block_number(&self) -> Result<u64, ProviderError> {
        let block = self.client.quantity("eth_blockNumber", json!([])).await?;
        u64::try_from(block).map_err(|e| ProviderError::invalid_response(PROVIDER, e))
    }

    async fn has_code(&self, address: &str) -> Result<bool, ProviderError> {
        let code: String = self
            .client
            .call("eth_getCode", json!([address, "latest"]))
            .await?;
        let body = crate::encoding::strip_hex_prefix(&code);
        Ok(!body.is_empty() && body.bytes().any(|b| b != b'0'))
    }

    async fn balance(&self, address: &str) -> Result<u128, ProviderError> {
        self.client.get_balance(address).await
    }
}

#[derive(Debug, Deserialize)]
struct TransactionReceiptBody {
    #[serde(default)]
    status: Option<String>,
}

/// Signer for an account the node manages (`eth_sendTransaction`).
///
/// Key material never enters this process.
#[derive(Debug, Clone)]
pub struct RpcSigner {
    client: Arc<RpcClient>,
    address: String,
}

impl RpcSigner {
    pub fn new(client: Arc<RpcClient>, address: impl Into<String>) -> Self {
        Self {
            client,
            address: address.into(),
        }
    }

    async fn wait_for_receipt(&self, hash: &str) -> Result<bool, ProviderError> {
        for _ in 0..RECEIPT_POLL_ATTEMPTS {
            let receipt: Option<TransactionReceiptBody> = self
                .client
                .call("eth_getTransactionReceipt", json!([hash]))
                .await?;
            if let Some(receipt) = receipt {
                let ok = receipt
                    .status
                    .as_deref()
                    .and_then(parse_quantity)
                    .map(|s| s == 1)
                    .unwrap_or(false);
                return Ok(ok);
            }
            tokio::time::sleep(RECEIPT_POLL_INTERVAL).await;
        }
        tracing::warn!("No receipt for {} after {} polls", hash, RECEIPT_POLL_ATTEMPTS);
        Ok(false)
    }
}

#[async_trait]
impl Signer for RpcSigner {
    fn address(&self) -> &str {
        &self.address
    }

    async fn balance(&self, address: &str) -> Result<u128, ProviderError> {
        self.client.get_balance(address).await
    }

    async fn send(&self, to: &str, value_wei: u128) -> Result<SendOutcome, ProviderError> {
        let hash: String = self
            .client
            .call(
                "eth_sendTransaction",
                json!([{
                    "from": self.address,
                    "to": to,
                    "value": to_quantity(value_wei),
                }]),
            )
            .await?;
        tracing::info!("Submitted transaction {} to {}", hash, to);

        // Submitted: from here on the hash must reach the caller.
        let confirmed = match self.wait_for_receipt(&hash).await {
            Ok(confirmed) => confirmed,
            Err(e) => {
                tracing::warn!("Receipt lookup for {} failed: {}", hash, e);
                false
            }
        };
        Ok(SendOutcome { hash, confirmed })
    }
}
