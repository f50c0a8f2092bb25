//! ENS resolution through the registry contract.

use std::sync::Arc;

use async_trait::async_trait;
use serde_json::json;

use crate::encoding::{decode_hex, keccak256, to_hex};
use crate::error::ProviderError;
use crate::providers::{NameResolver, RpcClient};

/// ENS registry address, identical on mainnet and the public testnets.
pub const ENS_REGISTRY: &str = "0x00000000000C2E074eC69A0dFb2997BA6C7d2e1e";

/// `resolver(bytes32)`
const RESOLVER_SELECTOR: &str = "0178b8bf";
/// `addr(bytes32)`
const ADDR_SELECTOR: &str = "3b3b57de";

/// EIP-137 namehash of a dot-separated name.
pub fn namehash(name: &str) -> [u8; 32] {
    let mut node = [0u8; 32];
    let normalized = name.trim().trim_end_matches('.').to_lowercase();
    if normalized.is_empty() {
        return node;
    }
    for label in normalized.rsplit('.') {
        let mut buf = [0u8; 64];
        buf[..32].copy_from_slice(&node);
        buf[32..].copy_from_slice(&keccak256(label.as_bytes()));
        node = keccak256(&buf);
    }
    node
}

/// Extract the trailing 20-byte address from a 32-byte ABI word. Returns
/// `None` for the zero address.
fn word_to_address(raw: &str) -> Option<String> {
    let bytes = decode_hex(raw)?;
    if bytes.len() < 32 {
        return None;
    }
    let address = &bytes[12..32];
    if address.iter().all(|b| *b == 0) {
        return None;
    }
    Some(format!("0x{}", to_hex(address)))
}

#[derive(Debug, Clone)]
pub struct EnsResolver {
    client: Arc<RpcClient>,
    registry: String,
}

impl EnsResolver {
    pub fn new(client: Arc<RpcClient>) -> Self {
        Self {
            client,
            registry: ENS_REGISTRY.to_string(),
        }
    }

    async fn eth_call(
        &self,
        to: &str,
        selector: &str,
        node: &[u8; 32],
    ) -> Result<String, ProviderError> {
        self.client
            .call(
                "eth_call",
                json!([{ "to": to, "data": format!("0x{}{}", selector, to_hex(node)) }, "latest"]),
            )
            .await
    }
}

#[async_trait]
impl NameResolver for EnsResolver {
    async fn resolve(&self, name: &str) -> Result<Option<String>, ProviderError> {
        let node = namehash(name);

        let resolver = self.eth_call(&self.registry, RESOLVER_SELECTOR, &node).await?;
        let Some(resolver) = word_to_address(&resolver) else {
            tracing::debug!("No resolver registered for {}", name);
            return Ok(None);
        };

        let address = self.eth_call(&resolver, ADDR_SELECTOR, &node).await?;
        Ok(word_to_address(&address))
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn namehash_matches_published_vectors() {
        assert_eq!(namehash(""), [0u8; 32]);
        assert_eq!(
            to_hex(&namehash("eth")),
            "93cdeb708b7545dc668eb9280176169d1c33cfd8ed6f04690a0bcc88a93fc4ae"
        );
        assert_eq!(
            to_hex(&namehash("foo.eth")),
            "de9b09fd7c5f901e23a3f19fecc54828e9c848539801e86591bd9801b019f84f"
        );
        assert_eq!(namehash("Foo.ETH"), namehash("foo.eth"));
    }

    #[test]
    fn abi_word_decodes_to_address_or_none() {
        let word = format!("0x{}{}", "0".repeat(24), "d8da6bf26964af9d7eed9e03e53415d37aa96045");
        assert_eq!(
            word_to_address(&word).as_deref(),
            Some("0xd8da6bf26964af9d7eed9e03e53415d37aa96045")
        );
        assert_eq!(word_to_address(&format!("0x{}", "0".repeat(64))), None);
        assert_eq!(word_to_address("0x"), None);
    }
}
