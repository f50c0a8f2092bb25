//! External collaborators consumed by the gates and the dispatcher.
//!
//! Each collaborator is a trait with a live and a simulated implementation.
//! The concrete set is chosen once at startup in [`Providers::from_config`];
//! gate logic never branches on which one it got.

pub mod explorer;
pub mod health;
pub mod kairo;
pub mod naming;
pub mod rpc;
pub mod scanner;
pub mod simulated;

use std::sync::Arc;

use async_trait::async_trait;
use serde::Serialize;

use crate::config::{ChainBackend, Config};
use crate::error::ProviderError;

pub use self::explorer::EtherscanRegistry;
pub use self::kairo::KairoScanner;
pub use self::naming::{EnsResolver, namehash};
pub use self::rpc::{RpcChain, RpcClient, RpcSigner};
pub use self::scanner::{ScanDecision, SecurityScanResult};
pub use self::simulated::{SimulatedChain, SimulatedScanner, SimulatedSourceRegistry};

/// Source-registry response for one address.
#[derive(Debug, Clone, PartialEq, Eq, Serialize)]
pub struct ContractSource {
    pub verified: bool,
    pub source_code: String,
    pub name: String,
}

impl ContractSource {
    pub fn unverified() -> Self {
        Self {
            verified: false,
            source_code: String::new(),
            name: String::new(),
        }
    }
}

/// Outcome of a signer submission.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct SendOutcome {
    pub hash: String,
    pub confirmed: bool,
}

/// Resolves human-readable names to addresses.
#[async_trait]
pub trait NameResolver: Send + Sync {
    /// `Ok(None)` when the name has no address record.
    async fn resolve(&self, name: &str) -> Result<Option<String>, ProviderError>;
}

/// Read-only chain access.
#[async_trait]
pub trait ChainReader: Send + Sync {
    fn name(&self) -> &str;

    async fn chain_id(&self) -> Result<u64, ProviderError>;

    async fn block_number(&self) -> Result<u64, ProviderError>;

    /// True when the address has deployed bytecode.
    async fn has_code(&self, address: &str) -> Result<bool, ProviderError>;

    /// Balance in wei.
    async fn balance(&self, address: &str) -> Result<u128, ProviderError>;
}

#[async_trait]
pub trait SourceRegistry: Send + Sync {
    fn name(&self) -> &str;

    async fn fetch_source(&self, address: &str) -> Result<ContractSource, ProviderError>;
}

#[async_trait]
pub trait SecurityScanner: Send + Sync {
    fn name(&self) -> &str;

    /// Analyze contract source. Transport failures surface as `Err`; the
    /// scan gate turns them into an offline decision.
    async fn analyze(&self, source_code: &str) -> Result<SecurityScanResult, ProviderError>;
}

/// Account that can move funds.
#[async_trait]
pub trait Signer: Send + Sync {
    fn address(&self) -> &str;

    /// Balance in wei.
    async fn balance(&self, address: &str) -> Result<u128, ProviderError>;

    /// Submit a native transfer of `value_wei` and wait for inclusion.
    async fn send(&self, to: &str, value_wei: u128) -> Result<SendOutcome, ProviderError>;
}

/// The collaborator set used by one runtime.
#[derive(Clone)]
pub struct Providers {
    pub resolver: Arc<dyn NameResolver>,
    pub chain: Arc<dyn ChainReader>,
    pub sources: Arc<dyn SourceRegistry>,
    pub scanner: Arc<dyn SecurityScanner>,
    /// `None` selects simulated dispatch.
    pub signer: Option<Arc<dyn Signer>>,
}

impl std::fmt::Debug for Providers {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("Providers")
            .field("sources", &self.sources.name())
            .field("scanner", &self.scanner.name())
            .field("signer", &self.signer.as_ref().map(|s| s.address().to_string()))
            .finish()
    }
}

impl Providers {
    /// Build the provider set described by the configuration.
    pub fn from_config(config: &Config) -> Result<Self, ProviderError> {
        let timeout = config.chain.provider_timeout;

        let rpc = match config.chain.backend {
            ChainBackend::Rpc => Some(Arc::new(RpcClient::new(&config.chain.rpc_url, timeout)?)),
            ChainBackend::Simulated => None,
        };

        let (resolver, chain): (Arc<dyn NameResolver>, Arc<dyn ChainReader>) = match &rpc {
            Some(client) => (
                Arc::new(EnsResolver::new(client.clone())),
                Arc::new(RpcChain::new(client.clone())),
            ),
            None => {
                let chain = Arc::new(SimulatedChain::demo(config.chain.chain_id));
                (chain.clone(), chain)
            }
        };

        let sources: Arc<dyn SourceRegistry> = if config.explorer.use_live() {
            Arc::new(EtherscanRegistry::new(
                &config.explorer.api_url,
                config.explorer.api_key.clone(),
                timeout,
            )?)
        } else {
            Arc::new(SimulatedSourceRegistry::new())
        };

        let scanner: Arc<dyn SecurityScanner> = match (config.scanner.use_live(), &config.scanner.api_key) {
            (true, Some(key)) => Arc::new(KairoScanner::new(
                &config.scanner.api_url,
                key.clone(),
                &config.scanner.severity_threshold,
                timeout,
            )?),
            _ => Arc::new(SimulatedScanner::new()),
        };

        let signer: Option<Arc<dyn Signer>> = match (&rpc, config.signer.live_address()) {
            (Some(client), Some(address)) => {
                Some(Arc::new(RpcSigner::new(client.clone(), address)))
            }
            _ => None,
        };

        tracing::info!(
            chain = ?config.chain.backend,
            sources = sources.name(),
            scanner = scanner.name(),
            simulated_dispatch = signer.is_none(),
            "Providers configured"
        );

        Ok(Self {
            resolver,
            chain,
            sources,
            scanner,
            signer,
        })
    }

    /// Fully simulated set; used by tests and offline demos.
    pub fn simulated(chain_id: u64) -> Self {
        let chain = Arc::new(SimulatedChain::demo(chain_id));
        Self {
            resolver: chain.clone(),
            chain,
            sources: Arc::new(SimulatedSourceRegistry::new()),
            scanner: Arc::new(SimulatedScanner::new()),
            signer: None,
        }
    }
}

/// Format a wei amount as ether with trailing zeros trimmed.
pub fn format_ether(wei: u128) -> String {
    let whole = wei / 1_000_000_000_000_000_000;
    let frac = wei % 1_000_000_000_000_000_000;
    if frac == 0 {
        return whole.to_string();
    }
    let frac = format!("{frac:018}");
    format!("{}.{}", whole, frac.trim_end_matches('0'))
}
