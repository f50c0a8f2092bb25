//! Connectivity probes used by startup and `pyra doctor`.

use std::future::Future;
use std::time::Duration;

use serde::Serialize;

use crate::error::ProviderError;
use crate::providers::{Providers, ScanDecision, format_ether};

/// Trivial contract sent to the scanner to confirm it answers.
const SCANNER_PING_SOURCE: &str = "contract Ping { function noop() public {} }";

/// Address looked up on the explorer; any well-known contract works.
const EXPLORER_PING_ADDRESS: &str = crate::providers::naming::ENS_REGISTRY;

#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize)]
#[serde(rename_all = "snake_case")]
pub enum HealthState {
    Healthy,
    /// Provider is the offline stand-in.
    Simulated,
    /// Reachable but not usable as configured.
    Degraded,
    Unreachable,
    Timeout,
}

impl HealthState {
    pub fn as_str(self) -> &'static str {
        match self {
            Self::Healthy => "healthy",
            Self::Simulated => "simulated",
            Self::Degraded => "degraded",
            Self::Unreachable => "unreachable",
            Self::Timeout => "timeout",
        }
    }

    pub fn is_healthy(self) -> bool {
        matches!(self, Self::Healthy | Self::Simulated)
    }
}

/// Probe result for one collaborator.
#[derive(Debug, Clone, Serialize)]
pub struct ProviderHealth {
    pub name: &'static str,
    pub provider: String,
    pub state: HealthState,
    pub detail: String,
}

impl ProviderHealth {
    pub fn is_healthy(&self) -> bool {
        self.state.is_healthy()
    }
}

async fn bounded<T>(
    timeout: Duration,
    fut: impl Future<Output = Result<T, ProviderError>>,
) -> Result<T, (HealthState, String)> {
    match tokio::time::timeout(timeout, fut).await {
        Ok(Ok(value)) => Ok(value),
        Ok(Err(ProviderError::Timeout { .. })) | Err(_) => Err((
            HealthState::Timeout,
            format!("no response within {}ms", timeout.as_millis()),
        )),
        Ok(Err(e)) => Err((HealthState::Unreachable, e.to_string())),
    }
}

/// Chain id and head block. Flags a chain id different from the one
/// configured.
pub async fn probe_chain(
    providers: &Providers,
    expected_chain_id: u64,
    timeout: Duration,
) -> ProviderHealth {
    let result = async {
        let chain_id = bounded(timeout, providers.chain.chain_id()).await?;
        let block = bounded(timeout, providers.chain.block_number()).await?;
        Ok::<_, (HealthState, String)>((chain_id, block))
    }
    .await;

    let (state, detail) = match result {
        Ok((chain_id, _)) if chain_id != expected_chain_id => (
            HealthState::Degraded,
            format!("chain id {chain_id}, expected {expected_chain_id}"),
        ),
        Ok((chain_id, block)) => (
            HealthState::Healthy,
            format!("chain id {chain_id}, block {block}"),
        ),
        Err((state, detail)) => (state, detail),
    };

    ProviderHealth {
        name: "chain",
        provider: providers.chain.name().to_string(),
        state,
        detail,
    }
}

/// Signer balance. Simulated dispatch reports as simulated.
pub async fn probe_signer(providers: &Providers, timeout: Duration) -> ProviderHealth {
    let Some(signer) = &providers.signer else {
        return ProviderHealth {
            name: "signer",
            provider: "simulated".to_string(),
            state: HealthState::Simulated,
            detail: "transactions are simulated".to_string(),
        };
    };

    let (state, detail) = match bounded(timeout, signer.balance(signer.address())).await {
        Ok(0) => (
            HealthState::Degraded,
            format!("{} holds 0 ETH", signer.address()),
        ),
        Ok(wei) => (
            HealthState::Healthy,
            format!("{} holds {} ETH", signer.address(), format_ether(wei)),
        ),
        Err((state, detail)) => (state, detail),
    };

    ProviderHealth {
        name: "signer",
        provider: signer.address().to_string(),
        state,
        detail,
    }
}

pub async fn probe_explorer(providers: &Providers, timeout: Duration) -> ProviderHealth {
    let provider = providers.sources.name().to_string();
    if provider == "simulated" {
        return ProviderHealth {
            name: "explorer",
            provider,
            state: HealthState::Simulated,
            detail: "using built-in source fixtures".to_string(),
        };
    }

    let (state, detail) = match bounded(
        timeout,
        providers.sources.fetch_source(EXPLORER_PING_ADDRESS),
    )
    .await
    {
        Ok(source) if source.verified => (HealthState::Healthy, "source lookup ok".to_string()),
        Ok(_) => (
            HealthState::Degraded,
            "explorer answered but returned no source (check the API key)".to_string(),
        ),
        Err((state, detail)) => (state, detail),
    };

    ProviderHealth {
        name: "explorer",
        provider,
        state,
        detail,
    }
}

pub async fn probe_scanner(providers: &Providers, timeout: Duration) -> ProviderHealth {
    let provider = providers.scanner.name().to_string();
    if provider == "simulated" {
        return ProviderHealth {
            name: "scanner",
            provider,
            state: HealthState::Simulated,
            detail: "using keyword rules".to_string(),
        };
    }

    let (state, detail) = match bounded(timeout, providers.scanner.analyze(SCANNER_PING_SOURCE))
        .await
    {
        Ok(result) if result.decision == ScanDecision::Offline => {
            (HealthState::Unreachable, result.reason)
        }
        Ok(result) => (
            HealthState::Healthy,
            format!("ping decision {}", result.decision.as_str()),
        ),
        Err((state, detail)) => (state, detail),
    };

    ProviderHealth {
        name: "scanner",
        provider,
        state,
        detail,
    }
}

/// Run every probe in order.
pub async fn probe_all(
    providers: &Providers,
    expected_chain_id: u64,
    timeout: Duration,
) -> Vec<ProviderHealth> {
    vec![
        probe_chain(providers, expected_chain_id, timeout).await,
        probe_signer(providers, timeout).await,
        probe_explorer(providers, timeout).await,
        probe_scanner(providers, timeout).await,
    ]
}
