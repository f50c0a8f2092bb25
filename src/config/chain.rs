use std::time::Duration;

use crate::config::helpers::{optional_env, parse_bool_env, parse_env, validate_url};
use crate::config::normalize_variant;
use crate::error::ConfigError;
use crate::gates::validate_address;
use crate::settings::Settings;

/// Where chain reads come from.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum ChainBackend {
    Rpc,
    Simulated,
}

impl ChainBackend {
    fn parse(value: &str, key: &str) -> Result<Self, ConfigError> {
        match normalize_variant(value).as_str() {
            "rpc" | "live" => Ok(Self::Rpc),
            "simulated" | "sim" | "demo" => Ok(Self::Simulated),
            other => Err(ConfigError::InvalidValue {
                key: key.to_string(),
                message: format!("unsupported backend '{other}', expected rpc or simulated"),
            }),
        }
    }

    pub fn as_str(self) -> &'static str {
        match self {
            Self::Rpc => "rpc",
            Self::Simulated => "simulated",
        }
    }
}

#[derive(Debug, Clone)]
pub struct ChainConfig {
    pub backend: ChainBackend,
    pub rpc_url: String,
    pub chain_id: u64,
    pub provider_timeout: Duration,
}

impl ChainConfig {
    pub(crate) fn resolve(settings: &Settings) -> Result<Self, ConfigError> {
        let backend = ChainBackend::parse(
            &optional_env("CHAIN_BACKEND")?.unwrap_or_else(|| settings.chain.backend.clone()),
            "CHAIN_BACKEND",
        )?;

        let rpc_url = optional_env("RPC_URL")?.unwrap_or_else(|| settings.chain.rpc_url.clone());
        validate_url("RPC_URL", &rpc_url)?;

        let chain_id = parse_env("CHAIN_ID", "a positive integer")?
            .unwrap_or(settings.chain.chain_id);
        if chain_id == 0 {
            return Err(ConfigError::InvalidValue {
                key: "CHAIN_ID".to_string(),
                message: "must be > 0".to_string(),
            });
        }

        let timeout_ms: u64 = parse_env("PROVIDER_TIMEOUT_MS", "a positive integer")?
            .unwrap_or(settings.chain.provider_timeout_ms);
        if timeout_ms == 0 {
            return Err(ConfigError::InvalidValue {
                key: "PROVIDER_TIMEOUT_MS".to_string(),
                message: "must be > 0".to_string(),
            });
        }

        Ok(Self {
            backend,
            rpc_url,
            chain_id,
            provider_timeout: Duration::from_millis(timeout_ms),
        })
    }
}

/// Dispatch configuration.
#[derive(Debug, Clone)]
pub struct SignerConfig {
    /// Checksummed node-managed account, when configured.
    pub address: Option<String>,
    pub simulate_transactions: bool,
    pub simulated_tx_delay: Duration,
}

impl SignerConfig {
    pub(crate) fn resolve(settings: &Settings) -> Result<Self, ConfigError> {
        let address = optional_env("SIGNER_ADDRESS")?
            .or_else(|| settings.signer.address.clone())
            .map(|raw| {
                validate_address(&raw).ok_or_else(|| ConfigError::InvalidValue {
                    key: "SIGNER_ADDRESS".to_string(),
                    message: format!("'{raw}' is not a valid address"),
                })
            })
            .transpose()?;

        let simulate_transactions = parse_bool_env("SIMULATE_TRANSACTIONS")?
            .unwrap_or(settings.signer.simulate_transactions);

        let delay_ms = parse_env("SIMULATED_TX_DELAY_MS", "a non-negative integer")?
            .unwrap_or(settings.signer.simulated_tx_delay_ms);

        Ok(Self {
            address,
            simulate_transactions,
            simulated_tx_delay: Duration::from_millis(delay_ms),
        })
    }

    /// Signer address when live dispatch is enabled.
    pub fn live_address(&self) -> Option<&str> {
        if self.simulate_transactions {
            None
        } else {
            self.address.as_deref()
        }
    }
}
