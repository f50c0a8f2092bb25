//! Configuration for pyra.
//!
//! Settings are loaded with priority: env var > TOML config file > default.
//! `./.env` is loaded via dotenvy early in startup, so it behaves like real
//! env vars. API keys come from the environment only.

mod chain;
mod channels;
pub(crate) mod helpers;
mod providers;

use std::time::Duration;

use crate::error::ConfigError;
use crate::gates::GateSettings;
use crate::settings::Settings;

pub use self::chain::{ChainBackend, ChainConfig, SignerConfig};
pub use self::channels::GatewayConfig;
pub use self::providers::{ExplorerConfig, ProviderMode, ScannerConfig};

/// Main configuration.
#[derive(Debug, Clone)]
pub struct Config {
    pub chain: ChainConfig,
    pub signer: SignerConfig,
    pub explorer: ExplorerConfig,
    pub scanner: ScannerConfig,
    pub pipeline: PipelineConfig,
    pub gateway: GatewayConfig,
    pub log_format: LogFormat,
}

/// Log output format.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Default)]
pub enum LogFormat {
    #[default]
    Pretty,
    Json,
}

impl LogFormat {
    fn parse(value: &str, key: &str) -> Result<Self, ConfigError> {
        match normalize_variant(value).as_str() {
            "pretty" | "text" => Ok(Self::Pretty),
            "json" => Ok(Self::Json),
            other => Err(ConfigError::InvalidValue {
                key: key.to_string(),
                message: format!("unsupported format '{other}', expected pretty or json"),
            }),
        }
    }

    pub(crate) fn resolve(settings: &Settings) -> Result<Self, ConfigError> {
        Self::parse(
            &helpers::optional_env("LOG_FORMAT")?
                .unwrap_or_else(|| settings.logging.format.clone()),
            "LOG_FORMAT",
        )
    }

    /// Format from `LOG_FORMAT` alone, for use before config is loaded.
    /// Invalid values fall back to pretty.
    pub fn from_env() -> Self {
        Self::resolve(&Settings::default()).unwrap_or_default()
    }
}

/// Gate and naming options.
#[derive(Debug, Clone)]
pub struct PipelineConfig {
    pub naming_suffixes: Vec<String>,
}

impl PipelineConfig {
    pub(crate) fn resolve(settings: &Settings) -> Result<Self, ConfigError> {
        let naming_suffixes: Vec<String> = match helpers::optional_env("NAMING_SUFFIXES")? {
            Some(raw) => raw
                .split(',')
                .map(str::trim)
                .filter(|s| !s.is_empty())
                .map(str::to_string)
                .collect(),
            None => settings.pipeline.naming_suffixes.clone(),
        };
        if naming_suffixes.is_empty() {
            return Err(ConfigError::InvalidValue {
                key: "NAMING_SUFFIXES".to_string(),
                message: "must list at least one suffix".to_string(),
            });
        }
        Ok(Self { naming_suffixes })
    }
}

pub(crate) fn normalize_variant(value: &str) -> String {
    value.trim().to_ascii_lowercase().replace(['-', ' '], "_")
}

impl Config {
    /// Load configuration from environment variables and the default
    /// config file.
    pub fn from_env() -> Result<Self, ConfigError> {
        Self::from_env_with_toml(None)
    }

    /// Load from env with an optional TOML config file overlay.
    pub fn from_env_with_toml(toml_path: Option<&std::path::Path>) -> Result<Self, ConfigError> {
        crate::bootstrap::load_env();
        let mut settings = Settings::default();

        Self::apply_toml_overlay(&mut settings, toml_path)?;

        Self::build(&settings)
    }

    /// Load and merge a TOML config file into settings.
    ///
    /// If `explicit_path` is `Some`, loads from that path (errors are fatal).
    /// If `None`, tries the default path `~/.pyra/config.toml` (missing
    /// file is silently ignored).
    fn apply_toml_overlay(
        settings: &mut Settings,
        explicit_path: Option<&std::path::Path>,
    ) -> Result<(), ConfigError> {
        let path = explicit_path
            .map(std::path::PathBuf::from)
            .unwrap_or_else(Settings::default_toml_path);

        match Settings::load_toml(&path) {
            Ok(Some(toml_settings)) => {
                settings.merge_from(&toml_settings);
                tracing::debug!("Loaded TOML config from {}", path.display());
            }
            Ok(None) => {
                if explicit_path.is_some() {
                    return Err(ConfigError::ParseError(format!(
                        "Config file not found: {}",
                        path.display()
                    )));
                }
            }
            Err(e) => {
                if explicit_path.is_some() {
                    return Err(ConfigError::ParseError(format!(
                        "Failed to load config file {}: {}",
                        path.display(),
                        e
                    )));
                }
                tracing::warn!("Failed to load default config file: {}", e);
            }
        }
        Ok(())
    }

    /// Build config from settings.
    pub(crate) fn build(settings: &Settings) -> Result<Self, ConfigError> {
        let config = Self {
            chain: ChainConfig::resolve(settings)?,
            signer: SignerConfig::resolve(settings)?,
            explorer: ExplorerConfig::resolve(settings)?,
            scanner: ScannerConfig::resolve(settings)?,
            pipeline: PipelineConfig::resolve(settings)?,
            gateway: GatewayConfig::resolve(settings)?,
            log_format: LogFormat::resolve(settings)?,
        };

        if !config.signer.simulate_transactions {
            if config.signer.address.is_none() {
                tracing::warn!(
                    "SIMULATE_TRANSACTIONS=false but no SIGNER_ADDRESS is set; transfers stay simulated"
                );
            } else if config.chain.backend == ChainBackend::Simulated {
                tracing::warn!(
                    "SIMULATE_TRANSACTIONS=false needs CHAIN_BACKEND=rpc; transfers stay simulated"
                );
            }
        }
        Ok(config)
    }

    pub fn gate_settings(&self) -> GateSettings {
        GateSettings {
            naming_suffixes: self.pipeline.naming_suffixes.clone(),
            timeout: self.chain.provider_timeout,
        }
    }

    /// True when transfers will actually be signed and sent.
    pub fn live_dispatch(&self) -> bool {
        self.chain.backend == ChainBackend::Rpc && self.signer.live_address().is_some()
    }

    pub fn simulated_tx_delay(&self) -> Duration {
        self.signer.simulated_tx_delay
    }
}
