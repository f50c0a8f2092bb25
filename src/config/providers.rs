use secrecy::SecretString;

use crate::config::helpers::{optional_env, validate_url};
use crate::config::normalize_variant;
use crate::error::ConfigError;
use crate::settings::Settings;

/// Whether a provider talks to its live backend.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum ProviderMode {
    /// Live when credentials are present.
    Auto,
    Live,
    Simulated,
}

impl ProviderMode {
    fn parse(value: &str, key: &str) -> Result<Self, ConfigError> {
        match normalize_variant(value).as_str() {
            "auto" => Ok(Self::Auto),
            "live" => Ok(Self::Live),
            "simulated" | "sim" | "demo" => Ok(Self::Simulated),
            other => Err(ConfigError::InvalidValue {
                key: key.to_string(),
                message: format!("unsupported mode '{other}', expected auto, live or simulated"),
            }),
        }
    }
}

/// Contract source registry (Etherscan-compatible).
#[derive(Debug, Clone)]
pub struct ExplorerConfig {
    pub mode: ProviderMode,
    pub api_url: String,
    pub api_key: Option<SecretString>,
}

impl ExplorerConfig {
    pub(crate) fn resolve(settings: &Settings) -> Result<Self, ConfigError> {
        let mode = ProviderMode::parse(
            &optional_env("SOURCE_PROVIDER")?
                .unwrap_or_else(|| settings.explorer.provider.clone()),
            "SOURCE_PROVIDER",
        )?;
        let api_url = optional_env("ETHERSCAN_API_URL")?
            .unwrap_or_else(|| settings.explorer.api_url.clone());
        validate_url("ETHERSCAN_API_URL", &api_url)?;

        Ok(Self {
            mode,
            api_url,
            api_key: optional_env("ETHERSCAN_API_KEY")?.map(SecretString::from),
        })
    }

    pub fn use_live(&self) -> bool {
        match self.mode {
            ProviderMode::Live => true,
            ProviderMode::Simulated => false,
            ProviderMode::Auto => self.api_key.is_some(),
        }
    }
}

/// Static analysis scanner (Kairo-compatible).
#[derive(Debug, Clone)]
pub struct ScannerConfig {
    pub mode: ProviderMode,
    pub api_url: String,
    pub api_key: Option<SecretString>,
    pub severity_threshold: String,
}

impl ScannerConfig {
    pub(crate) fn resolve(settings: &Settings) -> Result<Self, ConfigError> {
        let mode = ProviderMode::parse(
            &optional_env("SCAN_PROVIDER")?.unwrap_or_else(|| settings.scanner.provider.clone()),
            "SCAN_PROVIDER",
        )?;
        let api_url =
            optional_env("KAIRO_API_URL")?.unwrap_or_else(|| settings.scanner.api_url.clone());
        validate_url("KAIRO_API_URL", &api_url)?;

        let api_key = optional_env("KAIRO_API_KEY")?.map(SecretString::from);
        if mode == ProviderMode::Live && api_key.is_none() {
            return Err(ConfigError::MissingRequired {
                key: "KAIRO_API_KEY".to_string(),
                hint: "Set KAIRO_API_KEY or use SCAN_PROVIDER=simulated.".to_string(),
            });
        }

        let severity_threshold = normalize_variant(
            &optional_env("KAIRO_SEVERITY_THRESHOLD")?
                .unwrap_or_else(|| settings.scanner.severity_threshold.clone()),
        );
        if !matches!(
            severity_threshold.as_str(),
            "critical" | "high" | "medium" | "low"
        ) {
            return Err(ConfigError::InvalidValue {
                key: "KAIRO_SEVERITY_THRESHOLD".to_string(),
                message: format!(
                    "'{severity_threshold}' is not one of critical, high, medium, low"
                ),
            });
        }

        Ok(Self {
            mode,
            api_url,
            api_key,
            severity_threshold,
        })
    }

    pub fn use_live(&self) -> bool {
        match self.mode {
            ProviderMode::Live => true,
            ProviderMode::Simulated => false,
            ProviderMode::Auto => self.api_key.is_some(),
        }
    }
}
