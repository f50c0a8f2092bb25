//! User settings persistence.
//!
//! Stores user preferences in `~/.pyra/config.toml`. Settings are loaded with
//! env var > config.toml > default priority; secrets (API keys) are only
//! ever read from the environment.

use std::path::PathBuf;

use serde::{Deserialize, Serialize};

/// Settings file contents. Every section is optional in the file.
#[derive(Debug, Clone, Default, Serialize, Deserialize, PartialEq)]
pub struct Settings {
    #[serde(default)]
    pub chain: ChainSettings,

    #[serde(default)]
    pub signer: SignerSettings,

    #[serde(default)]
    pub explorer: ExplorerSettings,

    #[serde(default)]
    pub scanner: ScannerSettings,

    #[serde(default)]
    pub pipeline: PipelineSettings,

    #[serde(default)]
    pub gateway: GatewaySettings,

    #[serde(default)]
    pub logging: LoggingSettings,
}

/// Chain access settings.
#[derive(Debug, Clone, Serialize, Deserialize, PartialEq)]
pub struct ChainSettings {
    /// "rpc" or "simulated".
    #[serde(default = "default_chain_backend")]
    pub backend: String,

    #[serde(default = "default_rpc_url")]
    pub rpc_url: String,

    #[serde(default = "default_chain_id")]
    pub chain_id: u64,

    /// Upper bound on every external call, in milliseconds.
    #[serde(default = "default_provider_timeout_ms")]
    pub provider_timeout_ms: u64,
}

fn default_chain_backend() -> String {
    "simulated".to_string()
}

fn default_rpc_url() -> String {
    "https://rpc.sepolia.org".to_string()
}

fn default_chain_id() -> u64 {
    11_155_111
}

fn default_provider_timeout_ms() -> u64 {
    10_000
}

impl Default for ChainSettings {
    fn default() -> Self {
        Self {
            backend: default_chain_backend(),
            rpc_url: default_rpc_url(),
            chain_id: default_chain_id(),
            provider_timeout_ms: default_provider_timeout_ms(),
        }
    }
}

/// Dispatch settings.
#[derive(Debug, Clone, Serialize, Deserialize, PartialEq)]
pub struct SignerSettings {
    /// Node-managed account used for live transfers.
    #[serde(default)]
    pub address: Option<String>,

    #[serde(default = "default_true")]
    pub simulate_transactions: bool,

    #[serde(default = "default_simulated_tx_delay_ms")]
    pub simulated_tx_delay_ms: u64,
}

fn default_true() -> bool {
    true
}

fn default_simulated_tx_delay_ms() -> u64 {
    1_000
}

impl Default for SignerSettings {
    fn default() -> Self {
        Self {
            address: None,
            simulate_transactions: true,
            simulated_tx_delay_ms: default_simulated_tx_delay_ms(),
        }
    }
}

/// Source registry settings.
#[derive(Debug, Clone, Serialize, Deserialize, PartialEq)]
pub struct ExplorerSettings {
    /// "auto", "live" or "simulated".
    #[serde(default = "default_provider_mode")]
    pub provider: String,

    #[serde(default = "default_etherscan_api_url")]
    pub api_url: String,
}

fn default_provider_mode() -> String {
    "auto".to_string()
}

fn default_etherscan_api_url() -> String {
    "https://api-sepolia.etherscan.io/api".to_string()
}

impl Default for ExplorerSettings {
    fn default() -> Self {
        Self {
            provider: default_provider_mode(),
            api_url: default_etherscan_api_url(),
        }
    }
}

/// Security scanner settings.
#[derive(Debug, Clone, Serialize, Deserialize, PartialEq)]
pub struct ScannerSettings {
    /// "auto", "live" or "simulated".
    #[serde(default = "default_provider_mode")]
    pub provider: String,

    #[serde(default = "default_kairo_api_url")]
    pub api_url: String,

    #[serde(default = "default_severity_threshold")]
    pub severity_threshold: String,
}

fn default_kairo_api_url() -> String {
    "https://api.kairoaisec.com/v1/analyze".to_string()
}

fn default_severity_threshold() -> String {
    "high".to_string()
}

impl Default for ScannerSettings {
    fn default() -> Self {
        Self {
            provider: default_provider_mode(),
            api_url: default_kairo_api_url(),
            severity_threshold: default_severity_threshold(),
        }
    }
}

#[derive(Debug, Clone, Serialize, Deserialize, PartialEq)]
pub struct PipelineSettings {
    /// Target suffixes routed to name resolution.
    #[serde(default = "default_naming_suffixes")]
    pub naming_suffixes: Vec<String>,
}

fn default_naming_suffixes() -> Vec<String> {
    vec![".eth".to_string()]
}

impl Default for PipelineSettings {
    fn default() -> Self {
        Self {
            naming_suffixes: default_naming_suffixes(),
        }
    }
}

/// HTTP gateway settings.
#[derive(Debug, Clone, Serialize, Deserialize, PartialEq)]
pub struct GatewaySettings {
    #[serde(default = "default_gateway_host")]
    pub host: String,

    #[serde(default = "default_gateway_port")]
    pub port: u16,

    /// Seconds a gateway session may sit idle before it is dropped.
    #[serde(default = "default_session_idle_secs")]
    pub session_idle_secs: u64,
}

fn default_gateway_host() -> String {
    "127.0.0.1".to_string()
}

fn default_gateway_port() -> u16 {
    3000
}

fn default_session_idle_secs() -> u64 {
    30 * 60
}

impl Default for GatewaySettings {
    fn default() -> Self {
        Self {
            host: default_gateway_host(),
            port: default_gateway_port(),
            session_idle_secs: default_session_idle_secs(),
        }
    }
}

#[derive(Debug, Clone, Serialize, Deserialize, PartialEq)]
pub struct LoggingSettings {
    /// "pretty" or "json".
    #[serde(default = "default_log_format")]
    pub format: String,
}

fn default_log_format() -> String {
    "pretty".to_string()
}

impl Default for LoggingSettings {
    fn default() -> Self {
        Self {
            format: default_log_format(),
        }
    }
}

impl Settings {
    /// Default TOML config file path (~/.pyra/config.toml).
    pub fn default_toml_path() -> PathBuf {
        dirs::home_dir()
            .unwrap_or_else(|| PathBuf::from("."))
            .join(".pyra")
            .join("config.toml")
    }

    /// Load settings from a TOML file.
    ///
    /// Returns `None` if the file doesn't exist. Returns an error only
    /// if the file exists but can't be parsed.
    pub fn load_toml(path: &std::path::Path) -> Result<Option<Self>, String> {
        let data = match std::fs::read_to_string(path) {
            Ok(d) => d,
            Err(e) if e.kind() == std::io::ErrorKind::NotFound => return Ok(None),
            Err(e) => return Err(format!("failed to read {}: {}", path.display(), e)),
        };

        let settings: Self = toml::from_str(&data)
            .map_err(|e| format!("invalid TOML in {}: {}", path.display(), e))?;
        Ok(Some(settings))
    }

    /// Merge values from `other` into `self`, preferring `other` for
    /// fields that differ from the default.
    pub fn merge_from(&mut self, other: &Self) {
        let default_json = match serde_json::to_value(Self::default()) {
            Ok(v) => v,
            Err(_) => return,
        };
        let other_json = match serde_json::to_value(other) {
            Ok(v) => v,
            Err(_) => return,
        };
        let mut self_json = match serde_json::to_value(&*self) {
            Ok(v) => v,
            Err(_) => return,
        };

        merge_non_default(&mut self_json, &other_json, &default_json);

        if let Ok(merged) = serde_json::from_value(self_json) {
            *self = merged;
        }
    }
}

/// Recursively merge `other` into `target`, but only for fields where
/// `other` differs from `defaults`.
fn merge_non_default(
    target: &mut serde_json::Value,
    other: &serde_json::Value,
    defaults: &serde_json::Value,
) {
    match (target, other, defaults) {
        (
            serde_json::Value::Object(t),
            serde_json::Value::Object(o),
            serde_json::Value::Object(d),
        ) => {
            for (key, other_val) in o {
                let default_val = d.get(key).cloned().unwrap_or(serde_json::Value::Null);
                if let Some(target_val) = t.get_mut(key) {
                    merge_non_default(target_val, other_val, &default_val);
                } else if other_val != &default_val {
                    t.insert(key.clone(), other_val.clone());
                }
            }
        }
        (target, other, defaults) => {
            if other != defaults {
                *target = other.clone();
            }
        }
    }
}
