use std::time::Duration;

use crate::config::helpers::{optional_env, parse_env};
use crate::error::ConfigError;
use crate::settings::Settings;

/// Web gateway configuration.
#[derive(Debug, Clone)]
pub struct GatewayConfig {
    pub host: String,
    pub port: u16,
    /// Idle time after which a gateway session is dropped.
    pub session_idle_timeout: Duration,
}

impl GatewayConfig {
    pub(crate) fn resolve(settings: &Settings) -> Result<Self, ConfigError> {
        let host = optional_env("GATEWAY_HOST")?.unwrap_or_else(|| settings.gateway.host.clone());
        let port = parse_env("GATEWAY_PORT", "a valid port number")?
            .unwrap_or(settings.gateway.port);
        let idle_secs: u64 = parse_env("GATEWAY_SESSION_IDLE_SECS", "a positive integer")?
            .unwrap_or(settings.gateway.session_idle_secs);
        if idle_secs == 0 {
            return Err(ConfigError::InvalidValue {
                key: "GATEWAY_SESSION_IDLE_SECS".to_string(),
                message: "must be > 0".to_string(),
            });
        }
        Ok(Self {
            host,
            port,
            session_idle_timeout: Duration::from_secs(idle_secs),
        })
    }

    /// `host:port` for binding.
    pub fn bind_address(&self) -> String {
        format!("{}:{}", self.host, self.port)
    }
}
