//! Process bootstrap: env files and the tracing subscriber.
//!
//! File: `~/.pyra/.env` (standard dotenvy format)

use std::path::PathBuf;

use tracing_subscriber::EnvFilter;
use tracing_subscriber::layer::SubscriberExt;
use tracing_subscriber::util::SubscriberInitExt;

use crate::config::LogFormat;

const DEFAULT_FILTER: &str = "pyra=info";

/// Path to the pyra-specific `.env` file: `~/.pyra/.env`.
pub fn pyra_env_path() -> PathBuf {
    dirs::home_dir()
        .unwrap_or_else(|| PathBuf::from("."))
        .join(".pyra")
        .join(".env")
}

/// Load `./.env`, then `~/.pyra/.env`.
///
/// dotenvy never overwrites existing env vars, so the effective priority is:
///
///   explicit env vars > `./.env` > `~/.pyra/.env`
pub fn load_env() {
    let _ = dotenvy::dotenv();
    let path = pyra_env_path();
    if path.exists() {
        let _ = dotenvy::from_path(&path);
    }
}

/// Install the global subscriber. `RUST_LOG` wins over the default filter.
///
/// Safe to call more than once; later calls are ignored.
pub fn init_tracing(format: LogFormat) {
    let filter =
        EnvFilter::try_from_default_env().unwrap_or_else(|_| EnvFilter::new(DEFAULT_FILTER));

    let result = match format {
        LogFormat::Json => tracing_subscriber::registry()
            .with(filter)
            .with(tracing_subscriber::fmt::layer().json().with_target(true))
            .try_init(),
        LogFormat::Pretty => tracing_subscriber::registry()
            .with(filter)
            .with(tracing_subscriber::fmt::layer().with_target(false))
            .try_init(),
    };
    if let Err(e) = result {
        tracing::debug!("Tracing already initialised: {}", e);
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use tempfile::tempdir;

    #[test]
    fn test_pyra_env_path() {
        let path = pyra_env_path();
        assert!(path.ends_with(".pyra/.env"));
    }

    #[test]
    fn test_env_file_is_dotenv_format() {
        let dir = tempdir().unwrap();
        let env_path = dir.path().join(".env");
        std::fs::write(
            &env_path,
            "RPC_URL=\"https://rpc.sepolia.org\"\nCHAIN_ID=11155111\n",
        )
        .unwrap();

        let parsed: Vec<(String, String)> = dotenvy::from_path_iter(&env_path)
            .unwrap()
            .filter_map(|r| r.ok())
            .collect();
        assert_eq!(
            parsed,
            vec![
                ("RPC_URL".to_string(), "https://rpc.sepolia.org".to_string()),
                ("CHAIN_ID".to_string(), "11155111".to_string()),
            ]
        );
    }

    #[test]
    fn init_tracing_twice_is_harmless() {
        init_tracing(LogFormat::Pretty);
        init_tracing(LogFormat::Json);
    }
}
