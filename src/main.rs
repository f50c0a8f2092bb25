//! Pyra binary.

use std::sync::Arc;

use clap::Parser;

use pyra::app::App;
use pyra::bootstrap;
use pyra::channels::{GatewayState, ReplChannel, start_server};
use pyra::cli::{Cli, Command, run_doctor_command};
use pyra::config::{Config, LogFormat};

#[tokio::main]
async fn main() -> anyhow::Result<()> {
    bootstrap::load_env();
    bootstrap::init_tracing(LogFormat::from_env());

    let cli = Cli::parse();
    let config_path = cli.config.as_deref();

    if let Command::Doctor { strict } = cli.command() {
        return run_doctor_command(config_path, strict).await;
    }

    let config = Config::from_env_with_toml(config_path)?;
    let app = Arc::new(App::from_config(&config)?);
    tracing::info!(
        chain_id = config.chain.chain_id,
        backend = config.chain.backend.as_str(),
        live_dispatch = config.live_dispatch(),
        "Pyra starting"
    );

    match cli.command() {
        Command::Serve { bind } => {
            let bind = bind.unwrap_or_else(|| config.gateway.bind_address());
            let state = Arc::new(
                GatewayState::new(app).with_session_ttl(config.gateway.session_idle_timeout),
            );
            let addr = start_server(&bind, state.clone()).await?;
            println!("Gateway listening on http://{addr} (Ctrl+C to stop)");

            tokio::signal::ctrl_c().await?;
            state.shutdown().await;
        }
        Command::Repl => {
            ReplChannel::new(app).run().await?;
        }
        Command::Doctor { .. } => {}
    }

    Ok(())
}
