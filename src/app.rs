//! Runtime wiring shared by the REPL and the HTTP gateway.

use std::sync::Arc;
use std::time::Duration;

use crate::config::Config;
use crate::error::ProviderError;
use crate::gates::GateSettings;
use crate::pipeline::{EventBroadcaster, Orchestrator};
use crate::providers::Providers;
use crate::tools::{AgentWallet, ToolRegistry, standard_registry};

/// Everything a front-end adapter needs to drive sessions.
#[derive(Debug)]
pub struct App {
    pub providers: Providers,
    pub orchestrator: Arc<Orchestrator>,
    pub tools: ToolRegistry,
    pub events: Arc<EventBroadcaster>,
    pub chain_id: u64,
}

impl App {
    pub fn from_config(config: &Config) -> Result<Self, ProviderError> {
        let providers = Providers::from_config(config)?;
        let wallet = AgentWallet {
            address: config.signer.address.clone(),
            chain_id: config.chain.chain_id,
        };
        Ok(Self::assemble(
            providers,
            &config.gate_settings(),
            config.simulated_tx_delay(),
            wallet,
        ))
    }

    /// Offline runtime over the simulated providers.
    pub fn simulated(chain_id: u64, simulated_delay: Duration) -> Self {
        Self::assemble(
            Providers::simulated(chain_id),
            &GateSettings::default(),
            simulated_delay,
            AgentWallet {
                address: None,
                chain_id,
            },
        )
    }

    fn assemble(
        providers: Providers,
        settings: &GateSettings,
        simulated_delay: Duration,
        wallet: AgentWallet,
    ) -> Self {
        let events = Arc::new(EventBroadcaster::new());
        let orchestrator = Arc::new(Orchestrator::from_providers(
            &providers,
            settings,
            simulated_delay,
            events.clone(),
        ));
        let chain_id = wallet.chain_id;
        let tools = standard_registry(orchestrator.clone(), &providers, settings, wallet);
        tracing::debug!("Runtime assembled with tools {:?}", tools.names());

        Self {
            providers,
            orchestrator,
            tools,
            events,
            chain_id,
        }
    }
}
