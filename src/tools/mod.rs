//! Tool surface exposed to the conversational front-end.

mod balance;
mod guarded_command;
mod registry;
mod tool;
mod wallet_info;

use std::sync::Arc;

use crate::gates::{GateSettings, NameResolutionGate};
use crate::pipeline::Orchestrator;
use crate::providers::Providers;

pub use self::balance::{BALANCE_TOOL_NAME, BalanceTool};
pub use self::guarded_command::{GUARDED_COMMAND_TOOL_NAME, GuardedCommandTool};
pub use self::registry::ToolRegistry;
pub use self::tool::{Tool, ToolContext, ToolDefinition, ToolOutput};
pub use self::wallet_info::{WALLET_INFO_TOOL_NAME, WalletInfoTool};

/// Identity of the wallet the agent dispatches from.
#[derive(Debug, Clone)]
pub struct AgentWallet {
    pub address: Option<String>,
    pub chain_id: u64,
}

/// Registry with the guarded command tool and its read-only companions.
pub fn standard_registry(
    orchestrator: Arc<Orchestrator>,
    providers: &Providers,
    settings: &GateSettings,
    wallet: AgentWallet,
) -> ToolRegistry {
    let simulated = orchestrator.dispatcher().is_simulated();
    let mut registry = ToolRegistry::new();

    registry.register(Arc::new(GuardedCommandTool::new(orchestrator)));
    registry.register(Arc::new(BalanceTool::new(
        providers.chain.clone(),
        NameResolutionGate::new(
            providers.resolver.clone(),
            settings.naming_suffixes.clone(),
            settings.timeout,
        ),
        wallet.address.clone(),
    )));
    registry.register(Arc::new(WalletInfoTool::new(
        wallet.address,
        wallet.chain_id,
        simulated,
    )));
    registry
}

#[cfg(test)]
mod tests {
    use std::time::Duration;

    use super::*;
    use crate::pipeline::NoopSink;

    #[test]
    fn standard_registry_exposes_three_tools() {
        let providers = Providers::simulated(1);
        let settings = GateSettings::default();
        let orchestrator = Arc::new(Orchestrator::from_providers(
            &providers,
            &settings,
            Duration::ZERO,
            Arc::new(NoopSink),
        ));
        let registry = standard_registry(
            orchestrator,
            &providers,
            &settings,
            AgentWallet {
                address: None,
                chain_id: 1,
            },
        );
        assert_eq!(
            registry.names(),
            vec![
                GUARDED_COMMAND_TOOL_NAME,
                BALANCE_TOOL_NAME,
                WALLET_INFO_TOOL_NAME
            ]
        );
    }
}
