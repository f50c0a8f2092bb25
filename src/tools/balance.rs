use std::sync::Arc;
use std::time::Instant;

use async_trait::async_trait;
use serde::{Deserialize, Serialize};

use crate::error::ToolError;
use crate::gates::{Gate, GateData, GateInput, NameResolutionGate, validate_address};
use crate::providers::{ChainReader, format_ether};
use crate::tools::tool::{Tool, ToolContext, ToolOutput};

pub const BALANCE_TOOL_NAME: &str = "get_balance";

#[derive(Debug, Deserialize)]
struct BalanceParams {
    #[serde(default)]
    target: Option<String>,
}

#[derive(Debug, Serialize)]
struct BalanceReport {
    target: String,
    address: String,
    balance_wei: String,
    balance_eth: String,
}

/// Native balance of an address, a name, or the agent wallet.
pub struct BalanceTool {
    chain: Arc<dyn ChainReader>,
    names: NameResolutionGate,
    agent_wallet: Option<String>,
}

impl BalanceTool {
    pub fn new(
        chain: Arc<dyn ChainReader>,
        names: NameResolutionGate,
        agent_wallet: Option<String>,
    ) -> Self {
        Self {
            chain,
            names,
            agent_wallet,
        }
    }

    async fn resolve(&self, target: &str) -> Result<String, ToolError> {
        let result = self.names.evaluate(&GateInput::new(target)).await;
        let address = match result.data {
            Some(GateData::Address(address)) if result.passed => address,
            _ => return Err(ToolError::ExecutionFailed(result.message)),
        };
        validate_address(&address).ok_or_else(|| {
            ToolError::InvalidParameters(format!("Invalid Ethereum address format: {address}"))
        })
    }
}

#[async_trait]
impl Tool for BalanceTool {
    fn name(&self) -> &str {
        BALANCE_TOOL_NAME
    }

    fn description(&self) -> &str {
        "Returns the native balance of an address or ENS name. Without a target, returns the agent wallet balance."
    }

    fn parameters_schema(&self) -> serde_json::Value {
        serde_json::json!({
            "type": "object",
            "properties": {
                "target": {
                    "type": "string",
                    "description": "Address or ENS name. Omit for the agent wallet."
                }
            }
        })
    }

    async fn execute(
        &self,
        params: serde_json::Value,
        _ctx: &mut ToolContext<'_>,
    ) -> Result<ToolOutput, ToolError> {
        let start = Instant::now();
        let parsed: BalanceParams = if params.is_null() {
            BalanceParams { target: None }
        } else {
            serde_json::from_value(params).map_err(|e| {
                ToolError::InvalidParameters(format!("invalid {} parameters: {}", BALANCE_TOOL_NAME, e))
            })?
        };

        let target = match parsed.target.filter(|t| !t.trim().is_empty()) {
            Some(target) => target.trim().to_string(),
            None => self.agent_wallet.clone().ok_or_else(|| {
                ToolError::ExecutionFailed("no agent wallet is configured".to_string())
            })?,
        };
        let address = self.resolve(&target).await?;

        let wei = self
            .chain
            .balance(&address)
            .await
            .map_err(|e| ToolError::ExecutionFailed(format!("balance lookup failed: {}", e)))?;

        let report = BalanceReport {
            target,
            address,
            balance_wei: wei.to_string(),
            balance_eth: format_ether(wei),
        };
        let result = serde_json::to_value(report)
            .map_err(|e| ToolError::ExecutionFailed(format!("failed to encode balance: {}", e)))?;
        Ok(ToolOutput::success(result, start.elapsed()))
    }
}

#[cfg(test)]
mod tests {
    use std::time::Duration;

    use serde_json::json;

    use super::*;
    use crate::pipeline::Session;
    use crate::providers::SimulatedChain;
    use crate::providers::simulated::DEMO_EOA;

    fn tool(agent_wallet: Option<&str>) -> BalanceTool {
        let chain = Arc::new(SimulatedChain::demo(1));
        BalanceTool::new(
            chain.clone(),
            NameResolutionGate::new(chain, vec![".eth".to_string()], Duration::from_secs(1)),
            agent_wallet.map(str::to_string),
        )
    }

    #[tokio::test]
    async fn resolves_names_before_lookup() {
        let mut session = Session::new();
        let mut ctx = ToolContext::new(&mut session);
        let output = tool(None)
            .execute(json!({"target": "vitalik.eth"}), &mut ctx)
            .await
            .unwrap();
        assert_eq!(output.result["address"], DEMO_EOA);
        assert_eq!(output.result["balance_eth"], "1000");
    }

    #[tokio::test]
    async fn defaults_to_agent_wallet() {
        let mut session = Session::new();
        let mut ctx = ToolContext::new(&mut session);
        let output = tool(Some(DEMO_EOA))
            .execute(json!({}), &mut ctx)
            .await
            .unwrap();
        assert_eq!(output.result["target"], DEMO_EOA);
    }

    #[tokio::test]
    async fn missing_wallet_and_target_fails() {
        let mut session = Session::new();
        let mut ctx = ToolContext::new(&mut session);
        let err = tool(None).execute(json!({}), &mut ctx).await.unwrap_err();
        assert!(matches!(err, ToolError::ExecutionFailed(_)));
    }

    #[tokio::test]
    async fn unresolvable_name_reports_gate_message() {
        let mut session = Session::new();
        let mut ctx = ToolContext::new(&mut session);
        let err = tool(None)
            .execute(json!({"target": "nobody.eth"}), &mut ctx)
            .await
            .unwrap_err();
        assert!(err.to_string().contains("could not resolve nobody.eth"));
    }
}
