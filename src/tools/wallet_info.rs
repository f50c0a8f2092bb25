use std::time::Instant;

use async_trait::async_trait;
use serde::Serialize;

use crate::error::ToolError;
use crate::tools::tool::{Tool, ToolContext, ToolOutput};

pub const WALLET_INFO_TOOL_NAME: &str = "get_wallet_info";

const SEPARATE_WALLET_NOTE: &str = "This is the agent's own wallet. It is separate from any browser wallet you use, and transfers I execute are paid from it.";

#[derive(Debug, Serialize)]
struct WalletInfo<'a> {
    address: Option<&'a str>,
    chain_id: u64,
    simulated: bool,
    note: &'a str,
}

/// Reports which wallet the agent dispatches from.
pub struct WalletInfoTool {
    address: Option<String>,
    chain_id: u64,
    simulated: bool,
}

impl WalletInfoTool {
    pub fn new(address: Option<String>, chain_id: u64, simulated: bool) -> Self {
        Self {
            address,
            chain_id,
            simulated,
        }
    }
}

#[async_trait]
impl Tool for WalletInfoTool {
    fn name(&self) -> &str {
        WALLET_INFO_TOOL_NAME
    }

    fn description(&self) -> &str {
        "Returns the agent wallet address, chain and whether transfers are simulated."
    }

    fn parameters_schema(&self) -> serde_json::Value {
        serde_json::json!({ "type": "object", "properties": {} })
    }

    async fn execute(
        &self,
        _params: serde_json::Value,
        _ctx: &mut ToolContext<'_>,
    ) -> Result<ToolOutput, ToolError> {
        let start = Instant::now();
        let info = WalletInfo {
            address: self.address.as_deref(),
            chain_id: self.chain_id,
            simulated: self.simulated,
            note: SEPARATE_WALLET_NOTE,
        };
        let result = serde_json::to_value(info)
            .map_err(|e| ToolError::ExecutionFailed(format!("failed to encode wallet info: {}", e)))?;
        Ok(ToolOutput::success(result, start.elapsed()))
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::pipeline::Session;

    #[tokio::test]
    async fn reports_simulated_wallet_without_address() {
        let mut session = Session::new();
        let mut ctx = ToolContext::new(&mut session);
        let output = WalletInfoTool::new(None, 11_155_111, true)
            .execute(serde_json::Value::Null, &mut ctx)
            .await
            .unwrap();
        assert_eq!(output.result["address"], serde_json::Value::Null);
        assert_eq!(output.result["chain_id"], 11_155_111);
        assert_eq!(output.result["simulated"], true);
    }
}
