//! `execute_guarded_command`: the single tool the conversational front-end
//! uses to move money.

use std::sync::Arc;
use std::time::{Duration, Instant};

use async_trait::async_trait;
use serde::Deserialize;

use crate::error::{PipelineError, ToolError};
use crate::pipeline::{
    Action, Amount, Orchestrator, PhaseKind, PipelineResponse, Utterance, classify,
};
use crate::tools::tool::{Tool, ToolContext, ToolOutput};

pub const GUARDED_COMMAND_TOOL_NAME: &str = "execute_guarded_command";

#[derive(Debug, Deserialize)]
#[serde(tag = "step", rename_all = "snake_case")]
enum GuardedCommandCall {
    Verify {
        action: String,
        amount: String,
        target: String,
    },
    Check {
        #[serde(default)]
        confirmation: Option<String>,
    },
    Execute,
}

pub struct GuardedCommandTool {
    orchestrator: Arc<Orchestrator>,
}

impl GuardedCommandTool {
    pub fn new(orchestrator: Arc<Orchestrator>) -> Self {
        Self { orchestrator }
    }

    async fn run(
        &self,
        call: GuardedCommandCall,
        ctx: &mut ToolContext<'_>,
    ) -> Result<PipelineResponse, PipelineError> {
        match call {
            GuardedCommandCall::Verify {
                action,
                amount,
                target,
            } => {
                let action: Action = action.parse().map_err(PipelineError::InvalidRequest)?;
                let amount: Amount = amount.parse().map_err(PipelineError::InvalidRequest)?;
                self.orchestrator.verify(ctx.session, action, amount, &target)
            }
            GuardedCommandCall::Check { confirmation } => {
                let relays_answer = matches!(
                    ctx.session.phase().kind(),
                    PhaseKind::AwaitingVerification | PhaseKind::AwaitingAcknowledgement
                );
                match confirmation.filter(|c| !c.trim().is_empty()) {
                    // A relayed "no" resets the command from any phase.
                    Some(text) if classify(&text) == Utterance::Reject => {
                        self.orchestrator.cancel(ctx.session)
                    }
                    Some(text) if relays_answer => {
                        self.orchestrator.handle_utterance(ctx.session, &text).await
                    }
                    _ => self.orchestrator.check(ctx.session).await,
                }
            }
            GuardedCommandCall::Execute => self.orchestrator.execute(ctx.session).await,
        }
    }
}

#[async_trait]
impl Tool for GuardedCommandTool {
    fn name(&self) -> &str {
        GUARDED_COMMAND_TOOL_NAME
    }

    fn description(&self) -> &str {
        "Runs a value transfer through confirmation, safety checks and dispatch. \
         Call with step=verify first, relay the returned message to the user, \
         then step=check once they confirm and step=execute once checks pass."
    }

    fn parameters_schema(&self) -> serde_json::Value {
        serde_json::json!({
            "type": "object",
            "properties": {
                "step": {
                    "type": "string",
                    "enum": ["verify", "check", "execute"],
                    "description": "Pipeline step to run."
                },
                "action": {
                    "type": "string",
                    "enum": ["deposit", "swap", "send", "invest"],
                    "description": "Requested action. Required for verify."
                },
                "amount": {
                    "type": "string",
                    "description": "Amount with denomination, e.g. '1 ETH'. Required for verify."
                },
                "target": {
                    "type": "string",
                    "description": "Target address or ENS name. Required for verify."
                },
                "confirmation": {
                    "type": "string",
                    "description": "The user's reply to the last prompt, relayed verbatim. Optional for check."
                }
            },
            "required": ["step"]
        })
    }

    async fn execute(
        &self,
        params: serde_json::Value,
        ctx: &mut ToolContext<'_>,
    ) -> Result<ToolOutput, ToolError> {
        let start = Instant::now();

        let call: GuardedCommandCall = serde_json::from_value(params).map_err(|e| {
            ToolError::InvalidParameters(format!(
                "invalid {} parameters: {}",
                GUARDED_COMMAND_TOOL_NAME, e
            ))
        })?;
        tracing::debug!("Session {}: {:?}", ctx.session.id, call);

        let response = match self.run(call, ctx).await {
            Ok(response) => response,
            Err(e) => {
                tracing::info!("Session {}: call rejected: {}", ctx.session.id, e);
                PipelineResponse::error(&e)
            }
        };

        let result = serde_json::to_value(&response)
            .map_err(|e| ToolError::ExecutionFailed(format!("failed to encode response: {}", e)))?;
        Ok(ToolOutput::success(result, start.elapsed()))
    }

    fn execution_timeout(&self) -> Duration {
        Duration::from_secs(120)
    }
}

#[cfg(test)]
mod tests {
    use pretty_assertions::assert_eq;
    use serde_json::json;

    use super::*;
    use crate::gates::GateSettings;
    use crate::pipeline::{NoopSink, Session};
    use crate::providers::Providers;

    fn tool() -> GuardedCommandTool {
        GuardedCommandTool::new(Arc::new(Orchestrator::from_providers(
            &Providers::simulated(11_155_111),
            &GateSettings::default(),
            Duration::ZERO,
            Arc::new(NoopSink),
        )))
    }

    async fn call(
        tool: &GuardedCommandTool,
        session: &mut Session,
        params: serde_json::Value,
    ) -> serde_json::Value {
        let mut ctx = ToolContext::new(session);
        tool.execute(params, &mut ctx).await.unwrap().result
    }

    #[tokio::test]
    async fn verify_check_execute_round() {
        let tool = tool();
        let mut session = Session::new();

        let verify = call(
            &tool,
            &mut session,
            json!({"step": "verify", "action": "deposit", "amount": "1 ETH", "target": "safe-vault.eth"}),
        )
        .await;
        assert_eq!(verify["status"], "NEEDS_VERIFICATION");
        assert_eq!(
            verify["message"],
            "I heard: deposit 1 ETH into safe-vault.eth. Is that correct?"
        );

        let check = call(
            &tool,
            &mut session,
            json!({"step": "check", "confirmation": "yes, that's right"}),
        )
        .await;
        assert_eq!(check["status"], "CHECKS_PASSED");
        assert_eq!(check["requires_acknowledgement"], false);

        let execute = call(&tool, &mut session, json!({"step": "execute"})).await;
        assert_eq!(execute["status"], "SUCCESS");
        assert_eq!(execute["receipt"]["simulated"], true);
        assert_eq!(execute["receipt"]["hash"].as_str().unwrap().len(), 66);
    }

    #[tokio::test]
    async fn check_without_confirmation_is_an_error_status() {
        let tool = tool();
        let mut session = Session::new();
        call(
            &tool,
            &mut session,
            json!({"step": "verify", "action": "send", "amount": "1 ETH", "target": "vitalik.eth"}),
        )
        .await;

        let check = call(&tool, &mut session, json!({"step": "check"})).await;
        assert_eq!(check["status"], "ERROR");
        assert!(session.pending().is_some());
    }

    #[tokio::test]
    async fn malformed_amount_leaves_session_untouched() {
        let tool = tool();
        let mut session = Session::new();
        let response = call(
            &tool,
            &mut session,
            json!({"step": "verify", "action": "send", "amount": "lots", "target": "vitalik.eth"}),
        )
        .await;
        assert_eq!(response["status"], "ERROR");
        assert!(session.pending().is_none());
    }

    #[tokio::test]
    async fn unknown_step_is_invalid_parameters() {
        let tool = tool();
        let mut session = Session::new();
        let mut ctx = ToolContext::new(&mut session);
        let err = tool
            .execute(json!({"step": "teleport"}), &mut ctx)
            .await
            .unwrap_err();
        assert!(matches!(err, ToolError::InvalidParameters(_)));
    }

    #[tokio::test]
    async fn check_with_confirmation_never_executes() {
        let tool = tool();
        let mut session = Session::new();
        call(
            &tool,
            &mut session,
            json!({"step": "verify", "action": "send", "amount": "1 ETH", "target": "vitalik.eth"}),
        )
        .await;
        call(&tool, &mut session, json!({"step": "check", "confirmation": "yes"})).await;

        let again = call(&tool, &mut session, json!({"step": "check", "confirmation": "yes"})).await;
        assert_eq!(again["status"], "ERROR");
        assert_eq!(
            session.phase().kind(),
            PhaseKind::AwaitingExecutionConfirmation
        );
    }

    #[tokio::test]
    async fn relayed_rejection_cancels_after_checks_pass() {
        let tool = tool();
        let mut session = Session::new();
        call(
            &tool,
            &mut session,
            json!({"step": "verify", "action": "send", "amount": "1 ETH", "target": "vitalik.eth"}),
        )
        .await;
        call(&tool, &mut session, json!({"step": "check", "confirmation": "yes"})).await;
        assert_eq!(
            session.phase().kind(),
            PhaseKind::AwaitingExecutionConfirmation
        );

        let cancel = call(
            &tool,
            &mut session,
            json!({"step": "check", "confirmation": "no, cancel that"}),
        )
        .await;
        assert_eq!(cancel["status"], "ABORTED");
        assert_eq!(cancel["failure"], "user_cancelled");
        assert!(session.pending().is_none());

        let execute = call(&tool, &mut session, json!({"step": "execute"})).await;
        assert_eq!(execute["status"], "ERROR");
        assert!(execute.get("receipt").is_none());
    }

    #[tokio::test]
    async fn relayed_rejection_while_held_for_acknowledgement_cancels() {
        let tool = tool();
        let mut session = Session::new();
        call(
            &tool,
            &mut session,
            json!({"step": "verify", "action": "deposit", "amount": "1 ETH", "target": "proxy-vault.eth"}),
        )
        .await;
        let held = call(&tool, &mut session, json!({"step": "check", "confirmation": "yes"})).await;
        assert_eq!(held["requires_acknowledgement"], true);

        let cancel = call(
            &tool,
            &mut session,
            json!({"step": "check", "confirmation": "I'm not sure about this"}),
        )
        .await;
        assert_eq!(cancel["status"], "ABORTED");
        assert_eq!(session.phase().kind(), PhaseKind::Aborted);
    }
}
