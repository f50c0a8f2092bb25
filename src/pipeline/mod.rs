//! Guarded command pipeline: verify, check, execute.

pub mod command;
pub mod events;
pub mod orchestrator;
pub mod session;
pub mod utterance;

use serde::Serialize;

use crate::dispatcher::TransactionReceipt;
use crate::error::{FailureKind, PipelineError};

pub use self::command::{Action, Amount, PendingCommand};
pub use self::events::{
    EventBroadcaster, EventSink, EventType, NoopSink, ProgressEvent, SessionEvent, Step, StepState,
};
pub use self::orchestrator::Orchestrator;
pub use self::session::{Phase, PhaseKind, Session, SessionInfo};
pub use self::utterance::{Utterance, classify};

/// Status tag returned to the conversational front-end.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize)]
#[serde(rename_all = "SCREAMING_SNAKE_CASE")]
pub enum OutcomeStatus {
    NeedsVerification,
    Pending,
    ChecksPassed,
    Aborted,
    Success,
    Error,
}

/// Result of one pipeline call. `message` is spoken to the user verbatim.
#[derive(Debug, Clone, PartialEq, Serialize)]
pub struct PipelineResponse {
    pub status: OutcomeStatus,
    pub message: String,
    pub requires_acknowledgement: bool,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub failure: Option<FailureKind>,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub command: Option<PendingCommand>,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub receipt: Option<TransactionReceipt>,
}

impl PipelineResponse {
    pub fn new(status: OutcomeStatus, message: impl Into<String>) -> Self {
        Self {
            status,
            message: message.into(),
            requires_acknowledgement: false,
            failure: None,
            command: None,
            receipt: None,
        }
    }

    /// `ERROR` response for a rejected call. Session state is untouched.
    pub fn error(err: &PipelineError) -> Self {
        Self::new(OutcomeStatus::Error, err.to_string())
    }

    pub fn with_command(mut self, command: &PendingCommand) -> Self {
        self.command = Some(command.clone());
        self
    }

    pub fn with_receipt(mut self, receipt: TransactionReceipt) -> Self {
        self.receipt = Some(receipt);
        self
    }

    pub fn with_failure(mut self, kind: FailureKind) -> Self {
        self.failure = Some(kind);
        self
    }

    pub fn awaiting_acknowledgement(mut self) -> Self {
        self.requires_acknowledgement = true;
        self
    }
}
