//! Per-conversation confirmation state.
//!
//! The pending command lives inside the phase value, so a session can hold
//! zero or one command and never more.

use chrono::{DateTime, Utc};
use serde::Serialize;
use uuid::Uuid;

use crate::dispatcher::TransactionReceipt;
use crate::error::FailureKind;
use crate::pipeline::command::PendingCommand;
use crate::providers::SecurityScanResult;

/// Scan outcome waiting for an explicit acknowledgement.
#[derive(Debug, Clone, PartialEq, Serialize)]
pub struct ScanWarning {
    pub kind: FailureKind,
    pub message: String,
    pub result: SecurityScanResult,
}

/// Terminal reason recorded when a command is dropped before execution.
#[derive(Debug, Clone, PartialEq, Eq, Serialize)]
pub struct AbortReason {
    pub kind: FailureKind,
    pub message: String,
}

/// Confirmation protocol phase.
#[derive(Debug, Clone, PartialEq, Default)]
pub enum Phase {
    #[default]
    Idle,
    /// Command restated; waiting for the user to confirm or reject it.
    AwaitingVerification(PendingCommand),
    /// User confirmed; gates have not run yet.
    Confirmed(PendingCommand),
    /// Scan returned WARN, ESCALATE, or OFFLINE.
    AwaitingAcknowledgement {
        command: PendingCommand,
        warning: ScanWarning,
    },
    /// All gates passed (or the warning was acknowledged).
    AwaitingExecutionConfirmation(PendingCommand),
    Executed(TransactionReceipt),
    Aborted(AbortReason),
}

/// Copyable phase tag for status reporting.
#[derive(Debug, Clone, Copy, Serialize, PartialEq, Eq)]
#[serde(rename_all = "SCREAMING_SNAKE_CASE")]
pub enum PhaseKind {
    Idle,
    AwaitingVerification,
    Confirmed,
    AwaitingAcknowledgement,
    AwaitingExecutionConfirmation,
    Executed,
    Aborted,
}

impl Phase {
    pub fn kind(&self) -> PhaseKind {
        match self {
            Self::Idle => PhaseKind::Idle,
            Self::AwaitingVerification(_) => PhaseKind::AwaitingVerification,
            Self::Confirmed(_) => PhaseKind::Confirmed,
            Self::AwaitingAcknowledgement { .. } => PhaseKind::AwaitingAcknowledgement,
            Self::AwaitingExecutionConfirmation(_) => PhaseKind::AwaitingExecutionConfirmation,
            Self::Executed(_) => PhaseKind::Executed,
            Self::Aborted(_) => PhaseKind::Aborted,
        }
    }

    pub fn pending(&self) -> Option<&PendingCommand> {
        match self {
            Self::AwaitingVerification(command)
            | Self::Confirmed(command)
            | Self::AwaitingAcknowledgement { command, .. }
            | Self::AwaitingExecutionConfirmation(command) => Some(command),
            Self::Idle | Self::Executed(_) | Self::Aborted(_) => None,
        }
    }

    /// Idle or a finished cycle: a new `verify` may start.
    pub fn accepts_new_command(&self) -> bool {
        matches!(self, Self::Idle | Self::Executed(_) | Self::Aborted(_))
    }
}

/// Session state owned by a single conversation.
#[derive(Debug)]
pub struct Session {
    pub id: Uuid,
    pub created_at: DateTime<Utc>,
    phase: Phase,
}

impl Session {
    pub fn new() -> Self {
        Self::with_id(Uuid::new_v4())
    }

    pub fn with_id(id: Uuid) -> Self {
        Self {
            id,
            created_at: Utc::now(),
            phase: Phase::Idle,
        }
    }

    pub fn phase(&self) -> &Phase {
        &self.phase
    }

    pub fn pending(&self) -> Option<&PendingCommand> {
        self.phase.pending()
    }

    /// Move the phase out, leaving the session idle. An interrupted
    /// transition therefore ends with the command cleared.
    pub(crate) fn take_phase(&mut self) -> Phase {
        std::mem::take(&mut self.phase)
    }

    pub(crate) fn set_phase(&mut self, phase: Phase) {
        self.phase = phase;
    }

    /// Drop any pending command and return to idle.
    pub fn reset(&mut self) {
        self.phase = Phase::Idle;
    }
}

impl Default for Session {
    fn default() -> Self {
        Self::new()
    }
}

/// Snapshot for front-ends and the status endpoint.
#[derive(Debug, Clone, Serialize)]
pub struct SessionInfo {
    pub session_id: Uuid,
    pub phase: PhaseKind,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub pending: Option<PendingCommand>,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub last_receipt: Option<TransactionReceipt>,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub last_abort: Option<AbortReason>,
    pub created_at: DateTime<Utc>,
}

impl From<&Session> for SessionInfo {
    fn from(session: &Session) -> Self {
        let (last_receipt, last_abort) = match session.phase() {
            Phase::Executed(receipt) => (Some(receipt.clone()), None),
            Phase::Aborted(reason) => (None, Some(reason.clone())),
            _ => (None, None),
        };
        Self {
            session_id: session.id,
            phase: session.phase().kind(),
            pending: session.pending().cloned(),
            last_receipt,
            last_abort,
            created_at: session.created_at,
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::pipeline::command::Action;

    fn command() -> PendingCommand {
        PendingCommand::new(Action::Send, "1 ETH".parse().unwrap(), "vitalik.eth")
    }

    #[test]
    fn new_session_is_idle_without_pending_command() {
        let session = Session::new();
        assert_eq!(session.phase().kind(), PhaseKind::Idle);
        assert!(session.pending().is_none());
        assert!(session.phase().accepts_new_command());
    }

    #[test]
    fn pending_is_visible_only_in_active_phases() {
        let mut session = Session::new();
        session.set_phase(Phase::Confirmed(command()));
        assert_eq!(session.pending().map(|c| c.target.as_str()), Some("vitalik.eth"));
        assert!(!session.phase().accepts_new_command());

        session.set_phase(Phase::Aborted(AbortReason {
            kind: FailureKind::UserCancelled,
            message: "cancelled".to_string(),
        }));
        assert!(session.pending().is_none());
        assert!(session.phase().accepts_new_command());
    }

    #[test]
    fn take_phase_leaves_session_idle() {
        let mut session = Session::new();
        session.set_phase(Phase::AwaitingVerification(command()));
        let taken = session.take_phase();
        assert_eq!(taken.kind(), PhaseKind::AwaitingVerification);
        assert_eq!(session.phase().kind(), PhaseKind::Idle);
    }

    #[test]
    fn info_snapshot_reports_phase_and_pending() {
        let mut session = Session::new();
        session.set_phase(Phase::AwaitingExecutionConfirmation(command()));
        let info = SessionInfo::from(&session);
        assert_eq!(info.phase, PhaseKind::AwaitingExecutionConfirmation);
        assert!(info.pending.is_some());
        assert!(info.last_receipt.is_none());
    }
}
