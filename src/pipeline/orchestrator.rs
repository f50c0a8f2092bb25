//! Drives a session through verify, check and execute.
//!
//! Every transition takes the phase out of the session, works on the owned
//! value and writes the next phase back. If a call is interrupted half-way
//! the session is left idle with no pending command.

use std::sync::Arc;
use std::time::{Duration, Instant};

use uuid::Uuid;

use crate::dispatcher::TransactionDispatcher;
use crate::error::{FailureKind, PipelineError};
use crate::gates::{self, Gate, GateData, GateInput, GateSettings};
use crate::pipeline::command::{Action, Amount, PendingCommand};
use crate::pipeline::events::{EventSink, ProgressEvent, Step, StepState};
use crate::pipeline::session::{
    AbortReason, Phase, PhaseKind, ScanWarning, Session, SessionInfo,
};
use crate::pipeline::utterance::{Utterance, classify};
use crate::pipeline::{OutcomeStatus, PipelineResponse};
use crate::providers::{Providers, SecurityScanResult};

const SKIPPED_FOR_EOA: &str = "Skipped: target has no contract code";

/// How the gate chain ended.
enum ChainOutcome {
    Passed,
    Held {
        kind: FailureKind,
        message: String,
        result: SecurityScanResult,
    },
    Failed {
        kind: FailureKind,
        message: String,
    },
}

pub struct Orchestrator {
    gates: Vec<Arc<dyn Gate>>,
    dispatcher: TransactionDispatcher,
    events: Arc<dyn EventSink>,
}

impl std::fmt::Debug for Orchestrator {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("Orchestrator")
            .field("gates", &self.gates.iter().map(|g| g.step()).collect::<Vec<_>>())
            .field("dispatcher", &self.dispatcher)
            .finish()
    }
}

impl Orchestrator {
    pub fn new(
        gates: Vec<Arc<dyn Gate>>,
        dispatcher: TransactionDispatcher,
        events: Arc<dyn EventSink>,
    ) -> Self {
        Self {
            gates,
            dispatcher,
            events,
        }
    }

    /// Standard gate chain over `providers`; live dispatch when a signer is
    /// configured, simulated otherwise.
    pub fn from_providers(
        providers: &Providers,
        settings: &GateSettings,
        simulated_delay: Duration,
        events: Arc<dyn EventSink>,
    ) -> Self {
        Self::new(
            gates::standard_chain(providers, settings),
            TransactionDispatcher::from_signer(providers.signer.clone(), simulated_delay),
            events,
        )
    }

    pub fn dispatcher(&self) -> &TransactionDispatcher {
        &self.dispatcher
    }

    fn emit(&self, session_id: Uuid, event: ProgressEvent) {
        if let Err(e) = self.events.publish(session_id, event) {
            tracing::debug!("Progress event dropped: {}", e);
        }
    }

    /// Store a new command and ask the user to confirm it. Never runs gates.
    pub fn verify(
        &self,
        session: &mut Session,
        action: Action,
        amount: Amount,
        target: &str,
    ) -> Result<PipelineResponse, PipelineError> {
        let target = target.trim();
        if target.is_empty() {
            return Err(PipelineError::InvalidRequest(
                "I need a target address or name for this command.".to_string(),
            ));
        }

        match session.phase() {
            phase if phase.accepts_new_command() => {}
            Phase::AwaitingVerification(previous) => {
                tracing::warn!(
                    "Session {}: replacing unconfirmed command '{}'",
                    session.id,
                    previous.describe()
                );
            }
            _ => return Err(PipelineError::CommandInFlight),
        }

        let command = PendingCommand::new(action, amount, target);
        let message = format!("I heard: {}. Is that correct?", command.describe());
        tracing::info!("Session {}: verifying '{}'", session.id, command.describe());

        self.emit(
            session.id,
            ProgressEvent::gate(Step::Verification, StepState::Pending)
                .with_detail(command.describe()),
        );
        let response =
            PipelineResponse::new(OutcomeStatus::NeedsVerification, message).with_command(&command);
        session.set_phase(Phase::AwaitingVerification(command));
        Ok(response)
    }

    /// Route a relayed utterance according to the current phase.
    pub async fn handle_utterance(
        &self,
        session: &mut Session,
        text: &str,
    ) -> Result<PipelineResponse, PipelineError> {
        let utterance = classify(text);
        tracing::debug!(
            "Session {}: utterance classified as {:?} in {:?}",
            session.id,
            utterance,
            session.phase().kind()
        );

        match session.phase().kind() {
            PhaseKind::Idle | PhaseKind::Executed | PhaseKind::Aborted => {
                Err(PipelineError::NoPendingCommand)
            }
            PhaseKind::AwaitingVerification => match utterance {
                Utterance::Confirm => self.confirm(session).await,
                Utterance::Reject => self.cancel(session),
                Utterance::Acknowledge | Utterance::Other => Ok(self.reprompt(session)),
            },
            PhaseKind::Confirmed => match utterance {
                Utterance::Reject => self.cancel(session),
                _ => self.check(session).await,
            },
            PhaseKind::AwaitingAcknowledgement => match utterance {
                Utterance::Acknowledge => self.acknowledge(session),
                Utterance::Reject => self.cancel(session),
                Utterance::Confirm | Utterance::Other => Ok(self.reprompt(session)),
            },
            PhaseKind::AwaitingExecutionConfirmation => match utterance {
                Utterance::Confirm => self.execute(session).await,
                Utterance::Reject => self.cancel(session),
                Utterance::Acknowledge | Utterance::Other => Ok(self.reprompt(session)),
            },
        }
    }

    /// Repeat the question for the current phase.
    fn reprompt(&self, session: &Session) -> PipelineResponse {
        match session.phase() {
            Phase::AwaitingVerification(command) => PipelineResponse::new(
                OutcomeStatus::NeedsVerification,
                format!(
                    "Please say yes or no. I heard: {}. Is that correct?",
                    command.describe()
                ),
            )
            .with_command(command),
            Phase::AwaitingAcknowledgement { command, warning } => {
                PipelineResponse::new(OutcomeStatus::Pending, warning.message.clone())
                    .with_command(command)
                    .with_failure(warning.kind)
                    .awaiting_acknowledgement()
            }
            Phase::AwaitingExecutionConfirmation(command) => PipelineResponse::new(
                OutcomeStatus::ChecksPassed,
                format!(
                    "Ready to {}. Say execute to proceed, or cancel to abort.",
                    command.describe()
                ),
            )
            .with_command(command),
            _ => PipelineResponse::error(&PipelineError::NoPendingCommand),
        }
    }

    /// Accept the restated command and run the gate chain.
    pub async fn confirm(&self, session: &mut Session) -> Result<PipelineResponse, PipelineError> {
        match session.take_phase() {
            Phase::AwaitingVerification(command) => {
                tracing::info!("Session {}: command confirmed", session.id);
                self.emit(
                    session.id,
                    ProgressEvent::gate(Step::Verification, StepState::Passed)
                        .with_detail(command.describe()),
                );
                session.set_phase(Phase::Confirmed(command));
                self.check(session).await
            }
            other => {
                let err = match &other {
                    Phase::Confirmed(_) | Phase::AwaitingExecutionConfirmation(_) => {
                        PipelineError::ChecksAlreadyComplete
                    }
                    Phase::AwaitingAcknowledgement { .. } => PipelineError::AwaitingAcknowledgement,
                    _ => PipelineError::NoPendingCommand,
                };
                session.set_phase(other);
                Err(err)
            }
        }
    }

    /// Run the gate chain for a confirmed command.
    pub async fn check(&self, session: &mut Session) -> Result<PipelineResponse, PipelineError> {
        let mut command = match session.take_phase() {
            Phase::Confirmed(command) => command,
            other => {
                let err = match &other {
                    Phase::AwaitingVerification(_) => PipelineError::NotConfirmed,
                    Phase::AwaitingAcknowledgement { .. } => PipelineError::AwaitingAcknowledgement,
                    Phase::AwaitingExecutionConfirmation(_) => PipelineError::ChecksAlreadyComplete,
                    _ => PipelineError::NoPendingCommand,
                };
                session.set_phase(other);
                return Err(err);
            }
        };

        let started = Instant::now();
        let outcome = self.run_gates(session.id, &mut command).await;
        tracing::debug!(
            "Session {}: gate chain finished in {:?}",
            session.id,
            started.elapsed()
        );

        match outcome {
            ChainOutcome::Passed => {
                command.security_checks_passed = true;
                let message = format!(
                    "All security checks passed. Ready to {}. Say execute to proceed.",
                    command.describe()
                );
                tracing::info!("Session {}: all gates passed", session.id);
                let response =
                    PipelineResponse::new(OutcomeStatus::ChecksPassed, message).with_command(&command);
                session.set_phase(Phase::AwaitingExecutionConfirmation(command));
                Ok(response)
            }
            ChainOutcome::Held {
                kind,
                message,
                result,
            } => {
                tracing::warn!(
                    "Session {}: scan returned {}, waiting for acknowledgement",
                    session.id,
                    result.decision.as_str()
                );
                let response = PipelineResponse::new(OutcomeStatus::Pending, message.clone())
                    .with_command(&command)
                    .with_failure(kind)
                    .awaiting_acknowledgement();
                session.set_phase(Phase::AwaitingAcknowledgement {
                    command,
                    warning: ScanWarning {
                        kind,
                        message,
                        result,
                    },
                });
                Ok(response)
            }
            ChainOutcome::Failed { kind, message } => {
                tracing::info!(
                    "Session {}: aborted with {}: {}",
                    session.id,
                    kind.as_str(),
                    message
                );
                session.set_phase(Phase::Aborted(AbortReason {
                    kind,
                    message: message.clone(),
                }));
                Ok(PipelineResponse::new(OutcomeStatus::Aborted, message).with_failure(kind))
            }
        }
    }

    async fn run_gates(&self, session_id: Uuid, command: &mut PendingCommand) -> ChainOutcome {
        let mut input = GateInput::new(command.target.clone());

        for (index, gate) in self.gates.iter().enumerate() {
            let step = gate.step();
            self.emit(session_id, ProgressEvent::gate(step, StepState::Running));

            let started = Instant::now();
            let result = gate.evaluate(&input).await;
            tracing::debug!(
                "Gate {} returned passed={} in {:?}",
                step.as_str(),
                result.passed,
                started.elapsed()
            );

            if let Some(scan) = result.scan_result() {
                let state = if result.passed {
                    StepState::Passed
                } else {
                    StepState::Failed
                };
                self.emit(
                    session_id,
                    ProgressEvent::scan(state)
                        .with_detail(scan.decision.as_str())
                        .with_issues(scan.issues()),
                );
            }

            if !result.passed {
                let kind = result.failure.unwrap_or(FailureKind::SecurityBlock);
                if result.requires_acknowledgement {
                    self.emit(
                        session_id,
                        ProgressEvent::gate(step, StepState::Pending)
                            .with_detail("Awaiting acknowledgement"),
                    );
                    let scan = result
                        .scan_result()
                        .cloned()
                        .unwrap_or_else(SecurityScanResult::offline);
                    return ChainOutcome::Held {
                        kind,
                        message: result.message,
                        result: scan,
                    };
                }
                self.emit(
                    session_id,
                    ProgressEvent::gate(step, StepState::Failed).with_detail(result.message.clone()),
                );
                return ChainOutcome::Failed {
                    kind,
                    message: result.message,
                };
            }

            self.emit(
                session_id,
                ProgressEvent::gate(step, StepState::Passed).with_detail(result.message.clone()),
            );

            if let Some(data) = &result.data {
                input.absorb(data);
                if let GateData::Address(address) = data {
                    command.resolved_address = Some(address.clone());
                }
            }

            if result.ends_chain() {
                for skipped in &self.gates[index + 1..] {
                    self.emit(
                        session_id,
                        ProgressEvent::gate(skipped.step(), StepState::Passed)
                            .with_detail(SKIPPED_FOR_EOA),
                    );
                }
                break;
            }
        }

        ChainOutcome::Passed
    }

    /// Accept a held scan warning.
    pub fn acknowledge(&self, session: &mut Session) -> Result<PipelineResponse, PipelineError> {
        match session.take_phase() {
            Phase::AwaitingAcknowledgement {
                mut command,
                warning,
            } => {
                command.warning_acknowledged = true;
                command.security_checks_passed = true;
                tracing::warn!(
                    "Session {}: user acknowledged {} ({})",
                    session.id,
                    warning.kind.as_str(),
                    warning.result.summary
                );
                self.emit(
                    session.id,
                    ProgressEvent::gate(Step::SecurityScan, StepState::Passed)
                        .with_detail(format!("Acknowledged: {}", warning.result.summary)),
                );
                let message = format!(
                    "Warning acknowledged. Ready to {}. Say execute to proceed.",
                    command.describe()
                );
                let response =
                    PipelineResponse::new(OutcomeStatus::ChecksPassed, message).with_command(&command);
                session.set_phase(Phase::AwaitingExecutionConfirmation(command));
                Ok(response)
            }
            other => {
                session.set_phase(other);
                Err(PipelineError::NothingToAcknowledge)
            }
        }
    }

    /// Dispatch a command whose checks have passed.
    pub async fn execute(&self, session: &mut Session) -> Result<PipelineResponse, PipelineError> {
        let command = match session.take_phase() {
            Phase::AwaitingExecutionConfirmation(command) => command,
            other => {
                let err = match &other {
                    Phase::AwaitingVerification(_) => PipelineError::NotConfirmed,
                    Phase::Confirmed(_) => PipelineError::ChecksNotPassed,
                    Phase::AwaitingAcknowledgement { .. } => PipelineError::AwaitingAcknowledgement,
                    _ => PipelineError::NoPendingCommand,
                };
                session.set_phase(other);
                return Err(err);
            }
        };

        if !command.security_checks_passed {
            session.set_phase(Phase::AwaitingExecutionConfirmation(command));
            return Err(PipelineError::ChecksNotPassed);
        }
        let Some(to) = command.resolved_address.clone() else {
            session.set_phase(Phase::AwaitingExecutionConfirmation(command));
            return Err(PipelineError::UnresolvedTarget);
        };

        self.emit(
            session.id,
            ProgressEvent::gate(Step::Execution, StepState::Running),
        );

        match self.dispatcher.execute(&to, &command.amount).await {
            Ok(receipt) => {
                let mut message = format!("Transaction submitted. Hash: {}.", receipt.hash);
                if receipt.simulated {
                    message.push_str(" This was a simulated transaction; no funds moved.");
                }
                self.emit(
                    session.id,
                    ProgressEvent::gate(Step::Execution, StepState::Executed)
                        .with_detail(receipt.hash.clone()),
                );
                let response = PipelineResponse::new(OutcomeStatus::Success, message)
                    .with_command(&command)
                    .with_receipt(receipt.clone());
                session.set_phase(Phase::Executed(receipt));
                Ok(response)
            }
            Err(e) => {
                tracing::error!("Session {}: dispatch failed: {}", session.id, e);
                let message = format!("The transaction could not be completed: {e}.");
                self.emit(
                    session.id,
                    ProgressEvent::gate(Step::Execution, StepState::Failed)
                        .with_detail(message.clone()),
                );
                session.set_phase(Phase::Aborted(AbortReason {
                    kind: FailureKind::DispatchFailed,
                    message: message.clone(),
                }));
                Ok(PipelineResponse::new(OutcomeStatus::Error, message)
                    .with_failure(FailureKind::DispatchFailed))
            }
        }
    }

    pub fn status(&self, session: &Session) -> SessionInfo {
        SessionInfo::from(session)
    }

    /// Drop the pending command. Before confirmation this is a rejection and
    /// the session returns to idle; afterwards it is recorded as cancelled.
    pub fn cancel(&self, session: &mut Session) -> Result<PipelineResponse, PipelineError> {
        match session.take_phase() {
            Phase::AwaitingVerification(command) => {
                tracing::info!("Session {}: '{}' rejected", session.id, command.describe());
                self.emit(
                    session.id,
                    ProgressEvent::gate(Step::Verification, StepState::Failed)
                        .with_detail("Rejected by user"),
                );
                Ok(PipelineResponse::new(
                    OutcomeStatus::Aborted,
                    "Okay, I discarded that command. What would you like to do instead?",
                )
                .with_failure(FailureKind::UserRejected))
            }
            phase if phase.pending().is_some() => {
                tracing::info!("Session {}: command cancelled", session.id);
                let message = "Cancelled. The transaction will not be executed.";
                session.set_phase(Phase::Aborted(AbortReason {
                    kind: FailureKind::UserCancelled,
                    message: message.to_string(),
                }));
                Ok(PipelineResponse::new(OutcomeStatus::Aborted, message)
                    .with_failure(FailureKind::UserCancelled))
            }
            other => {
                session.set_phase(other);
                Err(PipelineError::NoPendingCommand)
            }
        }
    }
}
