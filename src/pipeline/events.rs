//! Progress events published to observers (the dashboard).
//!
//! Events are a side channel. Publishing can fail (nobody listening, lagging
//! receivers) and the pipeline never looks at the outcome beyond a debug log.

use serde::Serialize;
use tokio::sync::broadcast;
use uuid::Uuid;

/// Default capacity of the broadcast ring buffer.
const DEFAULT_EVENT_CAPACITY: usize = 256;

#[derive(Debug, Clone, Copy, Serialize, PartialEq, Eq)]
#[serde(rename_all = "SCREAMING_SNAKE_CASE")]
pub enum EventType {
    GateUpdate,
    ScanResult,
}

#[derive(Debug, Clone, Copy, Serialize, PartialEq, Eq)]
#[serde(rename_all = "SCREAMING_SNAKE_CASE")]
pub enum Step {
    Verification,
    NameResolution,
    Validation,
    ContractDetection,
    Source,
    SecurityScan,
    Execution,
}

impl Step {
    pub fn as_str(self) -> &'static str {
        match self {
            Self::Verification => "VERIFICATION",
            Self::NameResolution => "NAME_RESOLUTION",
            Self::Validation => "VALIDATION",
            Self::ContractDetection => "CONTRACT_DETECTION",
            Self::Source => "SOURCE",
            Self::SecurityScan => "SECURITY_SCAN",
            Self::Execution => "EXECUTION",
        }
    }
}

#[derive(Debug, Clone, Copy, Serialize, PartialEq, Eq)]
#[serde(rename_all = "SCREAMING_SNAKE_CASE")]
pub enum StepState {
    Pending,
    Running,
    Passed,
    Failed,
    Executed,
}

/// Wire shape: `{type, step, state, detail?, issues?}`.
#[derive(Debug, Clone, Serialize, PartialEq)]
pub struct ProgressEvent {
    #[serde(rename = "type")]
    pub kind: EventType,
    pub step: Step,
    pub state: StepState,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub detail: Option<String>,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub issues: Option<Vec<String>>,
}

impl ProgressEvent {
    pub fn gate(step: Step, state: StepState) -> Self {
        Self {
            kind: EventType::GateUpdate,
            step,
            state,
            detail: None,
            issues: None,
        }
    }

    pub fn scan(state: StepState) -> Self {
        Self {
            kind: EventType::ScanResult,
            step: Step::SecurityScan,
            state,
            detail: None,
            issues: None,
        }
    }

    pub fn with_detail(mut self, detail: impl Into<String>) -> Self {
        self.detail = Some(detail.into());
        self
    }

    pub fn with_issues(mut self, issues: Vec<String>) -> Self {
        self.issues = Some(issues);
        self
    }
}

/// Event tagged with the session it belongs to.
#[derive(Debug, Clone, Serialize, PartialEq)]
pub struct SessionEvent {
    pub session_id: Uuid,
    #[serde(flatten)]
    pub event: ProgressEvent,
}

#[derive(Debug, thiserror::Error)]
pub enum PublishError {
    #[error("no subscribers are listening")]
    NoSubscribers,
}

/// Observer notified by the orchestrator after each transition.
pub trait EventSink: Send + Sync {
    fn publish(&self, session_id: Uuid, event: ProgressEvent) -> Result<(), PublishError>;
}

/// Sink that drops everything.
#[derive(Debug, Default)]
pub struct NoopSink;

impl EventSink for NoopSink {
    fn publish(&self, _session_id: Uuid, _event: ProgressEvent) -> Result<(), PublishError> {
        Ok(())
    }
}

/// Fan-out broadcaster backed by a `tokio::sync::broadcast` channel.
#[derive(Debug)]
pub struct EventBroadcaster {
    tx: broadcast::Sender<SessionEvent>,
}

impl EventBroadcaster {
    pub fn new() -> Self {
        Self::with_capacity(DEFAULT_EVENT_CAPACITY)
    }

    pub fn with_capacity(capacity: usize) -> Self {
        let (tx, _) = broadcast::channel(capacity.max(1));
        Self { tx }
    }

    pub fn subscribe(&self) -> broadcast::Receiver<SessionEvent> {
        self.tx.subscribe()
    }

    pub fn subscriber_count(&self) -> usize {
        self.tx.receiver_count()
    }
}

impl Default for EventBroadcaster {
    fn default() -> Self {
        Self::new()
    }
}

impl EventSink for EventBroadcaster {
    fn publish(&self, session_id: Uuid, event: ProgressEvent) -> Result<(), PublishError> {
        self.tx
            .send(SessionEvent { session_id, event })
            .map(|_| ())
            .map_err(|_| PublishError::NoSubscribers)
    }
}

#[cfg(test)]
mod tests {
    use pretty_assertions::assert_eq;

    use super::*;

    #[test]
    fn event_serializes_to_dashboard_schema() {
        let event = ProgressEvent::gate(Step::NameResolution, StepState::Passed)
            .with_detail("Resolved vault.eth");
        assert_eq!(
            serde_json::to_value(&event).unwrap(),
            serde_json::json!({
                "type": "GATE_UPDATE",
                "step": "NAME_RESOLUTION",
                "state": "PASSED",
                "detail": "Resolved vault.eth"
            })
        );

        let scan = ProgressEvent::scan(StepState::Failed)
            .with_issues(vec!["CWE-841: Re-entrancy Attack".to_string()]);
        assert_eq!(
            serde_json::to_value(&scan).unwrap(),
            serde_json::json!({
                "type": "SCAN_RESULT",
                "step": "SECURITY_SCAN",
                "state": "FAILED",
                "issues": ["CWE-841: Re-entrancy Attack"]
            })
        );
    }

    #[test]
    fn publishing_without_subscribers_reports_but_does_not_panic() {
        let broadcaster = EventBroadcaster::new();
        let result = broadcaster.publish(
            Uuid::new_v4(),
            ProgressEvent::gate(Step::Verification, StepState::Pending),
        );
        assert!(matches!(result, Err(PublishError::NoSubscribers)));
    }

    #[tokio::test]
    async fn subscribers_receive_session_tagged_events() {
        let broadcaster = EventBroadcaster::new();
        let mut rx = broadcaster.subscribe();
        let session_id = Uuid::new_v4();

        broadcaster
            .publish(
                session_id,
                ProgressEvent::gate(Step::Execution, StepState::Executed),
            )
            .unwrap();

        let received = rx.recv().await.unwrap();
        assert_eq!(received.session_id, session_id);
        assert_eq!(received.event.state, StepState::Executed);
        assert_eq!(broadcaster.subscriber_count(), 1);
    }
}
