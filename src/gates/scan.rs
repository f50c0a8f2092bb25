use std::sync::Arc;
use std::time::Duration;

use async_trait::async_trait;

use crate::error::FailureKind;
use crate::gates::source::UNVERIFIED_SOURCE;
use crate::gates::{Gate, GateData, GateInput, GateResult};
use crate::pipeline::events::Step;
use crate::providers::{ScanDecision, SecurityScanResult, SecurityScanner};

/// Static vulnerability scan of verified source.
///
/// BLOCK aborts. WARN, ESCALATE and OFFLINE hold the command until the user
/// acknowledges. Only ALLOW passes.
pub struct SecurityScanGate {
    scanner: Arc<dyn SecurityScanner>,
    timeout: Duration,
}

impl SecurityScanGate {
    pub fn new(scanner: Arc<dyn SecurityScanner>, timeout: Duration) -> Self {
        Self { scanner, timeout }
    }

    async fn analyze(&self, source_code: &str) -> SecurityScanResult {
        match tokio::time::timeout(self.timeout, self.scanner.analyze(source_code)).await {
            Ok(Ok(result)) => result,
            Ok(Err(e)) => {
                tracing::warn!("Scanner {} unavailable: {}", self.scanner.name(), e);
                SecurityScanResult::offline()
            }
            Err(_) => {
                tracing::warn!(
                    "Scanner {} timed out after {:?}",
                    self.scanner.name(),
                    self.timeout
                );
                SecurityScanResult::offline()
            }
        }
    }
}

fn sentence(text: &str) -> &str {
    text.trim().trim_end_matches('.')
}

/// Map a scan result to the gate verdict and the sentence read to the user.
pub fn verdict(result: SecurityScanResult) -> GateResult {
    match result.decision {
        ScanDecision::Allow => GateResult::pass(
            format!("Security scan passed: {}.", sentence(&result.reason)),
            GateData::Scan(result),
        ),
        ScanDecision::Block => GateResult {
            passed: false,
            message: format!(
                "I cannot execute this command. Security scan blocked this contract: {}.",
                sentence(&result.summary)
            ),
            data: Some(GateData::Scan(result)),
            failure: Some(FailureKind::SecurityBlock),
            requires_acknowledgement: false,
        },
        ScanDecision::Warn => {
            let message = format!(
                "Security warning: {}. Risk score: {:.1}/10. {}. Say acknowledge to proceed anyway, or cancel to abort.",
                sentence(&result.summary),
                result.risk_score,
                sentence(&result.reason)
            );
            GateResult::hold(FailureKind::SecurityWarning, message, GateData::Scan(result))
        }
        ScanDecision::Escalate => {
            let message = format!(
                "Security review required: {}. The scanner could not clear this contract. Say acknowledge to proceed anyway, or cancel to abort.",
                sentence(&result.summary)
            );
            GateResult::hold(FailureKind::SecurityWarning, message, GateData::Scan(result))
        }
        ScanDecision::Offline => GateResult::hold(
            FailureKind::ProviderUnavailable,
            "The security scanner is unavailable, so this contract has not been analyzed. Say acknowledge to proceed without a scan, or cancel to abort.",
            GateData::Scan(result),
        ),
    }
}

#[async_trait]
impl Gate for SecurityScanGate {
    fn step(&self) -> Step {
        Step::SecurityScan
    }

    async fn evaluate(&self, input: &GateInput) -> GateResult {
        let Some(source) = input.source.as_ref().filter(|s| s.verified) else {
            return GateResult::fail(FailureKind::UnverifiedSource, UNVERIFIED_SOURCE);
        };
        let result = self.analyze(&source.source_code).await;
        tracing::debug!(
            "Scan decision {} (risk {:.1}) from {}",
            result.decision.as_str(),
            result.risk_score,
            self.scanner.name()
        );
        verdict(result)
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::error::ProviderError;
    use crate::providers::{ContractSource, SimulatedScanner};

    struct OfflineScanner;

    #[async_trait]
    impl SecurityScanner for OfflineScanner {
        fn name(&self) -> &str {
            "offline"
        }

        async fn analyze(&self, _source: &str) -> Result<SecurityScanResult, ProviderError> {
            Err(ProviderError::request_failed("kairo", "connection refused"))
        }
    }

    fn input(source_code: &str) -> GateInput {
        GateInput {
            source: Some(ContractSource {
                verified: true,
                source_code: source_code.to_string(),
                name: "Test".to_string(),
            }),
            ..GateInput::new("0x1111111111111111111111111111111111111111")
        }
    }

    fn gate(scanner: Arc<dyn SecurityScanner>) -> SecurityScanGate {
        SecurityScanGate::new(scanner, Duration::from_secs(1))
    }

    #[tokio::test]
    async fn block_names_the_vulnerability_class() {
        let result = gate(Arc::new(SimulatedScanner::new()))
            .evaluate(&input("msg.sender.call{value: bal}()"))
            .await;
        assert!(!result.passed);
        assert!(!result.requires_acknowledgement);
        assert_eq!(result.failure, Some(FailureKind::SecurityBlock));
        assert_eq!(
            result.message,
            "I cannot execute this command. Security scan blocked this contract: CWE-841: Re-entrancy Attack."
        );
    }

    #[tokio::test]
    async fn warn_holds_for_acknowledgement() {
        let result = gate(Arc::new(SimulatedScanner::new()))
            .evaluate(&input("target.delegatecall(data)"))
            .await;
        assert!(!result.passed);
        assert!(result.requires_acknowledgement);
        assert_eq!(result.failure, Some(FailureKind::SecurityWarning));
        assert_eq!(
            result.message,
            "Security warning: CWE-829: Unchecked Delegatecall. Risk score: 7.0/10. Unchecked delegatecall pattern. Say acknowledge to proceed anyway, or cancel to abort."
        );
    }

    #[tokio::test]
    async fn unreachable_scanner_degrades_to_offline_hold() {
        let result = gate(Arc::new(OfflineScanner)).evaluate(&input("contract A {}")).await;
        assert!(!result.passed);
        assert!(result.requires_acknowledgement);
        assert_eq!(result.failure, Some(FailureKind::ProviderUnavailable));
        assert_eq!(
            result.scan_result().map(|r| r.decision),
            Some(ScanDecision::Offline)
        );
    }

    #[tokio::test]
    async fn clean_source_passes() {
        let result = gate(Arc::new(SimulatedScanner::new()))
            .evaluate(&input("// Simulated Source"))
            .await;
        assert!(result.passed);
        assert_eq!(
            result.message,
            "Security scan passed: No critical vulnerabilities detected."
        );
    }

    #[test]
    fn escalate_holds_like_warn() {
        let result = verdict(SecurityScanResult {
            decision: ScanDecision::Escalate,
            reason: String::new(),
            risk_score: 0.0,
            summary: "Manual review".to_string(),
        });
        assert!(result.requires_acknowledgement);
        assert_eq!(result.failure, Some(FailureKind::SecurityWarning));
    }

    #[tokio::test]
    async fn missing_source_fails_closed() {
        let result = gate(Arc::new(SimulatedScanner::new()))
            .evaluate(&GateInput::new("0xabc"))
            .await;
        assert_eq!(result.failure, Some(FailureKind::UnverifiedSource));
    }
}
