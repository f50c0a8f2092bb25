use std::sync::Arc;
use std::time::Duration;

use async_trait::async_trait;

use crate::error::FailureKind;
use crate::gates::{Gate, GateData, GateInput, GateResult};
use crate::pipeline::events::Step;
use crate::providers::SourceRegistry;

pub(crate) const UNVERIFIED_SOURCE: &str =
    "I cannot execute this command. Contract source is unavailable or unverified.";

/// Requires verified source for contract targets. An unreachable registry
/// counts as unverified.
pub struct SourceVerificationGate {
    registry: Arc<dyn SourceRegistry>,
    timeout: Duration,
}

impl SourceVerificationGate {
    pub fn new(registry: Arc<dyn SourceRegistry>, timeout: Duration) -> Self {
        Self { registry, timeout }
    }
}

#[async_trait]
impl Gate for SourceVerificationGate {
    fn step(&self) -> Step {
        Step::Source
    }

    async fn evaluate(&self, input: &GateInput) -> GateResult {
        let Some(address) = input.address.as_deref() else {
            return GateResult::fail(FailureKind::UnverifiedSource, UNVERIFIED_SOURCE);
        };

        match tokio::time::timeout(self.timeout, self.registry.fetch_source(address)).await {
            Ok(Ok(source)) if source.verified && !source.source_code.trim().is_empty() => {
                let name = if source.name.is_empty() {
                    "unnamed contract".to_string()
                } else {
                    source.name.clone()
                };
                GateResult::pass(
                    format!("Contract source verified: {name}."),
                    GateData::Source(source),
                )
            }
            Ok(Ok(_)) => GateResult::fail(FailureKind::UnverifiedSource, UNVERIFIED_SOURCE),
            Ok(Err(e)) => {
                tracing::warn!(
                    "Source lookup for {} via {} failed: {}",
                    address,
                    self.registry.name(),
                    e
                );
                GateResult::fail(FailureKind::UnverifiedSource, UNVERIFIED_SOURCE)
            }
            Err(_) => {
                tracing::warn!(
                    "Source lookup for {} via {} timed out",
                    address,
                    self.registry.name()
                );
                GateResult::fail(FailureKind::UnverifiedSource, UNVERIFIED_SOURCE)
            }
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::error::ProviderError;
    use crate::providers::simulated::{REENTRANCY_TRAP, UNVERIFIED_TRAP};
    use crate::providers::{ContractSource, SimulatedSourceRegistry};

    struct DownRegistry;

    #[async_trait]
    impl SourceRegistry for DownRegistry {
        fn name(&self) -> &str {
            "down"
        }

        async fn fetch_source(&self, _address: &str) -> Result<ContractSource, ProviderError> {
            Err(ProviderError::HttpStatus {
                provider: "etherscan".to_string(),
                status: 503,
            })
        }
    }

    fn input(address: &str) -> GateInput {
        GateInput {
            address: Some(address.to_string()),
            ..GateInput::new(address)
        }
    }

    #[tokio::test]
    async fn verified_source_passes_with_source_data() {
        let gate =
            SourceVerificationGate::new(Arc::new(SimulatedSourceRegistry::new()), Duration::from_secs(1));
        let result = gate.evaluate(&input(REENTRANCY_TRAP)).await;
        assert!(result.passed);
        assert_eq!(result.message, "Contract source verified: VulnerableBank.");
        assert!(matches!(result.data, Some(GateData::Source(ref s)) if s.verified));
    }

    #[tokio::test]
    async fn unverified_source_fails() {
        let gate =
            SourceVerificationGate::new(Arc::new(SimulatedSourceRegistry::new()), Duration::from_secs(1));
        let result = gate.evaluate(&input(UNVERIFIED_TRAP)).await;
        assert!(!result.passed);
        assert_eq!(result.failure, Some(FailureKind::UnverifiedSource));
        assert_eq!(result.message, UNVERIFIED_SOURCE);
    }

    #[tokio::test]
    async fn unreachable_registry_is_never_verified() {
        let gate = SourceVerificationGate::new(Arc::new(DownRegistry), Duration::from_secs(1));
        let result = gate.evaluate(&input(REENTRANCY_TRAP)).await;
        assert!(!result.passed);
        assert!(!result.requires_acknowledgement);
        assert_eq!(result.failure, Some(FailureKind::UnverifiedSource));
    }
}
