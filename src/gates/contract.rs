use std::sync::Arc;
use std::time::Duration;

use async_trait::async_trait;

use crate::error::FailureKind;
use crate::gates::{AddressType, Gate, GateData, GateInput, GateResult};
use crate::pipeline::events::Step;
use crate::providers::ChainReader;

const LOOKUP_FAILED: &str =
    "I cannot execute this command. I could not check whether the target is a contract.";

/// Distinguishes EOAs from contracts by code lookup.
pub struct ContractDetectionGate {
    chain: Arc<dyn ChainReader>,
    timeout: Duration,
}

impl ContractDetectionGate {
    pub fn new(chain: Arc<dyn ChainReader>, timeout: Duration) -> Self {
        Self { chain, timeout }
    }
}

#[async_trait]
impl Gate for ContractDetectionGate {
    fn step(&self) -> Step {
        Step::ContractDetection
    }

    async fn evaluate(&self, input: &GateInput) -> GateResult {
        let Some(address) = input.address.as_deref() else {
            return GateResult::fail(FailureKind::ContractLookupFailure, LOOKUP_FAILED);
        };

        match tokio::time::timeout(self.timeout, self.chain.has_code(address)).await {
            Ok(Ok(true)) => GateResult::pass(
                "Target is a contract. Continuing to source verification.",
                GateData::AddressType(AddressType::Contract),
            ),
            Ok(Ok(false)) => GateResult::pass(
                "Target is an EOA (no contract code). Skipping source and security scan.",
                GateData::AddressType(AddressType::Eoa),
            ),
            Ok(Err(e)) => {
                tracing::warn!("Code lookup for {} failed: {}", address, e);
                GateResult::fail(FailureKind::ContractLookupFailure, LOOKUP_FAILED)
            }
            Err(_) => {
                tracing::warn!("Code lookup for {} timed out", address);
                GateResult::fail(FailureKind::ContractLookupFailure, LOOKUP_FAILED)
            }
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::providers::SimulatedChain;
    use crate::providers::simulated::{DEMO_EOA, SAFE_VAULT};

    fn input(address: &str) -> GateInput {
        GateInput {
            address: Some(address.to_string()),
            ..GateInput::new(address)
        }
    }

    #[tokio::test]
    async fn eoa_passes_and_ends_chain() {
        let gate = ContractDetectionGate::new(
            Arc::new(SimulatedChain::demo(1)),
            Duration::from_secs(1),
        );
        let result = gate.evaluate(&input(DEMO_EOA)).await;
        assert!(result.passed);
        assert!(result.ends_chain());
    }

    #[tokio::test]
    async fn contract_passes_and_continues() {
        let gate = ContractDetectionGate::new(
            Arc::new(SimulatedChain::demo(1)),
            Duration::from_secs(1),
        );
        let result = gate.evaluate(&input(SAFE_VAULT)).await;
        assert!(result.passed);
        assert!(!result.ends_chain());
        assert_eq!(
            result.data,
            Some(GateData::AddressType(AddressType::Contract))
        );
    }

    #[tokio::test]
    async fn missing_address_fails_closed() {
        let gate = ContractDetectionGate::new(
            Arc::new(SimulatedChain::demo(1)),
            Duration::from_secs(1),
        );
        let result = gate.evaluate(&GateInput::new("whatever")).await;
        assert_eq!(result.failure, Some(FailureKind::ContractLookupFailure));
    }
}
