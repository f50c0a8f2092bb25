//! Safety gates evaluated between confirmation and dispatch.
//!
//! A gate is a pure evaluation from [`GateInput`] to [`GateResult`]. Gates do
//! not publish events or touch session state; the orchestrator runs them in
//! order, folds their data into the next input and reports progress.

mod address;
mod contract;
mod name_resolution;
mod scan;
mod source;

use std::sync::Arc;
use std::time::Duration;

use async_trait::async_trait;
use serde::Serialize;

use crate::error::FailureKind;
use crate::pipeline::events::Step;
use crate::providers::{ContractSource, Providers, SecurityScanResult};

pub use self::address::{AddressValidationGate, to_checksum_address, validate_address};
pub use self::contract::ContractDetectionGate;
pub use self::name_resolution::NameResolutionGate;
pub use self::scan::SecurityScanGate;
pub use self::source::SourceVerificationGate;

#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize)]
#[serde(rename_all = "snake_case")]
pub enum AddressType {
    Eoa,
    Contract,
}

/// Accumulated input for the next gate.
#[derive(Debug, Clone, Default)]
pub struct GateInput {
    /// Target exactly as the user gave it.
    pub target: String,
    pub address: Option<String>,
    pub address_type: Option<AddressType>,
    pub source: Option<ContractSource>,
}

impl GateInput {
    pub fn new(target: impl Into<String>) -> Self {
        Self {
            target: target.into(),
            ..Self::default()
        }
    }

    /// Fold a gate's output into the input for the next gate.
    pub fn absorb(&mut self, data: &GateData) {
        match data {
            GateData::Address(address) => self.address = Some(address.clone()),
            GateData::AddressType(kind) => self.address_type = Some(*kind),
            GateData::Source(source) => self.source = Some(source.clone()),
            GateData::Scan(_) => {}
        }
    }
}

/// Structured output of a gate.
#[derive(Debug, Clone, PartialEq, Serialize)]
#[serde(tag = "kind", content = "value", rename_all = "snake_case")]
pub enum GateData {
    Address(String),
    AddressType(AddressType),
    Source(ContractSource),
    Scan(SecurityScanResult),
}

/// Immutable verdict of one gate.
#[derive(Debug, Clone, PartialEq, Serialize)]
pub struct GateResult {
    pub passed: bool,
    pub message: String,
    pub data: Option<GateData>,
    pub failure: Option<FailureKind>,
    /// Failure the user may acknowledge instead of aborting.
    pub requires_acknowledgement: bool,
}

impl GateResult {
    pub fn pass(message: impl Into<String>, data: GateData) -> Self {
        Self {
            passed: true,
            message: message.into(),
            data: Some(data),
            failure: None,
            requires_acknowledgement: false,
        }
    }

    pub fn fail(kind: FailureKind, message: impl Into<String>) -> Self {
        Self {
            passed: false,
            message: message.into(),
            data: None,
            failure: Some(kind),
            requires_acknowledgement: false,
        }
    }

    /// Failure that holds the command for acknowledgement.
    pub fn hold(kind: FailureKind, message: impl Into<String>, data: GateData) -> Self {
        Self {
            passed: false,
            message: message.into(),
            data: Some(data),
            failure: Some(kind),
            requires_acknowledgement: true,
        }
    }

    /// A passing result that makes the remaining gates irrelevant.
    pub fn ends_chain(&self) -> bool {
        self.passed && matches!(self.data, Some(GateData::AddressType(AddressType::Eoa)))
    }

    pub fn scan_result(&self) -> Option<&SecurityScanResult> {
        match &self.data {
            Some(GateData::Scan(result)) => Some(result),
            _ => None,
        }
    }
}

#[async_trait]
pub trait Gate: Send + Sync {
    /// Progress step reported for this gate.
    fn step(&self) -> Step;

    async fn evaluate(&self, input: &GateInput) -> GateResult;
}

/// Tunables shared by the provider-backed gates.
#[derive(Debug, Clone)]
pub struct GateSettings {
    /// Name suffixes routed to the resolver (`.eth` by default).
    pub naming_suffixes: Vec<String>,
    /// Upper bound on each provider call.
    pub timeout: Duration,
}

impl Default for GateSettings {
    fn default() -> Self {
        Self {
            naming_suffixes: vec![".eth".to_string()],
            timeout: Duration::from_secs(10),
        }
    }
}

/// The five gates in evaluation order.
pub fn standard_chain(providers: &Providers, settings: &GateSettings) -> Vec<Arc<dyn Gate>> {
    vec![
        Arc::new(NameResolutionGate::new(
            providers.resolver.clone(),
            settings.naming_suffixes.clone(),
            settings.timeout,
        )) as Arc<dyn Gate>,
        Arc::new(AddressValidationGate),
        Arc::new(ContractDetectionGate::new(
            providers.chain.clone(),
            settings.timeout,
        )),
        Arc::new(SourceVerificationGate::new(
            providers.sources.clone(),
            settings.timeout,
        )),
        Arc::new(SecurityScanGate::new(
            providers.scanner.clone(),
            settings.timeout,
        )),
    ]
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn chain_runs_in_fixed_step_order() {
        let providers = Providers::simulated(1);
        let steps: Vec<Step> = standard_chain(&providers, &GateSettings::default())
            .iter()
            .map(|gate| gate.step())
            .collect();
        assert_eq!(
            steps,
            vec![
                Step::NameResolution,
                Step::Validation,
                Step::ContractDetection,
                Step::Source,
                Step::SecurityScan,
            ]
        );
    }

    #[test]
    fn only_passing_eoa_detection_ends_chain() {
        let eoa = GateResult::pass("eoa", GateData::AddressType(AddressType::Eoa));
        let contract = GateResult::pass("c", GateData::AddressType(AddressType::Contract));
        assert!(eoa.ends_chain());
        assert!(!contract.ends_chain());
        assert!(!GateResult::fail(FailureKind::ContractLookupFailure, "x").ends_chain());
    }

    #[test]
    fn input_absorbs_gate_data() {
        let mut input = GateInput::new("vault.eth");
        input.absorb(&GateData::Address("0xabc".to_string()));
        input.absorb(&GateData::AddressType(AddressType::Contract));
        assert_eq!(input.address.as_deref(), Some("0xabc"));
        assert_eq!(input.address_type, Some(AddressType::Contract));
        assert_eq!(input.target, "vault.eth");
    }
}
