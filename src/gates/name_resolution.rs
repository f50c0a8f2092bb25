use std::sync::Arc;
use std::time::Duration;

use async_trait::async_trait;

use crate::error::FailureKind;
use crate::gates::{Gate, GateData, GateInput, GateResult};
use crate::pipeline::events::Step;
use crate::providers::NameResolver;

/// Resolves naming-service targets. Anything without a recognized suffix
/// passes through unchanged for the address gate to judge.
pub struct NameResolutionGate {
    resolver: Arc<dyn NameResolver>,
    suffixes: Vec<String>,
    timeout: Duration,
}

impl NameResolutionGate {
    pub fn new(resolver: Arc<dyn NameResolver>, suffixes: Vec<String>, timeout: Duration) -> Self {
        let suffixes = suffixes
            .into_iter()
            .map(|s| {
                let s = s.trim().to_ascii_lowercase();
                if s.starts_with('.') { s } else { format!(".{s}") }
            })
            .collect();
        Self {
            resolver,
            suffixes,
            timeout,
        }
    }

    fn is_name(&self, target: &str) -> bool {
        let lowered = target.to_ascii_lowercase();
        self.suffixes
            .iter()
            .any(|suffix| lowered.len() > suffix.len() && lowered.ends_with(suffix.as_str()))
    }
}

fn unresolved(name: &str) -> GateResult {
    GateResult::fail(
        FailureKind::ResolutionFailure,
        format!("Name resolution failed: could not resolve {name} to an address."),
    )
}

#[async_trait]
impl Gate for NameResolutionGate {
    fn step(&self) -> Step {
        Step::NameResolution
    }

    async fn evaluate(&self, input: &GateInput) -> GateResult {
        let target = input.target.trim();
        if !self.is_name(target) {
            return GateResult::pass(
                "Target is not an ENS name.",
                GateData::Address(target.to_string()),
            );
        }

        match tokio::time::timeout(self.timeout, self.resolver.resolve(target)).await {
            Ok(Ok(Some(address))) if !address.trim().is_empty() => GateResult::pass(
                format!("Resolved {target} to {address}."),
                GateData::Address(address),
            ),
            Ok(Ok(_)) => unresolved(target),
            Ok(Err(e)) => {
                tracing::warn!("Name resolution for {} failed: {}", target, e);
                unresolved(target)
            }
            Err(_) => {
                tracing::warn!(
                    "Name resolution for {} timed out after {:?}",
                    target,
                    self.timeout
                );
                unresolved(target)
            }
        }
    }
}
