use async_trait::async_trait;

use crate::encoding::keccak256;
use crate::error::FailureKind;
use crate::gates::{Gate, GateData, GateInput, GateResult};
use crate::pipeline::events::Step;

/// EIP-55 checksummed form of a `0x`-prefixed 40-hex-digit address.
pub fn to_checksum_address(address: &str) -> Option<String> {
    let body = address.strip_prefix("0x")?;
    if body.len() != 40 || !body.bytes().all(|b| b.is_ascii_hexdigit()) {
        return None;
    }
    let lower = body.to_ascii_lowercase();
    let hash = keccak256(lower.as_bytes());

    let mut out = String::with_capacity(42);
    out.push_str("0x");
    for (i, c) in lower.chars().enumerate() {
        let nibble = if i % 2 == 0 {
            hash[i / 2] >> 4
        } else {
            hash[i / 2] & 0x0f
        };
        if c.is_ascii_alphabetic() && nibble >= 8 {
            out.push(c.to_ascii_uppercase());
        } else {
            out.push(c);
        }
    }
    Some(out)
}

/// Validate address syntax. Single-case input is accepted as is; mixed-case
/// input must carry a correct checksum. Returns the checksummed address.
pub fn validate_address(address: &str) -> Option<String> {
    let checksummed = to_checksum_address(address)?;
    let body = &address[2..];
    let has_upper = body.bytes().any(|b| b.is_ascii_uppercase());
    let has_lower = body.bytes().any(|b| b.is_ascii_lowercase());
    if has_upper && has_lower && address != checksummed {
        return None;
    }
    Some(checksummed)
}

/// Address-format gate. Needs no collaborators.
#[derive(Debug, Default)]
pub struct AddressValidationGate;

#[async_trait]
impl Gate for AddressValidationGate {
    fn step(&self) -> Step {
        Step::Validation
    }

    async fn evaluate(&self, input: &GateInput) -> GateResult {
        let address = input.address.as_deref().unwrap_or(input.target.as_str());
        match validate_address(address) {
            Some(checksummed) => GateResult::pass(
                format!("Address format is valid: {checksummed}."),
                GateData::Address(checksummed),
            ),
            None => GateResult::fail(
                FailureKind::InvalidAddressFormat,
                format!("Invalid Ethereum address format: {address}"),
            ),
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    const CHECKSUMMED: [&str; 4] = [
        "0x5aAeb6053F3E94C9b9A09f33669435E7Ef1BeAed",
        "0xfB6916095ca1df60bB79Ce92cE3Ea74c37c5d359",
        "0xdbF03B407c01E7cD3CBea99509d93f8DDDC8C6FB",
        "0xD1220A0cf47c7B9Be7A2E6BA89F429762e7b9aDb",
    ];

    #[test]
    fn checksum_matches_published_vectors() {
        for address in CHECKSUMMED {
            assert_eq!(
                to_checksum_address(&address.to_ascii_lowercase()).as_deref(),
                Some(address)
            );
            assert_eq!(validate_address(address).as_deref(), Some(address));
        }
    }

    #[test]
    fn single_case_input_is_accepted() {
        let lower = CHECKSUMMED[0].to_ascii_lowercase();
        assert_eq!(validate_address(&lower).as_deref(), Some(CHECKSUMMED[0]));
        let upper = format!("0x{}", CHECKSUMMED[0][2..].to_ascii_uppercase());
        assert_eq!(validate_address(&upper).as_deref(), Some(CHECKSUMMED[0]));
    }

    #[test]
    fn bad_checksum_and_malformed_input_are_rejected() {
        // flip the case of the first letter of a valid checksum
        assert_eq!(
            validate_address("0x5AAeb6053F3E94C9b9A09f33669435E7Ef1BeAed"),
            None
        );
        assert_eq!(validate_address("5aaeb6053f3e94c9b9a09f33669435e7ef1beaed"), None);
        assert_eq!(validate_address("0x5aaeb6053f3e94c9b9a09f33669435e7ef1bea"), None);
        assert_eq!(validate_address("0xzzaeb6053f3e94c9b9a09f33669435e7ef1beaed"), None);
        assert_eq!(validate_address("vault.eth"), None);
    }

    #[tokio::test]
    async fn gate_reports_the_offending_string_verbatim() {
        let mut input = GateInput::new("0x123");
        input.address = Some("0x123".to_string());
        let result = AddressValidationGate.evaluate(&input).await;
        assert!(!result.passed);
        assert_eq!(result.failure, Some(FailureKind::InvalidAddressFormat));
        assert_eq!(result.message, "Invalid Ethereum address format: 0x123");
    }

    #[tokio::test]
    async fn gate_outputs_checksummed_address() {
        let mut input = GateInput::new("x");
        input.address = Some(CHECKSUMMED[1].to_ascii_lowercase());
        let result = AddressValidationGate.evaluate(&input).await;
        assert!(result.passed);
        assert_eq!(
            result.data,
            Some(GateData::Address(CHECKSUMMED[1].to_string()))
        );
    }
}
