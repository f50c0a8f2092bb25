//! Parsed command types held by a session between `verify` and `execute`.

use std::fmt;
use std::str::FromStr;

use rust_decimal::Decimal;
use rust_decimal::prelude::ToPrimitive;
use serde::{Deserialize, Serialize};

/// Denomination of the chain's native currency.
pub const NATIVE_DENOMINATION: &str = "ETH";

/// Decimals of the native currency (wei per ether = 10^18).
pub const NATIVE_DECIMALS: u32 = 18;

/// Transaction action the user asked for.
#[derive(Debug, Clone, Copy, Serialize, Deserialize, PartialEq, Eq)]
#[serde(try_from = "String", into = "String")]
pub enum Action {
    Deposit,
    Swap,
    Send,
    Invest,
}

impl Action {
    pub fn as_str(self) -> &'static str {
        match self {
            Self::Deposit => "deposit",
            Self::Swap => "swap",
            Self::Send => "send",
            Self::Invest => "invest",
        }
    }

    /// Preposition used when restating the command aloud.
    pub fn preposition(self) -> &'static str {
        match self {
            Self::Send => "to",
            Self::Swap => "via",
            Self::Deposit | Self::Invest => "into",
        }
    }
}

impl fmt::Display for Action {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.as_str())
    }
}

impl FromStr for Action {
    type Err = String;

    fn from_str(raw: &str) -> Result<Self, Self::Err> {
        match raw.trim().to_ascii_lowercase().as_str() {
            "deposit" => Ok(Self::Deposit),
            "swap" => Ok(Self::Swap),
            "send" | "transfer" => Ok(Self::Send),
            "invest" => Ok(Self::Invest),
            other => Err(format!(
                "invalid action '{}': expected 'deposit', 'swap', 'send', or 'invest'",
                other
            )),
        }
    }
}

impl TryFrom<String> for Action {
    type Error = String;

    fn try_from(value: String) -> Result<Self, Self::Error> {
        value.parse()
    }
}

impl From<Action> for String {
    fn from(action: Action) -> Self {
        action.as_str().to_string()
    }
}

/// Amount with denomination, e.g. `1 ETH` or `500 USDC`.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
#[serde(try_from = "String", into = "String")]
pub struct Amount {
    pub value: Decimal,
    pub denomination: String,
}

impl Amount {
    pub fn new(value: Decimal, denomination: impl Into<String>) -> Self {
        Self {
            value,
            denomination: denomination.into().to_ascii_uppercase(),
        }
    }

    pub fn is_native(&self) -> bool {
        self.denomination.eq_ignore_ascii_case(NATIVE_DENOMINATION)
    }

    /// Integer base units (`value * 10^decimals`), or `None` when the value
    /// has more precision than the unit allows or does not fit.
    pub fn to_base_units(&self, decimals: u32) -> Option<u128> {
        let scale = Decimal::try_from_i128_with_scale(10i128.checked_pow(decimals)?, 0).ok()?;
        let units = self.value.checked_mul(scale)?;
        if units.fract() != Decimal::ZERO {
            return None;
        }
        units.to_u128()
    }
}

impl fmt::Display for Amount {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "{} {}", self.value.normalize(), self.denomination)
    }
}

impl FromStr for Amount {
    type Err = String;

    fn from_str(raw: &str) -> Result<Self, Self::Err> {
        let trimmed = raw.trim();
        let split = trimmed
            .find(|c: char| !(c.is_ascii_digit() || c == '.' || c == ','))
            .unwrap_or(trimmed.len());
        let (number, denomination) = trimmed.split_at(split);
        let number = number.replace(',', "");
        let denomination = denomination.trim();

        if number.is_empty() {
            return Err(format!("invalid amount '{}': missing a number", raw));
        }
        let value = Decimal::from_str(&number)
            .map_err(|e| format!("invalid amount '{}': {}", raw, e))?;
        if value <= Decimal::ZERO {
            return Err(format!("invalid amount '{}': must be greater than zero", raw));
        }
        if denomination.is_empty() {
            return Err(format!(
                "invalid amount '{}': missing a denomination such as ETH",
                raw
            ));
        }
        if !denomination.bytes().all(|b| b.is_ascii_alphanumeric()) {
            return Err(format!(
                "invalid amount '{}': denomination must be a token symbol",
                raw
            ));
        }
        Ok(Self::new(value, denomination))
    }
}

impl TryFrom<String> for Amount {
    type Error = String;

    fn try_from(value: String) -> Result<Self, Self::Error> {
        value.parse()
    }
}

impl From<Amount> for String {
    fn from(amount: Amount) -> Self {
        amount.to_string()
    }
}

/// The single command a session may hold between `verify` and a terminal
/// outcome.
#[derive(Debug, Clone, PartialEq, Eq, Serialize)]
pub struct PendingCommand {
    pub action: Action,
    pub amount: Amount,
    pub target: String,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub resolved_address: Option<String>,
    pub security_checks_passed: bool,
    pub warning_acknowledged: bool,
}

impl PendingCommand {
    pub fn new(action: Action, amount: Amount, target: impl Into<String>) -> Self {
        Self {
            action,
            amount,
            target: target.into().trim().to_string(),
            resolved_address: None,
            security_checks_passed: false,
            warning_acknowledged: false,
        }
    }

    /// Restatement used in the verification prompt.
    pub fn describe(&self) -> String {
        format!(
            "{} {} {} {}",
            self.action,
            self.amount,
            self.action.preposition(),
            self.target
        )
    }

    /// Both preconditions for dispatch.
    pub fn ready_for_dispatch(&self) -> bool {
        self.security_checks_passed && self.resolved_address.is_some()
    }
}

#[cfg(test)]
mod tests {
    use rust_decimal_macros::dec;

    use super::*;

    #[test]
    fn amount_parses_value_and_denomination() {
        let amount: Amount = "1.5 eth".parse().unwrap();
        assert_eq!(amount.value, dec!(1.5));
        assert_eq!(amount.denomination, "ETH");
        assert!(amount.is_native());
        assert_eq!(amount.to_string(), "1.5 ETH");

        let amount: Amount = "1,000USDC".parse().unwrap();
        assert_eq!(amount.value, dec!(1000));
        assert_eq!(amount.denomination, "USDC");
        assert!(!amount.is_native());
    }

    #[test]
    fn amount_rejects_missing_or_non_positive_parts() {
        assert!("ETH".parse::<Amount>().is_err());
        assert!("5".parse::<Amount>().is_err());
        assert!("0 ETH".parse::<Amount>().is_err());
        assert!("1 E-TH".parse::<Amount>().is_err());
    }

    #[test]
    fn base_units_reject_excess_precision() {
        let amount = Amount::new(dec!(1.25), "ETH");
        assert_eq!(
            amount.to_base_units(NATIVE_DECIMALS),
            Some(1_250_000_000_000_000_000)
        );

        let dust = Amount::new(dec!(0.0000000000000000001), "ETH");
        assert_eq!(dust.to_base_units(NATIVE_DECIMALS), None);
    }

    #[test]
    fn action_parsing_is_case_insensitive() {
        assert_eq!("Deposit".parse::<Action>().unwrap(), Action::Deposit);
        assert_eq!("transfer".parse::<Action>().unwrap(), Action::Send);
        assert!("borrow".parse::<Action>().is_err());
    }

    #[test]
    fn restatement_uses_action_preposition() {
        let command = PendingCommand::new(
            Action::Deposit,
            "1 ETH".parse().unwrap(),
            " my-vault.eth ",
        );
        assert_eq!(command.describe(), "deposit 1 ETH into my-vault.eth");

        let command = PendingCommand::new(Action::Send, "2 ETH".parse().unwrap(), "vitalik.eth");
        assert_eq!(command.describe(), "send 2 ETH to vitalik.eth");
        assert!(!command.ready_for_dispatch());
    }
}
