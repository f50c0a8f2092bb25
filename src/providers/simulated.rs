//! Offline providers for demos and tests.
//!
//! The fixtures reproduce the demo trap addresses: `0x000…0` has no verified
//! source, `0x111…1` is a re-entrancy bank, `0x222…2` is a delegatecall
//! proxy. Any other address is treated as verified and clean.

use std::collections::{HashMap, HashSet};
use std::sync::LazyLock;

use aho_corasick::AhoCorasick;
use async_trait::async_trait;

use crate::error::ProviderError;
use crate::providers::{
    ChainReader, ContractSource, NameResolver, ScanDecision, SecurityScanResult, SecurityScanner,
    SourceRegistry,
};

pub const UNVERIFIED_TRAP: &str = "0x0000000000000000000000000000000000000000";
pub const REENTRANCY_TRAP: &str = "0x1111111111111111111111111111111111111111";
pub const DELEGATECALL_TRAP: &str = "0x2222222222222222222222222222222222222222";
pub const SAFE_VAULT: &str = "0x3333333333333333333333333333333333333333";
pub const DEMO_EOA: &str = "0xd8dA6BF26964aF9D7eEd9e03E53415D37aA96045";

const WEI_PER_ETHER: u128 = 1_000_000_000_000_000_000;

/// In-memory chain: a name table, a set of addresses with code, balances.
#[derive(Debug, Clone, Default)]
pub struct SimulatedChain {
    chain_id: u64,
    names: HashMap<String, String>,
    contracts: HashSet<String>,
    balances: HashMap<String, u128>,
}

impl SimulatedChain {
    pub fn new(chain_id: u64) -> Self {
        Self {
            chain_id,
            ..Self::default()
        }
    }

    /// Chain seeded with the demo vault names.
    pub fn demo(chain_id: u64) -> Self {
        Self::new(chain_id)
            .with_name("safe-vault.eth", SAFE_VAULT)
            .with_name("vulnerable-vault.eth", REENTRANCY_TRAP)
            .with_name("proxy-vault.eth", DELEGATECALL_TRAP)
            .with_name("unverified-vault.eth", UNVERIFIED_TRAP)
            .with_name("vitalik.eth", DEMO_EOA)
            .with_contract(SAFE_VAULT)
            .with_contract(REENTRANCY_TRAP)
            .with_contract(DELEGATECALL_TRAP)
            .with_contract(UNVERIFIED_TRAP)
            .with_balance(DEMO_EOA, 1_000 * WEI_PER_ETHER)
    }

    pub fn with_name(mut self, name: &str, address: &str) -> Self {
        self.names.insert(name.to_lowercase(), address.to_string());
        self
    }

    pub fn with_contract(mut self, address: &str) -> Self {
        self.contracts.insert(address.to_lowercase());
        self
    }

    pub fn with_balance(mut self, address: &str, wei: u128) -> Self {
        self.balances.insert(address.to_lowercase(), wei);
        self
    }
}

#[async_trait]
impl NameResolver for SimulatedChain {
    async fn resolve(&self, name: &str) -> Result<Option<String>, ProviderError> {
        Ok(self.names.get(&name.trim().to_lowercase()).cloned())
    }
}

#[async_trait]
impl ChainReader for SimulatedChain {
    fn name(&self) -> &str {
        "simulated"
    }

    async fn chain_id(&self) -> Result<u64, ProviderError> {
        Ok(self.chain_id)
    }

    async fn block_number(&self) -> Result<u64, ProviderError> {
        Ok(1)
    }

    async fn has_code(&self, address: &str) -> Result<bool, ProviderError> {
        Ok(self.contracts.contains(&address.to_lowercase()))
    }

    async fn balance(&self, address: &str) -> Result<u128, ProviderError> {
        Ok(self
            .balances
            .get(&address.to_lowercase())
            .copied()
            .unwrap_or(0))
    }
}

#[derive(Debug, Default)]
pub struct SimulatedSourceRegistry;

impl SimulatedSourceRegistry {
    pub fn new() -> Self {
        Self
    }
}

#[async_trait]
impl SourceRegistry for SimulatedSourceRegistry {
    fn name(&self) -> &str {
        "simulated"
    }

    async fn fetch_source(&self, address: &str) -> Result<ContractSource, ProviderError> {
        let source = if address.eq_ignore_ascii_case(UNVERIFIED_TRAP) {
            ContractSource {
                verified: false,
                source_code: String::new(),
                name: "Unverified Trap".to_string(),
            }
        } else if address.eq_ignore_ascii_case(REENTRANCY_TRAP) {
            ContractSource {
                verified: true,
                source_code: "contract VulnerableBank { function withdraw() { msg.sender.call{value: bal}(); } }".to_string(),
                name: "VulnerableBank".to_string(),
            }
        } else if address.eq_ignore_ascii_case(DELEGATECALL_TRAP) {
            ContractSource {
                verified: true,
                source_code: "contract ProxyContract { function execute(address target, bytes data) { target.delegatecall(data); } }".to_string(),
                name: "ProxyContract".to_string(),
            }
        } else {
            ContractSource {
                verified: true,
                source_code: "// Simulated Source".to_string(),
                name: "SimulatedContract".to_string(),
            }
        };
        Ok(source)
    }
}

struct ScanRule {
    decision: ScanDecision,
    reason: &'static str,
    summary: &'static str,
    risk_score: f64,
}

/// Rules in priority order; the first matching rule wins.
const RULES: &[ScanRule] = &[
    ScanRule {
        decision: ScanDecision::Block,
        reason: "Critical re-entrancy vulnerability detected",
        summary: "CWE-841: Re-entrancy Attack",
        risk_score: 9.5,
    },
    ScanRule {
        decision: ScanDecision::Block,
        reason: "Dangerous self-destruct pattern detected",
        summary: "CWE-477: Dangerous Self-Destruct",
        risk_score: 8.0,
    },
    ScanRule {
        decision: ScanDecision::Warn,
        reason: "Unchecked delegatecall pattern",
        summary: "CWE-829: Unchecked Delegatecall",
        risk_score: 7.0,
    },
    ScanRule {
        decision: ScanDecision::Warn,
        reason: "Authorization via tx.origin",
        summary: "CWE-477: Authorization via tx.origin",
        risk_score: 6.0,
    },
];

/// (pattern, index into `RULES`)
const PATTERNS: &[(&str, usize)] = &[
    (".call{value:", 0),
    ("VulnerableBank", 0),
    ("selfdestruct", 1),
    ("delegatecall", 2),
    ("tx.origin", 3),
];

static MATCHER: LazyLock<AhoCorasick> = LazyLock::new(|| {
    AhoCorasick::new(PATTERNS.iter().map(|(pattern, _)| *pattern))
        .expect("scan patterns are valid")
});

/// Keyword scanner standing in for the live service.
#[derive(Debug, Default)]
pub struct SimulatedScanner;

impl SimulatedScanner {
    pub fn new() -> Self {
        Self
    }

    pub fn scan(&self, source_code: &str) -> SecurityScanResult {
        let rule = MATCHER
            .find_overlapping_iter(source_code)
            .map(|m| PATTERNS[m.pattern().as_usize()].1)
            .min()
            .map(|index| &RULES[index]);

        match rule {
            Some(rule) => SecurityScanResult {
                decision: rule.decision,
                reason: rule.reason.to_string(),
                risk_score: rule.risk_score,
                summary: rule.summary.to_string(),
            },
            None => SecurityScanResult {
                decision: ScanDecision::Allow,
                reason: "No critical vulnerabilities detected".to_string(),
                risk_score: 1.0,
                summary: "Contract passed all security checks".to_string(),
            },
        }
    }
}

#[async_trait]
impl SecurityScanner for SimulatedScanner {
    fn name(&self) -> &str {
        "simulated"
    }

    async fn analyze(&self, source_code: &str) -> Result<SecurityScanResult, ProviderError> {
        Ok(self.scan(source_code))
    }
}
