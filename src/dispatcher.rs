//! Transaction dispatch: a live node-managed signer or a simulation stub.
//!
//! Both modes return the same [`TransactionReceipt`] shape. The mode is
//! fixed when the dispatcher is built.

use std::sync::Arc;
use std::time::Duration;

use chrono::{DateTime, Utc};
use rand::Rng;
use serde::Serialize;

use crate::error::DispatchError;
use crate::pipeline::command::{Amount, NATIVE_DECIMALS};
use crate::providers::{Signer, format_ether};

/// Length of a transaction hash string: `0x` plus 64 hex digits.
pub const TX_HASH_LEN: usize = 66;

#[derive(Debug, Clone, PartialEq, Eq, Serialize)]
pub struct TransactionReceipt {
    pub hash: String,
    pub simulated: bool,
    pub to: String,
    pub amount: Amount,
    pub created_at: DateTime<Utc>,
}

enum DispatchMode {
    Simulated { delay: Duration },
    Live { signer: Arc<dyn Signer> },
}

pub struct TransactionDispatcher {
    mode: DispatchMode,
}

impl std::fmt::Debug for TransactionDispatcher {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        match &self.mode {
            DispatchMode::Simulated { delay } => f
                .debug_struct("TransactionDispatcher")
                .field("mode", &"simulated")
                .field("delay", delay)
                .finish(),
            DispatchMode::Live { signer } => f
                .debug_struct("TransactionDispatcher")
                .field("mode", &"live")
                .field("signer", &signer.address())
                .finish(),
        }
    }
}

impl TransactionDispatcher {
    pub fn simulated(delay: Duration) -> Self {
        Self {
            mode: DispatchMode::Simulated { delay },
        }
    }

    pub fn live(signer: Arc<dyn Signer>) -> Self {
        Self {
            mode: DispatchMode::Live { signer },
        }
    }

    /// Live when a signer is available, simulated otherwise.
    pub fn from_signer(signer: Option<Arc<dyn Signer>>, simulated_delay: Duration) -> Self {
        match signer {
            Some(signer) => Self::live(signer),
            None => Self::simulated(simulated_delay),
        }
    }

    pub fn is_simulated(&self) -> bool {
        matches!(self.mode, DispatchMode::Simulated { .. })
    }

    /// Address funds are sent from, when live.
    pub fn signer_address(&self) -> Option<&str> {
        match &self.mode {
            DispatchMode::Live { signer } => Some(signer.address()),
            DispatchMode::Simulated { .. } => None,
        }
    }

    /// Transfer `amount` to `to`.
    pub async fn execute(
        &self,
        to: &str,
        amount: &Amount,
    ) -> Result<TransactionReceipt, DispatchError> {
        match &self.mode {
            DispatchMode::Simulated { delay } => {
                if !delay.is_zero() {
                    tokio::time::sleep(*delay).await;
                }
                let hash = random_tx_hash();
                tracing::info!("Simulated transfer of {} to {}: {}", amount, to, hash);
                Ok(TransactionReceipt {
                    hash,
                    simulated: true,
                    to: to.to_string(),
                    amount: amount.clone(),
                    created_at: Utc::now(),
                })
            }
            DispatchMode::Live { signer } => {
                if !amount.is_native() {
                    return Err(DispatchError::UnsupportedDenomination(
                        amount.denomination.clone(),
                    ));
                }
                let wei = amount
                    .to_base_units(NATIVE_DECIMALS)
                    .ok_or_else(|| DispatchError::InvalidAmount(amount.to_string()))?;

                let available = signer.balance(signer.address()).await?;
                if available < wei {
                    return Err(DispatchError::InsufficientFunds {
                        available: format_ether(available),
                        required: format_ether(wei),
                    });
                }

                let outcome = signer.send(to, wei).await?;
                if !outcome.confirmed {
                    return Err(DispatchError::Unconfirmed { hash: outcome.hash });
                }

                tracing::info!("Transfer of {} to {} confirmed: {}", amount, to, outcome.hash);
                Ok(TransactionReceipt {
                    hash: outcome.hash,
                    simulated: false,
                    to: to.to_string(),
                    amount: amount.clone(),
                    created_at: Utc::now(),
                })
            }
        }
    }
}

fn random_tx_hash() -> String {
    let mut bytes = [0u8; 32];
    rand::thread_rng().fill(&mut bytes);
    format!("0x{}", crate::encoding::to_hex(&bytes))
}

#[cfg(test)]
mod tests {
    use std::sync::Mutex;

    use async_trait::async_trait;

    use super::*;
    use crate::error::ProviderError;
    use crate::providers::SendOutcome;

    struct FakeSigner {
        balance: u128,
        confirmed: bool,
        sent: Mutex<Vec<(String, u128)>>,
    }

    impl FakeSigner {
        fn new(balance: u128, confirmed: bool) -> Self {
            Self {
                balance,
                confirmed,
                sent: Mutex::new(Vec::new()),
            }
        }
    }

    #[async_trait]
    impl Signer for FakeSigner {
        fn address(&self) -> &str {
            "0x5aAeb6053F3E94C9b9A09f33669435E7Ef1BeAed"
        }

        async fn balance(&self, _address: &str) -> Result<u128, ProviderError> {
            Ok(self.balance)
        }

        async fn send(&self, to: &str, value_wei: u128) -> Result<SendOutcome, ProviderError> {
            self.sent.lock().unwrap().push((to.to_string(), value_wei));
            Ok(SendOutcome {
                hash: format!("0x{}", "ab".repeat(32)),
                confirmed: self.confirmed,
            })
        }
    }

    #[tokio::test]
    async fn simulated_receipts_have_fixed_hash_length() {
        let dispatcher = TransactionDispatcher::simulated(Duration::ZERO);
        let amount: Amount = "1 ETH".parse().unwrap();

        let first = dispatcher.execute("0xabc", &amount).await.unwrap();
        let second = dispatcher.execute("0xabc", &amount).await.unwrap();

        assert!(first.simulated);
        assert_eq!(first.hash.len(), TX_HASH_LEN);
        assert!(first.hash.starts_with("0x"));
        assert!(first.hash[2..].bytes().all(|b| b.is_ascii_hexdigit()));
        assert_ne!(first.hash, second.hash);
    }

    #[tokio::test]
    async fn live_transfer_converts_to_wei() {
        let signer = Arc::new(FakeSigner::new(5_000_000_000_000_000_000, true));
        let dispatcher = TransactionDispatcher::live(signer.clone());
        let amount: Amount = "1.5 ETH".parse().unwrap();

        let receipt = dispatcher.execute("0xdead", &amount).await.unwrap();
        assert!(!receipt.simulated);
        assert_eq!(receipt.hash.len(), TX_HASH_LEN);
        assert_eq!(
            signer.sent.lock().unwrap().as_slice(),
            &[("0xdead".to_string(), 1_500_000_000_000_000_000)]
        );
    }

    #[tokio::test]
    async fn live_transfer_rejects_tokens_and_low_balance() {
        let signer = Arc::new(FakeSigner::new(1_000_000_000_000_000_000, true));
        let dispatcher = TransactionDispatcher::live(signer.clone());

        let usdc: Amount = "10 USDC".parse().unwrap();
        assert!(matches!(
            dispatcher.execute("0xdead", &usdc).await,
            Err(DispatchError::UnsupportedDenomination(d)) if d == "USDC"
        ));

        let too_much: Amount = "2 ETH".parse().unwrap();
        match dispatcher.execute("0xdead", &too_much).await {
            Err(DispatchError::InsufficientFunds { available, required }) => {
                assert_eq!(available, "1");
                assert_eq!(required, "2");
            }
            other => panic!("unexpected: {other:?}"),
        }
        assert!(signer.sent.lock().unwrap().is_empty());
    }

    #[tokio::test]
    async fn unconfirmed_submission_is_an_error() {
        let signer = Arc::new(FakeSigner::new(u128::MAX, false));
        let dispatcher = TransactionDispatcher::live(signer);
        let amount: Amount = "1 ETH".parse().unwrap();
        let err = dispatcher.execute("0xdead", &amount).await.unwrap_err();
        let hash = format!("0x{}", "ab".repeat(32));
        assert!(matches!(&err, DispatchError::Unconfirmed { hash: h } if *h == hash));
        assert!(err.to_string().contains(&hash));
    }
}
