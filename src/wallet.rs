//! Wallet backend contract and an in-memory ledger implementing it.
//!
//! The backend owns the authoritative balance. Every mutating call is
//! idempotent on the bet id, so the settlement protocol can retry freely.

use crate::errors::WalletError;
use crate::games::rng;
use crate::games::types::{Amount, BetId};
use async_trait::async_trait;
use dashmap::DashMap;
use rand::Rng;
use rand_chacha::ChaCha8Rng;
use std::sync::atomic::{AtomicU64, Ordering};
use std::sync::Mutex;
use std::time::Duration;

/// Remote balance authority
#[async_trait]
pub trait WalletBackend: Send + Sync {
    /// Take `amount` from the player. Repeating a bet id is a no-op.
    async fn debit(&self, user_id: &str, bet_id: BetId, amount: Amount) -> Result<(), WalletError>;

    /// Pay `amount` (stake included) for a settled bet and return the new balance
    async fn credit(&self, user_id: &str, bet_id: BetId, amount: Amount) -> Result<Amount, WalletError>;

    /// Record that a bet lost; the debit already covered it
    async fn mark_loss(&self, user_id: &str, bet_id: BetId) -> Result<(), WalletError>;

    async fn get_balance(&self, user_id: &str) -> Result<Amount, WalletError>;
}

/// Fault plan for the in-memory wallet
#[derive(Debug, Clone, Default)]
pub struct WalletFaults {
    /// Delay before every call is handled
    pub latency: Duration,
    /// Every call fails with `Unavailable` before touching the ledger
    pub unavailable: bool,
    /// Debits fail with `Rejected`
    pub reject_debits: bool,
    /// Calls apply to the ledger but the reply is lost
    pub lose_replies: bool,
    /// Probability that any single call fails with `Unavailable`
    pub failure_rate: f64,
}

#[derive(Debug, Default)]
pub struct CallCounts {
    pub debit: AtomicU64,
    pub credit: AtomicU64,
    pub mark_loss: AtomicU64,
    pub get_balance: AtomicU64,
}

/// Ledger held in process memory, with injectable faults
#[derive(Debug)]
pub struct InMemoryWallet {
    balances: DashMap<String, Amount>,
    debits: DashMap<BetId, Amount>,
    credits: DashMap<BetId, Amount>,
    losses: DashMap<BetId, ()>,
    faults: Mutex<WalletFaults>,
    chaos: Mutex<ChaCha8Rng>,
    pub calls: CallCounts,
}

impl InMemoryWallet {
    pub fn new() -> Self {
        Self::with_seed(0)
    }

    /// Seed for the random `failure_rate` faults
    pub fn with_seed(seed: u64) -> Self {
        Self {
            balances: DashMap::new(),
            debits: DashMap::new(),
            credits: DashMap::new(),
            losses: DashMap::new(),
            faults: Mutex::new(WalletFaults::default()),
            chaos: Mutex::new(rng::seeded(seed)),
            calls: CallCounts::default(),
        }
    }

    pub fn set_balance(&self, user_id: &str, amount: Amount) {
        self.balances.insert(user_id.to_string(), amount);
    }

    pub fn balance(&self, user_id: &str) -> Amount {
        self.balances.get(user_id).map(|b| *b).unwrap_or(0)
    }

    pub fn set_faults(&self, faults: WalletFaults) {
        *self.faults.lock().unwrap_or_else(|e| e.into_inner()) = faults;
    }

    pub fn clear_faults(&self) {
        self.set_faults(WalletFaults::default());
    }

    pub fn debited(&self, bet_id: BetId) -> Option<Amount> {
        self.debits.get(&bet_id).map(|a| *a)
    }

    pub fn credited(&self, bet_id: BetId) -> Option<Amount> {
        self.credits.get(&bet_id).map(|a| *a)
    }

    pub fn is_marked_lost(&self, bet_id: BetId) -> bool {
        self.losses.contains_key(&bet_id)
    }

    /// Apply latency and pre-ledger faults
    async fn before_call(&self, operation: &str) -> Result<WalletFaults, WalletError> {
        let faults = self.faults.lock().unwrap_or_else(|e| e.into_inner()).clone();
        if !faults.latency.is_zero() {
            tokio::time::sleep(faults.latency).await;
        }
        if faults.unavailable {
            return Err(WalletError::Unavailable(format!("{} refused: backend offline", operation)));
        }
        if faults.failure_rate > 0.0 {
            let roll: f64 = self.chaos.lock().unwrap_or_else(|e| e.into_inner()).gen();
            if roll < faults.failure_rate {
                return Err(WalletError::Unavailable(format!("{} dropped", operation)));
            }
        }
        Ok(faults)
    }

    fn after_call<T>(faults: &WalletFaults, operation: &str, value: T) -> Result<T, WalletError> {
        if faults.lose_replies {
            Err(WalletError::Unavailable(format!("{} reply lost", operation)))
        } else {
            Ok(value)
        }
    }
}

impl Default for InMemoryWallet {
    fn default() -> Self {
        Self::new()
    }
}

#[async_trait]
impl WalletBackend for InMemoryWallet {
    async fn debit(&self, user_id: &str, bet_id: BetId, amount: Amount) -> Result<(), WalletError> {
        self.calls.debit.fetch_add(1, Ordering::Relaxed);
        let faults = self.before_call("debit").await?;
        if faults.reject_debits {
            return Err(WalletError::Rejected(format!("debit for bet {} refused", bet_id)));
        }

        let mut balance = self.balances.entry(user_id.to_string()).or_insert(0);
        if !self.debits.contains_key(&bet_id) {
            if *balance < amount {
                return Err(WalletError::Rejected(format!(
                    "insufficient funds: {} < {}",
                    *balance, amount
                )));
            }
            *balance -= amount;
            self.debits.insert(bet_id, amount);
        }
        drop(balance);
        Self::after_call(&faults, "debit", ())
    }

    async fn credit(&self, user_id: &str, bet_id: BetId, amount: Amount) -> Result<Amount, WalletError> {
        self.calls.credit.fetch_add(1, Ordering::Relaxed);
        let faults = self.before_call("credit").await?;

        let mut balance = self.balances.entry(user_id.to_string()).or_insert(0);
        if !self.credits.contains_key(&bet_id) {
            *balance = balance.saturating_add(amount);
            self.credits.insert(bet_id, amount);
        }
        let new_balance = *balance;
        drop(balance);
        Self::after_call(&faults, "credit", new_balance)
    }

    async fn mark_loss(&self, _user_id: &str, bet_id: BetId) -> Result<(), WalletError> {
        self.calls.mark_loss.fetch_add(1, Ordering::Relaxed);
        let faults = self.before_call("mark_loss").await?;
        self.losses.insert(bet_id, ());
        Self::after_call(&faults, "mark_loss", ())
    }

    async fn get_balance(&self, user_id: &str) -> Result<Amount, WalletError> {
        self.calls.get_balance.fetch_add(1, Ordering::Relaxed);
        let faults = self.before_call("get_balance").await?;
        let balance = self.balance(user_id);
        Self::after_call(&faults, "get_balance", balance)
    }
}
