//! Bet settlement protocol
//!
//! Drives every wager through open, optimistic debit, backend confirmation,
//! resolution, credit or loss mark, and reconciliation. The local balance
//! mirror moves immediately; the wallet backend catches up, and anything it
//! has not acknowledged sits in a durable pending slot until it does.

use crate::errors::{SettlementError, WalletError};
use crate::games::pending_pool::{PendingResult, PendingStore};
use crate::games::stats::SessionStats;
use crate::games::types::{Amount, Bet, BetId, BetStatus, GameKind, Outcome, RoundSettlement};
use crate::wallet::WalletBackend;
use serde::{Deserialize, Serialize};
use std::collections::HashMap;
use std::future::Future;
use std::sync::Arc;
use std::time::Duration;
use tokio::sync::Mutex;
use tokio::task::JoinHandle;
use tokio::time::Instant;
use tracing::{debug, error, info, warn};

/// Timing for backend calls and the play lock
#[derive(Debug, Clone, Serialize, Deserialize)]
#[serde(default)]
pub struct SettlementConfig {
    pub debit_timeout_ms: u64,
    pub resolve_timeout_ms: u64,
    pub balance_timeout_ms: u64,
    /// A play lock older than this is released on the next `open`
    pub lock_timeout_ms: u64,
    pub reconcile_interval_ms: u64,
    /// Directory for durable pending results; in-memory when unset
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub pending_dir: Option<String>,
}

impl Default for SettlementConfig {
    fn default() -> Self {
        Self {
            debit_timeout_ms: 4_000,
            resolve_timeout_ms: 4_000,
            balance_timeout_ms: 4_000,
            lock_timeout_ms: 15_000,
            reconcile_interval_ms: 30_000,
            pending_dir: None,
        }
    }
}

impl SettlementConfig {
    pub fn lock_timeout(&self) -> Duration {
        Duration::from_millis(self.lock_timeout_ms)
    }

    pub fn reconcile_interval(&self) -> Duration {
        Duration::from_millis(self.reconcile_interval_ms)
    }
}

/// Result of a pending-slot flush
#[derive(Debug, Clone, Copy, Default, PartialEq, Eq, Serialize, Deserialize)]
pub struct FlushReport {
    /// Debits confirmed for bets still in play
    pub debits_confirmed: usize,
    /// Pending results the backend acknowledged
    pub flushed: usize,
    /// Pending results still waiting
    pub still_pending: usize,
}

/// Result of replacing the mirror with the authoritative balance
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
pub struct ReconcileReport {
    pub previous: Amount,
    pub authoritative: Amount,
    /// `authoritative - previous`
    pub drift: i128,
    pub flush: FlushReport,
}

#[derive(Debug, Clone, Copy)]
struct PlayLock {
    bet_id: BetId,
    acquired_at: Instant,
}

#[derive(Debug, Default)]
struct SessionState {
    mirror: Amount,
    bets: HashMap<BetId, Bet>,
    /// Bet ids in the order they were opened
    order: Vec<BetId>,
    lock: Option<PlayLock>,
    /// Bets in play whose debit the backend has not confirmed
    unconfirmed_debits: Vec<BetId>,
}

impl SessionState {
    fn release_lock_for(&mut self, bet_id: BetId) {
        if self.lock.map(|l| l.bet_id) == Some(bet_id) {
            self.lock = None;
        }
    }

    /// Open bet of `kind` that has not reached a terminal status yet
    fn unresolved_of(&self, kind: GameKind) -> Option<BetId> {
        self.order
            .iter()
            .rev()
            .filter_map(|id| self.bets.get(id))
            .find(|bet| bet.game_kind == kind && !bet.status.is_terminal())
            .map(|bet| bet.id)
    }

    /// Drop the lock if it outlived the liveness timeout
    fn expire_lock(&mut self, timeout: Duration) {
        if let Some(lock) = self.lock {
            if lock.acquired_at.elapsed() >= timeout {
                warn!(
                    "Play lock for bet {} held longer than {:?}, releasing it",
                    lock.bet_id, timeout
                );
                self.lock = None;
            }
        }
    }
}

/// One player's session against a wallet backend
pub struct SettlementProtocol {
    user_id: String,
    config: SettlementConfig,
    wallet: Arc<dyn WalletBackend>,
    store: Arc<dyn PendingStore>,
    state: Mutex<SessionState>,
}

impl SettlementProtocol {
    /// Session with an empty mirror; call `reconcile` to load the balance
    pub fn new(
        user_id: impl Into<String>,
        config: SettlementConfig,
        wallet: Arc<dyn WalletBackend>,
        store: Arc<dyn PendingStore>,
    ) -> Self {
        Self {
            user_id: user_id.into(),
            config,
            wallet,
            store,
            state: Mutex::new(SessionState::default()),
        }
    }

    /// Create a session and reconcile once, flushing anything left from a previous run
    pub async fn connect(
        user_id: impl Into<String>,
        config: SettlementConfig,
        wallet: Arc<dyn WalletBackend>,
        store: Arc<dyn PendingStore>,
    ) -> Result<Self, SettlementError> {
        let protocol = Self::new(user_id, config, wallet, store);
        let report = protocol.reconcile().await?;
        info!(
            "Session for {} connected with balance {} ({} pending results flushed)",
            protocol.user_id, report.authoritative, report.flush.flushed
        );
        Ok(protocol)
    }

    pub fn user_id(&self) -> &str {
        &self.user_id
    }

    pub fn config(&self) -> &SettlementConfig {
        &self.config
    }

    /// Local, non-authoritative balance
    pub async fn mirror(&self) -> Amount {
        self.state.lock().await.mirror
    }

    pub async fn bet(&self, bet_id: BetId) -> Option<Bet> {
        self.state.lock().await.bets.get(&bet_id).cloned()
    }

    /// All bets of this session, oldest first
    pub async fn history(&self) -> Vec<Bet> {
        let state = self.state.lock().await;
        state
            .order
            .iter()
            .filter_map(|id| state.bets.get(id).cloned())
            .collect()
    }

    pub async fn stats(&self) -> SessionStats {
        let state = self.state.lock().await;
        SessionStats::from_bets(state.order.iter().filter_map(|id| state.bets.get(id)))
    }

    /// Whether a bet currently holds the play lock
    pub async fn is_playing(&self) -> bool {
        let state = self.state.lock().await;
        state
            .lock
            .map(|l| l.acquired_at.elapsed() < self.config.lock_timeout())
            .unwrap_or(false)
    }

    pub fn pending(&self) -> Result<Vec<PendingResult>, SettlementError> {
        Ok(self.store.all()?)
    }

    /// Open a bet: reserve the stake locally, then ask the backend to debit it.
    ///
    /// A backend timeout leaves the bet `Debited` and playable; the debit is
    /// retried on the next flush. An explicit rejection aborts the bet and
    /// restores the mirror.
    pub async fn open(&self, game_kind: GameKind, stake: Amount) -> Result<BetId, SettlementError> {
        if stake == 0 {
            return Err(SettlementError::InvalidStake);
        }

        {
            let mut state = self.state.lock().await;
            state.expire_lock(self.config.lock_timeout());
            if let Some(lock) = state.lock {
                return Err(SettlementError::RoundInProgress(lock.bet_id));
            }
        }

        if let Err(e) = self.flush_pending().await {
            error!("Failed to flush pending results before opening a {} bet: {}", game_kind, e);
        }

        let bet_id = {
            let mut state = self.state.lock().await;
            state.expire_lock(self.config.lock_timeout());
            if let Some(lock) = state.lock {
                return Err(SettlementError::RoundInProgress(lock.bet_id));
            }
            // An expired lock frees the table, not the game kind: its bet still owns the pending slot
            if let Some(unresolved) = state.unresolved_of(game_kind) {
                return Err(SettlementError::RoundInProgress(unresolved));
            }
            if self.store.load(game_kind)?.is_some() {
                return Err(SettlementError::PendingSettlement(game_kind));
            }
            if stake > state.mirror {
                return Err(SettlementError::InsufficientFunds {
                    stake,
                    available: state.mirror,
                });
            }

            let mut bet = Bet::new(game_kind, stake);
            bet.transition(BetStatus::Debited)?;
            let bet_id = bet.id;
            state.mirror -= stake;
            state.lock = Some(PlayLock {
                bet_id,
                acquired_at: Instant::now(),
            });
            state.order.push(bet_id);
            state.bets.insert(bet_id, bet);
            bet_id
        };

        info!("Opened {} bet {} for {}", game_kind, bet_id, stake);

        let debit = self
            .call("debit", self.config.debit_timeout_ms, self.wallet.debit(&self.user_id, bet_id, stake))
            .await;

        let mut state = self.state.lock().await;
        match debit {
            Ok(()) => {
                if let Some(bet) = state.bets.get_mut(&bet_id) {
                    bet.debit_confirmed = true;
                    if bet.status == BetStatus::Debited {
                        bet.transition(BetStatus::Confirmed)?;
                    }
                }
                Ok(bet_id)
            }
            Err(e) if e.is_retryable() => {
                warn!("Debit for bet {} not confirmed ({}), continuing optimistically", bet_id, e);
                state.unconfirmed_debits.push(bet_id);
                Ok(bet_id)
            }
            Err(e) => {
                warn!("Backend refused debit for bet {}: {}", bet_id, e);
                Self::abort_bet(&mut state, bet_id)?;
                Err(e)
            }
        }
    }

    /// Resolve an open bet with an outcome. Resolving again with the same
    /// outcome is a no-op; a different outcome is refused.
    pub async fn resolve(&self, bet_id: BetId, outcome: Outcome) -> Result<Bet, SettlementError> {
        let (record, settled) = {
            let mut state = self.state.lock().await;
            let bet = state
                .bets
                .get_mut(&bet_id)
                .ok_or(SettlementError::UnknownBet(bet_id))?;
            let outcome = Outcome::from_payout(bet.stake, outcome.payout(bet.stake));

            if bet.status.is_terminal() {
                return match bet.outcome() {
                    Some(existing) if existing == outcome => {
                        debug!("Bet {} already settled as {:?}, ignoring repeat", bet_id, outcome);
                        Ok(bet.clone())
                    }
                    Some(_) => Err(SettlementError::AlreadySettled(bet_id)),
                    None => Err(SettlementError::InvalidTransition {
                        from: bet.status,
                        to: outcome.terminal_status(),
                    }),
                };
            }

            bet.transition(BetStatus::Resolving)?;
            bet.transition(outcome.terminal_status())?;
            let payout = outcome.payout(bet.stake);
            if payout > 0 {
                bet.payout = Some(payout);
            }

            let record = PendingResult::new(bet_id, bet.game_kind, bet.stake, outcome, bet.debit_confirmed);
            let settled = bet.clone();

            state.mirror = state.mirror.saturating_add(payout);
            state.unconfirmed_debits.retain(|id| *id != bet_id);
            state.release_lock_for(bet_id);
            (record, settled)
        };

        info!(
            "Resolved {} bet {} as {:?}, payout {}",
            settled.game_kind,
            bet_id,
            settled.status,
            settled.payout.unwrap_or(0)
        );

        if !self.deliver(record).await? {
            info!("Result for bet {} parked until the backend acknowledges it", bet_id);
        }

        Ok(self.bet(bet_id).await.unwrap_or(settled))
    }

    /// Resolve a bet from a finished engine round
    pub async fn settle<R>(&self, bet_id: BetId, round: &R) -> Result<Bet, SettlementError>
    where
        R: RoundSettlement + ?Sized,
    {
        let (expected, stake) = {
            let state = self.state.lock().await;
            let bet = state.bets.get(&bet_id).ok_or(SettlementError::UnknownBet(bet_id))?;
            (bet.game_kind, bet.stake)
        };
        if round.game_kind() != expected {
            return Err(SettlementError::GameKindMismatch {
                expected,
                actual: round.game_kind(),
            });
        }
        if !round.is_complete() {
            return Err(SettlementError::RoundIncomplete(bet_id));
        }
        self.resolve(bet_id, Outcome::from_payout(stake, round.payout())).await
    }

    /// Retry unconfirmed debits and every parked result
    pub async fn flush_pending(&self) -> Result<FlushReport, SettlementError> {
        let mut report = FlushReport::default();

        let retries: Vec<(BetId, Amount)> = {
            let state = self.state.lock().await;
            state
                .unconfirmed_debits
                .iter()
                .filter_map(|id| state.bets.get(id).map(|b| (*id, b.stake)))
                .collect()
        };

        for (bet_id, stake) in retries {
            let result = self
                .call("debit", self.config.debit_timeout_ms, self.wallet.debit(&self.user_id, bet_id, stake))
                .await;
            let mut state = self.state.lock().await;
            // The bet may have resolved while the call was in flight
            if !state.unconfirmed_debits.contains(&bet_id) {
                continue;
            }
            match result {
                Ok(()) => {
                    state.unconfirmed_debits.retain(|id| *id != bet_id);
                    if let Some(bet) = state.bets.get_mut(&bet_id) {
                        bet.debit_confirmed = true;
                        if bet.status == BetStatus::Debited {
                            bet.transition(BetStatus::Confirmed)?;
                        }
                    }
                    report.debits_confirmed += 1;
                    debug!("Late debit confirmation for bet {}", bet_id);
                }
                Err(e) if e.is_retryable() => debug!("Debit for bet {} still unconfirmed: {}", bet_id, e),
                Err(e) => {
                    warn!("Backend refused retried debit for bet {}: {}", bet_id, e);
                    Self::abort_bet(&mut state, bet_id)?;
                }
            }
        }

        for record in self.store.all()? {
            if self.deliver(record).await? {
                report.flushed += 1;
            } else {
                report.still_pending += 1;
            }
        }

        Ok(report)
    }

    /// Flush, then replace the mirror with the backend's balance
    pub async fn reconcile(&self) -> Result<ReconcileReport, SettlementError> {
        let flush = self.flush_pending().await?;
        let authoritative = self
            .call(
                "get_balance",
                self.config.balance_timeout_ms,
                self.wallet.get_balance(&self.user_id),
            )
            .await?;

        let mut state = self.state.lock().await;
        let previous = state.mirror;
        state.mirror = authoritative;
        let drift = authoritative as i128 - previous as i128;

        if drift != 0 {
            info!(
                "Reconciled {}: mirror {} replaced by authoritative {} (drift {})",
                self.user_id, previous, authoritative, drift
            );
        } else {
            debug!("Reconciled {}: mirror matches backend at {}", self.user_id, authoritative);
        }

        Ok(ReconcileReport {
            previous,
            authoritative,
            drift,
            flush,
        })
    }

    /// Drop every parked result and resynchronise from the backend
    pub async fn discard_pending_and_resync(&self) -> Result<ReconcileReport, SettlementError> {
        for record in self.store.all()? {
            warn!(
                "Discarding pending {} result for bet {} ({:?}) at player request",
                record.game_kind, record.bet_id, record.outcome
            );
            self.store.remove_if(record.game_kind, record.bet_id)?;
        }
        {
            let mut state = self.state.lock().await;
            if !state.unconfirmed_debits.is_empty() {
                warn!("Dropping {} unconfirmed debit retries", state.unconfirmed_debits.len());
                state.unconfirmed_debits.clear();
            }
        }

        let balance = self
            .call(
                "get_balance",
                self.config.balance_timeout_ms,
                self.wallet.get_balance(&self.user_id),
            )
            .await?;
        let mut state = self.state.lock().await;
        let previous = state.mirror;
        state.mirror = balance;
        Ok(ReconcileReport {
            previous,
            authoritative: balance,
            drift: balance as i128 - previous as i128,
            flush: FlushReport::default(),
        })
    }

    /// Reconcile every `reconcile_interval_ms` until the handle is aborted
    pub fn spawn_reconciler(self: Arc<Self>) -> JoinHandle<()> {
        let protocol = self;
        let period = protocol.config.reconcile_interval();
        tokio::spawn(async move {
            let mut interval = tokio::time::interval_at(Instant::now() + period, period);
            loop {
                interval.tick().await;
                match protocol.reconcile().await {
                    Ok(report) => debug!(
                        "Background reconcile: balance {}, {} still pending",
                        report.authoritative, report.flush.still_pending
                    ),
                    Err(e) => warn!("Background reconcile failed: {}", e),
                }
            }
        })
    }

    /// Push one resolved result to the backend. Returns whether it was acknowledged;
    /// an unacknowledged result is written to its pending slot.
    async fn deliver(&self, mut record: PendingResult) -> Result<bool, SettlementError> {
        let outcome = self.push_result(&mut record).await;

        match outcome {
            Ok(()) => {
                if !self.store.remove_if(record.game_kind, record.bet_id)? {
                    debug!("No parked result for bet {} to clear", record.bet_id);
                }
                let mut state = self.state.lock().await;
                if let Some(bet) = state.bets.get_mut(&record.bet_id) {
                    bet.debit_confirmed = true;
                    bet.settlement_acknowledged = true;
                }
                debug!("Backend acknowledged result for bet {}", record.bet_id);
                Ok(true)
            }
            Err(e) => {
                record.attempts += 1;
                record.last_error = Some(e.to_string());
                if e.is_retryable() {
                    warn!(
                        "Result for bet {} not acknowledged (attempt {}): {}",
                        record.bet_id, record.attempts, e
                    );
                } else {
                    // A refusal after play has started is kept and retried, never dropped
                    error!(
                        "Backend refused result for bet {} (attempt {}), keeping it parked: {}",
                        record.bet_id, record.attempts, e
                    );
                }
                if let Err(storage) = self.store.save(&record) {
                    error!("Failed to persist pending result for bet {}: {}", record.bet_id, storage);
                    return Err(storage.into());
                }
                Ok(false)
            }
        }
    }

    async fn push_result(&self, record: &mut PendingResult) -> Result<(), SettlementError> {
        if !record.debit_confirmed {
            self.call(
                "debit",
                self.config.debit_timeout_ms,
                self.wallet.debit(&self.user_id, record.bet_id, record.stake),
            )
            .await?;
            record.debit_confirmed = true;
        }

        let payout = record.payout();
        if payout > 0 {
            self.call(
                "credit",
                self.config.resolve_timeout_ms,
                self.wallet.credit(&self.user_id, record.bet_id, payout),
            )
            .await?;
        } else {
            self.call(
                "mark_loss",
                self.config.resolve_timeout_ms,
                self.wallet.mark_loss(&self.user_id, record.bet_id),
            )
            .await?;
        }
        Ok(())
    }

    /// Await a backend call with a deadline. Timeouts and unreachable
    /// backends both come back as `NetworkTimeout`.
    async fn call<T, F>(&self, operation: &'static str, timeout_ms: u64, fut: F) -> Result<T, SettlementError>
    where
        F: Future<Output = Result<T, WalletError>>,
    {
        match tokio::time::timeout(Duration::from_millis(timeout_ms), fut).await {
            Ok(Ok(value)) => Ok(value),
            Ok(Err(WalletError::Rejected(reason))) => Err(SettlementError::BackendRejected(reason)),
            Ok(Err(WalletError::Unavailable(reason))) => {
                debug!("Wallet {} unavailable: {}", operation, reason);
                Err(SettlementError::NetworkTimeout { operation, timeout_ms })
            }
            Err(_) => Err(SettlementError::NetworkTimeout { operation, timeout_ms }),
        }
    }

    /// Undo an optimistic debit the backend refused
    fn abort_bet(state: &mut SessionState, bet_id: BetId) -> Result<(), SettlementError> {
        state.unconfirmed_debits.retain(|id| *id != bet_id);
        let stake = match state.bets.get_mut(&bet_id) {
            Some(bet) if bet.status == BetStatus::Debited => {
                bet.transition(BetStatus::Failed)?;
                bet.stake
            }
            _ => return Ok(()),
        };
        state.mirror = state.mirror.saturating_add(stake);
        state.release_lock_for(bet_id);
        Ok(())
    }
}
