//! Croupier - Casino Game Settlement Core
//!
//! Deterministic rule engines for slots, blackjack, baccarat, roulette,
//! mines and a lottery, plus the bet settlement protocol that carries every
//! wager to exactly one terminal outcome against an unreliable wallet backend.

pub mod config;
pub mod errors;
pub mod games;
pub mod logging;
pub mod wallet;

pub use config::{ConfigLoader, CroupierConfig};
pub use errors::{CroupierError, CroupierResult, GameError, SettlementError, StorageError, WalletError};
pub use games::{
    Amount, Bet, BetId, BetStatus, GameKind, Outcome, RoundSettlement, SettlementConfig, SettlementProtocol,
};
pub use wallet::{InMemoryWallet, WalletBackend};
