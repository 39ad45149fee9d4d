pub mod types;
pub mod rng;
pub mod cards;
pub mod blackjack;
pub mod baccarat;
pub mod roulette;
pub mod slots;
pub mod mines;
pub mod lottery;
pub mod pending_pool;
pub mod settlement;
pub mod stats;

pub use types::*;
pub use pending_pool::{FilePendingStore, MemoryPendingStore, PendingResult, PendingStore};
pub use settlement::{FlushReport, ReconcileReport, SettlementConfig, SettlementProtocol};
pub use stats::{KindStats, SessionStats};
