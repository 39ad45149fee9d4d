//! Error types for the croupier settlement core
//!
//! Engine-input errors are fatal to the single call that produced them.
//! Settlement errors distinguish "try again later" from "the backend said no".

use crate::games::types::{BetId, BetStatus, GameKind};

/// Root error type for all croupier operations
#[derive(Debug, thiserror::Error)]
pub enum CroupierError {
    #[error("Configuration error: {0}")]
    Configuration(#[from] ConfigurationError),

    #[error("Game error: {0}")]
    Game(#[from] GameError),

    #[error("Settlement error: {0}")]
    Settlement(#[from] SettlementError),

    #[error("Storage error: {0}")]
    Storage(#[from] StorageError),
}

/// Configuration and validation errors
#[derive(Debug, thiserror::Error)]
pub enum ConfigurationError {
    #[error("Validation failed: {0}")]
    ValidationFailed(String),

    #[error("Missing required field: {0}")]
    MissingRequired(String),

    #[error("Invalid value for {field}: '{value}' ({reason})")]
    InvalidValue {
        field: String,
        value: String,
        reason: String,
    },

    #[error("Failed to load configuration: {0}")]
    LoadFailed(String),

    #[error("Failed to save configuration: {0}")]
    SaveFailed(String),
}

/// Engine input validation and round-state errors
#[derive(Debug, Clone, PartialEq, Eq, thiserror::Error)]
pub enum GameError {
    #[error("Cannot draw from an empty domain")]
    EmptyDomain,

    #[error("Invalid selection: {0}")]
    InvalidSelection(String),

    #[error("Invalid engine configuration: {0}")]
    InvalidConfig(String),

    #[error("Round is already over")]
    RoundOver,

    #[error("Cell {cell} is outside a grid of {grid_size}")]
    CellOutOfRange { cell: usize, grid_size: usize },

    #[error("Cell {0} was already revealed")]
    CellAlreadyRevealed(usize),

    #[error("Shoe exhausted")]
    ShoeExhausted,

    #[error("Multiplier for {mines} mines and {revealed} reveals on a grid of {grid_size} overflows")]
    MultiplierOverflow {
        grid_size: usize,
        mines: usize,
        revealed: usize,
    },
}

/// Bet lifecycle errors
#[derive(Debug, thiserror::Error)]
pub enum SettlementError {
    #[error("Insufficient funds: stake {stake} exceeds available {available}")]
    InsufficientFunds { stake: u64, available: u64 },

    #[error("Stake must be positive")]
    InvalidStake,

    #[error("Wallet backend did not answer {operation} within {timeout_ms}ms")]
    NetworkTimeout {
        operation: &'static str,
        timeout_ms: u64,
    },

    #[error("Wallet backend rejected the request: {0}")]
    BackendRejected(String),

    #[error("Bet {0} is still in play")]
    RoundInProgress(BetId),

    #[error("Unknown bet {0}")]
    UnknownBet(BetId),

    #[error("Invalid bet transition from {from:?} to {to:?}")]
    InvalidTransition { from: BetStatus, to: BetStatus },

    #[error("Bet {0} was already settled with a different outcome")]
    AlreadySettled(BetId),

    #[error("Round result is for {actual} but bet was opened for {expected}")]
    GameKindMismatch { expected: GameKind, actual: GameKind },

    #[error("Round for bet {0} has not produced an outcome yet")]
    RoundIncomplete(BetId),

    #[error("A pending {0} result is still waiting for the wallet backend")]
    PendingSettlement(GameKind),

    #[error(transparent)]
    Storage(#[from] StorageError),
}

impl SettlementError {
    /// Whether the failure should be parked and retried rather than surfaced as final
    pub fn is_retryable(&self) -> bool {
        matches!(self, SettlementError::NetworkTimeout { .. })
    }
}

/// Failures reported by a wallet backend
#[derive(Debug, Clone, PartialEq, Eq, thiserror::Error)]
pub enum WalletError {
    /// The backend answered and refused
    #[error("rejected: {0}")]
    Rejected(String),

    /// The backend could not be reached or did not answer
    #[error("unavailable: {0}")]
    Unavailable(String),
}

/// Durable pending-result storage errors
#[derive(Debug, thiserror::Error)]
pub enum StorageError {
    #[error("Read failed: {0}")]
    ReadFailed(String),

    #[error("Write failed: {0}")]
    WriteFailed(String),

    #[error("Corrupted data: {0}")]
    CorruptedData(String),

    #[error("Pending {kind} slot is held by bet {holder}")]
    SlotOccupied { kind: GameKind, holder: BetId },
}

impl From<std::io::Error> for StorageError {
    fn from(e: std::io::Error) -> Self {
        match e.kind() {
            std::io::ErrorKind::NotFound => StorageError::ReadFailed(e.to_string()),
            _ => StorageError::WriteFailed(e.to_string()),
        }
    }
}

impl From<serde_json::Error> for StorageError {
    fn from(e: serde_json::Error) -> Self {
        StorageError::CorruptedData(e.to_string())
    }
}

// Convenience type alias for Results
pub type CroupierResult<T> = Result<T, CroupierError>;
