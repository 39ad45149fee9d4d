//! Durable slots for settlement results the wallet backend has not acknowledged.
//!
//! One slot per game kind. A result stays in its slot until the backend
//! acknowledges it or the player explicitly discards it. A slot never
//! changes hands while it holds another bet's result.

use crate::errors::StorageError;
use crate::games::types::{Amount, BetId, GameKind, Outcome};
use chrono::{DateTime, Utc};
use dashmap::mapref::entry::Entry;
use dashmap::DashMap;
use serde::{Deserialize, Serialize};
use std::fs;
use std::path::{Path, PathBuf};
use std::sync::Mutex;

/// A resolved bet waiting for backend acknowledgement
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct PendingResult {
    pub bet_id: BetId,
    pub game_kind: GameKind,
    pub stake: Amount,
    pub outcome: Outcome,
    /// Whether the backend already holds the debit for this bet
    pub debit_confirmed: bool,
    pub attempts: u32,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub last_error: Option<String>,
    pub created_at: DateTime<Utc>,
}

impl PendingResult {
    pub fn new(bet_id: BetId, game_kind: GameKind, stake: Amount, outcome: Outcome, debit_confirmed: bool) -> Self {
        Self {
            bet_id,
            game_kind,
            stake,
            outcome,
            debit_confirmed,
            attempts: 0,
            last_error: None,
            created_at: Utc::now(),
        }
    }

    /// Amount the backend must credit; zero for a loss
    pub fn payout(&self) -> Amount {
        self.outcome.payout(self.stake)
    }
}

/// Storage for pending results, one slot per game kind
pub trait PendingStore: Send + Sync {
    fn load(&self, kind: GameKind) -> Result<Option<PendingResult>, StorageError>;

    /// Write `result` into its game kind's slot. Updating the same bet's record
    /// is allowed; a slot held by another bet fails with `SlotOccupied`.
    fn save(&self, result: &PendingResult) -> Result<(), StorageError>;

    /// Clear the slot only if it still holds `bet_id`. Returns whether it did.
    fn remove_if(&self, kind: GameKind, bet_id: BetId) -> Result<bool, StorageError>;

    fn all(&self) -> Result<Vec<PendingResult>, StorageError> {
        let mut results = Vec::new();
        for kind in GameKind::ALL {
            if let Some(result) = self.load(kind)? {
                results.push(result);
            }
        }
        Ok(results)
    }
}

/// Process-local store; pending results do not outlive the process
#[derive(Debug, Default)]
pub struct MemoryPendingStore {
    slots: DashMap<GameKind, PendingResult>,
}

impl MemoryPendingStore {
    pub fn new() -> Self {
        Self::default()
    }
}

impl PendingStore for MemoryPendingStore {
    fn load(&self, kind: GameKind) -> Result<Option<PendingResult>, StorageError> {
        Ok(self.slots.get(&kind).map(|entry| entry.value().clone()))
    }

    fn save(&self, result: &PendingResult) -> Result<(), StorageError> {
        match self.slots.entry(result.game_kind) {
            Entry::Occupied(mut slot) => {
                if slot.get().bet_id != result.bet_id {
                    return Err(StorageError::SlotOccupied {
                        kind: result.game_kind,
                        holder: slot.get().bet_id,
                    });
                }
                slot.insert(result.clone());
            }
            Entry::Vacant(slot) => {
                slot.insert(result.clone());
            }
        }
        Ok(())
    }

    fn remove_if(&self, kind: GameKind, bet_id: BetId) -> Result<bool, StorageError> {
        Ok(self.slots.remove_if(&kind, |_, held| held.bet_id == bet_id).is_some())
    }
}

/// One JSON file per game kind under a directory
#[derive(Debug)]
pub struct FilePendingStore {
    dir: PathBuf,
    /// Serialises check-then-write on the slot files within this process
    guard: Mutex<()>,
}

impl FilePendingStore {
    pub fn open<P: AsRef<Path>>(dir: P) -> Result<Self, StorageError> {
        let dir = dir.as_ref().to_path_buf();
        fs::create_dir_all(&dir)
            .map_err(|e| StorageError::WriteFailed(format!("Failed to create {}: {}", dir.display(), e)))?;
        Ok(Self {
            dir,
            guard: Mutex::new(()),
        })
    }

    pub fn dir(&self) -> &Path {
        &self.dir
    }

    fn slot_path(&self, kind: GameKind) -> PathBuf {
        self.dir.join(format!("pending_{}.json", kind))
    }

    fn lock(&self) -> Result<std::sync::MutexGuard<'_, ()>, StorageError> {
        self.guard
            .lock()
            .map_err(|_| StorageError::WriteFailed("pending store lock poisoned".to_string()))
    }
}

impl PendingStore for FilePendingStore {
    fn load(&self, kind: GameKind) -> Result<Option<PendingResult>, StorageError> {
        let path = self.slot_path(kind);
        let bytes = match fs::read(&path) {
            Ok(bytes) => bytes,
            Err(e) if e.kind() == std::io::ErrorKind::NotFound => return Ok(None),
            Err(e) => {
                return Err(StorageError::ReadFailed(format!("Failed to read {}: {}", path.display(), e)));
            }
        };
        let result: PendingResult = serde_json::from_slice(&bytes)?;
        if result.game_kind != kind {
            return Err(StorageError::CorruptedData(format!(
                "{} holds a {} result",
                path.display(),
                result.game_kind
            )));
        }
        Ok(Some(result))
    }

    fn save(&self, result: &PendingResult) -> Result<(), StorageError> {
        let _guard = self.lock()?;
        if let Some(held) = self.load(result.game_kind)? {
            if held.bet_id != result.bet_id {
                return Err(StorageError::SlotOccupied {
                    kind: result.game_kind,
                    holder: held.bet_id,
                });
            }
        }

        let path = self.slot_path(result.game_kind);
        let tmp = path.with_extension("json.tmp");
        let json = serde_json::to_vec_pretty(result)?;
        // Rename is atomic on the same filesystem, so a crash leaves the old slot intact
        fs::write(&tmp, json)
            .map_err(|e| StorageError::WriteFailed(format!("Failed to write {}: {}", tmp.display(), e)))?;
        fs::rename(&tmp, &path)
            .map_err(|e| StorageError::WriteFailed(format!("Failed to replace {}: {}", path.display(), e)))?;
        Ok(())
    }

    fn remove_if(&self, kind: GameKind, bet_id: BetId) -> Result<bool, StorageError> {
        let _guard = self.lock()?;
        match self.load(kind)? {
            Some(held) if held.bet_id == bet_id => {}
            _ => return Ok(false),
        }
        match fs::remove_file(self.slot_path(kind)) {
            Ok(()) => Ok(true),
            Err(e) if e.kind() == std::io::ErrorKind::NotFound => Ok(false),
            Err(e) => Err(e.into()),
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use tempfile::TempDir;

    fn sample(kind: GameKind, outcome: Outcome) -> PendingResult {
        PendingResult::new(BetId::new(), kind, 100, outcome, true)
    }

    /// Shared slot rules, run against every store
    fn check_slot_ownership(store: &dyn PendingStore) {
        let first = sample(GameKind::Slot, Outcome::Win { payout: 500 });
        let second = sample(GameKind::Slot, Outcome::Win { payout: 300 });
        let other = sample(GameKind::Mines, Outcome::Push);

        store.save(&first).unwrap();
        store.save(&other).unwrap();
        match store.save(&second) {
            Err(StorageError::SlotOccupied { kind, holder }) => {
                assert_eq!(kind, GameKind::Slot);
                assert_eq!(holder, first.bet_id);
            }
            other => panic!("Expected SlotOccupied, got {:?}", other),
        }
        assert_eq!(store.load(GameKind::Slot).unwrap(), Some(first.clone()));
        assert_eq!(store.all().unwrap().len(), 2);

        // Same bet may update its own record
        let mut retried = first.clone();
        retried.attempts = 3;
        store.save(&retried).unwrap();
        assert_eq!(store.load(GameKind::Slot).unwrap().unwrap().attempts, 3);

        // Acknowledging another bet leaves the slot alone
        assert!(!store.remove_if(GameKind::Slot, second.bet_id).unwrap());
        assert_eq!(store.load(GameKind::Slot).unwrap().unwrap().bet_id, first.bet_id);

        assert!(store.remove_if(GameKind::Slot, first.bet_id).unwrap());
        assert!(store.load(GameKind::Slot).unwrap().is_none());
        assert!(!store.remove_if(GameKind::Slot, first.bet_id).unwrap());

        store.save(&second).unwrap();
        assert_eq!(store.load(GameKind::Slot).unwrap(), Some(second));
    }

    #[test]
    fn test_memory_store_slot_ownership() {
        check_slot_ownership(&MemoryPendingStore::new());
    }

    #[test]
    fn test_file_store_slot_ownership() {
        let dir = TempDir::new().unwrap();
        check_slot_ownership(&FilePendingStore::open(dir.path()).unwrap());
    }

    #[test]
    fn test_file_store_survives_reopen() {
        let dir = TempDir::new().unwrap();
        let result = sample(GameKind::Roulette, Outcome::Win { payout: 3_600 });

        {
            let store = FilePendingStore::open(dir.path()).unwrap();
            store.save(&result).unwrap();
        }

        let reopened = FilePendingStore::open(dir.path()).unwrap();
        let loaded = reopened.load(GameKind::Roulette).unwrap().unwrap();
        assert_eq!(loaded, result);
        assert_eq!(loaded.payout(), 3_600);
        assert!(reopened.load(GameKind::Lottery).unwrap().is_none());
    }

    #[test]
    fn test_file_store_remove_is_idempotent() {
        let dir = TempDir::new().unwrap();
        let store = FilePendingStore::open(dir.path()).unwrap();
        let result = sample(GameKind::Baccarat, Outcome::Loss);
        store.save(&result).unwrap();
        assert!(store.remove_if(GameKind::Baccarat, result.bet_id).unwrap());
        assert!(!store.remove_if(GameKind::Baccarat, result.bet_id).unwrap());
        assert!(store.all().unwrap().is_empty());
    }

    #[test]
    fn test_file_store_rejects_garbage() {
        let dir = TempDir::new().unwrap();
        let store = FilePendingStore::open(dir.path()).unwrap();
        fs::write(dir.path().join("pending_mines.json"), b"not json").unwrap();
        assert!(matches!(
            store.load(GameKind::Mines),
            Err(StorageError::CorruptedData(_))
        ));
    }
}
