use std::sync::Arc;

use chrono::Utc;
use dashmap::DashMap;
use tokio::sync::{Mutex, OwnedMutexGuard};
use tracing::{debug, warn};

use crate::bot::error::Error;
use crate::db::models::{AppliedSanction, Infraction, UserRecord};
use crate::db::store::LedgerStore;

/// Durable per-user infraction ledger.
///
/// Every mutation is a load, mutate, save of the whole record while holding
/// that user's lock, so two handlers for the same user never interleave.
pub struct Ledger {
    store: Arc<dyn LedgerStore>,
    locks: DashMap<u64, Arc<Mutex<()>>>,
}

/// Exclusive access to one user's record
pub struct LedgerGuard<'a> {
    ledger: &'a Ledger,
    user_id: u64,
    _lock: OwnedMutexGuard<()>,
}

impl Ledger {
    pub fn new(store: Arc<dyn LedgerStore>) -> Self {
        Self {
            store,
            locks: DashMap::new(),
        }
    }

    /// Wait for exclusive access to a user's record
    pub async fn lock(&self, user_id: u64) -> LedgerGuard<'_> {
        let lock = self
            .locks
            .entry(user_id)
            .or_insert_with(|| Arc::new(Mutex::new(())))
            .clone();

        LedgerGuard {
            ledger: self,
            user_id,
            _lock: lock.lock_owned().await,
        }
    }

    /// Read a user's record without creating one
    pub async fn get(&self, user_id: u64) -> Result<Option<UserRecord>, Error> {
        self.store.load(user_id).await
    }

    pub async fn get_or_create(&self, user_id: u64) -> Result<UserRecord, Error> {
        self.lock(user_id).await.load().await
    }

    pub async fn record_infraction(
        &self,
        user_id: u64,
        infraction: Infraction,
    ) -> Result<UserRecord, Error> {
        self.lock(user_id).await.record_infraction(infraction).await
    }

    pub async fn clear_current(&self, user_id: u64, cleared_by: u64) -> Result<UserRecord, Error> {
        self.lock(user_id).await.clear_current(cleared_by).await
    }

    /// `clear_current` for users that have a record. None leaves nothing behind.
    pub async fn clear_existing(
        &self,
        user_id: u64,
        cleared_by: u64,
    ) -> Result<Option<UserRecord>, Error> {
        let guard = self.lock(user_id).await;
        if let Ok(None) = self.store.load(user_id).await {
            return Ok(None);
        }
        guard.clear_current(cleared_by).await.map(Some)
    }

    pub async fn apply_sanction(
        &self,
        user_id: u64,
        sanction: AppliedSanction,
    ) -> Result<UserRecord, Error> {
        self.lock(user_id).await.apply_sanction(sanction).await
    }
}

impl LedgerGuard<'_> {
    /// Load the record, or a zeroed one. Nothing is persisted until a mutation.
    pub async fn load(&self) -> Result<UserRecord, Error> {
        match self.ledger.store.load(self.user_id).await {
            Ok(Some(record)) => Ok(record),
            Ok(None) => Ok(UserRecord::new(self.user_id)),
            Err(Error::MalformedState(reason)) => {
                // Availability over history: start the user from an empty record
                warn!(
                    "Discarding malformed ledger state for user {}: {}",
                    self.user_id, reason
                );
                Ok(UserRecord::new(self.user_id))
            }
            Err(e) => Err(e),
        }
    }

    async fn mutate(&self, f: impl FnOnce(&mut UserRecord)) -> Result<UserRecord, Error> {
        let mut record = self.load().await?;
        f(&mut record);
        self.ledger.store.save(&record).await?;
        Ok(record)
    }

    pub async fn record_infraction(&self, infraction: Infraction) -> Result<UserRecord, Error> {
        let record = self.mutate(|r| r.record_infraction(infraction)).await?;
        debug!(
            "Recorded infraction for user {} (current {}, total {})",
            self.user_id, record.current_infractions, record.total_infractions
        );
        Ok(record)
    }

    pub async fn clear_current(&self, cleared_by: u64) -> Result<UserRecord, Error> {
        self.mutate(|r| r.clear_current(cleared_by, Utc::now())).await
    }

    pub async fn apply_sanction(&self, sanction: AppliedSanction) -> Result<UserRecord, Error> {
        self.mutate(|r| r.apply_sanction(sanction)).await
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::db::memory::MemoryStore;
    use crate::db::models::{HistoryEntry, SanctionKind};

    fn infraction(word: &str) -> Infraction {
        Infraction {
            word: word.to_string(),
            message: format!("some {} text", word),
            channel_id: 5,
            message_id: 6,
            timestamp: Utc::now(),
        }
    }

    fn ledger() -> (Arc<MemoryStore>, Ledger) {
        let store = Arc::new(MemoryStore::new());
        let ledger = Ledger::new(store.clone());
        (store, ledger)
    }

    #[tokio::test]
    async fn test_get_or_create_does_not_persist() {
        let (store, ledger) = ledger();
        let record = ledger.get_or_create(42).await.unwrap();
        assert_eq!(record, UserRecord::new(42));
        assert!(store.load(42).await.unwrap().is_none());
    }

    #[tokio::test]
    async fn test_record_infraction_is_monotonic() {
        let (store, ledger) = ledger();
        for n in 1..=7 {
            let record = ledger.record_infraction(1, infraction("spam")).await.unwrap();
            assert_eq!(record.total_infractions, n);
            assert_eq!(record.current_infractions, n);
        }

        let stored = store.load(1).await.unwrap().unwrap();
        assert_eq!(stored.total_infractions, 7);
        assert_eq!(stored.infraction_entries(), 7);
    }

    #[tokio::test]
    async fn test_clear_current_preserves_totals_and_history() {
        let (_store, ledger) = ledger();
        for _ in 0..5 {
            ledger.record_infraction(1, infraction("spam")).await.unwrap();
        }
        ledger
            .apply_sanction(
                1,
                AppliedSanction {
                    kind: SanctionKind::Timeout,
                    duration_secs: Some(1800),
                    reason: "Accumulated infractions".to_string(),
                    confirmed: true,
                    timestamp: Utc::now(),
                },
            )
            .await
            .unwrap();
        ledger.record_infraction(1, infraction("spam")).await.unwrap();

        let before = ledger.get(1).await.unwrap().unwrap();
        let after = ledger.clear_current(1, 99).await.unwrap();

        assert_eq!(after.current_infractions, 0);
        assert_eq!(after.current_timeouts, 0);
        assert_eq!(after.current_kicks, 0);
        assert_eq!(after.total_infractions, before.total_infractions);
        assert_eq!(after.total_timeouts, before.total_timeouts);
        assert_eq!(after.total_kicks, before.total_kicks);
        assert_eq!(&after.history[..before.history.len()], &before.history[..]);
        assert!(matches!(
            after.history.last(),
            Some(HistoryEntry::Cleared { cleared_by: 99, .. })
        ));
    }

    #[tokio::test]
    async fn test_clear_existing_skips_unknown_users() {
        let (store, ledger) = ledger();
        assert!(ledger.clear_existing(4, 99).await.unwrap().is_none());
        assert!(store.load(4).await.unwrap().is_none());

        ledger.record_infraction(4, infraction("spam")).await.unwrap();
        let cleared = ledger.clear_existing(4, 99).await.unwrap().unwrap();
        assert_eq!(cleared.current_infractions, 0);
        assert_eq!(cleared.total_infractions, 1);
    }

    #[tokio::test]
    async fn test_malformed_state_starts_empty() {
        let (store, ledger) = ledger();
        ledger.record_infraction(3, infraction("spam")).await.unwrap();
        store.corrupt_record(3);

        let record = ledger.record_infraction(3, infraction("spam")).await.unwrap();
        assert_eq!(record.total_infractions, 1);
        assert_eq!(record.history.len(), 1);
    }

    #[tokio::test]
    async fn test_concurrent_mutations_for_one_user_are_serialized() {
        let (_store, ledger) = ledger();
        let ledger = Arc::new(ledger);

        let mut handles = Vec::new();
        for _ in 0..20 {
            let ledger = ledger.clone();
            handles.push(tokio::spawn(async move {
                ledger.record_infraction(8, infraction("spam")).await.unwrap();
            }));
        }
        for handle in handles {
            handle.await.unwrap();
        }

        let record = ledger.get(8).await.unwrap().unwrap();
        assert_eq!(record.total_infractions, 20);
        assert_eq!(record.history.len(), 20);
    }
}
