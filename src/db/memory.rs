//! In-memory stores, used by tests and for running the engine without PostgreSQL.

use dashmap::DashMap;
use serenity::async_trait;
use uuid::Uuid;

use crate::bot::error::Error;
use crate::constants::moderation::DEFAULT_BANNED_TERMS;
use crate::db::models::{ModerationConfig, OpenProposal, ScheduledReversal, UserRecord};
use crate::db::store::{ConfigStore, LedgerStore, ProposalStore, ReversalStore};

#[derive(Debug, Default)]
pub struct MemoryStore {
    records: DashMap<u64, UserRecord>,
    /// user ids whose stored row should read back as corrupt
    corrupt: DashMap<u64, ()>,
    reversals: DashMap<Uuid, ScheduledReversal>,
    proposals: DashMap<Uuid, OpenProposal>,
    configs: DashMap<u64, ModerationConfig>,
}

impl MemoryStore {
    pub fn new() -> Self {
        Self::default()
    }

    /// Make the next loads of `user_id` fail as malformed state
    pub fn corrupt_record(&self, user_id: u64) {
        self.corrupt.insert(user_id, ());
    }

    /// Seed a config without going through the defaults
    pub fn put_config(&self, config: ModerationConfig) {
        self.configs.insert(config.guild_id, config);
    }

    fn with_config<T>(&self, guild_id: u64, f: impl FnOnce(&mut ModerationConfig) -> T) -> T {
        let mut entry = self.configs.entry(guild_id).or_insert_with(|| {
            let mut config = ModerationConfig::new(guild_id);
            config.banned_terms = DEFAULT_BANNED_TERMS.iter().map(|t| t.to_string()).collect();
            config
        });
        f(&mut entry)
    }
}

#[async_trait]
impl LedgerStore for MemoryStore {
    async fn load(&self, user_id: u64) -> Result<Option<UserRecord>, Error> {
        if self.corrupt.contains_key(&user_id) {
            return Err(Error::MalformedState(format!("ledger row for user {}", user_id)));
        }
        let record = self.records.get(&user_id).map(|r| r.clone());
        // Suspend between read and return, as a database round trip would
        tokio::task::yield_now().await;
        Ok(record)
    }

    async fn save(&self, record: &UserRecord) -> Result<(), Error> {
        self.corrupt.remove(&record.user_id);
        self.records.insert(record.user_id, record.clone());
        Ok(())
    }
}

#[async_trait]
impl ReversalStore for MemoryStore {
    async fn insert(&self, reversal: &ScheduledReversal) -> Result<(), Error> {
        self.reversals.insert(reversal.id, reversal.clone());
        Ok(())
    }

    async fn remove(&self, id: Uuid) -> Result<(), Error> {
        self.reversals.remove(&id);
        Ok(())
    }

    async fn pending(&self) -> Result<Vec<ScheduledReversal>, Error> {
        let mut pending: Vec<_> = self.reversals.iter().map(|r| r.value().clone()).collect();
        pending.sort_by_key(|r| r.fire_at);
        Ok(pending)
    }
}

#[async_trait]
impl ProposalStore for MemoryStore {
    async fn insert_proposal(&self, proposal: &OpenProposal) -> Result<(), Error> {
        self.proposals.insert(proposal.id, proposal.clone());
        Ok(())
    }

    async fn remove_proposal(&self, id: Uuid) -> Result<(), Error> {
        self.proposals.remove(&id);
        Ok(())
    }

    async fn open_proposals(&self) -> Result<Vec<OpenProposal>, Error> {
        let mut open: Vec<_> = self.proposals.iter().map(|p| p.value().clone()).collect();
        open.sort_by_key(|p| p.expires_at);
        Ok(open)
    }
}

#[async_trait]
impl ConfigStore for MemoryStore {
    async fn get(&self, guild_id: u64) -> Result<ModerationConfig, Error> {
        Ok(self.with_config(guild_id, |c| c.clone()))
    }

    async fn set_enabled(&self, guild_id: u64, enabled: bool) -> Result<(), Error> {
        self.with_config(guild_id, |c| c.enabled = enabled);
        Ok(())
    }

    async fn set_timeout_duration(&self, guild_id: u64, minutes: u32) -> Result<(), Error> {
        self.with_config(guild_id, |c| c.timeout_duration_minutes = minutes);
        Ok(())
    }

    async fn set_ban_duration(&self, guild_id: u64, days: u32) -> Result<(), Error> {
        self.with_config(guild_id, |c| c.ban_duration_days = days);
        Ok(())
    }

    async fn set_review_channel(
        &self,
        guild_id: u64,
        channel_id: Option<u64>,
    ) -> Result<(), Error> {
        self.with_config(guild_id, |c| c.review_channel_id = channel_id);
        Ok(())
    }

    async fn add_term(&self, guild_id: u64, term: &str) -> Result<bool, Error> {
        Ok(self.with_config(guild_id, |c| {
            if c.banned_terms.iter().any(|t| t == term) {
                false
            } else {
                c.banned_terms.push(term.to_string());
                true
            }
        }))
    }

    async fn remove_term(&self, guild_id: u64, term: &str) -> Result<bool, Error> {
        Ok(self.with_config(guild_id, |c| {
            let before = c.banned_terms.len();
            c.banned_terms.retain(|t| t != term);
            c.banned_terms.len() != before
        }))
    }
}
