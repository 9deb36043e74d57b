use serenity::async_trait;
use sqlx::PgPool;
use tracing::warn;
use uuid::Uuid;

use crate::bot::error::Error;
use crate::db::models::{ModerationConfig, OpenProposal, ScheduledReversal, UserRecord};
use crate::db::queries::{ledger, moderation_config, open_proposal, reversal};

/// Durable per-user ledger storage
#[async_trait]
pub trait LedgerStore: Send + Sync {
    /// Load a user's record. A corrupt row is reported as `Error::MalformedState`.
    async fn load(&self, user_id: u64) -> Result<Option<UserRecord>, Error>;

    /// Overwrite the whole record for `record.user_id`
    async fn save(&self, record: &UserRecord) -> Result<(), Error>;
}

/// Durable storage of pending reversals
#[async_trait]
pub trait ReversalStore: Send + Sync {
    async fn insert(&self, reversal: &ScheduledReversal) -> Result<(), Error>;
    async fn remove(&self, id: Uuid) -> Result<(), Error>;
    async fn pending(&self) -> Result<Vec<ScheduledReversal>, Error>;
}

/// Durable storage of proposals awaiting review
#[async_trait]
pub trait ProposalStore: Send + Sync {
    async fn insert_proposal(&self, proposal: &OpenProposal) -> Result<(), Error>;
    async fn remove_proposal(&self, id: Uuid) -> Result<(), Error>;
    async fn open_proposals(&self) -> Result<Vec<OpenProposal>, Error>;
}

/// Durable per-guild moderation config
#[async_trait]
pub trait ConfigStore: Send + Sync {
    /// Get the guild's config, creating it with defaults on first use
    async fn get(&self, guild_id: u64) -> Result<ModerationConfig, Error>;
    async fn set_enabled(&self, guild_id: u64, enabled: bool) -> Result<(), Error>;
    async fn set_timeout_duration(&self, guild_id: u64, minutes: u32) -> Result<(), Error>;
    async fn set_ban_duration(&self, guild_id: u64, days: u32) -> Result<(), Error>;
    async fn set_review_channel(&self, guild_id: u64, channel_id: Option<u64>)
        -> Result<(), Error>;
    /// Returns false if the term was already banned
    async fn add_term(&self, guild_id: u64, term: &str) -> Result<bool, Error>;
    /// Returns false if the term was not banned
    async fn remove_term(&self, guild_id: u64, term: &str) -> Result<bool, Error>;
}

/// PostgreSQL-backed implementation of every store
#[derive(Debug, Clone)]
pub struct PgStore {
    pool: PgPool,
    default_timeout_minutes: u32,
    default_ban_days: u32,
}

impl PgStore {
    pub fn new(pool: PgPool, default_timeout_minutes: u32, default_ban_days: u32) -> Self {
        Self {
            pool,
            default_timeout_minutes,
            default_ban_days,
        }
    }

    async fn ensure_config(&self, guild_id: u64) -> Result<(), Error> {
        moderation_config::get_or_create(
            &self.pool,
            guild_id as i64,
            self.default_timeout_minutes as i32,
            self.default_ban_days as i32,
        )
        .await?;
        Ok(())
    }
}

#[async_trait]
impl LedgerStore for PgStore {
    async fn load(&self, user_id: u64) -> Result<Option<UserRecord>, Error> {
        let Some(row) = ledger::get(&self.pool, user_id as i64).await? else {
            return Ok(None);
        };

        row.into_record().map(Some).map_err(|e| {
            Error::MalformedState(format!("ledger row for user {}: {}", user_id, e))
        })
    }

    async fn save(&self, record: &UserRecord) -> Result<(), Error> {
        let history = serde_json::to_value(&record.history)?;
        ledger::upsert(&self.pool, record, history).await?;
        Ok(())
    }
}

#[async_trait]
impl ReversalStore for PgStore {
    async fn insert(&self, reversal: &ScheduledReversal) -> Result<(), Error> {
        reversal::create(&self.pool, reversal).await?;
        Ok(())
    }

    async fn remove(&self, id: Uuid) -> Result<(), Error> {
        reversal::delete(&self.pool, id).await?;
        Ok(())
    }

    async fn pending(&self) -> Result<Vec<ScheduledReversal>, Error> {
        let rows = reversal::get_all(&self.pool).await?;
        let mut pending = Vec::with_capacity(rows.len());

        for row in rows {
            let id = row.id;
            match row.into_reversal() {
                Some(r) => pending.push(r),
                None => warn!("Skipping scheduled reversal {} with unknown action", id),
            }
        }

        Ok(pending)
    }
}

#[async_trait]
impl ProposalStore for PgStore {
    async fn insert_proposal(&self, proposal: &OpenProposal) -> Result<(), Error> {
        open_proposal::create(&self.pool, proposal).await?;
        Ok(())
    }

    async fn remove_proposal(&self, id: Uuid) -> Result<(), Error> {
        open_proposal::delete(&self.pool, id).await?;
        Ok(())
    }

    async fn open_proposals(&self) -> Result<Vec<OpenProposal>, Error> {
        let rows = open_proposal::get_all(&self.pool).await?;
        let mut pending = Vec::with_capacity(rows.len());

        for row in rows {
            let id = row.id;
            match row.into_proposal() {
                Some(p) => pending.push(p),
                None => {
                    warn!("Dropping open proposal {} with unknown kind", id);
                    open_proposal::delete(&self.pool, id).await?;
                }
            }
        }

        Ok(pending)
    }
}

#[async_trait]
impl ConfigStore for PgStore {
    async fn get(&self, guild_id: u64) -> Result<ModerationConfig, Error> {
        let row = moderation_config::get_or_create(
            &self.pool,
            guild_id as i64,
            self.default_timeout_minutes as i32,
            self.default_ban_days as i32,
        )
        .await?;
        let terms = moderation_config::get_terms(&self.pool, guild_id as i64).await?;

        Ok(row.into_config(terms))
    }

    async fn set_enabled(&self, guild_id: u64, enabled: bool) -> Result<(), Error> {
        self.ensure_config(guild_id).await?;
        moderation_config::set_enabled(&self.pool, guild_id as i64, enabled).await?;
        Ok(())
    }

    async fn set_timeout_duration(&self, guild_id: u64, minutes: u32) -> Result<(), Error> {
        let minutes = i32::try_from(minutes).map_err(|_| {
            Error::InvalidOperation(format!("Timeout of {} minutes is too long", minutes))
        })?;
        self.ensure_config(guild_id).await?;
        moderation_config::set_timeout_duration(&self.pool, guild_id as i64, minutes).await?;
        Ok(())
    }

    async fn set_ban_duration(&self, guild_id: u64, days: u32) -> Result<(), Error> {
        let days = i32::try_from(days)
            .map_err(|_| Error::InvalidOperation(format!("Ban duration of {} days is too long", days)))?;
        self.ensure_config(guild_id).await?;
        moderation_config::set_ban_duration(&self.pool, guild_id as i64, days).await?;
        Ok(())
    }

    async fn set_review_channel(
        &self,
        guild_id: u64,
        channel_id: Option<u64>,
    ) -> Result<(), Error> {
        self.ensure_config(guild_id).await?;
        moderation_config::set_review_channel(
            &self.pool,
            guild_id as i64,
            channel_id.map(|id| id as i64),
        )
        .await?;
        Ok(())
    }

    async fn add_term(&self, guild_id: u64, term: &str) -> Result<bool, Error> {
        self.ensure_config(guild_id).await?;
        Ok(moderation_config::add_term(&self.pool, guild_id as i64, term).await?)
    }

    async fn remove_term(&self, guild_id: u64, term: &str) -> Result<bool, Error> {
        self.ensure_config(guild_id).await?;
        Ok(moderation_config::remove_term(&self.pool, guild_id as i64, term).await?)
    }
}
