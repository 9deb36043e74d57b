use std::fmt;
use std::sync::Arc;

use sqlx::PgPool;

use crate::config::Settings;
use crate::services::moderation::Moderation;

/// Shared data available to all commands and handlers
pub struct Data {
    pub pool: PgPool,
    pub settings: Settings,
    /// Banned-word moderation engine
    pub moderation: Arc<Moderation>,
}

impl Data {
    pub fn new(pool: PgPool, settings: Settings, moderation: Arc<Moderation>) -> Self {
        Self {
            pool,
            settings,
            moderation,
        }
    }
}

impl fmt::Debug for Data {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.debug_struct("Data")
            .field("guild_id", &self.settings.guild_id)
            .field("approval_timeout", &self.settings.approval_timeout)
            .finish_non_exhaustive()
    }
}

pub type Context<'a> = poise::Context<'a, Arc<Data>, crate::bot::error::Error>;
