use std::env;
use std::path::PathBuf;
use std::time::Duration;

use crate::constants::moderation::{
    DEFAULT_APPROVAL_TIMEOUT_SECONDS, DEFAULT_BAN_DAYS, DEFAULT_TIMEOUT_MINUTES,
};

const DEFAULT_AUDIT_LOG_PATH: &str = "logs.txt";

#[derive(Debug, Clone)]
pub struct Settings {
    pub discord_token: String,
    pub database_url: String,
    /// Register commands in this guild only
    pub guild_id: Option<u64>,
    /// How long a proposal waits for a reviewer
    pub approval_timeout: Duration,
    /// Seed values for new guild configs
    pub default_timeout_minutes: u32,
    pub default_ban_days: u32,
    /// None disables the audit file
    pub audit_log_path: Option<PathBuf>,
}

impl Settings {
    pub fn from_env() -> Result<Self, String> {
        Self::from_lookup(|key| env::var(key).ok())
    }

    fn from_lookup(var: impl Fn(&str) -> Option<String>) -> Result<Self, String> {
        let discord_token =
            var("DISCORD_TOKEN").ok_or("DISCORD_TOKEN environment variable not set")?;

        let database_url =
            var("DATABASE_URL").ok_or("DATABASE_URL environment variable not set")?;

        let guild_id = var("GUILD_ID").and_then(|s| s.parse::<u64>().ok());

        let approval_timeout = var("APPROVAL_TIMEOUT_SECONDS")
            .and_then(|s| s.parse::<u64>().ok())
            .filter(|secs| *secs > 0)
            .unwrap_or(DEFAULT_APPROVAL_TIMEOUT_SECONDS);

        let default_timeout_minutes = var("DEFAULT_TIMEOUT_MINUTES")
            .and_then(|s| s.parse::<u32>().ok())
            .filter(|mins| *mins > 0)
            .unwrap_or(DEFAULT_TIMEOUT_MINUTES);

        let default_ban_days = var("DEFAULT_BAN_DAYS")
            .and_then(|s| s.parse().ok())
            .unwrap_or(DEFAULT_BAN_DAYS);

        let audit_log_path = match var("AUDIT_LOG_PATH") {
            Some(path) if path.trim().is_empty() => None,
            Some(path) => Some(PathBuf::from(path)),
            None => Some(PathBuf::from(DEFAULT_AUDIT_LOG_PATH)),
        };

        Ok(Self {
            discord_token,
            database_url,
            guild_id,
            approval_timeout: Duration::from_secs(approval_timeout),
            default_timeout_minutes,
            default_ban_days,
            audit_log_path,
        })
    }
}
