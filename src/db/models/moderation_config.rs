use crate::constants::moderation::{DEFAULT_BAN_DAYS, DEFAULT_TIMEOUT_MINUTES};

/// Per-guild moderation settings, read at decision time
#[derive(Debug, Clone, PartialEq)]
pub struct ModerationConfig {
    pub guild_id: u64,
    pub enabled: bool,
    pub timeout_duration_minutes: u32,
    /// 0 means bans are permanent
    pub ban_duration_days: u32,
    pub review_channel_id: Option<u64>,
    /// In configuration order; detection returns the first match in this order
    pub banned_terms: Vec<String>,
}

impl ModerationConfig {
    pub fn new(guild_id: u64) -> Self {
        Self {
            guild_id,
            enabled: true,
            timeout_duration_minutes: DEFAULT_TIMEOUT_MINUTES,
            ban_duration_days: DEFAULT_BAN_DAYS,
            review_channel_id: None,
            banned_terms: Vec::new(),
        }
    }

    pub fn timeout_duration(&self) -> std::time::Duration {
        std::time::Duration::from_secs(u64::from(self.timeout_duration_minutes) * 60)
    }

    /// Ban length, or None when bans are permanent
    pub fn ban_duration(&self) -> Option<chrono::Duration> {
        if self.ban_duration_days == 0 {
            None
        } else {
            Some(chrono::Duration::days(i64::from(self.ban_duration_days)))
        }
    }
}

/// Row of `moderation_configs`
#[derive(Debug, Clone, sqlx::FromRow)]
pub struct ModerationConfigRow {
    pub guild_id: i64,
    pub enabled: bool,
    pub timeout_duration_minutes: i32,
    pub ban_duration_days: i32,
    pub review_channel_id: Option<i64>,
}

impl ModerationConfigRow {
    pub fn into_config(self, banned_terms: Vec<String>) -> ModerationConfig {
        ModerationConfig {
            guild_id: self.guild_id as u64,
            enabled: self.enabled,
            timeout_duration_minutes: self.timeout_duration_minutes.max(1) as u32,
            ban_duration_days: self.ban_duration_days.max(0) as u32,
            review_channel_id: self.review_channel_id.map(|id| id as u64),
            banned_terms,
        }
    }
}
