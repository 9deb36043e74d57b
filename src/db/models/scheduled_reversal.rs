use chrono::{DateTime, Utc};
use serde::{Deserialize, Serialize};
use uuid::Uuid;

/// Action performed when a reversal fires
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum ReversalAction {
    Unban,
}

impl ReversalAction {
    pub fn as_str(&self) -> &'static str {
        match self {
            ReversalAction::Unban => "unban",
        }
    }

    pub fn parse(s: &str) -> Option<Self> {
        match s {
            "unban" => Some(ReversalAction::Unban),
            _ => None,
        }
    }
}

/// A pending automatic undo of a time-bounded sanction
#[derive(Debug, Clone, PartialEq)]
pub struct ScheduledReversal {
    pub id: Uuid,
    pub guild_id: u64,
    pub target_user_id: u64,
    /// Absolute fire time, so remaining wait survives restarts
    pub fire_at: DateTime<Utc>,
    pub action: ReversalAction,
}

impl ScheduledReversal {
    pub fn unban(guild_id: u64, target_user_id: u64, fire_at: DateTime<Utc>) -> Self {
        Self {
            id: Uuid::new_v4(),
            guild_id,
            target_user_id,
            fire_at,
            action: ReversalAction::Unban,
        }
    }
}

/// Row of `scheduled_reversals`
#[derive(Debug, Clone, sqlx::FromRow)]
pub struct ScheduledReversalRow {
    pub id: Uuid,
    pub guild_id: i64,
    pub target_user_id: i64,
    pub fire_at: DateTime<Utc>,
    pub action: String,
}

impl ScheduledReversalRow {
    /// None when the persisted action is unknown
    pub fn into_reversal(self) -> Option<ScheduledReversal> {
        Some(ScheduledReversal {
            id: self.id,
            guild_id: self.guild_id as u64,
            target_user_id: self.target_user_id as u64,
            fire_at: self.fire_at,
            action: ReversalAction::parse(&self.action)?,
        })
    }
}
