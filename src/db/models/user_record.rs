use chrono::{DateTime, Utc};
use serde::{Deserialize, Serialize};

use super::SanctionKind;

/// One entry of a user's moderation history
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(tag = "type", rename_all = "snake_case")]
pub enum HistoryEntry {
    Infraction {
        word: String,
        message: String,
        timestamp: DateTime<Utc>,
        channel_id: u64,
        message_id: u64,
    },
    SanctionApplied {
        kind: SanctionKind,
        duration_secs: Option<u64>,
        reason: String,
        timestamp: DateTime<Utc>,
        /// False when the platform call failed after approval
        confirmed: bool,
    },
    Cleared {
        timestamp: DateTime<Utc>,
        cleared_by: u64,
    },
}

impl HistoryEntry {
    pub fn timestamp(&self) -> DateTime<Utc> {
        match self {
            HistoryEntry::Infraction { timestamp, .. }
            | HistoryEntry::SanctionApplied { timestamp, .. }
            | HistoryEntry::Cleared { timestamp, .. } => *timestamp,
        }
    }
}

/// A detected infraction, before it is written to the ledger
#[derive(Debug, Clone)]
pub struct Infraction {
    pub word: String,
    pub message: String,
    pub channel_id: u64,
    pub message_id: u64,
    pub timestamp: DateTime<Utc>,
}

/// A sanction that was approved and attempted
#[derive(Debug, Clone)]
pub struct AppliedSanction {
    pub kind: SanctionKind,
    pub duration_secs: Option<u64>,
    pub reason: String,
    pub confirmed: bool,
    pub timestamp: DateTime<Utc>,
}

/// Per-user infraction ledger entry
#[derive(Debug, Clone, PartialEq, Default, Serialize, Deserialize)]
pub struct UserRecord {
    pub user_id: u64,
    pub current_infractions: u32,
    pub total_infractions: u32,
    pub current_timeouts: u32,
    pub total_timeouts: u32,
    pub current_kicks: u32,
    pub total_kicks: u32,
    pub history: Vec<HistoryEntry>,
}

impl UserRecord {
    pub fn new(user_id: u64) -> Self {
        Self {
            user_id,
            ..Default::default()
        }
    }

    pub fn record_infraction(&mut self, infraction: Infraction) {
        self.history.push(HistoryEntry::Infraction {
            word: infraction.word,
            message: infraction.message,
            timestamp: infraction.timestamp,
            channel_id: infraction.channel_id,
            message_id: infraction.message_id,
        });
        self.current_infractions += 1;
        self.total_infractions += 1;
    }

    /// Apply the counter transitions of an executed sanction
    pub fn apply_sanction(&mut self, sanction: AppliedSanction) {
        match sanction.kind {
            SanctionKind::Timeout => {
                self.current_infractions = 0;
                self.current_timeouts += 1;
                self.total_timeouts += 1;
            }
            SanctionKind::Kick => {
                self.current_timeouts = 0;
                self.current_kicks += 1;
                self.total_kicks += 1;
            }
            SanctionKind::Ban => {
                self.current_kicks = 0;
            }
        }

        self.history.push(HistoryEntry::SanctionApplied {
            kind: sanction.kind,
            duration_secs: sanction.duration_secs,
            reason: sanction.reason,
            timestamp: sanction.timestamp,
            confirmed: sanction.confirmed,
        });
    }

    /// Zero every current counter, keeping totals and history
    pub fn clear_current(&mut self, cleared_by: u64, timestamp: DateTime<Utc>) {
        self.current_infractions = 0;
        self.current_timeouts = 0;
        self.current_kicks = 0;
        self.history.push(HistoryEntry::Cleared {
            timestamp,
            cleared_by,
        });
    }

    pub fn infraction_entries(&self) -> usize {
        self.history
            .iter()
            .filter(|e| matches!(e, HistoryEntry::Infraction { .. }))
            .count()
    }
}

/// Row of `infraction_ledger`
#[derive(Debug, Clone, sqlx::FromRow)]
pub struct UserRecordRow {
    pub user_id: i64,
    pub current_infractions: i32,
    pub total_infractions: i32,
    pub current_timeouts: i32,
    pub total_timeouts: i32,
    pub current_kicks: i32,
    pub total_kicks: i32,
    pub history: serde_json::Value,
}

impl UserRecordRow {
    pub fn into_record(self) -> Result<UserRecord, serde_json::Error> {
        let history: Vec<HistoryEntry> = serde_json::from_value(self.history)?;

        Ok(UserRecord {
            user_id: self.user_id as u64,
            current_infractions: self.current_infractions.max(0) as u32,
            total_infractions: self.total_infractions.max(0) as u32,
            current_timeouts: self.current_timeouts.max(0) as u32,
            total_timeouts: self.total_timeouts.max(0) as u32,
            current_kicks: self.current_kicks.max(0) as u32,
            total_kicks: self.total_kicks.max(0) as u32,
            history,
        })
    }
}
