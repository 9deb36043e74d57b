use chrono::{DateTime, Utc};
use uuid::Uuid;

use super::SanctionKind;

/// A proposal awaiting review, with where its review message was posted
#[derive(Debug, Clone, PartialEq)]
pub struct OpenProposal {
    pub id: Uuid,
    pub guild_id: u64,
    pub target_user_id: u64,
    pub kind: SanctionKind,
    pub reason_summary: String,
    pub created_at: DateTime<Utc>,
    /// Absolute expiry, so the remaining review window survives restarts
    pub expires_at: DateTime<Utc>,
    pub review_channel_id: u64,
    pub review_message_id: u64,
}

/// Row of `open_proposals`
#[derive(Debug, Clone, sqlx::FromRow)]
pub struct OpenProposalRow {
    pub id: Uuid,
    pub guild_id: i64,
    pub target_user_id: i64,
    pub kind: String,
    pub reason_summary: String,
    pub created_at: DateTime<Utc>,
    pub expires_at: DateTime<Utc>,
    pub review_channel_id: i64,
    pub review_message_id: i64,
}

impl OpenProposalRow {
    /// None when the persisted kind is unknown
    pub fn into_proposal(self) -> Option<OpenProposal> {
        Some(OpenProposal {
            id: self.id,
            guild_id: self.guild_id as u64,
            target_user_id: self.target_user_id as u64,
            kind: SanctionKind::parse(&self.kind)?,
            reason_summary: self.reason_summary,
            created_at: self.created_at,
            expires_at: self.expires_at,
            review_channel_id: self.review_channel_id as u64,
            review_message_id: self.review_message_id as u64,
        })
    }
}
