//! Recording platform double shared by the moderation tests

use std::sync::Mutex;
use std::time::Duration;

use serenity::async_trait;
use uuid::Uuid;

use crate::bot::error::Error;
use crate::db::models::SanctionKind;
use crate::services::moderation::approval::Proposal;
use crate::services::moderation::platform::{ModerationPlatform, ReviewMessage};

#[derive(Debug, Clone, PartialEq, Eq)]
pub enum PlatformCall {
    Publish {
        destination: u64,
        proposal_id: Uuid,
        kind: SanctionKind,
    },
    Update {
        message_id: u64,
        result: String,
    },
    Timeout {
        guild_id: u64,
        user_id: u64,
        secs: u64,
    },
    Kick {
        guild_id: u64,
        user_id: u64,
    },
    Ban {
        guild_id: u64,
        user_id: u64,
    },
    Unban {
        guild_id: u64,
        user_id: u64,
    },
    Warn {
        user_id: u64,
        word: String,
    },
}

pub struct FakePlatform {
    calls: Mutex<Vec<PlatformCall>>,
    failure: Mutex<Option<String>>,
    review_channel: Mutex<Option<u64>>,
}

impl Default for FakePlatform {
    fn default() -> Self {
        Self {
            calls: Mutex::new(Vec::new()),
            failure: Mutex::new(None),
            review_channel: Mutex::new(Some(100)),
        }
    }
}

impl FakePlatform {
    pub fn calls(&self) -> Vec<PlatformCall> {
        self.calls.lock().unwrap().clone()
    }

    /// Sanction calls only, in order
    pub fn sanctions(&self) -> Vec<PlatformCall> {
        self.calls()
            .into_iter()
            .filter(|c| {
                matches!(
                    c,
                    PlatformCall::Timeout { .. }
                        | PlatformCall::Kick { .. }
                        | PlatformCall::Ban { .. }
                        | PlatformCall::Unban { .. }
                )
            })
            .collect()
    }

    pub fn published(&self) -> Vec<Uuid> {
        self.calls()
            .into_iter()
            .filter_map(|c| match c {
                PlatformCall::Publish { proposal_id, .. } => Some(proposal_id),
                _ => None,
            })
            .collect()
    }

    pub fn updates(&self) -> Vec<String> {
        self.calls()
            .into_iter()
            .filter_map(|c| match c {
                PlatformCall::Update { result, .. } => Some(result),
                _ => None,
            })
            .collect()
    }

    /// Make every sanction call fail
    pub fn fail_with(&self, message: &str) {
        *self.failure.lock().unwrap() = Some(message.to_string());
    }

    pub fn without_review_channel(&self) {
        *self.review_channel.lock().unwrap() = None;
    }

    fn record(&self, call: PlatformCall) -> Result<(), Error> {
        let sanction = !matches!(
            call,
            PlatformCall::Publish { .. } | PlatformCall::Update { .. } | PlatformCall::Warn { .. }
        );
        self.calls.lock().unwrap().push(call);

        match self.failure.lock().unwrap().as_ref() {
            Some(message) if sanction => Err(Error::execution(message)),
            _ => Ok(()),
        }
    }
}

#[async_trait]
impl ModerationPlatform for FakePlatform {
    async fn resolve_review_destination(
        &self,
        _guild_id: u64,
        configured: Option<u64>,
    ) -> Option<u64> {
        configured.or(*self.review_channel.lock().unwrap())
    }

    async fn publish_proposal(
        &self,
        destination: u64,
        proposal: &Proposal,
    ) -> Result<ReviewMessage, Error> {
        self.record(PlatformCall::Publish {
            destination,
            proposal_id: proposal.id,
            kind: proposal.kind,
        })?;
        Ok(ReviewMessage {
            channel_id: destination,
            message_id: proposal.target_user_id,
        })
    }

    async fn update_proposal(
        &self,
        message: ReviewMessage,
        _proposal: &Proposal,
        result: &str,
    ) -> Result<(), Error> {
        self.record(PlatformCall::Update {
            message_id: message.message_id,
            result: result.to_string(),
        })
    }

    async fn apply_timeout(
        &self,
        guild_id: u64,
        user_id: u64,
        duration: Duration,
    ) -> Result<(), Error> {
        self.record(PlatformCall::Timeout {
            guild_id,
            user_id,
            secs: duration.as_secs(),
        })
    }

    async fn kick(&self, guild_id: u64, user_id: u64, _reason: &str) -> Result<(), Error> {
        self.record(PlatformCall::Kick { guild_id, user_id })
    }

    async fn ban(&self, guild_id: u64, user_id: u64, _reason: &str) -> Result<(), Error> {
        self.record(PlatformCall::Ban { guild_id, user_id })
    }

    async fn unban(&self, guild_id: u64, user_id: u64, _reason: &str) -> Result<(), Error> {
        self.record(PlatformCall::Unban { guild_id, user_id })
    }

    async fn warn_user(&self, user_id: u64, word: &str, _message: &str) -> Result<(), Error> {
        self.record(PlatformCall::Warn {
            user_id,
            word: word.to_string(),
        })
    }
}
