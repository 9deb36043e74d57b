pub mod approval;
pub mod detector;
pub mod executor;
pub mod ledger;
pub mod platform;
pub mod policy;
pub mod scheduler;

#[cfg(test)]
pub mod testing;

use std::sync::Arc;
use std::time::Duration;

use chrono::Utc;
use tokio::task::JoinHandle;
use tracing::{debug, error, info, warn};
use uuid::Uuid;

use crate::bot::error::Error;
use crate::db::models::{Infraction, OpenProposal, SanctionKind};
use crate::db::store::{ConfigStore, LedgerStore, ProposalStore, ReversalStore};
use crate::services::audit::AuditLog;

use approval::{ApprovalWorkflow, Decision, PendingApproval, Proposal, ProposalOutcome};
use executor::SanctionExecutor;
use ledger::Ledger;
use platform::{ModerationPlatform, ReviewMessage};
use scheduler::{delay_until, ReversalScheduler};

/// A chat message as seen by the engine
#[derive(Debug, Clone)]
pub struct IncomingMessage {
    pub user_id: u64,
    pub guild_id: u64,
    pub channel_id: u64,
    pub message_id: u64,
    pub text: String,
    /// Bots and webhooks
    pub is_automated: bool,
}

/// What the engine did with a message
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum MessageVerdict {
    /// Automated sender or moderation disabled
    Ignored,
    Clean,
    Infraction {
        word: String,
        /// Sanction sent for review, if any
        proposed: Option<SanctionKind>,
    },
}

/// Banned-word moderation engine shared by every event handler
pub struct Moderation {
    ledger: Arc<Ledger>,
    approvals: ApprovalWorkflow,
    executor: SanctionExecutor,
    scheduler: Arc<ReversalScheduler>,
    proposals: Arc<dyn ProposalStore>,
    config: Arc<dyn ConfigStore>,
    platform: Arc<dyn ModerationPlatform>,
    audit: Arc<AuditLog>,
}

impl Moderation {
    pub fn new(
        ledger_store: Arc<dyn LedgerStore>,
        reversal_store: Arc<dyn ReversalStore>,
        proposals: Arc<dyn ProposalStore>,
        config: Arc<dyn ConfigStore>,
        platform: Arc<dyn ModerationPlatform>,
        audit: Arc<AuditLog>,
        approval_timeout: Duration,
    ) -> Self {
        let ledger = Arc::new(Ledger::new(ledger_store));
        let scheduler = Arc::new(ReversalScheduler::new(
            reversal_store,
            platform.clone(),
            audit.clone(),
        ));
        let executor = SanctionExecutor::new(
            ledger.clone(),
            platform.clone(),
            scheduler.clone(),
            audit.clone(),
        );

        Self {
            ledger,
            approvals: ApprovalWorkflow::new(approval_timeout),
            executor,
            scheduler,
            proposals,
            config,
            platform,
            audit,
        }
    }

    pub fn ledger(&self) -> &Ledger {
        &self.ledger
    }

    pub fn config(&self) -> &dyn ConfigStore {
        self.config.as_ref()
    }

    pub fn audit(&self) -> &AuditLog {
        &self.audit
    }

    pub fn approval_timeout(&self) -> Duration {
        self.approvals.timeout()
    }

    /// Re-arm reversals persisted by a previous run
    pub async fn restore_reversals(&self) -> Result<Vec<JoinHandle<()>>, Error> {
        self.scheduler.restore().await
    }

    /// Pick up proposals left open by a previous run.
    /// Expired ones are closed out now; the rest wait out their remaining time.
    pub async fn restore_proposals(self: &Arc<Self>) -> Result<Vec<JoinHandle<()>>, Error> {
        let stored = self.proposals.open_proposals().await?;
        if !stored.is_empty() {
            info!("Restoring {} open proposal(s)", stored.len());
        }

        let mut handles = Vec::new();
        for open in stored {
            let review_message = ReviewMessage {
                channel_id: open.review_channel_id,
                message_id: open.review_message_id,
            };
            let remaining = delay_until(open.expires_at, Utc::now());
            let proposal = Proposal::restored(
                open.id,
                open.guild_id,
                open.target_user_id,
                open.kind,
                open.reason_summary,
                open.created_at,
            );

            if remaining.is_zero() {
                self.expire_offline(proposal, review_message).await;
                continue;
            }

            match self.approvals.reopen(proposal, remaining) {
                Some(pending) => {
                    let engine = Arc::clone(self);
                    handles.push(tokio::spawn(async move {
                        engine.conclude(pending, review_message).await
                    }));
                }
                None => {
                    warn!("Duplicate open proposal {} dropped", open.id);
                    self.forget(open.id).await;
                }
            }
        }

        Ok(handles)
    }

    /// Deliver a reviewer's decision. False if the proposal is no longer pending.
    pub fn resolve(&self, proposal_id: Uuid, decision: Decision) -> bool {
        self.approvals.resolve(proposal_id, decision)
    }

    /// Scan a message, record any infraction and propose the next sanction.
    /// The review runs on its own task; this returns as soon as it is started.
    pub async fn on_message(
        self: &Arc<Self>,
        message: IncomingMessage,
    ) -> Result<MessageVerdict, Error> {
        if message.is_automated {
            return Ok(MessageVerdict::Ignored);
        }

        let config = self.config.get(message.guild_id).await?;
        if !config.enabled {
            return Ok(MessageVerdict::Ignored);
        }

        let Some(word) = detector::detect(&message.text, &config.banned_terms) else {
            return Ok(MessageVerdict::Clean);
        };
        let word = word.to_string();

        // Record, decide and open under one lock so two messages cannot both propose
        let (record, pending) = {
            let guard = self.ledger.lock(message.user_id).await;
            let record = guard
                .record_infraction(Infraction {
                    word: word.clone(),
                    message: message.text.clone(),
                    channel_id: message.channel_id,
                    message_id: message.message_id,
                    timestamp: Utc::now(),
                })
                .await?;

            let pending = policy::decide(&record).and_then(|kind| {
                self.approvals.open(
                    message.guild_id,
                    message.user_id,
                    kind,
                    policy::reason_summary(kind, &record),
                )
            });

            (record, pending)
        };

        info!(
            "User {} used banned word in channel {} (current {}, total {})",
            message.user_id, message.channel_id, record.current_infractions, record.total_infractions
        );
        self.audit
            .log_event(
                "MODERATION_INFRACTION",
                &format!(
                    "User {} used banned word \"{}\" in channel {} (infractions: {} current, {} total)",
                    message.user_id,
                    word,
                    message.channel_id,
                    record.current_infractions,
                    record.total_infractions
                ),
            )
            .await;

        let proposed = pending.as_ref().map(|p| p.proposal.kind);
        if let Some(pending) = pending {
            self.audit
                .log_event(
                    "MODERATION",
                    &format!(
                        "Proposed {} for user {}: {}",
                        pending.proposal.kind,
                        pending.proposal.target_user_id,
                        pending.proposal.reason_summary
                    ),
                )
                .await;

            let engine = Arc::clone(self);
            tokio::spawn(async move { engine.review(pending).await });
        }

        if let Err(e) = self
            .platform
            .warn_user(message.user_id, &word, &message.text)
            .await
        {
            debug!("Could not warn user {}: {:?}", message.user_id, e);
        }

        Ok(MessageVerdict::Infraction { word, proposed })
    }

    /// Publish a proposal, wait for its decision and act on it
    async fn review(&self, pending: PendingApproval) {
        let guild_id = pending.proposal.guild_id;
        let user_id = pending.proposal.target_user_id;
        let kind = pending.proposal.kind;

        let config = match self.config.get(guild_id).await {
            Ok(config) => config,
            Err(e) => {
                self.abandon(&pending, e).await;
                return;
            }
        };

        let Some(destination) = self
            .platform
            .resolve_review_destination(guild_id, config.review_channel_id)
            .await
        else {
            self.abandon(&pending, Error::NoReviewChannel(guild_id)).await;
            return;
        };

        let review_message = match self
            .platform
            .publish_proposal(destination, &pending.proposal)
            .await
        {
            Ok(review_message) => review_message,
            Err(e) => {
                self.abandon(&pending, e).await;
                return;
            }
        };

        let proposal = &pending.proposal;
        let expires_at = chrono::Duration::from_std(pending.remaining())
            .ok()
            .and_then(|left| Utc::now().checked_add_signed(left))
            .unwrap_or(proposal.created_at);
        let open = OpenProposal {
            id: proposal.id,
            guild_id,
            target_user_id: user_id,
            kind,
            reason_summary: proposal.reason_summary.clone(),
            created_at: proposal.created_at,
            expires_at,
            review_channel_id: review_message.channel_id,
            review_message_id: review_message.message_id,
        };
        if let Err(e) = self.proposals.insert_proposal(&open).await {
            // Review still runs; only a restart would lose it
            warn!("Failed to persist proposal {}: {:?}", proposal.id, e);
        }

        self.conclude(pending, review_message).await;
    }

    /// Wait for the decision on a published proposal and act on it
    async fn conclude(&self, pending: PendingApproval, review_message: ReviewMessage) {
        let proposal = self.approvals.wait(pending).await;
        self.forget(proposal.id).await;

        let guild_id = proposal.guild_id;
        let user_id = proposal.target_user_id;
        let kind = proposal.kind;

        let result = match proposal.outcome {
            ProposalOutcome::Accepted => {
                // Durations may have changed while the proposal was open
                let executed = match self.config.get(guild_id).await {
                    Ok(config) => self.executor.execute(guild_id, user_id, kind, &config).await,
                    Err(e) => Err(e),
                };
                match executed {
                    Ok(_) => "accepted and executed".to_string(),
                    Err(e) => format!("accepted but execution failed: {}", e),
                }
            }
            ProposalOutcome::Rejected => "rejected".to_string(),
            ProposalOutcome::Expired => "expired".to_string(),
            ProposalOutcome::Pending => return,
        };

        let reviewer = proposal
            .resolved_by
            .map(|id| format!(" by {}", id))
            .unwrap_or_default();
        self.audit
            .log_event(
                "MODERATION",
                &format!(
                    "{} proposal for user {} {}{}",
                    kind, user_id, result, reviewer
                ),
            )
            .await;

        if let Err(e) = self
            .platform
            .update_proposal(review_message, &proposal, &result)
            .await
        {
            warn!("Failed to update review message for proposal {}: {:?}", proposal.id, e);
        }
    }

    /// Close out a proposal whose review window ran out while the bot was down
    async fn expire_offline(&self, mut proposal: Proposal, review_message: ReviewMessage) {
        proposal.expire();
        self.forget(proposal.id).await;

        info!(
            "Proposal {} for user {} expired while offline",
            proposal.id, proposal.target_user_id
        );
        self.audit
            .log_event(
                "MODERATION",
                &format!(
                    "{} proposal for user {} expired",
                    proposal.kind, proposal.target_user_id
                ),
            )
            .await;

        if let Err(e) = self
            .platform
            .update_proposal(review_message, &proposal, "expired")
            .await
        {
            warn!("Failed to update review message for proposal {}: {:?}", proposal.id, e);
        }
    }

    async fn forget(&self, proposal_id: Uuid) {
        if let Err(e) = self.proposals.remove_proposal(proposal_id).await {
            error!("Failed to remove stored proposal {}: {:?}", proposal_id, e);
        }
    }

    /// Drop a proposal that could not be put in front of reviewers
    async fn abandon(&self, pending: &PendingApproval, reason: Error) {
        let proposal = &pending.proposal;
        self.approvals.close(proposal);

        error!(
            "Abandoned {} proposal for user {}: {}",
            proposal.kind, proposal.target_user_id, reason
        );
        self.audit
            .log_event(
                "MODERATION_ERROR",
                &format!(
                    "Could not propose {} for user {}: {}",
                    proposal.kind, proposal.target_user_id, reason
                ),
            )
            .await;
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::db::memory::MemoryStore;
    use crate::db::models::{HistoryEntry, ModerationConfig};
    use super::testing::{FakePlatform, PlatformCall};

    fn stored_proposal(expires_at: chrono::DateTime<Utc>) -> OpenProposal {
        OpenProposal {
            id: Uuid::new_v4(),
            guild_id: GUILD,
            target_user_id: USER,
            kind: SanctionKind::Timeout,
            reason_summary: "User has 5 infractions".to_string(),
            created_at: expires_at - chrono::Duration::seconds(300),
            expires_at,
            review_channel_id: 100,
            review_message_id: 555,
        }
    }

    const GUILD: u64 = 1;
    const USER: u64 = 42;

    struct Fixture {
        store: Arc<MemoryStore>,
        platform: Arc<FakePlatform>,
        engine: Arc<Moderation>,
    }

    fn fixture() -> Fixture {
        let store = Arc::new(MemoryStore::new());
        let mut config = ModerationConfig::new(GUILD);
        config.banned_terms = vec!["spam".to_string()];
        store.put_config(config);

        let platform = Arc::new(FakePlatform::default());
        let engine = Arc::new(Moderation::new(
            store.clone(),
            store.clone(),
            store.clone(),
            store.clone(),
            platform.clone(),
            Arc::new(AuditLog::disabled()),
            Duration::from_secs(300),
        ));

        Fixture {
            store,
            platform,
            engine,
        }
    }

    fn message(text: &str) -> IncomingMessage {
        IncomingMessage {
            user_id: USER,
            guild_id: GUILD,
            channel_id: 10,
            message_id: 11,
            text: text.to_string(),
            is_automated: false,
        }
    }

    /// Let spawned review tasks run until `done` holds
    async fn settle(platform: &FakePlatform, done: impl Fn(&FakePlatform) -> bool) {
        for _ in 0..100 {
            if done(platform) {
                return;
            }
            tokio::task::yield_now().await;
        }
        panic!("review task did not settle: {:?}", platform.calls());
    }

    #[tokio::test(start_paused = true)]
    async fn test_fifth_infraction_proposes_timeout_and_accept_executes() {
        let f = fixture();

        for _ in 0..4 {
            let verdict = f.engine.on_message(message("spam")).await.unwrap();
            assert_eq!(
                verdict,
                MessageVerdict::Infraction {
                    word: "spam".to_string(),
                    proposed: None
                }
            );
        }
        let verdict = f.engine.on_message(message("spam")).await.unwrap();
        assert_eq!(
            verdict,
            MessageVerdict::Infraction {
                word: "spam".to_string(),
                proposed: Some(SanctionKind::Timeout)
            }
        );

        settle(&f.platform, |p| p.published().len() == 1).await;
        let proposal_id = f.platform.published()[0];
        assert!(f.engine.resolve(proposal_id, Decision::Accept { reviewer_id: 7 }));
        assert!(!f.engine.resolve(proposal_id, Decision::Accept { reviewer_id: 8 }));

        settle(&f.platform, |p| !p.updates().is_empty()).await;
        assert_eq!(f.platform.updates(), vec!["accepted and executed".to_string()]);
        assert_eq!(
            f.platform.sanctions(),
            vec![PlatformCall::Timeout {
                guild_id: GUILD,
                user_id: USER,
                secs: 30 * 60
            }]
        );

        let record = f.engine.ledger().get(USER).await.unwrap().unwrap();
        assert_eq!(record.current_infractions, 0);
        assert_eq!(record.current_timeouts, 1);
        assert_eq!(record.total_infractions, 5);
    }

    #[tokio::test(start_paused = true)]
    async fn test_expired_proposal_applies_nothing() {
        let f = fixture();
        for _ in 0..5 {
            f.engine.on_message(message("spam")).await.unwrap();
        }
        settle(&f.platform, |p| p.published().len() == 1).await;
        let proposal_id = f.platform.published()[0];

        tokio::time::advance(Duration::from_secs(301)).await;
        settle(&f.platform, |p| !p.updates().is_empty()).await;

        assert_eq!(f.platform.updates(), vec!["expired".to_string()]);
        assert!(f.platform.sanctions().is_empty());
        assert!(!f.engine.resolve(proposal_id, Decision::Accept { reviewer_id: 7 }));

        let record = f.engine.ledger().get(USER).await.unwrap().unwrap();
        assert_eq!(record.current_infractions, 5);
        assert!(!record
            .history
            .iter()
            .any(|e| matches!(e, HistoryEntry::SanctionApplied { .. })));
    }

    #[tokio::test(start_paused = true)]
    async fn test_only_one_proposal_while_pending() {
        let f = fixture();
        for _ in 0..7 {
            f.engine.on_message(message("spam")).await.unwrap();
        }
        settle(&f.platform, |p| p.published().len() == 1).await;

        let proposal_id = f.platform.published()[0];
        assert!(f.engine.resolve(proposal_id, Decision::Reject { reviewer_id: 7 }));
        settle(&f.platform, |p| !p.updates().is_empty()).await;

        assert_eq!(f.platform.published().len(), 1);
        assert_eq!(f.platform.updates(), vec!["rejected".to_string()]);
        let record = f.engine.ledger().get(USER).await.unwrap().unwrap();
        assert_eq!(record.current_infractions, 7);

        // Next infraction proposes again once the previous one is settled
        let verdict = f.engine.on_message(message("spam")).await.unwrap();
        assert!(matches!(
            verdict,
            MessageVerdict::Infraction {
                proposed: Some(SanctionKind::Timeout),
                ..
            }
        ));
    }

    #[tokio::test(start_paused = true)]
    async fn test_missing_review_channel_abandons_proposal() {
        let f = fixture();
        f.platform.without_review_channel();

        for _ in 0..5 {
            f.engine.on_message(message("spam")).await.unwrap();
        }
        for _ in 0..10 {
            tokio::task::yield_now().await;
        }

        assert!(f.platform.published().is_empty());
        assert!(f.platform.sanctions().is_empty());
        assert!(!f.engine.approvals.has_open(GUILD, USER));
    }

    #[tokio::test(start_paused = true)]
    async fn test_failed_execution_is_reported() {
        let f = fixture();
        f.platform.fail_with("Missing Permissions");

        for _ in 0..5 {
            f.engine.on_message(message("spam")).await.unwrap();
        }
        settle(&f.platform, |p| p.published().len() == 1).await;
        let proposal_id = f.platform.published()[0];
        f.engine.resolve(proposal_id, Decision::Accept { reviewer_id: 7 });
        settle(&f.platform, |p| !p.updates().is_empty()).await;

        let update = &f.platform.updates()[0];
        assert!(update.starts_with("accepted but execution failed"));
        let record = f.engine.ledger().get(USER).await.unwrap().unwrap();
        assert_eq!(record.current_timeouts, 1);
    }

    #[tokio::test]
    async fn test_automated_and_disabled_are_ignored() {
        let f = fixture();

        let mut bot = message("spam");
        bot.is_automated = true;
        assert_eq!(f.engine.on_message(bot).await.unwrap(), MessageVerdict::Ignored);

        f.store.set_enabled(GUILD, false).await.unwrap();
        assert_eq!(
            f.engine.on_message(message("spam")).await.unwrap(),
            MessageVerdict::Ignored
        );
        assert!(f.engine.ledger().get(USER).await.unwrap().is_none());
    }

    #[tokio::test]
    async fn test_clean_message_records_nothing() {
        let f = fixture();
        assert_eq!(
            f.engine.on_message(message("spammer is fine")).await.unwrap(),
            MessageVerdict::Clean
        );
        assert!(f.engine.ledger().get(USER).await.unwrap().is_none());
        assert!(f.platform.calls().is_empty());
    }

    #[tokio::test]
    async fn test_offender_is_warned() {
        let f = fixture();
        f.engine.on_message(message("such spam")).await.unwrap();
        assert_eq!(
            f.platform.calls(),
            vec![PlatformCall::Warn {
                user_id: USER,
                word: "spam".to_string()
            }]
        );
    }

    #[tokio::test(start_paused = true)]
    async fn test_open_proposal_is_stored_until_resolved() {
        let f = fixture();
        for _ in 0..5 {
            f.engine.on_message(message("spam")).await.unwrap();
        }
        settle(&f.platform, |p| p.published().len() == 1).await;
        for _ in 0..10 {
            tokio::task::yield_now().await;
        }

        let stored = f.store.open_proposals().await.unwrap();
        assert_eq!(stored.len(), 1);
        assert_eq!(stored[0].id, f.platform.published()[0]);
        assert_eq!(stored[0].review_channel_id, 100);
        let window = (stored[0].expires_at - stored[0].created_at).num_seconds();
        assert!((299..=300).contains(&window));

        f.engine.resolve(stored[0].id, Decision::Reject { reviewer_id: 7 });
        settle(&f.platform, |p| !p.updates().is_empty()).await;
        assert!(f.store.open_proposals().await.unwrap().is_empty());
    }

    #[tokio::test(start_paused = true)]
    async fn test_proposal_overdue_at_restart_is_expired() {
        let f = fixture();
        let stored = stored_proposal(Utc::now() - chrono::Duration::minutes(10));
        f.store.insert_proposal(&stored).await.unwrap();

        let handles = f.engine.restore_proposals().await.unwrap();

        assert!(handles.is_empty());
        assert_eq!(
            f.platform.calls(),
            vec![PlatformCall::Update {
                message_id: 555,
                result: "expired".to_string()
            }]
        );
        assert!(f.store.open_proposals().await.unwrap().is_empty());
        assert!(!f.engine.resolve(stored.id, Decision::Accept { reviewer_id: 7 }));
    }

    #[tokio::test(start_paused = true)]
    async fn test_proposal_restored_with_time_left_can_be_accepted() {
        let f = fixture();
        let stored = stored_proposal(Utc::now() + chrono::Duration::seconds(120));
        f.store.insert_proposal(&stored).await.unwrap();

        let handles = f.engine.restore_proposals().await.unwrap();
        assert_eq!(handles.len(), 1);
        assert!(f.engine.approvals.has_open(GUILD, USER));

        assert!(f.engine.resolve(stored.id, Decision::Accept { reviewer_id: 7 }));
        for handle in handles {
            handle.await.unwrap();
        }

        assert_eq!(f.platform.updates(), vec!["accepted and executed".to_string()]);
        assert_eq!(
            f.platform.sanctions(),
            vec![PlatformCall::Timeout {
                guild_id: GUILD,
                user_id: USER,
                secs: 30 * 60
            }]
        );
        assert!(f.store.open_proposals().await.unwrap().is_empty());
    }

    #[tokio::test(start_paused = true)]
    async fn test_restored_proposal_expires_after_remaining_time() {
        let f = fixture();
        let stored = stored_proposal(Utc::now() + chrono::Duration::seconds(120));
        f.store.insert_proposal(&stored).await.unwrap();

        let handles = f.engine.restore_proposals().await.unwrap();
        tokio::time::advance(std::time::Duration::from_secs(121)).await;
        for handle in handles {
            handle.await.unwrap();
        }

        assert_eq!(f.platform.updates(), vec!["expired".to_string()]);
        assert!(f.platform.sanctions().is_empty());
    }

    #[tokio::test(start_paused = true)]
    async fn test_racing_messages_at_threshold_open_one_proposal() {
        let f = fixture();
        for _ in 0..4 {
            f.engine.on_message(message("spam")).await.unwrap();
        }

        let handles: Vec<_> = (0..5)
            .map(|_| {
                let engine = f.engine.clone();
                tokio::spawn(async move { engine.on_message(message("spam")).await.unwrap() })
            })
            .collect();
        let mut proposed = 0;
        for handle in handles {
            if let MessageVerdict::Infraction {
                proposed: Some(_), ..
            } = handle.await.unwrap()
            {
                proposed += 1;
            }
        }

        for _ in 0..50 {
            tokio::task::yield_now().await;
        }
        assert_eq!(proposed, 1);
        assert_eq!(f.platform.published().len(), 1);
        let record = f.engine.ledger().get(USER).await.unwrap().unwrap();
        assert_eq!(record.total_infractions, 9);
        assert_eq!(record.infraction_entries(), 9);
    }
}
