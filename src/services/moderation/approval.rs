use std::time::Duration;

use chrono::{DateTime, Utc};
use dashmap::DashMap;
use tokio::sync::oneshot;
use tokio::time::Instant;
use tracing::{debug, info};
use uuid::Uuid;

use crate::db::models::SanctionKind;

/// Outcome of a sanction proposal
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum ProposalOutcome {
    Pending,
    Accepted,
    Rejected,
    Expired,
}

impl ProposalOutcome {
    pub fn as_str(&self) -> &'static str {
        match self {
            ProposalOutcome::Pending => "pending",
            ProposalOutcome::Accepted => "accepted",
            ProposalOutcome::Rejected => "rejected",
            ProposalOutcome::Expired => "expired",
        }
    }
}

/// A reviewer's answer
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum Decision {
    Accept { reviewer_id: u64 },
    Reject { reviewer_id: u64 },
}

impl Decision {
    pub fn reviewer_id(&self) -> u64 {
        match self {
            Decision::Accept { reviewer_id } | Decision::Reject { reviewer_id } => *reviewer_id,
        }
    }
}

/// A request for human approval of a sanction
#[derive(Debug, Clone, PartialEq)]
pub struct Proposal {
    pub id: Uuid,
    pub guild_id: u64,
    pub target_user_id: u64,
    pub kind: SanctionKind,
    pub reason_summary: String,
    pub created_at: DateTime<Utc>,
    pub resolved_at: Option<DateTime<Utc>>,
    pub outcome: ProposalOutcome,
    pub resolved_by: Option<u64>,
}

impl Proposal {
    /// A pending proposal rebuilt from its stored fields
    pub fn restored(
        id: Uuid,
        guild_id: u64,
        target_user_id: u64,
        kind: SanctionKind,
        reason_summary: String,
        created_at: DateTime<Utc>,
    ) -> Self {
        Self {
            id,
            guild_id,
            target_user_id,
            kind,
            reason_summary,
            created_at,
            resolved_at: None,
            outcome: ProposalOutcome::Pending,
            resolved_by: None,
        }
    }

    /// Expire a proposal whose decision channel no longer exists
    pub fn expire(&mut self) {
        self.resolve(None);
    }

    /// Apply the single terminal transition
    fn resolve(&mut self, decision: Option<Decision>) {
        debug_assert_eq!(self.outcome, ProposalOutcome::Pending);

        self.outcome = match decision {
            Some(Decision::Accept { .. }) => ProposalOutcome::Accepted,
            Some(Decision::Reject { .. }) => ProposalOutcome::Rejected,
            None => ProposalOutcome::Expired,
        };
        self.resolved_by = decision.map(|d| d.reviewer_id());
        self.resolved_at = Some(Utc::now());
    }
}

/// A registered proposal waiting for its decision
#[derive(Debug)]
pub struct PendingApproval {
    pub proposal: Proposal,
    decision_rx: oneshot::Receiver<Decision>,
    deadline: Instant,
}

impl PendingApproval {
    /// Time left before the proposal expires
    pub fn remaining(&self) -> Duration {
        self.deadline.saturating_duration_since(Instant::now())
    }
}

/// Wait for whichever comes first: a decision or the timeout.
/// Returns None on timeout or if the decision sender was dropped.
pub async fn await_one_of(
    decision_rx: oneshot::Receiver<Decision>,
    timeout: Duration,
) -> Option<Decision> {
    match tokio::time::timeout(timeout, decision_rx).await {
        Ok(Ok(decision)) => Some(decision),
        Ok(Err(_)) | Err(_) => None,
    }
}

/// Tracks open proposals and delivers reviewer decisions exactly once
pub struct ApprovalWorkflow {
    /// proposal id -> sender for its decision
    waiters: DashMap<Uuid, oneshot::Sender<Decision>>,
    /// (guild id, target user id) -> open proposal id
    open_by_user: DashMap<(u64, u64), Uuid>,
    timeout: Duration,
}

impl ApprovalWorkflow {
    pub fn new(timeout: Duration) -> Self {
        Self {
            waiters: DashMap::new(),
            open_by_user: DashMap::new(),
            timeout,
        }
    }

    pub fn timeout(&self) -> Duration {
        self.timeout
    }

    /// Register a new pending proposal.
    /// Returns None if the user already has one awaiting review in this guild.
    pub fn open(
        &self,
        guild_id: u64,
        target_user_id: u64,
        kind: SanctionKind,
        reason_summary: String,
    ) -> Option<PendingApproval> {
        let proposal = Proposal::restored(
            Uuid::new_v4(),
            guild_id,
            target_user_id,
            kind,
            reason_summary,
            Utc::now(),
        );
        let pending = self.register(proposal, self.timeout)?;

        info!(
            "Opened {} proposal {} for user {} in guild {}",
            kind, pending.proposal.id, target_user_id, guild_id
        );

        Some(pending)
    }

    /// Re-register a proposal that was pending before a restart
    pub fn reopen(&self, proposal: Proposal, remaining: Duration) -> Option<PendingApproval> {
        let pending = self.register(proposal, remaining)?;

        info!(
            "Reopened {} proposal {} for user {} ({:?} left)",
            pending.proposal.kind, pending.proposal.id, pending.proposal.target_user_id, remaining
        );

        Some(pending)
    }

    fn register(&self, proposal: Proposal, expires_in: Duration) -> Option<PendingApproval> {
        let key = (proposal.guild_id, proposal.target_user_id);

        match self.open_by_user.entry(key) {
            dashmap::mapref::entry::Entry::Occupied(existing) => {
                debug!(
                    "User {} already has proposal {} awaiting review in guild {}",
                    proposal.target_user_id,
                    existing.get(),
                    proposal.guild_id
                );
                return None;
            }
            dashmap::mapref::entry::Entry::Vacant(slot) => {
                slot.insert(proposal.id);
            }
        }

        let (decision_tx, decision_rx) = oneshot::channel();
        self.waiters.insert(proposal.id, decision_tx);

        Some(PendingApproval {
            proposal,
            decision_rx,
            deadline: Instant::now() + expires_in,
        })
    }

    /// Deliver a reviewer decision.
    /// Only the first call for a proposal is delivered; later calls return false.
    pub fn resolve(&self, proposal_id: Uuid, decision: Decision) -> bool {
        match self.waiters.remove(&proposal_id) {
            Some((_, decision_tx)) => decision_tx.send(decision).is_ok(),
            None => false,
        }
    }

    /// Suspend until the proposal is decided or expires
    pub async fn wait(&self, pending: PendingApproval) -> Proposal {
        let remaining = pending.remaining();
        let PendingApproval {
            mut proposal,
            decision_rx,
            ..
        } = pending;

        let decision = await_one_of(decision_rx, remaining).await;
        self.close(&proposal);
        proposal.resolve(decision);

        info!(
            "Proposal {} for user {} resolved: {}",
            proposal.id,
            proposal.target_user_id,
            proposal.outcome.as_str()
        );

        proposal
    }

    /// Forget a proposal so late decisions are ignored and the user can be proposed again
    pub fn close(&self, proposal: &Proposal) {
        self.waiters.remove(&proposal.id);
        self.open_by_user.remove_if(
            &(proposal.guild_id, proposal.target_user_id),
            |_, id| *id == proposal.id,
        );
    }

    pub fn has_open(&self, guild_id: u64, target_user_id: u64) -> bool {
        self.open_by_user.contains_key(&(guild_id, target_user_id))
    }

    pub fn is_pending(&self, proposal_id: Uuid) -> bool {
        self.waiters.contains_key(&proposal_id)
    }
}

#[cfg(test)]
mod tests {
    use std::sync::Arc;

    use tokio_test::{assert_pending, assert_ready, task};

    use super::*;

    fn workflow() -> ApprovalWorkflow {
        ApprovalWorkflow::new(Duration::from_secs(300))
    }

    #[tokio::test(start_paused = true)]
    async fn test_accept_resolves_proposal() {
        let workflow = Arc::new(workflow());
        let pending = workflow
            .open(1, 2, SanctionKind::Timeout, "User has 5 infractions".to_string())
            .unwrap();
        let id = pending.proposal.id;

        let waiter = {
            let workflow = workflow.clone();
            tokio::spawn(async move { workflow.wait(pending).await })
        };

        assert!(workflow.resolve(id, Decision::Accept { reviewer_id: 9 }));
        let proposal = waiter.await.unwrap();

        assert_eq!(proposal.outcome, ProposalOutcome::Accepted);
        assert_eq!(proposal.resolved_by, Some(9));
        assert!(proposal.resolved_at.is_some());
        assert!(!workflow.has_open(1, 2));
    }

    #[tokio::test(start_paused = true)]
    async fn test_second_resolution_is_noop() {
        let workflow = workflow();
        let pending = workflow
            .open(1, 2, SanctionKind::Kick, "User has 3 timeouts".to_string())
            .unwrap();
        let id = pending.proposal.id;

        assert!(workflow.resolve(id, Decision::Reject { reviewer_id: 7 }));
        assert!(!workflow.resolve(id, Decision::Accept { reviewer_id: 8 }));

        let proposal = workflow.wait(pending).await;
        assert_eq!(proposal.outcome, ProposalOutcome::Rejected);
        assert_eq!(proposal.resolved_by, Some(7));
    }

    #[tokio::test(start_paused = true)]
    async fn test_expires_without_decision() {
        let workflow = workflow();
        let pending = workflow
            .open(1, 2, SanctionKind::Timeout, "User has 5 infractions".to_string())
            .unwrap();
        let id = pending.proposal.id;

        let mut wait = task::spawn(workflow.wait(pending));
        assert_pending!(wait.poll());

        tokio::time::advance(Duration::from_secs(301)).await;
        let proposal = assert_ready!(wait.poll());
        drop(wait);

        assert_eq!(proposal.outcome, ProposalOutcome::Expired);
        assert_eq!(proposal.resolved_by, None);
        // A late click after expiry does nothing
        assert!(!workflow.resolve(id, Decision::Accept { reviewer_id: 1 }));
        assert!(!workflow.is_pending(id));
    }

    #[test]
    fn test_one_open_proposal_per_user() {
        let workflow = workflow();
        let first = workflow.open(1, 2, SanctionKind::Timeout, String::new());
        assert!(first.is_some());
        assert!(workflow
            .open(1, 2, SanctionKind::Timeout, String::new())
            .is_none());
        assert!(workflow.open(1, 3, SanctionKind::Timeout, String::new()).is_some());

        workflow.close(&first.unwrap().proposal);
        assert!(workflow.open(1, 2, SanctionKind::Kick, String::new()).is_some());
    }

    #[test]
    fn test_open_proposal_does_not_block_other_guilds() {
        let workflow = workflow();
        assert!(workflow.open(1, 2, SanctionKind::Timeout, String::new()).is_some());
        assert!(workflow.open(5, 2, SanctionKind::Timeout, String::new()).is_some());
        assert!(workflow.has_open(1, 2));
        assert!(workflow.has_open(5, 2));
        assert!(!workflow.has_open(6, 2));
    }

    #[tokio::test(start_paused = true)]
    async fn test_reopened_proposal_keeps_remaining_time() {
        let workflow = workflow();
        let created_at = Utc::now() - chrono::Duration::seconds(240);
        let proposal = Proposal::restored(
            Uuid::new_v4(),
            1,
            2,
            SanctionKind::Kick,
            "User has 3 timeouts".to_string(),
            created_at,
        );
        let pending = workflow.reopen(proposal, Duration::from_secs(60)).unwrap();
        assert!(workflow.has_open(1, 2));

        let mut wait = task::spawn(workflow.wait(pending));
        assert_pending!(wait.poll());

        tokio::time::advance(Duration::from_secs(59)).await;
        assert_pending!(wait.poll());

        tokio::time::advance(Duration::from_secs(2)).await;
        let proposal = assert_ready!(wait.poll());
        assert_eq!(proposal.outcome, ProposalOutcome::Expired);
        assert_eq!(proposal.created_at, created_at);
    }

    #[tokio::test(start_paused = true)]
    async fn test_await_one_of_dropped_sender() {
        let (tx, rx) = oneshot::channel::<Decision>();
        drop(tx);
        assert_eq!(await_one_of(rx, Duration::from_secs(5)).await, None);
    }
}
