use std::sync::Arc;

use chrono::Utc;
use tracing::{error, info, warn};

use crate::bot::error::Error;
use crate::constants::moderation::{format_duration, BAN_REASON, KICK_REASON, TIMEOUT_REASON};
use crate::db::models::{AppliedSanction, ModerationConfig, SanctionKind, ScheduledReversal, UserRecord};
use crate::services::audit::AuditLog;
use crate::services::moderation::ledger::Ledger;
use crate::services::moderation::platform::ModerationPlatform;
use crate::services::moderation::scheduler::ReversalScheduler;

/// A sanction that reached the platform and the ledger
#[derive(Debug, Clone)]
pub struct Applied {
    pub kind: SanctionKind,
    pub record: UserRecord,
    pub reversal: Option<ScheduledReversal>,
}

/// Applies approved sanctions on the platform and in the ledger
pub struct SanctionExecutor {
    ledger: Arc<Ledger>,
    platform: Arc<dyn ModerationPlatform>,
    scheduler: Arc<ReversalScheduler>,
    audit: Arc<AuditLog>,
}

impl SanctionExecutor {
    pub fn new(
        ledger: Arc<Ledger>,
        platform: Arc<dyn ModerationPlatform>,
        scheduler: Arc<ReversalScheduler>,
        audit: Arc<AuditLog>,
    ) -> Self {
        Self {
            ledger,
            platform,
            scheduler,
            audit,
        }
    }

    /// Apply `kind` to the user.
    ///
    /// The sanction is written to the ledger even when the platform call fails,
    /// with `confirmed = false`, and the failure is then returned as
    /// `Error::Execution`.
    pub async fn execute(
        &self,
        guild_id: u64,
        user_id: u64,
        kind: SanctionKind,
        config: &ModerationConfig,
    ) -> Result<Applied, Error> {
        let unban_at = match (kind, config.ban_duration()) {
            (SanctionKind::Ban, Some(duration)) => {
                let unban_at = Utc::now().checked_add_signed(duration);
                if unban_at.is_none() {
                    warn!(
                        "Ban duration of {} days is out of range, banning user {} permanently",
                        config.ban_duration_days, user_id
                    );
                }
                unban_at
            }
            _ => None,
        };

        let (reason, duration_secs, outcome) = match kind {
            SanctionKind::Timeout => {
                let duration = config.timeout_duration();
                let outcome = self
                    .platform
                    .apply_timeout(guild_id, user_id, duration)
                    .await;
                (TIMEOUT_REASON, Some(duration.as_secs()), outcome)
            }
            SanctionKind::Kick => {
                let outcome = self.platform.kick(guild_id, user_id, KICK_REASON).await;
                (KICK_REASON, None, outcome)
            }
            SanctionKind::Ban => {
                let outcome = self.platform.ban(guild_id, user_id, BAN_REASON).await;
                let duration_secs = unban_at
                    .and(config.ban_duration())
                    .and_then(|d| d.to_std().ok())
                    .map(|d| d.as_secs());
                (BAN_REASON, duration_secs, outcome)
            }
        };

        let record = self
            .ledger
            .apply_sanction(
                user_id,
                AppliedSanction {
                    kind,
                    duration_secs,
                    reason: reason.to_string(),
                    confirmed: outcome.is_ok(),
                    timestamp: Utc::now(),
                },
            )
            .await?;

        if let Err(e) = outcome {
            error!(
                "Failed to apply {} to user {} in guild {}: {:?}",
                kind, user_id, guild_id, e
            );
            self.audit
                .log_event(
                    "MODERATION_ERROR",
                    &format!("Failed to apply {} to user {}: {}", kind, user_id, e),
                )
                .await;
            return Err(match e {
                Error::Execution(_) => e,
                other => Error::execution(other),
            });
        }

        let reversal = match unban_at {
            Some(unban_at) => {
                let reversal = ScheduledReversal::unban(guild_id, user_id, unban_at);
                // The ban itself stands even if its expiry cannot be stored
                match self.scheduler.schedule(reversal.clone()).await {
                    Ok(_) => Some(reversal),
                    Err(e) => {
                        error!("Failed to schedule unban of user {}: {:?}", user_id, e);
                        self.audit
                            .log_event(
                                "MODERATION_ERROR",
                                &format!("Failed to schedule unban of user {}: {}", user_id, e),
                            )
                            .await;
                        None
                    }
                }
            }
            None => None,
        };

        let detail = match (kind, duration_secs) {
            (SanctionKind::Ban, None) => "permanent".to_string(),
            (_, Some(secs)) => format_duration(std::time::Duration::from_secs(secs)),
            (_, None) => reason.to_string(),
        };
        info!("Applied {} to user {} in guild {} ({})", kind, user_id, guild_id, detail);
        self.audit
            .log_event(
                "MODERATION_ACTION",
                &format!("{} applied to user {} ({})", kind, user_id, detail),
            )
            .await;

        Ok(Applied {
            kind,
            record,
            reversal,
        })
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::db::memory::MemoryStore;
    use crate::db::models::HistoryEntry;
    use crate::db::store::ReversalStore;
    use crate::services::moderation::testing::{FakePlatform, PlatformCall};

    struct Fixture {
        store: Arc<MemoryStore>,
        platform: Arc<FakePlatform>,
        ledger: Arc<Ledger>,
        executor: SanctionExecutor,
    }

    fn fixture() -> Fixture {
        let store = Arc::new(MemoryStore::new());
        let platform = Arc::new(FakePlatform::default());
        let audit = Arc::new(AuditLog::disabled());
        let ledger = Arc::new(Ledger::new(store.clone()));
        let scheduler = Arc::new(ReversalScheduler::new(
            store.clone(),
            platform.clone(),
            audit.clone(),
        ));
        let executor = SanctionExecutor::new(ledger.clone(), platform.clone(), scheduler, audit);

        Fixture {
            store,
            platform,
            ledger,
            executor,
        }
    }

    #[tokio::test]
    async fn test_timeout_resets_infractions() {
        let f = fixture();
        let config = ModerationConfig::new(1);

        let applied = f
            .executor
            .execute(1, 2, SanctionKind::Timeout, &config)
            .await
            .unwrap();

        assert_eq!(applied.record.current_timeouts, 1);
        assert_eq!(applied.record.total_timeouts, 1);
        assert_eq!(
            f.platform.calls(),
            vec![PlatformCall::Timeout {
                guild_id: 1,
                user_id: 2,
                secs: 30 * 60
            }]
        );
        assert!(matches!(
            applied.record.history.last(),
            Some(HistoryEntry::SanctionApplied {
                kind: SanctionKind::Timeout,
                confirmed: true,
                duration_secs: Some(1800),
                ..
            })
        ));
    }

    #[tokio::test(start_paused = true)]
    async fn test_ban_schedules_unban() {
        let f = fixture();
        let config = ModerationConfig::new(1);

        let applied = f.executor.execute(1, 2, SanctionKind::Ban, &config).await.unwrap();

        let reversal = applied.reversal.unwrap();
        let hours = (reversal.fire_at - Utc::now()).num_hours();
        assert!((167..=168).contains(&hours));
        assert_eq!(f.store.pending().await.unwrap().len(), 1);
    }

    #[tokio::test]
    async fn test_permanent_ban_schedules_nothing() {
        let f = fixture();
        let mut config = ModerationConfig::new(1);
        config.ban_duration_days = 0;

        let applied = f.executor.execute(1, 2, SanctionKind::Ban, &config).await.unwrap();

        assert!(applied.reversal.is_none());
        assert!(f.store.pending().await.unwrap().is_empty());
    }

    #[tokio::test]
    async fn test_out_of_range_ban_duration_bans_permanently() {
        let f = fixture();
        let mut config = ModerationConfig::new(1);
        config.ban_duration_days = u32::MAX;

        let applied = f.executor.execute(1, 2, SanctionKind::Ban, &config).await.unwrap();

        assert!(applied.reversal.is_none());
        assert!(f.store.pending().await.unwrap().is_empty());
        assert_eq!(f.platform.sanctions(), vec![PlatformCall::Ban { guild_id: 1, user_id: 2 }]);
        assert!(matches!(
            applied.record.history.last(),
            Some(HistoryEntry::SanctionApplied {
                kind: SanctionKind::Ban,
                duration_secs: None,
                confirmed: true,
                ..
            })
        ));
    }

    #[tokio::test]
    async fn test_failed_platform_call_keeps_ledger_entry() {
        let f = fixture();
        f.platform.fail_with("Missing Permissions");
        let config = ModerationConfig::new(1);

        let result = f.executor.execute(1, 2, SanctionKind::Ban, &config).await;

        assert!(matches!(result, Err(Error::Execution(_))));
        let record = f.ledger.get(2).await.unwrap().unwrap();
        assert!(matches!(
            record.history.last(),
            Some(HistoryEntry::SanctionApplied {
                kind: SanctionKind::Ban,
                confirmed: false,
                ..
            })
        ));
        // No unban for a ban that never happened
        assert!(f.store.pending().await.unwrap().is_empty());
    }

    #[tokio::test]
    async fn test_failed_kick_still_moves_counters() {
        let f = fixture();
        f.platform.fail_with("Unknown Member");
        let config = ModerationConfig::new(1);

        let result = f.executor.execute(1, 2, SanctionKind::Kick, &config).await;

        assert!(result.is_err());
        let record = f.ledger.get(2).await.unwrap().unwrap();
        assert_eq!(record.current_kicks, 1);
        assert_eq!(record.total_kicks, 1);
    }
}
