use std::sync::Arc;
use std::time::Duration;

use chrono::{DateTime, Utc};
use tokio::task::JoinHandle;
use tracing::{debug, error, info, warn};

use crate::bot::error::Error;
use crate::constants::moderation::UNBAN_REASON;
use crate::db::models::{ReversalAction, ScheduledReversal};
use crate::db::store::ReversalStore;
use crate::services::audit::AuditLog;
use crate::services::moderation::platform::ModerationPlatform;

/// Fires timed sanction reversals, surviving restarts through the store
pub struct ReversalScheduler {
    store: Arc<dyn ReversalStore>,
    platform: Arc<dyn ModerationPlatform>,
    audit: Arc<AuditLog>,
}

/// Time left until `fire_at`, zero if it already passed
pub fn delay_until(fire_at: DateTime<Utc>, now: DateTime<Utc>) -> Duration {
    (fire_at - now).to_std().unwrap_or(Duration::ZERO)
}

impl ReversalScheduler {
    pub fn new(
        store: Arc<dyn ReversalStore>,
        platform: Arc<dyn ModerationPlatform>,
        audit: Arc<AuditLog>,
    ) -> Self {
        Self {
            store,
            platform,
            audit,
        }
    }

    /// Persist a reversal and arm its timer
    pub async fn schedule(
        self: &Arc<Self>,
        reversal: ScheduledReversal,
    ) -> Result<JoinHandle<()>, Error> {
        self.store.insert(&reversal).await?;

        info!(
            "Scheduled {} of user {} in guild {} at {}",
            reversal.action.as_str(),
            reversal.target_user_id,
            reversal.guild_id,
            reversal.fire_at
        );

        Ok(self.arm(reversal))
    }

    /// Re-arm every persisted reversal. Overdue ones fire right away.
    pub async fn restore(self: &Arc<Self>) -> Result<Vec<JoinHandle<()>>, Error> {
        let pending = self.store.pending().await?;

        if !pending.is_empty() {
            info!("Restoring {} scheduled reversal(s)", pending.len());
        }

        Ok(pending.into_iter().map(|r| self.arm(r)).collect())
    }

    fn arm(self: &Arc<Self>, reversal: ScheduledReversal) -> JoinHandle<()> {
        let scheduler = Arc::clone(self);
        let delay = delay_until(reversal.fire_at, Utc::now());
        let deadline = tokio::time::Instant::now() + delay;

        tokio::spawn(async move {
            if !delay.is_zero() {
                debug!("Reversal {} fires in {:?}", reversal.id, delay);
                tokio::time::sleep_until(deadline).await;
            }
            scheduler.fire(&reversal).await;
        })
    }

    async fn fire(&self, reversal: &ScheduledReversal) {
        let result = match reversal.action {
            ReversalAction::Unban => {
                self.platform
                    .unban(reversal.guild_id, reversal.target_user_id, UNBAN_REASON)
                    .await
            }
        };

        match result {
            Ok(()) => {
                info!(
                    "Unbanned user {} in guild {} (ban expired)",
                    reversal.target_user_id, reversal.guild_id
                );
                self.audit
                    .log_event(
                        "MODERATION_ACTION",
                        &format!(
                            "User {} unbanned after ban duration expired",
                            reversal.target_user_id
                        ),
                    )
                    .await;
            }
            Err(e) => {
                warn!(
                    "Failed to unban user {} in guild {}: {:?}",
                    reversal.target_user_id, reversal.guild_id, e
                );
                self.audit
                    .log_event(
                        "MODERATION_ERROR",
                        &format!("Failed to unban user {}: {}", reversal.target_user_id, e),
                    )
                    .await;
            }
        }

        if let Err(e) = self.store.remove(reversal.id).await {
            error!("Failed to remove reversal {}: {:?}", reversal.id, e);
        }
    }
}
