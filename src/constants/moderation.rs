use std::time::Duration;

/// Escalation thresholds
pub const TIMEOUT_INFRACTION_THRESHOLD: u32 = 5; // Current infractions before a timeout is proposed
pub const KICK_TIMEOUT_THRESHOLD: u32 = 3; // Current timeouts before a kick is proposed

/// Defaults for per-guild moderation config (can be overridden via env vars)
pub const DEFAULT_TIMEOUT_MINUTES: u32 = 30;
pub const DEFAULT_BAN_DAYS: u32 = 7;

/// Longest timeout the platform accepts (28 days)
pub const MAX_TIMEOUT_MINUTES: u32 = 28 * 24 * 60;
/// Longest timed ban; anything longer should be permanent (0)
pub const MAX_BAN_DAYS: u32 = 3650;

/// How long reviewers have to accept or reject a proposal
pub const DEFAULT_APPROVAL_TIMEOUT_SECONDS: u64 = 300;

/// Channel name used when no review channel is configured
pub const REVIEW_CHANNEL_FALLBACK_NAME: &str = "mod-logs";

/// Days of messages removed when a ban is applied
pub const BAN_DELETE_MESSAGE_DAYS: u8 = 1;

/// Reasons attached to platform sanctions
pub const TIMEOUT_REASON: &str = "Accumulated infractions";
pub const KICK_REASON: &str = "Accumulated timeouts";
pub const BAN_REASON: &str = "Infraction after kick";
pub const UNBAN_REASON: &str = "Ban duration expired";

/// Banned terms seeded into a guild's config the first time it is created
pub const DEFAULT_BANNED_TERMS: &[&str] = &[
    "fuck", "shit", "bitch", "ass", "putain", "merde", "connard", "salope", "pute",
];

/// Words shown per page of `/banned-words list`
pub const BANNED_WORDS_PAGE_SIZE: usize = 20;

/// Format duration for display
pub fn format_duration(duration: Duration) -> String {
    let total_secs = duration.as_secs();

    if total_secs < 60 {
        format!("{} second{}", total_secs, if total_secs == 1 { "" } else { "s" })
    } else if total_secs < 3600 {
        let mins = total_secs / 60;
        format!("{} minute{}", mins, if mins == 1 { "" } else { "s" })
    } else if total_secs < 86400 {
        let hours = total_secs / 3600;
        format!("{} hour{}", hours, if hours == 1 { "" } else { "s" })
    } else {
        let days = total_secs / 86400;
        format!("{} day{}", days, if days == 1 { "" } else { "s" })
    }
}
