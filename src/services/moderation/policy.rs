use crate::constants::moderation::{KICK_TIMEOUT_THRESHOLD, TIMEOUT_INFRACTION_THRESHOLD};
use crate::db::models::{SanctionKind, UserRecord};

/// Decide which sanction, if any, a record calls for.
/// Higher severity wins when several thresholds are met.
pub fn decide(record: &UserRecord) -> Option<SanctionKind> {
    if record.current_kicks > 0 {
        // Reoffending after a kick goes straight to a ban
        Some(SanctionKind::Ban)
    } else if record.current_timeouts >= KICK_TIMEOUT_THRESHOLD {
        Some(SanctionKind::Kick)
    } else if record.current_infractions >= TIMEOUT_INFRACTION_THRESHOLD {
        Some(SanctionKind::Timeout)
    } else {
        None
    }
}

/// Human-readable reason shown to reviewers
pub fn reason_summary(kind: SanctionKind, record: &UserRecord) -> String {
    match kind {
        SanctionKind::Timeout => format!("User has {} infractions", record.current_infractions),
        SanctionKind::Kick => format!("User has {} timeouts", record.current_timeouts),
        SanctionKind::Ban => "User received an infraction after being kicked".to_string(),
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    fn record(infractions: u32, timeouts: u32, kicks: u32) -> UserRecord {
        UserRecord {
            current_infractions: infractions,
            current_timeouts: timeouts,
            current_kicks: kicks,
            ..UserRecord::new(1)
        }
    }

    #[test]
    fn test_below_thresholds() {
        assert_eq!(decide(&record(0, 0, 0)), None);
        assert_eq!(decide(&record(4, 2, 0)), None);
    }

    #[test]
    fn test_each_threshold() {
        assert_eq!(decide(&record(5, 0, 0)), Some(SanctionKind::Timeout));
        assert_eq!(decide(&record(1, 3, 0)), Some(SanctionKind::Kick));
        assert_eq!(decide(&record(1, 0, 1)), Some(SanctionKind::Ban));
    }

    #[test]
    fn test_precedence() {
        assert_eq!(decide(&record(10, 5, 1)), Some(SanctionKind::Ban));
        assert_eq!(decide(&record(10, 3, 0)), Some(SanctionKind::Kick));
    }

    #[test]
    fn test_reason_summary() {
        assert_eq!(
            reason_summary(SanctionKind::Timeout, &record(5, 0, 0)),
            "User has 5 infractions"
        );
        assert_eq!(
            reason_summary(SanctionKind::Kick, &record(0, 3, 0)),
            "User has 3 timeouts"
        );
    }
}
