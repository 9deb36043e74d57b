mod moderation_config;
mod open_proposal;
mod sanction;
mod scheduled_reversal;
mod user_record;

pub use moderation_config::{ModerationConfig, ModerationConfigRow};
pub use open_proposal::{OpenProposal, OpenProposalRow};
pub use sanction::SanctionKind;
pub use scheduled_reversal::{ReversalAction, ScheduledReversal, ScheduledReversalRow};
pub use user_record::{AppliedSanction, HistoryEntry, Infraction, UserRecord, UserRecordRow};
