pub mod ledger;
pub mod moderation_config;
pub mod open_proposal;
pub mod reversal;
