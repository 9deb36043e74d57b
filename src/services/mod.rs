pub mod audit;
pub mod moderation;
