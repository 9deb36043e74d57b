pub mod banned_words;
pub mod infractions;
pub mod moderation;
