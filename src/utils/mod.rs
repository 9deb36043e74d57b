pub mod formatting;
pub mod permissions;
