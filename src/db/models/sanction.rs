use std::fmt;

use serde::{Deserialize, Serialize};

/// A punitive action that can be proposed and applied
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum SanctionKind {
    Timeout,
    Kick,
    Ban,
}

impl SanctionKind {
    pub fn as_str(&self) -> &'static str {
        match self {
            SanctionKind::Timeout => "timeout",
            SanctionKind::Kick => "kick",
            SanctionKind::Ban => "ban",
        }
    }

    pub fn parse(s: &str) -> Option<Self> {
        match s {
            "timeout" => Some(SanctionKind::Timeout),
            "kick" => Some(SanctionKind::Kick),
            "ban" => Some(SanctionKind::Ban),
            _ => None,
        }
    }
}

impl fmt::Display for SanctionKind {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.as_str())
    }
}
