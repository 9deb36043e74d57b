use serenity::all::{Colour, CreateEmbed};

use crate::db::models::SanctionKind;

pub const PRIMARY_COLOR: Colour = Colour::from_rgb(59, 130, 246);
pub const SUCCESS_COLOR: Colour = Colour::from_rgb(16, 185, 129);
pub const ERROR_COLOR: Colour = Colour::from_rgb(244, 63, 94);
pub const WARNING_COLOR: Colour = Colour::from_rgb(245, 158, 11);
pub const INFO_COLOR: Colour = Colour::from_rgb(100, 116, 139);

/// Bullet point character
pub const BULLET: &str = "•";

pub fn standard_embed() -> CreateEmbed {
    CreateEmbed::new().color(PRIMARY_COLOR)
}

pub fn success_embed() -> CreateEmbed {
    CreateEmbed::new().color(SUCCESS_COLOR)
}

pub fn error_embed() -> CreateEmbed {
    CreateEmbed::new().color(ERROR_COLOR)
}

pub fn warning_embed() -> CreateEmbed {
    CreateEmbed::new().color(WARNING_COLOR)
}

/// Resolved or neutral notices
pub fn info_embed() -> CreateEmbed {
    CreateEmbed::new().color(INFO_COLOR)
}

/// Pending proposal, coloured by how severe the sanction is
pub fn severity_embed(kind: SanctionKind) -> CreateEmbed {
    match kind {
        SanctionKind::Timeout => warning_embed(),
        SanctionKind::Kick | SanctionKind::Ban => error_embed(),
    }
}
