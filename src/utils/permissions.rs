use serenity::all::{Context, GuildId, Permissions, UserId};

/// Kick, ban or administrator
pub fn is_moderator(permissions: Permissions) -> bool {
    permissions.administrator() || permissions.kick_members() || permissions.ban_members()
}

/// Check if a member can moderate (has kick/ban permissions)
pub async fn can_moderate(ctx: &Context, guild_id: GuildId, user_id: UserId) -> bool {
    if let Ok(member) = guild_id.member(ctx, user_id).await {
        return member.permissions(ctx).map(is_moderator).unwrap_or(false);
    }
    false
}
