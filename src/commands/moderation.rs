use poise::serenity_prelude::GuildChannel;

use crate::bot::data::Context;
use crate::bot::error::Error;
use crate::constants::embeds;
use crate::constants::moderation::{
    format_duration, MAX_BAN_DAYS, MAX_TIMEOUT_MINUTES, REVIEW_CHANNEL_FALLBACK_NAME,
};
use crate::db::models::ModerationConfig;
use crate::utils::formatting::mention_channel;

/// Configure banned-word moderation
#[poise::command(
    slash_command,
    subcommands("status", "toggle", "timeout_duration", "ban_duration", "review_channel"),
    required_permissions = "ADMINISTRATOR",
    guild_only
)]
pub async fn moderation(ctx: Context<'_>) -> Result<(), Error> {
    ctx.say("Use one of the subcommands: `/moderation status`, `/moderation toggle`, `/moderation timeout-duration`, `/moderation ban-duration`, `/moderation review-channel`").await?;
    Ok(())
}

/// Show the current moderation settings
#[poise::command(slash_command, guild_only)]
pub async fn status(ctx: Context<'_>) -> Result<(), Error> {
    let guild_id = ctx.guild_id().ok_or(Error::custom("Not in a guild"))?.get();
    let config = ctx.data().moderation.config().get(guild_id).await?;

    let embed = embeds::standard_embed()
        .title("Moderation Settings")
        .description(describe(&config, ctx.data().moderation.approval_timeout()));

    ctx.send(poise::CreateReply::default().embed(embed).ephemeral(true))
        .await?;

    Ok(())
}

/// Turn moderation on or off
#[poise::command(slash_command, guild_only)]
pub async fn toggle(ctx: Context<'_>) -> Result<(), Error> {
    let guild_id = ctx.guild_id().ok_or(Error::custom("Not in a guild"))?.get();
    let moderation = &ctx.data().moderation;

    let enabled = !moderation.config().get(guild_id).await?.enabled;
    moderation.config().set_enabled(guild_id, enabled).await?;

    let state = if enabled { "enabled" } else { "disabled" };
    audit_change(ctx, &format!("Moderation {}", state)).await;

    let embed = embeds::success_embed()
        .title("Moderation Updated")
        .description(format!("Moderation is now **{}**.", state));

    ctx.send(poise::CreateReply::default().embed(embed).ephemeral(true))
        .await?;

    Ok(())
}

/// Set how long a timeout lasts
#[poise::command(slash_command, rename = "timeout-duration", guild_only)]
pub async fn timeout_duration(
    ctx: Context<'_>,
    #[description = "Timeout length in minutes"]
    #[min = 1]
    #[max = 40320]
    minutes: u32,
) -> Result<(), Error> {
    let minutes = check_timeout_minutes(minutes)?;
    let guild_id = ctx.guild_id().ok_or(Error::custom("Not in a guild"))?.get();
    ctx.data()
        .moderation
        .config()
        .set_timeout_duration(guild_id, minutes)
        .await?;

    audit_change(ctx, &format!("Timeout duration set to {} minutes", minutes)).await;

    let embed = embeds::success_embed()
        .title("Timeout Duration Set")
        .description(format!(
            "Timeouts now last **{}**.",
            format_duration(std::time::Duration::from_secs(u64::from(minutes) * 60))
        ));

    ctx.send(poise::CreateReply::default().embed(embed).ephemeral(true))
        .await?;

    Ok(())
}

/// Set how long a ban lasts (0 = permanent)
#[poise::command(slash_command, rename = "ban-duration", guild_only)]
pub async fn ban_duration(
    ctx: Context<'_>,
    #[description = "Ban length in days, 0 for permanent"]
    #[max = 3650]
    days: u32,
) -> Result<(), Error> {
    let days = check_ban_days(days)?;
    let guild_id = ctx.guild_id().ok_or(Error::custom("Not in a guild"))?.get();
    ctx.data()
        .moderation
        .config()
        .set_ban_duration(guild_id, days)
        .await?;

    audit_change(ctx, &format!("Ban duration set to {} days", days)).await;

    let embed = embeds::success_embed()
        .title("Ban Duration Set")
        .description(format!("Bans are now **{}**.", ban_label(days)));

    ctx.send(poise::CreateReply::default().embed(embed).ephemeral(true))
        .await?;

    Ok(())
}

/// Set the channel where sanction proposals are posted
#[poise::command(slash_command, rename = "review-channel", guild_only)]
pub async fn review_channel(
    ctx: Context<'_>,
    #[description = "Text channel for sanction reviews"]
    #[channel_types("Text")]
    channel: GuildChannel,
) -> Result<(), Error> {
    let guild_id = ctx.guild_id().ok_or(Error::custom("Not in a guild"))?.get();
    ctx.data()
        .moderation
        .config()
        .set_review_channel(guild_id, Some(channel.id.get()))
        .await?;

    audit_change(ctx, &format!("Review channel set to {}", channel.id)).await;

    let embed = embeds::success_embed()
        .title("Review Channel Set")
        .description(format!(
            "Sanction proposals will be posted in {}.",
            mention_channel(channel.id.get())
        ));

    ctx.send(poise::CreateReply::default().embed(embed).ephemeral(true))
        .await?;

    Ok(())
}

async fn audit_change(ctx: Context<'_>, change: &str) {
    ctx.data()
        .moderation
        .audit()
        .log_event(
            "MODERATION_CONFIG",
            &format!("{} (by {})", change, ctx.author().id),
        )
        .await;
}

fn check_timeout_minutes(minutes: u32) -> Result<u32, Error> {
    if (1..=MAX_TIMEOUT_MINUTES).contains(&minutes) {
        Ok(minutes)
    } else {
        Err(Error::InvalidOperation(format!(
            "Timeout duration must be between 1 and {} minutes",
            MAX_TIMEOUT_MINUTES
        )))
    }
}

fn check_ban_days(days: u32) -> Result<u32, Error> {
    if days <= MAX_BAN_DAYS {
        Ok(days)
    } else {
        Err(Error::InvalidOperation(format!(
            "Ban duration must be at most {} days (0 for permanent)",
            MAX_BAN_DAYS
        )))
    }
}

fn ban_label(days: u32) -> String {
    if days == 0 {
        "permanent".to_string()
    } else {
        format_duration(std::time::Duration::from_secs(u64::from(days) * 86_400))
    }
}

fn describe(config: &ModerationConfig, approval_timeout: std::time::Duration) -> String {
    let review = config
        .review_channel_id
        .map(mention_channel)
        .unwrap_or_else(|| format!("`#{}` (fallback)", REVIEW_CHANNEL_FALLBACK_NAME));

    format!(
        "**Status:** {}\n\
        **Timeout duration:** {}\n\
        **Ban duration:** {}\n\
        **Review channel:** {}\n\
        **Approval window:** {}\n\
        **Banned words:** {}",
        if config.enabled { "enabled" } else { "disabled" },
        format_duration(config.timeout_duration()),
        ban_label(config.ban_duration_days),
        review,
        format_duration(approval_timeout),
        config.banned_terms.len()
    )
}
