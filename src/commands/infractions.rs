use poise::serenity_prelude::User;

use crate::bot::data::Context;
use crate::bot::error::Error;
use crate::constants::embeds;
use crate::constants::moderation::format_duration;
use crate::db::models::{HistoryEntry, UserRecord};
use crate::utils::formatting::{chunk_lines, mention_channel, mention_user, truncate};

/// Embed field value limit
const FIELD_LIMIT: usize = 1024;
/// Most history fields shown in one reply
const MAX_HISTORY_FIELDS: usize = 5;
/// Offending message text kept per history line
const MESSAGE_PREVIEW_CHARS: usize = 100;

/// Show a user's infraction counters and history
#[poise::command(
    slash_command,
    required_permissions = "MANAGE_MESSAGES",
    guild_only
)]
pub async fn infractions(
    ctx: Context<'_>,
    #[description = "User to look up"] user: User,
) -> Result<(), Error> {
    let record = ctx.data().moderation.ledger().get_or_create(user.id.get()).await?;

    let mut embed = embeds::standard_embed()
        .title(format!("Infractions for {}", user.name))
        .description(counters(&record));

    if record.history.is_empty() {
        embed = embed.field("History", "No entries", false);
    } else {
        // Most recent first
        let lines: Vec<String> = record.history.iter().rev().map(describe_entry).collect();
        let chunks = chunk_lines(&lines, FIELD_LIMIT);
        let shown = chunks.len().min(MAX_HISTORY_FIELDS);

        for (i, chunk) in chunks.into_iter().take(shown).enumerate() {
            let name = if i == 0 { "History" } else { "History (cont.)" };
            embed = embed.field(name, chunk, false);
        }
    }

    ctx.send(poise::CreateReply::default().embed(embed).ephemeral(true))
        .await?;

    Ok(())
}

/// Reset a user's current counters, keeping totals and history
#[poise::command(
    slash_command,
    rename = "clear-infractions",
    required_permissions = "ADMINISTRATOR",
    guild_only
)]
pub async fn clear_infractions(
    ctx: Context<'_>,
    #[description = "User whose current counters are reset"] user: User,
) -> Result<(), Error> {
    let moderation = &ctx.data().moderation;
    let Some(record) = moderation
        .ledger()
        .clear_existing(user.id.get(), ctx.author().id.get())
        .await?
    else {
        let embed = embeds::info_embed()
            .title("No Infractions")
            .description(format!("No infractions found for {}.", mention_user(user.id)));
        ctx.send(poise::CreateReply::default().embed(embed).ephemeral(true))
            .await?;
        return Ok(());
    };

    moderation
        .audit()
        .log_event(
            "MODERATION",
            &format!(
                "Current infractions of user {} cleared by {}",
                user.id,
                ctx.author().id
            ),
        )
        .await;

    let embed = embeds::success_embed()
        .title("Infractions Cleared")
        .description(format!(
            "Current counters for {} were reset.\n\n{}",
            mention_user(user.id),
            counters(&record)
        ));

    ctx.send(poise::CreateReply::default().embed(embed).ephemeral(true))
        .await?;

    Ok(())
}

fn counters(record: &UserRecord) -> String {
    format!(
        "**Infractions:** {} current / {} total\n\
        **Timeouts:** {} current / {} total\n\
        **Kicks:** {} current / {} total",
        record.current_infractions,
        record.total_infractions,
        record.current_timeouts,
        record.total_timeouts,
        record.current_kicks,
        record.total_kicks
    )
}

/// One history line
fn describe_entry(entry: &HistoryEntry) -> String {
    let when = entry.timestamp().format("%Y-%m-%d %H:%M");

    match entry {
        HistoryEntry::Infraction {
            word,
            message,
            channel_id,
            ..
        } => format!(
            "`{}` ||{}|| in {}: \"{}\"",
            when,
            truncate(word, 64),
            mention_channel(*channel_id),
            truncate(message, MESSAGE_PREVIEW_CHARS)
        ),
        HistoryEntry::SanctionApplied {
            kind,
            duration_secs,
            reason,
            confirmed,
            ..
        } => {
            let duration = duration_secs
                .map(|secs| format!(" ({})", format_duration(std::time::Duration::from_secs(secs))))
                .unwrap_or_default();
            let failed = if *confirmed { "" } else { " [failed]" };
            format!("`{}` **{}**{}: {}{}", when, kind, duration, reason, failed)
        }
        HistoryEntry::Cleared { cleared_by, .. } => {
            format!(
                "`{}` Cleared by {}",
                when,
                mention_user(poise::serenity_prelude::UserId::new(*cleared_by))
            )
        }
    }
}

#[cfg(test)]
mod tests {
    use chrono::{TimeZone, Utc};

    use super::*;
    use crate::db::models::SanctionKind;

    #[test]
    fn test_describe_entries() {
        let timestamp = Utc.with_ymd_and_hms(2024, 3, 1, 12, 30, 0).unwrap();

        let infraction = HistoryEntry::Infraction {
            word: "spam".to_string(),
            message: "spam spam".to_string(),
            timestamp,
            channel_id: 5,
            message_id: 6,
        };
        assert_eq!(
            describe_entry(&infraction),
            "`2024-03-01 12:30` ||spam|| in <#5>: \"spam spam\""
        );

        let failed_timeout = HistoryEntry::SanctionApplied {
            kind: SanctionKind::Timeout,
            duration_secs: Some(1800),
            reason: "Accumulated infractions".to_string(),
            timestamp,
            confirmed: false,
        };
        assert_eq!(
            describe_entry(&failed_timeout),
            "`2024-03-01 12:30` **timeout** (30 minutes): Accumulated infractions [failed]"
        );

        let cleared = HistoryEntry::Cleared {
            timestamp,
            cleared_by: 9,
        };
        assert_eq!(describe_entry(&cleared), "`2024-03-01 12:30` Cleared by <@9>");
    }

    #[test]
    fn test_counters() {
        let mut record = UserRecord::new(1);
        record.current_infractions = 2;
        record.total_infractions = 12;
        assert!(counters(&record).starts_with("**Infractions:** 2 current / 12 total"));
    }
}
