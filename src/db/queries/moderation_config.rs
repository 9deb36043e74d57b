use sqlx::PgPool;

use crate::constants::moderation::DEFAULT_BANNED_TERMS;
use crate::db::models::ModerationConfigRow;

pub async fn get_or_create(
    pool: &PgPool,
    guild_id: i64,
    default_timeout_minutes: i32,
    default_ban_days: i32,
) -> Result<ModerationConfigRow, sqlx::Error> {
    // Try to get existing config
    let existing = sqlx::query_as::<_, ModerationConfigRow>(
        r#"
        SELECT guild_id, enabled, timeout_duration_minutes, ban_duration_days, review_channel_id
        FROM moderation_configs
        WHERE guild_id = $1
        "#
    )
    .bind(guild_id)
    .fetch_optional(pool)
    .await?;

    if let Some(config) = existing {
        return Ok(config);
    }

    // Create new config and seed the default banned terms
    let created = sqlx::query_as::<_, ModerationConfigRow>(
        r#"
        INSERT INTO moderation_configs (guild_id, timeout_duration_minutes, ban_duration_days)
        VALUES ($1, $2, $3)
        ON CONFLICT (guild_id) DO UPDATE SET guild_id = EXCLUDED.guild_id
        RETURNING guild_id, enabled, timeout_duration_minutes, ban_duration_days, review_channel_id
        "#
    )
    .bind(guild_id)
    .bind(default_timeout_minutes)
    .bind(default_ban_days)
    .fetch_one(pool)
    .await?;

    for term in DEFAULT_BANNED_TERMS {
        add_term(pool, guild_id, term).await?;
    }

    Ok(created)
}

pub async fn set_enabled(pool: &PgPool, guild_id: i64, enabled: bool) -> Result<(), sqlx::Error> {
    sqlx::query(
        "UPDATE moderation_configs SET enabled = $2, updated_at = NOW() WHERE guild_id = $1",
    )
    .bind(guild_id)
    .bind(enabled)
    .execute(pool)
    .await?;

    Ok(())
}

pub async fn set_timeout_duration(
    pool: &PgPool,
    guild_id: i64,
    minutes: i32,
) -> Result<(), sqlx::Error> {
    sqlx::query(
        "UPDATE moderation_configs SET timeout_duration_minutes = $2, updated_at = NOW() WHERE guild_id = $1",
    )
    .bind(guild_id)
    .bind(minutes)
    .execute(pool)
    .await?;

    Ok(())
}

pub async fn set_ban_duration(pool: &PgPool, guild_id: i64, days: i32) -> Result<(), sqlx::Error> {
    sqlx::query(
        "UPDATE moderation_configs SET ban_duration_days = $2, updated_at = NOW() WHERE guild_id = $1",
    )
    .bind(guild_id)
    .bind(days)
    .execute(pool)
    .await?;

    Ok(())
}

pub async fn set_review_channel(
    pool: &PgPool,
    guild_id: i64,
    channel_id: Option<i64>,
) -> Result<(), sqlx::Error> {
    sqlx::query(
        "UPDATE moderation_configs SET review_channel_id = $2, updated_at = NOW() WHERE guild_id = $1",
    )
    .bind(guild_id)
    .bind(channel_id)
    .execute(pool)
    .await?;

    Ok(())
}

/// Banned terms in the order they were added
pub async fn get_terms(pool: &PgPool, guild_id: i64) -> Result<Vec<String>, sqlx::Error> {
    let rows: Vec<(String,)> = sqlx::query_as(
        "SELECT term FROM banned_terms WHERE guild_id = $1 ORDER BY position ASC",
    )
    .bind(guild_id)
    .fetch_all(pool)
    .await?;

    Ok(rows.into_iter().map(|(term,)| term).collect())
}

/// Returns false if the term was already banned
pub async fn add_term(pool: &PgPool, guild_id: i64, term: &str) -> Result<bool, sqlx::Error> {
    let result = sqlx::query(
        r#"
        INSERT INTO banned_terms (guild_id, term)
        VALUES ($1, $2)
        ON CONFLICT (guild_id, term) DO NOTHING
        "#
    )
    .bind(guild_id)
    .bind(term)
    .execute(pool)
    .await?;

    Ok(result.rows_affected() > 0)
}

/// Returns false if the term was not banned
pub async fn remove_term(pool: &PgPool, guild_id: i64, term: &str) -> Result<bool, sqlx::Error> {
    let result = sqlx::query("DELETE FROM banned_terms WHERE guild_id = $1 AND term = $2")
        .bind(guild_id)
        .bind(term)
        .execute(pool)
        .await?;

    Ok(result.rows_affected() > 0)
}
