use sqlx::PgPool;
use uuid::Uuid;

use crate::db::models::{ScheduledReversal, ScheduledReversalRow};

pub async fn create(pool: &PgPool, reversal: &ScheduledReversal) -> Result<(), sqlx::Error> {
    sqlx::query(
        r#"
        INSERT INTO scheduled_reversals (id, guild_id, target_user_id, fire_at, action)
        VALUES ($1, $2, $3, $4, $5)
        "#
    )
    .bind(reversal.id)
    .bind(reversal.guild_id as i64)
    .bind(reversal.target_user_id as i64)
    .bind(reversal.fire_at)
    .bind(reversal.action.as_str())
    .execute(pool)
    .await?;

    Ok(())
}

pub async fn get_all(pool: &PgPool) -> Result<Vec<ScheduledReversalRow>, sqlx::Error> {
    sqlx::query_as::<_, ScheduledReversalRow>(
        r#"
        SELECT id, guild_id, target_user_id, fire_at, action
        FROM scheduled_reversals
        ORDER BY fire_at ASC
        "#
    )
    .fetch_all(pool)
    .await
}

pub async fn delete(pool: &PgPool, id: Uuid) -> Result<(), sqlx::Error> {
    sqlx::query("DELETE FROM scheduled_reversals WHERE id = $1")
        .bind(id)
        .execute(pool)
        .await?;

    Ok(())
}
