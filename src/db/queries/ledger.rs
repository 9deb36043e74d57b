use sqlx::PgPool;

use crate::db::models::{UserRecord, UserRecordRow};

pub async fn get(pool: &PgPool, user_id: i64) -> Result<Option<UserRecordRow>, sqlx::Error> {
    sqlx::query_as::<_, UserRecordRow>(
        r#"
        SELECT user_id, current_infractions, total_infractions, current_timeouts,
               total_timeouts, current_kicks, total_kicks, history
        FROM infraction_ledger
        WHERE user_id = $1
        "#
    )
    .bind(user_id)
    .fetch_optional(pool)
    .await
}

/// Overwrite the whole record for a user
pub async fn upsert(
    pool: &PgPool,
    record: &UserRecord,
    history: serde_json::Value,
) -> Result<(), sqlx::Error> {
    sqlx::query(
        r#"
        INSERT INTO infraction_ledger (
            user_id, current_infractions, total_infractions, current_timeouts,
            total_timeouts, current_kicks, total_kicks, history
        )
        VALUES ($1, $2, $3, $4, $5, $6, $7, $8)
        ON CONFLICT (user_id) DO UPDATE SET
            current_infractions = EXCLUDED.current_infractions,
            total_infractions = EXCLUDED.total_infractions,
            current_timeouts = EXCLUDED.current_timeouts,
            total_timeouts = EXCLUDED.total_timeouts,
            current_kicks = EXCLUDED.current_kicks,
            total_kicks = EXCLUDED.total_kicks,
            history = EXCLUDED.history,
            updated_at = NOW()
        "#
    )
    .bind(record.user_id as i64)
    .bind(record.current_infractions as i32)
    .bind(record.total_infractions as i32)
    .bind(record.current_timeouts as i32)
    .bind(record.total_timeouts as i32)
    .bind(record.current_kicks as i32)
    .bind(record.total_kicks as i32)
    .bind(history)
    .execute(pool)
    .await?;

    Ok(())
}
