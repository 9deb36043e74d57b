use sqlx::PgPool;
use uuid::Uuid;

use crate::db::models::{OpenProposal, OpenProposalRow};

pub async fn create(pool: &PgPool, proposal: &OpenProposal) -> Result<(), sqlx::Error> {
    sqlx::query(
        r#"
        INSERT INTO open_proposals
            (id, guild_id, target_user_id, kind, reason_summary, created_at, expires_at,
             review_channel_id, review_message_id)
        VALUES ($1, $2, $3, $4, $5, $6, $7, $8, $9)
        "#
    )
    .bind(proposal.id)
    .bind(proposal.guild_id as i64)
    .bind(proposal.target_user_id as i64)
    .bind(proposal.kind.as_str())
    .bind(&proposal.reason_summary)
    .bind(proposal.created_at)
    .bind(proposal.expires_at)
    .bind(proposal.review_channel_id as i64)
    .bind(proposal.review_message_id as i64)
    .execute(pool)
    .await?;

    Ok(())
}

pub async fn get_all(pool: &PgPool) -> Result<Vec<OpenProposalRow>, sqlx::Error> {
    sqlx::query_as::<_, OpenProposalRow>(
        r#"
        SELECT id, guild_id, target_user_id, kind, reason_summary, created_at, expires_at,
               review_channel_id, review_message_id
        FROM open_proposals
        ORDER BY expires_at ASC
        "#
    )
    .fetch_all(pool)
    .await
}

pub async fn delete(pool: &PgPool, id: Uuid) -> Result<(), sqlx::Error> {
    sqlx::query("DELETE FROM open_proposals WHERE id = $1")
        .bind(id)
        .execute(pool)
        .await?;

    Ok(())
}
