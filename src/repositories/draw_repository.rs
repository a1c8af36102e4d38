//! Repository for draws and their append-only winner records

use crate::error::RepositoryError;
use crate::models::{Draw, Winner};
use sqlx::PgPool;
use uuid::Uuid;

pub struct DrawRepository {
    pool: PgPool,
}

impl DrawRepository {
    pub fn new(pool: PgPool) -> Self {
        Self { pool }
    }

    /// Start a new drawing session
    pub async fn create(&self, raffle_id: Uuid, seed: Option<i64>) -> Result<Draw, RepositoryError> {
        let draw = sqlx::query_as::<_, Draw>(
            r#"
            INSERT INTO draws (raffle_id, seed)
            VALUES ($1, $2)
            RETURNING id, raffle_id, seed, started_at
            "#,
        )
        .bind(raffle_id)
        .bind(seed)
        .fetch_one(&self.pool)
        .await?;

        Ok(draw)
    }

    /// Find a draw by UUID
    pub async fn find_by_id(&self, id: Uuid) -> Result<Option<Draw>, RepositoryError> {
        let draw = sqlx::query_as::<_, Draw>(
            r#"
            SELECT id, raffle_id, seed, started_at
            FROM draws
            WHERE id = $1
            "#,
        )
        .bind(id)
        .fetch_optional(&self.pool)
        .await?;

        Ok(draw)
    }

    /// Most recent draw for a raffle
    pub async fn latest_for_raffle(&self, raffle_id: Uuid) -> Result<Option<Draw>, RepositoryError> {
        let draw = sqlx::query_as::<_, Draw>(
            r#"
            SELECT id, raffle_id, seed, started_at
            FROM draws
            WHERE raffle_id = $1
            ORDER BY started_at DESC
            LIMIT 1
            "#,
        )
        .bind(raffle_id)
        .fetch_optional(&self.pool)
        .await?;

        Ok(draw)
    }

    /// Winners already recorded for a draw (across all pick rounds)
    pub async fn winner_count(&self, draw_id: Uuid) -> Result<i64, RepositoryError> {
        let count = sqlx::query_scalar::<_, i64>(
            r#"
            SELECT COUNT(*) FROM winners WHERE draw_id = $1
            "#,
        )
        .bind(draw_id)
        .fetch_one(&self.pool)
        .await?;

        Ok(count)
    }

    /// Insert one batch of winners. Winner rows are never updated or
    /// deleted afterwards; the batch is the audit record of one round.
    pub async fn insert_winners(
        &self,
        draw_id: Uuid,
        raffle_id: Uuid,
        picks: &[(Uuid, i32, i64)], // (ticket_id, position, ticket_number)
    ) -> Result<Vec<Winner>, RepositoryError> {
        let ticket_ids: Vec<Uuid> = picks.iter().map(|p| p.0).collect();
        let positions: Vec<i32> = picks.iter().map(|p| p.1).collect();
        let numbers: Vec<i64> = picks.iter().map(|p| p.2).collect();

        let mut winners = sqlx::query_as::<_, Winner>(
            r#"
            INSERT INTO winners (draw_id, raffle_id, ticket_id, position, ticket_number)
            SELECT $1::uuid, $2::uuid, t, p, n
            FROM UNNEST($3::uuid[], $4::int4[], $5::int8[]) AS u(t, p, n)
            RETURNING id, draw_id, raffle_id, ticket_id, position, ticket_number, created_at
            "#,
        )
        .bind(draw_id)
        .bind(raffle_id)
        .bind(&ticket_ids)
        .bind(&positions)
        .bind(&numbers)
        .fetch_all(&self.pool)
        .await?;

        winners.sort_by_key(|w| w.position);
        Ok(winners)
    }
}
