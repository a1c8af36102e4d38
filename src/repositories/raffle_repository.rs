use crate::error::RepositoryError;
use crate::models::{Raffle, RaffleStatus};
use sqlx::PgPool;
use uuid::Uuid;

/// Repository for raffle data access
pub struct RaffleRepository {
    pool: PgPool,
}

impl RaffleRepository {
    /// Create a new RaffleRepository
    pub fn new(pool: PgPool) -> Self {
        Self { pool }
    }

    /// Insert a new raffle
    pub async fn create(&self, raffle: &Raffle) -> Result<Raffle, RepositoryError> {
        let created = sqlx::query_as::<_, Raffle>(
            r#"
            INSERT INTO raffles (id, name, image_url, ticket_price_cents, currency, capacity, status)
            VALUES ($1, $2, $3, $4, $5, $6, $7)
            RETURNING id, name, image_url, ticket_price_cents, currency, capacity, status, created_at
            "#,
        )
        .bind(raffle.id)
        .bind(&raffle.name)
        .bind(&raffle.image_url)
        .bind(raffle.ticket_price_cents)
        .bind(&raffle.currency)
        .bind(raffle.capacity)
        .bind(&raffle.status)
        .fetch_one(&self.pool)
        .await?;

        Ok(created)
    }

    /// Find a raffle by UUID
    pub async fn find_by_id(&self, id: Uuid) -> Result<Option<Raffle>, RepositoryError> {
        let raffle = sqlx::query_as::<_, Raffle>(
            r#"
            SELECT id, name, image_url, ticket_price_cents, currency, capacity, status, created_at
            FROM raffles
            WHERE id = $1
            "#,
        )
        .bind(id)
        .fetch_optional(&self.pool)
        .await?;

        Ok(raffle)
    }

    /// List raffles currently open for sales, newest first
    pub async fn list_open(&self) -> Result<Vec<Raffle>, RepositoryError> {
        let raffles = sqlx::query_as::<_, Raffle>(
            r#"
            SELECT id, name, image_url, ticket_price_cents, currency, capacity, status, created_at
            FROM raffles
            WHERE status = $1
            ORDER BY created_at DESC
            "#,
        )
        .bind(RaffleStatus::SalesOpen.as_str())
        .fetch_all(&self.pool)
        .await?;

        Ok(raffles)
    }

    /// The most recently opened raffle, if any
    pub async fn find_current_open(&self) -> Result<Option<Raffle>, RepositoryError> {
        let raffle = sqlx::query_as::<_, Raffle>(
            r#"
            SELECT id, name, image_url, ticket_price_cents, currency, capacity, status, created_at
            FROM raffles
            WHERE status = $1
            ORDER BY created_at DESC
            LIMIT 1
            "#,
        )
        .bind(RaffleStatus::SalesOpen.as_str())
        .fetch_optional(&self.pool)
        .await?;

        Ok(raffle)
    }

    /// Transition draft -> sales_open
    pub async fn open_sales(&self, id: Uuid) -> Result<Raffle, RepositoryError> {
        let raffle = sqlx::query_as::<_, Raffle>(
            r#"
            UPDATE raffles
            SET status = $2
            WHERE id = $1 AND status = $3
            RETURNING id, name, image_url, ticket_price_cents, currency, capacity, status, created_at
            "#,
        )
        .bind(id)
        .bind(RaffleStatus::SalesOpen.as_str())
        .bind(RaffleStatus::Draft.as_str())
        .fetch_optional(&self.pool)
        .await?;

        raffle.ok_or_else(|| {
            RepositoryError::BusinessRule("Raffle is not in draft state".to_string())
        })
    }

    /// Transition sales_open -> closed
    pub async fn close(&self, id: Uuid) -> Result<Raffle, RepositoryError> {
        let raffle = sqlx::query_as::<_, Raffle>(
            r#"
            UPDATE raffles
            SET status = $2
            WHERE id = $1 AND status = $3
            RETURNING id, name, image_url, ticket_price_cents, currency, capacity, status, created_at
            "#,
        )
        .bind(id)
        .bind(RaffleStatus::Closed.as_str())
        .bind(RaffleStatus::SalesOpen.as_str())
        .fetch_optional(&self.pool)
        .await?;

        raffle.ok_or_else(|| {
            RepositoryError::BusinessRule("Raffle is not open for sales".to_string())
        })
    }

    /// Grow capacity. Capacity never shrinks once sold numbers may exist,
    /// so the update only lands when the new value is strictly larger.
    pub async fn increase_capacity(
        &self,
        id: Uuid,
        new_capacity: i64,
    ) -> Result<Raffle, RepositoryError> {
        let raffle = sqlx::query_as::<_, Raffle>(
            r#"
            UPDATE raffles
            SET capacity = $2
            WHERE id = $1 AND capacity < $2
            RETURNING id, name, image_url, ticket_price_cents, currency, capacity, status, created_at
            "#,
        )
        .bind(id)
        .bind(new_capacity)
        .fetch_optional(&self.pool)
        .await?;

        raffle.ok_or_else(|| {
            RepositoryError::BusinessRule(
                "Capacity can only increase".to_string(),
            )
        })
    }
}
