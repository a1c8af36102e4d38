//! Repository for the daily exchange-rate cache.
//!
//! The cache is a single key/value row holding a JSON payload; a payload
//! that fails to parse is treated as absent rather than an error, so a
//! corrupted entry can never block a refresh.

use crate::error::RepositoryError;
use crate::models::RateEntry;
use sqlx::PgPool;

pub struct RateRepository {
    pool: PgPool,
}

impl RateRepository {
    pub fn new(pool: PgPool) -> Self {
        Self { pool }
    }

    /// Read a cached entry; malformed payloads read as None
    pub async fn get(&self, key: &str) -> Result<Option<RateEntry>, RepositoryError> {
        let value = sqlx::query_scalar::<_, serde_json::Value>(
            r#"
            SELECT value FROM rate_settings WHERE key = $1
            "#,
        )
        .bind(key)
        .fetch_optional(&self.pool)
        .await?;

        let entry = value.and_then(|v| serde_json::from_value::<RateEntry>(v).ok());
        Ok(entry.filter(|e| e.rate > rust_decimal::Decimal::ZERO))
    }

    /// Write today's entry, replacing any previous one
    pub async fn upsert(&self, key: &str, entry: &RateEntry) -> Result<(), RepositoryError> {
        let value = serde_json::to_value(entry)
            .map_err(|e| RepositoryError::InvalidInput(format!("Rate payload: {}", e)))?;

        sqlx::query(
            r#"
            INSERT INTO rate_settings (key, value)
            VALUES ($1, $2)
            ON CONFLICT (key) DO UPDATE SET value = EXCLUDED.value, updated_at = NOW()
            "#,
        )
        .bind(key)
        .bind(value)
        .execute(&self.pool)
        .await?;

        Ok(())
    }
}
