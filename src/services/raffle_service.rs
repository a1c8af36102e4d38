//! Raffle lifecycle management

use crate::error::{AppError, AppResult};
use crate::models::Raffle;
use crate::repositories::RaffleRepository;
use std::sync::Arc;
use tracing::info;
use uuid::Uuid;

pub struct RaffleService {
    raffle_repo: Arc<RaffleRepository>,
}

impl RaffleService {
    pub fn new(raffle_repo: Arc<RaffleRepository>) -> Self {
        Self { raffle_repo }
    }

    /// Create a new draft raffle
    pub async fn create_raffle(
        &self,
        name: &str,
        image_url: Option<&str>,
        ticket_price_cents: i64,
        currency: &str,
        capacity: i64,
    ) -> AppResult<Raffle> {
        let raffle = Raffle::new(
            name.to_string(),
            image_url.map(|s| s.to_string()),
            ticket_price_cents,
            currency.to_string(),
            capacity,
        )
        .map_err(AppError::Validation)?;

        let created = self.raffle_repo.create(&raffle).await?;
        info!("Raffle {} created ({} tickets)", created.id, created.capacity);
        Ok(created)
    }

    /// Open ticket sales on a draft raffle
    pub async fn open_sales(&self, raffle_id: Uuid) -> AppResult<Raffle> {
        Ok(self.raffle_repo.open_sales(raffle_id).await?)
    }

    /// Close a raffle; sold numbers stay on record
    pub async fn close(&self, raffle_id: Uuid) -> AppResult<Raffle> {
        Ok(self.raffle_repo.close(raffle_id).await?)
    }

    /// Grow capacity. Shrinking is refused: it would invalidate already
    /// sold numbers.
    pub async fn increase_capacity(&self, raffle_id: Uuid, new_capacity: i64) -> AppResult<Raffle> {
        if new_capacity <= 0 {
            return Err(AppError::Validation("Capacity must be greater than 0".to_string()));
        }
        Ok(self
            .raffle_repo
            .increase_capacity(raffle_id, new_capacity)
            .await?)
    }

    /// Raffles currently open for sales, newest first
    pub async fn list_open(&self) -> AppResult<Vec<Raffle>> {
        Ok(self.raffle_repo.list_open().await?)
    }

    /// Find a raffle by id
    pub async fn find_by_id(&self, raffle_id: Uuid) -> AppResult<Option<Raffle>> {
        Ok(self.raffle_repo.find_by_id(raffle_id).await?)
    }
}
