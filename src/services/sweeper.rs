//! Background sweeper that returns expired reservations to the free pool.
//!
//! Runs on an independent timer, overlapping freely with live traffic:
//! its writes are idempotent and convergent, so racing a reservation or
//! a lazy-expiry path is harmless. Tick failures are logged and the loop
//! continues.

use crate::error::AppResult;
use crate::repositories::{RaffleRepository, TicketRepository};
use std::sync::Arc;
use std::time::Duration;
use tokio::time;
use tracing::{debug, error, info};

pub struct ExpirySweeper {
    raffle_repo: Arc<RaffleRepository>,
    ticket_repo: Arc<TicketRepository>,
    interval: Duration,
}

impl ExpirySweeper {
    /// Create a new sweeper with the default 60s interval
    pub fn new(raffle_repo: Arc<RaffleRepository>, ticket_repo: Arc<TicketRepository>) -> Self {
        Self {
            raffle_repo,
            ticket_repo,
            interval: Duration::from_secs(60),
        }
    }

    /// Set the tick interval
    pub fn with_interval(mut self, interval: Duration) -> Self {
        self.interval = interval;
        self
    }

    /// Run the sweep loop forever
    pub async fn start(self) {
        let mut interval = time::interval(self.interval);
        info!("Expiry sweeper started, sweeping every {:?}", self.interval);

        loop {
            interval.tick().await;

            match self.sweep_once().await {
                Ok(released) if released > 0 => {
                    info!("Sweeper released {} expired reservation(s)", released);
                }
                Ok(_) => debug!("Sweeper tick: nothing expired"),
                Err(e) => error!("Sweeper tick failed: {}", e),
            }
        }
    }

    /// Release expired reservations across all open raffles.
    /// Idempotent; returns the number of tickets released.
    pub async fn sweep_once(&self) -> AppResult<u64> {
        let now = chrono::Utc::now().naive_utc();
        let mut released = 0u64;

        for raffle in self.raffle_repo.list_open().await? {
            released += self.ticket_repo.release_expired(raffle.id, now).await?;
        }

        Ok(released)
    }
}
