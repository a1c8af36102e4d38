//! Raffle Backend Library
//!
//! This module exposes the backend components for use by tests and other
//! consumers (a transport layer embeds the services through [`AppState`]).

pub mod auth;
pub mod config;
pub mod database;
pub mod error;
pub mod masking;
pub mod models;
pub mod money;
pub mod repositories;
pub mod retry;
pub mod services;

// Re-export commonly used types
pub use config::AppConfig;
pub use error::{AppError, AppResult};

use database::Database;
use repositories::*;
use services::*;
use std::sync::Arc;

/// Application state containing all repositories and services
pub struct AppState {
    pub database: Database,
    pub raffle_repo: Arc<RaffleRepository>,
    pub ticket_repo: Arc<TicketRepository>,
    pub payment_repo: Arc<PaymentRepository>,
    pub draw_repo: Arc<DrawRepository>,
    pub rate_repo: Arc<RateRepository>,
    pub raffle_service: Arc<RaffleService>,
    pub reservation_service: Arc<ReservationService>,
    pub payment_service: Arc<PaymentService>,
    pub rate_service: Arc<RateService>,
    pub draw_service: Arc<DrawService>,
}

impl AppState {
    /// Create a new AppState with initialized repositories and services
    pub fn new(pool: sqlx::PgPool, config: &AppConfig) -> Self {
        let database = Database::new(pool.clone());

        let raffle_repo = Arc::new(RaffleRepository::new(pool.clone()));
        let ticket_repo = Arc::new(TicketRepository::new(pool.clone()));
        let payment_repo = Arc::new(PaymentRepository::new(pool.clone()));
        let draw_repo = Arc::new(DrawRepository::new(pool.clone()));
        let rate_repo = Arc::new(RateRepository::new(pool));

        let rate_service = Arc::new(RateService::new(rate_repo.clone(), config.rate.clone()));
        let raffle_service = Arc::new(RaffleService::new(raffle_repo.clone()));
        let reservation_service = Arc::new(ReservationService::new(
            raffle_repo.clone(),
            ticket_repo.clone(),
            config.reservation_minutes,
        ));
        let payment_service = Arc::new(PaymentService::new(
            ticket_repo.clone(),
            payment_repo.clone(),
            rate_service.clone(),
            reservation_service.clone(),
            config.reservation_minutes,
        ));
        let draw_service = Arc::new(DrawService::new(
            raffle_repo.clone(),
            ticket_repo.clone(),
            draw_repo.clone(),
        ));

        Self {
            database,
            raffle_repo,
            ticket_repo,
            payment_repo,
            draw_repo,
            rate_repo,
            raffle_service,
            reservation_service,
            payment_service,
            rate_service,
            draw_service,
        }
    }
}
