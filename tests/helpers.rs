use raffle_backend::config::AppConfig;
use raffle_backend::models::{BuyerInfo, Raffle};
use raffle_backend::AppState;
use rust_decimal::Decimal;
use sqlx::PgPool;

/// Test application state wired over the per-test pool provided by
/// `#[sqlx::test]` (migrations are applied automatically).
pub struct TestApp {
    pub pool: PgPool,
    pub state: AppState,
}

impl TestApp {
    pub fn from_pool(pool: PgPool) -> Self {
        let config = AppConfig::default();
        let state = AppState::new(pool.clone(), &config);
        Self { pool, state }
    }
}

/// Create a raffle and open it for sales
pub async fn create_open_raffle(app: &TestApp, price_cents: i64, capacity: i64) -> Raffle {
    let raffle = app
        .state
        .raffle_service
        .create_raffle("Test Raffle", None, price_cents, "VES", capacity)
        .await
        .expect("Failed to create raffle");

    app.state
        .raffle_service
        .open_sales(raffle.id)
        .await
        .expect("Failed to open sales")
}

/// Pin today's exchange rate so no test touches a live provider
pub async fn pin_rate(app: &TestApp, rate: i64) {
    app.state
        .rate_service
        .set_rate(Decimal::from(rate), "manual")
        .await
        .expect("Failed to pin rate");
}

/// A buyer with full contact fields
pub fn test_buyer(email: &str) -> BuyerInfo {
    BuyerInfo {
        email: email.to_string(),
        document_id: Some("V-12345678".to_string()),
        state: Some("Miranda".to_string()),
        phone: Some("0414-1234567".to_string()),
    }
}

/// Force a ticket's lease into the past, simulating an abandoned hold
pub async fn expire_ticket_lease(app: &TestApp, ticket_id: uuid::Uuid) {
    let past = chrono::Utc::now().naive_utc() - chrono::Duration::hours(1);
    sqlx::query("UPDATE tickets SET reserved_until = $2 WHERE id = $1")
        .bind(ticket_id)
        .bind(past)
        .execute(&app.pool)
        .await
        .expect("Failed to expire ticket lease");
}
