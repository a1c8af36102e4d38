use chrono::NaiveDateTime;
use serde::{Deserialize, Serialize};
use sqlx::FromRow;
use uuid::Uuid;

/// Raffle lifecycle status
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum RaffleStatus {
    Draft,
    SalesOpen,
    Closed,
}

impl RaffleStatus {
    /// Convert from database string
    pub fn from_str(s: &str) -> Result<Self, String> {
        match s.to_lowercase().as_str() {
            "draft" => Ok(RaffleStatus::Draft),
            "sales_open" => Ok(RaffleStatus::SalesOpen),
            "closed" => Ok(RaffleStatus::Closed),
            _ => Err(format!("Invalid status: {}", s)),
        }
    }

    /// Convert to database string
    pub fn as_str(&self) -> &'static str {
        match self {
            RaffleStatus::Draft => "draft",
            RaffleStatus::SalesOpen => "sales_open",
            RaffleStatus::Closed => "closed",
        }
    }
}

impl From<String> for RaffleStatus {
    fn from(s: String) -> Self {
        Self::from_str(&s).unwrap_or(RaffleStatus::Draft)
    }
}

impl From<RaffleStatus> for String {
    fn from(status: RaffleStatus) -> Self {
        status.as_str().to_string()
    }
}

/// Raffle model representing one sellable ticket inventory
#[derive(Debug, Clone, Serialize, Deserialize, FromRow)]
pub struct Raffle {
    pub id: Uuid,
    pub name: String,
    pub image_url: Option<String>,
    /// Unit ticket price in minor currency units (cents)
    pub ticket_price_cents: i64,
    pub currency: String,
    /// Total sellable ticket numbers, 1..=capacity
    pub capacity: i64,
    pub status: String, // Stored as TEXT, use RaffleStatus enum for type safety
    pub created_at: NaiveDateTime,
}

impl Raffle {
    /// Create a new draft Raffle, validating invariants up front
    pub fn new(
        name: String,
        image_url: Option<String>,
        ticket_price_cents: i64,
        currency: String,
        capacity: i64,
    ) -> Result<Self, String> {
        if name.trim().is_empty() {
            return Err("Raffle name must not be empty".to_string());
        }
        if ticket_price_cents <= 0 {
            return Err("Ticket price must be greater than 0".to_string());
        }
        if capacity <= 0 {
            return Err("Capacity must be greater than 0".to_string());
        }

        Ok(Self {
            id: Uuid::new_v4(),
            name,
            image_url,
            ticket_price_cents,
            currency,
            capacity,
            status: RaffleStatus::Draft.as_str().to_string(),
            created_at: chrono::Utc::now().naive_utc(),
        })
    }

    /// Get status as an enum
    pub fn status_enum(&self) -> RaffleStatus {
        RaffleStatus::from_str(&self.status).unwrap_or(RaffleStatus::Draft)
    }

    /// Check if tickets can currently be sold
    pub fn is_sales_open(&self) -> bool {
        self.status_enum() == RaffleStatus::SalesOpen
    }

    /// Capacity, or None when the row carries a non-positive value.
    /// A missing capacity must block all reservation attempts.
    pub fn checked_capacity(&self) -> Option<i64> {
        (self.capacity > 0).then_some(self.capacity)
    }
}
