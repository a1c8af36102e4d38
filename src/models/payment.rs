use chrono::NaiveDateTime;
use rust_decimal::Decimal;
use serde::{Deserialize, Serialize};
use sqlx::FromRow;
use uuid::Uuid;

/// Payment status
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum PaymentStatus {
    Pending,
    Approved,
    Rejected,
}

impl PaymentStatus {
    /// Convert from database string
    pub fn from_str(s: &str) -> Result<Self, String> {
        match s.to_lowercase().as_str() {
            "pending" => Ok(PaymentStatus::Pending),
            "approved" => Ok(PaymentStatus::Approved),
            "rejected" => Ok(PaymentStatus::Rejected),
            _ => Err(format!("Invalid status: {}", s)),
        }
    }

    /// Convert to database string
    pub fn as_str(&self) -> &'static str {
        match self {
            PaymentStatus::Pending => "pending",
            PaymentStatus::Approved => "approved",
            PaymentStatus::Rejected => "rejected",
        }
    }
}

impl From<String> for PaymentStatus {
    fn from(s: String) -> Self {
        Self::from_str(&s).unwrap_or(PaymentStatus::Pending)
    }
}

impl From<PaymentStatus> for String {
    fn from(status: PaymentStatus) -> Self {
        status.as_str().to_string()
    }
}

/// Buyer contact and identity fields captured at payment submission
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct BuyerInfo {
    pub email: String,
    pub document_id: Option<String>,
    pub state: Option<String>,
    pub phone: Option<String>,
}

impl BuyerInfo {
    /// Normalized email (trimmed, lowercased) used everywhere it is stored or compared
    pub fn email_normalized(&self) -> String {
        self.email.trim().to_lowercase()
    }
}

/// Payment model: a pending-then-resolved manual payment claim.
///
/// `amount_local` and `rate_used` are frozen at submission time and
/// never recomputed, so later rate changes cannot retroactively alter
/// an already-pending payment.
#[derive(Debug, Clone, Serialize, Deserialize, FromRow)]
pub struct Payment {
    pub id: Uuid,
    pub raffle_id: Uuid,
    pub email: String,
    pub quantity: i64,
    /// Payment reference supplied by the buyer (transfer number)
    pub reference: String,
    pub evidence_url: Option<String>,
    pub status: String, // Stored as TEXT, use PaymentStatus enum for type safety
    pub method: String,
    pub document_id: Option<String>,
    pub state: Option<String>,
    pub phone: Option<String>,
    /// Total in local currency, frozen at submission
    pub amount_local: Decimal,
    /// Exchange rate applied, frozen at submission
    pub rate_used: Decimal,
    pub created_at: NaiveDateTime,
}

impl Payment {
    /// Get status as an enum
    pub fn status_enum(&self) -> PaymentStatus {
        PaymentStatus::from_str(&self.status).unwrap_or(PaymentStatus::Pending)
    }

    /// Approved and rejected are terminal; transitions out of them are refused
    pub fn is_terminal(&self) -> bool {
        self.status_enum() != PaymentStatus::Pending
    }
}
