use chrono::NaiveDateTime;
use serde::{Deserialize, Serialize};
use sqlx::FromRow;
use uuid::Uuid;

/// Ticket model: one numbered slot of a raffle.
///
/// A ticket is in exactly one of three states at any instant:
/// - free: `reserved_until` null or past, not verified
/// - held: `reserved_until` in the future, not verified
/// - sold: `verified = true`, reservation fields cleared
///
/// Rows are created lazily on first reservation and never deleted.
#[derive(Debug, Clone, Serialize, Deserialize, FromRow)]
pub struct Ticket {
    pub id: Uuid,
    pub raffle_id: Uuid,
    /// Unique within the raffle, 1..=capacity
    pub ticket_number: i64,
    /// Paid and confirmed by an admin; terminal
    pub verified: bool,
    /// Lease expiry while held
    pub reserved_until: Option<NaiveDateTime>,
    /// Opaque hold token stamped at reservation time
    pub reserved_by: Option<String>,
    /// Buyer email claimed at payment submission
    pub email: Option<String>,
    /// Payment proof stamped on approval
    pub reference: Option<String>,
    pub created_at: NaiveDateTime,
}

impl Ticket {
    /// Sold: payment approved, terminal state
    pub fn is_sold(&self) -> bool {
        self.verified
    }

    /// Held: unexpired lease and not yet verified
    pub fn is_held(&self, now: NaiveDateTime) -> bool {
        !self.verified && matches!(self.reserved_until, Some(until) if until > now)
    }

    /// Free: not verified and no live lease
    pub fn is_free(&self, now: NaiveDateTime) -> bool {
        !self.is_sold() && !self.is_held(now)
    }
}
