use chrono::NaiveDateTime;
use serde::{Deserialize, Serialize};
use sqlx::FromRow;
use uuid::Uuid;

/// One winner-selection session for a raffle
#[derive(Debug, Clone, Serialize, Deserialize, FromRow)]
pub struct Draw {
    pub id: Uuid,
    pub raffle_id: Uuid,
    /// Reproducibility seed; absent means non-deterministic selection
    pub seed: Option<i64>,
    pub started_at: NaiveDateTime,
}

/// Winner record, append-only audit trail.
/// Never mutated after insertion.
#[derive(Debug, Clone, Serialize, Deserialize, FromRow)]
pub struct Winner {
    pub id: Uuid,
    pub draw_id: Uuid,
    pub raffle_id: Uuid,
    pub ticket_id: Uuid,
    /// 1-based position within the pick batch
    pub position: i32,
    pub ticket_number: i64,
    pub created_at: NaiveDateTime,
}
