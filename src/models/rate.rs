use rust_decimal::Decimal;
use serde::{Deserialize, Serialize};

/// Cached exchange-rate entry, one per day.
///
/// `date` is a UTC `YYYYMMDD` key; an entry whose date differs from
/// today's key is usable but stale.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct RateEntry {
    pub rate: Decimal,
    pub source: String,
    pub date: String,
}

/// Rate metadata for display: whether a rate exists and how fresh it is
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct RateInfo {
    pub available: bool,
    pub date: Option<String>,
    pub source: Option<String>,
    pub stale: Option<bool>,
}

impl RateInfo {
    /// Info for a cold cache with no entry at all
    pub fn unavailable() -> Self {
        Self {
            available: false,
            date: None,
            source: None,
            stale: None,
        }
    }
}
