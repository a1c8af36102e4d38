//! Daily USD -> local currency rate cache with multi-provider fallback.
//!
//! This service embodies "never fail the sale": [`RateService::refresh`]
//! always produces a usable rate, degrading through the provider chain
//! down to the configured static default, and [`RateService::get_rate`]
//! prefers a stale cached value over blocking on a provider call.

use crate::config::RateConfig;
use crate::error::{AppError, AppResult};
use crate::models::{RateEntry, RateInfo};
use crate::repositories::RateRepository;
use rust_decimal::prelude::FromPrimitive;
use rust_decimal::Decimal;
use serde_json::Value;
use std::sync::Arc;
use tracing::{info, warn};

/// Cache key in `rate_settings`
const RATE_CACHE_KEY: &str = "usd_rate";

/// Known key paths into provider payloads, probed in priority order.
/// Provider response shapes differ; the first path yielding a positive
/// number wins.
const RATE_KEY_PATHS: &[&[&str]] = &[
    &["monitors", "bcv", "price"],
    &["monitors", "bcv", "value"],
    &["bcv", "price"],
    &["bcv", "valor"],
    &["bcv"],
    &["oficial", "price"],
    &["oficial", "valor"],
    &["usd", "bcv"],
    &["data", "usd", "bcv"],
    &["rates", "VES"],
    &["rates", "VEF"],
    &["VES"],
    &["VEF"],
    &["USD", "promedio"],
    &["promedio"],
    &["price"],
    &["valor"],
];

/// Community rate mirrors, tried after the configured custom endpoint
const COMMUNITY_SOURCES: &[(&str, &str)] = &[
    (
        "https://pydolarvenezuela.github.io/api/v1/dollar",
        "PyDolarVenezuela (GH Pages)",
    ),
    (
        "https://pydolarvenezuela-api.vercel.app/api/v1/dollar",
        "PyDolarVenezuela (Vercel 1)",
    ),
    (
        "https://pydolarvenezuela.vercel.app/api/v1/dollar",
        "PyDolarVenezuela (Vercel 2)",
    ),
    (
        "https://venezuela-exchange.vercel.app/api",
        "venezuela-exchange",
    ),
];

/// Generic FX API fallback (mid-market, not the official rate)
const FX_FALLBACK_URL: &str = "https://open.er-api.com/v6/latest/USD";

#[derive(Clone)]
pub struct RateService {
    rate_repo: Arc<RateRepository>,
    config: RateConfig,
    http: reqwest::Client,
}

impl RateService {
    pub fn new(rate_repo: Arc<RateRepository>, config: RateConfig) -> Self {
        Self {
            rate_repo,
            config,
            http: reqwest::Client::new(),
        }
    }

    /// UTC day key used for staleness detection
    fn today_key() -> String {
        chrono::Utc::now().format("%Y%m%d").to_string()
    }

    /// Extract a positive rate from an arbitrary provider payload by
    /// probing the known key paths in priority order.
    pub fn extract_rate(payload: &Value) -> Option<Decimal> {
        if !payload.is_object() {
            return None;
        }
        for path in RATE_KEY_PATHS {
            let mut node = payload;
            let mut ok = true;
            for key in *path {
                match node.get(key) {
                    Some(next) => node = next,
                    None => {
                        ok = false;
                        break;
                    }
                }
            }
            if ok {
                if let Some(rate) = Self::num_or_none(node) {
                    return Some(rate);
                }
            }
        }
        None
    }

    /// Coerce a JSON node into a positive decimal; tolerates string
    /// numbers with a comma decimal separator
    fn num_or_none(node: &Value) -> Option<Decimal> {
        let parsed = match node {
            Value::Number(n) => n.as_f64().and_then(Decimal::from_f64),
            Value::String(s) => s.replace(',', ".").trim().parse::<Decimal>().ok(),
            _ => None,
        };
        parsed.filter(|r| *r > Decimal::ZERO)
    }

    /// Read the cached entry, optionally requiring today's date
    async fn read_cached(&self, require_today: bool) -> Option<RateEntry> {
        let entry = match self.rate_repo.get(RATE_CACHE_KEY).await {
            Ok(entry) => entry,
            Err(e) => {
                warn!("Rate cache read failed: {}", e);
                None
            }
        };
        entry.filter(|e| !require_today || e.date == Self::today_key())
    }

    /// Persist a freshly chosen rate as today's entry; best effort
    async fn store(&self, rate: Decimal, source: &str) {
        let entry = RateEntry {
            rate,
            source: source.to_string(),
            date: Self::today_key(),
        };
        if let Err(e) = self.rate_repo.upsert(RATE_CACHE_KEY, &entry).await {
            warn!("Rate cache write failed: {}", e);
        }
    }

    /// Fetch a provider and try to extract a rate; failures degrade to None
    async fn fetch_rate(&self, url: &str) -> Option<Decimal> {
        let response = self
            .http
            .get(url)
            .timeout(self.config.http_timeout())
            .send()
            .await;

        match response {
            Ok(resp) if resp.status().is_success() => match resp.json::<Value>().await {
                Ok(payload) => Self::extract_rate(&payload),
                Err(e) => {
                    warn!("Rate provider {} returned invalid JSON: {}", url, e);
                    None
                }
            },
            Ok(resp) => {
                warn!("Rate provider {} returned status {}", url, resp.status());
                None
            }
            Err(e) => {
                warn!("Rate provider {} unreachable: {}", url, e);
                None
            }
        }
    }

    /// Walk the provider chain and cache the first usable rate.
    /// Never returns an error: the configured default is the last resort.
    pub async fn refresh(&self) -> Decimal {
        // Operator-configured endpoint wins when it answers
        if let Some(url) = self.config.custom_endpoint.clone() {
            if let Some(rate) = self.fetch_rate(&url).await {
                self.store(rate, &format!("custom:{}", url)).await;
                return rate;
            }
        }

        for (url, label) in COMMUNITY_SOURCES {
            if let Some(rate) = self.fetch_rate(url).await {
                self.store(rate, &format!("community:{}", label)).await;
                return rate;
            }
        }

        if let Some(rate) = self.fetch_rate(FX_FALLBACK_URL).await {
            self.store(rate, "fx:open.er-api.com").await;
            return rate;
        }

        let fallback = Decimal::from_f64(self.config.default_rate)
            .filter(|r| *r > Decimal::ZERO)
            .unwrap_or(Decimal::ONE);
        warn!("All rate providers failed, using configured default {}", fallback);
        self.store(fallback, "fallback:default").await;
        fallback
    }

    /// Return a usable rate as fast as possible:
    /// 1. today's cached entry
    /// 2. (if `allow_stale`) the last cached entry, refreshing in the background
    /// 3. a synchronous refresh
    pub async fn get_rate(&self, allow_stale: bool) -> Decimal {
        if let Some(entry) = self.read_cached(true).await {
            return entry.rate;
        }

        if allow_stale {
            if let Some(entry) = self.read_cached(false).await {
                // Opportunistic refresh; the stale value answers this call
                let service = self.clone();
                tokio::spawn(async move {
                    service.refresh().await;
                });
                return entry.rate;
            }
        }

        self.refresh().await
    }

    /// Rate metadata for display: availability and freshness
    pub async fn get_rate_info(&self) -> RateInfo {
        if let Some(entry) = self.read_cached(true).await {
            return RateInfo {
                available: true,
                date: Some(entry.date),
                source: Some(entry.source),
                stale: Some(false),
            };
        }

        if let Some(entry) = self.read_cached(false).await {
            return RateInfo {
                available: true,
                date: Some(entry.date),
                source: Some(entry.source),
                stale: Some(true),
            };
        }

        RateInfo::unavailable()
    }

    /// Manually pin today's rate (admin operation)
    pub async fn set_rate(&self, rate: Decimal, source: &str) -> AppResult<RateEntry> {
        if rate <= Decimal::ZERO {
            return Err(AppError::Validation("Rate must be greater than 0".to_string()));
        }

        let entry = RateEntry {
            rate,
            source: source.to_string(),
            date: Self::today_key(),
        };
        self.rate_repo.upsert(RATE_CACHE_KEY, &entry).await?;
        info!("Rate set to {} from {}", rate, source);
        Ok(entry)
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use serde_json::json;

    #[test]
    fn test_extract_rate_nested_monitor_shape() {
        let payload = json!({"monitors": {"bcv": {"price": 36.52}}});
        assert_eq!(
            RateService::extract_rate(&payload),
            Decimal::from_f64(36.52)
        );
    }

    #[test]
    fn test_extract_rate_generic_fx_shape() {
        let payload = json!({"rates": {"VES": 40.25, "EUR": 0.9}});
        assert_eq!(
            RateService::extract_rate(&payload),
            Decimal::from_f64(40.25)
        );
    }

    #[test]
    fn test_extract_rate_string_with_comma() {
        let payload = json!({"price": "38,75"});
        assert_eq!(
            RateService::extract_rate(&payload),
            Some("38.75".parse().unwrap())
        );
    }

    #[test]
    fn test_extract_rate_rejects_non_positive() {
        assert_eq!(RateService::extract_rate(&json!({"price": 0})), None);
        assert_eq!(RateService::extract_rate(&json!({"price": -5.0})), None);
    }

    #[test]
    fn test_extract_rate_priority_order() {
        // A specific monitor path beats the generic "price" key
        let payload = json!({"price": 1.0, "monitors": {"bcv": {"price": 36.0}}});
        assert_eq!(
            RateService::extract_rate(&payload),
            Decimal::from_f64(36.0)
        );
    }

    #[test]
    fn test_extract_rate_non_object() {
        assert_eq!(RateService::extract_rate(&json!([1, 2, 3])), None);
        assert_eq!(RateService::extract_rate(&json!(40.0)), None);
    }
}
