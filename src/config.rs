use std::env;
use std::time::Duration;

/// Database configuration
#[derive(Debug, Clone)]
pub struct DatabaseConfig {
    pub url: String,
    pub max_connections: u32,
    pub acquire_timeout_secs: u64,
    pub idle_timeout_secs: u64,
    pub max_lifetime_secs: u64,
    pub test_before_acquire: bool,
}

/// Exchange-rate provider configuration
#[derive(Debug, Clone)]
pub struct RateConfig {
    /// Optional operator-supplied endpoint, tried before the public providers
    pub custom_endpoint: Option<String>,
    /// Last-resort rate when every provider fails
    pub default_rate: f64,
    /// Per-request timeout for provider calls
    pub http_timeout_secs: u64,
}

/// Application configuration
#[derive(Debug, Clone)]
pub struct AppConfig {
    pub database: DatabaseConfig,
    pub rate: RateConfig,
    pub log_level: String,
    pub environment: String,
    /// Credential the calling layer must present for admin operations
    pub admin_api_key: Option<String>,
    /// Lease window granted to a reservation hold
    pub reservation_minutes: i64,
    /// Expiry sweeper tick interval
    pub cleanup_interval_secs: u64,
}

impl DatabaseConfig {
    /// Create database config from environment variables
    pub fn from_env() -> Result<Self, String> {
        let url = env::var("DATABASE_URL")
            .map_err(|_| "DATABASE_URL environment variable is required")?;

        let max_connections = env::var("DATABASE_MAX_CONNECTIONS")
            .ok()
            .and_then(|s| s.parse::<u32>().ok())
            .unwrap_or(10);

        let acquire_timeout_secs = env::var("DATABASE_ACQUIRE_TIMEOUT_SECS")
            .ok()
            .and_then(|s| s.parse::<u64>().ok())
            .unwrap_or(30);

        let idle_timeout_secs = env::var("DATABASE_IDLE_TIMEOUT_SECS")
            .ok()
            .and_then(|s| s.parse::<u64>().ok())
            .unwrap_or(600); // 10 minutes

        let max_lifetime_secs = env::var("DATABASE_MAX_LIFETIME_SECS")
            .ok()
            .and_then(|s| s.parse::<u64>().ok())
            .unwrap_or(1800); // 30 minutes

        let test_before_acquire = env::var("DATABASE_TEST_BEFORE_ACQUIRE")
            .ok()
            .and_then(|s| s.parse::<bool>().ok())
            .unwrap_or(true);

        // Validate configuration
        if max_connections == 0 {
            return Err("DATABASE_MAX_CONNECTIONS must be greater than 0".to_string());
        }

        if acquire_timeout_secs == 0 {
            return Err("DATABASE_ACQUIRE_TIMEOUT_SECS must be greater than 0".to_string());
        }

        Ok(Self {
            url,
            max_connections,
            acquire_timeout_secs,
            idle_timeout_secs,
            max_lifetime_secs,
            test_before_acquire,
        })
    }

    /// Get acquire timeout as Duration
    pub fn acquire_timeout(&self) -> Duration {
        Duration::from_secs(self.acquire_timeout_secs)
    }

    /// Get idle timeout as Duration
    pub fn idle_timeout(&self) -> Duration {
        Duration::from_secs(self.idle_timeout_secs)
    }

    /// Get max lifetime as Duration
    pub fn max_lifetime(&self) -> Duration {
        Duration::from_secs(self.max_lifetime_secs)
    }
}

impl Default for DatabaseConfig {
    fn default() -> Self {
        Self {
            url: "postgresql://localhost/raffle".to_string(),
            max_connections: 10,
            acquire_timeout_secs: 30,
            idle_timeout_secs: 600,
            max_lifetime_secs: 1800,
            test_before_acquire: true,
        }
    }
}

impl RateConfig {
    /// Create rate config from environment variables
    pub fn from_env() -> Result<Self, String> {
        let custom_endpoint = env::var("RATE_API_URL").ok().filter(|s| !s.is_empty());

        let default_rate = env::var("DEFAULT_USD_RATE")
            .ok()
            .and_then(|s| s.parse::<f64>().ok())
            .unwrap_or(40.0);

        let http_timeout_secs = env::var("RATE_HTTP_TIMEOUT_SECS")
            .ok()
            .and_then(|s| s.parse::<u64>().ok())
            .unwrap_or(8);

        if default_rate <= 0.0 {
            return Err("DEFAULT_USD_RATE must be greater than 0".to_string());
        }

        Ok(Self {
            custom_endpoint,
            default_rate,
            http_timeout_secs,
        })
    }

    /// Get HTTP timeout as Duration
    pub fn http_timeout(&self) -> Duration {
        Duration::from_secs(self.http_timeout_secs)
    }
}

impl Default for RateConfig {
    fn default() -> Self {
        Self {
            custom_endpoint: None,
            default_rate: 40.0,
            http_timeout_secs: 8,
        }
    }
}

impl AppConfig {
    /// Create application config from environment variables
    pub fn from_env() -> Result<Self, String> {
        let database = DatabaseConfig::from_env()?;
        let rate = RateConfig::from_env()?;

        let log_level = env::var("LOG_LEVEL").unwrap_or_else(|_| "info".to_string());

        let environment = env::var("ENVIRONMENT").unwrap_or_else(|_| "development".to_string());

        let admin_api_key = env::var("ADMIN_API_KEY").ok().filter(|s| !s.is_empty());

        let reservation_minutes = env::var("RESERVATION_MINUTES")
            .ok()
            .and_then(|s| s.parse::<i64>().ok())
            .unwrap_or(10);

        let cleanup_interval_secs = env::var("CLEANUP_INTERVAL_SECONDS")
            .ok()
            .and_then(|s| s.parse::<u64>().ok())
            .unwrap_or(60);

        // Validate log level
        let valid_log_levels = ["trace", "debug", "info", "warn", "error"];
        if !valid_log_levels.contains(&log_level.to_lowercase().as_str()) {
            return Err(format!(
                "Invalid LOG_LEVEL: {}. Must be one of: {:?}",
                log_level, valid_log_levels
            ));
        }

        // Validate environment
        let valid_environments = ["development", "staging", "production"];
        if !valid_environments.contains(&environment.to_lowercase().as_str()) {
            return Err(format!(
                "Invalid ENVIRONMENT: {}. Must be one of: {:?}",
                environment, valid_environments
            ));
        }

        if reservation_minutes <= 0 {
            return Err("RESERVATION_MINUTES must be greater than 0".to_string());
        }

        if cleanup_interval_secs == 0 {
            return Err("CLEANUP_INTERVAL_SECONDS must be greater than 0".to_string());
        }

        Ok(Self {
            database,
            rate,
            log_level: log_level.to_lowercase(),
            environment: environment.to_lowercase(),
            admin_api_key,
            reservation_minutes,
            cleanup_interval_secs,
        })
    }

    /// Check if running in production
    pub fn is_production(&self) -> bool {
        self.environment == "production"
    }

    /// Check if running in development
    pub fn is_development(&self) -> bool {
        self.environment == "development"
    }

    /// Get database URL (convenience method)
    pub fn database_url(&self) -> &str {
        &self.database.url
    }

    /// Get cleanup interval as Duration
    pub fn cleanup_interval(&self) -> Duration {
        Duration::from_secs(self.cleanup_interval_secs)
    }
}

impl Default for AppConfig {
    fn default() -> Self {
        Self {
            database: DatabaseConfig::default(),
            rate: RateConfig::default(),
            log_level: "info".to_string(),
            environment: "development".to_string(),
            admin_api_key: None,
            reservation_minutes: 10,
            cleanup_interval_secs: 60,
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_database_config_default() {
        let config = DatabaseConfig::default();
        assert_eq!(config.max_connections, 10);
        assert_eq!(config.acquire_timeout_secs, 30);
    }

    #[test]
    fn test_app_config_default() {
        let config = AppConfig::default();
        assert_eq!(config.reservation_minutes, 10);
        assert_eq!(config.cleanup_interval_secs, 60);
        assert!(config.is_development());
        assert!(!config.is_production());
    }

    #[test]
    fn test_rate_config_default() {
        let config = RateConfig::default();
        assert!(config.custom_endpoint.is_none());
        assert_eq!(config.http_timeout(), Duration::from_secs(8));
    }
}
