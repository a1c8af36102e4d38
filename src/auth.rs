//! Admin credential check for the calling layer.
//!
//! The transport layer is expected to call [`verify_admin_key`] before
//! invoking any admin-only operation (payment verification, manual rate
//! updates). A missing configured key is a configuration error, never a
//! silent pass.

use crate::config::AppConfig;
use crate::error::{AppError, AppResult};

/// Verify a presented admin API key against configuration.
pub fn verify_admin_key(config: &AppConfig, presented: &str) -> AppResult<()> {
    let expected = config
        .admin_api_key
        .as_deref()
        .ok_or_else(|| AppError::Config("ADMIN_API_KEY is not configured".to_string()))?;

    if presented.is_empty() || presented != expected {
        return Err(AppError::Unauthorized("Invalid admin key".to_string()));
    }

    Ok(())
}

#[cfg(test)]
mod tests {
    use super::*;

    fn config_with_key(key: Option<&str>) -> AppConfig {
        AppConfig {
            admin_api_key: key.map(|k| k.to_string()),
            ..AppConfig::default()
        }
    }

    #[test]
    fn test_valid_key_passes() {
        let config = config_with_key(Some("secret"));
        assert!(verify_admin_key(&config, "secret").is_ok());
    }

    #[test]
    fn test_wrong_key_is_unauthorized() {
        let config = config_with_key(Some("secret"));
        let err = verify_admin_key(&config, "nope").unwrap_err();
        assert_eq!(err.status_code(), 401);
    }

    #[test]
    fn test_missing_configuration_is_config_error() {
        let config = config_with_key(None);
        let err = verify_admin_key(&config, "anything").unwrap_err();
        assert_eq!(err.status_code(), 500);
    }
}
