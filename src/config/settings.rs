//! Application settings loaded from `billdesk.toml`.
//!
//! Every key is optional; a missing file yields the defaults. After the file
//! is read, `BILLDESK_API_URL`, `BILLDESK_API_TOKEN` and `DATABASE_URL`
//! override the matching values so deployments can keep secrets out of the
//! file.

use crate::{
    api::RetryPolicy,
    errors::{Error, Result},
};
use serde::Deserialize;
use std::{path::Path, time::Duration};
use tracing::{debug, info};

/// Default settings file name, looked up in the working directory.
pub const DEFAULT_CONFIG_PATH: &str = "billdesk.toml";

/// Largest page size the backend accepts.
const MAX_PAGE_SIZE: u32 = 100;

/// Complete application configuration.
#[derive(Debug, Clone, Default, PartialEq, Eq, Deserialize)]
#[serde(default, deny_unknown_fields)]
pub struct AppConfig {
    /// Backend connection
    pub api: ApiSettings,
    /// Screen defaults
    pub ui: UiSettings,
    /// Local preference storage
    pub storage: StorageSettings,
}

/// `[api]` section.
#[derive(Debug, Clone, PartialEq, Eq, Deserialize)]
#[serde(default, deny_unknown_fields)]
pub struct ApiSettings {
    /// Base URL every request path is appended to
    pub base_url: String,
    /// Bearer token; prefer `BILLDESK_API_TOKEN`
    pub token: Option<String>,
    /// Per-request timeout
    pub timeout_secs: u64,
    /// Retries for transient failures
    pub max_retries: usize,
}

impl Default for ApiSettings {
    fn default() -> Self {
        Self {
            base_url: "http://localhost:8080/api".to_string(),
            token: None,
            timeout_secs: 30,
            max_retries: 3,
        }
    }
}

/// `[ui]` section.
#[derive(Debug, Clone, PartialEq, Eq, Deserialize)]
#[serde(default, deny_unknown_fields)]
pub struct UiSettings {
    /// Longest report range in whole months
    pub max_range_months: u32,
    /// Rows per list page
    pub page_size: u32,
}

impl Default for UiSettings {
    fn default() -> Self {
        Self {
            max_range_months: crate::core::date_range::DEFAULT_MAX_MONTHS,
            page_size: crate::api::Pagination::DEFAULT_PAGE_SIZE,
        }
    }
}

/// `[storage]` section.
#[derive(Debug, Clone, PartialEq, Eq, Deserialize)]
#[serde(default, deny_unknown_fields)]
pub struct StorageSettings {
    /// sea-orm connection string of the preference database
    pub database_url: String,
}

impl Default for StorageSettings {
    fn default() -> Self {
        Self {
            database_url: "sqlite://data/billdesk.sqlite?mode=rwc".to_string(),
        }
    }
}

impl AppConfig {
    /// Request timeout as a [`Duration`].
    #[must_use]
    pub const fn timeout(&self) -> Duration {
        Duration::from_secs(self.api.timeout_secs)
    }

    /// Retry policy for the REST client.
    #[must_use]
    pub fn retry_policy(&self) -> RetryPolicy {
        RetryPolicy {
            max_retries: self.api.max_retries,
            ..RetryPolicy::default()
        }
    }

    /// Replaces values with those found by `lookup`, which maps an
    /// environment variable name to its value.
    pub fn apply_overrides(&mut self, lookup: impl Fn(&str) -> Option<String>) {
        if let Some(url) = lookup("BILLDESK_API_URL") {
            debug!("Using API URL from BILLDESK_API_URL");
            self.api.base_url = url;
        }
        if let Some(token) = lookup("BILLDESK_API_TOKEN") {
            self.api.token = Some(token);
        }
        if let Some(url) = lookup("DATABASE_URL") {
            debug!("Using database URL from DATABASE_URL");
            self.storage.database_url = url;
        }
    }

    /// Checks values that would otherwise fail later in confusing ways.
    pub fn validate(&self) -> Result<()> {
        let url = url::Url::parse(&self.api.base_url).map_err(|e| Error::Config {
            message: format!("Invalid api.base_url '{}': {e}", self.api.base_url),
        })?;
        if !matches!(url.scheme(), "http" | "https") {
            return Err(Error::Config {
                message: format!("api.base_url must use http or https, got '{}'", url.scheme()),
            });
        }
        if self.api.timeout_secs == 0 {
            return Err(Error::Config {
                message: "api.timeout_secs must be at least 1".to_string(),
            });
        }
        if self.ui.max_range_months == 0 {
            return Err(Error::Config {
                message: "ui.max_range_months must be at least 1".to_string(),
            });
        }
        if !(1..=MAX_PAGE_SIZE).contains(&self.ui.page_size) {
            return Err(Error::Config {
                message: format!("ui.page_size must be between 1 and {MAX_PAGE_SIZE}"),
            });
        }
        Ok(())
    }
}

/// Parses settings from a TOML file.
pub fn load_config<P: AsRef<Path>>(path: P) -> Result<AppConfig> {
    let path = path.as_ref();
    let contents = std::fs::read_to_string(path).map_err(|e| Error::Config {
        message: format!("Failed to read config file {}: {e}", path.display()),
    })?;

    toml::from_str(&contents).map_err(|e| Error::Config {
        message: format!("Failed to parse {}: {e}", path.display()),
    })
}

/// Loads `path` if it exists, applies environment overrides and validates.
pub fn load_app_configuration<P: AsRef<Path>>(path: P) -> Result<AppConfig> {
    let path = path.as_ref();
    let mut config = if path.exists() {
        info!("Loading configuration from {}", path.display());
        load_config(path)?
    } else {
        info!("No {} found, using default configuration", path.display());
        AppConfig::default()
    };

    config.apply_overrides(|name| std::env::var(name).ok());
    config.validate()?;
    Ok(config)
}

#[cfg(test)]
mod tests {
    #![allow(clippy::unwrap_used)]
    use super::*;
    use std::collections::HashMap;

    #[test]
    fn test_partial_file_keeps_defaults() {
        let config: AppConfig = toml::from_str(
            r#"
            [api]
            base_url = "https://billing.example.in/api"
            max_retries = 5

            [ui]
            page_size = 50
            "#,
        )
        .unwrap();

        assert_eq!(config.api.base_url, "https://billing.example.in/api");
        assert_eq!(config.api.max_retries, 5);
        assert_eq!(config.api.timeout_secs, 30);
        assert_eq!(config.ui.page_size, 50);
        assert_eq!(config.ui.max_range_months, 12);
        assert_eq!(config.retry_policy().max_retries, 5);
        assert!(config.validate().is_ok());
    }

    #[test]
    fn test_unknown_keys_are_rejected() {
        let result = toml::from_str::<AppConfig>("[api]\nbase_uri = \"http://x\"\n");
        assert!(result.is_err());
    }

    #[test]
    fn test_environment_overrides_file() {
        let env: HashMap<&str, &str> = HashMap::from([
            ("BILLDESK_API_URL", "https://override.example.in"),
            ("BILLDESK_API_TOKEN", "secret"),
        ]);
        let mut config = AppConfig::default();
        config.apply_overrides(|name| env.get(name).map(ToString::to_string));

        assert_eq!(config.api.base_url, "https://override.example.in");
        assert_eq!(config.api.token.as_deref(), Some("secret"));
        assert_eq!(
            config.storage.database_url,
            StorageSettings::default().database_url
        );
    }

    #[test]
    fn test_validation_errors() {
        let mut config = AppConfig::default();
        config.api.base_url = "ftp://files.example.in".to_string();
        assert!(matches!(config.validate(), Err(Error::Config { .. })));

        let mut config = AppConfig::default();
        config.ui.page_size = 0;
        assert!(config.validate().is_err());

        let mut config = AppConfig::default();
        config.api.timeout_secs = 0;
        assert!(config.validate().is_err());
    }

    #[test]
    fn test_missing_file_is_a_config_error() {
        let err = load_config("does/not/exist.toml").unwrap_err();
        assert!(err.to_string().starts_with("Configuration error: Failed to read"));
    }
}
