//! Configuration management for the blogdesk dashboard

use crate::types::SortOrder;
use serde::{Deserialize, Serialize};
use std::path::Path;
use std::time::Duration;

/// Main configuration structure
#[derive(Debug, Clone, Default, Serialize, Deserialize)]
pub struct Config {
    /// Remote API configuration
    #[serde(default)]
    pub api: ApiConfig,

    /// List-view query defaults
    #[serde(default)]
    pub query: QueryConfig,

    /// Logging configuration
    #[serde(default)]
    pub logging: LoggingConfig,
}

/// Remote API configuration
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct ApiConfig {
    /// Base URL every endpoint path is joined onto
    #[serde(default = "default_base_url")]
    pub base_url: String,

    /// Access token sent as `Authorization: Token <token>`
    #[serde(default)]
    pub access_token: Option<String>,

    /// Request timeout in seconds
    #[serde(default = "default_request_timeout")]
    pub request_timeout_secs: u64,
}

/// Defaults for paginated list views
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct QueryConfig {
    /// Page size a fresh list view starts with
    #[serde(default = "default_limit")]
    pub default_limit: u32,

    /// Page sizes offered by the rows-per-page selector
    #[serde(default = "default_page_sizes")]
    pub page_sizes: Vec<u32>,

    /// Sort direction a fresh list view starts with
    #[serde(default)]
    pub default_order: SortOrder,

    /// Quiescence window for free-text search, in milliseconds
    #[serde(default = "default_search_debounce")]
    pub search_debounce_ms: u64,

    /// Staleness window for resources that do not declare their own, in seconds
    #[serde(default)]
    pub default_stale_secs: u64,

    /// How long an unused cache entry survives, in seconds
    #[serde(default = "default_gc")]
    pub gc_secs: u64,

    /// Retries after the first failed attempt of a list read
    #[serde(default = "default_retry_attempts")]
    pub retry_attempts: u32,

    /// Fixed delay between retries, in milliseconds
    #[serde(default = "default_retry_delay")]
    pub retry_delay_ms: u64,
}

/// Logging configuration
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct LoggingConfig {
    /// Log level
    #[serde(default = "default_log_level")]
    pub level: String,

    /// Log format (json or text)
    #[serde(default = "default_log_format")]
    pub format: String,
}

// Default value functions
fn default_base_url() -> String {
    "http://localhost:8000".to_string()
}

const fn default_request_timeout() -> u64 {
    30
}

const fn default_limit() -> u32 {
    10
}

fn default_page_sizes() -> Vec<u32> {
    vec![5, 10, 25]
}

const fn default_search_debounce() -> u64 {
    500
}

const fn default_gc() -> u64 {
    300
}

const fn default_retry_attempts() -> u32 {
    3
}

const fn default_retry_delay() -> u64 {
    1000
}

fn default_log_level() -> String {
    "info".to_string()
}

fn default_log_format() -> String {
    "text".to_string()
}

impl Default for ApiConfig {
    fn default() -> Self {
        Self {
            base_url: default_base_url(),
            access_token: None,
            request_timeout_secs: default_request_timeout(),
        }
    }
}

impl ApiConfig {
    /// Request timeout as a [`Duration`]
    #[must_use]
    pub const fn request_timeout(&self) -> Duration {
        Duration::from_secs(self.request_timeout_secs)
    }
}

impl Default for QueryConfig {
    fn default() -> Self {
        Self {
            default_limit: default_limit(),
            page_sizes: default_page_sizes(),
            default_order: SortOrder::default(),
            search_debounce_ms: default_search_debounce(),
            default_stale_secs: 0,
            gc_secs: default_gc(),
            retry_attempts: default_retry_attempts(),
            retry_delay_ms: default_retry_delay(),
        }
    }
}

impl QueryConfig {
    /// Search debounce window
    #[must_use]
    pub const fn search_debounce(&self) -> Duration {
        Duration::from_millis(self.search_debounce_ms)
    }

    /// Fallback staleness window
    #[must_use]
    pub const fn default_stale_time(&self) -> Duration {
        Duration::from_secs(self.default_stale_secs)
    }

    /// Garbage-collection window for unused cache entries
    #[must_use]
    pub const fn gc_time(&self) -> Duration {
        Duration::from_secs(self.gc_secs)
    }

    /// Delay between retries
    #[must_use]
    pub const fn retry_delay(&self) -> Duration {
        Duration::from_millis(self.retry_delay_ms)
    }

    /// Accept `limit` only if the rows-per-page selector offers it
    ///
    /// # Errors
    ///
    /// Returns a validation error for a page size not in `page_sizes`.
    pub fn check_page_size(&self, limit: u32) -> crate::Result<u32> {
        if self.page_sizes.contains(&limit) {
            return Ok(limit);
        }
        let offered: Vec<String> = self.page_sizes.iter().map(ToString::to_string).collect();
        Err(crate::Error::validation(
            "limit",
            format!("{limit} is not an offered page size ({})", offered.join(", ")),
        ))
    }
}

impl Default for LoggingConfig {
    fn default() -> Self {
        Self {
            level: default_log_level(),
            format: default_log_format(),
        }
    }
}

impl Config {
    /// Load configuration from an optional `blogdesk` file and `BLOGDESK__*` environment variables
    ///
    /// # Errors
    ///
    /// Returns an error if configuration cannot be loaded or parsed.
    pub fn load() -> crate::Result<Self> {
        let config = ::config::Config::builder()
            .add_source(::config::File::with_name("blogdesk").required(false))
            .add_source(::config::Environment::with_prefix("BLOGDESK").separator("__"))
            .build()?;

        let config: Self = config.try_deserialize()?;
        config.validate()?;
        Ok(config)
    }

    /// Load configuration from an explicit file, still honouring environment overrides
    ///
    /// # Errors
    ///
    /// Returns an error if the file is missing, malformed, or fails validation.
    pub fn load_from(path: &Path) -> crate::Result<Self> {
        let config = ::config::Config::builder()
            .add_source(::config::File::from(path))
            .add_source(::config::Environment::with_prefix("BLOGDESK").separator("__"))
            .build()?;

        let config: Self = config.try_deserialize()?;
        config.validate()?;
        Ok(config)
    }

    /// Reject settings the list views cannot work with
    ///
    /// # Errors
    ///
    /// Returns a validation error naming the offending field.
    pub fn validate(&self) -> crate::Result<()> {
        if self.query.default_limit == 0 {
            return Err(crate::Error::validation(
                "query.default_limit",
                "page size must be greater than zero",
            ));
        }
        if self.query.page_sizes.contains(&0) {
            return Err(crate::Error::validation(
                "query.page_sizes",
                "page sizes must be greater than zero",
            ));
        }
        if self.api.base_url.trim().is_empty() {
            return Err(crate::Error::validation("api.base_url", "must not be empty"));
        }
        Ok(())
    }
}
