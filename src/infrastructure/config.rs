//! Configuration infrastructure
//!
//! Configuration is read from an optional file (TOML/JSON/YAML, picked by
//! extension) layered under `BIGARAY__SECTION__KEY` environment variables.
//! Every section falls back to the values in [`defaults`].

use serde::{Deserialize, Serialize};
use std::path::{Path, PathBuf};
use thiserror::Error;
use tracing::info;

use crate::domain::FetchMode;

/// Complete application configuration
#[derive(Debug, Clone, Default, Serialize, Deserialize)]
#[serde(default)]
pub struct AppConfig {
    pub database: DatabaseConfig,
    pub http: HttpConfig,
    pub proxy: ProxyConfig,
    pub crawling: CrawlingConfig,
    pub images: ImageConfig,
    pub logging: LoggingConfig,
}

#[derive(Debug, Clone, Serialize, Deserialize)]
#[serde(default)]
pub struct DatabaseConfig {
    /// sqlx connection string, e.g. `sqlite:/var/lib/bigaray/bigaray.db`
    pub url: String,
    pub max_connections: u32,
}

#[derive(Debug, Clone, Serialize, Deserialize)]
#[serde(default)]
pub struct HttpConfig {
    pub timeout_seconds: u64,
    /// Total attempts per fetch, including the first
    pub max_attempts: u32,
    pub retry_base_delay_ms: u64,
    /// 0 disables rate limiting
    pub max_requests_per_second: u32,
    pub user_agent: String,
}

/// Anti-bot proxy the non-direct fetch modes are routed through
#[derive(Debug, Clone, Serialize, Deserialize)]
#[serde(default)]
pub struct ProxyConfig {
    pub endpoint: String,
    pub api_key: Option<String>,
}

#[derive(Debug, Clone, Serialize, Deserialize)]
#[serde(default)]
pub struct CrawlingConfig {
    /// Listing pages fetched ahead of the reconciler within one channel
    pub list_page_max_concurrent: usize,
    /// Product pages re-fetched concurrently by the link-health sweep
    pub health_check_max_concurrent: usize,
    /// Only products inserted at least this many days ago are health-checked
    pub health_check_min_age_days: i64,
    /// Rows per keyset page when sweeping the catalog
    pub store_page_size: u32,
    /// Channels without a heartbeat for this long are reported as stale
    pub stale_channel_hours: i64,
}

#[derive(Debug, Clone, Serialize, Deserialize)]
#[serde(default)]
pub struct ImageConfig {
    /// Directory the image blob store writes into
    pub root_dir: PathBuf,
}

#[derive(Debug, Clone, Serialize, Deserialize)]
#[serde(default)]
pub struct LoggingConfig {
    pub level: String,
    pub json_format: bool,
    pub console_output: bool,
    pub file_output: bool,
    pub log_dir: PathBuf,
    pub file_name_prefix: String,
}

impl Default for DatabaseConfig {
    fn default() -> Self {
        Self {
            url: format!(
                "sqlite:{}",
                app_data_dir().join(defaults::DATABASE_FILE).display()
            ),
            max_connections: defaults::DB_MAX_CONNECTIONS,
        }
    }
}

impl Default for HttpConfig {
    fn default() -> Self {
        Self {
            timeout_seconds: defaults::REQUEST_TIMEOUT_SECONDS,
            max_attempts: defaults::FETCH_MAX_ATTEMPTS,
            retry_base_delay_ms: defaults::RETRY_BASE_DELAY_MS,
            max_requests_per_second: defaults::MAX_REQUESTS_PER_SECOND,
            user_agent: defaults::USER_AGENT.to_string(),
        }
    }
}

impl Default for ProxyConfig {
    fn default() -> Self {
        Self {
            endpoint: defaults::PROXY_ENDPOINT.to_string(),
            api_key: None,
        }
    }
}

impl Default for CrawlingConfig {
    fn default() -> Self {
        Self {
            list_page_max_concurrent: defaults::LIST_PAGE_MAX_CONCURRENT,
            health_check_max_concurrent: defaults::HEALTH_CHECK_MAX_CONCURRENT,
            health_check_min_age_days: defaults::HEALTH_CHECK_MIN_AGE_DAYS,
            store_page_size: defaults::STORE_PAGE_SIZE,
            stale_channel_hours: defaults::STALE_CHANNEL_HOURS,
        }
    }
}

impl Default for ImageConfig {
    fn default() -> Self {
        Self {
            root_dir: app_data_dir().join("images"),
        }
    }
}

impl Default for LoggingConfig {
    fn default() -> Self {
        Self {
            level: defaults::LOG_LEVEL.to_string(),
            json_format: defaults::LOG_JSON_FORMAT,
            console_output: defaults::LOG_CONSOLE_OUTPUT,
            file_output: defaults::LOG_FILE_OUTPUT,
            log_dir: app_data_dir().join("logs"),
            file_name_prefix: defaults::LOG_FILE_PREFIX.to_string(),
        }
    }
}

#[derive(Debug, Error)]
pub enum ConfigError {
    #[error("failed to load configuration: {0}")]
    Load(#[from] config::ConfigError),

    #[error("proxy api key is not configured but {mode:?} fetches need it (set BIGARAY__PROXY__API_KEY)")]
    MissingProxyKey { mode: FetchMode },

    #[error("invalid configuration value for {field}: {reason}")]
    Invalid { field: &'static str, reason: String },
}

impl AppConfig {
    /// Load configuration from an optional file plus environment overrides
    pub fn load(path: Option<&Path>) -> Result<Self, ConfigError> {
        let mut builder = config::Config::builder();

        match path {
            Some(path) => {
                builder = builder.add_source(config::File::from(path).required(true));
            }
            None => {
                builder = builder
                    .add_source(config::File::with_name(defaults::CONFIG_FILE_STEM).required(false));
            }
        }

        let app_config: Self = builder
            .add_source(
                config::Environment::with_prefix(defaults::ENV_PREFIX)
                    .prefix_separator("__")
                    .separator("__")
                    .try_parsing(true),
            )
            .build()?
            .try_deserialize()?;

        app_config.validate()?;
        info!(database = %app_config.database.url, "Loaded configuration");
        Ok(app_config)
    }

    /// Sanity checks that do not depend on which commands will run
    pub fn validate(&self) -> Result<(), ConfigError> {
        if self.http.max_attempts == 0 {
            return Err(ConfigError::Invalid {
                field: "http.max_attempts",
                reason: "must be at least 1".to_string(),
            });
        }
        if self.crawling.store_page_size == 0 {
            return Err(ConfigError::Invalid {
                field: "crawling.store_page_size",
                reason: "must be at least 1".to_string(),
            });
        }
        if url::Url::parse(&self.proxy.endpoint).is_err() {
            return Err(ConfigError::Invalid {
                field: "proxy.endpoint",
                reason: format!("'{}' is not a valid URL", self.proxy.endpoint),
            });
        }
        Ok(())
    }

    /// Fails when any of `modes` needs the proxy and no api key is set
    pub fn validate_for(&self, modes: impl IntoIterator<Item = FetchMode>) -> Result<(), ConfigError> {
        let has_key = self
            .proxy
            .api_key
            .as_deref()
            .is_some_and(|key| !key.trim().is_empty());
        if has_key {
            return Ok(());
        }
        match modes.into_iter().find(|mode| mode.requires_proxy()) {
            Some(mode) => Err(ConfigError::MissingProxyKey { mode }),
            None => Ok(()),
        }
    }
}

/// Application data directory (database, images, logs)
pub fn app_data_dir() -> PathBuf {
    dirs::data_local_dir()
        .unwrap_or_else(|| PathBuf::from("."))
        .join(defaults::APP_DIR_NAME)
}

/// Default configuration values
pub mod defaults {
    pub const APP_DIR_NAME: &str = "bigaray";
    pub const CONFIG_FILE_STEM: &str = "bigaray";
    pub const ENV_PREFIX: &str = "BIGARAY";
    pub const DATABASE_FILE: &str = "bigaray.db";

    pub const DB_MAX_CONNECTIONS: u32 = 10;

    /// Default request timeout in seconds
    pub const REQUEST_TIMEOUT_SECONDS: u64 = 60;

    /// Attempts per fetch, first try included
    pub const FETCH_MAX_ATTEMPTS: u32 = 3;

    pub const RETRY_BASE_DELAY_MS: u64 = 500;
    pub const RETRY_MAX_JITTER_MS: u64 = 250;

    pub const MAX_REQUESTS_PER_SECOND: u32 = 5;

    pub const USER_AGENT: &str = "Mozilla/5.0 (Macintosh; Intel Mac OS X 10_15_7) AppleWebKit/537.36 (KHTML, like Gecko) Chrome/124.0 Safari/537.36";

    pub const PROXY_ENDPOINT: &str = "http://api.scraperapi.com/";

    pub const LIST_PAGE_MAX_CONCURRENT: usize = 3;
    pub const HEALTH_CHECK_MAX_CONCURRENT: usize = 5;
    pub const HEALTH_CHECK_MIN_AGE_DAYS: i64 = 0;
    pub const STORE_PAGE_SIZE: u32 = 200;
    pub const STALE_CHANNEL_HOURS: i64 = 48;

    pub const LOG_LEVEL: &str = "info";
    pub const LOG_JSON_FORMAT: bool = false;
    pub const LOG_CONSOLE_OUTPUT: bool = true;
    pub const LOG_FILE_OUTPUT: bool = false;
    pub const LOG_FILE_PREFIX: &str = "bigaray.log";
}

#[cfg(test)]
mod tests {
    use super::*;
    use std::io::Write;

    #[test]
    fn defaults_are_valid() {
        let config = AppConfig::default();
        assert!(config.validate().is_ok());
        assert_eq!(config.http.max_attempts, 3);
        assert!(config.database.url.starts_with("sqlite:"));
    }

    #[test]
    fn proxied_modes_need_a_key() {
        let mut config = AppConfig::default();
        assert!(config.validate_for([FetchMode::Direct]).is_ok());
        assert!(matches!(
            config.validate_for([FetchMode::Direct, FetchMode::UltraPremium]),
            Err(ConfigError::MissingProxyKey { mode: FetchMode::UltraPremium })
        ));

        config.proxy.api_key = Some("   ".into());
        assert!(config.validate_for([FetchMode::Plain]).is_err());

        config.proxy.api_key = Some("secret".into());
        assert!(config.validate_for([FetchMode::Plain, FetchMode::Premium]).is_ok());
    }

    #[test]
    fn loads_partial_file_over_defaults() {
        let mut file = tempfile::Builder::new().suffix(".toml").tempfile().unwrap();
        writeln!(
            file,
            "[http]\nmax_attempts = 5\n\n[proxy]\napi_key = \"abc\"\n\n[crawling]\nstore_page_size = 50"
        )
        .unwrap();

        let config = AppConfig::load(Some(file.path())).unwrap();
        assert_eq!(config.http.max_attempts, 5);
        assert_eq!(config.http.timeout_seconds, defaults::REQUEST_TIMEOUT_SECONDS);
        assert_eq!(config.proxy.api_key.as_deref(), Some("abc"));
        assert_eq!(config.crawling.store_page_size, 50);
    }

    #[test]
    fn rejects_zero_attempts() {
        let mut config = AppConfig::default();
        config.http.max_attempts = 0;
        assert!(matches!(config.validate(), Err(ConfigError::Invalid { .. })));
    }
}
