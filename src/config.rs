// Application configuration.
// Loaded from FOODDASH_* environment variables with defaults for local development.

use std::path::PathBuf;
use std::str::FromStr;
use std::time::Duration;

use reqwest::Url;

use crate::error::{FoodDashError, Result};
use crate::query::{DEFAULT_GC_TIME, DEFAULT_STALE_TIME, QueryOptions};
use crate::storage::paths;

pub const DEFAULT_API_URL: &str = "http://localhost:3000/api";
pub const DEFAULT_REQUEST_TIMEOUT: Duration = Duration::from_secs(30);
pub const DEFAULT_LOG_FILTER: &str = "info";

/// Log output format.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Default)]
pub enum LogFormat {
    #[default]
    Compact,
    Json,
}

impl FromStr for LogFormat {
    type Err = FoodDashError;

    fn from_str(s: &str) -> Result<Self> {
        match s.trim().to_ascii_lowercase().as_str() {
            "compact" => Ok(LogFormat::Compact),
            "json" => Ok(LogFormat::Json),
            other => Err(FoodDashError::Config(format!("unknown log format: {other}"))),
        }
    }
}

#[derive(Debug, Clone)]
pub struct Config {
    /// Base URL endpoint paths are appended to.
    pub api_base_url: String,
    /// File holding durable client storage (auth token).
    pub storage_path: PathBuf,
    pub request_timeout: Duration,
    /// Freshness policy for queries that don't set their own.
    pub query_defaults: QueryOptions,
    pub log_filter: String,
    pub log_format: LogFormat,
}

impl Config {
    /// Load configuration from the process environment.
    pub fn from_env() -> Result<Self> {
        Self::from_lookup(|name| std::env::var(name).ok())
    }

    /// Load configuration through an arbitrary variable lookup.
    pub fn from_lookup(lookup: impl Fn(&str) -> Option<String>) -> Result<Self> {
        let get = |name: &str| lookup(name).filter(|value| !value.trim().is_empty());

        let api_base_url = validate_url(&get("FOODDASH_API_URL").unwrap_or_else(|| DEFAULT_API_URL.into()))?;

        let storage_path = match get("FOODDASH_STORAGE_PATH") {
            Some(path) => PathBuf::from(path),
            None => paths::storage_path().ok_or_else(|| {
                FoodDashError::Config(
                    "could not determine a data directory; set FOODDASH_STORAGE_PATH".into(),
                )
            })?,
        };

        let request_timeout = seconds(&get, "FOODDASH_REQUEST_TIMEOUT_SECS", DEFAULT_REQUEST_TIMEOUT)?;
        let query_defaults = QueryOptions::new(
            seconds(&get, "FOODDASH_STALE_TIME_SECS", DEFAULT_STALE_TIME)?,
            seconds(&get, "FOODDASH_GC_TIME_SECS", DEFAULT_GC_TIME)?,
        );

        let log_filter = get("FOODDASH_LOG").unwrap_or_else(|| DEFAULT_LOG_FILTER.into());
        let log_format = match get("FOODDASH_LOG_FORMAT") {
            Some(format) => format.parse()?,
            None => LogFormat::default(),
        };

        Ok(Self {
            api_base_url,
            storage_path,
            request_timeout,
            query_defaults,
            log_filter,
            log_format,
        })
    }

    /// Override the API base URL, e.g. from a command-line flag.
    pub fn with_api_base_url(mut self, url: &str) -> Result<Self> {
        self.api_base_url = validate_url(url)?;
        Ok(self)
    }
}

fn validate_url(url: &str) -> Result<String> {
    let parsed = Url::parse(url.trim())
        .map_err(|e| FoodDashError::Config(format!("invalid FOODDASH_API_URL {url:?}: {e}")))?;
    if !matches!(parsed.scheme(), "http" | "https") {
        return Err(FoodDashError::Config(format!(
            "FOODDASH_API_URL must use http or https: {url}"
        )));
    }
    Ok(url.trim().trim_end_matches('/').to_string())
}

fn seconds(get: &dyn Fn(&str) -> Option<String>, name: &str, default: Duration) -> Result<Duration> {
    match get(name) {
        Some(raw) => raw
            .trim()
            .parse::<u64>()
            .map(Duration::from_secs)
            .map_err(|_| FoodDashError::Config(format!("{name} must be a whole number of seconds, got {raw:?}"))),
        None => Ok(default),
    }
}
