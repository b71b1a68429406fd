//! Dashboard configuration
//!
//! Defaults match a backend running locally; every field can be overridden from the
//! environment via [`DashboardConfig::from_env`].

use std::path::PathBuf;
use std::time::Duration;

use options_data::gateway::DEFAULT_REQUEST_TIMEOUT;
use thiserror::Error;
use url::Url;

use super::controller::DEFAULT_REFETCH_DELAY;
use super::state::{TimeRange, UnsupportedTimeRange};

pub const ENV_API_URL: &str = "OPTIONS_API_URL";
pub const ENV_REFRESH_INTERVAL_SECS: &str = "REFRESH_INTERVAL_SECS";
pub const ENV_REFETCH_DELAY_SECS: &str = "REFETCH_DELAY_SECS";
pub const ENV_REQUEST_TIMEOUT_SECS: &str = "REQUEST_TIMEOUT_SECS";
pub const ENV_TIME_RANGE_HOURS: &str = "TIME_RANGE_HOURS";
pub const ENV_LOG_FILE: &str = "OPTIONS_TUI_LOG";

const DEFAULT_API_URL: &str = "http://localhost:8000";
const DEFAULT_REFRESH_INTERVAL: Duration = Duration::from_secs(30);
const DEFAULT_LOG_FILE: &str = "options-tui.log";

#[derive(Debug, Error)]
pub enum ConfigError {
    #[error("{var} is not a valid URL: {source}")]
    InvalidUrl {
        var: &'static str,
        #[source]
        source: url::ParseError,
    },

    #[error("{var} must be a whole number of seconds, got {value:?}")]
    InvalidSeconds { var: &'static str, value: String },

    #[error("{var} must be greater than zero")]
    ZeroDuration { var: &'static str },

    #[error("{var} must be a whole number of hours, got {value:?}")]
    InvalidHours { var: &'static str, value: String },

    #[error(transparent)]
    TimeRange(#[from] UnsupportedTimeRange),
}

#[derive(Debug, Clone, PartialEq, Eq)]
pub struct DashboardConfig {
    /// Base URL of the options backend, validated by [`DashboardConfig::from_env`]
    pub api_url: String,
    /// Period of the automatic three-way refresh
    pub refresh_interval: Duration,
    /// Delay between a manual collection trigger and the follow-up refetch
    pub refetch_delay: Duration,
    /// Per-request HTTP timeout
    pub request_timeout: Duration,
    /// Range selected at startup
    pub time_range: TimeRange,
    /// Log destination, the terminal belongs to the UI
    pub log_file: PathBuf,
}

impl Default for DashboardConfig {
    fn default() -> Self {
        Self {
            api_url: DEFAULT_API_URL.to_string(),
            refresh_interval: DEFAULT_REFRESH_INTERVAL,
            refetch_delay: DEFAULT_REFETCH_DELAY,
            request_timeout: DEFAULT_REQUEST_TIMEOUT,
            time_range: TimeRange::default(),
            log_file: PathBuf::from(DEFAULT_LOG_FILE),
        }
    }
}

impl DashboardConfig {
    pub fn new(api_url: impl Into<String>) -> Self {
        Self {
            api_url: api_url.into(),
            ..Default::default()
        }
    }

    /// Parsed backend URL
    pub fn api_url(&self) -> Result<Url, ConfigError> {
        Url::parse(self.api_url.trim()).map_err(|source| ConfigError::InvalidUrl {
            var: ENV_API_URL,
            source,
        })
    }

    /// Build from the process environment, unset variables fall back to defaults
    pub fn from_env() -> Result<Self, ConfigError> {
        Self::from_lookup(|var| std::env::var(var).ok())
    }

    /// Build from an arbitrary variable lookup
    pub fn from_lookup<F>(lookup: F) -> Result<Self, ConfigError>
    where
        F: Fn(&str) -> Option<String>,
    {
        let mut config = Self::default();

        if let Some(value) = lookup(ENV_API_URL) {
            config.api_url = value;
            config.api_url()?;
        }
        if let Some(value) = lookup(ENV_REFRESH_INTERVAL_SECS) {
            config.refresh_interval = parse_seconds(ENV_REFRESH_INTERVAL_SECS, &value)?;
        }
        if let Some(value) = lookup(ENV_REFETCH_DELAY_SECS) {
            config.refetch_delay = parse_seconds(ENV_REFETCH_DELAY_SECS, &value)?;
        }
        if let Some(value) = lookup(ENV_REQUEST_TIMEOUT_SECS) {
            config.request_timeout = parse_seconds(ENV_REQUEST_TIMEOUT_SECS, &value)?;
        }
        if let Some(value) = lookup(ENV_TIME_RANGE_HOURS) {
            let hours = value
                .trim()
                .parse::<u32>()
                .map_err(|_| ConfigError::InvalidHours {
                    var: ENV_TIME_RANGE_HOURS,
                    value: value.clone(),
                })?;
            config.time_range = TimeRange::from_hours(hours)?;
        }
        if let Some(value) = lookup(ENV_LOG_FILE) {
            config.log_file = PathBuf::from(value);
        }

        Ok(config)
    }

    /// Periodic refresh cadence. The refresh loop raises it to
    /// [`MIN_REFRESH_INTERVAL`](super::runtime::MIN_REFRESH_INTERVAL).
    pub fn with_refresh_interval(mut self, interval: Duration) -> Self {
        self.refresh_interval = interval;
        self
    }

    pub fn with_refetch_delay(mut self, delay: Duration) -> Self {
        self.refetch_delay = delay;
        self
    }

    pub fn with_request_timeout(mut self, timeout: Duration) -> Self {
        self.request_timeout = timeout;
        self
    }

    pub fn with_time_range(mut self, time_range: TimeRange) -> Self {
        self.time_range = time_range;
        self
    }
}

fn parse_seconds(var: &'static str, value: &str) -> Result<Duration, ConfigError> {
    let seconds = value
        .trim()
        .parse::<u64>()
        .map_err(|_| ConfigError::InvalidSeconds {
            var,
            value: value.to_string(),
        })?;

    if seconds == 0 {
        return Err(ConfigError::ZeroDuration { var });
    }

    Ok(Duration::from_secs(seconds))
}
