//! Quote source, work list and rate limit settings.

use std::time::Duration;

use chrono::{Days, NaiveDate, TimeDelta};
use serde::{Deserialize, Serialize};

use super::ConfigError;
use crate::application::services::WorkListSpec;
use crate::domain::shared::{DateRange, Symbol};
use crate::infrastructure::quote_source::HttpQuoteSourceConfig;
use crate::resilience::RateLimitConfig;

/// Quote source configuration.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct SourceConfig {
    /// API root URL.
    #[serde(default = "default_base_url")]
    pub base_url: String,
    /// Bar interval (`1m`, `15m`, `1h`, `1d`, `1wk`).
    #[serde(default = "default_interval")]
    pub interval: String,
    /// `User-Agent` header sent with every request.
    #[serde(default = "default_user_agent")]
    pub user_agent: String,
    /// Transport timeout for one HTTP request.
    #[serde(default = "default_request_timeout")]
    pub request_timeout_secs: u64,
    /// Deadline for one fetch call, including body decoding.
    #[serde(default = "default_call_timeout")]
    pub call_timeout_secs: u64,
    /// Tickers to ingest.
    #[serde(default)]
    pub symbols: Vec<String>,
    /// Also ingest every ticker in the database's ticker list. Configured
    /// symbols are added to that list.
    #[serde(default)]
    pub stored_tickers: bool,
    /// First trading day to ingest. Defaults to `end_date - lookback_days`.
    #[serde(default)]
    pub start_date: Option<NaiveDate>,
    /// Last trading day to ingest. Defaults to today.
    #[serde(default)]
    pub end_date: Option<NaiveDate>,
    /// Days covered when `start_date` is absent.
    #[serde(default = "default_lookback_days")]
    pub lookback_days: u32,
    /// Days per unit of work.
    #[serde(default = "default_window_days")]
    pub window_days: u32,
    /// Skip windows that end before the latest stored bar.
    #[serde(default = "default_resume")]
    pub resume: bool,
    /// Aggregate request budget.
    #[serde(default)]
    pub rate_limit: RateLimitSettings,
}

impl Default for SourceConfig {
    fn default() -> Self {
        Self {
            base_url: default_base_url(),
            interval: default_interval(),
            user_agent: default_user_agent(),
            request_timeout_secs: default_request_timeout(),
            call_timeout_secs: default_call_timeout(),
            symbols: Vec::new(),
            stored_tickers: false,
            start_date: None,
            end_date: None,
            lookback_days: default_lookback_days(),
            window_days: default_window_days(),
            resume: default_resume(),
            rate_limit: RateLimitSettings::default(),
        }
    }
}

/// Token bucket settings shared by every extraction worker.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct RateLimitSettings {
    /// Requests per window; 0 disables throttling.
    #[serde(default = "default_max_requests")]
    pub max_requests: u32,
    /// Window length.
    #[serde(default = "default_window_secs")]
    pub window_secs: u64,
}

impl Default for RateLimitSettings {
    fn default() -> Self {
        Self {
            max_requests: default_max_requests(),
            window_secs: default_window_secs(),
        }
    }
}

impl SourceConfig {
    /// HTTP adapter settings.
    #[must_use]
    pub fn http_config(&self) -> HttpQuoteSourceConfig {
        HttpQuoteSourceConfig {
            base_url: self.base_url.clone(),
            interval: self.interval.clone(),
            user_agent: self.user_agent.clone(),
            request_timeout: Duration::from_secs(self.request_timeout_secs),
        }
    }

    /// Per-call extraction deadline.
    #[must_use]
    pub const fn call_timeout(&self) -> Duration {
        Duration::from_secs(self.call_timeout_secs)
    }

    /// Rate limiter settings.
    #[must_use]
    pub const fn rate_limit_config(&self) -> RateLimitConfig {
        RateLimitConfig {
            max_requests: self.rate_limit.max_requests,
            window: Duration::from_secs(self.rate_limit.window_secs),
        }
    }

    /// Length of one bar.
    ///
    /// # Errors
    ///
    /// Returns an error if `interval` is not `<n>m`, `<n>h`, `<n>d` or `<n>wk`.
    pub fn bar_interval(&self) -> Result<TimeDelta, ConfigError> {
        parse_interval(&self.interval).ok_or_else(|| {
            ConfigError::ValidationError(format!("source.interval '{}' is not recognized", self.interval))
        })
    }

    /// Ingestion range, resolved against `today` when dates are omitted.
    ///
    /// # Errors
    ///
    /// Returns an error if the start falls after the end.
    pub fn date_range(&self, today: NaiveDate) -> Result<DateRange, ConfigError> {
        let end = self.end_date.unwrap_or(today);
        let start = match self.start_date {
            Some(start) => start,
            None => end
                .checked_sub_days(Days::new(u64::from(self.lookback_days)))
                .unwrap_or(end),
        };
        DateRange::new(start, end).map_err(|e| ConfigError::ValidationError(format!("source dates: {e}")))
    }

    /// Work list request for this configuration.
    ///
    /// # Errors
    ///
    /// Returns an error if the date range is invalid.
    pub fn work_list_spec(&self, today: NaiveDate) -> Result<WorkListSpec, ConfigError> {
        Ok(WorkListSpec {
            symbols: self
                .symbols
                .iter()
                .filter(|s| !s.trim().is_empty())
                .map(Symbol::new)
                .collect(),
            range: self.date_range(today)?,
            window_days: self.window_days,
            resume_from_store: self.resume,
            include_stored_tickers: self.stored_tickers,
        })
    }
}

/// Parse `15m`, `1h`, `1d` or `1wk` into a duration.
pub(crate) fn parse_interval(value: &str) -> Option<TimeDelta> {
    let value = value.trim();
    let split = value.find(|c: char| !c.is_ascii_digit())?;
    let (amount, unit) = value.split_at(split);
    let amount: i64 = amount.parse().ok().filter(|n| *n > 0)?;
    match unit {
        "m" => TimeDelta::try_minutes(amount),
        "h" => TimeDelta::try_hours(amount),
        "d" => TimeDelta::try_days(amount),
        "wk" => TimeDelta::try_weeks(amount),
        _ => None,
    }
}

fn default_base_url() -> String {
    "https://query1.finance.yahoo.com".to_string()
}

fn default_interval() -> String {
    "1h".to_string()
}

fn default_user_agent() -> String {
    "Mozilla/5.0 (compatible; intraday-etl/0.1)".to_string()
}

const fn default_request_timeout() -> u64 {
    30
}

const fn default_call_timeout() -> u64 {
    45
}

const fn default_lookback_days() -> u32 {
    7
}

const fn default_window_days() -> u32 {
    7
}

const fn default_resume() -> bool {
    true
}

const fn default_max_requests() -> u32 {
    60
}

const fn default_window_secs() -> u64 {
    60
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn parses_supported_intervals() {
        assert_eq!(parse_interval("15m"), Some(TimeDelta::minutes(15)));
        assert_eq!(parse_interval("1h"), Some(TimeDelta::hours(1)));
        assert_eq!(parse_interval("1d"), Some(TimeDelta::days(1)));
        assert_eq!(parse_interval("1wk"), Some(TimeDelta::weeks(1)));
        assert_eq!(parse_interval("0h"), None);
        assert_eq!(parse_interval("h"), None);
        assert_eq!(parse_interval("5y"), None);
    }

    #[test]
    fn missing_dates_resolve_from_today() {
        let today = NaiveDate::from_ymd_opt(2024, 3, 15).unwrap();
        let range = SourceConfig::default().date_range(today).unwrap();
        assert_eq!(range.start(), NaiveDate::from_ymd_opt(2024, 3, 8).unwrap());
        assert_eq!(range.end(), today);
    }
}
