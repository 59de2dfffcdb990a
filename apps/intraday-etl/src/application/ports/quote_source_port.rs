//! Quote Source Port (Driven Port)
//!
//! Interface for fetching raw bars from a market-data provider.

use std::time::Duration;

use async_trait::async_trait;
use chrono::NaiveDate;

use crate::domain::failure::ErrorKind;
use crate::domain::market_data::RawRecord;
use crate::domain::shared::Symbol;

/// Quote source error.
#[derive(Debug, Clone, PartialEq, Eq, thiserror::Error)]
pub enum SourceError {
    /// Non-success HTTP status.
    #[error("Quote source returned HTTP {status}: {message}")]
    Http {
        /// Status code.
        status: u16,
        /// Parsed `Retry-After` header.
        retry_after: Option<Duration>,
        /// Response body excerpt.
        message: String,
    },

    /// Request exceeded its deadline.
    #[error("Quote source request timed out")]
    Timeout,

    /// Transport failure.
    #[error("Quote source network error: {message}")]
    Network {
        /// Error details.
        message: String,
    },

    /// Response body could not be decoded.
    #[error("Quote source response could not be decoded: {message}")]
    Decode {
        /// Error details.
        message: String,
    },
}

impl SourceError {
    /// Coarse error shape for classification.
    #[must_use]
    pub const fn error_kind(&self) -> ErrorKind {
        match self {
            Self::Http { status, .. } => ErrorKind::HttpStatus(*status),
            Self::Timeout => ErrorKind::Timeout,
            Self::Network { .. } => ErrorKind::Network,
            Self::Decode { .. } => ErrorKind::MalformedData,
        }
    }

    /// Server-provided wait hint, if any.
    #[must_use]
    pub const fn retry_after(&self) -> Option<Duration> {
        match self {
            Self::Http { retry_after, .. } => *retry_after,
            _ => None,
        }
    }
}

/// Port for pulling raw bars.
#[async_trait]
pub trait QuoteSourcePort: Send + Sync {
    /// Fetch all bars for `symbol` between `start` and `end` (inclusive).
    async fn fetch(
        &self,
        symbol: &Symbol,
        start: NaiveDate,
        end: NaiveDate,
    ) -> Result<Vec<RawRecord>, SourceError>;
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn http_error_exposes_status_and_hint() {
        let err = SourceError::Http {
            status: 429,
            retry_after: Some(Duration::from_secs(7)),
            message: "Too Many Requests".to_string(),
        };
        assert_eq!(err.error_kind(), ErrorKind::HttpStatus(429));
        assert_eq!(err.retry_after(), Some(Duration::from_secs(7)));
        assert_eq!(SourceError::Timeout.retry_after(), None);
    }
}
