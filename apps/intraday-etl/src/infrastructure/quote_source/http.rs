//! HTTP quote source for chart-style JSON APIs.
//!
//! Issues `GET {base_url}/v8/finance/chart/{symbol}?period1=..&period2=..&interval=..`
//! and flattens the parallel value arrays into raw records. Missing values
//! stay `None`; validation happens in the transformer.

use std::time::Duration;

use async_trait::async_trait;
use chrono::{DateTime, Days, NaiveDate, Utc};
use reqwest::Client;
use reqwest::header::RETRY_AFTER;

use super::api_types::ChartResponse;
use crate::application::ports::{QuoteSourcePort, SourceError};
use crate::domain::market_data::RawRecord;
use crate::domain::shared::Symbol;
use crate::resilience::parse_retry_after;

/// Longest response-body excerpt kept in error messages.
const MAX_ERROR_BODY: usize = 200;

/// Configuration for [`HttpQuoteSource`].
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct HttpQuoteSourceConfig {
    /// API root, without trailing slash.
    pub base_url: String,
    /// Bar interval in the API's notation (`1h`, `15m`, `1d`).
    pub interval: String,
    /// `User-Agent` header; the public endpoint rejects empty agents.
    pub user_agent: String,
    /// Transport-level timeout.
    pub request_timeout: Duration,
}

/// Quote source backed by an HTTP chart API.
#[derive(Debug, Clone)]
pub struct HttpQuoteSource {
    client: Client,
    config: HttpQuoteSourceConfig,
}

impl HttpQuoteSource {
    /// Create a new client.
    ///
    /// # Errors
    ///
    /// Returns an error if the HTTP client cannot be built.
    pub fn new(config: HttpQuoteSourceConfig) -> Result<Self, SourceError> {
        let client = Client::builder()
            .timeout(config.request_timeout)
            .user_agent(config.user_agent.clone())
            .build()
            .map_err(|e| SourceError::Network {
                message: e.to_string(),
            })?;
        Ok(Self { client, config })
    }

    fn url(&self, symbol: &Symbol) -> String {
        format!(
            "{}/v8/finance/chart/{}",
            self.config.base_url.trim_end_matches('/'),
            symbol
        )
    }
}

#[async_trait]
impl QuoteSourcePort for HttpQuoteSource {
    async fn fetch(
        &self,
        symbol: &Symbol,
        start: NaiveDate,
        end: NaiveDate,
    ) -> Result<Vec<RawRecord>, SourceError> {
        let period1 = start.and_hms_opt(0, 0, 0).map(|dt| dt.and_utc().timestamp());
        let period2 = end
            .checked_add_days(Days::new(1))
            .and_then(|d| d.and_hms_opt(0, 0, 0))
            .map(|dt| dt.and_utc().timestamp());
        let (Some(period1), Some(period2)) = (period1, period2) else {
            return Err(SourceError::Decode {
                message: format!("date range {start}..{end} cannot be expressed as Unix time"),
            });
        };

        let response = self
            .client
            .get(self.url(symbol))
            .query(&[
                ("period1", period1.to_string()),
                ("period2", period2.to_string()),
                ("interval", self.config.interval.clone()),
                ("includePrePost", "false".to_string()),
            ])
            .send()
            .await
            .map_err(map_transport_error)?;

        let status = response.status();
        if !status.is_success() {
            let retry_after = response
                .headers()
                .get(RETRY_AFTER)
                .and_then(|v| v.to_str().ok())
                .and_then(|v| parse_retry_after(v, Utc::now()));
            let body = response.text().await.unwrap_or_default();
            return Err(SourceError::Http {
                status: status.as_u16(),
                retry_after,
                message: excerpt(&body),
            });
        }

        let text = response.text().await.map_err(map_transport_error)?;
        let records = parse_chart(symbol, &text)?;
        tracing::debug!(symbol = %symbol, %start, %end, records = records.len(), "chart fetched");
        Ok(records)
    }
}

fn map_transport_error(e: reqwest::Error) -> SourceError {
    if e.is_timeout() {
        SourceError::Timeout
    } else if e.is_decode() {
        SourceError::Decode {
            message: e.to_string(),
        }
    } else {
        SourceError::Network {
            message: e.to_string(),
        }
    }
}

fn excerpt(body: &str) -> String {
    body.chars().take(MAX_ERROR_BODY).collect()
}

/// Flatten a chart response body into raw records.
pub(crate) fn parse_chart(symbol: &Symbol, body: &str) -> Result<Vec<RawRecord>, SourceError> {
    let response: ChartResponse = serde_json::from_str(body).map_err(|e| SourceError::Decode {
        message: e.to_string(),
    })?;

    if let Some(error) = response.chart.error {
        return Err(SourceError::Decode {
            message: format!("{}: {}", error.code, error.description),
        });
    }

    let Some(result) = response.chart.result.and_then(|r| r.into_iter().next()) else {
        return Ok(Vec::new());
    };

    let quote = result.indicators.quote.into_iter().next().unwrap_or_default();
    let len = result.timestamp.len();
    let aligned = [&quote.open, &quote.high, &quote.low, &quote.close, &quote.volume]
        .iter()
        .all(|series| series.is_empty() || series.len() == len);
    if !aligned {
        return Err(SourceError::Decode {
            message: format!("value arrays do not match {len} timestamps for {symbol}"),
        });
    }

    let reported = if result.meta.symbol.is_empty() {
        symbol.to_string()
    } else {
        result.meta.symbol
    };

    Ok(result
        .timestamp
        .iter()
        .enumerate()
        .map(|(i, &secs)| RawRecord {
            symbol: reported.clone(),
            timestamp: DateTime::from_timestamp(secs, 0),
            open: value_at(&quote.open, i),
            high: value_at(&quote.high, i),
            low: value_at(&quote.low, i),
            close: value_at(&quote.close, i),
            volume: value_at(&quote.volume, i),
        })
        .collect())
}

fn value_at(series: &[Option<f64>], i: usize) -> Option<f64> {
    series.get(i).copied().flatten()
}

#[cfg(test)]
mod tests {
    use chrono::TimeZone;

    use super::*;

    const BODY: &str = r#"{
        "chart": {
            "result": [{
                "meta": {"symbol": "AAPL", "currency": "USD"},
                "timestamp": [1704205800, 1704209400],
                "indicators": {"quote": [{
                    "open": [185.5, null],
                    "high": [186.0, 185.9],
                    "low": [185.0, 185.1],
                    "close": [185.75, 185.2],
                    "volume": [1200, 900]
                }]}
            }],
            "error": null
        }
    }"#;

    #[test]
    fn flattens_parallel_arrays() {
        let records = parse_chart(&Symbol::new("AAPL"), BODY).unwrap();
        assert_eq!(records.len(), 2);
        assert_eq!(
            records[0].timestamp,
            Some(Utc.with_ymd_and_hms(2024, 1, 2, 14, 30, 0).unwrap())
        );
        assert_eq!(records[0].volume, Some(1200.0));
        assert_eq!(records[1].open, None);
        assert_eq!(records[1].close, Some(185.2));
    }

    #[test]
    fn empty_result_has_no_records() {
        let body = r#"{"chart":{"result":[{"meta":{"symbol":"AAPL"},"indicators":{"quote":[{}]}}],"error":null}}"#;
        assert!(parse_chart(&Symbol::new("AAPL"), body).unwrap().is_empty());
    }

    #[test]
    fn api_error_is_decode_error() {
        let body = r#"{"chart":{"result":null,"error":{"code":"Not Found","description":"No data found"}}}"#;
        let err = parse_chart(&Symbol::new("ZZZZ"), body).unwrap_err();
        assert!(matches!(err, SourceError::Decode { ref message } if message.contains("Not Found")));
    }

    #[test]
    fn misaligned_arrays_are_rejected() {
        let body = r#"{"chart":{"result":[{"meta":{"symbol":"AAPL"},"timestamp":[1,2],
            "indicators":{"quote":[{"open":[1.0],"high":[1.0,1.0],"low":[1.0,1.0],"close":[1.0,1.0],"volume":[1,1]}]}}]}}"#;
        assert!(matches!(
            parse_chart(&Symbol::new("AAPL"), body),
            Err(SourceError::Decode { .. })
        ));
    }

    #[test]
    fn garbage_is_decode_error() {
        assert!(matches!(
            parse_chart(&Symbol::new("AAPL"), "<html>"),
            Err(SourceError::Decode { .. })
        ));
    }
}
