//! Chart API response types.

use serde::Deserialize;

/// Top-level response envelope.
#[derive(Debug, Deserialize)]
pub struct ChartResponse {
    /// Chart payload.
    pub chart: Chart,
}

/// Result list or error.
#[derive(Debug, Deserialize)]
pub struct Chart {
    /// Results; `null` on error.
    #[serde(default)]
    pub result: Option<Vec<ChartResult>>,
    /// Error; `null` on success.
    #[serde(default)]
    pub error: Option<ChartError>,
}

/// API-level error object.
#[derive(Debug, Deserialize)]
pub struct ChartError {
    /// Short code, e.g. `Not Found`.
    pub code: String,
    /// Human-readable description.
    #[serde(default)]
    pub description: String,
}

/// Series for one symbol.
#[derive(Debug, Deserialize)]
pub struct ChartResult {
    /// Series metadata.
    pub meta: ChartMeta,
    /// Bar start times in Unix seconds; absent when there are no bars.
    #[serde(default)]
    pub timestamp: Vec<i64>,
    /// Value arrays.
    pub indicators: Indicators,
}

/// Series metadata.
#[derive(Debug, Deserialize)]
pub struct ChartMeta {
    /// Symbol the series belongs to.
    pub symbol: String,
}

/// Indicator groups.
#[derive(Debug, Deserialize)]
pub struct Indicators {
    /// OHLCV arrays; one element in practice.
    #[serde(default)]
    pub quote: Vec<QuoteArrays>,
}

/// Parallel OHLCV arrays, index-aligned with `timestamp`.
#[derive(Debug, Default, Deserialize)]
pub struct QuoteArrays {
    /// Opening prices.
    #[serde(default)]
    pub open: Vec<Option<f64>>,
    /// Highest prices.
    #[serde(default)]
    pub high: Vec<Option<f64>>,
    /// Lowest prices.
    #[serde(default)]
    pub low: Vec<Option<f64>>,
    /// Closing prices.
    #[serde(default)]
    pub close: Vec<Option<f64>>,
    /// Volumes.
    #[serde(default)]
    pub volume: Vec<Option<f64>>,
}
