//! Transformer
//!
//! Validates raw bars one by one and converts the good ones to canonical
//! records. Bad bars are collected with a reason; they never stop the unit
//! and are never repaired.

use std::collections::HashSet;

use chrono::TimeDelta;
use rust_decimal::Decimal;
use rust_decimal::prelude::FromPrimitive;

use crate::domain::market_data::{CanonicalRecord, PriceField, RawRecord, RejectReason, RejectedRecord};
use crate::domain::shared::Symbol;
use crate::domain::work::UnitOfWork;

/// Decimal places kept for prices.
const PRICE_SCALE: u32 = 6;

/// 2^63: the first volume that no longer fits the store's INTEGER column.
const VOLUME_LIMIT: f64 = 9_223_372_036_854_775_808.0;

/// Result of transforming one unit.
#[derive(Debug, Clone, Default, PartialEq)]
pub struct TransformOutput {
    /// Validated records, in input order.
    pub records: Vec<CanonicalRecord>,
    /// Dropped records with reasons.
    pub rejected: Vec<RejectedRecord>,
}

impl TransformOutput {
    /// Share of input records that were rejected; zero for empty input.
    #[must_use]
    #[allow(clippy::cast_precision_loss)]
    pub fn rejection_ratio(&self) -> f64 {
        let total = self.records.len() + self.rejected.len();
        if total == 0 {
            return 0.0;
        }
        self.rejected.len() as f64 / total as f64
    }
}

/// Transform stage.
#[derive(Debug, Clone, Copy)]
pub struct Transformer {
    bar_interval: TimeDelta,
}

impl Transformer {
    /// Create a transformer for bars of the given length.
    #[must_use]
    pub const fn new(bar_interval: TimeDelta) -> Self {
        Self { bar_interval }
    }

    /// Validate and normalise `raw` for `unit`.
    #[must_use]
    pub fn transform(&self, unit: &UnitOfWork, raw: Vec<RawRecord>) -> TransformOutput {
        let mut output = TransformOutput::default();
        let mut seen = HashSet::new();

        for record in raw {
            match self.validate(unit, &record) {
                Ok(canonical) if !seen.insert(canonical.timestamp) => {
                    output.rejected.push(RejectedRecord {
                        raw: record,
                        reason: RejectReason::DuplicateTimestamp,
                    });
                }
                Ok(canonical) => output.records.push(canonical),
                Err(reason) => {
                    tracing::debug!(unit = %unit, reason = %reason, "record rejected");
                    output.rejected.push(RejectedRecord { raw: record, reason });
                }
            }
        }

        output
    }

    fn validate(&self, unit: &UnitOfWork, raw: &RawRecord) -> Result<CanonicalRecord, RejectReason> {
        let symbol = Symbol::new(raw.symbol.as_str());
        if symbol.is_empty() {
            return Err(RejectReason::EmptySymbol);
        }
        if &symbol != unit.symbol() {
            return Err(RejectReason::SymbolMismatch {
                expected: unit.symbol().to_string(),
                actual: symbol.to_string(),
            });
        }

        let timestamp = raw.timestamp.ok_or(RejectReason::MissingTimestamp)?;

        let open = price(raw.open, PriceField::Open)?;
        let high = price(raw.high, PriceField::High)?;
        let low = price(raw.low, PriceField::Low)?;
        let close = price(raw.close, PriceField::Close)?;
        let volume = volume(raw.volume)?;

        if low > high || open < low || open > high || close < low || close > high {
            return Err(RejectReason::InconsistentOhlc);
        }

        let date = timestamp.date_naive();
        if !unit.range().contains(date) {
            return Err(RejectReason::OutOfRange { date });
        }

        Ok(CanonicalRecord {
            symbol,
            timestamp,
            interval_end: timestamp + self.bar_interval,
            open,
            high,
            low,
            close,
            volume,
        })
    }
}

fn finite_non_negative(value: Option<f64>, field: PriceField) -> Result<f64, RejectReason> {
    let value = value.ok_or(RejectReason::MissingField { field })?;
    if !value.is_finite() {
        return Err(RejectReason::NonFinite { field });
    }
    if value < 0.0 {
        return Err(RejectReason::Negative { field });
    }
    Ok(value)
}

fn price(value: Option<f64>, field: PriceField) -> Result<Decimal, RejectReason> {
    let value = finite_non_negative(value, field)?;
    Decimal::from_f64(value)
        .map(|d| d.round_dp(PRICE_SCALE).normalize())
        .ok_or(RejectReason::NonFinite { field })
}

fn volume(value: Option<f64>) -> Result<u64, RejectReason> {
    let value = finite_non_negative(value, PriceField::Volume)?.round();
    if value >= VOLUME_LIMIT {
        return Err(RejectReason::VolumeOutOfRange);
    }
    #[allow(clippy::cast_possible_truncation, clippy::cast_sign_loss)]
    Ok(value as u64)
}

#[cfg(test)]
mod tests {
    use chrono::{DateTime, NaiveDate, TimeZone, Utc};
    use rust_decimal_macros::dec;

    use super::*;
    use crate::domain::shared::DateRange;

    fn unit() -> UnitOfWork {
        let range = DateRange::new(
            NaiveDate::from_ymd_opt(2024, 1, 2).unwrap(),
            NaiveDate::from_ymd_opt(2024, 1, 3).unwrap(),
        )
        .unwrap();
        UnitOfWork::new(Symbol::new("AAPL"), range)
    }

    fn ts(day: u32, hour: u32) -> DateTime<Utc> {
        Utc.with_ymd_and_hms(2024, 1, day, hour, 30, 0).unwrap()
    }

    fn transformer() -> Transformer {
        Transformer::new(TimeDelta::hours(1))
    }

    fn reasons(output: &TransformOutput) -> Vec<RejectReason> {
        output.rejected.iter().map(|r| r.reason.clone()).collect()
    }

    #[test]
    fn flat_bar_with_zero_volume_is_valid() {
        let raw = RawRecord::bar("AAPL", ts(2, 14), 100.0, 100.0, 100.0, 100.0, 0.0);
        let output = transformer().transform(&unit(), vec![raw]);

        assert!(output.rejected.is_empty());
        let record = &output.records[0];
        assert_eq!(record.open, dec!(100));
        assert_eq!(record.volume, 0);
        assert_eq!(record.interval_end, ts(2, 15));
    }

    #[test]
    fn high_below_low_is_rejected_not_clamped() {
        let raw = RawRecord::bar("AAPL", ts(2, 14), 10.0, 9.0, 11.0, 10.0, 100.0);
        let output = transformer().transform(&unit(), vec![raw]);

        assert!(output.records.is_empty());
        assert_eq!(reasons(&output), vec![RejectReason::InconsistentOhlc]);
    }

    #[test]
    fn close_outside_range_is_rejected() {
        let raw = RawRecord::bar("AAPL", ts(2, 14), 10.0, 11.0, 9.0, 11.5, 100.0);
        let output = transformer().transform(&unit(), vec![raw]);
        assert_eq!(reasons(&output), vec![RejectReason::InconsistentOhlc]);
    }

    #[test]
    fn missing_and_non_finite_fields_are_named() {
        let mut missing = RawRecord::bar("AAPL", ts(2, 14), 1.0, 1.0, 1.0, 1.0, 1.0);
        missing.close = None;
        let mut nan = RawRecord::bar("AAPL", ts(2, 15), 1.0, 1.0, 1.0, 1.0, 1.0);
        nan.high = Some(f64::NAN);
        let negative = RawRecord::bar("AAPL", ts(2, 16), 1.0, 1.0, 1.0, 1.0, -5.0);
        let mut no_ts = RawRecord::bar("AAPL", ts(2, 17), 1.0, 1.0, 1.0, 1.0, 1.0);
        no_ts.timestamp = None;

        let output = transformer().transform(&unit(), vec![missing, nan, negative, no_ts]);
        assert_eq!(
            reasons(&output),
            vec![
                RejectReason::MissingField {
                    field: PriceField::Close
                },
                RejectReason::NonFinite {
                    field: PriceField::High
                },
                RejectReason::Negative {
                    field: PriceField::Volume
                },
                RejectReason::MissingTimestamp,
            ]
        );
    }

    #[test]
    fn oversized_volume_is_rejected_not_saturated() {
        let good = RawRecord::bar("AAPL", ts(2, 14), 1.0, 1.0, 1.0, 1.0, 9_000_000_000_000_000_000.0);
        let huge = RawRecord::bar("AAPL", ts(2, 15), 1.0, 1.0, 1.0, 1.0, 1e19);
        let limit = RawRecord::bar("AAPL", ts(2, 16), 1.0, 1.0, 1.0, 1.0, VOLUME_LIMIT);

        let output = transformer().transform(&unit(), vec![good, huge, limit]);
        assert_eq!(output.records.len(), 1);
        assert_eq!(output.records[0].volume, 9_000_000_000_000_000_000);
        assert_eq!(
            reasons(&output),
            vec![RejectReason::VolumeOutOfRange, RejectReason::VolumeOutOfRange]
        );
    }

    #[test]
    fn symbol_checks() {
        let blank = RawRecord::bar("  ", ts(2, 14), 1.0, 1.0, 1.0, 1.0, 1.0);
        let other = RawRecord::bar("msft", ts(2, 15), 1.0, 1.0, 1.0, 1.0, 1.0);
        let lowercase = RawRecord::bar("aapl", ts(2, 16), 1.0, 1.0, 1.0, 1.0, 1.0);

        let output = transformer().transform(&unit(), vec![blank, other, lowercase]);
        assert_eq!(output.records.len(), 1);
        assert_eq!(output.records[0].symbol.as_str(), "AAPL");
        assert_eq!(
            reasons(&output),
            vec![
                RejectReason::EmptySymbol,
                RejectReason::SymbolMismatch {
                    expected: "AAPL".to_string(),
                    actual: "MSFT".to_string()
                },
            ]
        );
    }

    #[test]
    fn dates_outside_unit_are_rejected() {
        let raw = RawRecord::bar("AAPL", ts(5, 14), 1.0, 1.0, 1.0, 1.0, 1.0);
        let output = transformer().transform(&unit(), vec![raw]);
        assert_eq!(
            reasons(&output),
            vec![RejectReason::OutOfRange {
                date: NaiveDate::from_ymd_opt(2024, 1, 5).unwrap()
            }]
        );
    }

    #[test]
    fn first_duplicate_wins() {
        let first = RawRecord::bar("AAPL", ts(3, 14), 1.0, 2.0, 1.0, 2.0, 10.0);
        let second = RawRecord::bar("AAPL", ts(3, 14), 5.0, 5.0, 5.0, 5.0, 10.0);
        let output = transformer().transform(&unit(), vec![first, second]);

        assert_eq!(output.records.len(), 1);
        assert_eq!(output.records[0].close, dec!(2));
        assert_eq!(reasons(&output), vec![RejectReason::DuplicateTimestamp]);
    }

    #[test]
    fn rejection_ratio() {
        let good = RawRecord::bar("AAPL", ts(2, 14), 1.0, 1.0, 1.0, 1.0, 1.0);
        let bad = RawRecord::bar("AAPL", ts(2, 15), 1.0, 0.5, 1.0, 1.0, 1.0);
        let output = transformer().transform(&unit(), vec![good, bad]);
        assert!((output.rejection_ratio() - 0.5).abs() < f64::EPSILON);
        assert!(TransformOutput::default().rejection_ratio().abs() < f64::EPSILON);
    }

    #[test]
    fn prices_are_rounded_to_six_places() {
        let raw = RawRecord::bar("AAPL", ts(2, 14), 187.150_001_525_878_9, 188.0, 187.0, 187.5, 1.0);
        let output = transformer().transform(&unit(), vec![raw]);
        assert_eq!(output.records[0].open, dec!(187.150002));
    }
}
