//! Market-data CSV replay input.
//!
//! Row format: `timestamp, symbol, price, volume` with a timestamp of
//! `YYYY-MM-DD HH:MM:SS[.fractional]` (up to nine fractional digits;
//! none means zero). Header lines starting with `timestamp` or `symbol`
//! are skipped. Malformed rows surface as `FeedError` at this boundary;
//! the matching core never sees them.

use crate::execution::MarketSnapshot;
use chrono::NaiveDateTime;
use std::fs;
use std::path::Path;
use thiserror::Error;

/// Market-data parse failure.
#[derive(Debug, Error)]
pub enum FeedError {
    /// Row did not have the four required columns.
    #[error("line {line}: expected 4 columns, got {got}")]
    ColumnCount {
        /// One-based line number.
        line: usize,
        /// Columns found.
        got: usize,
    },
    /// A field failed to parse.
    #[error("line {line}: bad {field}: {value}")]
    BadField {
        /// One-based line number.
        line: usize,
        /// Column name.
        field: &'static str,
        /// Offending value.
        value: String,
    },
    /// Underlying I/O failure.
    #[error("I/O error: {0}")]
    Io(#[from] std::io::Error),
}

/// One replayed market-data row.
#[derive(Debug, Clone, PartialEq)]
pub struct MarketTick {
    /// Nanoseconds since the Unix epoch.
    pub timestamp_ns: u64,
    /// Symbol.
    pub symbol: String,
    /// Trade price.
    pub price: f64,
    /// Trade volume.
    pub volume: u64,
}

impl MarketTick {
    /// Converts to the scheduler-facing snapshot form (price-only).
    #[must_use]
    pub fn to_snapshot(&self) -> MarketSnapshot {
        let mut data = MarketSnapshot::from_price(self.price, self.volume, self.timestamp_ns);
        data.symbol = self.symbol.clone();
        data
    }
}

fn parse_timestamp_ns(value: &str, line: usize) -> Result<u64, FeedError> {
    let parsed = NaiveDateTime::parse_from_str(value.trim(), "%Y-%m-%d %H:%M:%S%.f")
        .map_err(|_| FeedError::BadField {
            line,
            field: "timestamp",
            value: value.to_string(),
        })?;
    let secs = parsed.and_utc().timestamp();
    let nanos = parsed.and_utc().timestamp_subsec_nanos();
    if secs < 0 {
        return Err(FeedError::BadField {
            line,
            field: "timestamp",
            value: value.to_string(),
        });
    }
    Ok(secs as u64 * 1_000_000_000 + u64::from(nanos))
}

/// Parses one data row (header rows must be filtered by the caller).
pub fn parse_row(row: &str, line: usize) -> Result<MarketTick, FeedError> {
    let cols: Vec<&str> = row.split(',').map(str::trim).collect();
    if cols.len() != 4 {
        return Err(FeedError::ColumnCount {
            line,
            got: cols.len(),
        });
    }
    let price: f64 = cols[2].parse().map_err(|_| FeedError::BadField {
        line,
        field: "price",
        value: cols[2].to_string(),
    })?;
    if !(price > 0.0 && price.is_finite()) {
        return Err(FeedError::BadField {
            line,
            field: "price",
            value: cols[2].to_string(),
        });
    }
    let volume: u64 = cols[3].parse().map_err(|_| FeedError::BadField {
        line,
        field: "volume",
        value: cols[3].to_string(),
    })?;
    Ok(MarketTick {
        timestamp_ns: parse_timestamp_ns(cols[0], line)?,
        symbol: cols[1].to_string(),
        price,
        volume,
    })
}

/// Parses a whole CSV document, skipping blank lines and header lines
/// beginning with `timestamp` or `symbol`.
pub fn parse_csv(text: &str) -> Result<Vec<MarketTick>, FeedError> {
    let mut ticks = Vec::new();
    for (idx, row) in text.lines().enumerate() {
        let trimmed = row.trim();
        if trimmed.is_empty()
            || trimmed.starts_with("timestamp")
            || trimmed.starts_with("symbol")
        {
            continue;
        }
        ticks.push(parse_row(trimmed, idx + 1)?);
    }
    Ok(ticks)
}

/// Loads and parses a market-data CSV file.
pub fn load_csv(path: impl AsRef<Path>) -> Result<Vec<MarketTick>, FeedError> {
    let text = fs::read_to_string(path)?;
    parse_csv(&text)
}
