//! Record types held by the report cache.
//!
//! These are the aggregates the rest of the pipeline reads and writes:
//! point-in-time company snapshots, rebased price performance series, and
//! news items. The derived metrics panel lives in `hobart-metrics`; the
//! cache stores it as an opaque JSON blob.

use chrono::{DateTime, NaiveDate, Utc};
use serde::{Deserialize, Serialize};

use crate::error::{DataError, Result};

/// Analyst rating counts from the consensus endpoint.
#[derive(Debug, Clone, Default, PartialEq, Eq, Serialize, Deserialize)]
#[serde(default, rename_all = "camelCase")]
pub struct AnalystRatings {
    /// Strong buy count
    pub strong_buy: u32,
    /// Buy count
    pub buy: u32,
    /// Hold count
    pub hold: u32,
    /// Sell count
    pub sell: u32,
    /// Strong sell count
    pub strong_sell: u32,
}

impl AnalystRatings {
    /// Total number of ratings across all buckets.
    pub const fn total(&self) -> u32 {
        self.strong_buy + self.buy + self.hold + self.sell + self.strong_sell
    }
}

/// Point-in-time market facts for a ticker as of a date.
///
/// Identity is `(ticker, as_of_date)`. A snapshot is written once per date
/// and never mutated in place; a new date creates a new record.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct CompanySnapshot {
    /// Stock symbol
    pub ticker: String,
    /// Snapshot date
    pub as_of_date: NaiveDate,
    /// Shares outstanding
    pub shares_outstanding: Option<f64>,
    /// Market capitalization in the listing currency
    pub market_cap: Option<f64>,
    /// Listing currency code
    pub currency: Option<String>,
    /// FX rate to the reporting currency (1.0 for same-currency listings)
    pub fx_rate: f64,
    /// Free float as a percentage of shares outstanding
    pub free_float_pct: Option<f64>,
    /// 3-month average daily volume in shares
    pub avg_daily_volume_3m_shares: Option<f64>,
    /// 3-month average daily volume in currency
    pub avg_daily_volume_3m_ccy: Option<f64>,
    /// 90-day realized volatility (stdev of daily returns, in percent)
    pub volatility_90d: Option<f64>,
    /// 52-week high
    pub week52_high: Option<f64>,
    /// 52-week low
    pub week52_low: Option<f64>,
    /// Primary listing venue
    pub primary_index_name: String,
    /// Analyst rating counts
    pub analyst_rating_counts: AnalystRatings,
    /// Consensus rating label (e.g. "Buy")
    pub consensus_rating: String,
    /// Number of covering analysts
    pub num_analysts: u32,
}

impl CompanySnapshot {
    /// Deterministic cache id for this record.
    pub fn cache_id(&self) -> String {
        format!("{}_{}", self.ticker, self.as_of_date)
    }

    /// Current price implied by market cap and shares outstanding, when
    /// both are present and positive.
    pub fn implied_price(&self) -> Option<f64> {
        match (self.market_cap, self.shares_outstanding) {
            (Some(mc), Some(sh)) if sh > 0.0 => Some(mc / sh),
            _ => None,
        }
    }
}

/// One observation in a rebased price series.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct PricePoint {
    /// Observation date
    pub date: NaiveDate,
    /// Closing price
    pub close: f64,
    /// Close rebased so the first observation equals 100
    pub rebased_close: f64,
}

/// Two parallel rebased series (subject ticker and benchmark index) over a
/// shared date range. Each series is rebased against its own first close.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct PricePerformanceSeries {
    /// Subject ticker
    pub ticker: String,
    /// Benchmark index symbol
    pub base_index: String,
    /// Range start date
    pub start_date: NaiveDate,
    /// Range end date
    pub end_date: NaiveDate,
    /// Subject series, oldest first
    pub stock_series: Vec<PricePoint>,
    /// Benchmark series, oldest first
    pub index_series: Vec<PricePoint>,
}

impl PricePerformanceSeries {
    /// Deterministic cache id for this record.
    pub fn cache_id(&self) -> String {
        format!("{}_{}_{}", self.ticker, self.start_date, self.end_date)
    }

    /// Total return of the subject series over the range, in percent.
    pub fn total_return_pct(&self) -> Option<f64> {
        let first = self.stock_series.first()?.close;
        let last = self.stock_series.last()?.close;
        (first > 0.0).then(|| (last - first) / first * 100.0)
    }
}

/// Rebase a close series so its first observation equals 100.
///
/// Observations are sorted by date; the earliest close is the 100 basis.
/// A missing or non-positive first close makes the whole series unusable.
pub fn rebase_closes(symbol: &str, mut closes: Vec<(NaiveDate, f64)>) -> Result<Vec<PricePoint>> {
    closes.sort_by_key(|(date, _)| *date);

    let first_close = match closes.first() {
        Some((_, close)) if *close > 0.0 => *close,
        Some(_) => {
            return Err(DataError::MissingData {
                symbol: symbol.to_string(),
                reason: "first close price is not positive".to_string(),
            });
        }
        None => {
            return Err(DataError::MissingData {
                symbol: symbol.to_string(),
                reason: "empty price history".to_string(),
            });
        }
    };

    Ok(closes
        .into_iter()
        .map(|(date, close)| PricePoint {
            date,
            close,
            rebased_close: close / first_close * 100.0,
        })
        .collect())
}

/// A single news article for a ticker.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct NewsItem {
    /// Article URL; identity key in the cache
    pub url: String,
    /// Ticker the article relates to
    pub ticker: String,
    /// Headline
    pub headline: String,
    /// Publishing outlet
    pub source: String,
    /// Publication timestamp
    pub published_at: DateTime<Utc>,
    /// Article summary
    pub summary: String,
}

#[cfg(test)]
mod tests {
    use super::*;
    use approx::assert_relative_eq;

    fn date(y: i32, m: u32, d: u32) -> NaiveDate {
        NaiveDate::from_ymd_opt(y, m, d).unwrap()
    }

    #[test]
    fn test_rebase_first_observation_is_100() {
        let closes = vec![
            (date(2024, 1, 3), 250.0),
            (date(2024, 1, 2), 200.0),
            (date(2024, 1, 4), 300.0),
        ];

        let rebased = rebase_closes("TSLA", closes).unwrap();

        // Sorted oldest first, first point rebased to exactly 100.
        assert_eq!(rebased[0].date, date(2024, 1, 2));
        assert_relative_eq!(rebased[0].rebased_close, 100.0);
        assert_relative_eq!(rebased[1].rebased_close, 125.0);
        assert_relative_eq!(rebased[2].rebased_close, 150.0);
    }

    #[test]
    fn test_rebase_empty_series() {
        let result = rebase_closes("TSLA", vec![]);
        assert!(matches!(result, Err(DataError::MissingData { .. })));
    }

    #[test]
    fn test_rebase_zero_first_close() {
        let closes = vec![(date(2024, 1, 2), 0.0), (date(2024, 1, 3), 10.0)];
        let result = rebase_closes("TSLA", closes);
        assert!(matches!(result, Err(DataError::MissingData { .. })));
    }

    #[test]
    fn test_total_return() {
        let series = PricePerformanceSeries {
            ticker: "TSLA".to_string(),
            base_index: "SPY".to_string(),
            start_date: date(2024, 1, 2),
            end_date: date(2024, 1, 4),
            stock_series: rebase_closes(
                "TSLA",
                vec![(date(2024, 1, 2), 200.0), (date(2024, 1, 4), 250.0)],
            )
            .unwrap(),
            index_series: vec![],
        };

        assert_relative_eq!(series.total_return_pct().unwrap(), 25.0);
        assert_eq!(series.cache_id(), "TSLA_2024-01-02_2024-01-04");
    }

    #[test]
    fn test_analyst_ratings_total() {
        let ratings = AnalystRatings {
            strong_buy: 10,
            buy: 20,
            hold: 5,
            sell: 2,
            strong_sell: 1,
        };
        assert_eq!(ratings.total(), 38);
    }

    #[test]
    fn test_snapshot_implied_price() {
        let snapshot = CompanySnapshot {
            ticker: "TSLA".to_string(),
            as_of_date: date(2025, 6, 30),
            shares_outstanding: Some(1_000.0),
            market_cap: Some(1_000_000.0),
            currency: Some("USD".to_string()),
            fx_rate: 1.0,
            free_float_pct: Some(85.0),
            avg_daily_volume_3m_shares: None,
            avg_daily_volume_3m_ccy: None,
            volatility_90d: None,
            week52_high: None,
            week52_low: None,
            primary_index_name: "NASDAQ".to_string(),
            analyst_rating_counts: AnalystRatings::default(),
            consensus_rating: String::new(),
            num_analysts: 0,
        };

        assert_relative_eq!(snapshot.implied_price().unwrap(), 1_000.0);
        assert_eq!(snapshot.cache_id(), "TSLA_2025-06-30");
    }
}
