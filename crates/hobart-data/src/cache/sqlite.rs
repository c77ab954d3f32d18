//! SQLite caching layer for report data.
//!
//! The store is a keyed table set holding JSON blobs and flat snapshot
//! columns. Writes are upserts (`INSERT OR REPLACE`, last writer wins);
//! there is no TTL; staleness is the completeness gate's and the forecast
//! orchestrator's concern, not the store's. Single-writer-per-ticker usage
//! is assumed.

use chrono::{NaiveDate, Utc};
use rusqlite::{Connection, OptionalExtension, params};
use std::path::Path;
use tracing::info;

use crate::error::Result;
use crate::records::{
    AnalystRatings, CompanySnapshot, NewsItem, PricePerformanceSeries, PricePoint,
};

/// SQLite cache for report data.
#[derive(Debug)]
pub struct ReportCache {
    conn: Connection,
}

/// Stored key-metrics row: the panel blob plus its fiscal-year-end label.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct KeyMetricsRecord {
    /// Ticker the panel belongs to
    pub ticker: String,
    /// Fiscal year end month label (e.g. "Dec")
    pub fiscal_year_end: String,
    /// JSON object mapping fiscal-year labels to metric rows
    pub metrics_json: String,
}

impl ReportCache {
    /// Open (or create) a cache at the given path.
    pub fn new<P: AsRef<Path>>(path: P) -> Result<Self> {
        if let Some(parent) = path.as_ref().parent() {
            if !parent.as_os_str().is_empty() {
                std::fs::create_dir_all(parent)?;
            }
        }
        let conn = Connection::open(path)?;
        let cache = Self { conn };
        cache.initialize_schema()?;
        Ok(cache)
    }

    /// Create an in-memory cache (useful for testing).
    pub fn in_memory() -> Result<Self> {
        let conn = Connection::open_in_memory()?;
        let cache = Self { conn };
        cache.initialize_schema()?;
        Ok(cache)
    }

    /// Initialize the database schema.
    fn initialize_schema(&self) -> Result<()> {
        self.conn.execute(
            "CREATE TABLE IF NOT EXISTS price_performance (
                id TEXT PRIMARY KEY,
                ticker TEXT NOT NULL,
                base_index TEXT NOT NULL,
                start_date TEXT NOT NULL,
                end_date TEXT NOT NULL,
                stock_data TEXT NOT NULL,
                index_data TEXT NOT NULL,
                created_at TEXT NOT NULL
            )",
            [],
        )?;

        self.conn.execute(
            "CREATE TABLE IF NOT EXISTS company_data (
                id TEXT PRIMARY KEY,
                ticker TEXT NOT NULL,
                as_of_date TEXT NOT NULL,
                shares_outstanding REAL,
                market_cap REAL,
                currency TEXT,
                fx_rate REAL,
                free_float_pct REAL,
                avg_daily_volume_3m_shares REAL,
                avg_daily_volume_3m_ccy REAL,
                volatility_90d REAL,
                week52_high REAL,
                week52_low REAL,
                primary_index_name TEXT,
                analyst_rating_counts TEXT,
                consensus_rating TEXT,
                num_analysts INTEGER,
                created_at TEXT NOT NULL
            )",
            [],
        )?;

        self.conn.execute(
            "CREATE TABLE IF NOT EXISTS key_metrics (
                id TEXT PRIMARY KEY,
                ticker TEXT NOT NULL,
                fiscal_year_end TEXT,
                metrics_data TEXT NOT NULL,
                created_at TEXT NOT NULL
            )",
            [],
        )?;

        self.conn.execute(
            "CREATE TABLE IF NOT EXISTS news (
                url TEXT PRIMARY KEY,
                ticker TEXT NOT NULL,
                headline TEXT,
                source TEXT,
                published_at TEXT NOT NULL,
                summary TEXT,
                created_at TEXT NOT NULL
            )",
            [],
        )?;

        self.conn.execute(
            "CREATE INDEX IF NOT EXISTS idx_company_data_ticker
             ON company_data(ticker, as_of_date)",
            [],
        )?;

        self.conn.execute(
            "CREATE INDEX IF NOT EXISTS idx_news_ticker ON news(ticker, published_at)",
            [],
        )?;

        Ok(())
    }

    // --- price performance -------------------------------------------------

    /// Store a price performance series (replaces any record for the same
    /// ticker and date range).
    pub fn put_price_performance(&self, series: &PricePerformanceSeries) -> Result<()> {
        let stock_json = serde_json::to_string(&series.stock_series)?;
        let index_json = serde_json::to_string(&series.index_series)?;

        self.conn.execute(
            "INSERT OR REPLACE INTO price_performance
             (id, ticker, base_index, start_date, end_date, stock_data, index_data, created_at)
             VALUES (?1, ?2, ?3, ?4, ?5, ?6, ?7, ?8)",
            params![
                series.cache_id(),
                series.ticker,
                series.base_index,
                series.start_date.to_string(),
                series.end_date.to_string(),
                stock_json,
                index_json,
                Utc::now().to_rfc3339(),
            ],
        )?;

        Ok(())
    }

    /// Get the cached price performance series for an exact date range.
    pub fn get_price_performance(
        &self,
        ticker: &str,
        start_date: NaiveDate,
        end_date: NaiveDate,
    ) -> Result<Option<PricePerformanceSeries>> {
        let id = format!("{ticker}_{start_date}_{end_date}");
        let row = self
            .conn
            .query_row(
                "SELECT ticker, base_index, start_date, end_date, stock_data, index_data
                 FROM price_performance WHERE id = ?1",
                params![id],
                Self::map_price_performance_row,
            )
            .optional()?;

        row.map(Self::decode_price_performance).transpose()
    }

    /// Get the most recently ending price performance series for a ticker.
    pub fn latest_price_performance(
        &self,
        ticker: &str,
    ) -> Result<Option<PricePerformanceSeries>> {
        let row = self
            .conn
            .query_row(
                "SELECT ticker, base_index, start_date, end_date, stock_data, index_data
                 FROM price_performance WHERE ticker = ?1
                 ORDER BY end_date DESC LIMIT 1",
                params![ticker],
                Self::map_price_performance_row,
            )
            .optional()?;

        row.map(Self::decode_price_performance).transpose()
    }

    #[allow(clippy::type_complexity)]
    fn map_price_performance_row(
        row: &rusqlite::Row<'_>,
    ) -> rusqlite::Result<(String, String, String, String, String, String)> {
        Ok((
            row.get(0)?,
            row.get(1)?,
            row.get(2)?,
            row.get(3)?,
            row.get(4)?,
            row.get(5)?,
        ))
    }

    fn decode_price_performance(
        row: (String, String, String, String, String, String),
    ) -> Result<PricePerformanceSeries> {
        let (ticker, base_index, start, end, stock_json, index_json) = row;
        let stock_series: Vec<PricePoint> = serde_json::from_str(&stock_json)?;
        let index_series: Vec<PricePoint> = serde_json::from_str(&index_json)?;

        Ok(PricePerformanceSeries {
            ticker,
            base_index,
            start_date: parse_date(&start)?,
            end_date: parse_date(&end)?,
            stock_series,
            index_series,
        })
    }

    // --- company snapshots -------------------------------------------------

    /// Store a company snapshot. A snapshot is keyed by `(ticker, date)`;
    /// re-putting the same date replaces the record wholesale.
    pub fn put_company_snapshot(&self, snapshot: &CompanySnapshot) -> Result<()> {
        let ratings_json = serde_json::to_string(&snapshot.analyst_rating_counts)?;

        self.conn.execute(
            "INSERT OR REPLACE INTO company_data
             (id, ticker, as_of_date, shares_outstanding, market_cap, currency, fx_rate,
              free_float_pct, avg_daily_volume_3m_shares, avg_daily_volume_3m_ccy,
              volatility_90d, week52_high, week52_low, primary_index_name,
              analyst_rating_counts, consensus_rating, num_analysts, created_at)
             VALUES (?1, ?2, ?3, ?4, ?5, ?6, ?7, ?8, ?9, ?10, ?11, ?12, ?13, ?14, ?15, ?16, ?17, ?18)",
            params![
                snapshot.cache_id(),
                snapshot.ticker,
                snapshot.as_of_date.to_string(),
                snapshot.shares_outstanding,
                snapshot.market_cap,
                snapshot.currency,
                snapshot.fx_rate,
                snapshot.free_float_pct,
                snapshot.avg_daily_volume_3m_shares,
                snapshot.avg_daily_volume_3m_ccy,
                snapshot.volatility_90d,
                snapshot.week52_high,
                snapshot.week52_low,
                snapshot.primary_index_name,
                ratings_json,
                snapshot.consensus_rating,
                snapshot.num_analysts,
                Utc::now().to_rfc3339(),
            ],
        )?;

        Ok(())
    }

    /// Get the snapshot for a ticker on an exact date.
    pub fn get_company_snapshot(
        &self,
        ticker: &str,
        as_of_date: NaiveDate,
    ) -> Result<Option<CompanySnapshot>> {
        let id = format!("{ticker}_{as_of_date}");
        self.conn
            .query_row(
                &Self::snapshot_select("WHERE id = ?1"),
                params![id],
                Self::map_snapshot_row,
            )
            .optional()
            .map_err(Into::into)
    }

    /// Get the most recent snapshot for a ticker.
    pub fn latest_company_snapshot(&self, ticker: &str) -> Result<Option<CompanySnapshot>> {
        self.conn
            .query_row(
                &Self::snapshot_select("WHERE ticker = ?1 ORDER BY as_of_date DESC LIMIT 1"),
                params![ticker],
                Self::map_snapshot_row,
            )
            .optional()
            .map_err(Into::into)
    }

    fn snapshot_select(tail: &str) -> String {
        format!(
            "SELECT ticker, as_of_date, shares_outstanding, market_cap, currency, fx_rate,
                    free_float_pct, avg_daily_volume_3m_shares, avg_daily_volume_3m_ccy,
                    volatility_90d, week52_high, week52_low, primary_index_name,
                    analyst_rating_counts, consensus_rating, num_analysts
             FROM company_data {tail}"
        )
    }

    fn map_snapshot_row(row: &rusqlite::Row<'_>) -> rusqlite::Result<CompanySnapshot> {
        let as_of: String = row.get(1)?;
        let ratings_json: Option<String> = row.get(13)?;
        let ratings: AnalystRatings = ratings_json
            .as_deref()
            .and_then(|json| serde_json::from_str(json).ok())
            .unwrap_or_default();

        Ok(CompanySnapshot {
            ticker: row.get(0)?,
            as_of_date: NaiveDate::parse_from_str(&as_of, "%Y-%m-%d")
                .map_err(|e| rusqlite::Error::ToSqlConversionFailure(Box::new(e)))?,
            shares_outstanding: row.get(2)?,
            market_cap: row.get(3)?,
            currency: row.get(4)?,
            fx_rate: row.get::<_, Option<f64>>(5)?.unwrap_or(1.0),
            free_float_pct: row.get(6)?,
            avg_daily_volume_3m_shares: row.get(7)?,
            avg_daily_volume_3m_ccy: row.get(8)?,
            volatility_90d: row.get(9)?,
            week52_high: row.get(10)?,
            week52_low: row.get(11)?,
            primary_index_name: row.get::<_, Option<String>>(12)?.unwrap_or_default(),
            analyst_rating_counts: ratings,
            consensus_rating: row.get::<_, Option<String>>(14)?.unwrap_or_default(),
            num_analysts: row.get::<_, Option<u32>>(15)?.unwrap_or_default(),
        })
    }

    // --- key metrics -------------------------------------------------------

    /// Store the full metrics panel blob for a ticker. The panel is always
    /// written wholesale, never patched per year.
    pub fn put_key_metrics(
        &self,
        ticker: &str,
        fiscal_year_end: &str,
        metrics_json: &str,
    ) -> Result<()> {
        self.conn.execute(
            "INSERT OR REPLACE INTO key_metrics
             (id, ticker, fiscal_year_end, metrics_data, created_at)
             VALUES (?1, ?2, ?3, ?4, ?5)",
            params![
                format!("{ticker}_key_metrics"),
                ticker,
                fiscal_year_end,
                metrics_json,
                Utc::now().to_rfc3339(),
            ],
        )?;

        Ok(())
    }

    /// Get the stored metrics panel blob for a ticker.
    pub fn get_key_metrics(&self, ticker: &str) -> Result<Option<KeyMetricsRecord>> {
        let record = self
            .conn
            .query_row(
                "SELECT ticker, fiscal_year_end, metrics_data
                 FROM key_metrics WHERE id = ?1",
                params![format!("{ticker}_key_metrics")],
                |row| {
                    Ok(KeyMetricsRecord {
                        ticker: row.get(0)?,
                        fiscal_year_end: row
                            .get::<_, Option<String>>(1)?
                            .unwrap_or_else(|| "Dec".to_string()),
                        metrics_json: row.get(2)?,
                    })
                },
            )
            .optional()?;

        Ok(record)
    }

    // --- news --------------------------------------------------------------

    /// Store news items, deduplicated by URL.
    pub fn put_news(&self, items: &[NewsItem]) -> Result<()> {
        let tx = self.conn.unchecked_transaction()?;
        let created_at = Utc::now().to_rfc3339();

        for item in items {
            tx.execute(
                "INSERT OR REPLACE INTO news
                 (url, ticker, headline, source, published_at, summary, created_at)
                 VALUES (?1, ?2, ?3, ?4, ?5, ?6, ?7)",
                params![
                    item.url,
                    item.ticker,
                    item.headline,
                    item.source,
                    item.published_at.to_rfc3339(),
                    item.summary,
                    created_at,
                ],
            )?;
        }

        tx.commit()?;
        Ok(())
    }

    /// Get the most recent news items for a ticker.
    pub fn get_news(&self, ticker: &str, limit: usize) -> Result<Vec<NewsItem>> {
        let mut stmt = self.conn.prepare(
            "SELECT url, ticker, headline, source, published_at, summary
             FROM news WHERE ticker = ?1
             ORDER BY published_at DESC LIMIT ?2",
        )?;

        let rows = stmt.query_map(params![ticker, limit as i64], |row| {
            let published: String = row.get(4)?;
            Ok(NewsItem {
                url: row.get(0)?,
                ticker: row.get(1)?,
                headline: row.get::<_, Option<String>>(2)?.unwrap_or_default(),
                source: row.get::<_, Option<String>>(3)?.unwrap_or_default(),
                published_at: chrono::DateTime::parse_from_rfc3339(&published)
                    .map_err(|e| rusqlite::Error::ToSqlConversionFailure(Box::new(e)))?
                    .with_timezone(&Utc),
                summary: row.get::<_, Option<String>>(5)?.unwrap_or_default(),
            })
        })?;

        let mut items = Vec::new();
        for row in rows {
            items.push(row?);
        }

        Ok(items)
    }

    // --- maintenance -------------------------------------------------------

    /// Get cache statistics.
    pub fn stats(&self) -> Result<CacheStats> {
        let count = |table: &str| -> Result<usize> {
            let n: i64 = self
                .conn
                .query_row(&format!("SELECT COUNT(*) FROM {table}"), [], |row| {
                    row.get(0)
                })?;
            Ok(n as usize)
        };

        Ok(CacheStats {
            price_performance: count("price_performance")?,
            company_snapshots: count("company_data")?,
            metrics_panels: count("key_metrics")?,
            news_items: count("news")?,
        })
    }

    /// Clear all cached data for a specific ticker.
    pub fn clear_ticker(&self, ticker: &str) -> Result<()> {
        self.conn.execute(
            "DELETE FROM price_performance WHERE ticker = ?1",
            params![ticker],
        )?;
        self.conn
            .execute("DELETE FROM company_data WHERE ticker = ?1", params![ticker])?;
        self.conn
            .execute("DELETE FROM key_metrics WHERE ticker = ?1", params![ticker])?;
        self.conn
            .execute("DELETE FROM news WHERE ticker = ?1", params![ticker])?;
        info!(ticker, "cleared cached data");
        Ok(())
    }
}

fn parse_date(s: &str) -> Result<NaiveDate> {
    NaiveDate::parse_from_str(s, "%Y-%m-%d")
        .map_err(|e| crate::error::DataError::Parse(format!("bad stored date {s:?}: {e}")))
}

/// Cache statistics.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct CacheStats {
    /// Number of cached price performance series
    pub price_performance: usize,
    /// Number of cached company snapshots
    pub company_snapshots: usize,
    /// Number of cached metrics panels
    pub metrics_panels: usize,
    /// Number of cached news items
    pub news_items: usize,
}
