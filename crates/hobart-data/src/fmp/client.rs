//! HTTP client for the market-data provider.

use chrono::NaiveDate;
use serde::Deserialize;
use serde::de::DeserializeOwned;
use std::time::Duration;
use tracing::debug;

use crate::error::{DataError, Result};
use crate::records::{PricePerformanceSeries, PricePoint, rebase_closes};
use crate::statements::{
    BalanceSheet, CashFlowStatement, IncomeStatement, Periodicity, StatementBundle,
    StatementSource,
};

/// Default market-data API base URL.
const DEFAULT_BASE_URL: &str = "https://financialmodelingprep.com/stable";

/// Timeout applied to every request.
const REQUEST_TIMEOUT: Duration = Duration::from_secs(30);

/// Company profile fields used by the snapshot assembly.
#[derive(Debug, Clone, Default, Deserialize)]
#[serde(default, rename_all = "camelCase")]
pub(crate) struct FmpProfile {
    #[serde(alias = "marketCap")]
    pub(crate) mkt_cap: Option<f64>,
    pub(crate) currency: Option<String>,
    pub(crate) exchange_short_name: Option<String>,
    pub(crate) exchange: Option<String>,
    pub(crate) company_name: Option<String>,
}

/// Shares float fields.
#[derive(Debug, Clone, Default, Deserialize)]
#[serde(default, rename_all = "camelCase")]
pub(crate) struct FmpSharesFloat {
    pub(crate) shares_outstanding: Option<f64>,
    #[serde(alias = "freeFloatPercentage")]
    pub(crate) free_float: Option<f64>,
}

/// Quote fields.
#[derive(Debug, Clone, Default, Deserialize)]
#[serde(default, rename_all = "camelCase")]
pub(crate) struct FmpQuote {
    #[serde(alias = "fiftyTwoWeekHigh")]
    pub(crate) year_high: Option<f64>,
    #[serde(alias = "fiftyTwoWeekLow")]
    pub(crate) year_low: Option<f64>,
    pub(crate) avg_volume: Option<f64>,
    pub(crate) volume: Option<f64>,
    pub(crate) price: Option<f64>,
    pub(crate) previous_close: Option<f64>,
}

/// Analyst grades consensus fields.
#[derive(Debug, Clone, Default, Deserialize)]
#[serde(default, rename_all = "camelCase")]
pub(crate) struct FmpGradesConsensus {
    pub(crate) strong_buy: u32,
    pub(crate) buy: u32,
    pub(crate) hold: u32,
    pub(crate) sell: u32,
    pub(crate) strong_sell: u32,
    pub(crate) consensus: Option<String>,
    pub(crate) total: u32,
}

/// One end-of-day price bar.
#[derive(Debug, Clone, Default, Deserialize)]
#[serde(default, rename_all = "camelCase")]
pub struct HistoricalBar {
    /// Observation date (YYYY-MM-DD)
    pub date: String,
    /// Closing price
    pub close: f64,
    /// Traded volume
    pub volume: Option<f64>,
    /// Day-over-day change in percent, where the provider reports it
    pub change_percent: Option<f64>,
}

/// The price-history endpoint returns either a bare array or an object
/// wrapping it under an `historical` key.
#[derive(Debug, Deserialize)]
#[serde(untagged)]
enum HistoricalResponse {
    Wrapped {
        #[serde(default)]
        historical: Vec<HistoricalBar>,
    },
    Bare(Vec<HistoricalBar>),
}

impl HistoricalResponse {
    fn into_bars(self) -> Vec<HistoricalBar> {
        match self {
            Self::Wrapped { historical } => historical,
            Self::Bare(bars) => bars,
        }
    }
}

/// Blocking market-data API client.
pub struct FmpClient {
    client: reqwest::blocking::Client,
    base_url: String,
    api_key: String,
}

impl FmpClient {
    /// Create a new client against the default API base URL.
    pub fn new(api_key: &str) -> Result<Self> {
        Self::with_base_url(api_key, DEFAULT_BASE_URL)
    }

    /// Create a new client against a custom base URL (useful for testing).
    pub fn with_base_url(api_key: &str, base_url: &str) -> Result<Self> {
        let client = reqwest::blocking::Client::builder()
            .timeout(REQUEST_TIMEOUT)
            .build()
            .map_err(DataError::Network)?;

        Ok(Self {
            client,
            base_url: base_url.trim_end_matches('/').to_string(),
            api_key: api_key.to_string(),
        })
    }

    /// Issue a GET against `path` with the api key appended and decode the
    /// JSON body.
    fn get_json<T: DeserializeOwned>(&self, path: &str, params: &[(&str, String)]) -> Result<T> {
        let url = format!("{}/{}", self.base_url, path);
        let mut query: Vec<(&str, String)> = params.to_vec();
        query.push(("apikey", self.api_key.clone()));

        debug!(path, "market data request");

        let response = self
            .client
            .get(&url)
            .query(&query)
            .send()
            .map_err(DataError::Network)?;

        if !response.status().is_success() {
            return Err(DataError::Http(format!(
                "{} returned HTTP {}",
                path,
                response.status()
            )));
        }

        response.json().map_err(DataError::Network)
    }

    fn validate_symbol(symbol: &str) -> Result<()> {
        if symbol.is_empty() {
            return Err(DataError::InvalidSymbol("Empty symbol".to_string()));
        }
        Ok(())
    }

    /// Fetch the company profile, when the provider knows the ticker.
    pub(crate) fn fetch_profile(&self, ticker: &str) -> Result<Option<FmpProfile>> {
        Self::validate_symbol(ticker)?;
        let rows: Vec<FmpProfile> =
            self.get_json("profile", &[("symbol", ticker.to_string())])?;
        Ok(rows.into_iter().next())
    }

    /// Fetch the latest quote.
    pub(crate) fn fetch_quote(&self, ticker: &str) -> Result<Option<FmpQuote>> {
        Self::validate_symbol(ticker)?;
        let rows: Vec<FmpQuote> = self.get_json("quote", &[("symbol", ticker.to_string())])?;
        Ok(rows.into_iter().next())
    }

    /// Fetch shares outstanding and free float.
    pub(crate) fn fetch_shares_float(&self, ticker: &str) -> Result<Option<FmpSharesFloat>> {
        Self::validate_symbol(ticker)?;
        let rows: Vec<FmpSharesFloat> =
            self.get_json("shares-float", &[("symbol", ticker.to_string())])?;
        Ok(rows.into_iter().next())
    }

    /// Fetch the analyst grades consensus.
    pub(crate) fn fetch_grades_consensus(&self, ticker: &str) -> Result<Option<FmpGradesConsensus>> {
        Self::validate_symbol(ticker)?;
        let rows: Vec<FmpGradesConsensus> =
            self.get_json("grades-consensus", &[("symbol", ticker.to_string())])?;
        Ok(rows.into_iter().next())
    }

    /// Fetch end-of-day price history for a symbol over a date range.
    pub fn fetch_price_history(
        &self,
        symbol: &str,
        from: NaiveDate,
        to: NaiveDate,
    ) -> Result<Vec<HistoricalBar>> {
        Self::validate_symbol(symbol)?;
        if from > to {
            return Err(DataError::InvalidDateRange {
                start: from.to_string(),
                end: to.to_string(),
            });
        }

        let response: HistoricalResponse = self.get_json(
            "historical-price-eod/full",
            &[
                ("symbol", symbol.to_string()),
                ("from", from.to_string()),
                ("to", to.to_string()),
            ],
        )?;

        let mut bars = response.into_bars();
        if bars.is_empty() {
            return Err(DataError::MissingData {
                symbol: symbol.to_string(),
                reason: "empty price history".to_string(),
            });
        }

        // ISO dates sort correctly as strings.
        bars.sort_by(|a, b| a.date.cmp(&b.date));
        Ok(bars)
    }

    /// Fetch and rebase price performance for a ticker against a benchmark
    /// index over a shared date range.
    pub fn fetch_price_performance(
        &self,
        ticker: &str,
        base_index: &str,
        start_date: NaiveDate,
        end_date: NaiveDate,
    ) -> Result<PricePerformanceSeries> {
        let stock_series = self.fetch_rebased(ticker, start_date, end_date)?;
        let index_series = self.fetch_rebased(base_index, start_date, end_date)?;

        Ok(PricePerformanceSeries {
            ticker: ticker.to_string(),
            base_index: base_index.to_string(),
            start_date,
            end_date,
            stock_series,
            index_series,
        })
    }

    fn fetch_rebased(
        &self,
        symbol: &str,
        from: NaiveDate,
        to: NaiveDate,
    ) -> Result<Vec<PricePoint>> {
        let bars = self.fetch_price_history(symbol, from, to)?;
        let closes = bars
            .iter()
            .map(|bar| {
                let date = NaiveDate::parse_from_str(&bar.date, "%Y-%m-%d").map_err(|e| {
                    DataError::Parse(format!("bad bar date {:?}: {}", bar.date, e))
                })?;
                Ok((date, bar.close))
            })
            .collect::<Result<Vec<_>>>()?;
        rebase_closes(symbol, closes)
    }
}

impl StatementSource for FmpClient {
    fn fetch_statements(
        &self,
        ticker: &str,
        periodicity: Periodicity,
        limit: usize,
    ) -> Result<StatementBundle> {
        Self::validate_symbol(ticker)?;
        let params = [
            ("symbol", ticker.to_string()),
            ("period", periodicity.as_query_str().to_string()),
            ("limit", limit.to_string()),
        ];

        let income: Vec<IncomeStatement> = self.get_json("income-statement", &params)?;
        let balance: Vec<BalanceSheet> = self.get_json("balance-sheet-statement", &params)?;
        let cash_flow: Vec<CashFlowStatement> = self.get_json("cash-flow-statement", &params)?;

        Ok(StatementBundle {
            income,
            balance,
            cash_flow,
        })
    }
}

impl std::fmt::Debug for FmpClient {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("FmpClient")
            .field("base_url", &self.base_url)
            .finish_non_exhaustive()
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_client_creation() {
        let client = FmpClient::new("test-key").unwrap();
        assert_eq!(client.base_url, DEFAULT_BASE_URL);
    }

    #[test]
    fn test_custom_base_url_trailing_slash() {
        let client = FmpClient::with_base_url("test-key", "http://localhost:9999/").unwrap();
        assert_eq!(client.base_url, "http://localhost:9999");
    }

    #[test]
    fn test_historical_response_shapes() {
        let wrapped = r#"{"symbol": "TSLA", "historical": [{"date": "2024-01-02", "close": 200.0}]}"#;
        let response: HistoricalResponse = serde_json::from_str(wrapped).unwrap();
        assert_eq!(response.into_bars().len(), 1);

        let bare = r#"[{"date": "2024-01-02", "close": 200.0}, {"date": "2024-01-03", "close": 201.0}]"#;
        let response: HistoricalResponse = serde_json::from_str(bare).unwrap();
        assert_eq!(response.into_bars().len(), 2);
    }

    #[test]
    fn test_profile_field_aliases() {
        let json = r#"{"mktCap": 1000000.0, "currency": "USD", "exchangeShortName": "NASDAQ"}"#;
        let profile: FmpProfile = serde_json::from_str(json).unwrap();
        assert_eq!(profile.mkt_cap, Some(1_000_000.0));

        let json = r#"{"marketCap": 2000000.0}"#;
        let profile: FmpProfile = serde_json::from_str(json).unwrap();
        assert_eq!(profile.mkt_cap, Some(2_000_000.0));
    }
}
