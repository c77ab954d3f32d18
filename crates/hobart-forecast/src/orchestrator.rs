//! The forecast orchestrator.
//!
//! For one ticker and one run: re-establish the latest actual fiscal year
//! from a fresh statement fetch, work out which future years need
//! forecasting, and resolve them in ascending order; each year's context
//! includes every previously resolved year. A capability failure for a
//! single year is absorbed by the deterministic carry-forward; a statement
//! failure or a store write failure is fatal to the run.

use thiserror::Error;
use tracing::{debug, info, warn};

use hobart_data::DataError;
use hobart_data::cache::ReportCache;
use hobart_data::records::{CompanySnapshot, PricePerformanceSeries};
use hobart_data::statements::{Periodicity, StatementSource};
use hobart_metrics::{MarketContext, MetricsPanel, derive_panel};

use crate::capability::{ForecastCapability, parse_forecast_response};
use crate::fallback::carry_forward;
use crate::prompt::build_forecast_prompt;

/// Default forecast horizon in years.
const DEFAULT_HORIZON_YEARS: u32 = 2;

/// Statement periods requested when re-establishing the latest actual year.
const STATEMENT_WINDOW: usize = 3;

/// Errors from a forecast run.
#[derive(Debug, Error)]
pub enum ForecastError {
    /// The statement source returned nothing usable; the latest actual
    /// year cannot be established and the run is fatal for this ticker.
    #[error("no usable statement data for {ticker}: {reason}")]
    NoData {
        /// Ticker of the failed run
        ticker: String,
        /// What went wrong upstream
        reason: String,
    },

    /// The panel could not be persisted. The in-memory result is not
    /// silently treated as a success; previously persisted years remain
    /// durable.
    #[error("failed to persist panel for {ticker}")]
    Persistence {
        /// Ticker of the failed run
        ticker: String,
        /// Store error
        #[source]
        source: DataError,
    },

    /// The panel blob could not be encoded for storage.
    #[error("panel serialization error: {0}")]
    Serialization(#[from] serde_json::Error),
}

/// How a forecast year was resolved in this run.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum ForecastSource {
    /// The year was already in the panel and was accepted as-is
    Cached,
    /// The capability produced a parseable forecast
    Generated,
    /// The deterministic carry-forward substituted for a failed call
    Fallback,
}

/// Per-year provenance for one run.
///
/// The persisted panel deliberately carries no provenance: a fallback
/// year is indistinguishable from a generated one downstream. Callers that
/// need to know (tests, diagnostics) read it from here instead.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct YearOutcome {
    /// Fiscal-year label
    pub year: String,
    /// How the year resolved
    pub source: ForecastSource,
}

/// Result of a forecast run.
#[derive(Debug, Clone, PartialEq)]
pub struct ForecastRun {
    /// The panel including every requested forecast year
    pub panel: MetricsPanel,
    /// Latest actual fiscal year per the fresh statement fetch
    pub latest_actual_year: i32,
    /// Provenance of each target year, ascending
    pub outcomes: Vec<YearOutcome>,
}

/// Orchestrates forecast-year resolution for a ticker.
pub struct ForecastOrchestrator<'a, S, C> {
    statements: &'a S,
    capability: &'a C,
    cache: &'a ReportCache,
    horizon_years: u32,
    force_regenerate: bool,
}

impl<'a, S, C> ForecastOrchestrator<'a, S, C>
where
    S: StatementSource,
    C: ForecastCapability,
{
    /// Create an orchestrator with the default two-year horizon.
    pub fn new(statements: &'a S, capability: &'a C, cache: &'a ReportCache) -> Self {
        Self {
            statements,
            capability,
            cache,
            horizon_years: DEFAULT_HORIZON_YEARS,
            force_regenerate: false,
        }
    }

    /// Override the forecast horizon.
    #[must_use]
    pub const fn with_horizon(mut self, horizon_years: u32) -> Self {
        self.horizon_years = horizon_years;
        self
    }

    /// Regenerate target years even when the panel already has them.
    #[must_use]
    pub const fn force_regenerate(mut self, force: bool) -> Self {
        self.force_regenerate = force;
        self
    }

    /// Ensure every target forecast year is present in the panel.
    ///
    /// The latest actual year comes from a fresh statement fetch, never
    /// from the cached panel keys: a just-filed annual report can turn a
    /// cached "forecast" year into an actual one, and the fresher
    /// classification wins. The panel is persisted wholesale after each
    /// year resolves, so a crash mid-run leaves completed years durable.
    pub fn ensure_forecast_years(
        &self,
        ticker: &str,
        mut panel: MetricsPanel,
    ) -> Result<ForecastRun, ForecastError> {
        let bundle = self
            .statements
            .fetch_statements(ticker, Periodicity::Annual, STATEMENT_WINDOW)
            .map_err(|e| ForecastError::NoData {
                ticker: ticker.to_string(),
                reason: e.to_string(),
            })?;

        // Classification only: derived without market data, not merged
        // into the caller's panel.
        let fresh = derive_panel(&bundle, &MarketContext::none());
        let latest_actual = fresh.latest_year_number().ok_or_else(|| ForecastError::NoData {
            ticker: ticker.to_string(),
            reason: "no fiscal years in statement window".to_string(),
        })?;

        info!(ticker, latest_actual, "latest actual fiscal year established");

        // Prompt context is best-effort: a cold cache just means a leaner
        // prompt.
        let snapshot = self.context_snapshot(ticker);
        let prices = self.context_prices(ticker);

        let mut outcomes = Vec::with_capacity(self.horizon_years as usize);

        for offset in 1..=self.horizon_years {
            let year = latest_actual + offset as i32;
            let label = year.to_string();

            if !self.force_regenerate && panel.contains_year(&label) {
                debug!(ticker, year, "forecast year already cached");
                outcomes.push(YearOutcome {
                    year: label,
                    source: ForecastSource::Cached,
                });
                continue;
            }

            let prompt = build_forecast_prompt(
                ticker,
                &panel,
                latest_actual,
                year,
                snapshot.as_ref(),
                prices.as_ref(),
            );

            let (row, source) = match self
                .capability
                .complete(&prompt)
                .and_then(|reply| parse_forecast_response(&reply))
            {
                Ok(row) => {
                    info!(ticker, year, "forecast generated");
                    (row, ForecastSource::Generated)
                }
                Err(e) => {
                    warn!(ticker, year, error = %e, "capability failed, carrying forward");
                    let base = panel
                        .nearest_before(year)
                        .or_else(|| fresh.get(&latest_actual.to_string()))
                        .cloned()
                        .unwrap_or_default();
                    (carry_forward(&base), ForecastSource::Fallback)
                }
            };

            panel.insert(label.clone(), row);
            self.persist(ticker, &panel)?;
            outcomes.push(YearOutcome {
                year: label,
                source,
            });
        }

        Ok(ForecastRun {
            panel,
            latest_actual_year: latest_actual,
            outcomes,
        })
    }

    fn persist(&self, ticker: &str, panel: &MetricsPanel) -> Result<(), ForecastError> {
        let metrics_json = panel.metrics_json()?;
        self.cache
            .put_key_metrics(ticker, &panel.fiscal_year_end, &metrics_json)
            .map_err(|source| ForecastError::Persistence {
                ticker: ticker.to_string(),
                source,
            })
    }

    fn context_snapshot(&self, ticker: &str) -> Option<CompanySnapshot> {
        match self.cache.latest_company_snapshot(ticker) {
            Ok(snapshot) => snapshot,
            Err(e) => {
                warn!(ticker, error = %e, "snapshot unavailable for prompt context");
                None
            }
        }
    }

    fn context_prices(&self, ticker: &str) -> Option<PricePerformanceSeries> {
        match self.cache.latest_price_performance(ticker) {
            Ok(prices) => prices,
            Err(e) => {
                warn!(ticker, error = %e, "price series unavailable for prompt context");
                None
            }
        }
    }
}

impl<S, C> std::fmt::Debug for ForecastOrchestrator<'_, S, C> {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("ForecastOrchestrator")
            .field("horizon_years", &self.horizon_years)
            .field("force_regenerate", &self.force_regenerate)
            .finish_non_exhaustive()
    }
}
