//! The per-ticker report pipeline.
//!
//! Sequential and blocking by design: price performance, company snapshot,
//! key metrics with forecast years, then news. Every section checks the
//! cache through the completeness gate before touching the network, and
//! every fetched record is persisted before the run moves on. A section
//! that cannot be established degrades to `None` in the result; only the
//! key-metrics path is allowed to fail the run, since a report without a
//! panel is not worth rendering.

use chrono::{Days, NaiveDate, Utc};
use thiserror::Error;
use tracing::{info, warn};

use hobart_data::DataError;
use hobart_data::cache::{CompletenessPolicy, ReportCache};
use hobart_data::finnhub::NewsClient;
use hobart_data::fmp::FmpClient;
use hobart_data::records::{CompanySnapshot, NewsItem, PricePerformanceSeries};
use hobart_data::statements::{Periodicity, StatementSource};
use hobart_forecast::orchestrator::YearOutcome;
use hobart_forecast::{ChatClient, ForecastError, ForecastOrchestrator, NullCapability};
use hobart_metrics::{MarketContext, MetricsPanel, derive_panel};

use crate::config::Config;

/// Statement periods requested on a cold derivation.
const STATEMENT_WINDOW: usize = 3;

/// Days of news pulled per run.
const NEWS_LOOKBACK_DAYS: u64 = 30;

/// News items surfaced in the result.
const NEWS_LIMIT: usize = 20;

/// Errors that can fail a pipeline run.
#[derive(Debug, Error)]
pub enum PipelineError {
    /// Data layer error (fetch or store).
    #[error("Data error: {0}")]
    Data(#[from] DataError),

    /// Forecast orchestration error.
    #[error("Forecast error: {0}")]
    Forecast(#[from] ForecastError),

    /// Panel blob encode/decode error.
    #[error("Serialization error: {0}")]
    Serialization(#[from] serde_json::Error),
}

/// Per-run options.
#[derive(Debug, Clone)]
pub struct RunOptions {
    /// Price performance range start (default: today minus the configured
    /// lookback)
    pub start_date: Option<NaiveDate>,
    /// Price performance range end (default: today)
    pub end_date: Option<NaiveDate>,
    /// Snapshot date (default: today)
    pub as_of_date: Option<NaiveDate>,
    /// Read through the cache; disabling forces fresh fetches
    pub use_cache: bool,
    /// Regenerate forecast years even when cached
    pub force_forecasts: bool,
    /// Skip news collection
    pub skip_news: bool,
}

impl Default for RunOptions {
    fn default() -> Self {
        Self {
            start_date: None,
            end_date: None,
            as_of_date: None,
            use_cache: true,
            force_forecasts: false,
            skip_news: false,
        }
    }
}

/// Everything a run produced for one ticker.
#[derive(Debug)]
pub struct ReportData {
    /// Stock symbol
    pub ticker: String,
    /// Rebased price performance vs the benchmark
    pub price_performance: Option<PricePerformanceSeries>,
    /// Company snapshot as of the run date
    pub snapshot: Option<CompanySnapshot>,
    /// Metrics panel including forecast years
    pub panel: Option<MetricsPanel>,
    /// Latest actual fiscal year, when established
    pub latest_actual_year: Option<i32>,
    /// Forecast-year provenance for this run
    pub outcomes: Vec<YearOutcome>,
    /// Recent news, newest first
    pub news: Vec<NewsItem>,
}

/// The wired-up pipeline for one process.
pub struct Pipeline {
    config: Config,
    cache: ReportCache,
    fmp: FmpClient,
    news: Option<NewsClient>,
    chat: Option<ChatClient>,
    policy: CompletenessPolicy,
}

impl Pipeline {
    /// Construct the pipeline from configuration.
    pub fn new(config: &Config) -> Result<Self, PipelineError> {
        let fmp = match &config.fmp_base_url {
            Some(base_url) => FmpClient::with_base_url(&config.fmp_api_key, base_url)?,
            None => FmpClient::new(&config.fmp_api_key)?,
        };

        let news = match &config.finnhub_api_key {
            Some(key) => Some(NewsClient::new(key)?),
            None => None,
        };

        let chat = match &config.openai_api_key {
            Some(key) => ChatClient::new(key, &config.model, config.temperature).ok(),
            None => None,
        };
        if chat.is_none() {
            info!("no chat capability configured; forecasts will carry forward");
        }

        Ok(Self {
            config: config.clone(),
            cache: ReportCache::new(&config.cache_path)?,
            fmp,
            news,
            chat,
            policy: CompletenessPolicy::default(),
        })
    }

    /// The underlying cache.
    pub const fn cache(&self) -> &ReportCache {
        &self.cache
    }

    /// The chat capability, when configured.
    pub fn chat(&self) -> Option<&ChatClient> {
        self.chat.as_ref()
    }

    /// The statement source backing the pipeline.
    pub const fn statements(&self) -> &FmpClient {
        &self.fmp
    }

    /// Run the full pipeline for one ticker.
    pub fn run(&self, ticker: &str, options: &RunOptions) -> Result<ReportData, PipelineError> {
        let today = Utc::now().date_naive();
        let end_date = options.end_date.unwrap_or(today);
        let start_date = options.start_date.unwrap_or_else(|| {
            end_date
                .checked_sub_days(Days::new(self.config.lookback_days))
                .unwrap_or(end_date)
        });
        let as_of_date = options.as_of_date.unwrap_or(today);

        let price_performance =
            self.ensure_price_performance(ticker, start_date, end_date, options);
        let snapshot = self.ensure_company_snapshot(ticker, as_of_date, options);

        let (panel, latest_actual_year, outcomes) =
            match self.ensure_key_metrics(ticker, snapshot.as_ref(), options) {
                Ok((panel, latest, outcomes)) => (Some(panel), latest, outcomes),
                Err(e) => {
                    warn!(ticker, error = %e, "key metrics unavailable");
                    (None, None, Vec::new())
                }
            };

        let news = if options.skip_news {
            Vec::new()
        } else {
            self.collect_news(ticker, end_date)
        };

        Ok(ReportData {
            ticker: ticker.to_string(),
            price_performance,
            snapshot,
            panel,
            latest_actual_year,
            outcomes,
            news,
        })
    }

    /// Cache-gated price performance: reuse a complete cached series,
    /// otherwise fetch, rebase and persist.
    fn ensure_price_performance(
        &self,
        ticker: &str,
        start_date: NaiveDate,
        end_date: NaiveDate,
        options: &RunOptions,
    ) -> Option<PricePerformanceSeries> {
        if options.use_cache {
            match self.cache.get_price_performance(ticker, start_date, end_date) {
                Ok(Some(series)) if self.policy.series_is_complete(&series) => {
                    info!(ticker, "using cached price performance");
                    return Some(series);
                }
                Ok(_) => {}
                Err(e) => warn!(ticker, error = %e, "price performance cache read failed"),
            }
        }

        match self.fmp.fetch_price_performance(
            ticker,
            &self.config.base_index,
            start_date,
            end_date,
        ) {
            Ok(series) => match self.cache.put_price_performance(&series) {
                Ok(()) => Some(series),
                // A write failure fails the step; the fetched series must
                // not pass as a persisted success.
                Err(e) => {
                    warn!(ticker, error = %e, "price performance not persisted");
                    None
                }
            },
            Err(e) => {
                warn!(ticker, error = %e, "price performance fetch failed");
                None
            }
        }
    }

    /// Cache-gated company snapshot for the run date.
    fn ensure_company_snapshot(
        &self,
        ticker: &str,
        as_of_date: NaiveDate,
        options: &RunOptions,
    ) -> Option<CompanySnapshot> {
        if options.use_cache {
            match self.cache.get_company_snapshot(ticker, as_of_date) {
                Ok(Some(snapshot)) if self.policy.snapshot_is_complete(&snapshot) => {
                    info!(ticker, "using cached company snapshot");
                    return Some(snapshot);
                }
                Ok(_) => {}
                Err(e) => warn!(ticker, error = %e, "snapshot cache read failed"),
            }
        }

        match self.fmp.fetch_company_snapshot(ticker, as_of_date) {
            Ok(snapshot) => match self.cache.put_company_snapshot(&snapshot) {
                Ok(()) => Some(snapshot),
                Err(e) => {
                    warn!(ticker, error = %e, "snapshot not persisted");
                    None
                }
            },
            Err(e) => {
                warn!(ticker, error = %e, "snapshot fetch failed");
                None
            }
        }
    }

    /// Cache-gated key metrics plus forecast orchestration.
    ///
    /// A cached complete panel skips the derivation fetch entirely; the
    /// forecast step still re-validates the latest actual year against a
    /// fresh statement fetch on every run.
    fn ensure_key_metrics(
        &self,
        ticker: &str,
        snapshot: Option<&CompanySnapshot>,
        options: &RunOptions,
    ) -> Result<(MetricsPanel, Option<i32>, Vec<YearOutcome>), PipelineError> {
        let cached_panel = if options.use_cache {
            self.cache
                .get_key_metrics(ticker)?
                .filter(|record| self.policy.metrics_blob_is_complete(&record.metrics_json))
                .map(|record| {
                    MetricsPanel::from_store(&record.fiscal_year_end, &record.metrics_json)
                })
                .transpose()?
        } else {
            None
        };

        let panel = match cached_panel {
            Some(panel) => {
                info!(ticker, "using cached key metrics");
                panel
            }
            None => {
                info!(ticker, "deriving key metrics from statements");
                let bundle =
                    self.fmp
                        .fetch_statements(ticker, Periodicity::Annual, STATEMENT_WINDOW)?;
                let market = market_context(snapshot);
                let panel = derive_panel(&bundle, &market);
                if panel.is_empty() {
                    return Err(DataError::MissingData {
                        symbol: ticker.to_string(),
                        reason: "no derivable fiscal years in statements".to_string(),
                    }
                    .into());
                }
                // Persist the actuals before forecasting so a failed
                // forecast run still leaves a usable panel behind.
                self.cache
                    .put_key_metrics(ticker, &panel.fiscal_year_end, &panel.metrics_json()?)?;
                panel
            }
        };

        if panel.year_numbers().len() < 2 {
            warn!(ticker, "fewer than two actual years; skipping forecasts");
            let latest = panel.latest_year_number();
            return Ok((panel, latest, Vec::new()));
        }

        let run = match &self.chat {
            Some(chat) => ForecastOrchestrator::new(&self.fmp, chat, &self.cache)
                .with_horizon(self.config.horizon_years)
                .force_regenerate(options.force_forecasts)
                .ensure_forecast_years(ticker, panel)?,
            None => ForecastOrchestrator::new(&self.fmp, &NullCapability, &self.cache)
                .with_horizon(self.config.horizon_years)
                .force_regenerate(options.force_forecasts)
                .ensure_forecast_years(ticker, panel)?,
        };

        Ok((run.panel, Some(run.latest_actual_year), run.outcomes))
    }

    /// Best-effort news collection: fetch, persist, read back newest-first.
    fn collect_news(&self, ticker: &str, end_date: NaiveDate) -> Vec<NewsItem> {
        let Some(client) = &self.news else {
            return Vec::new();
        };

        let from = end_date
            .checked_sub_days(Days::new(NEWS_LOOKBACK_DAYS))
            .unwrap_or(end_date);

        match client.fetch_company_news(ticker, from, end_date, NEWS_LIMIT) {
            Ok(items) => {
                if let Err(e) = self.cache.put_news(&items) {
                    warn!(ticker, error = %e, "news not persisted");
                }
            }
            Err(e) => warn!(ticker, error = %e, "news fetch failed"),
        }

        self.cache.get_news(ticker, NEWS_LIMIT).unwrap_or_else(|e| {
            warn!(ticker, error = %e, "news cache read failed");
            Vec::new()
        })
    }
}

impl std::fmt::Debug for Pipeline {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("Pipeline")
            .field("cache_path", &self.config.cache_path)
            .field("base_index", &self.config.base_index)
            .field("has_news_client", &self.news.is_some())
            .field("has_chat_capability", &self.chat.is_some())
            .finish_non_exhaustive()
    }
}

/// Market inputs for derivation, taken from the freshest snapshot.
fn market_context(snapshot: Option<&CompanySnapshot>) -> MarketContext {
    snapshot.map_or_else(MarketContext::none, |snapshot| MarketContext {
        market_cap: snapshot.market_cap,
        shares_outstanding: snapshot.shares_outstanding,
        current_price: snapshot.implied_price(),
    })
}
