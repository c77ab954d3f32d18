//! The assembled report payload.
//!
//! Presentation consumes exactly one value: everything the pipeline
//! produced for a ticker, merged. Sections are optional: a run that could
//! not establish some section still assembles, and the renderer decides
//! what to do with the gaps.

use chrono::{DateTime, Utc};
use serde::{Deserialize, Serialize};
use std::collections::BTreeMap;
use thiserror::Error;

use hobart_data::records::{CompanySnapshot, NewsItem, PricePerformanceSeries};
use hobart_metrics::{FiscalYearMetrics, MetricsPanel};

use crate::narrative::Narrative;

/// Errors that can occur during payload handling.
#[derive(Debug, Error)]
pub enum ReportError {
    /// Serialization error.
    #[error("Serialization error: {0}")]
    Serialization(#[from] serde_json::Error),

    /// IO error.
    #[error("IO error: {0}")]
    Io(#[from] std::io::Error),
}

/// The metrics panel with its run-time actual/forecast classification.
///
/// The split is computed when the payload is assembled, against the latest
/// actual year the forecast step established; it is never read back from
/// storage.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct MetricsSection {
    /// Fiscal year end month label
    pub fiscal_year_end: String,
    /// Latest actual fiscal year
    pub latest_actual_year: i32,
    /// Year labels classified as actual, ascending
    pub actual_years: Vec<String>,
    /// Year labels classified as forecast, ascending
    pub forecast_years: Vec<String>,
    /// Metric rows keyed by fiscal-year label
    pub metrics: BTreeMap<String, FiscalYearMetrics>,
}

impl MetricsSection {
    /// Classify a panel against the latest actual year.
    pub fn from_panel(panel: &MetricsPanel, latest_actual_year: i32) -> Self {
        Self {
            fiscal_year_end: panel.fiscal_year_end.clone(),
            latest_actual_year,
            actual_years: panel.actual_years(latest_actual_year),
            forecast_years: panel.forecast_years(latest_actual_year),
            metrics: panel.metrics.clone(),
        }
    }

    /// Year labels in presentation order: actuals then forecasts.
    pub fn ordered_years(&self) -> impl Iterator<Item = &String> {
        self.actual_years.iter().chain(self.forecast_years.iter())
    }
}

/// Everything the pipeline produced for one ticker, ready for rendering.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct ReportPayload {
    /// Stock symbol
    pub ticker: String,
    /// Company display name
    pub company_name: String,
    /// Payload assembly timestamp
    pub generated_at: DateTime<Utc>,
    /// Company snapshot, when available
    pub snapshot: Option<CompanySnapshot>,
    /// Price performance vs benchmark, when available
    pub price_performance: Option<PricePerformanceSeries>,
    /// Classified metrics panel, when available
    pub metrics: Option<MetricsSection>,
    /// Analyst narrative, when generated
    pub narrative: Option<Narrative>,
    /// Recent news, newest first
    pub news: Vec<NewsItem>,
}

impl ReportPayload {
    /// Serialize to pretty-printed JSON.
    pub fn to_json(&self) -> Result<String, ReportError> {
        Ok(serde_json::to_string_pretty(self)?)
    }
}

/// Builder for assembling a report payload.
#[derive(Debug, Default)]
pub struct PayloadBuilder {
    ticker: String,
    company_name: Option<String>,
    snapshot: Option<CompanySnapshot>,
    price_performance: Option<PricePerformanceSeries>,
    metrics: Option<MetricsSection>,
    narrative: Option<Narrative>,
    news: Vec<NewsItem>,
}

impl PayloadBuilder {
    /// Start a payload for a ticker.
    pub fn new(ticker: &str) -> Self {
        Self {
            ticker: ticker.to_string(),
            ..Default::default()
        }
    }

    /// Set the company display name (defaults to the ticker).
    #[must_use]
    pub fn company_name(mut self, name: &str) -> Self {
        self.company_name = Some(name.to_string());
        self
    }

    /// Attach the company snapshot.
    #[must_use]
    pub fn snapshot(mut self, snapshot: Option<CompanySnapshot>) -> Self {
        self.snapshot = snapshot;
        self
    }

    /// Attach the price performance series.
    #[must_use]
    pub fn price_performance(mut self, series: Option<PricePerformanceSeries>) -> Self {
        self.price_performance = series;
        self
    }

    /// Attach and classify the metrics panel.
    #[must_use]
    pub fn metrics(mut self, panel: Option<&MetricsPanel>, latest_actual_year: Option<i32>) -> Self {
        self.metrics = match (panel, latest_actual_year) {
            (Some(panel), Some(latest)) => Some(MetricsSection::from_panel(panel, latest)),
            _ => None,
        };
        self
    }

    /// Attach the analyst narrative.
    #[must_use]
    pub fn narrative(mut self, narrative: Option<Narrative>) -> Self {
        self.narrative = narrative;
        self
    }

    /// Attach recent news.
    #[must_use]
    pub fn news(mut self, news: Vec<NewsItem>) -> Self {
        self.news = news;
        self
    }

    /// Build the payload.
    pub fn build(self) -> ReportPayload {
        ReportPayload {
            company_name: self.company_name.unwrap_or_else(|| self.ticker.clone()),
            ticker: self.ticker,
            generated_at: Utc::now(),
            snapshot: self.snapshot,
            price_performance: self.price_performance,
            metrics: self.metrics,
            narrative: self.narrative,
            news: self.news,
        }
    }
}
