//! The fiscal-year metrics panel.
//!
//! A panel maps 4-digit fiscal-year labels to derived metric rows. Whether
//! a year is *actual* or *forecast* is never stored; it is recomputed on
//! every run against the latest statement year from a fresh fetch, because
//! a newly filed annual report can turn what the cache thought was a
//! forecast year into an actual one.

use serde::{Deserialize, Serialize};
use std::collections::BTreeMap;

/// One fiscal year's derived metrics.
///
/// Serialized with camelCase keys; each key also accepts the snake_case
/// alias used by the historical cache format, so old blobs still decode.
/// Plain `f64` fields follow the zero-denominator policy (degenerate
/// inputs yield `0.0`); `Option<f64>` fields are `None` when the ratio is
/// not computable at all, notably when market data was absent, which is
/// deliberately distinct from a computed zero.
#[derive(Debug, Clone, Default, PartialEq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct FiscalYearMetrics {
    /// Revenue, millions
    #[serde(default)]
    pub revenue: f64,
    /// Adjusted EBITDA, millions
    #[serde(default, alias = "adj_ebitda")]
    pub adj_ebitda: f64,
    /// Adjusted EBIT, millions
    #[serde(default, alias = "adj_ebit")]
    pub adj_ebit: f64,
    /// Adjusted net income, millions
    #[serde(default, alias = "adj_net_income")]
    pub adj_net_income: f64,
    /// Net margin, percent
    #[serde(default, alias = "net_margin")]
    pub net_margin: f64,
    /// EBITDA margin, percent
    #[serde(default, alias = "ebitda_margin")]
    pub ebitda_margin: f64,
    /// EBIT margin, percent
    #[serde(default, alias = "ebit_margin")]
    pub ebit_margin: f64,
    /// Adjusted EPS, currency per share
    #[serde(default, alias = "adj_eps")]
    pub adj_eps: f64,
    /// Revenue growth year over year, percent
    #[serde(default, alias = "revenue_growth")]
    pub revenue_growth: f64,
    /// EBITDA growth year over year, percent
    #[serde(default, alias = "ebitda_growth")]
    pub ebitda_growth: f64,
    /// EPS growth year over year, percent
    #[serde(default, alias = "adj_eps_growth", alias = "eps_growth")]
    pub eps_growth: f64,
    /// Adjusted effective tax rate, percent
    #[serde(default, alias = "adj_tax_rate")]
    pub adj_tax_rate: f64,
    /// Operating cash flow, millions
    #[serde(default)]
    pub cfo: f64,
    /// Free cash flow to firm, millions
    #[serde(default)]
    pub fcff: f64,
    /// Return on capital employed, percent
    #[serde(default)]
    pub roce: f64,
    /// Return on equity, percent
    #[serde(default)]
    pub roe: f64,
    /// EBIT over interest expense
    #[serde(default, alias = "interest_cover")]
    pub interest_cover: Option<f64>,
    /// Net debt over equity, percent
    #[serde(default, alias = "net_debt_equity", alias = "net_debt_to_equity")]
    pub net_debt_to_equity: Option<f64>,
    /// Net debt over EBITDA
    #[serde(default, alias = "net_debt_ebitda", alias = "net_debt_to_ebitda")]
    pub net_debt_to_ebitda: Option<f64>,
    /// Enterprise value over EBITDA
    #[serde(default, alias = "ev_ebitda", alias = "ev_to_ebitda")]
    pub ev_to_ebitda: Option<f64>,
    /// Enterprise value over revenue
    #[serde(default, alias = "ev_revenue", alias = "ev_to_revenue")]
    pub ev_to_revenue: Option<f64>,
    /// Adjusted price over earnings
    #[serde(default, alias = "adj_pe")]
    pub adj_pe: Option<f64>,
    /// FCFF yield on enterprise value, percent
    #[serde(default, alias = "fcff_yield")]
    pub fcff_yield: Option<f64>,
    /// Dividend yield, percent; not derivable from statements
    #[serde(default, alias = "dividend_yield")]
    pub dividend_yield: Option<f64>,
}

fn default_fiscal_year_end() -> String {
    "Dec".to_string()
}

/// A ticker's full metrics panel across actual and forecast years.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct MetricsPanel {
    /// Fiscal year end month label
    #[serde(default = "default_fiscal_year_end", alias = "fiscal_year_end")]
    pub fiscal_year_end: String,
    /// Metric rows keyed by 4-digit fiscal-year label
    #[serde(default)]
    pub metrics: BTreeMap<String, FiscalYearMetrics>,
}

impl Default for MetricsPanel {
    fn default() -> Self {
        Self::new()
    }
}

impl MetricsPanel {
    /// Create an empty panel with the default fiscal year end.
    pub fn new() -> Self {
        Self {
            fiscal_year_end: default_fiscal_year_end(),
            metrics: BTreeMap::new(),
        }
    }

    /// Rebuild a panel from its stored parts.
    pub fn from_store(fiscal_year_end: &str, metrics_json: &str) -> serde_json::Result<Self> {
        Ok(Self {
            fiscal_year_end: fiscal_year_end.to_string(),
            metrics: serde_json::from_str(metrics_json)?,
        })
    }

    /// Serialize the year map for storage. The panel is always persisted
    /// wholesale.
    pub fn metrics_json(&self) -> serde_json::Result<String> {
        serde_json::to_string(&self.metrics)
    }

    /// Whether the panel has no years at all.
    pub fn is_empty(&self) -> bool {
        self.metrics.is_empty()
    }

    /// Whether a year label is present.
    pub fn contains_year(&self, year: &str) -> bool {
        self.metrics.contains_key(year)
    }

    /// The row for a year label.
    pub fn get(&self, year: &str) -> Option<&FiscalYearMetrics> {
        self.metrics.get(year)
    }

    /// Insert or replace a year's row.
    pub fn insert(&mut self, year: String, row: FiscalYearMetrics) {
        self.metrics.insert(year, row);
    }

    /// All numeric year labels in ascending order.
    pub fn year_numbers(&self) -> Vec<i32> {
        let mut years: Vec<i32> = self
            .metrics
            .keys()
            .filter_map(|label| label.parse().ok())
            .collect();
        years.sort_unstable();
        years
    }

    /// The highest numeric year present, if any.
    pub fn latest_year_number(&self) -> Option<i32> {
        self.year_numbers().into_iter().next_back()
    }

    /// Year labels at or below the latest actual year, ascending.
    pub fn actual_years(&self, latest_actual: i32) -> Vec<String> {
        self.partition_years(|year| year <= latest_actual)
    }

    /// Year labels above the latest actual year, ascending.
    pub fn forecast_years(&self, latest_actual: i32) -> Vec<String> {
        self.partition_years(|year| year > latest_actual)
    }

    /// The row for the largest numeric year strictly below `year`.
    pub fn nearest_before(&self, year: i32) -> Option<&FiscalYearMetrics> {
        let label = self
            .year_numbers()
            .into_iter()
            .filter(|y| *y < year)
            .next_back()?
            .to_string();
        self.metrics.get(&label)
    }

    fn partition_years(&self, keep: impl Fn(i32) -> bool) -> Vec<String> {
        self.year_numbers()
            .into_iter()
            .filter(|year| keep(*year))
            .map(|year| year.to_string())
            .collect()
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    fn row(revenue: f64) -> FiscalYearMetrics {
        FiscalYearMetrics {
            revenue,
            ..Default::default()
        }
    }

    #[test]
    fn test_partitioning_is_derived_not_stored() {
        let mut panel = MetricsPanel::new();
        panel.insert("2023".to_string(), row(1.0));
        panel.insert("2024".to_string(), row(2.0));
        panel.insert("2025".to_string(), row(3.0));
        panel.insert("2026".to_string(), row(4.0));

        // Classified against 2024 as the latest actual...
        assert_eq!(panel.actual_years(2024), vec!["2023", "2024"]);
        assert_eq!(panel.forecast_years(2024), vec!["2025", "2026"]);

        // ...and reclassified when a newer filing moves the boundary.
        assert_eq!(panel.actual_years(2025), vec!["2023", "2024", "2025"]);
        assert_eq!(panel.forecast_years(2025), vec!["2026"]);
    }

    #[test]
    fn test_latest_and_nearest() {
        let mut panel = MetricsPanel::new();
        assert_eq!(panel.latest_year_number(), None);
        assert!(panel.nearest_before(2026).is_none());

        panel.insert("2023".to_string(), row(1.0));
        panel.insert("2025".to_string(), row(3.0));

        assert_eq!(panel.latest_year_number(), Some(2025));
        assert_eq!(panel.nearest_before(2026).unwrap().revenue, 3.0);
        assert_eq!(panel.nearest_before(2025).unwrap().revenue, 1.0);
        assert!(panel.nearest_before(2023).is_none());
    }

    #[test]
    fn test_store_roundtrip() {
        let mut panel = MetricsPanel::new();
        panel.insert("2024".to_string(), row(97_690.0));

        let json = panel.metrics_json().unwrap();
        let restored = MetricsPanel::from_store("Dec", &json).unwrap();
        assert_eq!(restored, panel);
    }

    #[test]
    fn test_camel_case_wire_format() {
        let mut panel = MetricsPanel::new();
        panel.insert(
            "2024".to_string(),
            FiscalYearMetrics {
                adj_ebitda: 12_000.0,
                net_debt_to_ebitda: Some(1.5),
                ..Default::default()
            },
        );

        let json = panel.metrics_json().unwrap();
        assert!(json.contains("\"adjEbitda\""));
        assert!(json.contains("\"netDebtToEbitda\""));
    }

    #[test]
    fn test_snake_case_aliases_decode() {
        // Blob written by the historical cache format.
        let json = r#"{
            "2024": {
                "revenue": 97690.0,
                "adj_ebitda": 12000.0,
                "adj_eps_growth": -5.0,
                "net_debt_ebitda": 0.4,
                "ev_ebitda": 75.0,
                "dividend_yield": null
            }
        }"#;

        let panel = MetricsPanel::from_store("Dec", json).unwrap();
        let year = panel.get("2024").unwrap();
        assert_eq!(year.adj_ebitda, 12_000.0);
        assert_eq!(year.eps_growth, -5.0);
        assert_eq!(year.net_debt_to_ebitda, Some(0.4));
        assert_eq!(year.ev_to_ebitda, Some(75.0));
        assert_eq!(year.dividend_yield, None);
    }
}
