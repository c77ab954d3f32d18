//! The completeness gate.
//!
//! Before the pipeline re-fetches or re-derives anything it asks whether
//! the cached record already carries every field the rest of the run
//! depends on. Pure reads; the checks never mutate the store. Gating every
//! external call on this keeps redundant requests (and rate-limit
//! exposure) down.

use crate::records::{CompanySnapshot, PricePerformanceSeries};

/// Policy knobs for the completeness checks.
///
/// The default requires every snapshot field, including free float. Some
/// listings never publish a float figure; callers that accept such
/// snapshots opt in via [`CompletenessPolicy::optional_free_float`]; the
/// relaxation is explicit, never the default.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct CompletenessPolicy {
    /// Whether a snapshot must carry a non-null free float percentage.
    pub require_free_float: bool,
}

impl Default for CompletenessPolicy {
    fn default() -> Self {
        Self {
            require_free_float: true,
        }
    }
}

impl CompletenessPolicy {
    /// Policy that tolerates an explicitly absent free float.
    pub const fn optional_free_float() -> Self {
        Self {
            require_free_float: false,
        }
    }

    /// Whether a cached snapshot carries every field the pipeline depends
    /// on: shares outstanding, market cap, currency, 3M volume (shares and
    /// currency), 90-day volatility, 52-week range, and free float unless
    /// relaxed.
    pub fn snapshot_is_complete(&self, snapshot: &CompanySnapshot) -> bool {
        let required = [
            snapshot.shares_outstanding,
            snapshot.market_cap,
            snapshot.avg_daily_volume_3m_shares,
            snapshot.avg_daily_volume_3m_ccy,
            snapshot.volatility_90d,
            snapshot.week52_high,
            snapshot.week52_low,
        ];

        if required.iter().any(Option::is_none) {
            return false;
        }
        if snapshot.currency.as_deref().is_none_or(str::is_empty) {
            return false;
        }
        if self.require_free_float && snapshot.free_float_pct.is_none() {
            return false;
        }
        true
    }

    /// Whether a cached price performance record is usable: both series
    /// decoded to non-empty lists.
    pub fn series_is_complete(&self, series: &PricePerformanceSeries) -> bool {
        !series.stock_series.is_empty() && !series.index_series.is_empty()
    }

    /// Whether a stored metrics blob is usable: it parses as a non-empty
    /// JSON object. Per-year field completeness is the deriver's concern,
    /// not the gate's.
    pub fn metrics_blob_is_complete(&self, metrics_json: &str) -> bool {
        serde_json::from_str::<serde_json::Value>(metrics_json)
            .ok()
            .and_then(|value| value.as_object().map(|map| !map.is_empty()))
            .unwrap_or(false)
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::records::{AnalystRatings, PricePoint};
    use chrono::NaiveDate;

    fn date(y: i32, m: u32, d: u32) -> NaiveDate {
        NaiveDate::from_ymd_opt(y, m, d).unwrap()
    }

    fn complete_snapshot() -> CompanySnapshot {
        CompanySnapshot {
            ticker: "TSLA".to_string(),
            as_of_date: date(2025, 6, 30),
            shares_outstanding: Some(3_200_000_000.0),
            market_cap: Some(1_000_000_000_000.0),
            currency: Some("USD".to_string()),
            fx_rate: 1.0,
            free_float_pct: Some(87.0),
            avg_daily_volume_3m_shares: Some(95_000_000.0),
            avg_daily_volume_3m_ccy: Some(29_000_000_000.0),
            volatility_90d: Some(3.4),
            week52_high: Some(488.5),
            week52_low: Some(182.0),
            primary_index_name: "NASDAQ".to_string(),
            analyst_rating_counts: AnalystRatings::default(),
            consensus_rating: String::new(),
            num_analysts: 0,
        }
    }

    #[test]
    fn test_complete_snapshot_passes() {
        let policy = CompletenessPolicy::default();
        assert!(policy.snapshot_is_complete(&complete_snapshot()));
    }

    #[test]
    fn test_missing_volatility_fails() {
        let mut snapshot = complete_snapshot();
        snapshot.volatility_90d = None;
        assert!(!CompletenessPolicy::default().snapshot_is_complete(&snapshot));
    }

    #[test]
    fn test_empty_currency_fails() {
        let mut snapshot = complete_snapshot();
        snapshot.currency = Some(String::new());
        assert!(!CompletenessPolicy::default().snapshot_is_complete(&snapshot));
        snapshot.currency = None;
        assert!(!CompletenessPolicy::default().snapshot_is_complete(&snapshot));
    }

    #[test]
    fn test_free_float_relaxation() {
        let mut snapshot = complete_snapshot();
        snapshot.free_float_pct = None;

        // Default policy: incomplete without a float figure.
        assert!(!CompletenessPolicy::default().snapshot_is_complete(&snapshot));
        // Documented relaxation: the same record passes.
        assert!(CompletenessPolicy::optional_free_float().snapshot_is_complete(&snapshot));
    }

    #[test]
    fn test_series_completeness() {
        let point = PricePoint {
            date: date(2024, 1, 2),
            close: 100.0,
            rebased_close: 100.0,
        };
        let mut series = PricePerformanceSeries {
            ticker: "TSLA".to_string(),
            base_index: "SPY".to_string(),
            start_date: date(2024, 1, 2),
            end_date: date(2024, 1, 2),
            stock_series: vec![point.clone()],
            index_series: vec![point],
        };

        let policy = CompletenessPolicy::default();
        assert!(policy.series_is_complete(&series));

        series.index_series.clear();
        assert!(!policy.series_is_complete(&series));
    }

    #[test]
    fn test_metrics_blob_completeness() {
        let policy = CompletenessPolicy::default();
        assert!(policy.metrics_blob_is_complete(r#"{"2024": {"revenue": 1.0}}"#));
        assert!(!policy.metrics_blob_is_complete("{}"));
        assert!(!policy.metrics_blob_is_complete("[]"));
        assert!(!policy.metrics_blob_is_complete("not json"));
    }
}
