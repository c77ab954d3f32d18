//! Deterministic fallback forecast.

use hobart_metrics::FiscalYearMetrics;

/// Synthesize a forecast year by carrying the base year forward.
///
/// Absolute values, margins, rates and the nullable ratios stay unchanged;
/// the growth fields are zeroed, a "no growth assumed" proxy. This is
/// what a forecast year gets whenever the capability fails, so it must be
/// fully deterministic.
pub fn carry_forward(base: &FiscalYearMetrics) -> FiscalYearMetrics {
    FiscalYearMetrics {
        revenue_growth: 0.0,
        ebitda_growth: 0.0,
        eps_growth: 0.0,
        ..base.clone()
    }
}
