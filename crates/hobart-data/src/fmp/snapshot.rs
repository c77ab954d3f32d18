//! Company snapshot assembly.
//!
//! A snapshot is stitched together from four endpoints plus a trailing
//! price history for realized volatility. Individual endpoint failures are
//! tolerated; the assembly fails only when a critical field (shares
//! outstanding, market cap, 52-week range) cannot be established.

use chrono::{Days, NaiveDate};
use tracing::warn;

use super::client::{FmpClient, HistoricalBar};
use crate::error::{DataError, Result};
use crate::records::{AnalystRatings, CompanySnapshot};

/// Calendar days of history requested to cover 90 trading days.
const VOLATILITY_LOOKBACK_DAYS: u64 = 120;

/// Trading days in the volatility window.
const VOLATILITY_WINDOW: usize = 90;

impl FmpClient {
    /// Assemble a point-in-time company snapshot for `ticker` as of
    /// `as_of_date`.
    ///
    /// Non-critical gaps are filled where derivable (shares from market cap
    /// and price, currency volume from share volume and price) or zeroed;
    /// free float stays absent when the float endpoint has nothing.
    pub fn fetch_company_snapshot(
        &self,
        ticker: &str,
        as_of_date: NaiveDate,
    ) -> Result<CompanySnapshot> {
        let profile = self
            .fetch_profile(ticker)
            .unwrap_or_else(|e| log_endpoint_failure("profile", ticker, &e));
        let float_info = self
            .fetch_shares_float(ticker)
            .unwrap_or_else(|e| log_endpoint_failure("shares-float", ticker, &e));
        let quote = self
            .fetch_quote(ticker)
            .unwrap_or_else(|e| log_endpoint_failure("quote", ticker, &e));
        let grades = self
            .fetch_grades_consensus(ticker)
            .unwrap_or_else(|e| log_endpoint_failure("grades-consensus", ticker, &e));

        let market_cap = profile.as_ref().and_then(|p| p.mkt_cap);
        let currency = profile
            .as_ref()
            .map(|p| p.currency.clone().unwrap_or_else(|| "USD".to_string()));
        let primary_index_name = profile
            .as_ref()
            .and_then(|p| p.exchange_short_name.clone().or_else(|| p.exchange.clone()))
            .unwrap_or_default();

        let current_price = quote
            .as_ref()
            .and_then(|q| q.price.or(q.previous_close))
            .filter(|price| *price > 0.0);

        // Shares outstanding: the float endpoint first, then implied from
        // market cap and price.
        let shares_outstanding = float_info
            .as_ref()
            .and_then(|f| f.shares_outstanding)
            .or_else(|| match (market_cap, current_price) {
                (Some(mc), Some(price)) => Some(mc / price),
                _ => None,
            });
        let free_float_pct = float_info.as_ref().and_then(|f| f.free_float);

        let week52_high = quote.as_ref().and_then(|q| q.year_high);
        let week52_low = quote.as_ref().and_then(|q| q.year_low);
        let mut avg_volume_shares = quote.as_ref().and_then(|q| q.avg_volume.or(q.volume));

        // Trailing history for realized volatility; also backfills volume
        // when the quote had none.
        let history_start = as_of_date
            .checked_sub_days(Days::new(VOLATILITY_LOOKBACK_DAYS))
            .unwrap_or(as_of_date);
        let history = match self.fetch_price_history(ticker, history_start, as_of_date) {
            Ok(bars) => Some(bars),
            Err(e) => {
                warn!(ticker, error = %e, "price history unavailable, volatility not computed");
                None
            }
        };

        let volatility = history.as_deref().map(realized_volatility_90d);

        if avg_volume_shares.is_none() {
            avg_volume_shares = history.as_deref().and_then(average_volume);
        }

        let avg_volume_ccy = avg_volume_shares.and_then(|shares| {
            current_price
                .or_else(|| match (market_cap, shares_outstanding) {
                    (Some(mc), Some(out)) if out > 0.0 => Some(mc / out),
                    _ => None,
                })
                .map(|price| shares * price)
        });

        let ratings = grades.as_ref().map(|g| AnalystRatings {
            strong_buy: g.strong_buy,
            buy: g.buy,
            hold: g.hold,
            sell: g.sell,
            strong_sell: g.strong_sell,
        });

        // Critical fields must exist; everything else degrades gracefully.
        for (name, value) in [
            ("shares_outstanding", shares_outstanding),
            ("market_cap", market_cap),
            ("week52_high", week52_high),
            ("week52_low", week52_low),
        ] {
            if value.is_none() {
                return Err(DataError::MissingData {
                    symbol: ticker.to_string(),
                    reason: format!("critical snapshot field {name} unavailable"),
                });
            }
        }

        Ok(CompanySnapshot {
            ticker: ticker.to_string(),
            as_of_date,
            shares_outstanding,
            market_cap,
            currency,
            fx_rate: 1.0,
            free_float_pct,
            avg_daily_volume_3m_shares: avg_volume_shares.or(Some(0.0)),
            avg_daily_volume_3m_ccy: avg_volume_ccy.or(Some(0.0)),
            volatility_90d: volatility.or(Some(0.0)),
            week52_high,
            week52_low,
            primary_index_name,
            analyst_rating_counts: ratings.unwrap_or_default(),
            consensus_rating: grades
                .as_ref()
                .and_then(|g| g.consensus.clone())
                .unwrap_or_default(),
            num_analysts: grades.map(|g| g.total).unwrap_or_default(),
        })
    }
}

fn log_endpoint_failure<T>(endpoint: &str, ticker: &str, error: &DataError) -> Option<T> {
    warn!(ticker, endpoint, error = %error, "snapshot endpoint failed");
    None
}

/// Realized volatility over the trailing window: sample standard deviation
/// of daily returns, in percent. Bars must be sorted oldest first.
pub(crate) fn realized_volatility_90d(bars: &[HistoricalBar]) -> f64 {
    if bars.len() < 2 {
        return 0.0;
    }
    let window = &bars[bars.len().saturating_sub(VOLATILITY_WINDOW)..];

    let mut returns = Vec::with_capacity(window.len());
    for pair in window.windows(2) {
        if let Some(pct) = pair[1].change_percent {
            returns.push(pct / 100.0);
        } else if pair[0].close > 0.0 {
            returns.push((pair[1].close - pair[0].close) / pair[0].close);
        }
    }

    if returns.len() < 2 {
        return 0.0;
    }
    sample_stdev(&returns) * 100.0
}

/// Mean traded volume over the trailing window.
fn average_volume(bars: &[HistoricalBar]) -> Option<f64> {
    let window = &bars[bars.len().saturating_sub(VOLATILITY_WINDOW)..];
    let volumes: Vec<f64> = window
        .iter()
        .filter_map(|bar| bar.volume.filter(|v| *v > 0.0))
        .collect();
    if volumes.is_empty() {
        return None;
    }
    Some(volumes.iter().sum::<f64>() / volumes.len() as f64)
}

fn sample_stdev(values: &[f64]) -> f64 {
    let n = values.len() as f64;
    let mean = values.iter().sum::<f64>() / n;
    let variance = values.iter().map(|v| (v - mean).powi(2)).sum::<f64>() / (n - 1.0);
    variance.sqrt()
}

#[cfg(test)]
mod tests {
    use super::*;
    use approx::assert_relative_eq;

    fn bar(date: &str, close: f64) -> HistoricalBar {
        HistoricalBar {
            date: date.to_string(),
            close,
            volume: None,
            change_percent: None,
        }
    }

    #[test]
    fn test_volatility_constant_returns_is_zero() {
        // 1% up every day: zero dispersion.
        let bars: Vec<HistoricalBar> = (0..10)
            .map(|i| bar(&format!("2024-01-{:02}", i + 1), 100.0 * 1.01f64.powi(i)))
            .collect();
        assert_relative_eq!(realized_volatility_90d(&bars), 0.0, epsilon = 1e-9);
    }

    #[test]
    fn test_volatility_short_series_is_zero() {
        assert_eq!(realized_volatility_90d(&[]), 0.0);
        assert_eq!(realized_volatility_90d(&[bar("2024-01-01", 100.0)]), 0.0);
    }

    #[test]
    fn test_volatility_prefers_change_percent() {
        let mut bars = vec![bar("2024-01-01", 100.0); 4];
        for (i, b) in bars.iter_mut().enumerate() {
            b.date = format!("2024-01-{:02}", i + 1);
            // Alternating +2% / -2% as reported by the provider; closes are
            // deliberately flat so only changePercent can produce this.
            b.change_percent = Some(if i % 2 == 0 { 2.0 } else { -2.0 });
        }
        let vol = realized_volatility_90d(&bars);
        // Returns are [-0.02, 0.02, -0.02]; sample stdev ≈ 0.023094.
        assert_relative_eq!(vol, 2.309401, epsilon = 1e-4);
    }

    #[test]
    fn test_average_volume_ignores_missing() {
        let mut bars = vec![bar("2024-01-01", 100.0), bar("2024-01-02", 101.0)];
        bars[0].volume = Some(1_000.0);
        assert_relative_eq!(average_volume(&bars).unwrap(), 1_000.0);

        let bars = vec![bar("2024-01-01", 100.0)];
        assert!(average_volume(&bars).is_none());
    }
}
