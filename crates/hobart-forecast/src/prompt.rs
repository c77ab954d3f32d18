//! Forecast prompt assembly.
//!
//! The prompt embeds the actual-year panel, any already-resolved forecast
//! years, and whatever company/market context the cache holds, then pins
//! the reply format to a bare JSON object keyed by the metric field names.

use std::fmt::Write;

use hobart_data::records::{CompanySnapshot, PricePerformanceSeries};
use hobart_metrics::{FiscalYearMetrics, MetricsPanel};

/// Most recent actual years included in the prompt.
const MAX_ACTUAL_YEARS: usize = 3;

/// The reply schema spelled out to the capability. Keys match the
/// serialized metrics row exactly.
const RESPONSE_SCHEMA: &str = r#"{
  "revenue": <number in millions>,
  "adjEbitda": <number in millions>,
  "adjEbit": <number in millions>,
  "adjNetIncome": <number in millions>,
  "netMargin": <percentage>,
  "ebitdaMargin": <percentage>,
  "ebitMargin": <percentage>,
  "adjEps": <number>,
  "revenueGrowth": <percentage>,
  "ebitdaGrowth": <percentage>,
  "epsGrowth": <percentage>,
  "adjTaxRate": <percentage>,
  "cfo": <number in millions>,
  "fcff": <number in millions>,
  "roce": <percentage>,
  "roe": <percentage>,
  "interestCover": <number or null>,
  "netDebtToEquity": <percentage or null>,
  "netDebtToEbitda": <number or null>,
  "evToEbitda": <number or null>,
  "evToRevenue": <number or null>,
  "adjPe": <number or null>,
  "fcffYield": <percentage or null>,
  "dividendYield": null
}"#;

/// Build the forecast prompt for one target year.
pub fn build_forecast_prompt(
    ticker: &str,
    panel: &MetricsPanel,
    latest_actual: i32,
    target_year: i32,
    snapshot: Option<&CompanySnapshot>,
    prices: Option<&PricePerformanceSeries>,
) -> String {
    let mut out = String::new();

    let _ = writeln!(
        out,
        "You are a financial analyst tasked with forecasting financial metrics \
         for {ticker} for fiscal year {target_year}."
    );
    let _ = writeln!(out, "\n## Historical Financial Data");
    let _ = writeln!(
        out,
        "\n### Key Metrics (Fiscal Year End: {})",
        panel.fiscal_year_end
    );

    let actual_years = panel.actual_years(latest_actual);
    let recent_actuals = actual_years
        .iter()
        .rev()
        .take(MAX_ACTUAL_YEARS)
        .rev()
        .collect::<Vec<_>>();

    for year in recent_actuals {
        if let Some(row) = panel.get(year) {
            write_year_section(&mut out, year, "Actual", row);
        }
    }

    // Already-resolved forecast years ride along so year N+1 is anchored on
    // year N, whether that came from the capability or the fallback.
    let prior_forecasts: Vec<String> = panel
        .forecast_years(latest_actual)
        .into_iter()
        .filter(|label| label.parse::<i32>().is_ok_and(|year| year < target_year))
        .collect();
    if !prior_forecasts.is_empty() {
        let _ = writeln!(out, "\n### Previous Forecasts");
        for year in &prior_forecasts {
            if let Some(row) = panel.get(year) {
                write_year_section(&mut out, year, "Forecast", row);
            }
        }
    }

    if let Some(snapshot) = snapshot {
        let _ = writeln!(out, "\n### Company Information (as of {})", snapshot.as_of_date);
        if let Some(mc) = snapshot.market_cap {
            let _ = writeln!(out, "- Market Cap: {mc:.0}");
        }
        if let Some(shares) = snapshot.shares_outstanding {
            let _ = writeln!(out, "- Shares Outstanding: {shares:.0}");
        }
        if let (Some(high), Some(low)) = (snapshot.week52_high, snapshot.week52_low) {
            let _ = writeln!(out, "- 52W Range: {low:.2} - {high:.2}");
        }
        if let Some(vol) = snapshot.volatility_90d {
            let _ = writeln!(out, "- Volatility (90d): {vol:.2}%");
        }
        if !snapshot.consensus_rating.is_empty() {
            let _ = writeln!(
                out,
                "- Analyst Consensus: {} ({} analysts)",
                snapshot.consensus_rating, snapshot.num_analysts
            );
        }
    }

    if let Some(prices) = prices {
        let _ = writeln!(out, "\n### Price Performance Context");
        let _ = writeln!(
            out,
            "- Period: {} to {} vs {}",
            prices.start_date, prices.end_date, prices.base_index
        );
        if let Some(total_return) = prices.total_return_pct() {
            let _ = writeln!(out, "- Total Return: {total_return:.1}%");
        }
    }

    let _ = writeln!(out, "\n## Forecasting Task");
    let _ = writeln!(
        out,
        "Based on the data above, forecast fiscal year {target_year}. Consider \
         historical growth trends, margin stability, and company-specific factors."
    );
    let _ = writeln!(
        out,
        "Provide your forecast as a JSON object with exactly this structure:\n{RESPONSE_SCHEMA}"
    );
    let _ = writeln!(out, "\nReturn ONLY valid JSON, no additional text or explanation.");

    out
}

fn write_year_section(out: &mut String, year: &str, kind: &str, row: &FiscalYearMetrics) {
    let _ = writeln!(out, "\n**FY{year} ({kind}):**");
    let _ = writeln!(out, "- Revenue: {:.0}M", row.revenue);
    let _ = writeln!(out, "- Adj. EBITDA: {:.0}M", row.adj_ebitda);
    let _ = writeln!(out, "- Adj. EBIT: {:.0}M", row.adj_ebit);
    let _ = writeln!(out, "- Adj. Net Income: {:.0}M", row.adj_net_income);
    let _ = writeln!(out, "- Net Margin: {:.1}%", row.net_margin);
    let _ = writeln!(out, "- EBITDA Margin: {:.1}%", row.ebitda_margin);
    let _ = writeln!(out, "- EBIT Margin: {:.1}%", row.ebit_margin);
    let _ = writeln!(out, "- Adj. EPS: {:.2}", row.adj_eps);
    let _ = writeln!(out, "- Revenue Growth Y/Y: {:.1}%", row.revenue_growth);
    let _ = writeln!(out, "- EBITDA Growth Y/Y: {:.1}%", row.ebitda_growth);
    let _ = writeln!(out, "- EPS Growth Y/Y: {:.1}%", row.eps_growth);
    let _ = writeln!(out, "- CFO: {:.0}M", row.cfo);
    let _ = writeln!(out, "- FCFF: {:.0}M", row.fcff);
    let _ = writeln!(out, "- ROCE: {:.1}%", row.roce);
    let _ = writeln!(out, "- ROE: {:.1}%", row.roe);
    if let Some(leverage) = row.net_debt_to_ebitda {
        let _ = writeln!(out, "- Net Debt/EBITDA: {leverage:.1}x");
    }
}
