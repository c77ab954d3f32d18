//! Analyst narrative generation.
//!
//! Three analysis sections plus a recommendation, produced by the same
//! chat capability the forecast step uses. Narrative is decoration, not
//! data: a capability failure leaves the payload without one and the run
//! carries on.

use serde::{Deserialize, Serialize};
use std::fmt::Write;
use tracing::warn;

use hobart_forecast::capability::{CapabilityResult, ForecastCapability, parse_json_object};

use crate::payload::ReportPayload;

/// News items included in the narrative prompt.
const MAX_NEWS_IN_PROMPT: usize = 10;

/// The generated analysis text.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct Narrative {
    /// Business and market position overview
    pub overview: String,
    /// Discussion of the financial trajectory
    pub financials: String,
    /// Forward-looking outlook
    pub outlook: String,
    /// One-line recommendation (e.g. "Overweight")
    pub recommendation: String,
}

/// Build the analyst prompt from an assembled payload.
pub fn build_analyst_prompt(payload: &ReportPayload) -> String {
    let mut out = String::new();

    let _ = writeln!(
        out,
        "You are an equity research analyst writing a report on {} ({}).",
        payload.company_name, payload.ticker
    );

    if let Some(metrics) = &payload.metrics {
        let _ = writeln!(
            out,
            "\n## Key Metrics (latest actual fiscal year: {})",
            metrics.latest_actual_year
        );
        for year in metrics.ordered_years() {
            if let Some(row) = metrics.metrics.get(year) {
                let kind = if metrics.forecast_years.contains(year) {
                    "Forecast"
                } else {
                    "Actual"
                };
                let _ = writeln!(
                    out,
                    "- FY{year} ({kind}): revenue {:.0}M, EBITDA margin {:.1}%, \
                     net margin {:.1}%, EPS {:.2}, revenue growth {:.1}%",
                    row.revenue, row.ebitda_margin, row.net_margin, row.adj_eps, row.revenue_growth
                );
            }
        }
    }

    if let Some(snapshot) = &payload.snapshot {
        let _ = writeln!(out, "\n## Market Snapshot (as of {})", snapshot.as_of_date);
        if let Some(mc) = snapshot.market_cap {
            let _ = writeln!(out, "- Market Cap: {mc:.0}");
        }
        if !snapshot.consensus_rating.is_empty() {
            let _ = writeln!(
                out,
                "- Analyst Consensus: {} ({} analysts)",
                snapshot.consensus_rating, snapshot.num_analysts
            );
        }
        if let (Some(high), Some(low)) = (snapshot.week52_high, snapshot.week52_low) {
            let _ = writeln!(out, "- 52W Range: {low:.2} - {high:.2}");
        }
    }

    if let Some(prices) = &payload.price_performance {
        if let Some(total_return) = prices.total_return_pct() {
            let _ = writeln!(
                out,
                "\n## Price Performance\n- {:.1}% from {} to {} (benchmark: {})",
                total_return, prices.start_date, prices.end_date, prices.base_index
            );
        }
    }

    if !payload.news.is_empty() {
        let _ = writeln!(out, "\n## Recent News");
        for item in payload.news.iter().take(MAX_NEWS_IN_PROMPT) {
            let _ = writeln!(
                out,
                "- [{}] {} ({})",
                item.published_at.date_naive(),
                item.headline,
                item.source
            );
        }
    }

    let _ = writeln!(
        out,
        "\n## Task\nWrite three short analysis paragraphs and a recommendation. \
         Respond with a JSON object of exactly this shape:\n\
         {{\"overview\": <string>, \"financials\": <string>, \
         \"outlook\": <string>, \"recommendation\": <string>}}"
    );
    let _ = writeln!(out, "\nReturn ONLY valid JSON, no additional text.");

    out
}

/// Generate a narrative for the payload through the capability.
pub fn generate_narrative<C: ForecastCapability>(
    capability: &C,
    payload: &ReportPayload,
) -> CapabilityResult<Narrative> {
    let prompt = build_analyst_prompt(payload);
    let reply = capability.complete(&prompt)?;
    parse_json_object(&reply)
}

/// Best-effort narrative: failures are logged and swallowed.
pub fn try_generate_narrative<C: ForecastCapability>(
    capability: &C,
    payload: &ReportPayload,
) -> Option<Narrative> {
    match generate_narrative(capability, payload) {
        Ok(narrative) => Some(narrative),
        Err(e) => {
            warn!(ticker = %payload.ticker, error = %e, "narrative generation failed");
            None
        }
    }
}
