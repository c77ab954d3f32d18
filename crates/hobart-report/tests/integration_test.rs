//! End-to-end test: statements in, exported payload out.
//!
//! Three fiscal years of statements (2022-2024) are derived into a panel,
//! the forecast step resolves 2025 through a stub capability and 2026
//! through the fallback after a stubbed failure, and the assembled payload
//! exports with the expected classification.

use approx::assert_relative_eq;
use std::cell::Cell;

use hobart_data::Result as DataResult;
use hobart_data::cache::{CompletenessPolicy, ReportCache};
use hobart_data::statements::{
    BalanceSheet, CashFlowStatement, IncomeStatement, Periodicity, StatementBundle,
    StatementSource,
};
use hobart_forecast::capability::{CapabilityError, CapabilityResult, ForecastCapability};
use hobart_forecast::{ForecastOrchestrator, ForecastSource};
use hobart_metrics::{MarketContext, MetricsPanel, derive_panel};
use hobart_report::export::{ExportFormat, render};
use hobart_report::payload::PayloadBuilder;

/// 2022-2024 statements, all fields populated, most recent first.
struct Statements;

impl Statements {
    fn bundle() -> StatementBundle {
        let mut bundle = StatementBundle::default();
        for (label, scale) in [(2024, 1.0), (2023, 0.9), (2022, 0.8)] {
            bundle.income.push(IncomeStatement {
                date: Some(format!("{label}-12-31")),
                calendar_year: Some(label.to_string()),
                revenue: Some(100e9 * scale),
                ebitda: Some(18e9 * scale),
                operating_income: Some(12e9 * scale),
                ebit: None,
                net_income: Some(9e9 * scale),
                income_tax_expense: Some(2e9 * scale),
                interest_expense: Some(0.5e9 * scale),
            });
            bundle.balance.push(BalanceSheet {
                date: Some(format!("{label}-12-31")),
                calendar_year: Some(label.to_string()),
                total_debt: Some(25e9 * scale),
                cash_and_cash_equivalents: Some(15e9 * scale),
                total_stockholders_equity: Some(60e9 * scale),
                total_assets: Some(120e9 * scale),
            });
            bundle.cash_flow.push(CashFlowStatement {
                date: Some(format!("{label}-12-31")),
                calendar_year: Some(label.to_string()),
                operating_cash_flow: Some(15e9 * scale),
                capital_expenditure: Some(-6e9 * scale),
            });
        }
        bundle
    }
}

impl StatementSource for Statements {
    fn fetch_statements(
        &self,
        _ticker: &str,
        _periodicity: Periodicity,
        _limit: usize,
    ) -> DataResult<StatementBundle> {
        Ok(Self::bundle())
    }
}

/// Capability that forecasts 2025 and then fails for 2026.
struct FlakyCapability {
    calls: Cell<usize>,
}

impl ForecastCapability for FlakyCapability {
    fn complete(&self, _prompt: &str) -> CapabilityResult<String> {
        self.calls.set(self.calls.get() + 1);
        if self.calls.get() == 1 {
            Ok(r#"{"revenue": 1100.0, "adjEbitda": 200.0, "netMargin": 9.5,
                   "revenueGrowth": 10.0, "evToEbitda": null}"#
                .to_string())
        } else {
            Err(CapabilityError::Api("stubbed outage".to_string()))
        }
    }
}

#[test]
fn test_full_report_workflow() {
    // Market inputs per the scenario: 1,000,000M cap, 1000M shares,
    // price 1000.
    let market = MarketContext {
        market_cap: Some(1_000_000e6),
        shares_outstanding: Some(1_000e6),
        current_price: Some(1_000.0),
    };

    // Derivation: exactly three actual-year entries.
    let panel = derive_panel(&Statements::bundle(), &market);
    assert_eq!(panel.year_numbers(), vec![2022, 2023, 2024]);

    // The persisted actuals-only blob passes the completeness gate.
    let cache = ReportCache::in_memory().unwrap();
    cache
        .put_key_metrics("TSLA", &panel.fiscal_year_end, &panel.metrics_json().unwrap())
        .unwrap();
    let record = cache.get_key_metrics("TSLA").unwrap().unwrap();
    assert!(CompletenessPolicy::default().metrics_blob_is_complete(&record.metrics_json));

    // Forecast step: 2025 from the capability, 2026 via fallback.
    let statements = Statements;
    let capability = FlakyCapability { calls: Cell::new(0) };
    let run = ForecastOrchestrator::new(&statements, &capability, &cache)
        .ensure_forecast_years("TSLA", panel)
        .unwrap();

    assert_eq!(run.latest_actual_year, 2024);
    assert_eq!(run.outcomes[0].source, ForecastSource::Generated);
    assert_eq!(run.outcomes[1].source, ForecastSource::Fallback);

    let forecast_2025 = run.panel.get("2025").unwrap();
    assert_relative_eq!(forecast_2025.revenue, 1_100.0);
    assert_relative_eq!(forecast_2025.net_margin, 9.5);

    // 2026 equals 2025 carried forward with growth zeroed.
    let forecast_2026 = run.panel.get("2026").unwrap();
    assert_relative_eq!(forecast_2026.revenue, 1_100.0);
    assert_relative_eq!(forecast_2026.net_margin, 9.5);
    assert_relative_eq!(forecast_2026.revenue_growth, 0.0);

    // The stored panel matches the returned one (durable after each year).
    let record = cache.get_key_metrics("TSLA").unwrap().unwrap();
    let stored = MetricsPanel::from_store(&record.fiscal_year_end, &record.metrics_json).unwrap();
    assert_eq!(stored, run.panel);

    // Assembly and export.
    let payload = PayloadBuilder::new("TSLA")
        .company_name("Tesla Inc")
        .metrics(Some(&run.panel), Some(run.latest_actual_year))
        .build();

    let section = payload.metrics.as_ref().unwrap();
    assert_eq!(section.actual_years, vec!["2022", "2023", "2024"]);
    assert_eq!(section.forecast_years, vec!["2025", "2026"]);

    let json = render(&payload, ExportFormat::PrettyJson).unwrap();
    assert!(json.contains("\"latestActualYear\": 2024"));
    assert!(json.contains("\"2026\""));

    let csv = render(&payload, ExportFormat::Csv).unwrap();
    assert_eq!(csv.lines().count(), 6); // header + 5 years
    assert!(csv.contains("2025,forecast"));
    assert!(csv.contains("2024,actual"));

    // Exactly two capability attempts were made across the whole run.
    assert_eq!(capability.calls.get(), 2);
}
