//! Metrics derivation from raw financial statements.
//!
//! The deriver walks the aligned statement window most-recent-first and
//! emits one panel row per year. Missing line items normalize to zero once,
//! at the [`YearInputs`] boundary; after that the arithmetic is total.
//! Degenerate denominators never raise: percentage fields fall back to
//! zero, market-dependent ratios to `None`.

use hobart_data::statements::{BalanceSheet, CashFlowStatement, IncomeStatement, StatementBundle};

use crate::panel::{FiscalYearMetrics, MetricsPanel};

/// Millions scaling for absolute currency fields.
const MILLIONS: f64 = 1e6;

/// Market inputs for valuation ratios. All optional: without a market cap
/// the valuation fields of every derived row stay `None`.
#[derive(Debug, Clone, Copy, Default, PartialEq)]
pub struct MarketContext {
    /// Market capitalization in the listing currency
    pub market_cap: Option<f64>,
    /// Shares outstanding
    pub shares_outstanding: Option<f64>,
    /// Current share price
    pub current_price: Option<f64>,
}

impl MarketContext {
    /// A context with no market data at all.
    pub const fn none() -> Self {
        Self {
            market_cap: None,
            shares_outstanding: None,
            current_price: None,
        }
    }

    /// Share count used for EPS: supplied shares outstanding first, then
    /// implied from market cap and price, else zero (EPS degrades to zero,
    /// never errors).
    fn eps_shares(&self) -> f64 {
        if let Some(shares) = self.shares_outstanding {
            return shares;
        }
        match (self.market_cap, self.current_price) {
            (Some(mc), Some(price)) if price > 0.0 => mc / price,
            _ => 0.0,
        }
    }
}

/// One year's normalized line items. Built from the three aligned
/// statements; this is the single place the zero/null policy is applied to
/// raw inputs.
#[derive(Debug, Clone, Default, PartialEq)]
struct YearInputs {
    fiscal_year: String,
    revenue: f64,
    adj_ebitda: f64,
    adj_ebit: f64,
    adj_net_income: f64,
    cfo: f64,
    capex: f64,
    total_debt: f64,
    cash: f64,
    total_equity: f64,
    total_assets: f64,
    income_tax: f64,
    interest_expense: f64,
}

impl YearInputs {
    /// Fold one aligned statement triple into derivation inputs. `None`
    /// when no fiscal-year label can be established for the position.
    fn from_statements(
        income: &IncomeStatement,
        balance: &BalanceSheet,
        cash_flow: &CashFlowStatement,
    ) -> Option<Self> {
        let fiscal_year = income.fiscal_year()?;
        let zero = |value: Option<f64>| value.unwrap_or(0.0);

        Some(Self {
            fiscal_year,
            revenue: zero(income.revenue),
            adj_ebitda: zero(income.ebitda),
            adj_ebit: zero(income.operating_income.or(income.ebit)),
            adj_net_income: zero(income.net_income),
            cfo: zero(cash_flow.operating_cash_flow),
            capex: zero(cash_flow.capital_expenditure).abs(),
            total_debt: zero(balance.total_debt),
            cash: zero(balance.cash_and_cash_equivalents),
            total_equity: zero(balance.total_stockholders_equity),
            total_assets: zero(balance.total_assets),
            income_tax: zero(income.income_tax_expense).abs(),
            interest_expense: zero(income.interest_expense).abs(),
        })
    }
}

/// Percentage of `numerator` over `denominator`, zero when the denominator
/// is not strictly positive.
fn pct_of(numerator: f64, denominator: f64) -> f64 {
    if denominator > 0.0 {
        numerator / denominator * 100.0
    } else {
        0.0
    }
}

/// Year-over-year growth in percent, zero when the prior value is not
/// strictly positive.
fn growth_pct(current: f64, prior: f64) -> f64 {
    if prior > 0.0 {
        (current - prior) / prior * 100.0
    } else {
        0.0
    }
}

/// Derive the actual-years panel from a statement bundle.
///
/// Statements are aligned positionally up to the shortest list, most
/// recent first. Every aligned year with a derivable fiscal-year label
/// yields exactly one row; nothing is dropped for having degenerate
/// values. The oldest year in the window always reports 0% growth; the
/// prior year it would compare against is outside the window.
pub fn derive_panel(bundle: &StatementBundle, market: &MarketContext) -> MetricsPanel {
    let mut panel = MetricsPanel::new();
    let window = bundle.aligned_len();

    for i in 0..window {
        let Some(inputs) = YearInputs::from_statements(
            &bundle.income[i],
            &bundle.balance[i],
            &bundle.cash_flow[i],
        ) else {
            continue;
        };

        let prior = (i + 1 < window).then(|| {
            YearInputs::from_statements(
                &bundle.income[i + 1],
                &bundle.balance[i + 1],
                &bundle.cash_flow[i + 1],
            )
        });

        let row = derive_year(&inputs, prior.flatten().as_ref(), market);
        panel.insert(inputs.fiscal_year, row);
    }

    panel
}

/// Derive a single year's metrics from normalized inputs.
fn derive_year(
    inputs: &YearInputs,
    prior: Option<&YearInputs>,
    market: &MarketContext,
) -> FiscalYearMetrics {
    let fcff = inputs.cfo - inputs.capex;
    let net_debt = inputs.total_debt - inputs.cash;
    let capital_employed = inputs.total_assets - inputs.cash;

    let shares = market.eps_shares();
    let adj_eps = if shares > 0.0 {
        inputs.adj_net_income / shares
    } else {
        0.0
    };

    let (revenue_growth, ebitda_growth, eps_growth) = match prior {
        Some(prior) => {
            let prior_eps = if shares > 0.0 {
                prior.adj_net_income / shares
            } else {
                0.0
            };
            (
                growth_pct(inputs.revenue, prior.revenue),
                growth_pct(inputs.adj_ebitda, prior.adj_ebitda),
                growth_pct(adj_eps, prior_eps),
            )
        }
        None => (0.0, 0.0, 0.0),
    };

    let pretax = inputs.adj_net_income + inputs.income_tax;
    let adj_tax_rate = pct_of(inputs.income_tax, pretax);

    let interest_cover = (inputs.interest_expense > 0.0)
        .then(|| inputs.adj_ebit / inputs.interest_expense);
    let net_debt_to_equity =
        (inputs.total_equity > 0.0).then(|| net_debt / inputs.total_equity * 100.0);
    let net_debt_to_ebitda = (inputs.adj_ebitda > 0.0).then(|| net_debt / inputs.adj_ebitda);

    // Valuation ratios exist only with a market cap; `None` here means
    // "not computable", not zero.
    let enterprise_value = market.market_cap.map(|mc| mc + net_debt);
    let fcff_yield = enterprise_value
        .filter(|ev| *ev > 0.0)
        .map(|ev| fcff / ev * 100.0);
    let ev_to_ebitda = enterprise_value
        .filter(|_| inputs.adj_ebitda > 0.0)
        .map(|ev| ev / inputs.adj_ebitda);
    let ev_to_revenue = enterprise_value
        .filter(|_| inputs.revenue > 0.0)
        .map(|ev| ev / inputs.revenue);
    let adj_pe = market
        .market_cap
        .and(market.current_price)
        .filter(|_| adj_eps > 0.0)
        .map(|price| price / adj_eps);

    FiscalYearMetrics {
        revenue: inputs.revenue / MILLIONS,
        adj_ebitda: inputs.adj_ebitda / MILLIONS,
        adj_ebit: inputs.adj_ebit / MILLIONS,
        adj_net_income: inputs.adj_net_income / MILLIONS,
        net_margin: pct_of(inputs.adj_net_income, inputs.revenue),
        ebitda_margin: pct_of(inputs.adj_ebitda, inputs.revenue),
        ebit_margin: pct_of(inputs.adj_ebit, inputs.revenue),
        adj_eps,
        revenue_growth,
        ebitda_growth,
        eps_growth,
        adj_tax_rate,
        cfo: inputs.cfo / MILLIONS,
        fcff: fcff / MILLIONS,
        roce: pct_of(inputs.adj_ebit, capital_employed),
        roe: pct_of(inputs.adj_net_income, inputs.total_equity),
        interest_cover,
        net_debt_to_equity,
        net_debt_to_ebitda,
        ev_to_ebitda,
        ev_to_revenue,
        adj_pe,
        fcff_yield,
        dividend_yield: None,
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use approx::assert_relative_eq;
    use rstest::rstest;

    /// Three years of round-number statements, most recent first.
    /// Revenue 100B/80B/64B, EBITDA 20B/16B/12.8B, net income 10B/8B/6.4B.
    fn sample_bundle() -> StatementBundle {
        let year = |label: i32, scale: f64| {
            (
                IncomeStatement {
                    date: Some(format!("{label}-12-31")),
                    calendar_year: Some(label.to_string()),
                    revenue: Some(100e9 * scale),
                    ebitda: Some(20e9 * scale),
                    operating_income: Some(15e9 * scale),
                    ebit: None,
                    net_income: Some(10e9 * scale),
                    income_tax_expense: Some(2.5e9 * scale),
                    interest_expense: Some(1e9 * scale),
                },
                BalanceSheet {
                    date: Some(format!("{label}-12-31")),
                    calendar_year: Some(label.to_string()),
                    total_debt: Some(30e9 * scale),
                    cash_and_cash_equivalents: Some(10e9 * scale),
                    total_stockholders_equity: Some(50e9 * scale),
                    total_assets: Some(110e9 * scale),
                },
                CashFlowStatement {
                    date: Some(format!("{label}-12-31")),
                    calendar_year: Some(label.to_string()),
                    operating_cash_flow: Some(18e9 * scale),
                    capital_expenditure: Some(-8e9 * scale),
                },
            )
        };

        let mut bundle = StatementBundle::default();
        for (label, scale) in [(2024, 1.0), (2023, 0.8), (2022, 0.64)] {
            let (income, balance, cash_flow) = year(label, scale);
            bundle.income.push(income);
            bundle.balance.push(balance);
            bundle.cash_flow.push(cash_flow);
        }
        bundle
    }

    fn market() -> MarketContext {
        MarketContext {
            market_cap: Some(1_000e9),
            shares_outstanding: Some(1e9),
            current_price: Some(1_000.0),
        }
    }

    #[test]
    fn test_one_row_per_aligned_year() {
        let panel = derive_panel(&sample_bundle(), &market());
        assert_eq!(panel.year_numbers(), vec![2022, 2023, 2024]);
    }

    #[test]
    fn test_latest_year_values() {
        let panel = derive_panel(&sample_bundle(), &market());
        let year = panel.get("2024").unwrap();

        assert_relative_eq!(year.revenue, 100_000.0);
        assert_relative_eq!(year.adj_ebitda, 20_000.0);
        assert_relative_eq!(year.adj_ebit, 15_000.0);
        assert_relative_eq!(year.adj_net_income, 10_000.0);
        assert_relative_eq!(year.net_margin, 10.0);
        assert_relative_eq!(year.ebitda_margin, 20.0);
        assert_relative_eq!(year.ebit_margin, 15.0);
        assert_relative_eq!(year.cfo, 18_000.0);
        // fcff = cfo - |capex| = 18B - 8B
        assert_relative_eq!(year.fcff, 10_000.0);
        assert_relative_eq!(year.adj_eps, 10.0);
        // tax rate = 2.5 / (10 + 2.5)
        assert_relative_eq!(year.adj_tax_rate, 20.0);
        // roce = 15 / (110 - 10); roe = 10 / 50
        assert_relative_eq!(year.roce, 15.0);
        assert_relative_eq!(year.roe, 20.0);
        // interest cover = 15 / 1; net debt = 20B
        assert_relative_eq!(year.interest_cover.unwrap(), 15.0);
        assert_relative_eq!(year.net_debt_to_equity.unwrap(), 40.0);
        assert_relative_eq!(year.net_debt_to_ebitda.unwrap(), 1.0);
        // ev = 1000B + 20B
        assert_relative_eq!(year.ev_to_ebitda.unwrap(), 51.0);
        assert_relative_eq!(year.ev_to_revenue.unwrap(), 10.2);
        assert_relative_eq!(year.fcff_yield.unwrap(), 10.0 / 1_020.0 * 100.0);
        assert_relative_eq!(year.adj_pe.unwrap(), 100.0);
        assert_eq!(year.dividend_yield, None);
    }

    #[test]
    fn test_growth_rates_and_oldest_year_boundary() {
        let panel = derive_panel(&sample_bundle(), &market());

        // 2024 grew 25% over 2023 on every top line.
        let latest = panel.get("2024").unwrap();
        assert_relative_eq!(latest.revenue_growth, 25.0, epsilon = 1e-9);
        assert_relative_eq!(latest.ebitda_growth, 25.0, epsilon = 1e-9);
        assert_relative_eq!(latest.eps_growth, 25.0, epsilon = 1e-9);

        // The most historic year in the window always reports 0% growth.
        let oldest = panel.get("2022").unwrap();
        assert_relative_eq!(oldest.revenue_growth, 0.0);
        assert_relative_eq!(oldest.ebitda_growth, 0.0);
        assert_relative_eq!(oldest.eps_growth, 0.0);
    }

    #[test]
    fn test_zero_revenue_margins_are_zero() {
        let mut bundle = sample_bundle();
        bundle.income[0].revenue = Some(0.0);

        let panel = derive_panel(&bundle, &market());
        let year = panel.get("2024").unwrap();

        assert_eq!(year.net_margin, 0.0);
        assert_eq!(year.ebitda_margin, 0.0);
        assert_eq!(year.ebit_margin, 0.0);
        assert!(year.net_margin.is_finite());
    }

    #[test]
    fn test_missing_line_items_normalize_to_zero() {
        let mut bundle = sample_bundle();
        bundle.income[0] = IncomeStatement {
            date: Some("2024-12-31".to_string()),
            ..Default::default()
        };
        bundle.balance[0] = BalanceSheet::default();
        bundle.cash_flow[0] = CashFlowStatement::default();

        let panel = derive_panel(&bundle, &market());
        let year = panel.get("2024").unwrap();

        // The row exists despite every input being absent.
        assert_eq!(year.revenue, 0.0);
        assert_eq!(year.adj_eps, 0.0);
        assert_eq!(year.interest_cover, None);
        assert_eq!(year.net_debt_to_ebitda, None);
    }

    #[test]
    fn test_valuation_null_without_market_cap() {
        let panel = derive_panel(&sample_bundle(), &MarketContext::none());
        let year = panel.get("2024").unwrap();

        assert_eq!(year.ev_to_ebitda, None);
        assert_eq!(year.ev_to_revenue, None);
        assert_eq!(year.adj_pe, None);
        assert_eq!(year.fcff_yield, None);
        // Non-market fields still derive normally.
        assert_relative_eq!(year.ebitda_margin, 20.0);
        // Without shares or price the EPS chain degrades to zero.
        assert_eq!(year.adj_eps, 0.0);
    }

    #[test]
    fn test_shares_implied_from_market_cap_and_price() {
        let context = MarketContext {
            market_cap: Some(1_000e9),
            shares_outstanding: None,
            current_price: Some(500.0),
        };
        let panel = derive_panel(&sample_bundle(), &context);
        // 2B implied shares -> EPS = 10B / 2B
        assert_relative_eq!(panel.get("2024").unwrap().adj_eps, 5.0);
    }

    #[test]
    fn test_negative_equity_nulls_leverage() {
        let mut bundle = sample_bundle();
        bundle.balance[0].total_stockholders_equity = Some(-5e9);

        let panel = derive_panel(&bundle, &market());
        let year = panel.get("2024").unwrap();

        assert_eq!(year.net_debt_to_equity, None);
        assert_eq!(year.roe, 0.0);
    }

    #[test]
    fn test_alignment_stops_at_shortest_list() {
        let mut bundle = sample_bundle();
        bundle.cash_flow.truncate(2);

        let panel = derive_panel(&bundle, &market());
        assert_eq!(panel.year_numbers(), vec![2023, 2024]);
    }

    #[test]
    fn test_unlabelable_year_is_skipped() {
        let mut bundle = sample_bundle();
        bundle.income[1].date = None;
        bundle.income[1].calendar_year = None;

        let panel = derive_panel(&bundle, &market());
        assert_eq!(panel.year_numbers(), vec![2022, 2024]);
    }

    #[rstest]
    #[case(0.0, 0.0, 0.0)]
    #[case(10.0, 0.0, 0.0)]
    #[case(10.0, -5.0, 0.0)]
    #[case(12.0, 10.0, 20.0)]
    fn test_growth_pct_policy(#[case] current: f64, #[case] prior: f64, #[case] expected: f64) {
        assert_relative_eq!(growth_pct(current, prior), expected);
    }

    #[rstest]
    #[case(5.0, 0.0, 0.0)]
    #[case(5.0, -1.0, 0.0)]
    #[case(5.0, 50.0, 10.0)]
    fn test_pct_of_policy(#[case] numerator: f64, #[case] denominator: f64, #[case] expected: f64) {
        assert_relative_eq!(pct_of(numerator, denominator), expected);
    }
}
