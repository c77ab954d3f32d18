//! Financial statement wire records.
//!
//! The statement provider returns flat JSON maps, most recent period first.
//! Every line item is optional on the wire; the zero/null normalization
//! happens once, downstream, when a year's three statements are folded into
//! derivation inputs.

use serde::{Deserialize, Serialize};

use crate::error::Result;

/// Reporting periodicity for statement requests.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
pub enum Periodicity {
    /// Annual reports
    Annual,
    /// Quarterly reports
    Quarterly,
}

impl Periodicity {
    /// Query-parameter value expected by the statement provider.
    pub const fn as_query_str(&self) -> &'static str {
        match self {
            Self::Annual => "annual",
            Self::Quarterly => "quarter",
        }
    }
}

/// Extract a 4-digit fiscal-year label from a statement's date field,
/// falling back to the provider's calendar-year field.
fn fiscal_year_label(date: Option<&str>, calendar_year: Option<&str>) -> Option<String> {
    if let Some(prefix) = date.and_then(|date| date.get(..4)) {
        if prefix.chars().all(|c| c.is_ascii_digit()) {
            return Some(prefix.to_string());
        }
    }
    calendar_year
        .filter(|year| !year.is_empty())
        .map(str::to_string)
}

/// One income statement period.
#[derive(Debug, Clone, Default, PartialEq, Serialize, Deserialize)]
#[serde(default, rename_all = "camelCase")]
pub struct IncomeStatement {
    /// Period end date (YYYY-MM-DD)
    pub date: Option<String>,
    /// Provider-reported calendar year
    pub calendar_year: Option<String>,
    /// Revenue
    pub revenue: Option<f64>,
    /// EBITDA
    pub ebitda: Option<f64>,
    /// Operating income
    pub operating_income: Option<f64>,
    /// EBIT, where reported separately from operating income
    pub ebit: Option<f64>,
    /// Net income
    pub net_income: Option<f64>,
    /// Income tax expense
    pub income_tax_expense: Option<f64>,
    /// Interest expense
    pub interest_expense: Option<f64>,
}

impl IncomeStatement {
    /// Fiscal-year label for this period, when derivable.
    pub fn fiscal_year(&self) -> Option<String> {
        fiscal_year_label(self.date.as_deref(), self.calendar_year.as_deref())
    }
}

/// One balance sheet period.
#[derive(Debug, Clone, Default, PartialEq, Serialize, Deserialize)]
#[serde(default, rename_all = "camelCase")]
pub struct BalanceSheet {
    /// Period end date (YYYY-MM-DD)
    pub date: Option<String>,
    /// Provider-reported calendar year
    pub calendar_year: Option<String>,
    /// Total debt
    pub total_debt: Option<f64>,
    /// Cash and cash equivalents
    pub cash_and_cash_equivalents: Option<f64>,
    /// Total stockholders equity
    pub total_stockholders_equity: Option<f64>,
    /// Total assets
    pub total_assets: Option<f64>,
}

/// One cash flow statement period.
#[derive(Debug, Clone, Default, PartialEq, Serialize, Deserialize)]
#[serde(default, rename_all = "camelCase")]
pub struct CashFlowStatement {
    /// Period end date (YYYY-MM-DD)
    pub date: Option<String>,
    /// Provider-reported calendar year
    pub calendar_year: Option<String>,
    /// Operating cash flow
    pub operating_cash_flow: Option<f64>,
    /// Capital expenditure (providers report this negative)
    pub capital_expenditure: Option<f64>,
}

/// The three statement lists for a ticker, most recent period first.
///
/// The lists may differ in length; derivation aligns them positionally up
/// to the shortest one.
#[derive(Debug, Clone, Default, PartialEq)]
pub struct StatementBundle {
    /// Income statements
    pub income: Vec<IncomeStatement>,
    /// Balance sheets
    pub balance: Vec<BalanceSheet>,
    /// Cash flow statements
    pub cash_flow: Vec<CashFlowStatement>,
}

impl StatementBundle {
    /// Number of positions where all three statements are present.
    pub fn aligned_len(&self) -> usize {
        self.income
            .len()
            .min(self.balance.len())
            .min(self.cash_flow.len())
    }

    /// Whether no aligned period exists at all.
    pub fn is_empty(&self) -> bool {
        self.aligned_len() == 0
    }
}

/// Source of financial statements for a ticker.
///
/// Implemented by the production market-data client; tests substitute
/// in-memory stubs.
pub trait StatementSource {
    /// Fetch up to `limit` periods of all three statements, most recent
    /// first.
    fn fetch_statements(
        &self,
        ticker: &str,
        periodicity: Periodicity,
        limit: usize,
    ) -> Result<StatementBundle>;
}

#[cfg(test)]
mod tests {
    use super::*;
    use rstest::rstest;

    #[rstest]
    #[case(Some("2024-12-31"), None, Some("2024"))]
    #[case(Some("2024-12-31"), Some("2023"), Some("2024"))]
    #[case(None, Some("2023"), Some("2023"))]
    #[case(Some("bad"), Some("2023"), Some("2023"))]
    #[case(None, None, None)]
    #[case(None, Some(""), None)]
    fn test_fiscal_year_label(
        #[case] date: Option<&str>,
        #[case] calendar_year: Option<&str>,
        #[case] expected: Option<&str>,
    ) {
        assert_eq!(
            fiscal_year_label(date, calendar_year),
            expected.map(str::to_string)
        );
    }

    #[test]
    fn test_statement_deserialization_camel_case() {
        let json = r#"{
            "date": "2024-12-31",
            "calendarYear": "2024",
            "revenue": 97690000000.0,
            "operatingIncome": 7076000000.0,
            "netIncome": 7091000000.0,
            "incomeTaxExpense": 1837000000.0
        }"#;

        let income: IncomeStatement = serde_json::from_str(json).unwrap();
        assert_eq!(income.fiscal_year(), Some("2024".to_string()));
        assert_eq!(income.revenue, Some(97_690_000_000.0));
        assert_eq!(income.operating_income, Some(7_076_000_000.0));
        // Fields absent on the wire stay None.
        assert_eq!(income.ebitda, None);
        assert_eq!(income.interest_expense, None);
    }

    #[test]
    fn test_bundle_alignment() {
        let bundle = StatementBundle {
            income: vec![IncomeStatement::default(); 3],
            balance: vec![BalanceSheet::default(); 2],
            cash_flow: vec![CashFlowStatement::default(); 3],
        };
        assert_eq!(bundle.aligned_len(), 2);
        assert!(!bundle.is_empty());
        assert!(StatementBundle::default().is_empty());
    }
}
