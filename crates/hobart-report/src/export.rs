//! Payload export.
//!
//! The presentation layer is an external collaborator; what crosses the
//! boundary is a JSON payload, with the metrics panel additionally
//! exportable as CSV for tabular consumers.

use std::fs::File;
use std::io::Write;
use std::path::Path;
use thiserror::Error;

use crate::payload::{MetricsSection, ReportPayload};

/// Errors that can occur during export operations.
#[derive(Debug, Error)]
pub enum ExportError {
    /// CSV serialization error.
    #[error("CSV serialization error: {0}")]
    Csv(#[from] csv::Error),

    /// JSON serialization error.
    #[error("JSON serialization error: {0}")]
    Json(#[from] serde_json::Error),

    /// IO error.
    #[error("IO error: {0}")]
    Io(#[from] std::io::Error),

    /// Invalid format error.
    #[error("Invalid format: {0}")]
    InvalidFormat(String),

    /// The payload lacks the section the export needs.
    #[error("Missing section: {0}")]
    MissingSection(String),
}

/// Export format options.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum ExportFormat {
    /// Comma-separated values of the metrics panel.
    Csv,

    /// Compact JSON payload.
    Json,

    /// Pretty-printed JSON payload.
    PrettyJson,
}

impl ExportFormat {
    /// Get the file extension for this format.
    pub const fn extension(&self) -> &str {
        match self {
            Self::Csv => "csv",
            Self::Json | Self::PrettyJson => "json",
        }
    }

    /// Parse a format name as given on a command line.
    pub fn parse(name: &str) -> Result<Self, ExportError> {
        match name {
            "csv" => Ok(Self::Csv),
            "json" => Ok(Self::Json),
            "pretty-json" | "pretty_json" => Ok(Self::PrettyJson),
            other => Err(ExportError::InvalidFormat(other.to_string())),
        }
    }
}

/// CSV column order for the metrics panel.
const CSV_COLUMNS: [&str; 26] = [
    "fiscal_year",
    "basis",
    "revenue",
    "adj_ebitda",
    "adj_ebit",
    "adj_net_income",
    "net_margin",
    "ebitda_margin",
    "ebit_margin",
    "adj_eps",
    "revenue_growth",
    "ebitda_growth",
    "eps_growth",
    "adj_tax_rate",
    "cfo",
    "fcff",
    "roce",
    "roe",
    "interest_cover",
    "net_debt_to_equity",
    "net_debt_to_ebitda",
    "ev_to_ebitda",
    "ev_to_revenue",
    "adj_pe",
    "fcff_yield",
    "dividend_yield",
];

/// Render an exported payload to a string.
pub fn render(payload: &ReportPayload, format: ExportFormat) -> Result<String, ExportError> {
    match format {
        ExportFormat::Json => Ok(serde_json::to_string(payload)?),
        ExportFormat::PrettyJson => Ok(serde_json::to_string_pretty(payload)?),
        ExportFormat::Csv => {
            let metrics = payload
                .metrics
                .as_ref()
                .ok_or_else(|| ExportError::MissingSection("metrics".to_string()))?;
            metrics_csv(metrics)
        }
    }
}

/// Write an exported payload to a file.
pub fn export_to_path<P: AsRef<Path>>(
    payload: &ReportPayload,
    format: ExportFormat,
    path: P,
) -> Result<(), ExportError> {
    let rendered = render(payload, format)?;
    let mut file = File::create(path)?;
    file.write_all(rendered.as_bytes())?;
    Ok(())
}

/// Render the metrics panel as CSV, one row per year, actuals first.
pub fn metrics_csv(section: &MetricsSection) -> Result<String, ExportError> {
    let mut writer = csv::Writer::from_writer(vec![]);
    writer.write_record(CSV_COLUMNS)?;

    for year in section.ordered_years() {
        let Some(row) = section.metrics.get(year) else {
            continue;
        };
        let basis = if section.forecast_years.contains(year) {
            "forecast"
        } else {
            "actual"
        };

        let number = |value: f64| format!("{value:.4}");
        let nullable = |value: Option<f64>| value.map(number).unwrap_or_default();

        writer.write_record([
            year.clone(),
            basis.to_string(),
            number(row.revenue),
            number(row.adj_ebitda),
            number(row.adj_ebit),
            number(row.adj_net_income),
            number(row.net_margin),
            number(row.ebitda_margin),
            number(row.ebit_margin),
            number(row.adj_eps),
            number(row.revenue_growth),
            number(row.ebitda_growth),
            number(row.eps_growth),
            number(row.adj_tax_rate),
            number(row.cfo),
            number(row.fcff),
            number(row.roce),
            number(row.roe),
            nullable(row.interest_cover),
            nullable(row.net_debt_to_equity),
            nullable(row.net_debt_to_ebitda),
            nullable(row.ev_to_ebitda),
            nullable(row.ev_to_revenue),
            nullable(row.adj_pe),
            nullable(row.fcff_yield),
            nullable(row.dividend_yield),
        ])?;
    }

    let bytes = writer
        .into_inner()
        .map_err(|e| ExportError::InvalidFormat(e.to_string()))?;
    String::from_utf8(bytes).map_err(|e| ExportError::InvalidFormat(e.to_string()))
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::payload::PayloadBuilder;
    use hobart_metrics::{FiscalYearMetrics, MetricsPanel};

    fn payload() -> ReportPayload {
        let mut panel = MetricsPanel::new();
        panel.insert(
            "2024".to_string(),
            FiscalYearMetrics {
                revenue: 97_690.0,
                ev_to_ebitda: Some(51.0),
                ..Default::default()
            },
        );
        panel.insert(
            "2025".to_string(),
            FiscalYearMetrics {
                revenue: 110_000.0,
                ..Default::default()
            },
        );
        PayloadBuilder::new("TSLA")
            .metrics(Some(&panel), Some(2024))
            .build()
    }

    #[test]
    fn test_format_parse_and_extension() {
        assert_eq!(ExportFormat::parse("csv").unwrap(), ExportFormat::Csv);
        assert_eq!(
            ExportFormat::parse("pretty-json").unwrap(),
            ExportFormat::PrettyJson
        );
        assert!(matches!(
            ExportFormat::parse("xlsx"),
            Err(ExportError::InvalidFormat(_))
        ));
        assert_eq!(ExportFormat::Csv.extension(), "csv");
        assert_eq!(ExportFormat::PrettyJson.extension(), "json");
    }

    #[test]
    fn test_csv_rows_and_nulls() {
        let csv = render(&payload(), ExportFormat::Csv).unwrap();
        let mut lines = csv.lines();

        let header = lines.next().unwrap();
        assert!(header.starts_with("fiscal_year,basis,revenue"));

        let actual = lines.next().unwrap();
        assert!(actual.starts_with("2024,actual,97690.0000"));
        assert!(actual.contains("51.0000"));

        let forecast = lines.next().unwrap();
        assert!(forecast.starts_with("2025,forecast,110000.0000"));
        // Nullable fields render empty, not zero.
        assert!(forecast.ends_with(",,,"));

        assert!(lines.next().is_none());
    }

    #[test]
    fn test_csv_requires_metrics_section() {
        let empty = PayloadBuilder::new("TSLA").build();
        assert!(matches!(
            render(&empty, ExportFormat::Csv),
            Err(ExportError::MissingSection(_))
        ));
    }

    #[test]
    fn test_json_roundtrip() {
        let payload = payload();
        let json = render(&payload, ExportFormat::Json).unwrap();
        let restored: ReportPayload = serde_json::from_str(&json).unwrap();
        assert_eq!(restored, payload);
    }
}
