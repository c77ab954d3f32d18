//! Hobart CLI binary.
//!
//! Provides the command-line interface for the Hobart equity report
//! pipeline.

use chrono::NaiveDate;
use clap::{Parser, Subcommand};
use indicatif::{ProgressBar, ProgressStyle};
use std::path::PathBuf;
use std::process;
use std::time::Duration;
use tracing_subscriber::EnvFilter;

use hobart::forecast::{ForecastOrchestrator, NullCapability};
use hobart::metrics::MetricsPanel;
use hobart::{Config, Pipeline, RunOptions};
use hobart_report::export::{self, ExportFormat};
use hobart_report::narrative::try_generate_narrative;
use hobart_report::payload::PayloadBuilder;

#[derive(Parser)]
#[command(name = "hobart")]
#[command(about = "Hobart: equity research report data pipeline", long_about = None)]
#[command(version)]
struct Cli {
    #[command(subcommand)]
    command: Commands,
}

#[derive(Subcommand)]
enum Commands {
    /// Build the full report payload for a ticker
    Report {
        /// Stock symbol
        ticker: String,

        /// Company display name (defaults to the ticker)
        #[arg(long)]
        company: Option<String>,

        /// Output file (stdout when omitted)
        #[arg(long)]
        output: Option<PathBuf>,

        /// Output format: json, pretty-json or csv
        #[arg(long, default_value = "pretty-json")]
        format: String,

        /// Price performance range start (YYYY-MM-DD)
        #[arg(long)]
        start: Option<NaiveDate>,

        /// Price performance range end (YYYY-MM-DD)
        #[arg(long)]
        end: Option<NaiveDate>,

        /// Snapshot date (YYYY-MM-DD)
        #[arg(long)]
        as_of: Option<NaiveDate>,

        /// Disable caching (always fetch fresh data)
        #[arg(long)]
        no_cache: bool,

        /// Regenerate forecast years even when cached
        #[arg(long)]
        refresh_forecasts: bool,

        /// Skip news collection
        #[arg(long)]
        skip_news: bool,

        /// Skip narrative generation
        #[arg(long)]
        skip_narrative: bool,
    },

    /// Warm the cache for a ticker with fresh data
    Update {
        /// Stock symbol
        ticker: String,
    },

    /// Resolve forecast years for a ticker's cached panel
    Forecast {
        /// Stock symbol
        ticker: String,

        /// Forecast horizon in fiscal years
        #[arg(long, default_value = "2")]
        horizon: u32,

        /// Regenerate even when the years already exist
        #[arg(long)]
        force: bool,

        /// Skip the chat capability and carry forward deterministically
        #[arg(long)]
        offline: bool,
    },

    /// Cache maintenance
    Cache {
        /// Show cache statistics
        #[arg(long)]
        stats: bool,

        /// Clear all cached data for a ticker
        #[arg(long)]
        clear: Option<String>,
    },
}

fn main() {
    tracing_subscriber::fmt()
        .with_env_filter(
            EnvFilter::try_from_default_env().unwrap_or_else(|_| EnvFilter::new("info")),
        )
        .with_target(false)
        .init();

    if let Err(e) = run() {
        eprintln!("Error: {e}");
        process::exit(1);
    }
}

fn run() -> Result<(), Box<dyn std::error::Error>> {
    let cli = Cli::parse();
    let config = Config::from_env()?;

    match cli.command {
        Commands::Report {
            ticker,
            company,
            output,
            format,
            start,
            end,
            as_of,
            no_cache,
            refresh_forecasts,
            skip_news,
            skip_narrative,
        } => {
            let format = ExportFormat::parse(&format)?;
            let options = RunOptions {
                start_date: start,
                end_date: end,
                as_of_date: as_of,
                use_cache: !no_cache,
                force_forecasts: refresh_forecasts,
                skip_news,
            };
            build_report(
                &config,
                &ticker,
                company.as_deref(),
                output.as_deref(),
                format,
                &options,
                skip_narrative,
            )?;
        }
        Commands::Update { ticker } => {
            let pipeline = Pipeline::new(&config)?;
            let options = RunOptions {
                use_cache: false,
                ..Default::default()
            };
            let data = pipeline.run(&ticker, &options)?;
            print_run_summary(&data);
        }
        Commands::Forecast {
            ticker,
            horizon,
            force,
            offline,
        } => {
            run_forecast(&config, &ticker, horizon, force, offline)?;
        }
        Commands::Cache { stats, clear } => {
            let pipeline = Pipeline::new(&config)?;
            if let Some(ticker) = clear {
                pipeline.cache().clear_ticker(&ticker)?;
                println!("Cleared cached data for {ticker}");
            }
            if stats {
                let stats = pipeline.cache().stats()?;
                println!("Cache statistics:");
                println!("  price performance series: {}", stats.price_performance);
                println!("  company snapshots:        {}", stats.company_snapshots);
                println!("  metrics panels:           {}", stats.metrics_panels);
                println!("  news items:               {}", stats.news_items);
            }
        }
    }

    Ok(())
}

fn spinner(message: &str) -> ProgressBar {
    let pb = ProgressBar::new_spinner();
    pb.set_style(
        ProgressStyle::with_template("{spinner} {msg}").expect("static template is valid"),
    );
    pb.set_message(message.to_string());
    pb.enable_steady_tick(Duration::from_millis(120));
    pb
}

#[allow(clippy::too_many_arguments)]
fn build_report(
    config: &Config,
    ticker: &str,
    company: Option<&str>,
    output: Option<&std::path::Path>,
    format: ExportFormat,
    options: &RunOptions,
    skip_narrative: bool,
) -> Result<(), Box<dyn std::error::Error>> {
    let pipeline = Pipeline::new(config)?;

    let pb = spinner(&format!("Pulling report data for {ticker}..."));
    let data = pipeline.run(ticker, options)?;
    pb.finish_and_clear();
    print_run_summary(&data);

    let mut builder = PayloadBuilder::new(ticker)
        .snapshot(data.snapshot)
        .price_performance(data.price_performance)
        .metrics(data.panel.as_ref(), data.latest_actual_year)
        .news(data.news);
    if let Some(company) = company {
        builder = builder.company_name(company);
    }
    let mut payload = builder.build();

    if !skip_narrative {
        if let Some(chat) = pipeline.chat() {
            let pb = spinner("Generating analyst narrative...");
            payload.narrative = try_generate_narrative(chat, &payload);
            pb.finish_and_clear();
        }
    }

    match output {
        Some(path) => {
            export::export_to_path(&payload, format, path)?;
            println!("Report payload written to {}", path.display());
        }
        None => {
            println!("{}", export::render(&payload, format)?);
        }
    }

    Ok(())
}

fn run_forecast(
    config: &Config,
    ticker: &str,
    horizon: u32,
    force: bool,
    offline: bool,
) -> Result<(), Box<dyn std::error::Error>> {
    let pipeline = Pipeline::new(config)?;

    let panel = match pipeline.cache().get_key_metrics(ticker)? {
        Some(record) => MetricsPanel::from_store(&record.fiscal_year_end, &record.metrics_json)?,
        None => {
            eprintln!("No cached key metrics for {ticker}; run `hobart report {ticker}` first");
            process::exit(1);
        }
    };

    let statements = pipeline.statements();
    let pb = spinner(&format!("Resolving forecast years for {ticker}..."));
    let run = match (offline, pipeline.chat()) {
        (false, Some(chat)) => ForecastOrchestrator::new(statements, chat, pipeline.cache())
            .with_horizon(horizon)
            .force_regenerate(force)
            .ensure_forecast_years(ticker, panel)?,
        _ => ForecastOrchestrator::new(statements, &NullCapability, pipeline.cache())
            .with_horizon(horizon)
            .force_regenerate(force)
            .ensure_forecast_years(ticker, panel)?,
    };
    pb.finish_and_clear();

    println!("Latest actual fiscal year: {}", run.latest_actual_year);
    for outcome in &run.outcomes {
        println!("  FY{}: {:?}", outcome.year, outcome.source);
    }

    Ok(())
}

fn print_run_summary(data: &hobart::ReportData) {
    println!("Report data for {}:", data.ticker);
    match &data.price_performance {
        Some(series) => println!(
            "  price performance: {} points vs {}",
            series.stock_series.len(),
            series.base_index
        ),
        None => println!("  price performance: unavailable"),
    }
    match &data.snapshot {
        Some(snapshot) => println!(
            "  snapshot: as of {} (market cap {})",
            snapshot.as_of_date,
            snapshot
                .market_cap
                .map(|mc| format!("{mc:.0}"))
                .unwrap_or_else(|| "n/a".to_string())
        ),
        None => println!("  snapshot: unavailable"),
    }
    match (&data.panel, data.latest_actual_year) {
        (Some(panel), Some(latest)) => println!(
            "  metrics: {} actual years, {} forecast years",
            panel.actual_years(latest).len(),
            panel.forecast_years(latest).len()
        ),
        (Some(panel), None) => println!("  metrics: {} years", panel.year_numbers().len()),
        _ => println!("  metrics: unavailable"),
    }
    if !data.news.is_empty() {
        println!("  news: {} items", data.news.len());
    }
}
