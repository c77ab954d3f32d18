//! Process configuration.
//!
//! Built once at startup from the environment (a `.env` file is honored)
//! and passed by reference into each component constructor. There is no
//! ambient global state.

use std::path::PathBuf;
use thiserror::Error;

/// Errors raised while loading configuration.
#[derive(Debug, Error)]
pub enum ConfigError {
    /// A required environment variable is absent.
    #[error("{0} environment variable required")]
    MissingVar(&'static str),

    /// An environment variable failed to parse.
    #[error("invalid value for {name}: {value}")]
    InvalidVar {
        /// Variable name
        name: &'static str,
        /// Rejected value
        value: String,
    },
}

/// Process-wide configuration.
#[derive(Debug, Clone)]
pub struct Config {
    /// Market-data API key (required)
    pub fmp_api_key: String,
    /// Market-data API base URL override
    pub fmp_base_url: Option<String>,
    /// News API key; news collection is skipped without one
    pub finnhub_api_key: Option<String>,
    /// Chat-capability API key; forecasts fall back to carry-forward
    /// without one
    pub openai_api_key: Option<String>,
    /// Chat model name
    pub model: String,
    /// Chat sampling temperature
    pub temperature: f32,
    /// SQLite cache location
    pub cache_path: PathBuf,
    /// Benchmark index for price performance
    pub base_index: String,
    /// Forecast horizon in fiscal years
    pub horizon_years: u32,
    /// Price performance lookback in calendar days
    pub lookback_days: u64,
}

impl Config {
    /// Load configuration from environment variables, honoring a `.env`
    /// file when present.
    pub fn from_env() -> Result<Self, ConfigError> {
        dotenvy::dotenv().ok();

        let fmp_api_key =
            std::env::var("FMP_API_KEY").map_err(|_| ConfigError::MissingVar("FMP_API_KEY"))?;

        Ok(Self {
            fmp_api_key,
            fmp_base_url: std::env::var("FMP_BASE_URL").ok(),
            finnhub_api_key: std::env::var("FINNHUB_API_KEY").ok(),
            openai_api_key: std::env::var("OPENAI_API_KEY").ok(),
            model: std::env::var("OPENAI_MODEL").unwrap_or_else(|_| "gpt-4".to_string()),
            temperature: parse_var("HOBART_TEMPERATURE", 0.3)?,
            cache_path: std::env::var("HOBART_CACHE_PATH")
                .map(PathBuf::from)
                .unwrap_or_else(|_| default_cache_path()),
            base_index: std::env::var("HOBART_BASE_INDEX").unwrap_or_else(|_| "SPY".to_string()),
            horizon_years: parse_var("HOBART_FORECAST_YEARS", 2)?,
            lookback_days: parse_var("HOBART_LOOKBACK_DAYS", 365)?,
        })
    }
}

fn default_cache_path() -> PathBuf {
    dirs::data_dir()
        .unwrap_or_else(|| PathBuf::from("."))
        .join("hobart")
        .join("cache.db")
}

fn parse_var<T: std::str::FromStr>(name: &'static str, default: T) -> Result<T, ConfigError> {
    match std::env::var(name) {
        Ok(value) => value
            .parse()
            .map_err(|_| ConfigError::InvalidVar { name, value }),
        Err(_) => Ok(default),
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_default_cache_path_is_namespaced() {
        let path = default_cache_path();
        assert!(path.ends_with("hobart/cache.db"));
    }

    #[test]
    fn test_parse_var_default_when_unset() {
        let value: u32 = parse_var("HOBART_TEST_UNSET_VAR", 7).unwrap();
        assert_eq!(value, 7);
    }
}
