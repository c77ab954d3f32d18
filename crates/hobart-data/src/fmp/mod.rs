//! Market-data API client.
//!
//! Speaks to an FMP-style JSON API: company profile, quote, shares float,
//! analyst consensus, end-of-day price history and the three financial
//! statements. All calls are blocking with an explicit timeout; the
//! pipeline is single-threaded by design.

mod client;
mod snapshot;

pub use client::{FmpClient, HistoricalBar};
