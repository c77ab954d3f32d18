//! SQLite report cache and the completeness gate.

pub mod completeness;
pub mod sqlite;

pub use completeness::CompletenessPolicy;
pub use sqlite::{CacheStats, KeyMetricsRecord, ReportCache};
