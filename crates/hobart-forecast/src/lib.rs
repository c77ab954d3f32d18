#![doc = include_str!("../README.md")]
#![doc(issue_tracker_base_url = "https://github.com/factordynamics/hobart/issues/")]
#![cfg_attr(docsrs, feature(doc_cfg, doc_auto_cfg))]
#![warn(missing_docs)]
#![forbid(unsafe_code)]

pub mod capability;
pub mod fallback;
pub mod orchestrator;
pub mod prompt;

pub use capability::{CapabilityError, ChatClient, ForecastCapability, NullCapability};
pub use orchestrator::{
    ForecastError, ForecastOrchestrator, ForecastRun, ForecastSource, YearOutcome,
};

/// Version information.
pub const VERSION: &str = env!("CARGO_PKG_VERSION");
