#![doc = include_str!("../README.md")]
#![doc(issue_tracker_base_url = "https://github.com/factordynamics/hobart/issues/")]
#![cfg_attr(docsrs, feature(doc_cfg, doc_auto_cfg))]
#![warn(missing_docs)]
#![forbid(unsafe_code)]

pub mod export;
pub mod narrative;
pub mod payload;

pub use export::{ExportError, ExportFormat};
pub use narrative::Narrative;
pub use payload::{MetricsSection, PayloadBuilder, ReportError, ReportPayload};

/// Version information.
pub const VERSION: &str = env!("CARGO_PKG_VERSION");
