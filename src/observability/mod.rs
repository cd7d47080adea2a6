//! Logging and metrics for the log manager.
//!
//! Background servers have no return path to a caller, so the structured
//! logger is their failure channel; the counter registry is the passive
//! observability surface exposed through the manager.

mod logger;
mod metrics;

pub use logger::{Logger, Severity};
pub use metrics::LogMetrics;
