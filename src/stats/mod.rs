//! Client statistics

pub mod metrics;

pub use metrics::{ClientStats, StatsSnapshot};
