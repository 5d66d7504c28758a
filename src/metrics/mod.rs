//! Metrics and observability
//!
//! Per-pool atomic counters for the hot path, exported through a
//! Prometheus recorder on demand.

mod counters;
mod exporter;

pub use counters::{MetricsSnapshot, PoolMetrics};
pub use exporter::{describe_metrics, init_metrics, publish};
