//! Prometheus metrics exporter
//!
//! Pushes pool counter snapshots into the `metrics` facade, backed by a
//! Prometheus recorder whose text exposition the caller can render.

use anyhow::Result;
use metrics::{counter, describe_counter, describe_gauge, gauge};
use metrics_exporter_prometheus::{PrometheusBuilder, PrometheusHandle};

use super::counters::MetricsSnapshot;
use crate::config::MetricsConfig;

/// Install the Prometheus recorder globally and describe the pool metrics
pub fn init_metrics(config: &MetricsConfig) -> Result<PrometheusHandle> {
    let handle = PrometheusBuilder::new().install_recorder()?;
    describe_metrics(&config.prefix);
    Ok(handle)
}

/// Register metric descriptions under `prefix`
pub fn describe_metrics(prefix: &str) {
    describe_counter!(format!("{prefix}_allocations_total"), "Successful allocations");
    describe_counter!(
        format!("{prefix}_allocation_misses_total"),
        "Allocations that found no free run"
    );
    describe_counter!(format!("{prefix}_recycles_total"), "Buffers returned via recycle");
    describe_counter!(
        format!("{prefix}_drop_returns_total"),
        "Buffers returned by being dropped"
    );
    describe_counter!(
        format!("{prefix}_recycle_misses_total"),
        "Recycled buffers no page recognised"
    );
    describe_counter!(
        format!("{prefix}_release_rejections_total"),
        "Releases refused by the owning page"
    );
    describe_gauge!(format!("{prefix}_chunks_in_use"), "Chunks currently allocated");
}

/// Publish a snapshot; counters are set to their absolute values
pub fn publish(prefix: &str, snapshot: &MetricsSnapshot) {
    counter!(format!("{prefix}_allocations_total")).absolute(snapshot.allocations);
    counter!(format!("{prefix}_allocation_misses_total")).absolute(snapshot.allocation_misses);
    counter!(format!("{prefix}_recycles_total")).absolute(snapshot.recycles);
    counter!(format!("{prefix}_drop_returns_total")).absolute(snapshot.drop_returns);
    counter!(format!("{prefix}_recycle_misses_total")).absolute(snapshot.recycle_misses);
    counter!(format!("{prefix}_release_rejections_total")).absolute(snapshot.release_rejections);
    gauge!(format!("{prefix}_chunks_in_use")).set(snapshot.chunks_in_use as f64);
}
