//! pagepool - Stress driver
//!
//! Hammers one buffer pool from several threads and reports the counters.

use anyhow::{anyhow, Context, Result};
use std::collections::VecDeque;
use std::path::PathBuf;
use std::thread::{self, ScopedJoinHandle};
use std::time::Instant;
use tracing::{error, info, warn};

use pagepool::config::StressConfig;
use pagepool::{BufferPool, Config, VERSION};

/// What one worker saw
#[derive(Debug, Default)]
struct WorkerReport {
    completed: u64,
    misses: u64,
    corrupted: u64,
}

fn main() -> Result<()> {
    let config_path = std::env::args()
        .nth(1)
        .map(PathBuf::from)
        .unwrap_or_else(|| PathBuf::from("pagepool.toml"));

    let config = Config::load_or_default(&config_path)
        .with_context(|| format!("Failed to load config from {:?}", config_path))?;

    pagepool::util::init_tracing(&config.logging)?;

    info!(
        version = VERSION,
        config_path = ?config_path,
        "Starting pagepool stress run"
    );

    let prometheus = if config.metrics.enabled {
        let handle = pagepool::metrics::init_metrics(&config.metrics)
            .context("Failed to install metrics recorder")?;
        info!(prefix = %config.metrics.prefix, "Metrics recorder installed");
        Some(handle)
    } else {
        None
    };

    let pool = BufferPool::from_config(&config.pool).context("Failed to build buffer pool")?;
    let workers = config.stress.effective_workers();
    let started = Instant::now();

    let reports: Vec<WorkerReport> = thread::scope(|scope| -> Result<Vec<WorkerReport>> {
        let handles: Vec<_> = (0..workers)
            .map(|worker| {
                let pool = &pool;
                let stress = &config.stress;
                scope.spawn(move || run_worker(pool, worker, stress))
            })
            .collect();

        join_workers(handles)
    })?;

    let elapsed = started.elapsed();
    let completed: u64 = reports.iter().map(|r| r.completed).sum();
    let misses: u64 = reports.iter().map(|r| r.misses).sum();
    let corrupted: u64 = reports.iter().map(|r| r.corrupted).sum();
    let stats = pool.stats();

    info!(
        workers,
        completed,
        misses,
        elapsed_ms = elapsed.as_millis() as u64,
        ops_per_sec = (completed as f64 / elapsed.as_secs_f64()) as u64,
        allocations = stats.allocations,
        recycles = stats.recycles,
        chunks_in_use = stats.chunks_in_use,
        "Stress run finished"
    );

    if let Some(handle) = &prometheus {
        pagepool::metrics::publish(&config.metrics.prefix, &stats);
        info!(exposition = %handle.render(), "Pool metrics");
    }

    if corrupted > 0 {
        error!(corrupted, "Buffers were overwritten while held");
        anyhow::bail!("{corrupted} buffers were corrupted");
    }
    if pool.used_bytes() != 0 {
        anyhow::bail!("{} bytes still marked used after run", pool.used_bytes());
    }

    Ok(())
}

/// Join every worker, failing if any of them panicked.
///
/// All handles are joined before returning so no panic is left for the
/// scope to re-raise.
fn join_workers<T>(handles: Vec<ScopedJoinHandle<'_, T>>) -> Result<Vec<T>> {
    let joined: Vec<_> = handles.into_iter().map(|handle| handle.join()).collect();
    joined
        .into_iter()
        .enumerate()
        .map(|(worker, report)| report.map_err(|_| anyhow!("worker {worker} panicked")))
        .collect()
}

/// Allocate, stamp, verify and recycle buffers, keeping a few in flight
fn run_worker(pool: &BufferPool, worker: usize, stress: &StressConfig) -> WorkerReport {
    let mut report = WorkerReport::default();
    let mut held = VecDeque::with_capacity(stress.in_flight);
    let stamp = (worker % 251) as u8 + 1;

    for round in 0..stress.iterations {
        let size = 1 + (round.wrapping_mul(7919) + worker.wrapping_mul(104_729)) % stress.max_request;

        match pool.allocate(size) {
            Some(mut buf) => {
                buf.fill(stamp);
                held.push_back(buf);
                report.completed += 1;
            }
            None => report.misses += 1,
        }

        if held.len() >= stress.in_flight {
            if let Some(buf) = held.pop_front() {
                if buf.iter().any(|&b| b != stamp) {
                    report.corrupted += 1;
                }
                if let Err(e) = pool.recycle(buf) {
                    warn!(worker, error = %e, "Recycle failed");
                }
            }
        }
    }

    for buf in held {
        if buf.iter().any(|&b| b != stamp) {
            report.corrupted += 1;
        }
        if let Err(e) = pool.recycle(buf) {
            warn!(worker, error = %e, "Recycle failed");
        }
    }

    report
}
