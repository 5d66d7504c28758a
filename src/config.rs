//! Configuration management
//!
//! Handles loading and validating pool configuration from TOML files.

use anyhow::{Context, Result};
use serde::Deserialize;
use std::path::Path;
use tracing::info;

use crate::pool::ProbeOrder;

/// Root configuration structure
#[derive(Debug, Clone, Default, Deserialize)]
pub struct Config {
    #[serde(default)]
    pub pool: PoolConfig,
    #[serde(default)]
    pub logging: LoggingConfig,
    #[serde(default)]
    pub metrics: MetricsConfig,
    #[serde(default)]
    pub stress: StressConfig,
}

/// Buffer pool geometry
#[derive(Debug, Clone, Deserialize)]
pub struct PoolConfig {
    /// Bytes per page
    #[serde(default = "default_page_capacity")]
    pub page_capacity: usize,
    /// Bytes per chunk
    #[serde(default = "default_chunk_size")]
    pub chunk_size: usize,
    /// Number of pages
    #[serde(default = "default_page_count")]
    pub page_count: usize,
    /// Page probe order: "split" or "wrapping"
    #[serde(default)]
    pub probe_order: ProbeOrder,
}

impl Default for PoolConfig {
    fn default() -> Self {
        Self {
            page_capacity: default_page_capacity(),
            chunk_size: default_chunk_size(),
            page_count: default_page_count(),
            probe_order: ProbeOrder::default(),
        }
    }
}

/// Logging configuration
#[derive(Debug, Clone, Deserialize)]
pub struct LoggingConfig {
    /// Log level
    #[serde(default = "default_log_level")]
    pub level: String,
    /// Output format: "json" or "pretty"
    #[serde(default = "default_log_format")]
    pub format: String,
}

impl Default for LoggingConfig {
    fn default() -> Self {
        Self {
            level: default_log_level(),
            format: default_log_format(),
        }
    }
}

/// Metrics configuration
#[derive(Debug, Clone, Deserialize)]
pub struct MetricsConfig {
    /// Publish pool counters through the metrics facade
    #[serde(default)]
    pub enabled: bool,
    /// Metric name prefix
    #[serde(default = "default_metrics_prefix")]
    pub prefix: String,
}

impl Default for MetricsConfig {
    fn default() -> Self {
        Self {
            enabled: false,
            prefix: default_metrics_prefix(),
        }
    }
}

/// Stress driver configuration
#[derive(Debug, Clone, Deserialize)]
pub struct StressConfig {
    /// Number of worker threads (0 = auto)
    #[serde(default)]
    pub workers: usize,
    /// Allocate/recycle rounds per worker
    #[serde(default = "default_iterations")]
    pub iterations: usize,
    /// Largest request size in bytes
    #[serde(default = "default_max_request")]
    pub max_request: usize,
    /// Buffers each worker keeps in flight
    #[serde(default = "default_in_flight")]
    pub in_flight: usize,
}

impl StressConfig {
    /// Get effective worker count (auto-detect if 0)
    pub fn effective_workers(&self) -> usize {
        if self.workers == 0 {
            num_cpus::get()
        } else {
            self.workers
        }
    }
}

impl Default for StressConfig {
    fn default() -> Self {
        Self {
            workers: 0,
            iterations: default_iterations(),
            max_request: default_max_request(),
            in_flight: default_in_flight(),
        }
    }
}

// Default value functions
fn default_page_capacity() -> usize { 1024 * 1024 }
fn default_chunk_size() -> usize { 4096 }
fn default_page_count() -> usize { 16 }
fn default_log_level() -> String { "info".to_string() }
fn default_log_format() -> String { "pretty".to_string() }
fn default_metrics_prefix() -> String { "pagepool".to_string() }
fn default_iterations() -> usize { 100_000 }
fn default_max_request() -> usize { 64 * 1024 }
fn default_in_flight() -> usize { 4 }

impl Config {
    /// Load configuration from a TOML file
    pub fn load(path: &Path) -> Result<Self> {
        let contents = std::fs::read_to_string(path)
            .with_context(|| format!("Failed to read config file: {:?}", path))?;

        Self::parse(&contents)
    }

    /// Load configuration from a TOML file, or use defaults if it does not exist
    pub fn load_or_default(path: &Path) -> Result<Self> {
        if path.exists() {
            return Self::load(path);
        }

        info!(path = ?path, "Config file not found, using defaults");
        let config = Self::default();
        config.validate()?;
        Ok(config)
    }

    /// Parse configuration from TOML text
    pub fn parse(contents: &str) -> Result<Self> {
        let config: Config = toml::from_str(contents)
            .with_context(|| "Failed to parse config file")?;

        config.validate()?;
        Ok(config)
    }

    /// Validate configuration values
    fn validate(&self) -> Result<()> {
        if self.pool.chunk_size == 0 {
            anyhow::bail!("chunk_size must be > 0");
        }
        if self.pool.page_count == 0 {
            anyhow::bail!("page_count must be > 0");
        }
        if self.pool.page_capacity < self.pool.chunk_size {
            anyhow::bail!(
                "page_capacity ({}) must be >= chunk_size ({})",
                self.pool.page_capacity,
                self.pool.chunk_size
            );
        }
        if self.stress.max_request == 0 {
            anyhow::bail!("max_request must be > 0");
        }
        if self.stress.in_flight == 0 {
            anyhow::bail!("in_flight must be > 0");
        }
        Ok(())
    }
}
