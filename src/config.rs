//! Configuration module.
//!
//! Provides YAML/JSON configuration loading and validation for:
//! - Target list and round interval
//! - Metrics endpoint settings (bind address, port)
//! - Echo probe settings (count, timeout, gap) and round concurrency

mod app;

pub use app::{AppConfig, ConfigError, ServerConfig};

// Re-export constants
pub use app::{DEFAULT_CONCURRENCY, DEFAULT_INTERVAL_SECS, DEFAULT_PORT, MAX_PROBE_COUNT};
