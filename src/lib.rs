//! ping-exporter - ICMP reachability and latency exporter
//!
//! Probes a fixed list of targets in rounds and exposes the latest packet
//! loss and round-trip times as Prometheus gauges.
//!
//! # Architecture
//!
//! - **Probe**: [`Prober`] trait and the ICMP implementation; [`reduce`] turns attempts into a [`Measurement`]
//! - **Metrics**: [`MetricsRegistry`] holding the latest value per `(metric, target)`
//! - **Scheduler**: [`Scheduler`] runs rounds and publishes into the registry
//! - **Server**: axum router exposing `/metrics` for scrapes
//!
//! # Example
//!
//! ```rust,no_run
//! use std::sync::Arc;
//! use ping_exporter::{AppConfig, IcmpProber, MetricsRegistry, Scheduler};
//! use tokio_util::sync::CancellationToken;
//!
//! #[tokio::main]
//! async fn main() -> Result<(), Box<dyn std::error::Error>> {
//!     let config = AppConfig::load("config.yaml")?;
//!     let registry = Arc::new(MetricsRegistry::new());
//!     let scheduler = Scheduler::new(
//!         IcmpProber::new(config.probe.clone()),
//!         Arc::clone(&registry),
//!         config.to_run_config(),
//!     );
//!
//!     scheduler.run(CancellationToken::new()).await;
//!     Ok(())
//! }
//! ```

pub mod config;
pub mod metrics;
pub mod probe;
pub mod scheduler;
pub mod server;

pub use config::{AppConfig, ConfigError};
pub use metrics::{MetricFamily, MetricSample, MetricsRegistry};
pub use probe::{IcmpConfig, IcmpProber, Measurement, ProbeAttempt, ProbeError, Prober, reduce};
pub use scheduler::{RoundSummary, RunConfig, Scheduler};
