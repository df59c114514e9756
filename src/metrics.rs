//! Metrics Layer
//!
//! Latest-value gauges per probed target, rendered for Prometheus scrapes.
//!
//! - [`MetricsRegistry`]: shared store; upsert by `(metric name, target)`, snapshot for reads
//! - [`MetricFamily`]: the gauge families published per target
//! - [`render`]: Prometheus text exposition of a snapshot

mod exposition;
mod registry;

pub use exposition::{CONTENT_TYPE, render};
pub use registry::{MetricFamily, MetricSample, MetricsRegistry, TARGET_LABEL};
