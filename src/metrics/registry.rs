//! Latest-value metrics registry shared by the scheduler and the scrape handler.

use std::collections::BTreeMap;

use chrono::{DateTime, Utc};
use parking_lot::RwLock;
use serde::Serialize;
use strum_macros::{AsRefStr, Display, EnumString};

use crate::probe::Measurement;

/// Label name carried by every sample.
pub const TARGET_LABEL: &str = "target";

/// Metric families published for each probed target. All are gauges.
#[derive(Debug, Clone, Copy, PartialEq, Eq, PartialOrd, Ord, Hash, EnumString, Display, AsRefStr)]
pub enum MetricFamily {
    #[strum(serialize = "ping_packet_loss_ratio")]
    PacketLoss,
    #[strum(serialize = "ping_rtt_avg_milliseconds")]
    RttAvg,
    #[strum(serialize = "ping_rtt_min_milliseconds")]
    RttMin,
    #[strum(serialize = "ping_rtt_max_milliseconds")]
    RttMax,
    #[strum(serialize = "ping_rtt_stddev_milliseconds")]
    RttStddev,
}

impl MetricFamily {
    /// `# HELP` text for the exposition format.
    pub fn help(&self) -> &'static str {
        match self {
            Self::PacketLoss => "Fraction of echo requests without a reply in the last round",
            Self::RttAvg => "Average round-trip time of the last round with at least one reply",
            Self::RttMin => "Minimum round-trip time of the last round with at least one reply",
            Self::RttMax => "Maximum round-trip time of the last round with at least one reply",
            Self::RttStddev => {
                "Round-trip time standard deviation of the last round with at least one reply"
            }
        }
    }
}

/// One live value in the registry.
#[derive(Debug, Clone, PartialEq, Serialize)]
pub struct MetricSample {
    pub metric_name: String,
    pub target_label: String,
    pub value: f64,
    pub timestamp: DateTime<Utc>,
}

#[derive(Debug, Clone, Copy)]
struct SampleValue {
    value: f64,
    timestamp: DateTime<Utc>,
}

type SeriesKey = (String, String);

/// Thread-safe store holding the latest value per `(metric name, target)`.
///
/// Writers replace values (last write wins); there is no history. Readers take
/// a copy under a shared lock, so a scrape never blocks on a probe round and
/// never sees a half-written batch.
#[derive(Debug, Default)]
pub struct MetricsRegistry {
    samples: RwLock<BTreeMap<SeriesKey, SampleValue>>,
}

impl MetricsRegistry {
    pub fn new() -> Self {
        Self::default()
    }

    /// Insert or replace the value for `(metric_name, target_label)`.
    pub fn upsert(&self, metric_name: impl Into<String>, target_label: impl Into<String>, value: f64) {
        self.upsert_at(metric_name, target_label, value, Utc::now());
    }

    /// Same as [`upsert`](Self::upsert) with an explicit timestamp.
    pub fn upsert_at(
        &self,
        metric_name: impl Into<String>,
        target_label: impl Into<String>,
        value: f64,
        timestamp: DateTime<Utc>,
    ) {
        self.samples.write().insert(
            (metric_name.into(), target_label.into()),
            SampleValue { value, timestamp },
        );
    }

    /// Write several metrics for one target under a single write lock.
    pub fn upsert_many(
        &self,
        target_label: &str,
        values: &[(MetricFamily, f64)],
        timestamp: DateTime<Utc>,
    ) {
        let mut samples = self.samples.write();
        for (family, value) in values {
            samples.insert(
                (family.to_string(), target_label.to_string()),
                SampleValue {
                    value: *value,
                    timestamp,
                },
            );
        }
    }

    /// Publish one round's measurement for its target.
    ///
    /// Loss is always written. Latency gauges are written only when at least
    /// one reply arrived; on total loss they keep their previous value.
    pub fn publish(&self, measurement: &Measurement) {
        let mut values = vec![(MetricFamily::PacketLoss, measurement.packet_loss_ratio)];
        if let Some(rtt) = &measurement.rtt {
            values.extend([
                (MetricFamily::RttAvg, rtt.avg_ms),
                (MetricFamily::RttMin, rtt.min_ms),
                (MetricFamily::RttMax, rtt.max_ms),
                (MetricFamily::RttStddev, rtt.stddev_ms),
            ]);
        }
        self.upsert_many(&measurement.target, &values, measurement.timestamp);
    }

    /// Current value for a single series.
    pub fn get(&self, metric_name: &str, target_label: &str) -> Option<MetricSample> {
        let samples = self.samples.read();
        samples
            .get(&(metric_name.to_string(), target_label.to_string()))
            .map(|v| MetricSample {
                metric_name: metric_name.to_string(),
                target_label: target_label.to_string(),
                value: v.value,
                timestamp: v.timestamp,
            })
    }

    /// Copy of every live sample, ordered by metric name then target.
    pub fn snapshot(&self) -> Vec<MetricSample> {
        let samples = self.samples.read();
        samples
            .iter()
            .map(|((name, target), v)| MetricSample {
                metric_name: name.clone(),
                target_label: target.clone(),
                value: v.value,
                timestamp: v.timestamp,
            })
            .collect()
    }

    pub fn len(&self) -> usize {
        self.samples.read().len()
    }

    pub fn is_empty(&self) -> bool {
        self.samples.read().is_empty()
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::probe::{ProbeAttempt, reduce};
    use std::sync::Arc;
    use std::time::Duration;

    fn value_of(registry: &MetricsRegistry, family: MetricFamily, target: &str) -> Option<f64> {
        registry.get(family.as_ref(), target).map(|s| s.value)
    }

    #[test]
    fn test_family_names() {
        assert_eq!(MetricFamily::PacketLoss.to_string(), "ping_packet_loss_ratio");
        assert_eq!(MetricFamily::RttAvg.as_ref(), "ping_rtt_avg_milliseconds");
        assert_eq!(
            "ping_rtt_stddev_milliseconds".parse::<MetricFamily>().unwrap(),
            MetricFamily::RttStddev
        );
        assert!("unknown_metric".parse::<MetricFamily>().is_err());
    }

    #[test]
    fn test_upsert_then_snapshot_returns_value() {
        let registry = MetricsRegistry::new();
        registry.upsert("ping_packet_loss_ratio", "10.0.0.1", 0.2);

        let snapshot = registry.snapshot();
        assert_eq!(snapshot.len(), 1);
        assert_eq!(snapshot[0].metric_name, "ping_packet_loss_ratio");
        assert_eq!(snapshot[0].target_label, "10.0.0.1");
        assert_eq!(snapshot[0].value, 0.2);
    }

    #[test]
    fn test_upsert_overwrites() {
        let registry = MetricsRegistry::new();
        registry.upsert("m", "a", 1.0);
        registry.upsert("m", "a", 2.0);
        registry.upsert("m", "a", 2.0);

        assert_eq!(registry.len(), 1);
        assert_eq!(registry.get("m", "a").unwrap().value, 2.0);
    }

    #[test]
    fn test_target_identity_is_exact_string() {
        let registry = MetricsRegistry::new();
        registry.upsert("m", "Example.com", 1.0);
        registry.upsert("m", "example.com", 2.0);

        assert_eq!(registry.len(), 2);
    }

    #[test]
    fn test_publish_total_loss_keeps_stale_latency() {
        let registry = MetricsRegistry::new();
        let good: Vec<_> = (0..5)
            .map(|i| ProbeAttempt::success(i, Duration::from_millis(10)))
            .collect();
        let bad: Vec<_> = (0..5).map(ProbeAttempt::failure).collect();

        registry.publish(&reduce("h", &good));
        assert_eq!(value_of(&registry, MetricFamily::PacketLoss, "h"), Some(0.0));
        let avg = value_of(&registry, MetricFamily::RttAvg, "h").unwrap();
        assert!((avg - 10.0).abs() < 1e-9);

        registry.publish(&reduce("h", &bad));
        assert_eq!(value_of(&registry, MetricFamily::PacketLoss, "h"), Some(1.0));
        let stale = value_of(&registry, MetricFamily::RttAvg, "h").unwrap();
        assert!((stale - 10.0).abs() < 1e-9);
    }

    #[test]
    fn test_publish_total_loss_on_fresh_target_writes_only_loss() {
        let registry = MetricsRegistry::new();
        let bad: Vec<_> = (0..5).map(ProbeAttempt::failure).collect();
        registry.publish(&reduce("h", &bad));

        assert_eq!(registry.len(), 1);
        assert!(value_of(&registry, MetricFamily::RttAvg, "h").is_none());
    }

    #[test]
    fn test_identical_rounds_are_idempotent() {
        let registry = MetricsRegistry::new();
        let attempts = vec![
            ProbeAttempt::success(0, Duration::from_millis(4)),
            ProbeAttempt::failure(1),
        ];
        let ts = Utc::now();
        let m = crate::probe::reduce_at("h", &attempts, ts);

        registry.publish(&m);
        let first = registry.snapshot();
        registry.publish(&m);
        assert_eq!(registry.snapshot(), first);
    }

    #[test]
    fn test_concurrent_upsert_and_snapshot() {
        let registry = Arc::new(MetricsRegistry::new());
        let writer = {
            let registry = Arc::clone(&registry);
            std::thread::spawn(move || {
                for i in 0..1000 {
                    registry.upsert_many(
                        "t",
                        &[
                            (MetricFamily::PacketLoss, f64::from(i)),
                            (MetricFamily::RttAvg, f64::from(i)),
                        ],
                        Utc::now(),
                    );
                }
            })
        };

        for _ in 0..1000 {
            let snapshot = registry.snapshot();
            if snapshot.len() == 2 {
                assert_eq!(snapshot[0].value, snapshot[1].value);
            }
        }
        writer.join().unwrap();
        assert_eq!(registry.len(), 2);
    }
}
