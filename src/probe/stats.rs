//! Reduction of raw probe attempts into a per-target [`Measurement`].
//!
//! Everything here is pure: no I/O and no shared state, so the statistics
//! can be tested without a network.

use chrono::{DateTime, Utc};
use serde::{Deserialize, Serialize};

use super::traits::ProbeAttempt;

/// Round-trip time statistics over the successful attempts, in milliseconds.
#[derive(Debug, Clone, Copy, PartialEq, Serialize, Deserialize)]
pub struct RttStats {
    pub min_ms: f64,
    pub avg_ms: f64,
    pub max_ms: f64,
    /// Population standard deviation (same convention as `ping`'s `mdev`).
    pub stddev_ms: f64,
}

/// Aggregated probe outcome for one target in one round.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct Measurement {
    /// Target address exactly as configured.
    pub target: String,
    /// Number of echo requests sent.
    pub packets_transmitted: u32,
    /// Number of replies received.
    pub packets_received: u32,
    /// Fraction of requests without a reply, in `[0, 1]`.
    pub packet_loss_ratio: f64,
    /// Latency statistics; `None` when every attempt failed.
    #[serde(skip_serializing_if = "Option::is_none")]
    pub rtt: Option<RttStats>,
    /// When the measurement was produced (UTC).
    pub timestamp: DateTime<Utc>,
}

impl Measurement {
    /// True when no attempt got a reply.
    pub fn is_total_loss(&self) -> bool {
        self.rtt.is_none()
    }
}

/// Reduce the attempts of one probe into a [`Measurement`] stamped with the current time.
pub fn reduce(target: &str, attempts: &[ProbeAttempt]) -> Measurement {
    reduce_at(target, attempts, Utc::now())
}

/// Same as [`reduce`] with an explicit timestamp.
///
/// Failed attempts count towards the loss denominator but are excluded from
/// latency statistics. An empty input is reported as total loss.
pub fn reduce_at(target: &str, attempts: &[ProbeAttempt], timestamp: DateTime<Utc>) -> Measurement {
    let rtts_ms: Vec<f64> = attempts
        .iter()
        .filter_map(ProbeAttempt::rtt)
        .map(|rtt| rtt.as_secs_f64() * 1000.0)
        .collect();

    let transmitted = attempts.len() as u32;
    let received = rtts_ms.len() as u32;

    let packet_loss_ratio = if transmitted == 0 {
        1.0
    } else {
        f64::from(transmitted - received) / f64::from(transmitted)
    };

    Measurement {
        target: target.to_string(),
        packets_transmitted: transmitted,
        packets_received: received,
        packet_loss_ratio,
        rtt: rtt_stats(&rtts_ms),
        timestamp,
    }
}

fn rtt_stats(samples: &[f64]) -> Option<RttStats> {
    if samples.is_empty() {
        return None;
    }

    let count = samples.len() as f64;
    let min_ms = samples.iter().copied().fold(f64::INFINITY, f64::min);
    let max_ms = samples.iter().copied().fold(f64::NEG_INFINITY, f64::max);
    let avg_ms = samples.iter().sum::<f64>() / count;
    let variance = samples
        .iter()
        .map(|&x| {
            let diff = x - avg_ms;
            diff * diff
        })
        .sum::<f64>()
        / count;

    Some(RttStats {
        min_ms,
        // Guard against float drift pushing the mean outside [min, max].
        avg_ms: avg_ms.clamp(min_ms, max_ms),
        max_ms,
        stddev_ms: variance.sqrt(),
    })
}
