//! Scheduler loop driving probe rounds.
//!
//! One round probes every configured target, publishing each measurement as
//! soon as it is available, then sleeps for the configured interval. The
//! effective sampling period per target is therefore `interval + round time`.

use std::sync::Arc;
use std::sync::atomic::{AtomicUsize, Ordering};
use std::time::{Duration, Instant};

use futures::StreamExt;
use tokio_util::sync::CancellationToken;

use crate::metrics::MetricsRegistry;
use crate::probe::{DEFAULT_ATTEMPTS, Measurement, ProbeError, Prober, reduce};

/// Default pause between rounds (10 seconds).
pub const DEFAULT_INTERVAL: Duration = Duration::from_secs(10);

/// Immutable settings for one run of the scheduler.
#[derive(Debug, Clone, PartialEq)]
pub struct RunConfig {
    /// Targets in probing order.
    pub targets: Vec<String>,
    /// Sleep between the end of one round and the start of the next.
    pub interval: Duration,
    /// Echo attempts per target per round.
    pub attempts: u32,
    /// Maximum targets probed at once (1 = sequential).
    pub concurrency: usize,
    /// Stop after this many rounds; `None` runs until cancelled.
    pub max_rounds: Option<u64>,
}

impl RunConfig {
    pub fn new(targets: Vec<String>, interval: Duration) -> Self {
        Self {
            targets,
            interval,
            attempts: DEFAULT_ATTEMPTS,
            concurrency: 1,
            max_rounds: None,
        }
    }

    pub fn with_attempts(mut self, attempts: u32) -> Self {
        self.attempts = attempts;
        self
    }

    /// Set the fan-out limit; values below 1 are treated as 1.
    pub fn with_concurrency(mut self, concurrency: usize) -> Self {
        self.concurrency = concurrency.max(1);
        self
    }

    pub fn with_max_rounds(mut self, max_rounds: u64) -> Self {
        self.max_rounds = Some(max_rounds);
        self
    }
}

/// Outcome of one round.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct RoundSummary {
    /// 1-based round number.
    pub round: u64,
    /// Targets for which a measurement was published.
    pub probed: usize,
    /// Targets skipped because the probe could not run.
    pub failed: usize,
    pub elapsed: Duration,
}

/// Drives repeated probe rounds and publishes results into a [`MetricsRegistry`].
pub struct Scheduler<P: Prober> {
    prober: P,
    registry: Arc<MetricsRegistry>,
    config: RunConfig,
}

impl<P: Prober> std::fmt::Debug for Scheduler<P> {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("Scheduler")
            .field("config", &self.config)
            .finish_non_exhaustive()
    }
}

impl<P: Prober> Scheduler<P> {
    pub fn new(prober: P, registry: Arc<MetricsRegistry>, config: RunConfig) -> Self {
        Self {
            prober,
            registry,
            config,
        }
    }

    pub fn config(&self) -> &RunConfig {
        &self.config
    }

    /// Run rounds until `shutdown` is cancelled or the round limit is reached.
    ///
    /// Returns the number of completed rounds. Cancellation interrupts both an
    /// in-flight round and the sleep between rounds; no lock is held while sleeping.
    pub async fn run(&self, shutdown: CancellationToken) -> u64 {
        tracing::info!(
            targets = self.config.targets.len(),
            interval_secs = self.config.interval.as_secs_f64(),
            attempts = self.config.attempts,
            concurrency = self.config.concurrency,
            "Scheduler started"
        );

        let mut completed = 0u64;
        loop {
            if shutdown.is_cancelled() || self.limit_reached(completed) {
                break;
            }

            let round = completed + 1;
            let summary = tokio::select! {
                biased;
                _ = shutdown.cancelled() => {
                    tracing::info!(round, "Round interrupted by shutdown");
                    break;
                }
                summary = self.run_round(round) => summary,
            };
            completed = round;

            tracing::info!(
                round = summary.round,
                probed = summary.probed,
                failed = summary.failed,
                elapsed_ms = summary.elapsed.as_millis(),
                "Round complete"
            );

            if self.limit_reached(completed) {
                tracing::info!(rounds = completed, "Round limit reached");
                break;
            }

            tracing::debug!(interval = ?self.config.interval, "Waiting before next round");
            tokio::select! {
                biased;
                _ = shutdown.cancelled() => break,
                _ = tokio::time::sleep(self.config.interval) => {}
            }
        }

        tracing::info!(rounds = completed, "Scheduler stopped");
        completed
    }

    fn limit_reached(&self, completed: u64) -> bool {
        self.config.max_rounds.is_some_and(|max| completed >= max)
    }

    /// Probe every target once.
    ///
    /// A target whose probe cannot run is logged and skipped; the remaining
    /// targets are still probed and published.
    pub async fn run_round(&self, round: u64) -> RoundSummary {
        let start = Instant::now();
        let failed = AtomicUsize::new(0);

        futures::stream::iter(self.config.targets.iter())
            .for_each_concurrent(self.config.concurrency, |target| {
                let failed = &failed;
                async move {
                    if let Err(e) = self.probe_target(target).await {
                        tracing::warn!(round, host = %target, error = %e, "Probe failed, skipping target");
                        failed.fetch_add(1, Ordering::Relaxed);
                    }
                }
            })
            .await;

        let failed = failed.into_inner();
        RoundSummary {
            round,
            probed: self.config.targets.len() - failed,
            failed,
            elapsed: start.elapsed(),
        }
    }

    /// Probe one target, reduce the attempts, and publish the measurement.
    pub async fn probe_target(&self, target: &str) -> Result<Measurement, ProbeError> {
        let attempts = self.prober.probe(target, self.config.attempts).await?;
        let measurement = reduce(target, &attempts);
        self.registry.publish(&measurement);

        tracing::debug!(
            host = %target,
            loss = measurement.packet_loss_ratio,
            rtt_avg_ms = measurement.rtt.map(|r| r.avg_ms),
            "Measurement published"
        );
        Ok(measurement)
    }
}
