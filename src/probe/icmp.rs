//! ICMP echo prober.
//!
//! Sends echo requests with `surge-ping` and reports one [`ProbeAttempt`] per request.

use std::net::IpAddr;
use std::time::Duration;

use serde::{Deserialize, Serialize};
use surge_ping::{Client, Config, ICMP, PingIdentifier, PingSequence};
use tokio::time::timeout;

use super::traits::{DEFAULT_ATTEMPTS, ProbeAttempt, ProbeError, Prober, validate_request};

/// Default per-attempt timeout (1 second).
const DEFAULT_TIMEOUT: Duration = Duration::from_secs(1);

/// Default gap between consecutive attempts (1 second, like `ping`).
const DEFAULT_GAP: Duration = Duration::from_secs(1);

/// Echo payload size in bytes (same as `ping`'s default).
const PAYLOAD_SIZE: usize = 56;

fn default_count() -> u32 {
    DEFAULT_ATTEMPTS
}

fn default_timeout() -> Duration {
    DEFAULT_TIMEOUT
}

fn default_gap() -> Duration {
    DEFAULT_GAP
}

/// Configuration for ICMP probing.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct IcmpConfig {
    /// Echo requests per target per round (default: 5).
    #[serde(default = "default_count")]
    pub count: u32,
    /// Time to wait for each reply (default: 1s).
    #[serde(default = "default_timeout", with = "humantime_serde")]
    pub timeout: Duration,
    /// Pause between consecutive requests to the same target (default: 1s).
    #[serde(default = "default_gap", with = "humantime_serde")]
    pub gap: Duration,
}

impl Default for IcmpConfig {
    fn default() -> Self {
        Self {
            count: DEFAULT_ATTEMPTS,
            timeout: DEFAULT_TIMEOUT,
            gap: DEFAULT_GAP,
        }
    }
}

impl IcmpConfig {
    /// Set the number of echo requests per round.
    pub fn with_count(mut self, count: u32) -> Self {
        self.count = count;
        self
    }

    /// Set the per-attempt timeout.
    pub fn with_timeout(mut self, timeout: Duration) -> Self {
        self.timeout = timeout;
        self
    }

    /// Set the gap between attempts.
    pub fn with_gap(mut self, gap: Duration) -> Self {
        self.gap = gap;
        self
    }
}

/// ICMP echo prober backed by `surge-ping`.
///
/// A new socket is opened per probe so that a transient setup failure only
/// affects one target's round.
#[derive(Debug, Clone)]
pub struct IcmpProber {
    config: IcmpConfig,
}

impl IcmpProber {
    pub fn new(config: IcmpConfig) -> Self {
        Self { config }
    }

    pub fn config(&self) -> &IcmpConfig {
        &self.config
    }
}

/// Resolve hostname to IP address.
async fn resolve_host(host: &str) -> Result<IpAddr, std::io::Error> {
    if let Ok(ip) = host.parse::<IpAddr>() {
        return Ok(ip);
    }

    let addrs = tokio::net::lookup_host(format!("{host}:0")).await?;
    addrs
        .into_iter()
        .next()
        .map(|addr| addr.ip())
        .ok_or_else(|| std::io::Error::new(std::io::ErrorKind::NotFound, "no addresses found"))
}

fn all_failed(count: u16) -> Vec<ProbeAttempt> {
    (0..count).map(ProbeAttempt::failure).collect()
}

#[async_trait::async_trait]
impl Prober for IcmpProber {
    async fn probe(&self, target: &str, attempts: u32) -> Result<Vec<ProbeAttempt>, ProbeError> {
        let count = validate_request(target, attempts)?;

        let ip_addr = match resolve_host(target).await {
            Ok(ip) => ip,
            Err(e) => {
                tracing::warn!(host = %target, error = %e, "Failed to resolve hostname");
                return Ok(all_failed(count));
            }
        };

        let client = match ip_addr {
            IpAddr::V4(_) => Client::new(&Config::default()),
            IpAddr::V6(_) => Client::new(&Config::builder().kind(ICMP::V6).build()),
        }
        .map_err(|e| ProbeError::Setup(format!("failed to create ICMP client: {e}")))?;

        let mut pinger = client.pinger(ip_addr, PingIdentifier(rand::random())).await;
        pinger.timeout(self.config.timeout);

        let payload = [0u8; PAYLOAD_SIZE];
        let mut results = Vec::with_capacity(usize::from(count));

        for seq in 0..count {
            if seq > 0 && !self.config.gap.is_zero() {
                tokio::time::sleep(self.config.gap).await;
            }

            let result = timeout(self.config.timeout, pinger.ping(PingSequence(seq), &payload)).await;

            let attempt = match result {
                Ok(Ok((_, rtt))) => {
                    tracing::trace!(host = %target, seq, rtt_ms = rtt.as_secs_f64() * 1000.0, "Echo reply");
                    ProbeAttempt::success(seq, rtt)
                }
                Ok(Err(e)) => {
                    tracing::debug!(host = %target, seq, error = %e, "Echo request failed");
                    ProbeAttempt::failure(seq)
                }
                Err(_) => {
                    tracing::debug!(
                        host = %target,
                        seq,
                        timeout_ms = self.config.timeout.as_millis(),
                        "Echo request timed out"
                    );
                    ProbeAttempt::failure(seq)
                }
            };
            results.push(attempt);
        }

        Ok(results)
    }
}
