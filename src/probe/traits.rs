//! Core prober trait and types.

use std::time::Duration;

use thiserror::Error;

/// Number of echo attempts per target per round.
pub const DEFAULT_ATTEMPTS: u32 = 5;

/// Errors that prevent a probe from running at all.
///
/// An unreachable target is not an error: it is reported as a sequence of
/// [`ProbeAttempt::Failure`] values.
#[derive(Debug, Error)]
pub enum ProbeError {
    /// The probing mechanism could not be initialized (e.g. no permission
    /// to open an ICMP socket).
    #[error("probe setup failed: {0}")]
    Setup(String),

    /// The probe request itself is malformed.
    #[error("invalid probe request: {0}")]
    InvalidRequest(String),
}

/// Outcome of a single echo round-trip.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum ProbeAttempt {
    /// Reply received within the timeout.
    Success {
        /// ICMP sequence number of the request.
        seq: u16,
        /// Measured round-trip time.
        rtt: Duration,
    },
    /// No reply (timeout, unreachable, resolution failure, ...).
    Failure {
        /// ICMP sequence number of the request.
        seq: u16,
    },
}

impl ProbeAttempt {
    /// Successful attempt with the given round-trip time.
    pub fn success(seq: u16, rtt: Duration) -> Self {
        Self::Success { seq, rtt }
    }

    /// Failed attempt.
    pub fn failure(seq: u16) -> Self {
        Self::Failure { seq }
    }

    pub fn succeeded(&self) -> bool {
        matches!(self, Self::Success { .. })
    }

    /// Round-trip time, if the attempt succeeded.
    pub fn rtt(&self) -> Option<Duration> {
        match self {
            Self::Success { rtt, .. } => Some(*rtt),
            Self::Failure { .. } => None,
        }
    }
}

/// Check the preconditions shared by every prober implementation.
///
/// Each attempt carries its own ICMP sequence number, so the count must fit in
/// a `u16`. Returns the count narrowed to that width.
///
/// # Errors
/// Returns `ProbeError::InvalidRequest` for an empty target, zero attempts, or
/// more attempts than there are sequence numbers.
pub fn validate_request(target: &str, attempts: u32) -> Result<u16, ProbeError> {
    if target.trim().is_empty() {
        return Err(ProbeError::InvalidRequest(
            "target cannot be empty".to_string(),
        ));
    }
    if attempts == 0 {
        return Err(ProbeError::InvalidRequest(
            "attempt count must be at least 1".to_string(),
        ));
    }
    u16::try_from(attempts).map_err(|_| {
        ProbeError::InvalidRequest(format!(
            "attempt count {} exceeds the {} available sequence numbers",
            attempts,
            u16::MAX
        ))
    })
}

/// Transport boundary for echo probes.
///
/// # Error Handling Philosophy
///
/// - **Target failures** (unreachable, timeout, unresolvable hostname) are valid
///   observations. Implementations return `Ok` with failed attempts.
/// - **Prober errors** (cannot open a socket, malformed request) mean no
///   observation was possible. Implementations return `Err(ProbeError)`.
///
/// The scheduler treats an `Err` as fatal for that target's round only.
#[async_trait::async_trait]
pub trait Prober: Send + Sync + 'static {
    /// Send `attempts` echo requests to `target` and report each outcome in order.
    async fn probe(&self, target: &str, attempts: u32) -> Result<Vec<ProbeAttempt>, ProbeError>;
}

#[async_trait::async_trait]
impl<P: Prober + ?Sized> Prober for std::sync::Arc<P> {
    async fn probe(&self, target: &str, attempts: u32) -> Result<Vec<ProbeAttempt>, ProbeError> {
        (**self).probe(target, attempts).await
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_validate_request() {
        assert_eq!(validate_request("10.0.0.1", 5).unwrap(), 5);
        assert!(validate_request("example.com", 1).is_ok());
    }

    #[test]
    fn test_validate_request_empty_target() {
        let err = validate_request("  ", 5).unwrap_err();
        assert!(matches!(err, ProbeError::InvalidRequest(_)));
        assert!(err.to_string().contains("target cannot be empty"));
    }

    #[test]
    fn test_validate_request_sequence_space() {
        assert_eq!(validate_request("10.0.0.1", 65_535).unwrap(), u16::MAX);

        let err = validate_request("10.0.0.1", 65_536).unwrap_err();
        assert!(matches!(err, ProbeError::InvalidRequest(_)));
        assert!(err.to_string().contains("sequence numbers"));
    }

    #[test]
    fn test_validate_request_zero_attempts() {
        let err = validate_request("10.0.0.1", 0).unwrap_err();
        assert!(err.to_string().contains("at least 1"));
    }

    struct AlwaysLost;

    #[async_trait::async_trait]
    impl Prober for AlwaysLost {
        async fn probe(&self, target: &str, attempts: u32) -> Result<Vec<ProbeAttempt>, ProbeError> {
            validate_request(target, attempts)?;
            Ok((0..attempts).map(|i| ProbeAttempt::failure(i as u16)).collect())
        }
    }

    #[tokio::test]
    async fn test_shared_prober_delegates() {
        let prober: std::sync::Arc<dyn Prober> = std::sync::Arc::new(AlwaysLost);

        let attempts = prober.probe("192.0.2.1", 3).await.unwrap();
        assert_eq!(attempts.len(), 3);
        assert!(attempts.iter().all(|a| !a.succeeded()));
        assert!(prober.probe("", 3).await.is_err());
    }

    #[test]
    fn test_attempt_accessors() {
        let ok = ProbeAttempt::success(0, Duration::from_millis(12));
        let lost = ProbeAttempt::failure(1);

        assert!(ok.succeeded());
        assert_eq!(ok.rtt(), Some(Duration::from_millis(12)));
        assert!(!lost.succeeded());
        assert_eq!(lost.rtt(), None);
    }
}
