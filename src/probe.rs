//! Probe Layer
//!
//! Echo probing and reduction of raw results into measurements.
//!
//! - [`Prober`]: transport boundary; one call probes one target
//! - [`IcmpProber`]: ICMP echo implementation backed by `surge-ping`
//! - [`reduce`]: pure reduction of [`ProbeAttempt`]s into a [`Measurement`]
//!
//! # Example
//!
//! ```rust,no_run
//! use ping_exporter::probe::{IcmpConfig, IcmpProber, Prober, reduce};
//!
//! # async fn run() -> Result<(), ping_exporter::probe::ProbeError> {
//! let prober = IcmpProber::new(IcmpConfig::default());
//! let attempts = prober.probe("1.1.1.1", 5).await?;
//! let measurement = reduce("1.1.1.1", &attempts);
//! println!("loss = {}", measurement.packet_loss_ratio);
//! # Ok(())
//! # }
//! ```

mod icmp;
mod stats;
mod traits;

pub use icmp::{IcmpConfig, IcmpProber};
pub use stats::{Measurement, RttStats, reduce, reduce_at};
pub use traits::{DEFAULT_ATTEMPTS, ProbeAttempt, ProbeError, Prober, validate_request};
