#![allow(clippy::cast_precision_loss)]

use crate::net::path::ObjectPath;
use crate::runtime::rng;
use crate::time::Duration;
use rand::Rng;
use std::fmt::Display;
use std::sync::Arc;

///
/// A reference to a channel.
///
pub type ChannelRef = Arc<Channel>;

///
/// The parameters that define a connection's transmission behaviour.
///
#[derive(Debug, Clone, Copy, PartialEq)]
pub struct ChannelMetrics {
    /// The propagation delay a message endures while traversing the
    /// connection.
    pub delay: Duration,
    /// The probability that a single bit is corrupted in transit,
    /// in `[0, 1]`.
    pub bit_error_rate: f64,
    /// The throughput of the connection in bit/s. A data rate of `0`
    /// means instantaneous transmission.
    pub data_rate: f64,
}

impl ChannelMetrics {
    ///
    /// Creates a new set of channel parameters.
    ///
    /// # Panics
    ///
    /// Panics if the bit error rate is outside of `[0, 1]` or the data
    /// rate is negative.
    ///
    #[must_use]
    pub fn new(delay: Duration, bit_error_rate: f64, data_rate: f64) -> Self {
        assert!(
            (0.0..=1.0).contains(&bit_error_rate),
            "bit error rate must be a probability in [0, 1]"
        );
        assert!(data_rate >= 0.0, "data rate must be non-negative");
        Self {
            delay,
            bit_error_rate,
            data_rate,
        }
    }

    ///
    /// A pure delay line without rate limiting or bit errors.
    ///
    #[must_use]
    pub fn delay(delay: Duration) -> Self {
        Self::new(delay, 0.0, 0.0)
    }

    ///
    /// The duration a message of the given bit length occupies the
    /// connection: propagation delay plus transmission time.
    ///
    #[must_use]
    pub fn transit_duration(&self, bit_len: usize) -> Duration {
        if self.data_rate == 0.0 {
            self.delay
        } else {
            self.delay + Duration::from_secs_f64(bit_len as f64 / self.data_rate)
        }
    }

    ///
    /// Samples whether a message of the given bit length is corrupted,
    /// applying the bit error rate once per bit.
    ///
    #[must_use]
    pub fn sample_bit_error(&self, bit_len: usize) -> bool {
        if self.bit_error_rate <= 0.0 || bit_len == 0 {
            return false;
        }
        if self.bit_error_rate >= 1.0 {
            return true;
        }
        let p_intact = (1.0 - self.bit_error_rate).powi(bit_len as i32);
        rng(|rng| rng.gen_bool(1.0 - p_intact))
    }
}

impl Display for ChannelMetrics {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("ChannelMetrics")
            .field("delay", &self.delay)
            .field("bit_error_rate", &self.bit_error_rate)
            .field("data_rate (bit/s)", &self.data_rate)
            .finish()
    }
}

impl Eq for ChannelMetrics {}

///
/// A one-directional delayed link between two gates.
///
#[derive(Debug)]
pub struct Channel {
    path: ObjectPath,
    metrics: ChannelMetrics,
}

impl Channel {
    ///
    /// Creates a new channel from the given parameters.
    ///
    #[must_use]
    pub fn new(path: ObjectPath, metrics: ChannelMetrics) -> ChannelRef {
        Arc::new(Self { path, metrics })
    }

    /// The object path of the channel, derived from its source gate.
    #[must_use]
    pub fn path(&self) -> &ObjectPath {
        &self.path
    }

    /// The parameters of the channel.
    #[must_use]
    pub fn metrics(&self) -> &ChannelMetrics {
        &self.metrics
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn transit_duration_with_data_rate() {
        let metrics = ChannelMetrics::new(Duration::from_millis(100), 0.0, 1000.0);
        // 500 bits over 1000 bit/s plus 0.1s latency
        assert_eq!(
            metrics.transit_duration(500),
            Duration::from_secs_f64(0.6)
        );
    }

    #[test]
    fn transit_duration_instantaneous() {
        let metrics = ChannelMetrics::delay(Duration::from_secs(1));
        assert_eq!(metrics.transit_duration(10_000), Duration::from_secs(1));
    }

    #[test]
    fn bit_error_extremes() {
        let never = ChannelMetrics::new(Duration::ZERO, 0.0, 0.0);
        assert!(!never.sample_bit_error(1_000));

        let always = ChannelMetrics::new(Duration::ZERO, 1.0, 0.0);
        assert!(always.sample_bit_error(10));
        // zero-length messages carry no corruptible bits
        assert!(!always.sample_bit_error(0));
    }
}
