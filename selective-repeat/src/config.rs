//! Protocol and channel parameters.
//!
//! [`ProtocolConfig`] fixes the constants both endpoints must agree on:
//! window size, sequence space and retransmission timeout.
//! [`ChannelConfig`] describes the fault model and workload of the
//! simulated channel.  Both validate on construction so a bad combination
//! never reaches an endpoint.

use thiserror::Error;

use crate::packet::SeqNum;

/// Largest usable sequence space: every sequence number must fit the
/// non-negative range of the packet's `i32` fields.
pub const MAX_SEQ_SPACE: SeqNum = i32::MAX as SeqNum + 1;

/// Errors produced by configuration validation.
#[derive(Debug, Error, PartialEq)]
pub enum ConfigError {
    #[error("window size must be at least 1")]
    EmptyWindow,

    #[error("sequence space {seq_space} must be at least twice the window size {window_size}")]
    SeqSpaceTooSmall {
        window_size: usize,
        seq_space: SeqNum,
    },

    #[error("sequence space {0} does not fit the packet's 32-bit signed fields (max 2^31)")]
    SeqSpaceTooLarge(SeqNum),

    #[error("retransmission timeout must be positive and finite, got {0}")]
    InvalidRtt(f64),

    #[error("{name} must be a probability in [0, 1], got {value}")]
    InvalidProbability { name: &'static str, value: f64 },

    #[error("mean interarrival time must be positive and finite, got {0}")]
    InvalidInterarrival(f64),

    #[error("maximum simulation time must be positive and finite, got {0}")]
    InvalidMaxTime(f64),

    #[error("session tick must be non-zero")]
    ZeroTick,
}

// ---------------------------------------------------------------------------
// ProtocolConfig
// ---------------------------------------------------------------------------

/// Constants shared by the sender and receiver.
#[derive(Debug, Clone, Copy, PartialEq)]
pub struct ProtocolConfig {
    /// Maximum number of unacknowledged (sender) or buffered (receiver)
    /// packets.
    pub window_size: usize,
    /// Modulus of the sequence-number space.
    pub seq_space: SeqNum,
    /// Retransmission timeout, in simulator time units.
    pub rtt: f64,
}

impl Default for ProtocolConfig {
    fn default() -> Self {
        Self {
            window_size: 6,
            seq_space: 13,
            rtt: 16.0,
        }
    }
}

impl ProtocolConfig {
    pub fn new(window_size: usize, seq_space: SeqNum, rtt: f64) -> Result<Self, ConfigError> {
        let config = Self {
            window_size,
            seq_space,
            rtt,
        };
        config.validate()?;
        Ok(config)
    }

    /// Check the invariants the endpoints rely on.
    ///
    /// `seq_space >= 2 * window_size` keeps the current and previous receive
    /// windows disjoint under wraparound.
    pub fn validate(&self) -> Result<(), ConfigError> {
        if self.window_size == 0 {
            return Err(ConfigError::EmptyWindow);
        }
        let too_small = SeqNum::try_from(self.window_size)
            .ok()
            .and_then(|w| w.checked_mul(2))
            .map_or(true, |min| self.seq_space < min);
        if too_small {
            return Err(ConfigError::SeqSpaceTooSmall {
                window_size: self.window_size,
                seq_space: self.seq_space,
            });
        }
        if self.seq_space > MAX_SEQ_SPACE {
            return Err(ConfigError::SeqSpaceTooLarge(self.seq_space));
        }
        if !(self.rtt.is_finite() && self.rtt > 0.0) {
            return Err(ConfigError::InvalidRtt(self.rtt));
        }
        Ok(())
    }
}

// ---------------------------------------------------------------------------
// ChannelConfig
// ---------------------------------------------------------------------------

/// Workload and fault model for [`crate::simulator::Simulator`].
#[derive(Debug, Clone, PartialEq)]
pub struct ChannelConfig {
    /// Number of application messages the simulator generates itself.
    pub messages: usize,
    /// Probability that a packet handed to the channel is dropped.
    pub loss_prob: f64,
    /// Probability that a surviving packet has one field overwritten.
    pub corrupt_prob: f64,
    /// Mean time between generated application messages.
    pub mean_interarrival: f64,
    /// Seed for the channel's random number generator.
    pub seed: u64,
    /// Virtual time after which the simulation stops regardless of state.
    pub max_time: f64,
}

impl Default for ChannelConfig {
    fn default() -> Self {
        Self {
            messages: 20,
            loss_prob: 0.0,
            corrupt_prob: 0.0,
            mean_interarrival: 10.0,
            seed: 0,
            max_time: 1_000_000.0,
        }
    }
}

impl ChannelConfig {
    pub fn validate(&self) -> Result<(), ConfigError> {
        check_probability("loss probability", self.loss_prob)?;
        check_probability("corruption probability", self.corrupt_prob)?;
        if !(self.mean_interarrival.is_finite() && self.mean_interarrival > 0.0) {
            return Err(ConfigError::InvalidInterarrival(self.mean_interarrival));
        }
        if !(self.max_time.is_finite() && self.max_time > 0.0) {
            return Err(ConfigError::InvalidMaxTime(self.max_time));
        }
        Ok(())
    }
}

fn check_probability(name: &'static str, value: f64) -> Result<(), ConfigError> {
    if (0.0..=1.0).contains(&value) {
        Ok(())
    } else {
        Err(ConfigError::InvalidProbability { name, value })
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn defaults_are_valid() {
        assert!(ProtocolConfig::default().validate().is_ok());
        assert!(ChannelConfig::default().validate().is_ok());
    }

    #[test]
    fn zero_window_rejected() {
        assert_eq!(
            ProtocolConfig::new(0, 13, 16.0),
            Err(ConfigError::EmptyWindow)
        );
    }

    #[test]
    fn seq_space_must_cover_two_windows() {
        assert!(ProtocolConfig::new(6, 12, 16.0).is_ok());
        assert_eq!(
            ProtocolConfig::new(6, 11, 16.0),
            Err(ConfigError::SeqSpaceTooSmall {
                window_size: 6,
                seq_space: 11
            })
        );
    }

    #[test]
    fn seq_space_must_fit_signed_wire_fields() {
        assert!(ProtocolConfig::new(6, MAX_SEQ_SPACE, 16.0).is_ok());
        assert_eq!(
            ProtocolConfig::new(6, u32::MAX, 16.0),
            Err(ConfigError::SeqSpaceTooLarge(u32::MAX))
        );
        assert_eq!(
            ProtocolConfig::new(6, MAX_SEQ_SPACE + 1, 16.0),
            Err(ConfigError::SeqSpaceTooLarge(MAX_SEQ_SPACE + 1))
        );
    }

    #[test]
    fn max_time_must_be_positive() {
        for bad in [0.0, -5.0, f64::NAN, f64::INFINITY] {
            let config = ChannelConfig {
                max_time: bad,
                ..ChannelConfig::default()
            };
            assert!(
                matches!(config.validate(), Err(ConfigError::InvalidMaxTime(_))),
                "max_time {bad} accepted"
            );
        }
    }

    #[test]
    fn rtt_must_be_positive() {
        assert!(ProtocolConfig::new(1, 2, 0.0).is_err());
        assert!(ProtocolConfig::new(1, 2, f64::NAN).is_err());
    }

    #[test]
    fn probabilities_are_bounded() {
        let config = ChannelConfig {
            loss_prob: 1.5,
            ..ChannelConfig::default()
        };
        assert!(matches!(
            config.validate(),
            Err(ConfigError::InvalidProbability { .. })
        ));

        let config = ChannelConfig {
            mean_interarrival: 0.0,
            ..ChannelConfig::default()
        };
        assert_eq!(config.validate(), Err(ConfigError::InvalidInterarrival(0.0)));
    }
}
