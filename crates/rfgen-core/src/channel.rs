//! Channel data model and capability metadata.

use std::fmt;

use serde::{Deserialize, Serialize};

/// Settings of one DDS output channel, in base units.
///
/// The wire format differs (frequency travels in MHz, the gate travels as a
/// forced-zero amplitude); conversion happens entirely in the protocol
/// client, so values of this type are always in the units below.
#[derive(Debug, Clone, Copy, PartialEq, Serialize, Deserialize)]
pub struct ChannelValues {
    /// Output frequency in Hz.
    pub frequency_hz: f64,
    /// Output amplitude in percent of full scale.
    pub amplitude_pct: f64,
    /// Phase offset in degrees.
    pub phase_deg: f64,
    /// Logical output gate. The device has no gate control of its own;
    /// a gated-off channel is programmed with zero amplitude instead.
    pub gate: bool,
}

impl Default for ChannelValues {
    fn default() -> Self {
        Self {
            frequency_hz: Capability::FREQUENCY.min,
            amplitude_pct: 0.0,
            phase_deg: 0.0,
            gate: true,
        }
    }
}

/// One of the three tunable registers of a channel.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
pub enum Subchannel {
    Frequency,
    Amplitude,
    Phase,
}

impl fmt::Display for Subchannel {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            Subchannel::Frequency => write!(f, "freq"),
            Subchannel::Amplitude => write!(f, "amp"),
            Subchannel::Phase => write!(f, "phase"),
        }
    }
}

/// Display/validation metadata for one subchannel.
///
/// Consumed by front-end collaborators; the driver itself never clamps or
/// re-derives these.
#[derive(Debug, Clone, Copy, PartialEq)]
pub struct Capability {
    /// Unit the driver exchanges with callers.
    pub base_unit: &'static str,
    pub min: f64,
    pub max: f64,
    pub step: f64,
    /// Decimals of resolution the front panel should display.
    pub decimals: u8,
}

impl Capability {
    pub const FREQUENCY: Capability = Capability {
        base_unit: "Hz",
        min: 500_000.0,
        max: 350_000_000.0,
        step: 1_000_000.0,
        decimals: 1,
    };

    pub const AMPLITUDE: Capability = Capability {
        base_unit: "%",
        min: 0.0,
        max: 99.993_896_48,
        step: 1.0,
        decimals: 3,
    };

    pub const PHASE: Capability = Capability {
        base_unit: "Degrees",
        min: 0.0,
        max: 360.0,
        step: 1.0,
        decimals: 3,
    };

    /// Capability table entry for a subchannel.
    pub const fn of(subchannel: Subchannel) -> Capability {
        match subchannel {
            Subchannel::Frequency => Self::FREQUENCY,
            Subchannel::Amplitude => Self::AMPLITUDE,
            Subchannel::Phase => Self::PHASE,
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_capability_units() {
        assert_eq!(Capability::of(Subchannel::Frequency).base_unit, "Hz");
        assert_eq!(Capability::of(Subchannel::Amplitude).base_unit, "%");
        assert_eq!(Capability::of(Subchannel::Phase).base_unit, "Degrees");
    }

    #[test]
    fn test_default_channel_is_gated_on() {
        let v = ChannelValues::default();
        assert!(v.gate);
        assert_eq!(v.frequency_hz, 500_000.0);
    }
}
