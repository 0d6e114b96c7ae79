//! Operating mode of a device session.

use std::fmt;

/// Mode of one device session.
///
/// Exactly one controller owns the mode of a physical device, and mode
/// transitions are serialized: never two in flight for the same device.
/// `Manual` is both the initial and the resting state.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum Mode {
    /// Interactive, immediate channel programming.
    Manual,
    /// Waveform program upload in progress.
    TransitionToBuffered,
    /// Executing a pre-uploaded timed waveform program.
    Buffered,
    /// Returning the device to manual control.
    TransitionToManual,
}

impl Default for Mode {
    fn default() -> Self {
        Self::Manual
    }
}

impl fmt::Display for Mode {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            Mode::Manual => write!(f, "MANUAL"),
            Mode::TransitionToBuffered => write!(f, "TRANSITION_TO_BUFFERED"),
            Mode::Buffered => write!(f, "BUFFERED"),
            Mode::TransitionToManual => write!(f, "TRANSITION_TO_MANUAL"),
        }
    }
}

impl Mode {
    /// Check if this is one of the transient transition modes.
    pub fn is_transition(&self) -> bool {
        matches!(self, Mode::TransitionToBuffered | Mode::TransitionToManual)
    }
}
