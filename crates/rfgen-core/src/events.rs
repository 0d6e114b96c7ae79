//! Event system for front-end decoupling.
//!
//! Allows a CLI or front panel to subscribe to session events without
//! tight coupling to the core logic.

use crate::channel::ChannelValues;
use crate::mode::Mode;

/// Events emitted by a session controller.
#[derive(Debug, Clone)]
pub enum SessionEvent {
    /// Operating mode changed.
    ModeChanged { from: Mode, to: Mode },
    /// A waveform program was uploaded and started.
    ProgramUploaded { channels: usize },
    /// A halt was requested across all sessions.
    HaltRequested { accepted: bool },
    /// A channel's front-panel values changed.
    ValuesUpdated {
        channel: usize,
        values: ChannelValues,
    },
    /// One session failed to return to manual control.
    TransitionFailed { address: String },
    /// The device could not be recovered; a restart is required.
    RecoveryFailed,
}

/// Observer trait for receiving session events.
///
/// Implement this trait in your UI layer to receive updates.
pub trait SessionObserver: Send + Sync {
    /// Called when an event occurs.
    fn on_event(&self, event: &SessionEvent);
}

/// No-op observer that discards all events.
pub struct NullObserver;

impl SessionObserver for NullObserver {
    fn on_event(&self, _event: &SessionEvent) {
        // Do nothing
    }
}

/// Observer that logs events using tracing.
pub struct TracingObserver;

impl SessionObserver for TracingObserver {
    fn on_event(&self, event: &SessionEvent) {
        match event {
            SessionEvent::ModeChanged { from, to } => {
                tracing::info!(from = %from, to = %to, "Mode changed");
            }
            SessionEvent::ProgramUploaded { channels } => {
                tracing::info!(channels = channels, "Program uploaded");
            }
            SessionEvent::HaltRequested { accepted } => {
                tracing::info!(accepted = accepted, "Halt requested");
            }
            SessionEvent::ValuesUpdated { channel, values } => {
                tracing::debug!(
                    channel = channel,
                    freq_hz = values.frequency_hz,
                    amp_pct = values.amplitude_pct,
                    phase_deg = values.phase_deg,
                    gate = values.gate,
                    "Values updated"
                );
            }
            SessionEvent::TransitionFailed { address } => {
                tracing::warn!(address = %address, "Session failed to transition to manual");
            }
            SessionEvent::RecoveryFailed => {
                tracing::error!("Device could not be returned to manual control");
            }
        }
    }
}
