//! Session controller - mode state machine over one primary and any number
//! of secondary device sessions.
//!
//! Buffered execution is fire-and-forget: once a program is uploaded there
//! is no way to poll for completion through this API, so the transition
//! back to manual is the one place where requested and actual device state
//! are reconciled. That transition is deliberately resilient: every session
//! gets its chance to recover even when an earlier one fails.

use std::collections::HashMap;
use std::sync::Arc;

use serde::{Deserialize, Serialize};
use thiserror::Error;
use tracing::{info, instrument, warn};

use crate::channel::ChannelValues;
use crate::client::{DeviceClient, DeviceError};
use crate::events::{SessionEvent, SessionObserver, TracingObserver};
use crate::mode::Mode;
use crate::program::{ChannelProgram, ProgramError, ProgramSource};
use crate::protocol::constants::{DEFAULT_TIMEOUT_SECS, DEVICE_PORT, NUM_CHANNELS};
use crate::transport::WebTransport;

/// Per-channel snapshot applied to the front panel after a buffered run.
pub type FinalValues = HashMap<usize, ChannelValues>;

/// Configuration for a device session.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct SessionConfig {
    /// Instrument hostname or IP.
    pub host: String,
    /// Web interface port.
    #[serde(default = "default_port")]
    pub port: u16,
    /// Wire call timeout in seconds.
    #[serde(default = "default_timeout")]
    pub timeout_secs: u64,
    /// Number of DDS output channels.
    #[serde(default = "default_channels")]
    pub num_channels: usize,
    /// Base URLs of secondary instrument sessions, if any.
    #[serde(default)]
    pub secondaries: Vec<String>,
}

fn default_port() -> u16 {
    DEVICE_PORT
}

fn default_timeout() -> u64 {
    DEFAULT_TIMEOUT_SECS
}

fn default_channels() -> usize {
    NUM_CHANNELS
}

impl Default for SessionConfig {
    fn default() -> Self {
        Self {
            host: "localhost".to_string(),
            port: default_port(),
            timeout_secs: default_timeout(),
            num_channels: default_channels(),
            secondaries: Vec::new(),
        }
    }
}

impl SessionConfig {
    /// Load configuration from a TOML file
    pub fn load_from_file<P: AsRef<std::path::Path>>(path: P) -> anyhow::Result<Self> {
        let content = std::fs::read_to_string(path)?;
        let config: SessionConfig = toml::from_str(&content)?;
        Ok(config)
    }

    /// Save configuration to a TOML file
    pub fn save_to_file<P: AsRef<std::path::Path>>(&self, path: P) -> anyhow::Result<()> {
        let content = toml::to_string_pretty(self)?;
        std::fs::write(path, content)?;
        Ok(())
    }

    /// Base URL of the primary instrument.
    pub fn address(&self) -> String {
        format!("http://{}:{}", self.host, self.port)
    }
}

#[derive(Error, Debug)]
pub enum SessionError {
    /// One or more sessions could not be returned to manual control. Not
    /// recoverable automatically: the device session must be restarted by
    /// an operator before anything else is driven.
    #[error("could not transition to manual; restart this device to continue")]
    ManualRecoveryFailed,

    #[error("cannot {action} while in {mode} mode")]
    WrongMode { action: &'static str, mode: Mode },

    #[error(transparent)]
    Device(#[from] DeviceError),

    #[error(transparent)]
    Program(#[from] ProgramError),
}

/// Work interface the controller drives on each device session.
///
/// `DeviceClient` is the production implementation; tests substitute
/// scripted sessions to exercise the aggregation logic without a device.
pub trait DeviceSession {
    fn address(&self) -> &str;
    fn num_channels(&self) -> usize;
    fn program_manual(
        &mut self,
        values: &HashMap<usize, ChannelValues>,
    ) -> Result<HashMap<usize, ChannelValues>, DeviceError>;
    fn upload_and_run(
        &mut self,
        programs: &HashMap<usize, ChannelProgram>,
    ) -> Result<FinalValues, DeviceError>;
    fn halt_execution(&mut self) -> Result<bool, DeviceError>;
    fn transition_to_manual(&mut self) -> bool;
    fn check_remote_values(&mut self) -> Result<HashMap<usize, ChannelValues>, DeviceError>;
}

impl<T: WebTransport> DeviceSession for DeviceClient<T> {
    fn address(&self) -> &str {
        DeviceClient::address(self)
    }

    fn num_channels(&self) -> usize {
        DeviceClient::num_channels(self)
    }

    fn program_manual(
        &mut self,
        values: &HashMap<usize, ChannelValues>,
    ) -> Result<HashMap<usize, ChannelValues>, DeviceError> {
        DeviceClient::program_manual(self, values)
    }

    fn upload_and_run(
        &mut self,
        programs: &HashMap<usize, ChannelProgram>,
    ) -> Result<FinalValues, DeviceError> {
        DeviceClient::upload_and_run(self, programs)
    }

    fn halt_execution(&mut self) -> Result<bool, DeviceError> {
        DeviceClient::halt_execution(self)
    }

    fn transition_to_manual(&mut self) -> bool {
        DeviceClient::transition_to_manual(self)
    }

    fn check_remote_values(&mut self) -> Result<HashMap<usize, ChannelValues>, DeviceError> {
        DeviceClient::check_remote_values(self)
    }
}

/// Owns the operating mode of one physical device and coordinates its
/// primary and secondary sessions through mode transitions.
pub struct SessionController<S: DeviceSession, O: SessionObserver> {
    mode: Mode,
    primary: S,
    secondaries: Vec<S>,
    /// Display-only front panel state; updated from decoded values and from
    /// a program's final values, never programmed back to the device.
    panel: HashMap<usize, ChannelValues>,
    final_values: Option<FinalValues>,
    observer: Arc<O>,
}

impl<S: DeviceSession> SessionController<S, TracingObserver> {
    /// Create a controller with the default tracing observer.
    pub fn new(primary: S) -> Self {
        Self::with_observer(primary, Arc::new(TracingObserver))
    }
}

impl<S: DeviceSession, O: SessionObserver> SessionController<S, O> {
    /// Create a controller with a custom observer.
    pub fn with_observer(primary: S, observer: Arc<O>) -> Self {
        let panel = (0..primary.num_channels())
            .map(|ch| (ch, ChannelValues::default()))
            .collect();
        Self {
            mode: Mode::Manual,
            primary,
            secondaries: Vec::new(),
            panel,
            final_values: None,
            observer,
        }
    }

    /// Attach a secondary session coordinated through mode transitions.
    pub fn add_secondary(&mut self, session: S) {
        self.secondaries.push(session);
    }

    pub fn mode(&self) -> Mode {
        self.mode
    }

    /// Current display-only front panel values.
    pub fn panel_values(&self) -> &HashMap<usize, ChannelValues> {
        &self.panel
    }

    fn goto_mode(&mut self, to: Mode) {
        let from = std::mem::replace(&mut self.mode, to);
        info!(from = %from, to = %to, "Mode transition");
        self.observer.on_event(&SessionEvent::ModeChanged { from, to });
    }

    fn set_panel(&mut self, channel: usize, values: ChannelValues) {
        self.panel.insert(channel, values);
        self.observer
            .on_event(&SessionEvent::ValuesUpdated { channel, values });
    }

    /// Program channel values interactively and mirror the decoded result
    /// on the front panel.
    pub fn program_manual(
        &mut self,
        values: &HashMap<usize, ChannelValues>,
    ) -> Result<HashMap<usize, ChannelValues>, SessionError> {
        if self.mode != Mode::Manual {
            return Err(SessionError::WrongMode {
                action: "program manually",
                mode: self.mode,
            });
        }
        let decoded = self.primary.program_manual(values)?;
        for (&channel, &values) in &decoded {
            self.set_panel(channel, values);
        }
        Ok(decoded)
    }

    /// Read back what the device is currently programmed to, without
    /// programming anything.
    pub fn check_remote_values(
        &mut self,
    ) -> Result<HashMap<usize, ChannelValues>, SessionError> {
        Ok(self.primary.check_remote_values()?)
    }

    /// Upload the waveform program and start buffered execution.
    ///
    /// On success the returned snapshot holds each channel's final program
    /// row, kept for the eventual transition back to manual. There is no
    /// automatic retry: a failed upload leaves the session mid-transition
    /// for the caller to abort or recover.
    #[instrument(skip(self, source))]
    pub fn enter_buffered<P: ProgramSource>(
        &mut self,
        source: &P,
    ) -> Result<FinalValues, SessionError> {
        if self.mode != Mode::Manual {
            return Err(SessionError::WrongMode {
                action: "enter buffered mode",
                mode: self.mode,
            });
        }
        self.goto_mode(Mode::TransitionToBuffered);

        let mut programs = HashMap::new();
        for channel in 0..self.primary.num_channels() {
            programs.insert(channel, source.channel_program(channel)?);
        }

        let final_values = self.primary.upload_and_run(&programs)?;
        self.observer.on_event(&SessionEvent::ProgramUploaded {
            channels: programs.len(),
        });
        self.final_values = Some(final_values.clone());
        self.goto_mode(Mode::Buffered);
        Ok(final_values)
    }

    /// Halt buffered execution on every session.
    ///
    /// Returns whether all sessions accepted the halt. The mode is left
    /// untouched either way; callers follow up with [`Self::exit_to_manual`]
    /// to resynchronize.
    pub fn abort_buffered(&mut self) -> bool {
        self.halt_all_sessions()
    }

    /// Halt a buffered transition that has not completed.
    ///
    /// Same wire request as [`Self::abort_buffered`]; kept as a distinct
    /// entry point because the orchestrator invokes it from a different
    /// phase of the run.
    pub fn abort_transition_to_buffered(&mut self) -> bool {
        self.halt_all_sessions()
    }

    fn halt_all_sessions(&mut self) -> bool {
        let mut accepted = halt_session(&mut self.primary);
        for secondary in &mut self.secondaries {
            accepted &= halt_session(secondary);
        }
        self.observer
            .on_event(&SessionEvent::HaltRequested { accepted });
        accepted
    }

    /// Return every session to manual control and resynchronize the front
    /// panel from the recorded final values.
    ///
    /// A failing session never short-circuits the others: the goal is to
    /// hand back as much of the device as possible even under partial
    /// failure. Only after every session has been attempted does an overall
    /// failure surface, as the fatal [`SessionError::ManualRecoveryFailed`].
    #[instrument(skip(self))]
    pub fn exit_to_manual(&mut self, apply_final_values: bool) -> Result<(), SessionError> {
        self.goto_mode(Mode::TransitionToManual);

        let mut success = self.transition_session_to_manual(0);
        for index in 0..self.secondaries.len() {
            let ok = self.transition_session_to_manual(index + 1);
            // don't break here, so that as much of the device as possible
            // is returned to normal
            success &= ok;
        }

        if apply_final_values {
            if let Some(final_values) = self.final_values.take() {
                for (channel, values) in final_values {
                    self.set_panel(channel, values);
                }
            }
        } else {
            self.final_values = None;
        }

        if success {
            self.goto_mode(Mode::Manual);
            Ok(())
        } else {
            self.observer.on_event(&SessionEvent::RecoveryFailed);
            Err(SessionError::ManualRecoveryFailed)
        }
    }

    /// Transition one session by index, 0 being the primary.
    fn transition_session_to_manual(&mut self, index: usize) -> bool {
        let session = if index == 0 {
            &mut self.primary
        } else {
            &mut self.secondaries[index - 1]
        };
        let ok = session.transition_to_manual();
        if !ok {
            let address = session.address().to_string();
            warn!(address = %address, "Session failed to transition to manual");
            self.observer
                .on_event(&SessionEvent::TransitionFailed { address });
        }
        ok
    }
}

fn halt_session<S: DeviceSession>(session: &mut S) -> bool {
    match session.halt_execution() {
        Ok(accepted) => accepted,
        Err(err) => {
            warn!(address = %session.address(), error = %err, "Halt request failed");
            false
        }
    }
}
