//! rfgen-core: driver for a networked dual-channel DDS signal generator.
//!
//! The instrument exposes two independently tunable output channels
//! (frequency, amplitude, phase and a logical gate) behind an embedded web
//! server. This crate implements the session state machine and wire
//! protocol that let an orchestration layer program channels interactively
//! ("manual" operation), run a precomputed timed waveform program
//! ("buffered" operation), and recover the device to manual control
//! afterwards.
//!
//! # Architecture
//!
//! The crate is organized into layers:
//!
//! - **Protocol**: form field conventions, multipart body model, tolerant
//!   response-page decoding
//! - **Transport**: HTTP communication abstraction (reqwest, mock)
//! - **Client**: per-instrument protocol client with the gate retention
//!   policy
//! - **Session**: mode state machine coordinating primary and secondary
//!   sessions
//! - **Events**: observer pattern for UI decoupling
//! - **Program**: read interface over precomputed waveform programs
//!
//! # Example
//!
//! ```no_run
//! use std::time::Duration;
//! use rfgen_core::client::DeviceClient;
//! use rfgen_core::session::SessionController;
//! use rfgen_core::transport::HttpTransport;
//!
//! let transport = HttpTransport::new("192.168.1.20", 8080, Duration::from_secs(30))
//!     .expect("transport");
//! let client = DeviceClient::connect(transport).expect("device answered");
//! let controller = SessionController::new(client);
//! assert_eq!(controller.mode().to_string(), "MANUAL");
//! ```

pub mod channel;
pub mod client;
pub mod events;
pub mod mode;
pub mod program;
pub mod protocol;
pub mod session;
pub mod transport;

// Re-exports for convenience
pub use channel::{Capability, ChannelValues, Subchannel};
pub use client::{DeviceClient, DeviceError};
pub use events::{NullObserver, SessionEvent, SessionObserver, TracingObserver};
pub use mode::Mode;
pub use program::{ChannelProgram, ManifestProgram, ProgramError, ProgramSource};
pub use session::{
    DeviceSession, FinalValues, SessionConfig, SessionController, SessionError,
};
pub use transport::{HttpTransport, MockTransport, TransportError, WebTransport};
