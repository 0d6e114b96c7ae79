//! Web transport layer abstraction.
//!
//! Defines the `WebTransport` trait for talking to the instrument's
//! embedded web server, allowing different implementations (reqwest, mock).

use thiserror::Error;

use crate::protocol::form::FormBody;

#[derive(Error, Debug)]
pub enum TransportError {
    #[error("Failed to connect to {address}: {message}")]
    ConnectFailed { address: String, message: String },

    #[error("Timeout after {timeout_secs}s")]
    Timeout { timeout_secs: u64 },

    #[error("Request failed: {0}")]
    RequestFailed(String),

    #[error("Device returned HTTP status {0}")]
    BadStatus(u16),

    #[error("Device disconnected")]
    Disconnected,
}

/// Abstract transport to one instrument's web interface.
///
/// This trait enables:
/// - Production implementation using blocking reqwest
/// - Mock implementation for unit testing
///
/// All calls block for at most the transport's configured timeout; there is
/// no pooling and no retry, so a single failure surfaces immediately.
pub trait WebTransport: Send + Sync {
    /// Fetch the device's status page.
    fn get_page(&self) -> Result<String, TransportError>;

    /// Submit a multipart form to the device and return the response body.
    fn post_form(&self, form: &FormBody) -> Result<String, TransportError>;

    /// Base URL of the instrument.
    fn address(&self) -> &str;
}
