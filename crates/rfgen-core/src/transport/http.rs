//! reqwest-based blocking HTTP transport.

use std::time::Duration;

use reqwest::blocking::{Client, multipart};
use tracing::{debug, instrument};

use super::traits::{TransportError, WebTransport};
use crate::protocol::form::FormBody;

/// Blocking HTTP transport to one instrument.
///
/// Every request carries the configured timeout; a hung device holds the
/// calling worker for at most that long. No cancellation, no retries.
pub struct HttpTransport {
    client: Client,
    address: String,
    timeout: Duration,
}

impl HttpTransport {
    /// Build a transport for `http://<host>:<port>`.
    #[instrument(level = "info", skip(timeout))]
    pub fn new(host: &str, port: u16, timeout: Duration) -> Result<Self, TransportError> {
        Self::with_url(format!("http://{host}:{port}"), timeout)
    }

    /// Build a transport for an explicit base URL.
    pub fn with_url(address: String, timeout: Duration) -> Result<Self, TransportError> {
        let client = Client::builder()
            .timeout(timeout)
            .build()
            .map_err(|e| TransportError::ConnectFailed {
                address: address.clone(),
                message: e.to_string(),
            })?;
        Ok(Self {
            client,
            address,
            timeout,
        })
    }

    fn classify(&self, err: reqwest::Error) -> TransportError {
        if err.is_timeout() {
            TransportError::Timeout {
                timeout_secs: self.timeout.as_secs(),
            }
        } else if err.is_connect() {
            TransportError::ConnectFailed {
                address: self.address.clone(),
                message: err.to_string(),
            }
        } else {
            TransportError::RequestFailed(err.to_string())
        }
    }

    fn check_status(&self, status: reqwest::StatusCode) -> Result<(), TransportError> {
        if status.is_success() {
            Ok(())
        } else {
            Err(TransportError::BadStatus(status.as_u16()))
        }
    }
}

impl WebTransport for HttpTransport {
    fn get_page(&self) -> Result<String, TransportError> {
        let response = self
            .client
            .get(&self.address)
            .send()
            .map_err(|e| self.classify(e))?;
        self.check_status(response.status())?;
        let body = response.text().map_err(|e| self.classify(e))?;
        debug!(len = body.len(), "GET complete");
        Ok(body)
    }

    fn post_form(&self, form: &FormBody) -> Result<String, TransportError> {
        let mut parts = multipart::Form::new();
        for (name, value) in form.fields() {
            parts = parts.text(name.clone(), value.clone());
        }
        for file in form.files() {
            let part = multipart::Part::bytes(file.content.clone()).file_name(file.filename.clone());
            parts = parts.part(file.name.clone(), part);
        }

        let response = self
            .client
            .post(&self.address)
            .multipart(parts)
            .send()
            .map_err(|e| self.classify(e))?;
        self.check_status(response.status())?;
        let body = response.text().map_err(|e| self.classify(e))?;
        debug!(
            fields = form.fields().len(),
            files = form.files().len(),
            len = body.len(),
            "POST complete"
        );
        Ok(body)
    }

    fn address(&self) -> &str {
        &self.address
    }
}
