//! Mock web transport for testing.

use std::collections::VecDeque;
use std::sync::Mutex;

use super::traits::{TransportError, WebTransport};
use crate::protocol::form::FormBody;

/// Mock transport for unit testing protocol and session logic.
#[derive(Debug)]
pub struct MockTransport {
    /// Queued response pages returned on each request, in order.
    page_queue: Mutex<VecDeque<String>>,
    /// Captured form posts.
    post_log: Mutex<Vec<FormBody>>,
    /// Number of GET requests served.
    get_count: Mutex<usize>,
    /// Whether the device is "connected".
    connected: Mutex<bool>,
    /// Simulated base URL.
    address: String,
}

impl MockTransport {
    pub fn new() -> Self {
        Self {
            page_queue: Mutex::new(VecDeque::new()),
            post_log: Mutex::new(Vec::new()),
            get_count: Mutex::new(0),
            connected: Mutex::new(true),
            address: "http://mock-device:8080".to_string(),
        }
    }

    /// Queue a response page to be returned on the next request.
    pub fn queue_page(&self, page: &str) {
        self.page_queue.lock().unwrap().push_back(page.to_string());
    }

    /// Get all captured form posts.
    pub fn posted_forms(&self) -> Vec<FormBody> {
        self.post_log.lock().unwrap().clone()
    }

    /// Clear captured posts.
    pub fn clear_posts(&self) {
        self.post_log.lock().unwrap().clear();
    }

    /// Number of GET requests served so far.
    pub fn get_count(&self) -> usize {
        *self.get_count.lock().unwrap()
    }

    /// Simulate device disconnect.
    pub fn disconnect(&self) {
        *self.connected.lock().unwrap() = false;
    }

    /// Simulate device reconnect.
    pub fn reconnect(&self) {
        *self.connected.lock().unwrap() = true;
    }

    fn next_page(&self) -> Result<String, TransportError> {
        if !*self.connected.lock().unwrap() {
            return Err(TransportError::Disconnected);
        }
        // An empty queue behaves like a dead device: the request times out.
        self.page_queue
            .lock()
            .unwrap()
            .pop_front()
            .ok_or(TransportError::Timeout { timeout_secs: 30 })
    }
}

impl Default for MockTransport {
    fn default() -> Self {
        Self::new()
    }
}

impl WebTransport for MockTransport {
    fn get_page(&self) -> Result<String, TransportError> {
        let page = self.next_page()?;
        *self.get_count.lock().unwrap() += 1;
        Ok(page)
    }

    fn post_form(&self, form: &FormBody) -> Result<String, TransportError> {
        let page = self.next_page()?;
        self.post_log.lock().unwrap().push(form.clone());
        Ok(page)
    }

    fn address(&self) -> &str {
        &self.address
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::protocol::form::Trigger;

    #[test]
    fn test_mock_page_queue() {
        let mock = MockTransport::new();
        mock.queue_page("first");
        mock.queue_page("second");

        assert_eq!(mock.get_page().unwrap(), "first");
        assert_eq!(mock.get_page().unwrap(), "second");

        // Queue is empty now
        assert!(matches!(
            mock.get_page(),
            Err(TransportError::Timeout { .. })
        ));
    }

    #[test]
    fn test_mock_post_capture() {
        let mock = MockTransport::new();
        mock.queue_page("ok");

        let mut form = FormBody::new();
        form.add_trigger(Trigger::Halt);
        mock.post_form(&form).unwrap();

        let posts = mock.posted_forms();
        assert_eq!(posts.len(), 1);
        assert!(posts[0].has_trigger(Trigger::Halt));
    }

    #[test]
    fn test_mock_disconnect() {
        let mock = MockTransport::new();
        mock.queue_page("unreached");
        mock.disconnect();
        assert!(matches!(
            mock.get_page(),
            Err(TransportError::Disconnected)
        ));

        mock.reconnect();
        assert_eq!(mock.get_page().unwrap(), "unreached");
    }

    #[test]
    fn test_failed_post_is_not_captured() {
        let mock = MockTransport::new();
        let form = FormBody::new();
        assert!(mock.post_form(&form).is_err());
        assert!(mock.posted_forms().is_empty());
    }
}
