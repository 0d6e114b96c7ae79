//! Device protocol client - owns one instrument endpoint.
//!
//! Encodes typed channel values into the device's web-form wire format,
//! decodes the values echoed back, and applies the gate retention policy
//! that reconciles requested against reported state.

use std::collections::HashMap;

use thiserror::Error;
use tracing::{debug, info, instrument};

use crate::channel::ChannelValues;
use crate::program::ChannelProgram;
use crate::protocol::constants::{
    HZ_PER_MHZ, NUM_CHANNELS, amp_field, freq_field, phase_field, pulse_field, pulse_filename,
};
use crate::protocol::form::{FormBody, Trigger};
use crate::protocol::page::{Register, extract_fields};
use crate::transport::{TransportError, WebTransport};

#[derive(Error, Debug)]
pub enum DeviceError {
    /// The instrument did not answer a wire call.
    #[error("device unreachable: {0}")]
    Unreachable(#[source] TransportError),

    /// The response did not match the expected field pattern.
    #[error("protocol error: {0}")]
    Protocol(String),

    /// The caller supplied no values for a channel the device exposes.
    #[error("no values supplied for channel {0}")]
    MissingChannel(usize),
}

impl From<TransportError> for DeviceError {
    fn from(err: TransportError) -> Self {
        match err {
            TransportError::ConnectFailed { .. }
            | TransportError::Timeout { .. }
            | TransportError::Disconnected => DeviceError::Unreachable(err),
            TransportError::RequestFailed(_) | TransportError::BadStatus(_) => {
                DeviceError::Protocol(err.to_string())
            }
        }
    }
}

/// One session against one physical instrument.
///
/// All operations are synchronous and block for at most the transport's
/// timeout. The client is single-owner and single-caller: the controller
/// issues one operation at a time, so no locking is needed.
#[derive(Debug)]
pub struct DeviceClient<T: WebTransport> {
    transport: T,
    num_channels: usize,
    /// Values last pushed by a successful manual program. Consulted when a
    /// decoded amplitude of zero is ambiguous between "gated off" and
    /// "genuinely zero".
    last_manual_values: HashMap<usize, ChannelValues>,
}

impl<T: WebTransport> DeviceClient<T> {
    /// Open a session, probing the instrument for reachability first.
    ///
    /// This GET is the only explicit liveness check; later operations rely
    /// on the per-request timeout to detect a dead device.
    pub fn connect(transport: T) -> Result<Self, DeviceError> {
        transport.get_page()?;
        info!(address = %transport.address(), "instrument answered");
        Ok(Self::new(transport))
    }

    /// Wrap an already-probed transport without touching the wire.
    pub fn new(transport: T) -> Self {
        Self::with_channels(transport, NUM_CHANNELS)
    }

    pub fn with_channels(transport: T, num_channels: usize) -> Self {
        Self {
            transport,
            num_channels,
            last_manual_values: HashMap::new(),
        }
    }

    pub fn address(&self) -> &str {
        self.transport.address()
    }

    pub fn num_channels(&self) -> usize {
        self.num_channels
    }

    pub fn last_manual_values(&self) -> &HashMap<usize, ChannelValues> {
        &self.last_manual_values
    }

    /// Program all channels in manual mode and return what the device
    /// reports back, reconciled into base units.
    #[instrument(skip(self, values))]
    pub fn program_manual(
        &mut self,
        values: &HashMap<usize, ChannelValues>,
    ) -> Result<HashMap<usize, ChannelValues>, DeviceError> {
        let mut form = FormBody::new();
        for channel in 0..self.num_channels {
            let v = values
                .get(&channel)
                .ok_or(DeviceError::MissingChannel(channel))?;
            // The device has no gate field; amplitude zero is the gate.
            let amp = if v.gate { v.amplitude_pct } else { 0.0 };
            form.add_field(amp_field(channel), fmt_value(amp));
            form.add_field(freq_field(channel), fmt_value(v.frequency_hz / HZ_PER_MHZ));
            form.add_field(phase_field(channel), fmt_value(v.phase_deg));
        }
        form.add_trigger(Trigger::SetOutputs);

        let page = self.transport.post_form(&form)?;
        self.last_manual_values = values.clone();
        debug!(channels = self.num_channels, "manual program accepted");
        self.decode_page(&page)
    }

    /// Upload each channel's compiled program and start buffered execution.
    ///
    /// Returns the final-value snapshot taken from the program data; the
    /// device response only confirms acceptance.
    #[instrument(skip(self, programs))]
    pub fn upload_and_run(
        &self,
        programs: &HashMap<usize, ChannelProgram>,
    ) -> Result<HashMap<usize, ChannelValues>, DeviceError> {
        let mut form = FormBody::new();
        let mut final_values = HashMap::new();
        for channel in 0..self.num_channels {
            let program = programs
                .get(&channel)
                .ok_or(DeviceError::MissingChannel(channel))?;
            form.add_file(
                pulse_field(channel),
                pulse_filename(channel),
                program.payload.clone(),
            );
            final_values.insert(channel, program.final_values);
        }
        form.add_trigger(Trigger::UploadAndRun);

        self.transport.post_form(&form)?;
        info!(channels = self.num_channels, "program uploaded and started");
        Ok(final_values)
    }

    /// Tell the device to stop executing. The device gives no structured
    /// acknowledgment; success means the request completed.
    pub fn halt_execution(&self) -> Result<bool, DeviceError> {
        let mut form = FormBody::new();
        form.add_trigger(Trigger::Halt);
        self.transport.post_form(&form)?;
        info!("halt accepted");
        Ok(true)
    }

    /// Mark buffered execution as finished for this session.
    ///
    /// No wire call is made: beyond halt, the instrument has no endpoint
    /// that acknowledges the end of a buffered run.
    // TODO: verify the buffered program has actually finished before
    // declaring the session manual again.
    pub fn transition_to_manual(&self) -> bool {
        true
    }

    /// Read the status page and decode the embedded form field values
    /// without programming anything.
    pub fn check_remote_values(&self) -> Result<HashMap<usize, ChannelValues>, DeviceError> {
        let page = self.transport.get_page()?;
        self.decode_page(&page)
    }

    /// Decode every channel's registers from a response page and apply the
    /// gate retention policy.
    fn decode_page(&self, page: &str) -> Result<HashMap<usize, ChannelValues>, DeviceError> {
        let mut freq = HashMap::new();
        let mut amp = HashMap::new();
        let mut phase = HashMap::new();
        for field in extract_fields(page) {
            if field.channel >= self.num_channels {
                continue;
            }
            match field.register {
                Register::Frequency => freq.insert(field.channel, field.value),
                Register::Amplitude => amp.insert(field.channel, field.value),
                Register::Phase => phase.insert(field.channel, field.value),
            };
        }

        let mut decoded = HashMap::new();
        for channel in 0..self.num_channels {
            let mut values = ChannelValues {
                frequency_hz: take_register(&freq, Register::Frequency, channel)? * HZ_PER_MHZ,
                amplitude_pct: take_register(&amp, Register::Amplitude, channel)?,
                phase_deg: take_register(&phase, Register::Phase, channel)?,
                gate: true,
            };

            // Amplitude zero is ambiguous between "gated off" and "genuinely
            // zero while gated on"; trust the last manual program's intent.
            if let Some(last) = self.last_manual_values.get(&channel) {
                if values.amplitude_pct == 0.0 {
                    values.gate = last.gate;
                }
                // A gated-off channel reports zero as a side effect of the
                // gating; keep showing the amplitude the operator asked for.
                if !values.gate {
                    values.amplitude_pct = last.amplitude_pct;
                }
            }

            decoded.insert(channel, values);
        }
        Ok(decoded)
    }
}

fn take_register(
    values: &HashMap<usize, f64>,
    register: Register,
    channel: usize,
) -> Result<f64, DeviceError> {
    values.get(&channel).copied().ok_or_else(|| {
        DeviceError::Protocol(format!(
            "response carries no {} field for channel {channel}",
            register.name()
        ))
    })
}

fn fmt_value(value: f64) -> String {
    format!("{value}")
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::transport::MockTransport;

    fn values(freq_hz: f64, amp_pct: f64, phase_deg: f64, gate: bool) -> ChannelValues {
        ChannelValues {
            frequency_hz: freq_hz,
            amplitude_pct: amp_pct,
            phase_deg: phase_deg,
            gate,
        }
    }

    fn both_channels(v0: ChannelValues, v1: ChannelValues) -> HashMap<usize, ChannelValues> {
        HashMap::from([(0, v0), (1, v1)])
    }

    /// Page a well-behaved device would echo for the given wire values.
    fn echo_page(entries: &[(char, usize, f64)]) -> String {
        let mut page = String::from("<html><form>");
        for (register, channel, value) in entries {
            page.push_str(&format!(
                r#"<input type="text" name="{register}_ch{channel}_in" value="{value}">"#
            ));
        }
        page.push_str("</form></html>");
        page
    }

    fn full_echo(ch0: (f64, f64, f64), ch1: (f64, f64, f64)) -> String {
        echo_page(&[
            ('f', 0, ch0.0),
            ('a', 0, ch0.1),
            ('p', 0, ch0.2),
            ('f', 1, ch1.0),
            ('a', 1, ch1.1),
            ('p', 1, ch1.2),
        ])
    }

    #[test]
    fn test_connect_probes_device() {
        let mock = MockTransport::new();
        mock.queue_page("<html>front page</html>");
        let client = DeviceClient::connect(mock).unwrap();
        assert_eq!(client.num_channels(), 2);
        assert_eq!(client.transport.get_count(), 1);
    }

    #[test]
    fn test_connect_fails_when_unreachable() {
        let mock = MockTransport::new();
        let err = DeviceClient::connect(mock).unwrap_err();
        assert!(matches!(err, DeviceError::Unreachable(_)));
    }

    #[test]
    fn test_manual_encode_frequency_in_mhz() {
        let mock = MockTransport::new();
        mock.queue_page(&full_echo((250.0, 50.0, 0.0), (0.5, 0.0, 0.0)));
        let mut client = DeviceClient::new(mock);

        client
            .program_manual(&both_channels(
                values(250_000_000.0, 50.0, 0.0, true),
                values(500_000.0, 0.0, 0.0, true),
            ))
            .unwrap();

        let posts = client.transport.posted_forms();
        let form = &posts[0];
        assert_eq!(form.field("f_ch0_in").unwrap().parse::<f64>().unwrap(), 250.0);
        assert_eq!(form.field("f_ch1_in").unwrap().parse::<f64>().unwrap(), 0.5);
        assert!(form.has_trigger(Trigger::SetOutputs));
    }

    #[test]
    fn test_manual_gate_masks_amplitude() {
        let mock = MockTransport::new();
        mock.queue_page(&full_echo((80.0, 0.0, 0.0), (80.0, 50.0, 0.0)));
        let mut client = DeviceClient::new(mock);

        client
            .program_manual(&both_channels(
                values(80_000_000.0, 75.5, 0.0, false),
                values(80_000_000.0, 50.0, 0.0, true),
            ))
            .unwrap();

        let posts = client.transport.posted_forms();
        let form = &posts[0];
        // Gated-off channel goes out as zero amplitude regardless of request.
        assert_eq!(form.field("a_ch0_in").unwrap().parse::<f64>().unwrap(), 0.0);
        assert_eq!(form.field("a_ch1_in").unwrap().parse::<f64>().unwrap(), 50.0);
    }

    #[test]
    fn test_manual_roundtrip() {
        let mock = MockTransport::new();
        mock.queue_page(&full_echo((250.0, 50.125, 90.0), (0.5, 12.5, 180.0)));
        let mut client = DeviceClient::new(mock);

        let decoded = client
            .program_manual(&both_channels(
                values(250_000_000.0, 50.125, 90.0, true),
                values(500_000.0, 12.5, 180.0, true),
            ))
            .unwrap();

        assert_eq!(decoded[&0].frequency_hz, 250_000_000.0);
        assert_eq!(decoded[&0].amplitude_pct, 50.125);
        assert_eq!(decoded[&0].phase_deg, 90.0);
        assert!(decoded[&0].gate);
        assert_eq!(decoded[&1].frequency_hz, 500_000.0);
    }

    #[test]
    fn test_gate_retention_restores_amplitude() {
        let mock = MockTransport::new();
        // Device echoes zero amplitude for the gated-off channel.
        mock.queue_page(&full_echo((80.0, 0.0, 0.0), (80.0, 50.0, 0.0)));
        let mut client = DeviceClient::new(mock);

        let decoded = client
            .program_manual(&both_channels(
                values(80_000_000.0, 75.5, 0.0, false),
                values(80_000_000.0, 50.0, 0.0, true),
            ))
            .unwrap();

        // Gate comes back from recorded intent, amplitude from the request.
        assert!(!decoded[&0].gate);
        assert_eq!(decoded[&0].amplitude_pct, 75.5);
        assert!(decoded[&1].gate);
        assert_eq!(decoded[&1].amplitude_pct, 50.0);
    }

    #[test]
    fn test_zero_amplitude_while_gated_on_stays_zero() {
        let mock = MockTransport::new();
        mock.queue_page(&full_echo((80.0, 0.0, 0.0), (80.0, 1.0, 0.0)));
        let mut client = DeviceClient::new(mock);

        let decoded = client
            .program_manual(&both_channels(
                values(80_000_000.0, 0.0, 0.0, true),
                values(80_000_000.0, 1.0, 0.0, true),
            ))
            .unwrap();

        assert!(decoded[&0].gate);
        assert_eq!(decoded[&0].amplitude_pct, 0.0);
    }

    #[test]
    fn test_gate_assumed_on_without_manual_history() {
        let mock = MockTransport::new();
        mock.queue_page(&full_echo((80.0, 0.0, 0.0), (80.0, 0.0, 0.0)));
        let client = DeviceClient::new(mock);

        let decoded = client.check_remote_values().unwrap();
        assert!(decoded[&0].gate);
        assert_eq!(decoded[&0].amplitude_pct, 0.0);
    }

    #[test]
    fn test_remote_values_rescaled_to_hz() {
        let mock = MockTransport::new();
        mock.queue_page(&full_echo((250.0, 10.0, 0.0), (1.5, 20.0, 45.0)));
        let client = DeviceClient::new(mock);

        let decoded = client.check_remote_values().unwrap();
        assert_eq!(decoded[&0].frequency_hz, 250_000_000.0);
        assert_eq!(decoded[&1].frequency_hz, 1_500_000.0);
    }

    #[test]
    fn test_timeout_leaves_last_manual_unchanged() {
        let mock = MockTransport::new();
        mock.queue_page(&full_echo((80.0, 50.0, 0.0), (80.0, 50.0, 0.0)));
        let mut client = DeviceClient::new(mock);

        let first = both_channels(
            values(80_000_000.0, 50.0, 0.0, true),
            values(80_000_000.0, 50.0, 0.0, true),
        );
        client.program_manual(&first).unwrap();

        // Next post times out (empty queue); the recorded values survive.
        let err = client
            .program_manual(&both_channels(
                values(10_000_000.0, 1.0, 0.0, true),
                values(10_000_000.0, 1.0, 0.0, true),
            ))
            .unwrap_err();
        assert!(matches!(err, DeviceError::Unreachable(_)));
        assert_eq!(client.last_manual_values()[&0].frequency_hz, 80_000_000.0);
    }

    #[test]
    fn test_malformed_page_is_protocol_error() {
        let mock = MockTransport::new();
        // Channel 1 is missing its phase register.
        mock.queue_page(&echo_page(&[
            ('f', 0, 80.0),
            ('a', 0, 1.0),
            ('p', 0, 0.0),
            ('f', 1, 80.0),
            ('a', 1, 1.0),
        ]));
        let client = DeviceClient::new(mock);

        let err = client.check_remote_values().unwrap_err();
        assert!(matches!(err, DeviceError::Protocol(_)));
    }

    #[test]
    fn test_upload_and_run_attaches_payloads() {
        let mock = MockTransport::new();
        mock.queue_page("<html>accepted</html>");
        let client = DeviceClient::new(mock);

        let programs = HashMap::from([
            (
                0,
                ChannelProgram {
                    payload: vec![1, 2, 3],
                    final_values: values(80_000_000.0, 50.0, 0.0, true),
                },
            ),
            (
                1,
                ChannelProgram {
                    payload: vec![4, 5],
                    final_values: values(120_000_000.0, 25.0, 90.0, true),
                },
            ),
        ]);

        let finals = client.upload_and_run(&programs).unwrap();
        assert_eq!(finals[&1].frequency_hz, 120_000_000.0);

        let posts = client.transport.posted_forms();
        let form = &posts[0];
        assert!(form.has_trigger(Trigger::UploadAndRun));
        assert_eq!(form.file("pulse_ch0").unwrap().content, vec![1, 2, 3]);
        assert_eq!(form.file("pulse_ch0").unwrap().filename, "output_ch0.bin");
        assert_eq!(form.file("pulse_ch1").unwrap().content, vec![4, 5]);
    }

    #[test]
    fn test_halt_posts_only_trigger() {
        let mock = MockTransport::new();
        mock.queue_page("<html>halted</html>");
        let client = DeviceClient::new(mock);

        assert!(client.halt_execution().unwrap());
        let posts = client.transport.posted_forms();
        let form = &posts[0];
        assert!(form.has_trigger(Trigger::Halt));
        assert_eq!(form.fields().len(), 1);
        assert!(form.files().is_empty());
    }

    #[test]
    fn test_transition_to_manual_is_local() {
        let mock = MockTransport::new();
        // No queued pages: any wire call would fail.
        let client = DeviceClient::new(mock);
        assert!(client.transition_to_manual());
    }
}
