//! Wire conventions of the generator's embedded web interface.
//!
//! The instrument is programmed by submitting the same multipart form its
//! front page carries; these constants pin down the field naming scheme and
//! the trigger buttons.

// ============================================================================
// Device identification
// ============================================================================

/// Number of DDS output channels on this instrument.
pub const NUM_CHANNELS: usize = 2;

/// TCP port of the device's web interface.
pub const DEVICE_PORT: u16 = 8080;

/// How long we wait before assuming the instrument is dead (seconds).
pub const DEFAULT_TIMEOUT_SECS: u64 = 30;

// ============================================================================
// Units
// ============================================================================

/// The device expects and reports frequency in MHz; callers use Hz.
pub const HZ_PER_MHZ: f64 = 1e6;

// ============================================================================
// Form field naming
// ============================================================================

/// Frequency input field for a channel (`f_ch<i>_in`).
pub fn freq_field(channel: usize) -> String {
    format!("f_ch{channel}_in")
}

/// Amplitude input field for a channel (`a_ch<i>_in`).
pub fn amp_field(channel: usize) -> String {
    format!("a_ch{channel}_in")
}

/// Phase input field for a channel (`p_ch<i>_in`).
pub fn phase_field(channel: usize) -> String {
    format!("p_ch{channel}_in")
}

/// File part carrying a channel's compiled waveform program.
pub fn pulse_field(channel: usize) -> String {
    format!("pulse_ch{channel}")
}

/// Filename reported for a channel's uploaded program.
pub fn pulse_filename(channel: usize) -> String {
    format!("output_ch{channel}.bin")
}

// ============================================================================
// Trigger buttons (field name, submitted value)
// ============================================================================

/// Apply the submitted channel settings.
pub const SET_OUTPUTS_FIELD: &str = "set_dds";
pub const SET_OUTPUTS_VALUE: &str = "Set device";

/// Store the uploaded program and start executing it.
pub const UPLOAD_AND_RUN_FIELD: &str = "upload_and_run";
pub const UPLOAD_AND_RUN_VALUE: &str = "Upload and start";

/// Stop a running program.
pub const HALT_FIELD: &str = "halt";
pub const HALT_VALUE: &str = "Halt execution";
