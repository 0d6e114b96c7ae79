//! Waveform program access.
//!
//! The compiled program container is opaque to the driver: each channel
//! contributes a binary payload that is uploaded verbatim, plus the final
//! row of a human-readable table used to resynchronize the front panel
//! once buffered execution ends.

use std::fs;
use std::path::{Path, PathBuf};

use serde::Deserialize;
use thiserror::Error;

use crate::channel::ChannelValues;

#[derive(Error, Debug)]
pub enum ProgramError {
    #[error("program has no entry for channel {0}")]
    MissingChannel(usize),

    #[error("program table for channel {channel} has no rows")]
    EmptyTable { channel: usize },

    #[error("bad table row for channel {channel}: {line:?}")]
    BadRow { channel: usize, line: String },

    #[error("IO error: {0}")]
    Io(#[from] std::io::Error),

    #[error("Manifest parse error: {0}")]
    Manifest(#[from] toml::de::Error),
}

/// Everything buffered mode needs from one channel of a program.
#[derive(Debug, Clone)]
pub struct ChannelProgram {
    /// Opaque compiled payload, uploaded verbatim.
    pub payload: Vec<u8>,
    /// Last row of the channel's table, in base units. Applied to the front
    /// panel after the run; never programmed back to the device.
    pub final_values: ChannelValues,
}

/// Read interface over a precomputed waveform program.
pub trait ProgramSource {
    /// Number of channels the program covers.
    fn num_channels(&self) -> usize;

    /// Payload and final values for one channel.
    fn channel_program(&self, channel: usize) -> Result<ChannelProgram, ProgramError>;
}

#[derive(Debug, Deserialize)]
struct Manifest {
    channel: Vec<ManifestChannel>,
}

#[derive(Debug, Deserialize)]
struct ManifestChannel {
    /// Compiled binary payload, relative to the manifest.
    payload: PathBuf,
    /// Human-readable table; each row is `frequency_hz amplitude phase_deg`
    /// with amplitude stored as a fraction of full scale.
    table: PathBuf,
}

/// Program source backed by a TOML manifest next to its data files.
///
/// ```toml
/// [[channel]]
/// payload = "ch0.bin"
/// table = "ch0.table"
///
/// [[channel]]
/// payload = "ch1.bin"
/// table = "ch1.table"
/// ```
pub struct ManifestProgram {
    base_dir: PathBuf,
    manifest: Manifest,
}

impl ManifestProgram {
    /// Load a manifest; data files are resolved relative to it.
    pub fn load<P: AsRef<Path>>(path: P) -> Result<Self, ProgramError> {
        let path = path.as_ref();
        let content = fs::read_to_string(path)?;
        let manifest: Manifest = toml::from_str(&content)?;
        let base_dir = path.parent().unwrap_or(Path::new(".")).to_path_buf();
        Ok(Self { base_dir, manifest })
    }
}

impl ProgramSource for ManifestProgram {
    fn num_channels(&self) -> usize {
        self.manifest.channel.len()
    }

    fn channel_program(&self, channel: usize) -> Result<ChannelProgram, ProgramError> {
        let entry = self
            .manifest
            .channel
            .get(channel)
            .ok_or(ProgramError::MissingChannel(channel))?;
        let payload = fs::read(self.base_dir.join(&entry.payload))?;
        let table = fs::read_to_string(self.base_dir.join(&entry.table))?;
        let final_values = parse_final_row(&table, channel)?;
        Ok(ChannelProgram {
            payload,
            final_values,
        })
    }
}

/// Parse the last data row of a channel table into front-panel values.
///
/// Amplitude is stored as a fraction of full scale and rescaled to percent;
/// the gate is on for as long as a program row is executing.
fn parse_final_row(table: &str, channel: usize) -> Result<ChannelValues, ProgramError> {
    let line = table
        .lines()
        .map(str::trim)
        .filter(|l| !l.is_empty() && !l.starts_with('#'))
        .next_back()
        .ok_or(ProgramError::EmptyTable { channel })?;

    let bad_row = || ProgramError::BadRow {
        channel,
        line: line.to_string(),
    };

    let columns: Vec<f64> = line
        .split(|c: char| c == ',' || c.is_whitespace())
        .filter(|s| !s.is_empty())
        .map(str::parse)
        .collect::<Result<_, _>>()
        .map_err(|_| bad_row())?;
    let [frequency_hz, amplitude_fraction, phase_deg] = columns[..] else {
        return Err(bad_row());
    };

    Ok(ChannelValues {
        frequency_hz,
        amplitude_pct: amplitude_fraction * 100.0,
        phase_deg,
        gate: true,
    })
}
