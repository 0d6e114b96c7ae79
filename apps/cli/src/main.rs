use std::collections::HashMap;
use std::time::Duration;

use anyhow::{Context, Result, bail};
use clap::{Parser, Subcommand};
use rfgen_core::channel::{Capability, ChannelValues, Subchannel};
use rfgen_core::client::DeviceClient;
use rfgen_core::program::ManifestProgram;
use rfgen_core::session::{SessionConfig, SessionController};
use rfgen_core::transport::HttpTransport;
use tracing::{error, info};

#[derive(Parser, Debug)]
#[command(author, version, about = "Networked dual-channel signal generator control", long_about = None)]
struct Args {
    /// Instrument hostname or IP
    #[arg(long)]
    host: Option<String>,

    /// Instrument web interface port
    #[arg(long)]
    port: Option<u16>,

    /// Path to a session configuration TOML
    #[arg(long)]
    config: Option<String>,

    /// Enable verbose logging
    #[arg(short, long)]
    verbose: bool,

    #[command(subcommand)]
    command: Command,
}

#[derive(Subcommand, Debug)]
enum Command {
    /// Read the currently programmed channel values
    Status,
    /// Program one channel's values in manual mode
    Set {
        /// Channel index
        #[arg(long)]
        channel: usize,
        /// Output frequency in Hz
        #[arg(long)]
        freq: Option<f64>,
        /// Output amplitude in percent
        #[arg(long)]
        amp: Option<f64>,
        /// Phase offset in degrees
        #[arg(long)]
        phase: Option<f64>,
        /// Gate the channel off
        #[arg(long, conflicts_with = "on")]
        off: bool,
        /// Gate the channel on
        #[arg(long)]
        on: bool,
    },
    /// Upload a waveform program and start buffered execution
    Run {
        /// Path to a program manifest TOML
        manifest: String,
    },
    /// Halt buffered execution on all sessions
    Halt,
    /// Return the device to manual control
    Manual,
}

fn main() {
    let args = Args::parse();

    let subscriber = tracing_subscriber::fmt()
        .with_env_filter(
            tracing_subscriber::EnvFilter::builder()
                .with_default_directive(if args.verbose {
                    tracing::Level::DEBUG.into()
                } else {
                    tracing::Level::INFO.into()
                })
                .from_env_lossy(),
        )
        .with_writer(std::io::stderr)
        .finish();

    tracing::subscriber::set_global_default(subscriber).expect("setting default subscriber failed");

    if let Err(e) = run(args) {
        error!("Error: {e:#}");
        std::process::exit(1);
    }
}

fn run(args: Args) -> Result<()> {
    let config = resolve_config(&args)?;
    let timeout = Duration::from_secs(config.timeout_secs);

    info!(address = %config.address(), "Connecting to instrument");
    let transport = HttpTransport::with_url(config.address(), timeout)?;
    let client = DeviceClient::connect(transport)
        .with_context(|| format!("no instrument answered at {}", config.address()))?;
    let mut controller = SessionController::new(client);

    for address in &config.secondaries {
        let transport = HttpTransport::with_url(address.clone(), timeout)?;
        let client = DeviceClient::connect(transport)
            .with_context(|| format!("no secondary instrument answered at {address}"))?;
        controller.add_secondary(client);
    }

    match args.command {
        Command::Status => {
            let values = controller.check_remote_values()?;
            print_values(&values);
        }
        Command::Set {
            channel,
            freq,
            amp,
            phase,
            off,
            on,
        } => {
            if channel >= config.num_channels {
                bail!(
                    "channel {channel} out of range (device has {} channels)",
                    config.num_channels
                );
            }
            // Start from what the device reports so untouched channels are
            // reprogrammed with their current values.
            let mut values = controller.check_remote_values()?;
            let entry = values.entry(channel).or_default();
            if let Some(freq) = freq {
                check_range(Subchannel::Frequency, freq)?;
                entry.frequency_hz = freq;
            }
            if let Some(amp) = amp {
                check_range(Subchannel::Amplitude, amp)?;
                entry.amplitude_pct = amp;
            }
            if let Some(phase) = phase {
                check_range(Subchannel::Phase, phase)?;
                entry.phase_deg = phase;
            }
            if off {
                entry.gate = false;
            } else if on {
                entry.gate = true;
            }

            let programmed = controller.program_manual(&values)?;
            print_values(&programmed);
        }
        Command::Run { manifest } => {
            let program = ManifestProgram::load(&manifest)
                .with_context(|| format!("failed to load program manifest {manifest}"))?;
            let final_values = controller.enter_buffered(&program)?;
            println!("Program running; final values on completion:");
            print_values(&final_values);
        }
        Command::Halt => {
            if controller.abort_buffered() {
                println!("Halt accepted");
            } else {
                bail!("one or more sessions did not accept the halt");
            }
        }
        Command::Manual => {
            controller.exit_to_manual(true)?;
            let values = controller.check_remote_values()?;
            println!("Device back under manual control");
            print_values(&values);
        }
    }

    Ok(())
}

fn resolve_config(args: &Args) -> Result<SessionConfig> {
    let mut config = match &args.config {
        Some(path) => SessionConfig::load_from_file(path)
            .with_context(|| format!("failed to load config {path}"))?,
        None => SessionConfig::default(),
    };
    if let Some(host) = &args.host {
        config.host = host.clone();
    }
    if let Some(port) = args.port {
        config.port = port;
    }
    if args.config.is_none() && args.host.is_none() {
        bail!("no instrument given: pass --host or --config");
    }
    Ok(config)
}

fn check_range(subchannel: Subchannel, value: f64) -> Result<()> {
    let cap = Capability::of(subchannel);
    if value < cap.min || value > cap.max {
        bail!(
            "{subchannel} {value} outside [{}, {}] {}",
            cap.min,
            cap.max,
            cap.base_unit
        );
    }
    Ok(())
}

fn print_values(values: &HashMap<usize, ChannelValues>) {
    let mut channels: Vec<_> = values.keys().copied().collect();
    channels.sort_unstable();
    for channel in channels {
        let v = &values[&channel];
        println!(
            "ch{channel}: {:.1} Hz  {:.3} %  {:.3} deg  gate {}",
            v.frequency_hz,
            v.amplitude_pct,
            v.phase_deg,
            if v.gate { "on" } else { "off" },
        );
    }
}
