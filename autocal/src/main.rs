//! Delta printer auto-calibration (autocal) - Main entry point
//!
//! **Usage:**
//! ```bash
//! autocal --port /dev/ttyACM0 [--file printer.json] [--max-runs 14] [--max-error 1]
//! ```
//!
//! Exits with status 1 when the printer cannot be reached, the iteration
//! budget runs out, or the error limit is exceeded. On success the settings
//! file (if given) is rewritten with the converged trims.

use std::path::PathBuf;
use std::time::Duration;

use anyhow::Result;
use autocal::calibration::{CalibrationSession, CliFormatter};
use autocal::transport::{SerialTransport, TransportConfig};
use autocal::{Geometry, RunConfig};
use autocal_common::Settings;
use clap::Parser;
use tracing::{error, info};

/// Command-line arguments for autocal
#[derive(Parser, Debug)]
#[command(name = "autocal")]
#[command(about = "Auto bed calibration for delta printers (M666 tower trims)")]
#[command(version)]
struct Args {
    /// Serial port
    #[arg(short, long)]
    port: String,

    /// Starting delta radius (M665 R)
    #[arg(short, long, default_value_t = Geometry::DEFAULT_DELTA_RADIUS)]
    r_value: f64,

    /// Starting diagonal rod length (M665 L)
    #[arg(short, long, default_value_t = Geometry::DEFAULT_DIAGONAL_ROD)]
    l_value: f64,

    /// Steps per mm
    #[arg(short, long, default_value_t = Geometry::DEFAULT_STEPS_PER_MM)]
    step_mm: f64,

    /// Maximum acceptable calibration error on non-first run
    #[arg(long, visible_alias = "me", default_value_t = RunConfig::DEFAULT_MAX_ERROR)]
    max_error: f64,

    /// Maximum attempts to calibrate printer
    #[arg(long, visible_alias = "mr", default_value_t = RunConfig::DEFAULT_MAX_RUNS)]
    max_runs: u32,

    /// File with settings, will be updated with latest settings at the end of the run
    #[arg(short, long, value_name = "FILE")]
    file: Option<PathBuf>,

    /// Serial baud rate
    #[arg(long, default_value_t = TransportConfig::DEFAULT_BAUD)]
    baud: u32,

    /// Seconds to wait for each line from the firmware
    #[arg(long, default_value_t = 10)]
    timeout_secs: u64,

    /// Seconds to wait for each command write
    #[arg(long, default_value_t = 10_000)]
    write_timeout_secs: u64,
}

impl Args {
    fn run_config(&self) -> RunConfig {
        RunConfig {
            max_runs: self.max_runs,
            max_error: self.max_error,
            geometry: Geometry {
                diagonal_rod: self.l_value,
                delta_radius: self.r_value,
                steps_per_mm: self.step_mm,
            },
            ..RunConfig::default()
        }
    }

    fn transport_config(&self) -> TransportConfig {
        TransportConfig::new(self.port.clone())
            .with_baud(self.baud)
            .with_timeouts(
                Duration::from_secs(self.timeout_secs),
                Duration::from_secs(self.write_timeout_secs),
            )
    }
}

fn main() {
    // Initialize tracing
    tracing_subscriber::fmt()
        .with_env_filter(
            tracing_subscriber::EnvFilter::try_from_default_env()
                .unwrap_or_else(|_| tracing_subscriber::EnvFilter::new("info")),
        )
        .init();

    info!(
        "Starting autocal v{} [{}] built {} ({})",
        env!("CARGO_PKG_VERSION"),
        env!("GIT_HASH"),
        env!("BUILD_TIMESTAMP"),
        env!("BUILD_PROFILE")
    );

    let args = Args::parse();

    if let Err(e) = run(&args) {
        if let Some(cal_error) = e.downcast_ref::<autocal::Error>() {
            println!("\n{}", CliFormatter::format_failure(cal_error));
        }
        error!("Calibration failed: {:#}", e);
        std::process::exit(1);
    }
}

fn run(args: &Args) -> Result<()> {
    let mut config = args.run_config();
    if let Some(path) = &args.file {
        info!("Reading settings from {}", path.display());
        config = config.resolve(Settings::load(path));
    }
    config.validate()?;

    let transport = SerialTransport::open(&args.transport_config())?;

    println!("{}", CliFormatter::format_run_header(&config));
    let mut session = CalibrationSession::new(transport, config);
    let result = session.run();
    let persisted = match &args.file {
        Some(path) => session.persist(path),
        None => Ok(false),
    };
    // Port is closed here whatever the outcome
    drop(session);
    let outcome = result?;

    println!("\n{}", CliFormatter::format_outcome(&outcome));
    persisted?;

    Ok(())
}
