//! Error types for autocal
//!
//! Defines the calibration error taxonomy using thiserror. Every variant
//! except `Settings` is fatal for a run.

use thiserror::Error;

/// Main error type for autocal
#[derive(Error, Debug)]
pub enum Error {
    /// Serial port could not be opened
    #[error("Could not connect to {port} at baudrate {baud}: {source}")]
    Connection {
        port: String,
        baud: u32,
        #[source]
        source: serialport::Error,
    },

    /// Transport read/write failure, including timeouts
    #[error("Transport error: {0}")]
    Transport(#[from] std::io::Error),

    /// Firmware sent a line that does not match the expected probe format
    #[error("Protocol error: {0}")]
    Protocol(String),

    /// Iteration count went past the configured budget
    #[error("Too many calibration attempts (limit {max_runs})")]
    BudgetExceeded { max_runs: u32 },

    /// Error magnitude over the limit on a non-first iteration
    #[error(
        "Calibration error on run {iteration} exceeds set limit ({max_abs_error} > {limit})"
    )]
    ErrorExceeded {
        iteration: u32,
        max_abs_error: f64,
        limit: f64,
    },

    /// Invalid run configuration
    #[error("Invalid configuration: {0}")]
    Config(String),

    /// Settings file load/save failure
    #[error("Settings error: {0}")]
    Settings(#[from] autocal_common::Error),
}

/// Convenience Result type using autocal Error
pub type Result<T> = std::result::Result<T, Error>;
