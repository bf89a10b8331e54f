//! # Autocal: Delta Printer Bed Calibration
//!
//! Drives a delta printer's firmware probe over a serial link and adjusts
//! the per-tower trim offsets until the bed probes level.
//!
//! **Purpose:** Replace manual M666 tuning with a bounded, repeatable loop:
//! probe, compute tower errors, correct trims, repeat.
//!
//! **Architecture:** Strictly sequential. One blocking line transport, owned
//! by a `CalibrationSession` for the whole run.

pub mod calibration;
pub mod config;
pub mod error;
pub mod transport;

pub use config::{Geometry, RunConfig};
pub use error::{Error, Result};
