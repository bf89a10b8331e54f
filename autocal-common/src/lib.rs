//! # Autocal Common Library
//!
//! Shared code for the delta printer calibration tools including:
//! - Error types
//! - Settings file model (load and atomic save)
//! - Decimal rounding helpers used by the calibration math

pub mod error;
pub mod rounding;
pub mod settings;

pub use error::{Error, Result};
pub use rounding::round_to;
pub use settings::Settings;
