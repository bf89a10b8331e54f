//! Calibration run configuration
//!
//! A run is configured from two sources: command-line values (which carry
//! the compiled defaults) and an optional settings file. Keys present in the
//! settings file win; absent keys keep the command-line value. A settings
//! file that cannot be read or parsed is logged and ignored.

use crate::calibration::types::TrimState;
use crate::error::{Error, Result};
use autocal_common::Settings;
use tracing::{info, warn};

/// Printer geometry sent once before calibration and persisted afterwards
#[derive(Debug, Clone, Copy, PartialEq)]
pub struct Geometry {
    /// Diagonal rod length in mm (M665 L)
    pub diagonal_rod: f64,

    /// Delta radius in mm (M665 R)
    pub delta_radius: f64,

    /// Steps per mm, recorded but not sent
    pub steps_per_mm: f64,
}

impl Geometry {
    pub const DEFAULT_DIAGONAL_ROD: f64 = 121.36;
    pub const DEFAULT_DELTA_RADIUS: f64 = 62.70;
    pub const DEFAULT_STEPS_PER_MM: f64 = 57.14;
}

impl Default for Geometry {
    fn default() -> Self {
        Self {
            diagonal_rod: Self::DEFAULT_DIAGONAL_ROD,
            delta_radius: Self::DEFAULT_DELTA_RADIUS,
            steps_per_mm: Self::DEFAULT_STEPS_PER_MM,
        }
    }
}

/// Immutable parameters of one calibration run
#[derive(Debug, Clone, Copy, PartialEq)]
pub struct RunConfig {
    /// Iteration budget
    pub max_runs: u32,

    /// Largest acceptable |error| from the second iteration on
    pub max_error: f64,

    /// Trims committed before the first probe
    pub starting_trims: TrimState,

    pub geometry: Geometry,
}

impl RunConfig {
    pub const DEFAULT_MAX_RUNS: u32 = 14;
    pub const DEFAULT_MAX_ERROR: f64 = 1.0;

    /// Overlay values from a settings file onto this configuration
    pub fn with_settings(self, settings: &Settings) -> Self {
        Self {
            max_runs: settings.max_runs.unwrap_or(self.max_runs),
            max_error: settings.max_error.unwrap_or(self.max_error),
            starting_trims: TrimState::new(
                settings.x.unwrap_or(self.starting_trims.x),
                settings.y.unwrap_or(self.starting_trims.y),
                settings.z.unwrap_or(self.starting_trims.z),
            ),
            geometry: Geometry {
                diagonal_rod: settings.l.unwrap_or(self.geometry.diagonal_rod),
                delta_radius: settings.r.unwrap_or(self.geometry.delta_radius),
                steps_per_mm: settings.step.unwrap_or(self.geometry.steps_per_mm),
            },
        }
    }

    /// Overlay the outcome of loading a settings file
    ///
    /// A failed load is not fatal: the run continues with this configuration
    /// unchanged.
    pub fn resolve(self, loaded: autocal_common::Result<Settings>) -> Self {
        match loaded {
            Ok(settings) => {
                info!("Applying settings file");
                self.with_settings(&settings)
            }
            Err(e) => {
                warn!("Could not load settings ({}), using command-line values", e);
                self
            }
        }
    }

    /// Check the configuration can drive a run
    pub fn validate(&self) -> Result<()> {
        if self.max_runs == 0 {
            return Err(Error::Config("max_runs must be at least 1".to_string()));
        }
        if !self.max_error.is_finite() || self.max_error <= 0.0 {
            return Err(Error::Config(format!(
                "max_error must be a positive number, got {}",
                self.max_error
            )));
        }
        let values = [
            ("x", self.starting_trims.x),
            ("y", self.starting_trims.y),
            ("z", self.starting_trims.z),
            ("l", self.geometry.diagonal_rod),
            ("r", self.geometry.delta_radius),
            ("step", self.geometry.steps_per_mm),
        ];
        for (name, value) in values {
            if !value.is_finite() {
                return Err(Error::Config(format!("{} must be finite, got {}", name, value)));
            }
        }
        Ok(())
    }

    /// Settings record for a finished run with the given final trims
    pub fn to_settings(&self, trims: &TrimState) -> Settings {
        Settings {
            x: Some(trims.x),
            y: Some(trims.y),
            z: Some(trims.z),
            r: Some(self.geometry.delta_radius),
            l: Some(self.geometry.diagonal_rod),
            step: Some(self.geometry.steps_per_mm),
            max_runs: Some(self.max_runs),
            max_error: Some(self.max_error),
        }
    }
}

impl Default for RunConfig {
    fn default() -> Self {
        Self {
            max_runs: Self::DEFAULT_MAX_RUNS,
            max_error: Self::DEFAULT_MAX_ERROR,
            starting_trims: TrimState::default(),
            geometry: Geometry::default(),
        }
    }
}
