//! # Delta Tower Calibration
//!
//! Levels a delta printer's bed by iteratively adjusting the per-tower trim
//! offsets (M666) until all three towers probe within tolerance.
//!
//! **Stages, per iteration:**
//! - `probe`: home, run `G29 P1 V4`, average two probe heights per tower
//! - `deviation`: error of each tower against the highest one
//! - `trim`: two-phase correction (full, then damped past the budget
//!   midpoint) plus normalization
//! - `commit`: push new trims to the firmware
//!
//! `session` drives the stages and owns the termination rules.

pub mod commit;
pub mod deviation;
pub mod probe;
pub mod report;
pub mod session;
pub mod trim;
pub mod types;

pub use commit::{commit_geometry, commit_trims};
pub use deviation::compute_errors;
pub use probe::{read_measurement, PillarReading};
pub use report::CliFormatter;
pub use session::{CalibrationOutcome, CalibrationSession, RunState};
pub use trim::{adjust_trims, normalize, Adjustment, CorrectionPhase, CONVERGENCE_TOLERANCE};
pub use types::{Tower, TowerError, TowerMeasurement, TrimState};
