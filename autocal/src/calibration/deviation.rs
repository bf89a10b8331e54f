//! Tower error computation
//!
//! The highest pillar is the reference: its error is 0 and the others are
//! negative by how far they sit below it.

use crate::calibration::types::{TowerError, TowerMeasurement};
use autocal_common::round_to;
use tracing::info;

/// Compute per-tower errors against the highest pillar, rounded to 4 decimals
pub fn compute_errors(measurement: &TowerMeasurement) -> TowerError {
    let reference = measurement.max();
    let errors = TowerError::new(
        round_to(measurement.x - reference, 4),
        round_to(measurement.y - reference, 4),
        round_to(measurement.z - reference, 4),
    );
    info!(
        "X-Error: {} Y-Error: {} Z-Error: {}",
        errors.x, errors.y, errors.z
    );
    errors
}
