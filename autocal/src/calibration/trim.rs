//! Trim adjustment policy
//!
//! **Algorithm:** per tower, independently:
//! - |error| < 0.02: tower converged, trim unchanged
//! - otherwise, before the budget midpoint: trim += error (full correction)
//! - otherwise, from the midpoint on: trim += error / 2 (damped correction)
//!
//! Afterwards the trims are normalized: the trim with the smallest magnitude
//! is shifted to zero and the same shift is applied to the other two, so the
//! result stays a set of relative offsets instead of drifting.
//!
//! Ties in magnitude (e.g. +0.1 and -0.1) resolve to the first tower in
//! X, Y, Z order.

use crate::calibration::types::{Tower, TowerError, TrimState};
use autocal_common::round_to;
use tracing::debug;

/// Errors smaller than this (in mm) count as converged
pub const CONVERGENCE_TOLERANCE: f64 = 0.02;

/// Correction strength for an iteration
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum CorrectionPhase {
    /// First half of the budget: apply the whole error
    Full,
    /// Second half of the budget: apply half the error to damp oscillation
    Damped,
}

impl CorrectionPhase {
    /// Phase for a 1-based iteration number under a given budget
    ///
    /// Iterations strictly below `max_runs / 2` (real division) use full
    /// correction, so with `max_runs = 14` iteration 6 is full and 7 is damped.
    pub fn for_iteration(iteration: u32, max_runs: u32) -> Self {
        if f64::from(iteration) < f64::from(max_runs) / 2.0 {
            CorrectionPhase::Full
        } else {
            CorrectionPhase::Damped
        }
    }

    /// New trim for one tower that is outside tolerance
    fn apply(self, trim: f64, error: f64) -> f64 {
        match self {
            CorrectionPhase::Full => round_to(trim + error, 4),
            CorrectionPhase::Damped => trim + round_to(error / 2.0, 4),
        }
    }
}

/// Result of one adjustment step
#[derive(Debug, Clone, Copy, PartialEq)]
pub struct Adjustment {
    /// Normalized trims for the next iteration (or the final result)
    pub trims: TrimState,

    /// True when every tower was within tolerance
    pub converged: bool,

    pub phase: CorrectionPhase,
}

/// Compute next-iteration trims from the current trims and errors
pub fn adjust_trims(
    errors: &TowerError,
    current: &TrimState,
    max_runs: u32,
    iteration: u32,
) -> Adjustment {
    let phase = CorrectionPhase::for_iteration(iteration, max_runs);
    let mut converged = true;
    let mut next = *current;

    for tower in Tower::ALL {
        let error = errors.get(tower);
        if error.abs() >= CONVERGENCE_TOLERANCE {
            converged = false;
            next.set(tower, phase.apply(current.get(tower), error));
        }
    }

    let trims = normalize(&next);
    debug!(
        "Adjusted trims ({:?} phase, iteration {}/{}): {:?} -> {:?}",
        phase, iteration, max_runs, current, trims
    );

    Adjustment {
        trims,
        converged,
        phase,
    }
}

/// Shift all trims so the smallest-magnitude one becomes zero
pub fn normalize(trims: &TrimState) -> TrimState {
    let mut anchor = trims.x;
    for tower in [Tower::Y, Tower::Z] {
        let value = trims.get(tower);
        if value.abs() < anchor.abs() {
            anchor = value;
        }
    }
    // 0.0 - anchor keeps negative zero out of the result
    trims.shifted(0.0 - anchor)
}
