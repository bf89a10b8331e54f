//! Operator-facing summaries for the end of a run

use crate::calibration::commit::trim_command;
use crate::calibration::session::CalibrationOutcome;
use crate::config::RunConfig;
use crate::error::Error;

/// CLI formatter for calibration results
pub struct CliFormatter;

impl CliFormatter {
    /// Header printed before the loop starts
    pub fn format_run_header(config: &RunConfig) -> String {
        format!(
            "Calibrating: up to {} runs, max error {} after the first run, L{} R{} step {}",
            config.max_runs,
            config.max_error,
            config.geometry.diagonal_rod,
            config.geometry.delta_radius,
            config.geometry.steps_per_mm
        )
    }

    /// Converged trims, in the form they can be pasted into a printer config
    ///
    /// Example:
    /// ```text
    /// ✓ Calibration complete after 3 runs
    /// Final values
    /// M666 X-0.1000 Y0.0000 Z-0.0350
    /// ```
    pub fn format_outcome(outcome: &CalibrationOutcome) -> String {
        format!(
            "✓ Calibration complete after {} {}\nFinal values\n{}",
            outcome.iterations,
            if outcome.iterations == 1 { "run" } else { "runs" },
            trim_command(&outcome.trims)
        )
    }

    /// Reason a run stopped without converging
    pub fn format_failure(error: &Error) -> String {
        let reason = match error {
            Error::BudgetExceeded { .. } => "Too many calibration attempts",
            Error::ErrorExceeded { .. } => "Calibration error on non-first run exceeds set limit",
            Error::Connection { .. } => "Could not connect to printer",
            Error::Transport(_) => "Lost contact with printer firmware",
            Error::Protocol(_) => "Unexpected probe report from firmware",
            Error::Config(_) => "Invalid calibration settings",
            Error::Settings(_) => "Settings file error",
        };
        format!("✗ {}\n  {}", reason, error)
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::calibration::types::TrimState;

    #[test]
    fn test_format_outcome() {
        let outcome = CalibrationOutcome {
            trims: TrimState::new(-0.1, 0.0, -0.035),
            iterations: 3,
        };
        let text = CliFormatter::format_outcome(&outcome);
        assert!(text.contains("after 3 runs"));
        assert!(text.ends_with("M666 X-0.1000 Y0.0000 Z-0.0350"));
    }

    #[test]
    fn test_format_outcome_single_run() {
        let outcome = CalibrationOutcome {
            trims: TrimState::default(),
            iterations: 1,
        };
        assert!(CliFormatter::format_outcome(&outcome).contains("after 1 run\n"));
    }

    #[test]
    fn test_format_failure_names_reason() {
        let budget = CliFormatter::format_failure(&Error::BudgetExceeded { max_runs: 14 });
        assert!(budget.contains("Too many calibration attempts"));

        let exceeded = CliFormatter::format_failure(&Error::ErrorExceeded {
            iteration: 2,
            max_abs_error: 1.5,
            limit: 1.0,
        });
        assert!(exceeded.contains("exceeds set limit"));
        assert!(exceeded.contains("1.5 > 1"));
    }

    #[test]
    fn test_format_run_header() {
        let header = CliFormatter::format_run_header(&RunConfig::default());
        assert!(header.contains("up to 14 runs"));
        assert!(header.contains("L121.36 R62.7"));
    }
}
