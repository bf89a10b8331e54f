//! Calibration loop
//!
//! **State machine:**
//! ```text
//! Running ──(all towers within tolerance)──────────────► Converged
//!    │  ├──(iteration > max_runs)───────────────────────► AbortedBudget
//!    │  ├──(iteration > 1 and max |error| > max_error)──► AbortedError
//!    │  └──(transport timeout / malformed probe line)───► Failed
//!    └──(otherwise: commit new trims, next iteration)──► Running
//! ```
//!
//! Each iteration, in order:
//! 1. Increment the iteration count; past the budget the run aborts before
//!    any probing
//! 2. Probe the bed
//! 3. Compute tower errors
//! 4. From the second iteration on, abort if any |error| exceeds the limit
//! 5. Adjust trims; converged runs stop here, otherwise the new trims are
//!    committed to the printer and the loop continues
//!
//! The session owns the transport for the whole run. Dropping the session
//! (or taking the transport back with `into_transport`) releases it.
//!
//! Only a converged session writes the settings file (`persist`); an aborted
//! or failed run leaves it untouched.

use std::path::Path;

use crate::calibration::commit::{commit_geometry, commit_trims, trim_command};
use crate::calibration::deviation::compute_errors;
use crate::calibration::probe::read_measurement;
use crate::calibration::trim::adjust_trims;
use crate::calibration::types::TrimState;
use crate::config::RunConfig;
use crate::error::{Error, Result};
use crate::transport::Transport;
use tracing::{info, warn};

/// Where a calibration run currently stands
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum RunState {
    Running,
    /// All towers within tolerance (terminal, success)
    Converged,
    /// Iteration budget exhausted (terminal)
    AbortedBudget,
    /// Error magnitude over the limit after the first iteration (terminal)
    AbortedError,
    /// Transport or protocol failure (terminal)
    Failed,
}

impl RunState {
    pub fn is_terminal(&self) -> bool {
        !matches!(self, RunState::Running)
    }
}

/// Successful calibration result
#[derive(Debug, Clone, Copy, PartialEq)]
pub struct CalibrationOutcome {
    /// Converged trims, already normalized
    pub trims: TrimState,

    /// Number of probe iterations it took
    pub iterations: u32,
}

/// One calibration run against one printer
pub struct CalibrationSession<T: Transport> {
    transport: T,
    config: RunConfig,
    trims: TrimState,
    iteration: u32,
    state: RunState,
}

impl<T: Transport> CalibrationSession<T> {
    /// Create a session starting from the configured trims at iteration 0
    pub fn new(transport: T, config: RunConfig) -> Self {
        Self {
            transport,
            trims: config.starting_trims,
            config,
            iteration: 0,
            state: RunState::Running,
        }
    }

    pub fn state(&self) -> RunState {
        self.state
    }

    pub fn iteration(&self) -> u32 {
        self.iteration
    }

    /// Current trims (the last ones committed to the printer)
    pub fn trims(&self) -> TrimState {
        self.trims
    }

    /// Release the transport
    pub fn into_transport(self) -> T {
        self.transport
    }

    /// Send geometry and starting trims, then calibrate
    pub fn run(&mut self) -> Result<CalibrationOutcome> {
        self.ensure_running()?;
        if let Err(e) = self.prepare() {
            self.state = RunState::Failed;
            return Err(e);
        }
        self.calibrate()
    }

    /// Bring the printer to the run's starting state (M665, then M666)
    pub fn prepare(&mut self) -> Result<()> {
        let geometry = self.config.geometry;
        commit_geometry(
            &mut self.transport,
            geometry.diagonal_rod,
            geometry.delta_radius,
        )?;
        commit_trims(&mut self.transport, &self.trims)
    }

    /// Iterate until converged or a fatal condition ends the run
    pub fn calibrate(&mut self) -> Result<CalibrationOutcome> {
        self.ensure_running()?;

        info!("Starting calibration");
        loop {
            match self.iterate() {
                Ok(Some(outcome)) => {
                    self.state = RunState::Converged;
                    info!("Calibration complete after {} runs", outcome.iterations);
                    return Ok(outcome);
                }
                Ok(None) => {}
                Err(e) => {
                    self.state = match e {
                        Error::BudgetExceeded { .. } => RunState::AbortedBudget,
                        Error::ErrorExceeded { .. } => RunState::AbortedError,
                        _ => RunState::Failed,
                    };
                    warn!("Calibration aborted on run {}: {}", self.iteration, e);
                    return Err(e);
                }
            }
        }
    }

    /// Write the converged trims and run configuration to a settings file
    ///
    /// Returns `Ok(false)` without touching the file unless the run converged.
    ///
    /// # Errors
    /// `Error::Settings` if the file cannot be written
    pub fn persist(&self, path: &Path) -> Result<bool> {
        if self.state != RunState::Converged {
            info!(
                "Run ended {:?}, settings file {} left unchanged",
                self.state,
                path.display()
            );
            return Ok(false);
        }

        self.config.to_settings(&self.trims).save(path)?;
        info!("Settings written to {}", path.display());
        Ok(true)
    }

    fn ensure_running(&self) -> Result<()> {
        if self.state.is_terminal() {
            return Err(Error::Config(format!(
                "Calibration session already finished ({:?})",
                self.state
            )));
        }
        Ok(())
    }

    /// One pass of the loop; `Some` once every tower is within tolerance
    fn iterate(&mut self) -> Result<Option<CalibrationOutcome>> {
        let max_runs = self.config.max_runs;

        self.iteration += 1;
        if self.iteration > max_runs {
            return Err(Error::BudgetExceeded { max_runs });
        }
        info!("Calibration run {} out of {}", self.iteration, max_runs);

        let measurement = read_measurement(&mut self.transport)?;
        let errors = compute_errors(&measurement);

        let max_abs_error = errors.max_abs();
        if self.iteration > 1 && max_abs_error > self.config.max_error {
            return Err(Error::ErrorExceeded {
                iteration: self.iteration,
                max_abs_error,
                limit: self.config.max_error,
            });
        }

        let adjustment = adjust_trims(&errors, &self.trims, max_runs, self.iteration);
        if adjustment.converged {
            self.trims = adjustment.trims;
            info!("Final values {}", trim_command(&self.trims));
            return Ok(Some(CalibrationOutcome {
                trims: self.trims,
                iterations: self.iteration,
            }));
        }

        info!("Applying {:?} correction", adjustment.phase);
        commit_trims(&mut self.transport, &adjustment.trims)?;
        self.trims = adjustment.trims;
        Ok(None)
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::calibration::probe::{HOME_COMMAND, PROBE_COMMAND, PROBE_START_MARKER};
    use crate::transport::ScriptedTransport;

    /// Queue one probe report with the given pillar averages
    fn push_probe(transport: &mut ScriptedTransport, x: f64, y: f64, z: f64) {
        transport.push_line("echo:busy: processing");
        transport.push_line(PROBE_START_MARKER);
        for height in [z, z, x, x, y, y] {
            transport.push_line(format!("Bed X: 0.000 Y: 0.000 Z: {:.3}", height));
        }
    }

    fn config(max_runs: u32, max_error: f64) -> RunConfig {
        RunConfig {
            max_runs,
            max_error,
            ..RunConfig::default()
        }
    }

    fn probe_count(transport: &ScriptedTransport) -> usize {
        transport
            .written()
            .iter()
            .filter(|c| c.as_str() == PROBE_COMMAND)
            .count()
    }

    #[test]
    fn test_level_bed_converges_immediately() {
        let mut transport = ScriptedTransport::new();
        push_probe(&mut transport, 1.0, 1.0, 1.0);

        let mut session = CalibrationSession::new(transport, config(14, 1.0));
        let outcome = session.calibrate().unwrap();

        assert_eq!(outcome.trims, TrimState::new(0.0, 0.0, 0.0));
        assert_eq!(outcome.iterations, 1);
        assert_eq!(session.state(), RunState::Converged);

        // No M666 after convergence
        let transport = session.into_transport();
        assert_eq!(transport.written(), [HOME_COMMAND, PROBE_COMMAND]);
    }

    #[test]
    fn test_low_tower_is_corrected_then_converges() {
        let mut transport = ScriptedTransport::new();
        push_probe(&mut transport, 0.9, 1.0, 1.0);
        transport.push_line("ok");
        push_probe(&mut transport, 1.0, 1.0, 1.0);

        let mut session = CalibrationSession::new(transport, config(14, 1.0));
        let outcome = session.calibrate().unwrap();

        assert_eq!(outcome.trims, TrimState::new(-0.1, 0.0, 0.0));
        assert_eq!(outcome.iterations, 2);

        let transport = session.into_transport();
        assert_eq!(
            transport.written(),
            [
                HOME_COMMAND,
                PROBE_COMMAND,
                "M666 X-0.1000 Y0.0000 Z0.0000",
                HOME_COMMAND,
                PROBE_COMMAND
            ]
        );
        assert_eq!(transport.remaining(), 0);
    }

    #[test]
    fn test_large_error_tolerated_on_first_run() {
        let mut transport = ScriptedTransport::new();
        push_probe(&mut transport, -0.5, 1.0, 1.0);
        transport.push_line("ok");
        push_probe(&mut transport, 1.0, 1.0, 1.0);

        let mut session = CalibrationSession::new(transport, config(14, 1.0));
        let outcome = session.calibrate().unwrap();

        assert_eq!(outcome.trims, TrimState::new(-1.5, 0.0, 0.0));
    }

    #[test]
    fn test_large_error_on_second_run_aborts() {
        let mut transport = ScriptedTransport::new();
        push_probe(&mut transport, 0.9, 1.0, 1.0);
        transport.push_line("ok");
        push_probe(&mut transport, 1.0, -0.5, 1.0);

        let mut session = CalibrationSession::new(transport, config(14, 1.0));
        let result = session.calibrate();

        match result {
            Err(Error::ErrorExceeded {
                iteration,
                max_abs_error,
                limit,
            }) => {
                assert_eq!(iteration, 2);
                assert_eq!(max_abs_error, 1.5);
                assert_eq!(limit, 1.0);
            }
            other => panic!("Expected ErrorExceeded, got {:?}", other),
        }
        assert_eq!(session.state(), RunState::AbortedError);
        // Trims stay at the last committed value
        assert_eq!(session.trims(), TrimState::new(-0.1, 0.0, 0.0));
    }

    #[test]
    fn test_budget_exhausted_before_probing() {
        let mut transport = ScriptedTransport::new();
        for _ in 0..2 {
            push_probe(&mut transport, 0.5, 1.0, 1.0);
            transport.push_line("ok");
        }

        let mut session = CalibrationSession::new(transport, config(2, 10.0));
        let result = session.calibrate();

        assert!(matches!(result, Err(Error::BudgetExceeded { max_runs: 2 })));
        assert_eq!(session.state(), RunState::AbortedBudget);
        assert_eq!(session.iteration(), 3);

        let transport = session.into_transport();
        assert_eq!(probe_count(&transport), 2);
    }

    #[test]
    fn test_transport_failure_mid_probe() {
        let mut transport = ScriptedTransport::new();
        transport.push_line(PROBE_START_MARKER);
        transport.push_line("Bed X: 0.000 Y: 0.000 Z: 1.000");

        let mut session = CalibrationSession::new(transport, config(14, 1.0));
        let result = session.calibrate();

        assert!(matches!(result, Err(Error::Transport(_))));
        assert_eq!(session.state(), RunState::Failed);
    }

    #[test]
    fn test_finished_session_refuses_to_continue() {
        let mut transport = ScriptedTransport::new();
        push_probe(&mut transport, 1.0, 1.0, 1.0);

        let mut session = CalibrationSession::new(transport, config(14, 1.0));
        session.calibrate().unwrap();

        assert!(matches!(session.calibrate(), Err(Error::Config(_))));
    }

    #[test]
    fn test_run_prepares_printer_first() {
        let mut transport = ScriptedTransport::new();
        transport.push_lines(["ok", "ok"]);
        push_probe(&mut transport, 1.0, 1.0, 1.0);

        let mut run_config = config(14, 1.0);
        run_config.starting_trims = TrimState::new(-0.2, 0.0, 0.1);
        let mut session = CalibrationSession::new(transport, run_config);
        let outcome = session.run().unwrap();

        assert_eq!(outcome.trims, TrimState::new(-0.2, 0.0, 0.1));
        let transport = session.into_transport();
        assert_eq!(
            &transport.written()[..2],
            ["M665 L121.36 R62.7", "M666 X-0.2000 Y0.0000 Z0.1000"]
        );
    }

    #[test]
    fn test_finished_session_run_sends_nothing() {
        let mut transport = ScriptedTransport::new();
        transport.push_lines(["ok", "ok"]);
        push_probe(&mut transport, 1.0, 1.0, 1.0);

        let mut session = CalibrationSession::new(transport, config(14, 1.0));
        session.run().unwrap();

        let result = session.run();

        assert!(matches!(result, Err(Error::Config(_))));
        assert_eq!(session.state(), RunState::Converged);
        let transport = session.into_transport();
        // M665, M666, G28, G29 from the first run only
        assert_eq!(transport.written().len(), 4);
    }

    #[test]
    fn test_persist_refuses_unfinished_run() {
        let temp_dir = tempfile::TempDir::new().unwrap();
        let path = temp_dir.path().join("printer.json");

        let session = CalibrationSession::new(ScriptedTransport::new(), config(14, 1.0));

        assert!(!session.persist(&path).unwrap());
        assert!(!path.exists());
    }

    #[test]
    fn test_persist_write_failure_is_settings_error() {
        let temp_dir = tempfile::TempDir::new().unwrap();
        let path = temp_dir.path().join("missing-dir").join("printer.json");

        let mut transport = ScriptedTransport::new();
        push_probe(&mut transport, 1.0, 1.0, 1.0);
        let mut session = CalibrationSession::new(transport, config(14, 1.0));
        session.calibrate().unwrap();

        let result = session.persist(&path);
        assert!(matches!(result, Err(Error::Settings(_))));
    }

    #[test]
    fn test_run_fails_when_prepare_gets_no_reply() {
        let transport = ScriptedTransport::new();

        let mut session = CalibrationSession::new(transport, config(14, 1.0));
        let result = session.run();

        assert!(matches!(result, Err(Error::Transport(_))));
        assert_eq!(session.state(), RunState::Failed);
        assert_eq!(session.iteration(), 0);
    }
}
