//! Probe reader
//!
//! Homes the effector, runs the firmware's bed-leveling probe and reduces its
//! report to one averaged height per tower.
//!
//! **Firmware report layout** (after `G29 P1 V4`):
//! ```text
//! ...noise / echo...
//! G29 Auto Bed Leveling
//! <Z pillar, first probe>
//! <Z pillar, second probe>
//! <X pillar, first probe>
//! <X pillar, second probe>
//! <Y pillar, first probe>
//! <Y pillar, second probe>
//! ```
//! Each probe line is whitespace-delimited with the height as the 7th token,
//! e.g. `Bed X: 0.000 Y: 50.000 Z: 1.025`. Anything else is a protocol error;
//! no attempt is made to resynchronize with a drifting format.

use crate::calibration::types::{Tower, TowerMeasurement};
use crate::error::{Error, Result};
use crate::transport::Transport;
use autocal_common::round_to;
use tracing::{debug, info};

pub const HOME_COMMAND: &str = "G28 X0 Y0";
pub const PROBE_COMMAND: &str = "G29 P1 V4";
pub const PROBE_START_MARKER: &str = "G29 Auto Bed Leveling";

/// Zero-based index of the height token in a probe line
const HEIGHT_TOKEN_INDEX: usize = 6;

/// Order in which the firmware reports pillars
const REPORT_ORDER: [Tower; 3] = [Tower::Z, Tower::X, Tower::Y];

/// Two raw probe heights near one tower and their average
#[derive(Debug, Clone, Copy, PartialEq)]
pub struct PillarReading {
    pub tower: Tower,
    pub first: f64,
    pub second: f64,
    /// Mean of `first` and `second`, rounded to 3 decimals
    pub average: f64,
}

impl PillarReading {
    pub fn new(tower: Tower, first: f64, second: f64) -> Self {
        Self {
            tower,
            first,
            second,
            average: round_to((first + second) / 2.0, 3),
        }
    }
}

/// Run one probe cycle and return the averaged pillar heights
///
/// Sends `G28 X0 Y0` then `G29 P1 V4`, skips every line up to and including
/// the start marker, then reads six probe lines.
///
/// # Errors
/// - `Error::Transport` on timeout or a closed port
/// - `Error::Protocol` on a probe line without a numeric 7th token
pub fn read_measurement<T: Transport>(transport: &mut T) -> Result<TowerMeasurement> {
    debug!("Sending: {}", HOME_COMMAND);
    transport.write_line(HOME_COMMAND)?;
    debug!("Sending: {}", PROBE_COMMAND);
    transport.write_line(PROBE_COMMAND)?;

    skip_to_marker(transport)?;

    let mut measurement = TowerMeasurement::new(0.0, 0.0, 0.0);
    for tower in REPORT_ORDER {
        let reading = read_pillar(transport, tower)?;
        info!(
            "{}-Pillar :{}, {} Average:{}",
            reading.tower, reading.first, reading.second, reading.average
        );
        match tower {
            Tower::X => measurement.x = reading.average,
            Tower::Y => measurement.y = reading.average,
            Tower::Z => measurement.z = reading.average,
        }
    }

    Ok(measurement)
}

fn skip_to_marker<T: Transport>(transport: &mut T) -> Result<()> {
    loop {
        let line = transport.read_line()?;
        if line.contains(PROBE_START_MARKER) {
            return Ok(());
        }
        debug!("Discarding: {}", line);
    }
}

fn read_pillar<T: Transport>(transport: &mut T, tower: Tower) -> Result<PillarReading> {
    let first = parse_probe_height(&transport.read_line()?)?;
    let second = parse_probe_height(&transport.read_line()?)?;
    Ok(PillarReading::new(tower, first, second))
}

/// Extract the probe height (7th whitespace-delimited token) from a line
pub fn parse_probe_height(line: &str) -> Result<f64> {
    let token = line.split_whitespace().nth(HEIGHT_TOKEN_INDEX).ok_or_else(|| {
        Error::Protocol(format!(
            "Probe line has fewer than {} fields: {:?}",
            HEIGHT_TOKEN_INDEX + 1,
            line
        ))
    })?;

    token
        .parse::<f64>()
        .map_err(|_| Error::Protocol(format!("Probe height {:?} is not a number in {:?}", token, line)))
}
