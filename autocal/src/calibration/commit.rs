//! Firmware commands that change printer state
//!
//! Both commands are answered by exactly one line, which is read and
//! discarded as flow control. Its content is not checked.

use crate::calibration::types::TrimState;
use crate::error::Result;
use crate::transport::Transport;
use tracing::{debug, info};

/// `M666` command setting the per-tower trim offsets
pub fn trim_command(trims: &TrimState) -> String {
    format!("M666 X{:.4} Y{:.4} Z{:.4}", trims.x, trims.y, trims.z)
}

/// `M665` command setting diagonal rod length and delta radius
pub fn geometry_command(diagonal_rod: f64, delta_radius: f64) -> String {
    format!("M665 L{} R{}", diagonal_rod, delta_radius)
}

/// Send trims to the printer and wait for its acknowledgement
pub fn commit_trims<T: Transport>(transport: &mut T, trims: &TrimState) -> Result<()> {
    let command = trim_command(trims);
    info!("Setting values {}", command);
    send_and_ack(transport, &command)
}

/// Send rod length and radius to the printer and wait for its acknowledgement
pub fn commit_geometry<T: Transport>(
    transport: &mut T,
    diagonal_rod: f64,
    delta_radius: f64,
) -> Result<()> {
    let command = geometry_command(diagonal_rod, delta_radius);
    info!("Setting up {}", command);
    send_and_ack(transport, &command)
}

fn send_and_ack<T: Transport>(transport: &mut T, command: &str) -> Result<()> {
    transport.write_line(command)?;
    let ack = transport.read_line()?;
    debug!("Firmware replied: {}", ack);
    Ok(())
}
