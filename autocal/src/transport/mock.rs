//! Scripted transport for testing
//!
//! Replays a queue of firmware response lines and records every command
//! written, so calibration logic can be exercised without a printer.
//! Reading past the end of the script fails with `TimedOut`, the same way a
//! stalled firmware does on a real port.
//!
//! # Example
//!
//! ```
//! use autocal::transport::{ScriptedTransport, Transport};
//!
//! let mut transport = ScriptedTransport::new();
//! transport.push_line("ok");
//!
//! transport.write_line("M666 X0 Y0 Z0").unwrap();
//! assert_eq!(transport.read_line().unwrap(), "ok");
//! assert_eq!(transport.written(), ["M666 X0 Y0 Z0"]);
//! assert!(transport.read_line().is_err());
//! ```

use crate::transport::Transport;
use std::collections::VecDeque;
use std::io;

/// In-memory firmware stand-in
#[derive(Debug, Default)]
pub struct ScriptedTransport {
    responses: VecDeque<String>,
    written: Vec<String>,
}

impl ScriptedTransport {
    /// Create an empty script
    pub fn new() -> Self {
        Self::default()
    }

    /// Queue one response line
    pub fn push_line(&mut self, line: impl Into<String>) {
        self.responses.push_back(line.into());
    }

    /// Queue several response lines in order
    pub fn push_lines<I, S>(&mut self, lines: I)
    where
        I: IntoIterator<Item = S>,
        S: Into<String>,
    {
        self.responses.extend(lines.into_iter().map(Into::into));
    }

    /// Commands written so far (without line terminators)
    pub fn written(&self) -> &[String] {
        &self.written
    }

    /// Response lines not yet consumed
    pub fn remaining(&self) -> usize {
        self.responses.len()
    }
}

impl Transport for ScriptedTransport {
    fn write_line(&mut self, line: &str) -> io::Result<()> {
        self.written.push(line.to_string());
        Ok(())
    }

    fn read_line(&mut self) -> io::Result<String> {
        self.responses.pop_front().ok_or_else(|| {
            io::Error::new(io::ErrorKind::TimedOut, "no response from firmware")
        })
    }
}
