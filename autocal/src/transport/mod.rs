//! # Printer Transport
//!
//! Line-oriented, blocking link to the printer firmware.
//!
//! **Implementations:**
//! - `SerialTransport`: real serial port (115200 baud, parity handshake)
//! - `ScriptedTransport`: in-memory firmware script for tests
//!
//! Every read blocks until a full line arrives or the configured timeout
//! elapses. A timeout is reported as an `io::ErrorKind::TimedOut` error and
//! is fatal to a calibration run.

pub mod mock;
pub mod serial;

pub use mock::ScriptedTransport;
pub use serial::{SerialTransport, TransportConfig};

use std::io;

/// Bidirectional line-oriented link to the printer firmware
pub trait Transport {
    /// Send one command line; the newline terminator is appended here
    fn write_line(&mut self, line: &str) -> io::Result<()>;

    /// Block until the next line arrives and return it without its terminator
    fn read_line(&mut self) -> io::Result<String>;
}

impl<T: Transport + ?Sized> Transport for &mut T {
    fn write_line(&mut self, line: &str) -> io::Result<()> {
        (**self).write_line(line)
    }

    fn read_line(&mut self) -> io::Result<String> {
        (**self).read_line()
    }
}
