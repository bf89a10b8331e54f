//! Serial port transport
//!
//! Opens the printer's USB serial port at 115200 baud. Some printer boards
//! only come up after a USB reset, which is triggered by briefly opening the
//! port with odd parity before opening it for real with no parity. Windows
//! needs the throwaway handle closed before the real open; other platforms
//! need it kept open until the real handle exists.

use crate::error::{Error, Result};
use crate::transport::Transport;
use serialport::{Parity, SerialPort};
use std::io::{self, BufRead, BufReader, Write};
use std::time::Duration;
use tracing::{debug, info};

/// Serial connection parameters
#[derive(Debug, Clone)]
pub struct TransportConfig {
    /// Port identifier (e.g. /dev/ttyACM0, COM3)
    pub port: String,

    /// Baud rate
    pub baud: u32,

    /// Applied to every line read
    pub read_timeout: Duration,

    /// Applied to every command write
    pub write_timeout: Duration,
}

impl TransportConfig {
    pub const DEFAULT_BAUD: u32 = 115_200;
    pub const DEFAULT_READ_TIMEOUT: Duration = Duration::from_secs(10);
    pub const DEFAULT_WRITE_TIMEOUT: Duration = Duration::from_secs(10_000);

    /// Create a configuration with default baud rate and timeouts
    pub fn new(port: impl Into<String>) -> Self {
        Self {
            port: port.into(),
            baud: Self::DEFAULT_BAUD,
            read_timeout: Self::DEFAULT_READ_TIMEOUT,
            write_timeout: Self::DEFAULT_WRITE_TIMEOUT,
        }
    }

    /// Set baud rate
    pub fn with_baud(mut self, baud: u32) -> Self {
        self.baud = baud;
        self
    }

    /// Set read and write timeouts
    pub fn with_timeouts(mut self, read_timeout: Duration, write_timeout: Duration) -> Self {
        self.read_timeout = read_timeout;
        self.write_timeout = write_timeout;
        self
    }
}

/// Blocking line transport over a serial port
pub struct SerialTransport {
    reader: BufReader<Box<dyn SerialPort>>,
    read_timeout: Duration,
    write_timeout: Duration,
    active_timeout: Duration,
}

impl SerialTransport {
    /// Open the port using the parity handshake
    ///
    /// # Errors
    /// `Error::Connection` naming the port and baud rate if either open fails
    pub fn open(config: &TransportConfig) -> Result<Self> {
        info!("Opening serial port: {} at {} bps", config.port, config.baud);

        let connection_error = |source: serialport::Error| Error::Connection {
            port: config.port.clone(),
            baud: config.baud,
            source,
        };
        let open_with = |parity: Parity| {
            serialport::new(&config.port, config.baud)
                .parity(parity)
                .timeout(config.read_timeout)
                .open()
                .map_err(connection_error)
        };

        let throwaway = open_with(Parity::Odd)?;
        let throwaway = if cfg!(windows) {
            drop(throwaway);
            None
        } else {
            Some(throwaway)
        };

        let mut port = open_with(Parity::None)?;
        port.write_request_to_send(false).map_err(connection_error)?;
        drop(throwaway);

        debug!("Serial port {} ready", config.port);
        Ok(Self {
            reader: BufReader::new(port),
            read_timeout: config.read_timeout,
            write_timeout: config.write_timeout,
            active_timeout: config.read_timeout,
        })
    }

    fn use_timeout(&mut self, timeout: Duration) -> io::Result<()> {
        if self.active_timeout != timeout {
            self.reader.get_mut().set_timeout(timeout)?;
            self.active_timeout = timeout;
        }
        Ok(())
    }
}

impl Transport for SerialTransport {
    fn write_line(&mut self, line: &str) -> io::Result<()> {
        self.use_timeout(self.write_timeout)?;
        let port = self.reader.get_mut();
        port.write_all(line.as_bytes())?;
        port.write_all(b"\n")?;
        port.flush()
    }

    fn read_line(&mut self) -> io::Result<String> {
        self.use_timeout(self.read_timeout)?;
        let mut buf = Vec::new();
        let read = self.reader.read_until(b'\n', &mut buf)?;
        if read == 0 {
            return Err(io::Error::new(
                io::ErrorKind::UnexpectedEof,
                "serial port closed",
            ));
        }
        let line = String::from_utf8_lossy(&buf);
        Ok(line.trim_end_matches(['\r', '\n']).to_string())
    }
}
