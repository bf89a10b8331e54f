//! Common error types for autocal

use thiserror::Error;

/// Common result type for autocal operations
pub type Result<T> = std::result::Result<T, Error>;

/// Common error types shared by the autocal crates
#[derive(Error, Debug)]
pub enum Error {
    /// I/O operation error (wraps std::io::Error)
    #[error("IO error: {0}")]
    Io(#[from] std::io::Error),

    /// Settings file could not be decoded or encoded
    #[error("Settings error: {0}")]
    Settings(String),
}
