//! Error types for serline.

use std::io;
use thiserror::Error;

/// Main error type for serline operations.
#[derive(Error, Debug)]
pub enum Error {
    /// Serial transport errors
    #[error("Transport error: {0}")]
    Transport(#[from] TransportError),

    /// Console channel errors
    #[error("Console error: {0}")]
    Console(#[from] ConsoleError),

    /// Filter resolution errors
    #[error("Filter error: {0}")]
    Filter(#[from] FilterError),

    /// Session engine errors
    #[error("Session error: {0}")]
    Session(#[from] SessionError),
}

/// Transport layer errors (serial port open, read, write).
#[derive(Error, Debug)]
pub enum TransportError {
    /// Failed to open the serial device
    #[error("Failed to open serial port '{port}': {source}")]
    OpenFailed {
        port: String,
        #[source]
        source: serialport::Error,
    },

    /// Malformed mode string
    #[error("Invalid serial mode '{mode}' (expected e.g. \"8N1\")")]
    InvalidMode { mode: String },

    /// Failed to enumerate serial ports
    #[error("Failed to enumerate serial ports: {0}")]
    Enumerate(#[source] serialport::Error),

    /// The device side of the channel went away
    #[error("Serial port disconnected")]
    Disconnected,

    /// The channel half was already torn down
    #[error("Serial port closed")]
    Closed,

    /// I/O error
    #[error("I/O error: {0}")]
    Io(#[from] io::Error),
}

/// Console layer errors (operator input, display output).
#[derive(Error, Debug)]
pub enum ConsoleError {
    /// I/O error
    #[error("Console I/O error: {0}")]
    Io(#[from] io::Error),
}

/// Filter resolution and registration errors.
#[derive(Error, Debug)]
pub enum FilterError {
    /// No filter pair registered under the requested name
    #[error("Unknown filter '{name}'")]
    Unknown { name: String },

    /// A filter pair with this name already exists
    #[error("Filter '{name}' is already registered")]
    AlreadyRegistered { name: String },

    /// The global registry could not be accessed
    #[error("Filter registry unavailable: {message}")]
    Registry { message: String },
}

/// Session engine errors.
#[derive(Error, Debug)]
pub enum SessionError {
    /// An input filter returned carry-over bytes that are not a suffix of
    /// the buffer it was given, so bytes were dropped or duplicated
    #[error("Input filter '{filter}' violated the carry-over contract")]
    FilterContract { filter: String },
}

/// Result type alias using serline's Error.
pub type Result<T> = std::result::Result<T, Error>;
