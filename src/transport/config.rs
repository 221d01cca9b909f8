//! Serial connection configuration.

use std::fmt;
use std::str::FromStr;
use std::time::Duration;

use serialport::{DataBits, Parity, StopBits};

use crate::error::TransportError;

/// Serial connection configuration.
#[derive(Debug, Clone)]
pub struct SerialConfig {
    /// Device path (e.g. `/dev/ttyUSB0`, `COM3`).
    pub path: String,

    /// Baud rate.
    pub baud_rate: u32,

    /// Data bits, parity and stop bits.
    pub mode: SerialMode,

    /// Bounded wait for a single device read, so the inbound loop can
    /// periodically check for shutdown instead of blocking forever.
    pub poll_timeout: Duration,
}

impl SerialConfig {
    /// Create a configuration with the default `8N1` mode and a 50 ms poll
    /// window.
    pub fn new(path: impl Into<String>, baud_rate: u32) -> Self {
        Self {
            path: path.into(),
            baud_rate,
            mode: SerialMode::default(),
            poll_timeout: Duration::from_millis(50),
        }
    }

    /// Set the serial mode.
    pub fn with_mode(mut self, mode: SerialMode) -> Self {
        self.mode = mode;
        self
    }

    /// Set the device read poll window.
    pub fn with_poll_timeout(mut self, poll_timeout: Duration) -> Self {
        self.poll_timeout = poll_timeout;
        self
    }
}

/// Data bits, parity and stop bits, written `"8N1"`-style.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct SerialMode {
    /// Number of data bits per character.
    pub data_bits: DataBits,

    /// Parity checking mode.
    pub parity: Parity,

    /// Number of stop bits.
    pub stop_bits: StopBits,
}

impl Default for SerialMode {
    fn default() -> Self {
        Self {
            data_bits: DataBits::Eight,
            parity: Parity::None,
            stop_bits: StopBits::One,
        }
    }
}

impl FromStr for SerialMode {
    type Err = TransportError;

    fn from_str(s: &str) -> Result<Self, Self::Err> {
        let invalid = || TransportError::InvalidMode {
            mode: s.to_string(),
        };

        let mut chars = s.chars();
        let data = chars.next().ok_or_else(invalid)?;
        let parity = chars.next().ok_or_else(invalid)?;
        let stop: String = chars.collect();

        let data_bits = match data {
            '5' => DataBits::Five,
            '6' => DataBits::Six,
            '7' => DataBits::Seven,
            '8' => DataBits::Eight,
            _ => return Err(invalid()),
        };

        let parity = match parity.to_ascii_uppercase() {
            'N' => Parity::None,
            'E' => Parity::Even,
            'O' => Parity::Odd,
            _ => return Err(invalid()),
        };

        let stop_bits = match stop.as_str() {
            "1" => StopBits::One,
            "2" => StopBits::Two,
            _ => return Err(invalid()),
        };

        Ok(Self {
            data_bits,
            parity,
            stop_bits,
        })
    }
}

impl fmt::Display for SerialMode {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        let data = match self.data_bits {
            DataBits::Five => '5',
            DataBits::Six => '6',
            DataBits::Seven => '7',
            DataBits::Eight => '8',
        };
        let parity = match self.parity {
            Parity::None => 'N',
            Parity::Even => 'E',
            Parity::Odd => 'O',
        };
        let stop = match self.stop_bits {
            StopBits::One => '1',
            StopBits::Two => '2',
        };
        write!(f, "{data}{parity}{stop}")
    }
}
