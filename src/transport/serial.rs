//! Serial port implementation of the byte channel traits.
//!
//! `serialport` reads and writes are blocking, so every call runs under
//! `spawn_blocking`. A read blocks for at most the configured poll window,
//! which bounds how long a shutting-down session can stay pending on the
//! device.

use std::io::{self, Read, Write};

use async_trait::async_trait;
use bytes::Bytes;
use log::{debug, trace};
use serialport::SerialPort;
use tokio::task;

use super::config::SerialConfig;
use super::{ByteSink, ByteSource};
use crate::error::{Result, TransportError};

/// Upper bound on a single device read.
const READ_CHUNK: usize = 256;

/// Open the configured port and split it into its two directions.
///
/// Both halves share one underlying device handle (`try_clone`); duplex
/// serial transports carry the two directions independently, so the halves
/// need no locking against each other. DTR and RTS are dropped after the
/// open so boards with a DTR-wired reset line are not rebooted by the act
/// of connecting.
pub fn open(config: &SerialConfig) -> Result<(SerialSource, SerialSink)> {
    let open_failed = |source| TransportError::OpenFailed {
        port: config.path.clone(),
        source,
    };

    let reader = serialport::new(&config.path, config.baud_rate)
        .data_bits(config.mode.data_bits)
        .parity(config.mode.parity)
        .stop_bits(config.mode.stop_bits)
        .timeout(config.poll_timeout)
        .open()
        .map_err(open_failed)?;

    let mut writer = reader.try_clone().map_err(open_failed)?;
    writer.write_data_terminal_ready(false).map_err(open_failed)?;
    writer.write_request_to_send(false).map_err(open_failed)?;

    debug!(
        "opened {} at {} baud ({})",
        config.path, config.baud_rate, config.mode
    );

    Ok((
        SerialSource { port: Some(reader) },
        SerialSink { port: Some(writer) },
    ))
}

/// Enumerate the serial ports visible to the host.
pub fn available_ports() -> Result<Vec<String>> {
    let ports = serialport::available_ports().map_err(TransportError::Enumerate)?;
    Ok(ports.into_iter().map(|p| p.port_name).collect())
}

/// Reading half of an open serial port.
pub struct SerialSource {
    /// Taken while a blocking read is in flight; left `None` only if the
    /// read future was cancelled mid-flight.
    port: Option<Box<dyn SerialPort>>,
}

#[async_trait]
impl ByteSource for SerialSource {
    async fn read_chunk(&mut self) -> Result<Option<Bytes>> {
        let mut port = self.port.take().ok_or(TransportError::Closed)?;

        let (port, outcome) = task::spawn_blocking(move || {
            let mut buf = [0u8; READ_CHUNK];
            let outcome = port
                .read(&mut buf)
                .map(|n| Bytes::copy_from_slice(&buf[..n]));
            (port, outcome)
        })
        .await
        .map_err(|e| TransportError::Io(io::Error::other(e)))?;
        self.port = Some(port);

        match outcome {
            // A zero-byte read without an error means the device is gone.
            Ok(chunk) if chunk.is_empty() => Err(TransportError::Disconnected.into()),
            Ok(chunk) => {
                trace!("read {} bytes", chunk.len());
                Ok(Some(chunk))
            }
            Err(e) if e.kind() == io::ErrorKind::TimedOut => Ok(None),
            Err(e) => Err(TransportError::Io(e).into()),
        }
    }
}

/// Writing half of an open serial port.
pub struct SerialSink {
    port: Option<Box<dyn SerialPort>>,
}

#[async_trait]
impl ByteSink for SerialSink {
    async fn write_chunk(&mut self, data: &[u8]) -> Result<()> {
        if data.is_empty() {
            return Ok(());
        }

        let mut port = self.port.take().ok_or(TransportError::Closed)?;
        let owned = data.to_vec();

        let (port, outcome) = task::spawn_blocking(move || {
            let outcome = port.write_all(&owned).and_then(|_| port.flush());
            (port, outcome)
        })
        .await
        .map_err(|e| TransportError::Io(io::Error::other(e)))?;
        self.port = Some(port);

        trace!("wrote {} bytes", data.len());
        outcome.map_err(|e| TransportError::Io(e).into())
    }
}
