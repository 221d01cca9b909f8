//! Transport layer: the duplex serial byte channel.
//!
//! The session engine depends only on the [`ByteSource`] and [`ByteSink`]
//! traits; the serial implementation lives in [`serial`] and is opened and
//! configured before the engine is constructed.

pub mod config;
mod serial;

pub use config::{SerialConfig, SerialMode};
pub use serial::{SerialSink, SerialSource, available_ports, open};

use async_trait::async_trait;
use bytes::Bytes;

use crate::error::Result;

/// Reading half of the device channel.
#[async_trait]
pub trait ByteSource: Send {
    /// Read the next chunk of device bytes within a bounded wait.
    ///
    /// `Ok(None)` reports that no data arrived within the poll window and is
    /// never a terminal condition. Chunk sizes are arbitrary — callers must
    /// not assume any alignment with message boundaries. Any `Err` is fatal
    /// to the session and is not retried.
    async fn read_chunk(&mut self) -> Result<Option<Bytes>>;
}

/// Writing half of the device channel.
#[async_trait]
pub trait ByteSink: Send {
    /// Write the whole chunk to the device.
    async fn write_chunk(&mut self, data: &[u8]) -> Result<()>;
}
