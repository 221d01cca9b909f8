//! # Serline
//!
//! Interactive serial terminal with a pluggable stream-filter pipeline.
//!
//! Serline bridges a human operator and a serial device: bytes arriving
//! from the device are decoded into lines and displayed on the console
//! while operator input is simultaneously encoded and forwarded to the
//! device. A swappable [`FilterPair`] reinterprets the byte stream on both
//! directions — decode framed log lines on input, or re-encode typed text
//! into a device-specific protocol on output — without the session loops
//! knowing the device's protocol.
//!
//! ## Features
//!
//! - Concurrent inbound and outbound loops over one duplex serial channel
//! - Carry-over buffering so line boundaries never depend on read sizes
//! - Fixed [`InputFilter`]/[`OutputFilter`] contract with byte-conservation
//!   checking
//! - Built-in newline-delimited and hex-dump filter pairs, plus a global
//!   registry for custom pairs
//! - Coordinated shutdown: either side ending the session unblocks the
//!   other within one pending read
//!
//! ## Quick Start
//!
//! ```rust,no_run
//! use serline::{Session, SerialConfig, StdinPrompt, StdoutDisplay};
//!
//! #[tokio::main]
//! async fn main() -> Result<(), serline::Error> {
//!     let config = SerialConfig::new("/dev/ttyUSB0", 115_200);
//!     let (source, sink) = serline::transport::open(&config)?;
//!
//!     let session = Session::builder().filter("text").build(
//!         Box::new(source),
//!         Box::new(sink),
//!         Box::new(StdinPrompt::new()),
//!         Box::new(StdoutDisplay::new()),
//!     )?;
//!
//!     session.run().await
//! }
//! ```

pub mod console;
pub mod error;
pub mod filter;
pub mod session;
pub mod transport;

// Re-export main types for convenience
pub use console::{LineDisplay, LinePrompt, StdinPrompt, StdoutDisplay};
pub use error::Error;
pub use filter::{Decoded, ExtraArgs, FilterPair, FilterRegistry, InputFilter, OutputFilter};
pub use session::{Session, SessionBuilder, SessionState};
pub use transport::{ByteSink, ByteSource, SerialConfig, SerialMode};
