//! Length-prefixed frame filter registered as a custom pair.
//!
//! A device that sends `[len][payload]` frames is decoded into hex lines,
//! and operator input is framed the same way on the way out. Incomplete
//! frames stay in the carry-over buffer until the rest arrives.
//!
//! Run with:
//!
//! ```text
//! cargo run --example frame_filter -- /dev/ttyUSB0
//! ```

use std::sync::Arc;

use serline::filter::{Decoded, ExtraArgs, FilterPair, FilterRegistry, InputFilter, OutputFilter};
use serline::transport::{self, SerialConfig};
use serline::{Session, StdinPrompt, StdoutDisplay};

/// Decode `[len][payload]` frames, carrying partial frames forward.
struct FrameInput;

impl InputFilter for FrameInput {
    fn decode(&self, data: &[u8], _extra_args: &ExtraArgs) -> Decoded {
        let mut lines = Vec::new();
        let mut rest = data;
        while let Some((&len, payload)) = rest.split_first() {
            let len = len as usize;
            if payload.len() < len {
                break;
            }
            lines.push(hex::encode(&payload[..len]));
            rest = &payload[len..];
        }

        Decoded {
            lines,
            remaining: rest.to_vec(),
        }
    }
}

/// Frame the typed line as `[len][bytes]`, truncating past 255 bytes.
struct FrameOutput;

impl OutputFilter for FrameOutput {
    fn encode(&self, line: &str, _extra_args: &ExtraArgs) -> Vec<u8> {
        let payload = line.as_bytes();
        let len = payload.len().min(u8::MAX as usize);
        let mut bytes = Vec::with_capacity(len + 1);
        bytes.push(len as u8);
        bytes.extend_from_slice(&payload[..len]);
        bytes
    }
}

#[tokio::main]
async fn main() -> Result<(), serline::Error> {
    env_logger::init();

    FilterRegistry::global()
        .write()
        .expect("filter registry lock")
        .register(FilterPair::new(
            "frames",
            Arc::new(FrameInput),
            Arc::new(FrameOutput),
        ))?;

    let path = std::env::args()
        .nth(1)
        .unwrap_or_else(|| "/dev/ttyUSB0".to_string());
    let (source, sink) = transport::open(&SerialConfig::new(path, 115_200))?;

    let session = Session::builder().filter("frames").build(
        Box::new(source),
        Box::new(sink),
        Box::new(StdinPrompt::new()),
        Box::new(StdoutDisplay::new()),
    )?;

    session.run().await
}
