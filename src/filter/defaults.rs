//! Default filter implementations: delimited text and hex-dumped binary.

use memchr::memmem;

use super::{Decoded, ExtraArgs, InputFilter, OutputFilter};

/// `extra_args` key overriding the configured input delimiter.
const DELIMITER_KEY: &str = "delimiter";

/// Split the accumulated buffer on a byte delimiter.
///
/// Every complete segment is emitted as a lossily-decoded text line; the
/// undelimited tail is carried into the next invocation. The delimiter can
/// be overridden per-session through the `delimiter` extra argument.
#[derive(Debug, Clone)]
pub struct DelimitedInput {
    delimiter: Vec<u8>,
}

impl DelimitedInput {
    /// Newline-delimited input.
    pub fn new() -> Self {
        Self {
            delimiter: vec![b'\n'],
        }
    }

    /// Split on an arbitrary (possibly multi-byte) delimiter.
    pub fn with_delimiter(delimiter: impl Into<Vec<u8>>) -> Self {
        Self {
            delimiter: delimiter.into(),
        }
    }
}

impl Default for DelimitedInput {
    fn default() -> Self {
        Self::new()
    }
}

impl InputFilter for DelimitedInput {
    fn decode(&self, data: &[u8], extra_args: &ExtraArgs) -> Decoded {
        let delimiter = extra_args
            .get(DELIMITER_KEY)
            .map(|d| d.as_bytes())
            .filter(|d| !d.is_empty())
            .unwrap_or(&self.delimiter);

        let mut lines = Vec::new();
        let mut rest = data;
        while let Some(pos) = memmem::find(rest, delimiter) {
            let (segment, tail) = rest.split_at(pos);
            lines.push(String::from_utf8_lossy(segment).into_owned());
            rest = &tail[delimiter.len()..];
        }

        Decoded {
            lines,
            remaining: rest.to_vec(),
        }
    }
}

/// Render the whole buffer as one lowercase hex line; nothing is carried.
#[derive(Debug, Clone, Copy, Default)]
pub struct HexInput;

impl InputFilter for HexInput {
    fn decode(&self, data: &[u8], _extra_args: &ExtraArgs) -> Decoded {
        if data.is_empty() {
            return Decoded::default();
        }
        Decoded::lines(vec![hex::encode(data)])
    }
}

/// Encode the operator line as its raw text bytes, optionally framed with a
/// trailing terminator.
#[derive(Debug, Clone, Default)]
pub struct LineOutput {
    terminator: Option<Vec<u8>>,
}

impl LineOutput {
    /// Raw pass-through: no added terminator.
    pub fn raw() -> Self {
        Self { terminator: None }
    }

    /// Append `terminator` after every encoded line.
    pub fn with_terminator(terminator: impl Into<Vec<u8>>) -> Self {
        Self {
            terminator: Some(terminator.into()),
        }
    }
}

impl OutputFilter for LineOutput {
    fn encode(&self, line: &str, _extra_args: &ExtraArgs) -> Vec<u8> {
        let terminator = self.terminator.as_deref().unwrap_or_default();
        let mut bytes = Vec::with_capacity(line.len() + terminator.len());
        bytes.extend_from_slice(line.as_bytes());
        bytes.extend_from_slice(terminator);
        bytes
    }
}
