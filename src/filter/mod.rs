//! The filter pair contract: how device bytes become printable lines and
//! how operator lines become outgoing bytes.
//!
//! The session engine depends only on the [`InputFilter`] and
//! [`OutputFilter`] traits, never on a concrete implementation. All stream
//! state lives in the carry-over buffer the engine threads through each
//! [`InputFilter::decode`] call — conforming filters hold no hidden state
//! of their own.

mod defaults;
mod registry;

pub use defaults::{DelimitedInput, HexInput, LineOutput};
pub use registry::FilterRegistry;

use std::fmt;
use std::sync::Arc;

use indexmap::IndexMap;

/// Opaque configuration bag passed unmodified to every filter invocation,
/// for filter-specific tunables.
pub type ExtraArgs = IndexMap<String, String>;

/// Result of one input-filter invocation.
#[derive(Debug, Default, PartialEq, Eq)]
pub struct Decoded {
    /// Complete printable lines, in stream order.
    pub lines: Vec<String>,

    /// Bytes not yet resolved into a line, carried into the next call.
    pub remaining: Vec<u8>,
}

impl Decoded {
    /// All input consumed into lines, nothing carried over.
    pub fn lines(lines: Vec<String>) -> Self {
        Self {
            lines,
            remaining: Vec::new(),
        }
    }

    /// Nothing decodable yet; carry the whole buffer forward.
    pub fn carry(remaining: Vec<u8>) -> Self {
        Self {
            lines: Vec::new(),
            remaining,
        }
    }
}

/// Device bytes → printable lines, with carry-over.
///
/// Implementations must be pure functions of their inputs and must never
/// fail: malformed or undecodable bytes are rendered best-effort or kept in
/// `remaining` for future context. Every input byte must be accounted for —
/// the bytes consumed into `lines` plus `remaining` make up exactly `data`,
/// and `remaining` is a suffix of `data`. The engine checks the suffix
/// property after every call and treats a violation as a filter bug.
pub trait InputFilter: Send + Sync {
    fn decode(&self, data: &[u8], extra_args: &ExtraArgs) -> Decoded;
}

/// Operator line → device bytes.
///
/// Pure and infallible; one self-contained encoding per submitted line,
/// with no carry-over between calls. An empty line must encode to either an
/// empty byte sequence or a minimal framing sequence, never fail.
pub trait OutputFilter: Send + Sync {
    fn encode(&self, line: &str, extra_args: &ExtraArgs) -> Vec<u8>;
}

/// The (input, output) filter combination governing one session.
#[derive(Clone)]
pub struct FilterPair {
    /// Name the pair resolves under; also used when reporting contract
    /// violations.
    pub name: String,

    /// Device bytes → lines.
    pub input: Arc<dyn InputFilter>,

    /// Operator line → device bytes.
    pub output: Arc<dyn OutputFilter>,
}

impl FilterPair {
    /// Create a filter pair from its two halves.
    pub fn new(
        name: impl Into<String>,
        input: Arc<dyn InputFilter>,
        output: Arc<dyn OutputFilter>,
    ) -> Self {
        Self {
            name: name.into(),
            input,
            output,
        }
    }

    /// Newline-delimited text on both directions.
    pub fn text() -> Self {
        Self::new(
            "text",
            Arc::new(DelimitedInput::new()),
            Arc::new(LineOutput::with_terminator(b"\n".to_vec())),
        )
    }

    /// Hex-dumped input with raw pass-through output.
    pub fn binary() -> Self {
        Self::new("binary", Arc::new(HexInput), Arc::new(LineOutput::raw()))
    }
}

impl fmt::Debug for FilterPair {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.debug_struct("FilterPair")
            .field("name", &self.name)
            .field("input", &"<InputFilter>")
            .field("output", &"<OutputFilter>")
            .finish()
    }
}
