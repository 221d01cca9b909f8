//! Console channel: operator line input and ordered line display.
//!
//! The session engine reads submitted lines through [`LinePrompt`] and
//! writes decoded device lines through [`LineDisplay`]. Raw-mode handling,
//! history and prompt repainting are deliberately outside this crate — the
//! standard implementations speak plain line-buffered stdio.

use async_trait::async_trait;
use tokio::io::{self, AsyncBufReadExt, AsyncWriteExt, BufReader, Stdin, Stdout};

use crate::error::{ConsoleError, Result};

/// Operator input: one submitted line at a time.
#[async_trait]
pub trait LinePrompt: Send {
    /// Read the next operator line, without its trailing newline.
    ///
    /// Returns `Ok(None)` when the operator closes the input stream — a
    /// normal end-of-session request, not an error.
    async fn next_line(&mut self) -> Result<Option<String>>;
}

/// Console output surface. Lines must appear in submission order.
#[async_trait]
pub trait LineDisplay: Send {
    /// Write one line to the display.
    async fn show_line(&mut self, line: &str) -> Result<()>;
}

/// Line input over the process's standard input.
pub struct StdinPrompt {
    reader: BufReader<Stdin>,
}

impl StdinPrompt {
    pub fn new() -> Self {
        Self {
            reader: BufReader::new(io::stdin()),
        }
    }
}

impl Default for StdinPrompt {
    fn default() -> Self {
        Self::new()
    }
}

#[async_trait]
impl LinePrompt for StdinPrompt {
    async fn next_line(&mut self) -> Result<Option<String>> {
        let mut line = String::new();
        let n = self
            .reader
            .read_line(&mut line)
            .await
            .map_err(ConsoleError::Io)?;
        if n == 0 {
            return Ok(None);
        }
        if line.ends_with('\n') {
            line.pop();
            if line.ends_with('\r') {
                line.pop();
            }
        }
        Ok(Some(line))
    }
}

/// Line display over the process's standard output.
pub struct StdoutDisplay {
    writer: Stdout,
}

impl StdoutDisplay {
    pub fn new() -> Self {
        Self {
            writer: io::stdout(),
        }
    }
}

impl Default for StdoutDisplay {
    fn default() -> Self {
        Self::new()
    }
}

#[async_trait]
impl LineDisplay for StdoutDisplay {
    async fn show_line(&mut self, line: &str) -> Result<()> {
        let mut out = String::with_capacity(line.len() + 1);
        out.push_str(line);
        out.push('\n');
        self.writer
            .write_all(out.as_bytes())
            .await
            .map_err(ConsoleError::Io)?;
        self.writer.flush().await.map_err(ConsoleError::Io)?;
        Ok(())
    }
}
