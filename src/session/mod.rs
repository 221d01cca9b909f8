//! Session engine: the bidirectional bridge between device and console.
//!
//! One [`Session`] owns two concurrent loops over the same device channel:
//! the inbound loop (device → input filter → console) and the outbound loop
//! (console → output filter → device). The inbound loop threads a carry-over
//! buffer through every input-filter call, so line boundaries never have to
//! align with read boundaries. Whichever loop first observes a terminal
//! condition moves the session to `ShuttingDown`, which unblocks the other
//! loop within one pending read.

use bytes::{Buf, BytesMut};
use log::{debug, trace, warn};
use tokio::sync::watch;

use crate::console::{LineDisplay, LinePrompt};
use crate::error::{Result, SessionError};
use crate::filter::{ExtraArgs, FilterPair, FilterRegistry, InputFilter, OutputFilter};
use crate::transport::{ByteSink, ByteSource};

/// Lifecycle of one session.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum SessionState {
    /// Both loops are running.
    Running,

    /// A terminal condition was observed; the loops are winding down.
    ShuttingDown,

    /// Both loops have exited and the device channel has been released.
    Terminated,
}

/// Bidirectional terminal session over an open device channel.
///
/// Created through [`Session::builder`]. [`run`](Self::run) consumes the
/// session; a new session requires freshly opened channel halves.
///
/// # Example
///
/// ```rust,no_run
/// use serline::{Session, SerialConfig, StdinPrompt, StdoutDisplay};
///
/// # async fn example() -> Result<(), serline::Error> {
/// let config = SerialConfig::new("/dev/ttyUSB0", 115_200);
/// let (source, sink) = serline::transport::open(&config)?;
///
/// let session = Session::builder().filter("text").build(
///     Box::new(source),
///     Box::new(sink),
///     Box::new(StdinPrompt::new()),
///     Box::new(StdoutDisplay::new()),
/// )?;
///
/// session.run().await?;
/// # Ok(())
/// # }
/// ```
pub struct Session {
    source: Box<dyn ByteSource>,
    sink: Box<dyn ByteSink>,
    prompt: Box<dyn LinePrompt>,
    display: Box<dyn LineDisplay>,
    echo: Option<Box<dyn LineDisplay>>,
    filters: FilterPair,
    extra_args: ExtraArgs,
    state: watch::Sender<SessionState>,
}

impl Session {
    /// Start building a session.
    pub fn builder() -> SessionBuilder {
        SessionBuilder::new()
    }

    /// Watch handle observing the session lifecycle.
    pub fn state(&self) -> watch::Receiver<SessionState> {
        self.state.subscribe()
    }

    /// Run both loops until either side ends the session.
    ///
    /// Returns `Ok(())` when the operator ended the session (console
    /// end-of-input) and the first fatal condition otherwise. The device
    /// channel halves are released before this returns.
    pub async fn run(self) -> Result<()> {
        let Session {
            mut source,
            mut sink,
            mut prompt,
            mut display,
            mut echo,
            filters,
            extra_args,
            state,
        } = self;

        debug!("session starting with filter {:?}", filters.name);

        let inbound = inbound_loop(
            source.as_mut(),
            display.as_mut(),
            filters.input.as_ref(),
            &filters.name,
            &extra_args,
            &state,
        );
        let outbound = outbound_loop(
            prompt.as_mut(),
            sink.as_mut(),
            echo.as_deref_mut().map(|e| e as &mut dyn LineDisplay),
            filters.output.as_ref(),
            &extra_args,
            &state,
        );

        let (inbound, outbound) = tokio::join!(inbound, outbound);

        // Release the device channel before declaring the session over.
        drop(source);
        drop(sink);
        state.send_replace(SessionState::Terminated);
        debug!("session terminated");

        match (inbound, outbound) {
            (Ok(()), Ok(())) => Ok(()),
            (Err(inbound), outbound) => {
                if let Err(outbound) = outbound {
                    warn!("outbound loop also failed: {outbound}");
                }
                Err(inbound)
            }
            (Ok(()), Err(outbound)) => Err(outbound),
        }
    }
}

/// Flip the session to `ShuttingDown`. Only the first caller transitions;
/// later calls (and calls after `Terminated`) are no-ops.
fn begin_shutdown(state: &watch::Sender<SessionState>) {
    state.send_if_modified(|state| {
        if *state == SessionState::Running {
            *state = SessionState::ShuttingDown;
            true
        } else {
            false
        }
    });
}

/// Device → input filter → console.
async fn inbound_loop(
    source: &mut dyn ByteSource,
    display: &mut dyn LineDisplay,
    filter: &dyn InputFilter,
    filter_name: &str,
    extra_args: &ExtraArgs,
    state: &watch::Sender<SessionState>,
) -> Result<()> {
    let mut shutdown = state.subscribe();

    // Bytes already read from the device but not yet resolved into complete
    // lines. Owned by this loop only; threaded through every filter call.
    let mut carry = BytesMut::with_capacity(4096);

    let result = loop {
        tokio::select! {
            chunk = source.read_chunk() => match chunk {
                Ok(Some(chunk)) => {
                    if let Err(e) =
                        pump_inbound(&mut carry, &chunk, filter, filter_name, extra_args, display)
                            .await
                    {
                        break Err(e);
                    }
                }
                // No data within the poll window; not a terminal condition.
                Ok(None) => continue,
                Err(e) => {
                    debug!("inbound: device read failed: {e}");
                    break Err(e);
                }
            },
            _ = shutdown.changed() => break Ok(()),
        }
    };

    if !carry.is_empty() {
        // Unterminated bytes are dropped, never flushed as a partial line.
        debug!("inbound: discarding {} unterminated bytes", carry.len());
    }

    begin_shutdown(state);
    result
}

/// Append one chunk to the carry-over buffer, run the input filter, and
/// display the decoded lines in stream order.
async fn pump_inbound(
    carry: &mut BytesMut,
    chunk: &[u8],
    filter: &dyn InputFilter,
    filter_name: &str,
    extra_args: &ExtraArgs,
    display: &mut dyn LineDisplay,
) -> Result<()> {
    carry.extend_from_slice(chunk);

    let decoded = filter.decode(carry, extra_args);
    if !carry.ends_with(&decoded.remaining) {
        warn!(
            "input filter {filter_name:?} returned {} carry-over bytes that are not a suffix of its {} byte input",
            decoded.remaining.len(),
            carry.len()
        );
        return Err(SessionError::FilterContract {
            filter: filter_name.to_string(),
        }
        .into());
    }

    let consumed = carry.len() - decoded.remaining.len();
    trace!(
        "inbound: {} byte chunk, {} consumed, {} carried, {} lines",
        chunk.len(),
        consumed,
        decoded.remaining.len(),
        decoded.lines.len()
    );
    carry.advance(consumed);

    for line in &decoded.lines {
        display.show_line(line).await?;
    }

    Ok(())
}

/// Console → output filter → device.
async fn outbound_loop(
    prompt: &mut dyn LinePrompt,
    sink: &mut dyn ByteSink,
    mut echo: Option<&mut dyn LineDisplay>,
    filter: &dyn OutputFilter,
    extra_args: &ExtraArgs,
    state: &watch::Sender<SessionState>,
) -> Result<()> {
    let mut shutdown = state.subscribe();

    let result = loop {
        tokio::select! {
            line = prompt.next_line() => match line {
                Ok(Some(line)) => {
                    if let Some(echo) = echo.as_mut() {
                        if let Err(e) = echo.show_line(&format!("> {line}")).await {
                            break Err(e);
                        }
                    }

                    let encoded = filter.encode(&line, extra_args);
                    trace!("outbound: {} chars -> {} bytes", line.len(), encoded.len());
                    if encoded.is_empty() {
                        continue;
                    }
                    if let Err(e) = sink.write_chunk(&encoded).await {
                        debug!("outbound: device write failed: {e}");
                        break Err(e);
                    }
                }
                Ok(None) => {
                    debug!("outbound: console end of input");
                    break Ok(());
                }
                Err(e) => break Err(e),
            },
            _ = shutdown.changed() => break Ok(()),
        }
    };

    begin_shutdown(state);
    result
}

/// Builder for [`Session`].
///
/// The filter pair is resolved through the global [`FilterRegistry`] by
/// name, or supplied directly; the newline-delimited `"text"` pair is the
/// default when neither is given.
pub struct SessionBuilder {
    filter_name: Option<String>,
    custom_filters: Option<FilterPair>,
    extra_args: ExtraArgs,
    echo: Option<Box<dyn LineDisplay>>,
}

impl SessionBuilder {
    /// Create a new session builder.
    pub fn new() -> Self {
        Self {
            filter_name: None,
            custom_filters: None,
            extra_args: ExtraArgs::new(),
            echo: None,
        }
    }

    /// Select a registered filter pair by name.
    pub fn filter(mut self, name: impl Into<String>) -> Self {
        self.filter_name = Some(name.into());
        self
    }

    /// Use a filter pair directly, bypassing the registry.
    pub fn filter_pair(mut self, pair: FilterPair) -> Self {
        self.custom_filters = Some(pair);
        self
    }

    /// Add one filter option.
    pub fn extra_arg(mut self, key: impl Into<String>, value: impl Into<String>) -> Self {
        self.extra_args.insert(key.into(), value.into());
        self
    }

    /// Replace the whole filter option bag.
    pub fn extra_args(mut self, extra_args: ExtraArgs) -> Self {
        self.extra_args = extra_args;
        self
    }

    /// Echo submitted operator lines back through `display` as `"> {line}"`.
    pub fn echo(mut self, display: Box<dyn LineDisplay>) -> Self {
        self.echo = Some(display);
        self
    }

    /// Build the session over already-opened channel halves.
    ///
    /// This resolves the filter pair but does not start the loops; call
    /// [`Session::run`] on the result.
    pub fn build(
        self,
        source: Box<dyn ByteSource>,
        sink: Box<dyn ByteSink>,
        prompt: Box<dyn LinePrompt>,
        display: Box<dyn LineDisplay>,
    ) -> Result<Session> {
        let filters = if let Some(pair) = self.custom_filters {
            pair
        } else if let Some(name) = &self.filter_name {
            FilterRegistry::resolve(name)?
        } else {
            FilterPair::text()
        };

        let (state, _) = watch::channel(SessionState::Running);

        Ok(Session {
            source,
            sink,
            prompt,
            display,
            echo: self.echo,
            filters,
            extra_args: self.extra_args,
            state,
        })
    }
}

impl Default for SessionBuilder {
    fn default() -> Self {
        Self::new()
    }
}

#[cfg(test)]
mod tests {
    use std::collections::VecDeque;
    use std::sync::{Arc, Mutex};
    use std::time::Duration;

    use async_trait::async_trait;
    use bytes::Bytes;
    use tokio::time::timeout;

    use super::*;
    use crate::error::{Error, TransportError};
    use crate::filter::{Decoded, LineOutput};

    enum ReadStep {
        Chunk(&'static [u8]),
        Idle,
        Disconnect,
    }

    /// Byte source that plays back a fixed script, then pends forever.
    struct ScriptedSource {
        steps: VecDeque<ReadStep>,
    }

    impl ScriptedSource {
        fn new(steps: Vec<ReadStep>) -> Self {
            Self {
                steps: steps.into(),
            }
        }

        fn silent() -> Self {
            Self::new(Vec::new())
        }
    }

    #[async_trait]
    impl ByteSource for ScriptedSource {
        async fn read_chunk(&mut self) -> Result<Option<Bytes>> {
            match self.steps.pop_front() {
                Some(ReadStep::Chunk(chunk)) => Ok(Some(Bytes::from_static(chunk))),
                Some(ReadStep::Idle) => {
                    tokio::time::sleep(Duration::from_millis(1)).await;
                    Ok(None)
                }
                Some(ReadStep::Disconnect) => Err(TransportError::Disconnected.into()),
                None => std::future::pending().await,
            }
        }
    }

    #[derive(Clone, Default)]
    struct SharedSink {
        written: Arc<Mutex<Vec<u8>>>,
    }

    #[async_trait]
    impl ByteSink for SharedSink {
        async fn write_chunk(&mut self, data: &[u8]) -> Result<()> {
            self.written.lock().unwrap().extend_from_slice(data);
            Ok(())
        }
    }

    enum PromptStep {
        Line(&'static str),
        Pause(Duration),
        Eof,
    }

    /// Prompt that plays back a fixed script, then pends forever.
    struct ScriptedPrompt {
        steps: VecDeque<PromptStep>,
    }

    impl ScriptedPrompt {
        fn new(steps: Vec<PromptStep>) -> Self {
            Self {
                steps: steps.into(),
            }
        }

        fn silent() -> Self {
            Self::new(Vec::new())
        }
    }

    #[async_trait]
    impl LinePrompt for ScriptedPrompt {
        async fn next_line(&mut self) -> Result<Option<String>> {
            loop {
                match self.steps.pop_front() {
                    Some(PromptStep::Line(line)) => return Ok(Some(line.to_string())),
                    Some(PromptStep::Pause(pause)) => tokio::time::sleep(pause).await,
                    Some(PromptStep::Eof) => return Ok(None),
                    None => return std::future::pending().await,
                }
            }
        }
    }

    #[derive(Clone, Default)]
    struct SharedDisplay {
        lines: Arc<Mutex<Vec<String>>>,
    }

    impl SharedDisplay {
        fn collected(&self) -> Vec<String> {
            self.lines.lock().unwrap().clone()
        }
    }

    #[async_trait]
    impl LineDisplay for SharedDisplay {
        async fn show_line(&mut self, line: &str) -> Result<()> {
            self.lines.lock().unwrap().push(line.to_string());
            Ok(())
        }
    }

    fn text_session(
        source: ScriptedSource,
        prompt: ScriptedPrompt,
    ) -> (Session, SharedSink, SharedDisplay) {
        let sink = SharedSink::default();
        let display = SharedDisplay::default();
        let session = Session::builder()
            .filter("text")
            .build(
                Box::new(source),
                Box::new(sink.clone()),
                Box::new(prompt),
                Box::new(display.clone()),
            )
            .unwrap();
        (session, sink, display)
    }

    #[tokio::test]
    async fn test_lines_cross_read_boundaries_in_order() {
        let source = ScriptedSource::new(vec![
            ReadStep::Chunk(b"AB"),
            ReadStep::Chunk(b"C\n"),
            ReadStep::Chunk(b"DE\n"),
            ReadStep::Disconnect,
        ]);
        let (session, _sink, display) = text_session(source, ScriptedPrompt::silent());

        let result = timeout(Duration::from_secs(5), session.run()).await.unwrap();
        assert!(result.is_err());
        assert_eq!(display.collected(), vec!["ABC", "DE"]);
    }

    #[tokio::test]
    async fn test_partial_line_is_discarded_on_close() {
        let source = ScriptedSource::new(vec![
            ReadStep::Chunk(b"partial"),
            ReadStep::Disconnect,
        ]);
        let (session, _sink, display) = text_session(source, ScriptedPrompt::silent());

        let result = timeout(Duration::from_secs(5), session.run()).await.unwrap();
        assert!(result.is_err());
        assert!(display.collected().is_empty());
    }

    #[tokio::test]
    async fn test_empty_reads_are_not_terminal() {
        let source = ScriptedSource::new(vec![
            ReadStep::Idle,
            ReadStep::Idle,
            ReadStep::Chunk(b"ok\n"),
            ReadStep::Disconnect,
        ]);
        let (session, _sink, display) = text_session(source, ScriptedPrompt::silent());

        let _ = timeout(Duration::from_secs(5), session.run()).await.unwrap();
        assert_eq!(display.collected(), vec!["ok"]);
    }

    #[tokio::test]
    async fn test_operator_eof_shuts_down_cleanly() {
        let prompt = ScriptedPrompt::new(vec![PromptStep::Line("hello"), PromptStep::Eof]);
        let (session, sink, _display) = text_session(ScriptedSource::silent(), prompt);
        let state = session.state();

        let result = timeout(Duration::from_secs(5), session.run()).await.unwrap();
        assert!(result.is_ok());
        assert_eq!(&*sink.written.lock().unwrap(), b"hello\n");
        assert_eq!(*state.borrow(), SessionState::Terminated);
    }

    #[tokio::test]
    async fn test_device_error_unblocks_outbound_loop() {
        let source = ScriptedSource::new(vec![ReadStep::Disconnect]);
        let (session, _sink, _display) = text_session(source, ScriptedPrompt::silent());

        // The outbound loop never receives a line; it must still exit.
        let result = timeout(Duration::from_secs(5), session.run()).await.unwrap();
        assert!(matches!(
            result,
            Err(Error::Transport(TransportError::Disconnected))
        ));
    }

    #[tokio::test]
    async fn test_console_eof_unblocks_inbound_loop() {
        let prompt = ScriptedPrompt::new(vec![PromptStep::Eof]);
        let (session, _sink, _display) = text_session(ScriptedSource::silent(), prompt);

        // The inbound loop never receives a chunk; it must still exit.
        let result = timeout(Duration::from_secs(5), session.run()).await.unwrap();
        assert!(result.is_ok());
    }

    /// Filter whose carry-over is unrelated to its input.
    struct BrokenFilter;

    impl InputFilter for BrokenFilter {
        fn decode(&self, _data: &[u8], _extra_args: &ExtraArgs) -> Decoded {
            Decoded::carry(b"fabricated".to_vec())
        }
    }

    #[tokio::test]
    async fn test_contract_violation_is_fatal() {
        let source = ScriptedSource::new(vec![ReadStep::Chunk(b"abc")]);
        let pair = FilterPair::new("broken", Arc::new(BrokenFilter), Arc::new(LineOutput::raw()));
        let display = SharedDisplay::default();
        let session = Session::builder()
            .filter_pair(pair)
            .build(
                Box::new(source),
                Box::new(SharedSink::default()),
                Box::new(ScriptedPrompt::silent()),
                Box::new(display.clone()),
            )
            .unwrap();

        let result = timeout(Duration::from_secs(5), session.run()).await.unwrap();
        assert!(matches!(
            result,
            Err(Error::Session(SessionError::FilterContract { .. }))
        ));
        assert!(display.collected().is_empty());
    }

    #[derive(Clone, Default)]
    struct LoopbackWire {
        bytes: Arc<Mutex<Vec<u8>>>,
    }

    struct LoopbackSource {
        wire: LoopbackWire,
    }

    #[async_trait]
    impl ByteSource for LoopbackSource {
        async fn read_chunk(&mut self) -> Result<Option<Bytes>> {
            let drained = std::mem::take(&mut *self.wire.bytes.lock().unwrap());
            if drained.is_empty() {
                tokio::time::sleep(Duration::from_millis(1)).await;
                return Ok(None);
            }
            Ok(Some(Bytes::from(drained)))
        }
    }

    struct LoopbackSink {
        wire: LoopbackWire,
    }

    #[async_trait]
    impl ByteSink for LoopbackSink {
        async fn write_chunk(&mut self, data: &[u8]) -> Result<()> {
            self.wire.bytes.lock().unwrap().extend_from_slice(data);
            Ok(())
        }
    }

    #[tokio::test]
    async fn test_default_pair_round_trips_over_loopback() {
        let wire = LoopbackWire::default();
        let prompt = ScriptedPrompt::new(vec![
            PromptStep::Line("ping"),
            PromptStep::Pause(Duration::from_millis(200)),
            PromptStep::Eof,
        ]);
        let display = SharedDisplay::default();
        let session = Session::builder()
            .filter("text")
            .build(
                Box::new(LoopbackSource { wire: wire.clone() }),
                Box::new(LoopbackSink { wire }),
                Box::new(prompt),
                Box::new(display.clone()),
            )
            .unwrap();

        let result = timeout(Duration::from_secs(5), session.run()).await.unwrap();
        assert!(result.is_ok());
        assert_eq!(display.collected(), vec!["ping"]);
    }

    #[tokio::test]
    async fn test_echo_writes_submitted_line() {
        let prompt = ScriptedPrompt::new(vec![PromptStep::Line("hi"), PromptStep::Eof]);
        let sink = SharedSink::default();
        let echo = SharedDisplay::default();
        let session = Session::builder()
            .filter("text")
            .echo(Box::new(echo.clone()))
            .build(
                Box::new(ScriptedSource::silent()),
                Box::new(sink.clone()),
                Box::new(prompt),
                Box::new(SharedDisplay::default()),
            )
            .unwrap();

        let result = timeout(Duration::from_secs(5), session.run()).await.unwrap();
        assert!(result.is_ok());
        assert_eq!(echo.collected(), vec!["> hi"]);
        assert_eq!(&*sink.written.lock().unwrap(), b"hi\n");
    }

    #[tokio::test]
    async fn test_unknown_filter_fails_at_build() {
        let result = Session::builder().filter("no-such-filter").build(
            Box::new(ScriptedSource::silent()),
            Box::new(SharedSink::default()),
            Box::new(ScriptedPrompt::silent()),
            Box::new(SharedDisplay::default()),
        );
        assert!(result.is_err());
    }

    #[tokio::test]
    async fn test_extra_args_reach_the_filter() {
        let source = ScriptedSource::new(vec![
            ReadStep::Chunk(b"a;b;"),
            ReadStep::Disconnect,
        ]);
        let display = SharedDisplay::default();
        let session = Session::builder()
            .filter("text")
            .extra_arg("delimiter", ";")
            .build(
                Box::new(source),
                Box::new(SharedSink::default()),
                Box::new(ScriptedPrompt::silent()),
                Box::new(display.clone()),
            )
            .unwrap();

        let _ = timeout(Duration::from_secs(5), session.run()).await.unwrap();
        assert_eq!(display.collected(), vec!["a", "b"]);
    }
}
