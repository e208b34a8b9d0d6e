//! Streaming session over the progress channel.
//!
//! A session opens the WebSocket channel of one submitted command, relays
//! every non-blank text frame as an output line and learns the command's
//! result from the close frame.
//!
//! # Lifecycle
//!
//! ```text
//! Connecting --> Streaming --> Closed
//!     |              |
//!     |              +--> Stopping --> Closed | Failed
//!     +--> Failed
//! ```
//!
//! A background task owns the read half of the channel and hands lines and
//! the final [`Outcome`] to the control loop, which also watches the
//! cancellation token. When the token fires the loop sends a single `STOP`
//! frame and waits a bounded time for the service to close the channel.
//!
//! There is no idle timeout while streaming: a silent service keeps the
//! session waiting until it closes the channel or the token fires.

use std::time::Duration;

use futures_util::stream::Stream;
use futures_util::{Sink, SinkExt, StreamExt};
use tokio::net::TcpStream;
use tokio::sync::mpsc;
use tokio_tungstenite::tungstenite::client::IntoClientRequest;
use tokio_tungstenite::tungstenite::handshake::client::Request;
use tokio_tungstenite::tungstenite::http::header::ORIGIN;
use tokio_tungstenite::tungstenite::http::HeaderValue;
use tokio_tungstenite::tungstenite::{Error as WsError, Message};
use tokio_tungstenite::{connect_async, MaybeTlsStream, WebSocketStream};
use tokio_util::sync::CancellationToken;
use url::Url;

use crate::config::Endpoint;
use crate::display;

use super::{
    decode, ClosureSignal, ExecError, Outcome, OutputSink, SessionState, SessionStateMachine,
    SessionStats,
};

/// Timeout for a single channel handshake.
pub const DEFAULT_HANDSHAKE_TIMEOUT: Duration = Duration::from_secs(10);

/// How long to wait for the service to close the channel after `STOP`.
pub const DEFAULT_STOP_TIMEOUT: Duration = Duration::from_secs(3);

/// Delays before each retry of a rejected handshake.
pub const DEFAULT_CONNECT_BACKOFF: [Duration; 3] = [
    Duration::from_millis(100),
    Duration::from_millis(250),
    Duration::from_millis(500),
];

/// Text frame asking the service to stop the command.
pub const STOP_FRAME: &str = "STOP";

/// Shown when the stop request is sent.
pub const STOP_NOTICE: &str =
    "> Stop request sent. The application will stop when the server closes the session.";

/// Upper bound for sending `STOP` and for closing the write half.
const CLOSE_TIMEOUT: Duration = Duration::from_millis(500);

const READER_CHANNEL_BUFFER: usize = 64;

type WsStream = WebSocketStream<MaybeTlsStream<TcpStream>>;

/// Tunables of a streaming session.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct SessionOptions {
    pub handshake_timeout: Duration,
    pub connect_backoff: Vec<Duration>,
    pub stop_timeout: Duration,
}

impl Default for SessionOptions {
    fn default() -> Self {
        Self {
            handshake_timeout: DEFAULT_HANDSHAKE_TIMEOUT,
            connect_backoff: DEFAULT_CONNECT_BACKOFF.to_vec(),
            stop_timeout: DEFAULT_STOP_TIMEOUT,
        }
    }
}

/// What the reader task reports to the control loop.
#[derive(Debug)]
enum ReaderEvent {
    Line(String),
    Closed(Outcome),
}

/// One live progress channel.
pub struct StreamingSession {
    endpoint: Endpoint,
    cancel: CancellationToken,
    options: SessionOptions,
    state: SessionStateMachine,
}

impl StreamingSession {
    /// Create a session for `endpoint` observing `cancel`.
    #[must_use]
    pub fn new(endpoint: Endpoint, cancel: CancellationToken) -> Self {
        Self {
            endpoint,
            cancel,
            options: SessionOptions::default(),
            state: SessionStateMachine::new(),
        }
    }

    /// Override the session tunables.
    #[must_use]
    pub fn with_options(mut self, options: SessionOptions) -> Self {
        self.options = options;
        self
    }

    #[must_use]
    pub fn state(&self) -> SessionState {
        self.state.state()
    }

    #[must_use]
    pub fn stats(&self) -> SessionStats {
        self.state.stats()
    }

    /// Run the session to completion.
    ///
    /// Returns the command's exit code when the service reported one, or
    /// exit code 1 with the error that prevented learning it.
    pub async fn run(&mut self, output: &mut dyn OutputSink) -> Outcome {
        self.state.transition(SessionState::Connecting);

        let stream = match self.connect().await {
            Ok(stream) => stream,
            Err(err) => {
                tracing::debug!(error = %err, "Channel could not be opened");
                self.state.transition(SessionState::Failed);
                return Outcome::failed(err);
            }
        };
        self.state.transition(SessionState::Streaming);

        let (mut sink, source) = stream.split();
        let (events_tx, mut events_rx) = mpsc::channel(READER_CHANNEL_BUFFER);
        let reader = tokio::spawn(read_frames(source, events_tx));
        let cancel = self.cancel.clone();

        let outcome = loop {
            let event = tokio::select! {
                biased;

                event = events_rx.recv() => event,
                () = cancel.cancelled() => {
                    break self.stop(&mut sink, &mut events_rx, output).await;
                }
            };

            match event {
                Some(ReaderEvent::Line(line)) => self.relay(output, &line),
                Some(ReaderEvent::Closed(outcome)) => {
                    self.state.transition(SessionState::Closed);
                    break outcome;
                }
                None => {
                    self.state.transition(SessionState::Failed);
                    break Outcome::failed(ExecError::ReaderStopped);
                }
            }
        };

        reader.abort();
        close_quietly(&mut sink).await;
        debug_assert!(self.state.state().is_terminal());

        tracing::info!(
            exit_code = outcome.exit_code,
            lines = self.state.stats().lines_relayed,
            state = ?self.state.state(),
            "Session finished"
        );
        outcome
    }

    /// Open the channel, retrying rejected handshakes.
    async fn connect(&mut self) -> Result<WsStream, ExecError> {
        let url = self.endpoint.stream_url()?;
        let mut backoff = self.options.connect_backoff.clone().into_iter();

        loop {
            self.state.record_connect_attempt();
            let attempt = self.state.stats().connect_attempts;
            let request = self.handshake_request(&url)?;

            tracing::debug!(%url, attempt, "Opening channel");

            let result = tokio::select! {
                biased;

                () = self.cancel.cancelled() => return Err(ExecError::Cancelled),
                result = tokio::time::timeout(self.options.handshake_timeout, connect_async(request)) => result,
            };

            let err = match result {
                Ok(Ok((stream, response))) => {
                    tracing::debug!(status = %response.status(), attempt, "Channel open");
                    return Ok(stream);
                }
                Ok(Err(err)) => err,
                Err(_) => return Err(ExecError::ConnectTimeout(self.options.handshake_timeout)),
            };

            // Only a rejected upgrade is worth retrying.
            let rejected = matches!(err, WsError::Http(_));
            let Some(delay) = backoff.next().filter(|_| rejected) else {
                return Err(ExecError::Connect(Box::new(err)));
            };

            tracing::warn!(attempt, error = %err, ?delay, "Handshake rejected, retrying");

            tokio::select! {
                biased;

                () = self.cancel.cancelled() => return Err(ExecError::Cancelled),
                () = tokio::time::sleep(delay) => {}
            }
        }
    }

    fn handshake_request(&self, url: &Url) -> Result<Request, ExecError> {
        let mut request = url
            .as_str()
            .into_client_request()
            .map_err(|e| ExecError::Connect(Box::new(e)))?;

        let origin = HeaderValue::from_str(self.endpoint.origin())
            .map_err(|_| ExecError::InvalidOrigin(self.endpoint.origin().to_string()))?;
        request.headers_mut().insert(ORIGIN, origin);

        Ok(request)
    }

    /// Ask the service to stop and wait for it to close the channel.
    async fn stop<Si>(
        &mut self,
        sink: &mut Si,
        events_rx: &mut mpsc::Receiver<ReaderEvent>,
        output: &mut dyn OutputSink,
    ) -> Outcome
    where
        Si: Sink<Message, Error = WsError> + Unpin,
    {
        self.state.transition(SessionState::Stopping);
        output.notice(STOP_NOTICE);

        let stop_frame = Message::Text(STOP_FRAME.into());
        match tokio::time::timeout(CLOSE_TIMEOUT, sink.send(stop_frame)).await {
            Ok(Ok(())) => tracing::info!("Stop request sent"),
            Ok(Err(e)) => tracing::warn!(error = %e, "Failed to send stop request"),
            Err(_) => tracing::warn!("Sending stop request timed out"),
        }

        let stop_timeout = self.options.stop_timeout;
        let waited = tokio::time::timeout(stop_timeout, async {
            while let Some(event) = events_rx.recv().await {
                match event {
                    ReaderEvent::Line(line) => self.relay(output, &line),
                    ReaderEvent::Closed(outcome) => return Some(outcome),
                }
            }
            None
        })
        .await;

        match waited {
            Ok(Some(outcome)) => {
                self.state.transition(SessionState::Closed);
                outcome
            }
            Ok(None) => {
                self.state.transition(SessionState::Failed);
                Outcome::failed(ExecError::ReaderStopped)
            }
            Err(_) => {
                tracing::warn!(?stop_timeout, "Service did not close the channel after stop request");
                self.state.transition(SessionState::Failed);
                Outcome::failed(ExecError::Cancelled)
            }
        }
    }

    fn relay(&mut self, output: &mut dyn OutputSink, line: &str) {
        self.state.record_line();
        output.line(line);
    }
}

/// Read frames until the channel ends, forwarding non-blank text.
async fn read_frames<S>(mut source: S, events: mpsc::Sender<ReaderEvent>)
where
    S: Stream<Item = Result<Message, WsError>> + Unpin,
{
    let signal = loop {
        let text = match source.next().await {
            Some(Ok(Message::Text(text))) => text,
            Some(Ok(Message::Binary(data))) => String::from_utf8_lossy(&data).into_owned(),
            Some(Ok(Message::Close(frame))) => break ClosureSignal::from_frame(frame),
            Some(Ok(_)) => continue,
            Some(Err(err)) => break ClosureSignal::Transport(err),
            None => break ClosureSignal::Transport(WsError::ConnectionClosed),
        };

        let line = text.trim();
        if line.is_empty() {
            continue;
        }
        tracing::trace!(frame = %display::truncate(line, 80), "Frame received");
        if events.send(ReaderEvent::Line(line.to_string())).await.is_err() {
            return;
        }
    };

    tracing::debug!(?signal, "Channel ended");
    let _ = events.send(ReaderEvent::Closed(decode(signal))).await;
}

async fn close_quietly<Si>(sink: &mut Si)
where
    Si: Sink<Message, Error = WsError> + Unpin,
{
    match tokio::time::timeout(CLOSE_TIMEOUT, sink.close()).await {
        Ok(Ok(())) => {}
        Ok(Err(e)) => tracing::debug!(error = %e, "Channel close failed"),
        Err(_) => tracing::debug!("Channel close timed out"),
    }
}
