//! Errors raised while submitting a command or streaming its progress.

use std::time::Duration;

use tokio_tungstenite::tungstenite;

/// Error type for command execution.
#[derive(thiserror::Error, Debug)]
pub enum ExecError {
    /// The submission request could not be sent or its response not read.
    #[error("request failed: {0}")]
    Request(#[source] reqwest::Error),

    /// The submission request exceeded its overall timeout.
    #[error("request timed out after {0:?}")]
    RequestTimeout(Duration),

    /// The service answered the submission with a non-2xx status.
    #[error("service returned status {status}: {body}")]
    Status {
        status: reqwest::StatusCode,
        /// Leading part of the response body, whitespace trimmed.
        body: String,
    },

    #[error("invalid service URL: {0}")]
    InvalidUrl(#[from] url::ParseError),

    #[error("invalid origin header value: {0:?}")]
    InvalidOrigin(String),

    /// The channel could not be opened.
    #[error("failed to connect to WebSocket: {0}")]
    Connect(#[source] Box<tungstenite::Error>),

    #[error("WebSocket handshake timed out after {0:?}")]
    ConnectTimeout(Duration),

    /// The remote closed the channel with a non-numeric reason.
    #[error("{0}")]
    Remote(String),

    /// The remote closed the channel without any reason.
    #[error("websocket closed by unknown reason")]
    UnknownClose,

    /// The channel failed below the close handshake.
    #[error(transparent)]
    Transport(Box<tungstenite::Error>),

    /// The local cancellation signal fired.
    #[error("execution cancelled")]
    Cancelled,

    #[error("stream reader stopped without reporting a result")]
    ReaderStopped,
}

impl ExecError {
    /// Whether this error only reports a local cancellation.
    #[must_use]
    pub fn is_cancelled(&self) -> bool {
        matches!(self, Self::Cancelled)
    }

    /// Wrap a request error, classifying timeouts.
    pub(crate) fn from_request(err: reqwest::Error, timeout: Duration) -> Self {
        if err.is_timeout() {
            Self::RequestTimeout(timeout)
        } else {
            Self::Request(err)
        }
    }
}
