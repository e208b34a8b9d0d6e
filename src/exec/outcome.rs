//! Translation of channel closures into exit codes.
//!
//! The service reports the command's result in the close reason of the
//! progress channel. A numeric reason is the exit code, any other text is an
//! error raised on the service side, and an empty reason carries no
//! information. This module is the only place those rules live.

use std::borrow::Cow;

use tokio_tungstenite::tungstenite::protocol::frame::coding::CloseCode;
use tokio_tungstenite::tungstenite::protocol::CloseFrame;
use tokio_tungstenite::tungstenite::Error as WsError;

use super::ExecError;

/// Exit code used whenever the real result could not be learned.
pub const FAILURE_EXIT_CODE: i32 = 1;

/// Why the channel ended.
#[derive(Debug)]
pub enum ClosureSignal {
    /// The remote sent a close frame.
    Closed { code: u16, reason: String },
    /// The channel broke without a close frame.
    Transport(WsError),
}

impl ClosureSignal {
    /// Build a signal from a received close frame.
    ///
    /// A close frame without payload is treated as an empty reason.
    #[must_use]
    pub fn from_frame(frame: Option<CloseFrame<'_>>) -> Self {
        match frame {
            Some(frame) => Self::Closed {
                code: frame.code.into(),
                reason: frame.reason.into_owned(),
            },
            None => Self::Closed {
                code: CloseCode::Status.into(),
                reason: String::new(),
            },
        }
    }

    /// Build a close-frame signal, mainly for tests and logging.
    #[must_use]
    pub fn closed(code: u16, reason: impl Into<Cow<'static, str>>) -> Self {
        Self::Closed {
            code,
            reason: reason.into().into_owned(),
        }
    }
}

/// Result of a streaming session.
#[derive(Debug)]
pub struct Outcome {
    pub exit_code: i32,
    pub error: Option<ExecError>,
}

impl Outcome {
    /// The command finished and reported `exit_code`.
    #[must_use]
    pub fn exited(exit_code: i32) -> Self {
        Self {
            exit_code,
            error: None,
        }
    }

    /// The result could not be learned.
    #[must_use]
    pub fn failed(error: ExecError) -> Self {
        Self {
            exit_code: FAILURE_EXIT_CODE,
            error: Some(error),
        }
    }

    /// Whether the session ended because of a local cancellation.
    #[must_use]
    pub fn is_cancelled(&self) -> bool {
        self.error.as_ref().is_some_and(ExecError::is_cancelled)
    }
}

/// Decode a closure signal into an outcome.
#[must_use]
pub fn decode(signal: ClosureSignal) -> Outcome {
    match signal {
        ClosureSignal::Transport(err) => Outcome::failed(ExecError::Transport(Box::new(err))),
        ClosureSignal::Closed { code, reason } => {
            let reason = reason.trim();
            if let Ok(exit_code) = reason.parse::<i32>() {
                return Outcome::exited(exit_code);
            }
            if reason.is_empty() {
                tracing::debug!(code, "Channel closed without reason");
                Outcome::failed(ExecError::UnknownClose)
            } else {
                Outcome::failed(ExecError::Remote(reason.to_string()))
            }
        }
    }
}
