//! Submission followed by streaming, mapped to a process exit code.

use std::time::Duration;

use tokio_util::sync::CancellationToken;

use crate::config::Endpoint;

use super::{
    submit, Console, Outcome, OutputSink, SessionOptions, StreamingSession, DEFAULT_SUBMIT_TIMEOUT,
};

/// Exit code when the command could not be submitted.
pub const EXIT_SUBMIT_FAILED: i32 = 255;

/// Exit code when the progress stream failed.
pub const EXIT_STREAM_FAILED: i32 = 3;

/// Runs one command against a Wakamiti service.
#[derive(Debug, Clone)]
pub struct ExecRunner {
    endpoint: Endpoint,
    submit_timeout: Duration,
    session: SessionOptions,
}

impl ExecRunner {
    /// Create a runner with default timeouts.
    #[must_use]
    pub fn new(endpoint: Endpoint) -> Self {
        Self {
            endpoint,
            submit_timeout: DEFAULT_SUBMIT_TIMEOUT,
            session: SessionOptions::default(),
        }
    }

    /// Set the overall timeout of the submission request.
    #[must_use]
    pub fn with_submit_timeout(mut self, timeout: Duration) -> Self {
        self.submit_timeout = timeout;
        self
    }

    /// Set the streaming session tunables.
    #[must_use]
    pub fn with_session_options(mut self, options: SessionOptions) -> Self {
        self.session = options;
        self
    }

    #[must_use]
    pub fn endpoint(&self) -> &Endpoint {
        &self.endpoint
    }

    /// Submit `args` as one command and stream its progress.
    ///
    /// Returns the command's exit code, [`EXIT_SUBMIT_FAILED`] if it could
    /// not be submitted, or [`EXIT_STREAM_FAILED`] if the stream failed.
    /// Errors are reported through `output`, except those caused by `cancel`.
    pub async fn run(
        &self,
        args: &[String],
        cancel: CancellationToken,
        output: &mut dyn OutputSink,
    ) -> i32 {
        let command = args.join(" ");
        tracing::info!(endpoint = %self.endpoint, "Starting execution");

        if let Err(err) = submit(&self.endpoint, &command, self.submit_timeout).await {
            if err.is_cancelled() || cancel.is_cancelled() {
                tracing::debug!(error = %err, "Submission failed after cancellation");
            } else {
                output.error(&format!("Error starting execution: {err}"));
            }
            return EXIT_SUBMIT_FAILED;
        }

        let mut session = StreamingSession::new(self.endpoint.clone(), cancel)
            .with_options(self.session.clone());
        let outcome = session.run(output).await;

        if let Some(err) = outcome.error.as_ref().filter(|err| !err.is_cancelled()) {
            output.error(&format!("Stream error: {err}"));
        }
        exit_code(&outcome)
    }
}

/// Final exit code for a session outcome.
///
/// A stream error other than cancellation always yields
/// [`EXIT_STREAM_FAILED`], whatever code was decoded.
#[must_use]
pub fn exit_code(outcome: &Outcome) -> i32 {
    match &outcome.error {
        Some(err) if !err.is_cancelled() => EXIT_STREAM_FAILED,
        _ => outcome.exit_code,
    }
}

/// Run `args` against `endpoint`, writing to the terminal.
pub async fn run(endpoint: &Endpoint, args: &[String], cancel: CancellationToken) -> i32 {
    ExecRunner::new(endpoint.clone())
        .run(args, cancel, &mut Console)
        .await
}
