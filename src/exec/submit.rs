//! Command submission over HTTP.

use std::time::Duration;

use reqwest::header::{CONTENT_TYPE, ORIGIN};
use reqwest::{Client, Response};

use crate::config::Endpoint;

use super::ExecError;

/// Overall timeout for the submission request.
pub const DEFAULT_SUBMIT_TIMEOUT: Duration = Duration::from_secs(15);

/// Connection timeout for the submission request.
const CONNECT_TIMEOUT: Duration = Duration::from_secs(5);

/// Maximum number of response body bytes kept for an error message.
pub const MAX_ERROR_BODY_BYTES: usize = 4096;

const TEXT_PLAIN_UTF8: &str = "text/plain; charset=utf-8";

/// Build an HTTP client with proper timeout configuration.
fn build_http_client(timeout: Duration) -> Result<Client, ExecError> {
    Client::builder()
        .connect_timeout(CONNECT_TIMEOUT.min(timeout))
        .timeout(timeout)
        .build()
        .map_err(ExecError::Request)
}

/// Send `command` to the service's submission resource.
///
/// Succeeds on any 2xx status. The service starts the command
/// asynchronously; its progress is read from the streaming session.
///
/// # Errors
///
/// Returns an error if the service cannot be reached, the request times out,
/// or the service answers with a non-2xx status. In the last case the error
/// carries at most [`MAX_ERROR_BODY_BYTES`] of the response body.
pub async fn submit(endpoint: &Endpoint, command: &str, timeout: Duration) -> Result<(), ExecError> {
    let url = endpoint.submit_url()?;
    let client = build_http_client(timeout)?;

    tracing::debug!(%url, bytes = command.len(), "Submitting command");

    let response = client
        .post(url)
        .header(CONTENT_TYPE, TEXT_PLAIN_UTF8)
        .header(ORIGIN, endpoint.origin())
        .body(command.to_owned())
        .send()
        .await
        .map_err(|e| ExecError::from_request(e, timeout))?;

    let status = response.status();
    if status.is_success() {
        tracing::info!(%status, "Command accepted");
        return Ok(());
    }

    let body = read_body_prefix(response, MAX_ERROR_BODY_BYTES).await;
    tracing::warn!(%status, "Command rejected");
    Err(ExecError::Status { status, body })
}

/// Read at most `limit` bytes of the body; the rest is never read.
async fn read_body_prefix(mut response: Response, limit: usize) -> String {
    let mut buf = Vec::with_capacity(limit.min(1024));

    while buf.len() < limit {
        match response.chunk().await {
            Ok(Some(chunk)) => {
                let take = chunk.len().min(limit - buf.len());
                buf.extend_from_slice(&chunk[..take]);
            }
            Ok(None) => break,
            Err(e) => {
                tracing::debug!(error = %e, "Failed to read error response body");
                break;
            }
        }
    }

    String::from_utf8_lossy(&buf).trim().to_string()
}
