//! Configuration types.

use std::fmt;

use url::Url;

/// Path of the command submission resource.
pub const EXEC_PATH: &str = "/exec";

/// Path of the progress channel resource.
pub const EXEC_OUT_PATH: &str = "/exec/out";

/// Resolved address of a Wakamiti service.
///
/// `origin` is an access-control token echoed in the `Origin` header of both
/// the submission request and the channel handshake.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct Endpoint {
    host: String,
    port: u16,
    origin: String,
}

impl Endpoint {
    /// Create a new endpoint.
    #[must_use]
    pub fn new(host: impl Into<String>, port: u16, origin: impl Into<String>) -> Self {
        Self {
            host: host.into(),
            port,
            origin: origin.into(),
        }
    }

    #[must_use]
    pub fn host(&self) -> &str {
        &self.host
    }

    #[must_use]
    pub fn port(&self) -> u16 {
        self.port
    }

    #[must_use]
    pub fn origin(&self) -> &str {
        &self.origin
    }

    /// URL of the submission resource (`http://{host}:{port}/exec`).
    ///
    /// # Errors
    ///
    /// Returns an error if the host cannot form a valid URL.
    pub fn submit_url(&self) -> Result<Url, url::ParseError> {
        self.url("http", EXEC_PATH)
    }

    /// URL of the progress channel (`ws://{host}:{port}/exec/out`).
    ///
    /// # Errors
    ///
    /// Returns an error if the host cannot form a valid URL.
    pub fn stream_url(&self) -> Result<Url, url::ParseError> {
        self.url("ws", EXEC_OUT_PATH)
    }

    fn url(&self, scheme: &str, path: &str) -> Result<Url, url::ParseError> {
        Url::parse(&format!("{scheme}://{}:{}{path}", self.host, self.port))
    }
}

impl fmt::Display for Endpoint {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "{}:{}", self.host, self.port)
    }
}
