//! Command execution against a Wakamiti service.
//!
//! A run has two steps:
//!
//! ```text
//! CLI                              Service
//!  |                                  |
//!  |-- POST /exec (command text) ---->|  submission
//!  |<-------------- 2xx --------------|
//!  |                                  |
//!  |== WS /exec/out =================>|  streaming session
//!  |<------------ progress lines -----|
//!  |------------- STOP (on cancel) -->|
//!  |<------------ close(reason) ------|
//! ```
//!
//! The close reason carries the command's exit code; see [`decode`].

mod error;
mod outcome;
mod output;
mod runner;
mod session;
mod state;
mod submit;

pub use error::*;
pub use outcome::*;
pub use output::*;
pub use runner::*;
pub use session::*;
pub use state::*;
pub use submit::*;
