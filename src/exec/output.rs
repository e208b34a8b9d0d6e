//! Destination for everything a run shows to the user.

use crate::display;

/// Receives relayed progress lines and user-facing messages.
pub trait OutputSink: Send {
    /// A progress line received from the service.
    fn line(&mut self, line: &str);

    /// Status information that is not an error.
    fn notice(&mut self, message: &str);

    /// An error report.
    fn error(&mut self, message: &str);
}

/// Writes progress lines to stdout and messages to stderr.
#[derive(Debug, Default, Clone, Copy)]
pub struct Console;

impl OutputSink for Console {
    fn line(&mut self, line: &str) {
        display::print_line(line);
    }

    fn notice(&mut self, message: &str) {
        display::print_notice(message);
    }

    fn error(&mut self, message: &str) {
        display::print_error(message);
    }
}
