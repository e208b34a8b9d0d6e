//! Terminal output helpers.
//!
//! Progress lines go to stdout untouched so they can be piped; notices and
//! errors go to stderr, colored when stderr is a terminal.

use std::io::{self, Write};

use owo_colors::{OwoColorize, Stream};

/// Truncate a string to a maximum number of characters, adding ellipsis if truncated.
#[must_use]
pub fn truncate(s: &str, max_len: usize) -> String {
    if s.chars().count() <= max_len {
        s.to_string()
    } else if max_len <= 3 {
        "...".to_string()
    } else {
        let head: String = s.chars().take(max_len - 3).collect();
        format!("{head}...")
    }
}

/// Print a relayed progress line.
pub fn print_line(line: &str) {
    let mut stdout = io::stdout().lock();
    let _ = writeln!(stdout, "{line}");
    let _ = stdout.flush();
}

/// Print status information.
pub fn print_notice(message: &str) {
    eprintln!(
        "{}",
        message.if_supports_color(Stream::Stderr, |text| text.yellow())
    );
}

/// Print an error message.
pub fn print_error(message: &str) {
    eprintln!(
        "{}",
        message.if_supports_color(Stream::Stderr, |text| text.red())
    );
}
