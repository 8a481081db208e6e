//! Terminal control sequence removal for captured PTY output.

use once_cell::sync::Lazy;
use regex::Regex;

// OSC first: its payload may contain bytes the CSI/two-byte rules would eat.
static OSC_RE: Lazy<Regex> =
    Lazy::new(|| Regex::new(r"\x1b\][^\x07\x1b]*(?:\x07|\x1b\\)").expect("Invalid OSC regex"));
static ESC_RE: Lazy<Regex> = Lazy::new(|| {
    Regex::new(r"\x1b(?:\[[0-?]*[ -/]*[@-~]|[@-Z\\-_])").expect("Invalid escape regex")
});

/// Strip ANSI/VT escape sequences and normalize line endings.
///
/// Idempotent: the output contains no ESC-introduced sequences and no `\r`.
pub fn strip_ansi(input: &str) -> String {
    let mut plain = OSC_RE.replace_all(input, "").into_owned();
    // Removing one sequence can splice a stray ESC onto the next one.
    while ESC_RE.is_match(&plain) {
        plain = ESC_RE.replace_all(&plain, "").into_owned();
    }
    plain.replace("\r\n", "\n").replace('\r', "\n")
}
