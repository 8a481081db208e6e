use std::time::Duration;

use thiserror::Error;

/// Why an acquisition produced no usable output.
///
/// Authentication problems are not errors here: they are parsed into the
/// snapshot like any other CLI output.
#[derive(Debug, Error)]
pub enum AcquireError {
    /// The CLI could not be started (not installed, not executable)
    #[error("failed to start {command}: {reason}")]
    Spawn { command: String, reason: String },

    /// PTY allocation or I/O setup failed
    #[error("PTY setup failed: {0}")]
    Pty(String),

    /// Neither usage data nor an auth error appeared before the deadline
    #[error("command timed out after {timeout:?}")]
    Timeout { timeout: Duration, partial: String },

    /// The CLI exited unsuccessfully without printing usage data
    #[error("command exited with code {code} before printing usage data")]
    Exited { code: u32, partial: String },
}

impl AcquireError {
    /// Output captured before the failure, for debug logging
    pub fn partial_output(&self) -> Option<&str> {
        match self {
            AcquireError::Timeout { partial, .. } | AcquireError::Exited { partial, .. } => {
                Some(partial.as_str()).filter(|s| !s.is_empty())
            }
            _ => None,
        }
    }
}
