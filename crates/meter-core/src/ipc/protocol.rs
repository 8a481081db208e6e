//! Control socket protocol
//!
//! Newline-delimited JSON (ndjson) over a Unix domain socket. One request
//! line, one reply line.

use std::path::PathBuf;

use anyhow::Result;
use serde::de::DeserializeOwned;
use serde::{Deserialize, Serialize};

/// Get the base runtime directory, preferring XDG_RUNTIME_DIR for security
pub fn state_dir() -> PathBuf {
    if let Ok(xdg) = std::env::var("XDG_RUNTIME_DIR") {
        PathBuf::from(xdg).join("claude-o-meter")
    } else {
        let uid = unsafe { libc::getuid() };
        PathBuf::from(format!("/tmp/claude-o-meter-{}", uid))
    }
}

/// Get the control socket path
pub fn socket_path() -> PathBuf {
    state_dir().join("control.sock")
}

/// Message from a client to the daemon
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
#[serde(tag = "type", rename_all = "snake_case")]
pub enum ClientMessage {
    /// Acquire fresh usage data as soon as possible
    RefreshNow,
}

/// Reply from the daemon
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
#[serde(tag = "type", rename_all = "snake_case")]
pub enum ServerMessage {
    /// `queued` is false when the request merged with one already pending
    RefreshAck { queued: bool },
    /// The request line could not be understood
    Error { message: String },
}

/// Encode a message as ndjson (JSON + newline)
pub fn encode<T: Serialize>(msg: &T) -> Result<Vec<u8>> {
    let mut json = serde_json::to_vec(msg)?;
    json.push(b'\n');
    Ok(json)
}

/// Decode a message from a JSON line
pub fn decode<T: DeserializeOwned>(line: &[u8]) -> Result<T> {
    Ok(serde_json::from_slice(line)?)
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_refresh_now_wire_format() {
        let encoded = encode(&ClientMessage::RefreshNow).unwrap();
        assert_eq!(encoded, b"{\"type\":\"refresh_now\"}\n".to_vec());
    }

    #[test]
    fn test_refresh_ack_wire_format() {
        let decoded: ServerMessage = decode(br#"{"type":"refresh_ack","queued":false}"#).unwrap();
        assert_eq!(decoded, ServerMessage::RefreshAck { queued: false });
    }

    #[test]
    fn test_unknown_message_is_rejected() {
        assert!(decode::<ClientMessage>(br#"{"type":"shutdown"}"#).is_err());
    }

    #[test]
    fn test_state_dir_default() {
        // Without XDG_RUNTIME_DIR, should use /tmp/claude-o-meter-UID
        temp_env::with_var_unset("XDG_RUNTIME_DIR", || {
            let dir = state_dir();
            let uid = unsafe { libc::getuid() };
            assert_eq!(dir, PathBuf::from(format!("/tmp/claude-o-meter-{}", uid)));
        });
    }

    #[test]
    fn test_socket_path_with_xdg() {
        temp_env::with_var("XDG_RUNTIME_DIR", Some("/run/user/1000"), || {
            assert_eq!(
                socket_path(),
                PathBuf::from("/run/user/1000/claude-o-meter/control.sock")
            );
        });
    }
}
