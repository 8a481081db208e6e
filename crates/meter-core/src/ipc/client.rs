//! Control socket client used by the `refresh` command.

use std::path::Path;
use std::time::Duration;

use anyhow::{Context, Result};
use tokio::io::{AsyncBufReadExt, AsyncWriteExt, BufReader};
use tokio::net::UnixStream;

use super::protocol::{decode, encode, socket_path, ClientMessage, ServerMessage};

/// How long to wait for the daemon's reply
const REPLY_TIMEOUT: Duration = Duration::from_secs(5);

/// Ask the running daemon to refresh now.
///
/// Returns whether a new refresh was queued (false: one was already pending).
pub async fn request_refresh() -> Result<bool> {
    request_refresh_at(&socket_path()).await
}

/// Same as [`request_refresh`] against an explicit socket path
pub async fn request_refresh_at(path: &Path) -> Result<bool> {
    let stream = UnixStream::connect(path).await.with_context(|| {
        format!(
            "Failed to connect to {} (is the daemon running with --listen?)",
            path.display()
        )
    })?;
    let (reader, mut writer) = stream.into_split();

    writer.write_all(&encode(&ClientMessage::RefreshNow)?).await?;
    writer.flush().await?;

    let mut line = String::new();
    let mut buf_reader = BufReader::new(reader);
    tokio::time::timeout(REPLY_TIMEOUT, buf_reader.read_line(&mut line))
        .await
        .context("Timed out waiting for daemon reply")?
        .context("Failed to read daemon reply")?;

    if line.is_empty() {
        anyhow::bail!("Daemon closed the connection without replying");
    }

    match decode::<ServerMessage>(line.trim_end().as_bytes())? {
        ServerMessage::RefreshAck { queued } => Ok(queued),
        ServerMessage::Error { message } => anyhow::bail!("Daemon rejected request: {}", message),
    }
}
