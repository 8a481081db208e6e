//! Control socket listener for the daemon
//!
//! Accepts `refresh_now` requests and forwards them to the scheduler through
//! its coalescing [`RefreshHandle`].

use std::os::unix::fs::PermissionsExt;
use std::path::{Path, PathBuf};

use anyhow::{Context, Result};
use tokio::io::{AsyncBufReadExt, AsyncWriteExt, BufReader};
use tokio::net::{UnixListener, UnixStream};
use tokio::task::JoinHandle;

use super::protocol::{decode, encode, socket_path, ClientMessage, ServerMessage};
use crate::scheduler::RefreshHandle;

/// Running control socket; the socket file is removed on drop
pub struct IpcServer {
    path: PathBuf,
    accept_task: JoinHandle<()>,
}

impl IpcServer {
    /// Bind the default control socket
    pub async fn start(refresh: RefreshHandle) -> Result<Self> {
        Self::start_at(socket_path(), refresh).await
    }

    /// Bind a control socket at `path`
    pub async fn start_at(path: PathBuf, refresh: RefreshHandle) -> Result<Self> {
        if let Some(dir) = path.parent() {
            ensure_socket_dir(dir)?;
        }

        // Clean up stale socket
        if path.exists() {
            match UnixStream::connect(&path).await {
                Ok(_) => {
                    anyhow::bail!(
                        "Another claude-o-meter daemon is already running (socket {} is active)",
                        path.display()
                    );
                }
                Err(_) => {
                    std::fs::remove_file(&path).with_context(|| {
                        format!("Failed to remove stale socket: {}", path.display())
                    })?;
                }
            }
        }

        let listener = UnixListener::bind(&path)
            .with_context(|| format!("Failed to bind control socket: {}", path.display()))?;

        // Set socket permissions to owner-only
        std::fs::set_permissions(&path, std::fs::Permissions::from_mode(0o700))
            .context("Failed to set socket permissions")?;

        let accept_task = tokio::spawn(Self::accept_loop(listener, refresh));

        tracing::info!("Listening for refresh requests on {}", path.display());
        Ok(Self { path, accept_task })
    }

    pub fn path(&self) -> &Path {
        &self.path
    }

    async fn accept_loop(listener: UnixListener, refresh: RefreshHandle) {
        loop {
            match listener.accept().await {
                Ok((stream, _)) => {
                    let refresh = refresh.clone();
                    tokio::spawn(async move {
                        if let Err(e) = Self::handle_connection(stream, refresh).await {
                            tracing::debug!("IPC connection ended: {}", e);
                        }
                    });
                }
                Err(e) => {
                    tracing::warn!("IPC accept error: {}", e);
                }
            }
        }
    }

    /// Serve requests until the client closes its side
    async fn handle_connection(stream: UnixStream, refresh: RefreshHandle) -> Result<()> {
        let (reader, mut writer) = stream.into_split();
        let mut buf_reader = BufReader::new(reader);
        let mut line_buf = String::new();

        loop {
            line_buf.clear();
            if buf_reader.read_line(&mut line_buf).await? == 0 {
                return Ok(()); // EOF
            }
            let line = line_buf.trim_end();
            if line.is_empty() {
                continue;
            }

            let reply = match decode::<ClientMessage>(line.as_bytes()) {
                Ok(ClientMessage::RefreshNow) => {
                    let queued = refresh.request();
                    tracing::info!(
                        "Refresh requested via control socket{}",
                        if queued { "" } else { " (already pending)" }
                    );
                    ServerMessage::RefreshAck { queued }
                }
                Err(e) => {
                    tracing::debug!("Invalid IPC message {:?}: {}", line, e);
                    ServerMessage::Error {
                        message: format!("invalid request: {}", e),
                    }
                }
            };

            writer.write_all(&encode(&reply)?).await?;
            writer.flush().await?;
        }
    }
}

/// Ensure the socket directory exists with owner-only permissions
fn ensure_socket_dir(dir: &Path) -> Result<()> {
    // Check for symlink attack before creating
    if dir.exists() {
        let meta = std::fs::symlink_metadata(dir)
            .with_context(|| format!("Failed to read metadata for: {}", dir.display()))?;
        if meta.is_symlink() {
            anyhow::bail!(
                "Socket directory is a symlink (possible attack): {}",
                dir.display()
            );
        }
    }

    std::fs::create_dir_all(dir)
        .with_context(|| format!("Failed to create socket directory: {}", dir.display()))?;

    let metadata = std::fs::metadata(dir)
        .with_context(|| format!("Failed to read metadata for: {}", dir.display()))?;
    if !metadata.is_dir() {
        anyhow::bail!("Socket path parent is not a directory: {}", dir.display());
    }
    let mode = metadata.permissions().mode() & 0o777;
    if mode != 0o700 {
        std::fs::set_permissions(dir, std::fs::Permissions::from_mode(0o700))
            .with_context(|| format!("Failed to set permissions on: {}", dir.display()))?;
    }
    Ok(())
}

impl Drop for IpcServer {
    fn drop(&mut self) {
        self.accept_task.abort();
        let _ = std::fs::remove_file(&self.path);
    }
}
