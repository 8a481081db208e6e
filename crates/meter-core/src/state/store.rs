//! Atomic JSON state file.
//!
//! Consumers poll the file at high frequency, so every write goes through a
//! temp file and a rename. A missing file means the daemon has not finished
//! its first acquisition yet.

use anyhow::{Context, Result};
use std::fs::{self, OpenOptions};
use std::io::Write;
use std::path::{Path, PathBuf};
use std::time::Duration;

use crate::usage::UsageSnapshot;

/// Reader/writer for the published snapshot
#[derive(Debug, Clone)]
pub struct StateStore {
    path: PathBuf,
}

impl StateStore {
    pub fn new(path: impl Into<PathBuf>) -> Self {
        Self { path: path.into() }
    }

    /// Get the path to the state file
    pub fn path(&self) -> &Path {
        &self.path
    }

    fn temp_path(&self) -> PathBuf {
        let mut name = self.path.as_os_str().to_owned();
        name.push(".tmp");
        PathBuf::from(name)
    }

    /// Write snapshot to file
    ///
    /// The temp file is created with O_CREAT|O_EXCL and fsynced before the
    /// rename, so readers see either the old or the new document.
    pub fn write(&self, snapshot: &UsageSnapshot) -> Result<()> {
        let json =
            serde_json::to_string_pretty(snapshot).context("Failed to serialize snapshot")?;

        if let Some(parent) = self.path.parent().filter(|p| !p.as_os_str().is_empty()) {
            fs::create_dir_all(parent)
                .with_context(|| format!("Failed to create state directory: {:?}", parent))?;
        }

        let temp_path = self.temp_path();

        // Leftover from a write that died before the rename
        let _ = fs::remove_file(&temp_path);

        let mut file = OpenOptions::new()
            .write(true)
            .create_new(true)
            .open(&temp_path)
            .with_context(|| format!("Failed to create temp state file: {:?}", temp_path))?;

        let result = file
            .write_all(json.as_bytes())
            .with_context(|| format!("Failed to write temp state file: {:?}", temp_path))
            .and_then(|()| {
                file.sync_all()
                    .with_context(|| format!("Failed to sync temp state file: {:?}", temp_path))
            })
            .and_then(|()| {
                fs::rename(&temp_path, &self.path)
                    .with_context(|| format!("Failed to rename state file: {:?}", self.path))
            });

        if result.is_err() {
            let _ = fs::remove_file(&temp_path);
        }
        result
    }

    /// Read snapshot from file
    pub fn read(&self) -> Result<UsageSnapshot> {
        let content = fs::read_to_string(&self.path)
            .with_context(|| format!("Failed to read state file: {:?}", self.path))?;

        serde_json::from_str(&content)
            .with_context(|| format!("Failed to parse state file: {:?}", self.path))
    }

    /// Check if state file exists
    pub fn exists(&self) -> bool {
        self.path.exists()
    }

    /// Wait until the daemon has published a snapshot, then read it
    pub async fn wait_for(&self, poll: Duration) -> Result<UsageSnapshot> {
        while !self.exists() {
            tracing::debug!("Waiting for state file {:?}", self.path);
            tokio::time::sleep(poll).await;
        }
        self.read()
    }
}
