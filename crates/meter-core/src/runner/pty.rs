//! PTY runner for the usage CLI
//!
//! The CLI only renders its usage screen on a terminal and never exits on its
//! own, so it runs under a pseudo-terminal while a reader thread collects the
//! output. The buffer is polled for a completion marker and the whole process
//! group is killed once one is seen (or the deadline passes).

use parking_lot::Mutex;
use portable_pty::{native_pty_system, Child, ChildKiller, CommandBuilder, MasterPty, PtySize};
use std::io::{Read, Write};
use std::path::PathBuf;
use std::sync::Arc;
use std::thread::{self, JoinHandle};
use std::time::{Duration, Instant};
use tracing::{debug, warn};

use super::process::kill_process_tree;
use crate::error::AcquireError;
use crate::usage::{has_quota_marker, strip_ansi, UsageParser};

/// PTY runner configuration
#[derive(Debug, Clone)]
pub struct PtyRunnerConfig {
    /// Command to run
    pub command: String,
    /// Arguments
    pub args: Vec<String>,
    /// Working directory for the child
    pub working_dir: PathBuf,
    /// Hard deadline for the whole acquisition
    pub timeout: Duration,
    /// How often the output buffer is checked
    pub poll_interval: Duration,
    /// Grace period after a marker so the frame can finish rendering
    pub settle_delay: Duration,
    /// Mirror raw child output to stderr
    pub tee_output: bool,
    /// PTY rows
    pub rows: u16,
    /// PTY columns
    pub cols: u16,
}

impl Default for PtyRunnerConfig {
    fn default() -> Self {
        Self {
            command: "claude".to_string(),
            args: vec!["/usage".to_string()],
            working_dir: PathBuf::from("/tmp"),
            timeout: Duration::from_secs(30),
            poll_interval: Duration::from_millis(500),
            settle_delay: Duration::from_millis(300),
            tee_output: false,
            rows: 50,
            cols: 120,
        }
    }
}

/// What ended the wait early
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
enum Completion {
    Usage,
    AuthError,
}

/// Runs the usage CLI under a PTY and returns its raw output
pub struct PtyRunner {
    config: PtyRunnerConfig,
    parser: Arc<UsageParser>,
}

impl PtyRunner {
    pub fn new(config: PtyRunnerConfig, parser: Arc<UsageParser>) -> Self {
        Self { config, parser }
    }

    pub fn config(&self) -> &PtyRunnerConfig {
        &self.config
    }

    /// Run the CLI once.
    ///
    /// Returns the raw (un-normalized) output. Every path out of this function
    /// kills the child's process group.
    pub async fn run(&self) -> Result<String, AcquireError> {
        let mut session = self.spawn()?;
        let result = self.wait_for_completion(&mut session).await;

        session.kill();
        if tokio::task::spawn_blocking(move || session.shutdown())
            .await
            .is_err()
        {
            warn!("PTY cleanup task panicked");
        }

        result
    }

    fn spawn(&self) -> Result<PtySession, AcquireError> {
        let pty_system = native_pty_system();
        let pair = pty_system
            .openpty(PtySize {
                rows: self.config.rows,
                cols: self.config.cols,
                pixel_width: 0,
                pixel_height: 0,
            })
            .map_err(|e| AcquireError::Pty(format!("{:#}", e)))?;

        let mut cmd = CommandBuilder::new(&self.config.command);
        cmd.args(&self.config.args);
        cmd.cwd(&self.config.working_dir);
        cmd.env("TERM", "xterm-256color");

        // The child becomes a session leader, so its pid doubles as the pgid
        let mut child = pair
            .slave
            .spawn_command(cmd)
            .map_err(|e| AcquireError::Spawn {
                command: self.config.command.clone(),
                reason: format!("{:#}", e),
            })?;
        // Keep only the child's copy of the slave so reads hit EOF on exit
        drop(pair.slave);

        let pid = child.process_id().unwrap_or(0);
        debug!("Spawned {} with PID {}", self.config.command, pid);

        let mut master_reader = match pair.master.try_clone_reader() {
            Ok(reader) => reader,
            Err(e) => {
                reap_child(pid, &mut child);
                return Err(AcquireError::Pty(format!("{:#}", e)));
            }
        };

        let buffer = Arc::new(Mutex::new(Vec::with_capacity(16 * 1024)));
        let sink = buffer.clone();
        let tee = self.config.tee_output;
        let reader = thread::spawn(move || {
            let mut stderr = std::io::stderr();
            let mut buf = [0u8; 4096];

            loop {
                match master_reader.read(&mut buf) {
                    Ok(0) => break, // EOF
                    Ok(n) => {
                        sink.lock().extend_from_slice(&buf[..n]);
                        if tee {
                            let _ = stderr.write_all(&buf[..n]);
                            let _ = stderr.flush();
                        }
                    }
                    Err(e) if e.kind() == std::io::ErrorKind::Interrupted => continue,
                    Err(e) => {
                        // EIO once the slave side is gone
                        debug!("PTY read ended: {}", e);
                        break;
                    }
                }
            }
        });

        Ok(PtySession {
            pid,
            child,
            buffer,
            reader: Some(reader),
            _master: pair.master,
        })
    }

    async fn wait_for_completion(&self, session: &mut PtySession) -> Result<String, AcquireError> {
        let deadline = tokio::time::Instant::now() + self.config.timeout;
        let mut ticker = tokio::time::interval(self.config.poll_interval);
        ticker.set_missed_tick_behavior(tokio::time::MissedTickBehavior::Delay);

        loop {
            tokio::select! {
                _ = tokio::time::sleep_until(deadline) => {
                    session.kill();
                    let output = session.output();
                    // Last chance: the marker may have landed between polls
                    if let Some(completion) = self.probe(&output) {
                        debug!("{:?} found at deadline", completion);
                        return Ok(output);
                    }
                    return Err(AcquireError::Timeout {
                        timeout: self.config.timeout,
                        partial: output,
                    });
                }
                _ = ticker.tick() => {
                    let completion = self.probe(&session.output());
                    if let Some(completion) = completion {
                        debug!("{:?} detected, settling for {:?}", completion, self.config.settle_delay);
                        tokio::time::sleep(self.config.settle_delay).await;
                        session.kill();
                        return Ok(session.output());
                    }

                    if let Some(code) = session.exit_code() {
                        session.drain_reader(Duration::from_millis(500)).await;
                        let output = session.output();
                        if self.probe(&output).is_some() || code == 0 {
                            return Ok(output);
                        }
                        return Err(AcquireError::Exited { code, partial: output });
                    }
                }
            }
        }
    }

    /// Check the accumulated output for usage data or an auth error
    fn probe(&self, raw: &str) -> Option<Completion> {
        let text = strip_ansi(raw);
        if has_quota_marker(&text) {
            Some(Completion::Usage)
        } else if self.parser.detect_auth_error(&text).is_some() {
            Some(Completion::AuthError)
        } else {
            None
        }
    }
}

/// A running child under a PTY
struct PtySession {
    pid: u32,
    child: Box<dyn Child + Send + Sync>,
    buffer: Arc<Mutex<Vec<u8>>>,
    reader: Option<JoinHandle<()>>,
    _master: Box<dyn MasterPty + Send>,
}

impl PtySession {
    fn output(&self) -> String {
        String::from_utf8_lossy(&self.buffer.lock()).into_owned()
    }

    /// Exit code if the child has already exited
    fn exit_code(&mut self) -> Option<u32> {
        match self.child.try_wait() {
            Ok(Some(status)) => Some(status.exit_code()),
            Ok(None) => None,
            Err(e) => {
                debug!("try_wait failed for PID {}: {}", self.pid, e);
                None
            }
        }
    }

    fn kill(&self) {
        if let Err(e) = kill_process_tree(self.pid) {
            warn!("{:#}", e);
        }
    }

    /// Give the reader a moment to pick up output written just before exit
    async fn drain_reader(&mut self, limit: Duration) {
        let start = Instant::now();
        while let Some(reader) = &self.reader {
            if reader.is_finished() || start.elapsed() >= limit {
                break;
            }
            tokio::time::sleep(Duration::from_millis(10)).await;
        }
    }

    /// Reap the child and join the reader (blocking)
    fn shutdown(mut self) {
        let _ = self.child.kill();
        let _ = self.child.wait();
        if let Some(reader) = self.reader.take() {
            join_thread_with_timeout(reader, Duration::from_secs(1));
        }
    }
}

/// Kill the child's group and wait for it, for spawns abandoned half-way
fn reap_child(pid: u32, child: &mut Box<dyn Child + Send + Sync>) {
    if let Err(e) = kill_process_tree(pid) {
        warn!("{:#}", e);
    }
    let _ = child.kill();
    let _ = child.wait();
}

/// Join a thread with a timeout, abandoning it if it doesn't finish in time
fn join_thread_with_timeout<T>(handle: JoinHandle<T>, timeout: Duration) {
    let start = Instant::now();
    loop {
        if handle.is_finished() {
            let _ = handle.join();
            return;
        }
        if start.elapsed() >= timeout {
            debug!("Reader join timed out, abandoning thread");
            return;
        }
        thread::sleep(Duration::from_millis(10));
    }
}
