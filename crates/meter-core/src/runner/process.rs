//! Process tree termination.

use anyhow::{Context, Result};
use nix::errno::Errno;
use nix::sys::signal::{self, Signal};
use nix::unistd::Pid;

/// SIGKILL the process group led by `pid`.
///
/// The PTY child is a session leader, so its pid is also its process group id
/// and this takes down every helper it spawned. Safe to call repeatedly: a
/// group that no longer exists is not an error.
pub fn kill_process_tree(pid: u32) -> Result<()> {
    if pid == 0 || pid > i32::MAX as u32 {
        return Ok(());
    }

    match signal::killpg(Pid::from_raw(pid as i32), Signal::SIGKILL) {
        Ok(()) | Err(Errno::ESRCH) => Ok(()),
        Err(e) => Err(e).with_context(|| format!("Failed to kill process group {}", pid)),
    }
}
