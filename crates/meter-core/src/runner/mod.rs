//! Acquisition of the usage screen under a pseudo-terminal.

pub mod process;
pub mod pty;

pub use process::kill_process_tree;
pub use pty::{PtyRunner, PtyRunnerConfig};
