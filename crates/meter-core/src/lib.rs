//! Core of claude-o-meter: acquire the `claude /usage` screen, parse it into a
//! [`usage::UsageSnapshot`] and keep a state file fresh for status-bar widgets.

pub mod error;
pub mod ipc;
pub mod runner;
pub mod scheduler;
pub mod state;
pub mod usage;

pub use error::AcquireError;
