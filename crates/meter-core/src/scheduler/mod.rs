//! Daemon scheduling: when to acquire, what to do with the result.

pub mod acquire;
pub mod daemon;
pub mod notify;
pub mod policy;

pub use acquire::{Acquire, CliAcquirer};
pub use daemon::{RefreshHandle, Scheduler, SchedulerConfig, Trigger};
pub use notify::{Notifier, NotifyConfig};
pub use policy::{reset_refresh_delay, IntervalPolicy, ThresholdLatch, DEFAULT_RETRY_INTERVAL};
