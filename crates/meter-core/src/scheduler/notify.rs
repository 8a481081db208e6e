//! Notification capability used by the threshold latch.

use std::future::Future;
use std::path::PathBuf;

/// Desktop notification settings
#[derive(Debug, Clone)]
pub struct NotifyConfig {
    /// Session used-percentage that triggers a notification (0 disables)
    pub threshold: f64,
    /// Display timeout in milliseconds; -1 lets the server decide, 0 never expires
    pub timeout_ms: i32,
    /// Icon path passed to the notification server
    pub icon: Option<PathBuf>,
}

impl Default for NotifyConfig {
    fn default() -> Self {
        Self {
            threshold: 0.0,
            timeout_ms: -1,
            icon: None,
        }
    }
}

/// Something that can show a notification to the user
pub trait Notifier {
    fn notify(
        &self,
        summary: &str,
        body: &str,
        icon: Option<&std::path::Path>,
        timeout_ms: i32,
    ) -> impl Future<Output = anyhow::Result<()>> + Send;
}
