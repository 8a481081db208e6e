//! Desktop notifications through `notify-send`.

use anyhow::{Context, Result};
use std::ffi::OsString;
use std::path::Path;
use tokio::process::Command;

use meter_core::scheduler::Notifier;

const APP_NAME: &str = "claude-o-meter";

/// Sends notifications to the freedesktop notification server
#[derive(Debug, Clone)]
pub struct DesktopNotifier {
    program: OsString,
}

impl DesktopNotifier {
    pub fn new() -> Self {
        Self {
            program: OsString::from("notify-send"),
        }
    }
}

impl Default for DesktopNotifier {
    fn default() -> Self {
        Self::new()
    }
}

impl Notifier for DesktopNotifier {
    async fn notify(
        &self,
        summary: &str,
        body: &str,
        icon: Option<&Path>,
        timeout_ms: i32,
    ) -> Result<()> {
        let args = notify_send_args(summary, body, icon, timeout_ms);
        let output = Command::new(&self.program)
            .args(&args)
            .output()
            .await
            .context("Failed to run notify-send")?;

        if !output.status.success() {
            anyhow::bail!(
                "notify-send exited with {}: {}",
                output.status,
                String::from_utf8_lossy(&output.stderr).trim()
            );
        }
        Ok(())
    }
}

/// `-t` is left out for -1 so the server applies its own default
fn notify_send_args(
    summary: &str,
    body: &str,
    icon: Option<&Path>,
    timeout_ms: i32,
) -> Vec<OsString> {
    let mut args: Vec<OsString> = vec!["--app-name".into(), APP_NAME.into()];
    if let Some(icon) = icon {
        args.push("--icon".into());
        args.push(icon.as_os_str().to_owned());
    }
    if timeout_ms >= 0 {
        args.push("--expire-time".into());
        args.push(timeout_ms.to_string().into());
    }
    args.push(summary.into());
    args.push(body.into());
    args
}

#[cfg(test)]
mod tests {
    use super::*;
    use pretty_assertions::assert_eq;

    #[test]
    fn test_server_default_timeout_is_omitted() {
        let args = notify_send_args("Claude Usage High", "Session usage at 85%", None, -1);
        assert_eq!(
            args,
            vec![
                OsString::from("--app-name"),
                OsString::from("claude-o-meter"),
                OsString::from("Claude Usage High"),
                OsString::from("Session usage at 85%"),
            ]
        );
    }

    #[test]
    fn test_icon_and_never_expire() {
        let args = notify_send_args("s", "b", Some(Path::new("/usr/share/icons/claude.svg")), 0);
        assert_eq!(
            args[2..6].to_vec(),
            vec![
                OsString::from("--icon"),
                OsString::from("/usr/share/icons/claude.svg"),
                OsString::from("--expire-time"),
                OsString::from("0"),
            ]
        );
    }

    #[tokio::test]
    async fn test_missing_binary_is_an_error() {
        let notifier = DesktopNotifier {
            program: OsString::from("claude-o-meter-no-such-notifier"),
        };
        assert!(notifier.notify("s", "b", None, -1).await.is_err());
    }
}
