//! Subcommand implementations.

use anyhow::{Context, Result};
use chrono::Utc;
use serde::Serialize;
use std::process::ExitCode;
use std::sync::Arc;
use std::time::Duration;
use tokio::signal::unix::{signal, SignalKind};
use tracing::{info, warn};

use meter_core::ipc::{self, IpcServer};
use meter_core::runner::PtyRunner;
use meter_core::scheduler::{Acquire, CliAcquirer, Scheduler};
use meter_core::state::StateStore;
use meter_core::usage::{strip_ansi, UsageParser};

use crate::config::{DaemonArgs, HyprpanelArgs, QueryArgs, RefreshArgs, Settings};
use crate::hyprpanel::{self, HyprPanelOutput};
use crate::notifier::DesktopNotifier;

/// How often `hyprpanel` checks for a state file that does not exist yet
const STATE_FILE_POLL: Duration = Duration::from_millis(500);

/// Printed to stderr when a one-shot query fails
#[derive(Debug, Serialize)]
struct ErrorResponse {
    error: String,
    #[serde(skip_serializing_if = "String::is_empty")]
    details: String,
}

fn acquirer(settings: &Settings, tee_output: bool) -> CliAcquirer {
    let parser = Arc::new(UsageParser::new());
    let runner = PtyRunner::new(settings.runner_config(tee_output), parser.clone());
    CliAcquirer::new(runner, parser)
}

/// Query once and print the snapshot
pub async fn query(settings: &Settings, args: &QueryArgs) -> Result<ExitCode> {
    let acquirer = acquirer(settings, args.debug).with_raw_output(args.debug || args.raw);

    match acquirer.acquire().await {
        Ok(snapshot) => {
            if args.hyprpanel_json {
                let output = hyprpanel::format_output(&snapshot, Utc::now());
                println!("{}", serde_json::to_string(&output)?);
            } else {
                println!("{}", serde_json::to_string_pretty(&snapshot)?);
            }
            Ok(ExitCode::SUCCESS)
        }
        Err(e) => {
            if let Some(partial) = e.partial_output() {
                eprintln!("--- Raw CLI Output ---");
                eprintln!("{}", strip_ansi(partial));
                eprintln!("---");
            }

            // The panel shows the error instead of a failing module
            if args.hyprpanel_json {
                let output = hyprpanel::format_error(&e.to_string());
                println!("{}", serde_json::to_string(&output)?);
                return Ok(ExitCode::SUCCESS);
            }

            let response = ErrorResponse {
                error: "Failed to get usage data".to_string(),
                details: e.to_string(),
            };
            eprintln!("{}", serde_json::to_string_pretty(&response)?);
            Ok(ExitCode::FAILURE)
        }
    }
}

/// Run the scheduler until SIGINT/SIGTERM
pub async fn daemon(mut settings: Settings, args: &DaemonArgs) -> Result<ExitCode> {
    settings.merge_daemon_args(args);
    settings.validate()?;
    let output_file = settings.output_file()?;

    let scheduler = Scheduler::new(
        settings.scheduler_config(),
        acquirer(&settings, args.debug),
        DesktopNotifier::new(),
        StateStore::new(&output_file),
    );

    info!("Writing usage snapshots to {}", output_file.display());
    if settings.notify.threshold > 0 {
        info!(
            "Notifications enabled: threshold={}%, timeout={}ms, icon={}",
            settings.notify.threshold,
            settings.notify.timeout_ms,
            settings
                .notify
                .icon
                .as_ref()
                .map(|p| p.display().to_string())
                .unwrap_or_default()
        );
    }

    // Held for the lifetime of the scheduler; dropping removes the socket
    let _ipc = if settings.daemon.listen {
        Some(IpcServer::start(scheduler.refresh_handle()).await?)
    } else {
        None
    };

    scheduler.run(shutdown_signal()).await;
    Ok(ExitCode::SUCCESS)
}

/// Print HyprPanel JSON for the daemon's state file
pub async fn hyprpanel(settings: &Settings, args: &HyprpanelArgs) -> Result<ExitCode> {
    let file = args
        .file
        .clone()
        .or_else(|| settings.daemon.output_file.clone())
        .context("-f/--file is required for hyprpanel mode")?;

    let output = hyprpanel_payload(&StateStore::new(file)).await;
    println!("{}", serde_json::to_string(&output)?);
    Ok(ExitCode::SUCCESS)
}

/// Blocks until the daemon has written its first snapshot
async fn hyprpanel_payload(store: &StateStore) -> HyprPanelOutput {
    match store.wait_for(STATE_FILE_POLL).await {
        Ok(snapshot) => hyprpanel::format_output(&snapshot, Utc::now()),
        Err(e) => hyprpanel::format_error(&format!("{:#}", e)),
    }
}

/// Ask the daemon to refresh now
pub async fn refresh(args: &RefreshArgs) -> Result<ExitCode> {
    let queued = ipc::request_refresh().await?;
    if args.debug {
        if queued {
            println!("Refresh triggered successfully");
        } else {
            println!("Refresh already pending");
        }
    }
    Ok(ExitCode::SUCCESS)
}

/// Resolve on SIGINT (Ctrl+C) or SIGTERM
async fn shutdown_signal() {
    let mut sigterm = match signal(SignalKind::terminate()) {
        Ok(sigterm) => sigterm,
        Err(e) => {
            warn!("Failed to install SIGTERM handler: {}", e);
            let _ = tokio::signal::ctrl_c().await;
            return;
        }
    };

    tokio::select! {
        _ = tokio::signal::ctrl_c() => {
            info!("Received SIGINT, shutting down");
        }
        _ = sigterm.recv() => {
            info!("Received SIGTERM, shutting down");
        }
    }
}
