use anyhow::Result;
use std::process::ExitCode;
use tracing_subscriber::{layer::SubscriberExt, util::SubscriberInitExt, EnvFilter};

use claude_o_meter::commands;
use claude_o_meter::config::{Command, Config, Settings};

#[tokio::main]
async fn main() -> Result<ExitCode> {
    // Parse CLI arguments
    let cli = Config::parse_args();

    // Setup logging
    setup_logging(cli.debug());

    // Load settings
    let mut settings = Settings::load(cli.config.as_ref())?;
    settings.validate()?;

    match cli.command() {
        Command::Query(args) => commands::query(&settings, &args).await,
        Command::Daemon(args) => commands::daemon(settings, &args).await,
        Command::Hyprpanel(args) => commands::hyprpanel(&settings, &args).await,
        Command::Refresh(args) => commands::refresh(&args).await,
    }
}

fn setup_logging(debug: bool) {
    let filter = EnvFilter::try_from_default_env().unwrap_or_else(|_| {
        if debug {
            EnvFilter::new("claude_o_meter=debug,meter_core=debug")
        } else {
            EnvFilter::new("claude_o_meter=info,meter_core=info")
        }
    });

    // stdout carries the JSON output
    tracing_subscriber::registry()
        .with(filter)
        .with(
            tracing_subscriber::fmt::layer()
                .with_target(false)
                .with_writer(std::io::stderr),
        )
        .init();
}
