use anyhow::{Context, Result};
use clap::{Args, Parser, Subcommand};
use serde::{Deserialize, Serialize};
use std::path::PathBuf;
use std::time::Duration;

use meter_core::runner::PtyRunnerConfig;
use meter_core::scheduler::{NotifyConfig, SchedulerConfig};

/// Command line arguments
#[derive(Parser, Debug)]
#[command(
    author,
    version,
    about = "Claude usage quotas for status bars",
    args_conflicts_with_subcommands = true
)]
pub struct Config {
    /// Path to config file
    #[arg(short, long, global = true)]
    pub config: Option<PathBuf>,

    /// Options for the default `query` command
    #[command(flatten)]
    pub query: QueryArgs,

    /// Subcommand (defaults to `query`)
    #[command(subcommand)]
    pub command: Option<Command>,
}

/// Subcommands
#[derive(Subcommand, Debug, Clone)]
pub enum Command {
    /// Query usage once and print JSON to stdout (default)
    Query(QueryArgs),
    /// Run as a daemon, periodically querying and writing to a file
    Daemon(DaemonArgs),
    /// Read the state file and print HyprPanel module JSON
    Hyprpanel(HyprpanelArgs),
    /// Ask the running daemon to refresh now
    Refresh(RefreshArgs),
}

#[derive(Args, Debug, Clone, Default)]
pub struct QueryArgs {
    /// Enable debug logging and include raw output
    #[arg(short, long)]
    pub debug: bool,

    /// Include raw CLI output in the JSON
    #[arg(short, long)]
    pub raw: bool,

    /// Output in HyprPanel module format
    #[arg(long)]
    pub hyprpanel_json: bool,
}

#[derive(Args, Debug, Clone, Default)]
pub struct DaemonArgs {
    /// Query interval (e.g. 60s, 5m)
    #[arg(short, long, value_parser = humantime::parse_duration)]
    pub interval: Option<Duration>,

    /// Output file path
    #[arg(short, long)]
    pub file: Option<PathBuf>,

    /// Listen on the control socket for refresh requests
    #[arg(short = 'b', long)]
    pub listen: bool,

    /// Print claude CLI output in real time
    #[arg(long)]
    pub debug: bool,

    /// Notify when session usage reaches this percentage (0 = disabled)
    #[arg(short = 't', long, value_parser = clap::value_parser!(u8).range(0..=100))]
    pub notify_threshold: Option<u8>,

    /// Notification display timeout (e.g. 5s; 0 = never expire)
    #[arg(long, value_parser = humantime::parse_duration)]
    pub notify_timeout: Option<Duration>,

    /// Path to notification icon (PNG/SVG)
    #[arg(long)]
    pub notify_icon: Option<PathBuf>,
}

#[derive(Args, Debug, Clone, Default)]
pub struct HyprpanelArgs {
    /// State file written by the daemon
    #[arg(short, long)]
    pub file: Option<PathBuf>,
}

#[derive(Args, Debug, Clone, Default)]
pub struct RefreshArgs {
    /// Print a confirmation message
    #[arg(short, long)]
    pub debug: bool,
}

impl Config {
    /// Parse command line arguments
    pub fn parse_args() -> Self {
        Self::parse()
    }

    /// The command to run, `query` when none was given
    pub fn command(&self) -> Command {
        self.command
            .clone()
            .unwrap_or_else(|| Command::Query(self.query.clone()))
    }

    /// Whether debug logging was requested
    pub fn debug(&self) -> bool {
        match self.command() {
            Command::Query(args) => args.debug,
            Command::Daemon(args) => args.debug,
            Command::Refresh(args) => args.debug,
            Command::Hyprpanel(_) => false,
        }
    }
}

/// Application settings (from config file)
#[derive(Debug, Clone, Default, Serialize, Deserialize)]
pub struct Settings {
    /// How the usage CLI is invoked
    #[serde(default)]
    pub runner: RunnerSettings,

    /// Daemon scheduling and output
    #[serde(default)]
    pub daemon: DaemonSettings,

    /// Threshold notifications
    #[serde(default)]
    pub notify: NotifySettings,
}

/// Usage CLI invocation
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct RunnerSettings {
    /// Executable to run
    #[serde(default = "default_command")]
    pub command: String,

    /// Arguments passed to the executable
    #[serde(default = "default_args")]
    pub args: Vec<String>,

    /// Working directory (a directory the CLI already trusts)
    #[serde(default = "default_working_dir")]
    pub working_dir: PathBuf,

    /// Hard deadline for one acquisition in seconds
    #[serde(default = "default_timeout_secs")]
    pub timeout_secs: u64,
}

fn default_command() -> String {
    "claude".to_string()
}

fn default_args() -> Vec<String> {
    vec!["/usage".to_string()]
}

fn default_working_dir() -> PathBuf {
    PathBuf::from("/tmp")
}

fn default_timeout_secs() -> u64 {
    30
}

impl Default for RunnerSettings {
    fn default() -> Self {
        Self {
            command: default_command(),
            args: default_args(),
            working_dir: default_working_dir(),
            timeout_secs: default_timeout_secs(),
        }
    }
}

/// Daemon settings
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct DaemonSettings {
    /// Query interval in seconds while queries succeed
    #[serde(default = "default_interval_secs")]
    pub interval_secs: u64,

    /// Query interval in seconds while queries fail
    #[serde(default = "default_retry_interval_secs")]
    pub retry_interval_secs: u64,

    /// State file path
    #[serde(default)]
    pub output_file: Option<PathBuf>,

    /// Listen on the control socket
    #[serde(default)]
    pub listen: bool,
}

fn default_interval_secs() -> u64 {
    60
}

fn default_retry_interval_secs() -> u64 {
    60
}

impl Default for DaemonSettings {
    fn default() -> Self {
        Self {
            interval_secs: default_interval_secs(),
            retry_interval_secs: default_retry_interval_secs(),
            output_file: None,
            listen: false,
        }
    }
}

/// Notification settings
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct NotifySettings {
    /// Session used-percentage that triggers a notification (0 = disabled)
    #[serde(default)]
    pub threshold: u8,

    /// Display timeout in milliseconds (-1 = server default, 0 = never expire)
    #[serde(default = "default_notify_timeout_ms")]
    pub timeout_ms: i32,

    /// Icon path
    #[serde(default)]
    pub icon: Option<PathBuf>,
}

fn default_notify_timeout_ms() -> i32 {
    -1
}

impl Default for NotifySettings {
    fn default() -> Self {
        Self {
            threshold: 0,
            timeout_ms: default_notify_timeout_ms(),
            icon: None,
        }
    }
}

impl Settings {
    /// Load settings from config file or use defaults
    pub fn load(path: Option<&PathBuf>) -> Result<Self> {
        // Try custom path first
        if let Some(p) = path {
            if p.exists() {
                return Self::load_file(p);
            }
            tracing::warn!("Config file {:?} not found, using defaults", p);
        }

        // Try default config locations
        let default_paths = [
            dirs::config_dir().map(|p| p.join("claude-o-meter/config.toml")),
            dirs::home_dir().map(|p| p.join(".config/claude-o-meter/config.toml")),
            dirs::home_dir().map(|p| p.join(".claude-o-meter.toml")),
        ];

        for path in default_paths.iter().flatten() {
            if path.exists() {
                return Self::load_file(path);
            }
        }

        // Return defaults if no config file found
        Ok(Self::default())
    }

    fn load_file(path: &PathBuf) -> Result<Self> {
        let content = std::fs::read_to_string(path)
            .with_context(|| format!("Failed to read config file: {:?}", path))?;
        toml::from_str(&content).with_context(|| format!("Failed to parse config file: {:?}", path))
    }

    /// Merge daemon flags into settings (CLI takes precedence)
    pub fn merge_daemon_args(&mut self, args: &DaemonArgs) {
        if let Some(interval) = args.interval {
            self.daemon.interval_secs = interval.as_secs();
        }
        if let Some(file) = &args.file {
            self.daemon.output_file = Some(file.clone());
        }
        if args.listen {
            self.daemon.listen = true;
        }
        if let Some(threshold) = args.notify_threshold {
            self.notify.threshold = threshold;
        }
        if let Some(timeout) = args.notify_timeout {
            self.notify.timeout_ms = i32::try_from(timeout.as_millis()).unwrap_or(i32::MAX);
        }
        if let Some(icon) = &args.notify_icon {
            self.notify.icon = Some(icon.clone());
        }
    }

    /// Validate and normalize settings values
    ///
    /// Intervals and the timeout are clamped to one second; an out-of-range
    /// threshold is a configuration error.
    pub fn validate(&mut self) -> Result<()> {
        const MIN_SECS: u64 = 1;

        if self.notify.threshold > 100 {
            anyhow::bail!(
                "notify threshold must be between 0 and 100 (got {})",
                self.notify.threshold
            );
        }
        if self.notify.timeout_ms < -1 {
            self.notify.timeout_ms = -1;
        }

        self.daemon.interval_secs = self.daemon.interval_secs.max(MIN_SECS);
        self.daemon.retry_interval_secs = self.daemon.retry_interval_secs.max(MIN_SECS);
        self.runner.timeout_secs = self.runner.timeout_secs.max(MIN_SECS);

        if self.runner.command.trim().is_empty() {
            anyhow::bail!("runner command must not be empty");
        }
        Ok(())
    }

    /// Runner configuration; `tee_output` mirrors CLI output to stderr
    pub fn runner_config(&self, tee_output: bool) -> PtyRunnerConfig {
        PtyRunnerConfig {
            command: self.runner.command.clone(),
            args: self.runner.args.clone(),
            working_dir: self.runner.working_dir.clone(),
            timeout: Duration::from_secs(self.runner.timeout_secs),
            tee_output,
            ..Default::default()
        }
    }

    pub fn scheduler_config(&self) -> SchedulerConfig {
        SchedulerConfig {
            interval: Duration::from_secs(self.daemon.interval_secs),
            retry_interval: Duration::from_secs(self.daemon.retry_interval_secs),
            notify: NotifyConfig {
                threshold: f64::from(self.notify.threshold),
                timeout_ms: self.notify.timeout_ms,
                icon: self.notify.icon.clone(),
            },
        }
    }

    /// State file path, required for the daemon
    pub fn output_file(&self) -> Result<PathBuf> {
        self.daemon
            .output_file
            .clone()
            .context("-f/--file is required for daemon mode")
    }
}
