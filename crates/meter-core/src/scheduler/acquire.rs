//! The acquisition seam between the scheduler and the CLI.

use std::future::Future;
use std::sync::Arc;

use crate::error::AcquireError;
use crate::runner::PtyRunner;
use crate::usage::{strip_ansi, UsageParser, UsageSnapshot};

/// Produces one fresh snapshot per call
pub trait Acquire {
    fn acquire(&self) -> impl Future<Output = Result<UsageSnapshot, AcquireError>> + Send;
}

/// Runs the real CLI: PTY capture, normalization, parse
pub struct CliAcquirer {
    runner: PtyRunner,
    parser: Arc<UsageParser>,
    include_raw: bool,
}

impl CliAcquirer {
    pub fn new(runner: PtyRunner, parser: Arc<UsageParser>) -> Self {
        Self {
            runner,
            parser,
            include_raw: false,
        }
    }

    /// Keep the normalized CLI output in the snapshot
    pub fn with_raw_output(mut self, include_raw: bool) -> Self {
        self.include_raw = include_raw;
        self
    }
}

impl Acquire for CliAcquirer {
    async fn acquire(&self) -> Result<UsageSnapshot, AcquireError> {
        let raw = self.runner.run().await?;
        let text = strip_ansi(&raw);
        Ok(self.parser.parse(&text, self.include_raw))
    }
}
