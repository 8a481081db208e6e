//! Turn normalized `/usage` output into a [`UsageSnapshot`].

use chrono::{DateTime, Utc};

use super::auth::detect_auth_error;
use super::cost::parse_cost_usage;
use super::identity::{parse_email, parse_organization};
use super::patterns::UsagePatterns;
use super::quota::{is_section_boundary, parse_quotas};
use super::types::{AccountType, AuthError, UsageSnapshot};

/// Snapshot parser holding the compiled pattern tables.
///
/// Construct once and share (`Arc<UsageParser>`); parsing never recompiles.
#[derive(Default)]
pub struct UsageParser {
    patterns: UsagePatterns,
}

impl UsageParser {
    pub fn new() -> Self {
        Self {
            patterns: UsagePatterns::new(),
        }
    }

    /// Parse normalized CLI output captured now
    pub fn parse(&self, text: &str, include_raw: bool) -> UsageSnapshot {
        self.parse_at(text, include_raw, Utc::now())
    }

    /// Parse normalized CLI output against an explicit clock
    pub fn parse_at(&self, text: &str, include_raw: bool, now: DateTime<Utc>) -> UsageSnapshot {
        let p = &self.patterns;

        let mut snapshot = UsageSnapshot {
            account_type: self.detect_account_type(text),
            email: parse_email(p, text),
            organization: parse_organization(p, text),
            quotas: parse_quotas(p, text, now),
            cost_usage: parse_cost_usage(p, text, now),
            auth_error: detect_auth_error(p, text),
            captured_at: now,
            raw_output: include_raw.then(|| text.to_string()),
        };

        // The tier heuristic can guess "max" from an error screen
        if snapshot.auth_error.is_some() && snapshot.quotas.is_empty() {
            snapshot.account_type = AccountType::Unknown;
        }

        snapshot
    }

    /// Detect an authentication problem (also used as an early-exit probe)
    pub fn detect_auth_error(&self, text: &str) -> Option<AuthError> {
        detect_auth_error(&self.patterns, text)
    }

    /// Account tier from the header, first match wins
    pub fn detect_account_type(&self, text: &str) -> AccountType {
        let header = header_region(text);
        let p = &self.patterns;

        if p.pro.is_match(header) {
            AccountType::Pro
        } else if p.max.is_match(header) {
            AccountType::Max
        } else if p.api.is_match(header) {
            AccountType::Api
        } else if text.to_lowercase().contains("current") && text.contains('%') {
            // Quota-like content without a recognizable header
            AccountType::Max
        } else {
            AccountType::Unknown
        }
    }
}

/// Text before the first section label (the whole text if there is none)
fn header_region(text: &str) -> &str {
    let mut offset = 0;
    for line in text.split_inclusive('\n') {
        if is_section_boundary(line) {
            return &text[..offset];
        }
        offset += line.len();
    }
    text
}
