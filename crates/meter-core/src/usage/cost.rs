//! Extra usage (pay-as-you-go) extraction.

use chrono::{DateTime, Utc};

use super::patterns::UsagePatterns;
use super::reset::parse_reset_line;
use super::types::CostUsage;

/// Lines searched after the "Extra usage" header
const COST_SCAN_LINES: usize = 10;

pub fn parse_cost_usage(
    patterns: &UsagePatterns,
    text: &str,
    now: DateTime<Utc>,
) -> Option<CostUsage> {
    let lower = text.to_lowercase();
    if !lower.contains("extra usage") || lower.contains("extra usage not enabled") {
        return None;
    }

    let lines: Vec<&str> = text.lines().collect();
    let start = lines
        .iter()
        .position(|line| line.to_lowercase().contains("extra usage"))?;
    let end = (start + COST_SCAN_LINES).min(lines.len());

    for line in &lines[start..end] {
        if line.to_lowercase().contains("unlimited") {
            return Some(CostUsage::unlimited().with_resets_at(reset_on_line(patterns, line, now)));
        }

        if let Some(caps) = patterns.cost.captures(line) {
            let spent = parse_amount(&caps[1])?;
            let budget = parse_amount(&caps[2])?;
            return Some(
                CostUsage::budget(spent, budget).with_resets_at(reset_on_line(patterns, line, now)),
            );
        }
    }

    None
}

/// "$22.22 / $50.00 spent · Resets Mar 1" carries its reset on the same line
fn reset_on_line(
    patterns: &UsagePatterns,
    line: &str,
    now: DateTime<Utc>,
) -> Option<DateTime<Utc>> {
    let (_, reset) = line.split_once('·')?;
    if !reset.to_lowercase().contains("reset") {
        return None;
    }
    parse_reset_line(patterns, reset, now).resets_at
}

fn parse_amount(raw: &str) -> Option<f64> {
    raw.replace(',', "").parse().ok()
}
