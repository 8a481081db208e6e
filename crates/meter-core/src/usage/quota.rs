//! Quota section extraction.
//!
//! Expected layout (one block per quota):
//! ```text
//!   Current session
//!   ████████████████████████████████████               72% used
//!   Resets 1am (Asia/Tokyo)
//!
//!   Current week (all models)
//!   ███████████▌                                       23% used
//!   Resets Mar 3, 12am (Asia/Tokyo)
//! ```

use chrono::{DateTime, Utc};

use super::patterns::UsagePatterns;
use super::reset::find_reset;
use super::types::{Quota, QuotaType};

/// Number of lines (label line included) searched for the percentage
const PERCENT_SCAN_LINES: usize = 5;

/// Section labels in detection priority, lowercase
const SECTION_LABELS: &[(&str, QuotaType, Option<&str>)] = &[
    ("current session", QuotaType::Session, None),
    ("current week (all models)", QuotaType::Weekly, None),
    ("current week (opus)", QuotaType::ModelSpecific, Some("opus")),
    ("current week (opus only)", QuotaType::ModelSpecific, Some("opus")),
    ("current week (sonnet)", QuotaType::ModelSpecific, Some("sonnet")),
    ("current week (sonnet only)", QuotaType::ModelSpecific, Some("sonnet")),
    ("opus usage", QuotaType::ModelSpecific, Some("opus")),
    ("sonnet usage", QuotaType::ModelSpecific, Some("sonnet")),
];

/// Headers that end a quota block without being a quota themselves
const NON_QUOTA_SECTIONS: &[&str] = &["extra usage"];

/// Look up the quota section a line opens, if any
fn section_label(line: &str) -> Option<(QuotaType, Option<&'static str>)> {
    let lower = line.to_lowercase();
    SECTION_LABELS
        .iter()
        .find(|(label, _, _)| lower.contains(label))
        .map(|(_, quota_type, model)| (*quota_type, *model))
}

/// Whether a line starts a new section (case-insensitive)
pub fn is_section_boundary(line: &str) -> bool {
    if section_label(line).is_some() {
        return true;
    }
    let lower = line.to_lowercase();
    NON_QUOTA_SECTIONS.iter().any(|label| lower.contains(label))
}

/// Parse "N% used" / "N% left" into percent remaining
pub fn parse_percentage(patterns: &UsagePatterns, line: &str) -> Option<f64> {
    let caps = patterns.percent.captures(line)?;
    let value: f64 = caps[1].parse().ok()?;
    if caps[2].eq_ignore_ascii_case("used") {
        Some(100.0 - value)
    } else {
        Some(value)
    }
}

/// Extract all quotas in source order
pub fn parse_quotas(patterns: &UsagePatterns, text: &str, now: DateTime<Utc>) -> Vec<Quota> {
    let lines: Vec<&str> = text.lines().collect();
    let mut quotas = Vec::new();

    for (i, line) in lines.iter().enumerate() {
        let Some((quota_type, model)) = section_label(line) else {
            continue;
        };

        let end = (i + PERCENT_SCAN_LINES).min(lines.len());
        for j in i..end {
            if j > i && is_section_boundary(lines[j]) {
                break;
            }
            let Some(percent) = parse_percentage(patterns, lines[j]) else {
                continue;
            };

            let mut quota = Quota::new(quota_type, model, percent);
            if let Some(reset) = find_reset(patterns, &lines, j, now) {
                quota.reset_text = Some(reset.text);
                quota.resets_at = reset.resets_at;
                quota.set_time_remaining(reset.seconds);
            }
            quotas.push(quota);
            break;
        }
    }

    quotas
}

#[cfg(test)]
mod tests {
    use super::*;
    use pretty_assertions::assert_eq;

    #[test]
    fn test_parse_percentage() {
        let p = UsagePatterns::new();
        assert_eq!(parse_percentage(&p, "  72% used"), Some(28.0));
        assert_eq!(parse_percentage(&p, "0% used"), Some(100.0));
        assert_eq!(parse_percentage(&p, "████   64% left"), Some(64.0));
        assert_eq!(parse_percentage(&p, "no match here"), None);
    }

    #[test]
    fn test_labels_are_case_insensitive() {
        assert!(is_section_boundary("  CURRENT SESSION"));
        assert!(is_section_boundary("Current week (Sonnet only)"));
        assert!(is_section_boundary("Extra usage"));
        assert!(!is_section_boundary("Resets 1am"));
    }

    #[test]
    fn test_quota_order_and_models() {
        let text = "\
Current session
██ 10% used
Current week (all models)
██ 20% used
Current week (Opus)
██ 30% used
Current week (Sonnet only)
0% used
";
        let quotas = parse_quotas(&UsagePatterns::new(), text, Utc::now());
        let summary: Vec<_> = quotas
            .iter()
            .map(|q| (q.quota_type, q.model.as_deref(), q.percent_remaining))
            .collect();
        assert_eq!(
            summary,
            vec![
                (QuotaType::Session, None, 90.0),
                (QuotaType::Weekly, None, 80.0),
                (QuotaType::ModelSpecific, Some("opus"), 70.0),
                (QuotaType::ModelSpecific, Some("sonnet"), 100.0),
            ]
        );
    }

    #[test]
    fn test_label_without_percentage_is_skipped() {
        let text = "Current session\n\nLoading…\n";
        assert!(parse_quotas(&UsagePatterns::new(), text, Utc::now()).is_empty());
    }

    #[test]
    fn test_percentage_search_does_not_borrow_next_section() {
        let text = "Current week (opus)\nCurrent week (all models)\n40% used\n";
        let quotas = parse_quotas(&UsagePatterns::new(), text, Utc::now());
        assert_eq!(quotas.len(), 1);
        assert_eq!(quotas[0].quota_type, QuotaType::Weekly);
    }
}
