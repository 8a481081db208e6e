//! Account email and organization extraction.
//!
//! The header box prints `Opus 4.5 · Claude Max · dev@example.com's` with the
//! organization either on the same line or on the next one.

use super::patterns::UsagePatterns;

/// Placeholder the CLI prints for personal accounts
const DEFAULT_ORGANIZATION: &str = "organization";

/// Box-drawing characters used by the CLI frame
const BORDER_CHARS: &[char] = &['│', '─', '╭', '╮', '╰', '╯', '┃', '━'];

pub fn parse_email(patterns: &UsagePatterns, text: &str) -> Option<String> {
    patterns
        .email_header
        .captures(text)
        .or_else(|| patterns.email_legacy.captures(text))
        .map(|c| c[1].trim().to_string())
        .filter(|email| !email.is_empty())
}

pub fn parse_organization(patterns: &UsagePatterns, text: &str) -> Option<String> {
    let lines: Vec<&str> = text.lines().collect();

    for (i, line) in lines.iter().enumerate() {
        if !line.contains('@') {
            continue;
        }
        let Some(idx) = possessive_index(line) else {
            continue;
        };

        // Organization on the same line: "dev@example.com's Acme Corp"
        let same_line = trim_border(&line[idx..]);
        if !same_line.is_empty() {
            return non_default(same_line);
        }

        // Organization on the next line
        if let Some(next) = lines.get(i + 1) {
            let next = trim_border(next);
            if !next.is_empty() && !next.contains(BORDER_CHARS) {
                return non_default(next);
            }
        }
    }

    patterns
        .org_legacy
        .captures(text)
        .and_then(|c| non_default(c[1].trim()))
}

/// Byte index just past the possessive `'s` (ASCII or typographic apostrophe)
fn possessive_index(line: &str) -> Option<usize> {
    ["'s", "’s"]
        .iter()
        .filter_map(|marker| line.find(marker).map(|idx| idx + marker.len()))
        .min()
}

fn trim_border(s: &str) -> &str {
    s.trim_matches(|c: char| c.is_whitespace() || BORDER_CHARS.contains(&c))
}

fn non_default(org: &str) -> Option<String> {
    if org.is_empty() || org.eq_ignore_ascii_case(DEFAULT_ORGANIZATION) {
        None
    } else {
        Some(org.to_string())
    }
}
