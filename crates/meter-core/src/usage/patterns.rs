//! Compiled regex tables for `/usage` output.
//!
//! Built once per process and shared by the parser and the PTY runner's
//! completion probe.

use regex::Regex;

const MONTHS: &str = r"(Jan|Feb|Mar|Apr|May|Jun|Jul|Aug|Sep|Oct|Nov|Dec)[a-z]*\.?";

pub struct UsagePatterns {
    // Account tier markers in the header ("Opus 4.5 · Claude Max · ...")
    pub(crate) pro: Regex,
    pub(crate) max: Regex,
    pub(crate) api: Regex,

    // "72% used" / "28% left"
    pub(crate) percent: Regex,

    // Relative reset durations
    pub(crate) days: Regex,
    pub(crate) hours: Regex,
    pub(crate) minutes: Regex,

    // Absolute reset times
    pub(crate) full_date: Regex,
    pub(crate) month_day_time: Regex,
    pub(crate) month_day: Regex,
    pub(crate) time_only: Regex,
    pub(crate) timezone: Regex,

    // Identity
    pub(crate) email_header: Regex,
    pub(crate) email_legacy: Regex,
    pub(crate) org_legacy: Regex,

    // "$22.22 / $50.00 spent"
    pub(crate) cost: Regex,

    // Authentication states
    pub(crate) setup_required: Regex,
    pub(crate) theme_selection: Regex,
    pub(crate) token_expired: Regex,
    pub(crate) auth_error: Regex,
    pub(crate) not_logged_in: Regex,
    pub(crate) login_prompt: Regex,
    pub(crate) login_url: Regex,
    pub(crate) no_subscription: Regex,
}

impl UsagePatterns {
    /// Compile all patterns
    pub fn new() -> Self {
        Self {
            pro: Regex::new(r"(?i)·\s*claude\s+pro").expect("Invalid pro regex"),
            max: Regex::new(r"(?i)·\s*claude\s+max").expect("Invalid max regex"),
            api: Regex::new(r"(?i)·\s*claude\s+api").expect("Invalid api regex"),
            percent: Regex::new(r"(?i)(\d{1,3})\s*%\s*(used|left)")
                .expect("Invalid percent regex"),
            days: Regex::new(r"(?i)(\d+)\s*d(?:ays?)?\b").expect("Invalid days regex"),
            hours: Regex::new(r"(?i)(\d+)\s*h(?:ours?|rs?)?\b").expect("Invalid hours regex"),
            minutes: Regex::new(r"(?i)(\d+)\s*m(?:in(?:ute)?s?)?\b")
                .expect("Invalid minutes regex"),
            full_date: Regex::new(&format!(
                r"(?i)\b{MONTHS}\s+(\d{{1,2}}),?\s+(\d{{4}}),?\s+(\d{{1,2}})(?::(\d{{2}}))?\s*(am|pm)\b"
            ))
            .expect("Invalid full_date regex"),
            month_day_time: Regex::new(&format!(
                r"(?i)\b{MONTHS}\s+(\d{{1,2}}),?\s+(?:at\s+)?(\d{{1,2}})(?::(\d{{2}}))?\s*(am|pm)\b"
            ))
            .expect("Invalid month_day_time regex"),
            month_day: Regex::new(&format!(r"(?i)\b{MONTHS}\s+(\d{{1,2}})\b"))
                .expect("Invalid month_day regex"),
            time_only: Regex::new(r"(?i)\b(\d{1,2})(?::(\d{2}))?\s*(am|pm)\b")
                .expect("Invalid time_only regex"),
            timezone: Regex::new(r"\(([^)]+)\)").expect("Invalid timezone regex"),
            email_header: Regex::new(r"(?i)·\s*Claude\s+(?:Max|Pro)\s*·\s*([^\s@]+@[^\s@'’]+)")
                .expect("Invalid email_header regex"),
            email_legacy: Regex::new(r"(?i)(?:Account|Email):\s*([^\s@]+@[^\s@]+)")
                .expect("Invalid email_legacy regex"),
            org_legacy: Regex::new(r"(?im)(?:^|\s)(?:Org|Organization):\s*(.+)$")
                .expect("Invalid org_legacy regex"),
            cost: Regex::new(r"\$?([\d,]+\.?\d*)\s*/\s*\$?([\d,]+\.?\d*)\s*spent")
                .expect("Invalid cost regex"),
            setup_required: Regex::new(r"(?i)let.?s\s+get\s+started")
                .expect("Invalid setup_required regex"),
            theme_selection: Regex::new(
                r"(?i)(choose\s+(the\s+)?text\s+style|run\s+/theme|dark\s+mode|light\s+mode)",
            )
            .expect("Invalid theme_selection regex"),
            token_expired: Regex::new(r"(?i)(token|session)\s*(has\s+)?expired")
                .expect("Invalid token_expired regex"),
            auth_error: Regex::new(r"(?i)authentication[_\s]*(error|failed|required)")
                .expect("Invalid auth_error regex"),
            not_logged_in: Regex::new(
                r"(?i)(not\s+logged\s+in|please\s+(log|sign)\s*in|login\s+required)",
            )
            .expect("Invalid not_logged_in regex"),
            login_prompt: Regex::new(
                r"(?i)(sign\s*in|log\s*in|authenticate)\s*(to\s+continue|required|to\s+use)",
            )
            .expect("Invalid login_prompt regex"),
            login_url: Regex::new(r"(?i)https?://\S*(?:login|auth|signin)\S*")
                .expect("Invalid login_url regex"),
            no_subscription: Regex::new(
                r"(?i)(free\s+tier|no\s+(active\s+)?subscription|upgrade\s+to\s+(pro|max)|subscribe\s+to)",
            )
            .expect("Invalid no_subscription regex"),
        }
    }
}

impl Default for UsagePatterns {
    fn default() -> Self {
        Self::new()
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_patterns_compile() {
        let p = UsagePatterns::new();
        assert!(p.max.is_match("Opus 4.5 · Claude Max · dev@example.com's Organization"));
        assert!(p.percent.is_match("████▌   23% used"));
        assert!(p.percent.is_match("77 % left"));
    }

    #[test]
    fn test_minutes_do_not_match_month_names() {
        let p = UsagePatterns::new();
        assert!(!p.minutes.is_match("Resets 3 Mar"));
        assert!(!p.minutes.is_match("Resets 5:59pm"));
        assert!(p.minutes.is_match("Resets in 30 minutes"));
    }
}
