//! Authentication state detection.
//!
//! Rules are checked in priority order and the first match wins, so an
//! expired token is never reported as a generic "not logged in".

use super::patterns::UsagePatterns;
use super::types::{AuthError, AuthErrorCode};

/// Detect an authentication problem in normalized CLI output.
///
/// Returns `None` for regular usage output.
pub fn detect_auth_error(patterns: &UsagePatterns, text: &str) -> Option<AuthError> {
    if patterns.setup_required.is_match(text) || patterns.theme_selection.is_match(text) {
        return Some(AuthError::new(
            AuthErrorCode::SetupRequired,
            "Claude CLI setup required. Please run 'claude' to complete initial setup.",
        ));
    }

    if patterns.token_expired.is_match(text) {
        return Some(AuthError::new(
            AuthErrorCode::TokenExpired,
            "Claude CLI session has expired. Please run 'claude' to re-authenticate.",
        ));
    }

    if patterns.auth_error.is_match(text) {
        return Some(AuthError::new(
            AuthErrorCode::NotLoggedIn,
            "Authentication error. Please run 'claude' to log in.",
        ));
    }

    if patterns.not_logged_in.is_match(text) {
        return Some(AuthError::new(
            AuthErrorCode::NotLoggedIn,
            "Not logged in to Claude CLI. Please run 'claude' to authenticate.",
        ));
    }

    if patterns.login_prompt.is_match(text) || patterns.login_url.is_match(text) {
        return Some(AuthError::new(
            AuthErrorCode::NotLoggedIn,
            "Login required. Please run 'claude' to authenticate.",
        ));
    }

    if patterns.no_subscription.is_match(text) {
        return Some(AuthError::new(
            AuthErrorCode::NoSubscription,
            "No active Claude Pro or Max subscription. Usage metrics require a paid plan.",
        ));
    }

    // Weak heuristic, known to be fuzzy: account/subscription wording plus a
    // verification prompt, and no quota data at all.
    let lower = text.to_lowercase();
    if (lower.contains("account") || lower.contains("subscription"))
        && !has_quota_marker(text)
        && (lower.contains("verify") || lower.contains("confirm"))
    {
        return Some(AuthError::new(
            AuthErrorCode::NotLoggedIn,
            "Authentication verification required. Please run 'claude' to verify your account.",
        ));
    }

    None
}

/// Whether the text contains rendered quota data ("% used" / "% left")
pub fn has_quota_marker(text: &str) -> bool {
    text.contains("% used") || text.contains("% left")
}

#[cfg(test)]
mod tests {
    use super::*;

    fn detect(text: &str) -> Option<AuthErrorCode> {
        detect_auth_error(&UsagePatterns::new(), text).map(|e| e.code)
    }

    #[test]
    fn test_detect_auth_error_cases() {
        let cases = [
            ("Your token has expired. Please log in again.", AuthErrorCode::TokenExpired),
            ("Your session expired. Re-authenticate to continue.", AuthErrorCode::TokenExpired),
            ("authentication_error: invalid credentials", AuthErrorCode::NotLoggedIn),
            ("Authentication failed. Please try again.", AuthErrorCode::NotLoggedIn),
            ("You are not logged in. Please sign in to continue.", AuthErrorCode::NotLoggedIn),
            ("Please log in to use this feature.", AuthErrorCode::NotLoggedIn),
            ("Login required to access usage metrics.", AuthErrorCode::NotLoggedIn),
            ("Please sign in to continue using Claude.", AuthErrorCode::NotLoggedIn),
            ("Visit https://claude.ai/login to authenticate", AuthErrorCode::NotLoggedIn),
            ("Go to https://anthropic.com/auth/signin to sign in", AuthErrorCode::NotLoggedIn),
            (
                "You are on the free tier. Upgrade to Pro for more features.",
                AuthErrorCode::NoSubscription,
            ),
            ("No active subscription found.", AuthErrorCode::NoSubscription),
            ("Upgrade to Pro to access usage metrics.", AuthErrorCode::NoSubscription),
            (
                "Let's get started.\n\n Choose the text style that looks best with your terminal",
                AuthErrorCode::SetupRequired,
            ),
            (
                "Choose the text style that looks best\nTo change this later, run /theme",
                AuthErrorCode::SetupRequired,
            ),
            ("Please confirm your account email", AuthErrorCode::NotLoggedIn),
        ];

        for (input, expected) in cases {
            let error = detect_auth_error(&UsagePatterns::new(), input);
            let error = error.unwrap_or_else(|| panic!("expected {:?} for {:?}", expected, input));
            assert_eq!(error.code, expected, "input: {:?}", input);
            assert!(!error.message.is_empty());
        }
    }

    #[test]
    fn test_expiry_outranks_weaker_rules() {
        // Also matches the login prompt and login URL rules
        let text = "Session has expired. Sign in to continue at https://claude.ai/login";
        assert_eq!(detect(text), Some(AuthErrorCode::TokenExpired));
        // Also matches the no-subscription rule
        assert_eq!(
            detect("Token expired. Upgrade to Max for more."),
            Some(AuthErrorCode::TokenExpired)
        );
    }

    #[test]
    fn test_usage_output_is_not_an_error() {
        assert_eq!(detect("Current session: 50% used. Resets at 6am"), None);
        assert_eq!(detect("11% used\nResets 5:59pm (Europe/Berlin)"), None);
        assert_eq!(detect(""), None);
    }

    #[test]
    fn test_weak_heuristic_needs_missing_quota_data() {
        assert_eq!(
            detect("Confirm account settings\nCurrent session\n12% used"),
            None
        );
    }
}
