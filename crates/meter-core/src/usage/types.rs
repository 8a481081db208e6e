//! Usage data types parsed from Claude CLI `/usage` output.

use chrono::{DateTime, Utc};
use serde::{Deserialize, Serialize};

/// Claude account tier
#[derive(Debug, Clone, Copy, Default, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum AccountType {
    Pro,
    Max,
    Api,
    #[default]
    Unknown,
}

impl AccountType {
    /// Short label for status bar display
    pub fn label(&self) -> &'static str {
        match self {
            AccountType::Pro => "Pro",
            AccountType::Max => "Max",
            AccountType::Api | AccountType::Unknown => "Claude",
        }
    }
}

/// Kind of usage allowance
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum QuotaType {
    /// Rolling session window
    Session,
    /// Weekly allowance across all models
    Weekly,
    /// Weekly allowance for a single model family
    ModelSpecific,
}

/// A single usage quota (e.g., "Current session", "Current week (all models)")
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct Quota {
    #[serde(rename = "type")]
    pub quota_type: QuotaType,
    /// Model family, only for `ModelSpecific` quotas
    #[serde(skip_serializing_if = "Option::is_none", default)]
    pub model: Option<String>,
    /// Percentage remaining (0-100)
    pub percent_remaining: f64,
    /// Absolute reset instant
    #[serde(skip_serializing_if = "Option::is_none", default)]
    pub resets_at: Option<DateTime<Utc>>,
    /// Raw reset line as printed by the CLI
    #[serde(skip_serializing_if = "Option::is_none", default)]
    pub reset_text: Option<String>,
    #[serde(skip_serializing_if = "Option::is_none", default)]
    pub time_remaining_seconds: Option<i64>,
    #[serde(skip_serializing_if = "Option::is_none", default)]
    pub time_remaining_human: Option<String>,
}

impl Quota {
    /// Create a quota with no reset information
    pub fn new(quota_type: QuotaType, model: Option<&str>, percent_remaining: f64) -> Self {
        Self {
            quota_type,
            model: model.map(str::to_string),
            percent_remaining: percent_remaining.clamp(0.0, 100.0),
            resets_at: None,
            reset_text: None,
            time_remaining_seconds: None,
            time_remaining_human: None,
        }
    }

    /// Percentage used (0-100)
    pub fn percent_used(&self) -> f64 {
        100.0 - self.percent_remaining
    }

    /// Set the remaining-time pair from a duration in seconds.
    ///
    /// Non-positive durations clear both fields.
    pub fn set_time_remaining(&mut self, seconds: Option<i64>) {
        match seconds {
            Some(secs) if secs > 0 => {
                self.time_remaining_seconds = Some(secs);
                self.time_remaining_human = Some(format_duration(secs));
            }
            _ => {
                self.time_remaining_seconds = None;
                self.time_remaining_human = None;
            }
        }
    }

    /// Recompute the remaining-time pair from `resets_at` against `now`.
    ///
    /// Cached snapshots must go through this before display; the stored
    /// seconds were only valid at capture time.
    pub fn refresh_time_remaining(&mut self, now: DateTime<Utc>) {
        let seconds = self.resets_at.map(|at| (at - now).num_seconds());
        self.set_time_remaining(seconds);
    }
}

/// Extra usage spending (pay-as-you-go on top of the subscription)
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(untagged)]
pub enum CostUsage {
    Unlimited {
        unlimited: bool,
        #[serde(skip_serializing_if = "Option::is_none", default)]
        resets_at: Option<DateTime<Utc>>,
    },
    Budget {
        spent: f64,
        budget: f64,
        #[serde(skip_serializing_if = "Option::is_none", default)]
        resets_at: Option<DateTime<Utc>>,
    },
}

impl CostUsage {
    pub fn unlimited() -> Self {
        CostUsage::Unlimited {
            unlimited: true,
            resets_at: None,
        }
    }

    pub fn budget(spent: f64, budget: f64) -> Self {
        CostUsage::Budget {
            spent,
            budget,
            resets_at: None,
        }
    }

    pub fn is_unlimited(&self) -> bool {
        matches!(self, CostUsage::Unlimited { .. })
    }

    pub fn with_resets_at(mut self, at: Option<DateTime<Utc>>) -> Self {
        match &mut self {
            CostUsage::Unlimited { resets_at, .. } | CostUsage::Budget { resets_at, .. } => {
                *resets_at = at;
            }
        }
        self
    }
}

/// Authentication problem reported by the CLI instead of usage data
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum AuthErrorCode {
    NotLoggedIn,
    TokenExpired,
    NoSubscription,
    SetupRequired,
}

impl AuthErrorCode {
    pub fn as_str(&self) -> &'static str {
        match self {
            AuthErrorCode::NotLoggedIn => "not_logged_in",
            AuthErrorCode::TokenExpired => "token_expired",
            AuthErrorCode::NoSubscription => "no_subscription",
            AuthErrorCode::SetupRequired => "setup_required",
        }
    }
}

#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct AuthError {
    pub code: AuthErrorCode,
    pub message: String,
}

impl AuthError {
    pub fn new(code: AuthErrorCode, message: &str) -> Self {
        Self {
            code,
            message: message.to_string(),
        }
    }
}

/// Complete usage snapshot, the content of the state file
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct UsageSnapshot {
    pub account_type: AccountType,
    #[serde(skip_serializing_if = "Option::is_none", default)]
    pub email: Option<String>,
    #[serde(skip_serializing_if = "Option::is_none", default)]
    pub organization: Option<String>,
    /// Quotas in the order they appear in the CLI output
    #[serde(default)]
    pub quotas: Vec<Quota>,
    #[serde(skip_serializing_if = "Option::is_none", default)]
    pub cost_usage: Option<CostUsage>,
    #[serde(skip_serializing_if = "Option::is_none", default)]
    pub auth_error: Option<AuthError>,
    pub captured_at: DateTime<Utc>,
    /// Normalized CLI output, only kept in debug/raw mode
    #[serde(skip_serializing_if = "Option::is_none", default)]
    pub raw_output: Option<String>,
}

impl UsageSnapshot {
    /// Minimal snapshot written when an acquisition fails, so consumers do not
    /// keep showing the previous data as if it were fresh.
    pub fn unknown(captured_at: DateTime<Utc>) -> Self {
        Self {
            account_type: AccountType::Unknown,
            email: None,
            organization: None,
            quotas: Vec::new(),
            cost_usage: None,
            auth_error: None,
            captured_at,
            raw_output: None,
        }
    }

    /// First session quota, if any
    pub fn session(&self) -> Option<&Quota> {
        self.quota(QuotaType::Session)
    }

    /// First weekly (all models) quota, if any
    pub fn weekly(&self) -> Option<&Quota> {
        self.quota(QuotaType::Weekly)
    }

    fn quota(&self, quota_type: QuotaType) -> Option<&Quota> {
        self.quotas.iter().find(|q| q.quota_type == quota_type)
    }

    /// Smallest positive time-to-reset across all quotas
    pub fn min_time_remaining(&self) -> Option<i64> {
        self.quotas
            .iter()
            .filter_map(|q| q.time_remaining_seconds)
            .filter(|secs| *secs > 0)
            .min()
    }

    /// Recompute every quota's remaining time against `now`
    pub fn refresh_time_remaining(&mut self, now: DateTime<Utc>) {
        for quota in &mut self.quotas {
            quota.refresh_time_remaining(now);
        }
    }
}

/// Format seconds as a compact duration ("2d 3h", "45m", "0m")
pub fn format_duration(seconds: i64) -> String {
    if seconds <= 0 {
        return "0m".to_string();
    }

    let days = seconds / 86_400;
    let hours = (seconds % 86_400) / 3_600;
    let minutes = (seconds % 3_600) / 60;

    let mut parts = Vec::new();
    if days > 0 {
        parts.push(format!("{}d", days));
    }
    if hours > 0 {
        parts.push(format!("{}h", hours));
    }
    if minutes > 0 || parts.is_empty() {
        parts.push(format!("{}m", minutes));
    }
    parts.join(" ")
}

#[cfg(test)]
mod tests {
    use super::*;
    use chrono::Duration;
    use pretty_assertions::assert_eq;

    #[test]
    fn test_format_duration() {
        assert_eq!(format_duration(0), "0m");
        assert_eq!(format_duration(-5), "0m");
        assert_eq!(format_duration(59), "0m");
        assert_eq!(format_duration(9000), "2h 30m");
        assert_eq!(format_duration(442_800), "5d 3h");
        assert_eq!(format_duration(86_400 + 60), "1d 1m");
    }

    #[test]
    fn test_time_remaining_fields_move_together() {
        let mut quota = Quota::new(QuotaType::Session, None, 40.0);
        quota.set_time_remaining(Some(3600));
        assert_eq!(quota.time_remaining_seconds, Some(3600));
        assert_eq!(quota.time_remaining_human.as_deref(), Some("1h"));

        quota.set_time_remaining(Some(0));
        assert!(quota.time_remaining_seconds.is_none());
        assert!(quota.time_remaining_human.is_none());
    }

    #[test]
    fn test_percent_is_clamped() {
        assert_eq!(Quota::new(QuotaType::Weekly, None, 130.0).percent_remaining, 100.0);
        assert_eq!(Quota::new(QuotaType::Weekly, None, -4.0).percent_remaining, 0.0);
    }

    #[test]
    fn test_snapshot_json_shape() {
        let captured_at = Utc::now();
        let mut quota = Quota::new(QuotaType::ModelSpecific, Some("opus"), 75.0);
        quota.resets_at = Some(captured_at + Duration::hours(2));
        quota.set_time_remaining(Some(7200));

        let snapshot = UsageSnapshot {
            account_type: AccountType::Max,
            email: Some("dev@example.com".to_string()),
            quotas: vec![quota],
            cost_usage: Some(CostUsage::budget(22.22, 50.0)),
            ..UsageSnapshot::unknown(captured_at)
        };

        let json: serde_json::Value = serde_json::to_value(&snapshot).unwrap();
        assert_eq!(json["account_type"], "max");
        assert_eq!(json["quotas"][0]["type"], "model_specific");
        assert_eq!(json["quotas"][0]["model"], "opus");
        assert_eq!(json["quotas"][0]["time_remaining_human"], "2h");
        assert_eq!(json["cost_usage"]["spent"], 22.22);
        assert!(json.get("auth_error").is_none());
        assert!(json.get("organization").is_none());
    }

    #[test]
    fn test_cost_usage_variants_deserialize() {
        let unlimited: CostUsage = serde_json::from_str(r#"{"unlimited":true}"#).unwrap();
        assert!(unlimited.is_unlimited());

        let budget: CostUsage = serde_json::from_str(r#"{"spent":1.5,"budget":20}"#).unwrap();
        assert_eq!(budget, CostUsage::budget(1.5, 20.0));
    }

    #[test]
    fn test_recomputed_remaining_never_grows() {
        let captured_at = Utc::now();
        let mut quota = Quota::new(QuotaType::Session, None, 10.0);
        quota.resets_at = Some(captured_at + Duration::seconds(9000));
        quota.set_time_remaining(Some(9000));

        let snapshot = UsageSnapshot {
            quotas: vec![quota],
            ..UsageSnapshot::unknown(captured_at)
        };
        let json = serde_json::to_string(&snapshot).unwrap();
        let mut restored: UsageSnapshot = serde_json::from_str(&json).unwrap();
        restored.refresh_time_remaining(Utc::now());

        let stored = snapshot.quotas[0].time_remaining_seconds.unwrap();
        let recomputed = restored.quotas[0].time_remaining_seconds.unwrap();
        assert!(recomputed <= stored);
    }

    #[test]
    fn test_min_time_remaining_skips_missing() {
        let mut a = Quota::new(QuotaType::Session, None, 0.0);
        a.set_time_remaining(Some(500));
        let b = Quota::new(QuotaType::Weekly, None, 0.0);
        let mut c = Quota::new(QuotaType::ModelSpecific, Some("opus"), 0.0);
        c.set_time_remaining(Some(120));

        let snapshot = UsageSnapshot {
            quotas: vec![a, b, c],
            ..UsageSnapshot::unknown(Utc::now())
        };
        assert_eq!(snapshot.min_time_remaining(), Some(120));
        assert_eq!(UsageSnapshot::unknown(Utc::now()).min_time_remaining(), None);
    }
}
