//! HyprPanel custom module payload.
//!
//! HyprPanel polls a command and expects a single JSON object with `text`,
//! `alt`, `class` and `tooltip`. `alt`/`class` drive icon and style
//! selection on the panel side.

use chrono::{DateTime, Utc};
use serde::{Deserialize, Serialize};

use meter_core::usage::{format_duration, AuthError, CostUsage, UsageSnapshot};

#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct HyprPanelOutput {
    pub text: String,
    pub alt: String,
    pub class: String,
    pub tooltip: String,
}

/// Usage level from session used-percentage
pub fn level(used: f64) -> &'static str {
    if used > 80.0 {
        "high"
    } else if used > 50.0 {
        "medium"
    } else {
        "low"
    }
}

/// Render a snapshot read at `now`.
///
/// Remaining times come from `resets_at`, not the stored seconds, which were
/// only valid when the snapshot was captured.
pub fn format_output(snapshot: &UsageSnapshot, now: DateTime<Utc>) -> HyprPanelOutput {
    if let Some(auth) = &snapshot.auth_error {
        return format_auth_error(auth);
    }

    let Some(session) = snapshot.session() else {
        return format_error("No quota data available");
    };

    let session_used = session.percent_used();
    let mut tooltip = vec![format!(
        "Session: {:.0}% used ({} left)",
        session_used,
        time_left(session.resets_at, now)
    )];

    let (weekly_used, weekly_left) = match snapshot.weekly() {
        Some(weekly) => (weekly.percent_used(), time_left(weekly.resets_at, now)),
        None => (0.0, "unknown".to_string()),
    };
    tooltip.push(format!(
        "Weekly: {:.0}% used ({} left)",
        weekly_used, weekly_left
    ));

    match &snapshot.cost_usage {
        Some(CostUsage::Unlimited { .. }) => tooltip.push("Extra: Unlimited".to_string()),
        Some(CostUsage::Budget { spent, budget, .. }) if *budget > 0.0 => {
            tooltip.push(format!("Extra: ${:.2} / ${:.0}", spent, budget));
        }
        _ => {}
    }

    let level = level(session_used);
    HyprPanelOutput {
        text: format!("{:.0}% {}", session_used, snapshot.account_type.label()),
        alt: level.to_string(),
        class: level.to_string(),
        tooltip: tooltip.join("\n"),
    }
}

pub fn format_error(message: &str) -> HyprPanelOutput {
    HyprPanelOutput {
        text: "--".to_string(),
        alt: "error".to_string(),
        class: "error".to_string(),
        tooltip: message.to_string(),
    }
}

/// `alt` carries the error code so the panel can pick an icon per cause
pub fn format_auth_error(auth: &AuthError) -> HyprPanelOutput {
    HyprPanelOutput {
        text: "Claude".to_string(),
        alt: auth.code.as_str().to_string(),
        class: "auth_error".to_string(),
        tooltip: auth.message.clone(),
    }
}

fn time_left(resets_at: Option<DateTime<Utc>>, now: DateTime<Utc>) -> String {
    match resets_at {
        None => "unknown".to_string(),
        Some(at) => format_duration((at - now).num_seconds()),
    }
}
