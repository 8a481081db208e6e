//! Usage parsing: normalize captured `claude /usage` output and turn it into
//! a typed [`UsageSnapshot`].

pub mod ansi;
pub mod auth;
pub mod cost;
pub mod identity;
pub mod parser;
pub mod patterns;
pub mod quota;
pub mod reset;
pub mod types;

pub use ansi::strip_ansi;
pub use auth::has_quota_marker;
pub use parser::UsageParser;
pub use types::{
    format_duration, AccountType, AuthError, AuthErrorCode, CostUsage, Quota, QuotaType,
    UsageSnapshot,
};
