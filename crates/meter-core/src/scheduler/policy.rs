//! Scheduling decisions kept free of I/O so they can be tested directly.

use std::time::Duration;

use crate::usage::UsageSnapshot;

/// Default delay between attempts while acquisitions are failing
pub const DEFAULT_RETRY_INTERVAL: Duration = Duration::from_secs(60);

/// Slack added after a predicted quota reset before refreshing
pub const RESET_GRACE: Duration = Duration::from_secs(60);

/// Chooses the next tick delay from the outcome of the last acquisition.
///
/// Any success (whatever triggered it) restores the normal interval; any
/// failure switches to the retry interval until the next success.
#[derive(Debug, Clone)]
pub struct IntervalPolicy {
    interval: Duration,
    retry_interval: Duration,
    failing: bool,
}

impl IntervalPolicy {
    pub fn new(interval: Duration, retry_interval: Duration) -> Self {
        Self {
            interval,
            retry_interval,
            failing: false,
        }
    }

    pub fn interval(&self) -> Duration {
        self.interval
    }

    pub fn retry_interval(&self) -> Duration {
        self.retry_interval
    }

    pub fn is_failing(&self) -> bool {
        self.failing
    }

    /// Delay until the next tick in the current state
    pub fn current(&self) -> Duration {
        if self.failing {
            self.retry_interval
        } else {
            self.interval
        }
    }

    pub fn record_success(&mut self) -> Duration {
        self.failing = false;
        self.interval
    }

    pub fn record_failure(&mut self) -> Duration {
        self.failing = true;
        self.retry_interval
    }
}

/// One-shot notification latch for the session quota.
///
/// Fires once when session usage reaches the threshold and re-arms only after
/// usage has dropped back below it.
#[derive(Debug, Clone)]
pub struct ThresholdLatch {
    threshold: f64,
    latched: bool,
}

impl ThresholdLatch {
    /// `threshold` is a used-percentage; 0 disables the latch
    pub fn new(threshold: f64) -> Self {
        Self {
            threshold,
            latched: false,
        }
    }

    pub fn threshold(&self) -> f64 {
        self.threshold
    }

    pub fn is_enabled(&self) -> bool {
        self.threshold > 0.0
    }

    pub fn is_latched(&self) -> bool {
        self.latched
    }

    /// Feed a successful snapshot.
    ///
    /// Returns the session used-percentage when a notification is due. The
    /// caller must call [`ThresholdLatch::mark_sent`] once delivery succeeded,
    /// otherwise the next crossing check tries again.
    pub fn check(&mut self, snapshot: &UsageSnapshot) -> Option<f64> {
        if !self.is_enabled() || snapshot.auth_error.is_some() {
            return None;
        }
        let used = snapshot.session()?.percent_used();

        if used >= self.threshold {
            (!self.latched).then_some(used)
        } else {
            if self.latched {
                tracing::info!("Usage dropped below threshold, notification reset");
            }
            self.latched = false;
            None
        }
    }

    pub fn mark_sent(&mut self) {
        self.latched = true;
    }
}

/// Delay until the earliest quota reset plus [`RESET_GRACE`].
///
/// `None` when no quota has a positive time remaining.
pub fn reset_refresh_delay(snapshot: &UsageSnapshot) -> Option<Duration> {
    let secs = snapshot.min_time_remaining()?;
    Some(Duration::from_secs(secs as u64) + RESET_GRACE)
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::usage::{AuthError, AuthErrorCode, Quota, QuotaType};
    use chrono::Utc;

    fn with_session_used(used: f64) -> UsageSnapshot {
        let mut snapshot = UsageSnapshot::unknown(Utc::now());
        snapshot
            .quotas
            .push(Quota::new(QuotaType::Session, None, 100.0 - used));
        snapshot
    }

    fn with_remaining(seconds: &[Option<i64>]) -> UsageSnapshot {
        let mut snapshot = UsageSnapshot::unknown(Utc::now());
        for secs in seconds {
            let mut quota = Quota::new(QuotaType::Weekly, None, 50.0);
            quota.set_time_remaining(*secs);
            snapshot.quotas.push(quota);
        }
        snapshot
    }

    #[test]
    fn test_failures_then_success_restore_interval() {
        let mut policy = IntervalPolicy::new(Duration::from_secs(300), DEFAULT_RETRY_INTERVAL);
        assert_eq!(policy.current(), Duration::from_secs(300));

        for _ in 0..3 {
            assert_eq!(policy.record_failure(), DEFAULT_RETRY_INTERVAL);
            assert!(policy.is_failing());
        }

        assert_eq!(policy.record_success(), Duration::from_secs(300));
        assert!(!policy.is_failing());
        assert_eq!(policy.current(), Duration::from_secs(300));
    }

    #[test]
    fn test_latch_fires_once_until_usage_drops() {
        let mut latch = ThresholdLatch::new(80.0);

        assert_eq!(latch.check(&with_session_used(85.0)), Some(85.0));
        latch.mark_sent();

        // Still above: no repeat
        assert_eq!(latch.check(&with_session_used(90.0)), None);

        // Dropping below re-arms
        assert_eq!(latch.check(&with_session_used(40.0)), None);
        assert!(!latch.is_latched());

        assert_eq!(latch.check(&with_session_used(80.0)), Some(80.0));
    }

    #[test]
    fn test_latch_retries_when_delivery_failed() {
        let mut latch = ThresholdLatch::new(50.0);
        assert!(latch.check(&with_session_used(60.0)).is_some());
        // mark_sent not called
        assert!(latch.check(&with_session_used(61.0)).is_some());
    }

    #[test]
    fn test_latch_disabled_and_ignores_missing_data() {
        let mut disabled = ThresholdLatch::new(0.0);
        assert_eq!(disabled.check(&with_session_used(100.0)), None);

        let mut latch = ThresholdLatch::new(50.0);
        assert_eq!(latch.check(&UsageSnapshot::unknown(Utc::now())), None);

        let mut snapshot = with_session_used(99.0);
        snapshot.auth_error = Some(AuthError::new(AuthErrorCode::TokenExpired, "expired"));
        assert_eq!(latch.check(&snapshot), None);
    }

    #[test]
    fn test_reset_delay_uses_minimum_positive() {
        let snapshot = with_remaining(&[Some(7200), None, Some(600)]);
        assert_eq!(
            reset_refresh_delay(&snapshot),
            Some(Duration::from_secs(660))
        );
    }

    #[test]
    fn test_reset_delay_absent_without_positive_values() {
        assert_eq!(reset_refresh_delay(&with_remaining(&[None, None])), None);
        assert_eq!(reset_refresh_delay(&with_remaining(&[])), None);
    }
}
