//! Daemon control loop.
//!
//! Three triggers feed a single acquisition slot: the periodic tick, external
//! refresh requests and the predicted quota reset. The loop awaits each
//! acquisition before it looks at the next event, so at most one CLI process
//! is ever running.

use chrono::Utc;
use std::fmt;
use std::future::Future;
use std::time::Duration;
use tokio::sync::mpsc;
use tokio::time::Instant;
use tracing::{debug, info, warn};

use super::acquire::Acquire;
use super::notify::{NotifyConfig, Notifier};
use super::policy::{reset_refresh_delay, IntervalPolicy, ThresholdLatch};
use crate::state::StateStore;
use crate::usage::{strip_ansi, UsageSnapshot};

/// Scheduler timing configuration
#[derive(Debug, Clone)]
pub struct SchedulerConfig {
    /// Delay between acquisitions while they succeed
    pub interval: Duration,
    /// Delay between acquisitions while they fail
    pub retry_interval: Duration,
    pub notify: NotifyConfig,
}

/// Coalescing handle for out-of-band refresh requests.
///
/// At most one request is kept pending; extra requests made while one is
/// already queued are dropped.
#[derive(Debug, Clone)]
pub struct RefreshHandle {
    tx: mpsc::Sender<()>,
}

impl RefreshHandle {
    /// Refresh channel with room for a single pending request
    pub(crate) fn channel() -> (Self, mpsc::Receiver<()>) {
        let (tx, rx) = mpsc::channel(1);
        (Self { tx }, rx)
    }

    /// Queue a refresh. Returns false when it merged with a pending request.
    pub fn request(&self) -> bool {
        match self.tx.try_send(()) {
            Ok(()) => true,
            Err(mpsc::error::TrySendError::Full(())) => false,
            Err(mpsc::error::TrySendError::Closed(())) => {
                debug!("Refresh requested after scheduler stopped");
                false
            }
        }
    }
}

/// What started an acquisition
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum Trigger {
    Startup,
    Tick,
    Refresh,
    QuotaReset,
}

impl fmt::Display for Trigger {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        let name = match self {
            Trigger::Startup => "startup",
            Trigger::Tick => "interval",
            Trigger::Refresh => "refresh request",
            Trigger::QuotaReset => "quota reset",
        };
        f.write_str(name)
    }
}

enum CycleOutcome {
    /// Acquisition parsed; carries the delay until the next predicted reset
    Success { reset_in: Option<Duration> },
    Failure,
}

/// The daemon scheduler
pub struct Scheduler<A, N> {
    acquirer: A,
    notifier: N,
    store: StateStore,
    notify: NotifyConfig,
    policy: IntervalPolicy,
    latch: ThresholdLatch,
    refresh: RefreshHandle,
    refresh_rx: mpsc::Receiver<()>,
}

impl<A: Acquire, N: Notifier> Scheduler<A, N> {
    pub fn new(config: SchedulerConfig, acquirer: A, notifier: N, store: StateStore) -> Self {
        let (refresh, refresh_rx) = RefreshHandle::channel();
        Self {
            acquirer,
            notifier,
            store,
            policy: IntervalPolicy::new(config.interval, config.retry_interval),
            latch: ThresholdLatch::new(config.notify.threshold),
            notify: config.notify,
            refresh,
            refresh_rx,
        }
    }

    /// Handle for the IPC listener (or anything else) to request a refresh
    pub fn refresh_handle(&self) -> RefreshHandle {
        self.refresh.clone()
    }

    /// Run until `shutdown` resolves.
    ///
    /// The first acquisition happens immediately. An acquisition already in
    /// flight when shutdown arrives is allowed to finish.
    pub async fn run(mut self, shutdown: impl Future<Output = ()>) {
        tokio::pin!(shutdown);

        info!(
            "Scheduler started: interval {:?}, retry interval {:?}",
            self.policy.interval(),
            self.policy.retry_interval()
        );

        let tick = tokio::time::sleep(self.policy.current());
        tokio::pin!(tick);
        let reset = tokio::time::sleep(Duration::ZERO);
        tokio::pin!(reset);
        let mut reset_armed = false;

        let mut trigger = Trigger::Startup;
        loop {
            let was_failing = self.policy.is_failing();
            let outcome = self.cycle(trigger).await;

            let next_tick = match &outcome {
                CycleOutcome::Success { .. } => {
                    if was_failing {
                        info!(
                            "Query recovered, resuming normal interval: {:?}",
                            self.policy.interval()
                        );
                    }
                    self.policy.record_success()
                }
                CycleOutcome::Failure => {
                    if !was_failing {
                        info!(
                            "Switching to retry interval: {:?}",
                            self.policy.retry_interval()
                        );
                    }
                    self.policy.record_failure()
                }
            };
            tick.as_mut().reset(Instant::now() + next_tick);

            // A failed acquisition tells us nothing new about resets
            if let CycleOutcome::Success { reset_in } = outcome {
                match reset_in {
                    Some(delay) => {
                        reset.as_mut().reset(Instant::now() + delay);
                        reset_armed = true;
                        info!("Scheduled reset refresh in {:?}", delay);
                    }
                    None => reset_armed = false,
                }
            }

            // Shutdown wins over any trigger that became ready meanwhile
            trigger = tokio::select! {
                biased;
                _ = &mut shutdown => break,
                _ = tick.as_mut() => Trigger::Tick,
                Some(()) = self.refresh_rx.recv() => Trigger::Refresh,
                _ = reset.as_mut(), if reset_armed => {
                    reset_armed = false;
                    Trigger::QuotaReset
                }
            };
        }

        info!("Scheduler stopped");
    }

    async fn cycle(&mut self, trigger: Trigger) -> CycleOutcome {
        debug!("Acquiring usage ({})", trigger);

        let snapshot = match self.acquirer.acquire().await {
            Ok(snapshot) => snapshot,
            Err(e) => {
                warn!("Query failed: {}", e);
                if let Some(partial) = e.partial_output() {
                    debug!("Raw CLI output:\n{}", strip_ansi(partial));
                }
                // Consumers must not keep showing stale data as fresh
                self.persist(&UsageSnapshot::unknown(Utc::now()));
                return CycleOutcome::Failure;
            }
        };

        if let Some(auth) = &snapshot.auth_error {
            warn!("Authentication error: {} - {}", auth.code.as_str(), auth.message);
        } else if let Some(session) = snapshot.session() {
            info!(
                "Query successful: {} session at {:.0}%",
                snapshot.account_type.label(),
                session.percent_used()
            );
        } else {
            info!("Query returned no quota data");
        }

        self.persist(&snapshot);
        self.check_threshold(&snapshot).await;

        CycleOutcome::Success {
            reset_in: reset_refresh_delay(&snapshot),
        }
    }

    fn persist(&self, snapshot: &UsageSnapshot) {
        if let Err(e) = self.store.write(snapshot) {
            warn!("Failed to write snapshot: {:#}", e);
        }
    }

    async fn check_threshold(&mut self, snapshot: &UsageSnapshot) {
        let Some(used) = self.latch.check(snapshot) else {
            return;
        };

        let body = format!(
            "Session usage at {:.0}% (threshold: {:.0}%)",
            used,
            self.latch.threshold()
        );
        let result = self
            .notifier
            .notify(
                "Claude Usage High",
                &body,
                self.notify.icon.as_deref(),
                self.notify.timeout_ms,
            )
            .await;

        match result {
            Ok(()) => {
                info!("Notification sent: session usage at {:.0}%", used);
                self.latch.mark_sent();
            }
            Err(e) => warn!("Failed to send notification: {:#}", e),
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::error::AcquireError;
    use crate::usage::{AccountType, Quota, QuotaType};
    use parking_lot::Mutex;
    use std::collections::VecDeque;
    use std::path::Path;
    use std::sync::Arc;
    use tokio::sync::oneshot;

    type Script = VecDeque<Result<UsageSnapshot, AcquireError>>;

    /// Replays scripted results and records when each call happened
    #[derive(Clone)]
    struct FakeAcquirer {
        script: Arc<Mutex<Script>>,
        calls: Arc<Mutex<Vec<Instant>>>,
        latency: Duration,
    }

    impl FakeAcquirer {
        fn new(script: Vec<Result<UsageSnapshot, AcquireError>>) -> Self {
            Self {
                script: Arc::new(Mutex::new(script.into())),
                calls: Arc::new(Mutex::new(Vec::new())),
                latency: Duration::ZERO,
            }
        }

        fn with_latency(mut self, latency: Duration) -> Self {
            self.latency = latency;
            self
        }

        fn call_offsets(&self, start: Instant) -> Vec<u64> {
            self.calls
                .lock()
                .iter()
                .map(|at| at.duration_since(start).as_secs())
                .collect()
        }
    }

    impl Acquire for FakeAcquirer {
        async fn acquire(&self) -> Result<UsageSnapshot, AcquireError> {
            self.calls.lock().push(Instant::now());
            if !self.latency.is_zero() {
                tokio::time::sleep(self.latency).await;
            }
            let next = self.script.lock().pop_front();
            next.unwrap_or_else(|| Ok(session_used(10.0, None)))
        }
    }

    #[derive(Clone, Default)]
    struct FakeNotifier {
        sent: Arc<Mutex<Vec<String>>>,
        failures_left: Arc<Mutex<usize>>,
    }

    impl Notifier for FakeNotifier {
        async fn notify(
            &self,
            _summary: &str,
            body: &str,
            _icon: Option<&Path>,
            _timeout_ms: i32,
        ) -> anyhow::Result<()> {
            let mut failures = self.failures_left.lock();
            if *failures > 0 {
                *failures -= 1;
                anyhow::bail!("notification server unavailable");
            }
            self.sent.lock().push(body.to_string());
            Ok(())
        }
    }

    fn session_used(used: f64, remaining: Option<i64>) -> UsageSnapshot {
        let mut snapshot = UsageSnapshot::unknown(Utc::now());
        snapshot.account_type = AccountType::Max;
        let mut quota = Quota::new(QuotaType::Session, None, 100.0 - used);
        quota.set_time_remaining(remaining);
        snapshot.quotas.push(quota);
        snapshot
    }

    fn timeout_error() -> AcquireError {
        AcquireError::Timeout {
            timeout: Duration::from_secs(30),
            partial: String::new(),
        }
    }

    fn config(interval: u64, threshold: f64) -> SchedulerConfig {
        SchedulerConfig {
            interval: Duration::from_secs(interval),
            retry_interval: Duration::from_secs(60),
            notify: NotifyConfig {
                threshold,
                ..Default::default()
            },
        }
    }

    /// Run the scheduler for `duration` of (paused) time
    async fn run_for<N: Notifier + Send + Sync + 'static>(
        scheduler: Scheduler<FakeAcquirer, N>,
        duration: Duration,
        during: impl FnOnce(RefreshHandle) + Send + 'static,
    ) {
        let handle = scheduler.refresh_handle();
        let (stop_tx, stop_rx) = oneshot::channel::<()>();
        let task = tokio::spawn(scheduler.run(async {
            let _ = stop_rx.await;
        }));

        during(handle);
        tokio::time::sleep(duration).await;
        let _ = stop_tx.send(());
        task.await.unwrap();
    }

    #[tokio::test(start_paused = true)]
    async fn test_failures_back_off_then_recover() {
        let dir = tempfile::tempdir().unwrap();
        let acquirer = FakeAcquirer::new(vec![
            Err(timeout_error()),
            Err(timeout_error()),
            Ok(session_used(20.0, None)),
        ]);
        let scheduler = Scheduler::new(
            config(300, 0.0),
            acquirer.clone(),
            FakeNotifier::default(),
            StateStore::new(dir.path().join("usage.json")),
        );

        let start = Instant::now();
        run_for(scheduler, Duration::from_secs(500), |_| {}).await;

        // Two failures retry after 60s each, the success restores 300s
        assert_eq!(acquirer.call_offsets(start), vec![0, 60, 120, 420]);
    }

    #[tokio::test(start_paused = true)]
    async fn test_failure_writes_unknown_snapshot() {
        let dir = tempfile::tempdir().unwrap();
        let store = StateStore::new(dir.path().join("usage.json"));
        let acquirer = FakeAcquirer::new(vec![Err(timeout_error())]);
        let scheduler = Scheduler::new(
            config(300, 0.0),
            acquirer,
            FakeNotifier::default(),
            store.clone(),
        );

        run_for(scheduler, Duration::from_secs(10), |_| {}).await;

        let written = store.read().unwrap();
        assert_eq!(written.account_type, AccountType::Unknown);
        assert!(written.quotas.is_empty());
    }

    #[tokio::test(start_paused = true)]
    async fn test_reset_timer_triggers_refresh() {
        let dir = tempfile::tempdir().unwrap();
        let acquirer = FakeAcquirer::new(vec![Ok(session_used(50.0, Some(120)))]);
        let scheduler = Scheduler::new(
            config(600, 0.0),
            acquirer.clone(),
            FakeNotifier::default(),
            StateStore::new(dir.path().join("usage.json")),
        );

        let start = Instant::now();
        run_for(scheduler, Duration::from_secs(1000), |_| {}).await;

        // Reset at 120s + 60s grace, then the regular interval from there
        assert_eq!(acquirer.call_offsets(start), vec![0, 180, 780]);
    }

    #[tokio::test(start_paused = true)]
    async fn test_refresh_request_restarts_interval() {
        let dir = tempfile::tempdir().unwrap();
        let acquirer = FakeAcquirer::new(Vec::new());
        let scheduler = Scheduler::new(
            config(600, 0.0),
            acquirer.clone(),
            FakeNotifier::default(),
            StateStore::new(dir.path().join("usage.json")),
        );

        let start = Instant::now();
        run_for(scheduler, Duration::from_secs(700), |handle| {
            tokio::spawn(async move {
                tokio::time::sleep(Duration::from_secs(10)).await;
                handle.request();
            });
        })
        .await;

        assert_eq!(acquirer.call_offsets(start), vec![0, 10, 610]);
    }

    #[tokio::test(start_paused = true)]
    async fn test_shutdown_beats_pending_refresh() {
        for _ in 0..20 {
            let dir = tempfile::tempdir().unwrap();
            let acquirer =
                FakeAcquirer::new(Vec::new()).with_latency(Duration::from_secs(10));
            let scheduler = Scheduler::new(
                config(600, 0.0),
                acquirer.clone(),
                FakeNotifier::default(),
                StateStore::new(dir.path().join("usage.json")),
            );

            let start = Instant::now();
            // Refresh queued at 1s and shutdown at 2s, both while the first
            // acquisition is still running
            run_for(scheduler, Duration::from_secs(2), |handle| {
                tokio::spawn(async move {
                    tokio::time::sleep(Duration::from_secs(1)).await;
                    handle.request();
                });
            })
            .await;

            assert_eq!(acquirer.call_offsets(start), vec![0]);
        }
    }

    #[tokio::test]
    async fn test_refresh_requests_coalesce() {
        let dir = tempfile::tempdir().unwrap();
        let scheduler = Scheduler::new(
            config(600, 0.0),
            FakeAcquirer::new(Vec::new()),
            FakeNotifier::default(),
            StateStore::new(dir.path().join("usage.json")),
        );
        let handle = scheduler.refresh_handle();

        assert!(handle.request());
        assert!(!handle.request());
        assert!(!handle.clone().request());
    }

    #[tokio::test(start_paused = true)]
    async fn test_threshold_notifies_once_per_crossing() {
        let dir = tempfile::tempdir().unwrap();
        let acquirer = FakeAcquirer::new(vec![
            Ok(session_used(85.0, None)),
            Ok(session_used(90.0, None)),
            Ok(session_used(40.0, None)),
            Ok(session_used(81.0, None)),
        ]);
        let notifier = FakeNotifier::default();
        let scheduler = Scheduler::new(
            config(10, 80.0),
            acquirer,
            notifier.clone(),
            StateStore::new(dir.path().join("usage.json")),
        );

        run_for(scheduler, Duration::from_secs(35), |_| {}).await;

        assert_eq!(
            notifier.sent.lock().clone(),
            vec![
                "Session usage at 85% (threshold: 80%)".to_string(),
                "Session usage at 81% (threshold: 80%)".to_string(),
            ]
        );
    }

    #[tokio::test(start_paused = true)]
    async fn test_failed_notification_is_retried() {
        let dir = tempfile::tempdir().unwrap();
        let acquirer = FakeAcquirer::new(vec![
            Ok(session_used(95.0, None)),
            Ok(session_used(96.0, None)),
            Ok(session_used(97.0, None)),
        ]);
        let notifier = FakeNotifier::default();
        *notifier.failures_left.lock() = 1;
        let scheduler = Scheduler::new(
            config(10, 80.0),
            acquirer,
            notifier.clone(),
            StateStore::new(dir.path().join("usage.json")),
        );

        run_for(scheduler, Duration::from_secs(25), |_| {}).await;

        assert_eq!(
            notifier.sent.lock().clone(),
            vec!["Session usage at 96% (threshold: 80%)".to_string()]
        );
    }
}
