//! Haven Scheduler - forces time-based transitions on stale cases
//!
//! A periodic process that scans open cases and issues `escalate` through
//! the same authorization/commit path a human caller would use. Age is
//! computed from the immutable `created_at`, so a missed or duplicate tick
//! never double-escalates: escalating an already-`Escalated` case is a
//! guarded no-op downstream. One case's failure never aborts the scan of
//! the rest; a tick that fails entirely is retried at the next interval.

#![deny(unsafe_code)]

use async_trait::async_trait;
use chrono::{DateTime, Duration as ChronoDuration, Utc};
use haven_types::{Case, CaseId, CaseStatus, HavenResult};
use serde::{Deserialize, Serialize};
use std::sync::Arc;
use tokio::sync::{mpsc, RwLock};
use tokio::time::{interval, Duration};
use tracing::{error, info};

/// Scheduler configuration.
#[derive(Clone, Copy, Debug, Serialize, Deserialize)]
pub struct EscalationConfig {
    /// Run the background loop at all.
    #[serde(default = "default_true")]
    pub enabled: bool,

    /// Scan interval in seconds.
    #[serde(default = "default_tick_interval")]
    pub tick_interval_secs: u64,

    /// Single escalation threshold: open cases older than this are forced
    /// to `Escalated`. The 30-minute mark is advisory view coloring only
    /// and never triggers a transition.
    #[serde(default = "default_escalate_after")]
    pub escalate_after_minutes: i64,
}

impl Default for EscalationConfig {
    fn default() -> Self {
        Self {
            enabled: true,
            tick_interval_secs: default_tick_interval(),
            escalate_after_minutes: default_escalate_after(),
        }
    }
}

fn default_true() -> bool {
    true
}

fn default_tick_interval() -> u64 {
    60
}

fn default_escalate_after() -> i64 {
    60
}

/// What the scheduler needs from the rest of the system. The service
/// implements this; ticks re-enter the identical authorization/commit path
/// as human-issued actions.
#[async_trait]
pub trait EscalationTarget: Send + Sync {
    /// Ensure the scheduler's own service identity holds `NGO`
    /// (one-time self-provisioning, audited by the implementation).
    async fn ensure_service_role(&self) -> HavenResult<()>;

    /// All cases in non-terminal status.
    async fn open_cases(&self) -> Vec<Case>;

    /// Issue the escalate action. Returns whether the status changed
    /// (`false` for the guarded already-escalated no-op).
    async fn escalate(&self, case_id: CaseId) -> HavenResult<bool>;
}

/// Outcome of one scan.
#[derive(Clone, Copy, Debug, Default, PartialEq, Eq)]
pub struct TickSummary {
    pub scanned: usize,
    pub escalated: usize,
    pub failed: usize,
}

/// Whether a case in `status` at `age` must be escalated.
pub fn due_for_escalation(status: CaseStatus, age: ChronoDuration, threshold: ChronoDuration) -> bool {
    matches!(status, CaseStatus::Pending | CaseStatus::Acknowledged) && age > threshold
}

/// The periodic escalation process.
pub struct EscalationScheduler {
    config: EscalationConfig,
    target: Arc<dyn EscalationTarget>,
    trigger_tx: mpsc::Sender<()>,
    running: Arc<RwLock<bool>>,
}

impl EscalationScheduler {
    pub fn new(
        config: EscalationConfig,
        target: Arc<dyn EscalationTarget>,
    ) -> (Arc<Self>, mpsc::Receiver<()>) {
        let (trigger_tx, trigger_rx) = mpsc::channel(8);
        let scheduler = Arc::new(Self {
            config,
            target,
            trigger_tx,
            running: Arc::new(RwLock::new(false)),
        });
        (scheduler, trigger_rx)
    }

    /// Request an immediate out-of-band scan.
    pub async fn trigger(&self) {
        let _ = self.trigger_tx.send(()).await;
    }

    /// Run the periodic loop until [`stop`](Self::stop) is called.
    pub async fn start(self: Arc<Self>, mut trigger_rx: mpsc::Receiver<()>) {
        {
            let mut running = self.running.write().await;
            *running = true;
        }

        info!(
            interval_secs = self.config.tick_interval_secs,
            threshold_minutes = self.config.escalate_after_minutes,
            "escalation scheduler started"
        );

        let mut ticker = interval(Duration::from_secs(self.config.tick_interval_secs));
        loop {
            tokio::select! {
                _ = ticker.tick() => {
                    if let Err(e) = self.tick(Utc::now()).await {
                        error!(error = %e, "scheduler tick failed; retrying next interval");
                    }
                }
                Some(_) = trigger_rx.recv() => {
                    if let Err(e) = self.tick(Utc::now()).await {
                        error!(error = %e, "triggered scan failed");
                    }
                }
                else => break,
            }

            let running = self.running.read().await;
            if !*running {
                break;
            }
        }

        info!("escalation scheduler stopped");
    }

    pub async fn stop(&self) {
        let mut running = self.running.write().await;
        *running = false;
    }

    /// One scan at the given clock reading. Pure with respect to time so
    /// tests drive it with a synthetic `now`.
    pub async fn tick(&self, now: DateTime<Utc>) -> HavenResult<TickSummary> {
        self.target.ensure_service_role().await?;

        let threshold = ChronoDuration::minutes(self.config.escalate_after_minutes);
        let mut summary = TickSummary::default();

        for case in self.target.open_cases().await {
            summary.scanned += 1;
            if !due_for_escalation(case.status, case.age(now), threshold) {
                continue;
            }

            match self.target.escalate(case.id).await {
                Ok(true) => {
                    info!(case_id = %case.id, status = %case.status, "auto-escalated stale case");
                    summary.escalated += 1;
                }
                Ok(false) => {}
                Err(e) => {
                    // Isolate the fault; the rest of the scan continues.
                    error!(case_id = %case.id, error = %e, "escalation failed");
                    summary.failed += 1;
                }
            }
        }

        Ok(summary)
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use haven_types::{DenyReason, GeoLocation, HavenError, Principal};
    use std::collections::HashSet;
    use std::sync::atomic::{AtomicBool, AtomicUsize, Ordering};
    use std::sync::Mutex;

    struct MockTarget {
        cases: Mutex<Vec<Case>>,
        failing: HashSet<u64>,
        ensure_fails: AtomicBool,
        ensure_calls: AtomicUsize,
    }

    impl MockTarget {
        fn with_cases(cases: Vec<Case>) -> Self {
            Self {
                cases: Mutex::new(cases),
                failing: HashSet::new(),
                ensure_fails: AtomicBool::new(false),
                ensure_calls: AtomicUsize::new(0),
            }
        }

        fn status_of(&self, id: CaseId) -> CaseStatus {
            self.cases
                .lock()
                .unwrap()
                .iter()
                .find(|c| c.id == id)
                .unwrap()
                .status
        }
    }

    #[async_trait]
    impl EscalationTarget for MockTarget {
        async fn ensure_service_role(&self) -> HavenResult<()> {
            self.ensure_calls.fetch_add(1, Ordering::SeqCst);
            if self.ensure_fails.load(Ordering::SeqCst) {
                Err(HavenError::NotAuthorized(DenyReason::WrongRole))
            } else {
                Ok(())
            }
        }

        async fn open_cases(&self) -> Vec<Case> {
            self.cases
                .lock()
                .unwrap()
                .iter()
                .filter(|c| c.status.is_open())
                .cloned()
                .collect()
        }

        async fn escalate(&self, case_id: CaseId) -> HavenResult<bool> {
            if self.failing.contains(&case_id.0) {
                return Err(HavenError::CommitFailed("unreachable ledger".into()));
            }
            let mut cases = self.cases.lock().unwrap();
            let case = cases.iter_mut().find(|c| c.id == case_id).unwrap();
            if case.status == CaseStatus::Escalated {
                return Ok(false);
            }
            case.status = CaseStatus::Escalated;
            Ok(true)
        }
    }

    fn case(id: u64, status: CaseStatus, age_minutes: i64, now: DateTime<Utc>) -> Case {
        Case {
            id: CaseId(id),
            victim: Principal::from_bytes([1; 20]),
            status,
            location: GeoLocation::new("28.6139", "77.2090"),
            created_at: now - ChronoDuration::minutes(age_minutes),
            assigned_volunteer: None,
            acknowledged_by: None,
        }
    }

    fn scheduler(target: Arc<MockTarget>) -> Arc<EscalationScheduler> {
        let (scheduler, _rx) = EscalationScheduler::new(EscalationConfig::default(), target);
        scheduler
    }

    #[test]
    fn due_only_past_the_threshold_from_pending_or_acknowledged() {
        let threshold = ChronoDuration::minutes(60);
        let over = ChronoDuration::minutes(61);
        let under = ChronoDuration::minutes(59);
        let exactly = ChronoDuration::minutes(60);

        assert!(due_for_escalation(CaseStatus::Pending, over, threshold));
        assert!(due_for_escalation(CaseStatus::Acknowledged, over, threshold));
        assert!(!due_for_escalation(CaseStatus::Pending, under, threshold));
        // Strictly greater than, not at, the threshold.
        assert!(!due_for_escalation(CaseStatus::Pending, exactly, threshold));
        assert!(!due_for_escalation(CaseStatus::Escalated, over, threshold));
        assert!(!due_for_escalation(CaseStatus::Resolved, over, threshold));
    }

    #[tokio::test]
    async fn stale_pending_and_acknowledged_cases_escalate() {
        let now = Utc::now();
        let target = Arc::new(MockTarget::with_cases(vec![
            case(1, CaseStatus::Pending, 61, now),
            case(2, CaseStatus::Acknowledged, 90, now),
            case(3, CaseStatus::Pending, 10, now),
        ]));

        let summary = scheduler(target.clone()).tick(now).await.unwrap();
        assert_eq!(summary.scanned, 3);
        assert_eq!(summary.escalated, 2);
        assert_eq!(summary.failed, 0);

        assert_eq!(target.status_of(CaseId(1)), CaseStatus::Escalated);
        assert_eq!(target.status_of(CaseId(2)), CaseStatus::Escalated);
        assert_eq!(target.status_of(CaseId(3)), CaseStatus::Pending);
        assert_eq!(target.ensure_calls.load(Ordering::SeqCst), 1);
    }

    #[tokio::test]
    async fn replaying_a_tick_changes_nothing_further() {
        let now = Utc::now();
        let target = Arc::new(MockTarget::with_cases(vec![case(
            1,
            CaseStatus::Pending,
            61,
            now,
        )]));
        let scheduler = scheduler(target.clone());

        let first = scheduler.tick(now).await.unwrap();
        assert_eq!(first.escalated, 1);

        let second = scheduler.tick(now).await.unwrap();
        assert_eq!(second.escalated, 0);
        assert_eq!(second.failed, 0);
        assert_eq!(target.status_of(CaseId(1)), CaseStatus::Escalated);
    }

    #[tokio::test]
    async fn one_failing_case_does_not_abort_the_scan() {
        let now = Utc::now();
        let mut target = MockTarget::with_cases(vec![
            case(1, CaseStatus::Pending, 70, now),
            case(2, CaseStatus::Pending, 70, now),
            case(3, CaseStatus::Pending, 70, now),
        ]);
        target.failing.insert(2);
        let target = Arc::new(target);

        let summary = scheduler(target.clone()).tick(now).await.unwrap();
        assert_eq!(summary.escalated, 2);
        assert_eq!(summary.failed, 1);
        assert_eq!(target.status_of(CaseId(1)), CaseStatus::Escalated);
        assert_eq!(target.status_of(CaseId(2)), CaseStatus::Pending);
        assert_eq!(target.status_of(CaseId(3)), CaseStatus::Escalated);
    }

    #[tokio::test]
    async fn ensure_failure_fails_the_whole_tick() {
        let now = Utc::now();
        let target = MockTarget::with_cases(vec![case(1, CaseStatus::Pending, 90, now)]);
        target.ensure_fails.store(true, Ordering::SeqCst);
        let target = Arc::new(target);

        assert!(scheduler(target.clone()).tick(now).await.is_err());
        assert_eq!(target.status_of(CaseId(1)), CaseStatus::Pending);
    }
}
