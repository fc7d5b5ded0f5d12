use crate::action::{Action, CommitReceipt, PreparedAction};
use crate::log::{CommitError, CommitLog};
use haven_types::{HavenError, HavenResult, Principal};
use std::collections::HashMap;
use std::sync::Arc;
use std::time::Duration;
use tokio::sync::Mutex;
use tracing::{debug, warn};

/// Bounded retry for `CommitFailed` only. Every other failure surfaces
/// immediately.
#[derive(Clone, Copy, Debug)]
pub struct RetryPolicy {
    pub max_attempts: u32,
    pub base_delay: Duration,
}

impl Default for RetryPolicy {
    fn default() -> Self {
        Self {
            max_attempts: 3,
            base_delay: Duration::from_millis(50),
        }
    }
}

/// Serializes outbound mutating actions per signing identity.
///
/// Each identity owns a sequence lane guarded by an async mutex that is
/// held from reservation through dispatch: bursts of same-identity actions
/// commit in the order their locks were acquired, gapless on success, and a
/// failed commit returns its reservation so the retry reuses the same
/// sequence number. Different identities proceed in parallel.
pub struct ActionSubmitter {
    log: Arc<dyn CommitLog>,
    lanes: Mutex<HashMap<Principal, Arc<Mutex<u64>>>>,
    retry: RetryPolicy,
}

impl ActionSubmitter {
    pub fn new(log: Arc<dyn CommitLog>) -> Self {
        Self::with_retry(log, RetryPolicy::default())
    }

    pub fn with_retry(log: Arc<dyn CommitLog>, retry: RetryPolicy) -> Self {
        Self {
            log,
            lanes: Mutex::new(HashMap::new()),
            retry,
        }
    }

    pub fn log(&self) -> Arc<dyn CommitLog> {
        Arc::clone(&self.log)
    }

    /// Commit one action for `identity`, blocking until the ledger
    /// acknowledges durable commit.
    pub async fn submit(&self, identity: Principal, action: Action) -> HavenResult<CommitReceipt> {
        let lane = self.lane(&identity).await;
        let mut last_committed = lane.lock().await;

        let mut seq = *last_committed + 1;
        let mut attempt = 0u32;

        loop {
            attempt += 1;
            let prepared = PreparedAction {
                identity,
                seq,
                action: action.clone(),
            };

            match self.log.commit(prepared).await {
                Ok(receipt) => {
                    *last_committed = seq;
                    debug!(
                        identity = %identity.short(),
                        seq,
                        offset = receipt.offset,
                        "action committed"
                    );
                    return Ok(receipt);
                }
                Err(CommitError::Unavailable(msg)) => {
                    if attempt >= self.retry.max_attempts {
                        warn!(identity = %identity.short(), seq, attempts = attempt, "commit abandoned");
                        return Err(HavenError::CommitFailed(msg));
                    }
                    // The reservation stays with us: the retry goes out at
                    // the same sequence number.
                    let delay = self.retry.base_delay * 2u32.saturating_pow(attempt - 1);
                    warn!(identity = %identity.short(), seq, attempt, "commit failed, retrying");
                    tokio::time::sleep(delay).await;
                }
                Err(CommitError::SequenceConflict { expected, got }) => {
                    if attempt >= self.retry.max_attempts {
                        return Err(HavenError::SequenceConflict { expected, got });
                    }
                    // The ledger knows better than our lane counter (e.g. a
                    // restart lost it); re-reserve at its expectation.
                    warn!(
                        identity = %identity.short(),
                        expected,
                        got,
                        "sequence conflict, re-reserving"
                    );
                    *last_committed = expected - 1;
                    seq = expected;
                }
            }
        }
    }

    async fn lane(&self, identity: &Principal) -> Arc<Mutex<u64>> {
        let mut lanes = self.lanes.lock().await;
        lanes
            .entry(*identity)
            .or_insert_with(|| Arc::new(Mutex::new(0)))
            .clone()
    }
}
