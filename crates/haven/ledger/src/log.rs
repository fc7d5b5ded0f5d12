use crate::action::{CommitReceipt, CommittedAction, PreparedAction};
use async_trait::async_trait;
use chrono::{DateTime, Duration, Utc};
use haven_types::{HavenError, Principal};
use std::collections::HashMap;
use std::sync::atomic::{AtomicU32, Ordering};
use std::sync::{PoisonError, RwLock};
use thiserror::Error;

/// Errors surfaced by a commit log backend.
#[derive(Debug, Error, Clone, PartialEq, Eq)]
pub enum CommitError {
    /// The backend could not durably commit; the action content is intact
    /// and the submitter may retry at the same sequence number.
    #[error("ledger unavailable: {0}")]
    Unavailable(String),

    /// The reserved sequence number does not match the stream head; the
    /// submitter must re-reserve.
    #[error("out-of-order commit: expected seq {expected}, got {got}")]
    SequenceConflict { expected: u64, got: u64 },
}

impl From<CommitError> for HavenError {
    fn from(value: CommitError) -> Self {
        match value {
            CommitError::Unavailable(msg) => HavenError::CommitFailed(msg),
            CommitError::SequenceConflict { expected, got } => {
                HavenError::SequenceConflict { expected, got }
            }
        }
    }
}

/// The external ledger boundary: atomic, ordered, durable commit of one
/// accepted action at a time per signing identity. Different identities may
/// commit in parallel; within one identity, commits observe reservation
/// order.
#[async_trait]
pub trait CommitLog: Send + Sync {
    /// Durably append one prepared action. Blocks the calling flow until
    /// the commit is acknowledged.
    async fn commit(&self, prepared: PreparedAction) -> Result<CommitReceipt, CommitError>;

    /// Number of committed actions in one identity's stream.
    async fn stream_len(&self, identity: &Principal) -> u64;

    /// All committed actions for one identity, in sequence order.
    async fn entries_for(&self, identity: &Principal) -> Vec<CommittedAction>;

    /// Total committed actions across all identities.
    async fn len(&self) -> u64;
}

/// In-memory commit log used for tests, local runs, and embedding.
///
/// Each identity owns a stream; a commit is accepted only when its sequence
/// number is exactly `stream.len() + 1`, entries are hash-chained with
/// blake3, and commit timestamps are strictly increasing across the log.
pub struct InMemoryCommitLog {
    inner: RwLock<LogState>,
}

#[derive(Default)]
struct LogState {
    streams: HashMap<Principal, Vec<CommittedAction>>,
    offset: u64,
    last_commit: Option<DateTime<Utc>>,
}

impl InMemoryCommitLog {
    pub fn new() -> Self {
        Self {
            inner: RwLock::new(LogState::default()),
        }
    }
}

impl Default for InMemoryCommitLog {
    fn default() -> Self {
        Self::new()
    }
}

#[async_trait]
impl CommitLog for InMemoryCommitLog {
    async fn commit(&self, prepared: PreparedAction) -> Result<CommitReceipt, CommitError> {
        let mut state = self.inner.write().unwrap_or_else(PoisonError::into_inner);

        let stream = state.streams.entry(prepared.identity).or_default();
        let expected = stream.len() as u64 + 1;
        if prepared.seq != expected {
            return Err(CommitError::SequenceConflict {
                expected,
                got: prepared.seq,
            });
        }

        let prev_hash = stream.last().map(|entry| entry.entry_hash);
        let entry_hash = entry_hash(&prepared, prev_hash);

        let committed_at = next_commit_time(state.last_commit);
        state.last_commit = Some(committed_at);
        state.offset += 1;
        let offset = state.offset;

        let entry = CommittedAction {
            identity: prepared.identity,
            seq: prepared.seq,
            action: prepared.action,
            offset,
            committed_at,
            entry_hash,
            prev_hash,
        };

        state
            .streams
            .entry(entry.identity)
            .or_default()
            .push(entry.clone());

        Ok(CommitReceipt {
            offset,
            seq: entry.seq,
            committed_at,
            entry_hash,
        })
    }

    async fn stream_len(&self, identity: &Principal) -> u64 {
        let state = self.inner.read().unwrap_or_else(PoisonError::into_inner);
        state
            .streams
            .get(identity)
            .map(|stream| stream.len() as u64)
            .unwrap_or(0)
    }

    async fn entries_for(&self, identity: &Principal) -> Vec<CommittedAction> {
        let state = self.inner.read().unwrap_or_else(PoisonError::into_inner);
        state.streams.get(identity).cloned().unwrap_or_default()
    }

    async fn len(&self) -> u64 {
        let state = self.inner.read().unwrap_or_else(PoisonError::into_inner);
        state.offset
    }
}

fn entry_hash(prepared: &PreparedAction, prev_hash: Option<[u8; 32]>) -> [u8; 32] {
    let mut hasher = blake3::Hasher::new();
    hasher.update(b"haven-commit-v1:");
    if let Some(prev) = prev_hash {
        hasher.update(&prev);
    }
    let encoded = serde_json::to_vec(prepared).unwrap_or_default();
    hasher.update(&encoded);
    *hasher.finalize().as_bytes()
}

/// Commit timestamps are authoritative for ordering-sensitive consumers, so
/// they advance strictly even when the wall clock does not.
fn next_commit_time(last: Option<DateTime<Utc>>) -> DateTime<Utc> {
    let now = Utc::now();
    match last {
        Some(prev) if now <= prev => prev + Duration::milliseconds(1),
        _ => now,
    }
}

/// Fault-injection wrapper: fails the first `failures` commits with
/// `Unavailable`, then delegates. Lets tests exercise the submitter's
/// retry and reservation-return behavior.
pub struct FlakyCommitLog {
    inner: InMemoryCommitLog,
    failures: AtomicU32,
}

impl FlakyCommitLog {
    pub fn failing(failures: u32) -> Self {
        Self {
            inner: InMemoryCommitLog::new(),
            failures: AtomicU32::new(failures),
        }
    }
}

#[async_trait]
impl CommitLog for FlakyCommitLog {
    async fn commit(&self, prepared: PreparedAction) -> Result<CommitReceipt, CommitError> {
        let remaining = self.failures.load(Ordering::SeqCst);
        if remaining > 0 {
            self.failures.store(remaining - 1, Ordering::SeqCst);
            return Err(CommitError::Unavailable(
                "injected commit failure".to_string(),
            ));
        }
        self.inner.commit(prepared).await
    }

    async fn stream_len(&self, identity: &Principal) -> u64 {
        self.inner.stream_len(identity).await
    }

    async fn entries_for(&self, identity: &Principal) -> Vec<CommittedAction> {
        self.inner.entries_for(identity).await
    }

    async fn len(&self) -> u64 {
        self.inner.len().await
    }
}
