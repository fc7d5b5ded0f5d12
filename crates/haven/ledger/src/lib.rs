//! Haven Ledger - the commit boundary for mutating actions
//!
//! This crate provides:
//! - the [`Action`] payload vocabulary shared by every mutating call
//! - the [`CommitLog`] trait: atomic, ordered, durable commit of one
//!   accepted action at a time per signing identity
//! - an in-memory commit log for tests, demos, and embedding
//! - the [`ActionSubmitter`], which serializes same-identity submissions
//!   behind per-identity sequence reservations so concurrent callers never
//!   collide and a failed commit never leaves a silently consumed gap

#![deny(unsafe_code)]

mod action;
mod log;
mod submitter;

pub use action::{Action, CommitReceipt, CommittedAction, PreparedAction};
pub use log::{CommitError, CommitLog, FlakyCommitLog, InMemoryCommitLog};
pub use submitter::{ActionSubmitter, RetryPolicy};
