//! Haven Cases - the case lifecycle state machine and its store
//!
//! The store exclusively owns case records and their append-only action
//! history. Transitions are validated by [`lifecycle`] both as an advisory
//! pre-check before submission and authoritatively under the store's write
//! lock at apply time, so a commit that races another identity's transition
//! is rejected (or absorbed as a guarded no-op) rather than regressing state.

#![deny(unsafe_code)]

pub mod geo;
pub mod lifecycle;
mod store;

pub use lifecycle::Transition;
pub use store::{Applied, CaseStore};
