//! Haven Service - the narrow action interface over the coordination core
//!
//! [`HavenService`] is what external callers (HTTP, CLI, the escalation
//! scheduler) invoke: one call per action, synchronous request/response.
//! Every mutating call runs guard -> advisory pre-check -> ledger commit ->
//! authoritative apply, in that order; read-only queries never touch the
//! submitter. The crate also carries the REST layer, configuration, and
//! the `havend` daemon binary.

#![deny(unsafe_code)]

pub mod api;
pub mod config;
pub mod error;
pub mod server;
mod service;

pub use config::HavenConfig;
pub use service::{HavenService, ServiceOptions};
