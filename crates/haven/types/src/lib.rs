//! Haven Types - shared domain types for the SOS coordination core
//!
//! Everything the other haven crates agree on lives here: principals and
//! roles, the case record and its status machine vocabulary, engagement and
//! event records, and the error taxonomy surfaced at the action boundary.

#![deny(unsafe_code)]

mod case;
mod error;
mod event;
mod principal;
mod role;

pub use case::{Case, CaseId, CaseStats, CaseStatus, CaseView, GeoLocation, NearbyCase};
pub use error::{DenyReason, HavenError, HavenResult};
pub use event::{ActionKind, CaseEvent, EngagementEntry, EngagementKind, RoleGrant};
pub use principal::Principal;
pub use role::Role;
