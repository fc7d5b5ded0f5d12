use chrono::{DateTime, Utc};
use haven_types::{ActionKind, CaseId, Principal, Role};
use serde::{Deserialize, Serialize};

/// The payload of one mutating action against the core.
#[derive(Clone, Debug, PartialEq, Serialize, Deserialize)]
pub enum Action {
    CreateCase {
        victim: Principal,
        latitude: String,
        longitude: String,
    },
    Acknowledge {
        case_id: CaseId,
    },
    Escalate {
        case_id: CaseId,
    },
    Resolve {
        case_id: CaseId,
    },
    MarkFalseAlarm {
        case_id: CaseId,
    },
    AssignVolunteer {
        case_id: CaseId,
        volunteer: Principal,
    },
    AcceptCase {
        case_id: CaseId,
    },
    SubmitReport {
        case_id: CaseId,
    },
    QueryCase {
        case_id: CaseId,
    },
    GrantRole {
        grantee: Principal,
        role: Role,
    },
}

impl Action {
    pub fn kind(&self) -> ActionKind {
        match self {
            Action::CreateCase { .. } => ActionKind::Create,
            Action::Acknowledge { .. } => ActionKind::Acknowledge,
            Action::Escalate { .. } => ActionKind::Escalate,
            Action::Resolve { .. } => ActionKind::Resolve,
            Action::MarkFalseAlarm { .. } => ActionKind::MarkFalseAlarm,
            Action::AssignVolunteer { .. } => ActionKind::AssignVolunteer,
            Action::AcceptCase { .. } => ActionKind::Accept,
            Action::SubmitReport { .. } => ActionKind::Report,
            Action::QueryCase { .. } => ActionKind::Query,
            Action::GrantRole { .. } => ActionKind::GrantRole,
        }
    }
}

/// An action with its signing identity and reserved per-identity sequence
/// number, ready for dispatch.
#[derive(Clone, Debug, Serialize, Deserialize)]
pub struct PreparedAction {
    pub identity: Principal,
    pub seq: u64,
    pub action: Action,
}

/// Proof of durable commit, returned by the ledger.
#[derive(Clone, Copy, Debug, PartialEq, Eq, Serialize, Deserialize)]
pub struct CommitReceipt {
    /// Global append position across all identities.
    pub offset: u64,
    /// Per-identity sequence number, strictly increasing and gapless.
    pub seq: u64,
    /// Authoritative commit time; the only timestamp the stores trust.
    pub committed_at: DateTime<Utc>,
    pub entry_hash: [u8; 32],
}

/// A committed action as read back from a ledger stream.
#[derive(Clone, Debug, Serialize, Deserialize)]
pub struct CommittedAction {
    pub identity: Principal,
    pub seq: u64,
    pub action: Action,
    pub offset: u64,
    pub committed_at: DateTime<Utc>,
    pub entry_hash: [u8; 32],
    pub prev_hash: Option<[u8; 32]>,
}
