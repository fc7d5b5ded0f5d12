use crate::case::{CaseId, CaseStatus};
use crate::principal::Principal;
use crate::role::Role;
use chrono::{DateTime, Utc};
use serde::{Deserialize, Serialize};
use std::fmt;

/// The closed set of actions recognized by the authorization guard and the
/// commit path.
#[derive(Clone, Copy, Debug, PartialEq, Eq, Hash, Serialize, Deserialize)]
pub enum ActionKind {
    Create,
    Acknowledge,
    Escalate,
    Resolve,
    MarkFalseAlarm,
    AssignVolunteer,
    Accept,
    Report,
    Query,
    GrantRole,
}

impl fmt::Display for ActionKind {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        let label = match self {
            ActionKind::Create => "create",
            ActionKind::Acknowledge => "acknowledge",
            ActionKind::Escalate => "escalate",
            ActionKind::Resolve => "resolve",
            ActionKind::MarkFalseAlarm => "mark_false_alarm",
            ActionKind::AssignVolunteer => "assign_volunteer",
            ActionKind::Accept => "accept",
            ActionKind::Report => "report",
            ActionKind::Query => "query",
            ActionKind::GrantRole => "grant_role",
        };
        write!(f, "{}", label)
    }
}

/// Kinds of volunteer engagement with a case.
#[derive(Clone, Copy, Debug, PartialEq, Eq, Hash, Serialize, Deserialize)]
pub enum EngagementKind {
    Accept,
    Report,
    Query,
}

impl fmt::Display for EngagementKind {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        let label = match self {
            EngagementKind::Accept => "accept",
            EngagementKind::Report => "report",
            EngagementKind::Query => "query",
        };
        write!(f, "{}", label)
    }
}

/// One entry in a case's append-only action history.
#[derive(Clone, Debug, Serialize, Deserialize)]
pub struct CaseEvent {
    pub event_id: uuid::Uuid,
    pub case_id: CaseId,
    pub kind: ActionKind,
    pub actor: Principal,
    pub status_after: CaseStatus,
    /// Ledger commit time, never caller-supplied.
    pub committed_at: DateTime<Utc>,
}

impl CaseEvent {
    pub fn new(
        case_id: CaseId,
        kind: ActionKind,
        actor: Principal,
        status_after: CaseStatus,
        committed_at: DateTime<Utc>,
    ) -> Self {
        Self {
            event_id: uuid::Uuid::new_v4(),
            case_id,
            kind,
            actor,
            status_after,
            committed_at,
        }
    }
}

/// One entry in the volunteer engagement log.
#[derive(Clone, Debug, Serialize, Deserialize)]
pub struct EngagementEntry {
    pub case_id: CaseId,
    pub volunteer: Principal,
    pub kind: EngagementKind,
    /// Ledger commit time, never caller-supplied.
    pub committed_at: DateTime<Utc>,
}

/// A role grant as it appears in audit output.
#[derive(Clone, Debug, Serialize, Deserialize)]
pub struct RoleGrant {
    pub principal: Principal,
    pub role: Role,
    pub granted_at: DateTime<Utc>,
}
