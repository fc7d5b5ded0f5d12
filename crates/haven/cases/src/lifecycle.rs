//! Transition rules for the case status machine.
//!
//! `Pending -> {Acknowledged, Escalated, FalseAlarm}`,
//! `Acknowledged -> {Escalated, Resolved}`, `Escalated -> {Resolved}`;
//! `Resolved` and `FalseAlarm` absorb. Escalation is reachable from both
//! `Pending` and `Acknowledged` because age is measured from `created_at`
//! regardless of acknowledgment.

use haven_types::{ActionKind, Case, CaseStatus, HavenError, HavenResult, Principal};

/// Outcome of planning an action against the current case state.
#[derive(Clone, Copy, Debug, PartialEq, Eq)]
pub enum Transition {
    /// Apply the action, moving the case to this status.
    To(CaseStatus),
    /// The action changes no status field but is legal (e.g. volunteer
    /// assignment on an open case).
    Unchanged,
    /// The action is absorbed as a guarded no-op returning success
    /// (re-escalation, re-acknowledgment by the same principal).
    Noop,
}

/// Validate `action` by `actor` against the case's current state.
///
/// Fails with `InvalidState` when the transition is illegal from the
/// current status; such failures are terminal for the call and never
/// retried.
pub fn plan(case: &Case, actor: &Principal, action: ActionKind) -> HavenResult<Transition> {
    let invalid = || HavenError::InvalidState {
        from: case.status,
        action,
    };

    match action {
        ActionKind::Acknowledge => match case.status {
            CaseStatus::Pending => Ok(Transition::To(CaseStatus::Acknowledged)),
            // First write wins; the same principal re-acknowledging is
            // absorbed, anyone else re-acknowledging is an error.
            CaseStatus::Acknowledged if case.acknowledged_by.as_ref() == Some(actor) => {
                Ok(Transition::Noop)
            }
            _ => Err(invalid()),
        },
        ActionKind::Escalate => match case.status {
            CaseStatus::Pending | CaseStatus::Acknowledged => {
                Ok(Transition::To(CaseStatus::Escalated))
            }
            // The scheduler must be safely re-entrant.
            CaseStatus::Escalated => Ok(Transition::Noop),
            _ => Err(invalid()),
        },
        ActionKind::Resolve => match case.status {
            CaseStatus::Acknowledged | CaseStatus::Escalated => {
                Ok(Transition::To(CaseStatus::Resolved))
            }
            _ => Err(invalid()),
        },
        ActionKind::MarkFalseAlarm => match case.status {
            CaseStatus::Pending => Ok(Transition::To(CaseStatus::FalseAlarm)),
            _ => Err(invalid()),
        },
        ActionKind::AssignVolunteer => {
            if case.status.is_terminal() {
                Err(invalid())
            } else {
                Ok(Transition::Unchanged)
            }
        }
        // Creation and engagement actions do not move the status machine.
        _ => Ok(Transition::Unchanged),
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use chrono::Utc;
    use haven_types::{CaseId, GeoLocation};

    fn case(status: CaseStatus) -> Case {
        Case {
            id: CaseId(1),
            victim: Principal::from_bytes([1; 20]),
            status,
            location: GeoLocation::new("28.6139", "77.2090"),
            created_at: Utc::now(),
            assigned_volunteer: None,
            acknowledged_by: None,
        }
    }

    fn ngo() -> Principal {
        Principal::from_bytes([2; 20])
    }

    #[test]
    fn pending_acknowledges_once() {
        let c = case(CaseStatus::Pending);
        assert_eq!(
            plan(&c, &ngo(), ActionKind::Acknowledge).unwrap(),
            Transition::To(CaseStatus::Acknowledged)
        );
    }

    #[test]
    fn reacknowledge_same_principal_is_noop_other_is_error() {
        let mut c = case(CaseStatus::Acknowledged);
        c.acknowledged_by = Some(ngo());

        assert_eq!(
            plan(&c, &ngo(), ActionKind::Acknowledge).unwrap(),
            Transition::Noop
        );

        let other = Principal::from_bytes([3; 20]);
        assert!(matches!(
            plan(&c, &other, ActionKind::Acknowledge),
            Err(HavenError::InvalidState { .. })
        ));
    }

    #[test]
    fn escalate_from_pending_and_acknowledged() {
        for status in [CaseStatus::Pending, CaseStatus::Acknowledged] {
            assert_eq!(
                plan(&case(status), &ngo(), ActionKind::Escalate).unwrap(),
                Transition::To(CaseStatus::Escalated)
            );
        }
    }

    #[test]
    fn reescalate_is_a_guarded_noop() {
        assert_eq!(
            plan(&case(CaseStatus::Escalated), &ngo(), ActionKind::Escalate).unwrap(),
            Transition::Noop
        );
    }

    #[test]
    fn resolve_requires_acknowledged_or_escalated() {
        for status in [CaseStatus::Acknowledged, CaseStatus::Escalated] {
            assert_eq!(
                plan(&case(status), &ngo(), ActionKind::Resolve).unwrap(),
                Transition::To(CaseStatus::Resolved)
            );
        }
        assert!(plan(&case(CaseStatus::Pending), &ngo(), ActionKind::Resolve).is_err());
    }

    #[test]
    fn false_alarm_only_from_pending() {
        assert_eq!(
            plan(&case(CaseStatus::Pending), &ngo(), ActionKind::MarkFalseAlarm).unwrap(),
            Transition::To(CaseStatus::FalseAlarm)
        );
        for status in [
            CaseStatus::Acknowledged,
            CaseStatus::Escalated,
            CaseStatus::Resolved,
            CaseStatus::FalseAlarm,
        ] {
            assert!(plan(&case(status), &ngo(), ActionKind::MarkFalseAlarm).is_err());
        }
    }

    #[test]
    fn no_transition_out_of_terminal_states() {
        for status in [CaseStatus::Resolved, CaseStatus::FalseAlarm] {
            for action in [
                ActionKind::Acknowledge,
                ActionKind::Escalate,
                ActionKind::Resolve,
                ActionKind::MarkFalseAlarm,
                ActionKind::AssignVolunteer,
            ] {
                assert!(
                    plan(&case(status), &ngo(), action).is_err(),
                    "{action} should be illegal from {status}"
                );
            }
        }
    }

    #[test]
    fn assignment_leaves_status_alone_on_open_cases() {
        for status in [
            CaseStatus::Pending,
            CaseStatus::Acknowledged,
            CaseStatus::Escalated,
        ] {
            assert_eq!(
                plan(&case(status), &ngo(), ActionKind::AssignVolunteer).unwrap(),
                Transition::Unchanged
            );
        }
    }
}
