//! Haven Guard - decides allow/deny for (principal, action, case)
//!
//! Rules are evaluated in precedence order, first match wins, and every
//! denial carries a stable machine-readable reason rather than a raw error
//! string. The guard is pure decision logic over the role store and the
//! engagement log; policy side effects (self-healing grants, service
//! identity provisioning) live in the service so that every grant still
//! flows through the commit path.

#![deny(unsafe_code)]

use haven_engagement::EngagementLog;
use haven_roles::RoleStore;
use haven_types::{
    ActionKind, Case, DenyReason, HavenError, HavenResult, Principal, Role,
};
use std::sync::Arc;
use tracing::debug;

pub struct AuthorizationGuard {
    roles: Arc<RoleStore>,
    engagement: Arc<EngagementLog>,
}

impl AuthorizationGuard {
    pub fn new(roles: Arc<RoleStore>, engagement: Arc<EngagementLog>) -> Self {
        Self { roles, engagement }
    }

    /// Authorize `action` by `principal` against `case` (absent only for
    /// actions that do not target an existing case).
    pub fn authorize(
        &self,
        principal: &Principal,
        action: ActionKind,
        case: Option<&Case>,
    ) -> HavenResult<()> {
        let result = self.evaluate(principal, action, case);
        if let Err(error) = &result {
            debug!(
                principal = %principal.short(),
                %action,
                code = error.code(),
                "action denied"
            );
        }
        result
    }

    fn evaluate(
        &self,
        principal: &Principal,
        action: ActionKind,
        case: Option<&Case>,
    ) -> HavenResult<()> {
        match action {
            ActionKind::Create => self.require_role(principal, Role::User),

            ActionKind::MarkFalseAlarm => {
                let case = required(case)?;
                if case.victim == *principal {
                    Ok(())
                } else {
                    Err(HavenError::NotAuthorized(DenyReason::NotOwner))
                }
            }

            ActionKind::Acknowledge
            | ActionKind::Escalate
            | ActionKind::Resolve
            | ActionKind::AssignVolunteer => self.require_role(principal, Role::Ngo),

            ActionKind::Accept => {
                self.require_role(principal, Role::Volunteer)?;
                let case = required(case)?;
                if case.status.is_terminal() {
                    Err(HavenError::NotAuthorized(DenyReason::InvalidState))
                } else {
                    Ok(())
                }
            }

            ActionKind::Report => {
                let case = required(case)?;
                if self.engagement.has_accepted(case.id, principal) {
                    Ok(())
                } else {
                    Err(HavenError::MustAcceptFirst)
                }
            }

            // Read-only for any principal, including zero roles; still
            // logged as an engagement entry for audit.
            ActionKind::Query => Ok(()),

            // Unrestricted, matching the source role manager; deployments
            // gate this at the HTTP boundary if they need to.
            ActionKind::GrantRole => Ok(()),
        }
    }

    fn require_role(&self, principal: &Principal, role: Role) -> HavenResult<()> {
        if self.roles.has_role(principal, role) {
            Ok(())
        } else {
            Err(HavenError::NotAuthorized(DenyReason::WrongRole))
        }
    }
}

fn required(case: Option<&Case>) -> HavenResult<&Case> {
    case.ok_or_else(|| HavenError::NotFound("case not found".to_string()))
}
