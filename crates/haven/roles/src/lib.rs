//! Haven Roles - capability grants per principal
//!
//! Pure data plus queries: membership checks and idempotent, monotonic
//! grants. Revocation is out of scope. External role labels are normalized
//! once at the boundary by [`normalize_labels`], never inline.

#![deny(unsafe_code)]

use chrono::{DateTime, Utc};
use haven_types::{HavenError, HavenResult, Principal, Role, RoleGrant};
use std::collections::{BTreeMap, HashMap};
use std::sync::{PoisonError, RwLock, RwLockReadGuard, RwLockWriteGuard};
use tracing::info;

type GrantMap = HashMap<Principal, BTreeMap<Role, DateTime<Utc>>>;

/// Holds the capability grants: principal -> set of role labels.
///
/// Reads reflect the latest applied grant, including one made earlier in
/// the same logical operation (read-your-writes).
pub struct RoleStore {
    inner: RwLock<GrantMap>,
}

impl RoleStore {
    pub fn new() -> Self {
        Self {
            inner: RwLock::new(HashMap::new()),
        }
    }

    // Grants stay well-formed across a panicking reader, so poison is
    // recoverable rather than fatal.
    fn read(&self) -> RwLockReadGuard<'_, GrantMap> {
        self.inner.read().unwrap_or_else(PoisonError::into_inner)
    }

    fn write(&self) -> RwLockWriteGuard<'_, GrantMap> {
        self.inner.write().unwrap_or_else(PoisonError::into_inner)
    }

    /// Idempotent insert. Returns `true` when the grant is new; granting an
    /// already-held role is a no-op, not an error.
    pub fn grant(&self, principal: Principal, role: Role, granted_at: DateTime<Utc>) -> bool {
        let mut inner = self.write();
        let roles = inner.entry(principal).or_default();
        if roles.contains_key(&role) {
            return false;
        }
        roles.insert(role, granted_at);
        info!(principal = %principal.short(), role = %role, "role granted");
        true
    }

    pub fn has_role(&self, principal: &Principal, role: Role) -> bool {
        self.read()
            .get(principal)
            .map(|roles| roles.contains_key(&role))
            .unwrap_or(false)
    }

    /// All roles held by the principal, in stable order.
    pub fn roles_of(&self, principal: &Principal) -> Vec<Role> {
        self.read()
            .get(principal)
            .map(|roles| roles.keys().copied().collect())
            .unwrap_or_default()
    }

    /// Grants held by the principal with their grant times, for audit output.
    pub fn grants_of(&self, principal: &Principal) -> Vec<RoleGrant> {
        self.read()
            .get(principal)
            .map(|roles| {
                roles
                    .iter()
                    .map(|(role, granted_at)| RoleGrant {
                        principal: *principal,
                        role: *role,
                        granted_at: *granted_at,
                    })
                    .collect()
            })
            .unwrap_or_default()
    }
}

impl Default for RoleStore {
    fn default() -> Self {
        Self::new()
    }
}

/// Normalize a batch of externally-sourced role labels: canonicalize casing,
/// deduplicate preserving first occurrence, and parse into the closed role
/// set. An unknown label rejects the whole batch rather than partially
/// applying it.
pub fn normalize_labels(labels: &[String]) -> HavenResult<Vec<Role>> {
    if labels.is_empty() {
        return Err(HavenError::Validation(
            "no role labels to reconcile".to_string(),
        ));
    }

    let mut roles = Vec::new();
    for label in labels {
        let role: Role = label.parse()?;
        if !roles.contains(&role) {
            roles.push(role);
        }
    }
    Ok(roles)
}
