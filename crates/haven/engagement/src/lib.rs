//! Haven Engagement - which volunteers engaged a case, and in what order
//!
//! An append-only log, independent of the case's own status field but gated
//! by it at the authorization layer. The sequence rule per (case, volunteer)
//! is: `Accept` must precede any `Report`; a second `Accept` is rejected;
//! `Query` has no precondition. Entries carry ledger commit timestamps,
//! never caller-supplied ones.

#![deny(unsafe_code)]

use chrono::{DateTime, Utc};
use haven_types::{CaseId, EngagementEntry, EngagementKind, HavenError, HavenResult, Principal};
use std::collections::{HashMap, HashSet};
use std::sync::{PoisonError, RwLock, RwLockReadGuard, RwLockWriteGuard};
use tracing::info;

/// Append-only volunteer engagement log, keyed by case id.
///
/// References cases by id only; it never mutates a case.
pub struct EngagementLog {
    inner: RwLock<LogState>,
}

#[derive(Default)]
struct LogState {
    entries: Vec<EngagementEntry>,
    /// Distinct volunteers with an Accept entry per case, in first-accept
    /// order.
    accepted: HashMap<CaseId, Vec<Principal>>,
    accepted_index: HashSet<(CaseId, Principal)>,
}

impl EngagementLog {
    pub fn new() -> Self {
        Self {
            inner: RwLock::new(LogState::default()),
        }
    }

    fn read(&self) -> RwLockReadGuard<'_, LogState> {
        self.inner.read().unwrap_or_else(PoisonError::into_inner)
    }

    fn write(&self) -> RwLockWriteGuard<'_, LogState> {
        self.inner.write().unwrap_or_else(PoisonError::into_inner)
    }

    /// Record an Accept. A second Accept by the same volunteer for the same
    /// case is rejected; distinct volunteers accept independently.
    pub fn record_accept(
        &self,
        case_id: CaseId,
        volunteer: Principal,
        committed_at: DateTime<Utc>,
    ) -> HavenResult<EngagementEntry> {
        let mut state = self.write();
        if state.accepted_index.contains(&(case_id, volunteer)) {
            return Err(HavenError::AlreadyAccepted);
        }

        state.accepted_index.insert((case_id, volunteer));
        state.accepted.entry(case_id).or_default().push(volunteer);

        let entry = append(&mut state, case_id, volunteer, EngagementKind::Accept, committed_at);
        info!(case_id = %case_id, volunteer = %volunteer.short(), "case accepted");
        Ok(entry)
    }

    /// Record a Report; requires a prior Accept by the same volunteer.
    pub fn record_report(
        &self,
        case_id: CaseId,
        volunteer: Principal,
        committed_at: DateTime<Utc>,
    ) -> HavenResult<EngagementEntry> {
        let mut state = self.write();
        if !state.accepted_index.contains(&(case_id, volunteer)) {
            return Err(HavenError::MustAcceptFirst);
        }

        let entry = append(&mut state, case_id, volunteer, EngagementKind::Report, committed_at);
        info!(case_id = %case_id, volunteer = %volunteer.short(), "report submitted");
        Ok(entry)
    }

    /// Record a Query; no precondition, does not affect Report eligibility.
    pub fn record_query(
        &self,
        case_id: CaseId,
        principal: Principal,
        committed_at: DateTime<Utc>,
    ) -> EngagementEntry {
        let mut state = self.write();
        append(&mut state, case_id, principal, EngagementKind::Query, committed_at)
    }

    pub fn has_accepted(&self, case_id: CaseId, volunteer: &Principal) -> bool {
        self.read().accepted_index.contains(&(case_id, *volunteer))
    }

    /// Distinct accepting volunteers in first-accept order.
    pub fn accepted_volunteers(&self, case_id: CaseId) -> Vec<Principal> {
        self.read()
            .accepted
            .get(&case_id)
            .cloned()
            .unwrap_or_default()
    }

    /// All entries for a case, in append order.
    pub fn logs_by_case(&self, case_id: CaseId) -> Vec<EngagementEntry> {
        self.read()
            .entries
            .iter()
            .filter(|entry| entry.case_id == case_id)
            .cloned()
            .collect()
    }

    pub fn len(&self) -> usize {
        self.read().entries.len()
    }

    pub fn is_empty(&self) -> bool {
        self.len() == 0
    }
}

impl Default for EngagementLog {
    fn default() -> Self {
        Self::new()
    }
}

fn append(
    state: &mut LogState,
    case_id: CaseId,
    volunteer: Principal,
    kind: EngagementKind,
    committed_at: DateTime<Utc>,
) -> EngagementEntry {
    let entry = EngagementEntry {
        case_id,
        volunteer,
        kind,
        committed_at,
    };
    state.entries.push(entry.clone());
    entry
}

#[cfg(test)]
mod tests {
    use super::*;

    fn v(seed: u8) -> Principal {
        Principal::from_bytes([seed; 20])
    }

    #[test]
    fn accept_then_report_succeeds() {
        let log = EngagementLog::new();
        log.record_accept(CaseId(1), v(1), Utc::now()).unwrap();
        log.record_report(CaseId(1), v(1), Utc::now()).unwrap();

        let kinds: Vec<_> = log
            .logs_by_case(CaseId(1))
            .iter()
            .map(|e| e.kind)
            .collect();
        assert_eq!(kinds, vec![EngagementKind::Accept, EngagementKind::Report]);
    }

    #[test]
    fn report_without_accept_is_rejected() {
        let log = EngagementLog::new();
        assert_eq!(
            log.record_report(CaseId(1), v(1), Utc::now()).unwrap_err(),
            HavenError::MustAcceptFirst
        );
    }

    #[test]
    fn second_accept_by_same_volunteer_is_rejected() {
        let log = EngagementLog::new();
        log.record_accept(CaseId(1), v(1), Utc::now()).unwrap();
        assert_eq!(
            log.record_accept(CaseId(1), v(1), Utc::now()).unwrap_err(),
            HavenError::AlreadyAccepted
        );
    }

    #[test]
    fn acceptance_is_per_case_and_per_volunteer() {
        let log = EngagementLog::new();
        log.record_accept(CaseId(1), v(1), Utc::now()).unwrap();

        // Same volunteer, different case: allowed.
        log.record_accept(CaseId(2), v(1), Utc::now()).unwrap();
        // Different volunteer, same case: allowed, no exclusivity.
        log.record_accept(CaseId(1), v(2), Utc::now()).unwrap();

        assert_eq!(log.accepted_volunteers(CaseId(1)), vec![v(1), v(2)]);
        assert!(log.has_accepted(CaseId(2), &v(1)));
        assert!(!log.has_accepted(CaseId(2), &v(2)));
    }

    #[test]
    fn query_needs_no_accept_and_grants_no_report_right() {
        let log = EngagementLog::new();
        log.record_query(CaseId(1), v(3), Utc::now());

        assert_eq!(
            log.record_report(CaseId(1), v(3), Utc::now()).unwrap_err(),
            HavenError::MustAcceptFirst
        );
        assert_eq!(log.logs_by_case(CaseId(1)).len(), 1);
    }

    #[test]
    fn entries_keep_append_order_and_commit_timestamps() {
        let log = EngagementLog::new();
        let t0 = Utc::now();
        let t1 = t0 + chrono::Duration::seconds(5);

        log.record_accept(CaseId(1), v(1), t0).unwrap();
        log.record_report(CaseId(1), v(1), t1).unwrap();

        let entries = log.logs_by_case(CaseId(1));
        assert_eq!(entries[0].committed_at, t0);
        assert_eq!(entries[1].committed_at, t1);
        assert_eq!(log.len(), 2);
    }
}
