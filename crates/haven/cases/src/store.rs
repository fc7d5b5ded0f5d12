use crate::geo;
use crate::lifecycle::{self, Transition};
use chrono::{DateTime, Utc};
use haven_types::{
    ActionKind, Case, CaseEvent, CaseId, CaseStats, CaseStatus, GeoLocation, HavenResult,
    Principal,
};
use std::collections::{BTreeMap, HashMap};
use std::sync::{PoisonError, RwLock, RwLockReadGuard, RwLockWriteGuard};
use tokio::sync::broadcast;
use tracing::info;

/// Result of applying a mutating action: the case after the action, and
/// whether any state actually changed (guarded no-ops report `false`).
#[derive(Clone, Debug)]
pub struct Applied {
    pub case: Case,
    pub changed: bool,
}

/// Authoritative owner of case records and their action history.
///
/// The id counter lives inside the store and is bumped under the write
/// lock, so ids are gapless and strictly increasing with no ambient global
/// state. Every applied transition appends one [`CaseEvent`] to the case's
/// history and broadcasts it to subscribers.
pub struct CaseStore {
    inner: RwLock<StoreState>,
    event_tx: broadcast::Sender<CaseEvent>,
}

#[derive(Default)]
struct StoreState {
    cases: BTreeMap<u64, Case>,
    by_victim: HashMap<Principal, Vec<CaseId>>,
    history: HashMap<CaseId, Vec<CaseEvent>>,
    counter: u64,
}

impl CaseStore {
    pub fn new() -> Self {
        let (event_tx, _) = broadcast::channel(256);
        Self {
            inner: RwLock::new(StoreState::default()),
            event_tx,
        }
    }

    fn read(&self) -> RwLockReadGuard<'_, StoreState> {
        self.inner.read().unwrap_or_else(PoisonError::into_inner)
    }

    fn write(&self) -> RwLockWriteGuard<'_, StoreState> {
        self.inner.write().unwrap_or_else(PoisonError::into_inner)
    }

    /// Subscribe to applied case events.
    pub fn subscribe(&self) -> broadcast::Receiver<CaseEvent> {
        self.event_tx.subscribe()
    }

    /// Create a new case in `Pending` with the next id.
    pub fn create(
        &self,
        victim: Principal,
        location: GeoLocation,
        committed_at: DateTime<Utc>,
    ) -> Case {
        let mut state = self.write();
        state.counter += 1;
        let id = CaseId(state.counter);

        let case = Case {
            id,
            victim,
            status: CaseStatus::Pending,
            location,
            created_at: committed_at,
            assigned_volunteer: None,
            acknowledged_by: None,
        };

        state.cases.insert(id.0, case.clone());
        state.by_victim.entry(victim).or_default().push(id);

        let event = CaseEvent::new(id, ActionKind::Create, victim, case.status, committed_at);
        state.history.entry(id).or_default().push(event.clone());
        drop(state);

        let _ = self.event_tx.send(event);
        info!(case_id = %id, victim = %victim.short(), "case created");
        case
    }

    /// `Pending -> Acknowledged`; the first acknowledger is recorded and
    /// re-acknowledgment by that principal is absorbed.
    pub fn acknowledge(
        &self,
        case_id: CaseId,
        actor: Principal,
        committed_at: DateTime<Utc>,
    ) -> HavenResult<Applied> {
        self.apply(case_id, actor, ActionKind::Acknowledge, committed_at, |case, actor| {
            if case.acknowledged_by.is_none() {
                case.acknowledged_by = Some(*actor);
            }
        })
    }

    /// `{Pending, Acknowledged} -> Escalated`; re-escalation is a no-op.
    pub fn escalate(
        &self,
        case_id: CaseId,
        actor: Principal,
        committed_at: DateTime<Utc>,
    ) -> HavenResult<Applied> {
        self.apply(case_id, actor, ActionKind::Escalate, committed_at, |_, _| {})
    }

    /// `{Acknowledged, Escalated} -> Resolved`.
    pub fn resolve(
        &self,
        case_id: CaseId,
        actor: Principal,
        committed_at: DateTime<Utc>,
    ) -> HavenResult<Applied> {
        self.apply(case_id, actor, ActionKind::Resolve, committed_at, |_, _| {})
    }

    /// `Pending -> FalseAlarm`, victim-only (enforced by the guard).
    pub fn mark_false_alarm(
        &self,
        case_id: CaseId,
        actor: Principal,
        committed_at: DateTime<Utc>,
    ) -> HavenResult<Applied> {
        self.apply(case_id, actor, ActionKind::MarkFalseAlarm, committed_at, |_, _| {})
    }

    /// Set the NGO-designated volunteer; overwrite allowed, no queue.
    pub fn assign_volunteer(
        &self,
        case_id: CaseId,
        actor: Principal,
        volunteer: Principal,
        committed_at: DateTime<Utc>,
    ) -> HavenResult<Applied> {
        let mut state = self.write();
        let case = state
            .cases
            .get_mut(&case_id.0)
            .ok_or_else(|| not_found(case_id))?;

        lifecycle::plan(case, &actor, ActionKind::AssignVolunteer)?;
        case.assigned_volunteer = Some(volunteer);
        let case = case.clone();

        let event = CaseEvent::new(
            case_id,
            ActionKind::AssignVolunteer,
            actor,
            case.status,
            committed_at,
        );
        state.history.entry(case_id).or_default().push(event.clone());
        drop(state);

        let _ = self.event_tx.send(event);
        info!(case_id = %case_id, volunteer = %volunteer.short(), "volunteer assigned");
        Ok(Applied { case, changed: true })
    }

    fn apply(
        &self,
        case_id: CaseId,
        actor: Principal,
        action: ActionKind,
        committed_at: DateTime<Utc>,
        on_apply: impl FnOnce(&mut Case, &Principal),
    ) -> HavenResult<Applied> {
        let mut state = self.write();
        let case = state
            .cases
            .get_mut(&case_id.0)
            .ok_or_else(|| not_found(case_id))?;

        // Authoritative re-check at commit time: a racing identity may have
        // moved the case since the advisory pre-check.
        match lifecycle::plan(case, &actor, action)? {
            Transition::To(next) => {
                let from = case.status;
                case.status = next;
                on_apply(case, &actor);
                let case = case.clone();

                let event = CaseEvent::new(case_id, action, actor, next, committed_at);
                state.history.entry(case_id).or_default().push(event.clone());
                drop(state);

                let _ = self.event_tx.send(event);
                info!(case_id = %case_id, %from, to = %next, %action, "case transitioned");
                Ok(Applied { case, changed: true })
            }
            Transition::Noop | Transition::Unchanged => Ok(Applied {
                case: case.clone(),
                changed: false,
            }),
        }
    }

    // ── Queries ──────────────────────────────────────────────────────

    pub fn get(&self, case_id: CaseId) -> Option<Case> {
        self.read().cases.get(&case_id.0).cloned()
    }

    pub fn cases_by_victim(&self, victim: &Principal) -> Vec<Case> {
        let state = self.read();
        state
            .by_victim
            .get(victim)
            .map(|ids| {
                ids.iter()
                    .filter_map(|id| state.cases.get(&id.0).cloned())
                    .collect()
            })
            .unwrap_or_default()
    }

    /// All non-terminal cases in id order.
    pub fn open_cases(&self) -> Vec<Case> {
        self.read()
            .cases
            .values()
            .filter(|case| case.status.is_open())
            .cloned()
            .collect()
    }

    pub fn stats(&self) -> CaseStats {
        let state = self.read();
        let mut stats = CaseStats {
            total: state.cases.len(),
            ..CaseStats::default()
        };
        for case in state.cases.values() {
            match case.status {
                CaseStatus::Pending => stats.pending += 1,
                CaseStatus::Acknowledged => stats.acknowledged += 1,
                CaseStatus::Escalated => stats.escalated += 1,
                CaseStatus::Resolved => stats.resolved += 1,
                CaseStatus::FalseAlarm => stats.false_alarm += 1,
            }
        }
        stats
    }

    /// Open cases within `radius_km` of the given point, with their
    /// distances. Cases whose stored coordinates do not parse are skipped.
    pub fn nearby_open(&self, lat: f64, lon: f64, radius_km: f64) -> Vec<(Case, f64)> {
        self.read()
            .cases
            .values()
            .filter(|case| case.status.is_open())
            .filter_map(|case| {
                let (case_lat, case_lon) = case.location.coords()?;
                let distance = geo::haversine_km(lat, lon, case_lat, case_lon);
                (distance <= radius_km).then(|| (case.clone(), distance))
            })
            .collect()
    }

    /// The append-only action history of one case.
    pub fn history(&self, case_id: CaseId) -> Vec<CaseEvent> {
        self.read().history.get(&case_id).cloned().unwrap_or_default()
    }
}

impl Default for CaseStore {
    fn default() -> Self {
        Self::new()
    }
}

fn not_found(case_id: CaseId) -> haven_types::HavenError {
    haven_types::HavenError::NotFound(format!("case {} not found", case_id))
}

#[cfg(test)]
mod tests {
    use super::*;
    use haven_types::HavenError;
    use proptest::prelude::*;

    fn victim() -> Principal {
        Principal::from_bytes([1; 20])
    }

    fn ngo() -> Principal {
        Principal::from_bytes([2; 20])
    }

    fn delhi() -> GeoLocation {
        GeoLocation::new("28.6139", "77.2090")
    }

    fn seeded(store: &CaseStore) -> CaseId {
        store.create(victim(), delhi(), Utc::now()).id
    }

    #[test]
    fn ids_are_one_based_and_gapless() {
        let store = CaseStore::new();
        assert_eq!(seeded(&store), CaseId(1));
        assert_eq!(seeded(&store), CaseId(2));
        assert_eq!(seeded(&store), CaseId(3));
    }

    #[test]
    fn victim_index_tracks_created_cases() {
        let store = CaseStore::new();
        seeded(&store);
        seeded(&store);
        let other = Principal::from_bytes([7; 20]);
        store.create(other, delhi(), Utc::now());

        assert_eq!(store.cases_by_victim(&victim()).len(), 2);
        assert_eq!(store.cases_by_victim(&other).len(), 1);
    }

    #[test]
    fn first_acknowledger_wins_and_reack_is_noop() {
        let store = CaseStore::new();
        let id = seeded(&store);

        let applied = store.acknowledge(id, ngo(), Utc::now()).unwrap();
        assert!(applied.changed);
        assert_eq!(applied.case.acknowledged_by, Some(ngo()));

        let again = store.acknowledge(id, ngo(), Utc::now()).unwrap();
        assert!(!again.changed);
        assert_eq!(again.case.acknowledged_by, Some(ngo()));

        let other = Principal::from_bytes([9; 20]);
        assert!(matches!(
            store.acknowledge(id, other, Utc::now()),
            Err(HavenError::InvalidState { .. })
        ));
    }

    #[test]
    fn escalate_twice_changes_state_once() {
        let store = CaseStore::new();
        let id = seeded(&store);

        assert!(store.escalate(id, ngo(), Utc::now()).unwrap().changed);
        let second = store.escalate(id, ngo(), Utc::now()).unwrap();
        assert!(!second.changed);
        assert_eq!(second.case.status, CaseStatus::Escalated);
    }

    #[test]
    fn assignment_overwrites_without_status_change() {
        let store = CaseStore::new();
        let id = seeded(&store);
        let v1 = Principal::from_bytes([4; 20]);
        let v2 = Principal::from_bytes([5; 20]);

        store.assign_volunteer(id, ngo(), v1, Utc::now()).unwrap();
        let applied = store.assign_volunteer(id, ngo(), v2, Utc::now()).unwrap();
        assert_eq!(applied.case.assigned_volunteer, Some(v2));
        assert_eq!(applied.case.status, CaseStatus::Pending);

        store.resolve(id, ngo(), Utc::now()).unwrap_err();
        store.mark_false_alarm(id, victim(), Utc::now()).unwrap();
        assert!(matches!(
            store.assign_volunteer(id, ngo(), v1, Utc::now()),
            Err(HavenError::InvalidState { .. })
        ));
    }

    #[test]
    fn unknown_case_is_not_found() {
        let store = CaseStore::new();
        assert!(matches!(
            store.escalate(CaseId(42), ngo(), Utc::now()),
            Err(HavenError::NotFound(_))
        ));
        assert!(store.get(CaseId(42)).is_none());
    }

    #[test]
    fn stats_count_each_status() {
        let store = CaseStore::new();
        let a = seeded(&store);
        let b = seeded(&store);
        let c = seeded(&store);
        seeded(&store);

        store.acknowledge(a, ngo(), Utc::now()).unwrap();
        store.escalate(b, ngo(), Utc::now()).unwrap();
        store.mark_false_alarm(c, victim(), Utc::now()).unwrap();

        let stats = store.stats();
        assert_eq!(stats.total, 4);
        assert_eq!(stats.pending, 1);
        assert_eq!(stats.acknowledged, 1);
        assert_eq!(stats.escalated, 1);
        assert_eq!(stats.false_alarm, 1);
        assert_eq!(stats.resolved, 0);
    }

    #[test]
    fn nearby_filters_radius_status_and_malformed_coordinates() {
        let store = CaseStore::new();
        // In range.
        store.create(victim(), delhi(), Utc::now());
        // Out of range (Mumbai).
        store.create(victim(), GeoLocation::new("19.0760", "72.8777"), Utc::now());
        // Malformed coordinates.
        store.create(victim(), GeoLocation::new("garbage", "77.2"), Utc::now());
        // In range but terminal.
        let resolved = store.create(victim(), delhi(), Utc::now()).id;
        store.acknowledge(resolved, ngo(), Utc::now()).unwrap();
        store.resolve(resolved, ngo(), Utc::now()).unwrap();

        let hits = store.nearby_open(28.61, 77.20, 5.0);
        assert_eq!(hits.len(), 1);
        assert_eq!(hits[0].0.id, CaseId(1));
        assert!(hits[0].1 <= 5.0);
    }

    #[test]
    fn history_records_every_applied_action() {
        let store = CaseStore::new();
        let id = seeded(&store);
        store.acknowledge(id, ngo(), Utc::now()).unwrap();
        store.escalate(id, ngo(), Utc::now()).unwrap();
        // No-op escalation appends nothing.
        store.escalate(id, ngo(), Utc::now()).unwrap();

        let history = store.history(id);
        let kinds: Vec<_> = history.iter().map(|e| e.kind).collect();
        assert_eq!(
            kinds,
            vec![ActionKind::Create, ActionKind::Acknowledge, ActionKind::Escalate]
        );
    }

    #[test]
    fn events_are_broadcast_to_subscribers() {
        let store = CaseStore::new();
        let mut rx = store.subscribe();
        let id = seeded(&store);
        store.escalate(id, ngo(), Utc::now()).unwrap();

        assert_eq!(rx.try_recv().unwrap().kind, ActionKind::Create);
        assert_eq!(rx.try_recv().unwrap().kind, ActionKind::Escalate);
    }

    fn status_rank(status: CaseStatus) -> u8 {
        match status {
            CaseStatus::Pending => 0,
            CaseStatus::Acknowledged => 1,
            CaseStatus::Escalated => 2,
            CaseStatus::Resolved | CaseStatus::FalseAlarm => 3,
        }
    }

    #[derive(Debug, Clone, Copy)]
    enum Op {
        Acknowledge,
        Escalate,
        Resolve,
        FalseAlarm,
    }

    fn op_strategy() -> impl Strategy<Value = Vec<Op>> {
        proptest::collection::vec(
            prop_oneof![
                Just(Op::Acknowledge),
                Just(Op::Escalate),
                Just(Op::Resolve),
                Just(Op::FalseAlarm),
            ],
            0..24,
        )
    }

    proptest! {
        #[test]
        fn status_never_regresses(ops in op_strategy()) {
            let store = CaseStore::new();
            let id = seeded(&store);
            let mut rank = status_rank(CaseStatus::Pending);
            let mut terminal = false;

            for op in ops {
                let result = match op {
                    Op::Acknowledge => store.acknowledge(id, ngo(), Utc::now()),
                    Op::Escalate => store.escalate(id, ngo(), Utc::now()),
                    Op::Resolve => store.resolve(id, ngo(), Utc::now()),
                    Op::FalseAlarm => store.mark_false_alarm(id, victim(), Utc::now()),
                };

                if terminal {
                    // Absorbing states admit no further status change.
                    prop_assert!(result.is_err() || !result.unwrap().changed);
                }

                let status = store.get(id).unwrap().status;
                prop_assert!(status_rank(status) >= rank);
                rank = status_rank(status);
                terminal = status.is_terminal();
            }
        }
    }
}
