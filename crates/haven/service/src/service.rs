use async_trait::async_trait;
use chrono::{Duration as ChronoDuration, Utc};
use haven_cases::{lifecycle, CaseStore};
use haven_engagement::EngagementLog;
use haven_guard::AuthorizationGuard;
use haven_ledger::{Action, ActionSubmitter, CommitLog, RetryPolicy};
use haven_roles::{normalize_labels, RoleStore};
use haven_scheduler::EscalationTarget;
use haven_types::{
    ActionKind, Case, CaseEvent, CaseId, CaseStats, CaseView, EngagementEntry, GeoLocation,
    HavenError, HavenResult, NearbyCase, Principal, Role,
};
use std::collections::HashMap;
use std::sync::Arc;
use tokio::sync::{broadcast, Mutex};
use tracing::{info, warn};

/// Tunables for the service facade.
#[derive(Clone, Copy, Debug)]
pub struct ServiceOptions {
    /// The identity the daemon signs automated actions with (the
    /// escalation scheduler, role grants).
    pub service_identity: Principal,

    /// When enabled, a principal with no `User` grant creating their first
    /// case is granted `User` through the commit path before the create is
    /// authorized. Off by default.
    pub auto_grant_user: bool,

    /// Advisory age after which case views carry the warning flag.
    pub warning_after_minutes: i64,

    pub retry: RetryPolicy,
}

impl Default for ServiceOptions {
    fn default() -> Self {
        Self {
            service_identity: Principal::from_bytes([0x11; 20]),
            auto_grant_user: false,
            warning_after_minutes: 30,
            retry: RetryPolicy::default(),
        }
    }
}

/// The action interface consumed by external callers.
///
/// One call per action; mutating calls block until the ledger acknowledges
/// durable commit, then apply the state change with the receipt's commit
/// timestamp. Reads only block on read consistency.
pub struct HavenService {
    roles: Arc<RoleStore>,
    cases: Arc<CaseStore>,
    engagement: Arc<EngagementLog>,
    guard: AuthorizationGuard,
    submitter: ActionSubmitter,
    options: ServiceOptions,
    /// Client-generated idempotency keys already consumed by `create_case`.
    create_keys: Mutex<HashMap<String, CaseId>>,
}

impl HavenService {
    pub fn new(log: Arc<dyn CommitLog>, options: ServiceOptions) -> Self {
        let roles = Arc::new(RoleStore::new());
        let cases = Arc::new(CaseStore::new());
        let engagement = Arc::new(EngagementLog::new());
        let guard = AuthorizationGuard::new(roles.clone(), engagement.clone());
        let submitter = ActionSubmitter::with_retry(log, options.retry);

        Self {
            roles,
            cases,
            engagement,
            guard,
            submitter,
            options,
            create_keys: Mutex::new(HashMap::new()),
        }
    }

    pub fn service_identity(&self) -> Principal {
        self.options.service_identity
    }

    /// The commit log behind the submitter, for audit and inspection.
    pub fn ledger(&self) -> Arc<dyn CommitLog> {
        self.submitter.log()
    }

    fn warning_after(&self) -> ChronoDuration {
        ChronoDuration::minutes(self.options.warning_after_minutes)
    }

    fn view(&self, case: &Case) -> CaseView {
        case.view(Utc::now(), self.warning_after())
    }

    fn require_case(&self, case_id: CaseId) -> HavenResult<Case> {
        self.cases
            .get(case_id)
            .ok_or_else(|| HavenError::NotFound(format!("case {} not found", case_id)))
    }

    async fn commit_grant(&self, grantee: Principal, role: Role) -> HavenResult<bool> {
        let receipt = self
            .submitter
            .submit(self.options.service_identity, Action::GrantRole { grantee, role })
            .await?;
        Ok(self.roles.grant(grantee, role, receipt.committed_at))
    }

    // ── Mutating actions ─────────────────────────────────────────────

    /// Create a new SOS case for `principal` at the given coordinates.
    ///
    /// Resubmission creates a new case id, so retrying callers pass a
    /// client-generated `idempotency_key`: a replayed key returns the
    /// original case instead of minting a second one.
    pub async fn create_case(
        &self,
        principal: Principal,
        latitude: impl Into<String>,
        longitude: impl Into<String>,
        idempotency_key: Option<String>,
    ) -> HavenResult<CaseView> {
        let latitude = latitude.into();
        let longitude = longitude.into();

        // Hold the key table across the whole flow so a concurrent retry
        // of the same key cannot mint a second case.
        let mut keys = if idempotency_key.is_some() {
            Some(self.create_keys.lock().await)
        } else {
            None
        };
        if let (Some(keys), Some(key)) = (keys.as_ref(), idempotency_key.as_ref()) {
            if let Some(case_id) = keys.get(key) {
                return self.get_case(*case_id);
            }
        }

        if self.options.auto_grant_user && !self.roles.has_role(&principal, Role::User) {
            info!(principal = %principal.short(), "self-healing User grant on first case");
            self.commit_grant(principal, Role::User).await?;
        }

        self.guard.authorize(&principal, ActionKind::Create, None)?;

        let receipt = self
            .submitter
            .submit(
                principal,
                Action::CreateCase {
                    victim: principal,
                    latitude: latitude.clone(),
                    longitude: longitude.clone(),
                },
            )
            .await?;

        let case = self.cases.create(
            principal,
            GeoLocation::new(latitude, longitude),
            receipt.committed_at,
        );

        if let (Some(keys), Some(key)) = (keys.as_mut(), idempotency_key) {
            keys.insert(key, case.id);
        }
        Ok(self.view(&case))
    }

    /// `Pending -> Acknowledged` by an NGO principal.
    pub async fn acknowledge_case(
        &self,
        principal: Principal,
        case_id: CaseId,
    ) -> HavenResult<CaseView> {
        let case = self.require_case(case_id)?;
        self.guard
            .authorize(&principal, ActionKind::Acknowledge, Some(&case))?;
        lifecycle::plan(&case, &principal, ActionKind::Acknowledge)?;

        let receipt = self
            .submitter
            .submit(principal, Action::Acknowledge { case_id })
            .await?;
        let applied = self.cases.acknowledge(case_id, principal, receipt.committed_at)?;
        Ok(self.view(&applied.case))
    }

    /// Force `Escalated`. Returns whether the status changed;
    /// re-escalation is a guarded no-op reported as `false`.
    pub async fn escalate_case(
        &self,
        principal: Principal,
        case_id: CaseId,
    ) -> HavenResult<bool> {
        let case = self.require_case(case_id)?;
        self.guard
            .authorize(&principal, ActionKind::Escalate, Some(&case))?;
        lifecycle::plan(&case, &principal, ActionKind::Escalate)?;

        let receipt = self
            .submitter
            .submit(principal, Action::Escalate { case_id })
            .await?;
        let applied = self.cases.escalate(case_id, principal, receipt.committed_at)?;
        Ok(applied.changed)
    }

    /// `{Acknowledged, Escalated} -> Resolved` by an NGO principal.
    pub async fn resolve_case(
        &self,
        principal: Principal,
        case_id: CaseId,
    ) -> HavenResult<CaseView> {
        let case = self.require_case(case_id)?;
        self.guard
            .authorize(&principal, ActionKind::Resolve, Some(&case))?;
        lifecycle::plan(&case, &principal, ActionKind::Resolve)?;

        let receipt = self
            .submitter
            .submit(principal, Action::Resolve { case_id })
            .await?;
        let applied = self.cases.resolve(case_id, principal, receipt.committed_at)?;
        Ok(self.view(&applied.case))
    }

    /// `Pending -> FalseAlarm`, victim only.
    pub async fn mark_false_alarm(
        &self,
        principal: Principal,
        case_id: CaseId,
    ) -> HavenResult<CaseView> {
        let case = self.require_case(case_id)?;
        self.guard
            .authorize(&principal, ActionKind::MarkFalseAlarm, Some(&case))?;
        lifecycle::plan(&case, &principal, ActionKind::MarkFalseAlarm)?;

        let receipt = self
            .submitter
            .submit(principal, Action::MarkFalseAlarm { case_id })
            .await?;
        let applied = self
            .cases
            .mark_false_alarm(case_id, principal, receipt.committed_at)?;
        Ok(self.view(&applied.case))
    }

    /// Designate a volunteer on an open case; overwrite allowed.
    pub async fn assign_volunteer(
        &self,
        principal: Principal,
        case_id: CaseId,
        volunteer: Principal,
    ) -> HavenResult<CaseView> {
        let case = self.require_case(case_id)?;
        self.guard
            .authorize(&principal, ActionKind::AssignVolunteer, Some(&case))?;
        lifecycle::plan(&case, &principal, ActionKind::AssignVolunteer)?;

        let receipt = self
            .submitter
            .submit(principal, Action::AssignVolunteer { case_id, volunteer })
            .await?;
        let applied =
            self.cases
                .assign_volunteer(case_id, principal, volunteer, receipt.committed_at)?;
        Ok(self.view(&applied.case))
    }

    /// A volunteer engages an open case.
    pub async fn accept_case(&self, principal: Principal, case_id: CaseId) -> HavenResult<()> {
        let case = self.require_case(case_id)?;
        self.guard
            .authorize(&principal, ActionKind::Accept, Some(&case))?;
        if self.engagement.has_accepted(case_id, &principal) {
            return Err(HavenError::AlreadyAccepted);
        }

        let receipt = self
            .submitter
            .submit(principal, Action::AcceptCase { case_id })
            .await?;
        self.engagement
            .record_accept(case_id, principal, receipt.committed_at)?;
        Ok(())
    }

    /// A volunteer who previously accepted submits their report.
    pub async fn submit_report(&self, principal: Principal, case_id: CaseId) -> HavenResult<()> {
        let case = self.require_case(case_id)?;
        self.guard
            .authorize(&principal, ActionKind::Report, Some(&case))?;

        let receipt = self
            .submitter
            .submit(principal, Action::SubmitReport { case_id })
            .await?;
        self.engagement
            .record_report(case_id, principal, receipt.committed_at)?;
        Ok(())
    }

    /// Read a case as any principal; logged as an engagement entry for
    /// audit, which is why it commits.
    pub async fn query_case(
        &self,
        principal: Principal,
        case_id: CaseId,
    ) -> HavenResult<CaseView> {
        let case = self.require_case(case_id)?;
        self.guard
            .authorize(&principal, ActionKind::Query, Some(&case))?;

        let receipt = self
            .submitter
            .submit(principal, Action::QueryCase { case_id })
            .await?;
        self.engagement
            .record_query(case_id, principal, receipt.committed_at);
        Ok(self.view(&case))
    }

    /// Grant a role. Idempotent; returns whether the grant was new.
    pub async fn grant_role(&self, principal: Principal, role: Role) -> HavenResult<bool> {
        self.guard
            .authorize(&principal, ActionKind::GrantRole, None)?;
        self.commit_grant(principal, role).await
    }

    /// Reconcile externally-sourced role labels onto a principal: the
    /// whole batch is normalized and validated first, then granted as one
    /// ordered burst under the service identity.
    pub async fn reconcile_roles(
        &self,
        principal: Principal,
        labels: &[String],
    ) -> HavenResult<Vec<Role>> {
        let roles = normalize_labels(labels)?;
        for role in &roles {
            self.commit_grant(principal, *role).await?;
        }
        info!(
            principal = %principal.short(),
            roles = ?roles,
            "external roles reconciled"
        );
        Ok(roles)
    }

    /// One-time bootstrap: the daemon's own identity provisions itself the
    /// `NGO` capability the scheduler needs. Privileged and audited.
    pub async fn ensure_service_ngo(&self) -> HavenResult<()> {
        let identity = self.options.service_identity;
        if self.roles.has_role(&identity, Role::Ngo) {
            return Ok(());
        }
        warn!(
            principal = %identity.short(),
            "service identity self-provisioning the NGO role"
        );
        self.commit_grant(identity, Role::Ngo).await?;
        Ok(())
    }

    // ── Read-only queries ────────────────────────────────────────────

    pub fn get_case(&self, case_id: CaseId) -> HavenResult<CaseView> {
        Ok(self.view(&self.require_case(case_id)?))
    }

    pub fn cases_by_victim(&self, victim: &Principal) -> Vec<CaseView> {
        self.cases
            .cases_by_victim(victim)
            .iter()
            .map(|case| self.view(case))
            .collect()
    }

    /// All non-terminal cases, for the NGO dashboard.
    pub fn active_cases(&self) -> Vec<CaseView> {
        self.cases
            .open_cases()
            .iter()
            .map(|case| self.view(case))
            .collect()
    }

    pub fn case_stats(&self) -> CaseStats {
        self.cases.stats()
    }

    /// Open cases within `radius_km` of a point, annotated with their
    /// great-circle distance.
    pub fn nearby_open_cases(
        &self,
        lat: f64,
        lon: f64,
        radius_km: f64,
    ) -> HavenResult<Vec<NearbyCase>> {
        if !lat.is_finite() || !lon.is_finite() {
            return Err(HavenError::Validation(
                "lat and lon must be finite decimal degrees".to_string(),
            ));
        }
        if !radius_km.is_finite() || radius_km <= 0.0 {
            return Err(HavenError::Validation(
                "radius_km must be positive".to_string(),
            ));
        }

        Ok(self
            .cases
            .nearby_open(lat, lon, radius_km)
            .into_iter()
            .map(|(case, distance_km)| NearbyCase {
                case: self.view(&case),
                distance_km,
            })
            .collect())
    }

    pub fn has_role(&self, principal: &Principal, role: Role) -> bool {
        self.roles.has_role(principal, role)
    }

    pub fn get_roles(&self, principal: &Principal) -> Vec<Role> {
        self.roles.roles_of(principal)
    }

    pub fn case_history(&self, case_id: CaseId) -> Vec<CaseEvent> {
        self.cases.history(case_id)
    }

    pub fn logs_by_case(&self, case_id: CaseId) -> Vec<EngagementEntry> {
        self.engagement.logs_by_case(case_id)
    }

    pub fn accepted_volunteers(&self, case_id: CaseId) -> Vec<Principal> {
        self.engagement.accepted_volunteers(case_id)
    }

    pub fn subscribe_events(&self) -> broadcast::Receiver<CaseEvent> {
        self.cases.subscribe()
    }
}

#[async_trait]
impl EscalationTarget for HavenService {
    async fn ensure_service_role(&self) -> HavenResult<()> {
        self.ensure_service_ngo().await
    }

    async fn open_cases(&self) -> Vec<Case> {
        self.cases.open_cases()
    }

    async fn escalate(&self, case_id: CaseId) -> HavenResult<bool> {
        self.escalate_case(self.options.service_identity, case_id)
            .await
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use haven_ledger::InMemoryCommitLog;
    use haven_types::DenyReason;

    fn principal(seed: u8) -> Principal {
        Principal::from_bytes([seed; 20])
    }

    fn service() -> HavenService {
        HavenService::new(Arc::new(InMemoryCommitLog::new()), ServiceOptions::default())
    }

    fn service_with(options: ServiceOptions) -> HavenService {
        HavenService::new(Arc::new(InMemoryCommitLog::new()), options)
    }

    async fn seeded_user(service: &HavenService, seed: u8) -> Principal {
        let p = principal(seed);
        service.grant_role(p, Role::User).await.unwrap();
        p
    }

    #[tokio::test]
    async fn self_provisioning_grants_ngo_exactly_once() {
        let service = service();
        let identity = service.service_identity();

        service.ensure_service_ngo().await.unwrap();
        assert!(service.has_role(&identity, Role::Ngo));
        let committed = service.ledger().stream_len(&identity).await;

        // Idempotent under restart: a second bootstrap commits nothing new.
        service.ensure_service_ngo().await.unwrap();
        assert_eq!(service.ledger().stream_len(&identity).await, committed);
    }

    #[tokio::test]
    async fn create_requires_user_unless_self_heal_is_on() {
        let service = service();
        let stranger = principal(1);
        assert_eq!(
            service
                .create_case(stranger, "28.6", "77.2", None)
                .await
                .unwrap_err(),
            HavenError::NotAuthorized(DenyReason::WrongRole)
        );

        let healing = service_with(ServiceOptions {
            auto_grant_user: true,
            ..ServiceOptions::default()
        });
        let view = healing
            .create_case(stranger, "28.6", "77.2", None)
            .await
            .unwrap();
        assert_eq!(view.id, CaseId(1));
        assert!(healing.has_role(&stranger, Role::User));
    }

    #[tokio::test]
    async fn idempotency_key_replays_the_original_case() {
        let service = service();
        let victim = seeded_user(&service, 2).await;

        let first = service
            .create_case(victim, "28.6", "77.2", Some("req-1".into()))
            .await
            .unwrap();
        let replay = service
            .create_case(victim, "28.6", "77.2", Some("req-1".into()))
            .await
            .unwrap();
        assert_eq!(first.id, replay.id);
        assert_eq!(service.case_stats().total, 1);

        let fresh = service
            .create_case(victim, "28.6", "77.2", Some("req-2".into()))
            .await
            .unwrap();
        assert_ne!(fresh.id, first.id);
        assert_eq!(service.case_stats().total, 2);
    }

    #[tokio::test]
    async fn query_commits_one_audit_entry_per_call() {
        let service = service();
        let victim = seeded_user(&service, 3).await;
        let outsider = principal(4);
        let case = service
            .create_case(victim, "28.6", "77.2", None)
            .await
            .unwrap();

        service.query_case(outsider, case.id).await.unwrap();
        service.query_case(outsider, case.id).await.unwrap();

        assert_eq!(service.logs_by_case(case.id).len(), 2);
        assert_eq!(service.ledger().stream_len(&outsider).await, 2);
    }

    #[tokio::test]
    async fn reconcile_commits_an_ordered_burst_under_the_service_identity() {
        let service = service();
        let target = principal(5);
        let before = service.ledger().stream_len(&service.service_identity()).await;

        let labels = vec!["user".to_string(), "NGO".to_string(), "User".to_string()];
        let granted = service.reconcile_roles(target, &labels).await.unwrap();
        assert_eq!(granted, vec![Role::User, Role::Ngo]);

        let entries = service
            .ledger()
            .entries_for(&service.service_identity())
            .await;
        let seqs: Vec<u64> = entries.iter().map(|e| e.seq).collect();
        assert_eq!(seqs, ((before + 1)..=(before + 2)).collect::<Vec<u64>>());
    }

    #[tokio::test]
    async fn reconcile_rejects_bad_labels_without_committing() {
        let service = service();
        let target = principal(6);
        let labels = vec!["user".to_string(), "warlord".to_string()];

        assert!(matches!(
            service.reconcile_roles(target, &labels).await,
            Err(HavenError::Validation(_))
        ));
        assert!(service.get_roles(&target).is_empty());
        assert_eq!(
            service.ledger().stream_len(&service.service_identity()).await,
            0
        );
    }

    #[tokio::test]
    async fn nearby_rejects_malformed_query_coordinates() {
        let service = service();
        assert!(matches!(
            service.nearby_open_cases(f64::NAN, 77.2, 5.0),
            Err(HavenError::Validation(_))
        ));
        assert!(matches!(
            service.nearby_open_cases(28.6, 77.2, 0.0),
            Err(HavenError::Validation(_))
        ));
    }
}
