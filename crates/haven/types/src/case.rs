use crate::principal::Principal;
use chrono::{DateTime, Duration, Utc};
use serde::{Deserialize, Serialize};
use std::fmt;

/// Positive, strictly increasing case identifier, assigned at creation.
#[derive(Clone, Copy, Debug, PartialEq, Eq, Hash, PartialOrd, Ord, Serialize, Deserialize)]
pub struct CaseId(pub u64);

impl fmt::Display for CaseId {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "{}", self.0)
    }
}

/// Lifecycle status of a case.
///
/// Transitions are monotone along `Pending -> {Acknowledged, Escalated,
/// FalseAlarm}`, `Acknowledged -> {Escalated, Resolved}`, `Escalated ->
/// {Resolved}`. `Resolved` and `FalseAlarm` absorb.
#[derive(Clone, Copy, Debug, PartialEq, Eq, Hash, Serialize, Deserialize)]
pub enum CaseStatus {
    Pending,
    Acknowledged,
    Escalated,
    Resolved,
    FalseAlarm,
}

impl CaseStatus {
    pub fn is_terminal(&self) -> bool {
        matches!(self, CaseStatus::Resolved | CaseStatus::FalseAlarm)
    }

    /// A case still awaiting resolution.
    pub fn is_open(&self) -> bool {
        !self.is_terminal()
    }
}

impl fmt::Display for CaseStatus {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        let label = match self {
            CaseStatus::Pending => "Pending",
            CaseStatus::Acknowledged => "Acknowledged",
            CaseStatus::Escalated => "Escalated",
            CaseStatus::Resolved => "Resolved",
            CaseStatus::FalseAlarm => "FalseAlarm",
        };
        write!(f, "{}", label)
    }
}

/// Caller-supplied coordinates, stored verbatim.
///
/// The core never range-validates these; they are parsed only when a
/// distance computation consumes them, and cases whose coordinates do not
/// parse are skipped by proximity queries.
#[derive(Clone, Debug, PartialEq, Eq, Serialize, Deserialize)]
pub struct GeoLocation {
    pub latitude: String,
    pub longitude: String,
}

impl GeoLocation {
    pub fn new(latitude: impl Into<String>, longitude: impl Into<String>) -> Self {
        Self {
            latitude: latitude.into(),
            longitude: longitude.into(),
        }
    }

    /// Parse to finite decimal degrees, or `None` if either field is malformed.
    pub fn coords(&self) -> Option<(f64, f64)> {
        let lat = self.latitude.trim().parse::<f64>().ok()?;
        let lon = self.longitude.trim().parse::<f64>().ok()?;
        if lat.is_finite() && lon.is_finite() {
            Some((lat, lon))
        } else {
            None
        }
    }
}

/// One SOS incident.
#[derive(Clone, Debug, Serialize, Deserialize)]
pub struct Case {
    pub id: CaseId,
    /// Immutable after creation; held the `User` role at creation time.
    pub victim: Principal,
    pub status: CaseStatus,
    pub location: GeoLocation,
    /// Ledger commit time of the creating action; origin of all age thresholds.
    pub created_at: DateTime<Utc>,
    /// NGO-designated volunteer, last writer wins.
    #[serde(skip_serializing_if = "Option::is_none")]
    pub assigned_volunteer: Option<Principal>,
    /// First NGO principal to acknowledge; written once.
    #[serde(skip_serializing_if = "Option::is_none")]
    pub acknowledged_by: Option<Principal>,
}

impl Case {
    pub fn age(&self, now: DateTime<Utc>) -> Duration {
        now - self.created_at
    }

    /// Build the caller-facing view, annotating age and the advisory
    /// warning mark (UI coloring only, never a transition trigger).
    pub fn view(&self, now: DateTime<Utc>, warning_after: Duration) -> CaseView {
        let age = self.age(now);
        CaseView {
            id: self.id,
            victim: self.victim,
            status: self.status,
            latitude: self.location.latitude.clone(),
            longitude: self.location.longitude.clone(),
            created_at: self.created_at,
            assigned_volunteer: self.assigned_volunteer,
            acknowledged_by: self.acknowledged_by,
            age_minutes: age.num_minutes(),
            warning: self.status.is_open() && age > warning_after,
        }
    }
}

/// Serialized projection of a case as returned at the action boundary.
#[derive(Clone, Debug, Serialize, Deserialize)]
pub struct CaseView {
    pub id: CaseId,
    pub victim: Principal,
    pub status: CaseStatus,
    pub latitude: String,
    pub longitude: String,
    pub created_at: DateTime<Utc>,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub assigned_volunteer: Option<Principal>,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub acknowledged_by: Option<Principal>,
    pub age_minutes: i64,
    pub warning: bool,
}

/// A proximity query hit.
#[derive(Clone, Debug, Serialize)]
pub struct NearbyCase {
    #[serde(flatten)]
    pub case: CaseView,
    pub distance_km: f64,
}

/// Per-status counts over the whole case table.
#[derive(Clone, Copy, Debug, Default, Serialize, Deserialize)]
pub struct CaseStats {
    pub total: usize,
    pub pending: usize,
    pub acknowledged: usize,
    pub escalated: usize,
    pub resolved: usize,
    pub false_alarm: usize,
}
