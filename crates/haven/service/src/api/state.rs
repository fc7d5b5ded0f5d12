//! Application state for API handlers.

use crate::service::HavenService;
use haven_scheduler::EscalationScheduler;
use std::sync::Arc;

/// Shared application state.
#[derive(Clone)]
pub struct AppState {
    pub service: Arc<HavenService>,
    pub scheduler: Arc<EscalationScheduler>,
    pub version: String,
    pub started_at: chrono::DateTime<chrono::Utc>,
}

impl AppState {
    pub fn new(service: Arc<HavenService>, scheduler: Arc<EscalationScheduler>) -> Self {
        Self {
            service,
            scheduler,
            version: env!("CARGO_PKG_VERSION").to_string(),
            started_at: chrono::Utc::now(),
        }
    }

    pub fn uptime_seconds(&self) -> i64 {
        (chrono::Utc::now() - self.started_at).num_seconds()
    }
}
