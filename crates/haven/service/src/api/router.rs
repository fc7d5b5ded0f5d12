//! API router configuration.

use super::handlers;
use super::state::AppState;
use axum::{
    routing::{get, post},
    Router,
};
use tower_http::cors::{Any, CorsLayer};
use tower_http::trace::TraceLayer;

/// Create the main API router.
pub fn create_router(state: AppState, enable_cors: bool) -> Router {
    let api_routes = Router::new()
        // Health and operations
        .route("/health", get(handlers::health))
        .route("/scheduler/scan", post(handlers::trigger_scan))
        // Cases
        .route("/cases", post(handlers::create_case))
        .route("/cases/stats", get(handlers::case_stats))
        .route("/cases/nearby", get(handlers::nearby_cases))
        .route("/cases/by-victim/:principal", get(handlers::cases_by_victim))
        .route("/cases/:id", get(handlers::get_case))
        .route("/cases/:id/history", get(handlers::case_history))
        .route("/cases/:id/false-alarm", post(handlers::mark_false_alarm))
        // NGO response
        .route("/ngo/cases", get(handlers::active_cases))
        .route("/ngo/acknowledge/:id", post(handlers::acknowledge_case))
        .route("/ngo/escalate/:id", post(handlers::escalate_case))
        .route("/ngo/resolve/:id", post(handlers::resolve_case))
        .route("/ngo/assign/:id", post(handlers::assign_volunteer))
        // Volunteer engagement
        .route("/volunteer/accept/:id", post(handlers::accept_case))
        .route("/volunteer/report/:id", post(handlers::submit_report))
        .route("/volunteer/query/:id", post(handlers::query_case))
        .route("/volunteer/logs/:id", get(handlers::engagement_logs))
        // Roles
        .route("/roles/grant", post(handlers::grant_role))
        .route("/roles/reconcile", post(handlers::reconcile_roles))
        .route("/roles/:principal", get(handlers::get_roles))
        .route("/roles/:principal/has/:role", get(handlers::has_role));

    let mut app = Router::new()
        .nest("/api/v1", api_routes)
        .with_state(state)
        .layer(TraceLayer::new_for_http());

    if enable_cors {
        app = app.layer(
            CorsLayer::new()
                .allow_origin(Any)
                .allow_methods(Any)
                .allow_headers(Any),
        );
    }

    app
}
