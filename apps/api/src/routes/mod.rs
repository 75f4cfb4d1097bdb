pub mod health;

use axum::{
    middleware,
    routing::{get, post},
    Router,
};

use crate::lifecycle::{handlers, trigger};
use crate::state::AppState;

pub fn build_router(state: AppState) -> Router {
    Router::new()
        .route("/health", get(health::health_handler))
        // Lifecycle engine surface
        .route(
            "/api/v1/terms/:id/archive",
            post(handlers::handle_archive_term),
        )
        .route("/api/v1/lifecycle/check", post(handlers::handle_run_checks))
        .route(
            "/api/v1/lifecycle/current",
            get(handlers::handle_current_period),
        )
        // Collaborator API for the approval flows
        .route(
            "/api/v1/notifications",
            post(handlers::handle_create_notification),
        )
        // Read-side surface scoped by the lifecycle engine
        .route(
            "/api/v1/organizations",
            get(handlers::handle_list_organizations),
        )
        .route("/api/v1/council", get(handlers::handle_list_councils))
        .route(
            "/api/v1/mis-coordinators",
            get(handlers::handle_list_coordinators),
        )
        .route("/api/v1/roster", get(handlers::handle_roster))
        // Login-path hook: every non-lightweight request opportunistically
        // runs the consistency checks in the background.
        .layer(middleware::from_fn_with_state(
            state.clone(),
            trigger::lifecycle_hook,
        ))
        .with_state(state)
}
