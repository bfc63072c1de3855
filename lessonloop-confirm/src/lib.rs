//! lessonloop-confirm library - Lesson Confirmation workflow module
//!
//! Governs how a booked lesson moves from pending teacher acknowledgment to
//! acknowledged, declined, or auto-acknowledged, including the credit
//! compensation issued on decline and the 24-hour escalation sweep.

use axum::Router;
use sqlx::SqlitePool;
use std::sync::Arc;

use crate::services::ConfirmationService;

pub mod api;
pub mod db;
pub mod services;

/// Application state shared across HTTP handlers
#[derive(Clone)]
pub struct AppState {
    /// Database connection pool
    pub db: SqlitePool,
    /// Confirmation workflow service (collaborators injected)
    pub service: Arc<ConfirmationService>,
}

impl AppState {
    /// Create new application state
    pub fn new(db: SqlitePool, service: Arc<ConfirmationService>) -> Self {
        Self { db, service }
    }
}

/// Build application router
pub fn build_router(state: AppState) -> Router {
    use axum::routing::{get, post};
    use tower_http::cors::CorsLayer;

    Router::new()
        // Health endpoint
        .route("/health", get(api::handlers::health))
        // Teacher-facing acknowledgment actions
        .route("/lessons/:id/acknowledge", post(api::handlers::acknowledge_lesson))
        .route("/lessons/:id/decline", post(api::handlers::decline_lesson))
        // Lesson snapshot for operators
        .route("/lessons/:id", get(api::handlers::get_lesson))
        // Escalation sweep, invoked by the external scheduler
        .route("/sweep", post(api::handlers::run_sweep))
        // Reconciliation surface for failed refunds
        .route("/refunds/unsettled", get(api::handlers::unsettled_refunds))
        .with_state(state)
        // Enable CORS for local access
        .layer(CorsLayer::permissive())
}
