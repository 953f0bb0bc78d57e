pub mod health;

use axum::{
    routing::{get, post},
    Router,
};

use crate::screening::handlers;
use crate::state::AppState;

pub fn build_router(state: AppState) -> Router {
    Router::new()
        .route("/health", get(health::health_handler))
        // Screening API
        .route(
            "/api/v1/credentials/status",
            get(handlers::handle_credential_status),
        )
        .route("/api/v1/screenings", post(handlers::handle_create_screening))
        .with_state(state)
}
