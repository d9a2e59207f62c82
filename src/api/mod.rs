use crate::state::AppState;
use axum::Router;
use axum::routing::{get, post};
use std::sync::Arc;

pub mod handlers;
pub mod responses;

pub fn router(state: Arc<AppState>) -> Router {
    Router::new()
        .route("/api/predict/{bin_id}", get(handlers::get_prediction))
        .route("/api/predict/{bin_id}/refit", post(handlers::refit_prediction))
        .route("/api/predictions", get(handlers::get_predictions))
        .route("/api/hotspots", get(handlers::get_hotspots))
        .route("/api/patterns", get(handlers::get_patterns))
        .route("/api/fill-duration", get(handlers::get_fill_duration))
        .route("/api/health", get(handlers::get_health))
        .with_state(state)
}
