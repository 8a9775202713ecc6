use axum::{
    middleware,
    routing::{get, post},
    Router,
};

use shared_utils::extractor::auth_middleware;

use crate::handlers;
use crate::models::WardState;

pub fn nurse_routes(state: WardState) -> Router {
    Router::new()
        .route("/stats", get(handlers::get_nurse_stats))
        .route("/tasks/today", get(handlers::get_today_tasks))
        .route("/medications/pharmacy", get(handlers::get_pharmacy_medications))
        .route("/treatments", post(handlers::add_treatment))
        .route("/administration", post(handlers::record_administration))
        .route("/patients", get(handlers::get_my_patients))
        .route("/patients/{patient_id}/today", get(handlers::get_patient_today))
        .route("/patients/{patient_id}/history", get(handlers::get_patient_history))
        .layer(middleware::from_fn_with_state(state.config.clone(), auth_middleware))
        .with_state(state)
}
