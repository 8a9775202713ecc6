use axum::{
    middleware,
    routing::{get, patch, post, put},
    Router,
};

use shared_utils::extractor::auth_middleware;

use crate::handlers;
use crate::models::ScheduleState;

pub fn schedule_routes(state: ScheduleState) -> Router {
    Router::new()
        .route("/", get(handlers::list_schedules).post(handlers::create_schedule))
        .route("/patient/{patient_id}", get(handlers::list_patient_schedules))
        .route(
            "/{id}",
            patch(handlers::update_schedule).delete(handlers::delete_schedule),
        )
        // Nurse actions on a single instance
        .route("/{id}/complete", put(handlers::complete_schedule))
        .route("/{id}/not-completed", put(handlers::mark_not_completed))
        .route("/{id}/postpone", put(handlers::postpone_schedule))
        .route("/{id}/medication-given", put(handlers::mark_medication_given))
        .layer(middleware::from_fn_with_state(state.config.clone(), auth_middleware))
        .with_state(state)
}

pub fn medication_routes(state: ScheduleState) -> Router {
    Router::new()
        .route("/", post(handlers::add_medication))
        .route("/patient/{patient_id}", get(handlers::get_patient_medications))
        .route(
            "/patient/{patient_id}/{medication}",
            axum::routing::delete(handlers::delete_medication),
        )
        .route(
            "/patient/{patient_id}/{medication}/suspend",
            put(handlers::suspend_medication),
        )
        .route(
            "/patient/{patient_id}/{medication}/reactivate",
            put(handlers::reactivate_medication),
        )
        .layer(middleware::from_fn_with_state(state.config.clone(), auth_middleware))
        .with_state(state)
}
