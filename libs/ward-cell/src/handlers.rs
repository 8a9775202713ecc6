use axum::{
    extract::{Extension, Path, State},
    http::StatusCode,
    Json,
};
use serde_json::{json, Value};
use uuid::Uuid;

use schedule_cell::models::TreatmentOrderRequest;
use shared_models::auth::{Actor, User};
use shared_models::error::AppError;

use crate::models::{AdministrationRequest, WardState};

#[axum::debug_handler]
pub async fn get_nurse_stats(
    State(state): State<WardState>,
    Extension(user): Extension<User>,
) -> Result<Json<Value>, AppError> {
    let actor = Actor::try_from(&user)?;
    let stats = state.reports().nurse_stats(&actor).await?;
    Ok(Json(json!(stats)))
}

#[axum::debug_handler]
pub async fn get_today_tasks(
    State(state): State<WardState>,
    Extension(user): Extension<User>,
) -> Result<Json<Value>, AppError> {
    let actor = Actor::try_from(&user)?;
    let buckets = state.reports().today_tasks(&actor).await?;
    Ok(Json(json!(buckets)))
}

#[axum::debug_handler]
pub async fn get_pharmacy_medications(
    State(state): State<WardState>,
    Extension(user): Extension<User>,
) -> Result<Json<Value>, AppError> {
    let actor = Actor::try_from(&user)?;
    let demand = state.reports().pharmacy_demand(&actor).await?;
    Ok(Json(json!(demand)))
}

#[axum::debug_handler]
pub async fn add_treatment(
    State(state): State<WardState>,
    Extension(user): Extension<User>,
    Json(order): Json<TreatmentOrderRequest>,
) -> Result<(StatusCode, Json<Value>), AppError> {
    let actor = Actor::try_from(&user)?;
    let created = state.generator().generate_treatment_order(&actor, &order).await?;

    Ok((
        StatusCode::CREATED,
        Json(json!({
            "message": format!("Treatment added. {} sessions scheduled.", created.len()),
            "schedules_created": created.len(),
            "schedules": created
        })),
    ))
}

#[axum::debug_handler]
pub async fn record_administration(
    State(state): State<WardState>,
    Extension(user): Extension<User>,
    Json(request): Json<AdministrationRequest>,
) -> Result<Json<Value>, AppError> {
    let actor = Actor::try_from(&user)?;
    let history = state.recorder().record(&actor, &request).await?;

    Ok(Json(json!({
        "message": "Administration recorded",
        "history": history
    })))
}

#[axum::debug_handler]
pub async fn get_patient_history(
    State(state): State<WardState>,
    Extension(user): Extension<User>,
    Path(patient_id): Path<Uuid>,
) -> Result<Json<Value>, AppError> {
    let actor = Actor::try_from(&user)?;
    let records = state.recorder().patient_history(&actor, patient_id).await?;
    Ok(Json(json!(records)))
}

#[axum::debug_handler]
pub async fn get_my_patients(
    State(state): State<WardState>,
    Extension(user): Extension<User>,
) -> Result<Json<Value>, AppError> {
    let actor = Actor::try_from(&user)?;
    let patients = state.reports().my_patients(&actor).await?;
    Ok(Json(json!(patients)))
}

#[axum::debug_handler]
pub async fn get_patient_today(
    State(state): State<WardState>,
    Extension(user): Extension<User>,
    Path(patient_id): Path<Uuid>,
) -> Result<Json<Value>, AppError> {
    let actor = Actor::try_from(&user)?;
    let day = state.reports().patient_today(&actor, patient_id).await?;
    Ok(Json(json!(day)))
}
