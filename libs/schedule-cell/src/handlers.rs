use axum::{
    extract::{Extension, Path, Query, State},
    http::StatusCode,
    Json,
};
use serde_json::{json, Value};
use uuid::Uuid;

use shared_models::auth::{Actor, User};
use shared_models::error::AppError;

use crate::models::{
    CreateScheduleRequest, DeleteMedicationRequest, MedicationGivenRequest, MedicationOrderRequest,
    NotCompletedRequest, PostponeRequest, ScheduleListQuery, ScheduleState,
    SuspendMedicationRequest, UpdateScheduleRequest,
};

fn require_schedule_manager(actor: &Actor) -> Result<(), AppError> {
    if !actor.role.is_supervisory() {
        return Err(AppError::Forbidden(
            "Only admins and supervisors can manage schedules".to_string(),
        ));
    }
    Ok(())
}

// ==============================================================================
// SCHEDULE CRUD
// ==============================================================================

#[axum::debug_handler]
pub async fn list_schedules(
    State(state): State<ScheduleState>,
    Query(query): Query<ScheduleListQuery>,
) -> Result<Json<Value>, AppError> {
    let schedules = state.schedule_service().list(&query).await?;
    Ok(Json(json!(schedules)))
}

#[axum::debug_handler]
pub async fn list_patient_schedules(
    State(state): State<ScheduleState>,
    Path(patient_id): Path<Uuid>,
) -> Result<Json<Value>, AppError> {
    let schedules = state.schedule_service().list_for_patient(patient_id).await?;
    Ok(Json(json!(schedules)))
}

#[axum::debug_handler]
pub async fn create_schedule(
    State(state): State<ScheduleState>,
    Extension(user): Extension<User>,
    Json(request): Json<CreateScheduleRequest>,
) -> Result<(StatusCode, Json<Value>), AppError> {
    let actor = Actor::try_from(&user)?;
    require_schedule_manager(&actor)?;

    let schedule = state.schedule_service().create(&actor, request).await?;

    Ok((
        StatusCode::CREATED,
        Json(json!({
            "message": "Schedule created",
            "schedule": schedule
        })),
    ))
}

#[axum::debug_handler]
pub async fn update_schedule(
    State(state): State<ScheduleState>,
    Extension(user): Extension<User>,
    Path(id): Path<Uuid>,
    Json(request): Json<UpdateScheduleRequest>,
) -> Result<Json<Value>, AppError> {
    let actor = Actor::try_from(&user)?;
    require_schedule_manager(&actor)?;

    let schedule = state.schedule_service().update(id, request).await?;

    Ok(Json(json!({
        "message": "Schedule updated",
        "schedule": schedule
    })))
}

#[axum::debug_handler]
pub async fn delete_schedule(
    State(state): State<ScheduleState>,
    Extension(user): Extension<User>,
    Path(id): Path<Uuid>,
) -> Result<Json<Value>, AppError> {
    let actor = Actor::try_from(&user)?;
    require_schedule_manager(&actor)?;

    state.schedule_service().delete(id).await?;

    Ok(Json(json!({ "message": "Schedule deleted" })))
}

// ==============================================================================
// INSTANCE LIFECYCLE
// ==============================================================================

#[axum::debug_handler]
pub async fn complete_schedule(
    State(state): State<ScheduleState>,
    Extension(user): Extension<User>,
    Path(id): Path<Uuid>,
) -> Result<Json<Value>, AppError> {
    let actor = Actor::try_from(&user)?;
    let schedule = state.lifecycle().complete(&actor, id).await?;

    Ok(Json(json!({
        "message": "Task completed",
        "schedule": schedule
    })))
}

#[axum::debug_handler]
pub async fn mark_not_completed(
    State(state): State<ScheduleState>,
    Extension(user): Extension<User>,
    Path(id): Path<Uuid>,
    Json(request): Json<NotCompletedRequest>,
) -> Result<Json<Value>, AppError> {
    let actor = Actor::try_from(&user)?;
    let schedule = state
        .lifecycle()
        .mark_not_completed(&actor, id, request.reason.as_deref())
        .await?;

    Ok(Json(json!({
        "message": "Task marked as not completed",
        "schedule": schedule
    })))
}

#[axum::debug_handler]
pub async fn postpone_schedule(
    State(state): State<ScheduleState>,
    Extension(user): Extension<User>,
    Path(id): Path<Uuid>,
    Json(request): Json<PostponeRequest>,
) -> Result<Json<Value>, AppError> {
    let actor = Actor::try_from(&user)?;
    let schedule = state
        .lifecycle()
        .postpone(&actor, id, request.new_time.as_deref())
        .await?;

    Ok(Json(json!({
        "message": "Task postponed",
        "schedule": schedule
    })))
}

#[axum::debug_handler]
pub async fn mark_medication_given(
    State(state): State<ScheduleState>,
    Extension(user): Extension<User>,
    Path(id): Path<Uuid>,
    Json(request): Json<MedicationGivenRequest>,
) -> Result<Json<Value>, AppError> {
    let actor = Actor::try_from(&user)?;
    let schedule = state
        .lifecycle()
        .mark_medication_given(&actor, id, request.notes.as_deref())
        .await?;

    Ok(Json(json!({
        "message": "Medication marked as given",
        "schedule": schedule
    })))
}

// ==============================================================================
// MEDICATIONS
// ==============================================================================

#[axum::debug_handler]
pub async fn get_patient_medications(
    State(state): State<ScheduleState>,
    Path(patient_id): Path<Uuid>,
) -> Result<Json<Value>, AppError> {
    let medications = state.schedule_service().active_medications(patient_id).await?;
    Ok(Json(json!(medications)))
}

#[axum::debug_handler]
pub async fn add_medication(
    State(state): State<ScheduleState>,
    Extension(user): Extension<User>,
    Json(order): Json<MedicationOrderRequest>,
) -> Result<(StatusCode, Json<Value>), AppError> {
    let actor = Actor::try_from(&user)?;
    let outcome = state.generator().generate_medication_order(&actor, &order).await?;

    Ok((
        StatusCode::CREATED,
        Json(json!({
            "message": format!("Medication added. {} doses scheduled.", outcome.schedules_created),
            "schedules_created": outcome.schedules_created,
            "start_date": outcome.start_date,
            "end_date": outcome.end_date
        })),
    ))
}

#[axum::debug_handler]
pub async fn suspend_medication(
    State(state): State<ScheduleState>,
    Extension(user): Extension<User>,
    Path((patient_id, medication)): Path<(Uuid, String)>,
    Json(request): Json<SuspendMedicationRequest>,
) -> Result<Json<Value>, AppError> {
    let actor = Actor::try_from(&user)?;
    let affected = state
        .lifecycle()
        .suspend_medication(
            &actor,
            patient_id,
            &medication,
            request.reason.as_deref(),
            request.suspend_until,
        )
        .await?;

    let suspended_until = match request.suspend_until {
        Some(until) => json!(until),
        None => json!("indefinitely"),
    };

    Ok(Json(json!({
        "message": "Medication suspended",
        "doses_affected": affected,
        "suspended_until": suspended_until
    })))
}

#[axum::debug_handler]
pub async fn reactivate_medication(
    State(state): State<ScheduleState>,
    Extension(user): Extension<User>,
    Path((patient_id, medication)): Path<(Uuid, String)>,
) -> Result<Json<Value>, AppError> {
    let actor = Actor::try_from(&user)?;
    let reactivated = state
        .lifecycle()
        .reactivate_medication(&actor, patient_id, &medication)
        .await?;

    Ok(Json(json!({
        "message": "Medication reactivated",
        "doses_reactivated": reactivated
    })))
}

#[axum::debug_handler]
pub async fn delete_medication(
    State(state): State<ScheduleState>,
    Extension(user): Extension<User>,
    Path((patient_id, medication)): Path<(Uuid, String)>,
    Json(request): Json<DeleteMedicationRequest>,
) -> Result<Json<Value>, AppError> {
    let actor = Actor::try_from(&user)?;
    let deleted = state
        .lifecycle()
        .delete_medication(&actor, patient_id, &medication, request.reason.as_deref())
        .await?;

    Ok(Json(json!({
        "message": "Medication permanently deleted",
        "doses_deleted": deleted,
        "reason": request.reason.as_deref().map(str::trim)
    })))
}
