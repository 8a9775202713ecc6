use tracing::warn;
use uuid::Uuid;

use shared_database::WardDirectory;
use shared_models::auth::Actor;
use shared_models::clinical::PatientPlacement;

use crate::models::{ScheduleError, ScheduleResult};

/// Rejects the actor unless the patient lies in a bed of the actor's ward.
/// Admins and supervisors are not ward-restricted.
pub async fn ensure_patient_in_ward(
    wards: &dyn WardDirectory,
    actor: &Actor,
    patient_id: Uuid,
) -> ScheduleResult<()> {
    if actor.role.is_supervisory() {
        return Ok(());
    }

    let Some(area_id) = actor.assigned_area_id else {
        warn!("Staff {} has no assigned ward", actor.id);
        return Err(ScheduleError::Forbidden("No ward assigned to this staff member".to_string()));
    };

    match wards.placement(patient_id).await? {
        Some(placement) if placement.area_id == area_id => Ok(()),
        _ => {
            warn!("Staff {} denied access to patient {} outside ward {}", actor.id, patient_id, area_id);
            Err(ScheduleError::Forbidden(
                "Patient is not in your assigned ward".to_string(),
            ))
        }
    }
}

/// Patients currently in the actor's assigned ward; empty when no ward is assigned.
pub async fn ward_patients(
    wards: &dyn WardDirectory,
    actor: &Actor,
) -> ScheduleResult<Vec<PatientPlacement>> {
    match actor.assigned_area_id {
        Some(area_id) => Ok(wards.placements_in_area(area_id).await?),
        None => Ok(Vec::new()),
    }
}
