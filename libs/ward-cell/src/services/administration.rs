use std::sync::Arc;

use tracing::{debug, info, instrument};
use uuid::Uuid;

use schedule_cell::models::{non_blank, GenerationRules, ScheduleError, ScheduleResult};
use schedule_cell::services::ensure_patient_in_ward;
use shared_database::{HistoryStore, ScheduleStore, WardDirectory};
use shared_models::auth::Actor;
use shared_models::clinical::{
    AdministrationRecord, AdministrationStatus, NewAdministrationRecord, ScheduleEventKind,
};
use shared_utils::clock::Clock;

use crate::models::AdministrationRequest;

/// Records what was done against a schedule row and serves the resulting history.
pub struct AdministrationRecorder {
    schedules: Arc<dyn ScheduleStore>,
    history: Arc<dyn HistoryStore>,
    wards: Arc<dyn WardDirectory>,
    clock: Arc<dyn Clock>,
    rules: GenerationRules,
}

impl AdministrationRecorder {
    pub fn new(
        schedules: Arc<dyn ScheduleStore>,
        history: Arc<dyn HistoryStore>,
        wards: Arc<dyn WardDirectory>,
        clock: Arc<dyn Clock>,
        rules: GenerationRules,
    ) -> Self {
        Self { schedules, history, wards, clock, rules }
    }

    /// Moves the schedule to its outcome status, then appends a history record
    /// copying the schedule's descriptive fields as they are now.
    ///
    /// The two writes are sequential. A failed append leaves the schedule updated.
    #[instrument(skip(self, request), fields(actor = %actor.id))]
    pub async fn record(
        &self,
        actor: &Actor,
        request: &AdministrationRequest,
    ) -> ScheduleResult<AdministrationRecord> {
        let (Some(schedule_id), Some(status)) = (request.schedule_id, request.status) else {
            return Err(ScheduleError::Validation(
                "Schedule id and status are required".to_string(),
            ));
        };

        let mut schedule = self
            .schedules
            .get_schedule(schedule_id)
            .await?
            .ok_or_else(|| ScheduleError::NotFound("Schedule not found".to_string()))?;

        ensure_patient_in_ward(self.wards.as_ref(), actor, schedule.patient_id).await?;

        let reason = non_blank(request.reason_not_administered.as_deref()).map(str::to_string);
        if status != AdministrationStatus::Administered && reason.is_none() {
            return Err(ScheduleError::Validation(
                "A reason is required when the dose was not administered".to_string(),
            ));
        }

        let now = self.clock.now();
        schedule.status = status.schedule_outcome();
        schedule.record_event(
            now,
            Some(actor.id),
            ScheduleEventKind::AdministrationRecorded,
            status.to_string(),
        );
        self.schedules.save_schedule(&schedule).await?;

        let record = self
            .history
            .append_record(NewAdministrationRecord {
                patient_id: schedule.patient_id,
                schedule_id: Some(schedule.id),
                administered_by_id: actor.id,
                status,
                kind: schedule.schedule_type.history_bucket(),
                description: schedule.description.clone(),
                medication: non_blank(Some(&schedule.medication)).map(str::to_string),
                dosage: non_blank(Some(&schedule.dosage)).map(str::to_string),
                scheduled_time: schedule.scheduled_time,
                administered_at: (status == AdministrationStatus::Administered).then_some(now),
                notes: non_blank(request.notes.as_deref()).map(str::to_string),
                reason_not_administered: reason,
            })
            .await?;

        info!(
            "Administration of schedule {} recorded as {} for patient {}",
            schedule.id, status, schedule.patient_id
        );
        Ok(record)
    }

    /// Latest records for the patient, newest scheduled time first.
    pub async fn patient_history(
        &self,
        actor: &Actor,
        patient_id: Uuid,
    ) -> ScheduleResult<Vec<AdministrationRecord>> {
        ensure_patient_in_ward(self.wards.as_ref(), actor, patient_id).await?;

        let records = self
            .history
            .recent_for_patient(patient_id, self.rules.history_limit)
            .await?;
        debug!("Loaded {} history records for patient {}", records.len(), patient_id);
        Ok(records)
    }
}
