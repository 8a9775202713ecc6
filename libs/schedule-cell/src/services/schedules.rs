use std::collections::HashMap;
use std::sync::Arc;

use tracing::{debug, info};
use uuid::Uuid;

use shared_database::{ScheduleFilter, ScheduleStore, StoreError};
use shared_models::auth::Actor;
use shared_models::clinical::{
    NewSchedule, ScheduleEvent, ScheduleEventKind, ScheduleInstance, ScheduleStatus, ScheduleType,
};
use shared_utils::clock::Clock;

use crate::models::{
    non_blank, ActiveMedication, CreateScheduleRequest, ScheduleError, ScheduleListQuery,
    ScheduleResult, UpdateScheduleRequest,
};

/// Plain schedule CRUD and the per-patient medication view.
pub struct ScheduleService {
    schedules: Arc<dyn ScheduleStore>,
    clock: Arc<dyn Clock>,
}

impl ScheduleService {
    pub fn new(schedules: Arc<dyn ScheduleStore>, clock: Arc<dyn Clock>) -> Self {
        Self { schedules, clock }
    }

    pub async fn list(&self, query: &ScheduleListQuery) -> ScheduleResult<Vec<ScheduleInstance>> {
        let mut filter = ScheduleFilter::new();
        if let Some(patient_id) = query.patient_id {
            filter = filter.patient(patient_id);
        }
        if let Some(status) = query.status {
            filter = filter.with_status(status);
        }
        if let Some(schedule_type) = query.schedule_type {
            filter = filter.of_type(schedule_type);
        }
        if let Some(from) = query.from {
            filter = filter.at_or_after(from);
        }
        if let Some(to) = query.to {
            filter = filter.at_or_before(to);
        }

        let schedules = self.schedules.find_schedules(&filter).await?;
        debug!("Listed {} schedules", schedules.len());
        Ok(schedules)
    }

    pub async fn list_for_patient(&self, patient_id: Uuid) -> ScheduleResult<Vec<ScheduleInstance>> {
        Ok(self
            .schedules
            .find_schedules(&ScheduleFilter::new().patient(patient_id))
            .await?)
    }

    pub async fn create(
        &self,
        actor: &Actor,
        request: CreateScheduleRequest,
    ) -> ScheduleResult<ScheduleInstance> {
        let (Some(patient_id), Some(scheduled_time), Some(description)) = (
            request.patient_id,
            request.scheduled_time,
            non_blank(request.description.as_deref()),
        ) else {
            return Err(ScheduleError::Validation(
                "Patient, scheduled time and description are required".to_string(),
            ));
        };

        let new_schedule = NewSchedule {
            patient_id,
            assigned_to_id: request.assigned_to_id,
            schedule_type: request.schedule_type.unwrap_or_default(),
            status: ScheduleStatus::Pending,
            scheduled_time,
            description: description.to_string(),
            medication: request.medication.unwrap_or_default(),
            dosage: request.dosage.unwrap_or_default(),
            notes: request.notes.unwrap_or_default(),
            events: vec![ScheduleEvent {
                at: self.clock.now(),
                actor_id: Some(actor.id),
                kind: ScheduleEventKind::Generated,
                detail: "Created manually".to_string(),
            }],
        };

        let created = self
            .schedules
            .insert_schedules(vec![new_schedule])
            .await?
            .into_iter()
            .next()
            .ok_or_else(|| StoreError::Backend("Created schedule was not returned".to_string()))?;

        info!("Schedule {} created for patient {}", created.id, patient_id);
        Ok(created)
    }

    pub async fn update(&self, id: Uuid, request: UpdateScheduleRequest) -> ScheduleResult<ScheduleInstance> {
        let mut schedule = self
            .schedules
            .get_schedule(id)
            .await?
            .ok_or_else(|| ScheduleError::NotFound("Schedule not found".to_string()))?;

        if let Some(assignee) = request.assigned_to_id {
            schedule.assigned_to_id = assignee;
        }
        if let Some(schedule_type) = request.schedule_type {
            schedule.schedule_type = schedule_type;
        }
        if let Some(scheduled_time) = request.scheduled_time {
            schedule.scheduled_time = scheduled_time;
        }
        if let Some(description) = non_blank(request.description.as_deref()) {
            schedule.description = description.to_string();
        }
        if let Some(notes) = request.notes {
            schedule.notes = notes;
        }
        if let Some(medication) = request.medication {
            schedule.medication = medication;
        }
        if let Some(dosage) = request.dosage {
            schedule.dosage = dosage;
        }
        if let Some(status) = request.status {
            schedule.status = status;
        }
        schedule.updated_at = self.clock.now();

        self.schedules.save_schedule(&schedule).await?;
        info!("Schedule {} updated", id);
        Ok(schedule)
    }

    pub async fn delete(&self, id: Uuid) -> ScheduleResult<()> {
        if !self.schedules.remove_schedule(id).await? {
            return Err(ScheduleError::NotFound("Schedule not found".to_string()));
        }
        info!("Schedule {} deleted", id);
        Ok(())
    }

    /// Pending medication doses due from now on, one entry per (medication, dosage),
    /// soonest first.
    pub async fn active_medications(&self, patient_id: Uuid) -> ScheduleResult<Vec<ActiveMedication>> {
        let filter = ScheduleFilter::new()
            .patient(patient_id)
            .of_type(ScheduleType::Medication)
            .with_status(ScheduleStatus::Pending)
            .at_or_after(self.clock.local_now());
        let doses = self.schedules.find_schedules(&filter).await?;

        let mut grouped: HashMap<(String, String), ActiveMedication> = HashMap::new();
        for dose in doses {
            let key = (dose.medication.clone(), dose.dosage.clone());
            grouped
                .entry(key)
                .and_modify(|m| {
                    m.next_dose = m.next_dose.min(dose.scheduled_time);
                    m.last_dose = m.last_dose.max(dose.scheduled_time);
                    m.remaining_doses += 1;
                })
                .or_insert_with(|| ActiveMedication {
                    medication: dose.medication.clone(),
                    dosage: dose.dosage.clone(),
                    next_dose: dose.scheduled_time,
                    last_dose: dose.scheduled_time,
                    remaining_doses: 1,
                });
        }

        let mut medications: Vec<ActiveMedication> = grouped.into_values().collect();
        medications.sort_by(|a, b| {
            a.next_dose
                .cmp(&b.next_dose)
                .then_with(|| a.medication.cmp(&b.medication))
        });
        Ok(medications)
    }
}
