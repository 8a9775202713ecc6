use std::sync::Arc;

use chrono::NaiveDate;
use tracing::{debug, info, instrument};
use uuid::Uuid;

use shared_database::{ScheduleFilter, ScheduleStore};
use shared_models::auth::Actor;
use shared_models::clinical::{ScheduleEventKind, ScheduleInstance, ScheduleStatus};
use shared_utils::clock::Clock;

use crate::models::{
    day_bounds, non_blank, parse_time_of_day, require_reason, GenerationRules, ScheduleError,
    ScheduleResult,
};

/// Moves schedule instances through their states.
///
/// ```text
/// pending -> completed | missed         (per instance)
/// pending -> cancelled -> pending        (suspend / reactivate, future doses only)
/// pending -> removed                     (delete medication, future doses only)
/// ```
pub struct LifecycleManager {
    schedules: Arc<dyn ScheduleStore>,
    clock: Arc<dyn Clock>,
    rules: GenerationRules,
}

impl LifecycleManager {
    pub fn new(schedules: Arc<dyn ScheduleStore>, clock: Arc<dyn Clock>, rules: GenerationRules) -> Self {
        Self { schedules, clock, rules }
    }

    async fn load(&self, id: Uuid) -> ScheduleResult<ScheduleInstance> {
        self.schedules
            .get_schedule(id)
            .await?
            .ok_or_else(|| ScheduleError::NotFound("Schedule not found".to_string()))
    }

    // ==============================================================================
    // SINGLE INSTANCE
    // ==============================================================================

    pub async fn complete(&self, actor: &Actor, id: Uuid) -> ScheduleResult<ScheduleInstance> {
        let mut schedule = self.load(id).await?;

        schedule.status = ScheduleStatus::Completed;
        schedule.record_event(self.clock.now(), Some(actor.id), ScheduleEventKind::Completed, "");
        self.schedules.save_schedule(&schedule).await?;

        debug!("Schedule {} completed by {}", id, actor.id);
        Ok(schedule)
    }

    /// Marks the task as not done. The reason replaces the instance notes.
    pub async fn mark_not_completed(
        &self,
        actor: &Actor,
        id: Uuid,
        reason: Option<&str>,
    ) -> ScheduleResult<ScheduleInstance> {
        let reason = require_reason(reason, self.rules.min_reason_chars)?;
        let mut schedule = self.load(id).await?;

        schedule.status = ScheduleStatus::Missed;
        schedule.notes = reason.clone();
        schedule.record_event(self.clock.now(), Some(actor.id), ScheduleEventKind::NotCompleted, reason);
        self.schedules.save_schedule(&schedule).await?;

        info!("Schedule {} marked as not completed", id);
        Ok(schedule)
    }

    /// Moves the task to another time of the same day.
    pub async fn postpone(
        &self,
        actor: &Actor,
        id: Uuid,
        new_time: Option<&str>,
    ) -> ScheduleResult<ScheduleInstance> {
        let Some(new_time) = non_blank(new_time) else {
            return Err(ScheduleError::Validation("A new time is required".to_string()));
        };
        let time = parse_time_of_day(new_time)?;
        let mut schedule = self.load(id).await?;

        if schedule.status != ScheduleStatus::Pending {
            return Err(ScheduleError::Validation(format!(
                "Only pending tasks can be postponed (task is {})",
                schedule.status
            )));
        }

        let previous = schedule.scheduled_time;
        schedule.scheduled_time = previous.date().and_time(time);
        schedule.record_event(
            self.clock.now(),
            Some(actor.id),
            ScheduleEventKind::Postponed,
            format!("{} -> {}", previous.format("%H:%M"), time.format("%H:%M")),
        );
        self.schedules.save_schedule(&schedule).await?;

        debug!("Schedule {} postponed to {}", id, schedule.scheduled_time);
        Ok(schedule)
    }

    /// Completion shortcut for medication doses; optional notes replace the existing ones.
    pub async fn mark_medication_given(
        &self,
        actor: &Actor,
        id: Uuid,
        notes: Option<&str>,
    ) -> ScheduleResult<ScheduleInstance> {
        let mut schedule = self.load(id).await?;

        schedule.status = ScheduleStatus::Completed;
        if let Some(notes) = non_blank(notes) {
            schedule.notes = notes.to_string();
        }
        schedule.record_event(
            self.clock.now(),
            Some(actor.id),
            ScheduleEventKind::Completed,
            "Medication given",
        );
        self.schedules.save_schedule(&schedule).await?;

        debug!("Medication dose {} given", id);
        Ok(schedule)
    }

    // ==============================================================================
    // BULK, PER MEDICATION
    // ==============================================================================

    /// Cancels future pending doses of `medication`, up to and including
    /// `suspend_until` when given. Every dosage of the drug is affected.
    #[instrument(skip(self, reason), fields(actor = %actor.id))]
    pub async fn suspend_medication(
        &self,
        actor: &Actor,
        patient_id: Uuid,
        medication: &str,
        reason: Option<&str>,
        suspend_until: Option<NaiveDate>,
    ) -> ScheduleResult<u64> {
        let reason = require_reason(reason, self.rules.min_reason_chars)?;

        let mut filter = ScheduleFilter::new()
            .patient(patient_id)
            .medication(medication)
            .with_status(ScheduleStatus::Pending)
            .after(self.clock.local_now());
        if let Some(until) = suspend_until {
            let (_, end_of_until) = day_bounds(until);
            filter = filter.before(end_of_until);
        }

        let mut doses = self.schedules.find_schedules(&filter).await?;
        if doses.is_empty() {
            return Err(ScheduleError::NotFound(
                "No pending doses found to suspend".to_string(),
            ));
        }

        let marker = match suspend_until {
            Some(until) => format!("SUSPENDIDO hasta {} - Motivo: {}", until.format("%d/%m/%Y"), reason),
            None => format!("SUSPENDIDO indefinidamente - Motivo: {}", reason),
        };
        let now = self.clock.now();
        for dose in &mut doses {
            dose.status = ScheduleStatus::Cancelled;
            dose.record_event(now, Some(actor.id), ScheduleEventKind::Suspended, marker.clone());
        }
        self.schedules.save_schedules(&doses).await?;

        info!(
            "Medication '{}' suspended for patient {}: {} doses affected. Reason: {}",
            medication,
            patient_id,
            doses.len(),
            reason
        );
        Ok(doses.len() as u64)
    }

    /// Returns future cancelled doses of `medication` to pending. Zero matches is
    /// a successful no-op.
    #[instrument(skip(self), fields(actor = %actor.id))]
    pub async fn reactivate_medication(
        &self,
        actor: &Actor,
        patient_id: Uuid,
        medication: &str,
    ) -> ScheduleResult<u64> {
        let filter = ScheduleFilter::new()
            .patient(patient_id)
            .medication(medication)
            .with_status(ScheduleStatus::Cancelled)
            .after(self.clock.local_now());

        let mut doses = self.schedules.find_schedules(&filter).await?;
        let now = self.clock.now();
        for dose in &mut doses {
            dose.status = ScheduleStatus::Pending;
            dose.record_event(now, Some(actor.id), ScheduleEventKind::Reactivated, "REACTIVADO.");
        }
        self.schedules.save_schedules(&doses).await?;

        info!(
            "Medication '{}' reactivated for patient {}: {} doses",
            medication,
            patient_id,
            doses.len()
        );
        Ok(doses.len() as u64)
    }

    /// Removes pending doses of `medication` due from now on.
    ///
    /// The deletion marker is written to each row in the same unit as the removal,
    /// so it leaves the store with the row. The reason survives in the log only.
    #[instrument(skip(self, reason), fields(actor = %actor.id))]
    pub async fn delete_medication(
        &self,
        actor: &Actor,
        patient_id: Uuid,
        medication: &str,
        reason: Option<&str>,
    ) -> ScheduleResult<u64> {
        let reason = require_reason(reason, self.rules.min_reason_chars)?;

        let filter = ScheduleFilter::new()
            .patient(patient_id)
            .medication(medication)
            .with_status(ScheduleStatus::Pending)
            .at_or_after(self.clock.local_now());

        let mut doses = self.schedules.find_schedules(&filter).await?;
        if doses.is_empty() {
            return Err(ScheduleError::NotFound(
                "No pending doses found for this medication".to_string(),
            ));
        }

        let marker = format!("ELIMINADO PERMANENTEMENTE - Motivo: {}", reason);
        let now = self.clock.now();
        for dose in &mut doses {
            dose.record_event(now, Some(actor.id), ScheduleEventKind::Deleted, marker.clone());
        }
        let removed = self.schedules.retire_schedules(&doses).await?;

        info!(
            "Medication '{}' deleted for patient {}: {} doses removed. Reason: {}",
            medication, patient_id, removed, reason
        );
        Ok(removed)
    }
}
