use std::sync::Arc;

use chrono::{Datelike, Days, Duration, Months, NaiveDate, NaiveDateTime, NaiveTime};
use tracing::{debug, info, instrument};
use uuid::Uuid;

use shared_database::{ScheduleStore, WardDirectory};
use shared_models::auth::Actor;
use shared_models::clinical::{
    DayOfWeek, NewSchedule, ScheduleEvent, ScheduleEventKind, ScheduleInstance, ScheduleStatus,
    ScheduleType,
};
use shared_utils::clock::Clock;

use crate::models::{
    non_blank, parse_time_of_day, DurationUnit, GenerationRules, MedicationOrderOutcome,
    MedicationOrderRequest, ScheduleError, ScheduleResult, TreatmentOrderRequest,
};
use crate::services::scope::ensure_patient_in_ward;

/// Expanded medication order, ready to persist.
#[derive(Debug, Clone, PartialEq)]
pub struct MedicationPlan {
    pub start_date: NaiveDate,
    pub end_date: NaiveDate,
    pub schedules: Vec<NewSchedule>,
}

enum TreatmentPlan {
    Single(NaiveDateTime),
    Recurring { time: NaiveTime, days: Vec<DayOfWeek> },
}

/// Turns clinical orders into concrete, pending schedule rows.
pub struct ScheduleGenerator {
    schedules: Arc<dyn ScheduleStore>,
    wards: Arc<dyn WardDirectory>,
    clock: Arc<dyn Clock>,
    rules: GenerationRules,
}

impl ScheduleGenerator {
    pub fn new(
        schedules: Arc<dyn ScheduleStore>,
        wards: Arc<dyn WardDirectory>,
        clock: Arc<dyn Clock>,
        rules: GenerationRules,
    ) -> Self {
        Self { schedules, wards, clock, rules }
    }

    // ==============================================================================
    // MEDICATION ORDERS
    // ==============================================================================

    /// Inclusive date range covered by a medication order.
    ///
    /// An explicit end date wins. Otherwise a duration of N units covers N units
    /// starting on the start date, so 3 days from the 1st ends on the 3rd. With
    /// neither, the default window is added to the start date.
    pub fn resolve_range(&self, order: &MedicationOrderRequest) -> ScheduleResult<(NaiveDate, NaiveDate)> {
        let start = order.start_date.unwrap_or_else(|| self.clock.today());

        let end = match (order.end_date, order.duration, order.duration_unit) {
            (Some(end), _, _) => end,
            (None, Some(0), Some(_)) => {
                return Err(ScheduleError::Validation("Duration must be at least 1".to_string()));
            }
            (None, Some(n), Some(unit)) => end_after(start, n, unit).ok_or_else(out_of_range)?,
            _ => start
                .checked_add_signed(Duration::days(self.rules.default_window_days))
                .ok_or_else(out_of_range)?,
        };

        if end < start {
            return Err(ScheduleError::Validation(
                "End date must not be before start date".to_string(),
            ));
        }
        if end.signed_duration_since(start).num_days() > self.rules.max_order_span_days {
            return Err(ScheduleError::Validation(format!(
                "A medication order may span at most {} days",
                self.rules.max_order_span_days
            )));
        }

        Ok((start, end))
    }

    pub fn plan_medication_order(
        &self,
        actor: &Actor,
        order: &MedicationOrderRequest,
    ) -> ScheduleResult<MedicationPlan> {
        let (Some(patient_id), Some(medication), Some(dosage)) = (
            order.patient_id,
            non_blank(order.medication.as_deref()),
            non_blank(order.dosage.as_deref()),
        ) else {
            return Err(missing_medication_fields());
        };
        if order.times.is_empty() {
            return Err(missing_medication_fields());
        }

        let mut times = order
            .times
            .iter()
            .map(|t| parse_time_of_day(t))
            .collect::<ScheduleResult<Vec<_>>>()?;
        times.sort();
        times.dedup();

        let (start_date, end_date) = self.resolve_range(order)?;
        let notes = non_blank(order.notes.as_deref())
            .map(str::to_string)
            .unwrap_or_else(|| order_summary(order));
        let generated = ScheduleEvent {
            at: self.clock.now(),
            actor_id: Some(actor.id),
            kind: ScheduleEventKind::Generated,
            detail: format!("Medication order: {} {}", medication, dosage),
        };

        let mut schedules = Vec::new();
        let mut day = start_date;
        while day <= end_date {
            if order.days.includes(DayOfWeek::from(day.weekday())) {
                for time in &times {
                    schedules.push(NewSchedule {
                        patient_id,
                        assigned_to_id: order.assigned_to_id.or(Some(actor.id)),
                        schedule_type: ScheduleType::Medication,
                        status: ScheduleStatus::Pending,
                        scheduled_time: day.and_time(*time),
                        description: format!("Administer {}", medication),
                        medication: medication.to_string(),
                        dosage: dosage.to_string(),
                        notes: notes.clone(),
                        events: vec![generated.clone()],
                    });
                }
            }
            day = match day.succ_opt() {
                Some(next) => next,
                None => break,
            };
        }

        Ok(MedicationPlan { start_date, end_date, schedules })
    }

    #[instrument(skip(self, order), fields(actor = %actor.id))]
    pub async fn generate_medication_order(
        &self,
        actor: &Actor,
        order: &MedicationOrderRequest,
    ) -> ScheduleResult<MedicationOrderOutcome> {
        let plan = self.plan_medication_order(actor, order)?;
        debug!(
            "Medication order expands to {} doses between {} and {}",
            plan.schedules.len(),
            plan.start_date,
            plan.end_date
        );

        let created = self.schedules.insert_schedules(plan.schedules).await?;
        info!("Scheduled {} medication doses", created.len());

        Ok(MedicationOrderOutcome {
            schedules_created: created.len(),
            start_date: plan.start_date,
            end_date: plan.end_date,
        })
    }

    // ==============================================================================
    // TREATMENT ORDERS
    // ==============================================================================

    /// Validates a treatment order and expands it into rows.
    ///
    /// Recurring orders repeat on each listed weekday over the treatment horizon,
    /// counted from today; occurrences before now are skipped.
    pub fn plan_treatment_order(
        &self,
        actor: &Actor,
        order: &TreatmentOrderRequest,
    ) -> ScheduleResult<(Uuid, Vec<NewSchedule>)> {
        let (Some(patient_id), Some(description)) =
            (order.patient_id, non_blank(order.description.as_deref()))
        else {
            return Err(ScheduleError::Validation(
                "Patient and description are required".to_string(),
            ));
        };

        let times = match self.treatment_plan(order)? {
            TreatmentPlan::Single(at) => vec![at],
            TreatmentPlan::Recurring { time, days } => self.recurring_times(time, &days),
        };

        let generated = ScheduleEvent {
            at: self.clock.now(),
            actor_id: Some(actor.id),
            kind: ScheduleEventKind::Generated,
            detail: format!("Treatment order: {}", description),
        };
        let schedules = times
            .into_iter()
            .map(|scheduled_time| NewSchedule {
                patient_id,
                assigned_to_id: order.assigned_to_id.or(Some(actor.id)),
                schedule_type: ScheduleType::Treatment,
                status: ScheduleStatus::Pending,
                scheduled_time,
                description: description.to_string(),
                medication: String::new(),
                dosage: String::new(),
                notes: order.notes.clone().unwrap_or_default(),
                events: vec![generated.clone()],
            })
            .collect();

        Ok((patient_id, schedules))
    }

    #[instrument(skip(self, order), fields(actor = %actor.id))]
    pub async fn generate_treatment_order(
        &self,
        actor: &Actor,
        order: &TreatmentOrderRequest,
    ) -> ScheduleResult<Vec<ScheduleInstance>> {
        let (patient_id, schedules) = self.plan_treatment_order(actor, order)?;
        ensure_patient_in_ward(self.wards.as_ref(), actor, patient_id).await?;

        let created = self.schedules.insert_schedules(schedules).await?;
        info!("Scheduled {} treatment sessions for patient {}", created.len(), patient_id);

        Ok(created)
    }

    fn treatment_plan(&self, order: &TreatmentOrderRequest) -> ScheduleResult<TreatmentPlan> {
        match order.schedule_type.as_deref().map(str::trim) {
            Some("single") => {
                if let Some(at) = order.scheduled_time {
                    return Ok(TreatmentPlan::Single(at));
                }
                match (order.date, order.time.as_deref()) {
                    (Some(date), Some(time)) => {
                        Ok(TreatmentPlan::Single(date.and_time(parse_time_of_day(time)?)))
                    }
                    _ => Err(ScheduleError::Validation(
                        "Date and time are required for a single treatment".to_string(),
                    )),
                }
            }
            Some("recurring") => {
                let Some(time) = order.time.as_deref() else {
                    return Err(missing_recurring_fields());
                };
                if order.days_of_week.is_empty() {
                    return Err(missing_recurring_fields());
                }
                let mut days = order.days_of_week.clone();
                days.sort_by_key(DayOfWeek::sunday_index);
                days.dedup();

                Ok(TreatmentPlan::Recurring {
                    time: parse_time_of_day(time)?,
                    days,
                })
            }
            _ => Err(ScheduleError::Validation(
                "Schedule type must be 'single' or 'recurring'".to_string(),
            )),
        }
    }

    fn recurring_times(&self, time: NaiveTime, days: &[DayOfWeek]) -> Vec<NaiveDateTime> {
        let now = self.clock.local_now();
        let today = now.date();
        let today_index = i64::from(DayOfWeek::from(today.weekday()).sunday_index());

        let mut times: Vec<NaiveDateTime> = (0..self.rules.treatment_horizon_weeks)
            .flat_map(move |week| {
                days.iter().filter_map(move |day| {
                    let ahead = (i64::from(day.sunday_index()) - today_index + 7) % 7 + week * 7;
                    today
                        .checked_add_signed(Duration::days(ahead))
                        .map(|date| date.and_time(time))
                })
            })
            .filter(|at| *at >= now)
            .collect();
        times.sort();
        times
    }
}

fn end_after(start: NaiveDate, n: u32, unit: DurationUnit) -> Option<NaiveDate> {
    let after = match unit {
        DurationUnit::Days => start.checked_add_days(Days::new(u64::from(n))),
        DurationUnit::Weeks => start.checked_add_days(Days::new(u64::from(n) * 7)),
        DurationUnit::Months => start.checked_add_months(Months::new(n)),
    }?;
    after.pred_opt()
}

fn order_summary(order: &MedicationOrderRequest) -> String {
    let frequency = non_blank(order.frequency.as_deref()).unwrap_or("custom");
    match (order.duration, order.duration_unit) {
        (Some(n), Some(unit)) => format!("Frequency: {}. Duration: {} {}", frequency, n, unit),
        _ => format!("Frequency: {}", frequency),
    }
}

fn missing_medication_fields() -> ScheduleError {
    ScheduleError::Validation("Patient, medication, dosage and times are required".to_string())
}

fn missing_recurring_fields() -> ScheduleError {
    ScheduleError::Validation(
        "Time and days of week are required for a recurring treatment".to_string(),
    )
}

fn out_of_range() -> ScheduleError {
    ScheduleError::Validation("Order dates are out of range".to_string())
}
