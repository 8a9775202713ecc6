use std::collections::{BTreeMap, HashMap};
use std::sync::Arc;

use tracing::debug;
use uuid::Uuid;

use schedule_cell::models::{day_bounds, ScheduleError, ScheduleResult};
use schedule_cell::services::{ensure_patient_in_ward, ward_patients};
use shared_database::{ScheduleFilter, ScheduleStore, WardDirectory};
use shared_models::auth::Actor;
use shared_models::clinical::{PatientPlacement, ScheduleInstance, ScheduleStatus, ScheduleType};
use shared_utils::clock::Clock;

use crate::models::{
    DayMedication, DayScheduleItem, DemandPatient, HourBucket, NurseStats, PatientDay,
    PharmacyDemand, TaskItem,
};

const UNASSIGNED_AREA: &str = "Unassigned";
const UNNAMED_MEDICATION: &str = "Medication";

/// Read-only views over today's work in the actor's ward.
pub struct WardReports {
    schedules: Arc<dyn ScheduleStore>,
    wards: Arc<dyn WardDirectory>,
    clock: Arc<dyn Clock>,
}

impl WardReports {
    pub fn new(
        schedules: Arc<dyn ScheduleStore>,
        wards: Arc<dyn WardDirectory>,
        clock: Arc<dyn Clock>,
    ) -> Self {
        Self { schedules, wards, clock }
    }

    /// Schedules of `patients` due today, ward wall-clock.
    fn today_filter(&self, patients: &[PatientPlacement]) -> ScheduleFilter {
        let (start, end) = day_bounds(self.clock.today());
        ScheduleFilter::new()
            .patients(patients.iter().map(|p| p.patient_id).collect())
            .at_or_after(start)
            .before(end)
    }

    pub async fn nurse_stats(&self, actor: &Actor) -> ScheduleResult<NurseStats> {
        let assigned_area = match actor.assigned_area_id {
            Some(area_id) => self.wards.area_name(area_id).await?,
            None => None,
        }
        .unwrap_or_else(|| UNASSIGNED_AREA.to_string());

        let patients = ward_patients(self.wards.as_ref(), actor).await?;
        if patients.is_empty() {
            return Ok(NurseStats {
                assigned_area,
                assigned_patients_count: 0,
                pending_tasks_count: 0,
                medications_today: 0,
            });
        }

        let today = self.today_filter(&patients);
        let pending_tasks_count = self
            .schedules
            .count_schedules(&today.clone().with_status(ScheduleStatus::Pending))
            .await?;
        let medications_today = self
            .schedules
            .count_schedules(&today.of_type(ScheduleType::Medication))
            .await?;

        Ok(NurseStats {
            assigned_area,
            assigned_patients_count: patients.len(),
            pending_tasks_count,
            medications_today,
        })
    }

    /// Today's tasks of every patient in the ward, bucketed by hour of day.
    pub async fn today_tasks(&self, actor: &Actor) -> ScheduleResult<Vec<HourBucket>> {
        let patients = ward_patients(self.wards.as_ref(), actor).await?;
        if patients.is_empty() {
            return Ok(Vec::new());
        }

        let schedules = self.schedules.find_schedules(&self.today_filter(&patients)).await?;
        debug!("{} tasks due today in the ward", schedules.len());

        let beds: HashMap<Uuid, &PatientPlacement> =
            patients.iter().map(|p| (p.patient_id, p)).collect();

        // "HH:00" keys sort in hour order
        let mut buckets: BTreeMap<String, Vec<TaskItem>> = BTreeMap::new();
        for schedule in schedules {
            let bed = beds.get(&schedule.patient_id).copied();
            let item = task_item(schedule, bed);
            buckets.entry(item.hour.clone()).or_default().push(item);
        }

        Ok(buckets
            .into_iter()
            .map(|(hour, tasks)| HourBucket { hour, tasks })
            .collect())
    }

    /// Today's medication doses across the ward, one entry per (medication, dosage),
    /// in order of the first dose.
    pub async fn pharmacy_demand(&self, actor: &Actor) -> ScheduleResult<Vec<PharmacyDemand>> {
        let patients = ward_patients(self.wards.as_ref(), actor).await?;
        if patients.is_empty() {
            return Ok(Vec::new());
        }

        let doses = self
            .schedules
            .find_schedules(&self.today_filter(&patients).of_type(ScheduleType::Medication))
            .await?;
        let beds: HashMap<Uuid, &PatientPlacement> =
            patients.iter().map(|p| (p.patient_id, p)).collect();

        let mut demand: Vec<PharmacyDemand> = Vec::new();
        let mut index: HashMap<(String, String), usize> = HashMap::new();
        for dose in doses {
            let key = (dose.medication.clone(), dose.dosage.clone());
            let slot = *index.entry(key).or_insert_with(|| {
                demand.push(PharmacyDemand {
                    name: if dose.medication.is_empty() {
                        UNNAMED_MEDICATION.to_string()
                    } else {
                        dose.medication.clone()
                    },
                    dosage: dose.dosage.clone(),
                    total_doses: 0,
                    patients_count: 0,
                    patients: Vec::new(),
                    requested: false,
                });
                demand.len() - 1
            });

            let entry = &mut demand[slot];
            entry.total_doses += 1;
            if entry.patients.iter().all(|p| p.patient_id != dose.patient_id) {
                if let Some(bed) = beds.get(&dose.patient_id) {
                    entry.patients.push(DemandPatient {
                        patient_id: bed.patient_id,
                        patient_name: bed.patient_name.clone(),
                        bed_number: bed.bed_number.clone(),
                        area_name: bed.area_name.clone(),
                    });
                    entry.patients_count = entry.patients.len();
                }
            }
        }

        debug!("Pharmacy demand covers {} medications", demand.len());
        Ok(demand)
    }

    /// Every patient of the actor's ward, in bed order, with today's schedule.
    pub async fn my_patients(&self, actor: &Actor) -> ScheduleResult<Vec<PatientDay>> {
        let patients = ward_patients(self.wards.as_ref(), actor).await?;
        if patients.is_empty() {
            return Ok(Vec::new());
        }

        let schedules = self.schedules.find_schedules(&self.today_filter(&patients)).await?;
        let mut by_patient: HashMap<Uuid, Vec<ScheduleInstance>> = HashMap::new();
        for schedule in schedules {
            by_patient.entry(schedule.patient_id).or_default().push(schedule);
        }

        Ok(patients
            .into_iter()
            .map(|placement| {
                let today = by_patient.remove(&placement.patient_id).unwrap_or_default();
                patient_day(placement, today)
            })
            .collect())
    }

    /// Today's schedule of one patient. Ward staff only see their own ward.
    pub async fn patient_today(&self, actor: &Actor, patient_id: Uuid) -> ScheduleResult<PatientDay> {
        ensure_patient_in_ward(self.wards.as_ref(), actor, patient_id).await?;

        let placement = self
            .wards
            .placement(patient_id)
            .await?
            .ok_or_else(|| ScheduleError::NotFound(format!("Patient {} has no bed", patient_id)))?;

        let today = self
            .schedules
            .find_schedules(&self.today_filter(std::slice::from_ref(&placement)))
            .await?;
        debug!("Patient {} has {} schedules today", patient_id, today.len());

        Ok(patient_day(placement, today))
    }
}

/// `today` must already be in scheduled-time order.
fn patient_day(placement: PatientPlacement, today: Vec<ScheduleInstance>) -> PatientDay {
    let pending_tasks = today
        .iter()
        .filter(|s| s.status == ScheduleStatus::Pending)
        .count();

    let medications = today
        .iter()
        .filter(|s| s.schedule_type == ScheduleType::Medication)
        .map(|s| DayMedication {
            schedule_id: s.id,
            name: if s.medication.is_empty() {
                UNNAMED_MEDICATION.to_string()
            } else {
                s.medication.clone()
            },
            dosage: s.dosage.clone(),
            time: s.scheduled_time.format("%H:%M").to_string(),
        })
        .collect();

    let today_schedule = today
        .into_iter()
        .map(|s| DayScheduleItem {
            schedule_id: s.id,
            time: s.scheduled_time.format("%H:%M").to_string(),
            schedule_type: s.schedule_type,
            description: s.description,
            medication: Some(s.medication).filter(|m| !m.is_empty()),
            dosage: Some(s.dosage).filter(|d| !d.is_empty()),
            completed: s.status == ScheduleStatus::Completed,
            status: s.status,
        })
        .collect();

    PatientDay {
        patient_id: placement.patient_id,
        patient_name: placement.patient_name,
        bed_number: placement.bed_number,
        area_name: placement.area_name,
        pending_tasks,
        medications,
        today_schedule,
    }
}

fn task_item(schedule: ScheduleInstance, bed: Option<&PatientPlacement>) -> TaskItem {
    let missed = schedule.status == ScheduleStatus::Missed;
    TaskItem {
        id: schedule.id,
        time: schedule.scheduled_time.format("%H:%M").to_string(),
        hour: schedule.scheduled_time.format("%H:00").to_string(),
        schedule_type: schedule.schedule_type,
        description: schedule.description,
        patient_name: bed.map_or_else(|| "Unknown".to_string(), |b| b.patient_name.clone()),
        bed_number: bed.map_or_else(|| "N/A".to_string(), |b| b.bed_number.clone()),
        medication: Some(schedule.medication).filter(|m| !m.is_empty()),
        dosage: Some(schedule.dosage).filter(|d| !d.is_empty()),
        completed: schedule.status == ScheduleStatus::Completed,
        not_completed: missed,
        not_completed_reason: if missed { schedule.notes } else { String::new() },
        status: schedule.status,
    }
}
