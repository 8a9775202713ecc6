use async_trait::async_trait;
use chrono::NaiveDateTime;
use uuid::Uuid;

use shared_models::clinical::{
    AdministrationRecord, NewAdministrationRecord, NewSchedule, PatientPlacement,
    ScheduleInstance, ScheduleStatus, ScheduleType,
};

use crate::error::StoreResult;

/// Conjunction of predicates over schedule rows.
#[derive(Debug, Clone, Default, PartialEq)]
pub struct ScheduleFilter {
    pub patient_ids: Option<Vec<Uuid>>,
    pub schedule_type: Option<ScheduleType>,
    pub status: Option<ScheduleStatus>,
    pub medication: Option<String>,
    /// scheduled_time > value
    pub after: Option<NaiveDateTime>,
    /// scheduled_time >= value
    pub at_or_after: Option<NaiveDateTime>,
    /// scheduled_time < value
    pub before: Option<NaiveDateTime>,
    /// scheduled_time <= value
    pub at_or_before: Option<NaiveDateTime>,
}

impl ScheduleFilter {
    pub fn new() -> Self {
        Self::default()
    }

    pub fn patient(mut self, patient_id: Uuid) -> Self {
        self.patient_ids = Some(vec![patient_id]);
        self
    }

    pub fn patients(mut self, patient_ids: Vec<Uuid>) -> Self {
        self.patient_ids = Some(patient_ids);
        self
    }

    pub fn of_type(mut self, schedule_type: ScheduleType) -> Self {
        self.schedule_type = Some(schedule_type);
        self
    }

    pub fn with_status(mut self, status: ScheduleStatus) -> Self {
        self.status = Some(status);
        self
    }

    pub fn medication(mut self, medication: impl Into<String>) -> Self {
        self.medication = Some(medication.into());
        self
    }

    pub fn after(mut self, t: NaiveDateTime) -> Self {
        self.after = Some(t);
        self
    }

    pub fn at_or_after(mut self, t: NaiveDateTime) -> Self {
        self.at_or_after = Some(t);
        self
    }

    pub fn before(mut self, t: NaiveDateTime) -> Self {
        self.before = Some(t);
        self
    }

    pub fn at_or_before(mut self, t: NaiveDateTime) -> Self {
        self.at_or_before = Some(t);
        self
    }

    pub fn matches(&self, schedule: &ScheduleInstance) -> bool {
        let t = schedule.scheduled_time;

        self.patient_ids
            .as_ref()
            .map_or(true, |ids| ids.contains(&schedule.patient_id))
            && self.schedule_type.map_or(true, |ty| schedule.schedule_type == ty)
            && self.status.map_or(true, |st| schedule.status == st)
            && self
                .medication
                .as_deref()
                .map_or(true, |m| schedule.medication == m)
            && self.after.map_or(true, |b| t > b)
            && self.at_or_after.map_or(true, |b| t >= b)
            && self.before.map_or(true, |b| t < b)
            && self.at_or_before.map_or(true, |b| t <= b)
    }
}

/// Persistence for schedule rows.
///
/// Every multi-row write is applied atomically: either all rows change or none do.
#[async_trait]
pub trait ScheduleStore: Send + Sync {
    async fn insert_schedules(&self, schedules: Vec<NewSchedule>) -> StoreResult<Vec<ScheduleInstance>>;

    async fn get_schedule(&self, id: Uuid) -> StoreResult<Option<ScheduleInstance>>;

    /// Rows matching `filter`, ordered by scheduled time ascending.
    async fn find_schedules(&self, filter: &ScheduleFilter) -> StoreResult<Vec<ScheduleInstance>>;

    async fn count_schedules(&self, filter: &ScheduleFilter) -> StoreResult<u64>;

    async fn save_schedule(&self, schedule: &ScheduleInstance) -> StoreResult<()> {
        self.save_schedules(std::slice::from_ref(schedule)).await
    }

    /// Overwrites existing rows. Fails with `NotFound` and writes nothing if any
    /// row is unknown; a row removed concurrently is never re-created.
    async fn save_schedules(&self, schedules: &[ScheduleInstance]) -> StoreResult<()>;

    /// Persists the final state of `schedules` and then removes them, as one unit.
    async fn retire_schedules(&self, schedules: &[ScheduleInstance]) -> StoreResult<u64>;

    async fn remove_schedule(&self, id: Uuid) -> StoreResult<bool>;
}

/// Append-only store of administration records. There is no update or delete.
#[async_trait]
pub trait HistoryStore: Send + Sync {
    async fn append_record(&self, record: NewAdministrationRecord) -> StoreResult<AdministrationRecord>;

    /// Latest records for a patient, by scheduled time then creation time, newest first.
    async fn recent_for_patient(&self, patient_id: Uuid, limit: usize) -> StoreResult<Vec<AdministrationRecord>>;
}

/// Read-only view of beds, wards and who lies where.
#[async_trait]
pub trait WardDirectory: Send + Sync {
    async fn placement(&self, patient_id: Uuid) -> StoreResult<Option<PatientPlacement>>;

    /// Occupied, active beds of a ward.
    async fn placements_in_area(&self, area_id: Uuid) -> StoreResult<Vec<PatientPlacement>>;

    async fn area_name(&self, area_id: Uuid) -> StoreResult<Option<String>>;
}

#[cfg(test)]
mod tests {
    use super::*;
    use chrono::{NaiveDate, Utc};
    use shared_models::clinical::NewSchedule;

    fn at(h: u32) -> NaiveDateTime {
        NaiveDate::from_ymd_opt(2024, 3, 5).unwrap().and_hms_opt(h, 0, 0).unwrap()
    }

    fn schedule(patient_id: Uuid, h: u32) -> ScheduleInstance {
        NewSchedule {
            patient_id,
            assigned_to_id: None,
            schedule_type: ScheduleType::Medication,
            status: ScheduleStatus::Pending,
            scheduled_time: at(h),
            description: "Administer Paracetamol".to_string(),
            medication: "Paracetamol".to_string(),
            dosage: "500mg".to_string(),
            notes: String::new(),
            events: vec![],
        }
        .into_instance(Uuid::new_v4(), Utc::now())
    }

    #[test]
    fn strict_and_inclusive_bounds_differ() {
        let patient = Uuid::new_v4();
        let s = schedule(patient, 8);

        assert!(!ScheduleFilter::new().after(at(8)).matches(&s));
        assert!(ScheduleFilter::new().at_or_after(at(8)).matches(&s));
        assert!(!ScheduleFilter::new().before(at(8)).matches(&s));
        assert!(ScheduleFilter::new().at_or_before(at(8)).matches(&s));
    }

    #[test]
    fn medication_match_is_exact() {
        let s = schedule(Uuid::new_v4(), 8);
        assert!(ScheduleFilter::new().medication("Paracetamol").matches(&s));
        assert!(!ScheduleFilter::new().medication("paracetamol").matches(&s));
    }

    #[test]
    fn patient_set_membership() {
        let patient = Uuid::new_v4();
        let s = schedule(patient, 8);
        assert!(ScheduleFilter::new().patients(vec![Uuid::new_v4(), patient]).matches(&s));
        assert!(!ScheduleFilter::new().patients(vec![]).matches(&s));
    }
}
