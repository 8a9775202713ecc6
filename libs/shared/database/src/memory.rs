use std::collections::HashMap;
use std::sync::Arc;

use async_trait::async_trait;
use tokio::sync::RwLock;
use tracing::debug;
use uuid::Uuid;

use shared_models::clinical::{
    AdministrationRecord, NewAdministrationRecord, NewSchedule, PatientPlacement,
    ScheduleInstance,
};
use shared_utils::clock::Clock;

use crate::error::{StoreError, StoreResult};
use crate::store::{HistoryStore, ScheduleFilter, ScheduleStore, WardDirectory};

/// Process-local store used for development runs and tests.
///
/// Each bulk write holds the schedule lock for its whole duration, so readers
/// never observe a half-applied batch.
pub struct InMemoryStore {
    schedules: RwLock<HashMap<Uuid, ScheduleInstance>>,
    history: RwLock<Vec<AdministrationRecord>>,
    placements: RwLock<HashMap<Uuid, PatientPlacement>>,
    areas: RwLock<HashMap<Uuid, String>>,
    clock: Arc<dyn Clock>,
}

impl InMemoryStore {
    pub fn new(clock: Arc<dyn Clock>) -> Self {
        Self {
            schedules: RwLock::new(HashMap::new()),
            history: RwLock::new(Vec::new()),
            placements: RwLock::new(HashMap::new()),
            areas: RwLock::new(HashMap::new()),
            clock,
        }
    }

    /// Places a patient in a bed. The bed's ward is registered if unknown.
    pub async fn admit_patient(&self, placement: PatientPlacement) {
        self.areas
            .write()
            .await
            .entry(placement.area_id)
            .or_insert_with(|| placement.area_name.clone());
        self.placements
            .write()
            .await
            .insert(placement.patient_id, placement);
    }

    pub async fn schedule_count(&self) -> usize {
        self.schedules.read().await.len()
    }

    pub async fn history_len(&self) -> usize {
        self.history.read().await.len()
    }
}

fn ensure_all_present(
    rows: &HashMap<Uuid, ScheduleInstance>,
    schedules: &[ScheduleInstance],
) -> StoreResult<()> {
    match schedules.iter().find(|s| !rows.contains_key(&s.id)) {
        Some(missing) => Err(StoreError::NotFound(format!("schedule {}", missing.id))),
        None => Ok(()),
    }
}

#[async_trait]
impl ScheduleStore for InMemoryStore {
    async fn insert_schedules(&self, schedules: Vec<NewSchedule>) -> StoreResult<Vec<ScheduleInstance>> {
        let now = self.clock.now();
        let created: Vec<ScheduleInstance> = schedules
            .into_iter()
            .map(|s| s.into_instance(Uuid::new_v4(), now))
            .collect();

        let mut rows = self.schedules.write().await;
        for schedule in &created {
            rows.insert(schedule.id, schedule.clone());
        }
        debug!("Inserted {} schedule rows", created.len());

        Ok(created)
    }

    async fn get_schedule(&self, id: Uuid) -> StoreResult<Option<ScheduleInstance>> {
        Ok(self.schedules.read().await.get(&id).cloned())
    }

    async fn find_schedules(&self, filter: &ScheduleFilter) -> StoreResult<Vec<ScheduleInstance>> {
        let rows = self.schedules.read().await;
        let mut found: Vec<ScheduleInstance> = rows
            .values()
            .filter(|s| filter.matches(s))
            .cloned()
            .collect();
        found.sort_by(|a, b| {
            a.scheduled_time
                .cmp(&b.scheduled_time)
                .then(a.created_at.cmp(&b.created_at))
        });
        Ok(found)
    }

    async fn count_schedules(&self, filter: &ScheduleFilter) -> StoreResult<u64> {
        let rows = self.schedules.read().await;
        Ok(rows.values().filter(|s| filter.matches(s)).count() as u64)
    }

    async fn save_schedules(&self, schedules: &[ScheduleInstance]) -> StoreResult<()> {
        let mut rows = self.schedules.write().await;
        ensure_all_present(&rows, schedules)?;

        for schedule in schedules {
            rows.insert(schedule.id, schedule.clone());
        }
        Ok(())
    }

    async fn retire_schedules(&self, schedules: &[ScheduleInstance]) -> StoreResult<u64> {
        let mut rows = self.schedules.write().await;
        ensure_all_present(&rows, schedules)?;

        for schedule in schedules {
            rows.insert(schedule.id, schedule.clone());
        }
        let removed = schedules
            .iter()
            .filter(|s| rows.remove(&s.id).is_some())
            .count();
        Ok(removed as u64)
    }

    async fn remove_schedule(&self, id: Uuid) -> StoreResult<bool> {
        Ok(self.schedules.write().await.remove(&id).is_some())
    }
}

#[async_trait]
impl HistoryStore for InMemoryStore {
    async fn append_record(&self, record: NewAdministrationRecord) -> StoreResult<AdministrationRecord> {
        let record = record.into_record(Uuid::new_v4(), self.clock.now());
        self.history.write().await.push(record.clone());
        Ok(record)
    }

    async fn recent_for_patient(&self, patient_id: Uuid, limit: usize) -> StoreResult<Vec<AdministrationRecord>> {
        let history = self.history.read().await;
        let mut records: Vec<AdministrationRecord> = history
            .iter()
            .filter(|r| r.patient_id == patient_id)
            .cloned()
            .collect();
        records.sort_by(|a, b| {
            b.scheduled_time
                .cmp(&a.scheduled_time)
                .then(b.created_at.cmp(&a.created_at))
        });
        records.truncate(limit);
        Ok(records)
    }
}

#[async_trait]
impl WardDirectory for InMemoryStore {
    async fn placement(&self, patient_id: Uuid) -> StoreResult<Option<PatientPlacement>> {
        Ok(self.placements.read().await.get(&patient_id).cloned())
    }

    async fn placements_in_area(&self, area_id: Uuid) -> StoreResult<Vec<PatientPlacement>> {
        let placements = self.placements.read().await;
        let mut in_area: Vec<PatientPlacement> = placements
            .values()
            .filter(|p| p.area_id == area_id)
            .cloned()
            .collect();
        in_area.sort_by(|a, b| a.bed_number.cmp(&b.bed_number));
        Ok(in_area)
    }

    async fn area_name(&self, area_id: Uuid) -> StoreResult<Option<String>> {
        Ok(self.areas.read().await.get(&area_id).cloned())
    }
}
