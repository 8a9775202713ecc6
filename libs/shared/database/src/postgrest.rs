use std::sync::Arc;

use async_trait::async_trait;
use chrono::NaiveDateTime;
use reqwest::Method;
use serde::de::DeserializeOwned;
use serde::Deserialize;
use serde_json::{json, Value};
use tracing::{debug, instrument};
use uuid::Uuid;

use shared_config::AppConfig;
use shared_models::clinical::{
    AdministrationRecord, NewAdministrationRecord, NewSchedule, PatientPlacement,
    ScheduleInstance,
};
use shared_utils::clock::Clock;

use crate::error::{StoreError, StoreResult};
use crate::store::{HistoryStore, ScheduleFilter, ScheduleStore, WardDirectory};
use crate::supabase::{prefer_header, SupabaseClient};

const SCHEDULES: &str = "/rest/v1/schedules";
/// Supabase's default `max_rows`; larger reads are fetched page by page.
const PAGE_SIZE: usize = 1000;
const HISTORY: &str = "/rest/v1/administration_history";
const BEDS_SELECT: &str =
    "/rest/v1/beds?select=bed_number,area_id,patient_id,patients(first_name,last_name),areas(name)";

/// Store backed by Supabase PostgREST.
///
/// Requests use the service role key; ward scoping is enforced by the services,
/// not by row level security.
pub struct SupabaseStore {
    supabase: SupabaseClient,
    service_key: String,
    clock: Arc<dyn Clock>,
    page_size: usize,
}

#[derive(Debug, Deserialize)]
struct PatientName {
    first_name: String,
    last_name: String,
}

#[derive(Debug, Deserialize)]
struct AreaName {
    name: String,
}

#[derive(Debug, Deserialize)]
struct BedRow {
    bed_number: String,
    area_id: Uuid,
    patient_id: Option<Uuid>,
    patients: Option<PatientName>,
    areas: Option<AreaName>,
}

impl BedRow {
    fn into_placement(self) -> Option<PatientPlacement> {
        let patient_id = self.patient_id?;
        let patient_name = self
            .patients
            .map(|p| format!("{} {}", p.first_name, p.last_name).trim().to_string())
            .unwrap_or_default();

        Some(PatientPlacement {
            patient_id,
            patient_name,
            bed_number: self.bed_number,
            area_id: self.area_id,
            area_name: self.areas.map(|a| a.name).unwrap_or_default(),
        })
    }
}

fn encode_time(t: NaiveDateTime) -> String {
    let formatted = t.format("%Y-%m-%dT%H:%M:%S").to_string();
    urlencoding::encode(&formatted).into_owned()
}

/// PostgREST query string for a filter, without the leading `?`.
fn filter_query(filter: &ScheduleFilter) -> String {
    let mut query_parts = Vec::new();

    if let Some(ids) = &filter.patient_ids {
        let joined = ids.iter().map(Uuid::to_string).collect::<Vec<_>>().join(",");
        query_parts.push(format!("patient_id=in.({})", joined));
    }
    if let Some(ty) = filter.schedule_type {
        query_parts.push(format!("type=eq.{}", ty));
    }
    if let Some(status) = filter.status {
        query_parts.push(format!("status=eq.{}", status));
    }
    if let Some(medication) = &filter.medication {
        query_parts.push(format!("medication=eq.{}", urlencoding::encode(medication)));
    }
    if let Some(t) = filter.after {
        query_parts.push(format!("scheduled_time=gt.{}", encode_time(t)));
    }
    if let Some(t) = filter.at_or_after {
        query_parts.push(format!("scheduled_time=gte.{}", encode_time(t)));
    }
    if let Some(t) = filter.before {
        query_parts.push(format!("scheduled_time=lt.{}", encode_time(t)));
    }
    if let Some(t) = filter.at_or_before {
        query_parts.push(format!("scheduled_time=lte.{}", encode_time(t)));
    }

    // id breaks ties so pages never overlap
    query_parts.push("order=scheduled_time.asc,id.asc".to_string());
    query_parts.join("&")
}

impl SupabaseStore {
    pub fn new(config: &AppConfig, clock: Arc<dyn Clock>) -> Self {
        Self {
            supabase: SupabaseClient::new(config),
            service_key: config.supabase_service_role_key.clone(),
            clock,
            page_size: PAGE_SIZE,
        }
    }

    /// Rows per request; must not exceed the server's `max_rows`.
    pub fn with_page_size(mut self, page_size: usize) -> Self {
        self.page_size = page_size.max(1);
        self
    }

    fn token(&self) -> Option<&str> {
        Some(self.service_key.as_str())
    }

    /// Reads every row of an ordered query, `page_size` rows at a time, stopping
    /// at a short page or once `cap` rows are collected.
    async fn get_paged<T>(&self, path: &str, cap: Option<usize>) -> StoreResult<Vec<T>>
    where
        T: DeserializeOwned + Send,
    {
        let mut rows: Vec<T> = Vec::new();
        loop {
            let wanted = match cap {
                Some(cap) => self.page_size.min(cap - rows.len()),
                None => self.page_size,
            };
            let page_path = format!("{}&limit={}&offset={}", path, wanted, rows.len());
            let page: Vec<T> = self
                .supabase
                .request(Method::GET, &page_path, self.token(), None)
                .await?;

            let short = page.len() < wanted;
            rows.extend(page);
            if short || cap.is_some_and(|cap| rows.len() >= cap) {
                break;
            }
        }

        debug!("Read {} rows from {}", rows.len(), path);
        Ok(rows)
    }

    async fn bed_rows(&self, query: &str) -> StoreResult<Vec<PatientPlacement>> {
        let path = format!("{}&{}", BEDS_SELECT, query);
        let rows: Vec<BedRow> = self
            .supabase
            .request(Method::GET, &path, self.token(), None)
            .await?;

        Ok(rows.into_iter().filter_map(BedRow::into_placement).collect())
    }
}

#[async_trait]
impl ScheduleStore for SupabaseStore {
    #[instrument(skip(self, schedules), fields(count = schedules.len()))]
    async fn insert_schedules(&self, schedules: Vec<NewSchedule>) -> StoreResult<Vec<ScheduleInstance>> {
        if schedules.is_empty() {
            return Ok(Vec::new());
        }

        let now = self.clock.now();
        let created: Vec<ScheduleInstance> = schedules
            .into_iter()
            .map(|s| s.into_instance(Uuid::new_v4(), now))
            .collect();

        // One POST with an array body is a single statement on the server.
        self.supabase
            .execute(
                Method::POST,
                SCHEDULES,
                self.token(),
                Some(serde_json::to_value(&created)?),
                Some(prefer_header("return=minimal")),
            )
            .await?;

        debug!("Inserted {} schedule rows", created.len());
        Ok(created)
    }

    async fn get_schedule(&self, id: Uuid) -> StoreResult<Option<ScheduleInstance>> {
        let path = format!("{}?id=eq.{}", SCHEDULES, id);
        let rows: Vec<ScheduleInstance> = self
            .supabase
            .request(Method::GET, &path, self.token(), None)
            .await?;

        Ok(rows.into_iter().next())
    }

    async fn find_schedules(&self, filter: &ScheduleFilter) -> StoreResult<Vec<ScheduleInstance>> {
        let path = format!("{}?{}", SCHEDULES, filter_query(filter));
        self.get_paged(&path, None).await
    }

    async fn count_schedules(&self, filter: &ScheduleFilter) -> StoreResult<u64> {
        let path = format!("{}?select=id&{}", SCHEDULES, filter_query(filter));
        Ok(self.supabase.count(&path, self.token()).await?)
    }

    async fn save_schedule(&self, schedule: &ScheduleInstance) -> StoreResult<()> {
        // PATCH only touches existing rows; a concurrently removed row stays removed.
        let path = format!("{}?id=eq.{}", SCHEDULES, schedule.id);
        let updated: Vec<Value> = self
            .supabase
            .request_with_headers(
                Method::PATCH,
                &path,
                self.token(),
                Some(serde_json::to_value(schedule)?),
                Some(prefer_header("return=representation")),
            )
            .await?;

        if updated.is_empty() {
            return Err(StoreError::NotFound(format!("schedule {}", schedule.id)));
        }
        Ok(())
    }

    /// Multi-row updates go through `rpc/update_schedules(rows jsonb) returns integer`.
    ///
    /// The function locks the rows named in `rows` (`FOR UPDATE`). If every id
    /// exists it overwrites them and returns their count. Otherwise it writes
    /// nothing and returns 0. It never inserts.
    #[instrument(skip(self, schedules), fields(count = schedules.len()))]
    async fn save_schedules(&self, schedules: &[ScheduleInstance]) -> StoreResult<()> {
        match schedules {
            [] => Ok(()),
            [single] => self.save_schedule(single).await,
            _ => {
                let updated: u64 = self
                    .supabase
                    .request(
                        Method::POST,
                        "/rest/v1/rpc/update_schedules",
                        self.token(),
                        Some(json!({ "rows": schedules })),
                    )
                    .await?;

                if updated != schedules.len() as u64 {
                    return Err(StoreError::NotFound(format!(
                        "{} of {} schedule rows",
                        (schedules.len() as u64).saturating_sub(updated),
                        schedules.len()
                    )));
                }
                Ok(())
            }
        }
    }

    #[instrument(skip(self, schedules), fields(count = schedules.len()))]
    async fn retire_schedules(&self, schedules: &[ScheduleInstance]) -> StoreResult<u64> {
        if schedules.is_empty() {
            return Ok(0);
        }

        // rpc/retire_schedules(rows jsonb) returns integer: in one transaction it
        // locks the named rows and, only if all exist, writes their final state
        // (events included) and deletes them. Returns the count, or 0 untouched.
        let removed: u64 = self
            .supabase
            .request(
                Method::POST,
                "/rest/v1/rpc/retire_schedules",
                self.token(),
                Some(json!({ "rows": schedules })),
            )
            .await?;

        if removed != schedules.len() as u64 {
            return Err(StoreError::NotFound(format!(
                "{} of {} schedule rows",
                (schedules.len() as u64).saturating_sub(removed),
                schedules.len()
            )));
        }
        Ok(removed)
    }

    async fn remove_schedule(&self, id: Uuid) -> StoreResult<bool> {
        let path = format!("{}?id=eq.{}", SCHEDULES, id);
        let removed: Vec<Value> = self
            .supabase
            .request_with_headers(
                Method::DELETE,
                &path,
                self.token(),
                None,
                Some(prefer_header("return=representation")),
            )
            .await?;

        Ok(!removed.is_empty())
    }
}

#[async_trait]
impl HistoryStore for SupabaseStore {
    async fn append_record(&self, record: NewAdministrationRecord) -> StoreResult<AdministrationRecord> {
        let record = record.into_record(Uuid::new_v4(), self.clock.now());

        self.supabase
            .execute(
                Method::POST,
                HISTORY,
                self.token(),
                Some(serde_json::to_value(&record)?),
                Some(prefer_header("return=minimal")),
            )
            .await?;

        Ok(record)
    }

    async fn recent_for_patient(&self, patient_id: Uuid, limit: usize) -> StoreResult<Vec<AdministrationRecord>> {
        if limit == 0 {
            return Ok(Vec::new());
        }
        let path = format!(
            "{}?patient_id=eq.{}&order=scheduled_time.desc,created_at.desc,id.desc",
            HISTORY, patient_id
        );
        self.get_paged(&path, Some(limit)).await
    }
}

#[async_trait]
impl WardDirectory for SupabaseStore {
    async fn placement(&self, patient_id: Uuid) -> StoreResult<Option<PatientPlacement>> {
        let query = format!("patient_id=eq.{}&is_active=eq.true&limit=1", patient_id);
        Ok(self.bed_rows(&query).await?.into_iter().next())
    }

    async fn placements_in_area(&self, area_id: Uuid) -> StoreResult<Vec<PatientPlacement>> {
        let query = format!(
            "area_id=eq.{}&is_active=eq.true&patient_id=not.is.null&order=bed_number.asc",
            area_id
        );
        self.bed_rows(&query).await
    }

    async fn area_name(&self, area_id: Uuid) -> StoreResult<Option<String>> {
        let path = format!("/rest/v1/areas?select=name&id=eq.{}", area_id);
        let rows: Vec<AreaName> = self
            .supabase
            .request(Method::GET, &path, self.token(), None)
            .await?;

        Ok(rows.into_iter().next().map(|a| a.name))
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use chrono::NaiveDate;
    use shared_models::clinical::{ScheduleStatus, ScheduleType};

    #[test]
    fn filter_query_encodes_bounds_and_sets() {
        let patient = Uuid::new_v4();
        let t = NaiveDate::from_ymd_opt(2024, 3, 5).unwrap().and_hms_opt(8, 0, 0).unwrap();
        let filter = ScheduleFilter::new()
            .patient(patient)
            .of_type(ScheduleType::Medication)
            .with_status(ScheduleStatus::Pending)
            .medication("Amoxicillin Forte")
            .after(t);

        let query = filter_query(&filter);
        assert!(query.contains(&format!("patient_id=in.({})", patient)));
        assert!(query.contains("type=eq.medication"));
        assert!(query.contains("status=eq.pending"));
        assert!(query.contains("medication=eq.Amoxicillin%20Forte"));
        assert!(query.contains("scheduled_time=gt.2024-03-05T08%3A00%3A00"));
        assert!(query.ends_with("order=scheduled_time.asc,id.asc"));
    }

    #[test]
    fn empty_bed_is_not_a_placement() {
        let row = BedRow {
            bed_number: "12".to_string(),
            area_id: Uuid::new_v4(),
            patient_id: None,
            patients: None,
            areas: None,
        };
        assert!(row.into_placement().is_none());
    }
}
