use std::sync::Arc;

use chrono::{Duration, NaiveDate, NaiveDateTime, NaiveTime};
use serde::{Deserialize, Deserializer, Serialize};
use thiserror::Error;
use uuid::Uuid;

use shared_config::AppConfig;
use shared_database::{ScheduleStore, StoreError, WardDirectory};
use shared_models::clinical::{DayOfWeek, ScheduleStatus, ScheduleType};
use shared_models::error::AppError;
use shared_utils::clock::Clock;

use crate::services::{LifecycleManager, ScheduleGenerator, ScheduleService};

// ==============================================================================
// STATE
// ==============================================================================

/// Everything the schedule routes need: config for the auth layer, the stores
/// and the clock every time rule reads from.
#[derive(Clone)]
pub struct ScheduleState {
    pub config: Arc<AppConfig>,
    pub schedules: Arc<dyn ScheduleStore>,
    pub wards: Arc<dyn WardDirectory>,
    pub clock: Arc<dyn Clock>,
    pub rules: GenerationRules,
}

impl ScheduleState {
    pub fn generator(&self) -> ScheduleGenerator {
        ScheduleGenerator::new(
            self.schedules.clone(),
            self.wards.clone(),
            self.clock.clone(),
            self.rules,
        )
    }

    pub fn lifecycle(&self) -> LifecycleManager {
        LifecycleManager::new(self.schedules.clone(), self.clock.clone(), self.rules)
    }

    pub fn schedule_service(&self) -> ScheduleService {
        ScheduleService::new(self.schedules.clone(), self.clock.clone())
    }
}

/// Limits applied when orders are expanded and when instances change state.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct GenerationRules {
    /// Window used when a medication order names neither an end date nor a duration.
    pub default_window_days: i64,
    pub treatment_horizon_weeks: i64,
    pub min_reason_chars: usize,
    pub history_limit: usize,
    pub max_order_span_days: i64,
}

impl Default for GenerationRules {
    fn default() -> Self {
        Self {
            default_window_days: 30,
            treatment_horizon_weeks: 4,
            min_reason_chars: 10,
            history_limit: 100,
            max_order_span_days: 366,
        }
    }
}

// ==============================================================================
// ERRORS
// ==============================================================================

#[derive(Error, Debug)]
pub enum ScheduleError {
    #[error("{0}")]
    Validation(String),

    #[error("{0}")]
    NotFound(String),

    #[error("{0}")]
    Forbidden(String),

    #[error(transparent)]
    Store(#[from] StoreError),
}

impl From<ScheduleError> for AppError {
    fn from(err: ScheduleError) -> Self {
        match err {
            ScheduleError::Validation(msg) => AppError::ValidationError(msg),
            ScheduleError::NotFound(msg) => AppError::NotFound(msg),
            ScheduleError::Forbidden(msg) => AppError::Forbidden(msg),
            ScheduleError::Store(StoreError::NotFound(msg)) => AppError::NotFound(msg),
            ScheduleError::Store(e) => AppError::Database(e.to_string()),
        }
    }
}

pub type ScheduleResult<T> = Result<T, ScheduleError>;

/// Parses a wall-clock `HH:MM` value.
pub fn parse_time_of_day(value: &str) -> ScheduleResult<NaiveTime> {
    NaiveTime::parse_from_str(value.trim(), "%H:%M")
        .map_err(|_| ScheduleError::Validation(format!("Invalid time '{}', expected HH:MM", value)))
}

/// Returns the trimmed reason, or a validation error when it is shorter than `min_chars`.
pub fn require_reason(reason: Option<&str>, min_chars: usize) -> ScheduleResult<String> {
    let trimmed = reason.map(str::trim).unwrap_or_default();
    if trimmed.chars().count() < min_chars {
        return Err(ScheduleError::Validation(format!(
            "A reason of at least {} characters is required",
            min_chars
        )));
    }
    Ok(trimmed.to_string())
}

/// `[day 00:00, next day 00:00)` in ward wall-clock time.
pub fn day_bounds(day: NaiveDate) -> (NaiveDateTime, NaiveDateTime) {
    let start = day.and_time(NaiveTime::MIN);
    (start, start + Duration::days(1))
}

/// Trimmed value, or `None` when absent or blank.
pub fn non_blank(value: Option<&str>) -> Option<&str> {
    value.map(str::trim).filter(|v| !v.is_empty())
}

// ==============================================================================
// ORDERS
// ==============================================================================

/// Which weekdays a medication order applies to: `"all"` or a list of days.
/// A null or empty value means every day.
#[derive(Debug, Clone, PartialEq, Eq, Default, Deserialize)]
#[serde(try_from = "RawDayFilter")]
pub enum DayFilter {
    #[default]
    All,
    Only(Vec<DayOfWeek>),
}

#[derive(Deserialize)]
#[serde(untagged)]
enum RawDayFilter {
    Unset(()),
    Keyword(String),
    Days(Vec<DayOfWeek>),
}

impl TryFrom<RawDayFilter> for DayFilter {
    type Error = String;

    fn try_from(raw: RawDayFilter) -> Result<Self, Self::Error> {
        match raw {
            RawDayFilter::Unset(()) => Ok(DayFilter::All),
            RawDayFilter::Keyword(k) if k.trim().is_empty() || k.trim().eq_ignore_ascii_case("all") => {
                Ok(DayFilter::All)
            }
            RawDayFilter::Days(days) if days.is_empty() => Ok(DayFilter::All),
            RawDayFilter::Keyword(k) => Err(format!("Unknown day filter: {}", k)),
            RawDayFilter::Days(days) => Ok(DayFilter::Only(days)),
        }
    }
}

impl DayFilter {
    pub fn includes(&self, day: DayOfWeek) -> bool {
        match self {
            DayFilter::All => true,
            DayFilter::Only(days) => days.contains(&day),
        }
    }
}

#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum DurationUnit {
    Days,
    Weeks,
    Months,
}

impl std::fmt::Display for DurationUnit {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        match self {
            DurationUnit::Days => write!(f, "days"),
            DurationUnit::Weeks => write!(f, "weeks"),
            DurationUnit::Months => write!(f, "months"),
        }
    }
}

/// Recurring medication order: give `medication` at each of `times` on every
/// qualifying day between the start and end dates.
#[derive(Debug, Clone, Default, Deserialize)]
pub struct MedicationOrderRequest {
    pub patient_id: Option<Uuid>,
    pub medication: Option<String>,
    pub dosage: Option<String>,
    /// Free label such as "twice" or "every_8h"; only echoed into notes.
    pub frequency: Option<String>,
    #[serde(default)]
    pub times: Vec<String>,
    #[serde(default)]
    pub days: DayFilter,
    pub start_date: Option<NaiveDate>,
    pub end_date: Option<NaiveDate>,
    pub duration: Option<u32>,
    pub duration_unit: Option<DurationUnit>,
    pub notes: Option<String>,
    pub assigned_to_id: Option<Uuid>,
}

#[derive(Debug, Clone, Serialize, PartialEq)]
pub struct MedicationOrderOutcome {
    pub schedules_created: usize,
    pub start_date: NaiveDate,
    pub end_date: NaiveDate,
}

/// One-off or weekly treatment order. `schedule_type` is `single` or `recurring`.
#[derive(Debug, Clone, Default, Deserialize)]
pub struct TreatmentOrderRequest {
    pub patient_id: Option<Uuid>,
    pub description: Option<String>,
    pub schedule_type: Option<String>,
    pub scheduled_time: Option<NaiveDateTime>,
    pub date: Option<NaiveDate>,
    pub time: Option<String>,
    #[serde(default)]
    pub days_of_week: Vec<DayOfWeek>,
    pub notes: Option<String>,
    pub assigned_to_id: Option<Uuid>,
}

// ==============================================================================
// LIFECYCLE REQUESTS
// ==============================================================================

#[derive(Debug, Clone, Default, Deserialize)]
pub struct NotCompletedRequest {
    pub reason: Option<String>,
}

#[derive(Debug, Clone, Default, Deserialize)]
pub struct PostponeRequest {
    pub new_time: Option<String>,
}

#[derive(Debug, Clone, Default, Deserialize)]
pub struct MedicationGivenRequest {
    pub notes: Option<String>,
}

#[derive(Debug, Clone, Default, Deserialize)]
pub struct SuspendMedicationRequest {
    pub reason: Option<String>,
    /// Last day (inclusive) of the suspension. Absent means indefinitely.
    pub suspend_until: Option<NaiveDate>,
}

#[derive(Debug, Clone, Default, Deserialize)]
pub struct DeleteMedicationRequest {
    pub reason: Option<String>,
}

// ==============================================================================
// SCHEDULE CRUD
// ==============================================================================

#[derive(Debug, Clone, Default, Deserialize)]
pub struct ScheduleListQuery {
    pub patient_id: Option<Uuid>,
    pub status: Option<ScheduleStatus>,
    #[serde(rename = "type")]
    pub schedule_type: Option<ScheduleType>,
    pub from: Option<NaiveDateTime>,
    pub to: Option<NaiveDateTime>,
}

#[derive(Debug, Clone, Default, Deserialize)]
pub struct CreateScheduleRequest {
    pub patient_id: Option<Uuid>,
    pub assigned_to_id: Option<Uuid>,
    #[serde(rename = "type")]
    pub schedule_type: Option<ScheduleType>,
    pub scheduled_time: Option<NaiveDateTime>,
    pub description: Option<String>,
    pub notes: Option<String>,
    pub medication: Option<String>,
    pub dosage: Option<String>,
}

/// Partial update. `assigned_to_id: null` clears the assignee; an absent field
/// leaves it untouched.
#[derive(Debug, Clone, Default, Deserialize)]
pub struct UpdateScheduleRequest {
    #[serde(default, deserialize_with = "present")]
    pub assigned_to_id: Option<Option<Uuid>>,
    #[serde(rename = "type")]
    pub schedule_type: Option<ScheduleType>,
    pub scheduled_time: Option<NaiveDateTime>,
    pub description: Option<String>,
    pub notes: Option<String>,
    pub medication: Option<String>,
    pub dosage: Option<String>,
    pub status: Option<ScheduleStatus>,
}

fn present<'de, D, T>(deserializer: D) -> Result<Option<Option<T>>, D::Error>
where
    D: Deserializer<'de>,
    T: Deserialize<'de>,
{
    Option::<T>::deserialize(deserializer).map(Some)
}

// ==============================================================================
// VIEWS
// ==============================================================================

/// Remaining pending doses of one (medication, dosage) pair.
#[derive(Debug, Clone, Serialize, PartialEq)]
pub struct ActiveMedication {
    pub medication: String,
    pub dosage: String,
    pub next_dose: NaiveDateTime,
    pub last_dose: NaiveDateTime,
    pub remaining_doses: usize,
}
