use std::fmt;

use chrono::{DateTime, NaiveDateTime, Utc, Weekday};
use serde::{Deserialize, Serialize};
use uuid::Uuid;

// ==============================================================================
// SCHEDULE ENUMS
// ==============================================================================

/// Kind of clinical task. Shared by schedule rows and administration history.
#[derive(Debug, Clone, Copy, Serialize, Deserialize, PartialEq, Eq, Hash, Default)]
#[serde(rename_all = "snake_case")]
pub enum ScheduleType {
    Medication,
    Check,
    Treatment,
    #[default]
    Other,
}

impl ScheduleType {
    /// History rows only distinguish medications from everything else.
    pub fn history_bucket(&self) -> ScheduleType {
        match self {
            ScheduleType::Medication => ScheduleType::Medication,
            _ => ScheduleType::Treatment,
        }
    }
}

impl fmt::Display for ScheduleType {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            ScheduleType::Medication => write!(f, "medication"),
            ScheduleType::Check => write!(f, "check"),
            ScheduleType::Treatment => write!(f, "treatment"),
            ScheduleType::Other => write!(f, "other"),
        }
    }
}

#[derive(Debug, Clone, Copy, Serialize, Deserialize, PartialEq, Eq, Hash, Default)]
#[serde(rename_all = "snake_case")]
pub enum ScheduleStatus {
    #[default]
    Pending,
    Completed,
    Missed,
    Cancelled,
}

impl fmt::Display for ScheduleStatus {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            ScheduleStatus::Pending => write!(f, "pending"),
            ScheduleStatus::Completed => write!(f, "completed"),
            ScheduleStatus::Missed => write!(f, "missed"),
            ScheduleStatus::Cancelled => write!(f, "cancelled"),
        }
    }
}

// ==============================================================================
// WEEKDAYS
// ==============================================================================

/// Day of week numbered Sunday = 0 ... Saturday = 6.
///
/// Deserializes from a case-insensitive English day name ("Monday") or from the
/// numeric index, so medication day filters and treatment day lists share one
/// representation.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(try_from = "RawDayOfWeek", into = "String")]
pub struct DayOfWeek(Weekday);

#[derive(Deserialize)]
#[serde(untagged)]
enum RawDayOfWeek {
    Index(u8),
    Name(String),
}

impl DayOfWeek {
    pub fn from_sunday_index(index: u8) -> Option<Self> {
        let weekday = match index {
            0 => Weekday::Sun,
            1 => Weekday::Mon,
            2 => Weekday::Tue,
            3 => Weekday::Wed,
            4 => Weekday::Thu,
            5 => Weekday::Fri,
            6 => Weekday::Sat,
            _ => return None,
        };
        Some(Self(weekday))
    }

    pub fn from_name(name: &str) -> Option<Self> {
        let weekday = match name.trim().to_ascii_lowercase().as_str() {
            "sunday" => Weekday::Sun,
            "monday" => Weekday::Mon,
            "tuesday" => Weekday::Tue,
            "wednesday" => Weekday::Wed,
            "thursday" => Weekday::Thu,
            "friday" => Weekday::Fri,
            "saturday" => Weekday::Sat,
            _ => return None,
        };
        Some(Self(weekday))
    }

    pub fn sunday_index(&self) -> u8 {
        self.0.num_days_from_sunday() as u8
    }

    pub fn weekday(&self) -> Weekday {
        self.0
    }

    pub fn name(&self) -> &'static str {
        match self.0 {
            Weekday::Sun => "sunday",
            Weekday::Mon => "monday",
            Weekday::Tue => "tuesday",
            Weekday::Wed => "wednesday",
            Weekday::Thu => "thursday",
            Weekday::Fri => "friday",
            Weekday::Sat => "saturday",
        }
    }
}

impl From<Weekday> for DayOfWeek {
    fn from(weekday: Weekday) -> Self {
        Self(weekday)
    }
}

impl TryFrom<RawDayOfWeek> for DayOfWeek {
    type Error = String;

    fn try_from(raw: RawDayOfWeek) -> Result<Self, Self::Error> {
        match raw {
            RawDayOfWeek::Index(i) => Self::from_sunday_index(i)
                .ok_or_else(|| format!("Day index {} is outside 0 (Sunday) to 6 (Saturday)", i)),
            RawDayOfWeek::Name(name) => Self::from_name(&name)
                .ok_or_else(|| format!("Unknown day of week: {}", name)),
        }
    }
}

impl From<DayOfWeek> for String {
    fn from(day: DayOfWeek) -> Self {
        day.name().to_string()
    }
}

// ==============================================================================
// SCHEDULE INSTANCES
// ==============================================================================

#[derive(Debug, Clone, Copy, Serialize, Deserialize, PartialEq, Eq)]
#[serde(rename_all = "snake_case")]
pub enum ScheduleEventKind {
    Generated,
    Completed,
    NotCompleted,
    Postponed,
    Suspended,
    Reactivated,
    Deleted,
    AdministrationRecorded,
}

/// One entry of the audit trail attached to a schedule row.
#[derive(Debug, Clone, Serialize, Deserialize, PartialEq)]
pub struct ScheduleEvent {
    pub at: DateTime<Utc>,
    pub actor_id: Option<Uuid>,
    pub kind: ScheduleEventKind,
    pub detail: String,
}

/// A single concrete, time-stamped clinical task.
#[derive(Debug, Clone, Serialize, Deserialize, PartialEq)]
pub struct ScheduleInstance {
    pub id: Uuid,
    pub patient_id: Uuid,
    pub assigned_to_id: Option<Uuid>,
    #[serde(rename = "type")]
    pub schedule_type: ScheduleType,
    pub status: ScheduleStatus,
    /// Ward wall-clock time the task is due.
    pub scheduled_time: NaiveDateTime,
    pub description: String,
    #[serde(default)]
    pub medication: String,
    #[serde(default)]
    pub dosage: String,
    #[serde(default)]
    pub notes: String,
    #[serde(default)]
    pub events: Vec<ScheduleEvent>,
    pub created_at: DateTime<Utc>,
    pub updated_at: DateTime<Utc>,
}

impl ScheduleInstance {
    pub fn record_event(
        &mut self,
        at: DateTime<Utc>,
        actor_id: Option<Uuid>,
        kind: ScheduleEventKind,
        detail: impl Into<String>,
    ) {
        self.events.push(ScheduleEvent {
            at,
            actor_id,
            kind,
            detail: detail.into(),
        });
        self.updated_at = at;
    }
}

/// A schedule row that has not been persisted yet.
#[derive(Debug, Clone, Serialize, Deserialize, PartialEq)]
pub struct NewSchedule {
    pub patient_id: Uuid,
    pub assigned_to_id: Option<Uuid>,
    #[serde(rename = "type")]
    pub schedule_type: ScheduleType,
    pub status: ScheduleStatus,
    pub scheduled_time: NaiveDateTime,
    pub description: String,
    pub medication: String,
    pub dosage: String,
    pub notes: String,
    pub events: Vec<ScheduleEvent>,
}

impl NewSchedule {
    pub fn into_instance(self, id: Uuid, now: DateTime<Utc>) -> ScheduleInstance {
        ScheduleInstance {
            id,
            patient_id: self.patient_id,
            assigned_to_id: self.assigned_to_id,
            schedule_type: self.schedule_type,
            status: self.status,
            scheduled_time: self.scheduled_time,
            description: self.description,
            medication: self.medication,
            dosage: self.dosage,
            notes: self.notes,
            events: self.events,
            created_at: now,
            updated_at: now,
        }
    }
}

// ==============================================================================
// ADMINISTRATION HISTORY
// ==============================================================================

#[derive(Debug, Clone, Copy, Serialize, Deserialize, PartialEq, Eq)]
#[serde(rename_all = "snake_case")]
pub enum AdministrationStatus {
    Administered,
    NotAdministered,
    Missed,
}

impl AdministrationStatus {
    /// Status the schedule row moves to when this outcome is recorded.
    pub fn schedule_outcome(&self) -> ScheduleStatus {
        match self {
            AdministrationStatus::Administered => ScheduleStatus::Completed,
            AdministrationStatus::NotAdministered | AdministrationStatus::Missed => {
                ScheduleStatus::Missed
            }
        }
    }
}

impl fmt::Display for AdministrationStatus {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            AdministrationStatus::Administered => write!(f, "administered"),
            AdministrationStatus::NotAdministered => write!(f, "not_administered"),
            AdministrationStatus::Missed => write!(f, "missed"),
        }
    }
}

/// Immutable record of what a staff member did against a schedule row.
#[derive(Debug, Clone, Serialize, Deserialize, PartialEq)]
pub struct AdministrationRecord {
    pub id: Uuid,
    pub patient_id: Uuid,
    pub schedule_id: Option<Uuid>,
    pub administered_by_id: Uuid,
    pub status: AdministrationStatus,
    #[serde(rename = "type")]
    pub kind: ScheduleType,
    pub description: String,
    pub medication: Option<String>,
    pub dosage: Option<String>,
    pub scheduled_time: NaiveDateTime,
    pub administered_at: Option<DateTime<Utc>>,
    pub notes: Option<String>,
    pub reason_not_administered: Option<String>,
    pub created_at: DateTime<Utc>,
}

#[derive(Debug, Clone, Serialize, Deserialize, PartialEq)]
pub struct NewAdministrationRecord {
    pub patient_id: Uuid,
    pub schedule_id: Option<Uuid>,
    pub administered_by_id: Uuid,
    pub status: AdministrationStatus,
    #[serde(rename = "type")]
    pub kind: ScheduleType,
    pub description: String,
    pub medication: Option<String>,
    pub dosage: Option<String>,
    pub scheduled_time: NaiveDateTime,
    pub administered_at: Option<DateTime<Utc>>,
    pub notes: Option<String>,
    pub reason_not_administered: Option<String>,
}

impl NewAdministrationRecord {
    pub fn into_record(self, id: Uuid, created_at: DateTime<Utc>) -> AdministrationRecord {
        AdministrationRecord {
            id,
            patient_id: self.patient_id,
            schedule_id: self.schedule_id,
            administered_by_id: self.administered_by_id,
            status: self.status,
            kind: self.kind,
            description: self.description,
            medication: self.medication,
            dosage: self.dosage,
            scheduled_time: self.scheduled_time,
            administered_at: self.administered_at,
            notes: self.notes,
            reason_not_administered: self.reason_not_administered,
            created_at,
        }
    }
}

// ==============================================================================
// WARD PLACEMENT
// ==============================================================================

/// Where a patient currently lies: bed and the ward (area) the bed belongs to.
#[derive(Debug, Clone, Serialize, Deserialize, PartialEq)]
pub struct PatientPlacement {
    pub patient_id: Uuid,
    pub patient_name: String,
    pub bed_number: String,
    pub area_id: Uuid,
    pub area_name: String,
}
