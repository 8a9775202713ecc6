use std::sync::Arc;

use serde::{Deserialize, Serialize};
use uuid::Uuid;

use schedule_cell::models::GenerationRules;
use schedule_cell::services::ScheduleGenerator;
use shared_config::AppConfig;
use shared_database::{HistoryStore, ScheduleStore, WardDirectory};
use shared_models::clinical::{AdministrationStatus, ScheduleStatus, ScheduleType};
use shared_utils::clock::Clock;

use crate::services::{AdministrationRecorder, WardReports};

#[derive(Clone)]
pub struct WardState {
    pub config: Arc<AppConfig>,
    pub schedules: Arc<dyn ScheduleStore>,
    pub history: Arc<dyn HistoryStore>,
    pub wards: Arc<dyn WardDirectory>,
    pub clock: Arc<dyn Clock>,
    pub rules: GenerationRules,
}

impl WardState {
    pub fn recorder(&self) -> AdministrationRecorder {
        AdministrationRecorder::new(
            self.schedules.clone(),
            self.history.clone(),
            self.wards.clone(),
            self.clock.clone(),
            self.rules,
        )
    }

    pub fn reports(&self) -> WardReports {
        WardReports::new(self.schedules.clone(), self.wards.clone(), self.clock.clone())
    }

    pub fn generator(&self) -> ScheduleGenerator {
        ScheduleGenerator::new(
            self.schedules.clone(),
            self.wards.clone(),
            self.clock.clone(),
            self.rules,
        )
    }
}

// ==============================================================================
// ADMINISTRATION
// ==============================================================================

#[derive(Debug, Clone, Default, Deserialize)]
pub struct AdministrationRequest {
    pub schedule_id: Option<Uuid>,
    pub status: Option<AdministrationStatus>,
    pub reason_not_administered: Option<String>,
    pub notes: Option<String>,
}

// ==============================================================================
// WARD VIEWS
// ==============================================================================

#[derive(Debug, Clone, Serialize, PartialEq)]
pub struct NurseStats {
    pub assigned_area: String,
    pub assigned_patients_count: usize,
    pub pending_tasks_count: u64,
    pub medications_today: u64,
}

/// One row of the today's-tasks board.
#[derive(Debug, Clone, Serialize, PartialEq)]
pub struct TaskItem {
    pub id: Uuid,
    /// `HH:MM`
    pub time: String,
    /// `HH:00`
    pub hour: String,
    #[serde(rename = "type")]
    pub schedule_type: ScheduleType,
    pub description: String,
    pub patient_name: String,
    pub bed_number: String,
    pub medication: Option<String>,
    pub dosage: Option<String>,
    pub completed: bool,
    pub not_completed: bool,
    pub not_completed_reason: String,
    pub status: ScheduleStatus,
}

#[derive(Debug, Clone, Serialize, PartialEq)]
pub struct HourBucket {
    pub hour: String,
    pub tasks: Vec<TaskItem>,
}

#[derive(Debug, Clone, Serialize, PartialEq)]
pub struct DemandPatient {
    pub patient_id: Uuid,
    pub patient_name: String,
    pub bed_number: String,
    pub area_name: String,
}

/// Today's doses of one (medication, dosage) pair across a ward.
#[derive(Debug, Clone, Serialize, PartialEq)]
pub struct PharmacyDemand {
    pub name: String,
    pub dosage: String,
    pub total_doses: usize,
    pub patients_count: usize,
    pub patients: Vec<DemandPatient>,
    pub requested: bool,
}

#[derive(Debug, Clone, Serialize, PartialEq)]
pub struct DayScheduleItem {
    pub schedule_id: Uuid,
    /// `HH:MM`
    pub time: String,
    #[serde(rename = "type")]
    pub schedule_type: ScheduleType,
    pub description: String,
    pub medication: Option<String>,
    pub dosage: Option<String>,
    pub completed: bool,
    pub status: ScheduleStatus,
}

#[derive(Debug, Clone, Serialize, PartialEq)]
pub struct DayMedication {
    pub schedule_id: Uuid,
    pub name: String,
    pub dosage: String,
    /// `HH:MM`
    pub time: String,
}

/// A ward patient with everything scheduled for them today.
#[derive(Debug, Clone, Serialize, PartialEq)]
pub struct PatientDay {
    pub patient_id: Uuid,
    pub patient_name: String,
    pub bed_number: String,
    pub area_name: String,
    pub pending_tasks: usize,
    pub medications: Vec<DayMedication>,
    pub today_schedule: Vec<DayScheduleItem>,
}
