use std::sync::Arc;

use chrono::{NaiveDate, NaiveDateTime};
use assert_matches::assert_matches;
use uuid::Uuid;

use shared_database::{InMemoryStore, ScheduleStore};
use shared_models::auth::{Actor, StaffRole};
use shared_models::clinical::{NewSchedule, PatientPlacement, ScheduleStatus, ScheduleType};
use schedule_cell::models::ScheduleError;
use shared_utils::clock::FixedClock;
use ward_cell::services::WardReports;

fn at(d: u32, h: u32, min: u32) -> NaiveDateTime {
    NaiveDate::from_ymd_opt(2024, 1, d)
        .unwrap()
        .and_hms_opt(h, min, 0)
        .unwrap()
}

struct Ward {
    store: Arc<InMemoryStore>,
    reports: WardReports,
    nurse: Actor,
    ana: Uuid,
    luis: Uuid,
    outsider: Uuid,
}

fn placement(patient_id: Uuid, name: &str, bed: &str, area_id: Uuid, area: &str) -> PatientPlacement {
    PatientPlacement {
        patient_id,
        patient_name: name.to_string(),
        bed_number: bed.to_string(),
        area_id,
        area_name: area.to_string(),
    }
}

fn task(
    patient_id: Uuid,
    schedule_type: ScheduleType,
    status: ScheduleStatus,
    scheduled_time: NaiveDateTime,
    medication: &str,
) -> NewSchedule {
    NewSchedule {
        patient_id,
        assigned_to_id: None,
        schedule_type,
        status,
        scheduled_time,
        description: if medication.is_empty() {
            "Vital signs".to_string()
        } else {
            format!("Administer {}", medication)
        },
        medication: medication.to_string(),
        dosage: if medication.is_empty() { String::new() } else { "500mg".to_string() },
        notes: if status == ScheduleStatus::Missed {
            "Patient asleep, retry later".to_string()
        } else {
            String::new()
        },
        events: vec![],
    }
}

/// Clock at 2024-01-02 10:00. Ana and Luis lie in Cardiology, a third patient elsewhere.
async fn ward() -> Ward {
    let clock = Arc::new(FixedClock::at_local(at(2, 10, 0)));
    let store = Arc::new(InMemoryStore::new(clock.clone()));
    let cardiology = Uuid::new_v4();
    let (ana, luis, outsider) = (Uuid::new_v4(), Uuid::new_v4(), Uuid::new_v4());

    store.admit_patient(placement(ana, "Ana Lopez", "101", cardiology, "Cardiology")).await;
    store.admit_patient(placement(luis, "Luis Perez", "102", cardiology, "Cardiology")).await;
    store
        .admit_patient(placement(outsider, "Eva Ruiz", "201", Uuid::new_v4(), "Oncology"))
        .await;

    use ScheduleStatus::*;
    use ScheduleType::*;
    store
        .insert_schedules(vec![
            task(ana, Medication, Completed, at(2, 8, 0), "Paracetamol"),
            task(ana, Medication, Pending, at(2, 20, 0), "Paracetamol"),
            task(luis, Medication, Pending, at(2, 8, 30), "Paracetamol"),
            task(luis, Medication, Pending, at(2, 14, 0), "Ibuprofen"),
            task(luis, Check, Missed, at(2, 8, 15), ""),
            task(ana, Medication, Pending, at(3, 8, 0), "Paracetamol"),
            task(ana, Medication, Pending, at(1, 20, 0), "Paracetamol"),
            task(outsider, Medication, Pending, at(2, 9, 0), "Paracetamol"),
        ])
        .await
        .unwrap();

    let reports = WardReports::new(store.clone(), store.clone(), clock);
    Ward {
        store,
        reports,
        nurse: Actor::new(Uuid::new_v4(), StaffRole::Nurse, Some(cardiology)),
        ana,
        luis,
        outsider,
    }
}

#[tokio::test]
async fn stats_count_today_in_the_nurse_ward() {
    let ward = ward().await;
    let stats = ward.reports.nurse_stats(&ward.nurse).await.unwrap();

    assert_eq!(stats.assigned_area, "Cardiology");
    assert_eq!(stats.assigned_patients_count, 2);
    assert_eq!(stats.pending_tasks_count, 3);
    assert_eq!(stats.medications_today, 4);
}

#[tokio::test]
async fn staff_without_a_ward_get_empty_views() {
    let ward = ward().await;
    let floating = Actor::new(Uuid::new_v4(), StaffRole::Nurse, None);

    let stats = ward.reports.nurse_stats(&floating).await.unwrap();
    assert_eq!(stats.assigned_area, "Unassigned");
    assert_eq!(stats.assigned_patients_count, 0);
    assert_eq!(stats.pending_tasks_count, 0);

    assert!(ward.reports.today_tasks(&floating).await.unwrap().is_empty());
    assert!(ward.reports.pharmacy_demand(&floating).await.unwrap().is_empty());
    assert_eq!(ward.store.schedule_count().await, 8);
}

#[tokio::test]
async fn today_tasks_are_bucketed_by_hour() {
    let ward = ward().await;
    let buckets = ward.reports.today_tasks(&ward.nurse).await.unwrap();

    let hours: Vec<&str> = buckets.iter().map(|b| b.hour.as_str()).collect();
    assert_eq!(hours, vec!["08:00", "14:00", "20:00"]);

    let morning = &buckets[0].tasks;
    let times: Vec<&str> = morning.iter().map(|t| t.time.as_str()).collect();
    assert_eq!(times, vec!["08:00", "08:15", "08:30"]);

    assert!(morning[0].completed);
    assert_eq!(morning[0].patient_name, "Ana Lopez");
    assert_eq!(morning[0].bed_number, "101");
    assert_eq!(morning[0].medication.as_deref(), Some("Paracetamol"));

    let check = &morning[1];
    assert_eq!(check.schedule_type, ScheduleType::Check);
    assert!(check.not_completed);
    assert_eq!(check.not_completed_reason, "Patient asleep, retry later");
    assert_eq!(check.medication, None);
    assert_eq!(check.patient_name, "Luis Perez");

    assert!(buckets
        .iter()
        .flat_map(|b| &b.tasks)
        .all(|t| t.patient_name != "Eva Ruiz"));
    assert_eq!(buckets.iter().map(|b| b.tasks.len()).sum::<usize>(), 5);
}

#[tokio::test]
async fn pharmacy_demand_groups_doses_by_medication_and_dosage() {
    let ward = ward().await;
    let demand = ward.reports.pharmacy_demand(&ward.nurse).await.unwrap();

    assert_eq!(demand.len(), 2);

    let paracetamol = &demand[0];
    assert_eq!(paracetamol.name, "Paracetamol");
    assert_eq!(paracetamol.dosage, "500mg");
    assert_eq!(paracetamol.total_doses, 3);
    assert_eq!(paracetamol.patients_count, 2);
    assert!(!paracetamol.requested);
    let ids: Vec<Uuid> = paracetamol.patients.iter().map(|p| p.patient_id).collect();
    assert_eq!(ids, vec![ward.ana, ward.luis]);
    assert!(!ids.contains(&ward.outsider));
    assert_eq!(paracetamol.patients[0].area_name, "Cardiology");

    let ibuprofen = &demand[1];
    assert_eq!(ibuprofen.name, "Ibuprofen");
    assert_eq!(ibuprofen.total_doses, 1);
    assert_eq!(ibuprofen.patients_count, 1);
    assert_eq!(ibuprofen.patients[0].bed_number, "102");
}

#[tokio::test]
async fn my_patients_lists_each_bed_with_today_schedule() {
    let ward = ward().await;
    let patients = ward.reports.my_patients(&ward.nurse).await.unwrap();

    let ids: Vec<Uuid> = patients.iter().map(|p| p.patient_id).collect();
    assert_eq!(ids, vec![ward.ana, ward.luis]);

    let ana = &patients[0];
    assert_eq!(ana.bed_number, "101");
    assert_eq!(ana.pending_tasks, 1);
    let times: Vec<&str> = ana.medications.iter().map(|m| m.time.as_str()).collect();
    assert_eq!(times, vec!["08:00", "20:00"]);
    assert!(ana.today_schedule[0].completed);

    let luis = &patients[1];
    assert_eq!(luis.pending_tasks, 2);
    assert_eq!(luis.medications.len(), 2);
    let times: Vec<&str> = luis.today_schedule.iter().map(|s| s.time.as_str()).collect();
    assert_eq!(times, vec!["08:15", "08:30", "14:00"]);
    assert_eq!(luis.today_schedule[0].schedule_type, ScheduleType::Check);
    assert_eq!(luis.today_schedule[0].medication, None);
    assert_eq!(luis.medications[1].name, "Ibuprofen");
    assert_eq!(luis.medications[1].schedule_id, luis.today_schedule[2].schedule_id);
}

#[tokio::test]
async fn patient_today_is_ward_scoped() {
    let ward = ward().await;

    let luis = ward.reports.patient_today(&ward.nurse, ward.luis).await.unwrap();
    assert_eq!(luis.patient_name, "Luis Perez");
    assert_eq!(luis.today_schedule.len(), 3);

    assert_matches!(
        ward.reports.patient_today(&ward.nurse, ward.outsider).await,
        Err(ScheduleError::Forbidden(_))
    );

    let floating = Actor::new(Uuid::new_v4(), StaffRole::Nurse, None);
    assert!(ward.reports.my_patients(&floating).await.unwrap().is_empty());
    assert_matches!(
        ward.reports.patient_today(&floating, ward.ana).await,
        Err(ScheduleError::Forbidden(_))
    );

    let supervisor = Actor::new(Uuid::new_v4(), StaffRole::Supervisor, None);
    let eva = ward.reports.patient_today(&supervisor, ward.outsider).await.unwrap();
    assert_eq!(eva.area_name, "Oncology");
    assert_eq!(eva.pending_tasks, 1);

    assert_matches!(
        ward.reports.patient_today(&supervisor, Uuid::new_v4()).await,
        Err(ScheduleError::NotFound(_))
    );
}
