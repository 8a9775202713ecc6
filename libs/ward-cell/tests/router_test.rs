use std::sync::Arc;

use axum::{
    body::{to_bytes, Body},
    http::{Method, Request, StatusCode},
    Router,
};
use chrono::NaiveDate;
use serde_json::{json, Value};
use tower::ServiceExt;
use uuid::Uuid;

use schedule_cell::models::GenerationRules;
use shared_database::{InMemoryStore, ScheduleFilter, ScheduleStore};
use shared_models::clinical::PatientPlacement;
use shared_utils::clock::FixedClock;
use shared_utils::test_utils::{JwtTestUtils, TestConfig, TestUser};
use ward_cell::models::WardState;
use ward_cell::router::nurse_routes;

struct TestApp {
    router: Router,
    store: Arc<InMemoryStore>,
    config: TestConfig,
    area_id: Uuid,
    patient_id: Uuid,
}

/// Monday 2024-01-01 06:00 with one patient in bed 101 of Cardiology.
async fn app() -> TestApp {
    let config = TestConfig::default();
    let local = NaiveDate::from_ymd_opt(2024, 1, 1)
        .unwrap()
        .and_hms_opt(6, 0, 0)
        .unwrap();
    let clock = Arc::new(FixedClock::at_local(local));
    let store = Arc::new(InMemoryStore::new(clock.clone()));
    let area_id = Uuid::new_v4();
    let patient_id = Uuid::new_v4();
    store
        .admit_patient(PatientPlacement {
            patient_id,
            patient_name: "Ana Lopez".to_string(),
            bed_number: "101".to_string(),
            area_id,
            area_name: "Cardiology".to_string(),
        })
        .await;

    let state = WardState {
        config: config.to_arc(),
        schedules: store.clone(),
        history: store.clone(),
        wards: store.clone(),
        clock,
        rules: GenerationRules::default(),
    };

    TestApp {
        router: nurse_routes(state),
        store,
        config,
        area_id,
        patient_id,
    }
}

impl TestApp {
    fn nurse_token(&self) -> String {
        let nurse = TestUser::nurse("nurse@ward.example", self.area_id);
        JwtTestUtils::create_test_token(&nurse, &self.config.jwt_secret, Some(1))
    }

    async fn send(&self, method: Method, uri: &str, token: Option<&str>, body: Option<Value>) -> (StatusCode, Value) {
        let mut builder = Request::builder().method(method).uri(uri);
        if let Some(token) = token {
            builder = builder.header("Authorization", format!("Bearer {}", token));
        }
        let request = match body {
            Some(body) => builder
                .header("Content-Type", "application/json")
                .body(Body::from(body.to_string()))
                .unwrap(),
            None => builder.body(Body::empty()).unwrap(),
        };

        let response = self.router.clone().oneshot(request).await.unwrap();
        let status = response.status();
        let bytes = to_bytes(response.into_body(), usize::MAX).await.unwrap();
        let body = if bytes.is_empty() {
            Value::Null
        } else {
            serde_json::from_slice(&bytes).unwrap()
        };
        (status, body)
    }
}

#[tokio::test]
async fn ward_routes_require_a_token() {
    let app = app().await;
    let (status, _) = app.send(Method::GET, "/stats", None, None).await;
    assert_eq!(status, StatusCode::UNAUTHORIZED);

    let (status, _) = app
        .send(Method::GET, "/tasks/today", Some(&JwtTestUtils::create_malformed_token()), None)
        .await;
    assert_eq!(status, StatusCode::UNAUTHORIZED);
}

#[tokio::test]
async fn treatment_then_administration_then_history() {
    let app = app().await;
    let token = app.nurse_token();

    let (status, body) = app
        .send(
            Method::POST,
            "/treatments",
            Some(&token),
            Some(json!({
                "patient_id": app.patient_id,
                "description": "Wound dressing",
                "schedule_type": "single",
                "date": "2024-01-01",
                "time": "09:00"
            })),
        )
        .await;
    assert_eq!(status, StatusCode::CREATED);
    assert_eq!(body["schedules_created"], 1);
    let schedule_id = body["schedules"][0]["id"].as_str().unwrap().to_string();

    let (status, body) = app.send(Method::GET, "/tasks/today", Some(&token), None).await;
    assert_eq!(status, StatusCode::OK);
    assert_eq!(body[0]["hour"], "09:00");
    assert_eq!(body[0]["tasks"][0]["patient_name"], "Ana Lopez");
    assert_eq!(body[0]["tasks"][0]["type"], "treatment");

    let (status, _) = app
        .send(
            Method::POST,
            "/administration",
            Some(&token),
            Some(json!({ "schedule_id": schedule_id, "status": "not_administered" })),
        )
        .await;
    assert_eq!(status, StatusCode::BAD_REQUEST);

    let (status, body) = app
        .send(
            Method::POST,
            "/administration",
            Some(&token),
            Some(json!({ "schedule_id": schedule_id, "status": "administered", "notes": "No issues" })),
        )
        .await;
    assert_eq!(status, StatusCode::OK);
    assert_eq!(body["history"]["type"], "treatment");
    assert_eq!(body["history"]["status"], "administered");
    assert!(body["history"]["administered_at"].is_string());

    let (status, body) = app
        .send(
            Method::GET,
            &format!("/patients/{}/history", app.patient_id),
            Some(&token),
            None,
        )
        .await;
    assert_eq!(status, StatusCode::OK);
    assert_eq!(body.as_array().unwrap().len(), 1);
    assert_eq!(body[0]["notes"], "No issues");

    let completed = app
        .store
        .find_schedules(&ScheduleFilter::new().patient(app.patient_id))
        .await
        .unwrap();
    assert_eq!(completed[0].status.to_string(), "completed");
}

#[tokio::test]
async fn other_ward_nurse_is_forbidden() {
    let app = app().await;
    let stranger = TestUser::nurse("stranger@ward.example", Uuid::new_v4());
    let token = JwtTestUtils::create_test_token(&stranger, &app.config.jwt_secret, Some(1));

    let (status, _) = app
        .send(
            Method::GET,
            &format!("/patients/{}/history", app.patient_id),
            Some(&token),
            None,
        )
        .await;
    assert_eq!(status, StatusCode::FORBIDDEN);

    let (status, _) = app
        .send(
            Method::POST,
            "/treatments",
            Some(&token),
            Some(json!({
                "patient_id": app.patient_id,
                "description": "Physiotherapy",
                "schedule_type": "recurring",
                "time": "10:00",
                "days_of_week": ["monday", 3]
            })),
        )
        .await;
    assert_eq!(status, StatusCode::FORBIDDEN);
    assert_eq!(app.store.schedule_count().await, 0);

    let (status, body) = app.send(Method::GET, "/stats", Some(&token), None).await;
    assert_eq!(status, StatusCode::OK);
    assert_eq!(body["assigned_patients_count"], 0);
}

#[tokio::test]
async fn unknown_schedule_administration_is_not_found() {
    let app = app().await;
    let (status, _) = app
        .send(
            Method::POST,
            "/administration",
            Some(&app.nurse_token()),
            Some(json!({ "schedule_id": Uuid::new_v4(), "status": "administered" })),
        )
        .await;
    assert_eq!(status, StatusCode::NOT_FOUND);
}

#[tokio::test]
async fn pharmacy_view_lists_ward_demand() {
    let app = app().await;
    let pharmacy = TestUser::pharmacy("pharmacy@ward.example", app.area_id);
    let token = JwtTestUtils::create_test_token(&pharmacy, &app.config.jwt_secret, Some(1));

    let (status, body) = app.send(Method::GET, "/medications/pharmacy", Some(&token), None).await;
    assert_eq!(status, StatusCode::OK);
    assert_eq!(body, json!([]));

    let (status, body) = app.send(Method::GET, "/stats", Some(&token), None).await;
    assert_eq!(status, StatusCode::OK);
    assert_eq!(body["assigned_area"], "Cardiology");
    assert_eq!(body["assigned_patients_count"], 1);
}

#[tokio::test]
async fn patient_views_show_today_schedule() {
    let app = app().await;
    let token = app.nurse_token();

    app.send(
        Method::POST,
        "/treatments",
        Some(&token),
        Some(json!({
            "patient_id": app.patient_id,
            "description": "Wound dressing",
            "schedule_type": "single",
            "date": "2024-01-01",
            "time": "09:00"
        })),
    )
    .await;

    let (status, body) = app.send(Method::GET, "/patients", Some(&token), None).await;
    assert_eq!(status, StatusCode::OK);
    assert_eq!(body[0]["patient_name"], "Ana Lopez");
    assert_eq!(body[0]["pending_tasks"], 1);
    assert_eq!(body[0]["today_schedule"][0]["time"], "09:00");
    assert_eq!(body[0]["today_schedule"][0]["type"], "treatment");
    assert_eq!(body[0]["medications"], json!([]));

    let uri = format!("/patients/{}/today", app.patient_id);
    let (status, body) = app.send(Method::GET, &uri, Some(&token), None).await;
    assert_eq!(status, StatusCode::OK);
    assert_eq!(body["bed_number"], "101");
    assert_eq!(body["today_schedule"].as_array().unwrap().len(), 1);

    let stranger = TestUser::nurse("stranger@ward.example", Uuid::new_v4());
    let stranger_token = JwtTestUtils::create_test_token(&stranger, &app.config.jwt_secret, Some(1));
    let (status, _) = app.send(Method::GET, &uri, Some(&stranger_token), None).await;
    assert_eq!(status, StatusCode::FORBIDDEN);
}
