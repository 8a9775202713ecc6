use std::sync::Arc;

use axum::{routing::get, Router};

use schedule_cell::models::{GenerationRules, ScheduleState};
use schedule_cell::router::{medication_routes, schedule_routes};
use shared_config::AppConfig;
use shared_database::{HistoryStore, ScheduleStore, WardDirectory};
use shared_utils::clock::Clock;
use ward_cell::models::WardState;
use ward_cell::router::nurse_routes;

/// Storage and time shared by every cell.
pub struct Stores {
    pub schedules: Arc<dyn ScheduleStore>,
    pub history: Arc<dyn HistoryStore>,
    pub wards: Arc<dyn WardDirectory>,
    pub clock: Arc<dyn Clock>,
}

pub fn create_router(config: Arc<AppConfig>, stores: Stores) -> Router {
    let rules = GenerationRules::default();

    let schedule_state = ScheduleState {
        config: config.clone(),
        schedules: stores.schedules.clone(),
        wards: stores.wards.clone(),
        clock: stores.clock.clone(),
        rules,
    };
    let ward_state = WardState {
        config,
        schedules: stores.schedules,
        history: stores.history,
        wards: stores.wards,
        clock: stores.clock,
        rules,
    };

    Router::new()
        .route("/", get(|| async { "Ward operations API is running!" }))
        .nest("/schedules", schedule_routes(schedule_state.clone()))
        .nest("/medications", medication_routes(schedule_state))
        .nest("/nurses", nurse_routes(ward_state))
}

#[cfg(test)]
mod tests {
    use super::*;
    use axum::{
        body::{to_bytes, Body},
        http::{Request, StatusCode},
    };
    use shared_database::InMemoryStore;
    use shared_utils::clock::SystemClock;
    use shared_utils::test_utils::{JwtTestUtils, TestConfig, TestUser};
    use tower::ServiceExt;

    fn app(config: &TestConfig) -> Router {
        let clock: Arc<dyn Clock> = Arc::new(SystemClock::new(0));
        let store = Arc::new(InMemoryStore::new(clock.clone()));
        create_router(
            config.to_arc(),
            Stores {
                schedules: store.clone(),
                history: store.clone(),
                wards: store,
                clock,
            },
        )
    }

    #[tokio::test]
    async fn liveness_needs_no_token() {
        let response = app(&TestConfig::default())
            .oneshot(Request::builder().uri("/").body(Body::empty()).unwrap())
            .await
            .unwrap();

        assert_eq!(response.status(), StatusCode::OK);
        let body = to_bytes(response.into_body(), usize::MAX).await.unwrap();
        assert_eq!(&body[..], b"Ward operations API is running!");
    }

    #[tokio::test]
    async fn cells_are_nested_behind_auth() {
        let config = TestConfig::default();
        let router = app(&config);

        for uri in ["/schedules", "/nurses/stats"] {
            let response = router
                .clone()
                .oneshot(Request::builder().uri(uri).body(Body::empty()).unwrap())
                .await
                .unwrap();
            assert_eq!(response.status(), StatusCode::UNAUTHORIZED, "{}", uri);
        }

        let token = JwtTestUtils::create_test_token(
            &TestUser::supervisor("lead@ward.example"),
            &config.jwt_secret,
            Some(1),
        );
        let response = router
            .oneshot(
                Request::builder()
                    .uri("/nurses/stats")
                    .header("Authorization", format!("Bearer {}", token))
                    .body(Body::empty())
                    .unwrap(),
            )
            .await
            .unwrap();
        assert_eq!(response.status(), StatusCode::OK);
        let body = to_bytes(response.into_body(), usize::MAX).await.unwrap();
        let stats: serde_json::Value = serde_json::from_slice(&body).unwrap();
        assert_eq!(stats["assigned_area"], "Unassigned");
    }
}
