use std::sync::Arc;

use base64::{engine::general_purpose, Engine as _};
use chrono::{Duration, Utc};
use hmac::{Hmac, Mac};
use serde_json::json;
use sha2::Sha256;
use uuid::Uuid;

use shared_config::{AppConfig, StorageBackend};
use shared_models::auth::User;

pub struct TestConfig {
    pub jwt_secret: String,
    pub supabase_url: String,
    pub supabase_anon_key: String,
    pub service_role_key: String,
}

impl Default for TestConfig {
    fn default() -> Self {
        Self {
            jwt_secret: "test-secret-key-for-jwt-validation-must-be-long-enough".to_string(),
            supabase_url: "http://localhost:54321".to_string(),
            supabase_anon_key: "test-anon-key".to_string(),
            service_role_key: "test-service-role-key".to_string(),
        }
    }
}

impl TestConfig {
    pub fn with_supabase_url(url: &str) -> Self {
        Self {
            supabase_url: url.to_string(),
            ..Self::default()
        }
    }

    pub fn to_app_config(&self) -> AppConfig {
        AppConfig {
            supabase_url: self.supabase_url.clone(),
            supabase_anon_key: self.supabase_anon_key.clone(),
            supabase_jwt_secret: self.jwt_secret.clone(),
            supabase_service_role_key: self.service_role_key.clone(),
            storage_backend: StorageBackend::Memory,
            ward_utc_offset_minutes: 0,
            server_port: 3000,
        }
    }

    pub fn to_arc(&self) -> Arc<AppConfig> {
        Arc::new(self.to_app_config())
    }
}

pub struct TestUser {
    pub id: String,
    pub email: String,
    pub role: String,
    pub assigned_area_id: Option<Uuid>,
}

impl Default for TestUser {
    fn default() -> Self {
        Self {
            id: Uuid::new_v4().to_string(),
            email: "nurse@example.com".to_string(),
            role: "nurse".to_string(),
            assigned_area_id: None,
        }
    }
}

impl TestUser {
    pub fn new(email: &str, role: &str) -> Self {
        Self {
            id: Uuid::new_v4().to_string(),
            email: email.to_string(),
            role: role.to_string(),
            assigned_area_id: None,
        }
    }

    pub fn nurse(email: &str, area_id: Uuid) -> Self {
        Self {
            assigned_area_id: Some(area_id),
            ..Self::new(email, "nurse")
        }
    }

    pub fn supervisor(email: &str) -> Self {
        Self::new(email, "supervisor")
    }

    pub fn admin(email: &str) -> Self {
        Self::new(email, "admin")
    }

    pub fn pharmacy(email: &str, area_id: Uuid) -> Self {
        Self {
            assigned_area_id: Some(area_id),
            ..Self::new(email, "pharmacy")
        }
    }

    fn metadata(&self) -> Option<serde_json::Value> {
        self.assigned_area_id
            .map(|area| json!({ "assigned_area_id": area.to_string() }))
    }

    pub fn to_user(&self) -> User {
        User {
            id: self.id.clone(),
            email: Some(self.email.clone()),
            role: Some(self.role.clone()),
            metadata: self.metadata(),
            created_at: Some(Utc::now()),
        }
    }
}

pub struct JwtTestUtils;

impl JwtTestUtils {
    pub fn create_test_token(user: &TestUser, secret: &str, exp_hours: Option<i64>) -> String {
        let now = Utc::now();
        let exp = now + Duration::hours(exp_hours.unwrap_or(24));

        let mut payload = json!({
            "sub": user.id,
            "email": user.email,
            "role": user.role,
            "iat": now.timestamp(),
            "exp": exp.timestamp()
        });
        if let Some(metadata) = user.metadata() {
            payload["app_metadata"] = metadata;
        }

        Self::create_token_with_claims(&payload, secret)
    }

    /// Signs an arbitrary claims payload with HS256.
    pub fn create_token_with_claims(payload: &serde_json::Value, secret: &str) -> String {
        let header = json!({
            "alg": "HS256",
            "typ": "JWT"
        });

        let header_encoded = general_purpose::URL_SAFE_NO_PAD.encode(header.to_string());
        let payload_encoded = general_purpose::URL_SAFE_NO_PAD.encode(payload.to_string());

        let signing_input = format!("{}.{}", header_encoded, payload_encoded);

        let mut mac = Hmac::<Sha256>::new_from_slice(secret.as_bytes())
            .expect("HMAC can take key of any size");
        mac.update(signing_input.as_bytes());
        let signature = mac.finalize().into_bytes();
        let signature_encoded = general_purpose::URL_SAFE_NO_PAD.encode(signature);

        format!("{}.{}", signing_input, signature_encoded)
    }

    pub fn create_expired_token(user: &TestUser, secret: &str) -> String {
        Self::create_test_token(user, secret, Some(-1))
    }

    pub fn create_invalid_signature_token(user: &TestUser) -> String {
        Self::create_test_token(user, "wrong-secret", Some(24))
    }

    pub fn create_malformed_token() -> String {
        "invalid.token.format".to_string()
    }
}

/// PostgREST row payloads for wiremock-backed store tests.
pub struct MockSupabaseResponses;

impl MockSupabaseResponses {
    pub fn schedule_row(id: Uuid, patient_id: Uuid, medication: &str, scheduled_time: &str) -> serde_json::Value {
        json!({
            "id": id,
            "patient_id": patient_id,
            "assigned_to_id": null,
            "type": "medication",
            "status": "pending",
            "scheduled_time": scheduled_time,
            "description": format!("Administer {}", medication),
            "medication": medication,
            "dosage": "500mg",
            "notes": "",
            "events": [],
            "created_at": "2024-01-01T00:00:00Z",
            "updated_at": "2024-01-01T00:00:00Z"
        })
    }

    pub fn bed_row(patient_id: Uuid, area_id: Uuid, bed_number: &str, area_name: &str) -> serde_json::Value {
        json!({
            "bed_number": bed_number,
            "area_id": area_id,
            "patient_id": patient_id,
            "patients": { "first_name": "Ana", "last_name": "Lopez" },
            "areas": { "name": area_name }
        })
    }

    pub fn error_response(message: &str, code: &str) -> serde_json::Value {
        json!({
            "message": message,
            "code": code
        })
    }
}
