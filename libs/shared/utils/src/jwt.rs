use base64::{engine::general_purpose::URL_SAFE_NO_PAD, Engine};
use chrono::{TimeZone, Utc};
use hmac::{Hmac, Mac};
use sha2::Sha256;
use tracing::debug;

use shared_models::auth::{JwtClaims, User};

type HmacSha256 = Hmac<Sha256>;

pub fn validate_token(token: &str, jwt_secret: &str) -> Result<User, String> {
    if jwt_secret.is_empty() {
        return Err("JWT secret is not set".to_string());
    }

    let parts: Vec<&str> = token.split('.').collect();
    if parts.len() != 3 {
        return Err("Invalid token format".to_string());
    }

    let header_b64 = parts[0];
    let claims_b64 = parts[1];
    let signature_b64 = parts[2];

    let signature = match URL_SAFE_NO_PAD.decode(signature_b64) {
        Ok(sig) => sig,
        Err(e) => {
            debug!("Failed to decode signature: {}", e);
            return Err("Invalid signature encoding".to_string());
        }
    };

    let signing_input = format!("{}.{}", header_b64, claims_b64);

    let mut mac = match HmacSha256::new_from_slice(jwt_secret.as_bytes()) {
        Ok(m) => m,
        Err(_) => return Err("Failed to create HMAC".to_string()),
    };

    mac.update(signing_input.as_bytes());

    if mac.verify_slice(&signature).is_err() {
        debug!("Token signature verification failed");
        return Err("Invalid token signature".to_string());
    }

    let claims_json = match URL_SAFE_NO_PAD.decode(claims_b64) {
        Ok(bytes) => match String::from_utf8(bytes) {
            Ok(json_str) => json_str,
            Err(_) => return Err("Invalid claims encoding".to_string()),
        },
        Err(_) => return Err("Invalid claims encoding".to_string()),
    };

    let claims: JwtClaims = match serde_json::from_str(&claims_json) {
        Ok(c) => c,
        Err(e) => {
            debug!("Failed to parse claims: {}", e);
            return Err("Invalid claims format".to_string());
        }
    };

    if let Some(exp) = claims.exp {
        let now = Utc::now().timestamp() as u64;
        if exp < now {
            debug!("Token expired at {} (now: {})", exp, now);
            return Err("Token expired".to_string());
        }
    }

    let created_at = claims
        .iat
        .and_then(|timestamp| Utc.timestamp_opt(timestamp as i64, 0).single());

    // Only app_metadata is server-controlled; user_metadata is writable by the user
    // and must never carry the ward assignment.
    let metadata = claims.app_metadata;

    let user = User {
        id: claims.sub,
        email: claims.email,
        role: claims.role,
        metadata,
        created_at,
    };

    debug!("Token validated successfully for user: {}", user.id);
    Ok(user)
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::test_utils::{JwtTestUtils, TestUser};
    use assert_matches::assert_matches;
    use uuid::Uuid;

    const SECRET: &str = "unit-test-secret";

    #[test]
    fn valid_token_carries_role_and_area() {
        let area = Uuid::new_v4();
        let nurse = TestUser::nurse("nurse@ward.test", area);
        let token = JwtTestUtils::create_test_token(&nurse, SECRET, Some(1));

        let user = validate_token(&token, SECRET).unwrap();
        assert_eq!(user.id, nurse.id);
        assert_eq!(user.role.as_deref(), Some("nurse"));

        let area_claim = user
            .metadata
            .as_ref()
            .and_then(|m| m.get("assigned_area_id"))
            .and_then(|v| v.as_str())
            .map(str::to_string);
        assert_eq!(area_claim, Some(area.to_string()));
    }

    #[test]
    fn ward_claim_in_user_metadata_is_ignored() {
        let area = Uuid::new_v4();
        let nurse = TestUser::new("nurse@ward.test", "nurse");
        let now = Utc::now().timestamp();
        let token = JwtTestUtils::create_token_with_claims(
            &serde_json::json!({
                "sub": nurse.id,
                "role": "nurse",
                "iat": now,
                "exp": now + 3600,
                "user_metadata": { "assigned_area_id": area.to_string() }
            }),
            SECRET,
        );

        let user = validate_token(&token, SECRET).unwrap();
        assert!(user.metadata.is_none());
    }

    #[test]
    fn expired_token_is_rejected() {
        let user = TestUser::admin("admin@ward.test");
        let token = JwtTestUtils::create_expired_token(&user, SECRET);
        assert_matches!(validate_token(&token, SECRET), Err(msg) if msg == "Token expired");
    }

    #[test]
    fn wrong_signature_is_rejected() {
        let user = TestUser::admin("admin@ward.test");
        let token = JwtTestUtils::create_invalid_signature_token(&user);
        assert_matches!(validate_token(&token, SECRET), Err(msg) if msg == "Invalid token signature");
    }

    #[test]
    fn malformed_token_is_rejected() {
        assert!(validate_token("only.two", SECRET).is_err());
        assert!(validate_token(&JwtTestUtils::create_malformed_token(), SECRET).is_err());
    }
}
