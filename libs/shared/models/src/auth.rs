use std::fmt;
use std::str::FromStr;

use chrono::{DateTime, Utc};
use serde::{Deserialize, Serialize};
use uuid::Uuid;

use crate::error::AppError;

#[derive(Debug, Serialize, Deserialize)]
pub struct JwtClaims {
    pub sub: String,
    pub exp: Option<u64>,
    pub email: Option<String>,
    pub role: Option<String>,
    pub app_metadata: Option<serde_json::Value>,
    pub user_metadata: Option<serde_json::Value>,
    pub aud: Option<String>,
    pub iat: Option<u64>,
}

/// Authenticated user as decoded from the bearer token.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct User {
    pub id: String,
    pub email: Option<String>,
    pub role: Option<String>,
    /// Server-controlled `app_metadata` claims.
    pub metadata: Option<serde_json::Value>,
    pub created_at: Option<DateTime<Utc>>,
}

#[derive(Debug, Clone, Copy, Serialize, Deserialize, PartialEq, Eq, Hash)]
#[serde(rename_all = "snake_case")]
pub enum StaffRole {
    Admin,
    Supervisor,
    Nurse,
    Pharmacy,
}

impl StaffRole {
    /// Admins and supervisors manage schedules directly and act across every ward.
    pub fn is_supervisory(&self) -> bool {
        matches!(self, StaffRole::Admin | StaffRole::Supervisor)
    }
}

impl fmt::Display for StaffRole {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            StaffRole::Admin => write!(f, "admin"),
            StaffRole::Supervisor => write!(f, "supervisor"),
            StaffRole::Nurse => write!(f, "nurse"),
            StaffRole::Pharmacy => write!(f, "pharmacy"),
        }
    }
}

impl FromStr for StaffRole {
    type Err = String;

    fn from_str(s: &str) -> Result<Self, Self::Err> {
        match s.to_ascii_lowercase().as_str() {
            "admin" => Ok(StaffRole::Admin),
            "supervisor" => Ok(StaffRole::Supervisor),
            "nurse" => Ok(StaffRole::Nurse),
            "pharmacy" => Ok(StaffRole::Pharmacy),
            other => Err(format!("Unknown staff role: {}", other)),
        }
    }
}

/// The staff member performing a request: who they are, what they may do and
/// which ward they are assigned to.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct Actor {
    pub id: Uuid,
    pub role: StaffRole,
    pub assigned_area_id: Option<Uuid>,
}

impl Actor {
    pub fn new(id: Uuid, role: StaffRole, assigned_area_id: Option<Uuid>) -> Self {
        Self { id, role, assigned_area_id }
    }
}

impl TryFrom<&User> for Actor {
    type Error = AppError;

    fn try_from(user: &User) -> Result<Self, Self::Error> {
        let id = Uuid::parse_str(&user.id)
            .map_err(|_| AppError::Auth("Token subject is not a staff id".to_string()))?;

        let role = user
            .role
            .as_deref()
            .ok_or_else(|| AppError::Auth("Token carries no role".to_string()))?
            .parse::<StaffRole>()
            .map_err(AppError::Forbidden)?;

        let assigned_area_id = user
            .metadata
            .as_ref()
            .and_then(|m| m.get("assigned_area_id"))
            .and_then(|v| v.as_str())
            .and_then(|s| Uuid::parse_str(s).ok());

        Ok(Self { id, role, assigned_area_id })
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use serde_json::json;

    fn user(role: &str, metadata: Option<serde_json::Value>) -> User {
        User {
            id: Uuid::new_v4().to_string(),
            email: Some("nurse@ward.test".to_string()),
            role: Some(role.to_string()),
            metadata,
            created_at: None,
        }
    }

    #[test]
    fn actor_reads_assigned_area_from_metadata() {
        let area = Uuid::new_v4();
        let u = user("nurse", Some(json!({ "assigned_area_id": area.to_string() })));
        let actor = Actor::try_from(&u).unwrap();

        assert_eq!(actor.role, StaffRole::Nurse);
        assert_eq!(actor.assigned_area_id, Some(area));
    }

    #[test]
    fn unknown_role_is_forbidden() {
        let u = user("janitor", None);
        assert!(matches!(Actor::try_from(&u), Err(AppError::Forbidden(_))));
    }

    #[test]
    fn non_uuid_subject_is_rejected() {
        let mut u = user("admin", None);
        u.id = "not-a-uuid".to_string();
        assert!(matches!(Actor::try_from(&u), Err(AppError::Auth(_))));
    }
}
