use chrono::{DateTime, Utc};
use serde::{Deserialize, Serialize};
use sqlx::FromRow;
use uuid::Uuid;

/// A named offering under a facility. `clinic_id` is drawn from the global
/// counter and is unique across every facility on the platform.
#[derive(Debug, Clone, Serialize, Deserialize, FromRow)]
pub struct ClinicService {
    pub id: Uuid,
    pub clinic_id: i64,
    pub name: String,
    pub description: Option<String>,
    pub department: String,
    pub created_at: DateTime<Utc>,
    pub updated_at: DateTime<Utc>,
}

#[derive(Debug, Deserialize)]
pub struct CreateClinicServiceRequest {
    pub name: String,
    pub description: Option<String>,
    pub department: Option<String>,
}

#[derive(Debug, Deserialize)]
pub struct UpdateClinicServiceRequest {
    pub name: Option<String>,
    pub description: Option<String>,
    pub department: Option<String>,
}
