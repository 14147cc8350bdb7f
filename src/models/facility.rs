use chrono::{DateTime, Utc};
use serde::{Deserialize, Serialize};
use sqlx::FromRow;
use uuid::Uuid;

/// Registry row for an approved facility (public.facilities).
#[derive(Debug, Clone, Serialize, Deserialize, FromRow)]
pub struct Facility {
    pub id: Uuid,
    pub slug: String,
    pub name: String,
    pub email: String,
    pub phone: Option<String>,
    pub address: Option<String>,
    pub description: Option<String>,
    pub therapy_service: Option<String>,
    pub image_url: Option<String>,
    pub additional_images: Vec<String>,
    pub schedule_availability: Option<serde_json::Value>,
    pub email_verified: bool,
    pub is_active: bool,
    pub created_at: DateTime<Utc>,
    pub updated_at: DateTime<Utc>,
}

/// A submitted-but-unapproved facility registration.
#[derive(Debug, Clone, Serialize, Deserialize, FromRow)]
pub struct PendingFacility {
    pub id: Uuid,
    pub name: String,
    pub email: String,
    pub phone: String,
    pub therapy_type: Option<String>,
    pub description: Option<String>,
    pub address: Option<String>,
    pub created_at: DateTime<Utc>,
}

/// Public application form body.
#[derive(Debug, Deserialize)]
pub struct SubmitFacilityRequest {
    pub name: String,
    pub email: String,
    pub phone: String,
    pub therapy_type: Option<String>,
    pub description: Option<String>,
    pub address: Option<String>,
}

/// Platform-side facility update (partial).
#[derive(Debug, Deserialize)]
pub struct UpdateFacilityRequest {
    pub name: Option<String>,
    pub email: Option<String>,
    pub phone: Option<String>,
    pub address: Option<String>,
    pub is_active: Option<bool>,
}

/// Facility-admin self-service profile update (partial).
#[derive(Debug, Deserialize)]
pub struct UpdateFacilityProfileRequest {
    pub phone: Option<String>,
    pub address: Option<String>,
    pub description: Option<String>,
    pub therapy_service: Option<String>,
    pub image_url: Option<String>,
    pub additional_images: Option<Vec<String>>,
    pub schedule_availability: Option<serde_json::Value>,
}

/// Rejection is irreversible; callers must confirm explicitly.
#[derive(Debug, Deserialize)]
pub struct RejectRequest {
    pub confirm: bool,
}
