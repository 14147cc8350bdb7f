use chrono::{DateTime, NaiveDate, Utc};
use serde::{Deserialize, Serialize};
use sqlx::FromRow;
use uuid::Uuid;

/// A completed therapy session; durations feed the monthly dashboard averages.
#[derive(Debug, Clone, Serialize, Deserialize, FromRow)]
pub struct TherapySession {
    pub id: Uuid,
    pub therapist_email: Option<String>,
    pub parent_email: Option<String>,
    pub duration_minutes: f64,
    pub session_date: Option<NaiveDate>,
    pub created_at: DateTime<Utc>,
}

#[derive(Debug, Deserialize)]
pub struct RecordSessionRequest {
    pub therapist_email: Option<String>,
    pub parent_email: Option<String>,
    pub duration_minutes: f64,
    pub session_date: Option<NaiveDate>,
}
