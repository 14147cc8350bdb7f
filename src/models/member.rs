use chrono::{DateTime, Utc};
use serde::{Deserialize, Serialize};
use sqlx::FromRow;

/// Which sub-tenant population a pending application belongs to.
#[derive(Debug, Clone, Copy, Serialize, Deserialize, PartialEq, Eq)]
#[serde(rename_all = "snake_case")]
pub enum MemberKind {
    Therapist,
    Parent,
}

impl MemberKind {
    /// Pending-application table inside the facility schema.
    pub fn pending_table(&self) -> &'static str {
        match self {
            MemberKind::Therapist => "pending_therapists",
            MemberKind::Parent => "pending_parents",
        }
    }

    /// Approved-record table inside the facility schema.
    pub fn approved_table(&self) -> &'static str {
        match self {
            MemberKind::Therapist => "therapists",
            MemberKind::Parent => "parents",
        }
    }
}

impl std::fmt::Display for MemberKind {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        let s = match self {
            MemberKind::Therapist => "therapist",
            MemberKind::Parent => "parent",
        };
        write!(f, "{s}")
    }
}

impl std::str::FromStr for MemberKind {
    type Err = anyhow::Error;
    fn from_str(s: &str) -> Result<Self, Self::Err> {
        match s {
            "therapist" => Ok(MemberKind::Therapist),
            "parent" => Ok(MemberKind::Parent),
            _ => Err(anyhow::anyhow!("Unknown member kind: {s}")),
        }
    }
}

#[derive(Debug, Clone, Serialize, Deserialize, FromRow)]
pub struct Therapist {
    pub id: uuid::Uuid,
    pub first_name: String,
    pub last_name: String,
    pub email: String,
    pub phone: Option<String>,
    pub address: Option<String>,
    pub therapy_type: Option<String>,
    pub specialization: Option<String>,
    pub created_at: DateTime<Utc>,
}

#[derive(Debug, Clone, Serialize, Deserialize, FromRow)]
pub struct Parent {
    pub id: uuid::Uuid,
    pub first_name: String,
    pub last_name: String,
    pub email: String,
    pub phone: Option<String>,
    pub address: Option<String>,
    pub therapy_type: Option<String>,
    pub special_needs: Option<String>,
    pub created_at: DateTime<Utc>,
}

/// Row shape shared by pending_therapists and pending_parents.
#[derive(Debug, Clone, Serialize, Deserialize, FromRow)]
pub struct PendingMember {
    pub id: uuid::Uuid,
    pub first_name: String,
    pub last_name: String,
    pub email: String,
    pub phone: Option<String>,
    pub address: Option<String>,
    pub therapy_type: Option<String>,
    pub specialization: Option<String>,
    pub special_needs: Option<String>,
    pub created_at: DateTime<Utc>,
}

/// Public application form body (therapist or parent under a facility).
#[derive(Debug, Deserialize)]
pub struct SubmitMemberRequest {
    pub kind: MemberKind,
    pub first_name: String,
    pub last_name: String,
    pub email: String,
    pub phone: Option<String>,
    pub address: Option<String>,
    pub therapy_type: Option<String>,
    pub specialization: Option<String>,
    pub special_needs: Option<String>,
}

#[derive(Debug, Deserialize)]
pub struct ApproveMemberRequest {
    pub kind: MemberKind,
}

#[derive(Debug, Deserialize)]
pub struct RejectMemberRequest {
    pub kind: MemberKind,
    pub confirm: bool,
}
