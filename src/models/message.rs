use chrono::{DateTime, Utc};
use serde::{Deserialize, Serialize};
use sqlx::FromRow;
use uuid::Uuid;

#[derive(Debug, Clone, Serialize, Deserialize, PartialEq)]
#[serde(rename_all = "snake_case")]
pub enum MessageType {
    Broadcast,
    Individual,
}

impl std::fmt::Display for MessageType {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        let s = match self {
            MessageType::Broadcast => "broadcast",
            MessageType::Individual => "individual",
        };
        write!(f, "{s}")
    }
}

impl std::str::FromStr for MessageType {
    type Err = anyhow::Error;
    fn from_str(s: &str) -> Result<Self, Self::Err> {
        match s {
            "broadcast" => Ok(MessageType::Broadcast),
            "individual" => Ok(MessageType::Individual),
            _ => Err(anyhow::anyhow!("Unknown message_type: {s}")),
        }
    }
}

#[derive(Debug, Clone, Serialize, Deserialize, FromRow)]
pub struct Message {
    pub id: Uuid,
    pub sender_id: Uuid,
    pub message_type: String,
    pub recipient_id: Option<Uuid>,
    pub subject: Option<String>,
    pub content: String,
    pub is_read: bool,
    pub created_at: DateTime<Utc>,
    pub updated_at: DateTime<Utc>,
}

#[derive(Debug, Clone, Serialize, Deserialize, FromRow)]
pub struct MessageWithSender {
    pub id: Uuid,
    pub sender_id: Uuid,
    pub sender_first_name: String,
    pub sender_last_name: String,
    pub message_type: String,
    pub recipient_id: Option<Uuid>,
    pub subject: Option<String>,
    pub content: String,
    pub is_read: bool,
    pub created_at: DateTime<Utc>,
}

#[derive(Debug, Deserialize)]
pub struct CreateMessageRequest {
    pub message_type: MessageType,
    pub recipient_id: Option<Uuid>,
    pub subject: Option<String>,
    pub content: String,
}

#[derive(Debug, Deserialize)]
pub struct PaginationQuery {
    pub page: Option<i64>,
    pub per_page: Option<i64>,
}

impl PaginationQuery {
    pub fn offset(&self) -> i64 {
        let page = self.page.unwrap_or(1).max(1);
        (page - 1) * self.per_page()
    }

    pub fn per_page(&self) -> i64 {
        self.per_page.unwrap_or(20).clamp(1, 100)
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn pagination_defaults_and_clamps() {
        let q = PaginationQuery { page: None, per_page: None };
        assert_eq!(q.offset(), 0);
        assert_eq!(q.per_page(), 20);

        let q = PaginationQuery { page: Some(3), per_page: Some(500) };
        assert_eq!(q.per_page(), 100);
        assert_eq!(q.offset(), 200);

        let q = PaginationQuery { page: Some(0), per_page: Some(0) };
        assert_eq!(q.per_page(), 1);
        assert_eq!(q.offset(), 0);
    }
}
