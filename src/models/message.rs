use chrono::{DateTime, Utc};
use serde::{Deserialize, Serialize};
use uuid::Uuid;

#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum Role {
    User,
    Assistant,
}

impl Role {
    pub fn as_str(&self) -> &'static str {
        match self {
            Role::User => "user",
            Role::Assistant => "assistant",
        }
    }

    /// Accepts the legacy `bot` sender name as an alias for the assistant.
    pub fn from_str(s: &str) -> Option<Self> {
        match s.trim().to_ascii_lowercase().as_str() {
            "user" => Some(Role::User),
            "assistant" | "bot" => Some(Role::Assistant),
            _ => None,
        }
    }
}

/// Delivery state of a message as seen by this client. Only user messages
/// sent from here are ever `Pending` or `Failed`.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
pub enum DeliveryStatus {
    Delivered,
    Pending,
    Failed,
}

#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct Message {
    /// Client-local key; the server does not identify messages.
    pub id: String,
    pub role: Role,
    pub content: String,
    pub status: DeliveryStatus,
    pub created_at: DateTime<Utc>,
}

impl Message {
    pub fn new(role: Role, content: impl Into<String>, status: DeliveryStatus) -> Self {
        Self {
            id: Uuid::new_v4().to_string(),
            role,
            content: content.into(),
            status,
            created_at: Utc::now(),
        }
    }

    /// Optimistic user message awaiting the server round-trip.
    pub fn pending_user(content: impl Into<String>) -> Self {
        Self::new(Role::User, content, DeliveryStatus::Pending)
    }

    pub fn assistant(content: impl Into<String>) -> Self {
        Self::new(Role::Assistant, content, DeliveryStatus::Delivered)
    }
}
