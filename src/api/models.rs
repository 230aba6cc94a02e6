use chrono::{DateTime, NaiveDateTime, Utc};
use serde::{Deserialize, Serialize};

use super::types::ApiError;
use crate::config::UNTITLED_CONVERSATION;
use crate::models::{Conversation, ConversationDetail, DeliveryStatus, Message, Role};

// --- Request types ---

#[derive(Debug, Serialize)]
pub struct LoginRequest<'a> {
    pub email: &'a str,
    pub password: &'a str,
}

#[derive(Debug, Serialize)]
pub struct RegisterRequest<'a> {
    pub username: &'a str,
    pub email: &'a str,
    pub password: &'a str,
}

#[derive(Debug, Serialize)]
pub struct TitleRequest<'a> {
    pub title: &'a str,
}

#[derive(Debug, Serialize)]
pub struct ChatRequest<'a> {
    pub message: &'a str,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub chat_id: Option<&'a str>,
}

// --- Response types ---

#[derive(Debug, Deserialize)]
pub struct AuthResponse {
    #[serde(default)]
    pub message: Option<String>,
    #[serde(default)]
    pub token: Option<String>,
    #[serde(default)]
    pub user: Option<String>,
}

#[derive(Debug, Deserialize)]
pub struct ChatResponse {
    pub response: String,
    pub chat_id: WireId,
}

/// Identifiers are opaque to the client but some backends emit integer keys.
#[derive(Debug, Clone, PartialEq, Eq, Deserialize)]
#[serde(untagged)]
pub enum WireId {
    Text(String),
    Number(i64),
}

impl WireId {
    pub fn into_string(self) -> String {
        match self {
            WireId::Text(s) => s,
            WireId::Number(n) => n.to_string(),
        }
    }
}

#[derive(Debug, Deserialize)]
pub struct WireConversation {
    pub id: WireId,
    #[serde(default)]
    pub title: Option<String>,
    #[serde(default, alias = "updatedAt", alias = "updated")]
    pub updated_at: Option<String>,
    #[serde(default)]
    pub messages: Vec<WireMessage>,
}

/// Accepts both `{role, content}` and the older `{sender, text}` shape.
#[derive(Debug, Deserialize)]
pub struct WireMessage {
    #[serde(alias = "sender")]
    pub role: String,
    #[serde(alias = "text")]
    pub content: String,
    #[serde(default)]
    pub created_at: Option<String>,
}

#[derive(Debug, Deserialize)]
pub struct ErrorResponse {
    #[serde(default)]
    pub message: Option<String>,
    #[serde(default)]
    pub error: Option<String>,
}

impl ErrorResponse {
    pub fn into_message(self) -> Option<String> {
        self.message.or(self.error).filter(|m| !m.trim().is_empty())
    }
}

impl WireConversation {
    pub fn into_conversation(self) -> Conversation {
        Conversation {
            id: self.id.into_string(),
            title: self
                .title
                .filter(|t| !t.trim().is_empty())
                .unwrap_or_else(|| UNTITLED_CONVERSATION.to_string()),
            updated_at: self
                .updated_at
                .as_deref()
                .and_then(parse_timestamp)
                .unwrap_or(DateTime::<Utc>::UNIX_EPOCH),
        }
    }

    pub fn into_detail(mut self) -> Result<ConversationDetail, ApiError> {
        let messages = std::mem::take(&mut self.messages)
            .into_iter()
            .map(WireMessage::into_message)
            .collect::<Result<Vec<_>, _>>()?;
        Ok(ConversationDetail {
            conversation: self.into_conversation(),
            messages,
        })
    }
}

impl WireMessage {
    pub fn into_message(self) -> Result<Message, ApiError> {
        let role = Role::from_str(&self.role).ok_or_else(|| {
            ApiError::InvalidResponse(format!("Unknown message role: {}", self.role))
        })?;
        let mut message = Message::new(role, self.content, DeliveryStatus::Delivered);
        if let Some(ts) = self.created_at.as_deref().and_then(parse_timestamp) {
            message.created_at = ts;
        }
        Ok(message)
    }
}

/// Parse a server timestamp: RFC 3339, RFC 2822 (Flask's default), or a
/// naive ISO string taken as UTC.
pub fn parse_timestamp(raw: &str) -> Option<DateTime<Utc>> {
    let raw = raw.trim();
    if let Ok(dt) = DateTime::parse_from_rfc3339(raw) {
        return Some(dt.with_timezone(&Utc));
    }
    if let Ok(dt) = DateTime::parse_from_rfc2822(raw) {
        return Some(dt.with_timezone(&Utc));
    }
    ["%Y-%m-%dT%H:%M:%S%.f", "%Y-%m-%d %H:%M:%S%.f"]
        .iter()
        .find_map(|fmt| NaiveDateTime::parse_from_str(raw, fmt).ok())
        .map(|naive| naive.and_utc())
}
