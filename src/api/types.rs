use std::time::Duration;

use thiserror::Error;

#[derive(Debug, Clone, PartialEq, Eq, Error)]
pub enum ApiError {
    #[error("Authentication failed: {0}")]
    Unauthorized(String),

    /// Carries the identifier of the missing resource.
    #[error("Not found: {0}")]
    NotFound(String),

    #[error("Request rejected (HTTP {status}): {message}")]
    Rejected { status: u16, message: String },

    #[error("Network error: {0}")]
    Network(String),

    #[error("Request timed out after {}s", .0.as_secs())]
    Timeout(Duration),

    #[error("Invalid response: {0}")]
    InvalidResponse(String),
}

/// Result of `POST /chat`.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct ChatReply {
    pub chat_id: String,
    pub response: String,
}

#[derive(Clone, PartialEq, Eq)]
pub struct LoginReply {
    pub token: String,
    pub username: Option<String>,
    pub message: Option<String>,
}

impl std::fmt::Debug for LoginReply {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("LoginReply")
            .field("token", &"***")
            .field("username", &self.username)
            .field("message", &self.message)
            .finish()
    }
}

/// Registration may or may not hand out a token straight away.
#[derive(Clone, PartialEq, Eq)]
pub struct RegisterReply {
    pub message: Option<String>,
    pub token: Option<String>,
}

impl std::fmt::Debug for RegisterReply {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("RegisterReply")
            .field("message", &self.message)
            .field("token", &self.token.as_ref().map(|_| "***"))
            .finish()
    }
}
