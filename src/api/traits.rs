use async_trait::async_trait;

use super::types::{ApiError, ChatReply, LoginReply, RegisterReply};
use crate::models::{Conversation, ConversationDetail};

/// Request/response contract of the Aura backend.
///
/// Every method except `login` and `register` requires the credential the
/// implementation was constructed with.
#[async_trait]
pub trait AssistantApi: Send + Sync {
    async fn login(&self, email: &str, password: &str) -> Result<LoginReply, ApiError>;

    async fn register(
        &self,
        username: &str,
        email: &str,
        password: &str,
    ) -> Result<RegisterReply, ApiError>;

    async fn list_conversations(&self) -> Result<Vec<Conversation>, ApiError>;

    async fn get_conversation(&self, id: &str) -> Result<ConversationDetail, ApiError>;

    async fn create_conversation(&self, title: &str) -> Result<Conversation, ApiError>;

    async fn rename_conversation(&self, id: &str, title: &str) -> Result<(), ApiError>;

    async fn delete_conversation(&self, id: &str) -> Result<(), ApiError>;

    /// `chat_id = None` asks the server to create a conversation for this message.
    async fn send_chat(&self, message: &str, chat_id: Option<&str>)
        -> Result<ChatReply, ApiError>;
}
