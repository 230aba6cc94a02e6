//! In-memory `AssistantApi` used by the service tests.

use std::sync::Mutex;

use async_trait::async_trait;
use chrono::Utc;
use tokio::sync::Semaphore;

use super::traits::AssistantApi;
use super::types::{ApiError, ChatReply, LoginReply, RegisterReply};
use crate::models::{Conversation, ConversationDetail, DeliveryStatus, Message, Role};

#[derive(Default)]
struct Store {
    conversations: Vec<ConversationDetail>,
    next_id: u32,
    users: Vec<(String, String, String)>,
    fail_next: Option<ApiError>,
    reply: Option<String>,
    calls: Vec<String>,
}

/// Behaves like a tiny backend. `hold_chat` makes `send_chat` wait until
/// `release_chat` is called so tests can interleave other actions.
pub struct FakeApi {
    store: Mutex<Store>,
    hold_chat: bool,
    chat_gate: Semaphore,
    issue_tokens_on_register: bool,
}

impl Default for FakeApi {
    fn default() -> Self {
        Self {
            store: Mutex::new(Store::default()),
            hold_chat: false,
            chat_gate: Semaphore::new(0),
            issue_tokens_on_register: false,
        }
    }
}

impl FakeApi {
    pub fn new() -> Self {
        Self::default()
    }

    pub fn holding_chat() -> Self {
        Self {
            hold_chat: true,
            ..Self::default()
        }
    }

    pub fn issuing_register_tokens(mut self) -> Self {
        self.issue_tokens_on_register = true;
        self
    }

    pub fn release_chat(&self) {
        self.chat_gate.add_permits(1);
    }

    pub fn seed(&self, id: &str, title: &str) {
        let mut store = self.store.lock().unwrap();
        store.conversations.push(ConversationDetail {
            conversation: Conversation {
                id: id.to_string(),
                title: title.to_string(),
                updated_at: Utc::now(),
            },
            messages: Vec::new(),
        });
    }

    pub fn seed_user(&self, username: &str, email: &str, password: &str) {
        let mut store = self.store.lock().unwrap();
        store
            .users
            .push((username.to_string(), email.to_string(), password.to_string()));
    }

    /// Remove a conversation behind the client's back.
    pub fn forget(&self, id: &str) {
        let mut store = self.store.lock().unwrap();
        store.conversations.retain(|d| d.conversation.id != id);
    }

    pub fn fail_next(&self, err: ApiError) {
        self.store.lock().unwrap().fail_next = Some(err);
    }

    pub fn set_reply(&self, reply: &str) {
        self.store.lock().unwrap().reply = Some(reply.to_string());
    }

    pub fn calls(&self) -> Vec<String> {
        self.store.lock().unwrap().calls.clone()
    }

    pub fn title_of(&self, id: &str) -> Option<String> {
        let store = self.store.lock().unwrap();
        store
            .conversations
            .iter()
            .find(|d| d.conversation.id == id)
            .map(|d| d.conversation.title.clone())
    }

    fn begin(&self, call: String) -> Result<(), ApiError> {
        let mut store = self.store.lock().unwrap();
        store.calls.push(call);
        match store.fail_next.take() {
            Some(err) => Err(err),
            None => Ok(()),
        }
    }

    fn allocate_id(store: &mut Store) -> String {
        store.next_id += 1;
        format!("c{}", store.next_id)
    }
}

#[async_trait]
impl AssistantApi for FakeApi {
    async fn login(&self, email: &str, password: &str) -> Result<LoginReply, ApiError> {
        self.begin(format!("login {}", email))?;
        let store = self.store.lock().unwrap();
        store
            .users
            .iter()
            .find(|(_, e, p)| e == email && p == password)
            .map(|(username, _, _)| LoginReply {
                token: format!("token-{}", username),
                username: Some(username.clone()),
                message: Some("Login successful".to_string()),
            })
            .ok_or_else(|| ApiError::Unauthorized("Invalid credentials".to_string()))
    }

    async fn register(
        &self,
        username: &str,
        email: &str,
        password: &str,
    ) -> Result<RegisterReply, ApiError> {
        self.begin(format!("register {}", email))?;
        let mut store = self.store.lock().unwrap();
        if store.users.iter().any(|(_, e, _)| e == email) {
            return Err(ApiError::Rejected {
                status: 409,
                message: "User already exists".to_string(),
            });
        }
        store
            .users
            .push((username.to_string(), email.to_string(), password.to_string()));
        Ok(RegisterReply {
            message: Some("User registered successfully".to_string()),
            token: self
                .issue_tokens_on_register
                .then(|| format!("token-{}", username)),
        })
    }

    async fn list_conversations(&self) -> Result<Vec<Conversation>, ApiError> {
        self.begin("list".to_string())?;
        let store = self.store.lock().unwrap();
        Ok(store
            .conversations
            .iter()
            .map(|d| d.conversation.clone())
            .collect())
    }

    async fn get_conversation(&self, id: &str) -> Result<ConversationDetail, ApiError> {
        self.begin(format!("get {}", id))?;
        let store = self.store.lock().unwrap();
        store
            .conversations
            .iter()
            .find(|d| d.conversation.id == id)
            .cloned()
            .ok_or_else(|| ApiError::NotFound(id.to_string()))
    }

    async fn create_conversation(&self, title: &str) -> Result<Conversation, ApiError> {
        self.begin(format!("create {}", title))?;
        let mut store = self.store.lock().unwrap();
        let conversation = Conversation {
            id: Self::allocate_id(&mut store),
            title: title.to_string(),
            updated_at: Utc::now(),
        };
        store.conversations.push(ConversationDetail {
            conversation: conversation.clone(),
            messages: Vec::new(),
        });
        Ok(conversation)
    }

    async fn rename_conversation(&self, id: &str, title: &str) -> Result<(), ApiError> {
        self.begin(format!("rename {} {}", id, title))?;
        let mut store = self.store.lock().unwrap();
        let detail = store
            .conversations
            .iter_mut()
            .find(|d| d.conversation.id == id)
            .ok_or_else(|| ApiError::NotFound(id.to_string()))?;
        detail.conversation.title = title.to_string();
        Ok(())
    }

    async fn delete_conversation(&self, id: &str) -> Result<(), ApiError> {
        self.begin(format!("delete {}", id))?;
        let mut store = self.store.lock().unwrap();
        let before = store.conversations.len();
        store.conversations.retain(|d| d.conversation.id != id);
        if store.conversations.len() == before {
            return Err(ApiError::NotFound(id.to_string()));
        }
        Ok(())
    }

    async fn send_chat(
        &self,
        message: &str,
        chat_id: Option<&str>,
    ) -> Result<ChatReply, ApiError> {
        self.begin(format!("chat {} {}", chat_id.unwrap_or("-"), message))?;
        if self.hold_chat {
            if let Ok(permit) = self.chat_gate.acquire().await {
                permit.forget();
            }
        }

        let mut store = self.store.lock().unwrap();
        let response = store
            .reply
            .clone()
            .unwrap_or_else(|| format!("echo: {}", message));

        let id = match chat_id {
            Some(id) => id.to_string(),
            None => {
                let id = Self::allocate_id(&mut store);
                store.conversations.push(ConversationDetail {
                    conversation: Conversation {
                        id: id.clone(),
                        title: message.to_string(),
                        updated_at: Utc::now(),
                    },
                    messages: Vec::new(),
                });
                id
            }
        };

        let detail = store
            .conversations
            .iter_mut()
            .find(|d| d.conversation.id == id)
            .ok_or_else(|| ApiError::NotFound(id.clone()))?;
        detail
            .messages
            .push(Message::new(Role::User, message, DeliveryStatus::Delivered));
        detail.messages.push(Message::assistant(response.clone()));
        detail.conversation.updated_at = Utc::now();

        Ok(ChatReply {
            chat_id: id,
            response,
        })
    }
}
