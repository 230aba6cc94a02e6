//! Session controller: the client-side view of the user's conversations.
//!
//! User intents arrive as [`SessionMsg`] and are applied by
//! [`SessionController::update`], which validates them, mutates local state
//! where the change is optimistic and spawns the network request. Request
//! completions come back as [`SessionCmd`] on an internal channel and are
//! applied by [`SessionController::update_cmd`]. State is only ever touched
//! from these two methods, so there is no locking.
//!
//! Two request slots exist: one for send/create and one for list/open.
//! A busy slot rejects further work with [`SessionError::Busy`].

use std::collections::HashSet;
use std::future::Future;
use std::sync::Arc;
use std::time::Duration;

use chrono::Utc;
use thiserror::Error;
use tokio::sync::mpsc;
use tokio_util::sync::CancellationToken;

use crate::api::{ApiError, AssistantApi, ChatReply};
use crate::models::{Conversation, ConversationDetail, DeliveryStatus, Message};
use crate::services::chat::{self, SendResult, SendTicket};
use crate::services::conversation::{sort_by_recent, truncate_title};

#[derive(Debug, Clone, PartialEq, Eq, Error)]
pub enum SessionError {
    #[error("Not signed in or session expired")]
    Unauthorized,

    #[error("Conversation {0} no longer exists")]
    NotFound(String),

    #[error("{0}")]
    Validation(&'static str),

    #[error("Service unavailable: {0}")]
    Unavailable(String),

    #[error("Another request is still in progress")]
    Busy,
}

impl From<ApiError> for SessionError {
    fn from(err: ApiError) -> Self {
        match err {
            ApiError::Unauthorized(_) => SessionError::Unauthorized,
            ApiError::NotFound(id) => SessionError::NotFound(id),
            ApiError::Rejected { message, .. } => SessionError::Unavailable(message),
            other => SessionError::Unavailable(other.to_string()),
        }
    }
}

/// Answer to the "really delete?" prompt.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum Confirmation {
    Confirmed,
    Declined,
}

/// What `update` did with a message.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum Dispatch {
    /// A request is in flight; its completion arrives as a `SessionCmd`.
    Issued,
    /// Local state changed, nothing to wait for.
    Applied,
    /// Nothing happened (cancelled rename, declined delete, idle stop).
    Skipped,
}

#[derive(Debug, Clone, PartialEq, Eq)]
pub enum SessionMsg {
    List,
    Open(String),
    Create(String),
    Send(String),
    Rename { id: String, title: String },
    Delete { id: String, confirmation: Confirmation },
    /// Start composing a conversation that does not exist yet.
    Compose,
    /// Cancel the in-flight send.
    Stop,
    Draft(String),
}

#[derive(Debug)]
pub enum SessionCmd {
    Listed(Result<Vec<Conversation>, ApiError>),
    Opened {
        id: String,
        result: Result<ConversationDetail, ApiError>,
    },
    Created {
        epoch: u64,
        result: Result<Conversation, ApiError>,
    },
    Sent {
        ticket: SendTicket,
        result: SendResult,
    },
    Renamed {
        id: String,
        title: String,
        result: Result<(), ApiError>,
    },
    Deleted {
        id: String,
        result: Result<(), ApiError>,
    },
}

/// Successful outcome of a completed request.
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum SessionEvent {
    ConversationsLoaded(usize),
    ConversationOpened(String),
    ConversationCreated(String),
    ReplyReceived { conversation_id: String },
    /// The reply arrived after the user moved to another conversation.
    ReplyDiscarded { conversation_id: String },
    SendCancelled,
    ConversationRenamed(String),
    ConversationDeleted(String),
}

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum Phase {
    Idle,
    Sending,
    Loading,
}

#[derive(Debug)]
enum SendSlot {
    Message(CancellationToken),
    Create,
}

#[derive(Debug, Default)]
pub struct SessionState {
    conversations: Vec<Conversation>,
    active_id: Option<String>,
    messages: Vec<Message>,
    draft: String,
    sending: Option<SendSlot>,
    loading: bool,
    mutating: HashSet<String>,
    /// Bumped whenever the active conversation changes.
    epoch: u64,
}

impl SessionState {
    /// Known conversations, most recently updated first.
    pub fn conversations(&self) -> Vec<&Conversation> {
        let mut list: Vec<&Conversation> = self.conversations.iter().collect();
        sort_by_recent(&mut list);
        list
    }

    pub fn conversation(&self, id: &str) -> Option<&Conversation> {
        self.conversations.iter().find(|c| c.id == id)
    }

    pub fn active_id(&self) -> Option<&str> {
        self.active_id.as_deref()
    }

    pub fn active_conversation(&self) -> Option<&Conversation> {
        self.active_id.as_deref().and_then(|id| self.conversation(id))
    }

    pub fn messages(&self) -> &[Message] {
        &self.messages
    }

    pub fn draft(&self) -> &str {
        &self.draft
    }

    pub fn is_sending(&self) -> bool {
        self.sending.is_some()
    }

    pub fn is_loading(&self) -> bool {
        self.loading
    }

    pub fn phase(&self) -> Phase {
        if self.is_sending() {
            Phase::Sending
        } else if self.loading {
            Phase::Loading
        } else {
            Phase::Idle
        }
    }

    fn knows(&self, id: &str) -> bool {
        self.conversations.iter().any(|c| c.id == id)
    }

    fn switch_active(&mut self, id: Option<String>, messages: Vec<Message>) {
        self.active_id = id;
        self.messages = messages;
        self.epoch += 1;
    }

    /// Replace the active conversation's history without counting as a
    /// switch. Messages still awaiting a reply are kept at the end.
    fn reload_active(&mut self, mut messages: Vec<Message>) {
        messages.extend(
            self.messages
                .drain(..)
                .filter(|m| m.status == DeliveryStatus::Pending),
        );
        self.messages = messages;
    }

    fn remove(&mut self, id: &str) {
        self.conversations.retain(|c| c.id != id);
        if self.active_id.as_deref() == Some(id) {
            self.switch_active(None, Vec::new());
        }
    }

    fn prepend(&mut self, conversation: Conversation) {
        self.conversations.retain(|c| c.id != conversation.id);
        self.conversations.insert(0, conversation);
    }

    fn touch(&mut self, id: &str) {
        if let Some(conv) = self.conversations.iter_mut().find(|c| c.id == id) {
            conv.updated_at = Utc::now();
        }
    }

    fn set_status(&mut self, message_id: &str, status: DeliveryStatus) {
        if let Some(msg) = self.messages.iter_mut().find(|m| m.id == message_id) {
            msg.status = status;
        }
    }

    /// Whether a reply for `ticket` may still be applied to the visible
    /// message sequence.
    fn is_current(&self, ticket: &SendTicket) -> bool {
        self.epoch == ticket.epoch && self.active_id == ticket.conversation_id
    }
}

pub struct SessionController {
    api: Arc<dyn AssistantApi>,
    state: SessionState,
    request_timeout: Duration,
    tx: mpsc::UnboundedSender<SessionCmd>,
    rx: mpsc::UnboundedReceiver<SessionCmd>,
}

impl SessionController {
    pub fn new(api: Arc<dyn AssistantApi>, request_timeout: Duration) -> Self {
        let (tx, rx) = mpsc::unbounded_channel();
        Self {
            api,
            state: SessionState::default(),
            request_timeout,
            tx,
            rx,
        }
    }

    pub fn state(&self) -> &SessionState {
        &self.state
    }

    /// Apply a user intent. Validation and busy-slot errors are returned
    /// here, before any request is made.
    pub fn update(&mut self, msg: SessionMsg) -> Result<Dispatch, SessionError> {
        match msg {
            SessionMsg::List => {
                self.claim_loading()?;
                let (api, limit) = (self.api.clone(), self.request_timeout);
                self.spawn(async move {
                    SessionCmd::Listed(chat::with_deadline(limit, api.list_conversations()).await)
                });
                Ok(Dispatch::Issued)
            }
            SessionMsg::Open(id) => {
                if !self.state.knows(&id) {
                    return Err(SessionError::NotFound(id));
                }
                self.claim_loading()?;
                let (api, limit) = (self.api.clone(), self.request_timeout);
                self.spawn(async move {
                    let result = chat::with_deadline(limit, api.get_conversation(&id)).await;
                    SessionCmd::Opened { id, result }
                });
                Ok(Dispatch::Issued)
            }
            SessionMsg::Create(title) => {
                let title = title.trim().to_string();
                if title.is_empty() {
                    return Err(SessionError::Validation("Conversation title cannot be empty"));
                }
                if self.state.sending.is_some() {
                    return Err(SessionError::Busy);
                }
                self.state.sending = Some(SendSlot::Create);
                let (api, limit) = (self.api.clone(), self.request_timeout);
                let epoch = self.state.epoch;
                self.spawn(async move {
                    let result = chat::with_deadline(limit, api.create_conversation(&title)).await;
                    SessionCmd::Created { epoch, result }
                });
                Ok(Dispatch::Issued)
            }
            SessionMsg::Send(text) => self.begin_send(text),
            SessionMsg::Rename { id, title } => {
                let title = title.trim().to_string();
                if title.is_empty() {
                    return Ok(Dispatch::Skipped);
                }
                self.claim_mutation(&id)?;
                let (api, limit) = (self.api.clone(), self.request_timeout);
                self.spawn(async move {
                    let result =
                        chat::with_deadline(limit, api.rename_conversation(&id, &title)).await;
                    SessionCmd::Renamed { id, title, result }
                });
                Ok(Dispatch::Issued)
            }
            SessionMsg::Delete { id, confirmation } => {
                if confirmation == Confirmation::Declined {
                    return Ok(Dispatch::Skipped);
                }
                self.claim_mutation(&id)?;
                let (api, limit) = (self.api.clone(), self.request_timeout);
                self.spawn(async move {
                    let result = chat::with_deadline(limit, api.delete_conversation(&id)).await;
                    SessionCmd::Deleted { id, result }
                });
                Ok(Dispatch::Issued)
            }
            SessionMsg::Compose => {
                self.state.switch_active(None, Vec::new());
                Ok(Dispatch::Applied)
            }
            SessionMsg::Stop => match &self.state.sending {
                Some(SendSlot::Message(token)) => {
                    token.cancel();
                    Ok(Dispatch::Applied)
                }
                _ => Ok(Dispatch::Skipped),
            },
            SessionMsg::Draft(text) => {
                self.state.draft = text;
                Ok(Dispatch::Applied)
            }
        }
    }

    /// Apply a request completion.
    pub fn update_cmd(&mut self, cmd: SessionCmd) -> Result<SessionEvent, SessionError> {
        match cmd {
            SessionCmd::Listed(result) => {
                self.state.loading = false;
                let conversations = result?;
                tracing::info!(count = conversations.len(), "conversations loaded");
                self.state.conversations = conversations;
                if let Some(id) = self.state.active_id.clone() {
                    if !self.state.knows(&id) {
                        tracing::warn!(conversation_id = %id, "active conversation no longer listed");
                        self.state.switch_active(None, Vec::new());
                    }
                }
                Ok(SessionEvent::ConversationsLoaded(self.state.conversations.len()))
            }
            SessionCmd::Opened { id, result } => {
                self.state.loading = false;
                match result {
                    Ok(detail) => {
                        // Deleted while the fetch was in flight.
                        if !self.state.knows(&id) {
                            return Err(SessionError::NotFound(id));
                        }
                        let mut conversation = detail.conversation;
                        conversation.id = id.clone();
                        self.state.prepend(conversation);
                        if self.state.active_id.as_deref() == Some(id.as_str()) {
                            self.state.reload_active(detail.messages);
                        } else {
                            self.state.switch_active(Some(id.clone()), detail.messages);
                        }
                        tracing::info!(conversation_id = %id, "conversation opened");
                        Ok(SessionEvent::ConversationOpened(id))
                    }
                    Err(ApiError::NotFound(_)) => {
                        tracing::warn!(conversation_id = %id, "conversation vanished on the server");
                        self.state.remove(&id);
                        Err(SessionError::NotFound(id))
                    }
                    Err(e) => Err(e.into()),
                }
            }
            SessionCmd::Created { epoch, result } => {
                self.state.sending = None;
                let conversation = result?;
                let id = conversation.id.clone();
                self.state.prepend(conversation);
                // Another conversation was opened while this one was created.
                if epoch == self.state.epoch {
                    self.state.switch_active(Some(id.clone()), Vec::new());
                }
                tracing::info!(conversation_id = %id, "conversation created");
                Ok(SessionEvent::ConversationCreated(id))
            }
            SessionCmd::Sent { ticket, result } => {
                self.state.sending = None;
                match result {
                    SendResult::Replied(reply) => Ok(self.apply_reply(ticket, reply)),
                    SendResult::Failed(e) => {
                        if self.state.is_current(&ticket) {
                            self.state.set_status(&ticket.message_id, DeliveryStatus::Failed);
                        }
                        if let (ApiError::NotFound(_), Some(id)) = (&e, &ticket.conversation_id) {
                            tracing::warn!(conversation_id = %id, "conversation vanished on the server");
                            self.state.remove(id);
                            return Err(SessionError::NotFound(id.clone()));
                        }
                        Err(e.into())
                    }
                    SendResult::Cancelled => {
                        if self.state.is_current(&ticket) {
                            self.state.set_status(&ticket.message_id, DeliveryStatus::Failed);
                        }
                        Ok(SessionEvent::SendCancelled)
                    }
                }
            }
            SessionCmd::Renamed { id, title, result } => {
                self.state.mutating.remove(&id);
                match result {
                    Ok(()) => {
                        if let Some(conv) = self.state.conversations.iter_mut().find(|c| c.id == id) {
                            conv.title = title;
                            conv.updated_at = Utc::now();
                        }
                        Ok(SessionEvent::ConversationRenamed(id))
                    }
                    Err(ApiError::NotFound(_)) => {
                        self.state.remove(&id);
                        Err(SessionError::NotFound(id))
                    }
                    Err(e) => Err(e.into()),
                }
            }
            SessionCmd::Deleted { id, result } => {
                self.state.mutating.remove(&id);
                match result {
                    // Already gone on the server is as good as deleted.
                    Ok(()) | Err(ApiError::NotFound(_)) => {
                        self.state.remove(&id);
                        tracing::info!(conversation_id = %id, "conversation deleted");
                        Ok(SessionEvent::ConversationDeleted(id))
                    }
                    Err(e) => Err(e.into()),
                }
            }
        }
    }

    /// Wait for the next request completion and apply it.
    pub async fn settle(&mut self) -> Result<SessionEvent, SessionError> {
        let cmd = self.next_cmd().await.ok_or_else(|| {
            SessionError::Unavailable("session channel closed".to_string())
        })?;
        self.update_cmd(cmd)
    }

    pub async fn next_cmd(&mut self) -> Option<SessionCmd> {
        self.rx.recv().await
    }

    /// `update` followed by `settle` when a request was issued.
    pub async fn run(&mut self, msg: SessionMsg) -> Result<Option<SessionEvent>, SessionError> {
        match self.update(msg)? {
            Dispatch::Issued => self.settle().await.map(Some),
            Dispatch::Applied | Dispatch::Skipped => Ok(None),
        }
    }

    fn begin_send(&mut self, text: String) -> Result<Dispatch, SessionError> {
        if self.state.sending.is_some() {
            return Err(SessionError::Busy);
        }
        let text = text.trim();
        if text.is_empty() {
            return Err(SessionError::Validation("Message cannot be empty"));
        }

        let message = Message::pending_user(text);
        let ticket = SendTicket {
            conversation_id: self.state.active_id.clone(),
            message_id: message.id.clone(),
            text: message.content.clone(),
            epoch: self.state.epoch,
        };
        self.state.messages.push(message);
        self.state.draft.clear();

        let token = CancellationToken::new();
        self.state.sending = Some(SendSlot::Message(token.clone()));

        tracing::debug!(
            conversation_id = ?ticket.conversation_id,
            message_id = %ticket.message_id,
            "sending message"
        );

        let api = self.api.clone();
        let limit = self.request_timeout;
        let tx = self.tx.clone();
        tokio::spawn(async move {
            let result = chat::dispatch_send(api, &ticket, token, limit).await;
            let _ = tx.send(SessionCmd::Sent { ticket, result });
        });
        Ok(Dispatch::Issued)
    }

    fn apply_reply(&mut self, ticket: SendTicket, reply: ChatReply) -> SessionEvent {
        let chat_id = reply.chat_id;
        let current = self.state.is_current(&ticket)
            && ticket
                .conversation_id
                .as_deref()
                .map_or(true, |id| id == chat_id);

        // Keep the sidebar in step with the server even if the reply is
        // not shown. A conversation deleted meanwhile stays deleted.
        if self.state.knows(&chat_id) {
            self.state.touch(&chat_id);
        } else if ticket.conversation_id.is_none() {
            self.state.prepend(Conversation {
                id: chat_id.clone(),
                title: truncate_title(&ticket.text),
                updated_at: Utc::now(),
            });
        }

        if !current {
            tracing::warn!(
                conversation_id = %chat_id,
                "discarding reply for a conversation that is no longer active"
            );
            return SessionEvent::ReplyDiscarded {
                conversation_id: chat_id,
            };
        }

        self.state
            .set_status(&ticket.message_id, DeliveryStatus::Delivered);
        self.state.messages.push(Message::assistant(reply.response));
        self.state.active_id = Some(chat_id.clone());
        SessionEvent::ReplyReceived {
            conversation_id: chat_id,
        }
    }

    fn claim_loading(&mut self) -> Result<(), SessionError> {
        if self.state.loading {
            return Err(SessionError::Busy);
        }
        self.state.loading = true;
        Ok(())
    }

    fn claim_mutation(&mut self, id: &str) -> Result<(), SessionError> {
        if !self.state.knows(id) {
            return Err(SessionError::NotFound(id.to_string()));
        }
        if !self.state.mutating.insert(id.to_string()) {
            return Err(SessionError::Busy);
        }
        Ok(())
    }

    /// Run `request` in the background and post its command back.
    fn spawn<F>(&self, request: F)
    where
        F: Future<Output = SessionCmd> + Send + 'static,
    {
        let tx = self.tx.clone();
        tokio::spawn(async move {
            let _ = tx.send(request.await);
        });
    }
}
