use std::future::Future;
use std::sync::Arc;
use std::time::Duration;

use tokio_util::sync::CancellationToken;

use crate::api::{ApiError, AssistantApi, ChatReply};

/// A user message that has been appended optimistically and handed to the
/// server. `epoch` is the session epoch at issue time.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct SendTicket {
    pub conversation_id: Option<String>,
    pub message_id: String,
    pub text: String,
    pub(crate) epoch: u64,
}

/// How a dispatched send ended.
#[derive(Debug)]
pub enum SendResult {
    Replied(ChatReply),
    Failed(ApiError),
    Cancelled,
}

/// Bound a request by `limit`. Expiry is reported as `ApiError::Timeout`.
pub async fn with_deadline<T, F>(limit: Duration, request: F) -> Result<T, ApiError>
where
    F: Future<Output = Result<T, ApiError>>,
{
    match tokio::time::timeout(limit, request).await {
        Ok(result) => result,
        Err(_) => Err(ApiError::Timeout(limit)),
    }
}

/// Send the ticket's text to the assistant, racing the request against the
/// cancel token and the deadline.
pub async fn dispatch_send(
    api: Arc<dyn AssistantApi>,
    ticket: &SendTicket,
    cancel_token: CancellationToken,
    limit: Duration,
) -> SendResult {
    let request = with_deadline(
        limit,
        api.send_chat(&ticket.text, ticket.conversation_id.as_deref()),
    );

    tokio::select! {
        _ = cancel_token.cancelled() => {
            tracing::info!(message_id = %ticket.message_id, "send cancelled");
            SendResult::Cancelled
        }
        result = request => match result {
            Ok(reply) => SendResult::Replied(reply),
            Err(e) => {
                tracing::warn!(message_id = %ticket.message_id, "send failed: {}", e);
                SendResult::Failed(e)
            }
        }
    }
}
