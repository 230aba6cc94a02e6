use async_trait::async_trait;
use reqwest::{Client, RequestBuilder, Response, StatusCode};
use serde::de::DeserializeOwned;
use url::Url;

use super::models::*;
use super::traits::AssistantApi;
use super::types::{ApiError, ChatReply, LoginReply, RegisterReply};
use crate::models::{Conversation, ConversationDetail, Credential};

const HISTORIES: &str = "chat-histories";

/// `AssistantApi` over HTTP. The credential is fixed at construction; build
/// a new client after logging in.
#[derive(Debug, Clone)]
pub struct HttpAssistantApi {
    client: Client,
    base_url: Url,
    credential: Option<Credential>,
}

impl HttpAssistantApi {
    pub fn new(base_url: &str) -> Result<Self, ApiError> {
        let base_url = Url::parse(base_url.trim())
            .map_err(|e| ApiError::Network(format!("Invalid API URL {}: {}", base_url, e)))?;
        if !matches!(base_url.scheme(), "http" | "https") {
            return Err(ApiError::Network(format!(
                "Unsupported API URL scheme: {}",
                base_url.scheme()
            )));
        }

        let client = Client::builder()
            .user_agent(concat!("aura/", env!("CARGO_PKG_VERSION")))
            .build()
            .map_err(|e| ApiError::Network(e.to_string()))?;

        Ok(Self {
            client,
            base_url,
            credential: None,
        })
    }

    pub fn with_credential(mut self, credential: Credential) -> Self {
        self.credential = Some(credential);
        self
    }

    pub fn base_url(&self) -> &Url {
        &self.base_url
    }

    fn endpoint(&self, segments: &[&str]) -> Result<Url, ApiError> {
        let mut url = self.base_url.clone();
        url.path_segments_mut()
            .map_err(|_| ApiError::Network(format!("Invalid API URL: {}", self.base_url)))?
            .pop_if_empty()
            .extend(segments);
        Ok(url)
    }

    fn authorized(&self, req: RequestBuilder) -> Result<RequestBuilder, ApiError> {
        let credential = self
            .credential
            .as_ref()
            .ok_or_else(|| ApiError::Unauthorized("Not signed in".to_string()))?;
        Ok(req.bearer_auth(&credential.token))
    }

    /// Send `req` and map a failure status. `conversation` names the
    /// conversation the request addresses; only then is a 404 `NotFound`.
    async fn execute(
        req: RequestBuilder,
        conversation: Option<&str>,
    ) -> Result<Response, ApiError> {
        let response = req
            .send()
            .await
            .map_err(|e| ApiError::Network(e.to_string()))?;

        let status = response.status();
        if status.is_success() {
            return Ok(response);
        }

        let body = response.text().await.unwrap_or_default();
        let message = Self::parse_error_message(status, &body);
        tracing::debug!(
            status = status.as_u16(),
            conversation_id = ?conversation,
            "request failed: {}",
            message
        );

        Err(match (status, conversation) {
            (StatusCode::UNAUTHORIZED | StatusCode::FORBIDDEN, _) => ApiError::Unauthorized(message),
            (StatusCode::NOT_FOUND, Some(id)) => ApiError::NotFound(id.to_string()),
            (s, _) if s.is_server_error() => {
                ApiError::Network(format!("HTTP {}: {}", s.as_u16(), message))
            }
            (s, _) => ApiError::Rejected {
                status: s.as_u16(),
                message,
            },
        })
    }

    async fn decode<T: DeserializeOwned>(response: Response) -> Result<T, ApiError> {
        response
            .json::<T>()
            .await
            .map_err(|e| ApiError::InvalidResponse(e.to_string()))
    }

    fn parse_error_message(status: StatusCode, body: &str) -> String {
        serde_json::from_str::<ErrorResponse>(body)
            .ok()
            .and_then(ErrorResponse::into_message)
            .unwrap_or_else(|| {
                status
                    .canonical_reason()
                    .unwrap_or("Request failed")
                    .to_string()
            })
    }
}

#[async_trait]
impl AssistantApi for HttpAssistantApi {
    async fn login(&self, email: &str, password: &str) -> Result<LoginReply, ApiError> {
        let url = self.endpoint(&["login"])?;
        tracing::debug!(%url, "logging in");

        let req = self.client.post(url).json(&LoginRequest { email, password });
        let response = Self::execute(req, None).await?;
        let body: AuthResponse = Self::decode(response).await?;

        let token = body
            .token
            .filter(|t| !t.is_empty())
            .ok_or_else(|| ApiError::InvalidResponse("Login response has no token".to_string()))?;

        Ok(LoginReply {
            token,
            username: body.user,
            message: body.message,
        })
    }

    async fn register(
        &self,
        username: &str,
        email: &str,
        password: &str,
    ) -> Result<RegisterReply, ApiError> {
        let url = self.endpoint(&["register"])?;
        tracing::debug!(%url, "registering");

        let req = self.client.post(url).json(&RegisterRequest {
            username,
            email,
            password,
        });
        let response = Self::execute(req, None).await?;
        let body: AuthResponse = Self::decode(response).await?;

        Ok(RegisterReply {
            message: body.message,
            token: body.token.filter(|t| !t.is_empty()),
        })
    }

    async fn list_conversations(&self) -> Result<Vec<Conversation>, ApiError> {
        let url = self.endpoint(&[HISTORIES])?;
        let req = self.authorized(self.client.get(url))?;
        let response = Self::execute(req, None).await?;
        let items: Vec<WireConversation> = Self::decode(response).await?;
        Ok(items
            .into_iter()
            .map(WireConversation::into_conversation)
            .collect())
    }

    async fn get_conversation(&self, id: &str) -> Result<ConversationDetail, ApiError> {
        let url = self.endpoint(&[HISTORIES, id])?;
        let req = self.authorized(self.client.get(url))?;
        let response = Self::execute(req, Some(id)).await?;
        let wire: WireConversation = Self::decode(response).await?;
        wire.into_detail()
    }

    async fn create_conversation(&self, title: &str) -> Result<Conversation, ApiError> {
        let url = self.endpoint(&[HISTORIES])?;
        let req = self.authorized(self.client.post(url).json(&TitleRequest { title }))?;
        let response = Self::execute(req, None).await?;
        let wire: WireConversation = Self::decode(response).await?;
        Ok(wire.into_conversation())
    }

    async fn rename_conversation(&self, id: &str, title: &str) -> Result<(), ApiError> {
        let url = self.endpoint(&[HISTORIES, id])?;
        let req = self.authorized(self.client.put(url).json(&TitleRequest { title }))?;
        Self::execute(req, Some(id)).await?;
        Ok(())
    }

    async fn delete_conversation(&self, id: &str) -> Result<(), ApiError> {
        let url = self.endpoint(&[HISTORIES, id])?;
        let req = self.authorized(self.client.delete(url))?;
        Self::execute(req, Some(id)).await?;
        Ok(())
    }

    async fn send_chat(
        &self,
        message: &str,
        chat_id: Option<&str>,
    ) -> Result<ChatReply, ApiError> {
        let url = self.endpoint(&["chat"])?;
        let req = self.authorized(self.client.post(url).json(&ChatRequest { message, chat_id }))?;
        let response = Self::execute(req, chat_id).await?;
        let body: ChatResponse = Self::decode(response).await?;
        Ok(ChatReply {
            chat_id: body.chat_id.into_string(),
            response: body.response,
        })
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_endpoint_keeps_base_path() {
        let api = HttpAssistantApi::new("http://localhost:5000/api/").unwrap();
        let url = api.endpoint(&[HISTORIES, "42"]).unwrap();
        assert_eq!(url.as_str(), "http://localhost:5000/api/chat-histories/42");

        let api = HttpAssistantApi::new("http://localhost:5000").unwrap();
        let url = api.endpoint(&["login"]).unwrap();
        assert_eq!(url.as_str(), "http://localhost:5000/login");
    }

    #[test]
    fn test_endpoint_escapes_ids() {
        let api = HttpAssistantApi::new("http://localhost:5000").unwrap();
        let url = api.endpoint(&[HISTORIES, "a/b"]).unwrap();
        assert_eq!(url.as_str(), "http://localhost:5000/chat-histories/a%2Fb");
    }

    #[test]
    fn test_rejects_non_http_urls() {
        assert!(HttpAssistantApi::new("ftp://example.com").is_err());
        assert!(HttpAssistantApi::new("not a url").is_err());
    }

    #[tokio::test]
    async fn test_authenticated_call_without_credential() {
        let api = HttpAssistantApi::new("http://localhost:9").unwrap();
        let err = api.list_conversations().await.unwrap_err();
        assert!(matches!(err, ApiError::Unauthorized(_)));
    }

    #[test]
    fn test_parse_error_message() {
        let msg = HttpAssistantApi::parse_error_message(
            StatusCode::CONFLICT,
            r#"{"message": "User already exists"}"#,
        );
        assert_eq!(msg, "User already exists");

        let msg = HttpAssistantApi::parse_error_message(StatusCode::BAD_GATEWAY, "<html>");
        assert_eq!(msg, "Bad Gateway");
    }
}
