use std::sync::Arc;

use anyhow::{bail, Result};

use super::keyring::CredentialStore;
use crate::api::AssistantApi;
use crate::models::{Account, Credential};

const MISSING_FIELDS: &str = "Please fill in all fields";

/// Sign-in flows. `api` is an unauthenticated client; the resulting
/// credential is written to `store` and handed to callers, who build an
/// authenticated client from it.
pub struct AuthService {
    api: Arc<dyn AssistantApi>,
    store: Arc<dyn CredentialStore>,
}

impl AuthService {
    pub fn new(api: Arc<dyn AssistantApi>, store: Arc<dyn CredentialStore>) -> Self {
        Self { api, store }
    }

    pub async fn login(&self, email: &str, password: &str) -> Result<Credential> {
        let email = email.trim();
        if email.is_empty() || password.is_empty() {
            bail!(MISSING_FIELDS);
        }

        let reply = self.api.login(email, password).await?;
        let account = Account {
            username: reply
                .username
                .filter(|u| !u.trim().is_empty())
                .unwrap_or_else(|| email.to_string()),
            email: email.to_string(),
        };
        let credential = Credential::new(account, reply.token);
        self.store.save(&credential).await?;

        tracing::info!(username = %credential.account.username, "signed in");
        Ok(credential)
    }

    /// Create an account and sign straight in. If the server does not issue
    /// a token on registration, a regular login follows.
    pub async fn register(&self, username: &str, email: &str, password: &str) -> Result<Credential> {
        let (username, email) = (username.trim(), email.trim());
        if username.is_empty() || email.is_empty() || password.is_empty() {
            bail!(MISSING_FIELDS);
        }

        let reply = self.api.register(username, email, password).await?;
        tracing::info!(username, "account registered");

        match reply.token {
            Some(token) => {
                let account = Account {
                    username: username.to_string(),
                    email: email.to_string(),
                };
                let credential = Credential::new(account, token);
                self.store.save(&credential).await?;
                Ok(credential)
            }
            None => self.login(email, password).await,
        }
    }

    pub async fn logout(&self) -> Result<()> {
        self.store.clear().await?;
        tracing::info!("signed out");
        Ok(())
    }

    pub async fn current_credential(&self) -> Result<Option<Credential>> {
        self.store.load().await
    }
}
