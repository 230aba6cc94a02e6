use std::sync::{Arc, Mutex};

use anyhow::{anyhow, Context, Result};
use async_trait::async_trait;
use oo7::Keyring;

use super::database::Database;
use crate::config::{APP_ID, APP_NAME};
use crate::models::Credential;

const KEYRING_ATTR_APP: &str = "application";
const KEYRING_ATTR_REF: &str = "key-ref";

/// Where the signed-in credential lives between runs. One credential per
/// store; the store decides how it is scoped.
#[async_trait]
pub trait CredentialStore: Send + Sync {
    async fn load(&self) -> Result<Option<Credential>>;
    async fn save(&self, credential: &Credential) -> Result<()>;
    async fn clear(&self) -> Result<()>;
}

/// Secret Service backed store. Credentials are keyed by API URL so that
/// signing in to one server does not leak a token to another.
#[derive(Debug, Clone)]
pub struct KeyringService {
    keyring: Arc<Keyring>,
    key_ref: String,
}

impl KeyringService {
    pub async fn new(api_base_url: &str) -> Result<Self> {
        let keyring = Keyring::new()
            .await
            .context("Failed to initialize keyring")?;
        Ok(Self {
            keyring: Arc::new(keyring),
            key_ref: api_base_url.trim_end_matches('/').to_string(),
        })
    }

    fn attributes(&self) -> Vec<(&'static str, String)> {
        vec![
            (KEYRING_ATTR_APP, APP_ID.to_string()),
            (KEYRING_ATTR_REF, self.key_ref.clone()),
        ]
    }
}

#[async_trait]
impl CredentialStore for KeyringService {
    async fn load(&self) -> Result<Option<Credential>> {
        let attributes = self.attributes();
        let attr_refs: Vec<(&str, &str)> =
            attributes.iter().map(|(k, v)| (*k, v.as_str())).collect();

        let items = self
            .keyring
            .search_items(&attr_refs)
            .await
            .context("Failed to search keyring")?;

        let Some(item) = items.first() else {
            return Ok(None);
        };
        let secret = item.secret().await.context("Failed to read secret")?;
        let json = String::from_utf8(secret.to_vec()).context("Secret is not valid UTF-8")?;
        let credential =
            serde_json::from_str(&json).context("Stored credential is not readable")?;
        Ok(Some(credential))
    }

    async fn save(&self, credential: &Credential) -> Result<()> {
        let attributes = self.attributes();
        let attr_refs: Vec<(&str, &str)> =
            attributes.iter().map(|(k, v)| (*k, v.as_str())).collect();
        let secret = serde_json::to_string(credential)?;

        self.keyring
            .create_item(
                &format!("{} session - {}", APP_NAME, self.key_ref),
                &attr_refs,
                secret.as_str(),
                true, // replace if exists
            )
            .await
            .context("Failed to store credential in keyring")?;

        Ok(())
    }

    async fn clear(&self) -> Result<()> {
        let attributes = self.attributes();
        let attr_refs: Vec<(&str, &str)> =
            attributes.iter().map(|(k, v)| (*k, v.as_str())).collect();

        self.keyring
            .delete(&attr_refs)
            .await
            .context("Failed to delete credential from keyring")?;

        Ok(())
    }
}

/// Fallback for hosts without a Secret Service: the credential is kept in
/// the local settings database in plain text.
#[derive(Debug, Clone)]
pub struct SettingsCredentialStore {
    db: Database,
    key: String,
}

impl SettingsCredentialStore {
    pub fn new(db: Database, api_base_url: &str) -> Self {
        Self {
            db,
            key: format!("credential:{}", api_base_url.trim_end_matches('/')),
        }
    }
}

#[async_trait]
impl CredentialStore for SettingsCredentialStore {
    async fn load(&self) -> Result<Option<Credential>> {
        match self.db.get_setting(&self.key).await? {
            Some(json) => Ok(Some(
                serde_json::from_str(&json).context("Stored credential is not readable")?,
            )),
            None => Ok(None),
        }
    }

    async fn save(&self, credential: &Credential) -> Result<()> {
        let json = serde_json::to_string(credential)?;
        self.db.set_setting(&self.key, &json).await
    }

    async fn clear(&self) -> Result<()> {
        self.db.delete_setting(&self.key).await
    }
}

#[derive(Debug, Default)]
pub struct MemoryCredentialStore {
    credential: Mutex<Option<Credential>>,
}

impl MemoryCredentialStore {
    pub fn new() -> Self {
        Self::default()
    }

    fn slot(&self) -> Result<std::sync::MutexGuard<'_, Option<Credential>>> {
        self.credential
            .lock()
            .map_err(|_| anyhow!("Credential lock poisoned"))
    }
}

#[async_trait]
impl CredentialStore for MemoryCredentialStore {
    async fn load(&self) -> Result<Option<Credential>> {
        Ok(self.slot()?.clone())
    }

    async fn save(&self, credential: &Credential) -> Result<()> {
        *self.slot()? = Some(credential.clone());
        Ok(())
    }

    async fn clear(&self) -> Result<()> {
        *self.slot()? = None;
        Ok(())
    }
}
