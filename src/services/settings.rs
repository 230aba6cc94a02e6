use std::time::Duration;

use anyhow::Result;
use serde::{Deserialize, Serialize};

use super::database::Database;
use crate::config::{DEFAULT_API_URL, DEFAULT_REQUEST_TIMEOUT_SECS};

const SETTINGS_KEY: &str = "app_settings";

pub const ENV_API_URL: &str = "AURA_API_URL";
pub const ENV_REQUEST_TIMEOUT: &str = "AURA_REQUEST_TIMEOUT";

#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
#[serde(default)]
pub struct AppSettings {
    pub api_base_url: String,
    pub request_timeout_secs: u64,
    pub render_markdown: bool,
    pub confirm_delete: bool,
}

impl Default for AppSettings {
    fn default() -> Self {
        Self {
            api_base_url: DEFAULT_API_URL.to_string(),
            request_timeout_secs: DEFAULT_REQUEST_TIMEOUT_SECS,
            render_markdown: true,
            confirm_delete: true,
        }
    }
}

/// Values that take precedence over the stored settings for one run.
/// The front end fills these from flags first, then the environment.
#[derive(Debug, Clone, Default)]
pub struct SettingsOverrides {
    pub api_base_url: Option<String>,
    pub request_timeout_secs: Option<u64>,
}

impl SettingsOverrides {
    pub fn from_env() -> Self {
        Self {
            api_base_url: std::env::var(ENV_API_URL).ok(),
            request_timeout_secs: std::env::var(ENV_REQUEST_TIMEOUT).ok().and_then(|v| {
                v.trim()
                    .parse()
                    .map_err(|e| tracing::warn!("Ignoring {}={:?}: {}", ENV_REQUEST_TIMEOUT, v, e))
                    .ok()
            }),
        }
    }

    /// Fill unset values from `fallback`.
    pub fn or(self, fallback: SettingsOverrides) -> Self {
        Self {
            api_base_url: self.api_base_url.or(fallback.api_base_url),
            request_timeout_secs: self.request_timeout_secs.or(fallback.request_timeout_secs),
        }
    }
}

impl AppSettings {
    pub fn with_overrides(mut self, overrides: &SettingsOverrides) -> Self {
        if let Some(url) = overrides
            .api_base_url
            .as_deref()
            .map(str::trim)
            .filter(|u| !u.is_empty())
        {
            self.api_base_url = url.to_string();
        }
        if let Some(secs) = overrides.request_timeout_secs {
            self.request_timeout_secs = secs;
        }
        self
    }

    /// Zero is treated as the default rather than "expire immediately".
    pub fn request_timeout(&self) -> Duration {
        match self.request_timeout_secs {
            0 => Duration::from_secs(DEFAULT_REQUEST_TIMEOUT_SECS),
            secs => Duration::from_secs(secs),
        }
    }
}

pub struct SettingsService;

impl SettingsService {
    pub async fn load(db: &Database) -> AppSettings {
        match db.get_setting(SETTINGS_KEY).await {
            Ok(Some(json)) => serde_json::from_str(&json).unwrap_or_else(|e| {
                tracing::warn!("Ignoring unreadable settings: {}", e);
                AppSettings::default()
            }),
            Ok(None) => AppSettings::default(),
            Err(e) => {
                tracing::warn!("Failed to load settings: {}", e);
                AppSettings::default()
            }
        }
    }

    pub async fn save(db: &Database, settings: &AppSettings) -> Result<()> {
        let json = serde_json::to_string(settings)?;
        db.set_setting(SETTINGS_KEY, &json).await
    }
}
