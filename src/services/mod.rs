pub mod auth;
pub mod chat;
pub mod conversation;
pub mod database;
pub mod export;
pub mod keyring;
pub mod markdown;
pub mod session;
pub mod settings;

pub use auth::AuthService;
pub use database::Database;
pub use keyring::{CredentialStore, KeyringService, MemoryCredentialStore, SettingsCredentialStore};
pub use session::{
    Confirmation, Dispatch, Phase, SessionCmd, SessionController, SessionError, SessionEvent,
    SessionMsg, SessionState,
};
pub use settings::{AppSettings, SettingsOverrides, SettingsService};
