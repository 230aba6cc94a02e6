use serde::{Deserialize, Serialize};

#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct Account {
    pub username: String,
    pub email: String,
}

/// Bearer credential issued by `POST /login`.
#[derive(Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct Credential {
    pub account: Account,
    pub token: String,
}

impl Credential {
    pub fn new(account: Account, token: impl Into<String>) -> Self {
        Self {
            account,
            token: token.into(),
        }
    }
}

impl std::fmt::Debug for Credential {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("Credential")
            .field("account", &self.account)
            .field("token", &"***")
            .finish()
    }
}
