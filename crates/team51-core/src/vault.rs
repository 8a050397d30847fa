//! Credential vault abstraction.

use async_trait::async_trait;
use serde::{Deserialize, Serialize};

use crate::Result;

/// A login credential stored in a vault.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct LoginItem {
    /// Vault-assigned identifier, `None` until stored.
    pub id: Option<String>,
    pub title: String,
    pub username: String,
    pub password: String,
    pub urls: Vec<String>,
    pub notes: Option<String>,
}

impl LoginItem {
    pub fn new(title: impl Into<String>, username: impl Into<String>, password: impl Into<String>) -> Self {
        Self {
            id: None,
            title: title.into(),
            username: username.into(),
            password: password.into(),
            urls: Vec::new(),
            notes: None,
        }
    }

    pub fn with_url(mut self, url: impl Into<String>) -> Self {
        self.urls.push(url.into());
        self
    }

    pub fn with_notes(mut self, notes: impl Into<String>) -> Self {
        self.notes = Some(notes.into());
        self
    }
}

/// Trait for credential vault backends.
#[async_trait]
pub trait CredentialVault: Send + Sync {
    /// Find a login by exact title.
    async fn find_login(&self, title: &str) -> Result<Option<LoginItem>>;

    /// Create the login, or update the password (and username) of the
    /// existing login with the same title. Returns the stored item.
    async fn upsert_login(&self, item: LoginItem) -> Result<LoginItem>;

    /// List login titles.
    async fn list_logins(&self) -> Result<Vec<String>>;
}
