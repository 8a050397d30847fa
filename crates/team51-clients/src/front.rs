//! Front API client for inboxes and conversations.

use reqwest::RequestBuilder;
use serde::{Deserialize, Serialize};
use tracing::debug;

use crate::ClientResult;
use crate::http::{USER_AGENT, send_json};

pub const FRONT_API_URL: &str = "https://api2.frontapp.com";

/// Front API client.
pub struct FrontClient {
    client: reqwest::Client,
    access_token: String,
    base_url: String,
}

impl FrontClient {
    pub fn new(access_token: impl Into<String>) -> Self {
        Self::with_base_url(access_token, FRONT_API_URL)
    }

    pub fn with_base_url(access_token: impl Into<String>, base_url: impl Into<String>) -> Self {
        Self {
            client: reqwest::Client::new(),
            access_token: access_token.into(),
            base_url: base_url.into().trim_end_matches('/').to_string(),
        }
    }

    fn request(&self, url: &str) -> RequestBuilder {
        debug!(url, "Front request");
        self.client
            .get(url)
            .bearer_auth(&self.access_token)
            .header("User-Agent", USER_AGENT)
            .header("Accept", "application/json")
    }

    pub async fn list_inboxes(&self) -> ClientResult<Vec<Inbox>> {
        let page: Page<Inbox> = send_json(
            self.request(&format!("{}/inboxes", self.base_url)),
            "list inboxes",
        )
        .await?;
        Ok(page.results)
    }

    /// Every conversation in an inbox, following `_pagination.next`.
    pub async fn list_conversations(&self, inbox_id: &str) -> ClientResult<Vec<Conversation>> {
        let mut url = Some(format!(
            "{}/inboxes/{}/conversations?limit=100",
            self.base_url, inbox_id
        ));
        let mut conversations = Vec::new();

        while let Some(next) = url.take() {
            let page: Page<Conversation> = send_json(self.request(&next), "list conversations").await?;
            conversations.extend(page.results);
            url = page.pagination.and_then(|p| p.next);
        }

        Ok(conversations)
    }
}

#[derive(Debug, Deserialize)]
struct Page<T> {
    #[serde(rename = "_results")]
    results: Vec<T>,
    #[serde(rename = "_pagination")]
    pagination: Option<Pagination>,
}

#[derive(Debug, Deserialize)]
struct Pagination {
    next: Option<String>,
}

#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct Inbox {
    pub id: String,
    pub name: String,
    #[serde(default)]
    pub is_private: bool,
}

#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct Conversation {
    pub id: String,
    #[serde(default)]
    pub subject: String,
    pub status: String,
    /// Unix timestamp (seconds, fractional).
    pub created_at: f64,
    pub assignee: Option<Teammate>,
    pub recipient: Option<Recipient>,
}

impl Conversation {
    pub fn assignee_email(&self) -> &str {
        self.assignee.as_ref().map(|a| a.email.as_str()).unwrap_or_default()
    }

    pub fn recipient_handle(&self) -> &str {
        self.recipient.as_ref().map(|r| r.handle.as_str()).unwrap_or_default()
    }
}

#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct Teammate {
    pub email: String,
}

#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct Recipient {
    pub handle: String,
}
