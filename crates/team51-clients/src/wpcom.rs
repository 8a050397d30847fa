//! WordPress.com REST API client, including the Jetpack site-connection proxy.

use reqwest::RequestBuilder;
use serde::{Deserialize, Serialize};
use serde_json::{Map, Value, json};
use std::time::Duration;
use team51_core::SiteRef;
use tracing::{debug, info};

use crate::http::{USER_AGENT, send_json};
use crate::poll::poll_until;
use crate::{ClientError, ClientResult};

pub const WPCOM_API_URL: &str = "https://public-api.wordpress.com/rest/v1.1/";

const SITE_FIELDS: &str = "ID,name,URL,is_private,is_coming_soon,jetpack,is_wpcom_atomic,options";

/// Prefix a relative REST path with the WordPress.com API base URL.
///
/// Works the same whether the path addresses a site by numeric ID
/// (`sites/123/plugins`) or by domain (`sites/example.com/plugins`).
pub fn get_request_url(path: &str) -> String {
    format!("{}{}", WPCOM_API_URL, path.trim_start_matches('/'))
}

/// Relative path of a per-site endpoint.
pub fn site_path(site: &SiteRef, path: &str) -> String {
    let path = path.trim_start_matches('/');
    if path.is_empty() {
        format!("sites/{}", site)
    } else {
        format!("sites/{}/{}", site, path)
    }
}

/// WordPress.com API client.
pub struct WpcomClient {
    client: reqwest::Client,
    access_token: String,
    base_url: String,
}

impl WpcomClient {
    pub fn new(access_token: impl Into<String>) -> Self {
        Self::with_base_url(access_token, WPCOM_API_URL)
    }

    pub fn with_base_url(access_token: impl Into<String>, base_url: impl Into<String>) -> Self {
        let mut base_url = base_url.into();
        if !base_url.ends_with('/') {
            base_url.push('/');
        }
        Self {
            client: reqwest::Client::new(),
            access_token: access_token.into(),
            base_url,
        }
    }

    fn request(&self, method: reqwest::Method, path: &str) -> RequestBuilder {
        debug!(%method, path, "WPCOM request");
        self.client
            .request(method, format!("{}{}", self.base_url, path.trim_start_matches('/')))
            .bearer_auth(&self.access_token)
            .header("User-Agent", USER_AGENT)
    }

    /// List every site the token's user belongs to.
    pub async fn list_sites(&self) -> ClientResult<Vec<WpcomSite>> {
        let path = format!(
            "me/sites?fields={}&site_visibility=all&include_domain_only=false",
            SITE_FIELDS
        );
        let response: SitesResponse =
            send_json(self.request(reqwest::Method::GET, &path), "list sites").await?;
        Ok(response.sites)
    }

    pub async fn get_site(&self, site: &SiteRef) -> ClientResult<WpcomSite> {
        let path = format!("{}?fields={}", site_path(site, ""), SITE_FIELDS);
        send_json(self.request(reqwest::Method::GET, &path), "get site").await
    }

    /// Find a site user by email.
    pub async fn find_site_user(&self, site: &SiteRef, email: &str) -> ClientResult<Option<WpcomUser>> {
        let path = format!(
            "{}?search={}&search_columns=user_email",
            site_path(site, "users"),
            urlencoding::encode(email)
        );
        let response: UsersResponse =
            send_json(self.request(reqwest::Method::GET, &path), "search site users").await?;
        Ok(response
            .users
            .into_iter()
            .find(|u| u.email.as_deref().is_some_and(|e| e.eq_ignore_ascii_case(email))))
    }

    pub async fn remove_site_user(&self, site: &SiteRef, user_id: u64) -> ClientResult<()> {
        info!(%site, user = user_id, "Removing WordPress.com user");
        let path = site_path(site, &format!("users/{}/delete", user_id));
        let response: SuccessResponse =
            send_json(self.request(reqwest::Method::POST, &path), "remove site user").await?;
        if response.success {
            Ok(())
        } else {
            Err(ClientError::Api {
                status: 200,
                message: format!("removing user {} from {} was not successful", user_id, site),
            })
        }
    }

    pub async fn list_stickers(&self, site: &SiteRef) -> ClientResult<Vec<String>> {
        send_json(
            self.request(reqwest::Method::GET, &site_path(site, "blog-stickers")),
            "list stickers",
        )
        .await
    }

    pub async fn add_sticker(&self, site: &SiteRef, sticker: &str) -> ClientResult<bool> {
        info!(%site, sticker, "Adding sticker");
        let path = site_path(site, &format!("blog-stickers/add/{}", urlencoding::encode(sticker)));
        send_json(self.request(reqwest::Method::POST, &path), "add sticker").await
    }

    pub async fn remove_sticker(&self, site: &SiteRef, sticker: &str) -> ClientResult<bool> {
        info!(%site, sticker, "Removing sticker");
        let path = site_path(site, &format!("blog-stickers/remove/{}", urlencoding::encode(sticker)));
        send_json(self.request(reqwest::Method::POST, &path), "remove sticker").await
    }

    pub async fn list_plugins(&self, site: &SiteRef) -> ClientResult<Vec<WpcomPlugin>> {
        let response: PluginsResponse = send_json(
            self.request(reqwest::Method::GET, &site_path(site, "plugins")),
            "list plugins",
        )
        .await?;
        Ok(response.plugins)
    }

    /// Status of the site's latest Atomic transfer.
    pub async fn transfer_status(&self, site: &SiteRef) -> ClientResult<TransferStatus> {
        send_json(
            self.request(
                reqwest::Method::GET,
                &site_path(site, "automated-transfers/status"),
            ),
            "get transfer status",
        )
        .await
    }

    /// Poll the Atomic transfer until it completes. A transfer reported as
    /// failed ends polling with an error.
    pub async fn wait_for_transfer(
        &self,
        site: &SiteRef,
        interval: Duration,
        ceiling: Option<Duration>,
    ) -> ClientResult<TransferStatus> {
        poll_until(interval, ceiling, &format!("Atomic transfer of {}", site), move || async move {
            let status = self.transfer_status(site).await?;
            debug!(%site, status = %status.status, "Transfer status");
            if status.is_failed() {
                return Err(ClientError::Api {
                    status: 200,
                    message: format!("transfer of {} failed: {}", site, status.status),
                });
            }
            Ok(status.is_complete().then_some(status))
        })
        .await
    }

    /// Activate or deactivate a Jetpack module through the connection proxy.
    pub async fn set_jetpack_module(&self, site: &SiteRef, module: &str, active: bool) -> ClientResult<JetpackModule> {
        info!(%site, module, active, "Updating Jetpack module");
        let path = site_path(site, &format!("jetpack/modules/{}", urlencoding::encode(module)));
        send_json(
            self.request(reqwest::Method::POST, &path)
                .json(&json!({ "active": active })),
            "update Jetpack module",
        )
        .await
    }
}

/// WordPress.com site object. Fields the CLI does not read are kept in
/// `extra` so the full object can be inspected.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct WpcomSite {
    #[serde(rename = "ID")]
    pub id: u64,
    #[serde(default)]
    pub name: String,
    #[serde(rename = "URL")]
    pub url: String,
    #[serde(default)]
    pub is_private: bool,
    #[serde(default)]
    pub jetpack: bool,
    #[serde(default)]
    pub is_wpcom_atomic: bool,
    #[serde(flatten)]
    pub extra: Map<String, Value>,
}

impl WpcomSite {
    pub fn site_ref(&self) -> SiteRef {
        SiteRef::Id(self.id)
    }

    /// The site as the JSON object the API returned.
    pub fn as_value(&self) -> Value {
        serde_json::to_value(self).unwrap_or(Value::Null)
    }

    pub fn domain(&self) -> String {
        SiteRef::parse(&self.url)
            .map(|s| s.to_string())
            .unwrap_or_else(|_| self.url.clone())
    }
}

#[derive(Debug, Deserialize)]
struct SitesResponse {
    sites: Vec<WpcomSite>,
}

#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct WpcomUser {
    #[serde(rename = "ID")]
    pub id: u64,
    pub login: String,
    pub email: Option<String>,
    #[serde(default)]
    pub roles: Vec<String>,
}

#[derive(Debug, Deserialize)]
struct UsersResponse {
    #[serde(default)]
    users: Vec<WpcomUser>,
}

#[derive(Debug, Deserialize)]
struct SuccessResponse {
    #[serde(default)]
    success: bool,
}

#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct WpcomPlugin {
    pub slug: String,
    pub name: String,
    pub version: Option<String>,
    #[serde(default)]
    pub active: bool,
    #[serde(default)]
    pub autoupdate: bool,
}

#[derive(Debug, Deserialize)]
struct PluginsResponse {
    #[serde(default)]
    plugins: Vec<WpcomPlugin>,
}

#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct TransferStatus {
    pub status: String,
    pub transfer_id: Option<u64>,
}

impl TransferStatus {
    pub fn is_complete(&self) -> bool {
        matches!(self.status.as_str(), "complete" | "completed")
    }

    pub fn is_failed(&self) -> bool {
        matches!(self.status.as_str(), "failure" | "error" | "reverted")
    }
}

#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct JetpackModule {
    #[serde(default)]
    pub module: Option<String>,
    #[serde(default)]
    pub active: bool,
}
