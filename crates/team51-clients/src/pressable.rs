//! Pressable API client for sites, collaborators and SFTP users.

use reqwest::RequestBuilder;
use serde::de::DeserializeOwned;
use serde::{Deserialize, Serialize};
use serde_json::json;
use std::time::Duration;
use team51_core::SiteRef;
use tokio::sync::OnceCell;
use tracing::{debug, info};

use crate::http::{USER_AGENT, send_json};
use crate::poll::poll_until;
use crate::{ClientError, ClientResult};

pub const PRESSABLE_API_URL: &str = "https://my.pressable.com/v1";
pub const PRESSABLE_AUTH_URL: &str = "https://my.pressable.com/auth/token";

/// Roles granted to collaborators added by the CLI.
pub const DEFAULT_COLLABORATOR_ROLES: &[&str] = &[
    "clone_site",
    "sftp_access",
    "download_backups",
    "reset_collaborator_password",
    "manage_performance",
    "php_my_admin_access",
    "wp_access",
];

const PER_PAGE: usize = 100;

/// Pressable API client.
///
/// The OAuth token is requested on first use and reused for the client's
/// lifetime.
pub struct PressableClient {
    client: reqwest::Client,
    client_id: String,
    client_secret: String,
    base_url: String,
    auth_url: String,
    token: OnceCell<String>,
}

impl PressableClient {
    pub fn new(client_id: impl Into<String>, client_secret: impl Into<String>) -> Self {
        Self::with_urls(client_id, client_secret, PRESSABLE_API_URL, PRESSABLE_AUTH_URL)
    }

    pub fn with_urls(
        client_id: impl Into<String>,
        client_secret: impl Into<String>,
        base_url: impl Into<String>,
        auth_url: impl Into<String>,
    ) -> Self {
        Self {
            client: reqwest::Client::new(),
            client_id: client_id.into(),
            client_secret: client_secret.into(),
            base_url: base_url.into().trim_end_matches('/').to_string(),
            auth_url: auth_url.into(),
            token: OnceCell::new(),
        }
    }

    async fn access_token(&self) -> ClientResult<&str> {
        let token = self
            .token
            .get_or_try_init(|| async {
                debug!("Requesting Pressable access token");
                let params = [
                    ("grant_type", "client_credentials"),
                    ("client_id", self.client_id.as_str()),
                    ("client_secret", self.client_secret.as_str()),
                ];
                let response: TokenResponse = send_json(
                    self.client
                        .post(&self.auth_url)
                        .header("User-Agent", USER_AGENT)
                        .form(&params),
                    "Pressable token exchange",
                )
                .await
                .map_err(|e| ClientError::Auth(e.to_string()))?;

                if response.access_token.is_empty() {
                    return Err(ClientError::Auth("No access token in response".to_string()));
                }
                Ok(response.access_token)
            })
            .await?;
        Ok(token.as_str())
    }

    async fn request(&self, method: reqwest::Method, path: &str) -> ClientResult<RequestBuilder> {
        let token = self.access_token().await?;
        debug!(%method, path, "Pressable request");
        Ok(self
            .client
            .request(method, format!("{}{}", self.base_url, path))
            .bearer_auth(token)
            .header("User-Agent", USER_AGENT)
            .header("Accept", "application/json"))
    }

    /// Send a request and unwrap Pressable's `{ message, data, errors }` envelope.
    async fn call<T: DeserializeOwned>(&self, request: RequestBuilder, what: &str) -> ClientResult<T> {
        let envelope: Envelope<T> = send_json(request, what).await?;
        envelope.data.ok_or_else(|| ClientError::Api {
            status: 200,
            message: format!(
                "{} returned no data: {}",
                what,
                envelope.message.unwrap_or_default()
            ),
        })
    }

    /// List every site on the account.
    pub async fn list_sites(&self) -> ClientResult<Vec<PressableSite>> {
        let mut sites = Vec::new();
        let mut page = 1;

        loop {
            let path = format!("/sites?per_page={}&page={}", PER_PAGE, page);
            let batch: Vec<PressableSite> = self
                .call(self.request(reqwest::Method::GET, &path).await?, "list sites")
                .await?;
            let done = batch.len() < PER_PAGE;
            sites.extend(batch);
            if done {
                break;
            }
            page += 1;
        }

        Ok(sites)
    }

    pub async fn get_site(&self, id: u64) -> ClientResult<PressableSite> {
        let path = format!("/sites/{}", id);
        self.call(self.request(reqwest::Method::GET, &path).await?, "get site")
            .await
    }

    /// Resolve a site by ID, or by matching its URL or name against a domain.
    pub async fn find_site(&self, site: &SiteRef) -> ClientResult<PressableSite> {
        match site {
            SiteRef::Id(id) => self.get_site(*id).await,
            SiteRef::Domain(domain) => self
                .list_sites()
                .await?
                .into_iter()
                .find(|s| {
                    s.url.as_deref().is_some_and(|u| site.matches_url(u))
                        || s.name.eq_ignore_ascii_case(domain)
                })
                .ok_or_else(|| ClientError::NotFound(format!("Pressable site {}", domain))),
        }
    }

    pub async fn create_site(&self, site: &NewSite) -> ClientResult<PressableSite> {
        info!(name = %site.name, php = %site.php_version, datacenter = %site.datacenter_code, "Creating Pressable site");
        let request = self
            .request(reqwest::Method::POST, "/sites")
            .await?
            .json(site);
        self.call(request, "create site").await
    }

    /// Clone a site. Staging clones are used for development sites.
    pub async fn clone_site(&self, id: u64, name: &str, staging: bool) -> ClientResult<PressableSite> {
        info!(source = id, name, staging, "Cloning Pressable site");
        let path = format!("/sites/{}/clone", id);
        let request = self
            .request(reqwest::Method::POST, &path)
            .await?
            .json(&json!({ "name": name, "staging": staging }));
        self.call(request, "clone site").await
    }

    /// Poll until the site reports `state == "live"`.
    pub async fn wait_until_live(
        &self,
        id: u64,
        interval: Duration,
        ceiling: Option<Duration>,
    ) -> ClientResult<PressableSite> {
        poll_until(interval, ceiling, &format!("Pressable site {}", id), move || async move {
            let site = self.get_site(id).await?;
            debug!(site = id, state = ?site.state, "Site state");
            Ok(site.is_live().then_some(site))
        })
        .await
    }

    pub async fn list_collaborators(&self, site_id: u64) -> ClientResult<Vec<Collaborator>> {
        let path = format!("/sites/{}/collaborators", site_id);
        self.call(
            self.request(reqwest::Method::GET, &path).await?,
            "list collaborators",
        )
        .await
    }

    pub async fn add_collaborator(
        &self,
        site_id: u64,
        email: &str,
        roles: &[&str],
    ) -> ClientResult<Collaborator> {
        info!(site = site_id, email, "Adding collaborator");
        let path = format!("/sites/{}/collaborators", site_id);
        let request = self
            .request(reqwest::Method::POST, &path)
            .await?
            .json(&json!({ "email": email, "roles": roles }));
        self.call(request, "add collaborator").await
    }

    pub async fn remove_collaborator(&self, site_id: u64, collaborator_id: u64) -> ClientResult<()> {
        info!(site = site_id, collaborator = collaborator_id, "Removing collaborator");
        let path = format!("/sites/{}/collaborators/{}", site_id, collaborator_id);
        let _: serde_json::Value = send_json(
            self.request(reqwest::Method::DELETE, &path).await?,
            "remove collaborator",
        )
        .await?;
        Ok(())
    }

    pub async fn list_sftp_users(&self, site_id: u64) -> ClientResult<Vec<SftpUser>> {
        let path = format!("/sites/{}/ftp", site_id);
        self.call(self.request(reqwest::Method::GET, &path).await?, "list SFTP users")
            .await
    }

    /// Reset an SFTP user's password and return the new one.
    pub async fn reset_sftp_password(&self, site_id: u64, username: &str) -> ClientResult<String> {
        info!(site = site_id, username, "Resetting SFTP password");
        let path = format!(
            "/sites/{}/ftp/password/{}",
            site_id,
            urlencoding::encode(username)
        );
        let reset: PasswordReset = self
            .call(
                self.request(reqwest::Method::POST, &path).await?,
                "reset SFTP password",
            )
            .await?;
        Ok(reset.password)
    }

    pub async fn purge_cache(&self, site_id: u64) -> ClientResult<()> {
        info!(site = site_id, "Purging cache");
        let path = format!("/sites/{}/cache", site_id);
        let _: serde_json::Value = send_json(
            self.request(reqwest::Method::DELETE, &path).await?,
            "purge cache",
        )
        .await?;
        Ok(())
    }
}

/// The SFTP/SSH owner among a site's SFTP users: the user Pressable flags
/// as owner, else the user whose email matches `fallback_email`.
pub fn sftp_owner<'a>(users: &'a [SftpUser], fallback_email: Option<&str>) -> Option<&'a SftpUser> {
    users.iter().find(|u| u.owner).or_else(|| {
        let email = fallback_email?;
        users.iter().find(|u| {
            u.email
                .as_deref()
                .is_some_and(|e| e.eq_ignore_ascii_case(email))
        })
    })
}

#[derive(Debug, Deserialize)]
struct TokenResponse {
    access_token: String,
}

#[derive(Debug, Deserialize)]
struct Envelope<T> {
    message: Option<String>,
    data: Option<T>,
}

#[derive(Debug, Deserialize)]
struct PasswordReset {
    password: String,
}

/// Site to create.
#[derive(Debug, Clone, Serialize)]
pub struct NewSite {
    pub name: String,
    pub php_version: String,
    pub datacenter_code: String,
}

/// Pressable site information.
#[derive(Debug, Clone, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct PressableSite {
    pub id: u64,
    pub name: String,
    pub url: Option<String>,
    pub state: Option<String>,
    pub php_version: Option<String>,
    pub datacenter_code: Option<String>,
    #[serde(default)]
    pub staging: bool,
    pub created: Option<String>,
}

impl PressableSite {
    pub fn is_live(&self) -> bool {
        self.state.as_deref() == Some("live")
    }

    /// Best available domain for the site.
    pub fn domain(&self) -> String {
        self.url
            .as_deref()
            .map(|u| u.trim_start_matches("https://").trim_start_matches("http://").trim_end_matches('/'))
            .filter(|u| !u.is_empty())
            .map(str::to_string)
            .unwrap_or_else(|| format!("{}.mystagingwebsite.com", self.name))
    }
}

#[derive(Debug, Clone, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct Collaborator {
    pub id: u64,
    pub email: String,
    pub site_id: Option<u64>,
    #[serde(default)]
    pub roles: Vec<String>,
}

#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct SftpUser {
    pub id: Option<u64>,
    pub username: String,
    pub email: Option<String>,
    #[serde(default)]
    pub owner: bool,
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::testing::serve;
    use axum::extract::{Form, Json, Path};
    use axum::http::{HeaderMap, StatusCode};
    use axum::response::IntoResponse;
    use axum::routing::{get, post};
    use axum::Router;
    use serde_json::Value;
    use std::collections::HashMap;
    use std::sync::Arc;
    use std::sync::atomic::{AtomicU32, Ordering};

    fn site_json(id: u64, name: &str, state: &str) -> Value {
        json!({
            "id": id,
            "name": name,
            "url": format!("{}.mystagingwebsite.com", name),
            "state": state,
            "phpVersion": "8.2",
            "datacenterCode": "DFW",
            "staging": false,
            "created": "2026-10-01T00:00:00Z"
        })
    }

    fn authed(headers: &HeaderMap) -> bool {
        headers
            .get("authorization")
            .and_then(|v| v.to_str().ok())
            == Some("Bearer tok-1")
    }

    async fn client_for(router: Router, token_requests: Arc<AtomicU32>) -> PressableClient {
        let router = router.route(
            "/auth/token",
            post(move |Form(form): Form<HashMap<String, String>>| {
                let token_requests = token_requests.clone();
                async move {
                    token_requests.fetch_add(1, Ordering::SeqCst);
                    if form.get("client_secret").map(String::as_str) == Some("secret") {
                        Json(json!({ "access_token": "tok-1", "token_type": "Bearer" })).into_response()
                    } else {
                        (StatusCode::UNAUTHORIZED, "bad client").into_response()
                    }
                }
            }),
        );
        let base = serve(router).await;
        PressableClient::with_urls("id", "secret", format!("{}/v1", base), format!("{}/auth/token", base))
    }

    #[tokio::test]
    async fn test_token_is_fetched_once_and_sent() {
        let token_requests = Arc::new(AtomicU32::new(0));
        let router = Router::new().route(
            "/v1/sites/{id}",
            get(|headers: HeaderMap, Path(id): Path<u64>| async move {
                if !authed(&headers) {
                    return (StatusCode::UNAUTHORIZED, "no").into_response();
                }
                Json(json!({ "message": "Success", "data": site_json(id, "example", "live") })).into_response()
            }),
        );
        let client = client_for(router, token_requests.clone()).await;

        let site = client.get_site(7).await.unwrap();
        assert_eq!(site.id, 7);
        assert!(site.is_live());
        client.get_site(8).await.unwrap();

        assert_eq!(token_requests.load(Ordering::SeqCst), 1);
    }

    #[tokio::test]
    async fn test_bad_credentials_are_auth_errors() {
        let base = serve(Router::new().route(
            "/auth/token",
            post(|| async { (StatusCode::UNAUTHORIZED, "bad client") }),
        ))
        .await;
        let client = PressableClient::with_urls("id", "wrong", format!("{}/v1", base), format!("{}/auth/token", base));

        let err = client.get_site(1).await.unwrap_err();
        assert!(matches!(err, ClientError::Auth(_)));
    }

    #[tokio::test]
    async fn test_find_site_by_domain() {
        let router = Router::new().route(
            "/v1/sites",
            get(|| async {
                Json(json!({
                    "message": "Success",
                    "data": [site_json(1, "alpha", "live"), site_json(2, "beta", "live")]
                }))
            }),
        );
        let client = client_for(router, Arc::new(AtomicU32::new(0))).await;

        let site = client
            .find_site(&SiteRef::parse("https://beta.mystagingwebsite.com").unwrap())
            .await
            .unwrap();
        assert_eq!(site.id, 2);

        let err = client
            .find_site(&SiteRef::parse("gamma.example.com").unwrap())
            .await
            .unwrap_err();
        assert!(matches!(err, ClientError::NotFound(_)));
    }

    #[tokio::test]
    async fn test_envelope_without_data_is_an_error() {
        let router = Router::new().route(
            "/v1/sites/{id}/ftp",
            get(|| async { Json(json!({ "message": "Site is deploying", "data": null })) }),
        );
        let client = client_for(router, Arc::new(AtomicU32::new(0))).await;

        let err = client.list_sftp_users(3).await.unwrap_err();
        assert!(err.to_string().contains("Site is deploying"));
    }

    #[tokio::test]
    async fn test_reset_sftp_password() {
        let router = Router::new().route(
            "/v1/sites/{id}/ftp/password/{username}",
            post(|Path((id, username)): Path<(u64, String)>| async move {
                Json(json!({
                    "message": "Success",
                    "data": { "username": username, "password": format!("new-{}", id) }
                }))
            }),
        );
        let client = client_for(router, Arc::new(AtomicU32::new(0))).await;

        assert_eq!(client.reset_sftp_password(9, "site-owner").await.unwrap(), "new-9");
    }

    #[tokio::test(start_paused = true)]
    async fn test_wait_until_live_polls_state() {
        let polls = Arc::new(AtomicU32::new(0));
        let counter = polls.clone();
        let router = Router::new().route(
            "/v1/sites/{id}",
            get(move |Path(id): Path<u64>| {
                let counter = counter.clone();
                async move {
                    let n = counter.fetch_add(1, Ordering::SeqCst);
                    let state = if n < 2 { "deploying" } else { "live" };
                    Json(json!({ "message": "Success", "data": site_json(id, "clone", state) }))
                }
            }),
        );
        let client = client_for(router, Arc::new(AtomicU32::new(0))).await;

        let site = client
            .wait_until_live(5, Duration::from_millis(10), None)
            .await
            .unwrap();
        assert!(site.is_live());
        assert_eq!(polls.load(Ordering::SeqCst), 3);
    }

    fn sftp(username: &str, email: Option<&str>, owner: bool) -> SftpUser {
        SftpUser {
            id: None,
            username: username.to_string(),
            email: email.map(String::from),
            owner,
        }
    }

    #[test]
    fn test_sftp_owner_prefers_flagged_owner() {
        let users = vec![
            sftp("concierge", Some("concierge@example.com"), false),
            sftp("owner", Some("owner@example.com"), true),
        ];
        let owner = sftp_owner(&users, Some("concierge@example.com")).unwrap();
        assert_eq!(owner.username, "owner");
    }

    #[test]
    fn test_sftp_owner_falls_back_to_email() {
        let users = vec![
            sftp("dev", Some("dev@example.com"), false),
            sftp("concierge", Some("Concierge@Example.com"), false),
        ];
        let owner = sftp_owner(&users, Some("concierge@example.com")).unwrap();
        assert_eq!(owner.username, "concierge");

        assert!(sftp_owner(&users, None).is_none());
        assert!(sftp_owner(&users, Some("nobody@example.com")).is_none());
    }

    #[test]
    fn test_site_domain_fallback() {
        let mut site: PressableSite = serde_json::from_value(site_json(1, "alpha", "live")).unwrap();
        assert_eq!(site.domain(), "alpha.mystagingwebsite.com");
        site.url = Some("https://alpha.com/".to_string());
        assert_eq!(site.domain(), "alpha.com");
        site.url = None;
        assert_eq!(site.domain(), "alpha.mystagingwebsite.com");
    }
}
