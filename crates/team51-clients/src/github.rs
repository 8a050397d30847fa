//! GitHub API client for repository, branch and Actions secret operations.

use base64::Engine;
use base64::engine::general_purpose::STANDARD;
use reqwest::RequestBuilder;
use serde::{Deserialize, Serialize};
use serde_json::json;
use tracing::{debug, info, warn};

use crate::http::{USER_AGENT, send_empty, send_json, send_json_optional};
use crate::{ClientError, ClientResult};

pub const GITHUB_API_URL: &str = "https://api.github.com";

const PER_PAGE: usize = 100;

/// GitHub API client.
pub struct GitHubClient {
    client: reqwest::Client,
    access_token: String,
    base_url: String,
}

impl GitHubClient {
    pub fn new(access_token: impl Into<String>) -> Self {
        Self::with_base_url(access_token, GITHUB_API_URL)
    }

    pub fn with_base_url(access_token: impl Into<String>, base_url: impl Into<String>) -> Self {
        Self {
            client: reqwest::Client::new(),
            access_token: access_token.into(),
            base_url: base_url.into().trim_end_matches('/').to_string(),
        }
    }

    fn request(&self, method: reqwest::Method, path: &str) -> RequestBuilder {
        debug!(%method, path, "GitHub request");
        self.client
            .request(method, format!("{}{}", self.base_url, path))
            .header("Authorization", format!("Bearer {}", self.access_token))
            .header("User-Agent", USER_AGENT)
            .header("Accept", "application/vnd.github+json")
            .header("X-GitHub-Api-Version", "2022-11-28")
    }

    /// List every repository in an organization.
    pub async fn list_org_repos(&self, org: &str) -> ClientResult<Vec<GitHubRepo>> {
        let mut repos = Vec::new();
        let mut page = 1;

        loop {
            let path = format!(
                "/orgs/{}/repos?sort=full_name&per_page={}&page={}",
                org, PER_PAGE, page
            );
            let batch: Vec<GitHubRepo> =
                send_json(self.request(reqwest::Method::GET, &path), "list repositories").await?;
            let done = batch.len() < PER_PAGE;
            repos.extend(batch);
            if done {
                break;
            }
            page += 1;
        }

        Ok(repos)
    }

    /// Get a repository, `None` if it does not exist.
    pub async fn get_repo(&self, owner: &str, repo: &str) -> ClientResult<Option<GitHubRepo>> {
        let path = format!("/repos/{}/{}", owner, repo);
        send_json_optional(self.request(reqwest::Method::GET, &path), "get repository").await
    }

    /// Create an empty repository in an organization.
    pub async fn create_repo(&self, org: &str, repo: &NewRepo) -> ClientResult<GitHubRepo> {
        info!(org, name = %repo.name, "Creating repository");
        let path = format!("/orgs/{}/repos", org);
        let payload = json!({
            "name": repo.name,
            "description": repo.description,
            "private": repo.private,
            "auto_init": true,
        });
        send_json(
            self.request(reqwest::Method::POST, &path).json(&payload),
            "create repository",
        )
        .await
    }

    /// Create a repository from a template repository.
    pub async fn create_repo_from_template(
        &self,
        template_owner: &str,
        template_repo: &str,
        owner: &str,
        repo: &NewRepo,
    ) -> ClientResult<GitHubRepo> {
        info!(template = %format!("{}/{}", template_owner, template_repo), name = %repo.name, "Creating repository from template");
        let path = format!("/repos/{}/{}/generate", template_owner, template_repo);
        let payload = json!({
            "owner": owner,
            "name": repo.name,
            "description": repo.description,
            "private": repo.private,
            "include_all_branches": false,
        });
        send_json(
            self.request(reqwest::Method::POST, &path).json(&payload),
            "create repository from template",
        )
        .await
    }

    /// Get a branch, `None` if it does not exist.
    pub async fn get_branch(
        &self,
        owner: &str,
        repo: &str,
        branch: &str,
    ) -> ClientResult<Option<GitHubBranch>> {
        let path = format!(
            "/repos/{}/{}/branches/{}",
            owner,
            repo,
            urlencoding::encode(branch)
        );
        send_json_optional(self.request(reqwest::Method::GET, &path), "get branch").await
    }

    /// Create `branch` pointing at the head of `from`.
    pub async fn create_branch(
        &self,
        owner: &str,
        repo: &str,
        branch: &str,
        from: &str,
    ) -> ClientResult<GitRef> {
        let source = self
            .get_branch(owner, repo, from)
            .await?
            .ok_or_else(|| ClientError::NotFound(format!("branch {} in {}/{}", from, owner, repo)))?;
        self.create_ref(owner, repo, branch, from, &source.commit.sha).await
    }

    async fn create_ref(
        &self,
        owner: &str,
        repo: &str,
        branch: &str,
        from: &str,
        sha: &str,
    ) -> ClientResult<GitRef> {
        info!(repo = %format!("{}/{}", owner, repo), branch, from, "Creating branch");
        let path = format!("/repos/{}/{}/git/refs", owner, repo);
        let payload = json!({
            "ref": format!("refs/heads/{}", branch),
            "sha": sha,
        });
        send_json(
            self.request(reqwest::Method::POST, &path).json(&payload),
            "create branch",
        )
        .await
    }

    /// Make sure `branch` exists, creating it from `from` if it is missing.
    ///
    /// The repository's default branch is used when `from` is `None` or
    /// names a branch that does not exist.
    pub async fn ensure_branch(
        &self,
        owner: &str,
        repo: &str,
        branch: &str,
        from: Option<&str>,
    ) -> ClientResult<BranchStatus> {
        if self.get_branch(owner, repo, branch).await?.is_some() {
            return Ok(BranchStatus::Existing);
        }

        if let Some(from) = from {
            if let Some(source) = self.get_branch(owner, repo, from).await? {
                self.create_ref(owner, repo, branch, from, &source.commit.sha).await?;
                return Ok(BranchStatus::Created { from: from.to_string() });
            }
        }

        let default = self
            .get_repo(owner, repo)
            .await?
            .ok_or_else(|| ClientError::NotFound(format!("repository {}/{}", owner, repo)))?
            .default_branch;
        if let Some(from) = from {
            warn!(repo = %format!("{}/{}", owner, repo), missing = from, default = %default, "Source branch missing, using default branch");
        }

        self.create_branch(owner, repo, branch, &default).await?;
        Ok(BranchStatus::Created { from: default })
    }

    /// Get the public key used to encrypt Actions secrets.
    pub async fn actions_public_key(&self, owner: &str, repo: &str) -> ClientResult<PublicKey> {
        let path = format!("/repos/{}/{}/actions/secrets/public-key", owner, repo);
        send_json(self.request(reqwest::Method::GET, &path), "get Actions public key").await
    }

    /// Create or update an Actions secret.
    pub async fn set_actions_secret(
        &self,
        owner: &str,
        repo: &str,
        name: &str,
        value: &str,
    ) -> ClientResult<()> {
        let key = self.actions_public_key(owner, repo).await?;
        let encrypted_value = seal_secret(&key.key, value)?;

        info!(repo = %format!("{}/{}", owner, repo), secret = name, "Setting Actions secret");
        let path = format!("/repos/{}/{}/actions/secrets/{}", owner, repo, name);
        let payload = json!({
            "encrypted_value": encrypted_value,
            "key_id": key.key_id,
        });
        send_empty(
            self.request(reqwest::Method::PUT, &path).json(&payload),
            "set Actions secret",
        )
        .await
    }

    /// Run a GraphQL query and return its `data` object.
    pub async fn graphql<T: serde::de::DeserializeOwned>(
        &self,
        query: &str,
        variables: serde_json::Value,
    ) -> ClientResult<T> {
        let payload = json!({ "query": query, "variables": variables });
        let response: GraphQlResponse<T> = send_json(
            self.request(reqwest::Method::POST, "/graphql").json(&payload),
            "GraphQL query",
        )
        .await?;

        if let Some(errors) = response.errors.filter(|e| !e.is_empty()) {
            let messages: Vec<String> = errors.into_iter().map(|e| e.message).collect();
            return Err(ClientError::Api {
                status: 200,
                message: messages.join("; "),
            });
        }

        response
            .data
            .ok_or_else(|| ClientError::Parse("GraphQL response without data".to_string()))
    }

    /// Find an organization's repositories tagged with `topic`.
    pub async fn search_repos_by_topic(&self, org: &str, topic: &str) -> ClientResult<Vec<RepoNode>> {
        const QUERY: &str = r#"
            query($q: String!, $cursor: String) {
              search(query: $q, type: REPOSITORY, first: 100, after: $cursor) {
                pageInfo { hasNextPage endCursor }
                nodes {
                  ... on Repository {
                    name
                    url
                    isPrivate
                    defaultBranchRef { name }
                  }
                }
              }
            }"#;

        let q = format!("org:{} topic:{}", org, topic);
        let mut cursor: Option<String> = None;
        let mut repos = Vec::new();

        loop {
            let data: SearchData = self
                .graphql(QUERY, json!({ "q": q, "cursor": cursor }))
                .await?;
            repos.extend(data.search.nodes.into_iter().flatten());
            match data.search.page_info {
                PageInfo {
                    has_next_page: true,
                    end_cursor: Some(next),
                } => cursor = Some(next),
                _ => break,
            }
        }

        Ok(repos)
    }
}

/// Encrypt a secret value with a repository's base64 public key
/// (libsodium sealed box), returning base64 ciphertext.
pub fn seal_secret(public_key_b64: &str, value: &str) -> ClientResult<String> {
    let key_bytes = STANDARD
        .decode(public_key_b64)
        .map_err(|e| ClientError::Parse(format!("invalid public key: {}", e)))?;
    let key_bytes: [u8; 32] = key_bytes
        .try_into()
        .map_err(|_| ClientError::Parse("public key must be 32 bytes".to_string()))?;

    let public_key = crypto_box::PublicKey::from(key_bytes);
    let sealed = public_key
        .seal(&mut crypto_box::aead::OsRng, value.as_bytes())
        .map_err(|e| ClientError::Parse(format!("failed to encrypt secret: {}", e)))?;

    Ok(STANDARD.encode(sealed))
}

/// Repository to create.
#[derive(Debug, Clone)]
pub struct NewRepo {
    pub name: String,
    pub description: Option<String>,
    pub private: bool,
}

/// Result of [`GitHubClient::ensure_branch`].
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum BranchStatus {
    Existing,
    Created { from: String },
}

/// GitHub repository information.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct GitHubRepo {
    pub id: i64,
    pub name: String,
    pub full_name: String,
    pub owner: RepoOwner,
    pub private: bool,
    pub html_url: String,
    pub clone_url: String,
    pub ssh_url: Option<String>,
    pub default_branch: String,
    pub description: Option<String>,
    pub updated_at: Option<String>,
}

#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct RepoOwner {
    pub login: String,
    pub id: i64,
}

#[derive(Debug, Clone, Deserialize)]
pub struct GitHubBranch {
    pub name: String,
    pub commit: BranchCommit,
}

#[derive(Debug, Clone, Deserialize)]
pub struct BranchCommit {
    pub sha: String,
}

#[derive(Debug, Clone, Deserialize)]
pub struct GitRef {
    #[serde(rename = "ref")]
    pub ref_name: String,
}

#[derive(Debug, Clone, Deserialize)]
pub struct PublicKey {
    pub key_id: String,
    pub key: String,
}

#[derive(Debug, Deserialize)]
struct GraphQlResponse<T> {
    data: Option<T>,
    errors: Option<Vec<GraphQlError>>,
}

#[derive(Debug, Deserialize)]
struct GraphQlError {
    message: String,
}

#[derive(Debug, Deserialize)]
struct SearchData {
    search: SearchConnection,
}

#[derive(Debug, Deserialize)]
#[serde(rename_all = "camelCase")]
struct SearchConnection {
    page_info: PageInfo,
    nodes: Vec<Option<RepoNode>>,
}

#[derive(Debug, Deserialize)]
#[serde(rename_all = "camelCase")]
struct PageInfo {
    has_next_page: bool,
    end_cursor: Option<String>,
}

/// Repository as returned by the GraphQL search.
#[derive(Debug, Clone, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct RepoNode {
    pub name: String,
    pub url: String,
    pub is_private: bool,
    pub default_branch_ref: Option<BranchRef>,
}

#[derive(Debug, Clone, Deserialize)]
pub struct BranchRef {
    pub name: String,
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::testing::serve;
    use axum::extract::{Json, Path};
    use axum::http::StatusCode;
    use axum::routing::{get, post, put};
    use axum::{Router, response::IntoResponse};
    use serde_json::Value;
    use std::sync::{Arc, Mutex};

    fn repo_json(name: &str) -> Value {
        json!({
            "id": 1,
            "name": name,
            "full_name": format!("a8cteam51/{}", name),
            "owner": { "login": "a8cteam51", "id": 2 },
            "private": true,
            "html_url": format!("https://github.com/a8cteam51/{}", name),
            "clone_url": format!("https://github.com/a8cteam51/{}.git", name),
            "ssh_url": format!("git@github.com:a8cteam51/{}.git", name),
            "default_branch": "trunk",
            "description": null,
            "updated_at": "2026-10-01T00:00:00Z"
        })
    }

    #[tokio::test]
    async fn test_ensure_branch_creates_missing_branch_from_default() {
        let created = Arc::new(Mutex::new(Vec::<Value>::new()));
        let recorded = created.clone();

        let router = Router::new()
            .route("/repos/{owner}/{repo}", get(|| async { Json(repo_json("site")) }))
            .route(
                "/repos/{owner}/{repo}/branches/{branch}",
                get(|Path((_, _, branch)): Path<(String, String, String)>| async move {
                    if branch == "trunk" {
                        Json(json!({ "name": "trunk", "commit": { "sha": "abc123" } })).into_response()
                    } else {
                        (StatusCode::NOT_FOUND, "Branch not found").into_response()
                    }
                }),
            )
            .route(
                "/repos/{owner}/{repo}/git/refs",
                post(move |Json(body): Json<Value>| {
                    let recorded = recorded.clone();
                    async move {
                        let ref_name = body["ref"].as_str().unwrap_or_default().to_string();
                        recorded.lock().unwrap().push(body);
                        (StatusCode::CREATED, Json(json!({ "ref": ref_name })))
                    }
                }),
            );

        let base = serve(router).await;
        let client = GitHubClient::with_base_url("token", base);

        let status = client
            .ensure_branch("a8cteam51", "site", "develop", None)
            .await
            .unwrap();
        assert_eq!(status, BranchStatus::Created { from: "trunk".to_string() });

        let created = created.lock().unwrap();
        assert_eq!(created.len(), 1);
        assert_eq!(created[0]["ref"], "refs/heads/develop");
        assert_eq!(created[0]["sha"], "abc123");

        let status = client
            .ensure_branch("a8cteam51", "site", "trunk", None)
            .await
            .unwrap();
        assert_eq!(status, BranchStatus::Existing);
    }

    #[tokio::test]
    async fn test_ensure_branch_falls_back_to_default_when_source_missing() {
        let created = Arc::new(Mutex::new(Vec::<Value>::new()));
        let recorded = created.clone();

        let router = Router::new()
            .route(
                "/repos/{owner}/{repo}",
                get(|| async {
                    let mut repo = repo_json("site");
                    repo["default_branch"] = json!("main");
                    Json(repo)
                }),
            )
            .route(
                "/repos/{owner}/{repo}/branches/{branch}",
                get(|Path((_, _, branch)): Path<(String, String, String)>| async move {
                    if branch == "main" {
                        Json(json!({ "name": "main", "commit": { "sha": "def456" } })).into_response()
                    } else {
                        (StatusCode::NOT_FOUND, "Branch not found").into_response()
                    }
                }),
            )
            .route(
                "/repos/{owner}/{repo}/git/refs",
                post(move |Json(body): Json<Value>| {
                    let recorded = recorded.clone();
                    async move {
                        let ref_name = body["ref"].as_str().unwrap_or_default().to_string();
                        recorded.lock().unwrap().push(body);
                        (StatusCode::CREATED, Json(json!({ "ref": ref_name })))
                    }
                }),
            );

        let base = serve(router).await;
        let client = GitHubClient::with_base_url("token", base);

        let status = client
            .ensure_branch("a8cteam51", "site", "develop", Some("trunk"))
            .await
            .unwrap();
        assert_eq!(status, BranchStatus::Created { from: "main".to_string() });

        let created = created.lock().unwrap();
        assert_eq!(created.len(), 1);
        assert_eq!(created[0]["ref"], "refs/heads/develop");
        assert_eq!(created[0]["sha"], "def456");
    }

    #[tokio::test]
    async fn test_list_org_repos_paginates() {
        let router = Router::new().route(
            "/orgs/{org}/repos",
            get(|axum::extract::Query(q): axum::extract::Query<std::collections::HashMap<String, String>>| async move {
                let page: usize = q.get("page").and_then(|p| p.parse().ok()).unwrap_or(1);
                let count = if page == 1 { PER_PAGE } else { 3 };
                let repos: Vec<Value> = (0..count).map(|i| repo_json(&format!("r{}-{}", page, i))).collect();
                Json(Value::Array(repos))
            }),
        );

        let base = serve(router).await;
        let client = GitHubClient::with_base_url("token", base);
        let repos = client.list_org_repos("a8cteam51").await.unwrap();

        assert_eq!(repos.len(), PER_PAGE + 3);
        assert_eq!(repos.last().unwrap().name, "r2-2");
    }

    #[tokio::test]
    async fn test_get_repo_missing_is_none() {
        let router = Router::new().route(
            "/repos/{owner}/{repo}",
            get(|| async { (StatusCode::NOT_FOUND, "Not Found") }),
        );
        let base = serve(router).await;
        let client = GitHubClient::with_base_url("token", base);

        assert!(client.get_repo("a8cteam51", "missing").await.unwrap().is_none());
    }

    #[tokio::test]
    async fn test_set_actions_secret_encrypts_with_repo_key() {
        let secret_key = crypto_box::SecretKey::generate(&mut crypto_box::aead::OsRng);
        let public_b64 = STANDARD.encode(secret_key.public_key().as_bytes());
        let stored = Arc::new(Mutex::new(None::<Value>));
        let recorded = stored.clone();

        let router = Router::new()
            .route(
                "/repos/{owner}/{repo}/actions/secrets/public-key",
                get(move || {
                    let key = public_b64.clone();
                    async move { Json(json!({ "key_id": "kid-1", "key": key })) }
                }),
            )
            .route(
                "/repos/{owner}/{repo}/actions/secrets/{name}",
                put(move |Json(body): Json<Value>| {
                    let recorded = recorded.clone();
                    async move {
                        *recorded.lock().unwrap() = Some(body);
                        StatusCode::CREATED
                    }
                }),
            );

        let base = serve(router).await;
        let client = GitHubClient::with_base_url("token", base);
        client
            .set_actions_secret("a8cteam51", "site", "DEPLOY_KEY", "hunter2")
            .await
            .unwrap();

        let body = stored.lock().unwrap().clone().unwrap();
        assert_eq!(body["key_id"], "kid-1");
        let sealed = STANDARD
            .decode(body["encrypted_value"].as_str().unwrap())
            .unwrap();
        let opened = secret_key.unseal(&sealed).unwrap();
        assert_eq!(opened, b"hunter2");
    }

    #[test]
    fn test_seal_secret_rejects_bad_key() {
        assert!(seal_secret("not base64!", "x").is_err());
        assert!(seal_secret(&STANDARD.encode([0u8; 5]), "x").is_err());
    }

    #[tokio::test]
    async fn test_graphql_errors_are_reported() {
        let router = Router::new().route(
            "/graphql",
            post(|| async { Json(json!({ "data": null, "errors": [{ "message": "Bad query" }] })) }),
        );
        let base = serve(router).await;
        let client = GitHubClient::with_base_url("token", base);

        let err = client
            .search_repos_by_topic("a8cteam51", "pressable")
            .await
            .unwrap_err();
        assert!(err.to_string().contains("Bad query"));
    }

    #[tokio::test]
    async fn test_search_repos_by_topic_follows_cursor() {
        let router = Router::new().route(
            "/graphql",
            post(|Json(body): Json<Value>| async move {
                let first_page = body["variables"]["cursor"].is_null();
                let (name, has_next) = if first_page { ("one", true) } else { ("two", false) };
                Json(json!({
                    "data": {
                        "search": {
                            "pageInfo": { "hasNextPage": has_next, "endCursor": "c1" },
                            "nodes": [
                                { "name": name, "url": "https://github.com/x", "isPrivate": true,
                                  "defaultBranchRef": { "name": "trunk" } },
                                null
                            ]
                        }
                    }
                }))
            }),
        );
        let base = serve(router).await;
        let client = GitHubClient::with_base_url("token", base);

        let repos = client.search_repos_by_topic("a8cteam51", "pressable").await.unwrap();
        let names: Vec<&str> = repos.iter().map(|r| r.name.as_str()).collect();
        assert_eq!(names, vec!["one", "two"]);
    }
}
