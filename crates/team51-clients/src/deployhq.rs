//! DeployHQ API client for projects, servers and deployments.

use reqwest::RequestBuilder;
use serde::{Deserialize, Serialize};
use serde_json::json;
use tracing::{debug, info};

use crate::http::{USER_AGENT, send_json};
use crate::{ClientError, ClientResult};

/// DeployHQ API client.
pub struct DeployHqClient {
    client: reqwest::Client,
    username: String,
    api_key: String,
    base_url: String,
}

impl DeployHqClient {
    pub fn new(account: &str, username: impl Into<String>, api_key: impl Into<String>) -> Self {
        Self::with_base_url(format!("https://{}.deployhq.com", account), username, api_key)
    }

    pub fn with_base_url(
        base_url: impl Into<String>,
        username: impl Into<String>,
        api_key: impl Into<String>,
    ) -> Self {
        Self {
            client: reqwest::Client::new(),
            username: username.into(),
            api_key: api_key.into(),
            base_url: base_url.into().trim_end_matches('/').to_string(),
        }
    }

    fn request(&self, method: reqwest::Method, path: &str) -> RequestBuilder {
        debug!(%method, path, "DeployHQ request");
        self.client
            .request(method, format!("{}{}", self.base_url, path))
            .basic_auth(&self.username, Some(&self.api_key))
            .header("User-Agent", USER_AGENT)
            .header("Accept", "application/json")
    }

    pub async fn list_projects(&self) -> ClientResult<Vec<Project>> {
        send_json(self.request(reqwest::Method::GET, "/projects"), "list projects").await
    }

    /// Find a project by permalink or case-insensitive name.
    pub async fn find_project(&self, name_or_permalink: &str) -> ClientResult<Option<Project>> {
        Ok(self
            .list_projects()
            .await?
            .into_iter()
            .find(|p| p.permalink == name_or_permalink || p.name.eq_ignore_ascii_case(name_or_permalink)))
    }

    pub async fn create_project(&self, name: &str, zone_id: Option<u32>) -> ClientResult<Project> {
        info!(name, "Creating DeployHQ project");
        let mut project = json!({ "name": name });
        if let Some(zone_id) = zone_id {
            project["zone_id"] = json!(zone_id);
        }
        send_json(
            self.request(reqwest::Method::POST, "/projects")
                .json(&json!({ "project": project })),
            "create project",
        )
        .await
    }

    /// Point a project at a Git repository.
    pub async fn connect_repository(
        &self,
        project: &str,
        url: &str,
        branch: &str,
    ) -> ClientResult<Repository> {
        info!(project, url, branch, "Connecting repository");
        let path = format!("/projects/{}/repository", project);
        send_json(
            self.request(reqwest::Method::POST, &path).json(&json!({
                "repository": { "scm_type": "git", "url": url, "branch": branch }
            })),
            "connect repository",
        )
        .await
    }

    pub async fn list_servers(&self, project: &str) -> ClientResult<Vec<Server>> {
        let path = format!("/projects/{}/servers", project);
        send_json(self.request(reqwest::Method::GET, &path), "list servers").await
    }

    pub async fn add_server(&self, project: &str, server: &NewServer) -> ClientResult<Server> {
        info!(project, server = %server.name, host = %server.hostname, "Adding DeployHQ server");
        let path = format!("/projects/{}/servers", project);
        send_json(
            self.request(reqwest::Method::POST, &path)
                .json(&json!({ "server": server })),
            "add server",
        )
        .await
    }

    pub async fn update_server_password(
        &self,
        project: &str,
        server_identifier: &str,
        password: &str,
    ) -> ClientResult<Server> {
        info!(project, server = server_identifier, "Updating DeployHQ server password");
        let path = format!("/projects/{}/servers/{}", project, server_identifier);
        send_json(
            self.request(reqwest::Method::PUT, &path)
                .json(&json!({ "server": { "password": password } })),
            "update server",
        )
        .await
    }

    /// Latest commit on `branch` as DeployHQ sees it.
    pub async fn latest_revision(&self, project: &str, branch: &str) -> ClientResult<String> {
        let path = format!(
            "/projects/{}/repository/latest_revision?branch={}",
            project,
            urlencoding::encode(branch)
        );
        let revision: LatestRevision =
            send_json(self.request(reqwest::Method::GET, &path), "get latest revision").await?;
        let revision = revision.reference.trim();
        if revision.is_empty() {
            return Err(ClientError::NotFound(format!("revision for branch {}", branch)));
        }
        Ok(revision.to_string())
    }

    /// Queue a deployment of `end_revision` to a server.
    pub async fn deploy(
        &self,
        project: &str,
        server_identifier: &str,
        branch: &str,
        end_revision: &str,
    ) -> ClientResult<Deployment> {
        info!(project, server = server_identifier, branch, revision = end_revision, "Queueing deployment");
        let path = format!("/projects/{}/deployments", project);
        send_json(
            self.request(reqwest::Method::POST, &path).json(&json!({
                "deployment": {
                    "parent_identifier": server_identifier,
                    "start_revision": "",
                    "end_revision": end_revision,
                    "branch": branch,
                    "mode": "queue",
                    "copy_config_files": 1,
                    "email_notify": 0
                }
            })),
            "create deployment",
        )
        .await
    }
}

#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct Project {
    pub identifier: String,
    pub name: String,
    pub permalink: String,
    pub repository: Option<Repository>,
}

#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct Repository {
    pub url: Option<String>,
    pub branch: Option<String>,
}

#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct Server {
    pub identifier: String,
    pub name: String,
    pub protocol_type: Option<String>,
    pub hostname: Option<String>,
    pub username: Option<String>,
    pub server_path: Option<String>,
    pub branch: Option<String>,
}

/// Server to add to a project. DeployHQ connects over SSH/SFTP.
#[derive(Debug, Clone, Serialize)]
pub struct NewServer {
    pub name: String,
    pub protocol_type: String,
    pub hostname: String,
    pub port: u16,
    pub username: String,
    pub password: String,
    pub server_path: String,
    pub branch: String,
    pub auto_deploy: bool,
    pub environment: String,
}

impl NewServer {
    /// SFTP server for a Pressable site rooted at `wp-content`.
    pub fn sftp(
        name: impl Into<String>,
        hostname: impl Into<String>,
        username: impl Into<String>,
        password: impl Into<String>,
        branch: impl Into<String>,
        environment: impl Into<String>,
    ) -> Self {
        Self {
            name: name.into(),
            protocol_type: "ssh".to_string(),
            hostname: hostname.into(),
            port: 22,
            username: username.into(),
            password: password.into(),
            server_path: "wp-content".to_string(),
            branch: branch.into(),
            auto_deploy: true,
            environment: environment.into(),
        }
    }
}

#[derive(Debug, Deserialize)]
struct LatestRevision {
    #[serde(rename = "ref", default)]
    reference: String,
}

#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct Deployment {
    pub identifier: String,
    pub status: Option<String>,
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::testing::serve;
    use axum::Router;
    use axum::extract::{Json, Path};
    use axum::http::{HeaderMap, StatusCode};
    use axum::response::IntoResponse;
    use axum::routing::{get, post, put};
    use base64::Engine;
    use base64::engine::general_purpose::STANDARD;
    use serde_json::Value;
    use std::sync::{Arc, Mutex};

    fn projects() -> Value {
        json!([
            { "identifier": "p-1", "name": "Alpha Site", "permalink": "alpha-site",
              "repository": { "url": "git@github.com:a8cteam51/alpha.git", "branch": "trunk" } },
            { "identifier": "p-2", "name": "Beta", "permalink": "beta", "repository": null }
        ])
    }

    #[tokio::test]
    async fn test_basic_auth_and_find_project() {
        let expected = format!("Basic {}", STANDARD.encode("ops@example.com:key"));
        let router = Router::new().route(
            "/projects",
            get(move |headers: HeaderMap| {
                let expected = expected.clone();
                async move {
                    let auth = headers.get("authorization").and_then(|v| v.to_str().ok());
                    if auth == Some(expected.as_str()) {
                        Json(projects()).into_response()
                    } else {
                        StatusCode::UNAUTHORIZED.into_response()
                    }
                }
            }),
        );
        let base = serve(router).await;

        let client = DeployHqClient::with_base_url(base.clone(), "ops@example.com", "key");
        let project = client.find_project("alpha site").await.unwrap().unwrap();
        assert_eq!(project.permalink, "alpha-site");
        assert!(client.find_project("beta").await.unwrap().is_some());
        assert!(client.find_project("gamma").await.unwrap().is_none());

        let wrong = DeployHqClient::with_base_url(base, "ops@example.com", "nope");
        assert!(matches!(wrong.list_projects().await, Err(ClientError::Auth(_))));
    }

    #[tokio::test]
    async fn test_add_server_and_update_password() {
        let bodies = Arc::new(Mutex::new(Vec::<Value>::new()));
        let added = bodies.clone();
        let updated = bodies.clone();

        let router = Router::new()
            .route(
                "/projects/{project}/servers",
                post(move |Json(body): Json<Value>| {
                    let added = added.clone();
                    async move {
                        added.lock().unwrap().push(body.clone());
                        Json(json!({
                            "identifier": "s-1",
                            "name": body["server"]["name"],
                            "protocol_type": "ssh",
                            "hostname": body["server"]["hostname"],
                            "username": body["server"]["username"],
                            "server_path": "wp-content",
                            "branch": "trunk"
                        }))
                    }
                }),
            )
            .route(
                "/projects/{project}/servers/{server}",
                put(move |Path((_, server)): Path<(String, String)>, Json(body): Json<Value>| {
                    let updated = updated.clone();
                    async move {
                        updated.lock().unwrap().push(body);
                        Json(json!({ "identifier": server, "name": "Production" }))
                    }
                }),
            );
        let base = serve(router).await;
        let client = DeployHqClient::with_base_url(base, "ops@example.com", "key");

        let server = NewServer::sftp("Production", "sftp.pressable.com", "alpha-owner", "pw", "trunk", "production");
        let created = client.add_server("alpha-site", &server).await.unwrap();
        assert_eq!(created.identifier, "s-1");
        assert_eq!(created.username.as_deref(), Some("alpha-owner"));

        client.update_server_password("alpha-site", "s-1", "pw2").await.unwrap();

        let bodies = bodies.lock().unwrap();
        assert_eq!(bodies[0]["server"]["protocol_type"], "ssh");
        assert_eq!(bodies[0]["server"]["server_path"], "wp-content");
        assert_eq!(bodies[0]["server"]["port"], 22);
        assert_eq!(bodies[1]["server"]["password"], "pw2");
    }

    #[tokio::test]
    async fn test_latest_revision_and_deploy() {
        let router = Router::new()
            .route(
                "/projects/{project}/repository/latest_revision",
                get(|| async { Json(json!({ "ref": "abc123\n" })) }),
            )
            .route(
                "/projects/{project}/deployments",
                post(|Json(body): Json<Value>| async move {
                    assert_eq!(body["deployment"]["end_revision"], "abc123");
                    Json(json!({ "identifier": "d-1", "status": "pending" }))
                }),
            );
        let base = serve(router).await;
        let client = DeployHqClient::with_base_url(base, "ops@example.com", "key");

        let revision = client.latest_revision("alpha-site", "trunk").await.unwrap();
        assert_eq!(revision, "abc123");
        let deployment = client.deploy("alpha-site", "s-1", "trunk", &revision).await.unwrap();
        assert_eq!(deployment.status.as_deref(), Some("pending"));
    }
}
