//! Flickr REST client for looking up users and their public photos.

use serde::de::DeserializeOwned;
use serde::{Deserialize, Serialize};
use tracing::debug;

use crate::http::{USER_AGENT, send_json};
use crate::{ClientError, ClientResult};

pub const FLICKR_API_URL: &str = "https://api.flickr.com/services/rest/";

const PER_PAGE: u32 = 500;

/// Flickr API client keyed by an application API key.
pub struct FlickrClient {
    client: reqwest::Client,
    api_key: String,
    base_url: String,
}

impl FlickrClient {
    pub fn new(api_key: impl Into<String>) -> Self {
        Self::with_base_url(api_key, FLICKR_API_URL)
    }

    pub fn with_base_url(api_key: impl Into<String>, base_url: impl Into<String>) -> Self {
        Self {
            client: reqwest::Client::new(),
            api_key: api_key.into(),
            base_url: base_url.into(),
        }
    }

    /// Call a REST method. Flickr reports failures in the body with `stat: fail`.
    async fn call<T: DeserializeOwned>(&self, method: &str, params: &[(&str, String)]) -> ClientResult<T> {
        debug!(method, "Flickr request");
        let mut query: Vec<(&str, String)> = vec![
            ("method", method.to_string()),
            ("api_key", self.api_key.clone()),
            ("format", "json".to_string()),
            ("nojsoncallback", "1".to_string()),
        ];
        query.extend(params.iter().cloned());

        let value: serde_json::Value = send_json(
            self.client
                .get(&self.base_url)
                .header("User-Agent", USER_AGENT)
                .query(&query),
            method,
        )
        .await?;

        if value["stat"] != "ok" {
            let message = value["message"].as_str().unwrap_or("unknown error").to_string();
            // Code 1 is "not found" for the people.* methods.
            return Err(match value["code"].as_u64() {
                Some(1) => ClientError::NotFound(message),
                Some(100) => ClientError::Auth(message),
                _ => ClientError::Api { status: 200, message },
            });
        }

        serde_json::from_value(value).map_err(|e| ClientError::Parse(format!("{}: {}", method, e)))
    }

    /// Resolve a username to its NSID.
    pub async fn find_user(&self, username: &str) -> ClientResult<Option<FlickrUser>> {
        let params = [("username", username.to_string())];
        match self.call::<UserResponse>("flickr.people.findByUsername", &params).await {
            Ok(response) => Ok(Some(response.user)),
            Err(ClientError::NotFound(_)) => Ok(None),
            Err(e) => Err(e),
        }
    }

    /// Public photos of a user, walking pages until the last one or
    /// `max_pages`.
    pub async fn public_photos(&self, user_id: &str, max_pages: Option<u32>) -> ClientResult<Vec<PhotoSummary>> {
        let mut photos = Vec::new();
        let mut page = 1;

        loop {
            let params = [
                ("user_id", user_id.to_string()),
                ("per_page", PER_PAGE.to_string()),
                ("page", page.to_string()),
            ];
            let response: PhotosResponse = self.call("flickr.people.getPublicPhotos", &params).await?;
            let pages = response.photos.pages;
            photos.extend(response.photos.photo);

            if page >= pages || max_pages.is_some_and(|max| page >= max) {
                break;
            }
            page += 1;
        }

        Ok(photos)
    }
}

#[derive(Debug, Deserialize)]
struct UserResponse {
    user: FlickrUser,
}

#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct FlickrUser {
    pub id: String,
    pub nsid: String,
}

#[derive(Debug, Deserialize)]
struct PhotosResponse {
    photos: PhotoPage,
}

#[derive(Debug, Deserialize)]
struct PhotoPage {
    pages: u32,
    #[serde(default)]
    photo: Vec<PhotoSummary>,
}

#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct PhotoSummary {
    pub id: String,
    pub secret: String,
    pub server: String,
    #[serde(default)]
    pub title: String,
}

impl PhotoSummary {
    /// Large (1024px) static image URL.
    pub fn image_url(&self) -> String {
        format!(
            "https://live.staticflickr.com/{}/{}_{}_b.jpg",
            self.server, self.id, self.secret
        )
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::testing::serve;
    use axum::Router;
    use axum::extract::{Json, Query};
    use axum::routing::get;
    use serde_json::json;
    use std::collections::HashMap;

    async fn handler(Query(q): Query<HashMap<String, String>>) -> Json<serde_json::Value> {
        if q.get("api_key").map(String::as_str) != Some("key") {
            return Json(json!({ "stat": "fail", "code": 100, "message": "Invalid API Key" }));
        }
        match q.get("method").map(String::as_str) {
            Some("flickr.people.findByUsername") => match q.get("username").map(String::as_str) {
                Some("team51") => Json(json!({
                    "user": { "id": "123@N01", "nsid": "123@N01", "username": { "_content": "team51" } },
                    "stat": "ok"
                })),
                _ => Json(json!({ "stat": "fail", "code": 1, "message": "User not found" })),
            },
            Some("flickr.people.getPublicPhotos") => {
                let page: u32 = q.get("page").and_then(|p| p.parse().ok()).unwrap_or(1);
                Json(json!({
                    "photos": {
                        "page": page, "pages": 2, "perpage": 500, "total": 2,
                        "photo": [{ "id": format!("p{}", page), "secret": "s", "server": "65535",
                                    "farm": 66, "title": "Photo" }]
                    },
                    "stat": "ok"
                }))
            }
            _ => Json(json!({ "stat": "fail", "code": 112, "message": "Method not found" })),
        }
    }

    #[tokio::test]
    async fn test_find_user() {
        let base = serve(Router::new().route("/", get(handler))).await;
        let client = FlickrClient::with_base_url("key", format!("{}/", base));

        let user = client.find_user("team51").await.unwrap().unwrap();
        assert_eq!(user.nsid, "123@N01");
        assert!(client.find_user("nobody").await.unwrap().is_none());

        let bad = FlickrClient::with_base_url("wrong", format!("{}/", base));
        assert!(matches!(bad.find_user("team51").await, Err(ClientError::Auth(_))));
    }

    #[tokio::test]
    async fn test_public_photos_walks_pages() {
        let base = serve(Router::new().route("/", get(handler))).await;
        let client = FlickrClient::with_base_url("key", format!("{}/", base));

        let photos = client.public_photos("123@N01", None).await.unwrap();
        let ids: Vec<_> = photos.iter().map(|p| p.id.as_str()).collect();
        assert_eq!(ids, vec!["p1", "p2"]);
        assert_eq!(photos[0].image_url(), "https://live.staticflickr.com/65535/p1_s_b.jpg");

        let first = client.public_photos("123@N01", Some(1)).await.unwrap();
        assert_eq!(first.len(), 1);
    }
}
