//! Shared request handling for the JSON APIs.

use reqwest::{RequestBuilder, Response, StatusCode};
use serde::de::DeserializeOwned;
use tracing::debug;

use crate::{ClientError, ClientResult};

pub(crate) const USER_AGENT: &str = concat!("team51-cli/", env!("CARGO_PKG_VERSION"));

/// Send a request and map non-2xx statuses to errors.
///
/// `what` names the operation for error messages.
pub(crate) async fn send(request: RequestBuilder, what: &str) -> ClientResult<Response> {
    let response = request
        .send()
        .await
        .map_err(|e| ClientError::Request(format!("{}: {}", what, e)))?;

    let status = response.status();
    debug!(operation = what, status = status.as_u16(), "API response");

    if status == StatusCode::NOT_FOUND {
        let text = response.text().await.unwrap_or_default();
        return Err(ClientError::NotFound(format!("{}: {}", what, text)));
    }

    if status == StatusCode::UNAUTHORIZED || status == StatusCode::FORBIDDEN {
        let text = response.text().await.unwrap_or_default();
        return Err(ClientError::Auth(format!("{} ({}): {}", what, status, text)));
    }

    if !status.is_success() {
        let text = response.text().await.unwrap_or_default();
        return Err(ClientError::Api {
            status: status.as_u16(),
            message: format!("{} failed: {}", what, text),
        });
    }

    Ok(response)
}

/// Send a request and decode the JSON response body.
pub(crate) async fn send_json<T: DeserializeOwned>(request: RequestBuilder, what: &str) -> ClientResult<T> {
    send(request, what)
        .await?
        .json()
        .await
        .map_err(|e| ClientError::Parse(format!("{}: {}", what, e)))
}

/// Like [`send_json`] but a 404 yields `None`.
pub(crate) async fn send_json_optional<T: DeserializeOwned>(
    request: RequestBuilder,
    what: &str,
) -> ClientResult<Option<T>> {
    match send_json(request, what).await {
        Ok(value) => Ok(Some(value)),
        Err(ClientError::NotFound(_)) => Ok(None),
        Err(e) => Err(e),
    }
}

/// Send a request whose response body is ignored.
pub(crate) async fn send_empty(request: RequestBuilder, what: &str) -> ClientResult<()> {
    send(request, what).await.map(|_| ())
}
