//! Client errors.

use thiserror::Error;

#[derive(Debug, Error)]
pub enum ClientError {
    #[error("Request failed: {0}")]
    Request(String),

    #[error("Not found: {0}")]
    NotFound(String),

    #[error("API error ({status}): {message}")]
    Api { status: u16, message: String },

    #[error("Parse error: {0}")]
    Parse(String),

    #[error("Authentication failed: {0}")]
    Auth(String),

    #[error("Command failed: {0}")]
    Command(String),

    #[error("Timed out: {0}")]
    Timeout(String),

    #[error("IO error: {0}")]
    Io(#[from] std::io::Error),
}

pub type ClientResult<T> = std::result::Result<T, ClientError>;

impl From<ClientError> for team51_core::Error {
    fn from(err: ClientError) -> Self {
        match err {
            ClientError::NotFound(msg) => team51_core::Error::NotFound(msg),
            ClientError::Auth(msg) => team51_core::Error::Unauthorized(msg),
            ClientError::Timeout(msg) => team51_core::Error::Timeout(msg),
            ClientError::Command(msg) => team51_core::Error::ExternalTool(msg),
            ClientError::Io(e) => team51_core::Error::Io(e),
            other => team51_core::Error::Api(other.to_string()),
        }
    }
}
