//! Error types for fleet backend operations

use thiserror::Error;

/// Result type alias for backend client operations
pub type Result<T> = std::result::Result<T, ClientError>;

/// Errors raised while exchanging the access token for a bearer token
#[derive(Error, Debug)]
pub enum AuthError {
    /// Token login request could not be sent
    #[error("token login request failed: {0}")]
    Http(#[from] reqwest::Error),

    /// Backend refused the access token
    #[error("token login rejected with HTTP {status}")]
    Rejected { status: u16 },

    /// Login response did not carry `userToken.token`
    #[error("token login response contained no bearer token")]
    MissingToken,
}

/// Errors that can occur during backend client operations
#[derive(Error, Debug)]
pub enum ClientError {
    /// HTTP request failed
    #[error("HTTP request failed: {0}")]
    Http(#[from] reqwest::Error),

    /// Invalid URL
    #[error("Invalid URL: {0}")]
    InvalidUrl(#[from] url::ParseError),

    /// IO error
    #[error("IO error: {0}")]
    Io(#[from] std::io::Error),

    /// Authentication failed
    #[error("Authentication failed: {0}")]
    Auth(#[from] AuthError),

    /// Backend answered 404, or an empty body for a lookup
    #[error("Not found: {0}")]
    NotFound(String),

    /// Backend returned an error response
    #[error("Server error {status}: {message}")]
    Server { status: u16, message: String },

    /// Response body did not match the expected schema
    #[error("Failed to decode response: {0}")]
    Decode(String),
}

impl ClientError {
    /// Create a server error from status code and message
    pub fn server_error(status: u16, message: impl Into<String>) -> Self {
        Self::Server {
            status,
            message: message.into(),
        }
    }

    /// Whether the backend reported the resource as missing
    pub fn is_not_found(&self) -> bool {
        matches!(self, Self::NotFound(_))
    }
}
