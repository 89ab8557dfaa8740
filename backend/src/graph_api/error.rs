//! Error types for Graph API calls

use thiserror::Error;

use super::types::GraphErrorBody;

/// Result type for Graph API calls
pub type GraphApiResult<T> = Result<T, GraphApiError>;

/// Errors that can occur while calling the Graph API
#[derive(Error, Debug)]
pub enum GraphApiError {
    /// Identity verification failed with an `OAuthException`
    #[error("Unauthorized: {0}")]
    Unauthorized(String),

    /// Identity verification failed for any other reason
    #[error("Bad request: {0}")]
    BadRequest(String),

    /// An id that is not a Graph API node id, nothing was sent
    #[error("Invalid Graph API node id: {0:?}")]
    InvalidId(String),

    /// The Graph API answered with an error payload
    #[error("Graph API error ({}, code {}): {}", .0.error_type, .0.code, .0.message)]
    Remote(GraphErrorBody),

    /// Non-2xx status without an error payload
    #[error("Graph API returned status {status}: {body}")]
    UnexpectedStatus {
        /// HTTP status code
        status: u16,
        /// Raw response body
        body: String,
    },

    /// A field the caller depends on is absent from the payload
    #[error("Graph API response is missing `{0}`")]
    MissingField(&'static str),

    /// Response body is not the expected JSON
    #[error("Malformed Graph API response: {0}")]
    Malformed(#[from] serde_json::Error),

    /// Transport level failure
    #[error("Graph API request failed: {0}")]
    Transport(#[from] reqwest::Error),

    /// Failure raised by the HTTP middleware stack
    #[error("Graph API request failed: {0}")]
    Middleware(#[from] reqwest_middleware::Error),
}

impl GraphApiError {
    /// Maps any failure of the identity endpoint to `Unauthorized` or `BadRequest`
    ///
    /// Only an error payload typed `OAuthException` is an authorization failure.
    #[must_use]
    pub fn into_identity_error(self) -> Self {
        match self {
            Self::Unauthorized(_) | Self::BadRequest(_) => self,
            Self::Remote(body) if body.is_oauth() => Self::Unauthorized(body.message),
            Self::Remote(body) => Self::BadRequest(body.message),
            other => Self::BadRequest(other.to_string()),
        }
    }
}
