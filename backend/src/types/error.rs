//! Universal error handling for the API

use std::borrow::Cow;

use aide::OperationOutput;
use axum::{
    http::StatusCode,
    response::{IntoResponse, Response},
    Json,
};
use publishing_storage::publishing_metadata::PublishingMetadataError;
use schemars::JsonSchema;
use serde::Serialize;

use crate::{graph_api::GraphApiError, media_storage::BucketError, services::PublishError};

/// API error response envelope
#[derive(Debug, Serialize, JsonSchema)]
#[serde(rename_all = "camelCase")]
pub struct ApiErrorResponse {
    /// Whether the client should retry the request
    pub allow_retry: bool,
    /// Error details
    error: ErrorBody,
}

/// Error body containing code and message
#[derive(Debug, Serialize, JsonSchema)]
#[serde(rename_all = "camelCase")]
struct ErrorBody {
    /// Machine-readable error code
    pub code: &'static str,
    /// Human-readable error message
    pub message: Cow<'static, str>,
}

/// Application error type that wraps the API error response
#[derive(Debug)]
pub struct AppError {
    status: StatusCode,
    inner: ApiErrorResponse,
}

impl AppError {
    /// Create a new application error
    #[must_use]
    pub fn new(
        status: StatusCode,
        code: &'static str,
        msg: impl Into<Cow<'static, str>>,
        retry: bool,
    ) -> Self {
        Self {
            status,
            inner: ApiErrorResponse {
                allow_retry: retry,
                error: ErrorBody {
                    code,
                    message: msg.into(),
                },
            },
        }
    }

    /// A 400 for a payload that failed validation, `code` names the rule
    #[must_use]
    pub fn validation(code: &'static str, msg: impl Into<Cow<'static, str>>) -> Self {
        Self::new(StatusCode::BAD_REQUEST, code, msg, false)
    }

    /// A 422 for content the server understood but cannot accept
    #[must_use]
    pub fn unprocessable(msg: impl Into<Cow<'static, str>>) -> Self {
        Self::new(
            StatusCode::UNPROCESSABLE_ENTITY,
            "unprocessable_entity",
            msg,
            false,
        )
    }

    /// HTTP status of the response
    #[must_use]
    pub const fn status(&self) -> StatusCode {
        self.status
    }

    /// Machine-readable error code
    #[must_use]
    pub const fn code(&self) -> &'static str {
        self.inner.error.code
    }
}

impl IntoResponse for AppError {
    fn into_response(self) -> Response {
        // Log the error based on status code
        match self.status.as_u16() {
            400..=499 => tracing::warn!(
                "Client error: {} - {}",
                self.inner.error.code,
                self.inner.error.message
            ),
            500..=599 => tracing::error!(
                "Server error: {} - {}",
                self.inner.error.code,
                self.inner.error.message
            ),
            _ => {}
        }

        (self.status, Json(self.inner)).into_response()
    }
}

/// Convert bucket errors to application errors
impl From<BucketError> for AppError {
    #[allow(clippy::cognitive_complexity)]
    fn from(err: BucketError) -> Self {
        use BucketError::{AwsError, ConfigError, InvalidInput, S3Error, UpstreamError};

        match &err {
            UpstreamError(msg) => {
                tracing::error!("S3 upstream error: {msg}");
                Self::new(
                    StatusCode::SERVICE_UNAVAILABLE,
                    "upstream_error",
                    "S3 service temporarily unavailable",
                    true,
                )
            }
            S3Error(msg) | AwsError(msg) => {
                tracing::error!("S3/AWS error: {msg}");
                Self::new(
                    StatusCode::INTERNAL_SERVER_ERROR,
                    "internal_error",
                    "Internal server error",
                    true,
                )
            }
            ConfigError(msg) => {
                tracing::error!("Configuration error: {msg}");
                Self::new(
                    StatusCode::INTERNAL_SERVER_ERROR,
                    "internal_error",
                    "Internal server error",
                    false,
                )
            }
            InvalidInput(msg) => {
                tracing::warn!("Invalid input: {msg}");
                Self::new(
                    StatusCode::BAD_REQUEST,
                    "invalid_input",
                    "Invalid input provided",
                    false,
                )
            }
        }
    }
}

/// Convert Graph API errors to application errors
impl From<GraphApiError> for AppError {
    fn from(err: GraphApiError) -> Self {
        match err {
            GraphApiError::Unauthorized(msg) => {
                Self::new(StatusCode::UNAUTHORIZED, "unauthorized", msg, false)
            }
            GraphApiError::BadRequest(msg) => {
                Self::new(StatusCode::BAD_REQUEST, "bad_request", msg, false)
            }
            err @ GraphApiError::InvalidId(_) => Self::new(
                StatusCode::BAD_REQUEST,
                "invalid_input",
                err.to_string(),
                false,
            ),
            GraphApiError::Remote(body) => Self::new(
                StatusCode::BAD_GATEWAY,
                "external_api_error",
                body.message,
                false,
            ),
            err @ (GraphApiError::UnexpectedStatus { .. }
            | GraphApiError::MissingField(_)
            | GraphApiError::Malformed(_)) => {
                tracing::error!("Graph API returned an unusable response: {err}");
                Self::new(
                    StatusCode::BAD_GATEWAY,
                    "external_api_error",
                    "Unexpected response from the Graph API",
                    false,
                )
            }
            err @ (GraphApiError::Transport(_) | GraphApiError::Middleware(_)) => {
                tracing::error!("Graph API unreachable: {err}");
                Self::new(
                    StatusCode::SERVICE_UNAVAILABLE,
                    "upstream_error",
                    "Graph API temporarily unavailable",
                    true,
                )
            }
        }
    }
}

/// Convert publishing failures to application errors
impl From<PublishError> for AppError {
    fn from(err: PublishError) -> Self {
        match err {
            PublishError::ContainerCreation(source) | PublishError::Publish { source, .. } => {
                source.into()
            }
            // The post may be live, retrying could publish it twice
            PublishError::Interrupted { .. } => Self::new(
                StatusCode::INTERNAL_SERVER_ERROR,
                "internal_error",
                "Publishing did not complete",
                false,
            ),
        }
    }
}

/// Convert metadata store errors to application errors
impl From<PublishingMetadataError> for AppError {
    fn from(err: PublishingMetadataError) -> Self {
        match &err {
            PublishingMetadataError::NotUnique { .. } => {
                tracing::debug!("Publishing metadata already exists: {err}");
                Self::new(
                    StatusCode::CONFLICT,
                    "already_exists",
                    "Publishing record already exists",
                    false,
                )
            }
            PublishingMetadataError::InvalidPagination { .. } => Self::new(
                StatusCode::BAD_REQUEST,
                "invalid_input",
                err.to_string(),
                false,
            ),
            PublishingMetadataError::Database(_) => {
                tracing::error!("Publishing metadata store error: {err}");
                Self::new(
                    StatusCode::INTERNAL_SERVER_ERROR,
                    "internal_error",
                    "Internal server error",
                    true,
                )
            }
        }
    }
}

impl OperationOutput for AppError {
    type Inner = ApiErrorResponse;

    fn operation_response(
        ctx: &mut aide::generate::GenContext,
        operation: &mut aide::openapi::Operation,
    ) -> Option<aide::openapi::Response> {
        Json::<ApiErrorResponse>::operation_response(ctx, operation)
    }
}
