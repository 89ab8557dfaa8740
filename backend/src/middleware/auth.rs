use std::{fmt, sync::Arc};

use aide::OperationIo;
use axum::{
    extract::{FromRequestParts, Request},
    http::{header::AUTHORIZATION, request::Parts, StatusCode},
    middleware::Next,
    response::Response,
    Extension,
};

use crate::{
    graph_api::{types::Permissions, GraphApi, Identity},
    types::AppError,
};

/// Authenticated user resolved from the bearer token
#[derive(Clone, OperationIo)]
pub struct AuthenticatedUser {
    /// Identity provider user id
    pub id: String,
    /// Display name
    pub name: String,
    /// Permissions granted to the token
    pub permissions: Permissions,
    /// Access token the user authenticated with, forwarded to the Graph API
    pub token: String,
}

impl fmt::Debug for AuthenticatedUser {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.debug_struct("AuthenticatedUser")
            .field("id", &self.id)
            .field("name", &self.name)
            .field("token", &"<redacted>")
            .finish_non_exhaustive()
    }
}

impl AuthenticatedUser {
    fn from_identity(identity: Identity, token: &str) -> Self {
        Self {
            id: identity.id,
            name: identity.name,
            permissions: identity.permissions,
            token: identity.token.unwrap_or_else(|| token.to_string()),
        }
    }
}

/// Axum extractor for authenticated user
///
/// Use this in your handlers to access the caller and their token:
/// ```ignore
/// async fn protected_handler(
///     user: AuthenticatedUser,
/// ) -> Result<impl IntoResponse, AppError> {
///     Ok(user.id)
/// }
/// ```
impl<S> FromRequestParts<S> for AuthenticatedUser
where
    S: Send + Sync,
{
    type Rejection = AppError;

    async fn from_request_parts(parts: &mut Parts, _state: &S) -> Result<Self, Self::Rejection> {
        parts.extensions.get::<Self>().cloned().ok_or_else(|| {
            AppError::new(
                StatusCode::UNAUTHORIZED,
                "missing_auth",
                "Authentication required but user not found in request extensions",
                false,
            )
        })
    }
}

/// Bearer token authentication middleware
///
/// This middleware:
/// 1. Extracts the Bearer token from the Authorization header
/// 2. Verifies it against the Graph API identity endpoint
/// 3. Adds `AuthenticatedUser` to request extensions
///
/// # Errors
///
/// - 401 for a missing token or one the Graph API rejects with `OAuthException`
/// - 400 for any other identity verification failure
pub async fn auth_middleware(
    Extension(graph_api): Extension<Arc<dyn GraphApi>>,
    mut request: Request,
    next: Next,
) -> Result<Response, AppError> {
    let token = request
        .headers()
        .get(AUTHORIZATION)
        .and_then(|header| header.to_str().ok())
        .and_then(|header| header.strip_prefix("Bearer "))
        .map(str::trim)
        .filter(|token| !token.is_empty())
        .ok_or_else(|| {
            AppError::new(
                StatusCode::UNAUTHORIZED,
                "missing_token",
                "Authorization header must contain a valid Bearer token",
                false,
            )
        })?
        .to_string();

    let identity = graph_api.me(&token).await?;

    tracing::debug!("Authenticated user {}", identity.id);

    let user = AuthenticatedUser::from_identity(identity, &token);
    request.extensions_mut().insert(user);

    Ok(next.run(request).await)
}
