use axum::Json;
use schemars::JsonSchema;
use serde::Serialize;

use crate::{graph_api::types::Permissions, middleware::AuthenticatedUser};

/// Identity of the token owner
#[derive(Debug, Serialize, JsonSchema)]
pub struct IdentityResponse {
    /// Identity provider user id
    pub id: String,
    /// Display name
    pub name: String,
    /// Permissions granted to the token
    pub permissions: Permissions,
}

/// Verifies the bearer token and returns the identity it belongs to
///
/// The auth middleware has already validated the token by the time this runs.
#[allow(clippy::unused_async)]
pub async fn verify_identity(user: AuthenticatedUser) -> Json<IdentityResponse> {
    Json(IdentityResponse {
        id: user.id,
        name: user.name,
        permissions: user.permissions,
    })
}
