pub mod auth;
pub mod images;
pub mod instagram;

use aide::axum::{
    routing::{get, post},
    ApiRouter,
};
use axum::middleware;

use crate::middleware::auth::auth_middleware;

/// Creates the v1 API router with all v1 handler routes
///
/// Every v1 route requires a bearer token verified against the Graph API.
pub fn handler() -> ApiRouter {
    ApiRouter::new()
        .api_route("/auth/facebook", post(auth::verify_identity))
        .api_route(
            "/images",
            post(images::upload_image).get(images::list_images),
        )
        .api_route("/instagram/account", get(instagram::get_account_info))
        .api_route("/instagram/user-pages", get(instagram::get_user_pages))
        .api_route(
            "/instagram/images",
            post(instagram::publish_image).get(instagram::list_published_images),
        )
        .api_route(
            "/instagram/images/{media_id}",
            get(instagram::get_published_image),
        )
        .api_route(
            "/instagram/images/{media_id}/insights",
            get(instagram::get_image_insights),
        )
        .api_route("/instagram/medias", get(instagram::list_media))
        .layer(middleware::from_fn(auth_middleware))
}
