use std::sync::Arc;

use axum::{
    extract::{Path, Query},
    http::StatusCode,
    Extension, Json,
};
use axum_valid::Valid;
use publishing_storage::{
    pagination::{Page, MAX_PAGE_SIZE},
    publishing_metadata::{PublishingMetadata, PublishingMetadataStorage},
};
use schemars::JsonSchema;
use serde::{Deserialize, Serialize};
use serde_json::Value;
use tracing::instrument;
use validator::Validate;

use crate::{
    graph_api::is_node_id,
    middleware::AuthenticatedUser,
    services::{AccountService, InsightService, MediaPublisher, PublishImage, PublishOutcome},
    types::{AppError, ValidatedJson},
};

/// Instagram rejects captions longer than this
const MAX_CAPTION_CHARS: u64 = 2200;

// Ids end up as Graph API path segments
fn validate_node_id(id: &str) -> Result<(), validator::ValidationError> {
    if is_node_id(id) {
        return Ok(());
    }

    let mut error = validator::ValidationError::new("invalid_node_id");
    error.message = Some(std::borrow::Cow::Borrowed(
        "Graph API ids may only contain letters, digits and underscores",
    ));
    Err(error)
}

#[derive(Debug, Deserialize, JsonSchema, Validate)]
pub struct AccountQuery {
    /// Facebook page whose Instagram Business Account is requested, all accounts when absent
    #[validate(custom(function = "validate_node_id"))]
    pub page_id: Option<String>,
}

/// Request to publish an image to an Instagram Business Account
#[derive(Debug, Deserialize, Serialize, JsonSchema, Validate)]
#[serde(deny_unknown_fields)]
pub struct PublishImageRequest {
    /// Target Instagram Business Account
    #[validate(custom(function = "validate_node_id"))]
    pub instagram_business_account_id: String,
    /// Public URL the Graph API downloads the image from
    #[validate(url(message = "image_url must be a valid URL"))]
    pub image_url: String,
    /// Optional caption
    #[validate(length(max = MAX_CAPTION_CHARS, message = "caption is too long"))]
    pub caption: Option<String>,
}

/// A recorded publish
#[derive(Debug, Serialize, JsonSchema)]
pub struct PublishedImage {
    pub id: i64,
    pub instagram_business_account_id: String,
    pub image_url: String,
    pub caption: Option<String>,
    pub instagram_media_container_id: String,
    pub instagram_media_published_id: String,
    /// ISO-8601 UTC timestamp
    pub created_at: String,
    /// ISO-8601 UTC timestamp
    pub updated_at: String,
}

impl From<PublishingMetadata> for PublishedImage {
    fn from(record: PublishingMetadata) -> Self {
        Self {
            id: record.id,
            instagram_business_account_id: record.instagram_business_account_id,
            image_url: record.image_url,
            caption: record.caption,
            instagram_media_container_id: record.instagram_media_container_id,
            instagram_media_published_id: record.instagram_media_published_id,
            created_at: record.created_at.to_rfc3339(),
            updated_at: record.updated_at.to_rfc3339(),
        }
    }
}

#[derive(Debug, Serialize, JsonSchema)]
pub struct PublishImageResponse {
    /// Container created for the image
    pub instagram_media_container_id: String,
    /// Id of the live post
    pub instagram_media_published_id: String,
    /// Whether the publish was recorded locally
    pub recorded: bool,
    /// The stored record, absent when `recorded` is false
    pub record: Option<PublishedImage>,
}

impl From<PublishOutcome> for PublishImageResponse {
    fn from(outcome: PublishOutcome) -> Self {
        match outcome {
            PublishOutcome::Recorded(record) => Self {
                instagram_media_container_id: record.instagram_media_container_id.clone(),
                instagram_media_published_id: record.instagram_media_published_id.clone(),
                recorded: true,
                record: Some(record.into()),
            },
            PublishOutcome::Unrecorded {
                container_id,
                published_media_id,
                ..
            } => Self {
                instagram_media_container_id: container_id,
                instagram_media_published_id: published_media_id,
                recorded: false,
                record: None,
            },
        }
    }
}

const fn default_page() -> u32 {
    1
}

const fn default_size() -> u32 {
    10
}

#[derive(Debug, Deserialize, JsonSchema, Validate)]
pub struct HistoryQuery {
    /// 1-based page number
    #[serde(default = "default_page")]
    #[validate(range(min = 1))]
    pub page: u32,
    /// Page size, at most 100
    #[serde(default = "default_size")]
    #[validate(range(min = 1, max = MAX_PAGE_SIZE))]
    pub size: u32,
}

#[derive(Debug, Serialize, JsonSchema)]
pub struct PublishedImagePage {
    pub total: i64,
    pub total_page: i64,
    pub page: u32,
    pub size: u32,
    pub items: Vec<PublishedImage>,
}

impl From<Page<PublishingMetadata>> for PublishedImagePage {
    fn from(page: Page<PublishingMetadata>) -> Self {
        Self {
            total: page.total,
            total_page: page.total_page,
            page: page.page,
            size: page.size,
            items: page.items.into_iter().map(PublishedImage::from).collect(),
        }
    }
}

#[derive(Debug, Deserialize, JsonSchema, Validate)]
pub struct MediaPath {
    /// Published media id
    #[validate(custom(function = "validate_node_id"))]
    pub media_id: String,
}

#[derive(Debug, Deserialize, JsonSchema, Validate)]
pub struct MediaQuery {
    /// Instagram Business Account whose media are listed
    #[validate(custom(function = "validate_node_id"))]
    pub instagram_business_account_id: String,
}

/// Returns one page's Instagram Business Account, or every account of the caller
///
/// # Errors
///
/// - `GraphApiError` variants - Graph API failures
#[instrument(skip(account_service, user), fields(user_id = %user.id))]
pub async fn get_account_info(
    user: AuthenticatedUser,
    Extension(account_service): Extension<Arc<AccountService>>,
    Valid(Query(query)): Valid<Query<AccountQuery>>,
) -> Result<Json<Value>, AppError> {
    let account = account_service
        .get_instagram_account_info(query.page_id.as_deref(), &user.token)
        .await?;

    Ok(Json(account))
}

/// Returns the Facebook pages managed by the caller
///
/// # Errors
///
/// - `GraphApiError` variants - Graph API failures
#[instrument(skip(account_service, user), fields(user_id = %user.id))]
pub async fn get_user_pages(
    user: AuthenticatedUser,
    Extension(account_service): Extension<Arc<AccountService>>,
) -> Result<Json<Value>, AppError> {
    Ok(Json(account_service.get_user_pages(&user.token).await?))
}

/// Publishes an image to an Instagram Business Account
///
/// Creates a media container, publishes it and records the publish. A post
/// that went live but could not be recorded is still answered with 201 and
/// `recorded: false`.
///
/// # Errors
///
/// - 400 - Payload validation failed
/// - `GraphApiError` variants - Container creation or publishing failed
#[instrument(skip(media_publisher, user, payload), fields(user_id = %user.id))]
pub async fn publish_image(
    user: AuthenticatedUser,
    Extension(media_publisher): Extension<Arc<MediaPublisher>>,
    ValidatedJson(payload): ValidatedJson<PublishImageRequest>,
) -> Result<(StatusCode, Json<PublishImageResponse>), AppError> {
    let request = PublishImage {
        business_account_id: payload.instagram_business_account_id,
        image_url: payload.image_url,
        caption: payload.caption,
    };

    let outcome = media_publisher
        .publish_image(&request, &user.token, &user.id)
        .await?;

    Ok((StatusCode::CREATED, Json(outcome.into())))
}

/// Lists the caller's publish history, newest first
///
/// # Errors
///
/// - 400 - `page` or `size` out of range
/// - `PublishingMetadataError::Database` - Store failure
#[instrument(skip(metadata_storage, user), fields(user_id = %user.id))]
pub async fn list_published_images(
    user: AuthenticatedUser,
    Extension(metadata_storage): Extension<Arc<PublishingMetadataStorage>>,
    Valid(Query(query)): Valid<Query<HistoryQuery>>,
) -> Result<Json<PublishedImagePage>, AppError> {
    let page = metadata_storage
        .list_by_auth_id(&user.id, query.page, query.size)
        .await?;

    Ok(Json(page.into()))
}

/// Returns one of the caller's recorded publishes
///
/// # Errors
///
/// - 404 - No record for this media id, or it was published by another user
/// - `PublishingMetadataError::Database` - Store failure
#[instrument(skip(metadata_storage, user), fields(user_id = %user.id))]
pub async fn get_published_image(
    user: AuthenticatedUser,
    Extension(metadata_storage): Extension<Arc<PublishingMetadataStorage>>,
    Valid(Path(path)): Valid<Path<MediaPath>>,
) -> Result<Json<PublishedImage>, AppError> {
    let record = metadata_storage
        .get_by_published_media_id(&path.media_id)
        .await?
        .filter(|record| record.auth_id == user.id)
        .ok_or_else(|| {
            AppError::new(
                StatusCode::NOT_FOUND,
                "not_found",
                "No recorded publish for this media",
                false,
            )
        })?;

    Ok(Json(record.into()))
}

/// Returns the insights of a published media
///
/// # Errors
///
/// - `GraphApiError` variants - Graph API failures
#[instrument(skip(insight_service, user), fields(user_id = %user.id))]
pub async fn get_image_insights(
    user: AuthenticatedUser,
    Extension(insight_service): Extension<Arc<InsightService>>,
    Valid(Path(path)): Valid<Path<MediaPath>>,
) -> Result<Json<Value>, AppError> {
    let insights = insight_service
        .get_image_insights(&path.media_id, &user.token)
        .await?;

    Ok(Json(insights))
}

/// Lists every media of an Instagram Business Account
///
/// # Errors
///
/// - `GraphApiError` variants - Graph API failures
#[instrument(skip(insight_service, user), fields(user_id = %user.id))]
pub async fn list_media(
    user: AuthenticatedUser,
    Extension(insight_service): Extension<Arc<InsightService>>,
    Valid(Query(query)): Valid<Query<MediaQuery>>,
) -> Result<Json<Value>, AppError> {
    let media = insight_service
        .list_media(&query.instagram_business_account_id, &user.token)
        .await?;

    Ok(Json(media))
}
