//! Publishing metadata storage backed by `SQLite`
//!
//! One row is written for every image that was successfully published to an
//! Instagram Business Account. Rows are never updated or deleted by the service.

mod error;

use chrono::{DateTime, Utc};
use serde::Serialize;
use sqlx::{FromRow, SqlitePool};
use tracing::instrument;

pub use error::{PublishingMetadataError, PublishingMetadataResult};

use crate::pagination::{offset, Page, MAX_PAGE_SIZE};

/// Columns returned by every select on the metadata table
const SELECT_COLUMNS: &str = "id, instagram_business_account_id, auth_id, image_url, caption, \
     instagram_media_container_id, instagram_media_published_id, created_at, updated_at";

/// A persisted publishing record
#[derive(Debug, Clone, PartialEq, Eq, Serialize, FromRow)]
pub struct PublishingMetadata {
    /// Numeric primary key
    pub id: i64,
    /// Target Instagram Business Account (unique)
    pub instagram_business_account_id: String,
    /// Identity provider user id of the publisher
    pub auth_id: String,
    /// Public URL the image was published from
    pub image_url: String,
    /// Optional caption sent with the post
    pub caption: Option<String>,
    /// Container id returned by the Graph API (unique)
    pub instagram_media_container_id: String,
    /// Published media id returned by the Graph API (unique)
    pub instagram_media_published_id: String,
    /// Insert time
    pub created_at: DateTime<Utc>,
    /// Last update time, equal to `created_at` since rows are immutable
    pub updated_at: DateTime<Utc>,
}

/// Insert payload for a publishing record
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct NewPublishingMetadata {
    /// Target Instagram Business Account
    pub instagram_business_account_id: String,
    /// Identity provider user id of the publisher
    pub auth_id: String,
    /// Public URL the image was published from
    pub image_url: String,
    /// Optional caption sent with the post
    pub caption: Option<String>,
    /// Container id returned by the Graph API
    pub instagram_media_container_id: String,
    /// Published media id returned by the Graph API
    pub instagram_media_published_id: String,
}

/// Publishing metadata repository
pub struct PublishingMetadataStorage {
    pool: SqlitePool,
}

impl PublishingMetadataStorage {
    /// Creates a new repository on top of an existing pool
    ///
    /// # Arguments
    ///
    /// * `pool` - Pool with migrations already applied
    #[must_use]
    pub const fn new(pool: SqlitePool) -> Self {
        Self { pool }
    }

    /// Inserts a record inside its own transaction and returns it with generated fields
    ///
    /// # Errors
    ///
    /// Returns `PublishingMetadataError::NotUnique` if any unique column collides
    /// Returns `PublishingMetadataError::Database` for every other failure
    #[instrument(skip(self, metadata), fields(
        business_account_id = %metadata.instagram_business_account_id,
        container_id = %metadata.instagram_media_container_id,
    ))]
    pub async fn add(
        &self,
        metadata: NewPublishingMetadata,
    ) -> PublishingMetadataResult<PublishingMetadata> {
        let now = Utc::now();
        let mut tx = self.pool.begin().await.map_err(|err| {
            tracing::error!("Failed to begin transaction: {err}");
            PublishingMetadataError::Database(err)
        })?;

        let query = format!(
            "INSERT INTO instagram_image_publishing_metadata (\
                instagram_business_account_id, auth_id, image_url, caption, \
                instagram_media_container_id, instagram_media_published_id, \
                created_at, updated_at\
            ) VALUES (?, ?, ?, ?, ?, ?, ?, ?) RETURNING {SELECT_COLUMNS}"
        );

        // The transaction rolls back when dropped on the error path
        let record = sqlx::query_as::<_, PublishingMetadata>(&query)
            .bind(&metadata.instagram_business_account_id)
            .bind(&metadata.auth_id)
            .bind(&metadata.image_url)
            .bind(&metadata.caption)
            .bind(&metadata.instagram_media_container_id)
            .bind(&metadata.instagram_media_published_id)
            .bind(now)
            .bind(now)
            .fetch_one(&mut *tx)
            .await
            .map_err(|err| {
                let err = PublishingMetadataError::from_insert(err);
                tracing::error!("Failed to insert publishing metadata: {err}");
                err
            })?;

        tx.commit().await.map_err(|err| {
            tracing::error!("Failed to commit publishing metadata: {err}");
            PublishingMetadataError::Database(err)
        })?;

        Ok(record)
    }

    /// Gets a record by the id of the published media
    ///
    /// # Errors
    ///
    /// Returns `PublishingMetadataError::Database` if the query fails
    #[instrument(skip(self))]
    pub async fn get_by_published_media_id(
        &self,
        published_media_id: &str,
    ) -> PublishingMetadataResult<Option<PublishingMetadata>> {
        let query = format!(
            "SELECT {SELECT_COLUMNS} FROM instagram_image_publishing_metadata \
             WHERE instagram_media_published_id = ?"
        );

        let record = sqlx::query_as::<_, PublishingMetadata>(&query)
            .bind(published_media_id)
            .fetch_optional(&self.pool)
            .await?;

        Ok(record)
    }

    /// Lists the records published by one user, newest first
    ///
    /// # Arguments
    ///
    /// * `auth_id` - Identity provider user id
    /// * `page` - 1-based page number
    /// * `size` - Page size, between 1 and `MAX_PAGE_SIZE`
    ///
    /// # Errors
    ///
    /// Returns `PublishingMetadataError::InvalidPagination` for out of range arguments
    /// Returns `PublishingMetadataError::Database` if a query fails
    #[instrument(skip(self))]
    pub async fn list_by_auth_id(
        &self,
        auth_id: &str,
        page: u32,
        size: u32,
    ) -> PublishingMetadataResult<Page<PublishingMetadata>> {
        if page == 0 || size == 0 || size > MAX_PAGE_SIZE {
            return Err(PublishingMetadataError::InvalidPagination { page, size });
        }

        let total: i64 = sqlx::query_scalar(
            "SELECT COUNT(*) FROM instagram_image_publishing_metadata WHERE auth_id = ?",
        )
        .bind(auth_id)
        .fetch_one(&self.pool)
        .await?;

        let query = format!(
            "SELECT {SELECT_COLUMNS} FROM instagram_image_publishing_metadata \
             WHERE auth_id = ? ORDER BY created_at DESC, id DESC LIMIT ? OFFSET ?"
        );

        let items = sqlx::query_as::<_, PublishingMetadata>(&query)
            .bind(auth_id)
            .bind(i64::from(size))
            .bind(offset(page, size))
            .fetch_all(&self.pool)
            .await?;

        Ok(Page::new(items, total, page, size))
    }
}
