//! Publishing an image to an Instagram Business Account

use std::sync::Arc;

use publishing_storage::publishing_metadata::{
    NewPublishingMetadata, PublishingMetadata, PublishingMetadataError, PublishingMetadataStorage,
};
use thiserror::Error;
use tokio::task::JoinError;
use tracing::{instrument, Instrument, Span};

use crate::graph_api::{GraphApi, GraphApiError};

/// What to publish and where
#[derive(Debug, Clone)]
pub struct PublishImage {
    /// Target Instagram Business Account
    pub business_account_id: String,
    /// Public URL the Graph API downloads the image from
    pub image_url: String,
    /// Optional caption
    pub caption: Option<String>,
}

/// Outcome of a publish that reached the Graph API successfully
#[derive(Debug)]
pub enum PublishOutcome {
    /// Published and recorded
    Recorded(PublishingMetadata),
    /// Published, but the local record could not be written
    Unrecorded {
        /// Container id returned by the Graph API
        container_id: String,
        /// Published media id returned by the Graph API
        published_media_id: String,
        /// Why the record was not written
        reason: PublishingMetadataError,
    },
}

impl PublishOutcome {
    /// Published media id, whether recorded or not
    #[must_use]
    pub fn published_media_id(&self) -> &str {
        match self {
            Self::Recorded(record) => &record.instagram_media_published_id,
            Self::Unrecorded {
                published_media_id, ..
            } => published_media_id,
        }
    }
}

/// Failures of a publish
#[derive(Error, Debug)]
pub enum PublishError {
    /// Container creation failed
    #[error("Failed to create media container: {0}")]
    ContainerCreation(#[source] GraphApiError),

    /// Container was created but could not be published
    #[error("Failed to publish container {container_id}: {source}")]
    Publish {
        /// The orphaned container
        container_id: String,
        /// Graph API failure
        #[source]
        source: GraphApiError,
    },

    /// The publish task stopped before reporting back, the post may be live
    #[error("Publish task for container {container_id} did not complete: {source}")]
    Interrupted {
        /// Container being published
        container_id: String,
        /// Why the task stopped
        #[source]
        source: JoinError,
    },
}

/// Orchestrates container creation, publishing and the metadata write
pub struct MediaPublisher {
    graph_api: Arc<dyn GraphApi>,
    metadata_storage: Arc<PublishingMetadataStorage>,
}

impl MediaPublisher {
    /// Creates a new publisher
    #[must_use]
    pub fn new(
        graph_api: Arc<dyn GraphApi>,
        metadata_storage: Arc<PublishingMetadataStorage>,
    ) -> Self {
        Self {
            graph_api,
            metadata_storage,
        }
    }

    /// Publishes an image and records it
    ///
    /// # Arguments
    ///
    /// * `request` - Target account, image URL and caption
    /// * `token` - Caller's access token
    /// * `auth_id` - Caller's identity provider user id
    ///
    /// # Errors
    ///
    /// Returns `PublishError` if either Graph API call fails. A failure after the
    /// post went live is reported as `PublishOutcome::Unrecorded` instead.
    ///
    /// Dropping the returned future after the container exists does not stop
    /// the publish or its record.
    #[instrument(skip(self, request, token), fields(business_account_id = %request.business_account_id))]
    pub async fn publish_image(
        &self,
        request: &PublishImage,
        token: &str,
        auth_id: &str,
    ) -> Result<PublishOutcome, PublishError> {
        let container_id = self
            .graph_api
            .create_image_container(
                token,
                &request.business_account_id,
                &request.image_url,
                request.caption.as_deref(),
            )
            .await
            .map_err(PublishError::ContainerCreation)?;

        tracing::debug!("Created media container {container_id}");

        // From here on the post can go live, so the rest runs outside the request future
        let task = tokio::spawn(
            publish_and_record(
                Arc::clone(&self.graph_api),
                Arc::clone(&self.metadata_storage),
                NewPublishingMetadata {
                    instagram_business_account_id: request.business_account_id.clone(),
                    auth_id: auth_id.to_string(),
                    image_url: request.image_url.clone(),
                    caption: request.caption.clone(),
                    instagram_media_container_id: container_id.clone(),
                    instagram_media_published_id: String::new(),
                },
                token.to_string(),
            )
            .instrument(Span::current()),
        );

        task.await.map_err(|source| {
            tracing::error!("Publish task for container {container_id} did not complete: {source}");
            PublishError::Interrupted {
                container_id,
                source,
            }
        })?
    }
}

/// Publishes a created container and records it
///
/// `record.instagram_media_published_id` is filled in once the Graph API answers.
async fn publish_and_record(
    graph_api: Arc<dyn GraphApi>,
    metadata_storage: Arc<PublishingMetadataStorage>,
    mut record: NewPublishingMetadata,
    token: String,
) -> Result<PublishOutcome, PublishError> {
    let container_id = record.instagram_media_container_id.clone();

    let published_media_id = match graph_api
        .publish_container(&token, &record.instagram_business_account_id, &container_id)
        .await
    {
        Ok(id) => id,
        Err(source) => {
            tracing::warn!("Container {container_id} was created but not published: {source}");
            return Err(PublishError::Publish {
                container_id,
                source,
            });
        }
    };

    tracing::info!("Published container {container_id} as media {published_media_id}");

    record.instagram_media_published_id.clone_from(&published_media_id);

    match metadata_storage.add(record).await {
        Ok(record) => Ok(PublishOutcome::Recorded(record)),
        Err(reason) => {
            tracing::error!(
                "Media {published_media_id} is live but its record was not saved: {reason}"
            );
            Ok(PublishOutcome::Unrecorded {
                container_id,
                published_media_id,
                reason,
            })
        }
    }
}
