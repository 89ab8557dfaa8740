//! S3-based image storage operations
mod error;

use std::sync::Arc;
use std::time::Duration;

use aws_sdk_s3::{
    error::SdkError,
    operation::head_object::HeadObjectError,
    presigning::PresigningConfig,
    primitives::{ByteStream, DateTimeFormat},
    types::ChecksumAlgorithm,
    Client as S3Client,
};
use base64::{engine::general_purpose::STANDARD, Engine as _};
use chrono::{DateTime, Utc};
use sha2::{Digest, Sha256};
use tracing::instrument;

pub use error::{BucketError, BucketResult};

/// Presigned URL with expiration information
#[derive(Debug, Clone)]
pub struct PresignedUrl {
    /// The presigned URL for GET operations
    pub url: String,
    /// ISO-8601 UTC timestamp when the URL expires
    pub expires_at: DateTime<Utc>,
}

/// Result of an upload, whether the object was written or already present
#[derive(Debug, Clone)]
pub struct UploadedObject {
    /// Content addressed S3 key
    pub storage_key: String,
    /// Presigned GET URL for the object
    pub presigned_url: PresignedUrl,
    /// `false` when an identical object already existed and the upload was skipped
    pub created: bool,
}

/// An object listed from a user's folder
#[derive(Debug, Clone)]
pub struct UploadedObjectDescriptor {
    /// S3 key
    pub storage_key: String,
    /// Freshly generated presigned GET URL
    pub presigned_url: String,
    /// RFC 3339 timestamp of the last write
    pub last_modified: Option<String>,
}

/// Image storage client for S3 operations
pub struct MediaStorage {
    s3_client: Arc<S3Client>,
    bucket_name: String,
    presigned_url_expiry_secs: u64,
}

impl MediaStorage {
    /// Creates a new media storage client
    ///
    /// # Arguments
    ///
    /// * `s3_client` - Pre-configured S3 client
    /// * `bucket_name` - S3 bucket name for image storage
    /// * `presigned_url_expiry_secs` - Default expiry time for presigned URLs in seconds
    #[must_use]
    pub const fn new(
        s3_client: Arc<S3Client>,
        bucket_name: String,
        presigned_url_expiry_secs: u64,
    ) -> Self {
        Self {
            s3_client,
            bucket_name,
            presigned_url_expiry_secs,
        }
    }

    /// Key prefix holding every object of one user
    ///
    /// # Errors
    ///
    /// Returns `BucketError::InvalidInput` if the user id is empty or contains `/`
    pub fn user_prefix(user_id: &str) -> BucketResult<String> {
        if user_id.is_empty() || user_id.contains('/') {
            return Err(BucketError::InvalidInput(format!(
                "Invalid user id for storage key: {user_id:?}"
            )));
        }

        Ok(format!("user/{user_id}/"))
    }

    /// Maps file contents to `user/{user_id}/{sha256}{extension}`
    ///
    /// # Errors
    ///
    /// Returns `BucketError::InvalidInput` if the user id is empty or contains `/`
    pub fn content_addressed_key(user_id: &str, data: &[u8], extension: &str) -> BucketResult<String> {
        let prefix = Self::user_prefix(user_id)?;
        let digest = hex::encode(Sha256::digest(data));

        Ok(format!("{prefix}{digest}{extension}"))
    }

    /// Checks if an object exists in the bucket
    ///
    /// # Returns
    ///
    /// * `Ok(true)` if object exists
    /// * `Ok(false)` if object does not exist
    ///
    /// # Errors
    ///
    /// Returns `BucketError::S3Error` for S3 service errors
    /// Returns `BucketError::UpstreamError` for 5xx errors
    #[allow(clippy::cognitive_complexity)]
    pub async fn check_object_exists(&self, s3_key: &str) -> BucketResult<bool> {
        let result = self
            .s3_client
            .head_object()
            .bucket(&self.bucket_name)
            .key(s3_key)
            .send()
            .await;

        match result {
            Ok(_) => Ok(true),
            Err(SdkError::ServiceError(service_err))
                if matches!(service_err.err(), HeadObjectError::NotFound(_)) =>
            {
                Ok(false)
            }
            Err(SdkError::ServiceError(service_err))
                if service_err.raw().status().as_u16() >= 500 =>
            {
                Err(BucketError::UpstreamError(format!("{service_err:?}")))
            }
            Err(SdkError::ServiceError(service_err)) => {
                Err(BucketError::S3Error(format!("{:?}", service_err.err())))
            }
            Err(e) => Err(BucketError::AwsError(e.to_string())),
        }
    }

    /// Uploads an image under its content addressed key
    ///
    /// Identical bytes for the same user and extension map to the same key, so a
    /// second upload is skipped and the existing key is reused.
    ///
    /// # Errors
    ///
    /// Returns `BucketError::InvalidInput` for an unusable user id
    /// Returns `BucketError` variants for S3 failures
    #[instrument(skip(self, data), fields(size = data.len()))]
    pub async fn upload_image(
        &self,
        user_id: &str,
        data: Vec<u8>,
        extension: &str,
    ) -> BucketResult<UploadedObject> {
        let s3_key = Self::content_addressed_key(user_id, &data, extension)?;

        let created = if self.check_object_exists(&s3_key).await? {
            tracing::debug!("Object {s3_key} already exists, skipping upload");
            false
        } else {
            let checksum = STANDARD.encode(Sha256::digest(&data));

            self.s3_client
                .put_object()
                .bucket(&self.bucket_name)
                .key(&s3_key)
                .content_type(content_type_for(extension).to_string())
                .checksum_algorithm(ChecksumAlgorithm::Sha256)
                .checksum_sha256(checksum)
                .body(ByteStream::from(data))
                .send()
                .await?;

            tracing::debug!("File {s3_key} has been successfully uploaded by user {user_id}");
            true
        };

        let presigned_url = self.generate_presigned_get_url(&s3_key, None).await?;

        Ok(UploadedObject {
            storage_key: s3_key,
            presigned_url,
            created,
        })
    }

    /// Generates a presigned URL for GET operations
    ///
    /// # Arguments
    ///
    /// * `s3_key` - Key of the object
    /// * `expiry_secs` - Lifetime of the URL, defaults to the configured expiry
    ///
    /// # Errors
    ///
    /// Returns `BucketError::ConfigError` if presigning config creation fails
    /// Returns `BucketError::S3Error` if presigned URL generation fails
    pub async fn generate_presigned_get_url(
        &self,
        s3_key: &str,
        expiry_secs: Option<u64>,
    ) -> BucketResult<PresignedUrl> {
        let expiry = Duration::from_secs(expiry_secs.unwrap_or(self.presigned_url_expiry_secs));

        let presigned_config = PresigningConfig::expires_in(expiry).map_err(|e| {
            BucketError::ConfigError(format!("Failed to create presigning config: {e}"))
        })?;

        let presigned_request = self
            .s3_client
            .get_object()
            .bucket(&self.bucket_name)
            .key(s3_key)
            .presigned(presigned_config)
            .await
            .map_err(|e| BucketError::S3Error(format!("Failed to generate presigned URL: {e}")))?;

        Ok(PresignedUrl {
            url: presigned_request.uri().to_string(),
            expires_at: Utc::now() + expiry,
        })
    }

    /// Lists every object of a user with a fresh presigned URL each
    ///
    /// Returns an empty list when the user has no objects.
    ///
    /// # Errors
    ///
    /// Returns `BucketError::InvalidInput` for an empty user id or one containing `/`,
    /// and other `BucketError` variants for S3 failures
    #[instrument(skip(self))]
    pub async fn list_user_objects(
        &self,
        user_id: &str,
    ) -> BucketResult<Vec<UploadedObjectDescriptor>> {
        let prefix = Self::user_prefix(user_id)?;
        let mut descriptors = Vec::new();
        let mut continuation_token: Option<String> = None;

        loop {
            let output = self
                .s3_client
                .list_objects_v2()
                .bucket(&self.bucket_name)
                .prefix(&prefix)
                .set_continuation_token(continuation_token.take())
                .send()
                .await?;

            for object in output.contents() {
                let Some(key) = object.key() else {
                    continue;
                };

                let presigned_url = self.generate_presigned_get_url(key, None).await?;
                descriptors.push(UploadedObjectDescriptor {
                    storage_key: key.to_string(),
                    presigned_url: presigned_url.url,
                    last_modified: object
                        .last_modified()
                        .and_then(|date| date.fmt(DateTimeFormat::DateTime).ok()),
                });
            }

            match output.next_continuation_token() {
                Some(token) if output.is_truncated().unwrap_or(false) => {
                    continuation_token = Some(token.to_string());
                }
                _ => break,
            }
        }

        Ok(descriptors)
    }
}

/// Content type stored with an uploaded image
#[must_use]
pub fn content_type_for(extension: &str) -> mime::Mime {
    match extension.to_ascii_lowercase().as_str() {
        ".png" => mime::IMAGE_PNG,
        ".jpg" | ".jpeg" => mime::IMAGE_JPEG,
        _ => mime::APPLICATION_OCTET_STREAM,
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_content_addressed_key_layout() {
        let key = MediaStorage::content_addressed_key("42", b"hello", ".png").unwrap();
        assert_eq!(
            key,
            "user/42/2cf24dba5fb0a30e26e83b2ac5b9e29e1b161e5c1fa7425e73043362938b9824.png"
        );
    }

    #[test]
    fn test_identical_bytes_share_a_key() {
        let first = MediaStorage::content_addressed_key("42", b"same bytes", ".jpg").unwrap();
        let second = MediaStorage::content_addressed_key("42", b"same bytes", ".jpg").unwrap();
        assert_eq!(first, second);
    }

    #[test]
    fn test_key_is_namespaced_by_user_and_extension() {
        let base = MediaStorage::content_addressed_key("42", b"bytes", ".jpg").unwrap();
        let other_user = MediaStorage::content_addressed_key("43", b"bytes", ".jpg").unwrap();
        let other_ext = MediaStorage::content_addressed_key("42", b"bytes", ".png").unwrap();
        let other_bytes = MediaStorage::content_addressed_key("42", b"other", ".jpg").unwrap();

        assert_ne!(base, other_user);
        assert_ne!(base, other_ext);
        assert_ne!(base, other_bytes);
    }

    #[test]
    fn test_invalid_user_id_is_rejected() {
        assert!(matches!(
            MediaStorage::content_addressed_key("", b"bytes", ".jpg"),
            Err(BucketError::InvalidInput(_))
        ));
        assert!(matches!(
            MediaStorage::content_addressed_key("a/../b", b"bytes", ".jpg"),
            Err(BucketError::InvalidInput(_))
        ));
    }

    #[test]
    fn test_user_prefix_rejects_ids_that_widen_the_listing() {
        assert_eq!(MediaStorage::user_prefix("42").unwrap(), "user/42/");
        assert!(matches!(
            MediaStorage::user_prefix(""),
            Err(BucketError::InvalidInput(_))
        ));
        assert!(matches!(
            MediaStorage::user_prefix("42/../43"),
            Err(BucketError::InvalidInput(_))
        ));
    }

    #[tokio::test]
    async fn test_list_user_objects_rejects_empty_user_id() {
        // Never reaches S3: the client points at an unroutable endpoint
        let config = aws_sdk_s3::Config::builder()
            .behavior_version(aws_sdk_s3::config::BehaviorVersion::latest())
            .region(aws_sdk_s3::config::Region::new("us-east-1"))
            .endpoint_url("http://127.0.0.1:9")
            .build();
        let storage = MediaStorage::new(
            Arc::new(S3Client::from_conf(config)),
            "bucket".to_string(),
            3600,
        );

        let result = storage.list_user_objects("").await;

        assert!(matches!(result, Err(BucketError::InvalidInput(_))));
    }

    #[test]
    fn test_content_type_for() {
        assert_eq!(content_type_for(".png"), mime::IMAGE_PNG);
        assert_eq!(content_type_for(".JPG"), mime::IMAGE_JPEG);
        assert_eq!(content_type_for(".jpeg").to_string(), "image/jpeg");
        assert_eq!(content_type_for(".gif"), mime::APPLICATION_OCTET_STREAM);
    }
}
