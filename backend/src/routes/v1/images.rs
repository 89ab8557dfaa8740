use std::{io::Cursor, path::Path, sync::Arc};

use axum::{
    extract::{multipart::MultipartError, Multipart},
    http::StatusCode,
    Extension, Json,
};
use image::ImageReader;
use schemars::JsonSchema;
use serde::Serialize;
use tracing::instrument;

use crate::{
    media_storage::{MediaStorage, UploadedObject, UploadedObjectDescriptor},
    middleware::AuthenticatedUser,
    types::AppError,
};

/// Multipart field carrying the image
pub const IMAGE_FIELD: &str = "image_file";

/// Largest accepted upload, 15 MiB
pub const MAX_UPLOAD_BYTES: usize = 15 * 1024 * 1024;

const ALLOWED_EXTENSIONS: [&str; 3] = [".png", ".jpg", ".jpeg"];

const INVALID_IMAGE: &str = "the file you uploaded was not a valid image";
const CORRUPTED_IMAGE: &str = "Your image is corrupted or damaged";

#[derive(Debug, Serialize, JsonSchema)]
pub struct UploadImageResponse {
    /// S3 key of the image, derived from its contents
    pub s3_bucket_path_key: String,
    /// Presigned GET URL for the image
    pub full_url: String,
    /// ISO-8601 UTC timestamp when the presigned URL expires
    pub expires_at: String,
    /// `false` when identical bytes were already stored for this user
    pub created: bool,
}

impl From<UploadedObject> for UploadImageResponse {
    fn from(object: UploadedObject) -> Self {
        Self {
            s3_bucket_path_key: object.storage_key,
            full_url: object.presigned_url.url,
            expires_at: object.presigned_url.expires_at.to_rfc3339(),
            created: object.created,
        }
    }
}

#[derive(Debug, Serialize, JsonSchema)]
pub struct StoredImage {
    /// S3 key of the image
    pub s3_bucket_path_key: String,
    /// Freshly generated presigned GET URL
    pub full_url: String,
    /// RFC 3339 timestamp of the last write
    pub last_modified: Option<String>,
}

impl From<UploadedObjectDescriptor> for StoredImage {
    fn from(descriptor: UploadedObjectDescriptor) -> Self {
        Self {
            s3_bucket_path_key: descriptor.storage_key,
            full_url: descriptor.presigned_url,
            last_modified: descriptor.last_modified,
        }
    }
}

#[derive(Debug, Serialize, JsonSchema)]
pub struct ListImagesResponse {
    /// Every image the caller uploaded
    pub items: Vec<StoredImage>,
}

/// Returns the lowercased extension of `filename` with its leading dot if it is an accepted image type
fn image_extension(filename: &str) -> Option<String> {
    let extension = Path::new(filename).extension()?.to_str()?;
    let extension = format!(".{}", extension.to_ascii_lowercase());

    ALLOWED_EXTENSIONS
        .contains(&extension.as_str())
        .then_some(extension)
}

/// Whether the bytes decode as an image of a supported format
fn is_decodable_image(data: &[u8]) -> bool {
    ImageReader::new(Cursor::new(data))
        .with_guessed_format()
        .is_ok_and(|reader| reader.decode().is_ok())
}

fn multipart_error(err: &MultipartError) -> AppError {
    AppError::new(err.status(), "invalid_multipart", err.body_text(), false)
}

/// Reads the image field, returning its filename and bytes
async fn read_image_field(mut multipart: Multipart) -> Result<(String, Vec<u8>), AppError> {
    while let Some(field) = multipart
        .next_field()
        .await
        .map_err(|e| multipart_error(&e))?
    {
        if field.name() != Some(IMAGE_FIELD) {
            continue;
        }

        let filename = field.file_name().unwrap_or_default().to_string();
        let data = field.bytes().await.map_err(|e| multipart_error(&e))?;

        return Ok((filename, data.to_vec()));
    }

    Err(AppError::validation(
        "missing_file",
        format!("Multipart field `{IMAGE_FIELD}` is required"),
    ))
}

/// Uploads an image to the caller's folder
///
/// The upload is content addressed: sending identical bytes with the same
/// extension twice returns the same key and skips the second write.
///
/// # Errors
///
/// - 422 - The filename is not `.png`, `.jpg` or `.jpeg`, or the bytes are not a readable image
/// - 400 - The multipart body is malformed or lacks the `image_file` field
/// - `BucketError` variants - S3 failures
#[instrument(skip(user, media_storage, multipart), fields(user_id = %user.id))]
pub async fn upload_image(
    user: AuthenticatedUser,
    Extension(media_storage): Extension<Arc<MediaStorage>>,
    multipart: Multipart,
) -> Result<Json<UploadImageResponse>, AppError> {
    let (filename, data) = read_image_field(multipart).await?;

    let extension =
        image_extension(&filename).ok_or_else(|| AppError::unprocessable(INVALID_IMAGE))?;

    let data = tokio::task::spawn_blocking(move || is_decodable_image(&data).then_some(data))
        .await
        .map_err(|e| {
            tracing::error!("Image validation task failed: {e}");
            AppError::new(
                StatusCode::INTERNAL_SERVER_ERROR,
                "internal_error",
                "Internal server error",
                true,
            )
        })?
        .ok_or_else(|| AppError::unprocessable(CORRUPTED_IMAGE))?;

    let uploaded = media_storage.upload_image(&user.id, data, &extension).await?;

    Ok(Json(uploaded.into()))
}

/// Lists every image the caller uploaded, each with a fresh presigned URL
///
/// # Errors
///
/// - `BucketError` variants - S3 failures
#[instrument(skip(user, media_storage), fields(user_id = %user.id))]
pub async fn list_images(
    user: AuthenticatedUser,
    Extension(media_storage): Extension<Arc<MediaStorage>>,
) -> Result<Json<ListImagesResponse>, AppError> {
    let objects = media_storage.list_user_objects(&user.id).await?;

    Ok(Json(ListImagesResponse {
        items: objects.into_iter().map(StoredImage::from).collect(),
    }))
}
