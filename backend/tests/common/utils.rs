use std::io::Cursor;

use axum::response::Response;
use http_body_util::BodyExt;
use image::{DynamicImage, ImageFormat, RgbImage};

const BOUNDARY: &str = "publisher-test-boundary";

/// Parse response body to JSON
pub async fn parse_response_body(response: Response) -> serde_json::Value {
    let body = response.into_body().collect().await.unwrap().to_bytes();
    serde_json::from_slice(&body).unwrap()
}

/// Encode a small PNG, `seed` varies the pixel data so digests differ
pub fn png_bytes(seed: u8) -> Vec<u8> {
    let image = RgbImage::from_pixel(4, 4, image::Rgb([seed, 0, 255 - seed]));
    let mut cursor = Cursor::new(Vec::new());
    DynamicImage::ImageRgb8(image)
        .write_to(&mut cursor, ImageFormat::Png)
        .unwrap();
    cursor.into_inner()
}

/// Build a single-file `multipart/form-data` body, returns the content type and body
pub fn multipart_body(field_name: &str, filename: &str, data: &[u8]) -> (String, Vec<u8>) {
    let mut body = Vec::new();
    body.extend_from_slice(format!("--{BOUNDARY}\r\n").as_bytes());
    body.extend_from_slice(
        format!(
            "Content-Disposition: form-data; name=\"{field_name}\"; filename=\"{filename}\"\r\n"
        )
        .as_bytes(),
    );
    body.extend_from_slice(b"Content-Type: application/octet-stream\r\n\r\n");
    body.extend_from_slice(data);
    body.extend_from_slice(format!("\r\n--{BOUNDARY}--\r\n").as_bytes());

    (format!("multipart/form-data; boundary={BOUNDARY}"), body)
}
