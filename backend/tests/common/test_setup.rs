use std::sync::Arc;

use aws_config::{BehaviorVersion, Region};
use aws_credential_types::Credentials;
use aws_sdk_s3::Client as S3Client;
use axum::{body::Body, http::Request, response::Response, Router};
use publisher_backend::{
    graph_api::mock::MockGraphApi,
    media_storage::MediaStorage,
    server::{self, Dependencies},
    types::Environment,
};
use publishing_storage::{publishing_metadata::PublishingMetadataStorage, run_migrations};
use sqlx::sqlite::SqlitePoolOptions;
use tower::ServiceExt;

use super::multipart_body;

/// Token the mock Graph API accepts
pub const VALID_TOKEN: &str = "tok";
/// User the valid token belongs to
pub const TEST_USER_ID: &str = "user-1";
/// Bucket created in LocalStack for the ignored S3 tests
pub const TEST_BUCKET: &str = "instagram-publisher-images";

/// Setup test logging
pub fn setup_test_env() {
    tracing_subscriber::fmt()
        .with_max_level(tracing::Level::DEBUG)
        .try_init()
        .ok();
}

/// S3 client for LocalStack with static credentials
pub fn localstack_s3_client() -> S3Client {
    let config = aws_sdk_s3::Config::builder()
        .behavior_version(BehaviorVersion::latest())
        .region(Region::new("us-east-1"))
        .credentials_provider(Credentials::new("test", "test", None, None, "static"))
        .endpoint_url("http://localhost:4566")
        .force_path_style(true)
        .build();

    S3Client::from_conf(config)
}

/// Router wired to a mock Graph API, an in-memory store and LocalStack S3
pub struct TestContext {
    pub router: Router,
    pub graph_api: Arc<MockGraphApi>,
    pub metadata_storage: Arc<PublishingMetadataStorage>,
    pub s3_client: Arc<S3Client>,
}

impl TestContext {
    pub async fn new() -> Self {
        Self::with_graph_api(MockGraphApi::new(VALID_TOKEN, TEST_USER_ID)).await
    }

    pub async fn with_graph_api(graph_api: MockGraphApi) -> Self {
        setup_test_env();

        let environment = Environment::Development {
            presign_expiry_override: None,
        };

        let pool = SqlitePoolOptions::new()
            .max_connections(1)
            .idle_timeout(None)
            .max_lifetime(None)
            .connect("sqlite::memory:")
            .await
            .expect("Failed to open in-memory database");
        run_migrations(&pool)
            .await
            .expect("Failed to run migrations");
        let metadata_storage = Arc::new(PublishingMetadataStorage::new(pool));

        let s3_client = Arc::new(localstack_s3_client());
        let media_storage = Arc::new(MediaStorage::new(
            s3_client.clone(),
            TEST_BUCKET.to_string(),
            environment.presigned_url_expiry_secs(),
        ));

        let graph_api = Arc::new(graph_api);

        let router = server::router(Dependencies {
            environment,
            media_storage,
            graph_api: graph_api.clone(),
            metadata_storage: metadata_storage.clone(),
        });

        Self {
            router,
            graph_api,
            metadata_storage,
            s3_client,
        }
    }

    async fn send(&self, request: Request<Body>) -> Response {
        self.router
            .clone()
            .oneshot(request)
            .await
            .expect("Failed to send request")
    }

    pub async fn send_get_request(&self, route: &str, token: Option<&str>) -> Response {
        let mut builder = Request::builder().uri(route).method("GET");
        if let Some(token) = token {
            builder = builder.header("Authorization", format!("Bearer {token}"));
        }
        self.send(builder.body(Body::empty()).unwrap()).await
    }

    pub async fn send_post_request(
        &self,
        route: &str,
        token: Option<&str>,
        payload: serde_json::Value,
    ) -> Response {
        let mut builder = Request::builder()
            .uri(route)
            .method("POST")
            .header("Content-Type", "application/json");
        if let Some(token) = token {
            builder = builder.header("Authorization", format!("Bearer {token}"));
        }
        self.send(builder.body(Body::from(payload.to_string())).unwrap())
            .await
    }

    pub async fn send_multipart_request(
        &self,
        route: &str,
        token: &str,
        field_name: &str,
        filename: &str,
        data: &[u8],
    ) -> Response {
        let (content_type, body) = multipart_body(field_name, filename, data);
        let request = Request::builder()
            .uri(route)
            .method("POST")
            .header("Authorization", format!("Bearer {token}"))
            .header("Content-Type", content_type)
            .body(Body::from(body))
            .unwrap();
        self.send(request).await
    }
}
