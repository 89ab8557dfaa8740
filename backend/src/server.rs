use std::sync::Arc;

use aide::openapi::OpenApi;
use axum::{extract::DefaultBodyLimit, Extension};
use datadog_tracing::axum::{shutdown_signal, OtelAxumLayer, OtelInResponseLayer};
use publishing_storage::publishing_metadata::PublishingMetadataStorage;
use tokio::net::TcpListener;
use tower_http::cors::CorsLayer;

use crate::{
    graph_api::GraphApi,
    media_storage::MediaStorage,
    routes::{self, v1::images::MAX_UPLOAD_BYTES},
    services::{AccountService, InsightService, MediaPublisher},
    types::Environment,
};

/// Multipart framing overhead allowed on top of the image itself
const MULTIPART_OVERHEAD_BYTES: usize = 64 * 1024;

/// Shared dependencies handed to every request
#[derive(Clone)]
pub struct Dependencies {
    /// Runtime environment
    pub environment: Environment,
    /// S3 image storage
    pub media_storage: Arc<MediaStorage>,
    /// Graph API client
    pub graph_api: Arc<dyn GraphApi>,
    /// Publishing metadata store
    pub metadata_storage: Arc<PublishingMetadataStorage>,
}

/// Builds the application router with every layer and shared dependency attached
pub fn router(dependencies: Dependencies) -> axum::Router {
    let Dependencies {
        environment,
        media_storage,
        graph_api,
        metadata_storage,
    } = dependencies;

    let media_publisher = Arc::new(MediaPublisher::new(
        graph_api.clone(),
        metadata_storage.clone(),
    ));
    let account_service = Arc::new(AccountService::new(graph_api.clone()));
    let insight_service = Arc::new(InsightService::new(graph_api.clone()));

    let mut openapi = OpenApi::default();

    routes::handler()
        .finish_api(&mut openapi)
        .layer(Extension(openapi))
        .layer(Extension(environment))
        .layer(Extension(media_storage))
        .layer(Extension(graph_api))
        .layer(Extension(metadata_storage))
        .layer(Extension(media_publisher))
        .layer(Extension(account_service))
        .layer(Extension(insight_service))
        .layer(DefaultBodyLimit::max(
            MAX_UPLOAD_BYTES + MULTIPART_OVERHEAD_BYTES,
        ))
        .layer(CorsLayer::permissive())
        // Include trace context as header into the response
        .layer(OtelInResponseLayer)
        // Start OpenTelemetry trace on incoming request
        .layer(OtelAxumLayer::default())
        .layer(tower_http::timeout::TimeoutLayer::new(
            std::time::Duration::from_secs(30),
        ))
}

/// Starts the server with the given dependencies
///
/// # Errors
///
/// Returns an error if the server fails to start or bind to the port
pub async fn start(dependencies: Dependencies) -> anyhow::Result<()> {
    let router = router(dependencies);

    let addr = std::net::SocketAddr::from((
        [0, 0, 0, 0],
        std::env::var("PORT").map_or(Ok(8001), |p| p.parse())?,
    ));

    let listener = TcpListener::bind(&addr).await?;
    tracing::info!("🔄 Instagram Publisher Backend started on http://{addr}");

    axum::serve(listener, router.into_make_service())
        .with_graceful_shutdown(shutdown_signal())
        .await
        .map_err(anyhow::Error::from)
}
