use std::sync::Arc;

use aws_sdk_s3::Client as S3Client;
use publisher_backend::{
    graph_api::GraphApiClient,
    media_storage::MediaStorage,
    server::{self, Dependencies},
    types::Environment,
};
use publishing_storage::{publishing_metadata::PublishingMetadataStorage, run_migrations};
use sqlx::sqlite::SqlitePoolOptions;
use tracing_subscriber::{fmt, EnvFilter};

/// Maximum number of pooled database connections
const DATABASE_MAX_CONNECTIONS: u32 = 5;

#[tokio::main]
async fn main() -> anyhow::Result<()> {
    dotenvy::dotenv().ok();

    let environment = Environment::from_env();

    // Configure logging format based on environment
    // Use JSON format for staging/production (Datadog), regular format for development
    match environment {
        Environment::Production | Environment::Staging => {
            fmt()
                .json()
                .with_env_filter(EnvFilter::from_default_env())
                .init();
        }
        Environment::Development { .. } => {
            fmt().with_env_filter(EnvFilter::from_default_env()).init();
        }
    }

    let s3_client = Arc::new(S3Client::from_conf(environment.s3_client_config().await));
    let media_storage = Arc::new(MediaStorage::new(
        s3_client,
        environment.s3_bucket(),
        environment.presigned_url_expiry_secs(),
    ));

    let pool = SqlitePoolOptions::new()
        .max_connections(DATABASE_MAX_CONNECTIONS)
        .connect(&environment.database_url())
        .await?;
    run_migrations(&pool).await?;
    let metadata_storage = Arc::new(PublishingMetadataStorage::new(pool));

    let graph_api = Arc::new(GraphApiClient::new(
        &environment.graph_api_base_url(),
        &environment.graph_api_version(),
        environment.is_debug(),
    ));

    tracing::info!("Starting in {environment} environment");

    server::start(Dependencies {
        environment,
        media_storage,
        graph_api,
        metadata_storage,
    })
    .await
}
