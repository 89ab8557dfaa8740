//! Media listing and insights

use std::sync::Arc;

use serde_json::Value;
use tracing::instrument;

use crate::graph_api::{GraphApi, GraphApiResult};

/// Read-only media queries on behalf of the caller
pub struct InsightService {
    graph_api: Arc<dyn GraphApi>,
}

impl InsightService {
    /// Creates a new insight service
    #[must_use]
    pub fn new(graph_api: Arc<dyn GraphApi>) -> Self {
        Self { graph_api }
    }

    /// Returns the insights of a published media
    ///
    /// # Errors
    ///
    /// Propagates `GraphApiError` from the Graph API call
    #[instrument(skip(self, token))]
    pub async fn get_image_insights(&self, media_id: &str, token: &str) -> GraphApiResult<Value> {
        self.graph_api.get_media_insights(token, media_id).await
    }

    /// Lists every media of an Instagram Business Account
    ///
    /// # Errors
    ///
    /// Propagates `GraphApiError` from the Graph API call
    #[instrument(skip(self, token))]
    pub async fn list_media(&self, business_account_id: &str, token: &str) -> GraphApiResult<Value> {
        self.graph_api.list_media(token, business_account_id).await
    }
}
