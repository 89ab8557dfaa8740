//! Facebook page and Instagram Business Account lookups

use std::sync::Arc;

use serde_json::Value;
use tracing::instrument;

use crate::graph_api::{GraphApi, GraphApiResult};

/// Account lookups on behalf of the caller
pub struct AccountService {
    graph_api: Arc<dyn GraphApi>,
}

impl AccountService {
    /// Creates a new account service
    #[must_use]
    pub fn new(graph_api: Arc<dyn GraphApi>) -> Self {
        Self { graph_api }
    }

    /// Returns one page with its Instagram account, or every account of the caller
    ///
    /// # Errors
    ///
    /// Propagates `GraphApiError` from the Graph API call
    #[instrument(skip(self, token))]
    pub async fn get_instagram_account_info(
        &self,
        page_id: Option<&str>,
        token: &str,
    ) -> GraphApiResult<Value> {
        match page_id {
            Some(page_id) => self.graph_api.get_instagram_account(token, page_id).await,
            None => self.graph_api.list_instagram_accounts(token).await,
        }
    }

    /// Returns the pages managed by the caller
    ///
    /// # Errors
    ///
    /// Propagates `GraphApiError` from the Graph API call
    pub async fn get_user_pages(&self, token: &str) -> GraphApiResult<Value> {
        self.graph_api.get_user_pages(token).await
    }
}
