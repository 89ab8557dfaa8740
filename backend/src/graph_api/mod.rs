//! Instagram Graph API integration
//!
//! All calls forward the caller's access token. Bodies are decoded into a
//! [`GraphEnvelope`] so an error marker is always surfaced as
//! [`GraphApiError::Remote`] instead of leaking into the success path.

mod error;
pub mod types;

use std::time::Duration;

use async_trait::async_trait;
use reqwest::{Client, Method, Url};
use reqwest_middleware::{ClientBuilder, ClientWithMiddleware};
use reqwest_tracing::TracingMiddleware;
use serde::de::DeserializeOwned;
use serde_json::Value;
use tracing::instrument;

pub use error::{GraphApiError, GraphApiResult};
pub use types::{CreatedObject, GraphEnvelope, GraphErrorBody, Identity};

/// Default request timeout in seconds
const DEFAULT_REQUEST_TIMEOUT_SECS: u64 = 30;
/// Maximum number of idle connections to maintain per host
const MAX_IDLE_CONNECTIONS_PER_HOST: usize = 10;

const ME_FIELDS: &str = "permissions,name";
const ACCOUNT_FIELDS: &str = "about,instagram_business_account,genre,bio,category";
const ACCOUNTS_LIST_FIELDS: &str = "name,instagram_business_account";
const MEDIA_FIELDS: &str = "id,caption,media_type,media_url,permalink,timestamp";
const INSIGHT_METRICS: &str = "impressions,reach,saved";

/// Operations offered by the Instagram Graph API
#[async_trait]
pub trait GraphApi: Send + Sync {
    /// Verifies the token and returns the identity of its owner with the token attached
    async fn me(&self, token: &str) -> GraphApiResult<Identity>;

    /// Fetches a Facebook page together with its linked Instagram Business Account
    async fn get_instagram_account(&self, token: &str, page_id: &str) -> GraphApiResult<Value>;

    /// Lists the pages of the token owner with their Instagram Business Accounts
    async fn list_instagram_accounts(&self, token: &str) -> GraphApiResult<Value>;

    /// Lists the pages the token owner manages
    async fn get_user_pages(&self, token: &str) -> GraphApiResult<Value>;

    /// Creates an image container and returns its id
    async fn create_image_container(
        &self,
        token: &str,
        business_account_id: &str,
        image_url: &str,
        caption: Option<&str>,
    ) -> GraphApiResult<String>;

    /// Publishes a container and returns the id of the published media
    async fn publish_container(
        &self,
        token: &str,
        business_account_id: &str,
        container_id: &str,
    ) -> GraphApiResult<String>;

    /// Fetches insights of a published media
    async fn get_media_insights(&self, token: &str, media_id: &str) -> GraphApiResult<Value>;

    /// Lists the media of an Instagram Business Account
    async fn list_media(&self, token: &str, business_account_id: &str) -> GraphApiResult<Value>;
}

/// Whether `id` has the shape of a Graph API node id (`[0-9A-Za-z_]+`)
#[must_use]
pub fn is_node_id(id: &str) -> bool {
    !id.is_empty()
        && id
            .bytes()
            .all(|byte| byte.is_ascii_alphanumeric() || byte == b'_')
}

fn node_id(id: &str) -> GraphApiResult<&str> {
    if is_node_id(id) {
        Ok(id)
    } else {
        Err(GraphApiError::InvalidId(id.to_string()))
    }
}

/// HTTP client for the Graph API
pub struct GraphApiClient {
    endpoint_base: Url,
    http_client: ClientWithMiddleware,
    debug: bool,
}

impl GraphApiClient {
    /// Creates a new Graph API client
    ///
    /// # Arguments
    ///
    /// * `base_url` - Graph API host, e.g. `https://graph.facebook.com`
    /// * `version` - API version segment, e.g. `v18.0`
    /// * `debug` - Log every call with its parameters and response
    ///
    /// # Panics
    ///
    /// If the HTTP client fails to be created or `base_url` is not an absolute URL
    #[must_use]
    pub fn new(base_url: &str, version: &str, debug: bool) -> Self {
        let reqwest_client = Client::builder()
            .timeout(Duration::from_secs(DEFAULT_REQUEST_TIMEOUT_SECS))
            .pool_max_idle_per_host(MAX_IDLE_CONNECTIONS_PER_HOST)
            .user_agent(format!("publisher-backend/{}", env!("CARGO_PKG_VERSION")))
            .build()
            .expect("Failed to create HTTP client");

        let http_client = ClientBuilder::new(reqwest_client)
            .with(TracingMiddleware::default())
            .build();

        let mut endpoint_base = Url::parse(base_url).expect("Invalid Graph API base URL");
        endpoint_base
            .path_segments_mut()
            .expect("Graph API base URL must be hierarchical")
            .pop_if_empty()
            .push(version);

        Self {
            endpoint_base,
            http_client,
            debug,
        }
    }

    /// Appends percent-encoded path segments to `{base_url}/{version}`
    fn endpoint(&self, segments: &[&str]) -> Url {
        let mut url = self.endpoint_base.clone();
        // `new` only keeps URLs that have a path
        if let Ok(mut path) = url.path_segments_mut() {
            path.extend(segments);
        }
        url
    }

    /// Sends one request and decodes its body
    ///
    /// `params` never contains the access token so it can be logged as is.
    async fn call<T: DeserializeOwned>(
        &self,
        method: Method,
        path: &[&str],
        params: &[(&str, &str)],
        token: &str,
    ) -> GraphApiResult<T> {
        let url = self.endpoint(path);
        let mut query = params.to_vec();
        query.push(("access_token", token));

        let response = self
            .http_client
            .request(method.clone(), url.clone())
            .query(&query)
            .send()
            .await?;

        let status = response.status().as_u16();
        let body = response.text().await?;

        if self.debug {
            tracing::debug!(%method, %url, ?params, status, %body, "Graph API call");
        }

        decode_response(status, &body)
    }
}

/// Decodes a Graph API body into its payload
///
/// # Errors
///
/// - `GraphApiError::Remote` - the body carries an error marker
/// - `GraphApiError::UnexpectedStatus` - non-2xx status without an error marker
/// - `GraphApiError::Malformed` - 2xx status with a body that does not decode
pub fn decode_response<T: DeserializeOwned>(status: u16, body: &str) -> GraphApiResult<T> {
    let is_success = (200..300).contains(&status);

    match serde_json::from_str::<GraphEnvelope<T>>(body) {
        Ok(GraphEnvelope::Failure { error }) => Err(GraphApiError::Remote(error)),
        Ok(GraphEnvelope::Success(payload)) if is_success => Ok(payload),
        Ok(GraphEnvelope::Success(_)) => Err(GraphApiError::UnexpectedStatus {
            status,
            body: body.to_string(),
        }),
        Err(_) if !is_success => Err(GraphApiError::UnexpectedStatus {
            status,
            body: body.to_string(),
        }),
        Err(err) => Err(GraphApiError::Malformed(err)),
    }
}

fn created_id(created: CreatedObject) -> GraphApiResult<String> {
    created
        .id
        .filter(|id| !id.is_empty())
        .ok_or(GraphApiError::MissingField("id"))
}

#[async_trait]
impl GraphApi for GraphApiClient {
    #[instrument(skip_all)]
    async fn me(&self, token: &str) -> GraphApiResult<Identity> {
        let mut identity: Identity = self
            .call(Method::GET, &["me"], &[("fields", ME_FIELDS)], token)
            .await
            .map_err(GraphApiError::into_identity_error)?;

        identity.token = Some(token.to_string());
        Ok(identity)
    }

    #[instrument(skip(self, token))]
    async fn get_instagram_account(&self, token: &str, page_id: &str) -> GraphApiResult<Value> {
        let page_id = node_id(page_id)?;
        self.call(Method::GET, &[page_id], &[("fields", ACCOUNT_FIELDS)], token)
            .await
    }

    #[instrument(skip_all)]
    async fn list_instagram_accounts(&self, token: &str) -> GraphApiResult<Value> {
        self.call(
            Method::GET,
            &["me", "accounts"],
            &[("fields", ACCOUNTS_LIST_FIELDS)],
            token,
        )
        .await
    }

    #[instrument(skip_all)]
    async fn get_user_pages(&self, token: &str) -> GraphApiResult<Value> {
        self.call(Method::GET, &["me", "accounts"], &[], token)
            .await
    }

    #[instrument(skip(self, token, caption))]
    async fn create_image_container(
        &self,
        token: &str,
        business_account_id: &str,
        image_url: &str,
        caption: Option<&str>,
    ) -> GraphApiResult<String> {
        let business_account_id = node_id(business_account_id)?;
        let mut params = vec![("image_url", image_url)];
        if let Some(caption) = caption {
            params.push(("caption", caption));
        }

        let created: CreatedObject = self
            .call(
                Method::POST,
                &[business_account_id, "media"],
                &params,
                token,
            )
            .await?;

        created_id(created)
    }

    #[instrument(skip(self, token))]
    async fn publish_container(
        &self,
        token: &str,
        business_account_id: &str,
        container_id: &str,
    ) -> GraphApiResult<String> {
        let business_account_id = node_id(business_account_id)?;
        let created: CreatedObject = self
            .call(
                Method::POST,
                &[business_account_id, "media_publish"],
                &[("creation_id", container_id)],
                token,
            )
            .await?;

        created_id(created)
    }

    #[instrument(skip(self, token))]
    async fn get_media_insights(&self, token: &str, media_id: &str) -> GraphApiResult<Value> {
        let media_id = node_id(media_id)?;
        self.call(
            Method::GET,
            &[media_id, "insights"],
            &[("metric", INSIGHT_METRICS)],
            token,
        )
        .await
    }

    #[instrument(skip(self, token))]
    async fn list_media(&self, token: &str, business_account_id: &str) -> GraphApiResult<Value> {
        let business_account_id = node_id(business_account_id)?;
        self.call(
            Method::GET,
            &[business_account_id, "media"],
            &[("fields", MEDIA_FIELDS)],
            token,
        )
        .await
    }
}

#[cfg(any(test, feature = "test-utils"))]
pub mod mock {
    use std::sync::atomic::{AtomicUsize, Ordering};

    use async_trait::async_trait;
    use serde_json::{json, Value};

    use super::{GraphApi, GraphApiError, GraphApiResult, GraphErrorBody, Identity};
    use crate::graph_api::types::{Permission, Permissions, OAUTH_EXCEPTION};

    /// In-process Graph API that accepts a single token
    pub struct MockGraphApi {
        valid_token: String,
        identity: Identity,
        container_id: Option<String>,
        published_media_id: Option<String>,
        container_error: Option<GraphErrorBody>,
        publish_error: Option<GraphErrorBody>,
        container_calls: AtomicUsize,
        publish_calls: AtomicUsize,
    }

    impl MockGraphApi {
        /// Creates a mock that accepts `valid_token` for the user `user_id`
        ///
        /// Containers are created as `C1` and published as `M1` until overridden.
        #[must_use]
        pub fn new(valid_token: &str, user_id: &str) -> Self {
            Self {
                valid_token: valid_token.to_string(),
                identity: Identity {
                    id: user_id.to_string(),
                    name: "Test User".to_string(),
                    permissions: Permissions {
                        data: Some(vec![Permission {
                            permission: "instagram_content_publish".to_string(),
                            status: "granted".to_string(),
                        }]),
                    },
                    token: None,
                },
                container_id: Some("C1".to_string()),
                published_media_id: Some("M1".to_string()),
                container_error: None,
                publish_error: None,
                container_calls: AtomicUsize::new(0),
                publish_calls: AtomicUsize::new(0),
            }
        }

        /// Overrides the id returned by container creation, `None` omits it
        #[must_use]
        pub fn with_container_id(mut self, container_id: Option<&str>) -> Self {
            self.container_id = container_id.map(ToString::to_string);
            self
        }

        /// Overrides the id returned by publishing, `None` omits it
        #[must_use]
        pub fn with_published_media_id(mut self, media_id: Option<&str>) -> Self {
            self.published_media_id = media_id.map(ToString::to_string);
            self
        }

        /// Makes container creation answer with an error payload
        #[must_use]
        pub fn with_container_error(mut self, error: GraphErrorBody) -> Self {
            self.container_error = Some(error);
            self
        }

        /// Makes publishing answer with an error payload
        #[must_use]
        pub fn with_publish_error(mut self, error: GraphErrorBody) -> Self {
            self.publish_error = Some(error);
            self
        }

        /// Number of container creation calls received
        #[must_use]
        pub fn container_calls(&self) -> usize {
            self.container_calls.load(Ordering::SeqCst)
        }

        /// Number of publish calls received
        #[must_use]
        pub fn publish_calls(&self) -> usize {
            self.publish_calls.load(Ordering::SeqCst)
        }

        fn authorize(&self, token: &str) -> GraphApiResult<()> {
            if token == self.valid_token {
                Ok(())
            } else {
                Err(GraphApiError::Remote(GraphErrorBody {
                    message: "Invalid OAuth access token.".to_string(),
                    error_type: OAUTH_EXCEPTION.to_string(),
                    code: 190,
                    error_subcode: None,
                    fbtrace_id: None,
                }))
            }
        }
    }

    #[async_trait]
    impl GraphApi for MockGraphApi {
        async fn me(&self, token: &str) -> GraphApiResult<Identity> {
            self.authorize(token)
                .map_err(GraphApiError::into_identity_error)?;

            let mut identity = self.identity.clone();
            identity.token = Some(token.to_string());
            Ok(identity)
        }

        async fn get_instagram_account(&self, token: &str, page_id: &str) -> GraphApiResult<Value> {
            self.authorize(token)?;
            Ok(json!({
                "id": page_id,
                "instagram_business_account": {"id": "IGB123"},
                "category": "Brand"
            }))
        }

        async fn list_instagram_accounts(&self, token: &str) -> GraphApiResult<Value> {
            self.authorize(token)?;
            Ok(json!({
                "data": [{"id": "P1", "name": "Page", "instagram_business_account": {"id": "IGB123"}}]
            }))
        }

        async fn get_user_pages(&self, token: &str) -> GraphApiResult<Value> {
            self.authorize(token)?;
            Ok(json!({"data": [{"id": "P1", "name": "Page"}]}))
        }

        async fn create_image_container(
            &self,
            token: &str,
            _business_account_id: &str,
            _image_url: &str,
            _caption: Option<&str>,
        ) -> GraphApiResult<String> {
            self.authorize(token)?;
            self.container_calls.fetch_add(1, Ordering::SeqCst);

            if let Some(error) = &self.container_error {
                return Err(GraphApiError::Remote(error.clone()));
            }
            self.container_id
                .clone()
                .ok_or(GraphApiError::MissingField("id"))
        }

        async fn publish_container(
            &self,
            token: &str,
            _business_account_id: &str,
            _container_id: &str,
        ) -> GraphApiResult<String> {
            self.authorize(token)?;
            self.publish_calls.fetch_add(1, Ordering::SeqCst);

            if let Some(error) = &self.publish_error {
                return Err(GraphApiError::Remote(error.clone()));
            }
            self.published_media_id
                .clone()
                .ok_or(GraphApiError::MissingField("id"))
        }

        async fn get_media_insights(&self, token: &str, media_id: &str) -> GraphApiResult<Value> {
            self.authorize(token)?;
            Ok(json!({
                "data": [{"name": "reach", "period": "lifetime", "values": [{"value": 7}]}],
                "id": media_id
            }))
        }

        async fn list_media(&self, token: &str, business_account_id: &str) -> GraphApiResult<Value> {
            self.authorize(token)?;
            Ok(json!({
                "data": [{"id": "M1", "media_type": "IMAGE"}],
                "owner": business_account_id
            }))
        }
    }
}
