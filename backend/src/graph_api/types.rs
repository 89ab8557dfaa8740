use schemars::JsonSchema;
use serde::{Deserialize, Serialize};

/// Error type the Graph API uses for invalid, expired or missing tokens
pub const OAUTH_EXCEPTION: &str = "OAuthException";

/// The `error` object of a failed Graph API call
#[derive(Debug, Clone, PartialEq, Eq, Deserialize, Serialize)]
pub struct GraphErrorBody {
    /// Human readable message
    #[serde(default)]
    pub message: String,
    /// Error class, e.g. `OAuthException`
    #[serde(rename = "type", default)]
    pub error_type: String,
    /// Numeric error code
    #[serde(default)]
    pub code: i64,
    /// Optional sub code
    #[serde(default)]
    pub error_subcode: Option<i64>,
    /// Trace id for Meta support
    #[serde(default)]
    pub fbtrace_id: Option<String>,
}

impl GraphErrorBody {
    /// Whether the error is an authorization failure
    #[must_use]
    pub fn is_oauth(&self) -> bool {
        self.error_type == OAUTH_EXCEPTION
    }
}

/// Every Graph API body is either an error marker or the success payload
#[derive(Debug, Deserialize)]
#[serde(untagged)]
pub enum GraphEnvelope<T> {
    /// `{"error": {...}}`
    Failure {
        /// Error details
        error: GraphErrorBody,
    },
    /// Anything else
    Success(T),
}

/// Payload of calls that create a remote object
#[derive(Debug, Deserialize)]
pub struct CreatedObject {
    /// Id of the created object
    pub id: Option<String>,
}

/// A permission granted to the access token
#[derive(Debug, Clone, PartialEq, Eq, Deserialize, Serialize, JsonSchema)]
pub struct Permission {
    /// Permission name, e.g. `instagram_content_publish`
    pub permission: String,
    /// `granted` or `declined`
    pub status: String,
}

/// Paged permission list as returned by the `me` endpoint
#[derive(Debug, Clone, Default, PartialEq, Eq, Deserialize, Serialize, JsonSchema)]
pub struct Permissions {
    /// Permissions, absent when none were requested
    pub data: Option<Vec<Permission>>,
}

/// Verified identity of the token owner
#[derive(Debug, Clone, PartialEq, Eq, Deserialize, Serialize, JsonSchema)]
pub struct Identity {
    /// Identity provider user id
    pub id: String,
    /// Display name
    pub name: String,
    /// Permissions granted to the token
    #[serde(default)]
    pub permissions: Permissions,
    /// Token the identity was verified with, reused for downstream calls
    #[serde(skip)]
    pub token: Option<String>,
}

impl Identity {
    /// Whether the token was granted the given permission
    #[must_use]
    pub fn has_permission(&self, permission: &str) -> bool {
        self.permissions.data.as_ref().is_some_and(|data| {
            data.iter()
                .any(|p| p.permission == permission && p.status == "granted")
        })
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use serde_json::json;

    #[test]
    fn test_envelope_detects_error_marker() {
        let body = json!({
            "error": {
                "message": "Invalid OAuth access token.",
                "type": "OAuthException",
                "code": 190,
                "fbtrace_id": "AbC"
            }
        });

        let envelope: GraphEnvelope<serde_json::Value> = serde_json::from_value(body).unwrap();
        match envelope {
            GraphEnvelope::Failure { error } => {
                assert!(error.is_oauth());
                assert_eq!(error.code, 190);
                assert_eq!(error.fbtrace_id.as_deref(), Some("AbC"));
            }
            GraphEnvelope::Success(_) => panic!("Expected failure envelope"),
        }
    }

    #[test]
    fn test_envelope_passes_payload_through() {
        let body = json!({"data": [{"id": "1"}], "paging": {}});

        let envelope: GraphEnvelope<serde_json::Value> =
            serde_json::from_value(body.clone()).unwrap();
        match envelope {
            GraphEnvelope::Success(value) => assert_eq!(value, body),
            GraphEnvelope::Failure { .. } => panic!("Expected success envelope"),
        }
    }

    #[test]
    fn test_created_object_without_id() {
        let envelope: GraphEnvelope<CreatedObject> = serde_json::from_value(json!({})).unwrap();
        assert!(matches!(
            envelope,
            GraphEnvelope::Success(CreatedObject { id: None })
        ));
    }

    #[test]
    fn test_identity_permissions() {
        let identity: Identity = serde_json::from_value(json!({
            "id": "42",
            "name": "Jane",
            "permissions": {"data": [
                {"permission": "instagram_content_publish", "status": "granted"},
                {"permission": "pages_show_list", "status": "declined"}
            ]}
        }))
        .unwrap();

        assert_eq!(identity.token, None);
        assert!(identity.has_permission("instagram_content_publish"));
        assert!(!identity.has_permission("pages_show_list"));
        assert!(!identity.has_permission("instagram_basic"));
    }

    #[test]
    fn test_identity_token_is_never_serialized() {
        let identity = Identity {
            id: "42".to_string(),
            name: "Jane".to_string(),
            permissions: Permissions::default(),
            token: Some("secret".to_string()),
        };

        let value = serde_json::to_value(&identity).unwrap();
        assert!(value.get("token").is_none());
    }
}
