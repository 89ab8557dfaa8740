mod common;

use common::*;

use http::StatusCode;
use pretty_assertions::assert_eq;
use publisher_backend::graph_api::{mock::MockGraphApi, GraphErrorBody};
use publishing_storage::publishing_metadata::NewPublishingMetadata;
use serde_json::json;

fn publish_payload() -> serde_json::Value {
    json!({
        "instagram_business_account_id": "IGB123",
        "image_url": "https://x/img.png",
        "caption": "hello"
    })
}

#[tokio::test]
async fn test_publish_image_records_remote_ids() {
    let context = TestContext::new().await;

    let response = context
        .send_post_request("/v1/instagram/images", Some(VALID_TOKEN), publish_payload())
        .await;

    assert_eq!(response.status(), StatusCode::CREATED);
    let body = parse_response_body(response).await;
    assert_eq!(body["recorded"], true);
    assert_eq!(body["instagram_media_container_id"], "C1");
    assert_eq!(body["instagram_media_published_id"], "M1");

    let record = &body["record"];
    assert_eq!(record["instagram_business_account_id"], "IGB123");
    assert_eq!(record["image_url"], "https://x/img.png");
    assert_eq!(record["caption"], "hello");
    assert_eq!(record["instagram_media_container_id"], "C1");
    assert_eq!(record["instagram_media_published_id"], "M1");

    let stored = context
        .metadata_storage
        .get_by_published_media_id("M1")
        .await
        .unwrap()
        .expect("Record should be stored");
    assert_eq!(stored.auth_id, TEST_USER_ID);
    assert_eq!(context.graph_api.container_calls(), 1);
    assert_eq!(context.graph_api.publish_calls(), 1);
}

#[tokio::test]
async fn test_publish_without_caption() {
    let context = TestContext::new().await;

    let response = context
        .send_post_request(
            "/v1/instagram/images",
            Some(VALID_TOKEN),
            json!({"instagram_business_account_id": "IGB123", "image_url": "https://x/img.png"}),
        )
        .await;

    assert_eq!(response.status(), StatusCode::CREATED);
    let body = parse_response_body(response).await;
    assert!(body["record"]["caption"].is_null());
}

#[tokio::test]
async fn test_duplicate_publish_is_reported_unrecorded() {
    let context = TestContext::new().await;

    let first = context
        .send_post_request("/v1/instagram/images", Some(VALID_TOKEN), publish_payload())
        .await;
    assert_eq!(first.status(), StatusCode::CREATED);

    let second = context
        .send_post_request("/v1/instagram/images", Some(VALID_TOKEN), publish_payload())
        .await;

    assert_eq!(second.status(), StatusCode::CREATED);
    let body = parse_response_body(second).await;
    assert_eq!(body["recorded"], false);
    assert_eq!(body["instagram_media_published_id"], "M1");
    assert!(body["record"].is_null());
}

#[tokio::test]
async fn test_publish_rejects_invalid_payload() {
    let context = TestContext::new().await;

    let response = context
        .send_post_request(
            "/v1/instagram/images",
            Some(VALID_TOKEN),
            json!({"instagram_business_account_id": "IGB123", "image_url": "not a url"}),
        )
        .await;

    assert_eq!(response.status(), StatusCode::BAD_REQUEST);
    let body = parse_response_body(response).await;
    assert_eq!(body["error"]["code"], "validation_error");
    assert_eq!(body["error"]["message"], "image_url must be a valid URL");
    assert_eq!(context.graph_api.container_calls(), 0);
}

#[tokio::test]
async fn test_container_failure_maps_to_bad_gateway() {
    let graph_api = MockGraphApi::new(VALID_TOKEN, TEST_USER_ID).with_container_error(
        GraphErrorBody {
            message: "Media download has failed.".to_string(),
            error_type: "OAuthException".to_string(),
            code: 9004,
            error_subcode: None,
            fbtrace_id: None,
        },
    );
    let context = TestContext::with_graph_api(graph_api).await;

    let response = context
        .send_post_request("/v1/instagram/images", Some(VALID_TOKEN), publish_payload())
        .await;

    assert_eq!(response.status(), StatusCode::BAD_GATEWAY);
    let body = parse_response_body(response).await;
    assert_eq!(body["error"]["code"], "external_api_error");
    assert_eq!(body["error"]["message"], "Media download has failed.");
    assert_eq!(context.graph_api.publish_calls(), 0);
}

#[tokio::test]
async fn test_missing_published_id_maps_to_bad_gateway() {
    let graph_api =
        MockGraphApi::new(VALID_TOKEN, TEST_USER_ID).with_published_media_id(None);
    let context = TestContext::with_graph_api(graph_api).await;

    let response = context
        .send_post_request("/v1/instagram/images", Some(VALID_TOKEN), publish_payload())
        .await;

    assert_eq!(response.status(), StatusCode::BAD_GATEWAY);
    assert!(context
        .metadata_storage
        .list_by_auth_id(TEST_USER_ID, 1, 10)
        .await
        .unwrap()
        .items
        .is_empty());
}

#[tokio::test]
async fn test_publish_history_lists_callers_records() {
    let context = TestContext::new().await;

    context
        .send_post_request("/v1/instagram/images", Some(VALID_TOKEN), publish_payload())
        .await;

    let response = context
        .send_get_request("/v1/instagram/images?page=1&size=5", Some(VALID_TOKEN))
        .await;

    assert_eq!(response.status(), StatusCode::OK);
    let body = parse_response_body(response).await;
    assert_eq!(body["total"], 1);
    assert_eq!(body["total_page"], 1);
    assert_eq!(body["page"], 1);
    assert_eq!(body["size"], 5);
    assert_eq!(body["items"][0]["instagram_media_published_id"], "M1");
}

#[tokio::test]
async fn test_publish_history_defaults_and_bounds() {
    let context = TestContext::new().await;

    let response = context
        .send_get_request("/v1/instagram/images", Some(VALID_TOKEN))
        .await;
    assert_eq!(response.status(), StatusCode::OK);
    let body = parse_response_body(response).await;
    assert_eq!(body["total"], 0);
    assert_eq!(body["page"], 1);
    assert_eq!(body["size"], 10);

    let response = context
        .send_get_request("/v1/instagram/images?page=0", Some(VALID_TOKEN))
        .await;
    assert_eq!(response.status(), StatusCode::BAD_REQUEST);

    let response = context
        .send_get_request("/v1/instagram/images?size=101", Some(VALID_TOKEN))
        .await;
    assert_eq!(response.status(), StatusCode::BAD_REQUEST);
}

#[tokio::test]
async fn test_account_info_by_page_or_list() {
    let context = TestContext::new().await;

    let response = context
        .send_get_request("/v1/instagram/account?page_id=P9", Some(VALID_TOKEN))
        .await;
    assert_eq!(response.status(), StatusCode::OK);
    let body = parse_response_body(response).await;
    assert_eq!(body["id"], "P9");
    assert_eq!(body["instagram_business_account"]["id"], "IGB123");

    let response = context
        .send_get_request("/v1/instagram/account", Some(VALID_TOKEN))
        .await;
    assert_eq!(response.status(), StatusCode::OK);
    let body = parse_response_body(response).await;
    assert!(body["data"].is_array());
}

#[tokio::test]
async fn test_user_pages() {
    let context = TestContext::new().await;

    let response = context
        .send_get_request("/v1/instagram/user-pages", Some(VALID_TOKEN))
        .await;

    assert_eq!(response.status(), StatusCode::OK);
    let body = parse_response_body(response).await;
    assert_eq!(body["data"][0]["id"], "P1");
}

#[tokio::test]
async fn test_image_insights() {
    let context = TestContext::new().await;

    let response = context
        .send_get_request("/v1/instagram/images/M1/insights", Some(VALID_TOKEN))
        .await;

    assert_eq!(response.status(), StatusCode::OK);
    let body = parse_response_body(response).await;
    assert_eq!(body["id"], "M1");
    assert_eq!(body["data"][0]["name"], "reach");
}

#[tokio::test]
async fn test_list_media_requires_account_id() {
    let context = TestContext::new().await;

    let response = context
        .send_get_request(
            "/v1/instagram/medias?instagram_business_account_id=IGB123",
            Some(VALID_TOKEN),
        )
        .await;
    assert_eq!(response.status(), StatusCode::OK);
    let body = parse_response_body(response).await;
    assert_eq!(body["owner"], "IGB123");

    let response = context
        .send_get_request("/v1/instagram/medias", Some(VALID_TOKEN))
        .await;
    assert_eq!(response.status(), StatusCode::BAD_REQUEST);
}

#[tokio::test]
async fn test_published_image_is_visible_to_its_publisher_only() {
    let context = TestContext::new().await;

    context
        .send_post_request("/v1/instagram/images", Some(VALID_TOKEN), publish_payload())
        .await;
    context
        .metadata_storage
        .add(NewPublishingMetadata {
            instagram_business_account_id: "IGB999".to_string(),
            auth_id: "someone-else".to_string(),
            image_url: "https://x/other.png".to_string(),
            caption: None,
            instagram_media_container_id: "C7".to_string(),
            instagram_media_published_id: "M7".to_string(),
        })
        .await
        .unwrap();

    let response = context
        .send_get_request("/v1/instagram/images/M1", Some(VALID_TOKEN))
        .await;
    assert_eq!(response.status(), StatusCode::OK);
    let body = parse_response_body(response).await;
    assert_eq!(body["instagram_media_container_id"], "C1");
    assert_eq!(body["caption"], "hello");

    let response = context
        .send_get_request("/v1/instagram/images/M7", Some(VALID_TOKEN))
        .await;
    assert_eq!(response.status(), StatusCode::NOT_FOUND);

    let response = context
        .send_get_request("/v1/instagram/images/M404", Some(VALID_TOKEN))
        .await;
    assert_eq!(response.status(), StatusCode::NOT_FOUND);
    let body = parse_response_body(response).await;
    assert_eq!(body["error"]["code"], "not_found");
}

#[tokio::test]
async fn test_graph_ids_with_path_characters_are_rejected() {
    let context = TestContext::new().await;

    let response = context
        .send_post_request(
            "/v1/instagram/images",
            Some(VALID_TOKEN),
            json!({"instagram_business_account_id": "me/feed?message=hi#", "image_url": "https://x/img.png"}),
        )
        .await;
    assert_eq!(response.status(), StatusCode::BAD_REQUEST);
    let body = parse_response_body(response).await;
    assert_eq!(body["error"]["code"], "validation_error");
    assert_eq!(context.graph_api.container_calls(), 0);

    for route in [
        "/v1/instagram/images/..%2F..%2Fme%2Faccounts/insights",
        "/v1/instagram/account?page_id=..",
        "/v1/instagram/medias?instagram_business_account_id=me%2Ffeed",
    ] {
        let response = context.send_get_request(route, Some(VALID_TOKEN)).await;
        assert_eq!(response.status(), StatusCode::BAD_REQUEST, "{route}");
    }
}
