// Integration tests for the REST client against a mock server

use pd_offboard::client::{Api, RestClient};
use pd_offboard::error::Error;
use serde_json::json;
use wiremock::matchers::{body_json, header, method, path, query_param};
use wiremock::{Mock, MockServer, ResponseTemplate};

async fn client_for(server: &MockServer) -> RestClient {
    RestClient::with_base_url("secret-token", &server.uri()).unwrap()
}

#[tokio::test]
async fn test_fetch_merges_every_page_in_order() {
    let server = MockServer::start().await;

    Mock::given(method("GET"))
        .and(path("/users"))
        .and(query_param("query", "jane@example.com"))
        .and(query_param("limit", "100"))
        .respond_with(ResponseTemplate::new(200).set_body_json(json!({
            "users": [{ "id": "A" }, { "id": "B" }],
            "limit": 100,
            "offset": 0,
            "more": true
        })))
        .expect(1)
        .mount(&server)
        .await;

    Mock::given(method("GET"))
        .and(path("/users"))
        .and(query_param("offset", "100"))
        .and(query_param("limit", "100"))
        .respond_with(ResponseTemplate::new(200).set_body_json(json!({
            "users": [{ "id": "C" }],
            "more": true
        })))
        .with_priority(1)
        .expect(1)
        .mount(&server)
        .await;

    Mock::given(method("GET"))
        .and(path("/users"))
        .and(query_param("offset", "200"))
        .respond_with(ResponseTemplate::new(200).set_body_json(json!({
            "users": [{ "id": "D" }],
            "more": false
        })))
        .with_priority(1)
        .expect(1)
        .mount(&server)
        .await;

    let client = client_for(&server).await;
    let merged = client
        .fetch("/users", &[("query", "jane@example.com")])
        .await
        .unwrap();

    let ids: Vec<&str> = merged["users"]
        .as_array()
        .unwrap()
        .iter()
        .map(|u| u["id"].as_str().unwrap())
        .collect();
    assert_eq!(ids, vec!["A", "B", "C", "D"]);
    assert_eq!(merged["more"], false);
}

#[tokio::test]
async fn test_empty_page_claiming_more_stops_with_what_was_merged() {
    let server = MockServer::start().await;

    Mock::given(method("GET"))
        .and(path("/teams"))
        .respond_with(ResponseTemplate::new(200).set_body_json(json!({
            "teams": [{ "id": "T1" }],
            "more": true
        })))
        .expect(1)
        .mount(&server)
        .await;

    Mock::given(method("GET"))
        .and(path("/teams"))
        .and(query_param("offset", "100"))
        .respond_with(ResponseTemplate::new(200).set_body_json(json!({
            "teams": [],
            "more": true
        })))
        .with_priority(1)
        .expect(1)
        .mount(&server)
        .await;

    let client = client_for(&server).await;
    let merged = client.fetch("/teams", &[]).await.unwrap();
    assert_eq!(merged["teams"], json!([{ "id": "T1" }]));
}

#[tokio::test]
async fn test_fetch_collection_uses_named_field() {
    let server = MockServer::start().await;

    Mock::given(method("GET"))
        .and(path("/users"))
        .and(query_param("team_ids[]", "T1"))
        .respond_with(ResponseTemplate::new(200).set_body_json(json!({
            "users": [{ "id": "A" }],
            "more": true
        })))
        .mount(&server)
        .await;

    Mock::given(method("GET"))
        .and(path("/users"))
        .and(query_param("offset", "100"))
        .respond_with(ResponseTemplate::new(200).set_body_json(json!({
            "users": [{ "id": "B" }],
            "more": false
        })))
        .with_priority(1)
        .mount(&server)
        .await;

    let client = client_for(&server).await;
    let merged = client
        .fetch_collection("/users", &[("team_ids[]", "T1")], "users")
        .await
        .unwrap();

    assert_eq!(merged["users"], json!([{ "id": "A" }, { "id": "B" }]));
}

#[tokio::test]
async fn test_single_resource_returned_as_is() {
    let server = MockServer::start().await;

    Mock::given(method("GET"))
        .and(path("/schedules/S1"))
        .respond_with(ResponseTemplate::new(200).set_body_json(json!({
            "schedule": { "id": "S1", "name": "Primary" }
        })))
        .expect(1)
        .mount(&server)
        .await;

    let client = client_for(&server).await;
    let value = client.fetch("/schedules/S1", &[]).await.unwrap();
    assert_eq!(value, json!({ "schedule": { "id": "S1", "name": "Primary" } }));
}

#[tokio::test]
async fn test_every_request_carries_auth_and_version_headers() {
    let server = MockServer::start().await;

    Mock::given(method("GET"))
        .and(path("/incidents"))
        .and(header("authorization", "Token token=secret-token"))
        .and(header("accept", "application/vnd.pagerduty+json;version=2"))
        .and(query_param("statuses[]", "triggered"))
        .and(query_param("statuses[]", "acknowledged"))
        .respond_with(ResponseTemplate::new(200).set_body_json(json!({
            "incidents": [],
            "more": false
        })))
        .expect(1)
        .mount(&server)
        .await;

    let client = client_for(&server).await;
    client
        .fetch(
            "/incidents",
            &[("statuses[]", "triggered"), ("statuses[]", "acknowledged")],
        )
        .await
        .unwrap();
}

#[tokio::test]
async fn test_failed_read_carries_status_and_body() {
    let server = MockServer::start().await;

    Mock::given(method("GET"))
        .and(path("/teams"))
        .respond_with(ResponseTemplate::new(403).set_body_string("forbidden"))
        .mount(&server)
        .await;

    let client = client_for(&server).await;
    let err = client.fetch("/teams", &[]).await.unwrap_err();

    match err {
        Error::Request {
            method,
            path,
            status,
            body,
        } => {
            assert_eq!(method, "GET");
            assert_eq!(path, "/teams");
            assert_eq!(status, 403);
            assert_eq!(body, "forbidden");
        }
        other => panic!("unexpected error: {other}"),
    }
}

#[tokio::test]
async fn test_failed_follow_up_page_is_an_error() {
    let server = MockServer::start().await;

    Mock::given(method("GET"))
        .and(path("/schedules"))
        .respond_with(ResponseTemplate::new(200).set_body_json(json!({
            "schedules": [{ "id": "S1" }],
            "more": true
        })))
        .mount(&server)
        .await;

    Mock::given(method("GET"))
        .and(path("/schedules"))
        .and(query_param("offset", "100"))
        .respond_with(ResponseTemplate::new(500).set_body_string("boom"))
        .with_priority(1)
        .mount(&server)
        .await;

    let client = client_for(&server).await;
    let err = client.fetch("/schedules", &[]).await.unwrap_err();
    assert_eq!(err.status(), Some(500));
}

#[tokio::test]
async fn test_replace_accepts_200_and_204() {
    let server = MockServer::start().await;
    let body = json!({ "schedule": { "id": "S1" } });

    Mock::given(method("PUT"))
        .and(path("/schedules/S1"))
        .and(body_json(body.clone()))
        .respond_with(ResponseTemplate::new(200).set_body_json(json!({})))
        .mount(&server)
        .await;

    Mock::given(method("PUT"))
        .and(path("/schedules/S2"))
        .respond_with(ResponseTemplate::new(204))
        .mount(&server)
        .await;

    Mock::given(method("PUT"))
        .and(path("/schedules/S3"))
        .respond_with(ResponseTemplate::new(400).set_body_string("bad layer"))
        .mount(&server)
        .await;

    let client = client_for(&server).await;
    client.replace("/schedules/S1", body).await.unwrap();
    client.replace("/schedules/S2", json!({})).await.unwrap();

    let err = client.replace("/schedules/S3", json!({})).await.unwrap_err();
    assert_eq!(err.status(), Some(400));
}

#[tokio::test]
async fn test_remove_only_accepts_204() {
    let server = MockServer::start().await;

    Mock::given(method("DELETE"))
        .and(path("/users/U1"))
        .respond_with(ResponseTemplate::new(204))
        .mount(&server)
        .await;

    Mock::given(method("DELETE"))
        .and(path("/users/U2"))
        .respond_with(ResponseTemplate::new(200).set_body_json(json!({})))
        .mount(&server)
        .await;

    let client = client_for(&server).await;
    client.remove("/users/U1").await.unwrap();

    let err = client.remove("/users/U2").await.unwrap_err();
    assert!(matches!(err, Error::Request { status: 200, method: "DELETE", .. }));
}

#[tokio::test]
async fn test_create_sends_from_header_and_returns_object() {
    let server = MockServer::start().await;

    Mock::given(method("POST"))
        .and(path("/users"))
        .and(header("from", "ops@example.com"))
        .respond_with(ResponseTemplate::new(201).set_body_json(json!({
            "user": { "id": "PNEW", "email": "new@example.com" }
        })))
        .expect(1)
        .mount(&server)
        .await;

    Mock::given(method("POST"))
        .and(path("/schedules"))
        .respond_with(ResponseTemplate::new(200).set_body_json(json!({})))
        .mount(&server)
        .await;

    let client = client_for(&server)
        .await
        .with_from(Some("ops@example.com".to_string()));

    let created = client
        .create(
            "/users",
            json!({ "user": { "type": "user", "email": "new@example.com" } }),
            None,
        )
        .await
        .unwrap();
    assert_eq!(created["user"]["id"], "PNEW");

    let err = client
        .create("/schedules", json!({}), Some("other@example.com"))
        .await
        .unwrap_err();
    assert_eq!(err.status(), Some(200));
}
