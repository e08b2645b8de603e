//! End-to-end tests for authentication endpoints
//!
//! Tests login, logout, session handling and role based access.

mod common;

use common::{
    TestClient, TestServer, ADMIN_PASS, ADMIN_USER, ORGANIZER_PASS, ORGANIZER_USER,
    UPCOMING_EVENT_SLUG,
};
use reqwest::StatusCode;

#[tokio::test]
async fn test_login_with_valid_credentials() {
    let server = TestServer::spawn().await;
    let client = TestClient::new(server.base_url.clone());

    let response = client.login(ADMIN_USER, ADMIN_PASS).await;
    assert_eq!(response.status(), StatusCode::CREATED);

    let set_cookie = response
        .headers()
        .get(reqwest::header::SET_COOKIE)
        .and_then(|v| v.to_str().ok())
        .unwrap()
        .to_string();
    assert!(set_cookie.starts_with("session_token="));
    assert!(set_cookie.contains("HttpOnly"));

    let body: serde_json::Value = response.json().await.unwrap();
    assert!(!body["token"].as_str().unwrap().is_empty());
}

#[tokio::test]
async fn test_login_with_invalid_password() {
    let server = TestServer::spawn().await;
    let client = TestClient::new(server.base_url.clone());

    let response = client.login(ADMIN_USER, "wrong_password").await;

    assert_eq!(response.status(), StatusCode::UNAUTHORIZED);
}

#[tokio::test]
async fn test_login_with_nonexistent_user() {
    let server = TestServer::spawn().await;
    let client = TestClient::new(server.base_url.clone());

    let response = client.login("nonexistent_user", "password").await;

    assert_eq!(response.status(), StatusCode::UNAUTHORIZED);
}

#[tokio::test]
async fn test_logout_clears_session() {
    let server = TestServer::spawn().await;
    let client = TestClient::authenticated_admin(server.base_url.clone()).await;

    let response = client.admin_list_events().await;
    assert_eq!(response.status(), StatusCode::OK);

    let response = client.logout().await;
    assert_eq!(response.status(), StatusCode::OK);

    let response = client.admin_list_events().await;
    assert_eq!(response.status(), StatusCode::FORBIDDEN);
}

#[tokio::test]
async fn test_admin_routes_require_authentication() {
    let server = TestServer::spawn().await;
    let client = TestClient::new(server.base_url.clone());

    assert_eq!(
        client.admin_list_events().await.status(),
        StatusCode::FORBIDDEN
    );
    assert_eq!(
        client.admin_subscribers(None, None).await.status(),
        StatusCode::FORBIDDEN
    );
    assert_eq!(
        client.admin_analytics_summary(None).await.status(),
        StatusCode::FORBIDDEN
    );
}

#[tokio::test]
async fn test_public_routes_do_not_require_authentication() {
    let server = TestServer::spawn().await;
    let client = TestClient::new(server.base_url.clone());

    assert_eq!(client.list_events().await.status(), StatusCode::OK);
    assert_eq!(
        client.get_event(UPCOMING_EVENT_SLUG).await.status(),
        StatusCode::OK
    );
}

#[tokio::test]
async fn test_bearer_token_authenticates_without_cookie() {
    let server = TestServer::spawn().await;
    let client = TestClient::new(server.base_url.clone());

    let response = client.login(ADMIN_USER, ADMIN_PASS).await;
    let body: serde_json::Value = response.json().await.unwrap();
    let token = body["token"].as_str().unwrap().to_string();

    let cookieless = reqwest::Client::new();
    let response = cookieless
        .get(format!("{}/v1/admin/events", server.base_url))
        .header("Authorization", format!("Bearer {}", token))
        .send()
        .await
        .unwrap();
    assert_eq!(response.status(), StatusCode::OK);
}

#[tokio::test]
async fn test_organizer_is_limited_to_check_in() {
    let server = TestServer::spawn().await;
    let client = TestClient::new(server.base_url.clone());
    let response = client.login(ORGANIZER_USER, ORGANIZER_PASS).await;
    assert_eq!(response.status(), StatusCode::CREATED);

    let event = server.event(UPCOMING_EVENT_SLUG);

    assert_eq!(
        client.admin_attendees(event.id).await.status(),
        StatusCode::OK
    );
    assert_eq!(
        client.admin_lookup(event.id, "617-555-0100").await.status(),
        StatusCode::OK
    );

    assert_eq!(
        client.admin_list_events().await.status(),
        StatusCode::FORBIDDEN
    );
    assert_eq!(
        client.admin_subscribers(None, None).await.status(),
        StatusCode::FORBIDDEN
    );
    assert_eq!(
        client.admin_analytics_summary(None).await.status(),
        StatusCode::FORBIDDEN
    );
    assert_eq!(client.admin_users().await.status(), StatusCode::FORBIDDEN);
}

#[tokio::test]
async fn test_admin_lists_staff_with_roles() {
    let server = TestServer::spawn().await;
    let client = TestClient::authenticated_admin(server.base_url.clone()).await;

    let response = client.admin_users().await;
    assert_eq!(response.status(), StatusCode::OK);

    let users: Vec<serde_json::Value> = response.json().await.unwrap();
    assert_eq!(users.len(), 2);
    let organizer = users
        .iter()
        .find(|u| u["handle"] == ORGANIZER_USER)
        .unwrap();
    assert_eq!(organizer["roles"], serde_json::json!(["Organizer"]));
}

#[tokio::test]
async fn test_home_endpoint_reports_server_info() {
    let server = TestServer::spawn().await;
    let client = TestClient::new(server.base_url.clone());

    let response = client.home().await;
    assert_eq!(response.status(), StatusCode::OK);

    let body: serde_json::Value = response.json().await.unwrap();
    assert!(body.get("uptime").is_some());
    assert!(body.get("hash").is_some());
    assert!(body["session_token"].is_null());
}
