// tests/integration/auth.rs

use axum::http::{header, StatusCode};
use dashdesk::models::UserRole;
use serde_json::{json, Value};

use crate::common::{bearer, TestApp, PASSWORD};

#[tokio::test]
async fn register_login_and_me() {
    let app = TestApp::new();

    let register_body =
        json!({ "email": "Dana@Example.com", "name": "Dana", "password": PASSWORD });
    let response = app.server.post("/api/auth/register").json(&register_body).await;

    response.assert_status(StatusCode::CREATED);
    let body = response.json::<Value>();
    assert_eq!(body["success"], true);
    assert_eq!(body["data"]["user"]["email"], "dana@example.com");
    assert_eq!(body["data"]["user"]["role"], "MEMBER");
    assert_eq!(app.outbox.sent().len(), 1);

    let login_body = json!({ "email": "dana@example.com", "password": PASSWORD });
    let response = app.server.post("/api/auth/login").json(&login_body).await;

    response.assert_status_ok();
    let token = response.json::<Value>()["data"]["token"].as_str().unwrap().to_string();

    let response = app
        .server
        .get("/api/auth/me")
        .add_header(header::AUTHORIZATION, bearer(&token))
        .await;

    response.assert_status_ok();
    let body = response.json::<Value>();
    assert_eq!(body["data"]["name"], "Dana");
    assert!(body["data"]["lastLogin"].is_string());
}

#[tokio::test]
async fn register_rejects_weak_password_and_bad_email() {
    let app = TestApp::new();

    let weak = json!({ "email": "x@example.com", "name": "X", "password": "short" });
    let response = app.server.post("/api/auth/register").json(&weak).await;

    response.assert_status(StatusCode::BAD_REQUEST);
    assert_eq!(response.json::<Value>()["success"], false);

    let bad_email = json!({ "email": "not-an-email", "name": "X", "password": PASSWORD });
    let response = app.server.post("/api/auth/register").json(&bad_email).await;

    response.assert_status(StatusCode::BAD_REQUEST);
    let body = response.json::<Value>();
    assert_eq!(body["error"], "Validation failed");
    assert!(body["details"]["email"].is_array());
}

#[tokio::test]
async fn register_rejects_blank_name() {
    let app = TestApp::new();

    let blank = json!({ "email": "y@example.com", "name": "   ", "password": PASSWORD });
    let response = app.server.post("/api/auth/register").json(&blank).await;

    response.assert_status(StatusCode::BAD_REQUEST);
    assert!(response.json::<Value>()["details"]["name"].is_array());
}

#[tokio::test]
async fn login_with_wrong_password_is_unauthorized() {
    let app = TestApp::new();
    app.seed("erin@example.com", UserRole::Member).await;

    let login_body = json!({ "email": "erin@example.com", "password": "Wrong-pass1" });
    let response = app.server.post("/api/auth/login").json(&login_body).await;

    response.assert_status(StatusCode::UNAUTHORIZED);
    assert_eq!(response.json::<Value>()["success"], false);
}

#[tokio::test]
async fn requests_without_token_are_unauthorized() {
    let app = TestApp::new();

    let response = app.server.get("/api/auth/me").await;
    response.assert_status(StatusCode::UNAUTHORIZED);

    let response = app
        .server
        .get("/api/contacts")
        .add_header(header::AUTHORIZATION, bearer("garbage"))
        .await;
    response.assert_status(StatusCode::UNAUTHORIZED);
}

#[tokio::test]
async fn deactivated_account_cannot_log_in_or_use_token() {
    let app = TestApp::new();
    let admin = app.seed("admin@example.com", UserRole::Admin).await;
    let frank = app.seed("frank@example.com", UserRole::Member).await;

    let (status, _) = app
        .patch(&format!("/api/users/{}/status", frank.id), &admin, json!({ "isActive": false }))
        .await;
    assert_eq!(status, StatusCode::OK);

    let login_body = json!({ "email": "frank@example.com", "password": PASSWORD });
    let response = app.server.post("/api/auth/login").json(&login_body).await;

    response.assert_status(StatusCode::FORBIDDEN);
    assert_eq!(response.json::<Value>()["error"], "Account is deactivated");

    let (status, _) = app.get("/api/auth/me", &frank).await;
    assert_eq!(status, StatusCode::FORBIDDEN);

    let stored = app.state.service.get_user(frank.id).await.unwrap().unwrap();
    assert!(!stored.is_active);
    assert!(stored.last_login.is_none());
}

#[tokio::test]
async fn password_reset_flow() {
    let app = TestApp::new();
    app.seed("gina@example.com", UserRole::Member).await;

    // unknown addresses get the same answer and no mail
    let response = app
        .server
        .post("/api/auth/forgot-password")
        .json(&json!({ "email": "nobody@example.com" }))
        .await;
    response.assert_status_ok();
    assert!(app.outbox.sent().is_empty());

    let response = app
        .server
        .post("/api/auth/forgot-password")
        .json(&json!({ "email": "gina@example.com" }))
        .await;
    response.assert_status_ok();

    let sent = app.outbox.sent();
    assert_eq!(sent.len(), 1);
    let token: String = sent[0]
        .body
        .split("token=")
        .nth(1)
        .unwrap()
        .chars()
        .take_while(|c| c.is_ascii_hexdigit())
        .collect();
    assert_eq!(token.len(), 64);

    let reset = json!({ "token": token, "password": "N3w-password" });
    let response = app.server.post("/api/auth/reset-password").json(&reset).await;
    response.assert_status_ok();

    // single use
    let response = app.server.post("/api/auth/reset-password").json(&reset).await;
    response.assert_status(StatusCode::BAD_REQUEST);
    assert_eq!(response.json::<Value>()["error"], "Invalid or expired reset token");

    let login_body = json!({ "email": "gina@example.com", "password": "N3w-password" });
    let response = app.server.post("/api/auth/login").json(&login_body).await;
    response.assert_status_ok();
}
