// tests/integration/users.rs

use axum::http::StatusCode;
use dashdesk::models::UserRole;
use serde_json::json;

use crate::common::{data_id, TestApp, PASSWORD};

#[tokio::test]
async fn only_admins_list_users() {
    let app = TestApp::new();
    let admin = app.seed("admin@example.com", UserRole::Admin).await;
    let member = app.seed("member@example.com", UserRole::Member).await;

    let (status, body) = app.get("/api/users", &member).await;
    assert_eq!(status, StatusCode::FORBIDDEN);
    assert_eq!(body["error"], "Only administrators can list users");

    let (status, body) = app.get("/api/users", &admin).await;
    assert_eq!(status, StatusCode::OK);
    assert_eq!(body["data"].as_array().unwrap().len(), 2);
}

#[tokio::test]
async fn members_see_only_their_own_profile() {
    let app = TestApp::new();
    let a = app.seed("a@example.com", UserRole::Member).await;
    let b = app.seed("b@example.com", UserRole::Member).await;

    let (status, _) = app.get(&format!("/api/users/{}", a.id), &a).await;
    assert_eq!(status, StatusCode::OK);
    let (status, _) = app.get(&format!("/api/users/{}", a.id), &b).await;
    assert_eq!(status, StatusCode::FORBIDDEN);

    let (status, body) = app
        .patch(&format!("/api/users/{}", a.id), &a, json!({ "name": "Alpha" }))
        .await;
    assert_eq!(status, StatusCode::OK);
    assert_eq!(body["data"]["name"], "Alpha");
}

#[tokio::test]
async fn admin_cannot_change_own_role_or_status() {
    let app = TestApp::new();
    let admin = app.seed("admin@example.com", UserRole::Admin).await;

    let (status, body) = app
        .patch(&format!("/api/users/{}/role", admin.id), &admin, json!({ "role": "MEMBER" }))
        .await;
    assert_eq!(status, StatusCode::BAD_REQUEST);
    assert_eq!(body["error"], "You cannot change your own role");

    let (status, _) = app
        .patch(&format!("/api/users/{}/status", admin.id), &admin, json!({ "isActive": false }))
        .await;
    assert_eq!(status, StatusCode::BAD_REQUEST);

    let (status, _) = app.delete(&format!("/api/users/{}", admin.id), &admin).await;
    assert_eq!(status, StatusCode::BAD_REQUEST);
    assert_eq!(app.global_role(admin.id).await, UserRole::Admin);
}

#[tokio::test]
async fn admin_changes_roles_of_others() {
    let app = TestApp::new();
    let admin = app.seed("admin@example.com", UserRole::Admin).await;
    let member = app.seed("member@example.com", UserRole::Member).await;

    let (status, body) = app
        .patch(&format!("/api/users/{}/role", member.id), &admin, json!({ "role": "VIEWER" }))
        .await;
    assert_eq!(status, StatusCode::OK);
    assert_eq!(body["data"]["role"], "VIEWER");

    let (status, _) = app
        .patch(&format!("/api/users/{}/role", admin.id), &member, json!({ "role": "VIEWER" }))
        .await;
    assert_eq!(status, StatusCode::FORBIDDEN);
}

#[tokio::test]
async fn user_owning_a_team_cannot_be_deleted() {
    let app = TestApp::new();
    let admin = app.seed("admin@example.com", UserRole::Admin).await;
    let owner = app.seed("owner@example.com", UserRole::Member).await;

    let (status, body) = app.post("/api/teams", &owner, json!({ "name": "Ops" })).await;
    assert_eq!(status, StatusCode::CREATED);
    let team_id = data_id(&body);

    let (status, _) = app.delete(&format!("/api/users/{}", owner.id), &admin).await;
    assert_eq!(status, StatusCode::BAD_REQUEST);

    let (status, _) = app.delete(&format!("/api/teams/{}", team_id), &owner).await;
    assert_eq!(status, StatusCode::OK);
    let (status, _) = app.delete(&format!("/api/users/{}", owner.id), &admin).await;
    assert_eq!(status, StatusCode::OK);
    assert!(app.state.service.get_user(owner.id).await.unwrap().is_none());
}

#[tokio::test]
async fn change_own_password() {
    let app = TestApp::new();
    let user = app.seed("hal@example.com", UserRole::Member).await;

    let (status, body) = app
        .post(
            "/api/users/me/password",
            &user,
            json!({ "currentPassword": "wrong", "newPassword": "An0ther-pass" }),
        )
        .await;
    assert_eq!(status, StatusCode::BAD_REQUEST);
    assert_eq!(body["error"], "Current password is incorrect");

    let (status, _) = app
        .post(
            "/api/users/me/password",
            &user,
            json!({ "currentPassword": PASSWORD, "newPassword": "An0ther-pass" }),
        )
        .await;
    assert_eq!(status, StatusCode::OK);
}
