// tests/integration/teams.rs

use axum::http::StatusCode;
use dashdesk::models::UserRole;
use serde_json::json;

use crate::common::{data_id, TestApp};

#[tokio::test]
async fn creating_a_team_promotes_the_owner() {
    let app = TestApp::new();
    let owner = app.seed("owner@example.com", UserRole::Member).await;

    let (status, body) = app
        .post("/api/teams", &owner, json!({ "name": "Platform", "description": "infra" }))
        .await;
    assert_eq!(status, StatusCode::CREATED);
    assert_eq!(body["data"]["ownerId"], owner.id.to_string());
    assert_eq!(app.global_role(owner.id).await, UserRole::TeamLeader);

    let team_id = data_id(&body);
    let (status, _) = app.delete(&format!("/api/teams/{}", team_id), &owner).await;
    assert_eq!(status, StatusCode::OK);
    assert_eq!(app.global_role(owner.id).await, UserRole::Member);
}

#[tokio::test]
async fn leader_role_follows_promotion_and_demotion() {
    let app = TestApp::new();
    let owner = app.seed("owner@example.com", UserRole::Member).await;
    let lee = app.seed("lee@example.com", UserRole::Member).await;

    let (_, body) = app.post("/api/teams", &owner, json!({ "name": "Platform" })).await;
    let team_id = data_id(&body);

    let (status, body) = app
        .post(
            &format!("/api/teams/{}/members", team_id),
            &owner,
            json!({ "email": lee.email, "role": "LEADER" }),
        )
        .await;
    assert_eq!(status, StatusCode::CREATED);
    assert_eq!(body["data"]["role"], "LEADER");
    assert_eq!(app.global_role(lee.id).await, UserRole::TeamLeader);

    let (status, _) = app
        .patch(
            &format!("/api/teams/{}/members/{}", team_id, lee.id),
            &owner,
            json!({ "role": "MEMBER" }),
        )
        .await;
    assert_eq!(status, StatusCode::OK);
    assert_eq!(app.global_role(lee.id).await, UserRole::Member);
}

#[tokio::test]
async fn leading_another_team_keeps_the_global_role() {
    let app = TestApp::new();
    let owner = app.seed("owner@example.com", UserRole::Member).await;
    let lee = app.seed("lee@example.com", UserRole::Member).await;

    let (_, body) = app.post("/api/teams", &owner, json!({ "name": "Alpha" })).await;
    let alpha = data_id(&body);
    let (status, _) = app.post("/api/teams", &lee, json!({ "name": "Beta" })).await;
    assert_eq!(status, StatusCode::CREATED);

    app.post(
        &format!("/api/teams/{}/members", alpha),
        &owner,
        json!({ "email": lee.email, "role": "LEADER" }),
    )
    .await;
    let (status, _) = app
        .delete(&format!("/api/teams/{}/members/{}", alpha, lee.id), &owner)
        .await;
    assert_eq!(status, StatusCode::OK);
    assert_eq!(app.global_role(lee.id).await, UserRole::TeamLeader);
}

#[tokio::test]
async fn admins_are_never_demoted() {
    let app = TestApp::new();
    let admin = app.seed("admin@example.com", UserRole::Admin).await;

    let (_, body) = app.post("/api/teams", &admin, json!({ "name": "Ops" })).await;
    let team_id = data_id(&body);
    assert_eq!(app.global_role(admin.id).await, UserRole::Admin);

    app.delete(&format!("/api/teams/{}", team_id), &admin).await;
    assert_eq!(app.global_role(admin.id).await, UserRole::Admin);
}

#[tokio::test]
async fn leaders_cannot_grant_leadership() {
    let app = TestApp::new();
    let owner = app.seed("owner@example.com", UserRole::Member).await;
    let lee = app.seed("lee@example.com", UserRole::Member).await;
    let max = app.seed("max@example.com", UserRole::Member).await;

    let (_, body) = app.post("/api/teams", &owner, json!({ "name": "Platform" })).await;
    let team_id = data_id(&body);
    let members = format!("/api/teams/{}/members", team_id);
    app.post(&members, &owner, json!({ "email": lee.email, "role": "LEADER" })).await;

    let (status, body) = app
        .post(&members, &lee, json!({ "email": max.email, "role": "LEADER" }))
        .await;
    assert_eq!(status, StatusCode::FORBIDDEN);
    assert_eq!(body["error"], "Only the owner can add leaders");

    let (status, _) = app.post(&members, &lee, json!({ "email": max.email })).await;
    assert_eq!(status, StatusCode::CREATED);

    let (status, _) = app
        .patch(&format!("{}/{}", members, max.id), &lee, json!({ "role": "LEADER" }))
        .await;
    assert_eq!(status, StatusCode::FORBIDDEN);

    let (status, _) = app
        .patch(&format!("{}/{}", members, lee.id), &lee, json!({ "role": "MEMBER" }))
        .await;
    assert_eq!(status, StatusCode::BAD_REQUEST);
}

#[tokio::test]
async fn team_visibility_and_listing() {
    let app = TestApp::new();
    let owner = app.seed("owner@example.com", UserRole::Member).await;
    let outsider = app.seed("out@example.com", UserRole::Member).await;
    let admin = app.seed("admin@example.com", UserRole::Admin).await;

    let (_, body) = app.post("/api/teams", &owner, json!({ "name": "Platform" })).await;
    let team_id = data_id(&body);

    let (status, _) = app.get(&format!("/api/teams/{}", team_id), &outsider).await;
    assert_eq!(status, StatusCode::FORBIDDEN);

    let (_, body) = app.get("/api/teams", &outsider).await;
    assert!(body["data"].as_array().unwrap().is_empty());

    let (_, body) = app.get("/api/teams", &admin).await;
    assert_eq!(body["data"].as_array().unwrap().len(), 1);

    let (status, body) = app.get(&format!("/api/teams/{}/members", team_id), &owner).await;
    assert_eq!(status, StatusCode::OK);
    assert_eq!(body["data"][0]["role"], "OWNER");
}

#[tokio::test]
async fn team_transfer_keeps_previous_owner_as_leader() {
    let app = TestApp::new();
    let owner = app.seed("owner@example.com", UserRole::Member).await;
    let next = app.seed("next@example.com", UserRole::Member).await;

    let (_, body) = app.post("/api/teams", &owner, json!({ "name": "Platform" })).await;
    let team_id = data_id(&body);
    app.post(&format!("/api/teams/{}/members", team_id), &owner, json!({ "email": next.email }))
        .await;

    let (status, body) = app
        .post(&format!("/api/teams/{}/transfer", team_id), &owner, json!({ "userId": next.id }))
        .await;
    assert_eq!(status, StatusCode::OK);
    assert_eq!(body["data"]["ownerId"], next.id.to_string());
    assert_eq!(app.global_role(next.id).await, UserRole::TeamLeader);

    let member = app
        .state
        .service
        .get_team_member(team_id.parse().unwrap(), owner.id)
        .await
        .unwrap()
        .unwrap();
    assert_eq!(member.role.as_str(), "LEADER");

    let (status, _) = app.post(&format!("/api/teams/{}/leave", team_id), &owner, json!({})).await;
    assert_eq!(status, StatusCode::OK);
    assert_eq!(app.global_role(owner.id).await, UserRole::Member);
}
