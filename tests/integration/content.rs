// tests/integration/content.rs

use axum::{
    body::Bytes,
    http::{header, Method, StatusCode},
};
use dashdesk::models::UserRole;
use serde_json::{json, Value};

use crate::common::{data_id, Actor, TestApp};

/// `owner` leads a team with `mate` in it; `stranger` stays outside
async fn team_setup(app: &TestApp) -> (String, Actor, Actor, Actor) {
    let owner = app.seed("owner@example.com", UserRole::Member).await;
    let mate = app.seed("mate@example.com", UserRole::Member).await;
    let stranger = app.seed("stranger@example.com", UserRole::Member).await;

    let (_, body) = app.post("/api/teams", &owner, json!({ "name": "Sales" })).await;
    let team_id = data_id(&body);
    let (status, _) = app
        .post(&format!("/api/teams/{}/members", team_id), &owner, json!({ "email": mate.email }))
        .await;
    assert_eq!(status, StatusCode::CREATED);
    (team_id, owner, mate, stranger)
}

#[tokio::test]
async fn contacts_start_private() {
    let app = TestApp::new();
    let (_, owner, mate, _) = team_setup(&app).await;

    let (status, body) = app
        .post("/api/contacts", &owner, json!({ "firstName": "Ada", "lastName": "Lovelace" }))
        .await;
    assert_eq!(status, StatusCode::CREATED);
    assert_eq!(body["data"]["visibility"], "PRIVATE");
    let contact_id = data_id(&body);

    let (status, _) = app.get(&format!("/api/contacts/{}", contact_id), &mate).await;
    assert_eq!(status, StatusCode::FORBIDDEN);
    let (_, body) = app.get("/api/contacts", &mate).await;
    assert!(body["data"].as_array().unwrap().is_empty());
}

#[tokio::test]
async fn team_sharing_grants_read_only_access() {
    let app = TestApp::new();
    let (team_id, owner, mate, stranger) = team_setup(&app).await;

    let (_, body) = app
        .post("/api/contacts", &owner, json!({ "firstName": "Ada", "lastName": "Lovelace" }))
        .await;
    let contact_id = data_id(&body);

    let (status, body) = app
        .patch(
            &format!("/api/contacts/{}/share", contact_id),
            &owner,
            json!({ "visibility": "TEAM", "teamId": team_id }),
        )
        .await;
    assert_eq!(status, StatusCode::OK);
    assert_eq!(body["data"]["visibility"], "TEAM");
    assert_eq!(body["data"]["teamId"], team_id);
    assert!(body["data"]["organizationId"].is_null());

    let (status, _) = app.get(&format!("/api/contacts/{}", contact_id), &mate).await;
    assert_eq!(status, StatusCode::OK);
    let (_, body) = app.get("/api/contacts", &mate).await;
    assert_eq!(body["data"].as_array().unwrap().len(), 1);

    let (status, _) = app.get(&format!("/api/contacts/{}", contact_id), &stranger).await;
    assert_eq!(status, StatusCode::FORBIDDEN);

    let (status, body) = app
        .patch(&format!("/api/contacts/{}", contact_id), &mate, json!({ "notes": "mine now" }))
        .await;
    assert_eq!(status, StatusCode::FORBIDDEN);
    assert_eq!(body["error"], "Only the owner can edit this resource");

    let (status, _) = app.delete(&format!("/api/contacts/{}", contact_id), &mate).await;
    assert_eq!(status, StatusCode::FORBIDDEN);
}

#[tokio::test]
async fn sharing_with_a_foreign_team_is_rejected() {
    let app = TestApp::new();
    let (team_id, _, _, stranger) = team_setup(&app).await;

    let (_, body) = app.post("/api/contacts", &stranger, json!({ "firstName": "Eve" })).await;
    let contact_id = data_id(&body);

    let (status, _) = app
        .patch(
            &format!("/api/contacts/{}/share", contact_id),
            &stranger,
            json!({ "visibility": "TEAM", "teamId": team_id }),
        )
        .await;
    assert_eq!(status, StatusCode::BAD_REQUEST);

    let (status, _) = app
        .patch(
            &format!("/api/contacts/{}/share", contact_id),
            &stranger,
            json!({ "visibility": "ORGANIZATION" }),
        )
        .await;
    assert_eq!(status, StatusCode::BAD_REQUEST);
}

#[tokio::test]
async fn deleting_the_team_reverts_sharing() {
    let app = TestApp::new();
    let (team_id, owner, mate, _) = team_setup(&app).await;

    let (_, body) = app.post("/api/documents", &owner, json!({ "title": "Plan" })).await;
    let document_id = data_id(&body);
    app.patch(
        &format!("/api/documents/{}/share", document_id),
        &owner,
        json!({ "visibility": "TEAM", "teamId": team_id }),
    )
    .await;

    let (status, _) = app.get(&format!("/api/documents/{}", document_id), &mate).await;
    assert_eq!(status, StatusCode::OK);

    let (status, _) = app.delete(&format!("/api/teams/{}", team_id), &owner).await;
    assert_eq!(status, StatusCode::OK);

    let (status, body) = app.get(&format!("/api/documents/{}", document_id), &owner).await;
    assert_eq!(status, StatusCode::OK);
    assert_eq!(body["data"]["visibility"], "PRIVATE");
    assert!(body["data"]["teamId"].is_null());

    let (status, _) = app.get(&format!("/api/documents/{}", document_id), &mate).await;
    assert_eq!(status, StatusCode::FORBIDDEN);
}

#[tokio::test]
async fn organization_sharing_reaches_every_member() {
    let app = TestApp::new();
    let alice = app.seed("alice@example.com", UserRole::Member).await;
    let bob = app.seed("bob@example.com", UserRole::Member).await;
    let outsider = app.seed("out@example.com", UserRole::Member).await;

    let (_, body) = app.post("/api/organizations", &alice, json!({ "name": "Acme" })).await;
    let org_id = data_id(&body);
    app.post(
        &format!("/api/organizations/{}/members", org_id),
        &alice,
        json!({ "email": bob.email }),
    )
    .await;

    let (_, body) = app.post("/api/contacts", &bob, json!({ "firstName": "Grace" })).await;
    let contact_id = data_id(&body);
    let (status, body) = app
        .patch(
            &format!("/api/contacts/{}/share", contact_id),
            &bob,
            json!({ "visibility": "ORGANIZATION" }),
        )
        .await;
    assert_eq!(status, StatusCode::OK);
    assert_eq!(body["data"]["organizationId"], org_id);

    let (status, _) = app.get(&format!("/api/contacts/{}", contact_id), &alice).await;
    assert_eq!(status, StatusCode::OK);
    let (status, _) = app.get(&format!("/api/contacts/{}", contact_id), &outsider).await;
    assert_eq!(status, StatusCode::FORBIDDEN);

    // leaving the organization takes the sharing with it
    app.post(&format!("/api/organizations/{}/leave", org_id), &bob, json!({})).await;
    let (status, _) = app.get(&format!("/api/contacts/{}", contact_id), &alice).await;
    assert_eq!(status, StatusCode::FORBIDDEN);
}

#[tokio::test]
async fn viewers_are_read_only() {
    let app = TestApp::new();
    let viewer = app.seed("viewer@example.com", UserRole::Viewer).await;

    let (status, body) = app.post("/api/contacts", &viewer, json!({ "firstName": "Nope" })).await;
    assert_eq!(status, StatusCode::FORBIDDEN);
    assert_eq!(body["error"], "Viewers have read-only access");

    let (status, _) = app.post("/api/documents", &viewer, json!({ "title": "Nope" })).await;
    assert_eq!(status, StatusCode::FORBIDDEN);

    let (status, _) = app.get("/api/contacts", &viewer).await;
    assert_eq!(status, StatusCode::OK);
}

#[tokio::test]
async fn document_file_and_public_link() {
    let app = TestApp::new();
    let owner = app.seed("owner@example.com", UserRole::Member).await;
    let other = app.seed("other@example.com", UserRole::Member).await;

    let (status, body) = app
        .post("/api/documents", &owner, json!({ "title": "Report", "content": "Q3 numbers" }))
        .await;
    assert_eq!(status, StatusCode::CREATED);
    let document_id = data_id(&body);

    let upload = format!("/api/documents/{}/file?fileName=report.txt", document_id);
    let response = app
        .request(Method::PUT, &upload, &owner)
        .content_type("text/plain")
        .bytes(Bytes::from_static(b"hello file"))
        .await;
    response.assert_status_ok();

    let download = format!("/api/documents/{}/file", document_id);
    let response = app.request(Method::GET, &download, &owner).await;
    response.assert_status_ok();
    assert_eq!(response.header(header::CONTENT_TYPE), "text/plain");
    assert_eq!(&response.as_bytes()[..], b"hello file");

    let (status, _) = app.get(&format!("/api/documents/{}/file", document_id), &other).await;
    assert_eq!(status, StatusCode::FORBIDDEN);

    let (status, _) = app
        .post(&format!("/api/documents/{}/link", document_id), &other, json!({}))
        .await;
    assert_eq!(status, StatusCode::FORBIDDEN);

    let (status, body) = app
        .post(&format!("/api/documents/{}/link", document_id), &owner, json!({}))
        .await;
    assert_eq!(status, StatusCode::OK);
    let token = body["data"]["token"].as_str().unwrap().to_string();
    assert_eq!(token.len(), 48);
    let path = body["data"]["path"].as_str().unwrap().to_string();

    let response = app.server.get(&path).await;
    response.assert_status_ok();
    let body = response.json::<Value>();
    assert_eq!(body["data"]["title"], "Report");
    assert_eq!(body["data"]["attachment"]["fileName"], "report.txt");

    let (status, _) = app
        .delete(&format!("/api/documents/{}/link", document_id), &owner)
        .await;
    assert_eq!(status, StatusCode::OK);
    app.server.get(&path).await.assert_status(StatusCode::NOT_FOUND);

    let (status, _) = app.delete(&format!("/api/documents/{}", document_id), &owner).await;
    assert_eq!(status, StatusCode::OK);
    let (status, _) = app.get(&format!("/api/documents/{}", document_id), &owner).await;
    assert_eq!(status, StatusCode::NOT_FOUND);
}

#[tokio::test]
async fn sharing_moves_between_team_organization_and_private() {
    let app = TestApp::new();
    let alice = app.seed("alice@example.com", UserRole::Member).await;
    let bob = app.seed("bob@example.com", UserRole::Member).await;
    let carol = app.seed("carol@example.com", UserRole::Member).await;

    let (_, body) = app.post("/api/organizations", &alice, json!({ "name": "Acme" })).await;
    let org_id = data_id(&body);
    for who in [&bob, &carol] {
        let (status, _) = app
            .post(
                &format!("/api/organizations/{}/members", org_id),
                &alice,
                json!({ "email": who.email }),
            )
            .await;
        assert_eq!(status, StatusCode::CREATED);
    }
    let (_, body) = app
        .post("/api/teams", &alice, json!({ "name": "Field", "organizationId": org_id }))
        .await;
    let team_id = data_id(&body);
    app.post(&format!("/api/teams/{}/members", team_id), &alice, json!({ "email": bob.email }))
        .await;

    let (_, body) = app.post("/api/documents", &alice, json!({ "title": "Roadmap" })).await;
    let document_id = data_id(&body);
    let share_uri = format!("/api/documents/{}/share", document_id);
    let document_uri = format!("/api/documents/{}", document_id);

    let (status, body) = app
        .patch(&share_uri, &alice, json!({ "visibility": "TEAM", "teamId": team_id }))
        .await;
    assert_eq!(status, StatusCode::OK);
    assert_eq!(body["data"]["visibility"], "TEAM");
    assert_eq!(body["data"]["teamId"], team_id);
    assert!(body["data"]["organizationId"].is_null());
    assert_eq!(app.get(&document_uri, &bob).await.0, StatusCode::OK);
    assert_eq!(app.get(&document_uri, &carol).await.0, StatusCode::FORBIDDEN);

    let (status, body) = app
        .patch(&share_uri, &alice, json!({ "visibility": "ORGANIZATION" }))
        .await;
    assert_eq!(status, StatusCode::OK);
    assert_eq!(body["data"]["visibility"], "ORGANIZATION");
    assert_eq!(body["data"]["organizationId"], org_id);
    assert!(body["data"]["teamId"].is_null());
    assert_eq!(app.get(&document_uri, &bob).await.0, StatusCode::OK);
    assert_eq!(app.get(&document_uri, &carol).await.0, StatusCode::OK);

    let (status, body) = app.patch(&share_uri, &alice, json!({ "visibility": "PRIVATE" })).await;
    assert_eq!(status, StatusCode::OK);
    assert_eq!(body["data"]["visibility"], "PRIVATE");
    assert!(body["data"]["teamId"].is_null());
    assert!(body["data"]["organizationId"].is_null());
    assert_eq!(app.get(&document_uri, &bob).await.0, StatusCode::FORBIDDEN);
    assert_eq!(app.get(&document_uri, &carol).await.0, StatusCode::FORBIDDEN);
    let (_, body) = app.get("/api/documents", &carol).await;
    assert!(body["data"].as_array().unwrap().is_empty());
}

#[tokio::test]
async fn demoted_viewer_cannot_attach_files() {
    let app = TestApp::new();
    let admin = app.seed("admin@example.com", UserRole::Admin).await;
    let owner = app.seed("owner@example.com", UserRole::Member).await;

    let (_, body) = app.post("/api/documents", &owner, json!({ "title": "Notes" })).await;
    let document_id = data_id(&body);
    let (status, _) = app
        .patch(&format!("/api/users/{}/role", owner.id), &admin, json!({ "role": "VIEWER" }))
        .await;
    assert_eq!(status, StatusCode::OK);

    let upload = format!("/api/documents/{}/file?fileName=notes.txt", document_id);
    let response = app
        .request(Method::PUT, &upload, &owner)
        .content_type("text/plain")
        .bytes(Bytes::from_static(b"sneaky"))
        .await;
    response.assert_status(StatusCode::FORBIDDEN);
    assert_eq!(response.json::<Value>()["error"], "Viewers have read-only access");

    let (_, body) = app.get(&format!("/api/documents/{}", document_id), &owner).await;
    assert!(body["data"]["attachment"].is_null());
}
