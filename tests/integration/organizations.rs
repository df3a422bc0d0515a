// tests/integration/organizations.rs

use axum::http::{Method, StatusCode};
use dashdesk::models::{OrgRole, UserRole};
use serde_json::{json, Value};

use crate::common::{data_id, Actor, TestApp};

/// Alice owns the organization, Bob and Carol are ADMINs
async fn org_with_admins(app: &TestApp) -> (String, Actor, Actor, Actor) {
    let alice = app.seed("alice@example.com", UserRole::Member).await;
    let bob = app.seed("bob@example.com", UserRole::Member).await;
    let carol = app.seed("carol@example.com", UserRole::Member).await;

    let (status, body) = app.post("/api/organizations", &alice, json!({ "name": "Acme" })).await;
    assert_eq!(status, StatusCode::CREATED);
    let org_id = data_id(&body);

    for who in [&bob, &carol] {
        let (status, _) = app
            .post(
                &format!("/api/organizations/{}/members", org_id),
                &alice,
                json!({ "email": who.email, "role": "ADMIN" }),
            )
            .await;
        assert_eq!(status, StatusCode::CREATED);
    }
    (org_id, alice, bob, carol)
}

#[tokio::test]
async fn creator_becomes_owner() {
    let app = TestApp::new();
    let alice = app.seed("alice@example.com", UserRole::Member).await;

    let (status, body) = app
        .post("/api/organizations", &alice, json!({ "name": "Acme", "maxMembers": 5 }))
        .await;
    assert_eq!(status, StatusCode::CREATED);
    assert_eq!(body["data"]["ownerId"], alice.id.to_string());
    assert_eq!(body["data"]["maxMembers"], 5);
    let org_id = data_id(&body);

    let (status, body) = app.get(&format!("/api/organizations/{}/members", org_id), &alice).await;
    assert_eq!(status, StatusCode::OK);
    assert_eq!(body["data"][0]["role"], "OWNER");

    // one organization per user
    let (status, _) = app.post("/api/organizations", &alice, json!({ "name": "Second" })).await;
    assert_eq!(status, StatusCode::BAD_REQUEST);
}

#[tokio::test]
async fn only_owner_changes_an_admin_role() {
    let app = TestApp::new();
    let (org_id, alice, bob, carol) = org_with_admins(&app).await;
    let uri = format!("/api/organizations/{}/members/{}", org_id, carol.id);

    let (status, body) = app.patch(&uri, &bob, json!({ "role": "MEMBER" })).await;
    assert_eq!(status, StatusCode::FORBIDDEN);
    assert_eq!(body["error"], "Only the owner can change an admin's role");

    let (status, body) = app.patch(&uri, &alice, json!({ "role": "MEMBER" })).await;
    assert_eq!(status, StatusCode::OK);
    assert_eq!(body["data"]["role"], "MEMBER");

    // Bob may now manage Carol as a plain member
    let (status, _) = app.patch(&uri, &bob, json!({ "role": "GUEST" })).await;
    assert_eq!(status, StatusCode::OK);
}

#[tokio::test]
async fn owner_cannot_be_changed_or_removed() {
    let app = TestApp::new();
    let (org_id, alice, bob, _) = org_with_admins(&app).await;
    let uri = format!("/api/organizations/{}/members/{}", org_id, alice.id);

    let (status, _) = app.patch(&uri, &bob, json!({ "role": "MEMBER" })).await;
    assert_eq!(status, StatusCode::BAD_REQUEST);

    let (status, _) = app.delete(&uri, &bob).await;
    assert_eq!(status, StatusCode::BAD_REQUEST);

    let (status, body) = app
        .post(&format!("/api/organizations/{}/leave", org_id), &alice, json!({}))
        .await;
    assert_eq!(status, StatusCode::BAD_REQUEST);
    assert_eq!(body["error"], "The owner cannot leave the organization; transfer ownership first");
}

#[tokio::test]
async fn outsiders_and_plain_members_are_refused() {
    let app = TestApp::new();
    let (org_id, alice, _, _) = org_with_admins(&app).await;
    let dave = app.seed("dave@example.com", UserRole::Admin).await;

    // a global admin holds no role in the organization
    let (status, _) = app.get(&format!("/api/organizations/{}", org_id), &dave).await;
    assert_eq!(status, StatusCode::FORBIDDEN);

    let (status, _) = app
        .post(
            &format!("/api/organizations/{}/members", org_id),
            &alice,
            json!({ "email": dave.email }),
        )
        .await;
    assert_eq!(status, StatusCode::CREATED);

    let (status, _) = app
        .patch(&format!("/api/organizations/{}", org_id), &dave, json!({ "name": "Hijacked" }))
        .await;
    assert_eq!(status, StatusCode::FORBIDDEN);
}

#[tokio::test]
async fn member_quota_is_enforced() {
    let app = TestApp::new();
    let alice = app.seed("alice@example.com", UserRole::Member).await;
    let bob = app.seed("bob@example.com", UserRole::Member).await;
    let carol = app.seed("carol@example.com", UserRole::Member).await;

    let (_, body) = app
        .post("/api/organizations", &alice, json!({ "name": "Tiny", "maxMembers": 2 }))
        .await;
    let org_id = data_id(&body);
    let members = format!("/api/organizations/{}/members", org_id);

    let (status, _) = app.post(&members, &alice, json!({ "email": bob.email })).await;
    assert_eq!(status, StatusCode::CREATED);

    let (status, body) = app.post(&members, &alice, json!({ "email": carol.email })).await;
    assert_eq!(status, StatusCode::BAD_REQUEST);
    assert_eq!(body["error"], "Organization member limit reached (2)");

    let (status, _) = app
        .patch(&format!("/api/organizations/{}", org_id), &alice, json!({ "maxMembers": 1 }))
        .await;
    assert_eq!(status, StatusCode::BAD_REQUEST);
}

#[tokio::test]
async fn transfer_then_previous_owner_can_leave() {
    let app = TestApp::new();
    let (org_id, alice, bob, _) = org_with_admins(&app).await;

    let (status, body) = app
        .post(
            &format!("/api/organizations/{}/transfer", org_id),
            &bob,
            json!({ "userId": bob.id }),
        )
        .await;
    assert_eq!(status, StatusCode::FORBIDDEN);
    assert_eq!(body["success"], false);

    let (status, body) = app
        .post(
            &format!("/api/organizations/{}/transfer", org_id),
            &alice,
            json!({ "userId": bob.id }),
        )
        .await;
    assert_eq!(status, StatusCode::OK);
    assert_eq!(body["data"]["ownerId"], bob.id.to_string());

    let (_, body) = app.get(&format!("/api/organizations/{}/members", org_id), &alice).await;
    let roles: Vec<_> = body["data"]
        .as_array()
        .unwrap()
        .iter()
        .map(|m| {
            (m["userId"].as_str().unwrap().to_string(), m["role"].as_str().unwrap().to_string())
        })
        .collect();
    assert!(roles.contains(&(bob.id.to_string(), "OWNER".to_string())));
    assert!(roles.contains(&(alice.id.to_string(), "ADMIN".to_string())));

    let (status, _) = app
        .post(&format!("/api/organizations/{}/leave", org_id), &alice, json!({}))
        .await;
    assert_eq!(status, StatusCode::OK);
    let alice_now = app.state.service.get_user(alice.id).await.unwrap().unwrap();
    assert!(alice_now.organization_id.is_none());
}

#[tokio::test]
async fn removing_a_member_detaches_org_teams() {
    let app = TestApp::new();
    let (org_id, alice, bob, _) = org_with_admins(&app).await;
    let erin = app.seed("erin@example.com", UserRole::Member).await;

    app.post(
        &format!("/api/organizations/{}/members", org_id),
        &alice,
        json!({ "email": erin.email }),
    )
    .await;
    let (status, body) = app
        .post("/api/teams", &bob, json!({ "name": "Support", "organizationId": org_id }))
        .await;
    assert_eq!(status, StatusCode::CREATED);
    let team_id = data_id(&body);

    let (status, body) = app.get(&format!("/api/organizations/{}/teams", org_id), &erin).await;
    assert_eq!(status, StatusCode::OK);
    assert_eq!(body["data"][0]["id"], team_id);

    let (status, _) = app
        .post(&format!("/api/teams/{}/members", team_id), &bob, json!({ "email": erin.email }))
        .await;
    assert_eq!(status, StatusCode::CREATED);

    let (status, _) = app
        .delete(&format!("/api/organizations/{}/members/{}", org_id, erin.id), &bob)
        .await;
    assert_eq!(status, StatusCode::OK);
    let membership = app.state.service.get_team_member(team_id.parse().unwrap(), erin.id).await;
    assert!(membership.unwrap().is_none());

    // the organization cannot go while a team remains
    let (status, _) = app.delete(&format!("/api/organizations/{}", org_id), &alice).await;
    assert_eq!(status, StatusCode::BAD_REQUEST);
}

#[tokio::test]
async fn removing_a_member_unshares_their_team_content() {
    let app = TestApp::new();
    let (org_id, alice, bob, carol) = org_with_admins(&app).await;
    let erin = app.seed("erin@example.com", UserRole::Member).await;

    app.post(
        &format!("/api/organizations/{}/members", org_id),
        &alice,
        json!({ "email": erin.email }),
    )
    .await;
    let (_, body) = app
        .post("/api/teams", &bob, json!({ "name": "Support", "organizationId": org_id }))
        .await;
    let team_id = data_id(&body);
    for who in [&erin, &carol] {
        let (status, _) = app
            .post(&format!("/api/teams/{}/members", team_id), &bob, json!({ "email": who.email }))
            .await;
        assert_eq!(status, StatusCode::CREATED);
    }

    let (_, body) = app.post("/api/contacts", &erin, json!({ "firstName": "Ada" })).await;
    let contact_id = data_id(&body);
    let (status, _) = app
        .patch(
            &format!("/api/contacts/{}/share", contact_id),
            &erin,
            json!({ "visibility": "TEAM", "teamId": team_id }),
        )
        .await;
    assert_eq!(status, StatusCode::OK);
    let (status, _) = app.get(&format!("/api/contacts/{}", contact_id), &carol).await;
    assert_eq!(status, StatusCode::OK);

    let (status, _) = app
        .delete(&format!("/api/organizations/{}/members/{}", org_id, erin.id), &alice)
        .await;
    assert_eq!(status, StatusCode::OK);

    let (status, _) = app.get(&format!("/api/contacts/{}", contact_id), &carol).await;
    assert_eq!(status, StatusCode::FORBIDDEN);
    let (status, body) = app.get(&format!("/api/contacts/{}", contact_id), &erin).await;
    assert_eq!(status, StatusCode::OK);
    assert_eq!(body["data"]["visibility"], "PRIVATE");
    assert!(body["data"]["teamId"].is_null());
}

#[tokio::test]
async fn settings_update_racing_a_transfer_keeps_the_new_owner() {
    let app = TestApp::new();
    let (org_id, alice, bob, _) = org_with_admins(&app).await;
    let org_uri = format!("/api/organizations/{}", org_id);
    let transfer_uri = format!("/api/organizations/{}/transfer", org_id);

    let (update, transfer) = tokio::join!(
        app.patch(&org_uri, &alice, json!({ "description": "Renamed in parallel" })),
        app.post(&transfer_uri, &alice, json!({ "userId": bob.id })),
    );
    assert_eq!(update.0, StatusCode::OK);
    assert_eq!(transfer.0, StatusCode::OK);

    let response = app.request(Method::GET, &org_uri, &bob).await;
    response.assert_status_ok();
    let body = response.json::<Value>();
    assert_eq!(body["data"]["ownerId"], bob.id.to_string());
    assert_eq!(body["data"]["description"], "Renamed in parallel");

    let owner = app
        .state
        .service
        .get_org_member(org_id.parse().unwrap(), bob.id)
        .await
        .unwrap()
        .unwrap();
    assert_eq!(owner.role, OrgRole::Owner);
}

#[tokio::test]
async fn blank_names_are_rejected() {
    let app = TestApp::new();
    let alice = app.seed("alice@example.com", UserRole::Member).await;

    let response = app
        .request(Method::POST, "/api/organizations", &alice)
        .json(&json!({ "name": "   " }))
        .await;
    response.assert_status(StatusCode::BAD_REQUEST);
    assert!(response.json::<Value>()["details"]["name"].is_array());

    let (_, body) = app.post("/api/organizations", &alice, json!({ "name": "Acme" })).await;
    let org_id = data_id(&body);
    let (status, _) = app
        .patch(&format!("/api/organizations/{}", org_id), &alice, json!({ "name": " \t " }))
        .await;
    assert_eq!(status, StatusCode::BAD_REQUEST);

    let (status, _) = app.post("/api/teams", &alice, json!({ "name": "  " })).await;
    assert_eq!(status, StatusCode::BAD_REQUEST);
}
