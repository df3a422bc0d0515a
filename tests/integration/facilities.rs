// tests/integration/facilities.rs

use axum::http::StatusCode;
use dashdesk::models::UserRole;
use serde_json::json;

use crate::common::{data_id, TestApp};

#[tokio::test]
async fn import_dedups_and_reports_bad_rows() {
    let app = TestApp::new();
    let admin = app.seed("admin@example.com", UserRole::Admin).await;

    let (status, _) = app
        .post("/api/facilities", &admin, json!({ "name": "North Yard", "address": "12 Dock Rd" }))
        .await;
    assert_eq!(status, StatusCode::CREATED);

    let rows = json!({ "rows": [
        { "name": "South Depot", "address": "1 Rail Ave", "city": "Leeds" },
        { "name": "south depot", "address": "1  RAIL AVE" },
        { "name": "NORTH YARD", "address": "12 dock rd" },
        { "name": "", "address": "9 Nowhere" },
        { "address": "missing name" },
        { "name": "East Shed", "address": "3 Quay St" }
    ]});
    let (status, body) = app.post("/api/facilities/import", &admin, rows).await;
    assert_eq!(status, StatusCode::OK);

    let created: Vec<_> = body["data"]["created"]
        .as_array()
        .unwrap()
        .iter()
        .map(|f| f["name"].as_str().unwrap().to_string())
        .collect();
    assert_eq!(created, vec!["South Depot", "East Shed"]);
    assert_eq!(body["data"]["skipped"], json!([1, 2]));
    let error_rows: Vec<_> = body["data"]["errors"]
        .as_array()
        .unwrap()
        .iter()
        .map(|e| e["row"].as_u64().unwrap())
        .collect();
    assert_eq!(error_rows, vec![3, 4]);

    let (_, body) = app.get("/api/facilities", &admin).await;
    assert_eq!(body["data"].as_array().unwrap().len(), 3);
}

#[tokio::test]
async fn members_read_but_do_not_write() {
    let app = TestApp::new();
    let admin = app.seed("admin@example.com", UserRole::Admin).await;
    let member = app.seed("member@example.com", UserRole::Member).await;

    let (_, body) = app
        .post("/api/facilities", &admin, json!({ "name": "North Yard", "address": "12 Dock Rd" }))
        .await;
    let facility_id = data_id(&body);

    let (status, body) = app.get("/api/facilities", &member).await;
    assert_eq!(status, StatusCode::OK);
    assert_eq!(body["data"].as_array().unwrap().len(), 1);
    let (status, _) = app.get(&format!("/api/facilities/{}", facility_id), &member).await;
    assert_eq!(status, StatusCode::OK);

    let (status, body) = app
        .post(
            "/api/facilities/import",
            &member,
            json!({ "rows": [{ "name": "Shed", "address": "1 Lane" }] }),
        )
        .await;
    assert_eq!(status, StatusCode::FORBIDDEN);
    assert_eq!(body["error"], "Only administrators can import facilities");

    let (status, _) = app
        .patch(&format!("/api/facilities/{}", facility_id), &member, json!({ "name": "Mine" }))
        .await;
    assert_eq!(status, StatusCode::FORBIDDEN);
    let (status, _) = app.delete(&format!("/api/facilities/{}", facility_id), &member).await;
    assert_eq!(status, StatusCode::FORBIDDEN);
}

#[tokio::test]
async fn duplicate_facility_is_a_conflict() {
    let app = TestApp::new();
    let admin = app.seed("admin@example.com", UserRole::Admin).await;
    let row = json!({ "name": "North Yard", "address": "12 Dock Rd" });

    let (status, _) = app.post("/api/facilities", &admin, row.clone()).await;
    assert_eq!(status, StatusCode::CREATED);
    let (status, _) = app.post("/api/facilities", &admin, row).await;
    assert_eq!(status, StatusCode::CONFLICT);

    let (status, _) = app
        .post("/api/facilities/import", &admin, json!({ "rows": [] }))
        .await;
    assert_eq!(status, StatusCode::BAD_REQUEST);
}
