// src/web/facilities.rs

use axum::{
    extract::{Json, Path, State},
    http::StatusCode,
};
use chrono::Utc;
use serde::{Deserialize, Serialize};
use uuid::Uuid;
use validator::Validate;

use crate::audit_log;
use crate::middleware::AuthUser;
use crate::models::Facility;
use crate::permissions::{authorize, GlobalAction, GlobalScope};
use crate::web::response::{
    created, non_blank, ok, ApiError, ApiResponse, ApiResult, ValidJson,
};
use crate::web::AppState;
use crate::workspace_service::FacilityChanges;

#[derive(Serialize)]
#[serde(rename_all = "camelCase")]
pub struct FacilityResponse {
    pub id: Uuid,
    pub name: String,
    pub address: String,
    pub city: Option<String>,
    pub state: Option<String>,
    pub postal_code: Option<String>,
    pub country: Option<String>,
    pub kind: Option<String>,
    pub phone: Option<String>,
    pub notes: Option<String>,
    pub created_by: Uuid,
    pub created_at: chrono::DateTime<Utc>,
    pub updated_at: chrono::DateTime<Utc>,
}

impl From<Facility> for FacilityResponse {
    fn from(f: Facility) -> Self {
        Self {
            id: f.id,
            name: f.name,
            address: f.address,
            city: f.city,
            state: f.state,
            postal_code: f.postal_code,
            country: f.country,
            kind: f.kind,
            phone: f.phone,
            notes: f.notes,
            created_by: f.created_by,
            created_at: f.created_at,
            updated_at: f.updated_at,
        }
    }
}

/// One facility as sent by clients, used for create and for import rows
#[derive(Debug, Deserialize, Validate)]
#[serde(rename_all = "camelCase")]
pub struct FacilityRow {
    #[validate(
        length(min = 1, max = 200, message = "Name must be 1-200 characters"),
        custom(function = "non_blank")
    )]
    pub name: String,
    #[validate(
        length(min = 1, max = 300, message = "Address must be 1-300 characters"),
        custom(function = "non_blank")
    )]
    pub address: String,
    #[validate(length(max = 100))]
    pub city: Option<String>,
    #[validate(length(max = 100))]
    pub state: Option<String>,
    #[validate(length(max = 20))]
    pub postal_code: Option<String>,
    #[validate(length(max = 100))]
    pub country: Option<String>,
    #[validate(length(max = 50))]
    pub kind: Option<String>,
    #[validate(length(max = 40))]
    pub phone: Option<String>,
    #[validate(length(max = 2000))]
    pub notes: Option<String>,
}

impl FacilityRow {
    pub fn into_facility(self, created_by: Uuid) -> Facility {
        let mut facility = Facility::new(&self.name, &self.address, created_by);
        facility.city = self.city;
        facility.state = self.state;
        facility.postal_code = self.postal_code;
        facility.country = self.country;
        facility.kind = self.kind;
        facility.phone = self.phone;
        facility.notes = self.notes;
        facility
    }
}

#[derive(Deserialize, Validate)]
#[serde(rename_all = "camelCase")]
pub struct UpdateFacilityRequest {
    #[validate(
        length(min = 1, max = 200, message = "Name must be 1-200 characters"),
        custom(function = "non_blank")
    )]
    pub name: Option<String>,
    #[validate(
        length(min = 1, max = 300, message = "Address must be 1-300 characters"),
        custom(function = "non_blank")
    )]
    pub address: Option<String>,
    #[validate(length(max = 100))]
    pub city: Option<String>,
    #[validate(length(max = 100))]
    pub state: Option<String>,
    #[validate(length(max = 20))]
    pub postal_code: Option<String>,
    #[validate(length(max = 100))]
    pub country: Option<String>,
    #[validate(length(max = 50))]
    pub kind: Option<String>,
    #[validate(length(max = 40))]
    pub phone: Option<String>,
    #[validate(length(max = 2000))]
    pub notes: Option<String>,
}

#[derive(Deserialize, Validate)]
pub struct ImportRequest {
    #[validate(length(min = 1, max = 5000, message = "rows must contain 1-5000 entries"))]
    pub rows: Vec<serde_json::Value>,
}

#[derive(Debug, Serialize)]
pub struct RowError {
    pub row: usize,
    pub message: String,
}

#[derive(Serialize)]
pub struct ImportResponse {
    pub created: Vec<FacilityResponse>,
    pub skipped: Vec<usize>,
    pub errors: Vec<RowError>,
}

/// Parse and validate raw import rows. Rows that fail are reported by
/// their zero-based index; the rest come back paired with that index.
pub fn parse_rows(
    rows: Vec<serde_json::Value>,
    created_by: Uuid,
) -> (Vec<(usize, Facility)>, Vec<RowError>) {
    let mut valid = Vec::new();
    let mut errors = Vec::new();

    for (row, value) in rows.into_iter().enumerate() {
        let parsed: FacilityRow = match serde_json::from_value(value) {
            Ok(parsed) => parsed,
            Err(e) => {
                errors.push(RowError { row, message: e.to_string() });
                continue;
            }
        };
        if let Err(e) = parsed.validate() {
            errors.push(RowError { row, message: e.to_string() });
            continue;
        }
        valid.push((row, parsed.into_facility(created_by)));
    }
    (valid, errors)
}

async fn require_facility(state: &AppState, id: Uuid) -> Result<Facility, ApiError> {
    state
        .service
        .get_facility(id)
        .await?
        .ok_or_else(|| ApiError::not_found("Facility not found"))
}

pub async fn list_facilities(
    State(state): State<AppState>,
    AuthUser(_me): AuthUser,
) -> ApiResult<Vec<FacilityResponse>> {
    let facilities = state.service.list_facilities().await?;
    Ok(ok(facilities.into_iter().map(FacilityResponse::from).collect()))
}

pub async fn get_facility(
    State(state): State<AppState>,
    AuthUser(_me): AuthUser,
    Path(id): Path<Uuid>,
) -> ApiResult<FacilityResponse> {
    Ok(ok(require_facility(&state, id).await?.into()))
}

pub async fn create_facility(
    State(state): State<AppState>,
    AuthUser(me): AuthUser,
    ValidJson(payload): ValidJson<FacilityRow>,
) -> Result<(StatusCode, Json<ApiResponse<FacilityResponse>>), ApiError> {
    authorize::<GlobalScope>(Some(me.role), &GlobalAction::ManageFacilities)?;

    let facility = payload.into_facility(me.id);
    state.service.create_facility(&facility).await?;

    audit_log!(state.events, "facility.created", Some(me.id), Some(facility.id));
    Ok(created(facility.into()))
}

pub async fn update_facility(
    State(state): State<AppState>,
    AuthUser(me): AuthUser,
    Path(id): Path<Uuid>,
    ValidJson(payload): ValidJson<UpdateFacilityRequest>,
) -> ApiResult<FacilityResponse> {
    authorize::<GlobalScope>(Some(me.role), &GlobalAction::ManageFacilities)?;
    let changes = FacilityChanges {
        name: payload.name,
        address: payload.address,
        city: payload.city,
        state: payload.state,
        postal_code: payload.postal_code,
        country: payload.country,
        kind: payload.kind,
        phone: payload.phone,
        notes: payload.notes,
    };
    let facility = state.service.update_facility(id, changes).await?;

    audit_log!(state.events, "facility.updated", Some(me.id), Some(id));
    Ok(ok(facility.into()))
}

pub async fn delete_facility(
    State(state): State<AppState>,
    AuthUser(me): AuthUser,
    Path(id): Path<Uuid>,
) -> ApiResult<serde_json::Value> {
    authorize::<GlobalScope>(Some(me.role), &GlobalAction::ManageFacilities)?;
    state.service.delete_facility(id).await?;

    audit_log!(state.events, "facility.deleted", Some(me.id), Some(id));
    Ok(ok(serde_json::json!({ "id": id })))
}

pub async fn import_facilities(
    State(state): State<AppState>,
    AuthUser(me): AuthUser,
    ValidJson(payload): ValidJson<ImportRequest>,
) -> ApiResult<ImportResponse> {
    authorize::<GlobalScope>(Some(me.role), &GlobalAction::ImportFacilities)?;

    let (rows, errors) = parse_rows(payload.rows, me.id);
    let summary = state.service.import_facilities(rows).await?;

    tracing::info!(
        created = summary.created.len(),
        skipped = summary.skipped.len(),
        invalid = errors.len(),
        "facility import finished"
    );
    audit_log!(state.events, "facility.imported", Some(me.id), None,
        "created" => summary.created.len(),
        "skipped" => summary.skipped.len(),
        "invalid" => errors.len());

    Ok(ok(ImportResponse {
        created: summary.created.into_iter().map(FacilityResponse::from).collect(),
        skipped: summary.skipped,
        errors,
    }))
}
