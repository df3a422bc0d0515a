// src/web/contacts.rs

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
use crate::models::{Contact, User};
use crate::permissions::{authorize, GlobalAction, GlobalScope, ResourceAction, ResourceScope};
use crate::web::response::{
    created, non_blank, ok, ApiError, ApiResponse, ApiResult, ValidJson,
};
use crate::web::sharing::{resolve_sharing, Reader, ShareRequest, SharingView};
use crate::web::AppState;
use crate::workspace_service::ContactChanges;

#[derive(Serialize)]
#[serde(rename_all = "camelCase")]
pub struct ContactResponse {
    pub id: Uuid,
    pub owner_id: Uuid,
    pub first_name: String,
    pub last_name: String,
    pub email: Option<String>,
    pub phone: Option<String>,
    pub company: Option<String>,
    pub notes: Option<String>,
    #[serde(flatten)]
    pub sharing: SharingView,
    pub created_at: chrono::DateTime<Utc>,
    pub updated_at: chrono::DateTime<Utc>,
}

impl From<Contact> for ContactResponse {
    fn from(c: Contact) -> Self {
        Self {
            id: c.id,
            owner_id: c.owner_id,
            first_name: c.first_name,
            last_name: c.last_name,
            email: c.email,
            phone: c.phone,
            company: c.company,
            notes: c.notes,
            sharing: c.sharing.into(),
            created_at: c.created_at,
            updated_at: c.updated_at,
        }
    }
}

#[derive(Deserialize, Validate)]
#[serde(rename_all = "camelCase")]
pub struct CreateContactRequest {
    #[validate(
        length(min = 1, max = 100, message = "First name must be 1-100 characters"),
        custom(function = "non_blank")
    )]
    pub first_name: String,
    #[validate(length(max = 100, message = "Last name must be at most 100 characters"))]
    #[serde(default)]
    pub last_name: String,
    #[validate(email(message = "Invalid email address"))]
    pub email: Option<String>,
    #[validate(length(max = 40))]
    pub phone: Option<String>,
    #[validate(length(max = 200))]
    pub company: Option<String>,
    #[validate(length(max = 5000))]
    pub notes: Option<String>,
}

#[derive(Deserialize, Validate)]
#[serde(rename_all = "camelCase")]
pub struct UpdateContactRequest {
    #[validate(
        length(min = 1, max = 100, message = "First name must be 1-100 characters"),
        custom(function = "non_blank")
    )]
    pub first_name: Option<String>,
    #[validate(length(max = 100, message = "Last name must be at most 100 characters"))]
    pub last_name: Option<String>,
    #[validate(email(message = "Invalid email address"))]
    pub email: Option<String>,
    #[validate(length(max = 40))]
    pub phone: Option<String>,
    #[validate(length(max = 200))]
    pub company: Option<String>,
    #[validate(length(max = 5000))]
    pub notes: Option<String>,
}

async fn require_contact(state: &AppState, id: Uuid) -> Result<Contact, ApiError> {
    state
        .service
        .get_contact(id)
        .await?
        .ok_or_else(|| ApiError::not_found("Contact not found"))
}

/// Load the contact and check `action` against the requester's access to it
async fn authorized_contact(
    state: &AppState,
    me: &User,
    id: Uuid,
    action: ResourceAction,
) -> Result<Contact, ApiError> {
    let contact = require_contact(state, id).await?;
    let reader = Reader::load(state, me).await?;
    authorize::<ResourceScope>(reader.access(contact.owner_id, &contact.sharing), &action)?;
    Ok(contact)
}

pub async fn list_contacts(
    State(state): State<AppState>,
    AuthUser(me): AuthUser,
) -> ApiResult<Vec<ContactResponse>> {
    let reader = Reader::load(&state, &me).await?;
    let mut contacts: Vec<Contact> = state
        .service
        .list_contacts()
        .await?
        .into_iter()
        .filter(|c| reader.access(c.owner_id, &c.sharing).is_some())
        .collect();
    contacts.sort_by(|a, b| {
        (a.last_name.to_lowercase(), a.first_name.to_lowercase())
            .cmp(&(b.last_name.to_lowercase(), b.first_name.to_lowercase()))
    });
    Ok(ok(contacts.into_iter().map(ContactResponse::from).collect()))
}

pub async fn create_contact(
    State(state): State<AppState>,
    AuthUser(me): AuthUser,
    ValidJson(payload): ValidJson<CreateContactRequest>,
) -> Result<(StatusCode, Json<ApiResponse<ContactResponse>>), ApiError> {
    authorize::<GlobalScope>(Some(me.role), &GlobalAction::CreateContent)?;

    let mut contact = Contact::new(me.id, &payload.first_name, &payload.last_name);
    contact.email = payload.email;
    contact.phone = payload.phone;
    contact.company = payload.company;
    contact.notes = payload.notes;
    state.service.create_contact(&contact).await?;

    audit_log!(state.events, "contact.created", Some(me.id), Some(contact.id));
    Ok(created(contact.into()))
}

pub async fn get_contact(
    State(state): State<AppState>,
    AuthUser(me): AuthUser,
    Path(id): Path<Uuid>,
) -> ApiResult<ContactResponse> {
    let contact = authorized_contact(&state, &me, id, ResourceAction::View).await?;
    Ok(ok(contact.into()))
}

pub async fn update_contact(
    State(state): State<AppState>,
    AuthUser(me): AuthUser,
    Path(id): Path<Uuid>,
    ValidJson(payload): ValidJson<UpdateContactRequest>,
) -> ApiResult<ContactResponse> {
    authorize::<GlobalScope>(Some(me.role), &GlobalAction::CreateContent)?;
    authorized_contact(&state, &me, id, ResourceAction::Edit).await?;

    let changes = ContactChanges {
        first_name: payload.first_name,
        last_name: payload.last_name,
        email: payload.email,
        phone: payload.phone,
        company: payload.company,
        notes: payload.notes,
    };
    let contact = state.service.update_contact(id, changes).await?;

    audit_log!(state.events, "contact.updated", Some(me.id), Some(id));
    Ok(ok(contact.into()))
}

pub async fn delete_contact(
    State(state): State<AppState>,
    AuthUser(me): AuthUser,
    Path(id): Path<Uuid>,
) -> ApiResult<serde_json::Value> {
    authorized_contact(&state, &me, id, ResourceAction::Delete).await?;
    state.service.delete_contact(id).await?;

    audit_log!(state.events, "contact.deleted", Some(me.id), Some(id));
    Ok(ok(serde_json::json!({ "id": id })))
}

pub async fn share_contact(
    State(state): State<AppState>,
    AuthUser(me): AuthUser,
    Path(id): Path<Uuid>,
    ValidJson(payload): ValidJson<ShareRequest>,
) -> ApiResult<ContactResponse> {
    authorized_contact(&state, &me, id, ResourceAction::Share).await?;
    let sharing = resolve_sharing(&state, &me, &payload).await?;
    let contact = state.service.share_contact(id, sharing).await?;

    audit_log!(state.events, "contact.shared", Some(me.id), Some(id),
        "visibility" => format!("{:?}", contact.sharing.visibility()));
    Ok(ok(contact.into()))
}
