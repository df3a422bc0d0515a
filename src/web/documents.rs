// src/web/documents.rs

use axum::{
    body::Bytes,
    extract::{Json, Path, Query, State},
    http::{header, HeaderMap, HeaderValue, StatusCode},
    response::{IntoResponse, Response},
};
use chrono::Utc;
use serde::{Deserialize, Serialize};
use uuid::Uuid;
use validator::Validate;

use crate::audit_log;
use crate::middleware::AuthUser;
use crate::models::{generate_share_token, Attachment, Document, User};
use crate::permissions::{authorize, GlobalAction, GlobalScope, ResourceAction, ResourceScope};
use crate::web::response::{
    created, non_blank, ok, ApiError, ApiResponse, ApiResult, ValidJson,
};
use crate::web::sharing::{resolve_sharing, Reader, ShareRequest, SharingView};
use crate::web::AppState;
use crate::workspace_service::DocumentChanges;

#[derive(Serialize)]
#[serde(rename_all = "camelCase")]
pub struct AttachmentView {
    pub file_name: String,
    pub content_type: String,
    pub size: u64,
}

impl From<Attachment> for AttachmentView {
    fn from(a: Attachment) -> Self {
        Self {
            file_name: a.file_name,
            content_type: a.content_type,
            size: a.size,
        }
    }
}

#[derive(Serialize)]
#[serde(rename_all = "camelCase")]
pub struct DocumentResponse {
    pub id: Uuid,
    pub owner_id: Uuid,
    pub title: String,
    pub content: String,
    pub attachment: Option<AttachmentView>,
    pub has_share_link: bool,
    #[serde(flatten)]
    pub sharing: SharingView,
    pub created_at: chrono::DateTime<Utc>,
    pub updated_at: chrono::DateTime<Utc>,
}

impl From<Document> for DocumentResponse {
    fn from(d: Document) -> Self {
        Self {
            id: d.id,
            owner_id: d.owner_id,
            title: d.title,
            content: d.content,
            attachment: d.attachment.map(AttachmentView::from),
            has_share_link: d.share_token.is_some(),
            sharing: d.sharing.into(),
            created_at: d.created_at,
            updated_at: d.updated_at,
        }
    }
}

/// What an anonymous link holder gets to see
#[derive(Serialize)]
#[serde(rename_all = "camelCase")]
pub struct SharedDocumentResponse {
    pub title: String,
    pub content: String,
    pub attachment: Option<AttachmentView>,
    pub updated_at: chrono::DateTime<Utc>,
}

#[derive(Serialize)]
#[serde(rename_all = "camelCase")]
pub struct ShareLinkResponse {
    pub token: String,
    pub path: String,
}

#[derive(Deserialize, Validate)]
pub struct CreateDocumentRequest {
    #[validate(
        length(min = 1, max = 200, message = "Title must be 1-200 characters"),
        custom(function = "non_blank")
    )]
    pub title: String,
    #[serde(default)]
    #[validate(length(max = 100000))]
    pub content: String,
}

#[derive(Deserialize, Validate)]
pub struct UpdateDocumentRequest {
    #[validate(
        length(min = 1, max = 200, message = "Title must be 1-200 characters"),
        custom(function = "non_blank")
    )]
    pub title: Option<String>,
    #[validate(length(max = 100000))]
    pub content: Option<String>,
}

#[derive(Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct UploadParams {
    pub file_name: Option<String>,
}

async fn require_document(state: &AppState, id: Uuid) -> Result<Document, ApiError> {
    state
        .service
        .get_document(id)
        .await?
        .ok_or_else(|| ApiError::not_found("Document not found"))
}

async fn authorized_document(
    state: &AppState,
    me: &User,
    id: Uuid,
    action: ResourceAction,
) -> Result<Document, ApiError> {
    let document = require_document(state, id).await?;
    let reader = Reader::load(state, me).await?;
    authorize::<ResourceScope>(reader.access(document.owner_id, &document.sharing), &action)?;
    Ok(document)
}

pub async fn list_documents(
    State(state): State<AppState>,
    AuthUser(me): AuthUser,
) -> ApiResult<Vec<DocumentResponse>> {
    let reader = Reader::load(&state, &me).await?;
    let mut documents: Vec<Document> = state
        .service
        .list_documents()
        .await?
        .into_iter()
        .filter(|d| reader.access(d.owner_id, &d.sharing).is_some())
        .collect();
    documents.sort_by(|a, b| b.updated_at.cmp(&a.updated_at));
    Ok(ok(documents.into_iter().map(DocumentResponse::from).collect()))
}

pub async fn create_document(
    State(state): State<AppState>,
    AuthUser(me): AuthUser,
    ValidJson(payload): ValidJson<CreateDocumentRequest>,
) -> Result<(StatusCode, Json<ApiResponse<DocumentResponse>>), ApiError> {
    authorize::<GlobalScope>(Some(me.role), &GlobalAction::CreateContent)?;

    let document = Document::new(me.id, &payload.title, payload.content);
    state.service.create_document(&document).await?;

    audit_log!(state.events, "document.created", Some(me.id), Some(document.id));
    Ok(created(document.into()))
}

pub async fn get_document(
    State(state): State<AppState>,
    AuthUser(me): AuthUser,
    Path(id): Path<Uuid>,
) -> ApiResult<DocumentResponse> {
    let document = authorized_document(&state, &me, id, ResourceAction::View).await?;
    Ok(ok(document.into()))
}

pub async fn update_document(
    State(state): State<AppState>,
    AuthUser(me): AuthUser,
    Path(id): Path<Uuid>,
    ValidJson(payload): ValidJson<UpdateDocumentRequest>,
) -> ApiResult<DocumentResponse> {
    authorize::<GlobalScope>(Some(me.role), &GlobalAction::CreateContent)?;
    authorized_document(&state, &me, id, ResourceAction::Edit).await?;

    let changes = DocumentChanges {
        title: payload.title,
        content: payload.content,
    };
    let document = state.service.update_document(id, changes).await?;

    audit_log!(state.events, "document.updated", Some(me.id), Some(id));
    Ok(ok(document.into()))
}

/// Deletes the attachment first; a failing object store does not keep the
/// document around
pub async fn delete_document(
    State(state): State<AppState>,
    AuthUser(me): AuthUser,
    Path(id): Path<Uuid>,
) -> ApiResult<serde_json::Value> {
    let document = authorized_document(&state, &me, id, ResourceAction::Delete).await?;

    if let Some(attachment) = &document.attachment {
        if let Err(e) = state.objects.delete(&attachment.key).await {
            tracing::warn!(document_id = %id, key = %attachment.key, error = %e,
                "attachment delete failed");
        }
    }
    state.service.delete_document(id).await?;

    audit_log!(state.events, "document.deleted", Some(me.id), Some(id));
    Ok(ok(serde_json::json!({ "id": id })))
}

pub async fn share_document(
    State(state): State<AppState>,
    AuthUser(me): AuthUser,
    Path(id): Path<Uuid>,
    ValidJson(payload): ValidJson<ShareRequest>,
) -> ApiResult<DocumentResponse> {
    authorized_document(&state, &me, id, ResourceAction::Share).await?;
    let sharing = resolve_sharing(&state, &me, &payload).await?;
    let document = state.service.share_document(id, sharing).await?;

    audit_log!(state.events, "document.shared", Some(me.id), Some(id),
        "visibility" => format!("{:?}", document.sharing.visibility()));
    Ok(ok(document.into()))
}

pub async fn upload_file(
    State(state): State<AppState>,
    AuthUser(me): AuthUser,
    Path(id): Path<Uuid>,
    Query(params): Query<UploadParams>,
    headers: HeaderMap,
    body: Bytes,
) -> ApiResult<DocumentResponse> {
    authorize::<GlobalScope>(Some(me.role), &GlobalAction::CreateContent)?;
    let document = authorized_document(&state, &me, id, ResourceAction::Edit).await?;
    if body.is_empty() {
        return Err(ApiError::bad_request("File body is empty"));
    }

    let file_name = params
        .file_name
        .filter(|n| !n.trim().is_empty())
        .unwrap_or_else(|| "file".to_string());
    let content_type = headers
        .get(header::CONTENT_TYPE)
        .and_then(|v| v.to_str().ok())
        .unwrap_or("application/octet-stream")
        .to_string();

    let key = document.object_key(&file_name);
    state.objects.put(&key, &body).await?;

    let attachment = Attachment {
        key: key.clone(),
        file_name,
        content_type,
        size: body.len() as u64,
    };
    let (document, previous) = state.service.set_attachment(id, attachment).await?;

    // only once the record points at the new object
    if let Some(previous) = previous.filter(|p| p.key != key) {
        if let Err(e) = state.objects.delete(&previous.key).await {
            tracing::warn!(document_id = %id, key = %previous.key, error = %e,
                "old attachment delete failed");
        }
    }

    audit_log!(state.events, "document.file_uploaded", Some(me.id), Some(id),
        "size" => body.len());
    Ok(ok(document.into()))
}

fn file_response(attachment: &Attachment, data: Vec<u8>) -> Response {
    let content_type = HeaderValue::from_str(&attachment.content_type)
        .unwrap_or_else(|_| HeaderValue::from_static("application/octet-stream"));
    let file_name = attachment.file_name.replace('"', "");
    let disposition = HeaderValue::from_str(&format!("attachment; filename=\"{}\"", file_name))
        .unwrap_or_else(|_| HeaderValue::from_static("attachment"));

    (
        [(header::CONTENT_TYPE, content_type), (header::CONTENT_DISPOSITION, disposition)],
        data,
    )
        .into_response()
}

pub async fn download_file(
    State(state): State<AppState>,
    AuthUser(me): AuthUser,
    Path(id): Path<Uuid>,
) -> Result<Response, ApiError> {
    let document = authorized_document(&state, &me, id, ResourceAction::View).await?;
    let attachment = document
        .attachment
        .ok_or_else(|| ApiError::not_found("Document has no file"))?;

    let data = state.objects.get(&attachment.key).await?;
    Ok(file_response(&attachment, data))
}

pub async fn create_link(
    State(state): State<AppState>,
    AuthUser(me): AuthUser,
    Path(id): Path<Uuid>,
) -> ApiResult<ShareLinkResponse> {
    authorized_document(&state, &me, id, ResourceAction::ManageLink).await?;

    let token = generate_share_token();
    state.service.set_share_token(id, Some(token.clone())).await?;

    audit_log!(state.events, "document.link_created", Some(me.id), Some(id));
    Ok(ok(ShareLinkResponse {
        path: format!("/api/shared/{}", token),
        token,
    }))
}

pub async fn revoke_link(
    State(state): State<AppState>,
    AuthUser(me): AuthUser,
    Path(id): Path<Uuid>,
) -> ApiResult<DocumentResponse> {
    let document = authorized_document(&state, &me, id, ResourceAction::ManageLink).await?;
    if document.share_token.is_none() {
        return Err(ApiError::not_found("Document has no share link"));
    }
    let document = state.service.set_share_token(id, None).await?;

    audit_log!(state.events, "document.link_revoked", Some(me.id), Some(id));
    Ok(ok(document.into()))
}

pub async fn shared_document(
    State(state): State<AppState>,
    Path(token): Path<String>,
) -> ApiResult<SharedDocumentResponse> {
    let document = state
        .service
        .find_document_by_share_token(&token)
        .await?
        .ok_or_else(|| ApiError::not_found("Shared document not found"))?;

    Ok(ok(SharedDocumentResponse {
        title: document.title,
        content: document.content,
        attachment: document.attachment.map(AttachmentView::from),
        updated_at: document.updated_at,
    }))
}
