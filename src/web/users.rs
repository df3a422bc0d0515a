// src/web/users.rs

use axum::extract::{Path, State};
use chrono::Utc;
use serde::{Deserialize, Serialize};
use uuid::Uuid;
use validator::Validate;

use crate::audit_log;
use crate::middleware::AuthUser;
use crate::models::{check_policy, PasswordHash, User, UserRole};
use crate::permissions::{authorize, GlobalAction, GlobalScope};
use crate::web::response::{non_blank, ok, ApiError, ApiResult, ValidJson};
use crate::web::AppState;

#[derive(Serialize)]
#[serde(rename_all = "camelCase")]
pub struct UserResponse {
    pub id: Uuid,
    pub email: String,
    pub name: String,
    pub role: UserRole,
    pub is_active: bool,
    pub team_id: Option<Uuid>,
    pub organization_id: Option<Uuid>,
    pub created_at: chrono::DateTime<Utc>,
    pub last_login: Option<chrono::DateTime<Utc>>,
}

impl From<User> for UserResponse {
    fn from(user: User) -> Self {
        Self {
            id: user.id,
            email: user.email,
            name: user.name,
            role: user.role,
            is_active: user.is_active,
            team_id: user.team_id,
            organization_id: user.organization_id,
            created_at: user.created_at,
            last_login: user.last_login,
        }
    }
}

/// A user's membership in an organization or team
#[derive(Serialize)]
#[serde(rename_all = "camelCase")]
pub struct MemberResponse<R: Serialize> {
    pub user_id: Uuid,
    pub email: String,
    pub name: String,
    pub role: R,
    pub joined_at: chrono::DateTime<Utc>,
}

impl<R: Serialize> MemberResponse<R> {
    pub fn new(user: &User, role: R, joined_at: chrono::DateTime<Utc>) -> Self {
        Self {
            user_id: user.id,
            email: user.email.clone(),
            name: user.name.clone(),
            role,
            joined_at,
        }
    }
}

#[derive(Deserialize, Validate)]
pub struct UpdateProfileRequest {
    #[validate(
        length(min = 1, max = 100, message = "Name must be 1-100 characters"),
        custom(function = "non_blank")
    )]
    pub name: Option<String>,
}

#[derive(Deserialize, Validate)]
pub struct ChangeRoleRequest {
    pub role: UserRole,
}

#[derive(Deserialize, Validate)]
#[serde(rename_all = "camelCase")]
pub struct ChangeStatusRequest {
    pub is_active: bool,
}

#[derive(Deserialize, Validate)]
#[serde(rename_all = "camelCase")]
pub struct ChangePasswordRequest {
    #[validate(length(min = 1, message = "Current password is required"))]
    pub current_password: String,
    pub new_password: String,
}

pub(crate) async fn require_user(state: &AppState, id: Uuid) -> Result<User, ApiError> {
    state
        .service
        .get_user(id)
        .await?
        .ok_or_else(|| ApiError::not_found("User not found"))
}

pub async fn list_users(
    State(state): State<AppState>,
    AuthUser(me): AuthUser,
) -> ApiResult<Vec<UserResponse>> {
    authorize::<GlobalScope>(Some(me.role), &GlobalAction::ListUsers)?;

    let mut users = state.service.list_users().await?;
    users.sort_by(|a, b| a.created_at.cmp(&b.created_at));
    Ok(ok(users.into_iter().map(UserResponse::from).collect()))
}

pub async fn get_user(
    State(state): State<AppState>,
    AuthUser(me): AuthUser,
    Path(id): Path<Uuid>,
) -> ApiResult<UserResponse> {
    let is_self = me.id == id;
    authorize::<GlobalScope>(Some(me.role), &GlobalAction::ViewUser { is_self })?;
    let user = require_user(&state, id).await?;
    Ok(ok(user.into()))
}

pub async fn update_user(
    State(state): State<AppState>,
    AuthUser(me): AuthUser,
    Path(id): Path<Uuid>,
    ValidJson(payload): ValidJson<UpdateProfileRequest>,
) -> ApiResult<UserResponse> {
    let is_self = me.id == id;
    authorize::<GlobalScope>(Some(me.role), &GlobalAction::EditProfile { is_self })?;

    let user = match payload.name {
        Some(name) => state.service.rename_user(id, &name).await?,
        None => require_user(&state, id).await?,
    };

    audit_log!(state.events, "user.updated", Some(me.id), Some(id));
    Ok(ok(user.into()))
}

pub async fn change_role(
    State(state): State<AppState>,
    AuthUser(me): AuthUser,
    Path(id): Path<Uuid>,
    ValidJson(payload): ValidJson<ChangeRoleRequest>,
) -> ApiResult<UserResponse> {
    let is_self = me.id == id;
    authorize::<GlobalScope>(Some(me.role), &GlobalAction::ChangeRole { is_self })?;

    let (previous, user) = state.service.set_user_role(id, payload.role).await?;

    audit_log!(state.events, "user.role_changed", Some(me.id), Some(id),
        "from" => previous, "to" => user.role);
    Ok(ok(user.into()))
}

pub async fn change_status(
    State(state): State<AppState>,
    AuthUser(me): AuthUser,
    Path(id): Path<Uuid>,
    ValidJson(payload): ValidJson<ChangeStatusRequest>,
) -> ApiResult<UserResponse> {
    let is_self = me.id == id;
    authorize::<GlobalScope>(Some(me.role), &GlobalAction::SetActive { is_self })?;

    let user = state.service.set_user_active(id, payload.is_active).await?;

    audit_log!(state.events, "user.status_changed", Some(me.id), Some(id),
        "active" => user.is_active);
    Ok(ok(user.into()))
}

pub async fn delete_user(
    State(state): State<AppState>,
    AuthUser(me): AuthUser,
    Path(id): Path<Uuid>,
) -> ApiResult<serde_json::Value> {
    let is_self = me.id == id;
    authorize::<GlobalScope>(Some(me.role), &GlobalAction::DeleteUser { is_self })?;

    let object_keys = state.service.delete_user(id).await?;
    for key in object_keys {
        if let Err(e) = state.objects.delete(&key).await {
            tracing::warn!(%key, error = %e, "failed to delete attachment of removed user");
        }
    }

    audit_log!(state.events, "user.deleted", Some(me.id), Some(id));
    Ok(ok(serde_json::json!({ "id": id })))
}

pub async fn change_password(
    State(state): State<AppState>,
    AuthUser(me): AuthUser,
    ValidJson(payload): ValidJson<ChangePasswordRequest>,
) -> ApiResult<serde_json::Value> {
    if !me.password_hash.verify(&payload.current_password)? {
        return Err(ApiError::bad_request("Current password is incorrect"));
    }
    let policy = &state.config.security.password_policy;
    check_policy(policy, &payload.new_password)?;

    let hash = PasswordHash::new_bcrypt(&payload.new_password, policy.bcrypt_cost)?;
    state.service.set_user_password(me.id, hash).await?;

    audit_log!(state.events, "user.password_changed", Some(me.id), Some(me.id));
    Ok(ok(serde_json::json!({ "message": "Password updated" })))
}
