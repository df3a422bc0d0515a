// src/web/login.rs

use axum::{
    extract::{Json, State},
    http::StatusCode,
};
use serde::{Deserialize, Serialize};
use validator::Validate;

use crate::audit_log;
use crate::mailer::{password_reset_message, welcome_message};
use crate::middleware::AuthUser;
use crate::models::{
    check_policy, hash_token, PasswordHash, PasswordResetToken, User, UserRole,
};
use crate::web::response::{
    created, non_blank, ok, ApiError, ApiResponse, ApiResult, ValidJson,
};
use crate::web::users::UserResponse;
use crate::web::AppState;
use crate::workspace_service::WorkspaceError;

const RESET_REQUESTED: &str = "If the address is registered, a reset link is on its way";

#[derive(Deserialize, Validate)]
pub struct RegisterRequest {
    #[validate(email(message = "Invalid email address"))]
    pub email: String,
    #[validate(
        length(min = 1, max = 100, message = "Name must be 1-100 characters"),
        custom(function = "non_blank")
    )]
    pub name: String,
    pub password: String,
}

#[derive(Deserialize, Validate)]
pub struct LoginRequest {
    #[validate(length(min = 1, message = "Email is required"))]
    pub email: String,
    #[validate(length(min = 1, message = "Password is required"))]
    pub password: String,
}

#[derive(Deserialize, Validate)]
pub struct ForgotPasswordRequest {
    #[validate(email(message = "Invalid email address"))]
    pub email: String,
}

#[derive(Deserialize, Validate)]
pub struct ResetPasswordRequest {
    #[validate(length(min = 1, message = "Reset token is required"))]
    pub token: String,
    pub password: String,
}

#[derive(Serialize)]
#[serde(rename_all = "camelCase")]
pub struct LoginResponse {
    pub token: String,
    pub expires_in: u64,
    pub user: UserResponse,
}

fn session(state: &AppState, user: User) -> Result<LoginResponse, ApiError> {
    let token = state.tokens.generate_token(&user.id.to_string())?;
    Ok(LoginResponse {
        token,
        expires_in: state.tokens.ttl_secs(),
        user: user.into(),
    })
}

pub async fn register_handler(
    State(state): State<AppState>,
    ValidJson(payload): ValidJson<RegisterRequest>,
) -> Result<(StatusCode, Json<ApiResponse<LoginResponse>>), ApiError> {
    let policy = &state.config.security.password_policy;
    check_policy(policy, &payload.password)?;

    let hash = PasswordHash::new_bcrypt(&payload.password, policy.bcrypt_cost)?;
    let user = User::new(&payload.email, payload.name.trim(), hash, UserRole::Member);
    state.service.create_user(&user).await?;

    if let Err(e) = state.mailer.send(welcome_message(&state.config.mail, &user)).await {
        tracing::warn!(user_id = %user.id, error = %e, "welcome mail not sent");
    }
    audit_log!(state.events, "user.registered", Some(user.id), Some(user.id));
    tracing::info!(user_id = %user.id, "user registered");

    Ok(created(session(&state, user)?))
}

pub async fn login_handler(
    State(state): State<AppState>,
    ValidJson(payload): ValidJson<LoginRequest>,
) -> ApiResult<LoginResponse> {
    let user = state
        .service
        .find_user_by_email(&payload.email)
        .await?
        .ok_or_else(|| ApiError::Unauthorized("Invalid email or password".into()))?;

    if !user.password_hash.verify(&payload.password)? {
        tracing::info!(user_id = %user.id, "failed login");
        return Err(ApiError::Unauthorized("Invalid email or password".into()));
    }

    // the status is read again after the slow hash check
    let user = state.service.record_login(user.id).await?;
    if !user.is_active {
        return Err(ApiError::forbidden("Account is deactivated"));
    }

    audit_log!(state.events, "user.login", Some(user.id), None);
    Ok(ok(session(&state, user)?))
}

pub async fn forgot_password_handler(
    State(state): State<AppState>,
    ValidJson(payload): ValidJson<ForgotPasswordRequest>,
) -> ApiResult<serde_json::Value> {
    let reply = serde_json::json!({ "message": RESET_REQUESTED });

    let user = match state.service.find_user_by_email(&payload.email).await? {
        Some(user) if user.is_active => user,
        _ => return Ok(ok(reply)),
    };

    let ttl = state.config.security.reset_token_ttl_minutes;
    let (raw, record) = PasswordResetToken::issue(user.id, ttl);
    state.service.store_reset_token(&record).await?;

    let message = password_reset_message(&state.config.mail, &user, &raw, ttl);
    if let Err(e) = state.mailer.send(message).await {
        tracing::warn!(user_id = %user.id, error = %e, "password reset mail not sent");
    }
    audit_log!(state.events, "user.password_reset_requested", None, Some(user.id));

    Ok(ok(reply))
}

pub async fn reset_password_handler(
    State(state): State<AppState>,
    ValidJson(payload): ValidJson<ResetPasswordRequest>,
) -> ApiResult<serde_json::Value> {
    let invalid = || ApiError::bad_request("Invalid or expired reset token");

    let policy = &state.config.security.password_policy;
    check_policy(policy, &payload.password)?;

    let record = state
        .service
        .take_reset_token(&hash_token(payload.token.trim()))
        .await?
        .ok_or_else(invalid)?;
    if record.is_expired() {
        return Err(invalid());
    }

    let hash = PasswordHash::new_bcrypt(&payload.password, policy.bcrypt_cost)?;
    let user = match state.service.set_user_password(record.user_id, hash).await {
        Err(WorkspaceError::NotFound(_)) => return Err(invalid()),
        other => other?,
    };

    audit_log!(state.events, "user.password_reset", None, Some(user.id));
    Ok(ok(serde_json::json!({ "message": "Password has been reset" })))
}

pub async fn me_handler(AuthUser(me): AuthUser) -> ApiResult<UserResponse> {
    Ok(ok(me.into()))
}
