// src/web/organizations.rs

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
use crate::models::{OrgRole, Organization, User};
use crate::permissions::{authorize, OrgAction, OrgScope};
use crate::web::response::{
    created, non_blank, ok, ApiError, ApiResponse, ApiResult, ValidJson,
};
use crate::web::teams::TeamResponse;
use crate::web::users::{require_user, MemberResponse};
use crate::web::AppState;
use crate::workspace_service::OrganizationChanges;

#[derive(Serialize)]
#[serde(rename_all = "camelCase")]
pub struct OrganizationResponse {
    pub id: Uuid,
    pub name: String,
    pub description: Option<String>,
    pub owner_id: Uuid,
    pub max_teams: u32,
    pub max_members: u32,
    pub created_at: chrono::DateTime<Utc>,
    pub updated_at: chrono::DateTime<Utc>,
}

impl From<Organization> for OrganizationResponse {
    fn from(o: Organization) -> Self {
        Self {
            id: o.id,
            name: o.name,
            description: o.description,
            owner_id: o.owner_id,
            max_teams: o.max_teams,
            max_members: o.max_members,
            created_at: o.created_at,
            updated_at: o.updated_at,
        }
    }
}

#[derive(Deserialize, Validate)]
#[serde(rename_all = "camelCase")]
pub struct CreateOrganizationRequest {
    #[validate(
        length(min = 1, max = 100, message = "Name must be 1-100 characters"),
        custom(function = "non_blank")
    )]
    pub name: String,
    #[validate(length(max = 500))]
    pub description: Option<String>,
    #[validate(range(min = 1, max = 100, message = "maxTeams must be between 1 and 100"))]
    pub max_teams: Option<u32>,
    #[validate(range(min = 1, max = 1000, message = "maxMembers must be between 1 and 1000"))]
    pub max_members: Option<u32>,
}

#[derive(Deserialize, Validate)]
#[serde(rename_all = "camelCase")]
pub struct UpdateOrganizationRequest {
    #[validate(
        length(min = 1, max = 100, message = "Name must be 1-100 characters"),
        custom(function = "non_blank")
    )]
    pub name: Option<String>,
    #[validate(length(max = 500))]
    pub description: Option<String>,
    #[validate(range(min = 1, max = 100, message = "maxTeams must be between 1 and 100"))]
    pub max_teams: Option<u32>,
    #[validate(range(min = 1, max = 1000, message = "maxMembers must be between 1 and 1000"))]
    pub max_members: Option<u32>,
}

#[derive(Deserialize, Validate)]
pub struct AddOrgMemberRequest {
    #[validate(email(message = "Invalid email address"))]
    pub email: String,
    #[serde(default = "default_org_role")]
    pub role: OrgRole,
}

fn default_org_role() -> OrgRole {
    OrgRole::Member
}

#[derive(Deserialize, Validate)]
pub struct OrgRoleRequest {
    pub role: OrgRole,
}

#[derive(Deserialize, Validate)]
#[serde(rename_all = "camelCase")]
pub struct TransferRequest {
    pub user_id: Uuid,
}

async fn require_org(state: &AppState, id: Uuid) -> Result<Organization, ApiError> {
    state
        .service
        .get_organization(id)
        .await?
        .ok_or_else(|| ApiError::not_found("Organization not found"))
}

/// Requester's role in the organization, read fresh from the store
async fn org_role(
    state: &AppState,
    org_id: Uuid,
    user_id: Uuid,
) -> Result<Option<OrgRole>, ApiError> {
    Ok(state.service.get_org_member(org_id, user_id).await?.map(|m| m.role))
}

async fn member_role(state: &AppState, org_id: Uuid, user_id: Uuid) -> Result<OrgRole, ApiError> {
    org_role(state, org_id, user_id)
        .await?
        .ok_or_else(|| ApiError::not_found("Member not found"))
}

async fn member_view(
    state: &AppState,
    org_id: Uuid,
    user: &User,
) -> Result<MemberResponse<OrgRole>, ApiError> {
    let member = state
        .service
        .get_org_member(org_id, user.id)
        .await?
        .ok_or_else(|| ApiError::not_found("Member not found"))?;
    Ok(MemberResponse::new(user, member.role, member.joined_at))
}

pub async fn create_organization(
    State(state): State<AppState>,
    AuthUser(me): AuthUser,
    ValidJson(payload): ValidJson<CreateOrganizationRequest>,
) -> Result<(StatusCode, Json<ApiResponse<OrganizationResponse>>), ApiError> {
    if me.organization_id.is_some() {
        return Err(ApiError::bad_request("You already belong to an organization"));
    }

    let mut org = Organization::new(&payload.name, payload.description, me.id);
    if let Some(max_teams) = payload.max_teams {
        org.max_teams = max_teams;
    }
    if let Some(max_members) = payload.max_members {
        org.max_members = max_members;
    }
    state.service.create_organization(&org).await?;

    audit_log!(state.events, "organization.created", Some(me.id), Some(org.id));
    Ok(created(org.into()))
}

pub async fn get_organization(
    State(state): State<AppState>,
    AuthUser(me): AuthUser,
    Path(id): Path<Uuid>,
) -> ApiResult<OrganizationResponse> {
    let org = require_org(&state, id).await?;
    authorize::<OrgScope>(org_role(&state, id, me.id).await?, &OrgAction::View)?;
    Ok(ok(org.into()))
}

pub async fn update_organization(
    State(state): State<AppState>,
    AuthUser(me): AuthUser,
    Path(id): Path<Uuid>,
    ValidJson(payload): ValidJson<UpdateOrganizationRequest>,
) -> ApiResult<OrganizationResponse> {
    require_org(&state, id).await?;
    authorize::<OrgScope>(org_role(&state, id, me.id).await?, &OrgAction::UpdateSettings)?;

    let changes = OrganizationChanges {
        name: payload.name,
        description: payload.description,
        max_teams: payload.max_teams,
        max_members: payload.max_members,
    };
    let org = state.service.update_organization(id, changes).await?;

    audit_log!(state.events, "organization.updated", Some(me.id), Some(id));
    Ok(ok(org.into()))
}

pub async fn delete_organization(
    State(state): State<AppState>,
    AuthUser(me): AuthUser,
    Path(id): Path<Uuid>,
) -> ApiResult<serde_json::Value> {
    let org = require_org(&state, id).await?;
    let other_members = state
        .service
        .list_org_members(id)
        .await?
        .iter()
        .filter(|m| m.user_id != org.owner_id)
        .count();
    let teams = state.service.list_org_teams(id).await?.len();

    authorize::<OrgScope>(
        org_role(&state, id, me.id).await?,
        &OrgAction::Delete { other_members, teams },
    )?;
    state.service.delete_organization(id).await?;

    audit_log!(state.events, "organization.deleted", Some(me.id), Some(id));
    Ok(ok(serde_json::json!({ "id": id })))
}

pub async fn list_members(
    State(state): State<AppState>,
    AuthUser(me): AuthUser,
    Path(id): Path<Uuid>,
) -> ApiResult<Vec<MemberResponse<OrgRole>>> {
    require_org(&state, id).await?;
    authorize::<OrgScope>(org_role(&state, id, me.id).await?, &OrgAction::View)?;

    let mut members = Vec::new();
    for member in state.service.list_org_members(id).await? {
        if let Some(user) = state.service.get_user(member.user_id).await? {
            members.push(MemberResponse::new(&user, member.role, member.joined_at));
        }
    }
    members.sort_by(|a, b| b.role.rank().cmp(&a.role.rank()).then(a.joined_at.cmp(&b.joined_at)));
    Ok(ok(members))
}

pub async fn add_member(
    State(state): State<AppState>,
    AuthUser(me): AuthUser,
    Path(id): Path<Uuid>,
    ValidJson(payload): ValidJson<AddOrgMemberRequest>,
) -> Result<(StatusCode, Json<ApiResponse<MemberResponse<OrgRole>>>), ApiError> {
    require_org(&state, id).await?;
    authorize::<OrgScope>(
        org_role(&state, id, me.id).await?,
        &OrgAction::AddMember { grant: payload.role },
    )?;

    let user = state
        .service
        .find_user_by_email(&payload.email)
        .await?
        .ok_or_else(|| ApiError::not_found("User not found"))?;
    if !user.is_active {
        return Err(ApiError::bad_request("User account is deactivated"));
    }

    let member = state.service.add_org_member(id, user.id, payload.role).await?;

    audit_log!(state.events, "organization.member_added", Some(me.id), Some(user.id),
        "organization" => id, "role" => member.role);
    Ok(created(MemberResponse::new(&user, member.role, member.joined_at)))
}

pub async fn change_member_role(
    State(state): State<AppState>,
    AuthUser(me): AuthUser,
    Path((id, user_id)): Path<(Uuid, Uuid)>,
    ValidJson(payload): ValidJson<OrgRoleRequest>,
) -> ApiResult<MemberResponse<OrgRole>> {
    require_org(&state, id).await?;
    let my_role = org_role(&state, id, me.id).await?;
    authorize::<OrgScope>(my_role, &OrgAction::View)?;

    let target = member_role(&state, id, user_id).await?;
    authorize::<OrgScope>(
        my_role,
        &OrgAction::ChangeMemberRole {
            target,
            new_role: payload.role,
            is_self: user_id == me.id,
        },
    )?;

    state.service.set_org_member_role(id, user_id, payload.role).await?;

    audit_log!(state.events, "organization.member_role_changed", Some(me.id), Some(user_id),
        "organization" => id, "from" => target, "to" => payload.role);
    let user = require_user(&state, user_id).await?;
    Ok(ok(member_view(&state, id, &user).await?))
}

pub async fn remove_member(
    State(state): State<AppState>,
    AuthUser(me): AuthUser,
    Path((id, user_id)): Path<(Uuid, Uuid)>,
) -> ApiResult<serde_json::Value> {
    require_org(&state, id).await?;
    let my_role = org_role(&state, id, me.id).await?;
    authorize::<OrgScope>(my_role, &OrgAction::View)?;

    let target = member_role(&state, id, user_id).await?;
    authorize::<OrgScope>(
        my_role,
        &OrgAction::RemoveMember {
            target,
            is_self: user_id == me.id,
        },
    )?;

    state.service.remove_org_member(id, user_id).await?;

    audit_log!(state.events, "organization.member_removed", Some(me.id), Some(user_id),
        "organization" => id);
    Ok(ok(serde_json::json!({ "userId": user_id })))
}

pub async fn leave(
    State(state): State<AppState>,
    AuthUser(me): AuthUser,
    Path(id): Path<Uuid>,
) -> ApiResult<serde_json::Value> {
    require_org(&state, id).await?;
    authorize::<OrgScope>(org_role(&state, id, me.id).await?, &OrgAction::Leave)?;

    state.service.remove_org_member(id, me.id).await?;

    audit_log!(state.events, "organization.member_left", Some(me.id), Some(me.id),
        "organization" => id);
    Ok(ok(serde_json::json!({ "organizationId": id })))
}

pub async fn transfer_ownership(
    State(state): State<AppState>,
    AuthUser(me): AuthUser,
    Path(id): Path<Uuid>,
    ValidJson(payload): ValidJson<TransferRequest>,
) -> ApiResult<OrganizationResponse> {
    require_org(&state, id).await?;
    authorize::<OrgScope>(
        org_role(&state, id, me.id).await?,
        &OrgAction::TransferOwnership {
            is_self: payload.user_id == me.id,
        },
    )?;

    let org = state.service.transfer_org_ownership(id, payload.user_id).await?;

    audit_log!(state.events, "organization.ownership_transferred", Some(me.id),
        Some(payload.user_id), "organization" => id);
    Ok(ok(org.into()))
}

pub async fn list_teams(
    State(state): State<AppState>,
    AuthUser(me): AuthUser,
    Path(id): Path<Uuid>,
) -> ApiResult<Vec<TeamResponse>> {
    require_org(&state, id).await?;
    authorize::<OrgScope>(org_role(&state, id, me.id).await?, &OrgAction::View)?;

    let teams = state.service.list_org_teams(id).await?;
    Ok(ok(teams.into_iter().map(TeamResponse::from).collect()))
}
