// src/web/teams.rs

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
use crate::models::{Team, TeamRole};
use crate::permissions::{
    authorize, GlobalAction, GlobalScope, OrgAction, OrgScope, TeamAction, TeamScope,
};
use crate::web::response::{
    created, non_blank, ok, ApiError, ApiResponse, ApiResult, ValidJson,
};
use crate::web::users::{require_user, MemberResponse};
use crate::web::AppState;
use crate::workspace_service::TeamChanges;

#[derive(Serialize)]
#[serde(rename_all = "camelCase")]
pub struct TeamResponse {
    pub id: Uuid,
    pub name: String,
    pub description: Option<String>,
    pub owner_id: Uuid,
    pub organization_id: Option<Uuid>,
    pub created_at: chrono::DateTime<Utc>,
    pub updated_at: chrono::DateTime<Utc>,
}

impl From<Team> for TeamResponse {
    fn from(t: Team) -> Self {
        Self {
            id: t.id,
            name: t.name,
            description: t.description,
            owner_id: t.owner_id,
            organization_id: t.organization_id,
            created_at: t.created_at,
            updated_at: t.updated_at,
        }
    }
}

#[derive(Deserialize, Validate)]
#[serde(rename_all = "camelCase")]
pub struct CreateTeamRequest {
    #[validate(
        length(min = 1, max = 100, message = "Name must be 1-100 characters"),
        custom(function = "non_blank")
    )]
    pub name: String,
    #[validate(length(max = 500))]
    pub description: Option<String>,
    pub organization_id: Option<Uuid>,
}

#[derive(Deserialize, Validate)]
pub struct UpdateTeamRequest {
    #[validate(
        length(min = 1, max = 100, message = "Name must be 1-100 characters"),
        custom(function = "non_blank")
    )]
    pub name: Option<String>,
    #[validate(length(max = 500))]
    pub description: Option<String>,
}

#[derive(Deserialize, Validate)]
pub struct AddTeamMemberRequest {
    #[validate(email(message = "Invalid email address"))]
    pub email: String,
    #[serde(default = "default_team_role")]
    pub role: TeamRole,
}

fn default_team_role() -> TeamRole {
    TeamRole::Member
}

#[derive(Deserialize, Validate)]
pub struct TeamRoleRequest {
    pub role: TeamRole,
}

#[derive(Deserialize, Validate)]
#[serde(rename_all = "camelCase")]
pub struct TransferTeamRequest {
    pub user_id: Uuid,
}

async fn require_team(state: &AppState, id: Uuid) -> Result<Team, ApiError> {
    state
        .service
        .get_team(id)
        .await?
        .ok_or_else(|| ApiError::not_found("Team not found"))
}

async fn team_role(
    state: &AppState,
    team_id: Uuid,
    user_id: Uuid,
) -> Result<Option<TeamRole>, ApiError> {
    Ok(state.service.get_team_member(team_id, user_id).await?.map(|m| m.role))
}

async fn member_role(state: &AppState, team_id: Uuid, user_id: Uuid) -> Result<TeamRole, ApiError> {
    team_role(state, team_id, user_id)
        .await?
        .ok_or_else(|| ApiError::not_found("Member not found"))
}

pub async fn create_team(
    State(state): State<AppState>,
    AuthUser(me): AuthUser,
    ValidJson(payload): ValidJson<CreateTeamRequest>,
) -> Result<(StatusCode, Json<ApiResponse<TeamResponse>>), ApiError> {
    if let Some(org_id) = payload.organization_id {
        state
            .service
            .get_organization(org_id)
            .await?
            .ok_or_else(|| ApiError::not_found("Organization not found"))?;
        let role = state.service.get_org_member(org_id, me.id).await?.map(|m| m.role);
        authorize::<OrgScope>(role, &OrgAction::CreateTeam)?;
    }

    let team = Team::new(&payload.name, payload.description, me.id, payload.organization_id);
    state.service.create_team(&team).await?;

    audit_log!(state.events, "team.created", Some(me.id), Some(team.id));
    Ok(created(team.into()))
}

pub async fn list_teams(
    State(state): State<AppState>,
    AuthUser(me): AuthUser,
) -> ApiResult<Vec<TeamResponse>> {
    let sees_all = authorize::<GlobalScope>(Some(me.role), &GlobalAction::ViewAllTeams).is_ok();
    let mut teams = if sees_all {
        state.service.list_teams().await?
    } else {
        state.service.list_user_teams(me.id).await?
    };
    teams.sort_by(|a, b| a.name.to_lowercase().cmp(&b.name.to_lowercase()));
    Ok(ok(teams.into_iter().map(TeamResponse::from).collect()))
}

pub async fn get_team(
    State(state): State<AppState>,
    AuthUser(me): AuthUser,
    Path(id): Path<Uuid>,
) -> ApiResult<TeamResponse> {
    let team = require_team(&state, id).await?;
    authorize::<TeamScope>(team_role(&state, id, me.id).await?, &TeamAction::View)?;
    Ok(ok(team.into()))
}

pub async fn update_team(
    State(state): State<AppState>,
    AuthUser(me): AuthUser,
    Path(id): Path<Uuid>,
    ValidJson(payload): ValidJson<UpdateTeamRequest>,
) -> ApiResult<TeamResponse> {
    require_team(&state, id).await?;
    authorize::<TeamScope>(team_role(&state, id, me.id).await?, &TeamAction::Update)?;

    let changes = TeamChanges {
        name: payload.name,
        description: payload.description,
    };
    let team = state.service.update_team(id, changes).await?;

    audit_log!(state.events, "team.updated", Some(me.id), Some(id));
    Ok(ok(team.into()))
}

pub async fn delete_team(
    State(state): State<AppState>,
    AuthUser(me): AuthUser,
    Path(id): Path<Uuid>,
) -> ApiResult<serde_json::Value> {
    require_team(&state, id).await?;
    authorize::<TeamScope>(team_role(&state, id, me.id).await?, &TeamAction::Delete)?;

    state.service.delete_team(id).await?;

    audit_log!(state.events, "team.deleted", Some(me.id), Some(id));
    Ok(ok(serde_json::json!({ "id": id })))
}

pub async fn list_members(
    State(state): State<AppState>,
    AuthUser(me): AuthUser,
    Path(id): Path<Uuid>,
) -> ApiResult<Vec<MemberResponse<TeamRole>>> {
    require_team(&state, id).await?;
    authorize::<TeamScope>(team_role(&state, id, me.id).await?, &TeamAction::View)?;

    let mut members = Vec::new();
    for member in state.service.list_team_members(id).await? {
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
    ValidJson(payload): ValidJson<AddTeamMemberRequest>,
) -> Result<(StatusCode, Json<ApiResponse<MemberResponse<TeamRole>>>), ApiError> {
    require_team(&state, id).await?;
    authorize::<TeamScope>(
        team_role(&state, id, me.id).await?,
        &TeamAction::AddMember { grant: payload.role },
    )?;

    let user = state
        .service
        .find_user_by_email(&payload.email)
        .await?
        .ok_or_else(|| ApiError::not_found("User not found"))?;
    if !user.is_active {
        return Err(ApiError::bad_request("User account is deactivated"));
    }

    let member = state.service.add_team_member(id, user.id, payload.role).await?;

    audit_log!(state.events, "team.member_added", Some(me.id), Some(user.id),
        "team" => id, "role" => member.role);
    Ok(created(MemberResponse::new(&user, member.role, member.joined_at)))
}

pub async fn change_member_role(
    State(state): State<AppState>,
    AuthUser(me): AuthUser,
    Path((id, user_id)): Path<(Uuid, Uuid)>,
    ValidJson(payload): ValidJson<TeamRoleRequest>,
) -> ApiResult<MemberResponse<TeamRole>> {
    require_team(&state, id).await?;
    let my_role = team_role(&state, id, me.id).await?;
    authorize::<TeamScope>(my_role, &TeamAction::View)?;

    let target = member_role(&state, id, user_id).await?;
    authorize::<TeamScope>(
        my_role,
        &TeamAction::ChangeMemberRole {
            target,
            new_role: payload.role,
            is_self: user_id == me.id,
        },
    )?;

    let member = state.service.set_team_member_role(id, user_id, payload.role).await?;

    audit_log!(state.events, "team.member_role_changed", Some(me.id), Some(user_id),
        "team" => id, "from" => target, "to" => member.role);
    let user = require_user(&state, user_id).await?;
    Ok(ok(MemberResponse::new(&user, member.role, member.joined_at)))
}

pub async fn remove_member(
    State(state): State<AppState>,
    AuthUser(me): AuthUser,
    Path((id, user_id)): Path<(Uuid, Uuid)>,
) -> ApiResult<serde_json::Value> {
    require_team(&state, id).await?;
    let my_role = team_role(&state, id, me.id).await?;
    authorize::<TeamScope>(my_role, &TeamAction::View)?;

    let target = member_role(&state, id, user_id).await?;
    authorize::<TeamScope>(
        my_role,
        &TeamAction::RemoveMember {
            target,
            is_self: user_id == me.id,
        },
    )?;

    state.service.remove_team_member(id, user_id).await?;

    audit_log!(state.events, "team.member_removed", Some(me.id), Some(user_id), "team" => id);
    Ok(ok(serde_json::json!({ "userId": user_id })))
}

pub async fn leave(
    State(state): State<AppState>,
    AuthUser(me): AuthUser,
    Path(id): Path<Uuid>,
) -> ApiResult<serde_json::Value> {
    require_team(&state, id).await?;
    authorize::<TeamScope>(team_role(&state, id, me.id).await?, &TeamAction::Leave)?;

    state.service.remove_team_member(id, me.id).await?;

    audit_log!(state.events, "team.member_left", Some(me.id), Some(me.id), "team" => id);
    Ok(ok(serde_json::json!({ "teamId": id })))
}

pub async fn transfer_ownership(
    State(state): State<AppState>,
    AuthUser(me): AuthUser,
    Path(id): Path<Uuid>,
    ValidJson(payload): ValidJson<TransferTeamRequest>,
) -> ApiResult<TeamResponse> {
    require_team(&state, id).await?;
    authorize::<TeamScope>(
        team_role(&state, id, me.id).await?,
        &TeamAction::TransferOwnership {
            is_self: payload.user_id == me.id,
        },
    )?;

    let team = state.service.transfer_team_ownership(id, payload.user_id).await?;

    audit_log!(state.events, "team.ownership_transferred", Some(me.id), Some(payload.user_id),
        "team" => id);
    Ok(ok(team.into()))
}
