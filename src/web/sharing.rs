// src/web/sharing.rs

use serde::{Deserialize, Serialize};
use uuid::Uuid;
use validator::Validate;

use crate::models::{Sharing, User, Visibility};
use crate::permissions::ResourceAccess;
use crate::web::response::ApiError;
use crate::web::AppState;

#[derive(Deserialize, Validate)]
#[serde(rename_all = "camelCase")]
pub struct ShareRequest {
    pub visibility: Visibility,
    pub team_id: Option<Uuid>,
}

#[derive(Serialize)]
#[serde(rename_all = "camelCase")]
pub struct SharingView {
    pub visibility: Visibility,
    pub team_id: Option<Uuid>,
    pub organization_id: Option<Uuid>,
}

impl From<Sharing> for SharingView {
    fn from(sharing: Sharing) -> Self {
        Self {
            visibility: sharing.visibility(),
            team_id: sharing.team_id(),
            organization_id: sharing.organization_id(),
        }
    }
}

/// Memberships of the requesting user, loaded once per request
pub struct Reader {
    pub user_id: Uuid,
    pub team_ids: Vec<Uuid>,
    pub organization_id: Option<Uuid>,
}

impl Reader {
    pub async fn load(state: &AppState, user: &User) -> Result<Self, ApiError> {
        Ok(Self {
            user_id: user.id,
            team_ids: state.service.team_ids_for_user(user.id).await?,
            organization_id: user.organization_id,
        })
    }

    pub fn access(&self, owner_id: Uuid, sharing: &Sharing) -> Option<ResourceAccess> {
        if owner_id == self.user_id {
            Some(ResourceAccess::Owner)
        } else if sharing.is_visible_to(&self.team_ids, self.organization_id) {
            Some(ResourceAccess::Reader)
        } else {
            None
        }
    }
}

/// Turn a share request from `owner` into a concrete sharing scope
pub async fn resolve_sharing(
    state: &AppState,
    owner: &User,
    request: &ShareRequest,
) -> Result<Sharing, ApiError> {
    match request.visibility {
        Visibility::Private => Ok(Sharing::private()),
        Visibility::Team => {
            let team_id = request
                .team_id
                .or(owner.team_id)
                .ok_or_else(|| ApiError::bad_request("You are not a member of any team"))?;
            let teams = state.service.team_ids_for_user(owner.id).await?;
            if !teams.contains(&team_id) {
                return Err(ApiError::bad_request("You can only share with a team you belong to"));
            }
            Ok(Sharing::team(team_id))
        }
        Visibility::Organization => owner
            .organization_id
            .map(Sharing::organization)
            .ok_or_else(|| ApiError::bad_request("You are not a member of an organization")),
    }
}
