// src/models/sharing.rs

use serde::{Deserialize, Serialize};
use uuid::Uuid;

#[derive(Serialize, Deserialize, Debug, Clone, Copy, PartialEq, Eq, Hash)]
#[serde(rename_all = "SCREAMING_SNAKE_CASE")]
pub enum Visibility {
    Private,
    Team,
    Organization,
}

/// Sharing state of a contact or document.
///
/// A resource is shared to at most one scope: the constructors are the only
/// way to build one, so `team_id` is set exactly when the visibility is TEAM
/// and `organization_id` exactly when it is ORGANIZATION.
#[derive(Serialize, Deserialize, Debug, Clone, Copy, PartialEq, Eq)]
pub struct Sharing {
    visibility: Visibility,
    team_id: Option<Uuid>,
    organization_id: Option<Uuid>,
}

impl Sharing {
    pub fn private() -> Self {
        Self {
            visibility: Visibility::Private,
            team_id: None,
            organization_id: None,
        }
    }

    pub fn team(team_id: Uuid) -> Self {
        Self {
            visibility: Visibility::Team,
            team_id: Some(team_id),
            organization_id: None,
        }
    }

    pub fn organization(organization_id: Uuid) -> Self {
        Self {
            visibility: Visibility::Organization,
            team_id: None,
            organization_id: Some(organization_id),
        }
    }

    pub fn visibility(&self) -> Visibility {
        self.visibility
    }

    pub fn team_id(&self) -> Option<Uuid> {
        self.team_id
    }

    pub fn organization_id(&self) -> Option<Uuid> {
        self.organization_id
    }

    /// Whether a reader with the given memberships can see the resource.
    /// The owner check is done by the caller.
    pub fn is_visible_to(&self, reader_teams: &[Uuid], reader_org: Option<Uuid>) -> bool {
        match self.visibility {
            Visibility::Private => false,
            Visibility::Team => self.team_id.map_or(false, |t| reader_teams.contains(&t)),
            Visibility::Organization => {
                self.organization_id.is_some() && self.organization_id == reader_org
            }
        }
    }
}

impl Default for Sharing {
    fn default() -> Self {
        Self::private()
    }
}
