// src/models/organization.rs

use serde::{Deserialize, Serialize};
use uuid::Uuid;
use chrono::Utc;

use crate::models::role::OrgRole;

pub const DEFAULT_MAX_TEAMS: u32 = 5;
pub const DEFAULT_MAX_MEMBERS: u32 = 25;

#[derive(Serialize, Deserialize, Debug, Clone)]
pub struct Organization {
    pub id: Uuid,
    pub name: String,
    pub description: Option<String>,
    /// Always equals the user id of the single OWNER member
    pub owner_id: Uuid,
    pub max_teams: u32,
    pub max_members: u32,
    pub created_at: chrono::DateTime<Utc>,
    pub updated_at: chrono::DateTime<Utc>,
}

#[derive(Serialize, Deserialize, Debug, Clone)]
pub struct OrganizationMember {
    pub organization_id: Uuid,
    pub user_id: Uuid,
    pub role: OrgRole,
    pub joined_at: chrono::DateTime<Utc>,
}

impl Organization {
    pub fn new(name: &str, description: Option<String>, owner_id: Uuid) -> Self {
        let now = Utc::now();
        Self {
            id: Uuid::new_v4(),
            name: name.trim().to_string(),
            description,
            owner_id,
            max_teams: DEFAULT_MAX_TEAMS,
            max_members: DEFAULT_MAX_MEMBERS,
            created_at: now,
            updated_at: now,
        }
    }
}

impl OrganizationMember {
    pub fn new(organization_id: Uuid, user_id: Uuid, role: OrgRole) -> Self {
        Self {
            organization_id,
            user_id,
            role,
            joined_at: Utc::now(),
        }
    }
}
