// src/models/team.rs

use serde::{Deserialize, Serialize};
use uuid::Uuid;
use chrono::Utc;

use crate::models::role::TeamRole;

#[derive(Serialize, Deserialize, Debug, Clone)]
pub struct Team {
    pub id: Uuid,
    pub name: String,
    pub description: Option<String>,
    pub owner_id: Uuid,
    /// Teams may exist outside any organization
    pub organization_id: Option<Uuid>,
    pub created_at: chrono::DateTime<Utc>,
    pub updated_at: chrono::DateTime<Utc>,
}

#[derive(Serialize, Deserialize, Debug, Clone)]
pub struct TeamMember {
    pub team_id: Uuid,
    pub user_id: Uuid,
    pub role: TeamRole,
    pub joined_at: chrono::DateTime<Utc>,
}

impl Team {
    pub fn new(
        name: &str,
        description: Option<String>,
        owner_id: Uuid,
        organization_id: Option<Uuid>,
    ) -> Self {
        let now = Utc::now();
        Self {
            id: Uuid::new_v4(),
            name: name.trim().to_string(),
            description,
            owner_id,
            organization_id,
            created_at: now,
            updated_at: now,
        }
    }
}

impl TeamMember {
    pub fn new(team_id: Uuid, user_id: Uuid, role: TeamRole) -> Self {
        Self {
            team_id,
            user_id,
            role,
            joined_at: Utc::now(),
        }
    }
}
