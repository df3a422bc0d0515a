// src/models/user.rs

use serde::{Deserialize, Serialize};
use uuid::Uuid;
use chrono::Utc;

use crate::models::password::PasswordHash;
use crate::models::role::UserRole;

#[derive(Serialize, Deserialize, Debug, Clone)]
pub struct User {
    pub id: Uuid,
    pub email: String,
    pub name: String,
    pub password_hash: PasswordHash,
    pub role: UserRole,
    pub is_active: bool,
    /// Primary team, kept in sync with team memberships
    pub team_id: Option<Uuid>,
    pub organization_id: Option<Uuid>,
    pub created_at: chrono::DateTime<Utc>,
    pub updated_at: chrono::DateTime<Utc>,
    pub last_login: Option<chrono::DateTime<Utc>>,
}

impl User {
    pub fn new(email: &str, name: &str, password_hash: PasswordHash, role: UserRole) -> Self {
        let now = Utc::now();
        Self {
            id: Uuid::new_v4(),
            email: normalize_email(email),
            name: name.trim().to_string(),
            password_hash,
            role,
            is_active: true,
            team_id: None,
            organization_id: None,
            created_at: now,
            updated_at: now,
            last_login: None,
        }
    }

    pub fn touch(&mut self) {
        self.updated_at = Utc::now();
    }
}

/// Emails are compared case-insensitively everywhere
pub fn normalize_email(email: &str) -> String {
    email.trim().to_lowercase()
}
