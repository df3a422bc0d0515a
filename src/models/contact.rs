// src/models/contact.rs

use serde::{Deserialize, Serialize};
use uuid::Uuid;
use chrono::Utc;

use crate::models::sharing::Sharing;

#[derive(Serialize, Deserialize, Debug, Clone)]
pub struct Contact {
    pub id: Uuid,
    pub owner_id: Uuid,
    pub first_name: String,
    pub last_name: String,
    pub email: Option<String>,
    pub phone: Option<String>,
    pub company: Option<String>,
    pub notes: Option<String>,
    pub sharing: Sharing,
    pub created_at: chrono::DateTime<Utc>,
    pub updated_at: chrono::DateTime<Utc>,
}

impl Contact {
    pub fn new(owner_id: Uuid, first_name: &str, last_name: &str) -> Self {
        let now = Utc::now();
        Self {
            id: Uuid::new_v4(),
            owner_id,
            first_name: first_name.trim().to_string(),
            last_name: last_name.trim().to_string(),
            email: None,
            phone: None,
            company: None,
            notes: None,
            sharing: Sharing::private(),
            created_at: now,
            updated_at: now,
        }
    }
}
