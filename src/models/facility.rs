// src/models/facility.rs

use serde::{Deserialize, Serialize};
use uuid::Uuid;
use chrono::Utc;

#[derive(Serialize, Deserialize, Debug, Clone)]
pub struct Facility {
    pub id: Uuid,
    pub name: String,
    pub address: String,
    pub city: Option<String>,
    pub state: Option<String>,
    pub postal_code: Option<String>,
    pub country: Option<String>,
    pub kind: Option<String>,
    pub phone: Option<String>,
    pub notes: Option<String>,
    pub created_by: Uuid,
    pub created_at: chrono::DateTime<Utc>,
    pub updated_at: chrono::DateTime<Utc>,
}

impl Facility {
    pub fn new(name: &str, address: &str, created_by: Uuid) -> Self {
        let now = Utc::now();
        Self {
            id: Uuid::new_v4(),
            name: name.trim().to_string(),
            address: address.trim().to_string(),
            city: None,
            state: None,
            postal_code: None,
            country: None,
            kind: None,
            phone: None,
            notes: None,
            created_by,
            created_at: now,
            updated_at: now,
        }
    }

    pub fn dedup_key(&self) -> String {
        dedup_key(&self.name, &self.address)
    }
}

/// Lowercased, whitespace-collapsed `name|address`
pub fn dedup_key(name: &str, address: &str) -> String {
    fn collapse(s: &str) -> String {
        s.split_whitespace().collect::<Vec<_>>().join(" ").to_lowercase()
    }
    format!("{}|{}", collapse(name), collapse(address))
}
