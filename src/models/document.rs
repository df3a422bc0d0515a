// src/models/document.rs

use serde::{Deserialize, Serialize};
use uuid::Uuid;
use chrono::Utc;
use rand::{rngs::OsRng, RngCore};

use crate::models::sharing::Sharing;

/// File stored in the object store next to a document
#[derive(Serialize, Deserialize, Debug, Clone)]
pub struct Attachment {
    pub key: String,
    pub file_name: String,
    pub content_type: String,
    pub size: u64,
}

#[derive(Serialize, Deserialize, Debug, Clone)]
pub struct Document {
    pub id: Uuid,
    pub owner_id: Uuid,
    pub title: String,
    pub content: String,
    pub attachment: Option<Attachment>,
    /// Public link token, readable without a session
    pub share_token: Option<String>,
    pub sharing: Sharing,
    pub created_at: chrono::DateTime<Utc>,
    pub updated_at: chrono::DateTime<Utc>,
}

impl Document {
    pub fn new(owner_id: Uuid, title: &str, content: String) -> Self {
        let now = Utc::now();
        Self {
            id: Uuid::new_v4(),
            owner_id,
            title: title.trim().to_string(),
            content,
            attachment: None,
            share_token: None,
            sharing: Sharing::private(),
            created_at: now,
            updated_at: now,
        }
    }

    /// Object store key for this document's attachment
    pub fn object_key(&self, file_name: &str) -> String {
        let clean: String = file_name
            .chars()
            .map(|c| {
                if c.is_ascii_alphanumeric() || matches!(c, '.' | '-' | '_') {
                    c
                } else {
                    '_'
                }
            })
            .collect();
        let clean = if clean.chars().all(|c| c == '.') { "file".to_string() } else { clean };
        format!("documents/{}/{}", self.id, clean)
    }
}

/// Random token for a public document link
pub fn generate_share_token() -> String {
    let mut bytes = [0u8; 24];
    OsRng.fill_bytes(&mut bytes);
    hex::encode(bytes)
}
