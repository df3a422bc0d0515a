// src/models/password.rs

use serde::{Deserialize, Serialize};
use std::fmt;
use chrono::{Duration, Utc};
use rand::{rngs::OsRng, RngCore};
use sha2::{Digest, Sha256};
use thiserror::Error;
use uuid::Uuid;

use crate::config::PasswordPolicy;

/// bcrypt hash, the salt is embedded in the string
#[derive(Serialize, Deserialize, Debug, Clone)]
pub struct PasswordHash {
    hash: String,
}

#[derive(Debug, Error)]
pub enum PasswordError {
    #[error("Failed to hash password")]
    HashFailed,
    #[error("Failed to verify password")]
    VerificationFailed,
    #[error("{0}")]
    Weak(String),
}

impl PasswordHash {
    pub fn new_bcrypt(password: &str, cost: u32) -> Result<Self, PasswordError> {
        let hash = bcrypt::hash(password, cost).map_err(|_| PasswordError::HashFailed)?;
        Ok(Self { hash })
    }

    /// Wrap an existing bcrypt string
    pub fn from_hash(hash: &str) -> Self {
        Self { hash: hash.to_string() }
    }

    pub fn verify(&self, password: &str) -> Result<bool, PasswordError> {
        bcrypt::verify(password, &self.hash).map_err(|_| PasswordError::VerificationFailed)
    }
}

impl fmt::Display for PasswordHash {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "{}", self.hash)
    }
}

/// Check a candidate password against the configured policy
pub fn check_policy(policy: &PasswordPolicy, password: &str) -> Result<(), PasswordError> {
    if password.chars().count() < policy.min_length as usize {
        return Err(PasswordError::Weak(format!(
            "Password must be at least {} characters",
            policy.min_length
        )));
    }
    if policy.require_uppercase && !password.chars().any(|c| c.is_uppercase()) {
        return Err(PasswordError::Weak("Password must contain an uppercase letter".into()));
    }
    if policy.require_lowercase && !password.chars().any(|c| c.is_lowercase()) {
        return Err(PasswordError::Weak("Password must contain a lowercase letter".into()));
    }
    if policy.require_digits && !password.chars().any(|c| c.is_ascii_digit()) {
        return Err(PasswordError::Weak("Password must contain a digit".into()));
    }
    if policy.require_special_chars && password.chars().all(|c| c.is_alphanumeric()) {
        return Err(PasswordError::Weak("Password must contain a special character".into()));
    }
    Ok(())
}

/// Stored form of a password reset token. Only the SHA-256 of the raw token
/// is kept; the raw value goes out by mail once.
#[derive(Serialize, Deserialize, Debug, Clone)]
pub struct PasswordResetToken {
    pub token_hash: String,
    pub user_id: Uuid,
    pub expires_at: chrono::DateTime<Utc>,
}

impl PasswordResetToken {
    /// Returns the raw token together with its stored record
    pub fn issue(user_id: Uuid, ttl_minutes: i64) -> (String, Self) {
        let mut bytes = [0u8; 32];
        OsRng.fill_bytes(&mut bytes);
        let raw = hex::encode(bytes);
        let record = Self {
            token_hash: hash_token(&raw),
            user_id,
            expires_at: Utc::now() + Duration::minutes(ttl_minutes),
        };
        (raw, record)
    }

    pub fn is_expired(&self) -> bool {
        Utc::now() >= self.expires_at
    }
}

pub fn hash_token(raw: &str) -> String {
    hex::encode(Sha256::digest(raw.as_bytes()))
}
