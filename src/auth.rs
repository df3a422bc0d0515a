// src/auth.rs

use jsonwebtoken::{decode, encode, Algorithm, DecodingKey, EncodingKey, Header, Validation};
use serde::{Deserialize, Serialize};
use std::fs;
use thiserror::Error;

use rsa::pkcs8::{DecodePrivateKey, EncodePrivateKey};
use rsa::RsaPrivateKey;

use crate::config::JwtConfig;

#[derive(Debug, Error)]
pub enum AuthError {
    #[error("Failed to read key file: {0}")]
    KeyReadFailed(String),
    #[error("Invalid key format: {0}")]
    InvalidKeyFormat(String),
    #[error("Invalid JWT configuration: {0}")]
    Config(String),
    #[error("Token error: {0}")]
    Token(#[from] jsonwebtoken::errors::Error),
}

impl From<rsa::pkcs8::Error> for AuthError {
    fn from(e: rsa::pkcs8::Error) -> Self {
        AuthError::InvalidKeyFormat(e.to_string())
    }
}

// === Claims ===

/// Only identity travels in the token; roles are re-read on every request
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct Claims {
    pub sub: String, // user_id
    pub exp: usize,
    pub iat: usize,
}

/// Issues and validates session tokens
pub struct TokenIssuer {
    algorithm: Algorithm,
    encoding_key: EncodingKey,
    decoding_key: DecodingKey,
    ttl_secs: u64,
}

impl TokenIssuer {
    pub fn from_config(config: &JwtConfig) -> Result<Self, AuthError> {
        let ttl_secs = config.expiry_seconds().map_err(|e| AuthError::Config(e.to_string()))?;

        match config.algorithm.as_str() {
            "HS256" => {
                let secret = config
                    .secret_key
                    .as_deref()
                    .filter(|s| !s.is_empty())
                    .ok_or_else(|| AuthError::Config("secret_key is required for HS256".into()))?;
                Ok(Self::hs256(secret.as_bytes(), ttl_secs))
            }
            "RS256" => {
                let private_path = config
                    .private_key_path
                    .as_deref()
                    .ok_or_else(|| {
                        AuthError::Config("private_key_path is required for RS256".into())
                    })?;
                let public_path = config
                    .public_key_path
                    .as_deref()
                    .ok_or_else(|| {
                        AuthError::Config("public_key_path is required for RS256".into())
                    })?;
                Self::rs256(private_path, public_path, ttl_secs)
            }
            other => Err(AuthError::Config(format!("unsupported algorithm {}", other))),
        }
    }

    pub fn hs256(secret: &[u8], ttl_secs: u64) -> Self {
        Self {
            algorithm: Algorithm::HS256,
            encoding_key: EncodingKey::from_secret(secret),
            decoding_key: DecodingKey::from_secret(secret),
            ttl_secs,
        }
    }

    fn rs256(private_path: &str, public_path: &str, ttl_secs: u64) -> Result<Self, AuthError> {
        let private_pem = fs::read_to_string(private_path)
            .map_err(|_| AuthError::KeyReadFailed(private_path.to_string()))?;
        let public_pem = fs::read(public_path)
            .map_err(|_| AuthError::KeyReadFailed(public_path.to_string()))?;

        // PKCS#8 PEM -> DER, jsonwebtoken wants PKCS#1 PEM or raw DER
        let private_key = RsaPrivateKey::from_pkcs8_pem(&private_pem)?;
        let der = private_key.to_pkcs8_der()?;

        Ok(Self {
            algorithm: Algorithm::RS256,
            encoding_key: EncodingKey::from_rsa_der(der.as_bytes()),
            decoding_key: DecodingKey::from_rsa_pem(&public_pem)?,
            ttl_secs,
        })
    }

    pub fn ttl_secs(&self) -> u64 {
        self.ttl_secs
    }

    pub fn generate_token(&self, user_id: &str) -> Result<String, AuthError> {
        let now = chrono::Utc::now().timestamp() as usize;
        let claims = Claims {
            sub: user_id.to_owned(),
            exp: now + self.ttl_secs as usize,
            iat: now,
        };
        let header = Header::new(self.algorithm);
        encode(&header, &claims, &self.encoding_key).map_err(Into::into)
    }

    pub fn validate_token(&self, token: &str) -> Result<Claims, AuthError> {
        let mut validation = Validation::new(self.algorithm);
        validation.validate_exp = true;
        let data = decode::<Claims>(token, &self.decoding_key, &validation)?;
        Ok(data.claims)
    }
}
