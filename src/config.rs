// src/config.rs

use serde::{Deserialize, Serialize};
use std::fs;
use std::path::{Path, PathBuf};
use thiserror::Error;

pub const ENV_PREFIX: &str = "DASHDESK";
pub const DEFAULT_CONFIG_FILE: &str = "dashdesk.yaml";

#[derive(Debug, Error)]
pub enum ConfigError {
    #[error("Failed to load configuration: {0}")]
    Load(#[from] config::ConfigError),
    #[error("Failed to write configuration: {0}")]
    Io(#[from] std::io::Error),
    #[error("Failed to encode configuration: {0}")]
    Yaml(#[from] serde_yaml::Error),
    #[error("Invalid configuration: {0}")]
    Invalid(String),
}

#[derive(Debug, Clone, Deserialize, Serialize)]
pub struct AppConfig {
    #[serde(default = "default_db_path")]
    pub db_path: String,

    /// 32-byte store key, hex encoded
    #[serde(default)]
    pub master_key_hex: String,

    #[serde(default)]
    pub web_server: ServerConfig,

    #[serde(default)]
    pub security: SecurityConfig,

    #[serde(default)]
    pub logging: LoggingConfig,

    #[serde(default)]
    pub storage: StorageConfig,

    #[serde(default)]
    pub mail: MailConfig,
}

fn default_db_path() -> String {
    "data/dashdesk.db".to_string()
}

#[derive(Debug, Clone, Deserialize, Serialize)]
pub struct ServerConfig {
    #[serde(default = "default_address")]
    pub address: String,
    #[serde(default = "default_max_request_size")]
    pub max_request_size: usize,
    /// Empty means any origin
    #[serde(default)]
    pub cors_allowed_origins: Vec<String>,
}

fn default_address() -> String {
    "127.0.0.1:8080".to_string()
}

fn default_max_request_size() -> usize {
    10 * 1024 * 1024 // 10 MB
}

impl Default for ServerConfig {
    fn default() -> Self {
        Self {
            address: default_address(),
            max_request_size: default_max_request_size(),
            cors_allowed_origins: Vec::new(),
        }
    }
}

#[derive(Debug, Clone, Deserialize, Serialize, Default)]
pub struct SecurityConfig {
    #[serde(default)]
    pub jwt: JwtConfig,
    #[serde(default)]
    pub password_policy: PasswordPolicy,
    #[serde(default = "default_reset_token_ttl")]
    pub reset_token_ttl_minutes: i64,
}

fn default_reset_token_ttl() -> i64 {
    60
}

#[derive(Debug, Clone, Deserialize, Serialize)]
pub struct JwtConfig {
    #[serde(default = "default_jwt_algorithm")]
    pub algorithm: String,
    pub secret_key: Option<String>,
    pub private_key_path: Option<String>,
    pub public_key_path: Option<String>,
    #[serde(default = "default_token_expiry")]
    pub token_expiry: String,
}

fn default_jwt_algorithm() -> String {
    "HS256".to_string()
}

fn default_token_expiry() -> String {
    "24h".to_string()
}

impl Default for JwtConfig {
    fn default() -> Self {
        Self {
            algorithm: default_jwt_algorithm(),
            secret_key: None,
            private_key_path: None,
            public_key_path: None,
            token_expiry: default_token_expiry(),
        }
    }
}

impl JwtConfig {
    /// Token lifetime in seconds, from values like `90s`, `30m`, `24h`, `7d`
    pub fn expiry_seconds(&self) -> Result<u64, ConfigError> {
        parse_duration(&self.token_expiry)
            .ok_or_else(|| ConfigError::Invalid(format!("bad token_expiry: {}", self.token_expiry)))
    }
}

fn parse_duration(value: &str) -> Option<u64> {
    let value = value.trim();
    let split = value.find(|c: char| !c.is_ascii_digit()).unwrap_or(value.len());
    let (digits, unit) = value.split_at(split);
    let amount: u64 = digits.parse().ok()?;
    let factor = match unit {
        "" | "s" => 1,
        "m" => 60,
        "h" => 3600,
        "d" => 86400,
        _ => return None,
    };
    amount.checked_mul(factor).filter(|secs| *secs > 0)
}

#[derive(Debug, Clone, Deserialize, Serialize)]
pub struct PasswordPolicy {
    #[serde(default = "default_min_length")]
    pub min_length: u8,
    #[serde(default = "default_true")]
    pub require_uppercase: bool,
    #[serde(default = "default_true")]
    pub require_lowercase: bool,
    #[serde(default = "default_true")]
    pub require_digits: bool,
    #[serde(default)]
    pub require_special_chars: bool,
    #[serde(default = "default_bcrypt_cost")]
    pub bcrypt_cost: u32,
}

fn default_min_length() -> u8 {
    8
}

fn default_true() -> bool {
    true
}

fn default_bcrypt_cost() -> u32 {
    bcrypt::DEFAULT_COST
}

impl Default for PasswordPolicy {
    fn default() -> Self {
        Self {
            min_length: default_min_length(),
            require_uppercase: true,
            require_lowercase: true,
            require_digits: true,
            require_special_chars: false,
            bcrypt_cost: default_bcrypt_cost(),
        }
    }
}

#[derive(Debug, Clone, Deserialize, Serialize)]
pub struct LoggingConfig {
    #[serde(default = "default_log_level")]
    pub level: String,
    #[serde(default)]
    pub enable_json_output: bool,
}

fn default_log_level() -> String {
    "info".to_string()
}

impl Default for LoggingConfig {
    fn default() -> Self {
        Self {
            level: default_log_level(),
            enable_json_output: false,
        }
    }
}

#[derive(Debug, Clone, Deserialize, Serialize)]
pub struct StorageConfig {
    #[serde(default = "default_local_root")]
    pub local_root: String,
}

fn default_local_root() -> String {
    "data/objects".to_string()
}

impl Default for StorageConfig {
    fn default() -> Self {
        Self { local_root: default_local_root() }
    }
}

#[derive(Debug, Clone, Deserialize, Serialize)]
pub struct MailConfig {
    #[serde(default = "default_mail_from")]
    pub from: String,
    /// Base URL used in links sent by mail
    #[serde(default = "default_app_url")]
    pub app_url: String,
}

fn default_mail_from() -> String {
    "no-reply@dashdesk.local".to_string()
}

fn default_app_url() -> String {
    "http://localhost:3000".to_string()
}

impl Default for MailConfig {
    fn default() -> Self {
        Self {
            from: default_mail_from(),
            app_url: default_app_url(),
        }
    }
}

impl Default for AppConfig {
    fn default() -> Self {
        Self {
            db_path: default_db_path(),
            master_key_hex: String::new(),
            web_server: ServerConfig::default(),
            security: SecurityConfig::default(),
            logging: LoggingConfig::default(),
            storage: StorageConfig::default(),
            mail: MailConfig::default(),
        }
    }
}

impl AppConfig {
    /// Load YAML from `path` (optional) and overlay `DASHDESK__*` variables
    pub fn load<P: AsRef<Path>>(path: Option<P>) -> Result<Self, ConfigError> {
        let file = match path {
            Some(p) => Some(p.as_ref().to_path_buf()),
            None => default_config_path(),
        };

        let mut builder = config::Config::builder();
        if let Some(file) = file {
            builder = builder.add_source(
                config::File::from(file)
                    .format(config::FileFormat::Yaml)
                    .required(false),
            );
        }
        let settings = builder
            .add_source(config::Environment::with_prefix(ENV_PREFIX).separator("__"))
            .build()?;

        let config: Self = settings.try_deserialize()?;
        config.validate()?;
        Ok(config)
    }

    pub fn save<P: AsRef<Path>>(&self, path: P) -> Result<(), ConfigError> {
        let content = serde_yaml::to_string(self)?;
        fs::write(path, content)?;
        Ok(())
    }

    pub fn validate(&self) -> Result<(), ConfigError> {
        self.master_key()?;
        self.security.jwt.expiry_seconds()?;
        let jwt = &self.security.jwt;
        match jwt.algorithm.as_str() {
            "HS256" => {
                if jwt.secret_key.as_deref().map_or(true, str::is_empty) {
                    return Err(ConfigError::Invalid(
                        "security.jwt.secret_key is required for HS256".into(),
                    ));
                }
            }
            "RS256" => {
                if jwt.private_key_path.is_none() || jwt.public_key_path.is_none() {
                    return Err(ConfigError::Invalid(
                        "RS256 needs private_key_path and public_key_path".into(),
                    ));
                }
            }
            other => {
                return Err(ConfigError::Invalid(format!("unsupported jwt algorithm: {}", other)));
            }
        }
        if !(4..=31).contains(&self.security.password_policy.bcrypt_cost) {
            return Err(ConfigError::Invalid("bcrypt_cost must be between 4 and 31".into()));
        }
        Ok(())
    }

    pub fn master_key(&self) -> Result<[u8; 32], ConfigError> {
        let bytes = hex::decode(self.master_key_hex.trim())
            .map_err(|_| ConfigError::Invalid("master_key_hex is not valid hex".into()))?;
        bytes
            .try_into()
            .map_err(|_| {
                ConfigError::Invalid("master_key_hex must be 32 bytes (64 hex chars)".into())
            })
    }
}

/// `./dashdesk.yaml` if present, else the per-user config directory
pub fn default_config_path() -> Option<PathBuf> {
    let local = PathBuf::from(DEFAULT_CONFIG_FILE);
    if local.exists() {
        return Some(local);
    }
    dirs::config_dir().map(|dir| dir.join("dashdesk").join("config.yaml"))
}
