// src/cli.rs

use clap::Parser;
use rand::{rngs::OsRng, RngCore};
use std::path::PathBuf;
use std::sync::Arc;
use tracing_subscriber::EnvFilter;

use crate::auth::TokenIssuer;
use crate::config::{AppConfig, LoggingConfig, DEFAULT_CONFIG_FILE};
use crate::events::{spawn_audit_logger, EventHub};
use crate::mailer::LogMailer;
use crate::models::{check_policy, PasswordHash, User, UserRole};
use crate::object_store::LocalObjectStore;
use crate::raddb::RadDB;
use crate::web::facilities::parse_rows;
use crate::web::{run_web_server, AppState};
use crate::workspace_service::WorkspaceService;

#[derive(Parser)]
#[command(
    name = "dashdesk",
    author,
    version,
    about = "Contacts, documents and facilities for teams",
    long_about = None
)]
pub struct Cli {
    /// YAML config file (default: ./dashdesk.yaml, then the user config dir)
    #[arg(short, long, global = true)]
    pub config: Option<PathBuf>,

    #[command(subcommand)]
    pub command: Command,
}

#[derive(clap::Subcommand)]
pub enum Command {
    /// Run the HTTP API
    Serve {
        /// Listen address, overrides web_server.address
        #[arg(long)]
        addr: Option<String>,
    },
    /// Create a global administrator
    CreateAdmin {
        #[arg(long)]
        email: String,
        #[arg(long)]
        name: String,
        #[arg(long)]
        password: String,
    },
    /// Print all users
    ListUsers {
        #[arg(short, long)]
        json: bool,
    },
    /// Import facilities from a JSON file (an array of rows or {"rows": [...]})
    ImportFacilities { file: PathBuf },
    /// Write a config file with a fresh master key and JWT secret
    InitConfig {
        path: Option<PathBuf>,
        #[arg(long)]
        force: bool,
    },
}

pub fn init_tracing(logging: &LoggingConfig) {
    let filter =
        EnvFilter::try_from_default_env().unwrap_or_else(|_| EnvFilter::new(&logging.level));
    let builder = tracing_subscriber::fmt().with_env_filter(filter);
    if logging.enable_json_output {
        builder.json().init();
    } else {
        builder.init();
    }
}

pub async fn run(cli: Cli) -> Result<(), Box<dyn std::error::Error>> {
    if let Command::InitConfig { path, force } = &cli.command {
        let path = path
            .clone()
            .or_else(|| cli.config.clone())
            .unwrap_or_else(|| PathBuf::from(DEFAULT_CONFIG_FILE));
        return init_config(path, *force);
    }

    let config = AppConfig::load(cli.config.as_ref())?;
    init_tracing(&config.logging);

    match cli.command {
        Command::Serve { addr } => serve(config, addr).await,
        Command::CreateAdmin { email, name, password } => {
            let service = open_service(&config)?;
            create_admin(&service, &config, &email, &name, &password).await
        }
        Command::ListUsers { json } => {
            let service = open_service(&config)?;
            list_users(&service, json).await
        }
        Command::ImportFacilities { file } => {
            let service = open_service(&config)?;
            import_facilities(&service, file).await
        }
        Command::InitConfig { .. } => Ok(()),
    }
}

fn open_service(config: &AppConfig) -> Result<WorkspaceService, Box<dyn std::error::Error>> {
    let db_path = PathBuf::from(&config.db_path);
    if let Some(parent) = db_path.parent().filter(|p| !p.as_os_str().is_empty()) {
        std::fs::create_dir_all(parent)?;
    }
    Ok(WorkspaceService::open(&db_path, &config.master_key()?)?)
}

fn init_config(path: PathBuf, force: bool) -> Result<(), Box<dyn std::error::Error>> {
    if path.exists() && !force {
        return Err(format!("{} already exists; pass --force to overwrite", path.display()).into());
    }

    let mut config = AppConfig::default();
    config.master_key_hex = hex::encode(RadDB::generate_key());
    let mut secret = [0u8; 32];
    OsRng.fill_bytes(&mut secret);
    config.security.jwt.secret_key = Some(hex::encode(secret));

    if let Some(parent) = path.parent().filter(|p| !p.as_os_str().is_empty()) {
        std::fs::create_dir_all(parent)?;
    }
    config.save(&path)?;
    println!("Config written to {}", path.display());
    Ok(())
}

async fn serve(config: AppConfig, addr: Option<String>) -> Result<(), Box<dyn std::error::Error>> {
    let service = Arc::new(open_service(&config)?);
    if service.count_users().await? == 0 {
        tracing::warn!("no users yet; run `dashdesk create-admin` to add one");
    }

    let tokens = Arc::new(TokenIssuer::from_config(&config.security.jwt)?);
    let events = Arc::new(EventHub::new());
    spawn_audit_logger(&events);

    let addr = addr.unwrap_or_else(|| config.web_server.address.clone());
    let state = AppState {
        service,
        tokens,
        events,
        mailer: Arc::new(LogMailer),
        objects: Arc::new(LocalObjectStore::new(&config.storage.local_root)),
        config: Arc::new(config),
    };

    run_web_server(state, &addr).await
}

async fn create_admin(
    service: &WorkspaceService,
    config: &AppConfig,
    email: &str,
    name: &str,
    password: &str,
) -> Result<(), Box<dyn std::error::Error>> {
    let policy = &config.security.password_policy;
    check_policy(policy, password)?;

    let hash = PasswordHash::new_bcrypt(password, policy.bcrypt_cost)?;
    let user = User::new(email, name, hash, UserRole::Admin);
    service.create_user(&user).await?;

    tracing::info!(user_id = %user.id, "administrator created");
    println!("Administrator created: {} ({})", user.email, user.id);
    Ok(())
}

async fn list_users(
    service: &WorkspaceService,
    json: bool,
) -> Result<(), Box<dyn std::error::Error>> {
    let mut users = service.list_users().await?;
    users.sort_by(|a, b| a.created_at.cmp(&b.created_at));

    if json {
        let rows: Vec<_> = users
            .iter()
            .map(|u| {
                serde_json::json!({
                    "id": u.id,
                    "email": u.email,
                    "name": u.name,
                    "role": u.role,
                    "isActive": u.is_active,
                })
            })
            .collect();
        println!("{}", serde_json::to_string_pretty(&rows)?);
    } else {
        for user in users {
            let status = if user.is_active { "active" } else { "inactive" };
            println!("{} | {} | {} | {}", user.id, user.email, user.role, status);
        }
    }
    Ok(())
}

async fn import_facilities(
    service: &WorkspaceService,
    file: PathBuf,
) -> Result<(), Box<dyn std::error::Error>> {
    let content = std::fs::read_to_string(&file)?;
    let rows = match serde_json::from_str::<serde_json::Value>(&content)? {
        serde_json::Value::Array(rows) => rows,
        serde_json::Value::Object(mut map) => match map.remove("rows") {
            Some(serde_json::Value::Array(rows)) => rows,
            _ => return Err("expected a JSON array or an object with a \"rows\" array".into()),
        },
        _ => return Err("expected a JSON array or an object with a \"rows\" array".into()),
    };

    // CLI imports have no acting user
    let (valid, errors) = parse_rows(rows, uuid::Uuid::nil());
    let summary = service.import_facilities(valid).await?;

    println!(
        "Imported {} facilities, skipped {} duplicates, {} invalid rows",
        summary.created.len(),
        summary.skipped.len(),
        errors.len()
    );
    for error in errors {
        eprintln!("row {}: {}", error.row, error.message);
    }
    Ok(())
}
