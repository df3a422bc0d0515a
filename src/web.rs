// src/web.rs

use axum::{
    extract::DefaultBodyLimit,
    routing::{get, patch, post, put},
    Router,
};
use std::sync::Arc;
use tower_http::{
    cors::{Any, CorsLayer},
    limit::RequestBodyLimitLayer,
    trace::TraceLayer,
};

use crate::auth::TokenIssuer;
use crate::config::{AppConfig, ServerConfig};
use crate::events::EventHub;
use crate::mailer::Mailer;
use crate::object_store::ObjectStore;
use crate::workspace_service::WorkspaceService;

pub mod contacts;
pub mod documents;
pub mod facilities;
pub mod login;
pub mod organizations;
pub mod response;
pub mod sharing;
pub mod teams;
pub mod users;

/// Everything a handler needs, cloned per request
#[derive(Clone)]
pub struct AppState {
    pub service: Arc<WorkspaceService>,
    pub tokens: Arc<TokenIssuer>,
    pub events: Arc<EventHub>,
    pub mailer: Arc<dyn Mailer>,
    pub objects: Arc<dyn ObjectStore>,
    pub config: Arc<AppConfig>,
}

fn cors_layer(server: &ServerConfig) -> CorsLayer {
    let origins: Vec<_> = server
        .cors_allowed_origins
        .iter()
        .filter(|o| o.as_str() != "*")
        .filter_map(|o| o.parse().ok())
        .collect();

    let layer = CorsLayer::new().allow_methods(Any).allow_headers(Any);
    if origins.is_empty() {
        layer.allow_origin(Any)
    } else {
        layer.allow_origin(origins)
    }
}

pub fn create_router(state: AppState) -> Router {
    let cors = cors_layer(&state.config.web_server);
    let body_limit = state.config.web_server.max_request_size;

    Router::new()
        // auth
        .route("/api/auth/register", post(login::register_handler))
        .route("/api/auth/login", post(login::login_handler))
        .route("/api/auth/forgot-password", post(login::forgot_password_handler))
        .route("/api/auth/reset-password", post(login::reset_password_handler))
        .route("/api/auth/me", get(login::me_handler))
        // users
        .route("/api/users", get(users::list_users))
        .route("/api/users/me/password", post(users::change_password))
        .route(
            "/api/users/:id",
            get(users::get_user).patch(users::update_user).delete(users::delete_user),
        )
        .route("/api/users/:id/role", patch(users::change_role))
        .route("/api/users/:id/status", patch(users::change_status))
        // organizations
        .route("/api/organizations", post(organizations::create_organization))
        .route(
            "/api/organizations/:id",
            get(organizations::get_organization)
                .patch(organizations::update_organization)
                .delete(organizations::delete_organization),
        )
        .route(
            "/api/organizations/:id/members",
            get(organizations::list_members).post(organizations::add_member),
        )
        .route(
            "/api/organizations/:id/members/:user_id",
            patch(organizations::change_member_role).delete(organizations::remove_member),
        )
        .route("/api/organizations/:id/leave", post(organizations::leave))
        .route("/api/organizations/:id/transfer", post(organizations::transfer_ownership))
        .route("/api/organizations/:id/teams", get(organizations::list_teams))
        // teams
        .route("/api/teams", get(teams::list_teams).post(teams::create_team))
        .route(
            "/api/teams/:id",
            get(teams::get_team).patch(teams::update_team).delete(teams::delete_team),
        )
        .route("/api/teams/:id/members", get(teams::list_members).post(teams::add_member))
        .route(
            "/api/teams/:id/members/:user_id",
            patch(teams::change_member_role).delete(teams::remove_member),
        )
        .route("/api/teams/:id/leave", post(teams::leave))
        .route("/api/teams/:id/transfer", post(teams::transfer_ownership))
        // contacts
        .route("/api/contacts", get(contacts::list_contacts).post(contacts::create_contact))
        .route(
            "/api/contacts/:id",
            get(contacts::get_contact)
                .patch(contacts::update_contact)
                .delete(contacts::delete_contact),
        )
        .route("/api/contacts/:id/share", patch(contacts::share_contact))
        // documents
        .route("/api/documents", get(documents::list_documents).post(documents::create_document))
        .route(
            "/api/documents/:id",
            get(documents::get_document)
                .patch(documents::update_document)
                .delete(documents::delete_document),
        )
        .route("/api/documents/:id/share", patch(documents::share_document))
        .route(
            "/api/documents/:id/file",
            put(documents::upload_file).get(documents::download_file),
        )
        .route(
            "/api/documents/:id/link",
            post(documents::create_link).delete(documents::revoke_link),
        )
        .route("/api/shared/:token", get(documents::shared_document))
        // facilities
        .route(
            "/api/facilities",
            get(facilities::list_facilities).post(facilities::create_facility),
        )
        .route("/api/facilities/import", post(facilities::import_facilities))
        .route(
            "/api/facilities/:id",
            get(facilities::get_facility)
                .patch(facilities::update_facility)
                .delete(facilities::delete_facility),
        )
        .with_state(state)
        .layer(DefaultBodyLimit::disable())
        .layer(RequestBodyLimitLayer::new(body_limit))
        .layer(cors)
        .layer(TraceLayer::new_for_http())
}

pub async fn run_web_server(state: AppState, addr: &str) -> Result<(), Box<dyn std::error::Error>> {
    let app = create_router(state);

    let listener = tokio::net::TcpListener::bind(addr).await?;
    tracing::info!(%addr, "web API listening");

    axum::serve(listener, app).await?;
    Ok(())
}
