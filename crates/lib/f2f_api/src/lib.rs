//! # f2f_api
//!
//! HTTP API library for Free2Free.

pub mod config;
pub mod error;
pub mod handlers;
pub mod middleware;
pub mod models;
pub mod services;

use std::sync::Arc;

use axum::Router;
use axum::routing::{get, post};
use f2f_core::auth::CodecError;
use f2f_core::auth::gate::AuthorizationGate;
use f2f_core::auth::reconcile::IdentityReconciler;
use f2f_core::auth::resolver::CredentialResolver;
use f2f_core::auth::tokens::TokenService;
use f2f_core::oauth::ExternalAuthProvider;
use f2f_core::session::SessionStore;
use f2f_core::store::{IdentityStore, ResourceLookup};
use sqlx::PgPool;
use tower_http::cors::{Any, CorsLayer};
use tower_http::trace::TraceLayer;

use crate::config::ApiConfig;
use crate::handlers::{admin, auth, health, organizer, profile};

/// Shared application state passed to all handlers.
#[derive(Clone)]
pub struct AppState {
    pub config: ApiConfig,
    pub store: Arc<dyn IdentityStore>,
    pub sessions: Arc<dyn SessionStore>,
    pub oauth: Arc<dyn ExternalAuthProvider>,
    /// Match ownership lookup for organizer-only routes.
    pub matches: Arc<dyn ResourceLookup>,
    pub reconciler: IdentityReconciler,
    pub tokens: TokenService,
    pub gate: AuthorizationGate,
}

impl AppState {
    /// Wire the core components over the given collaborators.
    ///
    /// Fails if the configured JWT secret is unusable.
    pub fn new(
        config: ApiConfig,
        store: Arc<dyn IdentityStore>,
        sessions: Arc<dyn SessionStore>,
        oauth: Arc<dyn ExternalAuthProvider>,
        matches: Arc<dyn ResourceLookup>,
    ) -> Result<Self, CodecError> {
        let tokens = TokenService::new(store.clone(), config.jwt_secret.as_bytes())?
            .with_hash_cost(config.refresh_hash_cost);
        let resolver = CredentialResolver::new(store.clone(), sessions.clone(), tokens.clone());
        Ok(Self {
            reconciler: IdentityReconciler::new(store.clone()),
            gate: AuthorizationGate::new(resolver),
            tokens,
            config,
            store,
            sessions,
            oauth,
            matches,
        })
    }
}

/// Run embedded database migrations.
///
/// Delegates to `f2f_core::migrate::migrate()` which owns the migration files.
pub async fn migrate(pool: &PgPool) -> Result<(), sqlx::migrate::MigrateError> {
    f2f_core::migrate::migrate(pool).await
}

/// Builds the Axum router with all routes and shared state.
pub fn router(state: AppState) -> Router {
    let cors = CorsLayer::new()
        .allow_origin(Any)
        .allow_methods(Any)
        .allow_headers(Any);

    // Public routes (no auth required)
    let public = Router::new()
        .route("/health", get(health::health_handler))
        .route("/auth/{provider}", get(auth::begin_handler))
        .route("/auth/{provider}/callback", get(auth::callback_handler))
        .route("/auth/refresh", post(auth::refresh_handler))
        .route("/logout", get(auth::logout_handler));

    // Protected routes (require auth)
    let protected = Router::new()
        .route("/auth/token", get(auth::token_handler))
        .route("/profile", get(profile::profile_handler))
        .route_layer(axum::middleware::from_fn_with_state(
            state.clone(),
            middleware::auth::require_auth,
        ));

    let admin = Router::new()
        .route("/admin/users/{id}", get(admin::get_user_handler))
        .route_layer(axum::middleware::from_fn_with_state(
            state.clone(),
            middleware::auth::require_admin,
        ));

    let organizer = Router::new()
        .route("/organizer/matches/{id}", get(organizer::get_match_handler))
        .route_layer(axum::middleware::from_fn_with_state(
            state.clone(),
            middleware::auth::require_match_organizer,
        ));

    Router::new()
        .merge(public)
        .merge(protected)
        .merge(admin)
        .merge(organizer)
        .layer(TraceLayer::new_for_http())
        .layer(cors)
        .with_state(state)
}
