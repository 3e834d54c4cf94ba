//! Free2Free API server binary.
//!
//! Reads configuration from the environment (and `.env`), wires the stores
//! and serves the HTTP API until Ctrl-C.

use std::sync::Arc;

use clap::Parser;
use f2f_api::AppState;
use f2f_api::config::ApiConfig;
use f2f_core::oauth::{ExternalAuthProvider, GraphOAuthProvider, OAuthStateStore, SocialProvider};
use f2f_core::session::MemorySessionStore;
use f2f_core::store::{
    IdentityStore, MemoryIdentityStore, MemoryResourceOwners, PgIdentityStore, PgMatchOwners,
    ResourceLookup,
};
use sqlx::postgres::PgPoolOptions;
use tokio_util::sync::CancellationToken;
use tracing::{info, warn};

const DEFAULT_LOG_FILTER: &str = "info,f2f_api=debug,f2f_core=debug";

/// CLI arguments. Flags override the matching environment variables.
#[derive(Parser, Debug)]
#[command(name = "f2f_api_server", about = "Free2Free API server")]
struct Args {
    /// Port to listen on, keeping the host of `BIND_ADDR`.
    #[arg(long)]
    port: Option<u16>,

    /// PostgreSQL connection URL.
    #[arg(long, env = "DATABASE_URL")]
    database_url: Option<String>,

    /// Maximum number of database connections in the pool.
    #[arg(long, default_value_t = 5)]
    max_connections: u32,

    /// Keep users and refresh tokens in process memory instead of PostgreSQL.
    #[arg(long, default_value_t = false)]
    in_memory: bool,

    /// Run embedded migrations before serving.
    #[arg(long, default_value_t = false)]
    migrate: bool,
}

#[tokio::main]
async fn main() -> Result<(), Box<dyn std::error::Error>> {
    dotenvy::dotenv().ok();

    tracing_subscriber::fmt()
        .with_writer(std::io::stderr)
        .with_env_filter(
            tracing_subscriber::EnvFilter::try_from_default_env()
                .unwrap_or_else(|_| tracing_subscriber::EnvFilter::new(DEFAULT_LOG_FILTER)),
        )
        .init();

    let args = Args::parse();
    let mut config = ApiConfig::from_env()?;
    if let Some(port) = args.port {
        let host = config
            .bind_addr
            .rsplit_once(':')
            .map_or("127.0.0.1", |(host, _)| host);
        config.bind_addr = format!("{host}:{port}");
    }
    if let Some(url) = args.database_url {
        config.pg_connection_url = url;
    }

    info!(bind_addr = %config.bind_addr, in_memory = args.in_memory, "starting f2f_api_server");

    let shutdown = CancellationToken::new();

    let sessions = Arc::new(MemorySessionStore::new());
    let session_sweeper = sessions.spawn_cleanup_task(shutdown.clone());

    let oauth_states = Arc::new(OAuthStateStore::new());
    let state_sweeper = oauth_states.spawn_cleanup_task(shutdown.clone());
    let oauth = build_oauth_provider(&config, oauth_states);

    let (store, matches): (Arc<dyn IdentityStore>, Arc<dyn ResourceLookup>) = if args.in_memory {
        warn!("using in-memory stores; all data is lost on exit");
        (
            Arc::new(MemoryIdentityStore::new()),
            Arc::new(MemoryResourceOwners::new()),
        )
    } else {
        info!(max_connections = args.max_connections, "configuring connection pool");
        let pool = PgPoolOptions::new()
            .max_connections(args.max_connections)
            .acquire_timeout(std::time::Duration::from_secs(30))
            .connect(&config.pg_connection_url)
            .await?;

        if args.migrate || config.auto_migrate {
            info!("running database migrations");
            f2f_api::migrate(&pool).await?;
        }

        (
            Arc::new(PgIdentityStore::new(pool.clone())),
            Arc::new(PgMatchOwners::new(pool)),
        )
    };

    let state = AppState::new(config.clone(), store, sessions, oauth, matches)?;
    let app = f2f_api::router(state);

    let listener = tokio::net::TcpListener::bind(&config.bind_addr).await?;
    info!(addr = %listener.local_addr()?, "REST API listening");

    let api_result = axum::serve(listener, app)
        .with_graceful_shutdown(shutdown_signal(shutdown.clone()))
        .await;

    // Stop the sweepers whichever way the server exited.
    shutdown.cancel();
    let _ = tokio::join!(session_sweeper, state_sweeper);

    api_result?;
    info!("server stopped");
    Ok(())
}

fn build_oauth_provider(
    config: &ApiConfig,
    states: Arc<OAuthStateStore>,
) -> Arc<dyn ExternalAuthProvider> {
    let mut provider = GraphOAuthProvider::new(config.base_url.clone(), states);
    if let Some(credentials) = &config.facebook {
        provider = provider.with_client(SocialProvider::Facebook, credentials.clone());
    }
    if let Some(credentials) = &config.instagram {
        provider = provider.with_client(SocialProvider::Instagram, credentials.clone());
    }

    let enabled = provider.enabled_providers();
    if enabled.is_empty() {
        warn!("no OAuth provider configured; external login is disabled");
    } else {
        info!(providers = ?enabled, "OAuth providers enabled");
    }
    Arc::new(provider)
}

async fn shutdown_signal(shutdown: CancellationToken) {
    tokio::select! {
        result = tokio::signal::ctrl_c() => {
            if let Err(e) = result {
                warn!(error = %e, "failed to listen for Ctrl-C");
            }
            info!("shutdown requested");
        }
        _ = shutdown.cancelled() => {}
    }
}
