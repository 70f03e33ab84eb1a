mod config;
mod dashboard;
mod db;
mod errors;
mod jobs;
mod models;
mod quiz;
mod roles;
mod routes;
mod session;
mod state;
mod storage;
mod tasks;
#[cfg(test)]
mod test_support;

use anyhow::Result;
use aws_config::Region;
use aws_sdk_s3::config::Credentials;
use std::net::SocketAddr;
use std::sync::Arc;
use tower_http::{cors::CorsLayer, trace::TraceLayer};
use tracing::info;
use tracing_subscriber::{layer::SubscriberExt, util::SubscriberInitExt, EnvFilter};

use crate::config::Config;
use crate::db::create_pool;
use crate::jobs::repository::PgJobRepository;
use crate::roles::resolver::ResolverRegistry;
use crate::roles::store::PgProfileStore;
use crate::routes::build_router;
use crate::session::client::ProviderAuthClient;
use crate::session::{SessionProvider, SESSION_SWEEP_INTERVAL};
use crate::state::AppState;
use crate::tasks::cache::RedisTaskCache;
use crate::tasks::store::PgTaskStore;
use crate::tasks::tracker::TaskTracker;

#[tokio::main]
async fn main() -> Result<()> {
    // Load configuration first (fails fast on missing required env vars)
    let config = Config::from_env()?;

    // Initialize structured logging
    tracing_subscriber::registry()
        .with(EnvFilter::try_from_default_env().unwrap_or_else(|_| {
            EnvFilter::new(format!("{}={}", env!("CARGO_CRATE_NAME"), &config.rust_log))
        }))
        .with(tracing_subscriber::fmt::layer())
        .init();

    info!("Starting Onboarding API v{}", env!("CARGO_PKG_VERSION"));

    // Initialize PostgreSQL
    let db = create_pool(&config.database_url).await?;

    // Initialize Redis (task list cache)
    let redis = redis::Client::open(config.redis_url.clone())?;
    info!("Redis client initialized");

    // Initialize S3 / MinIO (task documents)
    let s3 = build_s3_client(&config).await;
    info!("S3 client initialized");

    // Session provider and the per-session role resolvers it drives
    let auth = Arc::new(ProviderAuthClient::new(
        &config.auth_url,
        &config.auth_jwt_secret,
    ));
    let sessions = SessionProvider::new(auth);
    let profiles = Arc::new(PgProfileStore::new(db.clone()));
    let resolvers = ResolverRegistry::new(profiles.clone());
    resolvers.spawn_session_listener(sessions.subscribe());
    sessions.spawn_expiry_sweep(SESSION_SWEEP_INTERVAL);

    let tasks = TaskTracker::new(
        Arc::new(RedisTaskCache::new(redis)),
        Arc::new(PgTaskStore::new(db.clone())),
        chrono::Duration::seconds(config.task_cache_ttl_secs as i64),
    );
    info!(
        "Task cache freshness window: {}s",
        config.task_cache_ttl_secs
    );

    // Build app state
    let state = AppState {
        config: config.clone(),
        s3,
        sessions,
        profiles,
        resolvers,
        tasks,
        jobs: Arc::new(PgJobRepository::new(db)),
    };

    // Build router
    let app = build_router(state)
        .layer(TraceLayer::new_for_http())
        .layer(CorsLayer::permissive()); // TODO: restrict CORS to PUBLIC_APP_URL once deployed behind a fixed origin

    let addr: SocketAddr = format!("0.0.0.0:{}", config.port).parse()?;
    info!("Listening on {addr}");

    let listener = tokio::net::TcpListener::bind(addr).await?;
    axum::serve(listener, app).await?;

    Ok(())
}

/// Constructs an S3 client configured for MinIO (local) or AWS (production).
async fn build_s3_client(config: &Config) -> aws_sdk_s3::Client {
    let credentials = Credentials::new(
        &config.aws_access_key_id,
        &config.aws_secret_access_key,
        None,
        None,
        "onboarding-static",
    );

    let s3_config = aws_config::defaults(aws_config::BehaviorVersion::latest())
        .region(Region::new("us-east-1"))
        .credentials_provider(credentials)
        .endpoint_url(&config.s3_endpoint)
        .load()
        .await;

    // MinIO serves buckets by path, not by virtual host
    let s3_config = aws_sdk_s3::config::Builder::from(&s3_config)
        .force_path_style(true)
        .build();

    aws_sdk_s3::Client::from_conf(s3_config)
}
