use anyhow::{Context, Result};

/// Default freshness window for the per-user task cache.
pub const DEFAULT_TASK_CACHE_TTL_SECS: u64 = 300;

/// Application configuration loaded from environment variables.
/// Startup fails if required variables are missing.
#[derive(Debug, Clone)]
pub struct Config {
    pub database_url: String,
    pub redis_url: String,
    pub s3_bucket: String,
    pub s3_endpoint: String,
    pub aws_access_key_id: String,
    pub aws_secret_access_key: String,
    /// Base URL of the hosted auth provider (e.g. `https://xyz.example.co/auth/v1`).
    pub auth_url: String,
    /// HS256 secret the auth provider signs access tokens with.
    pub auth_jwt_secret: String,
    /// Public origin of the web app; job application links are built from it.
    pub public_app_url: String,
    pub task_cache_ttl_secs: u64,
    pub port: u16,
    pub rust_log: String,
}

impl Config {
    pub fn from_env() -> Result<Self> {
        dotenvy::dotenv().ok(); // load .env if present; ignore if missing

        Ok(Config {
            database_url: require_env("DATABASE_URL")?,
            redis_url: require_env("REDIS_URL")?,
            s3_bucket: require_env("S3_BUCKET")?,
            s3_endpoint: require_env("S3_ENDPOINT")?,
            aws_access_key_id: require_env("AWS_ACCESS_KEY_ID")?,
            aws_secret_access_key: require_env("AWS_SECRET_ACCESS_KEY")?,
            auth_url: require_env("AUTH_URL")?,
            auth_jwt_secret: require_env("AUTH_JWT_SECRET")?,
            public_app_url: std::env::var("PUBLIC_APP_URL")
                .unwrap_or_else(|_| "http://localhost:3000".to_string()),
            task_cache_ttl_secs: std::env::var("TASK_CACHE_TTL_SECS")
                .unwrap_or_else(|_| DEFAULT_TASK_CACHE_TTL_SECS.to_string())
                .parse::<u64>()
                .context("TASK_CACHE_TTL_SECS must be a whole number of seconds")?,
            port: std::env::var("PORT")
                .unwrap_or_else(|_| "8080".to_string())
                .parse::<u16>()
                .context("PORT must be a valid port number")?,
            rust_log: std::env::var("RUST_LOG").unwrap_or_else(|_| "info".to_string()),
        })
    }
}

fn require_env(key: &str) -> Result<String> {
    std::env::var(key).with_context(|| format!("Required environment variable '{key}' is not set"))
}
