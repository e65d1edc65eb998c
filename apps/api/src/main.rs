mod auth;
mod billing;
mod cache;
mod config;
mod db;
mod errors;
mod llm_client;
mod models;
mod obfuscation;
mod rate_limit;
mod resumes;
mod routes;
mod scoring;
mod state;
mod tailoring;
mod text;
mod tools;

use std::net::SocketAddr;
use std::sync::Arc;
use std::time::Duration;

use anyhow::{Context, Result};
use tower::ServiceBuilder;
use tower_http::{cors::CorsLayer, timeout::TimeoutLayer, trace::TraceLayer};
use tracing::info;
use tracing_subscriber::{layer::SubscriberExt, util::SubscriberInitExt, EnvFilter};

use crate::auth::SupabaseAuth;
use crate::billing::stripe::StripeClient;
use crate::cache::{MemoryCache, RedisCache, ResponseCache};
use crate::config::Config;
use crate::db::create_pool;
use crate::llm_client::ModelRouter;
use crate::rate_limit::{MemoryLimiter, RedisLimiter, RequestLimiter};
use crate::routes::build_router;
use crate::state::AppState;

#[tokio::main]
async fn main() -> Result<()> {
    // Load configuration first (fails on missing required env vars)
    let config = Config::from_env()?;

    // Initialize structured logging
    tracing_subscriber::registry()
        .with(EnvFilter::try_from_default_env().unwrap_or_else(|_| {
            EnvFilter::new(format!(
                "{}={},tower_http=info",
                env!("CARGO_PKG_NAME").replace('-', "_"),
                &config.rust_log
            ))
        }))
        .with(tracing_subscriber::fmt::layer())
        .init();

    info!("Starting Tailor API v{}", env!("CARGO_PKG_VERSION"));

    // Initialize PostgreSQL
    let db = create_pool(&config.database_url).await?;

    // Cache and rate limiter: Redis when configured, process-local otherwise
    let cache_ttl = Duration::from_secs(config.cache_ttl_secs);
    let (cache, limiter): (Arc<dyn ResponseCache>, Arc<dyn RequestLimiter>) =
        match config.redis_url.as_deref() {
            Some(url) => {
                let redis = redis::Client::open(url).context("Invalid REDIS_URL")?;
                info!("Redis client initialized");
                (
                    Arc::new(RedisCache::new(redis.clone(), cache_ttl)),
                    Arc::new(RedisLimiter::new(redis)),
                )
            }
            None => {
                info!("REDIS_URL not set; using in-memory cache and rate limiter");
                (
                    Arc::new(MemoryCache::new(cache_ttl)),
                    Arc::new(MemoryLimiter::new()),
                )
            }
        };

    // Initialize model router
    let llm = ModelRouter::with_default_backends(
        config.default_model.clone(),
        config.fallback_models.clone(),
        config.llm_keys.clone(),
    );
    info!(
        "Model router initialized (default: {}, fallbacks: {})",
        llm.default_model(),
        config.fallback_models.len()
    );

    // Build app state
    let state = AppState {
        db,
        llm,
        cache,
        limiter,
        auth: Arc::new(SupabaseAuth::new(
            &config.supabase_url,
            &config.supabase_anon_key,
        )),
        stripe: StripeClient::new(&config.stripe_secret_key),
        config: config.clone(),
    };

    // Build router
    let app = build_router(state).layer(
        ServiceBuilder::new()
            .layer(TraceLayer::new_for_http())
            .layer(CorsLayer::permissive()) // TODO: restrict origins to APP_URL once the web app domain is fixed
            .layer(TimeoutLayer::new(Duration::from_secs(
                config.request_timeout_secs,
            ))),
    );

    let addr: SocketAddr = format!("0.0.0.0:{}", config.port).parse()?;
    info!("Listening on {addr}");

    let listener = tokio::net::TcpListener::bind(addr).await?;
    axum::serve(
        listener,
        app.into_make_service_with_connect_info::<SocketAddr>(),
    )
    .await?;

    Ok(())
}
