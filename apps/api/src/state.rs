use std::sync::Arc;

use sqlx::PgPool;

use crate::auth::TokenVerifier;
use crate::billing::stripe::StripeClient;
use crate::cache::ResponseCache;
use crate::config::Config;
use crate::llm_client::ModelRouter;
use crate::rate_limit::RequestLimiter;

/// Shared application state injected into all route handlers via Axum extractors.
#[derive(Clone)]
pub struct AppState {
    pub db: PgPool,
    /// Model calls with provider fallback.
    pub llm: ModelRouter,
    /// Memory or Redis, chosen at startup from `REDIS_URL`.
    pub cache: Arc<dyn ResponseCache>,
    pub limiter: Arc<dyn RequestLimiter>,
    pub auth: Arc<dyn TokenVerifier>,
    pub stripe: StripeClient,
    pub config: Config,
}
