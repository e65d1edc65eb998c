//! Per-client request limiting.
//!
//! Keys are `<client ip>:<route path>`. LLM-backed routes get the configured
//! per-minute limit; every other API route gets five times that.

use std::collections::VecDeque;
use std::net::SocketAddr;
use std::time::Duration;

use async_trait::async_trait;
use axum::{
    extract::{ConnectInfo, Request, State},
    http::HeaderMap,
    middleware::Next,
    response::{IntoResponse, Response},
};
use dashmap::DashMap;
use tokio::time::Instant;
use tracing::warn;

use crate::errors::AppError;
use crate::state::AppState;

const WINDOW: Duration = Duration::from_secs(60);
const REDIS_KEY_PREFIX: &str = "tailor:ratelimit:";
const NON_LLM_MULTIPLIER: u32 = 5;
/// Idle keys are dropped once the map grows past this size.
const SWEEP_THRESHOLD: usize = 10_000;

/// Routes that call a model and therefore get the tight limit.
const LLM_ROUTES: &[&str] = &[
    "/api/tailor",
    "/api/tools/keywords",
    "/api/tools/skills-gap",
    "/api/tools/relevancy",
    "/api/tools/ats-check",
    "/api/tools/interview-prep",
    "/api/tools/validate",
];

#[async_trait]
pub trait RequestLimiter: Send + Sync {
    /// Records one request under `key`; returns false once `limit` is exceeded.
    async fn allow(&self, key: &str, limit: u32) -> bool;
}

// ────────────────────────────────────────────────────────────────────────────
// In-memory sliding window
// ────────────────────────────────────────────────────────────────────────────

#[derive(Default)]
pub struct MemoryLimiter {
    windows: DashMap<String, VecDeque<Instant>>,
}

impl MemoryLimiter {
    pub fn new() -> Self {
        Self::default()
    }
}

#[async_trait]
impl RequestLimiter for MemoryLimiter {
    async fn allow(&self, key: &str, limit: u32) -> bool {
        let now = Instant::now();
        if self.windows.len() > SWEEP_THRESHOLD {
            self.windows
                .retain(|_, hits| hits.back().is_some_and(|t| now.duration_since(*t) < WINDOW));
        }
        let mut hits = self.windows.entry(key.to_string()).or_default();
        while hits.front().is_some_and(|t| now.duration_since(*t) >= WINDOW) {
            hits.pop_front();
        }
        if hits.len() >= limit as usize {
            return false;
        }
        hits.push_back(now);
        true
    }
}

// ────────────────────────────────────────────────────────────────────────────
// Redis fixed window
// ────────────────────────────────────────────────────────────────────────────

pub struct RedisLimiter {
    client: redis::Client,
}

impl RedisLimiter {
    pub fn new(client: redis::Client) -> Self {
        Self { client }
    }

    async fn hit(&self, key: &str) -> redis::RedisResult<u64> {
        let mut conn = self.client.get_multiplexed_async_connection().await?;
        let redis_key = format!("{REDIS_KEY_PREFIX}{key}");
        let count: u64 = redis::cmd("INCR")
            .arg(&redis_key)
            .query_async(&mut conn)
            .await?;
        if count == 1 {
            redis::cmd("EXPIRE")
                .arg(&redis_key)
                .arg(WINDOW.as_secs())
                .query_async::<_, ()>(&mut conn)
                .await?;
        }
        Ok(count)
    }
}

#[async_trait]
impl RequestLimiter for RedisLimiter {
    async fn allow(&self, key: &str, limit: u32) -> bool {
        match self.hit(key).await {
            Ok(count) => count <= u64::from(limit),
            Err(e) => {
                // Fail open.
                warn!("Redis rate limiter unavailable: {e}");
                true
            }
        }
    }
}

// ────────────────────────────────────────────────────────────────────────────
// Middleware
// ────────────────────────────────────────────────────────────────────────────

pub fn is_llm_route(path: &str) -> bool {
    LLM_ROUTES.iter().any(|p| path == *p)
}

pub fn limit_for(path: &str, per_minute: u32) -> u32 {
    if is_llm_route(path) {
        per_minute
    } else {
        per_minute.saturating_mul(NON_LLM_MULTIPLIER)
    }
}

/// First `x-forwarded-for` hop, else the socket peer address.
pub fn client_ip(headers: &HeaderMap, peer: Option<SocketAddr>) -> String {
    headers
        .get("x-forwarded-for")
        .and_then(|h| h.to_str().ok())
        .and_then(|xff| xff.split(',').next())
        .map(str::trim)
        .filter(|ip| !ip.is_empty())
        .map(str::to_string)
        .or_else(|| peer.map(|addr| addr.ip().to_string()))
        .unwrap_or_else(|| "unknown".to_string())
}

pub async fn rate_limit_middleware(
    State(state): State<AppState>,
    req: Request,
    next: Next,
) -> Response {
    let path = req.uri().path().to_string();
    if !path.starts_with("/api/") {
        return next.run(req).await;
    }

    let peer = req
        .extensions()
        .get::<ConnectInfo<SocketAddr>>()
        .map(|c| c.0);
    let ip = client_ip(req.headers(), peer);
    let limit = limit_for(&path, state.config.rate_limit_per_minute);

    if state.limiter.allow(&format!("{ip}:{path}"), limit).await {
        next.run(req).await
    } else {
        warn!("Rate limit exceeded for {ip} on {path}");
        AppError::RateLimited.into_response()
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use axum::http::HeaderValue;

    #[tokio::test(start_paused = true)]
    async fn test_memory_limiter_sliding_window() {
        let limiter = MemoryLimiter::new();
        for _ in 0..3 {
            assert!(limiter.allow("ip:/api/tailor", 3).await);
        }
        assert!(!limiter.allow("ip:/api/tailor", 3).await);
        assert!(limiter.allow("other:/api/tailor", 3).await, "keys are independent");

        tokio::time::advance(Duration::from_secs(61)).await;
        assert!(limiter.allow("ip:/api/tailor", 3).await);
    }

    #[tokio::test(start_paused = true)]
    async fn test_rejected_requests_do_not_extend_window() {
        let limiter = MemoryLimiter::new();
        assert!(limiter.allow("k", 1).await);
        tokio::time::advance(Duration::from_secs(30)).await;
        assert!(!limiter.allow("k", 1).await);
        tokio::time::advance(Duration::from_secs(31)).await;
        assert!(limiter.allow("k", 1).await);
    }

    #[test]
    fn test_limits_per_route_class() {
        assert_eq!(limit_for("/api/tailor", 20), 20);
        assert_eq!(limit_for("/api/tools/keywords", 20), 20);
        assert_eq!(limit_for("/api/tools/clean-jd", 20), 100);
        assert_eq!(limit_for("/api/resumes", 20), 100);
    }

    #[test]
    fn test_client_ip_prefers_first_forwarded_hop() {
        let mut headers = HeaderMap::new();
        let peer: SocketAddr = "10.0.0.9:5000".parse().unwrap();
        assert_eq!(client_ip(&headers, Some(peer)), "10.0.0.9");
        assert_eq!(client_ip(&headers, None), "unknown");

        headers.insert(
            "x-forwarded-for",
            HeaderValue::from_static(" 203.0.113.7 , 10.0.0.1"),
        );
        assert_eq!(client_ip(&headers, Some(peer)), "203.0.113.7");
    }
}
