use std::collections::BTreeMap;

use axum::{extract::State, Json};
use serde::Serialize;

use crate::llm_client::usage::ModelUsage;
use crate::state::AppState;

#[derive(Debug, Serialize)]
pub struct HealthResponse {
    pub status: &'static str,
    pub version: &'static str,
    pub service: &'static str,
    /// Per-model attempt counters since startup.
    pub usage: BTreeMap<String, ModelUsage>,
}

/// GET /health
pub async fn health_handler(State(state): State<AppState>) -> Json<HealthResponse> {
    Json(HealthResponse {
        status: "ok",
        version: env!("CARGO_PKG_VERSION"),
        service: env!("CARGO_PKG_NAME"),
        usage: state.llm.usage().snapshot(),
    })
}
