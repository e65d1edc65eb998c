pub mod health;

use axum::{
    extract::DefaultBodyLimit,
    middleware,
    routing::{get, post},
    Router,
};

use crate::billing::handlers as billing;
use crate::rate_limit::rate_limit_middleware;
use crate::resumes::handlers as resumes;
use crate::resumes::upload::UPLOAD_BODY_LIMIT;
use crate::state::AppState;
use crate::tailoring::handlers as tailoring;
use crate::tools::handlers as tools;

pub fn build_router(state: AppState) -> Router {
    Router::new()
        // Tailor API
        .route("/api/tailor", post(tailoring::handle_tailor))
        .route("/api/diff", post(tools::handle_diff))
        // Tools API
        .route("/api/tools/keywords", post(tools::handle_keywords))
        .route("/api/tools/skills-gap", post(tools::handle_skills_gap))
        .route("/api/tools/relevancy", post(tools::handle_relevancy))
        .route("/api/tools/ats-check", post(tools::handle_ats_check))
        .route("/api/tools/interview-prep", post(tools::handle_interview_prep))
        .route("/api/tools/validate", post(tools::handle_validate))
        .route("/api/tools/clean-jd", post(tools::handle_clean_jd))
        // Resume API
        .route(
            "/api/resumes/parse",
            post(resumes::handle_parse).layer(DefaultBodyLimit::max(UPLOAD_BODY_LIMIT)),
        )
        .route("/api/resumes/save", post(resumes::handle_save))
        .route("/api/resumes/link", post(resumes::handle_link))
        .route("/api/resumes", get(resumes::handle_list))
        .route("/api/resumes/:id", get(resumes::handle_get))
        .route("/api/resumes/:id/versions", get(resumes::handle_versions))
        .route("/api/resumes/:id/feedback", post(resumes::handle_feedback))
        .route("/api/resumes/:id/unlock", post(resumes::handle_unlock))
        // Billing API
        .route("/api/access", get(billing::handle_access))
        .route("/api/stripe/checkout", post(billing::handle_checkout))
        .route("/api/stripe/portal", post(billing::handle_portal))
        .route("/api/stripe/verify", post(billing::handle_verify))
        .route("/api/stripe/webhook", post(billing::handle_webhook))
        .route_layer(middleware::from_fn_with_state(
            state.clone(),
            rate_limit_middleware,
        ))
        // Outside the limiter.
        .route("/health", get(health::health_handler))
        .with_state(state)
}
