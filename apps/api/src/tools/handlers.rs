//! Axum route handlers for the analysis tools and the diff view.

use axum::{extract::State, Json};
use serde::{Deserialize, Serialize};

use crate::errors::AppError;
use crate::state::AppState;
use crate::text::diff::{diff_stats, diff_texts, DiffChunk, DiffStats};
use crate::text::job_description::{clean_job_description, trim_job_description_to_role_content};
use crate::tools::ats_check::{self, AtsCheckRequest, AtsCheckResult};
use crate::tools::interview_prep::{self, InterviewPrepRequest, InterviewPrepResult};
use crate::tools::keywords::{self, KeywordsRequest, KeywordsResult};
use crate::tools::relevancy::{self, RelevancyRequest, RelevancyResult};
use crate::tools::skills_gap::{self, SkillsGapRequest, SkillsGapResult};
use crate::tools::validate::{self, ValidateRequest, ValidateResult};
use crate::tools::{ToolResponse, MAX_INPUT_CHARS};

// ────────────────────────────────────────────────────────────────────────────
// Request / Response types
// ────────────────────────────────────────────────────────────────────────────

#[derive(Debug, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct CleanJdRequest {
    #[serde(default)]
    pub job_description: String,
    pub max_length: Option<usize>,
}

#[derive(Debug, Serialize)]
#[serde(rename_all = "camelCase")]
pub struct CleanJdResponse {
    pub cleaned: String,
    pub trimmed: String,
    pub original_length: usize,
    pub cleaned_length: usize,
}

#[derive(Debug, Deserialize)]
pub struct DiffRequest {
    #[serde(default)]
    pub original: String,
    #[serde(default)]
    pub tailored: String,
}

#[derive(Debug, Serialize)]
pub struct DiffResponse {
    pub chunks: Vec<DiffChunk>,
    pub stats: DiffStats,
}

// ────────────────────────────────────────────────────────────────────────────
// LLM-backed tools
// ────────────────────────────────────────────────────────────────────────────

/// POST /api/tools/keywords
pub async fn handle_keywords(
    State(state): State<AppState>,
    Json(request): Json<KeywordsRequest>,
) -> Result<Json<ToolResponse<KeywordsResult>>, AppError> {
    Ok(Json(keywords::run(&state, &request).await?))
}

/// POST /api/tools/skills-gap
pub async fn handle_skills_gap(
    State(state): State<AppState>,
    Json(request): Json<SkillsGapRequest>,
) -> Result<Json<ToolResponse<SkillsGapResult>>, AppError> {
    Ok(Json(skills_gap::run(&state, &request).await?))
}

/// POST /api/tools/relevancy
pub async fn handle_relevancy(
    State(state): State<AppState>,
    Json(request): Json<RelevancyRequest>,
) -> Result<Json<ToolResponse<RelevancyResult>>, AppError> {
    Ok(Json(relevancy::run(&state, &request).await?))
}

/// POST /api/tools/ats-check
pub async fn handle_ats_check(
    State(state): State<AppState>,
    Json(request): Json<AtsCheckRequest>,
) -> Result<Json<ToolResponse<AtsCheckResult>>, AppError> {
    Ok(Json(ats_check::run(&state, &request).await?))
}

/// POST /api/tools/interview-prep
pub async fn handle_interview_prep(
    State(state): State<AppState>,
    Json(request): Json<InterviewPrepRequest>,
) -> Result<Json<ToolResponse<InterviewPrepResult>>, AppError> {
    Ok(Json(interview_prep::run(&state, &request).await?))
}

/// POST /api/tools/validate
pub async fn handle_validate(
    State(state): State<AppState>,
    Json(request): Json<ValidateRequest>,
) -> Result<Json<ToolResponse<ValidateResult>>, AppError> {
    Ok(Json(validate::run(&state, &request).await?))
}

// ────────────────────────────────────────────────────────────────────────────
// Deterministic tools
// ────────────────────────────────────────────────────────────────────────────

/// POST /api/tools/clean-jd
///
/// Preview of what the LLM tools will actually see.
pub async fn handle_clean_jd(
    Json(request): Json<CleanJdRequest>,
) -> Result<Json<CleanJdResponse>, AppError> {
    Ok(Json(clean_jd(&request)?))
}

/// POST /api/diff
pub async fn handle_diff(Json(request): Json<DiffRequest>) -> Result<Json<DiffResponse>, AppError> {
    Ok(Json(diff(&request)?))
}

fn clean_jd(request: &CleanJdRequest) -> Result<CleanJdResponse, AppError> {
    if request.job_description.trim().is_empty() {
        return Err(AppError::Validation("Job description is required".to_string()));
    }
    let cleaned = clean_job_description(&request.job_description, request.max_length);
    let trimmed = trim_job_description_to_role_content(&cleaned);
    Ok(CleanJdResponse {
        original_length: request.job_description.chars().count(),
        cleaned_length: cleaned.chars().count(),
        cleaned,
        trimmed,
    })
}

fn diff(request: &DiffRequest) -> Result<DiffResponse, AppError> {
    for (field, text) in [("original", &request.original), ("tailored", &request.tailored)] {
        if text.chars().count() > MAX_INPUT_CHARS {
            return Err(AppError::Validation(format!(
                "{field} is too long (maximum {MAX_INPUT_CHARS} characters)"
            )));
        }
    }
    let chunks = diff_texts(&request.original, &request.tailored);
    let stats = diff_stats(&chunks);
    Ok(DiffResponse { chunks, stats })
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_clean_jd_reports_lengths() {
        let request = CleanJdRequest {
            job_description: "<p>Build&nbsp;APIs</p>".to_string(),
            max_length: None,
        };
        let response = clean_jd(&request).unwrap();
        assert!(!response.cleaned.contains('<'));
        assert!(response.cleaned_length < response.original_length);
    }

    #[test]
    fn test_clean_jd_rejects_blank() {
        let request = CleanJdRequest {
            job_description: "  ".to_string(),
            max_length: None,
        };
        assert!(matches!(clean_jd(&request), Err(AppError::Validation(_))));
    }

    #[test]
    fn test_diff_reports_word_stats() {
        let request = DiffRequest {
            original: "Led a team of five".to_string(),
            tailored: "Led a team of eight".to_string(),
        };
        let response = diff(&request).unwrap();
        assert_eq!(response.stats.words_added, 1);
        assert_eq!(response.stats.words_removed, 1);
        let json = serde_json::to_value(&response).unwrap();
        assert_eq!(json["stats"]["wordsAdded"], 1);
    }
}
