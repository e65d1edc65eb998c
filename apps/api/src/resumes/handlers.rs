//! Axum route handlers for stored resumes.

use axum::{
    extract::{Multipart, Path, Query, State},
    Json,
};
use chrono::{DateTime, Utc};
use serde::{Deserialize, Serialize};
use tracing::info;
use uuid::Uuid;

use crate::auth::{AuthUser, MaybeUser};
use crate::billing::entitlement;
use crate::errors::AppError;
use crate::models::resume::{ResumeRow, ResumeSummaryRow};
use crate::obfuscation::{obfuscate, reconstruct, FreeReveal};
use crate::resumes::repository::{self, TailoredResume};
use crate::resumes::upload::{read_upload, UploadKind};
use crate::scoring::{improvement_metrics, match_score, ImprovementMetrics, MatchScore};
use crate::state::AppState;
use crate::tools::{prepare_job_description, require_text, MIN_RESUME_CHARS};

const MAX_FEEDBACK_COMMENT_CHARS: usize = 2000;

// ────────────────────────────────────────────────────────────────────────────
// Request / Response types
// ────────────────────────────────────────────────────────────────────────────

#[derive(Debug, Serialize)]
#[serde(rename_all = "camelCase")]
pub struct ParseResponse {
    pub text: String,
    pub file_name: Option<String>,
    pub file_type: &'static str,
    pub characters: usize,
}

#[derive(Debug, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct SaveRequest {
    #[serde(default)]
    pub original: String,
    #[serde(default)]
    pub tailored: String,
    #[serde(default)]
    pub job_description: String,
    pub job_title: Option<String>,
    pub user_id: Option<Uuid>,
}

#[derive(Debug, Serialize)]
#[serde(rename_all = "camelCase")]
pub struct SaveResponse {
    pub resume_id: Uuid,
    pub match_score: MatchScore,
}

#[derive(Debug, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct LinkRequest {
    #[serde(default)]
    pub session_id: String,
}

#[derive(Debug, Serialize)]
pub struct LinkResponse {
    pub linked: u64,
}

/// Anonymous callers prove ownership with their session id.
#[derive(Debug, Default, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct SessionQuery {
    pub session_id: Option<String>,
}

#[derive(Debug, Serialize)]
pub struct ResumeListResponse {
    pub resumes: Vec<ResumeSummaryRow>,
}

#[derive(Debug, Serialize)]
pub struct VersionsResponse {
    pub versions: Vec<ResumeSummaryRow>,
}

#[derive(Debug, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct FeedbackRequest {
    pub rating: i16,
    pub comment: Option<String>,
    pub session_id: Option<String>,
}

#[derive(Debug, Serialize)]
pub struct FeedbackResponse {
    pub saved: bool,
}

/// What the client may see of one resume. Locked resumes carry only the
/// obfuscated text and the free reveal.
#[derive(Debug, Serialize)]
#[serde(rename_all = "camelCase")]
pub struct ResumeView {
    pub id: Uuid,
    pub is_unlocked: bool,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub tailored_resume: Option<String>,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub original_resume: Option<String>,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub obfuscated_resume: Option<String>,
    pub free_reveal: Option<FreeReveal>,
    pub job_title: Option<String>,
    pub match_score: Option<MatchScore>,
    pub improvements: Option<ImprovementMetrics>,
    pub model_used: Option<String>,
    pub version_number: i32,
    pub parent_resume_id: Option<Uuid>,
    pub root_resume_id: Uuid,
    pub feedback_rating: Option<i16>,
    pub created_at: DateTime<Utc>,
    pub updated_at: DateTime<Utc>,
}

#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize)]
#[serde(rename_all = "snake_case")]
pub enum UnlockMethod {
    AlreadyUnlocked,
    Entitlement,
    FreeCredit,
}

#[derive(Debug, Serialize)]
#[serde(rename_all = "camelCase")]
pub struct UnlockResponse {
    pub unlocked_via: UnlockMethod,
    pub resume: ResumeView,
}

// ────────────────────────────────────────────────────────────────────────────
// Handlers
// ────────────────────────────────────────────────────────────────────────────

/// POST /api/resumes/parse (multipart, field `file`)
pub async fn handle_parse(multipart: Multipart) -> Result<Json<ParseResponse>, AppError> {
    let upload = read_upload(multipart).await?;
    Ok(Json(ParseResponse {
        characters: upload.text.chars().count(),
        file_type: match upload.kind {
            UploadKind::Pdf => "pdf",
            UploadKind::PlainText => "text",
        },
        file_name: upload.file_name,
        text: upload.text,
    }))
}

/// POST /api/resumes/save
pub async fn handle_save(
    State(state): State<AppState>,
    user: AuthUser,
    Json(request): Json<SaveRequest>,
) -> Result<Json<SaveResponse>, AppError> {
    user.ensure_same_user(request.user_id)?;
    let original = require_text("Original resume", &request.original, MIN_RESUME_CHARS)?;
    let tailored = require_text("Tailored resume", &request.tailored, MIN_RESUME_CHARS)?;
    let job_description = prepare_job_description(&request.job_description);

    let score = MatchScore {
        before: match_score(original, &job_description),
        after: match_score(tailored, &job_description),
    };
    let metrics = improvement_metrics(original, tailored, tailored, &job_description);
    let obfuscated = obfuscate(original, tailored);
    let job_title = request
        .job_title
        .as_deref()
        .map(str::trim)
        .filter(|t| !t.is_empty());

    let row = repository::insert_saved(
        &state.db,
        user.id,
        &TailoredResume {
            original,
            tailored,
            obfuscated: &obfuscated,
            job_description: &job_description,
            job_title,
            match_score: score,
            metrics: &metrics,
            model_used: None,
        },
    )
    .await?;

    Ok(Json(SaveResponse {
        resume_id: row.id,
        match_score: score,
    }))
}

/// POST /api/resumes/link
pub async fn handle_link(
    State(state): State<AppState>,
    user: AuthUser,
    Json(request): Json<LinkRequest>,
) -> Result<Json<LinkResponse>, AppError> {
    let session_id = request.session_id.trim();
    if session_id.is_empty() {
        return Err(AppError::Validation("sessionId is required".to_string()));
    }
    let linked = repository::link_session_to_user(&state.db, session_id, user.id).await?;
    Ok(Json(LinkResponse { linked }))
}

/// GET /api/resumes
pub async fn handle_list(
    State(state): State<AppState>,
    MaybeUser(user): MaybeUser,
    Query(query): Query<SessionQuery>,
) -> Result<Json<ResumeListResponse>, AppError> {
    let resumes = match (user, non_blank(query.session_id.as_deref())) {
        (Some(user), _) => repository::list_for_user(&state.db, user.id).await?,
        (None, Some(session_id)) => repository::list_for_session(&state.db, session_id).await?,
        (None, None) => {
            return Err(AppError::Unauthorized(
                "Sign in or provide a sessionId".to_string(),
            ))
        }
    };
    Ok(Json(ResumeListResponse { resumes }))
}

/// GET /api/resumes/:id
pub async fn handle_get(
    State(state): State<AppState>,
    MaybeUser(user): MaybeUser,
    Path(id): Path<Uuid>,
    Query(query): Query<SessionQuery>,
) -> Result<Json<ResumeView>, AppError> {
    let row = owned_resume(&state, id, user.as_ref(), query.session_id.as_deref()).await?;
    Ok(Json(resume_view(row)?))
}

/// GET /api/resumes/:id/versions
pub async fn handle_versions(
    State(state): State<AppState>,
    MaybeUser(user): MaybeUser,
    Path(id): Path<Uuid>,
    Query(query): Query<SessionQuery>,
) -> Result<Json<VersionsResponse>, AppError> {
    let row = owned_resume(&state, id, user.as_ref(), query.session_id.as_deref()).await?;
    let versions = repository::version_chain(&state.db, row.chain_root()).await?;
    Ok(Json(VersionsResponse { versions }))
}

/// POST /api/resumes/:id/feedback
pub async fn handle_feedback(
    State(state): State<AppState>,
    MaybeUser(user): MaybeUser,
    Path(id): Path<Uuid>,
    Json(request): Json<FeedbackRequest>,
) -> Result<Json<FeedbackResponse>, AppError> {
    let comment = validate_feedback(request.rating, request.comment.as_deref())?;
    owned_resume(&state, id, user.as_ref(), request.session_id.as_deref()).await?;
    repository::save_feedback(&state.db, id, request.rating, comment).await?;
    info!("Stored {}-star feedback for resume {id}", request.rating);
    Ok(Json(FeedbackResponse { saved: true }))
}

/// POST /api/resumes/:id/unlock
///
/// An active tier window unlocks for free; otherwise one free-resume credit
/// is spent. Unlocking twice never spends a second credit.
pub async fn handle_unlock(
    State(state): State<AppState>,
    user: AuthUser,
    Path(id): Path<Uuid>,
    Query(query): Query<SessionQuery>,
) -> Result<Json<UnlockResponse>, AppError> {
    let row = owned_resume(&state, id, Some(&user), query.session_id.as_deref()).await?;
    if row.is_unlocked {
        return Ok(Json(UnlockResponse {
            unlocked_via: UnlockMethod::AlreadyUnlocked,
            resume: resume_view(row)?,
        }));
    }

    // The flag flips first so a concurrent unlock finds nothing to do.
    let mut tx = state.db.begin().await?;
    let method = if !repository::mark_unlocked(&mut *tx, id).await? {
        UnlockMethod::AlreadyUnlocked
    } else if entitlement::active_entitlement(&state.db, user.id).await?.is_some() {
        UnlockMethod::Entitlement
    } else if entitlement::consume_free_credit(&mut *tx, user.id, state.config.free_resume_limit)
        .await?
    {
        UnlockMethod::FreeCredit
    } else {
        tx.rollback().await?;
        return Err(AppError::Forbidden(
            "No active access pass or free resumes remaining".to_string(),
        ));
    };
    tx.commit().await?;
    info!("Unlocked resume {id} for user {} via {method:?}", user.id);

    let row = repository::find_resume(&state.db, id)
        .await?
        .ok_or_else(|| AppError::NotFound(format!("Resume {id} not found")))?;
    Ok(Json(UnlockResponse {
        unlocked_via: method,
        resume: resume_view(row)?,
    }))
}

// ────────────────────────────────────────────────────────────────────────────
// Helpers
// ────────────────────────────────────────────────────────────────────────────

async fn owned_resume(
    state: &AppState,
    id: Uuid,
    user: Option<&AuthUser>,
    session_id: Option<&str>,
) -> Result<ResumeRow, AppError> {
    let row = repository::find_resume(&state.db, id)
        .await?
        .ok_or_else(|| AppError::NotFound(format!("Resume {id} not found")))?;
    if !row.is_owned_by(user.map(|u| u.id), non_blank(session_id)) {
        return Err(AppError::Forbidden(
            "You do not have access to this resume".to_string(),
        ));
    }
    Ok(row)
}

fn non_blank(value: Option<&str>) -> Option<&str> {
    value.map(str::trim).filter(|v| !v.is_empty())
}

/// Returns the trimmed comment, `None` when blank.
fn validate_feedback(rating: i16, comment: Option<&str>) -> Result<Option<&str>, AppError> {
    if !(1..=5).contains(&rating) {
        return Err(AppError::Validation("Rating must be between 1 and 5".to_string()));
    }
    let comment = non_blank(comment);
    if comment.is_some_and(|c| c.chars().count() > MAX_FEEDBACK_COMMENT_CHARS) {
        return Err(AppError::Validation(format!(
            "Comment is too long (maximum {MAX_FEEDBACK_COMMENT_CHARS} characters)"
        )));
    }
    Ok(comment)
}

/// Unlocked rows are rebuilt from the stored obfuscation, which also checks
/// the content map is intact.
pub fn resume_view(row: ResumeRow) -> Result<ResumeView, AppError> {
    let root_resume_id = row.chain_root();
    let (tailored_resume, original_resume, obfuscated_resume) = if row.is_unlocked {
        let tailored = reconstruct(&row.obfuscated_content, &row.content_map.0)?;
        (Some(tailored), Some(row.original_content), None)
    } else {
        (None, None, Some(row.obfuscated_content))
    };

    Ok(ResumeView {
        id: row.id,
        is_unlocked: row.is_unlocked,
        tailored_resume,
        original_resume,
        obfuscated_resume,
        free_reveal: row.free_reveal.map(|r| r.0),
        job_title: row.job_title,
        match_score: row.match_score.map(|m| m.0),
        improvements: row.improvement_metrics.map(|m| m.0),
        model_used: row.model_used,
        version_number: row.version_number,
        parent_resume_id: row.parent_resume_id,
        root_resume_id,
        feedback_rating: row.feedback_rating,
        created_at: row.created_at,
        updated_at: row.updated_at,
    })
}
