//! Axum route handlers for the Tailor API.

use axum::{extract::State, Json};
use serde::{Deserialize, Serialize};
use uuid::Uuid;

use crate::auth::MaybeUser;
use crate::errors::AppError;
use crate::obfuscation::FreeReveal;
use crate::resumes::repository::{self, Owner, TailoredResume};
use crate::scoring::{ImprovementMetrics, MatchScore};
use crate::state::AppState;
use crate::tailoring::pipeline::{tailor, TailorInput};
use crate::tools::ModelChoice;

// ────────────────────────────────────────────────────────────────────────────
// Request / Response types
// ────────────────────────────────────────────────────────────────────────────

#[derive(Debug, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct TailorRequest {
    #[serde(default)]
    pub resume: String,
    #[serde(default)]
    pub job_description: String,
    pub job_title: Option<String>,
    pub session_id: Option<String>,
    pub parent_resume_id: Option<Uuid>,
    #[serde(flatten)]
    pub choice: ModelChoice,
}

/// The locked view: the content map stays server-side until unlock.
#[derive(Debug, Serialize)]
#[serde(rename_all = "camelCase")]
pub struct TailorResponse {
    pub resume_id: Uuid,
    pub obfuscated_resume: String,
    pub free_reveal: Option<FreeReveal>,
    pub match_score: MatchScore,
    pub improvements: ImprovementMetrics,
    pub version_number: i32,
    pub root_resume_id: Uuid,
    pub model_used: String,
    pub is_unlocked: bool,
}

// ────────────────────────────────────────────────────────────────────────────
// Handlers
// ────────────────────────────────────────────────────────────────────────────

/// POST /api/tailor
pub async fn handle_tailor(
    State(state): State<AppState>,
    MaybeUser(user): MaybeUser,
    Json(request): Json<TailorRequest>,
) -> Result<Json<TailorResponse>, AppError> {
    let owner = request_owner(user.as_ref().map(|u| u.id), request.session_id.as_deref())?;

    let parent = match request.parent_resume_id {
        Some(parent_id) => {
            let parent = repository::find_resume(&state.db, parent_id)
                .await?
                .ok_or_else(|| AppError::NotFound(format!("Resume {parent_id} not found")))?;
            if !parent.is_owned_by(owner.user_id, owner.session_id.as_deref()) {
                return Err(AppError::Forbidden(
                    "Parent resume belongs to someone else".to_string(),
                ));
            }
            Some(parent)
        }
        None => None,
    };

    let outcome = tailor(
        &state,
        &TailorInput {
            resume: &request.resume,
            job_description: &request.job_description,
            job_title: request.job_title.as_deref(),
            choice: &request.choice,
        },
    )
    .await?;

    let row = repository::persist_tailoring(
        &state.db,
        &owner,
        parent.as_ref(),
        &TailoredResume {
            original: &outcome.original,
            tailored: &outcome.tailored,
            obfuscated: &outcome.obfuscated,
            job_description: &outcome.job_description,
            job_title: outcome.job_title.as_deref(),
            match_score: outcome.match_score,
            metrics: &outcome.metrics,
            model_used: Some(outcome.model_used.as_str()),
        },
    )
    .await?;

    Ok(Json(TailorResponse {
        resume_id: row.id,
        root_resume_id: row.chain_root(),
        obfuscated_resume: outcome.obfuscated.obfuscated_resume,
        free_reveal: outcome.obfuscated.free_reveal,
        match_score: outcome.match_score,
        improvements: outcome.metrics,
        version_number: row.version_number,
        model_used: outcome.model_used,
        is_unlocked: row.is_unlocked,
    }))
}

/// Anonymous callers must identify their session.
fn request_owner(user_id: Option<Uuid>, session_id: Option<&str>) -> Result<Owner, AppError> {
    let session_id = session_id
        .map(str::trim)
        .filter(|s| !s.is_empty())
        .map(str::to_string);
    if user_id.is_none() && session_id.is_none() {
        return Err(AppError::Validation(
            "sessionId is required when not signed in".to_string(),
        ));
    }
    Ok(Owner {
        user_id,
        session_id,
    })
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_request_owner_requires_identity() {
        assert!(matches!(
            request_owner(None, Some("  ")),
            Err(AppError::Validation(_))
        ));
        let owner = request_owner(None, Some(" sess-1 ")).unwrap();
        assert_eq!(owner.session_id.as_deref(), Some("sess-1"));

        let user = Uuid::new_v4();
        let owner = request_owner(Some(user), None).unwrap();
        assert_eq!(owner.user_id, Some(user));
        assert!(owner.session_id.is_none());
    }

    #[test]
    fn test_tailor_request_shape() {
        let request: TailorRequest = serde_json::from_str(
            r#"{"resume": "r", "jobDescription": "j", "sessionId": "s", "model": "anthropic:claude-3-5-haiku-latest"}"#,
        )
        .unwrap();
        assert_eq!(request.session_id.as_deref(), Some("s"));
        assert!(request.parent_resume_id.is_none());
        assert!(request.choice.model.is_some());
    }
}
