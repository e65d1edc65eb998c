use std::collections::BTreeMap;

use chrono::{DateTime, Utc};
use serde::Serialize;
use sqlx::types::Json;
use sqlx::FromRow;
use uuid::Uuid;

use crate::obfuscation::FreeReveal;
use crate::scoring::{ImprovementMetrics, MatchScore};

#[derive(Debug, Clone, FromRow)]
pub struct ResumeRow {
    pub id: Uuid,
    pub user_id: Option<Uuid>,
    pub session_id: Option<String>,
    pub original_content: String,
    pub tailored_content: String,
    pub obfuscated_content: String,
    pub content_map: Json<BTreeMap<String, String>>,
    pub free_reveal: Option<Json<FreeReveal>>,
    pub job_description: String,
    pub job_title: Option<String>,
    pub match_score: Option<Json<MatchScore>>,
    pub improvement_metrics: Option<Json<ImprovementMetrics>>,
    pub model_used: Option<String>,
    pub is_unlocked: bool,
    pub unlocked_at: Option<DateTime<Utc>>,
    pub feedback_rating: Option<i16>,
    pub feedback_comment: Option<String>,
    pub parent_resume_id: Option<Uuid>,
    pub root_resume_id: Option<Uuid>,
    pub version_number: i32,
    pub created_at: DateTime<Utc>,
    pub updated_at: DateTime<Utc>,
}

impl ResumeRow {
    /// Root of this row's version chain (itself for a first version).
    pub fn chain_root(&self) -> Uuid {
        self.root_resume_id.unwrap_or(self.id)
    }

    pub fn is_owned_by(&self, user_id: Option<Uuid>, session_id: Option<&str>) -> bool {
        let by_user = matches!((self.user_id, user_id), (Some(owner), Some(caller)) if owner == caller);
        let by_session = matches!(
            (self.session_id.as_deref(), session_id),
            (Some(owner), Some(caller)) if owner == caller
        );
        by_user || by_session
    }
}

/// List entry: no resume content.
#[derive(Debug, Clone, Serialize, FromRow)]
#[serde(rename_all = "camelCase")]
pub struct ResumeSummaryRow {
    pub id: Uuid,
    pub job_title: Option<String>,
    pub match_score: Option<Json<MatchScore>>,
    pub is_unlocked: bool,
    pub version_number: i32,
    pub root_resume_id: Option<Uuid>,
    pub created_at: DateTime<Utc>,
    pub updated_at: DateTime<Utc>,
}
