//! Resume persistence.
//!
//! Versioning: a tailor run with a parent inserts a new row in the parent's
//! chain (`root_resume_id` = the chain's first row). A run without a parent
//! re-uses the session's latest root row, updating it in place.

use sqlx::types::Json;
use sqlx::{PgConnection, PgPool};
use tracing::info;
use uuid::Uuid;

use crate::models::resume::{ResumeRow, ResumeSummaryRow};
use crate::obfuscation::ObfuscatedResume;
use crate::scoring::{ImprovementMetrics, MatchScore};

/// Who a resume belongs to. At least one of the two is set.
#[derive(Debug, Clone, Default)]
pub struct Owner {
    pub user_id: Option<Uuid>,
    pub session_id: Option<String>,
}

/// Everything a tailor run produces that gets stored.
pub struct TailoredResume<'a> {
    pub original: &'a str,
    pub tailored: &'a str,
    pub obfuscated: &'a ObfuscatedResume,
    pub job_description: &'a str,
    pub job_title: Option<&'a str>,
    pub match_score: MatchScore,
    pub metrics: &'a ImprovementMetrics,
    pub model_used: Option<&'a str>,
}

const RESUME_COLUMNS: &str = "id, user_id, session_id, original_content, tailored_content, \
    obfuscated_content, content_map, free_reveal, job_description, job_title, match_score, \
    improvement_metrics, model_used, is_unlocked, unlocked_at, feedback_rating, feedback_comment, \
    parent_resume_id, root_resume_id, version_number, created_at, updated_at";

const SUMMARY_COLUMNS: &str =
    "id, job_title, match_score, is_unlocked, version_number, root_resume_id, created_at, updated_at";

pub async fn find_resume(pool: &PgPool, id: Uuid) -> Result<Option<ResumeRow>, sqlx::Error> {
    sqlx::query_as::<_, ResumeRow>(&format!("SELECT {RESUME_COLUMNS} FROM resumes WHERE id = $1"))
        .bind(id)
        .fetch_optional(pool)
        .await
}

/// Stores a tailor run according to the versioning rules.
pub async fn persist_tailoring(
    pool: &PgPool,
    owner: &Owner,
    parent: Option<&ResumeRow>,
    resume: &TailoredResume<'_>,
) -> Result<ResumeRow, sqlx::Error> {
    if let Some(parent) = parent {
        return insert_version(pool, owner, parent, resume).await;
    }

    if let Some(session_id) = owner.session_id.as_deref() {
        if let Some(existing) = latest_session_root(pool, session_id, owner.user_id).await? {
            return update_in_place(pool, existing.id, owner, resume).await;
        }
    }

    insert_root(pool, owner, resume).await
}

async fn latest_session_root(
    pool: &PgPool,
    session_id: &str,
    user_id: Option<Uuid>,
) -> Result<Option<ResumeRow>, sqlx::Error> {
    sqlx::query_as::<_, ResumeRow>(&format!(
        "SELECT {RESUME_COLUMNS} FROM resumes \
         WHERE session_id = $1 AND parent_resume_id IS NULL \
           AND (user_id IS NULL OR user_id = $2) \
         ORDER BY created_at DESC LIMIT 1"
    ))
    .bind(session_id)
    .bind(user_id)
    .fetch_optional(pool)
    .await
}

async fn insert_root(
    pool: &PgPool,
    owner: &Owner,
    resume: &TailoredResume<'_>,
) -> Result<ResumeRow, sqlx::Error> {
    let row = bind_content(
        sqlx::query_as::<_, ResumeRow>(&format!(
            "INSERT INTO resumes \
                (user_id, session_id, original_content, tailored_content, obfuscated_content, \
                 content_map, free_reveal, job_description, job_title, match_score, \
                 improvement_metrics, model_used, version_number) \
             VALUES ($1, $2, $3, $4, $5, $6, $7, $8, $9, $10, $11, $12, 1) \
             RETURNING {RESUME_COLUMNS}"
        ))
        .bind(owner.user_id)
        .bind(owner.session_id.as_deref()),
        resume,
    )
    .fetch_one(pool)
    .await?;

    info!("Created resume {}", row.id);
    Ok(row)
}

async fn insert_version(
    pool: &PgPool,
    owner: &Owner,
    parent: &ResumeRow,
    resume: &TailoredResume<'_>,
) -> Result<ResumeRow, sqlx::Error> {
    let root = parent.chain_root();
    let row = bind_content(
        sqlx::query_as::<_, ResumeRow>(&format!(
            "INSERT INTO resumes \
                (user_id, session_id, original_content, tailored_content, obfuscated_content, \
                 content_map, free_reveal, job_description, job_title, match_score, \
                 improvement_metrics, model_used, parent_resume_id, root_resume_id, version_number) \
             VALUES ($1, $2, $3, $4, $5, $6, $7, $8, $9, $10, $11, $12, $13, $14, \
                 (SELECT COALESCE(MAX(version_number), 1) + 1 FROM resumes \
                  WHERE id = $14 OR root_resume_id = $14)) \
             RETURNING {RESUME_COLUMNS}"
        ))
        .bind(owner.user_id.or(parent.user_id))
        .bind(owner.session_id.as_deref().or(parent.session_id.as_deref())),
        resume,
    )
    .bind(parent.id)
    .bind(root)
    .fetch_one(pool)
    .await?;

    info!(
        "Created resume {} as version {} of {root}",
        row.id, row.version_number
    );
    Ok(row)
}

async fn update_in_place(
    pool: &PgPool,
    id: Uuid,
    owner: &Owner,
    resume: &TailoredResume<'_>,
) -> Result<ResumeRow, sqlx::Error> {
    let row = sqlx::query_as::<_, ResumeRow>(&format!(
        "UPDATE resumes SET \
            original_content = $2, tailored_content = $3, obfuscated_content = $4, \
            content_map = $5, free_reveal = $6, job_description = $7, job_title = $8, \
            match_score = $9, improvement_metrics = $10, model_used = $11, \
            user_id = COALESCE(user_id, $12), is_unlocked = FALSE, unlocked_at = NULL, \
            updated_at = NOW() \
         WHERE id = $1 \
         RETURNING {RESUME_COLUMNS}"
    ))
    .bind(id)
    .bind(resume.original)
    .bind(resume.tailored)
    .bind(&resume.obfuscated.obfuscated_resume)
    .bind(Json(&resume.obfuscated.content_map))
    .bind(resume.obfuscated.free_reveal.as_ref().map(Json))
    .bind(resume.job_description)
    .bind(resume.job_title)
    .bind(Json(resume.match_score))
    .bind(Json(resume.metrics))
    .bind(resume.model_used)
    .bind(owner.user_id)
    .fetch_one(pool)
    .await?;

    info!("Updated resume {id} in place");
    Ok(row)
}

/// Binds parameters $3..=$12 shared by both INSERT forms.
fn bind_content<'q>(
    query: sqlx::query::QueryAs<'q, sqlx::Postgres, ResumeRow, sqlx::postgres::PgArguments>,
    resume: &'q TailoredResume<'q>,
) -> sqlx::query::QueryAs<'q, sqlx::Postgres, ResumeRow, sqlx::postgres::PgArguments> {
    query
        .bind(resume.original)
        .bind(resume.tailored)
        .bind(&resume.obfuscated.obfuscated_resume)
        .bind(Json(&resume.obfuscated.content_map))
        .bind(resume.obfuscated.free_reveal.as_ref().map(Json))
        .bind(resume.job_description)
        .bind(resume.job_title)
        .bind(Json(resume.match_score))
        .bind(Json(resume.metrics))
        .bind(resume.model_used)
}

/// Inserts a client-supplied original/tailored pair as a new root row.
pub async fn insert_saved(
    pool: &PgPool,
    user_id: Uuid,
    resume: &TailoredResume<'_>,
) -> Result<ResumeRow, sqlx::Error> {
    let owner = Owner {
        user_id: Some(user_id),
        session_id: None,
    };
    insert_root(pool, &owner, resume).await
}

pub async fn list_for_user(pool: &PgPool, user_id: Uuid) -> Result<Vec<ResumeSummaryRow>, sqlx::Error> {
    sqlx::query_as::<_, ResumeSummaryRow>(&format!(
        "SELECT {SUMMARY_COLUMNS} FROM resumes WHERE user_id = $1 ORDER BY created_at DESC"
    ))
    .bind(user_id)
    .fetch_all(pool)
    .await
}

pub async fn list_for_session(
    pool: &PgPool,
    session_id: &str,
) -> Result<Vec<ResumeSummaryRow>, sqlx::Error> {
    sqlx::query_as::<_, ResumeSummaryRow>(&format!(
        "SELECT {SUMMARY_COLUMNS} FROM resumes WHERE session_id = $1 ORDER BY created_at DESC"
    ))
    .bind(session_id)
    .fetch_all(pool)
    .await
}

/// All versions sharing `root`, oldest first.
pub async fn version_chain(pool: &PgPool, root: Uuid) -> Result<Vec<ResumeSummaryRow>, sqlx::Error> {
    sqlx::query_as::<_, ResumeSummaryRow>(&format!(
        "SELECT {SUMMARY_COLUMNS} FROM resumes \
         WHERE id = $1 OR root_resume_id = $1 \
         ORDER BY version_number ASC, created_at ASC"
    ))
    .bind(root)
    .fetch_all(pool)
    .await
}

/// Claims anonymous-session resumes for a signed-in user. Returns rows linked.
pub async fn link_session_to_user(
    pool: &PgPool,
    session_id: &str,
    user_id: Uuid,
) -> Result<u64, sqlx::Error> {
    let result = sqlx::query(
        "UPDATE resumes SET user_id = $2, updated_at = NOW() \
         WHERE session_id = $1 AND user_id IS NULL",
    )
    .bind(session_id)
    .bind(user_id)
    .execute(pool)
    .await?;

    info!(
        "Linked {} resume(s) from session {session_id} to user {user_id}",
        result.rows_affected()
    );
    Ok(result.rows_affected())
}

pub async fn save_feedback(
    pool: &PgPool,
    id: Uuid,
    rating: i16,
    comment: Option<&str>,
) -> Result<(), sqlx::Error> {
    sqlx::query(
        "UPDATE resumes SET feedback_rating = $2, feedback_comment = $3, updated_at = NOW() \
         WHERE id = $1",
    )
    .bind(id)
    .bind(rating)
    .bind(comment)
    .execute(pool)
    .await?;
    Ok(())
}

/// Only flips a locked row, so concurrent unlocks serialise on the row lock.
const MARK_UNLOCKED_SQL: &str =
    "UPDATE resumes SET is_unlocked = TRUE, unlocked_at = NOW(), updated_at = NOW() \
     WHERE id = $1 AND is_unlocked = FALSE";

/// Sets the unlock flag. Returns false when the resume was already unlocked.
pub async fn mark_unlocked(conn: &mut PgConnection, id: Uuid) -> Result<bool, sqlx::Error> {
    let result = sqlx::query(MARK_UNLOCKED_SQL)
        .bind(id)
        .execute(conn)
        .await?;
    Ok(result.rows_affected() == 1)
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_mark_unlocked_only_flips_locked_rows() {
        assert!(MARK_UNLOCKED_SQL.contains("WHERE id = $1 AND is_unlocked = FALSE"));
    }
}
