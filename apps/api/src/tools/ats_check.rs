//! ATS simulation: the model's judgement merged with the deterministic
//! formatting checks from the sanitizer.

use serde::{Deserialize, Serialize};

use crate::errors::AppError;
use crate::llm_client::prompts::fenced;
use crate::scoring::{extract_keywords, keyword_coverage};
use crate::state::AppState;
use crate::text::ats_sanitizer::detect_ats_issues;
use crate::tools::prompts::{ANALYST_SYSTEM, ATS_CHECK_PROMPT_TEMPLATE};
use crate::tools::{
    dedupe_terms, lenient_score, prepare_job_description, require_text, run_structured,
    ModelChoice, ToolCall, ToolResponse, MIN_JOB_DESCRIPTION_CHARS, MIN_RESUME_CHARS,
};

/// Points deducted from keyword coverage per formatting issue in the fallback score.
const FALLBACK_ISSUE_PENALTY: u32 = 10;

#[derive(Debug, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct AtsCheckRequest {
    #[serde(default)]
    pub resume: String,
    #[serde(default)]
    pub job_description: String,
    #[serde(flatten)]
    pub choice: ModelChoice,
}

#[derive(Debug, Clone, Default, PartialEq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase", default)]
pub struct AtsCheckResult {
    #[serde(deserialize_with = "lenient_score")]
    pub score: u32,
    pub issues: Vec<String>,
    pub suggestions: Vec<String>,
    pub keyword_matches: Vec<String>,
    pub missing_keywords: Vec<String>,
}

impl AtsCheckResult {
    /// Adds the formatting issues found locally; the model may have missed them.
    fn with_formatting_issues(mut self, formatting: Vec<String>) -> Self {
        let mut issues = formatting;
        issues.append(&mut self.issues);
        self.issues = dedupe_terms(issues);
        self.suggestions = dedupe_terms(self.suggestions);
        self.keyword_matches = dedupe_terms(self.keyword_matches);
        self.missing_keywords = dedupe_terms(self.missing_keywords);
        self
    }
}

pub fn fallback(resume: &str, job_description: &str) -> AtsCheckResult {
    let coverage = keyword_coverage(resume, &extract_keywords(job_description));
    let issue_count = detect_ats_issues(resume).len() as u32;
    AtsCheckResult {
        score: coverage
            .score
            .saturating_sub(issue_count * FALLBACK_ISSUE_PENALTY),
        keyword_matches: coverage.matched,
        missing_keywords: coverage.missing,
        ..Default::default()
    }
}

pub fn build_prompt(resume: &str, job_description: &str) -> String {
    ATS_CHECK_PROMPT_TEMPLATE
        .replace("{resume}", &fenced("resume", resume))
        .replace("{job_description}", &fenced("job_description", job_description))
}

pub async fn run(
    state: &AppState,
    req: &AtsCheckRequest,
) -> Result<ToolResponse<AtsCheckResult>, AppError> {
    let resume = require_text("Resume", &req.resume, MIN_RESUME_CHARS)?;
    let raw = require_text("Job description", &req.job_description, MIN_JOB_DESCRIPTION_CHARS)?;
    let jd = prepare_job_description(raw);

    let mut response = run_structured(
        state,
        ToolCall {
            endpoint: "ats-check",
            cache_inputs: vec![resume, jd.as_str()],
            system: ANALYST_SYSTEM,
            prompt: build_prompt(resume, &jd),
            choice: &req.choice,
        },
        || fallback(resume, &jd),
    )
    .await?;
    response.data = std::mem::take(&mut response.data).with_formatting_issues(detect_ats_issues(resume));
    Ok(response)
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_formatting_issues_merge_without_duplicates() {
        let model = AtsCheckResult {
            issues: vec![
                "Em/en dashes may be garbled by some ATS parsers".to_string(),
                "Dates use inconsistent formats".to_string(),
            ],
            ..Default::default()
        };
        let merged = model.with_formatting_issues(detect_ats_issues("Led work — shipped"));
        let dash_issues = merged.issues.iter().filter(|i| i.contains("dashes")).count();
        assert_eq!(dash_issues, 1, "issues: {:?}", merged.issues);
        assert!(merged.issues.contains(&"Dates use inconsistent formats".to_string()));
    }

    #[test]
    fn test_fallback_penalises_formatting_issues() {
        let jd = "Rust Kafka";
        let clean = "## Experience\nRust and Kafka\n## Education\nBSc\n## Skills\nRust";
        let messy = "• Rust — Kafka";
        assert!(fallback(clean, jd).score > fallback(messy, jd).score);
        assert_eq!(fallback(messy, jd).keyword_matches, vec!["rust", "kafka"]);
    }
}
