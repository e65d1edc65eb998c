use serde::{Deserialize, Serialize};

use crate::errors::AppError;
use crate::llm_client::prompts::{fenced, NO_FABRICATION_INSTRUCTION};
use crate::scoring::{extract_keywords, keyword_coverage};
use crate::state::AppState;
use crate::tools::prompts::{ANALYST_SYSTEM, SKILLS_GAP_PROMPT_TEMPLATE};
use crate::tools::{
    dedupe_terms, lenient_score, prepare_job_description, require_text, run_structured,
    ModelChoice, ToolCall, ToolResponse, MIN_JOB_DESCRIPTION_CHARS, MIN_RESUME_CHARS,
};

#[derive(Debug, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct SkillsGapRequest {
    #[serde(default)]
    pub resume: String,
    #[serde(default)]
    pub job_description: String,
    #[serde(flatten)]
    pub choice: ModelChoice,
}

#[derive(Debug, Clone, Default, PartialEq, Serialize, Deserialize)]
#[serde(default)]
pub struct PartialSkill {
    pub skill: String,
    pub note: String,
}

#[derive(Debug, Clone, Default, PartialEq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase", default)]
pub struct SkillsGapResult {
    pub matching_skills: Vec<String>,
    pub missing_skills: Vec<String>,
    pub partial_skills: Vec<PartialSkill>,
    pub recommendations: Vec<String>,
    #[serde(deserialize_with = "lenient_score")]
    pub score: u32,
}

impl SkillsGapResult {
    fn normalized(mut self) -> Self {
        self.matching_skills = dedupe_terms(self.matching_skills);
        self.missing_skills = dedupe_terms(self.missing_skills);
        self.recommendations = dedupe_terms(self.recommendations);
        self.partial_skills.retain(|p| !p.skill.trim().is_empty());
        self
    }
}

/// Keyword coverage stands in for skill matching.
pub fn fallback(resume: &str, job_description: &str) -> SkillsGapResult {
    let coverage = keyword_coverage(resume, &extract_keywords(job_description));
    SkillsGapResult {
        matching_skills: coverage.matched,
        missing_skills: coverage.missing,
        score: coverage.score,
        ..Default::default()
    }
}

pub fn build_prompt(resume: &str, job_description: &str) -> String {
    SKILLS_GAP_PROMPT_TEMPLATE
        .replace("{no_fabrication}", NO_FABRICATION_INSTRUCTION)
        .replace("{resume}", &fenced("resume", resume))
        .replace("{job_description}", &fenced("job_description", job_description))
}

pub async fn run(
    state: &AppState,
    req: &SkillsGapRequest,
) -> Result<ToolResponse<SkillsGapResult>, AppError> {
    let resume = require_text("Resume", &req.resume, MIN_RESUME_CHARS)?;
    let raw = require_text("Job description", &req.job_description, MIN_JOB_DESCRIPTION_CHARS)?;
    let jd = prepare_job_description(raw);

    let mut response = run_structured(
        state,
        ToolCall {
            endpoint: "skills-gap",
            cache_inputs: vec![resume, jd.as_str()],
            system: ANALYST_SYSTEM,
            prompt: build_prompt(resume, &jd),
            choice: &req.choice,
        },
        || fallback(resume, &jd),
    )
    .await?;
    response.data = response.data.normalized();
    Ok(response)
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_fallback_splits_matched_and_missing() {
        let result = fallback(
            "Built Rust services on PostgreSQL.",
            "Rust engineer. Rust and PostgreSQL and Kafka.",
        );
        assert!(result.matching_skills.contains(&"rust".to_string()));
        assert!(result.missing_skills.contains(&"kafka".to_string()));
        assert!(result.score > 0 && result.score < 100, "score {}", result.score);
    }

    #[test]
    fn test_string_score_is_clamped() {
        let result: SkillsGapResult =
            serde_json::from_str(r#"{"score": "120%", "partialSkills": [{"skill": ""}, {"skill": "K8s"}]}"#)
                .unwrap();
        let result = result.normalized();
        assert_eq!(result.score, 100);
        assert_eq!(result.partial_skills.len(), 1);
        assert_eq!(result.partial_skills[0].note, "");
    }

    #[test]
    fn test_prompt_fences_inputs() {
        let prompt = build_prompt("my resume", "the job");
        assert!(prompt.contains("<resume>\nmy resume\n</resume>"));
        assert!(prompt.contains("<job_description>\nthe job\n</job_description>"));
        assert!(!prompt.contains("{no_fabrication}"));
    }
}
