use serde::{Deserialize, Serialize};

use crate::errors::AppError;
use crate::llm_client::prompts::fenced;
use crate::scoring::match_score;
use crate::state::AppState;
use crate::tools::prompts::{ANALYST_SYSTEM, RELEVANCY_PROMPT_TEMPLATE};
use crate::tools::{
    dedupe_terms, lenient_score, prepare_job_description, require_text, run_structured,
    ModelChoice, ToolCall, ToolResponse, MIN_JOB_DESCRIPTION_CHARS, MIN_RESUME_CHARS,
};

#[derive(Debug, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct RelevancyRequest {
    #[serde(default)]
    pub resume: String,
    #[serde(default)]
    pub job_description: String,
    #[serde(flatten)]
    pub choice: ModelChoice,
}

#[derive(Debug, Clone, Default, PartialEq, Serialize, Deserialize)]
#[serde(default)]
pub struct RelevancyResult {
    #[serde(deserialize_with = "lenient_score")]
    pub score: u32,
    pub summary: String,
    pub strengths: Vec<String>,
    pub weaknesses: Vec<String>,
}

pub fn fallback(resume: &str, job_description: &str) -> RelevancyResult {
    RelevancyResult {
        score: match_score(resume, job_description),
        summary: "Estimated from keyword coverage of the job description.".to_string(),
        ..Default::default()
    }
}

pub fn build_prompt(resume: &str, job_description: &str) -> String {
    RELEVANCY_PROMPT_TEMPLATE
        .replace("{resume}", &fenced("resume", resume))
        .replace("{job_description}", &fenced("job_description", job_description))
}

pub async fn run(
    state: &AppState,
    req: &RelevancyRequest,
) -> Result<ToolResponse<RelevancyResult>, AppError> {
    let resume = require_text("Resume", &req.resume, MIN_RESUME_CHARS)?;
    let raw = require_text("Job description", &req.job_description, MIN_JOB_DESCRIPTION_CHARS)?;
    let jd = prepare_job_description(raw);

    let mut response = run_structured(
        state,
        ToolCall {
            endpoint: "relevancy",
            cache_inputs: vec![resume, jd.as_str()],
            system: ANALYST_SYSTEM,
            prompt: build_prompt(resume, &jd),
            choice: &req.choice,
        },
        || fallback(resume, &jd),
    )
    .await?;
    response.data.strengths = dedupe_terms(std::mem::take(&mut response.data.strengths));
    response.data.weaknesses = dedupe_terms(std::mem::take(&mut response.data.weaknesses));
    Ok(response)
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::text::json_extract::LlmParse;

    #[test]
    fn test_wrapped_answer_parses() {
        let text = "Here you go:\n```json\n{\"score\": \"78\", \"summary\": \"Good fit\"}\n```";
        let parsed = LlmParse::<RelevancyResult>::from_text(text);
        assert!(parsed.is_parsed());
        let result = parsed.or_fallback(RelevancyResult::default);
        assert_eq!(result.score, 78);
        assert_eq!(result.summary, "Good fit");
    }

    #[test]
    fn test_spelled_out_score_in_valid_json_is_kept() {
        let parsed = LlmParse::<RelevancyResult>::from_text(r#"{"score": "thirty", "summary": "ok"}"#);
        assert!(parsed.is_parsed());
        assert_eq!(parsed.or_fallback(RelevancyResult::default).score, 30);
    }

    #[test]
    fn test_fallback_scores_keyword_coverage() {
        let result = fallback("Rust and Kafka", "Rust Kafka");
        assert_eq!(result.score, 100);
        assert!(result.strengths.is_empty());
    }
}
