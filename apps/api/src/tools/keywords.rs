use serde::{Deserialize, Serialize};

use crate::errors::AppError;
use crate::state::AppState;
use crate::scoring::extract_keywords;
use crate::tools::prompts::{ANALYST_SYSTEM, KEYWORDS_PROMPT_TEMPLATE};
use crate::tools::{
    dedupe_terms, prepare_job_description, require_text, run_structured, ModelChoice, ToolCall,
    ToolResponse, MIN_JOB_DESCRIPTION_CHARS,
};

#[derive(Debug, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct KeywordsRequest {
    #[serde(default)]
    pub job_description: String,
    #[serde(flatten)]
    pub choice: ModelChoice,
}

#[derive(Debug, Clone, Default, PartialEq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase", default)]
pub struct KeywordsResult {
    pub hard_skills: Vec<String>,
    pub soft_skills: Vec<String>,
    pub tools: Vec<String>,
    pub certifications: Vec<String>,
    pub keywords: Vec<String>,
}

impl KeywordsResult {
    fn normalized(self) -> Self {
        Self {
            hard_skills: dedupe_terms(self.hard_skills),
            soft_skills: dedupe_terms(self.soft_skills),
            tools: dedupe_terms(self.tools),
            certifications: dedupe_terms(self.certifications),
            keywords: dedupe_terms(self.keywords),
        }
    }
}

/// Frequency-ranked JD terms, uncategorised.
pub fn fallback(job_description: &str) -> KeywordsResult {
    KeywordsResult {
        keywords: extract_keywords(job_description),
        ..Default::default()
    }
}

pub fn build_prompt(job_description: &str) -> String {
    KEYWORDS_PROMPT_TEMPLATE.replace("{job_description}", job_description)
}

pub async fn run(
    state: &AppState,
    req: &KeywordsRequest,
) -> Result<ToolResponse<KeywordsResult>, AppError> {
    let raw = require_text("Job description", &req.job_description, MIN_JOB_DESCRIPTION_CHARS)?;
    let jd = prepare_job_description(raw);

    let mut response = run_structured(
        state,
        ToolCall {
            endpoint: "keywords",
            cache_inputs: vec![jd.as_str()],
            system: ANALYST_SYSTEM,
            prompt: build_prompt(&jd),
            choice: &req.choice,
        },
        || fallback(&jd),
    )
    .await?;
    response.data = response.data.normalized();
    Ok(response)
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_partial_answer_gets_defaults() {
        let result: KeywordsResult =
            serde_json::from_str(r#"{"hardSkills": ["Rust", "rust", " Go "]}"#).unwrap();
        let result = result.normalized();
        assert_eq!(result.hard_skills, vec!["Rust", "Go"]);
        assert!(result.tools.is_empty());
        assert!(result.keywords.is_empty());
    }

    #[test]
    fn test_fallback_uses_jd_terms() {
        let result = fallback("Kubernetes and Terraform. Kubernetes clusters at scale.");
        assert_eq!(result.keywords.first().map(String::as_str), Some("kubernetes"));
        assert!(result.hard_skills.is_empty());
    }

    #[test]
    fn test_request_accepts_model_fields() {
        let req: KeywordsRequest = serde_json::from_str(
            r#"{"jobDescription": "x", "model": "groq:llama-3.1-8b-instant", "apiKeys": {"groq": "k"}}"#,
        )
        .unwrap();
        assert_eq!(req.choice.model.as_deref(), Some("groq:llama-3.1-8b-instant"));
        assert!(req.choice.api_keys.is_some());
    }
}
