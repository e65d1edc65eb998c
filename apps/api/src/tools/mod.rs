//! Resume analysis tools.
//!
//! Every LLM-backed tool follows the same path: validate input, check the
//! response cache, build a prompt, call the model router, parse the JSON
//! answer, and fall back to a deterministic result when parsing fails.
//! Only a failure of every model surfaces as an error.

pub mod ats_check;
pub mod handlers;
pub mod interview_prep;
pub mod keywords;
pub mod prompts;
pub mod relevancy;
pub mod skills_gap;
pub mod validate;

use serde::{de::DeserializeOwned, Deserialize, Deserializer, Serialize};
use serde_json::Value;
use tracing::{debug, warn};

use crate::cache::{self, cache_key};
use crate::errors::AppError;
use crate::llm_client::{ApiKeys, GenerateOptions, ModelSpec};
use crate::state::AppState;
use crate::text::job_description::{clean_job_description, trim_job_description_to_role_content};
use crate::text::json_extract::{words_to_number, LlmParse};

pub const MIN_RESUME_CHARS: usize = 100;
pub const MIN_JOB_DESCRIPTION_CHARS: usize = 50;
pub const MAX_INPUT_CHARS: usize = 50_000;

// ────────────────────────────────────────────────────────────────────────────
// Request plumbing
// ────────────────────────────────────────────────────────────────────────────

/// Optional model selection carried by every LLM-backed request body.
#[derive(Debug, Clone, Default, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct ModelChoice {
    pub model: Option<String>,
    pub api_keys: Option<ApiKeys>,
}

impl ModelChoice {
    pub fn preferred(&self) -> Result<Option<ModelSpec>, AppError> {
        self.model
            .as_deref()
            .map(str::trim)
            .filter(|m| !m.is_empty())
            .map(|m| {
                m.parse::<ModelSpec>()
                    .map_err(|e| AppError::Validation(format!("Invalid model: {e}")))
            })
            .transpose()
    }
}

/// Trimmed `value`, or a 400 naming `field`.
pub fn require_text<'a>(field: &str, value: &'a str, min_chars: usize) -> Result<&'a str, AppError> {
    let trimmed = value.trim();
    if trimmed.is_empty() {
        return Err(AppError::Validation(format!("{field} is required")));
    }
    let chars = trimmed.chars().count();
    if chars < min_chars {
        return Err(AppError::Validation(format!(
            "{field} is too short (minimum {min_chars} characters)"
        )));
    }
    if chars > MAX_INPUT_CHARS {
        return Err(AppError::Validation(format!(
            "{field} is too long (maximum {MAX_INPUT_CHARS} characters)"
        )));
    }
    Ok(trimmed)
}

/// Cleans pasted JD text and keeps the role-specific part.
pub fn prepare_job_description(raw: &str) -> String {
    trim_job_description_to_role_content(&clean_job_description(raw, None))
}

// ────────────────────────────────────────────────────────────────────────────
// Score normalisation
// ────────────────────────────────────────────────────────────────────────────

pub fn clamp_score(value: f64) -> u32 {
    if value.is_nan() {
        0
    } else {
        value.round().clamp(0.0, 100.0) as u32
    }
}

/// Accepts `85`, `85.4`, `"85"`, `"85%"` or `"eighty-five"`; anything else becomes 0.
pub fn lenient_score<'de, D: Deserializer<'de>>(deserializer: D) -> Result<u32, D::Error> {
    let value = Value::deserialize(deserializer)?;
    let number = match &value {
        Value::Number(n) => n.as_f64(),
        Value::String(s) => {
            let s = s.trim().trim_end_matches('%').trim();
            s.parse::<f64>()
                .ok()
                .or_else(|| words_to_number(s).map(f64::from))
        }
        _ => None,
    };
    Ok(number.map(clamp_score).unwrap_or(0))
}

/// Trims, drops empties and removes case-insensitive duplicates, keeping order.
pub fn dedupe_terms(terms: Vec<String>) -> Vec<String> {
    let mut seen = std::collections::HashSet::new();
    terms
        .into_iter()
        .map(|t| t.trim().to_string())
        .filter(|t| !t.is_empty() && seen.insert(t.to_lowercase()))
        .collect()
}

// ────────────────────────────────────────────────────────────────────────────
// Shared structured-call path
// ────────────────────────────────────────────────────────────────────────────

#[derive(Debug, Clone, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct ToolResponse<T> {
    #[serde(flatten)]
    pub data: T,
    pub model_used: Option<String>,
    /// True when the model answer could not be parsed and defaults were used.
    pub degraded: bool,
    #[serde(default)]
    pub cached: bool,
}

pub struct ToolCall<'a> {
    pub endpoint: &'static str,
    pub cache_inputs: Vec<&'a str>,
    pub system: &'static str,
    pub prompt: String,
    pub choice: &'a ModelChoice,
}

/// Runs one structured tool call. `fallback` supplies the result when the
/// model answer is unusable; degraded results are not cached.
pub async fn run_structured<T>(
    state: &AppState,
    call: ToolCall<'_>,
    fallback: impl FnOnce() -> T,
) -> Result<ToolResponse<T>, AppError>
where
    T: Serialize + DeserializeOwned,
{
    let preferred = call.choice.preferred()?;
    let model_label = preferred.as_ref().map(ToString::to_string).unwrap_or_default();
    let mut inputs = call.cache_inputs.clone();
    inputs.push(&model_label);
    let key = cache_key(call.endpoint, &inputs);

    if let Some(mut hit) = cache::get_json::<ToolResponse<T>>(state.cache.as_ref(), &key).await {
        debug!("Cache hit for {}", call.endpoint);
        hit.cached = true;
        return Ok(hit);
    }

    let generation = state
        .llm
        .generate(
            &call.prompt,
            preferred.as_ref(),
            &GenerateOptions::json(call.system),
            call.choice.api_keys.as_ref(),
        )
        .await?;

    let parsed = LlmParse::<T>::from_text(&generation.text);
    let degraded = !parsed.is_parsed();
    if degraded {
        warn!(
            "{}: unparseable answer from {}, using fallback",
            call.endpoint, generation.model
        );
    }

    let response = ToolResponse {
        data: parsed.or_fallback(fallback),
        model_used: Some(generation.model.to_string()),
        degraded,
        cached: false,
    };
    if !degraded {
        cache::put_json(state.cache.as_ref(), &key, &response).await;
    }
    Ok(response)
}

#[cfg(test)]
mod tests {
    use super::*;

    #[derive(Debug, Deserialize)]
    struct Scored {
        #[serde(default, deserialize_with = "lenient_score")]
        score: u32,
    }

    fn score_of(json: &str) -> u32 {
        serde_json::from_str::<Scored>(json).unwrap().score
    }

    #[test]
    fn test_lenient_score_accepts_common_shapes() {
        assert_eq!(score_of(r#"{"score": 85}"#), 85);
        assert_eq!(score_of(r#"{"score": 85.6}"#), 86);
        assert_eq!(score_of(r#"{"score": "72%"}"#), 72);
        assert_eq!(score_of(r#"{"score": 140}"#), 100);
        assert_eq!(score_of(r#"{"score": -3}"#), 0);
        assert_eq!(score_of(r#"{"score": null}"#), 0);
        assert_eq!(score_of(r#"{}"#), 0);
    }

    #[test]
    fn test_lenient_score_reads_spelled_out_numbers() {
        assert_eq!(score_of(r#"{"score": "thirty"}"#), 30);
        assert_eq!(score_of(r#"{"score": "Eighty-five %"}"#), 85);
        assert_eq!(score_of(r#"{"score": "two hundred"}"#), 100);
        assert_eq!(score_of(r#"{"score": "high"}"#), 0);
    }

    #[test]
    fn test_dedupe_terms() {
        let terms = vec![" Rust".into(), "rust".into(), "".into(), "SQL".into()];
        assert_eq!(dedupe_terms(terms), vec!["Rust", "SQL"]);
    }

    #[test]
    fn test_require_text() {
        assert_eq!(require_text("resume", "  hello  ", 3).unwrap(), "hello");
        assert!(matches!(
            require_text("resume", "   ", 3),
            Err(AppError::Validation(msg)) if msg == "resume is required"
        ));
        assert!(require_text("resume", "hi", 3).is_err());
        assert!(require_text("resume", &"x".repeat(MAX_INPUT_CHARS + 1), 3).is_err());
    }

    #[test]
    fn test_model_choice_parsing() {
        let choice = ModelChoice {
            model: Some("openai:gpt-4o-mini".to_string()),
            api_keys: None,
        };
        assert_eq!(
            choice.preferred().unwrap().map(|m| m.to_string()),
            Some("openai:gpt-4o-mini".to_string())
        );
        assert!(ModelChoice::default().preferred().unwrap().is_none());
        let blank = ModelChoice {
            model: Some("  ".to_string()),
            api_keys: None,
        };
        assert!(blank.preferred().unwrap().is_none());
    }

    #[test]
    fn test_prepare_job_description_strips_html_and_boilerplate() {
        let raw = "<p>We are Acme.</p><h2>About the Role</h2><p>Build &amp; ship APIs.</p>\
                   <p>Equal Employment Opportunity statement.</p>";
        let prepared = prepare_job_description(raw);
        assert!(prepared.starts_with("About the Role"), "got {prepared:?}");
        assert!(prepared.contains("Build & ship APIs."));
        assert!(!prepared.contains("Equal Employment"));
        assert!(!prepared.contains('<'));
    }

    #[test]
    fn test_tool_response_flattens_data() {
        #[derive(Serialize, Deserialize)]
        struct Data {
            keywords: Vec<String>,
        }
        let response = ToolResponse {
            data: Data {
                keywords: vec!["rust".into()],
            },
            model_used: Some("groq:x".into()),
            degraded: false,
            cached: false,
        };
        let json = serde_json::to_value(&response).unwrap();
        assert_eq!(json["keywords"][0], "rust");
        assert_eq!(json["modelUsed"], "groq:x");
    }
}
