//! Fabrication check: claims in a tailored resume that the original does not support.

use serde::{Deserialize, Serialize};

use crate::errors::AppError;
use crate::llm_client::prompts::fenced;
use crate::state::AppState;
use crate::tools::prompts::{ANALYST_SYSTEM, VALIDATE_PROMPT_TEMPLATE};
use crate::tools::{
    dedupe_terms, require_text, run_structured, ModelChoice, ToolCall, ToolResponse,
    MIN_RESUME_CHARS,
};

pub const NOT_VERIFIED_WARNING: &str =
    "Automatic verification was unavailable; review the tailored resume against your original.";

#[derive(Debug, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct ValidateRequest {
    #[serde(default)]
    pub original: String,
    #[serde(default)]
    pub tailored: String,
    #[serde(flatten)]
    pub choice: ModelChoice,
}

#[derive(Debug, Clone, Default, PartialEq, Serialize, Deserialize)]
#[serde(default)]
pub struct UnsupportedClaim {
    pub claim: String,
    pub reason: String,
}

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(default)]
pub struct ValidateResult {
    pub valid: bool,
    pub issues: Vec<UnsupportedClaim>,
    pub warnings: Vec<String>,
}

impl Default for ValidateResult {
    fn default() -> Self {
        Self {
            valid: true,
            issues: Vec::new(),
            warnings: Vec::new(),
        }
    }
}

impl ValidateResult {
    /// A listed issue always makes the result invalid, whatever the model said.
    fn normalized(mut self) -> Self {
        self.issues.retain(|i| !i.claim.trim().is_empty());
        self.valid = self.valid && self.issues.is_empty();
        self.warnings = dedupe_terms(self.warnings);
        self
    }
}

pub fn fallback() -> ValidateResult {
    ValidateResult {
        warnings: vec![NOT_VERIFIED_WARNING.to_string()],
        ..Default::default()
    }
}

pub fn build_prompt(original: &str, tailored: &str) -> String {
    VALIDATE_PROMPT_TEMPLATE
        .replace("{original}", &fenced("original", original))
        .replace("{tailored}", &fenced("tailored", tailored))
}

pub async fn run(
    state: &AppState,
    req: &ValidateRequest,
) -> Result<ToolResponse<ValidateResult>, AppError> {
    let original = require_text("Original resume", &req.original, MIN_RESUME_CHARS)?;
    let tailored = require_text("Tailored resume", &req.tailored, MIN_RESUME_CHARS)?;

    let mut response = run_structured(
        state,
        ToolCall {
            endpoint: "validate",
            cache_inputs: vec![original, tailored],
            system: ANALYST_SYSTEM,
            prompt: build_prompt(original, tailored),
            choice: &req.choice,
        },
        fallback,
    )
    .await?;
    response.data = std::mem::take(&mut response.data).normalized();
    Ok(response)
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_issues_force_invalid() {
        let result: ValidateResult = serde_json::from_str(
            r#"{"valid": true, "issues": [{"claim": "AWS certified", "reason": "not in original"}]}"#,
        )
        .unwrap();
        let result = result.normalized();
        assert!(!result.valid);
        assert_eq!(result.issues[0].claim, "AWS certified");
    }

    #[test]
    fn test_missing_valid_defaults_true() {
        let result: ValidateResult = serde_json::from_str(r#"{"warnings": ["minor"]}"#).unwrap();
        assert!(result.normalized().valid);
    }

    #[test]
    fn test_fallback_warns() {
        let result = fallback();
        assert!(result.valid);
        assert_eq!(result.warnings, vec![NOT_VERIFIED_WARNING.to_string()]);
    }
}
