//! The tailor run, minus persistence.
//!
//! 1. Validate and clean inputs
//! 2. Generate the rewrite (model fallback applies)
//! 3. Strip fences, apply the ATS pass
//! 4. Score before/after and compute improvement metrics
//! 5. Obfuscate for the paywall

use tracing::info;

use crate::errors::AppError;
use crate::llm_client::prompts::{fenced, ATS_FORMAT_INSTRUCTION, NO_FABRICATION_INSTRUCTION};
use crate::llm_client::{GenerateOptions, LlmError};
use crate::obfuscation::{obfuscate, ObfuscatedResume};
use crate::scoring::{improvement_metrics, match_score, ImprovementMetrics, MatchScore};
use crate::state::AppState;
use crate::tailoring::prompts::{TAILOR_PROMPT_TEMPLATE, TAILOR_SYSTEM};
use crate::text::ats_sanitizer::sanitize_resume_for_ats;
use crate::text::json_extract::strip_code_fences;
use crate::tools::{
    prepare_job_description, require_text, ModelChoice, MIN_JOB_DESCRIPTION_CHARS,
    MIN_RESUME_CHARS,
};

const MAX_JOB_TITLE_CHARS: usize = 200;
const TAILOR_MAX_TOKENS: u32 = 8192;

pub struct TailorInput<'a> {
    pub resume: &'a str,
    pub job_description: &'a str,
    pub job_title: Option<&'a str>,
    pub choice: &'a ModelChoice,
}

#[derive(Debug, Clone)]
pub struct TailorOutcome {
    pub original: String,
    pub tailored: String,
    pub job_description: String,
    pub job_title: Option<String>,
    pub obfuscated: ObfuscatedResume,
    pub match_score: MatchScore,
    pub metrics: ImprovementMetrics,
    pub model_used: String,
}

pub async fn tailor(state: &AppState, input: &TailorInput<'_>) -> Result<TailorOutcome, AppError> {
    let original = require_text("Resume", input.resume, MIN_RESUME_CHARS)?;
    let raw_jd = require_text("Job description", input.job_description, MIN_JOB_DESCRIPTION_CHARS)?;
    let job_description = prepare_job_description(raw_jd);
    let job_title = normalize_job_title(input.job_title);

    let preferred = input.choice.preferred()?;
    let options = GenerateOptions {
        max_tokens: TAILOR_MAX_TOKENS,
        ..GenerateOptions::text(TAILOR_SYSTEM)
    };
    let generation = state
        .llm
        .generate(
            &build_prompt(original, &job_description, job_title.as_deref()),
            preferred.as_ref(),
            &options,
            input.choice.api_keys.as_ref(),
        )
        .await?;

    let outcome = finish(
        original,
        &generation.text,
        job_description,
        job_title,
        generation.model.to_string(),
    )?;
    info!(
        "Tailored resume with {}: match {} -> {}",
        outcome.model_used, outcome.match_score.before, outcome.match_score.after
    );
    Ok(outcome)
}

pub fn build_prompt(resume: &str, job_description: &str, job_title: Option<&str>) -> String {
    let title = job_title
        .map(|t| format!(" ({t})"))
        .unwrap_or_default();
    TAILOR_PROMPT_TEMPLATE
        .replace("{job_title}", &title)
        .replace("{no_fabrication}", NO_FABRICATION_INSTRUCTION)
        .replace("{ats_format}", ATS_FORMAT_INSTRUCTION)
        .replace("{resume}", &fenced("resume", resume))
        .replace("{job_description}", &fenced("job_description", job_description))
}

/// Post-processes raw model output into a stored tailor result.
pub fn finish(
    original: &str,
    model_output: &str,
    job_description: String,
    job_title: Option<String>,
    model_used: String,
) -> Result<TailorOutcome, AppError> {
    let raw = strip_code_fences(model_output);
    if raw.is_empty() {
        return Err(LlmError::EmptyContent.into());
    }
    let tailored = sanitize_resume_for_ats(raw);

    let match_score = MatchScore {
        before: match_score(original, &job_description),
        after: match_score(&tailored, &job_description),
    };
    let metrics = improvement_metrics(original, raw, &tailored, &job_description);
    let obfuscated = obfuscate(original, &tailored);

    Ok(TailorOutcome {
        original: original.to_string(),
        tailored,
        job_description,
        job_title,
        obfuscated,
        match_score,
        metrics,
        model_used,
    })
}

fn normalize_job_title(title: Option<&str>) -> Option<String> {
    title
        .map(str::trim)
        .filter(|t| !t.is_empty())
        .map(|t| t.chars().take(MAX_JOB_TITLE_CHARS).collect())
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::obfuscation::reconstruct;

    const ORIGINAL: &str = "Jane Doe\njane@example.com\n\n## Experience\nBuilt web services in Python for an online store.\nMaintained the billing system and its reports.\n\n## Education\nBSc Computer Science\n\n## Skills\nPython, SQL";
    const JD: &str = "We need a Rust engineer to build payment services. Rust, PostgreSQL, Kafka.";

    fn model_output() -> String {
        "```markdown\nJane Doe\njane@example.com\n\n## Experience\n• Built payment web services for an online store — Python, PostgreSQL.\n- Maintained the billing system and its reports.\n\n## Education\nBSc Computer Science\n\n## Skills\nPython, SQL, PostgreSQL\n```".to_string()
    }

    #[test]
    fn test_finish_sanitizes_and_scores() {
        let outcome = finish(ORIGINAL, &model_output(), JD.to_string(), None, "groq:x".into()).unwrap();
        assert!(!outcome.tailored.contains("```"));
        assert!(!outcome.tailored.contains('•'));
        assert!(!outcome.tailored.contains('—'));
        assert!(
            outcome.match_score.after > outcome.match_score.before,
            "{:?}",
            outcome.match_score
        );
        assert!(outcome.metrics.keywords_added.contains(&"postgresql".to_string()));
        assert!(outcome.metrics.ats_fixes_applied >= 2);
    }

    #[test]
    fn test_finish_obfuscation_round_trips() {
        let outcome = finish(ORIGINAL, &model_output(), JD.to_string(), None, "groq:x".into()).unwrap();
        let rebuilt = reconstruct(
            &outcome.obfuscated.obfuscated_resume,
            &outcome.obfuscated.content_map,
        )
        .unwrap();
        assert_eq!(rebuilt, outcome.tailored);
        assert!(outcome.obfuscated.free_reveal.is_some());
    }

    #[test]
    fn test_finish_rejects_empty_output() {
        let result = finish(ORIGINAL, "```\n```", JD.to_string(), None, "groq:x".into());
        assert!(matches!(result, Err(AppError::Llm(LlmError::EmptyContent))));
    }

    #[test]
    fn test_build_prompt_includes_title_and_rules() {
        let prompt = build_prompt("resume text", "jd text", Some("Staff Engineer"));
        assert!(prompt.contains("targets the role below (Staff Engineer)."));
        assert!(prompt.contains(NO_FABRICATION_INSTRUCTION));
        assert!(prompt.contains("<resume>\nresume text\n</resume>"));
        let untitled = build_prompt("resume text", "jd text", None);
        assert!(untitled.contains("targets the role below."));
    }

    #[test]
    fn test_job_title_normalized() {
        assert_eq!(normalize_job_title(Some("  ")), None);
        assert_eq!(normalize_job_title(Some(" Engineer ")), Some("Engineer".to_string()));
        let long = "x".repeat(500);
        assert_eq!(
            normalize_job_title(Some(&long)).map(|t| t.chars().count()),
            Some(MAX_JOB_TITLE_CHARS)
        );
    }
}
