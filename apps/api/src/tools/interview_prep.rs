use serde::{Deserialize, Serialize};

use crate::errors::AppError;
use crate::llm_client::prompts::{fenced, NO_FABRICATION_INSTRUCTION};
use crate::scoring::extract_keywords;
use crate::state::AppState;
use crate::tools::prompts::{ANALYST_SYSTEM, INTERVIEW_PREP_PROMPT_TEMPLATE};
use crate::tools::{
    dedupe_terms, prepare_job_description, require_text, run_structured, ModelChoice, ToolCall,
    ToolResponse, MIN_JOB_DESCRIPTION_CHARS, MIN_RESUME_CHARS,
};

const FALLBACK_TOPICS: usize = 5;

#[derive(Debug, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct InterviewPrepRequest {
    #[serde(default)]
    pub resume: String,
    #[serde(default)]
    pub job_description: String,
    #[serde(flatten)]
    pub choice: ModelChoice,
}

#[derive(Debug, Clone, Default, PartialEq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase", default)]
pub struct InterviewQuestion {
    pub question: String,
    pub category: String,
    pub talking_points: Vec<String>,
}

#[derive(Debug, Clone, Default, PartialEq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase", default)]
pub struct InterviewPrepResult {
    pub questions: Vec<InterviewQuestion>,
    pub talking_points: Vec<String>,
    pub questions_to_ask: Vec<String>,
}

impl InterviewPrepResult {
    fn normalized(mut self) -> Self {
        self.questions.retain(|q| !q.question.trim().is_empty());
        for q in &mut self.questions {
            if q.category.trim().is_empty() {
                q.category = "role".to_string();
            }
        }
        self.talking_points = dedupe_terms(self.talking_points);
        self.questions_to_ask = dedupe_terms(self.questions_to_ask);
        self
    }
}

/// Generic questions around the JD's top terms.
pub fn fallback(job_description: &str) -> InterviewPrepResult {
    let questions = extract_keywords(job_description)
        .into_iter()
        .take(FALLBACK_TOPICS)
        .map(|topic| InterviewQuestion {
            question: format!("Tell me about a time you worked with {topic}."),
            category: "technical".to_string(),
            talking_points: Vec::new(),
        })
        .collect();

    InterviewPrepResult {
        questions,
        talking_points: Vec::new(),
        questions_to_ask: vec![
            "What does success look like in the first 90 days?".to_string(),
            "How is the team structured, and who would I work with most closely?".to_string(),
        ],
    }
}

pub fn build_prompt(resume: &str, job_description: &str) -> String {
    INTERVIEW_PREP_PROMPT_TEMPLATE
        .replace("{no_fabrication}", NO_FABRICATION_INSTRUCTION)
        .replace("{resume}", &fenced("resume", resume))
        .replace("{job_description}", &fenced("job_description", job_description))
}

pub async fn run(
    state: &AppState,
    req: &InterviewPrepRequest,
) -> Result<ToolResponse<InterviewPrepResult>, AppError> {
    let resume = require_text("Resume", &req.resume, MIN_RESUME_CHARS)?;
    let raw = require_text("Job description", &req.job_description, MIN_JOB_DESCRIPTION_CHARS)?;
    let jd = prepare_job_description(raw);

    let mut response = run_structured(
        state,
        ToolCall {
            endpoint: "interview-prep",
            cache_inputs: vec![resume, jd.as_str()],
            system: ANALYST_SYSTEM,
            prompt: build_prompt(resume, &jd),
            choice: &req.choice,
        },
        || fallback(&jd),
    )
    .await?;
    response.data = std::mem::take(&mut response.data).normalized();
    Ok(response)
}
