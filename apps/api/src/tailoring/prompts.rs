// Prompt constants for resume tailoring.
// Reuses cross-cutting fragments from llm_client::prompts.

/// System prompt for the rewrite. Output is plain resume text, not JSON.
pub const TAILOR_SYSTEM: &str = "You are an expert resume writer who tailors resumes to \
    specific job descriptions for applicant tracking systems and human recruiters. \
    You respond with the complete rewritten resume only. \
    Do NOT add commentary, notes or explanations before or after the resume.";

/// Tailoring prompt. Replace `{no_fabrication}`, `{ats_format}`, `{job_title}`,
/// `{resume}` and `{job_description}` before sending.
pub const TAILOR_PROMPT_TEMPLATE: &str = r#"Rewrite the candidate's resume so it targets the role below{job_title}.

What to do:
- Lead each experience entry with the accomplishments most relevant to the job.
- Use the job description's terminology where the candidate's experience genuinely matches it.
- Tighten wording: strong action verbs, concrete outcomes, no filler.
- Keep every section of the original, in a sensible order, with a `## ` heading each.
- Keep the contact details at the top exactly as given.

{no_fabrication}

{ats_format}

{resume}

{job_description}"#;
