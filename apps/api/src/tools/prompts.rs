// All LLM prompt constants for the analysis tools.
// Templates use `{placeholder}` markers replaced before sending.

/// System prompt shared by every analysis tool; enforces JSON-only output.
pub const ANALYST_SYSTEM: &str = "You are an expert technical recruiter and resume analyst. \
    You MUST respond with valid JSON only. \
    Do NOT include any text outside the JSON object. \
    Do NOT use markdown code fences. \
    Do NOT include explanations or apologies.";

pub const KEYWORDS_PROMPT_TEMPLATE: &str = r#"Extract the keywords an applicant tracking system would screen for in this job description.

Return a JSON object with this EXACT schema:
{
  "hardSkills": ["Rust", "PostgreSQL"],
  "softSkills": ["cross-team communication"],
  "tools": ["Kubernetes", "Terraform"],
  "certifications": ["AWS Solutions Architect"],
  "keywords": ["distributed systems", "payments"]
}

Rules:
- Use the exact wording of the job description.
- Order each list by importance, most important first.
- No duplicates across lists.

JOB DESCRIPTION:
{job_description}"#;

pub const SKILLS_GAP_PROMPT_TEMPLATE: &str = r#"Compare the candidate's resume against the job description and identify skill gaps.

Return a JSON object with this EXACT schema:
{
  "matchingSkills": ["Rust"],
  "missingSkills": ["Kafka"],
  "partialSkills": [{"skill": "Kubernetes", "note": "used Docker Compose only"}],
  "recommendations": ["Mention the event-driven work at Acme if it used a message queue"],
  "score": 70
}

Rules:
- "score" is an integer 0-100: how well the resume's skills cover the job's requirements.
- Recommendations must be honest: never suggest claiming skills the candidate lacks.

{no_fabrication}

{resume}

{job_description}"#;

pub const RELEVANCY_PROMPT_TEMPLATE: &str = r#"Score how relevant this resume is to the job description.

Return a JSON object with this EXACT schema:
{
  "score": 78,
  "summary": "One or two sentences.",
  "strengths": ["..."],
  "weaknesses": ["..."]
}

Rules:
- "score" MUST be an integer from 0 to 100 written with digits, not words.
- Judge substance (experience, scope, domain), not formatting.

{resume}

{job_description}"#;

pub const ATS_CHECK_PROMPT_TEMPLATE: &str = r#"Simulate an applicant tracking system parsing this resume for the job description below.

Return a JSON object with this EXACT schema:
{
  "score": 82,
  "issues": ["Dates use inconsistent formats"],
  "suggestions": ["Use MM/YYYY for all dates"],
  "keywordMatches": ["Rust"],
  "missingKeywords": ["Kafka"]
}

Rules:
- "score" is an integer 0-100: likelihood the resume passes automated screening.
- Issues cover parsing problems (layout, headings, dates, contact details) and keyword coverage.

{resume}

{job_description}"#;

pub const INTERVIEW_PREP_PROMPT_TEMPLATE: &str = r#"Prepare the candidate for an interview for this role.

Return a JSON object with this EXACT schema:
{
  "questions": [
    {"question": "...", "category": "technical", "talkingPoints": ["..."]}
  ],
  "talkingPoints": ["..."],
  "questionsToAsk": ["..."]
}

Rules:
- 8 to 12 questions; category is one of "technical", "behavioral", "situational", "role".
- Talking points must come from the resume; do not invent experience.

{no_fabrication}

{resume}

{job_description}"#;

pub const VALIDATE_PROMPT_TEMPLATE: &str = r#"Check a tailored resume against the candidate's original resume.

List every claim in the TAILORED resume that is not supported by the ORIGINAL resume:
invented employers, titles, dates, degrees, certifications, metrics, tools or responsibilities.

Return a JSON object with this EXACT schema:
{
  "valid": true,
  "issues": [{"claim": "...", "reason": "..."}],
  "warnings": ["..."]
}

Rules:
- "valid" is false when any issue is listed.
- Rephrasing and reordering supported facts is NOT an issue.

{original}

{tailored}"#;
