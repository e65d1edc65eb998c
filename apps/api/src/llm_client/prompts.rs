// Shared prompt constants and prompt-building utilities.
// Each service that needs LLM calls defines its own prompts.rs alongside it.
// This file contains cross-cutting prompt fragments.

/// System prompt fragment that enforces JSON-only output.
pub const JSON_ONLY_SYSTEM: &str = "You are a precise, structured assistant. \
    You MUST respond with valid JSON only. \
    Do NOT include any text outside the JSON object. \
    Do NOT use markdown code fences. \
    Do NOT include explanations or apologies.";

/// Appended to every prompt that rewrites or judges resume content.
pub const NO_FABRICATION_INSTRUCTION: &str = "\
    CRITICAL: Only use facts present in the candidate's original resume. \
    Do NOT invent employers, titles, dates, degrees, certifications, metrics or tools. \
    You may rephrase, reorder and emphasise, but every claim must be traceable to the original.";

/// Plain-text formatting rules that keep output parseable by applicant tracking systems.
pub const ATS_FORMAT_INSTRUCTION: &str = "\
    Format for applicant tracking systems: plain text with markdown `## ` section headings, \
    `- ` bullets, no tables, no columns, no icons, no emoji, no decorative unicode.";

/// Wraps user-supplied text in labelled delimiters so it cannot be confused with instructions.
pub fn fenced(label: &str, text: &str) -> String {
    format!("<{label}>\n{}\n</{label}>", text.trim())
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_fenced_trims_and_labels() {
        assert_eq!(fenced("resume", "  hi \n"), "<resume>\nhi\n</resume>");
    }
}
