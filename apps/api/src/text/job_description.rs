//! Job description cleaning: strips markup pasted from job boards and trims
//! the text down to the part that actually describes the role.

use std::sync::LazyLock;

use regex::Regex;

/// Default character budget for a cleaned job description.
pub const DEFAULT_MAX_LENGTH: usize = 4000;

const ELLIPSIS: &str = "...";

/// Phrases that open the role-specific part of a posting. Matched case-insensitively.
const ROLE_START_SENTINELS: &[&str] = &[
    "about the role",
    "about this role",
    "about the position",
    "about the job",
    "role overview",
    "position overview",
    "position summary",
    "job summary",
    "the opportunity",
    "what you'll do",
    "what you will do",
];

/// Phrases that open boilerplate after the role description. Matched case-insensitively.
const ROLE_END_SENTINELS: &[&str] = &[
    "equal employment opportunity",
    "equal opportunity employer",
    "salary range",
    "pay range",
    "compensation range",
    "base salary",
    "perks and benefits",
    "benefits include",
    "what we offer",
    "privacy notice",
];

static SCRIPT_RE: LazyLock<Regex> =
    LazyLock::new(|| Regex::new(r"(?is)<script\b.*?</script\s*>").expect("valid regex"));
static STYLE_RE: LazyLock<Regex> =
    LazyLock::new(|| Regex::new(r"(?is)<style\b.*?</style\s*>").expect("valid regex"));
static BLOCK_TAG_RE: LazyLock<Regex> = LazyLock::new(|| {
    Regex::new(r"(?i)<\s*(br|/p|/div|/li|/h[1-6]|/tr)\b[^>]*>").expect("valid regex")
});
static TAG_RE: LazyLock<Regex> = LazyLock::new(|| Regex::new(r"<[^>]*>").expect("valid regex"));
static NUMERIC_ENTITY_RE: LazyLock<Regex> =
    LazyLock::new(|| Regex::new(r"&#(x[0-9a-fA-F]+|[0-9]+);").expect("valid regex"));
static INLINE_SPACE_RE: LazyLock<Regex> =
    LazyLock::new(|| Regex::new(r"[ \t\u{a0}]+").expect("valid regex"));
static BLANK_LINES_RE: LazyLock<Regex> =
    LazyLock::new(|| Regex::new(r"\n{3,}").expect("valid regex"));

/// Cleans raw job-description text: removes HTML tags and common entities,
/// collapses whitespace, and truncates with an ellipsis beyond `max_length`
/// characters (default [`DEFAULT_MAX_LENGTH`]).
///
/// The result never contains `<` or `>` and is at most `max_length + 3` characters.
pub fn clean_job_description(text: &str, max_length: Option<usize>) -> String {
    let max_length = max_length.unwrap_or(DEFAULT_MAX_LENGTH);

    let text = SCRIPT_RE.replace_all(text, " ");
    let text = STYLE_RE.replace_all(&text, " ");
    let text = BLOCK_TAG_RE.replace_all(&text, "\n");
    let text = TAG_RE.replace_all(&text, " ");
    let text = decode_entities(&text);

    // Stray angle brackets (unclosed tags, decoded &lt;/&gt;) are dropped outright.
    let text: String = text.chars().filter(|c| *c != '<' && *c != '>').collect();

    let text = text.replace("\r\n", "\n").replace('\r', "\n");
    let text = INLINE_SPACE_RE.replace_all(&text, " ");
    let text = text
        .lines()
        .map(str::trim)
        .collect::<Vec<_>>()
        .join("\n");
    let text = BLANK_LINES_RE.replace_all(&text, "\n\n");
    let text = text.trim();

    truncate_with_ellipsis(text, max_length)
}

/// Narrows a job description to its role-specific content.
///
/// If a role-start sentinel is present, everything before its earliest
/// occurrence is discarded, then the remainder is cut at the earliest
/// role-end sentinel that follows. Without a start sentinel only the end
/// sentinel cut applies. With neither, the input is returned unchanged.
pub fn trim_job_description_to_role_content(text: &str) -> String {
    // ASCII lowercasing keeps byte offsets aligned with the original text.
    let lowered = text.to_ascii_lowercase();

    let start = earliest_match(&lowered, 0, ROLE_START_SENTINELS);
    let search_from = start.map(|(pos, len)| pos + len).unwrap_or(0);
    let end = earliest_match(&lowered, search_from, ROLE_END_SENTINELS);

    if start.is_none() && end.is_none() {
        return text.to_string();
    }

    let from = start.map(|(pos, _)| pos).unwrap_or(0);
    let to = end.map(|(pos, _)| pos).unwrap_or(text.len());
    let trimmed = text[from..to].trim();

    if trimmed.is_empty() {
        // An end sentinel at the very top would leave nothing; keep the original.
        return text.to_string();
    }
    trimmed.to_string()
}

/// Returns `(byte_offset, byte_len)` of the earliest sentinel at or after `from`.
fn earliest_match(haystack: &str, from: usize, sentinels: &[&str]) -> Option<(usize, usize)> {
    let tail = haystack.get(from..)?;
    sentinels
        .iter()
        .filter_map(|s| tail.find(s).map(|pos| (from + pos, s.len())))
        .min_by_key(|(pos, _)| *pos)
}

fn decode_entities(text: &str) -> String {
    let text = text
        .replace("&nbsp;", " ")
        .replace("&quot;", "\"")
        .replace("&#39;", "'")
        .replace("&apos;", "'")
        .replace("&rsquo;", "'")
        .replace("&lsquo;", "'")
        .replace("&ldquo;", "\"")
        .replace("&rdquo;", "\"")
        .replace("&mdash;", "-")
        .replace("&ndash;", "-")
        .replace("&bull;", "-")
        .replace("&lt;", " ")
        .replace("&gt;", " ");

    let text = NUMERIC_ENTITY_RE.replace_all(&text, |caps: &regex::Captures| {
        let raw = &caps[1];
        let code = match raw.strip_prefix('x') {
            Some(hex) => u32::from_str_radix(hex, 16).ok(),
            None => raw.parse::<u32>().ok(),
        };
        code.and_then(char::from_u32)
            .filter(|c| !c.is_control() || c.is_whitespace())
            .map(|c| c.to_string())
            .unwrap_or_default()
    });

    // &amp; last so "&amp;lt;" decodes to the literal text "&lt;", not a bracket.
    text.replace("&amp;", "&")
}

fn truncate_with_ellipsis(text: &str, max_length: usize) -> String {
    if text.chars().count() <= max_length {
        return text.to_string();
    }
    let cut: String = text.chars().take(max_length).collect();
    format!("{}{ELLIPSIS}", cut.trim_end())
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_clean_strips_tags_and_entities() {
        let raw = "<div><h2>Senior&nbsp;Engineer</h2><p>Build &amp; ship <b>Rust</b> services.</p></div>";
        let cleaned = clean_job_description(raw, None);
        assert_eq!(cleaned, "Senior Engineer\nBuild & ship Rust services.");
    }

    #[test]
    fn test_clean_drops_script_and_style_content() {
        let raw = "<style>.x{color:red}</style>Role text<script>alert('x')</script>";
        let cleaned = clean_job_description(raw, None);
        assert_eq!(cleaned, "Role text");
    }

    #[test]
    fn test_clean_never_emits_angle_brackets() {
        let raw = "Compare a &lt; b and c &gt; d, unclosed <tag and stray > bracket";
        let cleaned = clean_job_description(raw, None);
        assert!(!cleaned.contains('<') && !cleaned.contains('>'), "got {cleaned:?}");
    }

    #[test]
    fn test_clean_collapses_whitespace() {
        let raw = "Line   one\t\twith  gaps\n\n\n\n\nLine two   ";
        assert_eq!(
            clean_job_description(raw, None),
            "Line one with gaps\n\nLine two"
        );
    }

    #[test]
    fn test_clean_truncates_with_ellipsis() {
        let raw = "word ".repeat(100);
        let cleaned = clean_job_description(&raw, Some(20));
        assert!(cleaned.ends_with("..."));
        assert!(cleaned.chars().count() <= 23, "len {}", cleaned.chars().count());
    }

    #[test]
    fn test_clean_length_bound_holds_for_multibyte_text() {
        let raw = "Ingénieur — équipe données ".repeat(300);
        let cleaned = clean_job_description(&raw, None);
        assert!(cleaned.chars().count() <= DEFAULT_MAX_LENGTH + 3);
    }

    #[test]
    fn test_clean_decodes_numeric_entities() {
        assert_eq!(clean_job_description("It&#39;s &#x41;PI work", None), "It's API work");
    }

    #[test]
    fn test_trim_removes_intro_and_salary() {
        let jd = "Intro about company.\nABOUT THE ROLE\nDo X.\nSalary Range: $100k";
        assert_eq!(trim_job_description_to_role_content(jd), "ABOUT THE ROLE\nDo X.");
    }

    #[test]
    fn test_trim_without_start_sentinel_cuts_only_at_end() {
        let jd = "We build things.\nYou will write Rust.\nEqual Employment Opportunity statement.";
        assert_eq!(
            trim_job_description_to_role_content(jd),
            "We build things.\nYou will write Rust."
        );
    }

    #[test]
    fn test_trim_with_start_only_keeps_tail() {
        let jd = "Company blurb.\nAbout the Role\nShip the platform.";
        assert_eq!(
            trim_job_description_to_role_content(jd),
            "About the Role\nShip the platform."
        );
    }

    #[test]
    fn test_trim_no_sentinels_returns_input_unchanged() {
        let jd = "  Plain description with no markers.  ";
        assert_eq!(trim_job_description_to_role_content(jd), jd);
    }

    #[test]
    fn test_trim_end_sentinel_before_start_is_ignored() {
        // The salary line precedes the role start, so only text after the start is searched.
        let jd = "Salary range listed below.\nABOUT THE ROLE\nDesign APIs.";
        assert_eq!(
            trim_job_description_to_role_content(jd),
            "ABOUT THE ROLE\nDesign APIs."
        );
    }

    #[test]
    fn test_trim_end_sentinel_at_top_keeps_original() {
        let jd = "Salary Range: $120k";
        assert_eq!(trim_job_description_to_role_content(jd), jd);
    }
}
