//! Match scoring: deterministic keyword coverage of a job description by a resume.
//!
//! Pure Rust, no LLM call, so before/after scores are reproducible and cheap.
//!
//! Algorithm:
//! 1. Tokenise the JD (lowercase; `+`, `#` and inner `.` kept so `c++`, `c#`,
//!    `node.js` survive), drop stopwords, numbers and 1-char tokens.
//! 2. Rank by frequency (ties by first appearance), keep the top 40.
//! 3. score = matched / total × 100, rounded.

use std::collections::{HashMap, HashSet};

use serde::{Deserialize, Serialize};

use crate::obfuscation::sections::partition_sections;
use crate::text::ats_sanitizer::detect_ats_issues;

const MAX_KEYWORDS: usize = 40;

const STOPWORDS: &[&str] = &[
    "a", "about", "above", "after", "all", "also", "am", "an", "and", "any", "are", "as", "at",
    "be", "because", "been", "being", "both", "but", "by", "can", "could", "did", "do", "does",
    "each", "etc", "for", "from", "further", "had", "has", "have", "having", "he", "her", "here",
    "his", "how", "i", "if", "in", "into", "is", "it", "its", "just", "may", "me", "more", "most",
    "must", "my", "no", "nor", "not", "of", "on", "or", "other", "our", "ours", "out", "over",
    "own", "per", "plus", "same", "she", "should", "so", "some", "such", "than", "that", "the",
    "their", "them", "then", "there", "these", "they", "this", "those", "through", "to", "too",
    "under", "until", "up", "us", "very", "via", "was", "we", "were", "what", "when", "where",
    "which", "while", "who", "whom", "why", "will", "with", "within", "would", "you", "your",
    // Job-ad boilerplate.
    "ability", "able", "applicant", "applicants", "apply", "candidate", "candidates", "company",
    "experience", "including", "join", "looking", "opportunity", "preferred", "position",
    "required", "requirements", "responsibilities", "role", "strong", "team", "work", "working",
    "year", "years",
];

// ────────────────────────────────────────────────────────────────────────────
// Output data models
// ────────────────────────────────────────────────────────────────────────────

#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
pub struct MatchScore {
    pub before: u32,
    pub after: u32,
}

#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct KeywordCoverage {
    pub score: u32,
    pub matched: Vec<String>,
    pub missing: Vec<String>,
}

#[derive(Debug, Clone, Default, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct ImprovementMetrics {
    /// JD keywords present in the tailored resume but not the original.
    pub keywords_added: Vec<String>,
    pub sections_changed: Vec<String>,
    pub word_count_delta: i64,
    pub ats_fixes_applied: usize,
}

// ────────────────────────────────────────────────────────────────────────────
// Keyword extraction and coverage
// ────────────────────────────────────────────────────────────────────────────

fn tokenize(text: &str) -> impl Iterator<Item = String> + '_ {
    text.split(|c: char| !(c.is_alphanumeric() || matches!(c, '+' | '#' | '.')))
        .map(|raw| raw.trim_matches('.').to_lowercase())
        .filter(|t| t.chars().count() > 1 && t.chars().any(|c| c.is_alphabetic()))
}

fn is_stopword(token: &str) -> bool {
    STOPWORDS.contains(&token)
}

/// Top JD keywords by frequency, ties broken by first appearance.
pub fn extract_keywords(job_description: &str) -> Vec<String> {
    let mut counts: HashMap<String, (usize, usize)> = HashMap::new();
    for (position, token) in tokenize(job_description)
        .filter(|t| !is_stopword(t))
        .enumerate()
    {
        counts.entry(token).or_insert((0, position)).0 += 1;
    }

    let mut ranked: Vec<(String, usize, usize)> = counts
        .into_iter()
        .map(|(token, (count, first))| (token, count, first))
        .collect();
    ranked.sort_by(|a, b| b.1.cmp(&a.1).then(a.2.cmp(&b.2)));
    ranked
        .into_iter()
        .take(MAX_KEYWORDS)
        .map(|(token, _, _)| token)
        .collect()
}

pub fn keyword_coverage(resume: &str, keywords: &[String]) -> KeywordCoverage {
    let resume_tokens: HashSet<String> = tokenize(resume).collect();
    let (matched, missing): (Vec<String>, Vec<String>) = keywords
        .iter()
        .cloned()
        .partition(|k| resume_tokens.contains(k));

    let score = if keywords.is_empty() {
        0
    } else {
        ((matched.len() as f64 / keywords.len() as f64) * 100.0).round() as u32
    };

    KeywordCoverage {
        score,
        matched,
        missing,
    }
}

pub fn match_score(resume: &str, job_description: &str) -> u32 {
    keyword_coverage(resume, &extract_keywords(job_description)).score
}

// ────────────────────────────────────────────────────────────────────────────
// Improvement metrics
// ────────────────────────────────────────────────────────────────────────────

/// Compares the original resume with the sanitised tailored one.
/// `raw_tailored` is the model output before ATS sanitisation.
pub fn improvement_metrics(
    original: &str,
    raw_tailored: &str,
    tailored: &str,
    job_description: &str,
) -> ImprovementMetrics {
    let keywords = extract_keywords(job_description);
    let before: HashSet<String> = keyword_coverage(original, &keywords)
        .matched
        .into_iter()
        .collect();
    let keywords_added = keyword_coverage(tailored, &keywords)
        .matched
        .into_iter()
        .filter(|k| !before.contains(k))
        .collect();

    let word_count = |s: &str| s.split_whitespace().count() as i64;
    let ats_fixes_applied = detect_ats_issues(raw_tailored)
        .len()
        .saturating_sub(detect_ats_issues(tailored).len());

    ImprovementMetrics {
        keywords_added,
        sections_changed: changed_sections(original, tailored),
        word_count_delta: word_count(tailored) - word_count(original),
        ats_fixes_applied,
    }
}

/// Titles of tailored sections whose body differs from (or is absent in) the original.
fn changed_sections(original: &str, tailored: &str) -> Vec<String> {
    let original_sections = partition_sections(original);
    partition_sections(tailored)
        .iter()
        .filter(|s| s.heading.is_some())
        .filter(|t| {
            let key = t.match_key();
            let after = normalize_ws(t.body_text(tailored));
            !original_sections
                .iter()
                .any(|o| o.match_key() == key && normalize_ws(o.body_text(original)) == after)
        })
        .map(|s| s.title.clone())
        .collect()
}

fn normalize_ws(text: &str) -> String {
    text.split_whitespace().collect::<Vec<_>>().join(" ")
}

#[cfg(test)]
mod tests {
    use super::*;

    const JD: &str = "We need a Rust engineer. Rust and PostgreSQL required. \
        Experience with Kafka, Kubernetes and C++ is a plus. Rust, Rust.";

    #[test]
    fn test_extract_keywords_ranks_by_frequency() {
        let keywords = extract_keywords(JD);
        assert_eq!(keywords[0], "rust");
        assert!(keywords.contains(&"postgresql".to_string()));
        assert!(keywords.contains(&"c++".to_string()));
        assert!(!keywords.contains(&"and".to_string()), "stopwords dropped");
        assert!(!keywords.contains(&"experience".to_string()), "boilerplate dropped");
    }

    #[test]
    fn test_extract_keywords_is_capped() {
        let jd: String = (0..100).map(|i| format!("skill{i} ")).collect();
        assert_eq!(extract_keywords(&jd).len(), MAX_KEYWORDS);
    }

    #[test]
    fn test_keywords_keep_dotted_names() {
        let keywords = extract_keywords("Node.js and Vue.js. Also node.js!");
        assert_eq!(keywords[0], "node.js");
        assert!(keywords.contains(&"vue.js".to_string()));
    }

    #[test]
    fn test_coverage_score() {
        let keywords = vec!["rust".to_string(), "kafka".to_string()];
        let coverage = keyword_coverage("Built services in Rust.", &keywords);
        assert_eq!(coverage.score, 50);
        assert_eq!(coverage.matched, vec!["rust"]);
        assert_eq!(coverage.missing, vec!["kafka"]);
        assert_eq!(keyword_coverage("anything", &[]).score, 0);
    }

    #[test]
    fn test_tailored_resume_scores_higher() {
        let original = "## Experience\n- Wrote Python scripts";
        let tailored = "## Experience\n- Built Rust services on PostgreSQL and Kafka";
        assert!(match_score(tailored, JD) > match_score(original, JD));
        assert!(match_score(tailored, JD) <= 100);
    }

    #[test]
    fn test_improvement_metrics() {
        let original = "Jane\n## Experience\n- Wrote Python scripts\n## Education\nBSc\n";
        let raw = "Jane\n## Experience\n• Built Rust services on PostgreSQL — at scale\n## Education\nBSc\n";
        let tailored = "Jane\n## Experience\n- Built Rust services on PostgreSQL - at scale\n## Education\nBSc\n";
        let metrics = improvement_metrics(original, raw, tailored, JD);

        assert!(metrics.keywords_added.contains(&"rust".to_string()));
        assert!(metrics.keywords_added.contains(&"postgresql".to_string()));
        assert_eq!(metrics.sections_changed, vec!["Experience"]);
        assert_eq!(metrics.word_count_delta, 5);
        // Missing skills heading is still reported on both sides; glyph and dash issues were fixed.
        assert_eq!(metrics.ats_fixes_applied, 2);
    }
}
