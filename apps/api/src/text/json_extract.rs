//! Best-effort recovery of a JSON value embedded in free-form model output.
//!
//! Models are told to answer with bare JSON and routinely ignore it: they wrap
//! the object in a code fence, prepend a sentence, or spell a number out.
//! Nothing here returns an error; callers get `None`/[`LlmParse::Unparseable`]
//! and must fall back to a deterministic default.

use std::sync::LazyLock;

use regex::Regex;
use serde::de::DeserializeOwned;
use serde_json::Value;

/// The one field whose spelled-out numerals ("eighty-five") are repaired.
const NUMERAL_REPAIR_FIELD: &str = "score";

static FENCED_OBJECT_RE: LazyLock<Regex> = LazyLock::new(|| {
    Regex::new(r"(?s)```[A-Za-z]*[ \t]*\r?\n?\s*(\{.*?\})\s*```").expect("valid regex")
});

static NUMERAL_FIELD_RE: LazyLock<Regex> = LazyLock::new(|| {
    Regex::new(&format!(
        r#""{NUMERAL_REPAIR_FIELD}"\s*:\s*"?([A-Za-z][A-Za-z\- ]*[A-Za-z])"?"#
    ))
    .expect("valid regex")
});

/// Tagged result of parsing structured model output.
///
/// The only ways out of an `LlmParse` require a fallback, so a malformed
/// response can never surface as an error to the client.
#[derive(Debug, Clone, PartialEq)]
pub enum LlmParse<T> {
    Parsed(T),
    Unparseable,
}

impl<T: DeserializeOwned> LlmParse<T> {
    pub fn from_text(text: &str) -> Self {
        match parse_json_from_text(text).map(serde_json::from_value::<T>) {
            Some(Ok(value)) => LlmParse::Parsed(value),
            Some(Err(e)) => {
                tracing::debug!("Model JSON did not match the expected shape: {e}");
                LlmParse::Unparseable
            }
            None => LlmParse::Unparseable,
        }
    }
}

impl<T> LlmParse<T> {
    pub fn is_parsed(&self) -> bool {
        matches!(self, LlmParse::Parsed(_))
    }

    pub fn or_fallback(self, fallback: impl FnOnce() -> T) -> T {
        match self {
            LlmParse::Parsed(value) => value,
            LlmParse::Unparseable => fallback(),
        }
    }
}

/// Locates a JSON object/array inside `text` and returns its exact substring.
///
/// Candidates, first valid wins:
/// 1. `{...}` inside a fenced code block
/// 2. the first balanced `{...}` span
/// 3. the first balanced `[...]` span
/// 4. everything between the first `{` and the last `}`
pub fn extract_json(text: &str) -> Option<&str> {
    let fenced = FENCED_OBJECT_RE
        .captures_iter(text)
        .filter_map(|caps| caps.get(1).map(|m| m.as_str()));

    let candidates = fenced
        .chain(balanced_span(text, '{', '}'))
        .chain(balanced_span(text, '[', ']'))
        .chain(outer_object_span(text));

    for candidate in candidates {
        if serde_json::from_str::<Value>(candidate).is_ok() {
            return Some(candidate);
        }
    }
    None
}

/// Parses the JSON value embedded in `text`. If nothing parses, spelled-out
/// numbers in the `score` field are converted to digits and extraction is retried.
pub fn parse_json_from_text(text: &str) -> Option<Value> {
    if let Some(json) = extract_json(text) {
        return serde_json::from_str(json).ok();
    }

    let repaired = repair_numeral_words(text);
    if repaired == text {
        return None;
    }
    extract_json(&repaired).and_then(|json| serde_json::from_str(json).ok())
}

/// Strips a wrapping code fence from plain-text model output (e.g. a resume).
pub fn strip_code_fences(text: &str) -> &str {
    let trimmed = text.trim();
    let Some(rest) = trimmed.strip_prefix("```") else {
        return trimmed;
    };
    // Drop the language tag line.
    let body = match rest.find('\n') {
        Some(pos) => &rest[pos + 1..],
        None => rest,
    };
    body.trim_end()
        .strip_suffix("```")
        .unwrap_or(body)
        .trim()
}

fn repair_numeral_words(text: &str) -> String {
    NUMERAL_FIELD_RE
        .replace_all(text, |caps: &regex::Captures| match words_to_number(&caps[1]) {
            Some(n) => format!("\"{NUMERAL_REPAIR_FIELD}\": {n}"),
            None => caps[0].to_string(),
        })
        .into_owned()
}

/// Converts English numerals up to the thousands ("eighty-five", "one hundred and ten").
pub(crate) fn words_to_number(words: &str) -> Option<u32> {
    let mut total = 0u32;
    let mut current = 0u32;
    let mut seen_any = false;

    for word in words
        .split(|c: char| c == '-' || c.is_whitespace())
        .filter(|w| !w.is_empty())
    {
        let word = word.to_ascii_lowercase();
        if word == "and" {
            continue;
        }
        match word.as_str() {
            "hundred" => current = current.max(1) * 100,
            "thousand" => {
                total += current.max(1) * 1000;
                current = 0;
            }
            other => current += small_numeral(other)?,
        }
        seen_any = true;
    }

    seen_any.then_some(total + current)
}

fn small_numeral(word: &str) -> Option<u32> {
    let n = match word {
        "zero" => 0,
        "one" => 1,
        "two" => 2,
        "three" => 3,
        "four" => 4,
        "five" => 5,
        "six" => 6,
        "seven" => 7,
        "eight" => 8,
        "nine" => 9,
        "ten" => 10,
        "eleven" => 11,
        "twelve" => 12,
        "thirteen" => 13,
        "fourteen" => 14,
        "fifteen" => 15,
        "sixteen" => 16,
        "seventeen" => 17,
        "eighteen" => 18,
        "nineteen" => 19,
        "twenty" => 20,
        "thirty" => 30,
        "forty" => 40,
        "fifty" => 50,
        "sixty" => 60,
        "seventy" => 70,
        "eighty" => 80,
        "ninety" => 90,
        _ => return None,
    };
    Some(n)
}

/// First `open`..`close` span with balanced delimiters, ignoring delimiters inside strings.
fn balanced_span(text: &str, open: char, close: char) -> Option<&str> {
    let start = text.find(open)?;
    let mut depth = 0usize;
    let mut in_string = false;
    let mut escaped = false;

    for (offset, c) in text[start..].char_indices() {
        if in_string {
            match c {
                _ if escaped => escaped = false,
                '\\' => escaped = true,
                '"' => in_string = false,
                _ => {}
            }
            continue;
        }
        match c {
            '"' => in_string = true,
            c if c == open => depth += 1,
            c if c == close => {
                depth -= 1;
                if depth == 0 {
                    return Some(&text[start..start + offset + c.len_utf8()]);
                }
            }
            _ => {}
        }
    }
    None
}

fn outer_object_span(text: &str) -> Option<&str> {
    let start = text.find('{')?;
    let end = text.rfind('}')?;
    (end > start).then(|| &text[start..=end])
}

#[cfg(test)]
mod tests {
    use super::*;
    use serde::Deserialize;
    use serde_json::json;

    #[test]
    fn test_fenced_block_returns_exact_object() {
        let text = "Here you go:\n```json\n{\"a\": {\"b\": [1, 2]}}\n```\nThanks!";
        assert_eq!(extract_json(text), Some("{\"a\": {\"b\": [1, 2]}}"));
    }

    #[test]
    fn test_fenced_block_without_language_tag() {
        let text = "```\n{\"ok\": true}\n```";
        assert_eq!(extract_json(text), Some("{\"ok\": true}"));
    }

    #[test]
    fn test_bare_object_with_prose() {
        let text = "Sure! {\"score\": 72, \"note\": \"has } brace\"} Hope that helps.";
        assert_eq!(
            extract_json(text),
            Some("{\"score\": 72, \"note\": \"has } brace\"}")
        );
    }

    #[test]
    fn test_bare_array() {
        let text = "Questions: [\"why rust?\", \"why now?\"] end";
        assert_eq!(extract_json(text), Some("[\"why rust?\", \"why now?\"]"));
    }

    #[test]
    fn test_invalid_spans_yield_none_and_nested_objects_survive() {
        let text = "{\"a\": {bad}, \"b\": 1}";
        assert_eq!(extract_json(text), None);
        let text = "x {\"outer\": {\"inner\": 1}} y";
        assert_eq!(extract_json(text), Some("{\"outer\": {\"inner\": 1}}"));
    }

    #[test]
    fn test_parse_fenced_json() {
        assert_eq!(
            parse_json_from_text("```json\n{\"a\":1}\n```"),
            Some(json!({"a": 1}))
        );
    }

    #[test]
    fn test_parse_not_json_is_none() {
        assert_eq!(parse_json_from_text("not json"), None);
    }

    #[test]
    fn test_numeral_word_score_is_repaired() {
        let text = "{\"score\": eighty-five, \"summary\": \"solid\"}";
        assert_eq!(
            parse_json_from_text(text),
            Some(json!({"score": 85, "summary": "solid"}))
        );
    }

    #[test]
    fn test_quoted_numeral_word_is_repaired() {
        let text = "{\"score\": \"thirty\"}";
        // Valid JSON as-is, so no repair is attempted.
        assert_eq!(parse_json_from_text(text), Some(json!({"score": "thirty"})));
        let broken = "{\"score\": \"thirty\", }";
        assert_eq!(parse_json_from_text(broken), None);
    }

    #[test]
    fn test_words_to_number() {
        assert_eq!(words_to_number("thirty"), Some(30));
        assert_eq!(words_to_number("Ninety Two"), Some(92));
        assert_eq!(words_to_number("one hundred and five"), Some(105));
        assert_eq!(words_to_number("two thousand twenty"), Some(2020));
        assert_eq!(words_to_number("lots"), None);
    }

    #[test]
    fn test_strip_code_fences() {
        assert_eq!(strip_code_fences("```markdown\n# Jane\n```"), "# Jane");
        assert_eq!(strip_code_fences("```\nbody\n```"), "body");
        assert_eq!(strip_code_fences("  plain  "), "plain");
    }

    #[derive(Debug, Deserialize, PartialEq)]
    struct Scored {
        score: u32,
    }

    #[test]
    fn test_llm_parse_uses_fallback_when_unparseable() {
        let parsed: LlmParse<Scored> = LlmParse::from_text("model refused");
        assert!(!parsed.is_parsed());
        assert_eq!(parsed.or_fallback(|| Scored { score: 50 }), Scored { score: 50 });
    }

    #[test]
    fn test_llm_parse_shape_mismatch_is_unparseable() {
        let parsed: LlmParse<Scored> = LlmParse::from_text("{\"score\": \"high\"}");
        assert_eq!(parsed, LlmParse::Unparseable);
    }

    #[test]
    fn test_llm_parse_success() {
        let parsed: LlmParse<Scored> = LlmParse::from_text("```json\n{\"score\": 91}\n```");
        assert_eq!(parsed.or_fallback(|| Scored { score: 0 }), Scored { score: 91 });
    }
}
