//! Resume obfuscation.
//!
//! Every visible line of every locked section is swapped for an opaque
//! token; the token → text pairs form the content map. Headings, bullet
//! markers, indentation and blank lines stay visible so the locked resume
//! keeps its shape. Substituting the map back into the obfuscated text
//! yields the tailored resume byte for byte.

use std::collections::BTreeMap;

use regex::Regex;
use serde::{Deserialize, Serialize};
use sha2::{Digest, Sha256};
use thiserror::Error;

use crate::obfuscation::free_reveal::{build_free_reveal, select_free_reveal, FreeReveal};
use crate::obfuscation::sections::partition_sections;

const TOKEN_PREFIX: &str = "[[LOCKED-";
const TOKEN_SUFFIX: &str = "]]";
const SALT_HEX_LEN: usize = 8;

#[derive(Debug, Error, PartialEq)]
pub enum ObfuscationError {
    #[error("Token {0} has no entry in the content map")]
    UnknownToken(String),

    #[error("Content map entry {0} does not appear in the obfuscated resume")]
    UnusedEntry(String),

    #[error("Malformed content map key: {0}")]
    MalformedKey(String),
}

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct ObfuscatedResume {
    pub obfuscated_resume: String,
    pub content_map: BTreeMap<String, String>,
    pub free_reveal: Option<FreeReveal>,
}

/// Locks every section of `tailored` except the free-reveal section.
///
/// Empty `original` or `tailored` input yields the tailored text unchanged,
/// an empty map and no reveal.
pub fn obfuscate(original: &str, tailored: &str) -> ObfuscatedResume {
    if original.trim().is_empty() || tailored.trim().is_empty() {
        return ObfuscatedResume {
            obfuscated_resume: tailored.to_string(),
            content_map: BTreeMap::new(),
            free_reveal: None,
        };
    }

    let original_sections = partition_sections(original);
    let tailored_sections = partition_sections(tailored);
    let choice = select_free_reveal(original, &original_sections, tailored, &tailored_sections);

    let salt = token_salt(tailored);
    let mut tokens = TokenMinter::new(salt);
    let mut obfuscated = String::with_capacity(tailored.len());

    for (idx, section) in tailored_sections.iter().enumerate() {
        if let Some(heading) = &section.heading {
            obfuscated.push_str(&tailored[heading.clone()]);
        }
        let body = section.body_text(tailored);
        if choice.is_some_and(|c| c.tailored == idx) {
            obfuscated.push_str(body);
        } else {
            lock_lines(body, &mut tokens, &mut obfuscated);
        }
    }

    let free_reveal = choice.map(|c| {
        build_free_reveal(original, &original_sections, tailored, &tailored_sections, c)
    });

    ObfuscatedResume {
        obfuscated_resume: obfuscated,
        content_map: tokens.map,
        free_reveal,
    }
}

/// Restores the tailored resume from its obfuscated form.
///
/// Every token must have a map entry and every entry must be used exactly once.
pub fn reconstruct(
    obfuscated: &str,
    content_map: &BTreeMap<String, String>,
) -> Result<String, ObfuscationError> {
    let Some(first_key) = content_map.keys().next() else {
        return Ok(obfuscated.to_string());
    };
    let salt = key_salt(first_key).ok_or_else(|| ObfuscationError::MalformedKey(first_key.clone()))?;
    let pattern = format!(
        r"{}{}-\d+{}",
        regex::escape(TOKEN_PREFIX),
        salt,
        regex::escape(TOKEN_SUFFIX)
    );
    let token_re = Regex::new(&pattern).map_err(|_| ObfuscationError::MalformedKey(first_key.clone()))?;

    let mut restored = String::with_capacity(obfuscated.len());
    let mut last = 0;
    let mut used = 0usize;
    for m in token_re.find_iter(obfuscated) {
        let value = content_map
            .get(m.as_str())
            .ok_or_else(|| ObfuscationError::UnknownToken(m.as_str().to_string()))?;
        restored.push_str(&obfuscated[last..m.start()]);
        restored.push_str(value);
        last = m.end();
        used += 1;
    }
    restored.push_str(&obfuscated[last..]);

    if used != content_map.len() {
        let unused = content_map
            .keys()
            .find(|k| !obfuscated.contains(k.as_str()))
            .cloned()
            .unwrap_or_else(|| first_key.clone());
        return Err(ObfuscationError::UnusedEntry(unused));
    }
    Ok(restored)
}

struct TokenMinter {
    salt: String,
    next: usize,
    map: BTreeMap<String, String>,
}

impl TokenMinter {
    fn new(salt: String) -> Self {
        Self {
            salt,
            next: 1,
            map: BTreeMap::new(),
        }
    }

    fn mint(&mut self, text: &str) -> String {
        let token = format!("{TOKEN_PREFIX}{}-{}{TOKEN_SUFFIX}", self.salt, self.next);
        self.next += 1;
        self.map.insert(token.clone(), text.to_string());
        token
    }
}

/// Replaces each non-blank line's content with a token, keeping indentation,
/// the bullet marker, trailing whitespace and the line ending visible.
fn lock_lines(body: &str, tokens: &mut TokenMinter, out: &mut String) {
    for line in body.split_inclusive('\n') {
        let content_end = line.trim_end().len();
        let (content, trailing) = line.split_at(content_end);
        let prefix_len = visible_prefix_len(content);
        let (prefix, locked) = content.split_at(prefix_len);

        out.push_str(prefix);
        if !locked.is_empty() {
            out.push_str(&tokens.mint(locked));
        }
        out.push_str(trailing);
    }
}

/// Length of leading whitespace plus an optional `-`, `*`, `+` or `•` bullet and its space.
fn visible_prefix_len(content: &str) -> usize {
    let indent = content.len() - content.trim_start().len();
    let rest = &content[indent..];
    let bullet = ['-', '*', '+', '\u{2022}']
        .iter()
        .find(|b| rest.starts_with(**b) && rest[b.len_utf8()..].starts_with(' '))
        .map(|b| b.len_utf8() + 1)
        .unwrap_or(0);
    indent + bullet
}

/// Per-document salt so tokens never collide with text already in the resume.
fn token_salt(tailored: &str) -> String {
    let mut nonce = 0u32;
    loop {
        let mut hasher = Sha256::new();
        hasher.update(tailored.as_bytes());
        hasher.update(nonce.to_le_bytes());
        let digest = hex::encode(hasher.finalize());
        let salt = digest[..SALT_HEX_LEN].to_string();
        if !tailored.contains(&format!("{TOKEN_PREFIX}{salt}")) {
            return salt;
        }
        nonce += 1;
    }
}

fn key_salt(key: &str) -> Option<&str> {
    let rest = key.strip_prefix(TOKEN_PREFIX)?;
    let salt = rest.get(..SALT_HEX_LEN)?;
    salt.chars()
        .all(|c| c.is_ascii_hexdigit())
        .then_some(salt)
}

#[cfg(test)]
mod tests {
    use super::*;
    use std::collections::HashSet;

    const ORIGINAL: &str = "Jane Doe\njane@example.com\n\n## Summary\nEngineer.\n\n## Experience\n- Acme: worked on APIs\n\n## Skills\nRust\n";
    const TAILORED: &str = "Jane Doe\njane@example.com\n\n## Summary\nBackend engineer shipping payment systems.\n\n## Experience\n- Acme: designed REST APIs handling $2M/day\n  - Cut p99 latency 40%\n\n## Skills\nRust, PostgreSQL, Kafka\n";

    fn assert_round_trip(original: &str, tailored: &str) {
        let result = obfuscate(original, tailored);
        assert_eq!(
            reconstruct(&result.obfuscated_resume, &result.content_map).unwrap(),
            tailored
        );
    }

    #[test]
    fn test_round_trip_reconstructs_tailored_exactly() {
        assert_round_trip(ORIGINAL, TAILORED);
    }

    #[test]
    fn test_round_trip_on_assorted_inputs() {
        let cases = [
            ("a", "no headings at all\r\nwindows endings\r\n"),
            ("## Skills\nx", "## Skills\n\n\n   \n- \n* item\n•  odd bullet"),
            ("ORIGINAL", "trailing spaces   \n\tTabbed line\t\n"),
            ("## Experience\nx", "## Experience\n[[LOCKED-deadbeef-1]] literal\n## Education\nBSc"),
            ("résumé", "Zoë Ünal\n## Éducation\nÉcole — Paris\n"),
        ];
        for (original, tailored) in cases {
            assert_round_trip(original, tailored);
        }
    }

    #[test]
    fn test_tokens_are_unique_and_all_mapped() {
        let result = obfuscate(ORIGINAL, TAILORED);
        let token_re = Regex::new(r"\[\[LOCKED-[0-9a-f]{8}-\d+\]\]").unwrap();
        let found: Vec<&str> = token_re
            .find_iter(&result.obfuscated_resume)
            .map(|m| m.as_str())
            .collect();
        let distinct: HashSet<&str> = found.iter().copied().collect();
        assert_eq!(found.len(), distinct.len(), "tokens must be unique");
        assert_eq!(found.len(), result.content_map.len());
        assert!(found.iter().all(|t| result.content_map.contains_key(*t)));
    }

    #[test]
    fn test_reveal_section_left_plain_and_others_locked() {
        let result = obfuscate(ORIGINAL, TAILORED);
        let reveal = result.free_reveal.as_ref().expect("reveal");
        assert_eq!(reveal.section, "Experience");
        assert!(result.obfuscated_resume.contains("- Acme: designed REST APIs handling $2M/day"));
        assert!(result.obfuscated_resume.contains("  - Cut p99 latency 40%"));
        assert!(!result.obfuscated_resume.contains("Backend engineer"));
        assert!(!result.obfuscated_resume.contains("PostgreSQL"));
        assert!(!result.obfuscated_resume.contains("jane@example.com"));
        // Headings stay visible.
        assert!(result.obfuscated_resume.contains("## Skills\n"));
        assert!(result.content_map.values().all(|v| !v.contains("designed REST APIs")));
    }

    #[test]
    fn test_bullet_markers_stay_visible() {
        let result = obfuscate("## Skills\nRust\n", "## Skills\nRust\n## Projects\n- Built a compiler\n");
        assert!(
            result.obfuscated_resume.contains("## Projects\n- [[LOCKED-"),
            "got {}",
            result.obfuscated_resume
        );
    }

    #[test]
    fn test_empty_inputs_pass_through() {
        for (original, tailored) in [("", "tailored text"), ("original", ""), ("  \n", "x")] {
            let result = obfuscate(original, tailored);
            assert_eq!(result.obfuscated_resume, tailored);
            assert!(result.content_map.is_empty());
            assert!(result.free_reveal.is_none());
        }
    }

    #[test]
    fn test_obfuscation_is_deterministic() {
        assert_eq!(obfuscate(ORIGINAL, TAILORED), obfuscate(ORIGINAL, TAILORED));
    }

    #[test]
    fn test_reconstruct_rejects_unknown_token() {
        let result = obfuscate(ORIGINAL, TAILORED);
        let mut map = result.content_map.clone();
        let removed = map.keys().next().cloned().unwrap();
        map.remove(&removed);
        assert_eq!(
            reconstruct(&result.obfuscated_resume, &map),
            Err(ObfuscationError::UnknownToken(removed))
        );
    }

    #[test]
    fn test_reconstruct_rejects_unused_entry() {
        let result = obfuscate(ORIGINAL, TAILORED);
        let first = result.content_map.keys().next().cloned().unwrap();
        let tampered = result.obfuscated_resume.replacen(&first, "", 1);
        assert_eq!(
            reconstruct(&tampered, &result.content_map),
            Err(ObfuscationError::UnusedEntry(first))
        );
    }

    #[test]
    fn test_reconstruct_with_empty_map_is_identity() {
        assert_eq!(reconstruct("as is", &BTreeMap::new()).unwrap(), "as is");
    }
}
