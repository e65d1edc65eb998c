//! Free-reveal selection: the one tailored section shown in full, next to its
//! original counterpart, as a quality preview before payment.

use serde::{Deserialize, Serialize};

use crate::obfuscation::sections::{Section, SectionKind};

/// A section needs this many non-whitespace characters to count as "substantial".
const SUBSTANTIAL_SECTION_CHARS: usize = 80;

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct FreeReveal {
    /// Heading as it appears in the tailored resume.
    pub section: String,
    pub kind: SectionKind,
    pub before: String,
    pub after: String,
}

/// Indices of the chosen section as `(tailored_index, original_index)`.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct RevealChoice {
    pub tailored: usize,
    pub original: usize,
}

/// Picks the section to reveal. Only headed, non-empty sections present in
/// both resumes qualify. Preference: Experience, then the first substantial
/// section in document order, then the first qualifying section.
pub fn select_free_reveal(
    original: &str,
    original_sections: &[Section],
    tailored: &str,
    tailored_sections: &[Section],
) -> Option<RevealChoice> {
    let candidates: Vec<RevealChoice> = tailored_sections
        .iter()
        .enumerate()
        .filter(|(_, s)| s.kind != SectionKind::Contact && s.content_chars(tailored) > 0)
        .filter_map(|(t_idx, t_section)| {
            let key = t_section.match_key();
            original_sections
                .iter()
                .position(|o| {
                    o.kind != SectionKind::Contact
                        && o.match_key() == key
                        && o.content_chars(original) > 0
                })
                .map(|o_idx| RevealChoice {
                    tailored: t_idx,
                    original: o_idx,
                })
        })
        .collect();

    candidates
        .iter()
        .find(|c| tailored_sections[c.tailored].kind == SectionKind::Experience)
        .or_else(|| {
            candidates.iter().find(|c| {
                tailored_sections[c.tailored].content_chars(tailored) >= SUBSTANTIAL_SECTION_CHARS
            })
        })
        .or_else(|| candidates.first())
        .copied()
}

/// Builds the before/after payload for a chosen section.
pub fn build_free_reveal(
    original: &str,
    original_sections: &[Section],
    tailored: &str,
    tailored_sections: &[Section],
    choice: RevealChoice,
) -> FreeReveal {
    let after = &tailored_sections[choice.tailored];
    let before = &original_sections[choice.original];
    let section = if after.title.is_empty() {
        after.kind.display_name().to_string()
    } else {
        after.title.clone()
    };

    FreeReveal {
        section,
        kind: after.kind,
        before: before.body_text(original).trim().to_string(),
        after: after.body_text(tailored).trim().to_string(),
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::obfuscation::sections::partition_sections;

    fn choose(original: &str, tailored: &str) -> Option<FreeReveal> {
        let o = partition_sections(original);
        let t = partition_sections(tailored);
        select_free_reveal(original, &o, tailored, &t)
            .map(|c| build_free_reveal(original, &o, tailored, &t, c))
    }

    #[test]
    fn test_experience_preferred() {
        let original = "Jane\n## Summary\nEngineer\n## Experience\nDid work\n";
        let tailored = "Jane\n## Summary\nSenior engineer with a long and detailed summary that is comfortably over eighty characters.\n## Work Experience\nLed work\n";
        let reveal = choose(original, tailored).expect("reveal");
        assert_eq!(reveal.kind, SectionKind::Experience);
        assert_eq!(reveal.section, "Work Experience");
        assert_eq!(reveal.before, "Did work");
        assert_eq!(reveal.after, "Led work");
    }

    #[test]
    fn test_first_substantial_section_without_experience() {
        let long = "x".repeat(90);
        let original = format!("Jane\n## Summary\nshort\n## Projects\n{long}\n");
        let tailored = format!("Jane\n## Summary\nbrief\n## Projects\n{long} more\n");
        let reveal = choose(&original, &tailored).expect("reveal");
        assert_eq!(reveal.kind, SectionKind::Projects);
    }

    #[test]
    fn test_falls_back_to_first_common_section() {
        let original = "Jane\n## Skills\nRust\n## Education\nBSc\n";
        let tailored = "Jane\n## Skills\nRust, SQL\n## Education\nBSc CS\n";
        let reveal = choose(original, tailored).expect("reveal");
        assert_eq!(reveal.kind, SectionKind::Skills);
    }

    #[test]
    fn test_section_missing_from_original_is_never_chosen() {
        let original = "Jane\n## Education\nBSc\n";
        let tailored = "Jane\n## Experience\nLed work\n## Education\nBSc CS\n";
        let reveal = choose(original, tailored).expect("reveal");
        assert_eq!(reveal.kind, SectionKind::Education);
    }

    #[test]
    fn test_empty_original_section_is_not_a_candidate() {
        let original = "Jane\n## Experience\n\n## Skills\nRust\n";
        let tailored = "Jane\n## Experience\nLed work\n## Skills\nRust\n";
        let reveal = choose(original, tailored).expect("reveal");
        assert_eq!(reveal.kind, SectionKind::Skills);
    }

    #[test]
    fn test_no_common_sections_means_no_reveal() {
        assert!(choose("plain text resume", "## Experience\nLed work\n").is_none());
    }
}
