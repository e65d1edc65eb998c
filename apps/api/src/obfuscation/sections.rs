//! Resume section partitioning.
//!
//! A resume is split at heading lines into contiguous byte ranges, so every
//! byte of the input belongs to exactly one section's heading or body.
//! Heading detection is heuristic: markdown headings, known section names
//! on their own line, and all-caps lines after the first line.

use std::ops::Range;

use serde::{Deserialize, Serialize};

const MAX_HEADING_CHARS: usize = 40;

#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum SectionKind {
    /// Lines before the first heading (name, contact details).
    Contact,
    Summary,
    Experience,
    Education,
    Skills,
    Projects,
    Certifications,
    Other,
}

impl SectionKind {
    pub fn display_name(&self) -> &'static str {
        match self {
            SectionKind::Contact => "Contact",
            SectionKind::Summary => "Summary",
            SectionKind::Experience => "Experience",
            SectionKind::Education => "Education",
            SectionKind::Skills => "Skills",
            SectionKind::Projects => "Projects",
            SectionKind::Certifications => "Certifications",
            SectionKind::Other => "Other",
        }
    }
}

/// Exact heading names (normalised) and the kind they map to.
const SECTION_ALIASES: &[(&str, SectionKind)] = &[
    ("summary", SectionKind::Summary),
    ("professional summary", SectionKind::Summary),
    ("career summary", SectionKind::Summary),
    ("executive summary", SectionKind::Summary),
    ("profile", SectionKind::Summary),
    ("professional profile", SectionKind::Summary),
    ("objective", SectionKind::Summary),
    ("career objective", SectionKind::Summary),
    ("about me", SectionKind::Summary),
    ("overview", SectionKind::Summary),
    ("experience", SectionKind::Experience),
    ("work experience", SectionKind::Experience),
    ("professional experience", SectionKind::Experience),
    ("relevant experience", SectionKind::Experience),
    ("employment", SectionKind::Experience),
    ("employment history", SectionKind::Experience),
    ("work history", SectionKind::Experience),
    ("career history", SectionKind::Experience),
    ("education", SectionKind::Education),
    ("education and training", SectionKind::Education),
    ("academic background", SectionKind::Education),
    ("skills", SectionKind::Skills),
    ("technical skills", SectionKind::Skills),
    ("core skills", SectionKind::Skills),
    ("key skills", SectionKind::Skills),
    ("core competencies", SectionKind::Skills),
    ("competencies", SectionKind::Skills),
    ("areas of expertise", SectionKind::Skills),
    ("technologies", SectionKind::Skills),
    ("tools and technologies", SectionKind::Skills),
    ("projects", SectionKind::Projects),
    ("personal projects", SectionKind::Projects),
    ("selected projects", SectionKind::Projects),
    ("key projects", SectionKind::Projects),
    ("certifications", SectionKind::Certifications),
    ("certificates", SectionKind::Certifications),
    ("licenses and certifications", SectionKind::Certifications),
];

#[derive(Debug, Clone, PartialEq)]
pub struct Section {
    pub kind: SectionKind,
    /// Heading text without markup; empty for the contact preamble.
    pub title: String,
    /// Byte range of the heading line, newline included.
    pub heading: Option<Range<usize>>,
    /// Byte range of everything after the heading up to the next heading.
    pub body: Range<usize>,
}

impl Section {
    /// Key used to pair a tailored section with its original counterpart.
    pub fn match_key(&self) -> String {
        match self.kind {
            SectionKind::Other => format!("other:{}", normalize_title(&self.title)),
            kind => kind.display_name().to_lowercase(),
        }
    }

    pub fn body_text<'a>(&self, source: &'a str) -> &'a str {
        &source[self.body.clone()]
    }

    /// Non-whitespace characters in the body.
    pub fn content_chars(&self, source: &str) -> usize {
        self.body_text(source)
            .chars()
            .filter(|c| !c.is_whitespace())
            .count()
    }
}

/// Splits `text` into sections. The returned ranges tile the input exactly.
pub fn partition_sections(text: &str) -> Vec<Section> {
    let mut sections: Vec<Section> = Vec::new();
    let mut offset = 0;
    let mut seen_content = false;

    for line in text.split_inclusive('\n') {
        let start = offset;
        offset += line.len();

        if let Some((kind, title)) = detect_heading(line, seen_content) {
            if let Some(last) = sections.last_mut() {
                last.body.end = start;
            } else if start > 0 {
                sections.push(Section {
                    kind: SectionKind::Contact,
                    title: String::new(),
                    heading: None,
                    body: 0..start,
                });
            }
            sections.push(Section {
                kind,
                title,
                heading: Some(start..offset),
                body: offset..offset,
            });
        } else if let Some(last) = sections.last_mut() {
            last.body.end = offset;
        }

        if !line.trim().is_empty() {
            seen_content = true;
        }
    }

    match sections.last_mut() {
        Some(last) => last.body.end = text.len(),
        None if !text.is_empty() => sections.push(Section {
            kind: SectionKind::Contact,
            title: String::new(),
            heading: None,
            body: 0..text.len(),
        }),
        None => {}
    }

    sections
}

/// Classifies a heading title into a section kind. Loose keyword matching
/// applies only to lines already known to be headings.
pub fn classify_title(title: &str) -> SectionKind {
    let normalized = normalize_title(title);
    if let Some(kind) = alias_kind(&normalized) {
        return kind;
    }
    if normalized.contains("experience") || normalized.contains("employment") {
        SectionKind::Experience
    } else if normalized.contains("education") || normalized.contains("academic") {
        SectionKind::Education
    } else if normalized.contains("skill") || normalized.contains("competenc") {
        SectionKind::Skills
    } else if normalized.contains("project") {
        SectionKind::Projects
    } else if normalized.contains("certif") || normalized.contains("licen") {
        SectionKind::Certifications
    } else if normalized.contains("summary")
        || normalized.contains("profile")
        || normalized.contains("objective")
    {
        SectionKind::Summary
    } else {
        SectionKind::Other
    }
}

fn detect_heading(line: &str, seen_content: bool) -> Option<(SectionKind, String)> {
    let trimmed = line.trim();
    if trimmed.is_empty() {
        return None;
    }

    // Markdown heading: 1–6 '#' then a space.
    let hashes = trimmed.chars().take_while(|c| *c == '#').count();
    if (1..=6).contains(&hashes) && trimmed[hashes..].starts_with(' ') {
        let title = strip_markup(&trimmed[hashes..]).to_string();
        if title.is_empty() {
            return None;
        }
        let kind = classify_title(&title);
        return Some((kind, title));
    }

    let title = strip_markup(trimmed);
    if title.is_empty() || title.chars().count() > MAX_HEADING_CHARS {
        return None;
    }

    if let Some(kind) = alias_kind(&normalize_title(title)) {
        return Some((kind, title.to_string()));
    }

    // The first line is usually the candidate's name, often in capitals.
    if seen_content && is_all_caps_heading(title) {
        return Some((classify_title(title), title.to_string()));
    }

    None
}

fn is_all_caps_heading(title: &str) -> bool {
    let letters = title.chars().filter(|c| c.is_alphabetic()).count();
    letters >= 3
        && !title.chars().any(|c| c.is_lowercase())
        && !title.starts_with(['-', '*', '+'])
        && !title.chars().any(|c| c.is_ascii_digit())
}

fn strip_markup(text: &str) -> &str {
    text.trim()
        .trim_matches(|c: char| c == '*' || c == '_' || c.is_whitespace())
        .trim_end_matches(':')
        .trim()
}

fn alias_kind(normalized: &str) -> Option<SectionKind> {
    SECTION_ALIASES
        .iter()
        .find(|(alias, _)| *alias == normalized)
        .map(|(_, kind)| *kind)
}

fn normalize_title(title: &str) -> String {
    title
        .to_lowercase()
        .replace('&', " and ")
        .chars()
        .map(|c| if c.is_alphanumeric() { c } else { ' ' })
        .collect::<String>()
        .split_whitespace()
        .collect::<Vec<_>>()
        .join(" ")
}
