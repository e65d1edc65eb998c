//! ATS sanitizer: deterministic clean-up applied to model output before it is
//! shown or stored. Applicant tracking systems choke on decorative glyphs,
//! pipe-separated contact lines and resumes without the standard headers.

/// Bullet glyphs normalised to `-`.
const BULLET_GLYPHS: &[char] = &[
    '\u{2022}', // •
    '\u{25CF}', // ●
    '\u{25CB}', // ○
    '\u{25E6}', // ◦
    '\u{25AA}', // ▪
    '\u{25AB}', // ▫
    '\u{25A0}', // ■
    '\u{25A1}', // □
    '\u{25BA}', // ►
    '\u{25B8}', // ▸
    '\u{25B6}', // ▶
    '\u{2023}', // ‣
    '\u{2043}', // ⁃
    '\u{2219}', // ∙
    '\u{27A2}', // ➢
    '\u{27A4}', // ➤
    '\u{2714}', // ✔
    '\u{2713}', // ✓
    '\u{2605}', // ★
];

/// Dash variants normalised to `-`.
const DASHES: &[char] = &[
    '\u{2014}', // em dash
    '\u{2013}', // en dash
    '\u{2012}', // figure dash
    '\u{2015}', // horizontal bar
];

/// Lines at the top of the resume treated as the contact block.
const CONTACT_BLOCK_LINES: usize = 10;

/// Lines scanned for the required section markers.
const SECTION_SCAN_LINES: usize = 50;

/// Longest line still considered a section heading rather than prose.
const MAX_MARKER_LINE_CHARS: usize = 60;

/// Sections every ATS expects, as (marker keyword, inserted heading).
const REQUIRED_SECTIONS: &[(&str, &str)] = &[
    ("experience", "## Experience"),
    ("education", "## Education"),
    ("skills", "## Skills"),
];

/// Applies the full ATS pass:
/// 1. bullet glyphs → `-`
/// 2. em/en dashes → `-`
/// 3. pipe-separated lines within the first 10 lines are split onto separate lines
/// 4. missing Experience/Education/Skills headings are inserted after the contact block
pub fn sanitize_resume_for_ats(resume: &str) -> String {
    let text = light_sanitize(resume);

    let mut lines: Vec<String> = Vec::new();
    for (idx, line) in text.split('\n').enumerate() {
        if idx < CONTACT_BLOCK_LINES && line.contains('|') {
            lines.extend(split_pipe_line(line));
        } else {
            lines.push(line.to_string());
        }
    }

    let missing: Vec<&str> = REQUIRED_SECTIONS
        .iter()
        .filter(|(marker, _)| !has_section_marker(&lines, marker))
        .map(|(_, heading)| *heading)
        .collect();

    if !missing.is_empty() {
        // Leading blank lines would push the headings out of the scan window.
        let leading = lines.iter().take_while(|l| l.trim().is_empty()).count();
        lines.drain(..leading);
        let at = contact_block_end(&lines);
        let mut inserted = Vec::with_capacity(missing.len() * 2 + 1);
        if at > 0 && !lines[at - 1].trim().is_empty() {
            inserted.push(String::new());
        }
        for heading in missing {
            inserted.push(heading.to_string());
            inserted.push(String::new());
        }
        lines.splice(at..at, inserted);
    }

    lines.join("\n")
}

/// Glyph-only pass (steps 1–2) for text where structural edits are unsafe,
/// e.g. a resume excerpt or an uploaded document.
pub fn light_sanitize(text: &str) -> String {
    text.chars()
        .map(|c| {
            if BULLET_GLYPHS.contains(&c) || DASHES.contains(&c) {
                '-'
            } else {
                c
            }
        })
        .collect()
}

/// Lists the ATS problems `sanitize_resume_for_ats` would fix, without fixing them.
pub fn detect_ats_issues(resume: &str) -> Vec<String> {
    let mut issues = Vec::new();

    if resume.chars().any(|c| BULLET_GLYPHS.contains(&c)) {
        issues.push("Decorative bullet glyphs may not parse; use plain hyphens".to_string());
    }
    if resume.chars().any(|c| DASHES.contains(&c)) {
        issues.push("Em/en dashes may be garbled by some ATS parsers".to_string());
    }
    if resume
        .split('\n')
        .take(CONTACT_BLOCK_LINES)
        .any(|line| line.contains('|'))
    {
        issues.push("Pipe-separated contact details should be on separate lines".to_string());
    }

    let lines: Vec<String> = resume.split('\n').map(str::to_string).collect();
    for (marker, heading) in REQUIRED_SECTIONS {
        if !has_section_marker(&lines, marker) {
            let name = heading.trim_start_matches("## ");
            issues.push(format!("Missing a recognisable \"{name}\" section heading"));
        }
    }

    issues
}

fn split_pipe_line(line: &str) -> Vec<String> {
    let parts: Vec<String> = line
        .split('|')
        .map(str::trim)
        .filter(|p| !p.is_empty())
        .map(str::to_string)
        .collect();
    if parts.is_empty() {
        // Keep the slot so later lines never move up into the contact window.
        vec![String::new()]
    } else {
        parts
    }
}

fn has_section_marker(lines: &[String], marker: &str) -> bool {
    lines
        .iter()
        .take(SECTION_SCAN_LINES)
        .any(|line| is_marker_line(line, marker))
}

fn is_marker_line(line: &str, marker: &str) -> bool {
    let stripped = strip_heading_markup(line);
    stripped.chars().count() <= MAX_MARKER_LINE_CHARS
        && stripped.to_lowercase().contains(marker)
}

fn strip_heading_markup(line: &str) -> &str {
    line.trim()
        .trim_start_matches(['#', '*', '_', ' '])
        .trim_end_matches([':', '*', '_', ' '])
}

fn is_any_marker_line(line: &str) -> bool {
    REQUIRED_SECTIONS
        .iter()
        .any(|(marker, _)| is_marker_line(line, marker))
}

/// Index just past the contact block: the leading run of non-blank lines,
/// stopping at a blank line or a heading, capped at `CONTACT_BLOCK_LINES`.
fn contact_block_end(lines: &[String]) -> usize {
    let mut i = 0;
    while i < lines.len() && i < CONTACT_BLOCK_LINES {
        let line = lines[i].trim();
        if line.is_empty() || line.starts_with('#') || is_any_marker_line(line) {
            break;
        }
        i += 1;
    }
    i
}
