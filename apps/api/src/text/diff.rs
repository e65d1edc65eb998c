//! Word-level diff between the original and tailored resume, shaped for
//! display: adjacent edits are merged and tiny equalities stranded between
//! edits are folded into them so the UI shows whole-phrase changes.

use serde::{Deserialize, Serialize};

/// Above this many LCS cells the middle section is diffed line by line.
const MAX_LCS_CELLS: usize = 4_000_000;

/// Equalities this short (or whitespace-only) between two edits are folded into the edits.
const SMALL_EQUALITY_CHARS: usize = 2;

#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum DiffKind {
    Equal,
    Insert,
    Delete,
}

#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct DiffChunk {
    #[serde(rename = "type")]
    pub kind: DiffKind,
    pub text: String,
}

#[derive(Debug, Clone, Default, PartialEq, Eq, Serialize)]
#[serde(rename_all = "camelCase")]
pub struct DiffStats {
    pub words_added: usize,
    pub words_removed: usize,
    pub words_unchanged: usize,
}

/// Computes the change list turning `original` into `tailored`.
///
/// Concatenating the `Equal` and `Delete` chunks reproduces `original`;
/// concatenating `Equal` and `Insert` chunks reproduces `tailored`.
pub fn diff_texts(original: &str, tailored: &str) -> Vec<DiffChunk> {
    let a = tokenize_words(original);
    let b = tokenize_words(tailored);

    let prefix = a.iter().zip(&b).take_while(|(x, y)| x == y).count();
    let suffix = a[prefix..]
        .iter()
        .rev()
        .zip(b[prefix..].iter().rev())
        .take_while(|(x, y)| x == y)
        .count();

    let mut builder = ChunkBuilder::default();
    for token in &a[..prefix] {
        builder.push(DiffKind::Equal, token);
    }

    let a_mid = &a[prefix..a.len() - suffix];
    let b_mid = &b[prefix..b.len() - suffix];
    if a_mid.len().saturating_mul(b_mid.len()) <= MAX_LCS_CELLS {
        lcs_diff(a_mid, b_mid, &mut builder);
    } else {
        // Tokens are contiguous, so the middle is a plain byte range of each input.
        let prefix_bytes: usize = a[..prefix].iter().map(|t| t.len()).sum();
        let a_text = &original[prefix_bytes..prefix_bytes + byte_len(a_mid)];
        let b_text = &tailored[prefix_bytes..prefix_bytes + byte_len(b_mid)];
        let a_lines: Vec<&str> = a_text.split_inclusive('\n').collect();
        let b_lines: Vec<&str> = b_text.split_inclusive('\n').collect();
        if a_lines.len().saturating_mul(b_lines.len()) <= MAX_LCS_CELLS {
            lcs_diff(&a_lines, &b_lines, &mut builder);
        } else {
            builder.push(DiffKind::Delete, a_text);
            builder.push(DiffKind::Insert, b_text);
        }
    }

    for token in &a[a.len() - suffix..] {
        builder.push(DiffKind::Equal, token);
    }

    semantic_cleanup(builder.chunks)
}

/// Word counts per change type, for the summary shown above the diff.
pub fn diff_stats(chunks: &[DiffChunk]) -> DiffStats {
    let mut stats = DiffStats::default();
    for chunk in chunks {
        let words = chunk.text.split_whitespace().count();
        match chunk.kind {
            DiffKind::Equal => stats.words_unchanged += words,
            DiffKind::Insert => stats.words_added += words,
            DiffKind::Delete => stats.words_removed += words,
        }
    }
    stats
}

#[derive(Default)]
struct ChunkBuilder {
    chunks: Vec<DiffChunk>,
}

impl ChunkBuilder {
    fn push(&mut self, kind: DiffKind, text: &str) {
        if text.is_empty() {
            return;
        }
        match self.chunks.last_mut() {
            Some(last) if last.kind == kind => last.text.push_str(text),
            _ => self.chunks.push(DiffChunk {
                kind,
                text: text.to_string(),
            }),
        }
    }
}

fn lcs_diff(a: &[&str], b: &[&str], out: &mut ChunkBuilder) {
    let (n, m) = (a.len(), b.len());
    let width = m + 1;
    // table[i * width + j] = LCS length of a[i..] and b[j..]
    let mut table = vec![0u32; (n + 1) * width];
    for i in (0..n).rev() {
        for j in (0..m).rev() {
            table[i * width + j] = if a[i] == b[j] {
                table[(i + 1) * width + j + 1] + 1
            } else {
                table[(i + 1) * width + j].max(table[i * width + j + 1])
            };
        }
    }

    let (mut i, mut j) = (0, 0);
    while i < n && j < m {
        if a[i] == b[j] {
            out.push(DiffKind::Equal, a[i]);
            i += 1;
            j += 1;
        } else if table[(i + 1) * width + j] >= table[i * width + j + 1] {
            out.push(DiffKind::Delete, a[i]);
            i += 1;
        } else {
            out.push(DiffKind::Insert, b[j]);
            j += 1;
        }
    }
    for token in &a[i..] {
        out.push(DiffKind::Delete, token);
    }
    for token in &b[j..] {
        out.push(DiffKind::Insert, token);
    }
}

/// Collapses each run of edits (plus the small equalities inside it) into
/// one delete followed by one insert.
fn semantic_cleanup(chunks: Vec<DiffChunk>) -> Vec<DiffChunk> {
    let mut out = ChunkBuilder::default();
    let mut i = 0;

    while i < chunks.len() {
        if chunks[i].kind == DiffKind::Equal {
            out.push(DiffKind::Equal, &chunks[i].text);
            i += 1;
            continue;
        }

        let mut deleted = String::new();
        let mut inserted = String::new();
        let mut j = i;
        loop {
            let chunk = &chunks[j];
            match chunk.kind {
                DiffKind::Delete => deleted.push_str(&chunk.text),
                DiffKind::Insert => inserted.push_str(&chunk.text),
                DiffKind::Equal => {
                    deleted.push_str(&chunk.text);
                    inserted.push_str(&chunk.text);
                }
            }
            j += 1;
            if j >= chunks.len() {
                break;
            }
            if chunks[j].kind == DiffKind::Equal {
                let foldable = is_small_equality(&chunks[j].text)
                    && chunks
                        .get(j + 1)
                        .is_some_and(|next| next.kind != DiffKind::Equal);
                if !foldable {
                    break;
                }
            }
        }

        out.push(DiffKind::Delete, &deleted);
        out.push(DiffKind::Insert, &inserted);
        i = j;
    }

    out.chunks
}

fn is_small_equality(text: &str) -> bool {
    text.trim().is_empty() || text.chars().count() <= SMALL_EQUALITY_CHARS
}

#[derive(PartialEq, Clone, Copy)]
enum TokenClass {
    Word,
    Space,
    Other,
}

fn classify(c: char) -> TokenClass {
    if c.is_alphanumeric() || c == '_' || c == '\'' {
        TokenClass::Word
    } else if c.is_whitespace() {
        TokenClass::Space
    } else {
        TokenClass::Other
    }
}

/// Splits into word runs, whitespace runs, and single punctuation characters.
fn tokenize_words(text: &str) -> Vec<&str> {
    let mut tokens = Vec::new();
    let mut start = 0;
    let mut current: Option<TokenClass> = None;

    for (idx, c) in text.char_indices() {
        let class = classify(c);
        let continues = current == Some(class) && class != TokenClass::Other;
        if !continues && idx > start {
            tokens.push(&text[start..idx]);
            start = idx;
        }
        current = Some(class);
    }
    if start < text.len() {
        tokens.push(&text[start..]);
    }
    tokens
}

fn byte_len(tokens: &[&str]) -> usize {
    tokens.iter().map(|t| t.len()).sum()
}

#[cfg(test)]
mod tests {
    use super::*;

    fn rebuild(chunks: &[DiffChunk], skip: DiffKind) -> String {
        chunks
            .iter()
            .filter(|c| c.kind != skip)
            .map(|c| c.text.as_str())
            .collect()
    }

    fn assert_round_trip(original: &str, tailored: &str) {
        let chunks = diff_texts(original, tailored);
        assert_eq!(rebuild(&chunks, DiffKind::Insert), original);
        assert_eq!(rebuild(&chunks, DiffKind::Delete), tailored);
    }

    #[test]
    fn test_single_word_replacement() {
        let chunks = diff_texts("the quick fox", "the slow fox");
        assert_eq!(
            chunks,
            vec![
                DiffChunk { kind: DiffKind::Equal, text: "the ".into() },
                DiffChunk { kind: DiffKind::Delete, text: "quick".into() },
                DiffChunk { kind: DiffKind::Insert, text: "slow".into() },
                DiffChunk { kind: DiffKind::Equal, text: " fox".into() },
            ]
        );
    }

    #[test]
    fn test_small_equality_between_edits_is_folded() {
        let chunks = diff_texts("red car", "blue bus");
        assert_eq!(
            chunks,
            vec![
                DiffChunk { kind: DiffKind::Delete, text: "red car".into() },
                DiffChunk { kind: DiffKind::Insert, text: "blue bus".into() },
            ]
        );
    }

    #[test]
    fn test_identical_texts_are_one_equal_chunk() {
        let chunks = diff_texts("same text\nhere", "same text\nhere");
        assert_eq!(chunks.len(), 1);
        assert_eq!(chunks[0].kind, DiffKind::Equal);
    }

    #[test]
    fn test_empty_inputs() {
        assert!(diff_texts("", "").is_empty());
        assert_eq!(
            diff_texts("", "new"),
            vec![DiffChunk { kind: DiffKind::Insert, text: "new".into() }]
        );
        assert_eq!(
            diff_texts("old", ""),
            vec![DiffChunk { kind: DiffKind::Delete, text: "old".into() }]
        );
    }

    #[test]
    fn test_round_trip_on_resume_edit() {
        assert_round_trip(
            "## Experience\n- Worked on APIs for payments.\n- Helped the team.",
            "## Experience\n- Designed REST APIs processing $2M/day in payments.\n- Mentored 3 engineers.\n## Skills\nRust",
        );
    }

    #[test]
    fn test_round_trip_with_unicode() {
        assert_round_trip("Café — Zürich, naïve", "Café - Zürich, naive résumé");
    }

    #[test]
    fn test_round_trip_falls_back_to_lines_for_large_inputs() {
        let original: String = (0..2500).map(|i| format!("alpha{i} ")).collect::<String>() + "\nend";
        let tailored: String = (0..2500).map(|i| format!("beta{i} ")).collect::<String>() + "\nend";
        assert_round_trip(&original, &tailored);
    }

    #[test]
    fn test_tokenizer_keeps_every_byte() {
        let text = "Led 3 teams, (remote) — 2021!";
        assert_eq!(tokenize_words(text).concat(), text);
    }

    #[test]
    fn test_diff_stats_counts_words() {
        let chunks = diff_texts("built apis", "built fast apis");
        let stats = diff_stats(&chunks);
        assert_eq!(stats.words_added, 1);
        assert_eq!(stats.words_removed, 0);
        assert_eq!(stats.words_unchanged, 2);
    }
}
