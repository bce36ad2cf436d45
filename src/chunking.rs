//! Deterministic recursive text splitting for license documents.
//!
//! The splitter walks an ordered list of separator preferences (paragraph
//! break, line break, space, character fallback) so that no chunk exceeds
//! the configured maximum while consecutive chunks share an overlap region.
//!
//! Two invariants matter downstream:
//!
//! * identical input always yields an identical chunk sequence, and
//! * each chunk records how many leading characters were copied from its
//!   predecessor, so stripping that prefix and concatenating reconstructs
//!   the original text exactly.
//!
//! Lengths and overlap are counted in characters, never bytes, so splits
//! stay on UTF-8 boundaries.

/// Tunables for the recursive splitter.
#[derive(Clone, Debug)]
pub struct ChunkingConfig {
    /// Upper bound on chunk length in characters, overlap included.
    pub max_chars: usize,
    /// Characters shared between a chunk and its predecessor.
    pub overlap: usize,
    /// Split preferences, tried in order. An empty string means
    /// character-level fallback and should come last.
    pub separators: Vec<String>,
}

impl Default for ChunkingConfig {
    fn default() -> Self {
        Self {
            max_chars: 512,
            overlap: 50,
            separators: vec![
                "\n\n".to_string(),
                "\n".to_string(),
                " ".to_string(),
                String::new(),
            ],
        }
    }
}

/// One bounded slice of a document.
#[derive(Clone, Debug, PartialEq, Eq)]
pub struct TextChunk {
    pub content: String,
    /// Number of leading characters copied from the previous chunk.
    pub overlap: usize,
}

/// Split `text` into overlapping chunks according to `config`.
///
/// Empty input yields no chunks. Each chunk's character count is at most
/// `config.max_chars`.
pub fn split_text(text: &str, config: &ChunkingConfig) -> Vec<TextChunk> {
    if text.is_empty() {
        return Vec::new();
    }

    // The overlap prefix is budgeted inside max_chars so the bound holds
    // for every emitted chunk.
    let body_budget = config.max_chars.saturating_sub(config.overlap).max(1);
    let separators: Vec<&str> = config.separators.iter().map(String::as_str).collect();
    let bodies = split_level(text, &separators, body_budget);

    let mut chunks = Vec::with_capacity(bodies.len());
    for (index, body) in bodies.iter().enumerate() {
        if index == 0 {
            chunks.push(TextChunk {
                content: body.clone(),
                overlap: 0,
            });
        } else {
            let tail = char_tail(&bodies[index - 1], config.overlap);
            let overlap = tail.chars().count();
            chunks.push(TextChunk {
                content: format!("{tail}{body}"),
                overlap,
            });
        }
    }
    chunks
}

/// Recursively split `text` into pieces of at most `max_chars` characters
/// whose concatenation is exactly `text` (separators stay attached to the
/// piece that precedes them).
fn split_level(text: &str, separators: &[&str], max_chars: usize) -> Vec<String> {
    if char_len(text) <= max_chars {
        return vec![text.to_string()];
    }

    let Some((separator, rest)) = separators.split_first() else {
        return hard_split(text, max_chars);
    };
    if separator.is_empty() {
        return hard_split(text, max_chars);
    }

    let raw: Vec<&str> = text.split_inclusive(separator).collect();
    if raw.len() == 1 {
        // Separator not present; fall through to the next preference.
        return split_level(text, rest, max_chars);
    }

    let mut pieces: Vec<String> = Vec::with_capacity(raw.len());
    for piece in raw {
        if char_len(piece) > max_chars {
            pieces.extend(split_level(piece, rest, max_chars));
        } else {
            pieces.push(piece.to_string());
        }
    }
    merge_adjacent(pieces, max_chars)
}

/// Greedily merge adjacent pieces while the combined length stays within
/// `max_chars`. Keeps chunks close to the budget without reordering.
fn merge_adjacent(pieces: Vec<String>, max_chars: usize) -> Vec<String> {
    let mut merged: Vec<String> = Vec::new();
    let mut current = String::new();
    let mut current_len = 0usize;

    for piece in pieces {
        let piece_len = char_len(&piece);
        if current_len > 0 && current_len + piece_len > max_chars {
            merged.push(std::mem::take(&mut current));
            current_len = 0;
        }
        current.push_str(&piece);
        current_len += piece_len;
    }
    if !current.is_empty() {
        merged.push(current);
    }
    merged
}

/// Character-level fallback split for text with no usable separators.
fn hard_split(text: &str, max_chars: usize) -> Vec<String> {
    let mut out = Vec::new();
    let mut current = String::new();
    let mut count = 0usize;
    for ch in text.chars() {
        current.push(ch);
        count += 1;
        if count == max_chars {
            out.push(std::mem::take(&mut current));
            count = 0;
        }
    }
    if !current.is_empty() {
        out.push(current);
    }
    out
}

fn char_len(s: &str) -> usize {
    s.chars().count()
}

/// Last `n` characters of `s` (the whole string if shorter).
fn char_tail(s: &str, n: usize) -> String {
    let total = char_len(s);
    if total <= n {
        s.to_string()
    } else {
        s.chars().skip(total - n).collect()
    }
}
