//! Recursive character splitting with overlapping windows.
//!
//! Text is split on the highest-priority separator it contains, short
//! pieces are merged greedily into windows of at most `chunk_size`
//! characters, and each new window keeps up to `chunk_overlap` characters
//! from the end of the previous one. Pieces that are too long on their own
//! are split again with the lower-priority separators.
//!
//! All lengths are counted in `char`s, not bytes.

/// Default window size in characters.
pub const DEFAULT_CHUNK_SIZE: usize = 1000;
/// Default overlap between consecutive windows.
pub const DEFAULT_CHUNK_OVERLAP: usize = 200;

/// A window of the source text with its position.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct TextChunk {
    pub text: String,
    pub chunk_index: usize,
    /// Offset of the chunk in the source, in characters.
    pub start_char: usize,
    /// First line of the chunk (1-based).
    pub line_from: usize,
    /// Last line of the chunk (1-based, inclusive).
    pub line_to: usize,
}

/// Recursive chunker that prefers paragraph, then line, then word breaks.
#[derive(Debug, Clone)]
pub struct RecursiveSplitter {
    pub chunk_size: usize,
    pub chunk_overlap: usize,
    separators: Vec<String>,
}

impl Default for RecursiveSplitter {
    fn default() -> Self {
        Self::new(DEFAULT_CHUNK_SIZE, DEFAULT_CHUNK_OVERLAP)
    }
}

fn char_len(s: &str) -> usize {
    s.chars().count()
}

impl RecursiveSplitter {
    pub fn new(chunk_size: usize, chunk_overlap: usize) -> Self {
        Self::with_separators(chunk_size, chunk_overlap, &["\n\n", "\n", " ", ""])
    }

    pub fn with_separators(chunk_size: usize, chunk_overlap: usize, separators: &[&str]) -> Self {
        Self {
            chunk_size,
            chunk_overlap: chunk_overlap.min(chunk_size.saturating_sub(1)),
            separators: separators.iter().map(|s| s.to_string()).collect(),
        }
    }

    /// Split `text` into windows, in document order.
    pub fn split_text(&self, text: &str) -> Vec<String> {
        let separators: Vec<&str> = self.separators.iter().map(String::as_str).collect();
        self.split_recursive(text, &separators)
    }

    /// Split `text` and locate each window in the source.
    pub fn chunk(&self, text: &str) -> Vec<TextChunk> {
        let mut chunks = Vec::new();
        let mut line = 1usize;
        let mut prev: Option<(usize, usize)> = None;

        for piece in self.split_text(text) {
            let search_from = match prev {
                Some((start, _)) => next_boundary(text, start),
                None => 0,
            };
            let start = text[search_from..]
                .find(piece.as_str())
                .map(|i| i + search_from)
                .or_else(|| text.find(piece.as_str()))
                .unwrap_or(0);

            match prev {
                None => line += count_newlines(&text[..start]),
                Some((prev_start, prev_end)) => {
                    if prev_end <= start {
                        line += count_newlines(&text[prev_end..start]);
                    } else {
                        line = line
                            .saturating_sub(count_newlines(&text[start.max(prev_start)..prev_end]));
                    }
                }
            }

            let newlines = count_newlines(&piece);
            let end = start + piece.len();
            chunks.push(TextChunk {
                chunk_index: chunks.len(),
                start_char: char_len(&text[..start]),
                line_from: line,
                line_to: line + newlines,
                text: piece,
            });
            line += newlines;
            prev = Some((start, end));
        }
        chunks
    }

    fn split_recursive(&self, text: &str, separators: &[&str]) -> Vec<String> {
        // First separator present in the text; "" always matches.
        let mut separator = "";
        let mut remaining: &[&str] = &[];
        for (i, sep) in separators.iter().enumerate() {
            if sep.is_empty() {
                break;
            }
            if text.contains(sep) {
                separator = *sep;
                remaining = &separators[i + 1..];
                break;
            }
        }

        let mut chunks = Vec::new();
        let mut good: Vec<&str> = Vec::new();
        for piece in split_keeping_separator(text, separator) {
            if char_len(piece) < self.chunk_size {
                good.push(piece);
                continue;
            }
            if !good.is_empty() {
                chunks.extend(self.merge(&good));
                good.clear();
            }
            if remaining.is_empty() {
                chunks.push(piece.to_string());
            } else {
                chunks.extend(self.split_recursive(piece, remaining));
            }
        }
        if !good.is_empty() {
            chunks.extend(self.merge(&good));
        }
        chunks
    }

    /// Greedily join consecutive pieces into windows with overlap.
    fn merge(&self, pieces: &[&str]) -> Vec<String> {
        let mut windows = Vec::new();
        let mut current: std::collections::VecDeque<(&str, usize)> = Default::default();
        let mut total = 0usize;

        for piece in pieces {
            let len = char_len(piece);
            if total + len > self.chunk_size && !current.is_empty() {
                if let Some(window) = join_trimmed(current.iter().map(|(p, _)| *p)) {
                    windows.push(window);
                }
                while total > self.chunk_overlap || (total > 0 && total + len > self.chunk_size) {
                    match current.pop_front() {
                        Some((_, n)) => total -= n,
                        None => break,
                    }
                }
            }
            current.push_back((*piece, len));
            total += len;
        }
        if let Some(window) = join_trimmed(current.iter().map(|(p, _)| *p)) {
            windows.push(window);
        }
        windows
    }
}

fn join_trimmed<'a>(pieces: impl Iterator<Item = &'a str>) -> Option<String> {
    let joined: String = pieces.collect();
    let trimmed = joined.trim();
    if trimmed.is_empty() {
        None
    } else {
        Some(trimmed.to_string())
    }
}

/// Split before every occurrence of `separator`, so each piece after the
/// first starts with it. The empty separator yields single characters.
fn split_keeping_separator<'a>(text: &'a str, separator: &str) -> Vec<&'a str> {
    if separator.is_empty() {
        return text
            .char_indices()
            .map(|(i, c)| &text[i..i + c.len_utf8()])
            .collect();
    }
    let mut cuts: Vec<usize> = text
        .char_indices()
        .map(|(i, _)| i)
        .filter(|&i| i > 0 && text[i..].starts_with(separator))
        .collect();
    cuts.push(text.len());

    let mut pieces = Vec::with_capacity(cuts.len());
    let mut start = 0;
    for cut in cuts {
        if cut > start {
            pieces.push(&text[start..cut]);
        }
        start = cut;
    }
    pieces
}

fn count_newlines(s: &str) -> usize {
    s.bytes().filter(|b| *b == b'\n').count()
}

fn next_boundary(text: &str, index: usize) -> usize {
    text[index..]
        .chars()
        .next()
        .map_or(text.len(), |c| index + c.len_utf8())
}
