//! Recursive character splitter.
//!
//! Splitting strategy:
//! 1. Split at the first separator found in the text (blank line, newline, space)
//! 2. Merge neighbouring pieces up to the character budget
//! 3. Carry the tail of each emitted chunk into the next one as overlap
//! 4. Pieces that are still too large are split again with the next separator;
//!    the empty separator cuts at character boundaries as a last resort

use std::collections::VecDeque;

/// Separators tried in order, coarsest first.
pub const DEFAULT_SEPARATORS: [&str; 4] = ["\n\n", "\n", " ", ""];

#[derive(Debug, Clone)]
pub struct RecursiveSplitter {
    /// Maximum characters per chunk
    chunk_size: usize,
    /// Characters carried over between consecutive chunks
    chunk_overlap: usize,
    separators: Vec<String>,
}

impl RecursiveSplitter {
    pub fn new(chunk_size: usize, chunk_overlap: usize) -> anyhow::Result<Self> {
        if chunk_size == 0 {
            anyhow::bail!("chunk size must be greater than zero");
        }
        if chunk_overlap >= chunk_size {
            anyhow::bail!(
                "chunk overlap ({chunk_overlap}) must be smaller than chunk size ({chunk_size})"
            );
        }
        Ok(Self {
            chunk_size,
            chunk_overlap,
            separators: DEFAULT_SEPARATORS.iter().map(|s| s.to_string()).collect(),
        })
    }

    pub fn chunk_size(&self) -> usize {
        self.chunk_size
    }

    pub fn chunk_overlap(&self) -> usize {
        self.chunk_overlap
    }

    /// Split `text` into trimmed, non-empty chunks of at most `chunk_size` characters.
    pub fn split_text(&self, text: &str) -> Vec<String> {
        self.split_with(text, &self.separators)
    }

    fn split_with(&self, text: &str, separators: &[String]) -> Vec<String> {
        let mut chunks = Vec::new();

        // Pick the first separator that occurs in the text
        let mut separator = separators.last().map(String::as_str).unwrap_or("");
        let mut remaining: &[String] = &[];
        for (i, sep) in separators.iter().enumerate() {
            if sep.is_empty() {
                separator = "";
                break;
            }
            if text.contains(sep.as_str()) {
                separator = sep.as_str();
                remaining = &separators[i + 1..];
                break;
            }
        }

        let pieces = split_keeping_separator(text, separator);

        let mut pending: Vec<String> = Vec::new();
        for piece in pieces {
            if char_len(&piece) < self.chunk_size {
                pending.push(piece);
                continue;
            }
            if !pending.is_empty() {
                chunks.extend(self.merge(&pending));
                pending.clear();
            }
            if remaining.is_empty() {
                chunks.push(piece);
            } else {
                chunks.extend(self.split_with(&piece, remaining));
            }
        }
        if !pending.is_empty() {
            chunks.extend(self.merge(&pending));
        }

        chunks
    }

    /// Greedily join pieces up to the budget, keeping an overlap window.
    fn merge(&self, pieces: &[String]) -> Vec<String> {
        let mut chunks = Vec::new();
        let mut window: VecDeque<(&str, usize)> = VecDeque::new();
        let mut total = 0usize;

        for piece in pieces {
            let len = char_len(piece);
            if total + len > self.chunk_size {
                if total > self.chunk_size {
                    tracing::warn!(
                        "Created a chunk of size {total}, which is longer than the specified {}",
                        self.chunk_size
                    );
                }
                if !window.is_empty() {
                    push_joined(&mut chunks, &window);
                    // Drop from the front until the carried tail fits the overlap
                    // and leaves room for the incoming piece.
                    while total > self.chunk_overlap
                        || (total > 0 && total + len > self.chunk_size)
                    {
                        match window.pop_front() {
                            Some((_, l)) => total -= l,
                            None => break,
                        }
                    }
                }
            }
            window.push_back((piece.as_str(), len));
            total += len;
        }

        push_joined(&mut chunks, &window);
        chunks
    }
}

fn push_joined(chunks: &mut Vec<String>, window: &VecDeque<(&str, usize)>) {
    let joined: String = window.iter().map(|(s, _)| *s).collect();
    let trimmed = joined.trim();
    if !trimmed.is_empty() {
        chunks.push(trimmed.to_string());
    }
}

/// Split on `separator`, attaching it to the start of each following piece.
/// The empty separator splits into single characters.
fn split_keeping_separator(text: &str, separator: &str) -> Vec<String> {
    if separator.is_empty() {
        return text.chars().map(String::from).collect();
    }

    let mut pieces = Vec::new();
    let mut parts = text.split(separator);
    if let Some(first) = parts.next() {
        if !first.is_empty() {
            pieces.push(first.to_string());
        }
    }
    for part in parts {
        pieces.push(format!("{separator}{part}"));
    }
    pieces
}

fn char_len(s: &str) -> usize {
    s.chars().count()
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_rejects_invalid_sizes() {
        assert!(RecursiveSplitter::new(0, 0).is_err());
        assert!(RecursiveSplitter::new(100, 100).is_err());
        assert!(RecursiveSplitter::new(100, 10).is_ok());
    }

    #[test]
    fn test_small_text_is_single_chunk() {
        let splitter = RecursiveSplitter::new(2000, 200).unwrap();
        let chunks = splitter.split_text("def main():\n    return 1\n");
        assert_eq!(chunks, vec!["def main():\n    return 1"]);
    }

    #[test]
    fn test_empty_and_whitespace_text() {
        let splitter = RecursiveSplitter::new(2000, 200).unwrap();
        assert!(splitter.split_text("").is_empty());
        assert!(splitter.split_text("  \n\n  ").is_empty());
    }

    #[test]
    fn test_prefers_paragraph_boundaries() {
        let splitter = RecursiveSplitter::new(30, 0).unwrap();
        let text = "first paragraph here\n\nsecond paragraph here";
        let chunks = splitter.split_text(text);
        assert_eq!(chunks, vec!["first paragraph here", "second paragraph here"]);
    }

    #[test]
    fn test_chunks_never_exceed_budget() {
        let splitter = RecursiveSplitter::new(50, 10).unwrap();
        let text: String = (0..200)
            .map(|i| format!("token{i}"))
            .collect::<Vec<_>>()
            .join(" ");
        let chunks = splitter.split_text(&text);
        assert!(chunks.len() > 1);
        for chunk in &chunks {
            assert!(chunk.chars().count() <= 50, "chunk too long: {chunk:?}");
        }
    }

    #[test]
    fn test_consecutive_chunks_overlap() {
        let splitter = RecursiveSplitter::new(20, 8).unwrap();
        let chunks = splitter.split_text("aa bb cc dd ee ff gg hh ii jj kk");
        assert!(chunks.len() > 1);
        for pair in chunks.windows(2) {
            let next_first = pair[1].split(' ').next().unwrap();
            assert!(
                pair[0].contains(next_first),
                "expected {:?} to repeat the tail of {:?}",
                pair[1],
                pair[0]
            );
        }
        assert_eq!(chunks[0], "aa bb cc dd ee ff gg");
        assert_eq!(chunks[1], "ff gg hh ii jj kk");
    }

    #[test]
    fn test_hard_cut_without_separators() {
        let splitter = RecursiveSplitter::new(10, 0).unwrap();
        let text = "x".repeat(25);
        let chunks = splitter.split_text(&text);
        assert_eq!(chunks.len(), 3);
        assert_eq!(chunks[0].len(), 10);
        assert_eq!(chunks[2].len(), 5);
    }

    #[test]
    fn test_multibyte_text_counts_characters() {
        let splitter = RecursiveSplitter::new(4, 0).unwrap();
        let chunks = splitter.split_text("ééééé");
        assert_eq!(chunks, vec!["éééé", "é"]);
    }

    #[test]
    fn test_long_line_falls_back_to_words() {
        let splitter = RecursiveSplitter::new(12, 0).unwrap();
        let text = "short\nthis line is definitely too long";
        let chunks = splitter.split_text(text);
        assert_eq!(chunks[0], "short");
        assert!(chunks.iter().all(|c| c.chars().count() <= 12));
        assert!(chunks.iter().any(|c| c.contains("definitely")));
    }
}
