//! Boundary-aware text chunker.
//!
//! Splits raw document text into overlapping segments suitable for
//! embedding. A cursor advances through the text one window at a time;
//! when the naive window end falls mid-text, the cut point is moved
//! forward to the nearest newline (preferred) or space within a
//! 100-character lookahead so words and sentences are not severed.
//! Consecutive windows overlap so context carries across chunk
//! boundaries.
//!
//! Pure and deterministic: no state across calls, terminates for any
//! finite input including the empty string and `overlap >= chunk_size`.

/// Chunking parameters.
#[derive(Debug, Clone)]
pub struct ChunkConfig {
    /// Target window size in bytes.
    pub chunk_size: usize,
    /// How far the next window reaches back into the previous one.
    pub overlap: usize,
}

impl Default for ChunkConfig {
    fn default() -> Self {
        Self { chunk_size: 800, overlap: 100 }
    }
}

/// How far past the naive window end we search for a newline or space.
const BOUNDARY_LOOKAHEAD: usize = 100;

/// Trimmed segments at or below this length are discarded as noise
/// (page boundaries, stray Q&A fragments).
const MIN_CHUNK_LEN: usize = 20;

/// Split `text` into ordered, overlapping segments.
///
/// Guarantees:
/// - Empty input returns an empty vec.
/// - Every segment is trimmed and longer than [`MIN_CHUNK_LEN`] bytes.
/// - No segment exceeds `chunk_size + BOUNDARY_LOOKAHEAD` bytes.
/// - Terminates even when `overlap >= chunk_size`: the cursor is forced
///   past the window whenever it would fail to advance.
pub fn chunk_text(text: &str, config: &ChunkConfig) -> Vec<String> {
    let len = text.len();
    let mut chunks = Vec::new();
    let mut start = 0usize;

    while start < len {
        let mut end = snap_left(text, (start + config.chunk_size).min(len));

        // Not at the end of the text: prefer cutting after a newline,
        // else after a space, within the lookahead window.
        if end < len {
            let window_end = snap_left(text, (end + BOUNDARY_LOOKAHEAD).min(len));
            let window = &text[end..window_end];
            if let Some(pos) = window.find('\n') {
                end += pos + 1;
            } else if let Some(pos) = window.find(' ') {
                end += pos + 1;
            }
        }

        // Degenerate window (chunk_size smaller than one char): force
        // progress by one char so the loop cannot stall.
        if end <= start {
            end = text[start..]
                .char_indices()
                .nth(1)
                .map(|(i, _)| start + i)
                .unwrap_or(len);
        }

        let segment = text[start..end].trim();
        if segment.len() > MIN_CHUNK_LEN {
            chunks.push(segment.to_string());
        }

        let next = snap_left(text, end.saturating_sub(config.overlap));
        start = if config.overlap >= config.chunk_size || next <= start {
            end
        } else {
            next
        };
    }

    chunks
}

/// Snap a byte index back to the nearest valid UTF-8 char boundary.
fn snap_left(s: &str, index: usize) -> usize {
    if index >= s.len() {
        return s.len();
    }
    let mut i = index;
    while i > 0 && !s.is_char_boundary(i) {
        i -= 1;
    }
    i
}

#[cfg(test)]
mod tests {
    use super::*;

    fn cfg(chunk_size: usize, overlap: usize) -> ChunkConfig {
        ChunkConfig { chunk_size, overlap }
    }

    #[test]
    fn test_empty_input() {
        assert!(chunk_text("", &ChunkConfig::default()).is_empty());
    }

    #[test]
    fn test_short_input_single_chunk() {
        let chunks = chunk_text("Items can be returned within 30 days.", &ChunkConfig::default());
        assert_eq!(chunks.len(), 1);
        assert_eq!(chunks[0], "Items can be returned within 30 days.");
    }

    #[test]
    fn test_tiny_fragments_discarded() {
        // Under the noise threshold: nothing should come back.
        assert!(chunk_text("short text", &ChunkConfig::default()).is_empty());
    }

    #[test]
    fn test_prefers_newline_boundary() {
        // Window end lands mid-sentence; a newline sits within the lookahead.
        let text = format!("{}\n{}", "a".repeat(90), "b".repeat(90));
        let chunks = chunk_text(&text, &cfg(80, 10));
        // First cut should land just after the newline, not mid-word.
        assert!(chunks[0].chars().all(|c| c == 'a'));
    }

    #[test]
    fn test_falls_back_to_space_boundary() {
        let text = format!("{} {}", "a".repeat(90), "b".repeat(90));
        let chunks = chunk_text(&text, &cfg(80, 10));
        assert!(chunks[0].chars().all(|c| c == 'a'));
    }

    #[test]
    fn test_hard_cut_without_boundary() {
        // No newline or space anywhere: cut at the naive boundary.
        let text = "x".repeat(500);
        let chunks = chunk_text(&text, &cfg(100, 10));
        assert!(!chunks.is_empty());
        for c in &chunks {
            assert!(c.len() <= 100 + 100);
        }
    }

    #[test]
    fn test_max_length_bound() {
        let text = "The quick brown fox jumps over the lazy dog. ".repeat(100);
        let chunks = chunk_text(&text, &ChunkConfig::default());
        for c in &chunks {
            assert!(
                c.len() <= 800 + 100,
                "chunk exceeds size bound: {} bytes",
                c.len()
            );
        }
    }

    #[test]
    fn test_overlap_continuity() {
        let text = "The quick brown fox jumps over the lazy dog. ".repeat(50);
        let chunks = chunk_text(&text, &ChunkConfig::default());
        assert!(chunks.len() > 1);
        // The tail of each chunk reappears at the head of the next.
        for pair in chunks.windows(2) {
            let tail: String = pair[0].chars().rev().take(30).collect::<Vec<_>>().into_iter().rev().collect();
            assert!(
                pair[1].contains(tail.trim()),
                "no overlap between consecutive chunks"
            );
        }
    }

    #[test]
    fn test_terminates_when_overlap_equals_chunk_size() {
        let text = "abcdefghij klmnopqrst uvwxyz 0123456789 abcdefghij".repeat(3);
        let chunks = chunk_text(&text, &cfg(10, 10));
        assert!(chunks.len() < text.len());
    }

    #[test]
    fn test_terminates_when_overlap_exceeds_chunk_size() {
        let text = "word ".repeat(200);
        let _ = chunk_text(&text, &cfg(10, 50));
    }

    #[test]
    fn test_coverage_of_input() {
        // Every part of the input appears in some chunk (modulo trimming).
        let text = (0..40)
            .map(|i| format!("sentence number {i} with some padding words"))
            .collect::<Vec<_>>()
            .join("\n");
        let chunks = chunk_text(&text, &ChunkConfig::default());
        for i in 0..40 {
            let needle = format!("sentence number {i}");
            assert!(
                chunks.iter().any(|c| c.contains(&needle)),
                "input line {i} missing from all chunks"
            );
        }
    }

    #[test]
    fn test_multibyte_utf8_safe() {
        // Multi-byte chars around every cut point must not panic.
        let text = "đây là một đoạn văn dài với nhiều ký tự tiếng Việt ".repeat(30);
        let chunks = chunk_text(&text, &cfg(50, 10));
        assert!(!chunks.is_empty());
    }

    #[test]
    fn test_deterministic() {
        let text = "Alpha beta gamma delta epsilon zeta eta theta. ".repeat(40);
        let a = chunk_text(&text, &ChunkConfig::default());
        let b = chunk_text(&text, &ChunkConfig::default());
        assert_eq!(a, b);
    }
}
