//! Recursive-boundary text chunker.
//!
//! Splits each page into windows of at most `chunk_size` characters that
//! overlap their predecessor by exactly `overlap` characters. Lengths are
//! counted in Unicode scalar values, never bytes, so multi-byte text cannot
//! be cut mid-character.
//!
//! # Algorithm
//!
//! 1. Trim the page text. Empty pages contribute nothing.
//! 2. If the remainder fits in `chunk_size`, emit it and stop.
//! 3. Otherwise look for a cut inside the window `[start, start + chunk_size]`,
//!    trying separators in priority order: paragraph break (`\n\n`), line
//!    break (`\n`), space. The last occurrence wins, provided it leaves
//!    progress (`end > start + overlap`).
//! 4. With no usable separator, hard-cut at `start + chunk_size`.
//! 5. Emit `[start, end)`; the separator itself is not part of the chunk.
//!    The next window starts at `end - overlap`.
//!
//! Chunks never span pages, and `chunk_index` is contiguous across the
//! whole document.
//!
//! ```rust
//! use resume_advisor::chunk::split_text;
//!
//! let pieces = split_text("Skills: Rust\n\nExperience: 3 years", 20, 4);
//! assert_eq!(pieces[0], "Skills: Rust");
//! assert!(pieces.iter().all(|p| p.chars().count() <= 20));
//! ```

use crate::config::ChunkingConfig;
use crate::models::{Chunk, PageRecord};

/// Cut points in priority order. A hard character cut is the implicit last
/// resort.
const SEPARATORS: [&str; 3] = ["\n\n", "\n", " "];

/// Chunk every page, numbering chunks from 0 in document order.
pub fn chunk_pages(pages: &[PageRecord], config: &ChunkingConfig) -> Vec<Chunk> {
    let mut chunks = Vec::new();
    for page in pages {
        for text in split_text(&page.text, config.chunk_size, config.overlap) {
            let chunk_index = chunks.len();
            chunks.push(Chunk {
                text,
                source_page: page.page_number,
                chunk_index,
            });
        }
    }
    chunks
}

/// Split one region of text into overlapping windows.
///
/// `overlap` is clamped below `chunk_size`; configuration validation already
/// rejects larger values.
pub fn split_text(text: &str, chunk_size: usize, overlap: usize) -> Vec<String> {
    let chars: Vec<char> = text.trim().chars().collect();
    if chars.is_empty() || chunk_size == 0 {
        return Vec::new();
    }
    let overlap = overlap.min(chunk_size - 1);

    let mut windows = Vec::new();
    let mut start = 0usize;
    loop {
        if chars.len() - start <= chunk_size {
            windows.push(chars[start..].iter().collect());
            break;
        }

        let end = find_cut(&chars, start, chunk_size, overlap);
        windows.push(chars[start..end].iter().collect());

        start = end - overlap;
        if overlap == 0 {
            // Nothing is shared, so don't open the next chunk on the separator.
            while start < chars.len() && chars[start].is_whitespace() {
                start += 1;
            }
            if start == chars.len() {
                break;
            }
        }
    }
    windows
}

/// Exclusive end of the window beginning at `start`.
///
/// Requires `chars.len() - start > chunk_size`.
fn find_cut(chars: &[char], start: usize, chunk_size: usize, overlap: usize) -> usize {
    let limit = start + chunk_size;
    let min_end = start + overlap + 1;

    for sep in SEPARATORS {
        let sep: Vec<char> = sep.chars().collect();
        let mut pos = limit;
        while pos >= min_end {
            if pos + sep.len() <= chars.len() && chars[pos..pos + sep.len()] == sep[..] {
                return pos;
            }
            pos -= 1;
        }
    }
    limit
}

#[cfg(test)]
mod tests {
    use super::*;

    fn page(n: u32, text: &str) -> PageRecord {
        PageRecord {
            text: text.to_string(),
            page_number: n,
            source: "cv.pdf".to_string(),
        }
    }

    fn cfg(chunk_size: usize, overlap: usize) -> ChunkingConfig {
        ChunkingConfig {
            chunk_size,
            overlap,
        }
    }

    fn char_len(s: &str) -> usize {
        s.chars().count()
    }

    fn head(s: &str, n: usize) -> String {
        s.chars().take(n).collect()
    }

    fn tail(s: &str, n: usize) -> String {
        let len = char_len(s);
        s.chars().skip(len.saturating_sub(n)).collect()
    }

    fn long_resume() -> String {
        (0..40)
            .map(|i| {
                format!(
                    "Role {} at Company {}\nShipped feature number {} in Rust and Go.",
                    i,
                    i * 7,
                    i
                )
            })
            .collect::<Vec<_>>()
            .join("\n\n")
    }

    #[test]
    fn small_text_is_one_chunk() {
        let pieces = split_text("Skills: Python, Go.", 1000, 200);
        assert_eq!(pieces, vec!["Skills: Python, Go.".to_string()]);
    }

    #[test]
    fn empty_and_blank_text_yield_nothing() {
        assert!(split_text("", 1000, 200).is_empty());
        assert!(split_text("  \n\n \t", 1000, 200).is_empty());
        assert!(chunk_pages(&[], &cfg(1000, 200)).is_empty());
    }

    #[test]
    fn every_chunk_fits_the_window() {
        let text = long_resume();
        for (size, overlap) in [(1000, 200), (120, 30), (50, 10), (17, 5), (8, 0)] {
            for piece in split_text(&text, size, overlap) {
                assert!(
                    char_len(&piece) <= size,
                    "chunk of {} chars exceeds {}",
                    char_len(&piece),
                    size
                );
            }
        }
    }

    #[test]
    fn consecutive_chunks_share_exact_overlap() {
        let text = long_resume();
        for (size, overlap) in [(1000, 200), (120, 30), (50, 10), (17, 5)] {
            let pieces = split_text(&text, size, overlap);
            assert!(pieces.len() > 1);
            for pair in pieces.windows(2) {
                assert_eq!(
                    tail(&pair[0], overlap),
                    head(&pair[1], overlap),
                    "size={} overlap={}",
                    size,
                    overlap
                );
            }
        }
    }

    #[test]
    fn chunks_reassemble_to_the_source() {
        let text = long_resume();
        let overlap = 30;
        let pieces = split_text(&text, 120, overlap);
        let mut rebuilt = pieces[0].clone();
        for piece in &pieces[1..] {
            rebuilt.extend(piece.chars().skip(overlap));
        }
        assert_eq!(rebuilt, text.trim());
    }

    #[test]
    fn prefers_paragraph_breaks() {
        let text = "Alpha beta gamma.\nDelta epsilon.\n\nZeta eta theta iota.";
        let pieces = split_text(text, 40, 0);
        assert_eq!(pieces[0], "Alpha beta gamma.\nDelta epsilon.");
        assert_eq!(pieces[1], "Zeta eta theta iota.");
    }

    #[test]
    fn falls_back_to_line_then_space() {
        let pieces = split_text("one two three\nfour five six seven", 20, 0);
        assert_eq!(pieces[0], "one two three");

        let pieces = split_text("one two three four five six", 12, 0);
        assert_eq!(pieces[0], "one two");
    }

    #[test]
    fn hard_cuts_text_without_boundaries() {
        let text = "x".repeat(25);
        let pieces = split_text(&text, 10, 2);
        assert_eq!(char_len(&pieces[0]), 10);
        assert!(pieces.iter().all(|p| char_len(p) <= 10));
        assert_eq!(pieces.len(), 3);
    }

    #[test]
    fn multibyte_characters_are_counted_not_bytes() {
        let text = "日本語のテキスト。".repeat(30);
        let pieces = split_text(&text, 25, 5);
        assert!(pieces.len() > 1);
        for piece in &pieces {
            assert!(char_len(piece) <= 25);
        }
        for pair in pieces.windows(2) {
            assert_eq!(tail(&pair[0], 5), head(&pair[1], 5));
        }
    }

    #[test]
    fn chunks_stay_on_their_page_and_are_numbered_contiguously() {
        let pages = vec![
            page(1, &long_resume()),
            page(2, "   "),
            page(3, "Education: BSc Computer Science."),
        ];
        let chunks = chunk_pages(&pages, &cfg(200, 40));
        for (i, c) in chunks.iter().enumerate() {
            assert_eq!(c.chunk_index, i);
        }
        assert!(chunks.iter().all(|c| c.source_page != 2));
        let last = chunks.last().unwrap();
        assert_eq!(last.source_page, 3);
        assert_eq!(last.text, "Education: BSc Computer Science.");
    }

    #[test]
    fn deterministic() {
        let text = long_resume();
        assert_eq!(split_text(&text, 90, 15), split_text(&text, 90, 15));
    }
}
