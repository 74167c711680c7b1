//! Overlapping fixed-size text chunker.
//!
//! Splits a text unit into chunks of at most `chunk_size` characters, where
//! each chunk repeats at least `overlap` characters from the end of the
//! previous one. Chunk ends are pulled back to the best natural boundary in
//! the window, in order of preference:
//!
//! 1. paragraph breaks (`\n\n`)
//! 2. line and sentence breaks (`\n`, `. `, `! `, `? `)
//! 3. word breaks (space, tab)
//! 4. any character (hard split)
//!
//! Chunk starts are nudged back to the beginning of a word when one is
//! close by, which only ever increases the overlap.
//!
//! Sizes are counted in characters, never bytes, so multi-byte text is
//! never split inside a code point.
//!
//! # Example
//!
//! ```rust
//! use studio_qa::chunk::split_text;
//!
//! let chunks = split_text("Short text.", 500, 50);
//! assert_eq!(chunks, vec!["Short text.".to_string()]);
//! ```

use crate::models::{Chunk, TextUnit};

pub const DEFAULT_CHUNK_SIZE: usize = 500;
pub const DEFAULT_CHUNK_OVERLAP: usize = 50;

/// Boundary tiers, most preferred first.
const BREAK_TIERS: &[&[&str]] = &[&["\n\n"], &["\n", ". ", "! ", "? "], &[" ", "\t"]];

/// Split `text` into overlapping chunks of at most `chunk_size` characters.
///
/// Text no longer than `chunk_size` comes back as a single chunk. Empty text
/// yields no chunks. `overlap` is clamped below `chunk_size`.
pub fn split_text(text: &str, chunk_size: usize, overlap: usize) -> Vec<String> {
    let chunk_size = chunk_size.max(1);
    let chars: Vec<char> = text.chars().collect();
    let total = chars.len();

    if total == 0 {
        return Vec::new();
    }
    if total <= chunk_size {
        return vec![text.to_string()];
    }

    let overlap = overlap.min(chunk_size - 1);
    let mut chunks = Vec::new();
    let mut start = 0usize;
    let mut prev_end = 0usize;

    loop {
        let hard_end = (start + chunk_size).min(total);
        let end = if hard_end == total {
            total
        } else {
            // The end must leave room for the next start to advance and must
            // move past the previous end.
            let min_end = (start + overlap + 1).max(prev_end + 1);
            find_break(&chars, min_end, hard_end).unwrap_or(hard_end)
        };

        chunks.push(chars[start..end].iter().collect());
        if end == total {
            break;
        }

        let next = end - overlap;
        let floor = (start + 1).max(next.saturating_sub(overlap));
        start = snap_to_word_start(&chars, next, floor);
        prev_end = end;
    }

    chunks
}

/// Chunk every unit, stamping each chunk with a copy of its unit's metadata.
pub fn chunk_units(units: &[TextUnit], chunk_size: usize, overlap: usize) -> Vec<Chunk> {
    units
        .iter()
        .flat_map(|unit| {
            split_text(&unit.text, chunk_size, overlap)
                .into_iter()
                .map(|text| Chunk {
                    text,
                    metadata: unit.metadata.clone(),
                })
        })
        .collect()
}

/// Latest position in `lo..=hi` that directly follows a separator, trying
/// each tier in order.
fn find_break(chars: &[char], lo: usize, hi: usize) -> Option<usize> {
    for tier in BREAK_TIERS {
        for pos in (lo..=hi).rev() {
            if tier.iter().any(|sep| ends_with_at(chars, pos, sep)) {
                return Some(pos);
            }
        }
    }
    None
}

fn ends_with_at(chars: &[char], pos: usize, sep: &str) -> bool {
    let len = sep.chars().count();
    pos >= len && chars[pos - len..pos].iter().copied().eq(sep.chars())
}

/// Move `from` back to the nearest word start not below `floor`.
fn snap_to_word_start(chars: &[char], from: usize, floor: usize) -> usize {
    (floor..=from)
        .rev()
        .find(|&pos| pos > 0 && chars[pos - 1].is_whitespace())
        .unwrap_or(from)
}
