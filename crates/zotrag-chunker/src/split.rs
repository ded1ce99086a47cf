//! Size-bounded text splitting.

/// Approximate characters per token.
pub const CHARS_PER_TOKEN: usize = 4;

/// Rough token count of `text`.
#[must_use]
pub fn estimate_tokens(text: &str) -> usize {
    text.chars().count().div_ceil(CHARS_PER_TOKEN)
}

/// Split `text` into pieces of at most `max_chars` characters.
///
/// Pieces end at a paragraph break, a line break or a sentence end when one
/// falls in the last fifth of the window; otherwise at the window edge.
/// Pieces are trimmed and empty pieces dropped.
#[must_use]
pub fn split_text(text: &str, max_chars: usize) -> Vec<String> {
    let max_chars = max_chars.max(1);
    let chars: Vec<char> = text.chars().collect();
    let total = chars.len();

    let mut pieces = Vec::new();
    let mut start = 0;
    while start < total {
        let end = find_break_point(&chars, start, (start + max_chars).min(total), total);
        let piece: String = chars[start..end].iter().collect();
        let piece = piece.trim();
        if !piece.is_empty() {
            pieces.push(piece.to_string());
        }
        start = end;
    }
    pieces
}

/// Find a good break point at or before `target_end`.
fn find_break_point(chars: &[char], start: usize, target_end: usize, total: usize) -> usize {
    if target_end >= total {
        return total;
    }

    let search_start = target_end.saturating_sub((target_end - start) / 5).max(start + 1);

    // Prefer double newline (paragraph break)
    for i in (search_start..target_end).rev() {
        if chars[i - 1] == '\n' && chars[i] == '\n' {
            return i + 1;
        }
    }

    // Then single newline
    for i in (search_start..target_end).rev() {
        if chars[i] == '\n' {
            return i + 1;
        }
    }

    // Then sentence end
    for i in (search_start..target_end).rev() {
        if matches!(chars[i], '.' | '!' | '?') && chars[i + 1].is_whitespace() {
            return i + 1;
        }
    }

    target_end
}
