//! Structured form of FTS `snippet()` output.
//!
//! Snippets are requested with control characters as the match and ellipsis
//! markers, which cannot appear in indexed text once it has gone through
//! [`sanitize`].

use std::ops::Range;

use tracing::warn;

pub const MATCH_START: char = '\u{2}';
pub const MATCH_END: char = '\u{3}';
pub const ELLIPSIS: char = '\u{4}';

fn is_marker(ch: char) -> bool {
    ch == MATCH_START || ch == MATCH_END || ch == ELLIPSIS
}

/// Remove the marker characters so they cannot be confused with real markers
/// in later snippets.
pub fn sanitize(text: &str) -> String {
    text.chars().filter(|&ch| !is_marker(ch)).collect()
}

#[derive(Debug, Clone, Default, PartialEq, Eq, Hash)]
pub struct StructuredSnippet {
    pub ellipsis_at_start: bool,
    pub ellipsis_at_end: bool,
    /// Snippet text with all markers removed.
    pub text: String,
    /// Byte ranges of the matched terms within `text`.
    pub matches: Vec<Range<usize>>,
}

impl StructuredSnippet {
    pub fn parse(raw: &str) -> Self {
        let mut body = raw;
        let ellipsis_at_start = body.starts_with(ELLIPSIS);
        if ellipsis_at_start {
            body = &body[ELLIPSIS.len_utf8()..];
        }
        let ellipsis_at_end = body.ends_with(ELLIPSIS);
        if ellipsis_at_end {
            body = &body[..body.len() - ELLIPSIS.len_utf8()];
        }

        let mut pieces = body.split(MATCH_START);
        let mut text = sanitize(pieces.next().unwrap_or_default());
        let mut matches = Vec::new();

        for piece in pieces {
            let parts: Vec<&str> = piece.split(MATCH_END).collect();
            if let [matched, rest] = parts.as_slice() {
                let start = text.len();
                text.push_str(matched);
                matches.push(start..text.len());
                text.push_str(rest);
            } else {
                warn!(piece, "snippet match start without a matching end");
                text.push_str(&sanitize(piece));
            }
        }

        Self {
            ellipsis_at_start,
            ellipsis_at_end,
            text,
            matches,
        }
    }

    pub fn matched_terms(&self) -> impl Iterator<Item = &str> {
        self.matches.iter().map(|range| &self.text[range.clone()])
    }
}
