//! Character-level text rewrites that keep format spans in place.
//!
//! Span offsets are recorded against the text the tokenizer saw. Any rewrite
//! that changes the length of the text (dash replacement, escaping) must
//! therefore run before the spans are resolved, and the spans must be moved
//! along with the characters they point at. [`Rewritten`] carries the new
//! text together with a per-character offset map for that purpose.

use lazy_static::lazy_static;
use novtex_tokens::FormatSpan;
use phf::phf_map;
use regex::Regex;

/// Typographic characters LaTeX spells out with ASCII ligatures.
static AUTO_REPLACE: phf::Map<char, &'static str> = phf_map! {
    '\u{2013}' => "--",
    '\u{2014}' => "---",
    '\u{2500}' => "---",
    '\u{2026}' => "...",
};

static LATEX_SPECIALS: phf::Map<char, &'static str> = phf_map! {
    '\\' => "\\textbackslash{}",
    '{' => "\\{",
    '}' => "\\}",
    '$' => "\\$",
    '&' => "\\&",
    '%' => "\\%",
    '#' => "\\#",
    '_' => "\\_",
    '^' => "\\textasciicircum{}",
    '~' => "\\textasciitilde{}",
};

lazy_static! {
    static ref AUTO_REPLACE_RE: Regex = {
        let mut keys: Vec<char> = AUTO_REPLACE.keys().copied().collect();
        keys.sort_unstable();
        let alternation = keys
            .iter()
            .map(|ch| regex::escape(&ch.to_string()))
            .collect::<Vec<_>>()
            .join("|");
        Regex::new(&alternation).expect("auto-replace pattern is valid")
    };
}

/// Text produced by a rewrite, plus where each original character went.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct Rewritten {
    pub text: String,
    /// `offsets[i]` is the character offset in `text` of original character
    /// `i`; the final entry maps the end of the original text.
    offsets: Vec<usize>,
    len: usize,
}

impl Rewritten {
    fn with_capacity(bytes: usize) -> Self {
        Self {
            text: String::with_capacity(bytes),
            offsets: Vec::new(),
            len: 0,
        }
    }

    pub fn identity(text: &str) -> Self {
        let mut out = Self::with_capacity(text.len());
        out.push_verbatim(text);
        out.finish()
    }

    fn push_verbatim(&mut self, text: &str) {
        for ch in text.chars() {
            self.offsets.push(self.len);
            self.text.push(ch);
            self.len += 1;
        }
    }

    fn push_replaced(&mut self, original: &str, replacement: &str) {
        for _ in original.chars() {
            self.offsets.push(self.len);
        }
        self.text.push_str(replacement);
        self.len += replacement.chars().count();
    }

    fn finish(mut self) -> Self {
        self.offsets.push(self.len);
        self
    }

    /// Character length of the rewritten text.
    pub fn char_len(&self) -> usize {
        self.len
    }

    /// Maps an offset in the original text to the rewritten text. Offsets past
    /// the end clamp to the end.
    pub fn map_offset(&self, original: usize) -> usize {
        self.offsets
            .get(original)
            .copied()
            .unwrap_or(self.len)
    }

    /// Moves spans onto the rewritten text. A span's start and end are mapped
    /// independently, so a span covering rewritten characters grows with them.
    pub fn remap_spans(&self, spans: &[FormatSpan]) -> Vec<FormatSpan> {
        spans
            .iter()
            .map(|span| {
                let start = self.map_offset(span.position);
                let end = self.map_offset(span.end());
                FormatSpan::new(start, end - start, span.kind)
            })
            .collect()
    }
}

/// Replaces typographic dashes and ellipses with their LaTeX spellings.
///
/// All candidates are matched by one combined pattern, so a replacement is
/// never itself rewritten.
pub fn auto_replace(text: &str) -> Rewritten {
    let mut out = Rewritten::with_capacity(text.len());
    let mut last = 0;
    for m in AUTO_REPLACE_RE.find_iter(text) {
        out.push_verbatim(&text[last..m.start()]);
        let matched = m.as_str();
        let replacement = matched
            .chars()
            .next()
            .and_then(|ch| AUTO_REPLACE.get(&ch))
            .copied()
            .unwrap_or(matched);
        out.push_replaced(matched, replacement);
        last = m.end();
    }
    out.push_verbatim(&text[last..]);
    out.finish()
}

/// Escapes the characters LaTeX treats as special.
pub fn escape_latex(text: &str) -> Rewritten {
    let mut out = Rewritten::with_capacity(text.len());
    let mut buf = [0u8; 4];
    for ch in text.chars() {
        let original: &str = ch.encode_utf8(&mut buf);
        match LATEX_SPECIALS.get(&ch) {
            Some(escaped) => out.push_replaced(original, escaped),
            None => out.push_verbatim(original),
        }
    }
    out.finish()
}

#[cfg(test)]
mod tests {
    use super::*;
    use novtex_tokens::FormatKind;

    #[test]
    fn replaces_dashes_and_ellipsis() {
        let out = auto_replace("a\u{2013}b\u{2014}c\u{2500}d\u{2026}");
        assert_eq!(out.text, "a--b---c---d...");
    }

    #[test]
    fn leaves_ascii_alone() {
        let out = auto_replace("plain -- text...");
        assert_eq!(out.text, "plain -- text...");
        assert_eq!(out, Rewritten::identity("plain -- text..."));
    }

    #[test]
    fn offsets_shift_after_replacement() {
        let out = auto_replace("\u{2014}ab");
        assert_eq!(out.map_offset(0), 0);
        assert_eq!(out.map_offset(1), 3);
        assert_eq!(out.map_offset(3), 5);
        assert_eq!(out.map_offset(99), 5);
    }

    #[test]
    fn spans_follow_replaced_text() {
        // "x—**y**": bold markers at 2 and 5 in the raw text.
        let out = auto_replace("x\u{2014}**y**");
        let spans = out.remap_spans(&[
            FormatSpan::new(2, 2, FormatKind::BoldBegin),
            FormatSpan::new(5, 2, FormatKind::BoldEnd),
        ]);
        assert_eq!(out.text, "x---**y**");
        assert_eq!(spans[0], FormatSpan::new(4, 2, FormatKind::BoldBegin));
        assert_eq!(spans[1], FormatSpan::new(7, 2, FormatKind::BoldEnd));
    }

    #[test]
    fn escaping_widens_covering_span() {
        let out = escape_latex("_a_ 50%");
        assert_eq!(out.text, "\\_a\\_ 50\\%");
        let spans = out.remap_spans(&[FormatSpan::new(0, 1, FormatKind::ItalicBegin)]);
        assert_eq!(spans[0], FormatSpan::new(0, 2, FormatKind::ItalicBegin));
    }
}
