//! Greedy word wrapping for exported text.
//!
//! Lines break on whitespace and after hyphens inside hyphenated words,
//! `--`/`---` dashes between words form their own break points, and words
//! longer than the line are split. Whitespace at a line break is dropped.
//! Widths are counted in characters.

const TAB_SIZE: usize = 8;

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct TextWrapper {
    width: usize,
}

impl TextWrapper {
    /// A wrapper for the given line width. Widths below one are raised to one.
    pub fn new(width: usize) -> Self {
        Self {
            width: width.max(1),
        }
    }

    pub fn width(&self) -> usize {
        self.width
    }

    /// Wraps `text` into lines of at most `width` characters.
    pub fn wrap(&self, text: &str) -> Vec<String> {
        let prepared = prepare(text);
        let mut chunks = split_chunks(&prepared);
        chunks.reverse();

        let width = self.width;
        let mut lines: Vec<String> = Vec::new();
        while !chunks.is_empty() {
            let mut line: Vec<Vec<char>> = Vec::new();
            let mut len = 0usize;

            if !lines.is_empty() && chunks.last().is_some_and(|c| is_blank(c)) {
                chunks.pop();
            }

            while chunks.last().is_some_and(|c| len + c.len() <= width) {
                if let Some(chunk) = chunks.pop() {
                    len += chunk.len();
                    line.push(chunk);
                }
            }

            if chunks.last().is_some_and(|c| c.len() > width) {
                split_long_word(&mut chunks, &mut line, width - len);
            }

            if line.last().is_some_and(|c| is_blank(c)) {
                line.pop();
            }

            if !line.is_empty() {
                lines.push(line.concat().into_iter().collect());
            }
        }
        lines
    }

    /// [`TextWrapper::wrap`] joined with newlines.
    pub fn fill(&self, text: &str) -> String {
        self.wrap(text).join("\n")
    }
}

/// Expands tabs to the next multiple of eight columns, then turns every
/// other ASCII whitespace character into a plain space.
fn prepare(text: &str) -> Vec<char> {
    let mut out = Vec::with_capacity(text.len());
    let mut column = 0usize;
    for ch in text.chars() {
        match ch {
            '\t' => {
                let pad = TAB_SIZE - column % TAB_SIZE;
                out.resize(out.len() + pad, ' ');
                column += pad;
            }
            '\n' | '\r' => {
                out.push(' ');
                column = 0;
            }
            '\x0b' | '\x0c' => {
                out.push(' ');
                column += 1;
            }
            _ => {
                out.push(ch);
                column += 1;
            }
        }
    }
    out
}

/// Splits prepared text into whitespace runs, words and word fragments.
fn split_chunks(text: &[char]) -> Vec<Vec<char>> {
    let n = text.len();
    let mut chunks = Vec::new();
    let mut i = 0usize;
    while i < n {
        let start = i;

        if is_space(text[i]) {
            while i < n && is_space(text[i]) {
                i += 1;
            }
            chunks.push(text[start..i].to_vec());
            continue;
        }

        // A dash of two or more hyphens between words.
        if i > 0 && is_word_punct(text[i - 1]) {
            let run = dash_run(text, i);
            if run >= 2 && text.get(i + run).is_some_and(|c| is_word(*c)) {
                i += run;
                chunks.push(text[start..i].to_vec());
                continue;
            }
        }

        i += 1;
        while i < n && !is_space(text[i]) {
            if text[i] == '-' && breaks_after_hyphen(text, i) {
                i += 1;
                break;
            }
            let run = dash_run(text, i);
            if run >= 2
                && is_word_punct(text[i - 1])
                && text.get(i + run).is_some_and(|c| is_word(*c))
            {
                break;
            }
            i += 1;
        }
        chunks.push(text[start..i].to_vec());
    }
    chunks
}

/// Whether a line may break after the hyphen at `at`: the hyphen follows two
/// letters (or a letter-hyphen-letter run) and precedes at least two letters.
fn breaks_after_hyphen(text: &[char], at: usize) -> bool {
    let letter = |idx: usize| text.get(idx).is_some_and(|c| is_letter(*c));
    let before = (at >= 2 && letter(at - 1) && letter(at - 2))
        || (at >= 3 && letter(at - 3) && text[at - 2] == '-' && letter(at - 1));
    let after = letter(at + 1)
        && (letter(at + 2) || (text.get(at + 2) == Some(&'-') && letter(at + 3)));
    before && after
}

fn split_long_word(chunks: &mut [Vec<char>], line: &mut Vec<Vec<char>>, space_left: usize) {
    let Some(chunk) = chunks.last_mut() else {
        return;
    };
    let mut end = space_left;
    if chunk.len() > space_left {
        if let Some(hyphen) = chunk[..space_left].iter().rposition(|c| *c == '-') {
            if hyphen > 0 && chunk[..hyphen].iter().any(|c| *c != '-') {
                end = hyphen + 1;
            }
        }
    }
    let head: Vec<char> = chunk.drain(..end).collect();
    line.push(head);
}

fn dash_run(text: &[char], from: usize) -> usize {
    text[from..].iter().take_while(|c| **c == '-').count()
}

fn is_space(ch: char) -> bool {
    matches!(ch, ' ' | '\t' | '\n' | '\x0b' | '\x0c' | '\r')
}

fn is_blank(chunk: &[char]) -> bool {
    chunk.iter().all(|c| c.is_whitespace())
}

fn is_word(ch: char) -> bool {
    ch.is_alphanumeric() || ch == '_'
}

fn is_letter(ch: char) -> bool {
    ch.is_alphabetic()
}

fn is_word_punct(ch: char) -> bool {
    is_word(ch) || matches!(ch, '!' | '"' | '\'' | '&' | '.' | ',' | '?')
}
