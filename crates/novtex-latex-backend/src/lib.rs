//! Token stream to LaTeX backend.

use std::fmt;

use novtex_tokens::{sorted_spans, Alignment, FormatKind, FormatSpan, SpanError, Token, TokenKind};

pub mod rewrite;
pub mod wrap;

pub use rewrite::{auto_replace, escape_latex, Rewritten};
pub use wrap::TextWrapper;

const COMMENT_PREFIX: &str = "% ";
const COMMENT_CONTINUATION: &str = "\n% ";

#[derive(Debug, Clone)]
pub struct LatexRenderOptions {
    /// Line width for wrapping; `0` turns wrapping off.
    pub word_wrap: usize,
    pub include_comments: bool,
    pub include_commands: bool,
    pub auto_replace: bool,
    pub escape_specials: bool,
    /// Emit a paragraph still buffered when the stream ends without an
    /// empty-line token. When false the paragraph is dropped.
    pub flush_trailing_paragraph: bool,
}

impl Default for LatexRenderOptions {
    fn default() -> Self {
        Self {
            word_wrap: 0,
            include_comments: false,
            include_commands: false,
            auto_replace: true,
            escape_specials: false,
            flush_trailing_paragraph: true,
        }
    }
}

#[derive(Debug, Clone, PartialEq, Eq)]
pub enum RenderError {
    InvalidSpan { token: usize, source: SpanError },
}

impl fmt::Display for RenderError {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            RenderError::InvalidSpan { token, source } => {
                write!(f, "invalid format span in token {}: {}", token, source)
            }
        }
    }
}

impl std::error::Error for RenderError {
    fn source(&self) -> Option<&(dyn std::error::Error + 'static)> {
        match self {
            RenderError::InvalidSpan { source, .. } => Some(source),
        }
    }
}

/// Non-fatal findings of a render.
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum RenderWarning {
    /// The stream ended mid-paragraph; the paragraph was emitted anyway.
    UnterminatedParagraph { lines: usize },
    /// The stream ended mid-paragraph and the paragraph was discarded.
    DroppedParagraph { lines: usize },
    /// A token of a kind this backend does not render was skipped.
    UnknownToken { index: usize },
}

impl RenderWarning {
    pub fn kind(&self) -> &'static str {
        match self {
            RenderWarning::UnterminatedParagraph { .. } => "unterminated-paragraph",
            RenderWarning::DroppedParagraph { .. } => "dropped-paragraph",
            RenderWarning::UnknownToken { .. } => "unknown-token",
        }
    }
}

impl fmt::Display for RenderWarning {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            RenderWarning::UnterminatedParagraph { lines } => write!(
                f,
                "token stream ended inside a paragraph; flushed {} line(s)",
                lines
            ),
            RenderWarning::DroppedParagraph { lines } => write!(
                f,
                "token stream ended inside a paragraph; dropped {} line(s)",
                lines
            ),
            RenderWarning::UnknownToken { index } => {
                write!(f, "skipped token {} of unknown kind", index)
            }
        }
    }
}

#[derive(Debug, Clone, PartialEq, Eq)]
pub struct Rendered {
    pub content: String,
    pub warnings: Vec<RenderWarning>,
}

pub fn render_tokens(
    tokens: &[Token],
    options: &LatexRenderOptions,
) -> Result<String, RenderError> {
    render_tokens_with_report(tokens, options).map(|rendered| rendered.content)
}

pub fn render_tokens_with_report(
    tokens: &[Token],
    options: &LatexRenderOptions,
) -> Result<Rendered, RenderError> {
    for (idx, token) in tokens.iter().enumerate() {
        token
            .validate_spans()
            .map_err(|source| RenderError::InvalidSpan { token: idx, source })?;
    }
    tracing::debug!(
        tokens = tokens.len(),
        word_wrap = options.word_wrap,
        "rendering token stream to LaTeX"
    );

    let mut writer = LatexWriter::new(options);
    for (idx, token) in tokens.iter().enumerate() {
        writer.push_token(idx, token);
    }
    Ok(writer.finish())
}

/// Output buffer plus the paragraph lines waiting for their empty-line token.
struct LatexWriter<'a> {
    options: &'a LatexRenderOptions,
    plain_wrap: Option<TextWrapper>,
    comment_wrap: Option<TextWrapper>,
    out: String,
    paragraph: Vec<String>,
    warnings: Vec<RenderWarning>,
}

impl<'a> LatexWriter<'a> {
    fn new(options: &'a LatexRenderOptions) -> Self {
        let (plain_wrap, comment_wrap) = if options.word_wrap > 0 {
            (
                Some(TextWrapper::new(options.word_wrap)),
                Some(TextWrapper::new(options.word_wrap.saturating_sub(2))),
            )
        } else {
            (None, None)
        };
        Self {
            options,
            plain_wrap,
            comment_wrap,
            out: String::new(),
            paragraph: Vec::new(),
            warnings: Vec::new(),
        }
    }

    fn push_token(&mut self, idx: usize, token: &Token) {
        let (begin, end) = align_markers(token.alignment);
        let text = self.prepare_text(token);

        match token.kind {
            TokenKind::Empty => self.flush_paragraph(begin, end),
            TokenKind::Heading1 => {
                self.out.push_str(begin);
                self.out.push_str("{\\Huge ");
                self.out.push_str(&text);
                self.out.push_str("}\n");
                self.out.push_str(end);
            }
            TokenKind::Heading2 => self.push_heading("chapter*", &text),
            TokenKind::Heading3 => self.push_heading("section*", &text),
            TokenKind::Heading4 => self.push_heading("subsection*", &text),
            TokenKind::Separator => {
                self.out.push_str(begin);
                self.out.push_str(&text);
                self.out.push('\n');
                self.out.push_str(end);
            }
            TokenKind::Text => self.paragraph.push(text),
            TokenKind::PageBreak => self.out.push_str("\\newpage\n\n"),
            TokenKind::Comment => {
                if self.options.include_comments {
                    self.out.push_str(&text);
                    self.out.push_str("\n\n");
                }
            }
            TokenKind::Command => {
                if self.options.include_commands {
                    self.out.push_str("% @");
                    self.out.push_str(&text);
                    self.out.push_str("\n\n");
                }
            }
            TokenKind::Unknown => {
                tracing::trace!(index = idx, "skipping token of unknown kind");
                self.warnings.push(RenderWarning::UnknownToken { index: idx });
            }
        }
    }

    /// Rewrites, formats and wraps the token text, in that order. Span
    /// offsets are carried through the rewrites before they are resolved.
    fn prepare_text(&self, token: &Token) -> String {
        let mut text = token.text.clone();
        let mut spans = token.spans.clone();

        if self.options.auto_replace {
            let rewritten = auto_replace(&text);
            spans = rewritten.remap_spans(&spans);
            text = rewritten.text;
        }
        if self.options.escape_specials && is_escaped_kind(token.kind) {
            let rewritten = escape_latex(&text);
            spans = rewritten.remap_spans(&spans);
            text = rewritten.text;
        }

        match token.kind {
            TokenKind::Comment => text = format!("{}{}", COMMENT_PREFIX, text),
            TokenKind::Text => text = splice_spans(&text, &spans),
            _ => {}
        }

        if let Some(plain) = self.plain_wrap {
            if text.chars().count() > plain.width() {
                text = match (token.kind, self.comment_wrap) {
                    (TokenKind::Comment, Some(comment)) => {
                        comment.wrap(&text).join(COMMENT_CONTINUATION)
                    }
                    _ => plain.fill(&text),
                };
            }
        }
        text
    }

    fn push_heading(&mut self, command: &str, text: &str) {
        self.out.push('\\');
        self.out.push_str(command);
        self.out.push('{');
        self.out.push_str(text);
        self.out.push_str("}\n\n");
    }

    fn flush_paragraph(&mut self, begin: &str, end: &str) {
        if self.paragraph.is_empty() {
            return;
        }
        self.out.push_str(begin);
        for line in self.paragraph.drain(..) {
            self.out.push_str(&line);
            self.out.push('\n');
        }
        self.out.push_str(end);
    }

    fn finish(mut self) -> Rendered {
        if !self.paragraph.is_empty() {
            let lines = self.paragraph.len();
            if self.options.flush_trailing_paragraph {
                tracing::warn!(lines, "token stream ended inside a paragraph; flushing");
                let (begin, end) = align_markers(Alignment::Left);
                self.flush_paragraph(begin, end);
                self.warnings.push(RenderWarning::UnterminatedParagraph { lines });
            } else {
                tracing::warn!(lines, "token stream ended inside a paragraph; dropping");
                self.paragraph.clear();
                self.warnings.push(RenderWarning::DroppedParagraph { lines });
            }
        }
        Rendered {
            content: self.out,
            warnings: self.warnings,
        }
    }
}

fn align_markers(alignment: Alignment) -> (&'static str, &'static str) {
    match alignment {
        Alignment::Center => ("\\begin{center}\n", "\\end{center}\n\n"),
        Alignment::Left => ("", "\n"),
    }
}

fn is_escaped_kind(kind: TokenKind) -> bool {
    matches!(
        kind,
        TokenKind::Text
            | TokenKind::Heading1
            | TokenKind::Heading2
            | TokenKind::Heading3
            | TokenKind::Heading4
            | TokenKind::Separator
    )
}

fn format_tag(kind: FormatKind) -> &'static str {
    match kind {
        FormatKind::BoldBegin => "\\textbf{",
        FormatKind::ItalicBegin => "\\textit{",
        FormatKind::UnderlineBegin => "\\underline{",
        FormatKind::BoldEnd | FormatKind::ItalicEnd | FormatKind::UnderlineEnd => "}",
    }
}

/// Replaces each span's delimiter characters with its LaTeX markup.
///
/// Spans are applied from the highest offset down, so every splice point is
/// still measured against the unmodified prefix. Spans must be in bounds and
/// must not overlap.
fn splice_spans(text: &str, spans: &[FormatSpan]) -> String {
    if spans.is_empty() {
        return text.to_string();
    }
    let chars: Vec<char> = text.chars().collect();
    let mut pieces: Vec<String> = Vec::with_capacity(spans.len() * 2 + 1);
    let mut cursor = chars.len();
    for span in sorted_spans(spans).iter().rev() {
        let end = span.end().min(cursor);
        let start = span.position.min(end);
        pieces.push(chars[end..cursor].iter().collect());
        pieces.push(format_tag(span.kind).to_string());
        cursor = start;
    }
    pieces.push(chars[..cursor].iter().collect());
    pieces.iter().rev().map(String::as_str).collect()
}

#[cfg(test)]
mod tests {
    use super::*;
    use pretty_assertions::assert_eq;

    fn render(tokens: &[Token]) -> String {
        render_tokens(tokens, &LatexRenderOptions::default()).unwrap()
    }

    #[test]
    fn splice_replaces_delimiters() {
        let spans = vec![
            FormatSpan::new(0, 2, FormatKind::BoldBegin),
            FormatSpan::new(6, 2, FormatKind::BoldEnd),
        ];
        assert_eq!(splice_spans("**bold** text", &spans), "\\textbf{bold} text");
    }

    #[test]
    fn splice_handles_unsorted_and_nested_spans() {
        // "_a **b**_" with italic around bold, listed out of order.
        let spans = vec![
            FormatSpan::new(8, 1, FormatKind::ItalicEnd),
            FormatSpan::new(3, 2, FormatKind::BoldBegin),
            FormatSpan::new(0, 1, FormatKind::ItalicBegin),
            FormatSpan::new(6, 2, FormatKind::BoldEnd),
        ];
        assert_eq!(
            splice_spans("_a **b**_", &spans),
            "\\textit{a \\textbf{b}}"
        );
    }

    #[test]
    fn splice_zero_length_spans_keep_input_order() {
        let spans = vec![
            FormatSpan::new(1, 0, FormatKind::UnderlineBegin),
            FormatSpan::new(1, 0, FormatKind::ItalicBegin),
            FormatSpan::new(2, 0, FormatKind::ItalicEnd),
            FormatSpan::new(2, 0, FormatKind::UnderlineEnd),
        ];
        assert_eq!(
            splice_spans("abc", &spans),
            "a\\underline{\\textit{b}}c"
        );
    }

    #[test]
    fn heading_levels() {
        let tokens = vec![
            Token::heading(1, "Title").unwrap(),
            Token::heading(2, "One").unwrap(),
            Token::heading(3, "Scene").unwrap(),
            Token::heading(4, "Beat").unwrap(),
        ];
        assert_eq!(
            render(&tokens),
            "{\\Huge Title}\n\n\\chapter*{One}\n\n\\section*{Scene}\n\n\\subsection*{Beat}\n\n"
        );
    }

    #[test]
    fn centered_title_is_wrapped() {
        let tokens = vec![Token::heading(1, "Title").unwrap().centered()];
        assert_eq!(
            render(&tokens),
            "\\begin{center}\n{\\Huge Title}\n\\end{center}\n\n"
        );
    }

    #[test]
    fn centered_headings_below_title_ignore_alignment() {
        let tokens = vec![Token::heading(2, "One").unwrap().centered()];
        assert_eq!(render(&tokens), "\\chapter*{One}\n\n");
    }

    #[test]
    fn page_break() {
        assert_eq!(render(&[Token::page_break()]), "\\newpage\n\n");
    }

    #[test]
    fn unknown_tokens_are_skipped_with_warning() {
        let tokens = vec![
            Token::new(TokenKind::Unknown, "???"),
            Token::text("A"),
            Token::empty(),
        ];
        let rendered = render_tokens_with_report(&tokens, &LatexRenderOptions::default()).unwrap();
        assert_eq!(rendered.content, "A\n\n");
        assert_eq!(rendered.warnings, vec![RenderWarning::UnknownToken { index: 0 }]);
    }

    #[test]
    fn invalid_span_reports_token_index() {
        let tokens = vec![
            Token::text("fine"),
            Token::text("**x").with_spans(vec![FormatSpan::new(0, 2, FormatKind::BoldBegin)]),
        ];
        let err = render_tokens(&tokens, &LatexRenderOptions::default()).unwrap_err();
        assert!(matches!(err, RenderError::InvalidSpan { token: 1, .. }));
        assert!(err.to_string().contains("token 1"));
    }

    #[test]
    fn comment_wraps_with_continuation_prefix() {
        let options = LatexRenderOptions {
            word_wrap: 12,
            include_comments: true,
            ..LatexRenderOptions::default()
        };
        let out = render_tokens(&[Token::comment("one two three four")], &options).unwrap();
        assert_eq!(out, "% one two\n% three four\n\n");
    }

    #[test]
    fn short_lines_are_not_wrapped() {
        let options = LatexRenderOptions {
            word_wrap: 20,
            ..LatexRenderOptions::default()
        };
        let out = render_tokens(&[Token::text("short  spaced"), Token::empty()], &options).unwrap();
        assert_eq!(out, "short  spaced\n\n");
    }
}
