//! Line breaking for styled spans inside a box

use crate::markup::{BoxStyle, SpanStyle, StyledSpan};

/// Font metrics needed to lay out text
pub trait TextMeasure {
    /// Advance width of `text` in points
    fn width(&self, text: &str, style: &SpanStyle) -> f64;

    /// Ascent of the font used for `style`, as a fraction of the font size
    fn ascent(&self, style: &SpanStyle) -> f64;
}

/// A run of same-styled text placed on a line
#[derive(Debug, Clone, PartialEq)]
pub struct LaidOutRun {
    pub text: String,
    pub style: SpanStyle,
    /// Offset from the left edge of the box
    pub x: f64,
    pub width: f64,
}

/// One line of a laid out box
#[derive(Debug, Clone, PartialEq)]
pub struct LaidOutLine {
    pub runs: Vec<LaidOutRun>,
    /// Baseline offset from the top edge of the box
    pub baseline: f64,
    pub height: f64,
    pub width: f64,
}

/// Result of fitting spans into a box
#[derive(Debug, Clone, PartialEq, Default)]
pub struct BoxLayout {
    /// Lines that fit, top to bottom
    pub lines: Vec<LaidOutLine>,
    /// Whether content was dropped because the box is too short
    pub overflowed: bool,
}

enum Token {
    Piece(String, SpanStyle),
    Space(SpanStyle),
    Break,
}

/// Whitespace that separates words; no-break space does not
fn is_break_space(c: char) -> bool {
    c.is_whitespace() && c != '\u{A0}'
}

fn tokenize(spans: &[StyledSpan]) -> Vec<Token> {
    let mut tokens = Vec::new();
    for span in spans {
        match span {
            StyledSpan::LineBreak => tokens.push(Token::Break),
            StyledSpan::Text { text, style } => {
                let mut piece = String::new();
                for c in text.chars() {
                    if is_break_space(c) {
                        if !piece.is_empty() {
                            tokens.push(Token::Piece(std::mem::take(&mut piece), style.clone()));
                        }
                        if !matches!(tokens.last(), Some(Token::Space(_))) {
                            tokens.push(Token::Space(style.clone()));
                        }
                    } else {
                        piece.push(c);
                    }
                }
                if !piece.is_empty() {
                    tokens.push(Token::Piece(piece, style.clone()));
                }
            }
        }
    }
    tokens
}

struct LineBuilder<'a> {
    measure: &'a dyn TextMeasure,
    base: &'a BoxStyle,
    max_width: f64,
    max_height: f64,
    items: Vec<(String, SpanStyle, f64)>,
    width: f64,
    pending_space: Option<SpanStyle>,
    top: f64,
    layout: BoxLayout,
}

impl LineBuilder<'_> {
    fn place_word(&mut self, word: Vec<(String, SpanStyle)>) {
        if word.is_empty() {
            return;
        }
        let pieces: Vec<(String, SpanStyle, f64)> = word
            .into_iter()
            .map(|(text, style)| {
                let width = self.measure.width(&text, &style);
                (text, style, width)
            })
            .collect();
        let word_width: f64 = pieces.iter().map(|(_, _, w)| w).sum();

        let space = self
            .pending_space
            .take()
            .filter(|_| !self.items.is_empty())
            .map(|style| {
                let width = self.measure.width(" ", &style);
                (" ".to_string(), style, width)
            });
        let space_width = space.as_ref().map(|(_, _, w)| *w).unwrap_or(0.0);

        if !self.items.is_empty() && self.width + space_width + word_width > self.max_width {
            self.finish_line();
        } else if let Some(space) = space {
            self.width += space.2;
            self.items.push(space);
        }

        self.width += word_width;
        self.items.extend(pieces);
    }

    fn finish_line(&mut self) {
        let items = std::mem::take(&mut self.items);
        self.width = 0.0;
        self.pending_space = None;

        if self.layout.overflowed {
            return;
        }

        let max_size = items
            .iter()
            .map(|(_, style, _)| style.font_size)
            .fold(0.0f32, f32::max);
        let max_size = if max_size > 0.0 {
            max_size
        } else {
            self.base.font_size
        } as f64;
        let line_height = self.base.line_height;
        let height = max_size * line_height;

        if self.top + height > self.max_height + 1e-6 {
            self.layout.overflowed = true;
            return;
        }

        let max_ascent = items
            .iter()
            .map(|(_, style, _)| self.measure.ascent(style) * style.font_size as f64)
            .fold(0.0f64, f64::max);
        let baseline = self.top + max_size * (line_height - 1.0) / 2.0 + max_ascent;

        let mut runs: Vec<LaidOutRun> = Vec::new();
        let mut x = 0.0;
        for (text, style, width) in items {
            match runs.last_mut() {
                Some(run) if run.style == style => {
                    run.text.push_str(&text);
                    run.width += width;
                }
                _ => runs.push(LaidOutRun {
                    text,
                    style,
                    x,
                    width,
                }),
            }
            x += width;
        }

        self.layout.lines.push(LaidOutLine {
            runs,
            baseline,
            height,
            width: x,
        });
        self.top += height;
    }
}

/// Break styled spans into lines that fit a box
///
/// Words are filled greedily; a word wider than the box gets a line of its
/// own. Lines below the bottom of the box are dropped and reported through
/// [`BoxLayout::overflowed`].
///
/// # Arguments
/// * `spans` - Parsed box content
/// * `max_width` - Box width in points
/// * `max_height` - Box height in points
/// * `base` - Box defaults (line height, size of empty lines)
/// * `measure` - Font metrics provider
pub fn layout_spans(
    spans: &[StyledSpan],
    max_width: f64,
    max_height: f64,
    base: &BoxStyle,
    measure: &dyn TextMeasure,
) -> BoxLayout {
    let mut builder = LineBuilder {
        measure,
        base,
        max_width,
        max_height,
        items: Vec::new(),
        width: 0.0,
        pending_space: None,
        top: 0.0,
        layout: BoxLayout::default(),
    };

    let mut word: Vec<(String, SpanStyle)> = Vec::new();
    for token in tokenize(spans) {
        match token {
            Token::Piece(text, style) => word.push((text, style)),
            Token::Space(style) => {
                builder.place_word(std::mem::take(&mut word));
                if !builder.items.is_empty() {
                    builder.pending_space = Some(style);
                }
            }
            Token::Break => {
                builder.place_word(std::mem::take(&mut word));
                builder.finish_line();
            }
        }
    }
    builder.place_word(word);
    if !builder.items.is_empty() {
        builder.finish_line();
    }

    builder.layout
}
