//! Inline HTML fragments with CSS `style` attributes
//!
//! Only the inline subset needed to stamp styled text is understood. The
//! parser flattens the element tree into a list of [`StyledSpan`]s, each
//! carrying the fully resolved style of its text.

use crate::document::Color;
use crate::{FontStyle, FontWeight, PdfError, Result, DEFAULT_FAMILY};

/// Scale applied by `font-size:smaller` and by `<sup>`/`<sub>`
pub const SMALLER_RATIO: f32 = 0.83;

/// Scale applied by `font-size:larger`
pub const LARGER_RATIO: f32 = 1.2;

/// Baseline placement of a span
#[derive(Debug, Clone, Copy, PartialEq, Eq, Default)]
pub enum VerticalAlign {
    #[default]
    Baseline,
    Super,
    Sub,
}

/// Defaults for everything inside a text box, like a `* { ... }` CSS rule
#[derive(Debug, Clone, PartialEq)]
pub struct BoxStyle {
    /// Registered font family name
    pub family: String,
    /// Font size in points
    pub font_size: f32,
    /// Text color
    pub color: Color,
    /// Line height as a multiple of the largest font size on a line
    pub line_height: f64,
}

impl Default for BoxStyle {
    fn default() -> Self {
        Self {
            family: DEFAULT_FAMILY.to_string(),
            font_size: 14.0,
            color: Color::from_rgb(0x11, 0x11, 0xdd),
            line_height: 1.2,
        }
    }
}

/// Resolved style of a piece of text
#[derive(Debug, Clone, PartialEq)]
pub struct SpanStyle {
    pub font_size: f32,
    pub color: Color,
    pub weight: FontWeight,
    pub style: FontStyle,
    pub underline: bool,
    pub vertical_align: VerticalAlign,
}

impl SpanStyle {
    /// Root style of a box
    pub fn from_box(base: &BoxStyle) -> Self {
        Self {
            font_size: base.font_size,
            color: base.color,
            weight: FontWeight::Regular,
            style: FontStyle::Normal,
            underline: false,
            vertical_align: VerticalAlign::Baseline,
        }
    }

    /// Apply a CSS declaration list such as `font-size:12; color:#f00`
    ///
    /// Declarations apply in order. Relative sizes scale the size in effect
    /// when they are reached. Unknown properties and unparsable values are
    /// ignored.
    pub fn apply_declarations(&mut self, declarations: &str) {
        for declaration in declarations.split(';') {
            let Some((property, value)) = declaration.split_once(':') else {
                continue;
            };
            let property = property.trim().to_ascii_lowercase();
            let value = value.trim();
            let lower = value.to_ascii_lowercase();

            match property.as_str() {
                "font-size" => {
                    if let Some(size) = parse_font_size(&lower, self.font_size) {
                        self.font_size = size;
                    }
                }
                "color" => {
                    if let Some(color) = Color::parse(value) {
                        self.color = color;
                    }
                }
                "font-weight" => {
                    if let Some(weight) = parse_font_weight(&lower) {
                        self.weight = weight;
                    }
                }
                "font-style" => match lower.as_str() {
                    "italic" | "oblique" => self.style = FontStyle::Italic,
                    "normal" => self.style = FontStyle::Normal,
                    _ => {}
                },
                "text-decoration" | "text-decoration-line" => {
                    if lower.split_whitespace().any(|v| v == "underline") {
                        self.underline = true;
                    } else if lower == "none" {
                        self.underline = false;
                    }
                }
                "vertical-align" => match lower.as_str() {
                    "super" => self.vertical_align = VerticalAlign::Super,
                    "sub" => self.vertical_align = VerticalAlign::Sub,
                    "baseline" => self.vertical_align = VerticalAlign::Baseline,
                    _ => {}
                },
                _ => log::trace!("ignoring CSS property {property}"),
            }
        }
    }
}

/// A flattened piece of box content
#[derive(Debug, Clone, PartialEq)]
pub enum StyledSpan {
    Text { text: String, style: SpanStyle },
    LineBreak,
}

fn parse_font_size(value: &str, current: f32) -> Option<f32> {
    match value {
        "smaller" => return Some(current * SMALLER_RATIO),
        "larger" => return Some(current * LARGER_RATIO),
        _ => {}
    }

    if let Some(percent) = value.strip_suffix('%') {
        let ratio: f32 = percent.trim().parse().ok()?;
        return (ratio > 0.0).then_some(current * ratio / 100.0);
    }

    let number = value
        .strip_suffix("px")
        .or_else(|| value.strip_suffix("pt"))
        .unwrap_or(value)
        .trim();
    let size: f32 = number.parse().ok()?;
    (size > 0.0 && size.is_finite()).then_some(size)
}

fn parse_font_weight(value: &str) -> Option<FontWeight> {
    match value {
        "bold" | "bolder" => Some(FontWeight::Bold),
        "normal" | "lighter" => Some(FontWeight::Regular),
        numeric => {
            let weight: u32 = numeric.parse().ok()?;
            Some(if weight >= 600 {
                FontWeight::Bold
            } else {
                FontWeight::Regular
            })
        }
    }
}

/// Replace character references with the characters they name
///
/// Unknown named entities are kept as written.
pub fn decode_entities(text: &str) -> String {
    let mut out = String::with_capacity(text.len());
    let mut rest = text;

    while let Some(amp) = rest.find('&') {
        out.push_str(&rest[..amp]);
        let after = &rest[amp + 1..];

        let decoded = after.find(';').filter(|&end| end <= 10).and_then(|end| {
            let name = &after[..end];
            decode_entity(name).map(|c| (c, end))
        });

        match decoded {
            Some((c, end)) => {
                out.push(c);
                rest = &after[end + 1..];
            }
            None => {
                out.push('&');
                rest = after;
            }
        }
    }
    out.push_str(rest);
    out
}

fn decode_entity(name: &str) -> Option<char> {
    match name {
        "amp" => Some('&'),
        "lt" => Some('<'),
        "gt" => Some('>'),
        "quot" => Some('"'),
        "apos" => Some('\''),
        "nbsp" => Some('\u{A0}'),
        _ => {
            let numeric = name.strip_prefix('#')?;
            let code = match numeric.strip_prefix(['x', 'X']) {
                Some(hex) => u32::from_str_radix(hex, 16).ok()?,
                None => numeric.parse().ok()?,
            };
            char::from_u32(code)
        }
    }
}

/// A parsed start or end tag
#[derive(Debug, PartialEq)]
struct Tag {
    name: String,
    closing: bool,
    self_closing: bool,
    style: Option<String>,
}

fn is_block(name: &str) -> bool {
    matches!(name, "p" | "div" | "li")
}

/// Index of the `>` closing a tag opened at `start`, skipping quoted values
fn find_tag_end(html: &str, start: usize) -> Option<usize> {
    let mut quote: Option<char> = None;
    for (offset, c) in html[start + 1..].char_indices() {
        match quote {
            Some(q) if c == q => quote = None,
            Some(_) => {}
            None => match c {
                '"' | '\'' => quote = Some(c),
                '>' => return Some(start + 1 + offset),
                _ => {}
            },
        }
    }
    None
}

fn parse_tag(inner: &str) -> Tag {
    let mut body = inner.trim();
    let closing = body.starts_with('/');
    if closing {
        body = body[1..].trim_start();
    }
    let self_closing = body.ends_with('/');
    if self_closing {
        body = body[..body.len() - 1].trim_end();
    }

    let name_end = body
        .find(|c: char| c.is_whitespace())
        .unwrap_or(body.len());
    let name = body[..name_end].to_ascii_lowercase();

    let mut style = None;
    let mut attrs = body[name_end..].trim_start();
    while !attrs.is_empty() {
        let key_end = attrs
            .find(|c: char| c == '=' || c.is_whitespace())
            .unwrap_or(attrs.len());
        let key = attrs[..key_end].to_ascii_lowercase();
        attrs = attrs[key_end..].trim_start();

        let mut value = String::new();
        if let Some(after_eq) = attrs.strip_prefix('=') {
            let after_eq = after_eq.trim_start();
            match after_eq.chars().next() {
                Some(q @ ('"' | '\'')) => {
                    let quoted = &after_eq[1..];
                    let end = quoted.find(q).unwrap_or(quoted.len());
                    value = quoted[..end].to_string();
                    attrs = quoted.get(end + 1..).unwrap_or("").trim_start();
                }
                _ => {
                    let end = after_eq
                        .find(|c: char| c.is_whitespace())
                        .unwrap_or(after_eq.len());
                    value = after_eq[..end].to_string();
                    attrs = after_eq[end..].trim_start();
                }
            }
        }

        if key == "style" {
            style = Some(decode_entities(&value));
        }
        if key.is_empty() {
            break;
        }
    }

    Tag {
        name,
        closing,
        self_closing,
        style,
    }
}

struct Flattener {
    spans: Vec<StyledSpan>,
    stack: Vec<(String, SpanStyle)>,
    root: SpanStyle,
}

impl Flattener {
    fn current(&self) -> &SpanStyle {
        self.stack.last().map(|(_, s)| s).unwrap_or(&self.root)
    }

    fn push_text(&mut self, raw: &str) {
        if raw.is_empty() {
            return;
        }
        let text = decode_entities(raw);
        let style = self.current().clone();

        if let Some(StyledSpan::Text {
            text: last_text,
            style: last_style,
        }) = self.spans.last_mut()
        {
            if *last_style == style {
                last_text.push_str(&text);
                return;
            }
        }
        self.spans.push(StyledSpan::Text { text, style });
    }

    fn line_break(&mut self) {
        self.spans.push(StyledSpan::LineBreak);
    }

    /// Start a new line unless already at the start of one
    fn block_boundary(&mut self) {
        if matches!(self.spans.last(), Some(StyledSpan::Text { .. })) {
            self.line_break();
        }
    }

    fn open(&mut self, tag: Tag) {
        if tag.name == "br" {
            self.line_break();
            return;
        }
        if is_block(&tag.name) {
            self.block_boundary();
        }
        if tag.self_closing {
            return;
        }

        let mut style = self.current().clone();
        match tag.name.as_str() {
            "b" | "strong" => style.weight = FontWeight::Bold,
            "i" | "em" => style.style = FontStyle::Italic,
            "u" => style.underline = true,
            "sup" => {
                style.vertical_align = VerticalAlign::Super;
                style.font_size *= SMALLER_RATIO;
            }
            "sub" => {
                style.vertical_align = VerticalAlign::Sub;
                style.font_size *= SMALLER_RATIO;
            }
            _ => {}
        }
        if let Some(declarations) = &tag.style {
            style.apply_declarations(declarations);
        }
        self.stack.push((tag.name, style));
    }

    fn close(&mut self, tag: Tag) {
        if tag.name == "br" {
            self.line_break();
            return;
        }
        if let Some(pos) = self.stack.iter().rposition(|(name, _)| *name == tag.name) {
            self.stack.truncate(pos);
        }
        if is_block(&tag.name) {
            self.block_boundary();
        }
    }
}

/// Parse an inline HTML fragment into styled spans
///
/// # Arguments
/// * `html` - Markup such as `<span style='font-size:12'>Hi</span>`
/// * `base` - Box defaults inherited by the outermost text
///
/// # Errors
/// Returns [`PdfError::Markup`] for a tag or comment that is never closed.
pub fn parse_markup(html: &str, base: &BoxStyle) -> Result<Vec<StyledSpan>> {
    let mut flat = Flattener {
        spans: Vec::new(),
        stack: Vec::new(),
        root: SpanStyle::from_box(base),
    };

    let mut pos = 0;
    while let Some(rel) = html[pos..].find('<') {
        let start = pos + rel;
        let after = &html[start + 1..];

        if after.starts_with("!--") {
            flat.push_text(&html[pos..start]);
            let end = after
                .find("-->")
                .ok_or_else(|| PdfError::Markup(format!("unterminated comment at byte {start}")))?;
            pos = start + 1 + end + 3;
            continue;
        }

        let starts_tag = after
            .chars()
            .next()
            .map(|c| c.is_ascii_alphabetic() || c == '/' || c == '!' || c == '?')
            .unwrap_or(false);
        if !starts_tag {
            // A bare '<' is text
            flat.push_text(&html[pos..start + 1]);
            pos = start + 1;
            continue;
        }

        flat.push_text(&html[pos..start]);
        let end = find_tag_end(html, start)
            .ok_or_else(|| PdfError::Markup(format!("unterminated tag at byte {start}")))?;
        let inner = &html[start + 1..end];
        pos = end + 1;

        if inner.starts_with('!') || inner.starts_with('?') {
            // doctype or processing instruction
            continue;
        }

        let tag = parse_tag(inner);
        if tag.closing {
            flat.close(tag);
        } else {
            flat.open(tag);
        }
    }
    flat.push_text(&html[pos..]);

    Ok(flat.spans)
}

#[cfg(test)]
mod tests {
    use super::*;
    use pretty_assertions::assert_eq;

    fn text_spans(spans: &[StyledSpan]) -> Vec<(&str, &SpanStyle)> {
        spans
            .iter()
            .filter_map(|span| match span {
                StyledSpan::Text { text, style } => Some((text.as_str(), style)),
                StyledSpan::LineBreak => None,
            })
            .collect()
    }

    #[test]
    fn test_plain_text_uses_box_defaults() {
        let base = BoxStyle::default();
        let spans = parse_markup("Hello world", &base).unwrap();

        assert_eq!(
            spans,
            vec![StyledSpan::Text {
                text: "Hello world".to_string(),
                style: SpanStyle::from_box(&base),
            }]
        );
    }

    #[test]
    fn test_record_markup() {
        let html = "<span><span style='font-size:12; color:#ff0000; \
                    text-decoration:underline; font-weight:bold'>Total</span></span>";
        let spans = parse_markup(html, &BoxStyle::default()).unwrap();
        let texts = text_spans(&spans);

        assert_eq!(texts.len(), 1);
        let (text, style) = texts[0];
        assert_eq!(text, "Total");
        assert_eq!(style.font_size, 12.0);
        assert_eq!(style.color, Color::rgb(1.0, 0.0, 0.0));
        assert!(style.underline);
        assert_eq!(style.weight, FontWeight::Bold);
        assert_eq!(style.vertical_align, VerticalAlign::Baseline);
    }

    #[test]
    fn test_superscript_declarations() {
        let html = "<span style='font-size:12; vertical-align:super; font-size:smaller'>2</span>";
        let spans = parse_markup(html, &BoxStyle::default()).unwrap();
        let (_, style) = text_spans(&spans)[0];

        assert_eq!(style.vertical_align, VerticalAlign::Super);
        assert!((style.font_size - 12.0 * SMALLER_RATIO).abs() < 1e-4);
    }

    #[test]
    fn test_nested_styles_inherit_and_restore() {
        let html = "a<b>b<i>c</i></b>d";
        let spans = parse_markup(html, &BoxStyle::default()).unwrap();
        let texts = text_spans(&spans);

        assert_eq!(texts.len(), 4);
        assert_eq!(texts[0].1.weight, FontWeight::Regular);
        assert_eq!(texts[1].1.weight, FontWeight::Bold);
        assert_eq!(texts[2].1.weight, FontWeight::Bold);
        assert_eq!(texts[2].1.style, FontStyle::Italic);
        assert_eq!(texts[3].1.weight, FontWeight::Regular);
        assert_eq!(texts[3].1.style, FontStyle::Normal);
    }

    #[test]
    fn test_adjacent_same_style_merges() {
        let spans = parse_markup("<span>ab</span><span>cd</span>", &BoxStyle::default()).unwrap();
        assert_eq!(text_spans(&spans)[0].0, "abcd");
        assert_eq!(spans.len(), 1);
    }

    #[test]
    fn test_line_breaks() {
        let html = "one<br>two</br>three<br/>four";
        let spans = parse_markup(html, &BoxStyle::default()).unwrap();
        let breaks = spans
            .iter()
            .filter(|s| matches!(s, StyledSpan::LineBreak))
            .count();
        assert_eq!(breaks, 3);
    }

    #[test]
    fn test_block_elements_break_lines() {
        let html = "text <li style='color:#f00'> - list</li>after";
        let spans = parse_markup(html, &BoxStyle::default()).unwrap();

        assert!(matches!(spans[1], StyledSpan::LineBreak));
        match &spans[2] {
            StyledSpan::Text { text, style } => {
                assert_eq!(text, " - list");
                assert_eq!(style.color, Color::rgb(1.0, 0.0, 0.0));
            }
            other => panic!("expected text, got {other:?}"),
        }
        assert!(matches!(spans[3], StyledSpan::LineBreak));
    }

    #[test]
    fn test_entities_decoded() {
        let spans = parse_markup("a &amp; b &lt;c&gt; &#39;d&#x27; &quot;", &BoxStyle::default())
            .unwrap();
        assert_eq!(text_spans(&spans)[0].0, "a & b <c> 'd' \"");
    }

    #[test]
    fn test_unknown_entity_kept() {
        assert_eq!(decode_entities("&bogus; & x"), "&bogus; & x");
        assert_eq!(decode_entities("&nbsp;"), "\u{A0}");
    }

    #[test]
    fn test_bare_less_than_is_text() {
        let spans = parse_markup("1 < 2", &BoxStyle::default()).unwrap();
        assert_eq!(text_spans(&spans)[0].0, "1 < 2");
    }

    #[test]
    fn test_unterminated_tag_is_error() {
        let result = parse_markup("<span style='x'>ok</span", &BoxStyle::default());
        assert!(matches!(result, Err(PdfError::Markup(_))));
    }

    #[test]
    fn test_quoted_gt_inside_attribute() {
        let spans = parse_markup("<span title='a>b'>x</span>", &BoxStyle::default()).unwrap();
        assert_eq!(text_spans(&spans)[0].0, "x");
    }

    #[test]
    fn test_font_size_units() {
        assert_eq!(parse_font_size("12", 14.0), Some(12.0));
        assert_eq!(parse_font_size("12.5px", 14.0), Some(12.5));
        assert_eq!(parse_font_size("9pt", 14.0), Some(9.0));
        assert_eq!(parse_font_size("50%", 14.0), Some(7.0));
        assert_eq!(parse_font_size("larger", 10.0), Some(12.0));
        assert_eq!(parse_font_size("-3", 14.0), None);
        assert_eq!(parse_font_size("big", 14.0), None);
    }

    #[test]
    fn test_font_weight_values() {
        assert_eq!(parse_font_weight("700"), Some(FontWeight::Bold));
        assert_eq!(parse_font_weight("600"), Some(FontWeight::Bold));
        assert_eq!(parse_font_weight("400"), Some(FontWeight::Regular));
        assert_eq!(parse_font_weight("heavy"), None);
    }

    #[test]
    fn test_invalid_declarations_ignored() {
        let mut style = SpanStyle::from_box(&BoxStyle::default());
        let before = style.clone();
        style.apply_declarations("color: nope; font-size: ; border: 1px solid; garbage");
        assert_eq!(style, before);
    }

    #[test]
    fn test_sup_and_sub_tags() {
        let spans = parse_markup("x<sup>2</sup>y<sub>i</sub>", &BoxStyle::default()).unwrap();
        let texts = text_spans(&spans);
        assert_eq!(texts[1].1.vertical_align, VerticalAlign::Super);
        assert_eq!(texts[3].1.vertical_align, VerticalAlign::Sub);
        assert!(texts[1].1.font_size < 14.0);
    }

    #[test]
    fn test_comments_skipped() {
        let spans = parse_markup("a<!-- hidden -->b", &BoxStyle::default()).unwrap();
        assert_eq!(text_spans(&spans)[0].0, "ab");
    }
}
