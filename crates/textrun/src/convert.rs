//! Text run to markup conversion
//!
//! Every run becomes a pair of nested spans whose inner `style` attribute
//! carries the declarations derived from the run's attributes:
//!
//! ```text
//! <span><span style='font-size:12; color:#112233; font-weight:bold'>Hi</span></span>
//! ```

use pdf_core::Point;
use serde::Deserialize;
use serde_json::Value;

use crate::schema::{TextAttributes, TextRunRecord};
use crate::{Result, TextRunError};

/// Factors applied to run positions
#[derive(Debug, Clone, Copy, PartialEq)]
pub struct Scale {
    pub x: f64,
    pub y: f64,
}

impl Scale {
    pub fn new(x: f64, y: f64) -> Self {
        Self { x, y }
    }
}

impl Default for Scale {
    fn default() -> Self {
        Self { x: 1.0, y: 1.0 }
    }
}

/// A run ready for insertion: markup plus top-left position on the page
#[derive(Debug, Clone, PartialEq)]
pub struct StyledText {
    pub html: String,
    pub position: Point,
}

/// Escape text so the box parser reads it back verbatim
pub fn escape_html(text: &str) -> String {
    let mut out = String::with_capacity(text.len());
    for c in text.chars() {
        match c {
            '&' => out.push_str("&amp;"),
            '<' => out.push_str("&lt;"),
            '>' => out.push_str("&gt;"),
            '\'' => out.push_str("&#39;"),
            '"' => out.push_str("&quot;"),
            _ => out.push(c),
        }
    }
    out
}

/// CSS declarations for a run, in a fixed order
pub fn style_declarations(attrs: &TextAttributes) -> Vec<String> {
    let mut decls = Vec::new();

    if let Some(size) = attrs.font_size {
        decls.push(format!("font-size:{size}"));
    }
    if !attrs.color_code.trim().is_empty() {
        decls.push(format!("color:{}", attrs.color_code));
    }

    let keywords = attrs.keywords();
    if keywords.contains("underline") {
        decls.push("text-decoration:underline".to_string());
    }
    if keywords.contains("bold") {
        decls.push("font-weight:bold".to_string());
    }
    if keywords.contains("superscript") {
        decls.push("vertical-align:super".to_string());
        decls.push("font-size:smaller".to_string());
    }

    decls
}

/// Convert a parsed run into markup and a scaled position
pub fn record_to_markup(record: &TextRunRecord, scale: Scale) -> Option<StyledText> {
    let attrs = record.attributes()?;
    let html = format!(
        "<span><span style='{}'>{}</span></span>",
        style_declarations(attrs).join("; "),
        escape_html(&attrs.trans_org)
    );

    Some(StyledText {
        html,
        position: Point::new(record.left * scale.x, record.top * scale.y),
    })
}

/// Convert one raw JSON run
///
/// Any missing or malformed field is reported as
/// [`TextRunError::MalformedRecord`] carrying the offending JSON.
pub fn convert_record(value: &Value, scale: Scale) -> Result<StyledText> {
    let record = TextRunRecord::deserialize(value)
        .map_err(|e| TextRunError::malformed(e.to_string(), value))?;
    record_to_markup(&record, scale)
        .ok_or_else(|| TextRunError::malformed("text has no attributes", value))
}

#[cfg(test)]
mod tests {
    use super::*;
    use pretty_assertions::assert_eq;
    use serde_json::json;

    fn run(font_weight: &str, font_size: Value, color: &str, text: &str) -> Value {
        json!({
            "left": "10",
            "top": 20,
            "text": [{
                "fontWeight": font_weight,
                "font_size": font_size,
                "colorCode": color,
                "transOrg": text
            }]
        })
    }

    #[test]
    fn test_declaration_order() {
        let value = run("bold underline", json!(12), "#112233", "Hi");
        let styled = convert_record(&value, Scale::default()).unwrap();

        assert_eq!(
            styled.html,
            "<span><span style='font-size:12; color:#112233; \
             text-decoration:underline; font-weight:bold'>Hi</span></span>"
        );
        assert_eq!(styled.position, Point::new(10.0, 20.0));
    }

    #[test]
    fn test_empty_size_and_color() {
        let value = run("", json!(""), "", "plain");
        let styled = convert_record(&value, Scale::default()).unwrap();

        assert_eq!(styled.html, "<span><span style=''>plain</span></span>");
    }

    #[test]
    fn test_numeric_string_size() {
        let from_string = convert_record(&run("", json!("12"), "", "a"), Scale::default()).unwrap();
        let from_number = convert_record(&run("", json!(12), "", "a"), Scale::default()).unwrap();
        assert_eq!(from_string, from_number);
        assert!(from_string.html.contains("style='font-size:12'"));

        let fractional = convert_record(&run("", json!(12.5), "", "a"), Scale::default()).unwrap();
        assert!(fractional.html.contains("style='font-size:12.5'"));
    }

    #[test]
    fn test_superscript() {
        let value = run("superscript", Value::Null, "", "2");
        let styled = convert_record(&value, Scale::default()).unwrap();

        assert_eq!(
            styled.html,
            "<span><span style='vertical-align:super; font-size:smaller'>2</span></span>"
        );
    }

    #[test]
    fn test_keywords_are_case_insensitive() {
        let value = run("BOLD Italic", Value::Null, "", "x");
        let styled = convert_record(&value, Scale::default()).unwrap();

        assert!(styled.html.contains("style='font-weight:bold'"));
    }

    #[test]
    fn test_scale() {
        let value = run("", Value::Null, "", "x");
        let styled = convert_record(&value, Scale::new(2.0, 0.5)).unwrap();

        assert_eq!(styled.position, Point::new(20.0, 10.0));
    }

    #[test]
    fn test_text_is_escaped() {
        let value = run("", Value::Null, "", "a<b> & 'c' \"d\"");
        let styled = convert_record(&value, Scale::default()).unwrap();

        assert!(styled
            .html
            .contains(">a&lt;b&gt; &amp; &#39;c&#39; &quot;d&quot;<"));
    }

    #[test]
    fn test_idempotent() {
        let value = run("bold superscript", json!("9"), "#fff", "same");
        let first = convert_record(&value, Scale::new(1.5, 1.5)).unwrap();
        let second = convert_record(&value, Scale::new(1.5, 1.5)).unwrap();

        assert_eq!(first, second);
    }

    #[test]
    fn test_malformed_records() {
        let cases = vec![
            json!({"top": 1, "text": []}),
            json!({"left": 1, "top": 1, "text": []}),
            json!({"left": "x", "top": 1, "text": [{}]}),
            json!({"left": 1, "top": 1, "text": [{"fontWeight": "", "font_size": "big", "colorCode": "", "transOrg": ""}]}),
            json!("not a record"),
        ];

        for value in cases {
            match convert_record(&value, Scale::default()) {
                Err(TextRunError::MalformedRecord { record, .. }) => assert_eq!(record, value),
                other => panic!("expected malformed record for {value}, got {other:?}"),
            }
        }
    }
}
