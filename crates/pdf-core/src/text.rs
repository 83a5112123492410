//! Text rendering utilities

use crate::document::Color;

/// Context for rendering text
#[derive(Debug, Clone, PartialEq)]
pub struct TextRenderContext {
    /// PDF font resource name (e.g., "F1")
    pub font_name: String,
    /// Font size in points
    pub font_size: f32,
    /// Text color (RGB)
    pub color: Color,
    /// Baseline shift in points, positive moves text up
    pub rise: f32,
    /// Emulate a bold face by stroking glyph outlines
    pub synthetic_bold: bool,
}

impl TextRenderContext {
    pub fn new(font_name: &str, font_size: f32, color: Color) -> Self {
        Self {
            font_name: font_name.to_string(),
            font_size,
            color,
            rise: 0.0,
            synthetic_bold: false,
        }
    }
}

/// Format a number for a content stream: at most three decimals, no
/// trailing zeros
pub(crate) fn fmt_num(value: f64) -> String {
    let rounded = (value * 1000.0).round() / 1000.0;
    if rounded == 0.0 {
        // avoid "-0"
        return "0".to_string();
    }
    let mut s = format!("{rounded:.3}");
    while s.ends_with('0') {
        s.pop();
    }
    if s.ends_with('.') {
        s.pop();
    }
    s
}

/// Generate PDF operators for text insertion
///
/// Creates the proper PDF text operators (BT, Tf, Td, Tj, ET) to render text
/// at a specific position. The text object is enclosed in `q ... Q` so rise,
/// render mode and line width do not carry over to the next run.
///
/// # Arguments
/// * `text_operand` - Encoded string operand, hex (`<0041>`) or literal (`(A)`)
/// * `x` - X coordinate in points (PDF coordinates, from left)
/// * `y` - Baseline Y coordinate in points (PDF coordinates, from bottom)
/// * `ctx` - Text rendering context
///
/// # Returns
/// Vector of bytes containing the PDF operators
pub fn generate_text_operators(
    text_operand: &str,
    x: f64,
    y: f64,
    ctx: &TextRenderContext,
) -> Vec<u8> {
    let mut ops = String::new();
    let (r, g, b) = (
        fmt_num(ctx.color.r as f64),
        fmt_num(ctx.color.g as f64),
        fmt_num(ctx.color.b as f64),
    );

    ops.push_str("q\n");

    // Begin Text
    ops.push_str("BT\n");

    // Set text color (rg operator for non-stroking color)
    ops.push_str(&format!("{r} {g} {b} rg\n"));

    if ctx.synthetic_bold {
        ops.push_str(&format!("{r} {g} {b} RG\n"));
        ops.push_str(&format!(
            "{} w\n",
            fmt_num(ctx.font_size as f64 * 0.03)
        ));
        ops.push_str("2 Tr\n");
    }

    // Set font and size: /F1 12 Tf
    ops.push_str(&format!(
        "/{} {} Tf\n",
        ctx.font_name,
        fmt_num(ctx.font_size as f64)
    ));

    if ctx.rise != 0.0 {
        ops.push_str(&format!("{} Ts\n", fmt_num(ctx.rise as f64)));
    }

    // Move to position: x y Td
    ops.push_str(&format!("{} {} Td\n", fmt_num(x), fmt_num(y)));

    // Show text: <hex> Tj
    ops.push_str(&format!("{text_operand} Tj\n"));

    // End Text
    ops.push_str("ET\n");
    ops.push_str("Q\n");

    ops.into_bytes()
}

/// Generate a filled rectangle underlining a run of text
///
/// # Arguments
/// * `x` - Left edge in PDF coordinates
/// * `baseline` - Baseline of the run in PDF coordinates
/// * `width` - Run width in points
/// * `font_size` - Font size of the run, which sets offset and thickness
/// * `color` - Fill color
pub fn generate_underline_operators(
    x: f64,
    baseline: f64,
    width: f64,
    font_size: f32,
    color: Color,
) -> Vec<u8> {
    let size = font_size as f64;
    let thickness = size * 0.05;
    let top = baseline - size * 0.1;

    format!(
        "q\n{} {} {} rg\n{} {} {} {} re f\nQ\n",
        fmt_num(color.r as f64),
        fmt_num(color.g as f64),
        fmt_num(color.b as f64),
        fmt_num(x),
        fmt_num(top - thickness),
        fmt_num(width),
        fmt_num(thickness),
    )
    .into_bytes()
}
