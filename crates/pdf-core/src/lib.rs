//! PDF Core - Low-level PDF stamping
//!
//! This crate provides functionality for:
//! - Opening and saving PDF documents (plain and optimized)
//! - Embedding and subsetting TrueType fonts, or using standard Helvetica
//! - Inserting text at specific coordinates
//! - Laying out inline HTML fragments inside a box
//! - Adding line annotations
//!
//! Pages are addressed by 0-based index. All public coordinates are in points
//! with the origin at the top-left of the page and y growing downwards.
//!
//! # Example
//!
//! ```ignore
//! use pdf_core::{BoxStyle, PdfDocument, Rect};
//!
//! let mut doc = PdfDocument::open("input.pdf")?;
//! let html = "<span style='font-weight:bold'>Hello</span>";
//! doc.insert_htmlbox(0, Rect::new(72.0, 72.0, 400.0, 200.0), html, &BoxStyle::default())?;
//! doc.save("output.pdf")?;
//! ```

mod document;
mod font;
mod geometry;
mod layout;
pub mod markup;
mod standard;
mod text;

pub use document::{BoxOutcome, Color, PdfDocument, TextStyle, DEFAULT_FAMILY};
pub use font::{FontData, FontFamily, FontFamilyBuilder, FontStyle, FontWeight};
pub use geometry::{PageBox, Point, Rect};
pub use layout::{layout_spans, BoxLayout, LaidOutLine, LaidOutRun, TextMeasure};
pub use markup::{parse_markup, BoxStyle, SpanStyle, StyledSpan, VerticalAlign};
pub use standard::StandardFont;
pub use text::{generate_text_operators, generate_underline_operators, TextRenderContext};

use thiserror::Error;

/// Errors that can occur during PDF operations
#[derive(Debug, Error)]
pub enum PdfError {
    #[error("Failed to open PDF: {0}")]
    OpenError(String),

    #[error("Failed to save PDF: {0}")]
    SaveError(String),

    #[error("Font not found: {0}")]
    FontNotFound(String),

    #[error("Font already exists: {0}")]
    FontAlreadyExists(String),

    #[error("Failed to parse font: {0}")]
    FontParseError(String),

    #[error("Font subset error: {0}")]
    FontSubsetError(String),

    #[error("Invalid page index: {0} (document has {1} pages)")]
    InvalidPage(usize, usize),

    #[error("Invalid markup: {0}")]
    Markup(String),

    #[error("PDF parsing error: {0}")]
    ParseError(String),

    #[error("IO error: {0}")]
    IoError(#[from] std::io::Error),

    #[error("Lopdf error: {0}")]
    LopdfError(#[from] lopdf::Error),
}

/// Result type for PDF operations
pub type Result<T> = std::result::Result<T, PdfError>;
