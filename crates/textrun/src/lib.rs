//! Text runs - JSON text stamped onto PDF pages
//!
//! This crate provides:
//! - The JSON data model for pages and text runs
//! - Conversion of a text run into inline markup and a position
//! - Rendering of page records into a [`pdf_core::PdfDocument`]
//! - A debug grid of line annotations with coordinate labels
//! - The end-to-end pipeline: copy, stamp, checkpoint, optimize
//!
//! # Example
//!
//! ```ignore
//! use textrun::{run, StampConfig};
//!
//! let config = StampConfig::new("input.pdf", "texts.json", "output.pdf");
//! let summary = run(&config)?;
//! println!("stamped {} runs", summary.report.stamped);
//! ```

pub mod convert;
pub mod grid;
pub mod pipeline;
mod render;
mod schema;

pub use convert::{convert_record, record_to_markup, Scale, StyledText};
pub use grid::{draw_grid, GridOptions};
pub use pipeline::{optimized_path, run, FontPaths, RunSummary, StampConfig, WorkingCopy};
pub use render::{PageStamper, StampReport};
pub use schema::*;

use std::path::PathBuf;
use std::str::FromStr;

use thiserror::Error;

/// Errors that can occur while stamping text runs
#[derive(Debug, Error)]
pub enum TextRunError {
    #[error("Malformed text run ({reason}): {record}")]
    MalformedRecord {
        reason: String,
        record: serde_json::Value,
    },

    #[error("Invalid page key {key:?}: {reason}")]
    InvalidPageKey { key: String, reason: String },

    #[error("Invalid input: {0}")]
    Schema(String),

    #[error("Failed to read {path}: {source}")]
    Io {
        path: PathBuf,
        #[source]
        source: std::io::Error,
    },

    #[error("Configuration error: {0}")]
    Config(String),

    #[error("PDF error: {0}")]
    Pdf(#[from] pdf_core::PdfError),

    #[error("JSON error: {0}")]
    Json(#[from] serde_json::Error),
}

impl TextRunError {
    pub(crate) fn malformed(reason: impl Into<String>, record: &serde_json::Value) -> Self {
        Self::MalformedRecord {
            reason: reason.into(),
            record: record.clone(),
        }
    }

    pub(crate) fn io(path: impl Into<PathBuf>, source: std::io::Error) -> Self {
        Self::Io {
            path: path.into(),
            source,
        }
    }
}

/// Result type for text run operations
pub type Result<T> = std::result::Result<T, TextRunError>;

/// What to do with a text run that cannot be converted
#[derive(Debug, Clone, Copy, PartialEq, Eq, Default)]
pub enum ErrorPolicy {
    /// Log the record and carry on with the next one
    #[default]
    Skip,
    /// Stop the batch with the error
    Abort,
}

impl FromStr for ErrorPolicy {
    type Err = TextRunError;

    fn from_str(s: &str) -> Result<Self> {
        match s.to_ascii_lowercase().as_str() {
            "skip" => Ok(Self::Skip),
            "abort" => Ok(Self::Abort),
            other => Err(TextRunError::Config(format!(
                "unknown error policy {other:?}, expected skip or abort"
            ))),
        }
    }
}
