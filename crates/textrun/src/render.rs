//! Stamping page records into a document

use log::{debug, info, warn};
use pdf_core::{BoxOutcome, BoxStyle, PdfDocument, Rect};
use serde_json::Value;

use crate::convert::{convert_record, Scale};
use crate::schema::{PageEntry, PageRecord};
use crate::{ErrorPolicy, Result, TextRunError};

/// Counts collected while stamping
#[derive(Debug, Clone, Copy, PartialEq, Eq, Default)]
pub struct StampReport {
    /// Page records processed
    pub pages: usize,
    /// Runs drawn into the document
    pub stamped: usize,
    /// Malformed runs left out
    pub skipped: usize,
    /// Runs whose box was too small for all of their text
    pub overflowed: usize,
}

/// Renders page records as HTML boxes
///
/// Each run is drawn in a box that starts at the run's (scaled) position and
/// extends to the page record's width and height.
pub struct PageStamper<'a> {
    /// Base style of every box
    style: &'a BoxStyle,
    scale: Scale,
    policy: ErrorPolicy,
}

impl<'a> PageStamper<'a> {
    pub fn new(style: &'a BoxStyle) -> Self {
        Self {
            style,
            scale: Scale::default(),
            policy: ErrorPolicy::default(),
        }
    }

    pub fn with_scale(mut self, scale: Scale) -> Self {
        self.scale = scale;
        self
    }

    pub fn with_policy(mut self, policy: ErrorPolicy) -> Self {
        self.policy = policy;
        self
    }

    /// Stamp all entries in order
    ///
    /// Malformed runs are handled according to the error policy; any other
    /// error stops the batch.
    pub fn stamp(&self, doc: &mut PdfDocument, entries: &[PageEntry]) -> Result<StampReport> {
        let mut report = StampReport::default();
        for entry in entries {
            self.stamp_page(doc, entry, &mut report)?;
        }
        Ok(report)
    }

    /// Stamp the runs of a single page record
    pub fn stamp_page(
        &self,
        doc: &mut PdfDocument,
        entry: &PageEntry,
        report: &mut StampReport,
    ) -> Result<()> {
        let index = entry.page_index_in(doc.page_count())?;
        let page = &entry.record;
        info!(
            "Page {} ({}x{}): {} texts",
            index,
            page.width,
            page.height,
            page.texts.len()
        );

        for value in &page.texts {
            match self.stamp_run(doc, index, page, value) {
                Ok(outcome) => {
                    report.stamped += 1;
                    if outcome.overflowed {
                        warn!("Text did not fit its box on page {index}: {value}");
                        report.overflowed += 1;
                    }
                }
                Err(err @ TextRunError::MalformedRecord { .. })
                    if self.policy == ErrorPolicy::Skip =>
                {
                    warn!("Skipping text on page {index}: {err}");
                    report.skipped += 1;
                }
                Err(err) => return Err(err),
            }
        }

        report.pages += 1;
        Ok(())
    }

    fn stamp_run(
        &self,
        doc: &mut PdfDocument,
        index: usize,
        page: &PageRecord,
        value: &Value,
    ) -> Result<BoxOutcome> {
        let styled = convert_record(value, self.scale)?;
        let rect = Rect::new(
            styled.position.x,
            styled.position.y,
            page.width,
            page.height,
        );
        if rect.is_empty() {
            return Err(TextRunError::malformed(
                format!(
                    "position ({}, {}) is outside the {}x{} page",
                    styled.position.x, styled.position.y, page.width, page.height
                ),
                value,
            ));
        }

        debug!("{rect:?}: {}", styled.html);
        Ok(doc.insert_htmlbox(index, rect, &styled.html, self.style)?)
    }
}
