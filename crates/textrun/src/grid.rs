//! Debug grid: line annotations every few points, labelled with their
//! coordinate

use log::{debug, info};
use pdf_core::{Color, PdfDocument, Point, TextStyle, DEFAULT_FAMILY};

use crate::{Result, TextRunError};

/// Grid appearance
#[derive(Debug, Clone, PartialEq)]
pub struct GridOptions {
    /// Distance between grid lines in points
    pub step: u32,
    /// Size of the coordinate labels
    pub font_size: f32,
    pub line_color: Color,
    pub label_color: Color,
}

impl Default for GridOptions {
    fn default() -> Self {
        Self {
            step: 25,
            font_size: 5.0,
            line_color: Color::black(),
            label_color: Color::red(),
        }
    }
}

/// Whole points from `start` (inclusive) to `end` (exclusive)
fn grid_positions(start: f64, end: f64, step: u32) -> impl Iterator<Item = i64> {
    (start.trunc() as i64..end.trunc() as i64).step_by(step as usize)
}

/// Draw the grid on every page of the document
///
/// Each page gets a diagonal line across its MediaBox, then one vertical
/// line per step along x and one horizontal line per step along y. Every
/// grid line is labelled near its start with its coordinate.
///
/// # Returns
/// The number of line annotations added
pub fn draw_grid(doc: &mut PdfDocument, options: &GridOptions) -> Result<usize> {
    if options.step == 0 {
        return Err(TextRunError::Config("grid step must be positive".to_string()));
    }

    let label_style = TextStyle {
        family: DEFAULT_FAMILY.to_string(),
        font_size: options.font_size,
        color: options.label_color,
        ..TextStyle::default()
    };
    let label_offset = Point::new(2.0, options.font_size as f64 + 1.0);

    let mut count = 0;
    for page in 0..doc.page_count() {
        let media = doc.page_box(page)?.as_rect();
        info!("Grid on page {page}, step {} ({media:?})", options.step);

        doc.add_line_annot(
            page,
            Point::new(media.x0, media.y0),
            Point::new(media.x1, media.y1),
            options.line_color,
        )?;
        count += 1;

        for x in grid_positions(media.x0, media.x1, options.step) {
            let start = Point::new(x as f64, media.y0);
            doc.add_line_annot(page, start, Point::new(x as f64, media.y1), options.line_color)?;
            let label = Point::new(start.x + label_offset.x, start.y + label_offset.y);
            doc.insert_text(page, label, &format!("{:.1}", x as f64), &label_style)?;
            count += 1;
        }

        for y in grid_positions(media.y0, media.y1, options.step) {
            let start = Point::new(media.x0, y as f64);
            doc.add_line_annot(page, start, Point::new(media.x1, y as f64), options.line_color)?;
            let label = Point::new(start.x + label_offset.x, start.y + label_offset.y);
            doc.insert_text(page, label, &format!("{:.1}", y as f64), &label_style)?;
            count += 1;
        }
        debug!("Page {page}: {count} grid lines so far");
    }

    Ok(count)
}
