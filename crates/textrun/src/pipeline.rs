//! End-to-end stamping run
//!
//! 1. Read and validate the text-run JSON
//! 2. Copy the input PDF to the output path and open the copy
//! 3. Optionally draw the debug grid, then save a checkpoint
//! 4. Stamp every page record
//! 5. Save the final document and an optimized `<stem>_opt` copy

use std::path::{Path, PathBuf};

use log::{debug, error, info, warn};
use pdf_core::{BoxStyle, FontFamilyBuilder, PdfDocument};
use serde_json::Value;

use crate::convert::Scale;
use crate::grid::{draw_grid, GridOptions};
use crate::render::{PageStamper, StampReport};
use crate::schema::pages_from_value;
use crate::{ErrorPolicy, Result, TextRunError};

/// Family name used for fonts loaded from [`FontPaths`]
const STAMP_FAMILY: &str = "stamp";

/// TrueType files making up the family used for stamped text
#[derive(Debug, Clone, PartialEq, Default)]
pub struct FontPaths {
    pub regular: PathBuf,
    pub bold: Option<PathBuf>,
    pub italic: Option<PathBuf>,
    pub bold_italic: Option<PathBuf>,
}

impl FontPaths {
    pub fn new(regular: impl Into<PathBuf>) -> Self {
        Self {
            regular: regular.into(),
            ..Self::default()
        }
    }

    fn builder(&self) -> Result<FontFamilyBuilder> {
        let mut builder = FontFamilyBuilder::new().regular(read_font(&self.regular)?);
        if let Some(ref path) = self.bold {
            builder = builder.bold(read_font(path)?);
        }
        if let Some(ref path) = self.italic {
            builder = builder.italic(read_font(path)?);
        }
        if let Some(ref path) = self.bold_italic {
            builder = builder.bold_italic(read_font(path)?);
        }
        Ok(builder)
    }
}

fn read_font(path: &Path) -> Result<Vec<u8>> {
    std::fs::read(path).map_err(|e| TextRunError::io(path, e))
}

/// Everything a run needs
#[derive(Debug, Clone, PartialEq)]
pub struct StampConfig {
    /// Source PDF, never modified
    pub input: PathBuf,
    /// Text-run JSON
    pub json: PathBuf,
    /// Primary output; the optimized copy is written next to it
    pub output: PathBuf,
    pub scale: Scale,
    pub policy: ErrorPolicy,
    /// Draw the debug grid before stamping
    pub grid: Option<GridOptions>,
    /// Embedded family for stamped text; standard Helvetica when `None`
    pub fonts: Option<FontPaths>,
    /// Base style of every text box
    pub style: BoxStyle,
}

impl StampConfig {
    pub fn new(
        input: impl Into<PathBuf>,
        json: impl Into<PathBuf>,
        output: impl Into<PathBuf>,
    ) -> Self {
        Self {
            input: input.into(),
            json: json.into(),
            output: output.into(),
            scale: Scale::default(),
            policy: ErrorPolicy::default(),
            grid: None,
            fonts: None,
            style: BoxStyle::default(),
        }
    }
}

/// Outcome of a run
#[derive(Debug, Clone, PartialEq)]
pub struct RunSummary {
    pub output: PathBuf,
    pub optimized: PathBuf,
    pub report: StampReport,
    /// Line annotations drawn by the grid phase
    pub grid_lines: usize,
}

/// `<stem>_opt<.ext>` next to `path`
pub fn optimized_path(path: &Path) -> PathBuf {
    let stem = path
        .file_stem()
        .map(|s| s.to_string_lossy().into_owned())
        .unwrap_or_default();
    let name = match path.extension() {
        Some(ext) => format!("{stem}_opt.{}", ext.to_string_lossy()),
        None => format!("{stem}_opt"),
    };
    path.with_file_name(name)
}

/// The document being stamped together with the file it is saved to
///
/// If the copy is dropped with unsaved changes (an error cut the run short)
/// they are written to the output path so the work done so far is kept.
pub struct WorkingCopy {
    doc: PdfDocument,
    path: PathBuf,
    dirty: bool,
}

impl WorkingCopy {
    /// Copy `input` to `output` and open the copy
    pub fn create(input: &Path, output: &Path) -> Result<Self> {
        if output.exists() && same_file(input, output)? {
            return Err(TextRunError::Config(format!(
                "output {} would overwrite the input",
                output.display()
            )));
        }
        std::fs::copy(input, output).map_err(|e| TextRunError::io(input, e))?;
        Self::open(output)
    }

    /// Open an existing file as the working copy
    pub fn open(path: &Path) -> Result<Self> {
        let doc = PdfDocument::open(path)?;
        Ok(Self {
            doc,
            path: path.to_path_buf(),
            dirty: false,
        })
    }

    pub fn path(&self) -> &Path {
        &self.path
    }

    pub fn document(&self) -> &PdfDocument {
        &self.doc
    }

    /// Mutable access; the copy counts as modified afterwards
    pub fn document_mut(&mut self) -> &mut PdfDocument {
        self.dirty = true;
        &mut self.doc
    }

    /// Whether there are changes not yet saved
    pub fn is_dirty(&self) -> bool {
        self.dirty || self.doc.has_pending_changes()
    }

    /// Save everything done so far to the output path
    pub fn checkpoint(&mut self) -> Result<()> {
        self.doc.save(&self.path)?;
        self.dirty = false;
        info!("Saved {}", self.path.display());
        Ok(())
    }

    /// Final save plus the optimized copy
    ///
    /// # Returns
    /// Path of the optimized copy
    pub fn finish(mut self) -> Result<PathBuf> {
        self.checkpoint()?;
        let optimized = optimized_path(&self.path);
        self.doc.save_optimized(&optimized)?;
        info!("Saved optimized copy {}", optimized.display());
        Ok(optimized)
    }
}

impl Drop for WorkingCopy {
    fn drop(&mut self) {
        if !self.is_dirty() {
            return;
        }
        match self.doc.save(&self.path) {
            Ok(()) => warn!("Run interrupted, partial result saved to {}", self.path.display()),
            Err(e) => error!("Run interrupted, failed to save {}: {e}", self.path.display()),
        }
    }
}

fn same_file(a: &Path, b: &Path) -> Result<bool> {
    let a = std::fs::canonicalize(a).map_err(|e| TextRunError::io(a, e))?;
    let b = std::fs::canonicalize(b).map_err(|e| TextRunError::io(b, e))?;
    Ok(a == b)
}

/// Run the whole pipeline
pub fn run(config: &StampConfig) -> Result<RunSummary> {
    let text = std::fs::read_to_string(&config.json).map_err(|e| TextRunError::io(&config.json, e))?;
    let value: Value = serde_json::from_str(&text)?;
    debug!("{}", serde_json::to_string_pretty(&value)?);
    let entries = pages_from_value(value)?;
    info!("{} page records in {}", entries.len(), config.json.display());

    let mut copy = WorkingCopy::create(&config.input, &config.output)?;
    info!(
        "Copied {} to {} ({} pages)",
        config.input.display(),
        config.output.display(),
        copy.document().page_count()
    );

    let mut style = config.style.clone();
    if let Some(ref fonts) = config.fonts {
        let doc = copy.document_mut();
        doc.register_font_family(STAMP_FAMILY, fonts.builder()?)?;
        doc.set_default_family(STAMP_FAMILY)?;
        style.family = STAMP_FAMILY.to_string();
    }

    let mut grid_lines = 0;
    if let Some(ref grid) = config.grid {
        grid_lines = draw_grid(copy.document_mut(), grid)?;
        info!("Grid: {grid_lines} lines");
        copy.checkpoint()?;
    }

    let report = PageStamper::new(&style)
        .with_scale(config.scale)
        .with_policy(config.policy)
        .stamp(copy.document_mut(), &entries)?;
    info!(
        "Stamped {} texts on {} pages ({} skipped, {} overflowed)",
        report.stamped, report.pages, report.skipped, report.overflowed
    );

    let optimized = copy.finish()?;

    Ok(RunSummary {
        output: config.output.clone(),
        optimized,
        report,
        grid_lines,
    })
}
