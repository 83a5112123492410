//! PDF Document wrapper

use crate::layout::{layout_spans, TextMeasure};
use crate::markup::{parse_markup, BoxStyle, SpanStyle, VerticalAlign};
use crate::text::{
    fmt_num, generate_text_operators, generate_underline_operators, TextRenderContext,
};
use crate::{FontData, FontFamily, FontFamilyBuilder, PdfError, Result, StandardFont};
use crate::{FontStyle, FontWeight, PageBox, Point, Rect};
use lopdf::{dictionary, Dictionary, Document, Object, ObjectId, Stream};
use std::collections::{BTreeMap, HashMap, HashSet};
use std::path::Path;

/// Name of the built-in standard Helvetica family
pub const DEFAULT_FAMILY: &str = "helv";

/// Prefix of font resource names added to pages, distinct from the usual
/// `F1`-style names already present in most documents
const FONT_RESOURCE_PREFIX: &str = "StampF";

/// Baseline shift of superscripts relative to their (already reduced) size,
/// about a third of the surrounding em
const SUPER_RISE: f32 = 0.4;

/// Baseline shift of subscripts relative to their size
const SUB_RISE: f32 = -0.2;

/// Identifies one concrete font face used on a page
#[derive(Debug, Clone, PartialEq, Eq, Hash, PartialOrd, Ord)]
enum FontKey {
    Standard(StandardFont),
    /// Embedded variant, by `FontData::name`
    Embedded(String),
}

/// A font face chosen for a weight/style request
#[derive(Debug, Clone)]
struct ResolvedFont {
    key: FontKey,
    synthetic_bold: bool,
}

/// A buffered text operation for deferred encoding
///
/// Text is buffered during rendering and encoded during save,
/// after fonts have been subsetted and glyph IDs remapped.
#[derive(Debug, Clone)]
struct BufferedTextOp {
    /// The text to render
    text: String,
    /// Font face
    font: FontKey,
    /// Font resource name (e.g., "StampF1")
    font_resource_name: String,
    /// X coordinate (in PDF coordinates, already converted)
    x: f64,
    /// Baseline Y coordinate (in PDF coordinates, already converted)
    y: f64,
    /// Font size in points
    font_size: f32,
    /// Text color
    color: Color,
    /// Baseline shift in points
    rise: f32,
    synthetic_bold: bool,
}

/// Content waiting to be written to a page, kept in painting order
#[derive(Debug, Clone)]
enum PendingOp {
    Text(BufferedTextOp),
    Raw(Vec<u8>),
}

/// Object ids of an embedded font
///
/// Kept across saves so later checkpoints overwrite the same objects.
#[derive(Debug, Clone, Copy)]
struct EmbeddedFontIds {
    type0: ObjectId,
    cid_font: ObjectId,
    descriptor: ObjectId,
    font_file: ObjectId,
    tounicode: ObjectId,
}

/// RGB Color (values 0.0 - 1.0)
#[derive(Debug, Clone, Copy, PartialEq)]
pub struct Color {
    pub r: f32,
    pub g: f32,
    pub b: f32,
}

impl Color {
    /// Create a new RGB color (values 0.0 - 1.0)
    pub fn rgb(r: f32, g: f32, b: f32) -> Self {
        Self { r, g, b }
    }

    /// Create color from RGB values (0-255)
    pub fn from_rgb(r: u8, g: u8, b: u8) -> Self {
        Self {
            r: r as f32 / 255.0,
            g: g as f32 / 255.0,
            b: b as f32 / 255.0,
        }
    }

    /// Parse a CSS color: `#rgb`, `#rgba`, `#rrggbb`, `#rrggbbaa`,
    /// `rgb(r, g, b)` or a basic color name
    ///
    /// Alpha is accepted and ignored.
    ///
    /// # Example
    /// ```ignore
    /// assert_eq!(Color::parse("#11d"), Some(Color::from_rgb(0x11, 0x11, 0xdd)));
    /// ```
    pub fn parse(value: &str) -> Option<Self> {
        let value = value.trim();

        if let Some(hex) = value.strip_prefix('#') {
            if !hex.chars().all(|c| c.is_ascii_hexdigit()) {
                return None;
            }
            let channel = |s: &str| u8::from_str_radix(s, 16).ok();
            return match hex.len() {
                3 | 4 => {
                    let nibble = |i: usize| channel(&hex[i..i + 1]).map(|v| v * 17);
                    Some(Self::from_rgb(nibble(0)?, nibble(1)?, nibble(2)?))
                }
                6 | 8 => Some(Self::from_rgb(
                    channel(&hex[0..2])?,
                    channel(&hex[2..4])?,
                    channel(&hex[4..6])?,
                )),
                _ => None,
            };
        }

        let lower = value.to_ascii_lowercase();
        if let Some(args) = lower
            .strip_prefix("rgb(")
            .and_then(|rest| rest.strip_suffix(')'))
        {
            let parts: Vec<u8> = args
                .split(',')
                .map(|p| p.trim().parse::<u8>())
                .collect::<std::result::Result<_, _>>()
                .ok()?;
            return match parts[..] {
                [r, g, b] => Some(Self::from_rgb(r, g, b)),
                _ => None,
            };
        }

        match lower.as_str() {
            "black" => Some(Self::black()),
            "white" => Some(Self::white()),
            "red" => Some(Self::red()),
            "lime" => Some(Self::rgb(0.0, 1.0, 0.0)),
            "green" => Some(Self::from_rgb(0, 128, 0)),
            "blue" => Some(Self::blue()),
            "yellow" => Some(Self::from_rgb(255, 255, 0)),
            "orange" => Some(Self::from_rgb(255, 165, 0)),
            "purple" => Some(Self::from_rgb(128, 0, 128)),
            "gray" | "grey" => Some(Self::from_rgb(128, 128, 128)),
            _ => None,
        }
    }

    /// Black color
    pub fn black() -> Self {
        Self::rgb(0.0, 0.0, 0.0)
    }

    /// White color
    pub fn white() -> Self {
        Self::rgb(1.0, 1.0, 1.0)
    }

    /// Red color
    pub fn red() -> Self {
        Self::rgb(1.0, 0.0, 0.0)
    }

    /// Blue color
    pub fn blue() -> Self {
        Self::rgb(0.0, 0.0, 1.0)
    }

    fn to_pdf_array(self) -> Vec<Object> {
        vec![
            Object::Real(self.r),
            Object::Real(self.g),
            Object::Real(self.b),
        ]
    }
}

impl Default for Color {
    fn default() -> Self {
        Self::black()
    }
}

/// Style for plain text inserted with [`PdfDocument::insert_text`]
#[derive(Debug, Clone, PartialEq)]
pub struct TextStyle {
    /// Registered font family name
    pub family: String,
    /// Font size in points
    pub font_size: f32,
    pub color: Color,
    pub weight: FontWeight,
    pub style: FontStyle,
}

impl Default for TextStyle {
    fn default() -> Self {
        Self {
            family: DEFAULT_FAMILY.to_string(),
            font_size: 11.0,
            color: Color::black(),
            weight: FontWeight::Regular,
            style: FontStyle::Normal,
        }
    }
}

/// What happened when filling a text box
#[derive(Debug, Clone, Copy, PartialEq, Eq, Default)]
pub struct BoxOutcome {
    /// Lines drawn
    pub lines: usize,
    /// Content that did not fit below the box was dropped
    pub overflowed: bool,
}

/// PDF Document wrapper providing high-level operations
pub struct PdfDocument {
    /// The underlying lopdf document
    inner: Document,
    /// Registered font families
    font_families: HashMap<String, FontFamily>,
    /// Family used when a style names none
    default_family: String,
    /// Embedded fonts (variant name -> PDF object IDs)
    embedded_fonts: HashMap<String, EmbeddedFontIds>,
    /// Standard font dictionaries already added
    standard_fonts: HashMap<StandardFont, ObjectId>,
    /// Page font resources (page index -> font -> resource name)
    page_font_resources: HashMap<usize, HashMap<FontKey, String>>,
    /// Next font resource number
    next_font_resource: u32,
    /// Operations not yet written, per page index
    pending_ops: BTreeMap<usize, Vec<PendingOp>>,
    /// Pages whose original content has been wrapped in q/Q
    wrapped_pages: HashSet<usize>,
}

impl PdfDocument {
    /// Open a PDF document from a file path
    ///
    /// # Arguments
    /// * `path` - Path to the PDF file
    ///
    /// # Example
    /// ```ignore
    /// let doc = PdfDocument::open("input.pdf")?;
    /// ```
    pub fn open<P: AsRef<Path>>(path: P) -> Result<Self> {
        let inner = Document::load(path).map_err(|e| PdfError::OpenError(e.to_string()))?;
        Ok(Self::from_document(inner))
    }

    /// Open a PDF document from bytes
    ///
    /// # Arguments
    /// * `data` - PDF file bytes
    pub fn open_from_bytes(data: &[u8]) -> Result<Self> {
        let inner = Document::load_mem(data).map_err(|e| PdfError::OpenError(e.to_string()))?;
        Ok(Self::from_document(inner))
    }

    fn from_document(inner: Document) -> Self {
        Self {
            inner,
            font_families: HashMap::new(),
            default_family: DEFAULT_FAMILY.to_string(),
            embedded_fonts: HashMap::new(),
            standard_fonts: HashMap::new(),
            page_font_resources: HashMap::new(),
            next_font_resource: 1,
            pending_ops: BTreeMap::new(),
            wrapped_pages: HashSet::new(),
        }
    }

    /// Get the number of pages in the document
    pub fn page_count(&self) -> usize {
        self.inner.get_pages().len()
    }

    /// Whether there are stamps not yet written by a save
    pub fn has_pending_changes(&self) -> bool {
        !self.pending_ops.is_empty()
    }

    /// Register a font family with variants
    ///
    /// # Arguments
    /// * `name` - Font family name
    /// * `builder` - FontFamilyBuilder with variant data
    ///
    /// # Example
    /// ```ignore
    /// doc.register_font_family("noto",
    ///     FontFamilyBuilder::new()
    ///         .regular(std::fs::read("NotoSans-Regular.ttf")?)
    ///         .bold(std::fs::read("NotoSans-Bold.ttf")?)
    /// )?;
    /// ```
    pub fn register_font_family(&mut self, name: &str, builder: FontFamilyBuilder) -> Result<()> {
        if name == DEFAULT_FAMILY || self.font_families.contains_key(name) {
            return Err(PdfError::FontAlreadyExists(name.to_string()));
        }

        let family = builder.build(name)?;
        log::debug!("registered font family {name}");
        self.font_families.insert(name.to_string(), family);

        Ok(())
    }

    /// Use a registered family for styles that do not name one
    pub fn set_default_family(&mut self, name: &str) -> Result<()> {
        if !self.has_family(name) {
            return Err(PdfError::FontNotFound(name.to_string()));
        }
        self.default_family = name.to_string();
        Ok(())
    }

    /// Family used for styles that do not name one
    pub fn default_family(&self) -> &str {
        &self.default_family
    }

    /// Whether `name` is the built-in family or a registered one
    pub fn has_family(&self, name: &str) -> bool {
        name == DEFAULT_FAMILY || self.font_families.contains_key(name)
    }

    /// Map an empty family name to the default one
    fn family_or_default<'a>(&'a self, family: &'a str) -> &'a str {
        if family.is_empty() {
            &self.default_family
        } else {
            family
        }
    }

    /// Pick the face for a family, weight and style
    fn resolve_font(
        &self,
        family: &str,
        weight: FontWeight,
        style: FontStyle,
    ) -> Result<ResolvedFont> {
        let family = self.family_or_default(family);
        if family == DEFAULT_FAMILY {
            return Ok(ResolvedFont {
                key: FontKey::Standard(StandardFont::for_variant(weight, style)),
                synthetic_bold: false,
            });
        }

        let font_family = self
            .font_families
            .get(family)
            .ok_or_else(|| PdfError::FontNotFound(family.to_string()))?;
        let variant = font_family
            .get_variant(weight, style)
            .ok_or_else(|| PdfError::FontNotFound(family.to_string()))?;

        Ok(ResolvedFont {
            key: FontKey::Embedded(variant.name.clone()),
            synthetic_bold: font_family.needs_synthetic_bold(weight, style),
        })
    }

    /// Get font data by variant name
    fn get_font_data(&self, name: &str) -> Result<&FontData> {
        self.font_families
            .values()
            .flat_map(|family| family.variants())
            .find(|variant| variant.name == name)
            .ok_or_else(|| PdfError::FontNotFound(name.to_string()))
    }

    /// Get mutable font data by variant name
    fn get_font_data_mut(&mut self, name: &str) -> Result<&mut FontData> {
        self.font_families
            .values_mut()
            .flat_map(|family| family.variants_mut())
            .find(|variant| variant.name == name)
            .ok_or_else(|| PdfError::FontNotFound(name.to_string()))
    }

    /// Text width in points
    fn measure_width(&self, font: &FontKey, text: &str, font_size: f32) -> f64 {
        match font {
            FontKey::Standard(standard) => standard.text_width_points(text, font_size) as f64,
            FontKey::Embedded(name) => self
                .get_font_data(name)
                .map(|data| data.text_width_points(text, font_size) as f64)
                .unwrap_or(0.0),
        }
    }

    /// Ascent as a fraction of the font size
    fn font_ascent(&self, font: &FontKey) -> f64 {
        match font {
            FontKey::Standard(standard) => standard.ascender() as f64 / 1000.0,
            FontKey::Embedded(name) => self
                .get_font_data(name)
                .map(|data| data.ascender() as f64 / data.units_per_em() as f64)
                .unwrap_or(0.8),
        }
    }

    /// Get the text width of a string in points
    ///
    /// # Example
    /// ```ignore
    /// let width = doc.get_text_width("Hello", &TextStyle::default())?;
    /// ```
    pub fn get_text_width(&self, text: &str, style: &TextStyle) -> Result<f64> {
        let font = self.resolve_font(&style.family, style.weight, style.style)?;
        Ok(self.measure_width(&font.key, text, style.font_size))
    }

    /// Record that `text` is drawn with `font` on `page`
    ///
    /// Returns the resource name to use in the content stream.
    fn use_font(&mut self, font: &FontKey, page: usize, text: &str) -> Result<String> {
        if let FontKey::Embedded(name) = font {
            self.get_font_data_mut(name)?.add_chars(text);
        }
        self.get_or_create_font_ref(font, page)
    }

    /// Get or create a font reference for a specific page
    ///
    /// Returns the resource name (e.g., "StampF1") for use in content streams.
    /// The font itself is written at save time, when all characters are known.
    fn get_or_create_font_ref(&mut self, font: &FontKey, page: usize) -> Result<String> {
        let page_resources = self.page_font_resources.entry(page).or_default();

        if let Some(resource_name) = page_resources.get(font) {
            return Ok(resource_name.clone());
        }

        let resource_name = format!("{FONT_RESOURCE_PREFIX}{}", self.next_font_resource);
        self.next_font_resource += 1;
        page_resources.insert(font.clone(), resource_name.clone());

        Ok(resource_name)
    }

    fn check_page(&self, page: usize) -> Result<()> {
        let page_count = self.page_count();
        if page >= page_count {
            return Err(PdfError::InvalidPage(page, page_count));
        }
        Ok(())
    }

    fn push_op(&mut self, page: usize, op: PendingOp) {
        self.pending_ops.entry(page).or_default().push(op);
    }

    /// Insert text at a specific position
    ///
    /// # Arguments
    /// * `page` - Page index (0-based)
    /// * `point` - Start of the first line's baseline (top-left origin)
    /// * `text` - Text to insert; `\n` starts a new line
    /// * `style` - Font, size and color
    ///
    /// # Returns
    /// The number of lines written
    pub fn insert_text(
        &mut self,
        page: usize,
        point: Point,
        text: &str,
        style: &TextStyle,
    ) -> Result<usize> {
        self.check_page(page)?;

        // Skip empty text - nothing to render
        if text.is_empty() {
            return Ok(0);
        }

        let font = self.resolve_font(&style.family, style.weight, style.style)?;
        let page_box = self.page_box(page)?;
        let line_height = style.font_size as f64 * 1.2;

        let mut lines = 0;
        for (i, line) in text.split('\n').enumerate() {
            lines += 1;
            if line.is_empty() {
                continue;
            }
            let font_resource_name = self.use_font(&font.key, page, line)?;
            let (x, y) =
                page_box.to_pdf(Point::new(point.x, point.y + i as f64 * line_height));

            self.push_op(
                page,
                PendingOp::Text(BufferedTextOp {
                    text: line.to_string(),
                    font: font.key.clone(),
                    font_resource_name,
                    x,
                    y,
                    font_size: style.font_size,
                    color: style.color,
                    rise: 0.0,
                    synthetic_bold: font.synthetic_bold,
                }),
            );
        }

        Ok(lines)
    }

    /// Lay out an inline HTML fragment inside a rectangle and draw it
    ///
    /// # Arguments
    /// * `page` - Page index (0-based)
    /// * `rect` - Box in top-left page coordinates
    /// * `html` - Inline markup, see [`crate::markup`]
    /// * `style` - Defaults for text in the box
    ///
    /// # Example
    /// ```ignore
    /// let outcome = doc.insert_htmlbox(
    ///     0,
    ///     Rect::new(72.0, 72.0, 400.0, 200.0),
    ///     "<span style='color:#f00'>Total</span>",
    ///     &BoxStyle::default(),
    /// )?;
    /// assert!(!outcome.overflowed);
    /// ```
    pub fn insert_htmlbox(
        &mut self,
        page: usize,
        rect: Rect,
        html: &str,
        style: &BoxStyle,
    ) -> Result<BoxOutcome> {
        self.check_page(page)?;

        let family = self.family_or_default(&style.family).to_string();
        if !self.has_family(&family) {
            return Err(PdfError::FontNotFound(family));
        }

        let spans = parse_markup(html, style)?;
        if rect.is_empty() {
            return Ok(BoxOutcome {
                lines: 0,
                overflowed: !spans.is_empty(),
            });
        }

        let layout = {
            let metrics = FamilyMetrics {
                doc: self,
                family: &family,
            };
            layout_spans(&spans, rect.width(), rect.height(), style, &metrics)
        };

        let page_box = self.page_box(page)?;
        for line in &layout.lines {
            for run in &line.runs {
                let blank = run.text.trim().is_empty();
                if blank && !run.style.underline {
                    continue;
                }

                let font = self.resolve_font(&family, run.style.weight, run.style.style)?;
                let rise = match run.style.vertical_align {
                    VerticalAlign::Baseline => 0.0,
                    VerticalAlign::Super => run.style.font_size * SUPER_RISE,
                    VerticalAlign::Sub => run.style.font_size * SUB_RISE,
                };
                let (x, y) =
                    page_box.to_pdf(Point::new(rect.x0 + run.x, rect.y0 + line.baseline));

                if !blank {
                    let font_resource_name = self.use_font(&font.key, page, &run.text)?;
                    self.push_op(
                        page,
                        PendingOp::Text(BufferedTextOp {
                            text: run.text.clone(),
                            font: font.key.clone(),
                            font_resource_name,
                            x,
                            y,
                            font_size: run.style.font_size,
                            color: run.style.color,
                            rise,
                            synthetic_bold: font.synthetic_bold,
                        }),
                    );
                }

                if run.style.underline {
                    let underline = generate_underline_operators(
                        x,
                        y + rise as f64,
                        run.width,
                        run.style.font_size,
                        run.style.color,
                    );
                    self.push_op(page, PendingOp::Raw(underline));
                }
            }
        }

        if layout.overflowed {
            log::debug!("text box on page {page} overflowed at {rect:?}");
        }

        Ok(BoxOutcome {
            lines: layout.lines.len(),
            overflowed: layout.overflowed,
        })
    }

    /// Add a line annotation with its own appearance stream
    ///
    /// # Arguments
    /// * `page` - Page index (0-based)
    /// * `from` - Start point (top-left origin)
    /// * `to` - End point (top-left origin)
    /// * `color` - Stroke color
    ///
    /// # Returns
    /// The object id of the annotation
    pub fn add_line_annot(
        &mut self,
        page: usize,
        from: Point,
        to: Point,
        color: Color,
    ) -> Result<ObjectId> {
        self.check_page(page)?;
        let page_id = self.page_id(page)?;
        let page_box = self.page_box(page)?;

        let (x1, y1) = page_box.to_pdf(from);
        let (x2, y2) = page_box.to_pdf(to);
        let rect: Vec<Object> = [
            x1.min(x2) - 1.0,
            y1.min(y2) - 1.0,
            x1.max(x2) + 1.0,
            y1.max(y2) + 1.0,
        ]
        .iter()
        .map(|v| Object::Real(*v as f32))
        .collect();

        let appearance = format!(
            "{} {} {} RG\n1 w\n{} {} m\n{} {} l\nS\n",
            fmt_num(color.r as f64),
            fmt_num(color.g as f64),
            fmt_num(color.b as f64),
            fmt_num(x1),
            fmt_num(y1),
            fmt_num(x2),
            fmt_num(y2),
        );
        let appearance_id = self.inner.add_object(Stream::new(
            dictionary! {
                "Type" => "XObject",
                "Subtype" => "Form",
                "BBox" => rect.clone(),
            },
            appearance.into_bytes(),
        ));

        let annot_id = self.inner.add_object(dictionary! {
            "Type" => "Annot",
            "Subtype" => "Line",
            "Rect" => rect,
            "L" => vec![
                Object::Real(x1 as f32),
                Object::Real(y1 as f32),
                Object::Real(x2 as f32),
                Object::Real(y2 as f32),
            ],
            "C" => color.to_pdf_array(),
            "Border" => vec![Object::Integer(0), Object::Integer(0), Object::Integer(1)],
            "F" => 4,
            "P" => page_id,
            "AP" => dictionary! { "N" => appearance_id },
        });

        self.push_annotation(page_id, annot_id)?;
        Ok(annot_id)
    }

    /// Append an annotation reference to a page's /Annots array
    fn push_annotation(&mut self, page_id: ObjectId, annot_id: ObjectId) -> Result<()> {
        let annots = self
            .inner
            .get_dictionary(page_id)?
            .get(b"Annots")
            .ok()
            .cloned();

        match annots {
            Some(Object::Reference(array_id)) => {
                let array = self
                    .inner
                    .get_object_mut(array_id)?
                    .as_array_mut()
                    .map_err(|_| PdfError::ParseError("Annots is not an array".to_string()))?;
                array.push(Object::Reference(annot_id));
            }
            Some(Object::Array(mut array)) => {
                array.push(Object::Reference(annot_id));
                self.inner
                    .get_dictionary_mut(page_id)?
                    .set("Annots", Object::Array(array));
            }
            _ => {
                self.inner
                    .get_dictionary_mut(page_id)?
                    .set("Annots", vec![Object::Reference(annot_id)]);
            }
        }
        Ok(())
    }

    /// Save the document to a file
    ///
    /// Can be called repeatedly; each call writes everything stamped so far.
    ///
    /// # Arguments
    /// * `path` - Output file path
    pub fn save<P: AsRef<Path>>(&mut self, path: P) -> Result<()> {
        self.prepare_for_write()?;

        self.inner
            .save(path)
            .map_err(|e| PdfError::SaveError(e.to_string()))?;
        Ok(())
    }

    /// Save the document to bytes
    pub fn to_bytes(&mut self) -> Result<Vec<u8>> {
        self.prepare_for_write()?;

        let mut buffer = Vec::new();
        self.inner
            .save_to(&mut buffer)
            .map_err(|e| PdfError::SaveError(e.to_string()))?;

        Ok(buffer)
    }

    /// Save a garbage-collected, compressed copy of the document
    ///
    /// The working document is left as it is, so stamping and saving can
    /// continue afterwards.
    pub fn save_optimized<P: AsRef<Path>>(&mut self, path: P) -> Result<()> {
        self.prepare_for_write()?;

        let mut optimized = self.inner.clone();
        optimized.prune_objects();
        optimized.delete_zero_length_streams();
        optimized.renumber_objects();
        optimized.compress();

        optimized
            .save(path)
            .map_err(|e| PdfError::SaveError(e.to_string()))?;
        Ok(())
    }

    /// Bring the lopdf document up to date with everything stamped so far
    fn prepare_for_write(&mut self) -> Result<()> {
        // 1. Subset fonts (creates subsets with only used glyphs)
        self.subset_fonts()?;

        // 2. Encode buffered text with remapped glyph IDs and write it to pages
        self.flush_pending_ops()?;

        // 3. Embed subsetted fonts into PDF
        self.embed_fonts()?;

        // 4. Reference fonts from the pages that use them
        self.finalize_page_font_resources()?;

        Ok(())
    }

    /// Create subsets for all fonts that have been used
    ///
    /// Only glyphs that were used (tracked via add_chars) will be included.
    fn subset_fonts(&mut self) -> Result<()> {
        for family in self.font_families.values_mut() {
            for font_data in family.variants_mut() {
                // Only subset fonts that have been used
                if !font_data.used_chars.is_empty() {
                    font_data.create_subset()?;
                }
            }
        }
        Ok(())
    }

    /// Encode a buffered text operation into content stream operators
    fn encode_text_op(&self, op: &BufferedTextOp) -> Result<Vec<u8>> {
        let operand = match &op.font {
            FontKey::Standard(standard) => standard.encode_text_literal(&op.text),
            FontKey::Embedded(name) => self.get_font_data(name)?.encode_text_hex_remapped(&op.text),
        };

        let ctx = TextRenderContext {
            font_name: op.font_resource_name.clone(),
            font_size: op.font_size,
            color: op.color,
            rise: op.rise,
            synthetic_bold: op.synthetic_bold,
        };

        Ok(generate_text_operators(&operand, op.x, op.y, &ctx))
    }

    /// Write all pending operations to page content streams
    ///
    /// Each touched page gets one new content stream with the operators
    /// buffered since the last save.
    fn flush_pending_ops(&mut self) -> Result<()> {
        let pending = std::mem::take(&mut self.pending_ops);

        for (page, ops) in pending {
            let mut content = Vec::new();
            for op in &ops {
                match op {
                    PendingOp::Text(text_op) => {
                        content.extend_from_slice(&self.encode_text_op(text_op)?)
                    }
                    PendingOp::Raw(raw) => content.extend_from_slice(raw),
                }
            }
            if !content.is_empty() {
                self.append_to_content_stream(page, &content)?;
            }
        }

        Ok(())
    }

    /// Embed all used fonts into the PDF
    fn embed_fonts(&mut self) -> Result<()> {
        let mut used: Vec<FontKey> = self
            .page_font_resources
            .values()
            .flat_map(|fonts| fonts.keys().cloned())
            .collect();
        used.sort();
        used.dedup();

        for font in used {
            match font {
                FontKey::Standard(standard) => {
                    if !self.standard_fonts.contains_key(&standard) {
                        let id = self.inner.add_object(standard.to_font_dictionary());
                        self.standard_fonts.insert(standard, id);
                    }
                }
                FontKey::Embedded(name) => {
                    self.embed_font_object(&name)?;
                }
            }
        }

        Ok(())
    }

    /// Write a single embedded font into the PDF, reusing its object ids
    /// from earlier saves
    fn embed_font_object(&mut self, font_name: &str) -> Result<ObjectId> {
        let font_objects = self.get_font_data(font_name)?.to_pdf_objects()?;

        let ids = match self.embedded_fonts.get(font_name) {
            Some(ids) => *ids,
            None => {
                let ids = EmbeddedFontIds {
                    type0: self.inner.new_object_id(),
                    cid_font: self.inner.new_object_id(),
                    descriptor: self.inner.new_object_id(),
                    font_file: self.inner.new_object_id(),
                    tounicode: self.inner.new_object_id(),
                };
                self.embedded_fonts.insert(font_name.to_string(), ids);
                ids
            }
        };

        let mut font_descriptor = font_objects.font_descriptor;
        font_descriptor.set("FontFile2", Object::Reference(ids.font_file));

        let mut cid_font = font_objects.cid_font;
        cid_font.set("FontDescriptor", Object::Reference(ids.descriptor));

        let mut type0_font = font_objects.type0_font;
        type0_font.set(
            "DescendantFonts",
            Object::Array(vec![Object::Reference(ids.cid_font)]),
        );
        type0_font.set("ToUnicode", Object::Reference(ids.tounicode));

        let objects = &mut self.inner.objects;
        objects.insert(ids.font_file, Object::Stream(font_objects.font_file_stream));
        objects.insert(ids.tounicode, Object::Stream(font_objects.tounicode_stream));
        objects.insert(ids.descriptor, Object::Dictionary(font_descriptor));
        objects.insert(ids.cid_font, Object::Dictionary(cid_font));
        objects.insert(ids.type0, Object::Dictionary(type0_font));

        Ok(ids.type0)
    }

    /// Object id of a font that has been written to the document
    fn font_object_id(&self, font: &FontKey) -> Result<ObjectId> {
        match font {
            FontKey::Standard(standard) => self
                .standard_fonts
                .get(standard)
                .copied()
                .ok_or_else(|| PdfError::FontNotFound(standard.base_font().to_string())),
            FontKey::Embedded(name) => self
                .embedded_fonts
                .get(name)
                .map(|ids| ids.type0)
                .ok_or_else(|| PdfError::FontNotFound(name.clone())),
        }
    }

    /// Finalize page font resources after all fonts are embedded
    fn finalize_page_font_resources(&mut self) -> Result<()> {
        let mut pages: Vec<usize> = self.page_font_resources.keys().copied().collect();
        pages.sort_unstable();

        for page in pages {
            let fonts: Vec<(String, ObjectId)> = match self.page_font_resources.get(&page) {
                Some(fonts) => fonts
                    .iter()
                    .map(|(font, resource)| Ok((resource.clone(), self.font_object_id(font)?)))
                    .collect::<Result<_>>()?,
                None => continue,
            };
            if !fonts.is_empty() {
                self.add_fonts_to_page_resources(page, &fonts)?;
            }
        }

        Ok(())
    }

    /// Add multiple fonts to a page's Resources dictionary in a single operation
    ///
    /// Resources inherited from the page tree are copied onto the page first
    /// so the page's original content keeps its fonts and images.
    fn add_fonts_to_page_resources(
        &mut self,
        page: usize,
        fonts: &[(String, ObjectId)],
    ) -> Result<()> {
        let page_id = self.page_id(page)?;

        let mut resources_dict = self.inherited_resources(page_id)?;
        let mut font_dict = resources_dict
            .get(b"Font")
            .ok()
            .and_then(|font| self.resolve_dict(font))
            .unwrap_or_default();

        for (resource_name, font_id) in fonts {
            font_dict.set(resource_name.as_bytes(), Object::Reference(*font_id));
        }

        resources_dict.set("Font", Object::Dictionary(font_dict));
        self.inner
            .get_dictionary_mut(page_id)?
            .set("Resources", Object::Dictionary(resources_dict));

        Ok(())
    }

    /// Dictionary behind a direct or referenced object
    fn resolve_dict(&self, obj: &Object) -> Option<Dictionary> {
        match obj {
            Object::Dictionary(dict) => Some(dict.clone()),
            Object::Reference(id) => self
                .inner
                .get_object(*id)
                .ok()
                .and_then(|o| o.as_dict().ok())
                .cloned(),
            _ => None,
        }
    }

    /// The page's effective Resources, following the Parent chain
    fn inherited_resources(&self, page_id: ObjectId) -> Result<Dictionary> {
        let mut current_id = page_id;

        // Follow parent chain up to 10 levels (safety limit)
        for _ in 0..10 {
            let dict = self.inner.get_dictionary(current_id)?;

            if let Some(resources) = dict.get(b"Resources").ok().and_then(|r| self.resolve_dict(r))
            {
                return Ok(resources);
            }

            match dict.get(b"Parent") {
                Ok(Object::Reference(parent_id)) => current_id = *parent_id,
                _ => break,
            }
        }

        Ok(Dictionary::new())
    }

    /// Get a reference to the underlying lopdf document
    pub fn inner(&self) -> &Document {
        &self.inner
    }

    /// Get a mutable reference to the underlying lopdf document
    pub fn inner_mut(&mut self) -> &mut Document {
        &mut self.inner
    }

    /// Object id of a page by 0-based index
    pub fn page_id(&self, page: usize) -> Result<ObjectId> {
        let pages = self.inner.get_pages();
        u32::try_from(page)
            .ok()
            .and_then(|p| p.checked_add(1))
            .and_then(|number| pages.get(&number).copied())
            .ok_or(PdfError::InvalidPage(page, pages.len()))
    }

    /// Effective MediaBox of a page
    ///
    /// Handles MediaBox inherited from the parent Pages node and falls back
    /// to A4 when the page tree has none.
    pub fn page_box(&self, page: usize) -> Result<PageBox> {
        let page_id = self.page_id(page)?;
        let media_box = self.get_inherited_media_box(page_id)?;

        let numbers: Vec<f64> = media_box.iter().filter_map(number).collect();
        match numbers[..] {
            [a, b, c, d] => Ok(PageBox::from_corners(a, b, c, d)),
            _ => Err(PdfError::ParseError("Invalid MediaBox format".to_string())),
        }
    }

    /// Get MediaBox, following parent inheritance chain if needed
    fn get_inherited_media_box(&self, page_id: ObjectId) -> Result<Vec<Object>> {
        let mut current_id = page_id;

        // Follow parent chain up to 10 levels (safety limit)
        for _ in 0..10 {
            let dict = self
                .inner
                .get_object(current_id)?
                .as_dict()
                .map_err(|_| PdfError::ParseError("Object is not a dictionary".to_string()))?;

            // Check for MediaBox or CropBox in current dictionary
            if let Ok(media_box) = dict.get(b"MediaBox").or_else(|_| dict.get(b"CropBox")) {
                // Handle both direct array and reference
                let media_box_array = match media_box {
                    Object::Array(arr) => arr.clone(),
                    Object::Reference(ref_id) => self
                        .inner
                        .get_object(*ref_id)?
                        .as_array()
                        .map_err(|_| {
                            PdfError::ParseError("MediaBox reference is not an array".to_string())
                        })?
                        .clone(),
                    _ => return Err(PdfError::ParseError("MediaBox is not an array".to_string())),
                };
                return Ok(media_box_array);
            }

            // Follow Parent reference
            if let Ok(Object::Reference(parent_id)) = dict.get(b"Parent") {
                current_id = *parent_id;
                continue;
            }

            // No parent, break
            break;
        }

        // Fallback: assume A4 page size
        let a4 = PageBox::a4();
        Ok(vec![
            Object::Real(a4.llx as f32),
            Object::Real(a4.lly as f32),
            Object::Real(a4.urx as f32),
            Object::Real(a4.ury as f32),
        ])
    }

    /// The page's content streams as a list of references
    ///
    /// A direct stream is moved into its own object so it can be listed.
    fn content_streams(&mut self, page_id: ObjectId) -> Result<Vec<Object>> {
        let contents = self.inner.get_dictionary(page_id)?.get(b"Contents").ok().cloned();

        Ok(match contents {
            Some(Object::Array(items)) => items,
            Some(Object::Reference(id)) => match self.inner.get_object(id) {
                Ok(Object::Array(items)) => items.clone(),
                _ => vec![Object::Reference(id)],
            },
            Some(Object::Stream(stream)) => vec![Object::Reference(self.inner.add_object(stream))],
            _ => Vec::new(),
        })
    }

    /// Append content to a page as a new content stream
    ///
    /// Existing streams are never rewritten. The first time a page is stamped
    /// they are bracketed by a `q` stream and a `Q` stream, so stamps are drawn
    /// with the default graphics state no matter what the original content
    /// leaves behind.
    fn append_to_content_stream(&mut self, page: usize, content: &[u8]) -> Result<()> {
        let page_id = self.page_id(page)?;
        let mut streams = self.content_streams(page_id)?;

        if self.wrapped_pages.insert(page) && !streams.is_empty() {
            let open = self
                .inner
                .add_object(Stream::new(Dictionary::new(), b"q\n".to_vec()));
            let close = self
                .inner
                .add_object(Stream::new(Dictionary::new(), b"\nQ\n".to_vec()));
            streams.insert(0, Object::Reference(open));
            streams.push(Object::Reference(close));
        }

        let stream_id = self
            .inner
            .add_object(Stream::new(Dictionary::new(), content.to_vec()));
        streams.push(Object::Reference(stream_id));

        self.inner
            .get_dictionary_mut(page_id)?
            .set("Contents", Object::Array(streams));

        Ok(())
    }
}

/// Measures text with the faces of one family
struct FamilyMetrics<'a> {
    doc: &'a PdfDocument,
    family: &'a str,
}

impl TextMeasure for FamilyMetrics<'_> {
    fn width(&self, text: &str, style: &SpanStyle) -> f64 {
        match self.doc.resolve_font(self.family, style.weight, style.style) {
            Ok(font) => self.doc.measure_width(&font.key, text, style.font_size),
            Err(_) => 0.0,
        }
    }

    fn ascent(&self, style: &SpanStyle) -> f64 {
        match self.doc.resolve_font(self.family, style.weight, style.style) {
            Ok(font) => self.doc.font_ascent(&font.key),
            Err(_) => 0.8,
        }
    }
}

/// Numeric value of an Integer or Real object
fn number(obj: &Object) -> Option<f64> {
    match obj {
        Object::Integer(i) => Some(*i as f64),
        Object::Real(r) => Some(*r as f64),
        _ => None,
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use pretty_assertions::assert_eq;

    #[test]
    fn test_color_parse_hex() {
        assert_eq!(Color::parse("#11d"), Some(Color::from_rgb(0x11, 0x11, 0xdd)));
        assert_eq!(Color::parse("#112233"), Some(Color::from_rgb(0x11, 0x22, 0x33)));
        assert_eq!(
            Color::parse("#11223380"),
            Some(Color::from_rgb(0x11, 0x22, 0x33))
        );
        assert_eq!(Color::parse("#f00f"), Some(Color::red()));
        assert_eq!(Color::parse("#12345"), None);
        assert_eq!(Color::parse("#ggg"), None);
    }

    #[test]
    fn test_color_parse_functional_and_names() {
        assert_eq!(Color::parse("rgb(255, 0, 0)"), Some(Color::red()));
        assert_eq!(Color::parse("RGB(0,0,255)"), Some(Color::blue()));
        assert_eq!(Color::parse("rgb(1,2)"), None);
        assert_eq!(Color::parse(" Black "), Some(Color::black()));
        assert_eq!(Color::parse("chartreuse-ish"), None);
    }

    #[test]
    fn test_number_extraction() {
        assert_eq!(number(&Object::Integer(3)), Some(3.0));
        assert_eq!(number(&Object::Real(1.5)), Some(1.5));
        assert_eq!(number(&Object::Null), None);
    }

    #[test]
    fn test_font_key_ordering_is_stable() {
        let mut keys = vec![
            FontKey::Embedded("b".to_string()),
            FontKey::Standard(StandardFont::HelveticaBold),
            FontKey::Embedded("a".to_string()),
            FontKey::Standard(StandardFont::Helvetica),
        ];
        keys.sort();
        assert_eq!(keys[0], FontKey::Standard(StandardFont::Helvetica));
        assert_eq!(keys[3], FontKey::Embedded("b".to_string()));
    }
}
