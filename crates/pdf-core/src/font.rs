//! Font handling for PDF documents

use crate::{PdfError, Result};
use lopdf::{Dictionary, Object, Stream};
use std::collections::hash_map::DefaultHasher;
use std::collections::HashSet;
use std::fmt;
use std::hash::{Hash, Hasher};
use subsetter::GlyphRemapper;

/// Font weight
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Default)]
pub enum FontWeight {
    #[default]
    Regular,
    Bold,
}

/// Font style
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Default)]
pub enum FontStyle {
    #[default]
    Normal,
    Italic,
}

/// Font data structure for embedded fonts
pub struct FontData {
    /// Font name/identifier
    pub name: String,
    /// Raw TTF data
    pub ttf_data: Vec<u8>,
    /// Characters used (for subsetting)
    pub used_chars: HashSet<char>,
    /// Parsed font face
    face: Option<ttf_parser::Face<'static>>,
    /// Old glyph id -> subset glyph id; only ever grows, so text encoded at
    /// an earlier save stays valid after later saves
    remapper: GlyphRemapper,
    /// Subsetted font program from the last save
    subset_data: Option<Vec<u8>>,
}

impl fmt::Debug for FontData {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.debug_struct("FontData")
            .field("name", &self.name)
            .field("ttf_len", &self.ttf_data.len())
            .field("used_chars", &self.used_chars.len())
            .field("subsetted", &self.subset_data.is_some())
            .finish()
    }
}

/// PDF objects generated for font embedding
pub struct FontObjects {
    /// Type0 font dictionary
    pub type0_font: Dictionary,
    /// CIDFont Type2 dictionary
    pub cid_font: Dictionary,
    /// Font descriptor dictionary
    pub font_descriptor: Dictionary,
    /// Font file stream (TTF data)
    pub font_file_stream: Stream,
    /// ToUnicode CMap stream
    pub tounicode_stream: Stream,
}

/// Font family with variants
#[derive(Debug, Default)]
pub struct FontFamily {
    /// Regular variant (required)
    pub regular: Option<FontData>,
    /// Bold variant
    pub bold: Option<FontData>,
    /// Italic variant
    pub italic: Option<FontData>,
    /// Bold italic variant
    pub bold_italic: Option<FontData>,
}

impl FontFamily {
    /// Get the font data for the specified weight and style
    /// Falls back to regular if requested variant is not available
    pub fn get_variant(&self, weight: FontWeight, style: FontStyle) -> Option<&FontData> {
        match (weight, style) {
            (FontWeight::Bold, FontStyle::Italic) => self
                .bold_italic
                .as_ref()
                .or(self.bold.as_ref())
                .or(self.italic.as_ref())
                .or(self.regular.as_ref()),
            (FontWeight::Bold, FontStyle::Normal) => self.bold.as_ref().or(self.regular.as_ref()),
            (FontWeight::Regular, FontStyle::Italic) => {
                self.italic.as_ref().or(self.regular.as_ref())
            }
            (FontWeight::Regular, FontStyle::Normal) => self.regular.as_ref(),
        }
    }

    /// Whether a bold request has to be emulated because the family lacks a
    /// bold face for that style
    pub fn needs_synthetic_bold(&self, weight: FontWeight, style: FontStyle) -> bool {
        match (weight, style) {
            (FontWeight::Bold, FontStyle::Italic) => {
                self.bold_italic.is_none() && self.bold.is_none()
            }
            (FontWeight::Bold, FontStyle::Normal) => self.bold.is_none(),
            (FontWeight::Regular, _) => false,
        }
    }

    /// Iterate over all loaded variants
    pub fn variants(&self) -> impl Iterator<Item = &FontData> {
        [
            &self.regular,
            &self.bold,
            &self.italic,
            &self.bold_italic,
        ]
        .into_iter()
        .flatten()
    }

    /// Iterate mutably over all loaded variants
    pub fn variants_mut(&mut self) -> impl Iterator<Item = &mut FontData> {
        [
            &mut self.regular,
            &mut self.bold,
            &mut self.italic,
            &mut self.bold_italic,
        ]
        .into_iter()
        .flatten()
    }
}

/// Builder for registering font families
pub struct FontFamilyBuilder {
    regular: Option<Vec<u8>>,
    bold: Option<Vec<u8>>,
    italic: Option<Vec<u8>>,
    bold_italic: Option<Vec<u8>>,
}

impl FontFamilyBuilder {
    pub fn new() -> Self {
        Self {
            regular: None,
            bold: None,
            italic: None,
            bold_italic: None,
        }
    }

    pub fn regular(mut self, ttf_data: Vec<u8>) -> Self {
        self.regular = Some(ttf_data);
        self
    }

    pub fn bold(mut self, ttf_data: Vec<u8>) -> Self {
        self.bold = Some(ttf_data);
        self
    }

    pub fn italic(mut self, ttf_data: Vec<u8>) -> Self {
        self.italic = Some(ttf_data);
        self
    }

    pub fn bold_italic(mut self, ttf_data: Vec<u8>) -> Self {
        self.bold_italic = Some(ttf_data);
        self
    }

    /// Build the FontFamily from the provided TTF data
    pub fn build(self, family_name: &str) -> Result<FontFamily> {
        let regular = if let Some(ttf_data) = self.regular {
            Some(FontData::from_ttf(
                &format!("{}-regular", family_name),
                &ttf_data,
            )?)
        } else {
            return Err(PdfError::FontParseError(
                "FontFamily must have at least a regular variant".to_string(),
            ));
        };

        let bold = self
            .bold
            .map(|data| FontData::from_ttf(&format!("{}-bold", family_name), &data))
            .transpose()?;

        let italic = self
            .italic
            .map(|data| FontData::from_ttf(&format!("{}-italic", family_name), &data))
            .transpose()?;

        let bold_italic = self
            .bold_italic
            .map(|data| FontData::from_ttf(&format!("{}-bold-italic", family_name), &data))
            .transpose()?;

        Ok(FontFamily {
            regular,
            bold,
            italic,
            bold_italic,
        })
    }
}

impl Default for FontFamilyBuilder {
    fn default() -> Self {
        Self::new()
    }
}

impl FontData {
    /// Create font data from TTF bytes
    ///
    /// # Arguments
    /// * `name` - Font identifier
    /// * `ttf_data` - TrueType font file bytes
    pub fn from_ttf(name: &str, ttf_data: &[u8]) -> Result<Self> {
        let data = ttf_data.to_vec();

        // The face borrows its bytes for the document lifetime; fonts are loaded
        // once per run, so the leaked copy lives as long as the process anyway
        let static_data: &'static [u8] = Box::leak(data.clone().into_boxed_slice());

        let face = ttf_parser::Face::parse(static_data, 0)
            .map_err(|e| PdfError::FontParseError(format!("{name}: {e:?}")))?;

        Ok(Self {
            name: name.to_string(),
            ttf_data: data,
            used_chars: HashSet::new(),
            face: Some(face),
            remapper: GlyphRemapper::new(),
            subset_data: None,
        })
    }

    /// Add characters to the used set (for subsetting)
    pub fn add_chars(&mut self, text: &str) {
        for c in text.chars() {
            self.used_chars.insert(c);
        }
    }

    /// Get glyph ID for a character
    pub fn glyph_id(&self, c: char) -> Option<u16> {
        self.face
            .as_ref()
            .and_then(|face| face.glyph_index(c).map(|id| id.0))
    }

    /// Check if font has a glyph for the given character
    pub fn has_glyph(&self, c: char) -> bool {
        self.glyph_id(c).map(|id| id != 0).unwrap_or(false)
    }

    /// Get glyph advance width
    pub fn glyph_advance(&self, c: char) -> Option<u16> {
        self.face.as_ref().and_then(|face| {
            let glyph_id = face.glyph_index(c)?;
            face.glyph_hor_advance(glyph_id)
        })
    }

    /// Get font units per em
    pub fn units_per_em(&self) -> u16 {
        self.face
            .as_ref()
            .map(|face| face.units_per_em())
            .unwrap_or(1000)
    }

    /// Get font ascender
    pub fn ascender(&self) -> i16 {
        self.face
            .as_ref()
            .map(|face| face.ascender())
            .unwrap_or(800)
    }

    /// Get font descender
    pub fn descender(&self) -> i16 {
        self.face
            .as_ref()
            .map(|face| face.descender())
            .unwrap_or(-200)
    }

    /// Calculate text width in font units
    pub fn text_width(&self, text: &str) -> u32 {
        text.chars()
            .filter_map(|c| self.glyph_advance(c))
            .map(|w| w as u32)
            .sum()
    }

    /// Calculate text width in points for a given font size
    pub fn text_width_points(&self, text: &str, font_size: f32) -> f32 {
        let width = self.text_width(text);
        let units_per_em = self.units_per_em() as f32;
        (width as f32 / units_per_em) * font_size
    }

    /// Convert font units to PDF glyph space (1/1000 em)
    fn to_glyph_space(&self, value: i32) -> i32 {
        (value as f64 * 1000.0 / self.units_per_em() as f64).round() as i32
    }

    /// Create a subset containing only the glyphs of used characters
    ///
    /// Glyph ids keep the mapping assigned at earlier calls; new glyphs are
    /// appended, so this can run once per save.
    pub fn create_subset(&mut self) -> Result<()> {
        if self.face.is_none() {
            return Ok(());
        }

        let mut chars: Vec<char> = self.used_chars.iter().copied().collect();
        chars.sort_unstable();
        for c in chars {
            let gid = self.glyph_id(c).unwrap_or(0);
            self.remapper.remap(gid);
        }

        let subset = subsetter::subset(&self.ttf_data, 0, &self.remapper)
            .map_err(|e| PdfError::FontSubsetError(format!("{}: {e:?}", self.name)))?;
        self.subset_data = Some(subset);

        Ok(())
    }

    /// Whether `create_subset` has produced a font program yet
    pub fn is_subsetted(&self) -> bool {
        self.subset_data.is_some()
    }

    /// Generate all PDF objects needed to embed this font
    ///
    /// Uses the subset program and remapped glyph ids when a subset exists,
    /// the full font otherwise.
    pub fn to_pdf_objects(&self) -> Result<FontObjects> {
        let base_font = match &self.subset_data {
            Some(_) => format!("{}+{}", self.subset_tag(), self.postscript_name()),
            None => self.postscript_name(),
        };
        let font_name = Object::Name(base_font.into_bytes());

        // Generate ToUnicode CMap
        let tounicode_content = self.generate_tounicode_cmap();
        let tounicode_stream = Stream::new(Dictionary::new(), tounicode_content.into_bytes());

        // Generate font file stream
        let program = self.subset_data.as_ref().unwrap_or(&self.ttf_data).clone();
        let font_file_stream = Stream::new(
            Dictionary::from_iter(vec![("Length1", (program.len() as i64).into())]),
            program,
        );

        let ascender = self.to_glyph_space(self.ascender() as i32);
        let descender = self.to_glyph_space(self.descender() as i32);
        let font_bbox: Vec<Object> = match self.face.as_ref().map(|f| f.global_bounding_box()) {
            Some(bbox) => vec![
                self.to_glyph_space(bbox.x_min as i32).into(),
                self.to_glyph_space(bbox.y_min as i32).into(),
                self.to_glyph_space(bbox.x_max as i32).into(),
                self.to_glyph_space(bbox.y_max as i32).into(),
            ],
            None => vec![0.into(), descender.into(), 1000.into(), ascender.into()],
        };

        let font_descriptor = Dictionary::from_iter(vec![
            ("Type", "FontDescriptor".into()),
            ("FontName", font_name.clone()),
            ("Flags", 4.into()), // Symbolic font
            ("FontBBox", font_bbox.into()),
            ("ItalicAngle", 0.into()),
            ("Ascent", ascender.into()),
            ("Descent", descender.into()),
            ("CapHeight", ascender.into()),
            ("StemV", 80.into()),
            ("FontFile2", Object::Reference((0, 0))), // Placeholder, will be set when embedding
        ]);

        // Generate widths array
        let widths_array = self.generate_widths_array();

        // Generate CIDFont Type2 dictionary
        let cid_system_info = Dictionary::from_iter(vec![
            ("Registry", Object::string_literal("Adobe")),
            ("Ordering", Object::string_literal("Identity")),
            ("Supplement", 0.into()),
        ]);

        let cid_font = Dictionary::from_iter(vec![
            ("Type", "Font".into()),
            ("Subtype", "CIDFontType2".into()),
            ("BaseFont", font_name.clone()),
            ("CIDSystemInfo", cid_system_info.into()),
            ("FontDescriptor", Object::Reference((0, 0))), // Placeholder, will be set when embedding
            ("CIDToGIDMap", "Identity".into()),
            ("W", widths_array.into()),
            ("DW", 1000.into()),
        ]);

        // Generate Type0 font dictionary
        let type0_font = Dictionary::from_iter(vec![
            ("Type", "Font".into()),
            ("Subtype", "Type0".into()),
            ("BaseFont", font_name),
            ("Encoding", "Identity-H".into()),
            ("DescendantFonts", vec![Object::Reference((0, 0))].into()), // Placeholder, will be set when embedding
            ("ToUnicode", Object::Reference((0, 0))), // Placeholder, will be set when embedding
        ]);

        Ok(FontObjects {
            type0_font,
            cid_font,
            font_descriptor,
            font_file_stream,
            tounicode_stream,
        })
    }

    /// Glyph id written into content streams for a character
    ///
    /// After subsetting this is the remapped id; characters the subset does
    /// not know map to .notdef.
    fn output_gid(&self, c: char) -> u16 {
        let gid = self.glyph_id(c).unwrap_or(0);
        if self.subset_data.is_some() {
            self.remapper.get(gid).unwrap_or(0)
        } else {
            gid
        }
    }

    /// Encode text as hex string for PDF Tj operator
    pub fn encode_text_hex(&self, text: &str) -> String {
        let mut result = String::new();
        for c in text.chars() {
            // Get Glyph ID from font (GID)
            let gid = self.glyph_id(c).unwrap_or(0);
            result.push_str(&format!("{gid:04X}"));
        }
        format!("<{result}>")
    }

    /// Encode text as hex string using subset glyph ids
    pub fn encode_text_hex_remapped(&self, text: &str) -> String {
        let mut result = String::new();
        for c in text.chars() {
            result.push_str(&format!("{:04X}", self.output_gid(c)));
        }
        format!("<{result}>")
    }

    /// PostScript-safe base name derived from the font identifier
    fn postscript_name(&self) -> String {
        self.name
            .chars()
            .filter(|c| c.is_ascii_alphanumeric() || *c == '-')
            .collect()
    }

    /// Six-letter subset tag, stable for a given glyph set
    fn subset_tag(&self) -> String {
        let mut gids: Vec<u16> = self.remapper.remapped_gids().collect();
        gids.sort_unstable();
        let mut hasher = DefaultHasher::new();
        self.name.hash(&mut hasher);
        gids.hash(&mut hasher);
        let mut hash = hasher.finish();

        let mut tag = String::with_capacity(6);
        for _ in 0..6 {
            tag.push((b'A' + (hash % 26) as u8) as char);
            hash /= 26;
        }
        tag
    }

    /// Generate /W array for glyph widths
    fn generate_widths_array(&self) -> Vec<Object> {
        let mut widths = Vec::new();
        let face = match &self.face {
            Some(f) => f,
            None => return widths,
        };

        // Collect unique (output GID, source GID) pairs used in the document
        let mut gids: Vec<(u16, u16)> = self
            .used_chars
            .iter()
            .filter_map(|&c| self.glyph_id(c).map(|gid| (self.output_gid(c), gid)))
            .collect();
        gids.sort();
        gids.dedup();

        // Individual mapping format: [gid1 [width1] gid2 [width2] ...]
        for (cid, gid) in gids {
            let advance = face
                .glyph_hor_advance(ttf_parser::GlyphId(gid))
                .unwrap_or(self.units_per_em());
            widths.push((cid as i64).into());
            widths.push(vec![self.to_glyph_space(advance as i32).into()].into());
        }

        widths
    }

    /// Generate ToUnicode CMap stream content
    fn generate_tounicode_cmap(&self) -> String {
        let mut cmap = String::new();

        // Header
        cmap.push_str("/CIDInit /ProcSet findresource begin\n");
        cmap.push_str("12 dict begin\n");
        cmap.push_str("begincmap\n");
        cmap.push_str("/CIDSystemInfo << /Registry (Adobe) /Ordering (UCS) /Supplement 0 >> def\n");
        cmap.push_str("/CMapName /Adobe-Identity-UCS def\n");
        cmap.push_str("/CMapType 2 def\n");

        // Code space range (all 16-bit values)
        cmap.push_str("1 begincodespacerange\n");
        cmap.push_str("<0000> <FFFF>\n");
        cmap.push_str("endcodespacerange\n");

        // Character mappings: map output GID (CID) to Unicode
        let mut char_list: Vec<char> = self.used_chars.iter().copied().collect();
        char_list.sort_by_key(|c| *c as u32);

        // PDF spec recommends limiting bfchar sections to 100 entries
        for chunk in char_list.chunks(100) {
            cmap.push_str(&format!("{} beginbfchar\n", chunk.len()));
            for c in chunk {
                let gid = self.output_gid(*c);
                let mut utf16 = [0u16; 2];
                let unicode: String = c
                    .encode_utf16(&mut utf16)
                    .iter()
                    .map(|unit| format!("{unit:04X}"))
                    .collect();
                cmap.push_str(&format!("<{gid:04X}> <{unicode}>\n"));
            }
            cmap.push_str("endbfchar\n");
        }

        // Footer
        cmap.push_str("endcmap\n");
        cmap.push_str("CMapName currentdict /CMap defineresource pop\n");
        cmap.push_str("end\n");
        cmap.push_str("end\n");

        cmap
    }
}
