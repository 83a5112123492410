//! Standard Type1 Helvetica fonts
//!
//! The standard 14 fonts need no embedding, so they are the default family
//! for stamped text. Text is encoded with WinAnsiEncoding; characters outside
//! that encoding are written as `?`.

use crate::{FontStyle, FontWeight};
use lopdf::{Dictionary, Object};

/// Helvetica widths for ASCII 32..=126 (1/1000 em)
const HELVETICA_ASCII: [u16; 95] = [
    278, 278, 355, 556, 556, 889, 667, 191, 333, 333, 389, 584, 278, 333, 278, 278, // ' '../
    556, 556, 556, 556, 556, 556, 556, 556, 556, 556, // 0-9
    278, 278, 584, 584, 584, 556, 1015, // :..@
    667, 667, 722, 722, 667, 611, 778, 722, 278, 500, 667, 556, 833, // A-M
    722, 778, 667, 778, 722, 667, 611, 722, 667, 944, 667, 667, 611, // N-Z
    278, 278, 278, 469, 556, 333, // [..`
    556, 556, 500, 556, 556, 278, 556, 556, 222, 222, 500, 222, 833, // a-m
    556, 556, 556, 556, 333, 500, 278, 556, 500, 722, 500, 500, 500, // n-z
    334, 260, 334, 584, // {..~
];

/// Helvetica-Bold widths for ASCII 32..=126 (1/1000 em)
const HELVETICA_BOLD_ASCII: [u16; 95] = [
    278, 333, 474, 556, 556, 889, 722, 238, 333, 333, 389, 584, 278, 333, 278, 278, // ' '../
    556, 556, 556, 556, 556, 556, 556, 556, 556, 556, // 0-9
    333, 333, 584, 584, 584, 611, 975, // :..@
    722, 722, 722, 722, 667, 611, 778, 722, 278, 556, 722, 611, 833, // A-M
    722, 778, 667, 778, 722, 667, 611, 722, 667, 944, 667, 667, 611, // N-Z
    333, 278, 333, 584, 556, 333, // [..`
    556, 611, 556, 611, 556, 333, 611, 611, 278, 278, 556, 278, 889, // a-m
    611, 611, 611, 611, 389, 556, 333, 611, 556, 778, 556, 556, 500, // n-z
    389, 280, 389, 584, // {..~
];

/// Helvetica widths for Latin-1 160..=255, shared by all variants
const HELVETICA_LATIN1: [u16; 96] = [
    278, 333, 556, 556, 556, 556, 260, 556, 333, 737, 370, 556, 584, 333, 737, 333, // 160
    400, 584, 333, 333, 333, 556, 537, 278, 333, 333, 365, 556, 834, 834, 834, 611, // 176
    667, 667, 667, 667, 667, 667, 1000, 722, 667, 667, 667, 667, 278, 278, 278, 278, // 192
    722, 722, 778, 778, 778, 778, 778, 584, 778, 722, 722, 722, 722, 667, 667, 611, // 208
    556, 556, 556, 556, 556, 556, 889, 500, 556, 556, 556, 556, 278, 278, 278, 278, // 224
    556, 556, 556, 556, 556, 556, 556, 584, 611, 556, 556, 556, 556, 500, 556, 500, // 240
];

/// WinAnsi code points 0x80..=0x9F that differ from Latin-1, with widths
const WIN_ANSI_EXTRAS: [(char, u8, u16); 27] = [
    ('\u{20AC}', 0x80, 556),
    ('\u{201A}', 0x82, 222),
    ('\u{0192}', 0x83, 556),
    ('\u{201E}', 0x84, 333),
    ('\u{2026}', 0x85, 1000),
    ('\u{2020}', 0x86, 556),
    ('\u{2021}', 0x87, 556),
    ('\u{02C6}', 0x88, 333),
    ('\u{2030}', 0x89, 1000),
    ('\u{0160}', 0x8A, 667),
    ('\u{2039}', 0x8B, 333),
    ('\u{0152}', 0x8C, 1000),
    ('\u{017D}', 0x8E, 611),
    ('\u{2018}', 0x91, 222),
    ('\u{2019}', 0x92, 222),
    ('\u{201C}', 0x93, 333),
    ('\u{201D}', 0x94, 333),
    ('\u{2022}', 0x95, 350),
    ('\u{2013}', 0x96, 556),
    ('\u{2014}', 0x97, 1000),
    ('\u{02DC}', 0x98, 333),
    ('\u{2122}', 0x99, 1000),
    ('\u{0161}', 0x9A, 500),
    ('\u{203A}', 0x9B, 333),
    ('\u{0153}', 0x9C, 944),
    ('\u{017E}', 0x9E, 500),
    ('\u{0178}', 0x9F, 667),
];

/// One of the four Helvetica variants from the standard 14 fonts
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, PartialOrd, Ord)]
pub enum StandardFont {
    Helvetica,
    HelveticaBold,
    HelveticaOblique,
    HelveticaBoldOblique,
}

impl StandardFont {
    /// Pick the variant for a weight and style
    pub fn for_variant(weight: FontWeight, style: FontStyle) -> Self {
        match (weight, style) {
            (FontWeight::Regular, FontStyle::Normal) => Self::Helvetica,
            (FontWeight::Bold, FontStyle::Normal) => Self::HelveticaBold,
            (FontWeight::Regular, FontStyle::Italic) => Self::HelveticaOblique,
            (FontWeight::Bold, FontStyle::Italic) => Self::HelveticaBoldOblique,
        }
    }

    /// PostScript name used as /BaseFont
    pub fn base_font(self) -> &'static str {
        match self {
            Self::Helvetica => "Helvetica",
            Self::HelveticaBold => "Helvetica-Bold",
            Self::HelveticaOblique => "Helvetica-Oblique",
            Self::HelveticaBoldOblique => "Helvetica-BoldOblique",
        }
    }

    fn is_bold(self) -> bool {
        matches!(self, Self::HelveticaBold | Self::HelveticaBoldOblique)
    }

    /// Ascender in 1/1000 em
    pub fn ascender(self) -> i16 {
        718
    }

    /// Descender in 1/1000 em
    pub fn descender(self) -> i16 {
        -207
    }

    /// Width of a single character in 1/1000 em
    pub fn char_width(self, c: char) -> u16 {
        let code = match win_ansi_byte(c) {
            Some(code) => code,
            None => b'?',
        };
        match code {
            32..=126 => {
                let index = (code - 32) as usize;
                if self.is_bold() {
                    HELVETICA_BOLD_ASCII[index]
                } else {
                    HELVETICA_ASCII[index]
                }
            }
            160..=255 => HELVETICA_LATIN1[(code - 160) as usize],
            _ => WIN_ANSI_EXTRAS
                .iter()
                .find(|(_, byte, _)| *byte == code)
                .map(|(_, _, width)| *width)
                .unwrap_or(556),
        }
    }

    /// Calculate text width in points for a given font size
    pub fn text_width_points(self, text: &str, font_size: f32) -> f32 {
        let units: u32 = text.chars().map(|c| self.char_width(c) as u32).sum();
        units as f32 / 1000.0 * font_size
    }

    /// Encode text as a PDF literal string in WinAnsiEncoding
    pub fn encode_text_literal(self, text: &str) -> String {
        let mut result = String::with_capacity(text.len() + 2);
        result.push('(');
        for c in text.chars() {
            let code = win_ansi_byte(c).unwrap_or(b'?');
            match code {
                b'(' | b')' | b'\\' => {
                    result.push('\\');
                    result.push(code as char);
                }
                32..=126 => result.push(code as char),
                _ => result.push_str(&format!("\\{code:03o}")),
            }
        }
        result.push(')');
        result
    }

    /// Font dictionary for this variant
    pub fn to_font_dictionary(self) -> Dictionary {
        Dictionary::from_iter(vec![
            ("Type", Object::Name(b"Font".to_vec())),
            ("Subtype", Object::Name(b"Type1".to_vec())),
            ("BaseFont", Object::Name(self.base_font().as_bytes().to_vec())),
            ("Encoding", Object::Name(b"WinAnsiEncoding".to_vec())),
        ])
    }
}

/// Map a character to its WinAnsiEncoding byte, if it has one
pub(crate) fn win_ansi_byte(c: char) -> Option<u8> {
    let code = c as u32;
    match code {
        // Tabs and other whitespace render as a space
        0x09 | 0x0A | 0x0D => Some(b' '),
        0x20..=0x7E | 0xA0..=0xFF => Some(code as u8),
        _ => WIN_ANSI_EXTRAS
            .iter()
            .find(|(ch, _, _)| *ch == c)
            .map(|(_, byte, _)| *byte),
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use pretty_assertions::assert_eq;

    #[test]
    fn test_variant_selection() {
        assert_eq!(
            StandardFont::for_variant(FontWeight::Bold, FontStyle::Normal),
            StandardFont::HelveticaBold
        );
        assert_eq!(
            StandardFont::for_variant(FontWeight::Regular, FontStyle::Italic).base_font(),
            "Helvetica-Oblique"
        );
    }

    #[test]
    fn test_ascii_widths() {
        assert_eq!(StandardFont::Helvetica.char_width(' '), 278);
        assert_eq!(StandardFont::Helvetica.char_width('W'), 944);
        assert_eq!(StandardFont::Helvetica.char_width('i'), 222);
        assert_eq!(StandardFont::HelveticaBold.char_width('i'), 278);
        assert_eq!(StandardFont::Helvetica.char_width('~'), 584);
    }

    #[test]
    fn test_text_width_points() {
        // "Hi" = 722 + 222 units
        let width = StandardFont::Helvetica.text_width_points("Hi", 10.0);
        assert!((width - 9.44).abs() < 0.001);
        assert_eq!(StandardFont::Helvetica.text_width_points("", 10.0), 0.0);
    }

    #[test]
    fn test_encode_literal_escapes() {
        assert_eq!(
            StandardFont::Helvetica.encode_text_literal("a(b)\\c"),
            "(a\\(b\\)\\\\c)"
        );
    }

    #[test]
    fn test_encode_latin1_and_extras() {
        assert_eq!(StandardFont::Helvetica.encode_text_literal("é"), "(\\351)");
        assert_eq!(StandardFont::Helvetica.encode_text_literal("€"), "(\\200)");
    }

    #[test]
    fn test_unencodable_becomes_question_mark() {
        assert_eq!(StandardFont::Helvetica.encode_text_literal("ส"), "(?)");
        assert_eq!(
            StandardFont::Helvetica.char_width('ส'),
            StandardFont::Helvetica.char_width('?')
        );
    }

    #[test]
    fn test_font_dictionary() {
        let dict = StandardFont::HelveticaBold.to_font_dictionary();
        assert_eq!(
            dict.get(b"BaseFont").unwrap(),
            &Object::Name(b"Helvetica-Bold".to_vec())
        );
        assert_eq!(
            dict.get(b"Encoding").unwrap(),
            &Object::Name(b"WinAnsiEncoding".to_vec())
        );
    }
}
