//! JSON data model for pages and text runs

use std::collections::BTreeSet;

use serde::{Deserialize, Deserializer, Serialize};
use serde_json::Value;

use crate::{Result, TextRunError};

/// A number that may be written as a JSON number or a numeric string
#[derive(Deserialize)]
#[serde(untagged)]
enum NumberLike {
    Number(f64),
    Text(String),
}

impl NumberLike {
    /// `None` for an empty string
    fn into_number<E: serde::de::Error>(self) -> std::result::Result<Option<f64>, E> {
        let value = match self {
            NumberLike::Number(n) => n,
            NumberLike::Text(s) => {
                let s = s.trim();
                if s.is_empty() {
                    return Ok(None);
                }
                s.parse::<f64>()
                    .map_err(|_| E::custom(format!("{s:?} is not a number")))?
            }
        };
        if !value.is_finite() {
            return Err(E::custom("number is not finite"));
        }
        Ok(Some(value))
    }
}

fn number<'de, D>(deserializer: D) -> std::result::Result<f64, D::Error>
where
    D: Deserializer<'de>,
{
    NumberLike::deserialize(deserializer)?
        .into_number::<D::Error>()?
        .ok_or_else(|| serde::de::Error::custom("empty number"))
}

fn optional_number<'de, D>(deserializer: D) -> std::result::Result<Option<f64>, D::Error>
where
    D: Deserializer<'de>,
{
    match Option::<NumberLike>::deserialize(deserializer)? {
        Some(value) => value.into_number(),
        None => Ok(None),
    }
}

fn nullable_string<'de, D>(deserializer: D) -> std::result::Result<String, D::Error>
where
    D: Deserializer<'de>,
{
    Ok(Option::<String>::deserialize(deserializer)?.unwrap_or_default())
}

/// Style and content of a text run, the first element of its `text` array
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct TextAttributes {
    /// Space separated style keywords, e.g. `"bold underline"`
    #[serde(rename = "fontWeight", deserialize_with = "nullable_string")]
    pub font_weight: String,

    /// Font size; absent when empty or null
    #[serde(rename = "font_size", deserialize_with = "optional_number")]
    pub font_size: Option<f64>,

    /// CSS color, e.g. `"#112233"`; may be empty
    #[serde(rename = "colorCode", deserialize_with = "nullable_string")]
    pub color_code: String,

    /// The literal text
    #[serde(rename = "transOrg")]
    pub trans_org: String,
}

impl TextAttributes {
    /// Lowercased style keywords
    pub fn keywords(&self) -> BTreeSet<String> {
        self.font_weight
            .split_whitespace()
            .map(str::to_lowercase)
            .collect()
    }

    pub fn has_keyword(&self, keyword: &str) -> bool {
        self.font_weight
            .split_whitespace()
            .any(|k| k.eq_ignore_ascii_case(keyword))
    }
}

/// One positioned text run
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct TextRunRecord {
    #[serde(deserialize_with = "number")]
    pub left: f64,
    #[serde(deserialize_with = "number")]
    pub top: f64,
    pub text: Vec<TextAttributes>,
}

impl TextRunRecord {
    /// Attributes of the run; only the first element of `text` is used
    pub fn attributes(&self) -> Option<&TextAttributes> {
        self.text.first()
    }
}

/// Page size and the runs to stamp on it
///
/// Runs are kept as raw JSON so a malformed run can be reported (or skipped)
/// on its own without rejecting the whole page.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct PageRecord {
    #[serde(deserialize_with = "number")]
    pub width: f64,
    #[serde(deserialize_with = "number")]
    pub height: f64,
    pub texts: Vec<Value>,
}

/// A page record with the key it was listed under
#[derive(Debug, Clone, PartialEq)]
pub struct PageEntry {
    /// 1-based page number as written in the JSON
    pub key: String,
    pub record: PageRecord,
}

impl PageEntry {
    /// 0-based page index for the 1-based key
    pub fn page_index(&self) -> Result<usize> {
        let number: i64 = self
            .key
            .trim()
            .parse()
            .map_err(|_| self.invalid("not a page number"))?;
        if number < 1 {
            return Err(self.invalid("page numbers start at 1"));
        }
        usize::try_from(number - 1).map_err(|_| self.invalid("page number out of range"))
    }

    /// Like [`PageEntry::page_index`], also checking against the page count
    pub fn page_index_in(&self, page_count: usize) -> Result<usize> {
        let index = self.page_index()?;
        if index >= page_count {
            return Err(self.invalid(&format!("document has {page_count} pages")));
        }
        Ok(index)
    }

    fn invalid(&self, reason: &str) -> TextRunError {
        TextRunError::InvalidPageKey {
            key: self.key.clone(),
            reason: reason.to_string(),
        }
    }
}

/// Parse the text-run JSON: an array of objects mapping page numbers to page
/// records
///
/// Entries keep document order, including several keys in one object.
pub fn parse_pages(json: &str) -> Result<Vec<PageEntry>> {
    let value: Value = serde_json::from_str(json)?;
    pages_from_value(value)
}

/// Same as [`parse_pages`] for an already parsed document
pub fn pages_from_value(value: Value) -> Result<Vec<PageEntry>> {
    let Value::Array(items) = value else {
        return Err(TextRunError::Schema(
            "expected an array of page objects".to_string(),
        ));
    };

    let mut entries = Vec::new();
    for (position, item) in items.into_iter().enumerate() {
        let Value::Object(pages) = item else {
            return Err(TextRunError::Schema(format!(
                "element {position} is not an object"
            )));
        };
        for (key, page) in pages {
            let record = PageRecord::deserialize(page)
                .map_err(|e| TextRunError::Schema(format!("page {key:?}: {e}")))?;
            entries.push(PageEntry { key, record });
        }
    }
    Ok(entries)
}
