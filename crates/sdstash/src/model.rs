//! # Domain Model
//!
//! [`GeneratedImage`] is what callers hand to the store and what queries give back.
//! [`ImageRecord`] is the metadata row kept for each stored image.
//!
//! ## Tag Tokens
//!
//! A record's tags are kept as a single space-delimited string padded with a space
//! on both ends (`" cat dog "`). Membership is a substring test for `" {tag} "`,
//! which only ever hits whole tokens: `cat` never matches inside `category`.
//! Tag names therefore never contain whitespace; [`token_name`] folds any
//! whitespace into underscores before a name enters the store.
//!
//! ## Record Columns
//!
//! The fixed columns are listed in [`RESERVED_COLUMNS`]. Every other generation
//! parameter lands in [`ImageRecord::extra`] as a flat scalar: strings, numbers,
//! booleans. Non-scalar values are stored as their JSON text.

use std::collections::BTreeMap;

use chrono::{DateTime, Utc};
use image::{DynamicImage, GenericImageView, ImageFormat};
use serde::{Deserialize, Serialize};
use serde_json::Value;

use crate::error::Result;
use crate::png_text;

/// PNG text keyword that carries the generation parameters.
pub const PARAMETERS_KEY: &str = "parameters";

/// Column names owned by [`ImageRecord`]'s fixed fields.
pub const RESERVED_COLUMNS: [&str; 8] = [
    "filename",
    "rating",
    "tags",
    "width",
    "height",
    "prompt",
    "neg_prompt",
    "created_at",
];

/// A decoded image plus the generation text embedded alongside it.
#[derive(Debug, Clone)]
pub struct GeneratedImage {
    pub pixels: DynamicImage,
    /// Side-channel generation parameters (the PNG `parameters` text chunk).
    pub parameters: Option<String>,
}

impl GeneratedImage {
    pub fn new(pixels: DynamicImage) -> Self {
        Self {
            pixels,
            parameters: None,
        }
    }

    pub fn with_parameters(mut self, text: impl Into<String>) -> Self {
        self.parameters = Some(text.into());
        self
    }

    pub fn width(&self) -> u32 {
        self.pixels.width()
    }

    pub fn height(&self) -> u32 {
        self.pixels.height()
    }

    /// Encodes the pixels as PNG, embedding `parameters` when given.
    pub fn encode_png(&self, parameters: Option<&str>) -> Result<Vec<u8>> {
        let text = parameters.filter(|text| !text.is_empty());
        png_text::encode(&self.pixels, PARAMETERS_KEY, text)
    }

    /// Decodes PNG bytes, picking up the embedded `parameters` text if present.
    pub fn from_png(bytes: &[u8]) -> Result<Self> {
        let parameters = png_text::read_text(bytes, PARAMETERS_KEY)?;
        let pixels = image::load_from_memory_with_format(bytes, ImageFormat::Png)?;
        Ok(Self { pixels, parameters })
    }
}

/// Normalizes a raw tag name into a whitespace-free token.
pub fn token_name(raw: &str) -> String {
    raw.split_whitespace().collect::<Vec<_>>().join("_")
}

/// Space-padded tag list with whole-token membership.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
#[serde(from = "String", into = "String")]
pub struct TagTokens(String);

impl TagTokens {
    pub fn from_tags<I, S>(tags: I) -> Self
    where
        I: IntoIterator<Item = S>,
        S: AsRef<str>,
    {
        let mut joined = String::from(" ");
        for tag in tags {
            joined.push_str(tag.as_ref());
            joined.push(' ');
        }
        Self(joined)
    }

    pub fn contains(&self, tag: &str) -> bool {
        let tag = tag.trim();
        !tag.is_empty() && self.0.contains(&format!(" {} ", tag))
    }

    pub fn iter(&self) -> impl Iterator<Item = &str> {
        self.0.split_whitespace()
    }

    pub fn is_empty(&self) -> bool {
        self.0.trim().is_empty()
    }

    pub fn as_str(&self) -> &str {
        &self.0
    }
}

impl Default for TagTokens {
    fn default() -> Self {
        Self::from_tags(std::iter::empty::<&str>())
    }
}

impl From<String> for TagTokens {
    fn from(raw: String) -> Self {
        Self::from_tags(raw.split_whitespace())
    }
}

impl From<TagTokens> for String {
    fn from(tokens: TagTokens) -> Self {
        tokens.0
    }
}

/// Metadata row for one stored image.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct ImageRecord {
    /// Blob store key, unique across the collection.
    pub filename: String,
    pub rating: String,
    pub tags: TagTokens,
    pub width: u32,
    pub height: u32,
    #[serde(default)]
    pub prompt: Option<String>,
    #[serde(default)]
    pub neg_prompt: Option<String>,
    pub created_at: DateTime<Utc>,
    /// Remaining generation parameters, one column each.
    #[serde(flatten)]
    pub extra: BTreeMap<String, Value>,
}

impl ImageRecord {
    pub fn has_tag(&self, tag: &str) -> bool {
        self.tags.contains(tag)
    }
}

/// Flattens a parameter value into something a single table cell can hold.
pub fn scalar_value(value: Value) -> Value {
    match value {
        Value::Array(_) | Value::Object(_) => Value::String(value.to_string()),
        scalar => scalar,
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use serde_json::json;

    #[test]
    fn test_tag_tokens_padding() {
        let tokens = TagTokens::from_tags(["cat", "dog"]);
        assert_eq!(tokens.as_str(), " cat dog ");
        assert_eq!(TagTokens::default().as_str(), " ");
    }

    #[test]
    fn test_tag_tokens_whole_token_match() {
        let tokens = TagTokens::from_tags(["category", "dog"]);
        assert!(!tokens.contains("cat"));
        assert!(tokens.contains("category"));
        assert!(tokens.contains("dog"));
        assert!(!tokens.contains(""));
    }

    #[test]
    fn test_tag_tokens_from_unpadded_string() {
        let tokens: TagTokens = "cat dog".to_string().into();
        assert_eq!(tokens.as_str(), " cat dog ");
        assert!(tokens.contains("cat"));
        assert_eq!(tokens.iter().collect::<Vec<_>>(), vec!["cat", "dog"]);
    }

    #[test]
    fn test_token_name_folds_whitespace() {
        assert_eq!(token_name("long hair"), "long_hair");
        assert_eq!(token_name("  solo "), "solo");
    }

    #[test]
    fn test_scalar_value_serializes_containers() {
        assert_eq!(scalar_value(json!(7)), json!(7));
        assert_eq!(scalar_value(json!("x")), json!("x"));
        assert_eq!(scalar_value(json!(null)), json!(null));
        assert_eq!(scalar_value(json!([512, 768])), json!("[512,768]"));
        assert_eq!(scalar_value(json!({"a": 1})), json!("{\"a\":1}"));
    }

    #[test]
    fn test_record_serializes_extra_as_columns() {
        let mut extra = BTreeMap::new();
        extra.insert("steps".to_string(), json!(20));
        let record = ImageRecord {
            filename: "a.png".to_string(),
            rating: "general".to_string(),
            tags: TagTokens::from_tags(["solo"]),
            width: 512,
            height: 768,
            prompt: Some("1girl".to_string()),
            neg_prompt: None,
            created_at: Utc::now(),
            extra,
        };
        let value = serde_json::to_value(&record).unwrap();
        assert_eq!(value["steps"], json!(20));
        assert_eq!(value["tags"], json!(" solo "));

        let back: ImageRecord = serde_json::from_value(value).unwrap();
        assert_eq!(back, record);
    }

    #[test]
    fn test_png_roundtrip_keeps_parameters() {
        let image = GeneratedImage::new(DynamicImage::new_rgb8(4, 3));
        let png = image.encode_png(Some("a prompt\nSteps: 20")).unwrap();
        let back = GeneratedImage::from_png(&png).unwrap();
        assert_eq!((back.width(), back.height()), (4, 3));
        assert_eq!(back.parameters.as_deref(), Some("a prompt\nSteps: 20"));
    }

    #[test]
    fn test_png_without_parameters() {
        let image = GeneratedImage::new(DynamicImage::new_rgb8(2, 2));
        let back = GeneratedImage::from_png(&image.encode_png(None).unwrap()).unwrap();
        assert_eq!(back.parameters, None);
    }
}
