//! Book upload record stored in a user's uploads collection

use std::path::Path;

use serde::{Deserialize, Serialize};
use serde_json::{Map, Value};

use crate::error::{Error, Result};
use crate::models::Item;

const UNKNOWN: &str = "Unknown";

/// Supported book file formats
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum BookFormat {
    /// EPUB container
    Epub,
    /// PDF document
    Pdf,
}

impl BookFormat {
    /// MIME type recorded for uploads of this format
    #[must_use]
    pub const fn mime_type(self) -> &'static str {
        match self {
            Self::Epub => "application/epub+zip",
            Self::Pdf => "application/pdf",
        }
    }

    /// Resolve a format from a MIME type
    #[must_use]
    pub fn from_mime_type(mime: &str) -> Option<Self> {
        match mime.trim().to_ascii_lowercase().as_str() {
            "application/epub+zip" => Some(Self::Epub),
            "application/pdf" => Some(Self::Pdf),
            _ => None,
        }
    }

    /// Resolve a format from a file extension
    pub fn from_path(path: &Path) -> Result<Self> {
        let extension = path
            .extension()
            .and_then(|ext| ext.to_str())
            .map(str::to_ascii_lowercase);
        match extension.as_deref() {
            Some("epub") => Ok(Self::Epub),
            Some("pdf") => Ok(Self::Pdf),
            _ => Err(Error::InvalidInput(format!(
                "Unsupported book file {}: only .epub and .pdf can be uploaded",
                path.display()
            ))),
        }
    }
}

/// Descriptive metadata for a book
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct BookMetadata {
    pub title: String,
    pub author: String,
}

impl Default for BookMetadata {
    fn default() -> Self {
        Self {
            title: UNKNOWN.to_string(),
            author: UNKNOWN.to_string(),
        }
    }
}

impl BookMetadata {
    /// Build metadata, falling back to "Unknown" for blank values
    #[must_use]
    pub fn new(title: Option<String>, author: Option<String>) -> Self {
        let defaults = Self::default();
        Self {
            title: crate::util::normalize_text_option(title).unwrap_or(defaults.title),
            author: crate::util::normalize_text_option(author).unwrap_or(defaults.author),
        }
    }
}

/// Payload of an upload document
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct BookRecord {
    /// Original file name
    pub name: String,
    /// Object path in book storage
    pub path: String,
    /// Download URI for the stored object
    pub uri: String,
    /// MIME type
    #[serde(rename = "type")]
    pub mime_type: String,
    /// Size in bytes
    pub size: u64,
    /// Title/author metadata
    #[serde(default)]
    pub metadata: BookMetadata,
}

impl BookRecord {
    /// Convert into collection fields
    pub fn to_fields(&self) -> Result<Map<String, Value>> {
        match serde_json::to_value(self)? {
            Value::Object(fields) => Ok(fields),
            _ => Err(Error::InvalidInput(
                "Book record did not serialize to an object".to_string(),
            )),
        }
    }

    /// Read a book record back out of an item's fields
    pub fn from_item(item: &Item) -> Result<Self> {
        Ok(serde_json::from_value(Value::Object(item.fields.clone()))?)
    }

    /// Format derived from the stored MIME type
    #[must_use]
    pub fn format(&self) -> Option<BookFormat> {
        BookFormat::from_mime_type(&self.mime_type)
    }
}
