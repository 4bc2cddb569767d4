//! Input documents and page limits.

use crate::error::{Error, Result};
use serde::{Deserialize, Serialize};
use std::fmt;
use std::path::Path;
use std::str::FromStr;

/// Declared media type of an uploaded document.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum MediaType {
    /// Portable Document Format
    Pdf,
    /// Plain text in an unknown encoding
    Text,
    /// Office Open XML word-processor document
    Docx,
    /// Structured JSON
    Json,
}

impl MediaType {
    /// Guess the media type from a file extension.
    pub fn from_extension(path: impl AsRef<Path>) -> Option<Self> {
        let ext = path.as_ref().extension()?.to_str()?.to_ascii_lowercase();
        match ext.as_str() {
            "pdf" => Some(MediaType::Pdf),
            "txt" | "text" | "md" => Some(MediaType::Text),
            "docx" => Some(MediaType::Docx),
            "json" => Some(MediaType::Json),
            _ => None,
        }
    }

    /// Whether the document is paginated (only PDFs honour a [`PageLimit`]).
    pub fn is_paginated(&self) -> bool {
        matches!(self, MediaType::Pdf)
    }

    /// Short lowercase name.
    pub fn as_str(&self) -> &'static str {
        match self {
            MediaType::Pdf => "pdf",
            MediaType::Text => "text",
            MediaType::Docx => "docx",
            MediaType::Json => "json",
        }
    }
}

impl fmt::Display for MediaType {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.as_str())
    }
}

impl FromStr for MediaType {
    type Err = Error;

    /// Accepts short names (`pdf`), MIME types (`application/pdf`) and file extensions (`.pdf`).
    fn from_str(s: &str) -> Result<Self> {
        let lower = s.trim().to_ascii_lowercase();
        match lower.trim_start_matches('.') {
            "pdf" | "application/pdf" => Ok(MediaType::Pdf),
            "text" | "txt" | "text/plain" => Ok(MediaType::Text),
            "docx"
            | "application/vnd.openxmlformats-officedocument.wordprocessingml.document" => {
                Ok(MediaType::Docx)
            },
            "json" | "application/json" => Ok(MediaType::Json),
            _ => Err(Error::UnsupportedMediaType(s.to_string())),
        }
    }
}

/// An immutable uploaded document: raw bytes plus the declared media type.
#[derive(Debug, Clone)]
pub struct SourceDocument {
    bytes: Vec<u8>,
    media_type: MediaType,
}

impl SourceDocument {
    /// Wrap raw bytes.
    pub fn new(bytes: Vec<u8>, media_type: MediaType) -> Self {
        Self { bytes, media_type }
    }

    /// Read a file, guessing the media type from its extension.
    pub fn from_path(path: impl AsRef<Path>) -> Result<Self> {
        let path = path.as_ref();
        let media_type = MediaType::from_extension(path)
            .ok_or_else(|| Error::UnsupportedMediaType(path.display().to_string()))?;
        Ok(Self::new(std::fs::read(path)?, media_type))
    }

    /// The raw bytes.
    pub fn bytes(&self) -> &[u8] {
        &self.bytes
    }

    /// The declared media type.
    pub fn media_type(&self) -> MediaType {
        self.media_type
    }

    /// Size in bytes.
    pub fn len(&self) -> usize {
        self.bytes.len()
    }

    /// Whether the buffer is empty.
    pub fn is_empty(&self) -> bool {
        self.bytes.is_empty()
    }
}

/// Optional bound on the number of leading pages any strategy may process.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Default, Serialize, Deserialize)]
pub struct PageLimit(Option<usize>);

impl PageLimit {
    /// No limit.
    pub fn unlimited() -> Self {
        Self(None)
    }

    /// At most `pages` leading pages.
    pub fn at_most(pages: usize) -> Self {
        Self(Some(pages))
    }

    /// The bound, if any.
    pub fn get(&self) -> Option<usize> {
        self.0
    }

    /// How many of `total` pages may be processed.
    pub fn pages_to_process(&self, total: usize) -> usize {
        match self.0 {
            Some(limit) => limit.min(total),
            None => total,
        }
    }

    /// Whether applying this limit to `total` pages drops any.
    pub fn truncates(&self, total: usize) -> bool {
        self.pages_to_process(total) < total
    }
}

impl From<Option<usize>> for PageLimit {
    fn from(limit: Option<usize>) -> Self {
        Self(limit)
    }
}
