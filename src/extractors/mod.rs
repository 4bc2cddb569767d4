//! Extraction strategies and the result model they share.
//!
//! Every strategy implements [`Extractor`] and turns a [`SourceDocument`]
//! into an [`ExtractionResult`]. Strategies are independent: none of them
//! assumes another ran, and none mutates shared state. Each raw block is
//! passed through a [`BlockFinisher`] (repair, then normalization, then a
//! minimum-length filter) before it is counted.

pub mod embedded;
pub mod layout;
pub mod ocr;

pub use embedded::EmbeddedTextExtractor;
pub use layout::LayoutAwareExtractor;
pub use ocr::OpticalExtractor;

use crate::config::{ExtractionConfig, NormalizerConfig};
use crate::document::{PageLimit, SourceDocument};
use crate::error::Result;
use crate::geometry::Rect;
use crate::layout::BlockKind;
use crate::text::{TextNormalizer, TextRepairer};
use serde::{Deserialize, Serialize};
use std::fmt;

/// Separator placed between blocks in the concatenated text.
pub const BLOCK_SEPARATOR: &str = "\n\n";

/// Identifies the strategy that produced a result.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum ExtractionMethod {
    /// Text objects read straight from the PDF
    EmbeddedText,
    /// Text re-derived from glyph geometry
    LayoutAware,
    /// Rasterized pages run through a recognizer
    #[serde(rename = "ocr")]
    OpticalRecognition,
    /// Plain text file
    PlainText,
    /// Word-processor document
    Docx,
    /// Structured JSON document
    Json,
}

impl ExtractionMethod {
    /// Stable name used in logs, reports and failures.
    pub fn as_str(&self) -> &'static str {
        match self {
            ExtractionMethod::EmbeddedText => "embedded_text",
            ExtractionMethod::LayoutAware => "layout_aware",
            ExtractionMethod::OpticalRecognition => "ocr",
            ExtractionMethod::PlainText => "plain_text",
            ExtractionMethod::Docx => "docx",
            ExtractionMethod::Json => "json",
        }
    }

    /// Whether this method reads pixels rather than stored text.
    pub fn is_optical(&self) -> bool {
        matches!(self, ExtractionMethod::OpticalRecognition)
    }
}

impl fmt::Display for ExtractionMethod {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.as_str())
    }
}

/// Method-specific details attached to a block.
#[derive(Debug, Clone, Default, PartialEq, Serialize, Deserialize)]
pub struct BlockMetadata {
    /// Region of the page the block came from
    #[serde(skip_serializing_if = "Option::is_none")]
    pub bbox: Option<Rect>,
    /// Number of visual lines merged into the block
    #[serde(skip_serializing_if = "Option::is_none")]
    pub line_count: Option<usize>,
    /// Mean recognizer confidence in [0, 100]
    #[serde(skip_serializing_if = "Option::is_none")]
    pub confidence: Option<f32>,
    /// Set when the layout strategy fell back to embedded text for the page
    #[serde(skip_serializing_if = "std::ops::Not::not")]
    pub fallback: bool,
}

/// One unit of extracted text.
///
/// The counts are always computed from the block's own (finished) text.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct TextBlock {
    page: usize,
    text: String,
    char_count: usize,
    word_count: usize,
    method: ExtractionMethod,
    kind: BlockKind,
    #[serde(default)]
    metadata: BlockMetadata,
}

impl TextBlock {
    /// Create a block on a 1-based `page`.
    pub fn new(page: usize, text: impl Into<String>, method: ExtractionMethod) -> Self {
        let text = text.into();
        Self {
            page,
            char_count: text.chars().count(),
            word_count: text.split_whitespace().count(),
            text,
            method,
            kind: BlockKind::Paragraph,
            metadata: BlockMetadata::default(),
        }
    }

    /// Tag the block as a paragraph or table.
    pub fn with_kind(mut self, kind: BlockKind) -> Self {
        self.kind = kind;
        self
    }

    /// Attach method-specific metadata.
    pub fn with_metadata(mut self, metadata: BlockMetadata) -> Self {
        self.metadata = metadata;
        self
    }

    /// 1-based page number.
    pub fn page(&self) -> usize {
        self.page
    }

    /// Block text.
    pub fn text(&self) -> &str {
        &self.text
    }

    /// Number of characters in [`text`](Self::text).
    pub fn char_count(&self) -> usize {
        self.char_count
    }

    /// Number of whitespace-separated words in [`text`](Self::text).
    pub fn word_count(&self) -> usize {
        self.word_count
    }

    /// Strategy that produced the block.
    pub fn method(&self) -> ExtractionMethod {
        self.method
    }

    /// Structural tag.
    pub fn kind(&self) -> BlockKind {
        self.kind
    }

    /// Method-specific metadata.
    pub fn metadata(&self) -> &BlockMetadata {
        &self.metadata
    }
}

/// Outcome of one strategy.
///
/// A failed result has no blocks and a non-empty error.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct ExtractionResult {
    success: bool,
    method: ExtractionMethod,
    blocks: Vec<TextBlock>,
    text: String,
    #[serde(skip_serializing_if = "Option::is_none")]
    error: Option<String>,
    pages_total: usize,
    pages_processed: usize,
}

impl ExtractionResult {
    /// A successful result over `blocks`, which must be in page order.
    pub fn from_blocks(
        method: ExtractionMethod,
        blocks: Vec<TextBlock>,
        pages_total: usize,
        pages_processed: usize,
    ) -> Self {
        let text = blocks
            .iter()
            .map(|b| b.text())
            .collect::<Vec<_>>()
            .join(BLOCK_SEPARATOR);
        Self {
            success: true,
            method,
            blocks,
            text,
            error: None,
            pages_total,
            pages_processed,
        }
    }

    /// A failed result.
    pub fn failure(method: ExtractionMethod, error: impl Into<String>) -> Self {
        let mut error = error.into();
        if error.trim().is_empty() {
            error = "unknown error".to_string();
        }
        Self {
            success: false,
            method,
            blocks: Vec::new(),
            text: String::new(),
            error: Some(error),
            pages_total: 0,
            pages_processed: 0,
        }
    }

    /// Whether the strategy ran to completion.
    pub fn is_success(&self) -> bool {
        self.success
    }

    /// Strategy that produced this result.
    pub fn method(&self) -> ExtractionMethod {
        self.method
    }

    /// Blocks in page order.
    pub fn blocks(&self) -> &[TextBlock] {
        &self.blocks
    }

    /// Block texts joined with a blank line.
    pub fn text(&self) -> &str {
        &self.text
    }

    /// Failure message, for failed results.
    pub fn error(&self) -> Option<&str> {
        self.error.as_deref()
    }

    /// Characters in the concatenated text.
    pub fn char_count(&self) -> usize {
        self.text.chars().count()
    }

    /// Words across all blocks.
    pub fn word_count(&self) -> usize {
        self.blocks.iter().map(|b| b.word_count()).sum()
    }

    /// Pages (or units) in the source.
    pub fn pages_total(&self) -> usize {
        self.pages_total
    }

    /// Pages (or units) actually processed.
    pub fn pages_processed(&self) -> usize {
        self.pages_processed
    }
}

/// A text extraction strategy.
///
/// Implementations must honour `limit` as a hard cap on the leading pages
/// they read, and must report a missing engine through
/// [`is_available`](Extractor::is_available) rather than by panicking.
pub trait Extractor: Send + Sync {
    /// Which strategy this is.
    fn method(&self) -> ExtractionMethod;

    /// Whether the strategy can run in this deployment.
    fn is_available(&self) -> bool {
        true
    }

    /// Extract text from at most `limit` leading pages of `document`.
    fn extract(&self, document: &SourceDocument, limit: PageLimit) -> Result<ExtractionResult>;
}

/// Repair, normalize and filter raw block text.
#[derive(Debug, Clone, Default)]
pub struct BlockFinisher {
    repairer: TextRepairer,
    normalizer: TextNormalizer,
    min_block_chars: usize,
}

impl BlockFinisher {
    /// Create a finisher from its parts.
    pub fn new(repairer: TextRepairer, normalizer: NormalizerConfig, extraction: &ExtractionConfig) -> Self {
        Self {
            repairer,
            normalizer: TextNormalizer::with_config(normalizer),
            min_block_chars: extraction.min_block_chars,
        }
    }

    /// Set the minimum number of characters a finished block must keep.
    pub fn with_min_block_chars(mut self, chars: usize) -> Self {
        self.min_block_chars = chars;
        self
    }

    /// Repair then normalize `raw` text.
    pub fn clean(&self, raw: &str) -> String {
        self.normalizer.normalize(&self.repairer.repair(raw))
    }

    /// Finish one raw block; `None` when the cleaned text is too short to keep.
    pub fn finish(&self, page: usize, raw: &str, method: ExtractionMethod) -> Option<TextBlock> {
        let text = self.clean(raw);
        let chars = text.chars().count();
        if chars < self.min_block_chars.max(1) {
            log::trace!("Dropping {}-char block on page {} ({})", chars, page, method);
            return None;
        }
        Some(TextBlock::new(page, text, method))
    }
}
