//! Layout-aware strategy: text re-derived from glyph geometry.

use crate::config::{ExtractionConfig, LayoutConfig};
use crate::document::{MediaType, PageLimit, SourceDocument};
use crate::error::{Error, Result};
use crate::extractors::embedded::page_text;
use crate::extractors::{BlockFinisher, BlockMetadata, ExtractionMethod, ExtractionResult, Extractor, TextBlock};
use crate::layout::{analyze_page, BlockKind, LayoutBlock};
use crate::pdf;
use crate::text::shaping::reshape_extracted;
use lopdf::Document;

/// Rebuilds each page from glyph positions.
///
/// Lines are formed by baseline, read right to left where the script calls
/// for it, split into columns and tables. A page whose geometry yields fewer
/// than `layout_fallback_chars` characters falls back to its embedded text,
/// with presentation forms folded and visual order recovered.
#[derive(Debug, Clone, Default)]
pub struct LayoutAwareExtractor {
    finisher: BlockFinisher,
    layout: LayoutConfig,
    fallback_chars: usize,
}

impl LayoutAwareExtractor {
    /// Create the extractor.
    pub fn new(finisher: BlockFinisher, layout: LayoutConfig, extraction: &ExtractionConfig) -> Self {
        Self {
            finisher,
            layout,
            fallback_chars: extraction.layout_fallback_chars,
        }
    }

    fn page_blocks(&self, doc: &Document, number: u32, page_id: lopdf::ObjectId) -> Vec<TextBlock> {
        let layout_blocks = analyze_page(doc, page_id, &self.layout);
        let layout_chars: usize = layout_blocks
            .iter()
            .map(|b| b.text.chars().filter(|c| !c.is_whitespace()).count())
            .sum();

        if layout_chars >= self.fallback_chars {
            return layout_blocks
                .iter()
                .filter_map(|b| self.finish_layout_block(number as usize, b))
                .collect();
        }

        log::debug!(
            "Page {}: layout produced {} chars, falling back to embedded text",
            number,
            layout_chars
        );
        let raw = match page_text(doc, number) {
            Ok(raw) => raw,
            Err(e) => {
                log::warn!("Embedded fallback unreadable on page {}: {}", number, e);
                return Vec::new();
            },
        };
        let metadata = BlockMetadata {
            fallback: true,
            ..Default::default()
        };
        self.finisher
            .finish(number as usize, &reshape_extracted(&raw), self.method())
            .map(|b| b.with_metadata(metadata))
            .into_iter()
            .collect()
    }

    fn finish_layout_block(&self, page: usize, block: &LayoutBlock) -> Option<TextBlock> {
        let metadata = BlockMetadata {
            bbox: Some(block.bbox),
            line_count: Some(block.line_count),
            ..Default::default()
        };
        let text = match block.kind {
            // Keep row structure: repair and normalize each row on its own.
            BlockKind::Table => block
                .text
                .lines()
                .map(|row| self.finisher.clean(row))
                .filter(|row| !row.is_empty())
                .collect::<Vec<_>>()
                .join("\n"),
            BlockKind::Paragraph => block.text.clone(),
        };
        self.finisher
            .finish(page, &text, self.method())
            .map(|b| b.with_kind(block.kind).with_metadata(metadata))
    }
}

impl Extractor for LayoutAwareExtractor {
    fn method(&self) -> ExtractionMethod {
        ExtractionMethod::LayoutAware
    }

    fn extract(&self, document: &SourceDocument, limit: PageLimit) -> Result<ExtractionResult> {
        if document.media_type() != MediaType::Pdf {
            return Err(Error::UnsupportedMediaType(document.media_type().to_string()));
        }
        let doc = pdf::load(document.bytes())?;
        let (pages, total) = pdf::limited_pages(&doc, limit);

        let mut blocks = Vec::new();
        for &(number, page_id) in &pages {
            blocks.extend(self.page_blocks(&doc, number, page_id));
        }

        log::debug!(
            "Layout-aware: {} blocks from {}/{} pages",
            blocks.len(),
            pages.len(),
            total
        );
        Ok(ExtractionResult::from_blocks(self.method(), blocks, total, pages.len()))
    }
}
