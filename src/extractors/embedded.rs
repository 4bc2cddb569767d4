//! Fast strategy: text objects read straight from the PDF.

use crate::document::{MediaType, PageLimit, SourceDocument};
use crate::error::{Error, Result};
use crate::extractors::{BlockFinisher, ExtractionMethod, ExtractionResult, Extractor};
use crate::pdf;
use lopdf::Document;

/// Text of one page as stored in its text objects, in content order.
pub fn page_text(doc: &Document, page_number: u32) -> Result<String> {
    Ok(doc.extract_text(&[page_number])?)
}

/// Reads each page's text objects in the order they appear in the content stream.
///
/// Fast, but blind to geometry: pre-shaped or visually ordered right-to-left
/// text comes out exactly as it was stored, which is what the corruption
/// detector is there to notice.
#[derive(Debug, Clone, Default)]
pub struct EmbeddedTextExtractor {
    finisher: BlockFinisher,
}

impl EmbeddedTextExtractor {
    /// Create the extractor with a block finisher.
    pub fn new(finisher: BlockFinisher) -> Self {
        Self { finisher }
    }
}

impl Extractor for EmbeddedTextExtractor {
    fn method(&self) -> ExtractionMethod {
        ExtractionMethod::EmbeddedText
    }

    fn extract(&self, document: &SourceDocument, limit: PageLimit) -> Result<ExtractionResult> {
        if document.media_type() != MediaType::Pdf {
            return Err(Error::UnsupportedMediaType(document.media_type().to_string()));
        }
        let doc = pdf::load(document.bytes())?;
        let (pages, total) = pdf::limited_pages(&doc, limit);

        let mut blocks = Vec::new();
        for &(number, _) in &pages {
            match page_text(&doc, number) {
                Ok(raw) => {
                    if let Some(block) = self.finisher.finish(number as usize, &raw, self.method()) {
                        blocks.push(block);
                    }
                },
                Err(e) => log::warn!("Embedded text unreadable on page {}: {}", number, e),
            }
        }

        log::debug!(
            "Embedded text: {} blocks from {}/{} pages",
            blocks.len(),
            pages.len(),
            total
        );
        Ok(ExtractionResult::from_blocks(self.method(), blocks, total, pages.len()))
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::pdf::fixtures::text_pdf;

    #[test]
    fn test_extracts_each_page() {
        let bytes = text_pdf(&[
            vec!["The first page has a sentence."],
            vec!["The second page has another one."],
        ]);
        let document = SourceDocument::new(bytes, MediaType::Pdf);
        let result = EmbeddedTextExtractor::default()
            .extract(&document, PageLimit::unlimited())
            .unwrap();
        assert!(result.is_success());
        assert_eq!(result.blocks().len(), 2);
        assert_eq!(result.blocks()[1].page(), 2);
        assert!(result.text().contains("first page"));
        assert!(result.text().contains("\n\n"));
    }

    #[test]
    fn test_honours_page_limit() {
        let pages: Vec<Vec<&str>> = (0..5).map(|_| vec!["Some words on this page."]).collect();
        let document = SourceDocument::new(text_pdf(&pages), MediaType::Pdf);
        let result = EmbeddedTextExtractor::default()
            .extract(&document, PageLimit::at_most(2))
            .unwrap();
        assert_eq!(result.pages_total(), 5);
        assert_eq!(result.pages_processed(), 2);
        assert!(result.blocks().iter().all(|b| b.page() <= 2));
    }

    #[test]
    fn test_rejects_non_pdf_and_garbage() {
        let text = SourceDocument::new(b"hello".to_vec(), MediaType::Text);
        assert!(matches!(
            EmbeddedTextExtractor::default().extract(&text, PageLimit::unlimited()),
            Err(Error::UnsupportedMediaType(_))
        ));
        let broken = SourceDocument::new(b"%PDF-1.4 nonsense".to_vec(), MediaType::Pdf);
        assert!(EmbeddedTextExtractor::default()
            .extract(&broken, PageLimit::unlimited())
            .is_err());
    }
}
