//! Optical strategy: rendered pages run through a text recognizer.

use crate::config::OcrConfig;
use crate::document::{MediaType, PageLimit, SourceDocument};
use crate::error::{Error, Result};
use crate::extractors::{BlockFinisher, BlockMetadata, ExtractionMethod, ExtractionResult, Extractor};
use crate::ocr::{mean_confidence, reassemble, OcrBackend};

/// Rasterizes each page at `scale` × 72 dpi and recognizes it.
///
/// The most expensive strategy; the orchestrator only runs it when the
/// digital strategies are unusable, garbled or weak.
#[derive(Debug, Clone)]
pub struct OpticalExtractor {
    backend: OcrBackend,
    finisher: BlockFinisher,
    scale: f32,
}

impl OpticalExtractor {
    /// Create the extractor over an OCR backend.
    pub fn new(backend: OcrBackend, finisher: BlockFinisher, config: &OcrConfig) -> Self {
        Self {
            backend,
            finisher,
            scale: config.scale,
        }
    }
}

impl Extractor for OpticalExtractor {
    fn method(&self) -> ExtractionMethod {
        ExtractionMethod::OpticalRecognition
    }

    fn is_available(&self) -> bool {
        self.backend.is_available()
    }

    fn extract(&self, document: &SourceDocument, limit: PageLimit) -> Result<ExtractionResult> {
        if !self.backend.is_available() {
            return Err(Error::EngineUnavailable(self.backend.unavailable_reason()));
        }
        if document.media_type() != MediaType::Pdf {
            return Err(Error::UnsupportedMediaType(document.media_type().to_string()));
        }

        let mut session = self.backend.rasterizer().open(document.bytes())?;
        let total = session.page_count();
        let processed = limit.pages_to_process(total);

        let mut blocks = Vec::new();
        for page in 1..=processed {
            let image = session.render(page, self.scale)?;
            let fragments = self.backend.recognizer().recognize(&image)?;
            let text = reassemble(&fragments);
            let metadata = BlockMetadata {
                confidence: mean_confidence(&fragments),
                ..Default::default()
            };
            if let Some(block) = self.finisher.finish(page, &text, self.method()) {
                blocks.push(block.with_metadata(metadata));
            }
        }

        log::debug!("OCR: {} blocks from {}/{} pages", blocks.len(), processed, total);
        Ok(ExtractionResult::from_blocks(self.method(), blocks, total, processed))
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::geometry::Rect;
    use crate::ocr::{PageRasterizer, RasterSession, RecognizedFragment, TextRecognizer};
    use image::DynamicImage;
    use std::sync::atomic::{AtomicUsize, Ordering};
    use std::sync::Arc;

    struct FakeRasterizer {
        pages: usize,
        rendered: Arc<AtomicUsize>,
    }

    struct FakeSession {
        pages: usize,
        rendered: Arc<AtomicUsize>,
    }

    impl RasterSession for FakeSession {
        fn page_count(&self) -> usize {
            self.pages
        }

        fn render(&mut self, _page: usize, scale: f32) -> Result<DynamicImage> {
            assert_eq!(scale, 2.0);
            self.rendered.fetch_add(1, Ordering::SeqCst);
            Ok(DynamicImage::new_luma8(2, 2))
        }
    }

    impl PageRasterizer for FakeRasterizer {
        fn name(&self) -> &str {
            "fake"
        }

        fn is_available(&self) -> bool {
            true
        }

        fn open(&self, _pdf: &[u8]) -> Result<Box<dyn RasterSession>> {
            Ok(Box::new(FakeSession {
                pages: self.pages,
                rendered: Arc::clone(&self.rendered),
            }))
        }
    }

    struct FakeRecognizer {
        available: bool,
    }

    impl TextRecognizer for FakeRecognizer {
        fn name(&self) -> &str {
            "fake-ocr"
        }

        fn is_available(&self) -> bool {
            self.available
        }

        fn recognize(&self, _image: &DynamicImage) -> Result<Vec<RecognizedFragment>> {
            Ok(vec![
                RecognizedFragment::new("قرارداد", Rect::from_corners(200.0, 10.0, 260.0, 30.0), 90.0),
                RecognizedFragment::new("اجاره", Rect::from_corners(120.0, 10.0, 180.0, 30.0), 80.0),
            ])
        }
    }

    fn extractor(pages: usize, available: bool) -> (OpticalExtractor, Arc<AtomicUsize>) {
        let rendered = Arc::new(AtomicUsize::new(0));
        let backend = OcrBackend::new(
            Arc::new(FakeRasterizer {
                pages,
                rendered: Arc::clone(&rendered),
            }),
            Arc::new(FakeRecognizer { available }),
        );
        let extractor = OpticalExtractor::new(backend, BlockFinisher::default(), &OcrConfig::default());
        (extractor, rendered)
    }

    #[test]
    fn test_recognizes_pages_in_reading_order() {
        let (extractor, rendered) = extractor(2, true);
        let document = SourceDocument::new(b"%PDF".to_vec(), MediaType::Pdf);
        let result = extractor.extract(&document, PageLimit::unlimited()).unwrap();
        assert_eq!(rendered.load(Ordering::SeqCst), 2);
        assert_eq!(result.blocks().len(), 2);
        assert_eq!(result.blocks()[0].text(), "قرارداد اجاره");
        assert_eq!(result.blocks()[0].metadata().confidence, Some(85.0));
    }

    #[test]
    fn test_page_limit_caps_rendering() {
        let (extractor, rendered) = extractor(10, true);
        let document = SourceDocument::new(b"%PDF".to_vec(), MediaType::Pdf);
        let result = extractor.extract(&document, PageLimit::at_most(3)).unwrap();
        assert_eq!(rendered.load(Ordering::SeqCst), 3);
        assert_eq!(result.pages_total(), 10);
        assert_eq!(result.pages_processed(), 3);
    }

    #[test]
    fn test_unavailable_engine_is_a_typed_error() {
        let (extractor, rendered) = extractor(1, false);
        assert!(!extractor.is_available());
        let document = SourceDocument::new(b"%PDF".to_vec(), MediaType::Pdf);
        let err = extractor.extract(&document, PageLimit::unlimited()).unwrap_err();
        assert!(matches!(err, Error::EngineUnavailable(ref msg) if msg.contains("fake-ocr")));
        assert_eq!(rendered.load(Ordering::SeqCst), 0);
    }
}
