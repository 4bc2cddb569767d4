//! Entry point: route a document to the right strategies.

use crate::config::PipelineConfig;
use crate::document::{MediaType, PageLimit, SourceDocument};
use crate::error::Result;
use crate::extractors::BlockFinisher;
use crate::formats::{self, DocxExtractor, JsonExtractor, PlainTextExtractor};
use crate::ocr::OcrBackend;
use crate::pipeline::{CancellationToken, DocumentExtraction, ExtractionOrchestrator};
use crate::text::{RepairDictionary, TextRepairer};
use lazy_static::lazy_static;

lazy_static! {
    static ref DEFAULT_INGESTOR: DocumentIngestor = DocumentIngestor::new(PipelineConfig::default());
}

/// Turns uploaded documents into extracted text.
///
/// PDFs go through the multi-strategy [`ExtractionOrchestrator`]; plain
/// text, DOCX and JSON have a single strategy each. Build one ingestor at
/// startup and share it: OCR availability is checked once, here.
pub struct DocumentIngestor {
    config: PipelineConfig,
    orchestrator: ExtractionOrchestrator,
    plain_text: PlainTextExtractor,
    docx: DocxExtractor,
    json: JsonExtractor,
}

impl DocumentIngestor {
    /// Built-in repair dictionary; OCR tools detected on the PATH.
    pub fn new(config: PipelineConfig) -> Self {
        Self::with_dictionary(config, RepairDictionary::builtin())
    }

    /// Explicit repair dictionary; OCR tools detected on the PATH.
    pub fn with_dictionary(config: PipelineConfig, dictionary: RepairDictionary) -> Self {
        let ocr = config.ocr.enabled.then(|| OcrBackend::detect(&config.ocr));
        Self::with_ocr_backend(config, dictionary, ocr)
    }

    /// Explicit repair dictionary and OCR backend (`None` disables OCR).
    pub fn with_ocr_backend(config: PipelineConfig, dictionary: RepairDictionary, ocr: Option<OcrBackend>) -> Self {
        let finisher = BlockFinisher::new(
            TextRepairer::new(dictionary),
            config.normalizer.clone(),
            &config.extraction,
        );
        let orchestrator = ExtractionOrchestrator::new(&config, finisher.clone(), ocr);
        Self::from_parts(config, finisher, orchestrator)
    }

    /// Use a custom orchestrator for PDFs.
    pub fn from_parts(config: PipelineConfig, finisher: BlockFinisher, orchestrator: ExtractionOrchestrator) -> Self {
        Self {
            config,
            orchestrator,
            plain_text: PlainTextExtractor::new(finisher.clone()),
            docx: DocxExtractor::new(finisher.clone()),
            json: JsonExtractor::new(finisher),
        }
    }

    /// The configuration in use.
    pub fn config(&self) -> &PipelineConfig {
        &self.config
    }

    /// Whether optical recognition can run.
    pub fn ocr_available(&self) -> bool {
        self.orchestrator.ocr_available()
    }

    /// Extract `document`, processing at most `limit` leading pages.
    pub fn ingest(&self, document: &SourceDocument, limit: PageLimit) -> Result<DocumentExtraction> {
        self.ingest_with_cancel(document, limit, &CancellationToken::new())
    }

    /// Extract `document`, checking `cancel` between strategies.
    pub fn ingest_with_cancel(
        &self,
        document: &SourceDocument,
        limit: PageLimit,
        cancel: &CancellationToken,
    ) -> Result<DocumentExtraction> {
        log::info!(
            "Extracting {} document ({} bytes, page limit {:?})",
            document.media_type(),
            document.len(),
            limit.get()
        );
        match document.media_type() {
            MediaType::Pdf => self.orchestrator.run_with_cancel(document, limit, cancel),
            MediaType::Text => self.orchestrator.run_single(&self.plain_text, document, limit, cancel),
            MediaType::Docx => self.orchestrator.run_single(&self.docx, document, limit, cancel),
            MediaType::Json => {
                let outcome = self.orchestrator.run_single(&self.json, document, limit, cancel)?;
                let value = formats::parse_json(document.bytes())?;
                Ok(outcome.with_structured(value))
            },
        }
    }
}

/// Extract a document with the default configuration.
///
/// # Examples
///
/// ```
/// use docsift::{extract_document, MediaType};
///
/// let text = "این یک متن آزمایشی برای استخراج است و چند کلمه دارد.";
/// let outcome = extract_document(text.as_bytes(), MediaType::Text, None).unwrap();
/// assert_eq!(outcome.text(), text);
/// ```
pub fn extract_document(
    bytes: &[u8],
    media_type: MediaType,
    page_limit: Option<usize>,
) -> Result<DocumentExtraction> {
    let document = SourceDocument::new(bytes.to_vec(), media_type);
    DEFAULT_INGESTOR.ingest(&document, PageLimit::from(page_limit))
}
