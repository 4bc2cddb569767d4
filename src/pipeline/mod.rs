//! Strategy orchestration.
//!
//! ```text
//! SourceDocument + PageLimit
//!     ↓
//! [EmbeddedTextExtractor] ─┐
//! [LayoutAwareExtractor]  ─┤ score each, detect garbling
//!     ↓                    │
//! escalate? (zero, garbled, or below the acceptable floor)
//!     ↓ yes, if OCR is available
//! [OpticalExtractor]      ─┘
//!     ↓
//! highest score wins; ties go to the cheaper strategy
//!     ↓
//! DocumentExtraction | TerminalExtractionError
//! ```
//!
//! A strategy that errors or panics contributes a zero score and never aborts
//! the run. Only the absence of any usable result is an error.

pub mod cancel;
pub mod scoring;

pub use cancel::CancellationToken;
pub use scoring::{QualityLabel, QualityScorer};

use crate::config::{PipelineConfig, QualityThresholds};
use crate::document::{PageLimit, SourceDocument};
use crate::error::{Error, FailureReason, Result, StrategyFailure, TerminalExtractionError};
use crate::extractors::{
    BlockFinisher, EmbeddedTextExtractor, ExtractionMethod, ExtractionResult, Extractor, LayoutAwareExtractor,
    OpticalExtractor, TextBlock,
};
use crate::ocr::OcrBackend;
use crate::text::CorruptionDetector;
use serde::Serialize;
use std::any::Any;
use std::fmt;
use std::panic::{self, AssertUnwindSafe};

/// One strategy run, as reported to observability.
#[derive(Debug, Clone, PartialEq, Serialize)]
pub struct StrategyAttempt {
    /// Strategy
    pub method: ExtractionMethod,
    /// Whether the strategy ran to completion
    pub success: bool,
    /// Comparable score (zero when unusable)
    pub score: f64,
    /// Characters in the strategy's text
    pub char_count: usize,
    /// Words in the strategy's text
    pub word_count: usize,
    /// Whether the corruption detector flagged the text
    pub garbled: bool,
    /// Failure message
    #[serde(skip_serializing_if = "Option::is_none")]
    pub error: Option<String>,
}

/// Non-fatal annotation on a successful extraction.
#[derive(Debug, Clone, PartialEq, Eq, Serialize)]
#[serde(tag = "kind", rename_all = "snake_case")]
pub enum ExtractionWarning {
    /// A page cap truncated the input
    PageLimitApplied {
        /// Pages in the source
        total_pages: usize,
        /// Pages actually processed
        processed_pages: usize,
    },
}

impl fmt::Display for ExtractionWarning {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            ExtractionWarning::PageLimitApplied {
                total_pages,
                processed_pages,
            } => write!(f, "page limit applied: processed {} of {} pages", processed_pages, total_pages),
        }
    }
}

/// Totals over the winning result.
#[derive(Debug, Clone, PartialEq, Serialize)]
pub struct ExtractionStatistics {
    /// Characters in the concatenated text
    pub total_characters: usize,
    /// Words across all blocks
    pub total_words: usize,
    /// Number of blocks
    pub total_blocks: usize,
    /// Every strategy that ran, in order
    pub methods_tried: Vec<ExtractionMethod>,
}

/// The selected result plus diagnostics.
#[derive(Debug, Clone, PartialEq, Serialize)]
pub struct DocumentExtraction {
    /// Winning strategy result
    pub result: ExtractionResult,
    /// Winning strategy
    pub method: ExtractionMethod,
    /// Winning score
    pub score: f64,
    /// Coarse quality bucket of the winning text
    pub quality: QualityLabel,
    /// Every strategy that ran, in order
    pub attempts: Vec<StrategyAttempt>,
    /// Non-fatal annotations
    pub warnings: Vec<ExtractionWarning>,
    /// Totals over the winning result
    pub statistics: ExtractionStatistics,
    /// Parsed value, for structured media
    #[serde(skip_serializing_if = "Option::is_none")]
    pub structured: Option<serde_json::Value>,
}

impl DocumentExtraction {
    /// Concatenated text of the winning result.
    pub fn text(&self) -> &str {
        self.result.text()
    }

    /// Blocks of the winning result.
    pub fn blocks(&self) -> &[TextBlock] {
        self.result.blocks()
    }

    /// Whether a page cap truncated the input.
    pub fn is_truncated(&self) -> bool {
        self.warnings
            .iter()
            .any(|w| matches!(w, ExtractionWarning::PageLimitApplied { .. }))
    }

    /// Attach the parsed value of a structured document.
    pub fn with_structured(mut self, value: serde_json::Value) -> Self {
        self.structured = Some(value);
        self
    }
}

struct Candidate {
    result: ExtractionResult,
    score: f64,
    garbled: bool,
    failure: Option<FailureReason>,
}

impl Candidate {
    fn failed(method: ExtractionMethod, reason: FailureReason) -> Self {
        Self {
            result: ExtractionResult::failure(method, reason.to_string()),
            score: 0.0,
            garbled: false,
            failure: Some(reason),
        }
    }

    fn report(&self) -> StrategyAttempt {
        StrategyAttempt {
            method: self.result.method(),
            success: self.result.is_success(),
            score: self.score,
            char_count: self.result.char_count(),
            word_count: self.result.word_count(),
            garbled: self.garbled,
            error: self.result.error().map(str::to_string),
        }
    }

    fn strategy_failure(&self) -> StrategyFailure {
        let reason = self.failure.clone().unwrap_or(FailureReason::Unusable);
        StrategyFailure::new(self.result.method().as_str(), reason)
    }
}

fn panic_message(payload: &(dyn Any + Send)) -> String {
    if let Some(s) = payload.downcast_ref::<&str>() {
        (*s).to_string()
    } else if let Some(s) = payload.downcast_ref::<String>() {
        s.clone()
    } else {
        "unknown panic".to_string()
    }
}

/// Index of the highest-scoring usable candidate; the earlier one wins ties.
fn best_index(candidates: &[Candidate]) -> Option<usize> {
    let mut best: Option<usize> = None;
    for (i, c) in candidates.iter().enumerate() {
        if !c.result.is_success() || c.score <= 0.0 {
            continue;
        }
        if best.map_or(true, |b| c.score > candidates[b].score) {
            best = Some(i);
        }
    }
    best
}

/// Runs the strategies, decides on escalation and selects the winner.
pub struct ExtractionOrchestrator {
    embedded: Box<dyn Extractor>,
    layout: Box<dyn Extractor>,
    optical: Option<Box<dyn Extractor>>,
    scorer: QualityScorer,
    detector: CorruptionDetector,
    quality: QualityThresholds,
    parallel: bool,
}

impl ExtractionOrchestrator {
    /// Build the standard strategies. Optical recognition is offered only when
    /// `ocr` is given and enabled in the configuration.
    pub fn new(config: &PipelineConfig, finisher: BlockFinisher, ocr: Option<OcrBackend>) -> Self {
        let embedded = EmbeddedTextExtractor::new(finisher.clone());
        let layout = LayoutAwareExtractor::new(finisher.clone(), config.layout.clone(), &config.extraction);
        let optical = ocr
            .filter(|_| config.ocr.enabled)
            .map(|backend| Box::new(OpticalExtractor::new(backend, finisher, &config.ocr)) as Box<dyn Extractor>);
        Self::from_extractors(config, Box::new(embedded), Box::new(layout), optical)
    }

    /// Build from explicit strategies.
    pub fn from_extractors(
        config: &PipelineConfig,
        embedded: Box<dyn Extractor>,
        layout: Box<dyn Extractor>,
        optical: Option<Box<dyn Extractor>>,
    ) -> Self {
        Self {
            embedded,
            layout,
            optical,
            scorer: QualityScorer::new(config.scoring.clone()),
            detector: CorruptionDetector::with_config(config.detector.clone()),
            quality: config.quality.clone(),
            parallel: config.extraction.parallel_digital,
        }
    }

    /// The scorer in use.
    pub fn scorer(&self) -> &QualityScorer {
        &self.scorer
    }

    /// Whether an optical strategy is configured and its engine is present.
    pub fn ocr_available(&self) -> bool {
        self.optical.as_ref().is_some_and(|o| o.is_available())
    }

    /// Extract a PDF.
    pub fn run(&self, document: &SourceDocument, limit: PageLimit) -> Result<DocumentExtraction> {
        self.run_with_cancel(document, limit, &CancellationToken::new())
    }

    /// Extract a PDF, checking `cancel` before each strategy.
    pub fn run_with_cancel(
        &self,
        document: &SourceDocument,
        limit: PageLimit,
        cancel: &CancellationToken,
    ) -> Result<DocumentExtraction> {
        cancel.check()?;
        let mut candidates = self.run_digital(document, limit, cancel)?;

        let mut failures = Vec::new();
        let escalate = self.escalation_reason(&candidates);
        if let Some(reason) = escalate {
            match &self.optical {
                Some(optical) if optical.is_available() => {
                    log::info!("Escalating to OCR: {}", reason);
                    cancel.check()?;
                    candidates.push(self.attempt(optical.as_ref(), document, limit));
                },
                Some(optical) => {
                    log::info!("OCR wanted ({}) but engine unavailable", reason);
                    failures.push(Candidate::failed(
                        optical.method(),
                        FailureReason::Unavailable("engine not installed".to_string()),
                    ));
                },
                None => {
                    log::info!("OCR wanted ({}) but not configured", reason);
                    failures.push(Candidate::failed(
                        ExtractionMethod::OpticalRecognition,
                        FailureReason::Unavailable("not configured".to_string()),
                    ));
                },
            }
        }

        match best_index(&candidates) {
            Some(winner) => Ok(self.conclude(candidates, winner)),
            None => Err(self.terminal(candidates.iter().chain(failures.iter()))),
        }
    }

    /// Run one strategy alone, as used for single-unit formats.
    ///
    /// A non-empty successful result is accepted even when it is shorter
    /// than the scoring threshold.
    pub fn run_single(
        &self,
        extractor: &dyn Extractor,
        document: &SourceDocument,
        limit: PageLimit,
        cancel: &CancellationToken,
    ) -> Result<DocumentExtraction> {
        cancel.check()?;
        let candidate = self.attempt(extractor, document, limit);
        if candidate.result.is_success() && !candidate.result.text().is_empty() {
            Ok(self.conclude(vec![candidate], 0))
        } else {
            Err(self.terminal(std::iter::once(&candidate)))
        }
    }

    fn run_digital(
        &self,
        document: &SourceDocument,
        limit: PageLimit,
        cancel: &CancellationToken,
    ) -> Result<Vec<Candidate>> {
        if self.parallel {
            let (embedded, layout) = std::thread::scope(|s| {
                let layout = s.spawn(|| self.attempt(self.layout.as_ref(), document, limit));
                let embedded = self.attempt(self.embedded.as_ref(), document, limit);
                let layout = layout.join().unwrap_or_else(|payload| {
                    Candidate::failed(
                        self.layout.method(),
                        FailureReason::Panicked(panic_message(payload.as_ref())),
                    )
                });
                (embedded, layout)
            });
            return Ok(vec![embedded, layout]);
        }

        let embedded = self.attempt(self.embedded.as_ref(), document, limit);
        cancel.check()?;
        let layout = self.attempt(self.layout.as_ref(), document, limit);
        Ok(vec![embedded, layout])
    }

    fn attempt(&self, extractor: &dyn Extractor, document: &SourceDocument, limit: PageLimit) -> Candidate {
        let method = extractor.method();
        if !extractor.is_available() {
            log::warn!("{}: engine unavailable", method);
            return Candidate::failed(method, FailureReason::Unavailable("engine not installed".to_string()));
        }

        let outcome = panic::catch_unwind(AssertUnwindSafe(|| extractor.extract(document, limit)));
        let candidate = match outcome {
            Ok(Ok(result)) => {
                let score = self.scorer.score(&result);
                let garbled = self.detector.looks_garbled(result.text());
                Candidate {
                    result,
                    score,
                    garbled,
                    failure: None,
                }
            },
            Ok(Err(Error::EngineUnavailable(msg))) => Candidate::failed(method, FailureReason::Unavailable(msg)),
            Ok(Err(e)) => Candidate::failed(method, FailureReason::Failed(e.to_string())),
            Err(payload) => Candidate::failed(method, FailureReason::Panicked(panic_message(payload.as_ref()))),
        };

        match &candidate.failure {
            Some(reason) => log::warn!("{} failed: {}", method, reason),
            None => log::info!(
                "{}: {} chars, {} words, score {:.1}{}",
                method,
                candidate.result.char_count(),
                candidate.result.word_count(),
                candidate.score,
                if candidate.garbled { " (garbled)" } else { "" }
            ),
        }
        candidate
    }

    fn escalation_reason(&self, digital: &[Candidate]) -> Option<&'static str> {
        let best = match best_index(digital) {
            Some(i) => &digital[i],
            None => return Some("no usable digital text"),
        };
        if best.garbled {
            Some("digital text looks garbled")
        } else if !self.scorer.is_acceptable(best.score) {
            Some("digital score below acceptable floor")
        } else {
            None
        }
    }

    fn conclude(&self, candidates: Vec<Candidate>, winner: usize) -> DocumentExtraction {
        let attempts: Vec<StrategyAttempt> = candidates.iter().map(Candidate::report).collect();
        let methods_tried = attempts.iter().map(|a| a.method).collect();
        let mut candidates = candidates;
        let chosen = candidates.swap_remove(winner);
        let (result, score) = (chosen.result, chosen.score);

        let mut warnings = Vec::new();
        if result.pages_processed() < result.pages_total() {
            warnings.push(ExtractionWarning::PageLimitApplied {
                total_pages: result.pages_total(),
                processed_pages: result.pages_processed(),
            });
        }

        let statistics = ExtractionStatistics {
            total_characters: result.char_count(),
            total_words: result.word_count(),
            total_blocks: result.blocks().len(),
            methods_tried,
        };
        let quality = QualityLabel::from_chars(statistics.total_characters, &self.quality);

        log::info!(
            "Selected {}: {} chars, {} words, {} blocks, quality {}",
            result.method(),
            statistics.total_characters,
            statistics.total_words,
            statistics.total_blocks,
            quality
        );
        for warning in &warnings {
            log::info!("{}", warning);
        }

        DocumentExtraction {
            method: result.method(),
            result,
            score,
            quality,
            attempts,
            warnings,
            statistics,
            structured: None,
        }
    }

    fn terminal<'a>(&self, candidates: impl Iterator<Item = &'a Candidate>) -> Error {
        let failures: Vec<StrategyFailure> = candidates.map(Candidate::strategy_failure).collect();
        log::warn!("All extraction methods failed ({} attempted)", failures.len());
        TerminalExtractionError { failures }.into()
    }
}
