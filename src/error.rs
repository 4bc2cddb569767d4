//! Error types for the extraction pipeline.
//!
//! Two levels of failure exist. A [`StrategyFailure`] describes one extraction
//! strategy that produced nothing usable; the orchestrator absorbs these and
//! keeps going. An [`Error`] is what the public API returns, and the
//! [`Error::Extraction`] variant carries the [`TerminalExtractionError`] raised
//! when every strategy failed.

use std::fmt;

/// Result type alias for extraction operations.
pub type Result<T> = std::result::Result<T, Error>;

/// Error types that can occur while extracting text from a document.
#[derive(Debug, thiserror::Error)]
pub enum Error {
    /// The PDF object model could not be loaded or walked
    #[error("PDF error: {0}")]
    Pdf(String),

    /// The PDF is encrypted and cannot be read without a password
    #[error("PDF is encrypted")]
    Encrypted,

    /// IO error
    #[error("IO error: {0}")]
    Io(#[from] std::io::Error),

    /// JSON (de)serialization error
    #[error("JSON error: {0}")]
    Json(#[from] serde_json::Error),

    /// Word-processor archive or XML could not be read
    #[error("DOCX error: {0}")]
    Docx(String),

    /// Raster image could not be decoded or encoded
    #[error("Image error: {0}")]
    Image(String),

    /// The OCR engine ran but reported an error
    #[error("OCR error: {0}")]
    Ocr(String),

    /// A required external engine is not installed or not configured
    #[error("Engine unavailable: {0}")]
    EngineUnavailable(String),

    /// The declared media type is not one the pipeline handles
    #[error("Unsupported media type: {0}")]
    UnsupportedMediaType(String),

    /// Invalid configuration value or configuration file
    #[error("Configuration error: {0}")]
    Config(String),

    /// The caller cancelled the extraction
    #[error("Extraction cancelled")]
    Cancelled,

    /// Every extraction strategy failed
    #[error(transparent)]
    Extraction(#[from] TerminalExtractionError),
}

impl From<lopdf::Error> for Error {
    fn from(e: lopdf::Error) -> Self {
        Error::Pdf(e.to_string())
    }
}

impl From<image::ImageError> for Error {
    fn from(e: image::ImageError) -> Self {
        Error::Image(e.to_string())
    }
}

impl From<zip::result::ZipError> for Error {
    fn from(e: zip::result::ZipError) -> Self {
        Error::Docx(e.to_string())
    }
}

impl From<quick_xml::Error> for Error {
    fn from(e: quick_xml::Error) -> Self {
        Error::Docx(e.to_string())
    }
}

/// Why a single strategy produced no usable result.
#[derive(Debug, Clone, PartialEq, serde::Serialize)]
#[serde(tag = "kind", content = "detail", rename_all = "snake_case")]
pub enum FailureReason {
    /// The strategy's engine is not available in this deployment
    Unavailable(String),
    /// The strategy returned an error
    Failed(String),
    /// The strategy panicked (typically a third-party decoder on malformed input)
    Panicked(String),
    /// The strategy succeeded but its output scored zero
    Unusable,
}

impl fmt::Display for FailureReason {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            FailureReason::Unavailable(msg) => write!(f, "unavailable: {}", msg),
            FailureReason::Failed(msg) => write!(f, "failed: {}", msg),
            FailureReason::Panicked(msg) => write!(f, "panicked: {}", msg),
            FailureReason::Unusable => write!(f, "no usable text"),
        }
    }
}

/// A strategy-level failure, absorbed by the orchestrator.
#[derive(Debug, Clone, PartialEq, serde::Serialize)]
pub struct StrategyFailure {
    /// Name of the strategy that failed
    pub method: String,
    /// Why it failed
    pub reason: FailureReason,
}

impl StrategyFailure {
    /// Create a new strategy failure.
    pub fn new(method: impl Into<String>, reason: FailureReason) -> Self {
        Self {
            method: method.into(),
            reason,
        }
    }
}

impl fmt::Display for StrategyFailure {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "{}: {}", self.method, self.reason)
    }
}

/// Raised when no strategy produced a usable result.
///
/// Carries one [`StrategyFailure`] per attempted (or skipped) strategy.
#[derive(Debug, Clone, PartialEq, thiserror::Error)]
#[error("all extraction methods failed: {}", format_failures(.failures))]
pub struct TerminalExtractionError {
    /// Per-strategy failures, in the order the strategies were considered
    pub failures: Vec<StrategyFailure>,
}

fn format_failures(failures: &[StrategyFailure]) -> String {
    if failures.is_empty() {
        return "no strategy was attempted".to_string();
    }
    failures
        .iter()
        .map(|f| f.to_string())
        .collect::<Vec<_>>()
        .join("; ")
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_error_display() {
        let err = Error::Pdf("broken xref".to_string());
        assert_eq!(err.to_string(), "PDF error: broken xref");

        let err = Error::UnsupportedMediaType("image/gif".to_string());
        assert_eq!(err.to_string(), "Unsupported media type: image/gif");
    }

    #[test]
    fn test_io_error_conversion() {
        let io_err = std::io::Error::new(std::io::ErrorKind::NotFound, "missing");
        let err: Error = io_err.into();
        assert!(matches!(err, Error::Io(_)));
    }

    #[test]
    fn test_terminal_error_lists_every_failure() {
        let err = TerminalExtractionError {
            failures: vec![
                StrategyFailure::new("embedded_text", FailureReason::Failed("bad".into())),
                StrategyFailure::new("layout_aware", FailureReason::Unusable),
                StrategyFailure::new("ocr", FailureReason::Unavailable("no tesseract".into())),
            ],
        };
        let msg = err.to_string();
        assert!(msg.starts_with("all extraction methods failed"));
        assert!(msg.contains("embedded_text: failed: bad"));
        assert!(msg.contains("layout_aware: no usable text"));
        assert!(msg.contains("ocr: unavailable: no tesseract"));
    }

    #[test]
    fn test_terminal_error_wraps_into_error() {
        let err: Error = TerminalExtractionError { failures: vec![] }.into();
        assert!(matches!(err, Error::Extraction(_)));
        assert!(err.to_string().contains("no strategy was attempted"));
    }
}
