// Allow some clippy lints that are too pedantic for this project
#![allow(clippy::too_many_arguments)]
#![allow(clippy::needless_range_loop)]
#![allow(clippy::enum_variant_names)]
#![allow(clippy::should_implement_trait)]
#![allow(clippy::match_like_matches_macro)]
// Allow unused for tests
#![cfg_attr(test, allow(dead_code))]
#![cfg_attr(test, allow(unused_variables))]

//! # docsift
//!
//! Text extraction for uploaded documents, tuned for Persian (right-to-left)
//! contracts and reports.
//!
//! ## Core Features
//!
//! - **Multiple strategies**: embedded PDF text, layout-aware glyph analysis
//!   and optical recognition, scored against each other
//! - **Escalation**: OCR runs only when digital text is missing, garbled or
//!   below the acceptable score
//! - **Persian repair**: dictionary-driven fixes for known extraction
//!   defects, presentation-form folding and visual-to-logical reordering
//! - **Normalization**: unified Arabic/Persian letters and digits, invisible
//!   characters and whitespace
//! - **Other formats**: plain text, DOCX and JSON
//! - **Page limits**: process only the leading pages of long PDFs, with a
//!   warning in the result
//!
//! ## Architecture
//! - [`extractors`]: one [`Extractor`](extractors::Extractor) per strategy
//! - [`pipeline`]: scoring, escalation and winner selection
//! - [`ocr`]: pluggable rasterizer and recognizer behind the optical strategy
//! - [`text`]: repair, normalization, garble detection and shaping
//!
//! ## Quick Start
//!
//! ```no_run
//! use docsift::{DocumentIngestor, PageLimit, PipelineConfig, SourceDocument};
//!
//! # fn main() -> docsift::Result<()> {
//! let ingestor = DocumentIngestor::new(PipelineConfig::default());
//! let document = SourceDocument::from_path("contract.pdf")?;
//! let outcome = ingestor.ingest(&document, PageLimit::at_most(20))?;
//!
//! println!("{} ({}, score {:.0})", outcome.method, outcome.quality, outcome.score);
//! for warning in &outcome.warnings {
//!     eprintln!("warning: {}", warning);
//! }
//! println!("{}", outcome.text());
//! # Ok(())
//! # }
//! ```

#![warn(missing_docs)]

// Error handling
pub mod error;

// Configuration
pub mod config;

// Inputs
pub mod document;
pub mod formats;

// PDF object access
pub mod fonts;
pub mod pdf;

// Layout analysis
pub mod geometry;
pub mod layout;

// Text processing
pub mod text;

// Extraction strategies
pub mod extractors;
pub mod ocr;

// Orchestration
pub mod ingest;
pub mod pipeline;

// Re-exports
pub use config::PipelineConfig;
pub use document::{MediaType, PageLimit, SourceDocument};
pub use error::{Error, FailureReason, Result, StrategyFailure, TerminalExtractionError};
pub use extractors::{ExtractionMethod, ExtractionResult, Extractor, TextBlock};
pub use ingest::{extract_document, DocumentIngestor};
pub use pipeline::{
    CancellationToken, DocumentExtraction, ExtractionOrchestrator, ExtractionWarning, QualityLabel,
};

// Internal utilities
pub(crate) mod utils {
    //! Internal utility functions for the library.

    use std::cmp::Ordering;

    /// Compare two floats for sorting; NaN sorts after every number.
    #[inline]
    pub fn safe_float_cmp(a: f32, b: f32) -> Ordering {
        match (a.is_nan(), b.is_nan()) {
            (true, true) => Ordering::Equal,
            (true, false) => Ordering::Greater,
            (false, true) => Ordering::Less,
            (false, false) => a.partial_cmp(&b).unwrap_or(Ordering::Equal),
        }
    }

    #[cfg(test)]
    mod tests {
        use super::*;

        #[test]
        fn test_safe_float_cmp_normal() {
            assert_eq!(safe_float_cmp(1.0, 2.0), Ordering::Less);
            assert_eq!(safe_float_cmp(2.0, 1.0), Ordering::Greater);
            assert_eq!(safe_float_cmp(-0.0, 0.0), Ordering::Equal);
        }

        #[test]
        fn test_safe_float_cmp_nan() {
            assert_eq!(safe_float_cmp(f32::NAN, f32::NAN), Ordering::Equal);
            assert_eq!(safe_float_cmp(f32::NAN, 1.0), Ordering::Greater);
            assert_eq!(safe_float_cmp(1.0, f32::NAN), Ordering::Less);

            let mut values = vec![3.0, f32::NAN, 1.0, 2.0];
            values.sort_by(|a, b| safe_float_cmp(*a, *b));
            assert_eq!(&values[..3], &[1.0, 2.0, 3.0]);
            assert!(values[3].is_nan());
        }
    }
}

// Version info
/// Library version
pub const VERSION: &str = env!("CARGO_PKG_VERSION");

/// Library name
pub const NAME: &str = env!("CARGO_PKG_NAME");
