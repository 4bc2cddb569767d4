//! Result scoring and quality labels.

use crate::config::{QualityThresholds, ScoringConfig};
use crate::extractors::ExtractionResult;
use serde::{Deserialize, Serialize};
use std::fmt;

/// Coarse quality bucket derived from the character count of a result.
#[derive(Debug, Clone, Copy, PartialEq, Eq, PartialOrd, Ord, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum QualityLabel {
    /// Below the fair threshold
    Poor,
    /// At least `fair_chars`
    Fair,
    /// At least `good_chars`
    Good,
    /// At least `excellent_chars`
    Excellent,
}

impl QualityLabel {
    /// Bucket a character count.
    pub fn from_chars(chars: usize, thresholds: &QualityThresholds) -> Self {
        if chars >= thresholds.excellent_chars {
            QualityLabel::Excellent
        } else if chars >= thresholds.good_chars {
            QualityLabel::Good
        } else if chars >= thresholds.fair_chars {
            QualityLabel::Fair
        } else {
            QualityLabel::Poor
        }
    }

    /// Lowercase name.
    pub fn as_str(&self) -> &'static str {
        match self {
            QualityLabel::Poor => "poor",
            QualityLabel::Fair => "fair",
            QualityLabel::Good => "good",
            QualityLabel::Excellent => "excellent",
        }
    }
}

impl fmt::Display for QualityLabel {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.as_str())
    }
}

/// Ranks extraction results against each other.
///
/// A result scores `char_weight × chars + word_weight × words`, or zero
/// when it failed or its text is shorter than `min_content_chars`. Optical
/// results are multiplied by `ocr_boost` so that a successful recognition
/// of a scanned page outranks a weak digital extraction of the same page.
#[derive(Debug, Clone, Default)]
pub struct QualityScorer {
    config: ScoringConfig,
}

impl QualityScorer {
    /// Create a scorer.
    pub fn new(config: ScoringConfig) -> Self {
        Self { config }
    }

    /// Scoring parameters.
    pub fn config(&self) -> &ScoringConfig {
        &self.config
    }

    /// Score before any method-specific boost.
    pub fn base_score(&self, result: &ExtractionResult) -> f64 {
        if !result.is_success() {
            return 0.0;
        }
        let chars = result.char_count();
        if chars < self.config.min_content_chars {
            return 0.0;
        }
        let words = result.word_count();
        (self.config.char_weight * chars as f64 + self.config.word_weight * words as f64).max(0.0)
    }

    /// Comparable score, including the optical boost.
    ///
    /// # Examples
    ///
    /// ```
    /// use docsift::extractors::{ExtractionMethod, ExtractionResult, TextBlock};
    /// use docsift::pipeline::QualityScorer;
    ///
    /// let short = ExtractionResult::from_blocks(
    ///     ExtractionMethod::EmbeddedText,
    ///     vec![TextBlock::new(1, "too short to count", ExtractionMethod::EmbeddedText)],
    ///     1,
    ///     1,
    /// );
    /// assert_eq!(QualityScorer::default().score(&short), 0.0);
    /// ```
    pub fn score(&self, result: &ExtractionResult) -> f64 {
        let base = self.base_score(result);
        if result.method().is_optical() {
            base * self.config.ocr_boost
        } else {
            base
        }
    }

    /// Whether a score clears the acceptable floor.
    pub fn is_acceptable(&self, score: f64) -> bool {
        score > 0.0 && score >= self.config.acceptable_score
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::extractors::{ExtractionMethod, TextBlock};

    fn result(method: ExtractionMethod, text: &str) -> ExtractionResult {
        ExtractionResult::from_blocks(method, vec![TextBlock::new(1, text, method)], 1, 1)
    }

    #[test]
    fn test_short_text_scores_zero_regardless_of_words() {
        let scorer = QualityScorer::default();
        // 49 characters, 25 words
        let text = "a b c d e f g h i j k l m n o p q r s t u v w x y";
        assert_eq!(text.chars().count(), 49);
        assert_eq!(scorer.score(&result(ExtractionMethod::EmbeddedText, text)), 0.0);
    }

    #[test]
    fn test_words_weigh_more_than_chars() {
        let scorer = QualityScorer::default();
        let text = "word ".repeat(20);
        let text = text.trim();
        let r = result(ExtractionMethod::LayoutAware, text);
        assert_eq!(scorer.score(&r), text.chars().count() as f64 + 2.0 * 20.0);
    }

    #[test]
    fn test_optical_boost() {
        let scorer = QualityScorer::default();
        let text = "word ".repeat(20);
        let digital = scorer.score(&result(ExtractionMethod::EmbeddedText, text.trim()));
        let optical = scorer.score(&result(ExtractionMethod::OpticalRecognition, text.trim()));
        assert_eq!(optical, digital * 1.5);
        assert_eq!(scorer.base_score(&result(ExtractionMethod::OpticalRecognition, text.trim())), digital);
    }

    #[test]
    fn test_failed_result_scores_zero() {
        let failed = ExtractionResult::failure(ExtractionMethod::EmbeddedText, "boom");
        assert_eq!(QualityScorer::default().score(&failed), 0.0);
    }

    #[test]
    fn test_acceptable_floor() {
        let scorer = QualityScorer::default();
        assert!(!scorer.is_acceptable(0.0));
        assert!(!scorer.is_acceptable(199.9));
        assert!(scorer.is_acceptable(200.0));
    }

    #[test]
    fn test_quality_buckets() {
        let t = QualityThresholds::default();
        assert_eq!(QualityLabel::from_chars(1500, &t), QualityLabel::Excellent);
        assert_eq!(QualityLabel::from_chars(1000, &t), QualityLabel::Excellent);
        assert_eq!(QualityLabel::from_chars(500, &t), QualityLabel::Good);
        assert_eq!(QualityLabel::from_chars(100, &t), QualityLabel::Fair);
        assert_eq!(QualityLabel::from_chars(99, &t), QualityLabel::Poor);
        assert_eq!(QualityLabel::Good.to_string(), "good");
    }
}
