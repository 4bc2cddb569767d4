//! Configuration for the extraction pipeline.
//!
//! Every threshold the pipeline uses lives here as an explicit value. Each
//! section has a `Default` matching the tuned production values, builder-style
//! `with_*` setters, and serde support so a deployment can override a subset
//! of values from a JSON file:
//!
//! ```
//! use docsift::config::PipelineConfig;
//!
//! let config = PipelineConfig::from_json_str(r#"{"scoring": {"acceptable_score": 350.0}}"#).unwrap();
//! assert_eq!(config.scoring.acceptable_score, 350.0);
//! assert_eq!(config.scoring.min_content_chars, 50);
//! ```

use crate::error::{Error, Result};
use serde::{Deserialize, Serialize};
use std::path::Path;

/// Top-level pipeline configuration.
#[derive(Debug, Clone, Default, PartialEq, Serialize, Deserialize)]
#[serde(default)]
pub struct PipelineConfig {
    /// Quality scoring weights and escalation floor
    pub scoring: ScoringConfig,
    /// Character-count buckets for the coarse quality label
    pub quality: QualityThresholds,
    /// Block filtering and strategy scheduling
    pub extraction: ExtractionConfig,
    /// Geometric tolerances for the layout-aware strategy
    pub layout: LayoutConfig,
    /// Corruption detector tuning
    pub detector: DetectorConfig,
    /// Text normalizer options
    pub normalizer: NormalizerConfig,
    /// Optical recognition options
    pub ocr: OcrConfig,
}

impl PipelineConfig {
    /// Create a configuration with default values.
    pub fn new() -> Self {
        Self::default()
    }

    /// Parse a (possibly partial) JSON configuration. Missing keys keep their defaults.
    pub fn from_json_str(json: &str) -> Result<Self> {
        let config: PipelineConfig = serde_json::from_str(json)?;
        config.validate()?;
        Ok(config)
    }

    /// Load a JSON configuration file.
    pub fn from_json_path(path: impl AsRef<Path>) -> Result<Self> {
        let content = std::fs::read_to_string(path.as_ref())?;
        Self::from_json_str(&content)
    }

    /// Check that the values are internally consistent.
    pub fn validate(&self) -> Result<()> {
        let s = &self.scoring;
        let weights = [s.char_weight, s.word_weight, s.ocr_boost];
        if weights.iter().any(|w| !w.is_finite() || *w < 0.0) {
            return Err(Error::Config(
                "scoring weights must be finite and non-negative".to_string(),
            ));
        }
        if !s.acceptable_score.is_finite() || s.acceptable_score < 0.0 {
            return Err(Error::Config(format!(
                "acceptable_score must be finite and non-negative, got {}",
                s.acceptable_score
            )));
        }
        let q = &self.quality;
        if !(q.excellent_chars >= q.good_chars && q.good_chars >= q.fair_chars) {
            return Err(Error::Config(format!(
                "quality buckets must be descending, got excellent={} good={} fair={}",
                q.excellent_chars, q.good_chars, q.fair_chars
            )));
        }
        if !self.ocr.scale.is_finite() || self.ocr.scale <= 0.0 {
            return Err(Error::Config(format!("ocr.scale must be positive, got {}", self.ocr.scale)));
        }
        let l = &self.layout;
        let ratios = [
            l.baseline_tolerance,
            l.word_gap_ratio,
            l.cell_gap_ratio,
            l.paragraph_gap_ratio,
            l.min_gutter_width,
        ];
        if ratios.iter().any(|r| !r.is_finite()) {
            return Err(Error::Config("layout thresholds must be finite".to_string()));
        }
        Ok(())
    }

    /// Replace the scoring section.
    pub fn with_scoring(mut self, scoring: ScoringConfig) -> Self {
        self.scoring = scoring;
        self
    }

    /// Replace the extraction section.
    pub fn with_extraction(mut self, extraction: ExtractionConfig) -> Self {
        self.extraction = extraction;
        self
    }

    /// Replace the layout section.
    pub fn with_layout(mut self, layout: LayoutConfig) -> Self {
        self.layout = layout;
        self
    }

    /// Replace the normalizer section.
    pub fn with_normalizer(mut self, normalizer: NormalizerConfig) -> Self {
        self.normalizer = normalizer;
        self
    }

    /// Replace the OCR section.
    pub fn with_ocr(mut self, ocr: OcrConfig) -> Self {
        self.ocr = ocr;
        self
    }
}

/// Weights used by the quality scorer.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(default)]
pub struct ScoringConfig {
    /// Results with fewer characters than this score zero
    pub min_content_chars: usize,
    /// Weight per character
    pub char_weight: f64,
    /// Weight per word (higher than `char_weight`)
    pub word_weight: f64,
    /// Multiplier applied to optical-recognition scores
    pub ocr_boost: f64,
    /// Best digital score below which OCR is attempted
    pub acceptable_score: f64,
}

impl Default for ScoringConfig {
    fn default() -> Self {
        Self {
            min_content_chars: 50,
            char_weight: 1.0,
            word_weight: 2.0,
            ocr_boost: 1.5,
            acceptable_score: 200.0,
        }
    }
}

impl ScoringConfig {
    /// Set the minimum content length.
    pub fn with_min_content_chars(mut self, chars: usize) -> Self {
        self.min_content_chars = chars;
        self
    }

    /// Set the per-character and per-word weights.
    pub fn with_weights(mut self, char_weight: f64, word_weight: f64) -> Self {
        self.char_weight = char_weight;
        self.word_weight = word_weight;
        self
    }

    /// Set the OCR boost multiplier.
    pub fn with_ocr_boost(mut self, boost: f64) -> Self {
        self.ocr_boost = boost;
        self
    }

    /// Set the escalation floor.
    pub fn with_acceptable_score(mut self, score: f64) -> Self {
        self.acceptable_score = score;
        self
    }
}

/// Total-character buckets for [`QualityLabel`](crate::pipeline::QualityLabel).
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(default)]
pub struct QualityThresholds {
    /// At or above: excellent
    pub excellent_chars: usize,
    /// At or above: good
    pub good_chars: usize,
    /// At or above: fair; below: poor
    pub fair_chars: usize,
}

impl Default for QualityThresholds {
    fn default() -> Self {
        Self {
            excellent_chars: 1000,
            good_chars: 500,
            fair_chars: 100,
        }
    }
}

/// Block filtering and strategy scheduling.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(default)]
pub struct ExtractionConfig {
    /// Blocks shorter than this (after repair and normalization) are dropped
    pub min_block_chars: usize,
    /// Layout text for a page shorter than this falls back to embedded text
    pub layout_fallback_chars: usize,
    /// Run the two digital strategies on separate threads
    pub parallel_digital: bool,
}

impl Default for ExtractionConfig {
    fn default() -> Self {
        Self {
            min_block_chars: 10,
            layout_fallback_chars: 50,
            parallel_digital: false,
        }
    }
}

impl ExtractionConfig {
    /// Set the minimum block length.
    pub fn with_min_block_chars(mut self, chars: usize) -> Self {
        self.min_block_chars = chars;
        self
    }

    /// Run digital strategies concurrently.
    pub fn with_parallel_digital(mut self, enable: bool) -> Self {
        self.parallel_digital = enable;
        self
    }
}

/// Geometric tolerances for glyph clustering, as fractions of the font size.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(default)]
pub struct LayoutConfig {
    /// Glyphs whose baselines differ by less than this share a line
    pub baseline_tolerance: f32,
    /// Horizontal gap that inserts a word space
    pub word_gap_ratio: f32,
    /// Horizontal gap that separates table cells
    pub cell_gap_ratio: f32,
    /// Vertical gap (in line heights) that starts a new paragraph
    pub paragraph_gap_ratio: f32,
    /// Minimum gutter width (points) for column detection
    pub min_gutter_width: f32,
    /// Minimum cells per row for a table
    pub min_table_columns: usize,
    /// Minimum consecutive rows for a table
    pub min_table_rows: usize,
}

impl Default for LayoutConfig {
    fn default() -> Self {
        Self {
            baseline_tolerance: 0.5,
            word_gap_ratio: 0.2,
            cell_gap_ratio: 1.5,
            paragraph_gap_ratio: 1.8,
            min_gutter_width: 18.0,
            min_table_columns: 3,
            min_table_rows: 2,
        }
    }
}

/// Tuning for the corruption detector.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(default)]
pub struct DetectorConfig {
    /// Longest token (in letters) still considered "short"
    pub short_token_len: usize,
    /// A run of this many consecutive short tokens is garbled
    pub short_run: usize,
    /// Short-token ratio above which a text is garbled
    pub short_ratio: f64,
    /// Minimum script tokens before the ratio rule applies
    pub ratio_min_tokens: usize,
}

impl Default for DetectorConfig {
    fn default() -> Self {
        Self {
            short_token_len: 2,
            short_run: 4,
            short_ratio: 0.55,
            ratio_min_tokens: 8,
        }
    }
}

/// How the normalizer treats the zero-width non-joiner (U+200C).
#[derive(Debug, Clone, Copy, PartialEq, Eq, Default, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum ZwnjPolicy {
    /// Replace with a space, like every other invisible joiner
    #[default]
    ToSpace,
    /// Keep it (preserves the repairer's prefix/suffix re-attachment)
    Keep,
}

/// Text normalizer options.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(default)]
pub struct NormalizerConfig {
    /// Zero-width non-joiner handling
    pub zwnj: ZwnjPolicy,
    /// Map Arabic-Indic digits to Persian digits
    pub persian_digits: bool,
}

impl Default for NormalizerConfig {
    fn default() -> Self {
        Self {
            zwnj: ZwnjPolicy::ToSpace,
            persian_digits: true,
        }
    }
}

impl NormalizerConfig {
    /// Set the zero-width non-joiner policy.
    pub fn with_zwnj(mut self, policy: ZwnjPolicy) -> Self {
        self.zwnj = policy;
        self
    }
}

/// Optical recognition options.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(default)]
pub struct OcrConfig {
    /// Rasterization upscale factor (1.0 = 72 dpi)
    pub scale: f32,
    /// Recognition languages, engine-specific syntax
    pub languages: String,
    /// Disable OCR even when an engine is installed
    pub enabled: bool,
}

impl Default for OcrConfig {
    fn default() -> Self {
        Self {
            scale: 2.0,
            languages: "fas+eng".to_string(),
            enabled: true,
        }
    }
}

impl OcrConfig {
    /// Set the rasterization scale.
    pub fn with_scale(mut self, scale: f32) -> Self {
        self.scale = scale;
        self
    }

    /// Enable or disable OCR.
    pub fn with_enabled(mut self, enabled: bool) -> Self {
        self.enabled = enabled;
        self
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_defaults() {
        let config = PipelineConfig::new();
        assert_eq!(config.scoring.min_content_chars, 50);
        assert_eq!(config.scoring.word_weight, 2.0);
        assert_eq!(config.scoring.acceptable_score, 200.0);
        assert_eq!(config.quality.good_chars, 500);
        assert_eq!(config.extraction.min_block_chars, 10);
        assert_eq!(config.ocr.scale, 2.0);
        assert_eq!(config.normalizer.zwnj, ZwnjPolicy::ToSpace);
        assert!(config.validate().is_ok());
    }

    #[test]
    fn test_partial_json_keeps_defaults() {
        let config = PipelineConfig::from_json_str(
            r#"{"extraction": {"parallel_digital": true}, "normalizer": {"zwnj": "keep"}}"#,
        )
        .unwrap();
        assert!(config.extraction.parallel_digital);
        assert_eq!(config.extraction.min_block_chars, 10);
        assert_eq!(config.normalizer.zwnj, ZwnjPolicy::Keep);
        assert_eq!(config.layout, LayoutConfig::default());
    }

    #[test]
    fn test_invalid_buckets_rejected() {
        let result =
            PipelineConfig::from_json_str(r#"{"quality": {"excellent_chars": 10, "good_chars": 500}}"#);
        assert!(matches!(result, Err(Error::Config(_))));
    }

    #[test]
    fn test_invalid_scale_rejected() {
        let config = PipelineConfig::new().with_ocr(OcrConfig::default().with_scale(0.0));
        assert!(config.validate().is_err());
    }

    #[test]
    fn test_non_finite_values_rejected() {
        let nan_weight = PipelineConfig::new().with_scoring(ScoringConfig::default().with_weights(f64::NAN, 2.0));
        assert!(matches!(nan_weight.validate(), Err(Error::Config(_))));

        let infinite_floor =
            PipelineConfig::new().with_scoring(ScoringConfig::default().with_acceptable_score(f64::INFINITY));
        assert!(infinite_floor.validate().is_err());

        let nan_scale = PipelineConfig::new().with_ocr(OcrConfig::default().with_scale(f32::NAN));
        assert!(nan_scale.validate().is_err());

        let mut layout = LayoutConfig::default();
        layout.word_gap_ratio = f32::NAN;
        assert!(PipelineConfig::new().with_layout(layout).validate().is_err());
    }

    #[test]
    fn test_builders() {
        let config = PipelineConfig::new()
            .with_scoring(ScoringConfig::default().with_acceptable_score(10.0))
            .with_extraction(ExtractionConfig::default().with_parallel_digital(true));
        assert_eq!(config.scoring.acceptable_score, 10.0);
        assert!(config.extraction.parallel_digital);
    }
}
