//! Detection of corrupted digital extraction output.
//!
//! Two defects are common when a PDF's fonts lack a usable Unicode mapping:
//! words shattered into one- and two-letter fragments, and Arabic
//! presentation-form glyphs leaking through in place of logical letters.
//! Either alone marks the text as garbled.

use crate::config::DetectorConfig;
use crate::text::script::{is_arabic_script, is_persian_letter, is_presentation_form};

/// Classifies text as plausible prose or garbled extraction output.
#[derive(Debug, Clone, Default)]
pub struct CorruptionDetector {
    config: DetectorConfig,
}

/// Per-text statistics the decision is based on.
#[derive(Debug, Clone, Copy, PartialEq, Default)]
pub struct GarbleStats {
    /// Whitespace-separated tokens containing Persian letters
    pub script_tokens: usize,
    /// Script tokens with at most `short_token_len` letters
    pub short_tokens: usize,
    /// Longest run of consecutive short script tokens
    pub longest_short_run: usize,
    /// Longest run of short tokens holding at least two isolated letters
    pub longest_fragment_run: usize,
    /// Presentation-form code points
    pub presentation_forms: usize,
}

impl GarbleStats {
    fn close_run(&mut self, run: usize, isolated: usize) {
        self.longest_short_run = self.longest_short_run.max(run);
        if isolated >= 2 {
            self.longest_fragment_run = self.longest_fragment_run.max(run);
        }
    }

    /// Fraction of script tokens that are short.
    pub fn short_ratio(&self) -> f64 {
        if self.script_tokens == 0 {
            0.0
        } else {
            self.short_tokens as f64 / self.script_tokens as f64
        }
    }
}

impl CorruptionDetector {
    /// Create a detector with default tuning.
    pub fn new() -> Self {
        Self::default()
    }

    /// Create a detector with explicit tuning.
    pub fn with_config(config: DetectorConfig) -> Self {
        Self { config }
    }

    /// Gather the token statistics for `text`.
    pub fn stats(&self, text: &str) -> GarbleStats {
        let mut stats = GarbleStats::default();
        let mut run = 0usize;
        let mut isolated_in_run = 0usize;

        for c in text.chars() {
            if is_presentation_form(c) {
                stats.presentation_forms += 1;
            }
        }

        for token in text.split_whitespace() {
            let letters = token.chars().filter(|&c| is_persian_letter(c)).count();
            if letters == 0 {
                // Digits and punctuation neither extend nor break a run of fragments.
                if token.chars().any(|c| c.is_alphanumeric() && !is_arabic_script(c)) {
                    stats.close_run(run, isolated_in_run);
                    run = 0;
                    isolated_in_run = 0;
                }
                continue;
            }
            stats.script_tokens += 1;
            if letters <= self.config.short_token_len {
                stats.short_tokens += 1;
                run += 1;
                // "و" is the one legitimate single-letter word.
                if letters == 1 && token.trim_matches(|c: char| !is_persian_letter(c)) != "و" {
                    isolated_in_run += 1;
                }
            } else {
                stats.close_run(run, isolated_in_run);
                run = 0;
                isolated_in_run = 0;
            }
        }
        stats.close_run(run, isolated_in_run);

        stats
    }

    /// Whether `text` looks like corrupted extraction output.
    ///
    /// # Examples
    ///
    /// ```
    /// use docsift::text::CorruptionDetector;
    ///
    /// let detector = CorruptionDetector::new();
    /// assert!(!detector.looks_garbled("این قرارداد میان دو شرکت منعقد شده است"));
    /// assert!(detector.looks_garbled("ق ر ا ر د ا د"));
    /// assert!(detector.looks_garbled("\u{FEE3}\u{FEA0}\u{FEE0}\u{FEB4}"));
    /// ```
    pub fn looks_garbled(&self, text: &str) -> bool {
        let stats = self.stats(text);
        let verdict = self.judge(&stats);
        if verdict {
            log::debug!(
                "Text looks garbled: {} script tokens, {} short, run {}, {} presentation forms",
                stats.script_tokens,
                stats.short_tokens,
                stats.longest_fragment_run,
                stats.presentation_forms
            );
        }
        verdict
    }

    fn judge(&self, stats: &GarbleStats) -> bool {
        if stats.presentation_forms > 0 {
            return true;
        }
        if stats.longest_fragment_run >= self.config.short_run
            || stats.longest_short_run >= 2 * self.config.short_run
        {
            return true;
        }
        // Short texts: every script token is a fragment.
        if stats.script_tokens >= 3 && stats.short_tokens == stats.script_tokens {
            return true;
        }
        stats.script_tokens >= self.config.ratio_min_tokens
            && stats.short_ratio() > self.config.short_ratio
    }
}

/// Check with default tuning.
pub fn looks_garbled(text: &str) -> bool {
    CorruptionDetector::new().looks_garbled(text)
}

#[cfg(test)]
mod tests {
    use super::*;

    const PROSE: &str = "این قرارداد بین شرکت سهامی خاص و مدیر عامل آن در تاریخ ۱۴۰۲ منعقد گردید \
                         و طرفین متعهد به اجرای کامل مفاد آن هستند.";

    #[test]
    fn test_prose_is_not_garbled() {
        assert!(!looks_garbled(PROSE));
        assert!(!looks_garbled("The quick brown fox jumps over the lazy dog."));
        assert!(!looks_garbled(""));
    }

    #[test]
    fn test_prose_with_common_short_words_is_not_garbled() {
        // "و", "در", "به", "از" are legitimately short; four in a row is still prose.
        assert!(!looks_garbled("من و تو در خانه کتاب خواندیم و سپس به دیدن دوستان رفتیم"));
    }

    #[test]
    fn test_shattered_words_are_garbled() {
        assert!(looks_garbled("ق ر ا ر د ا د"));
        assert!(looks_garbled("قر ار دا د شر کت"));
        assert!(looks_garbled("مطابق ما ده ی ک از ای ن قرارداد"));
    }

    #[test]
    fn test_short_text_all_fragments() {
        assert!(looks_garbled("صی قی هر"));
        // Two short tokens alone are not enough evidence.
        assert!(!looks_garbled("از او"));
    }

    #[test]
    fn test_presentation_forms_alone_suffice() {
        let text = format!("{} \u{FB91}", PROSE);
        assert!(looks_garbled(&text));
    }

    #[test]
    fn test_latin_tokens_break_runs() {
        let detector = CorruptionDetector::new();
        let stats = detector.stats("ب ه PDF د ر");
        assert_eq!(stats.longest_short_run, 2);
        assert_eq!(stats.longest_fragment_run, 2);
        assert_eq!(stats.script_tokens, 4);
    }

    #[test]
    fn test_stats_ratio() {
        let stats = CorruptionDetector::new().stats("کتاب ها را");
        assert_eq!(stats.script_tokens, 3);
        assert_eq!(stats.short_tokens, 2);
        assert!((stats.short_ratio() - 2.0 / 3.0).abs() < 1e-9);
    }
}
