//! Unicode and whitespace canonicalization for extracted text.
//!
//! [`TextNormalizer::normalize`] runs, in order:
//!
//! 1. canonical composition (NFC),
//! 2. script unification (Arabic letter variants and Arabic-Indic digits to
//!    their Persian forms) and removal of control characters,
//! 3. whitespace unification (invisible joiners and exotic spaces become a
//!    plain space, runs of spaces collapse, runs of three or more newlines
//!    become a paragraph break),
//! 4. trimming.
//!
//! Steps 1 and 2 repeat until the text stops changing, since removing a
//! character can leave a base letter next to a combining mark that NFC then
//! composes into a letter step 2 maps again. This makes `normalize`
//! idempotent on arbitrary input.

use crate::config::{NormalizerConfig, ZwnjPolicy};
use crate::text::script::{to_persian_digit, ZWNJ};
use lazy_static::lazy_static;
use regex::Regex;
use unicode_normalization::UnicodeNormalization;

lazy_static! {
    static ref RE_CONTROL: Regex = Regex::new(r"[\x00-\x08\x0B\x0C\x0E-\x1F\x7F-\x9F]").unwrap();
    static ref RE_MULTI_SPACE: Regex = Regex::new(r" {2,}").unwrap();
    static ref RE_SPACE_AROUND_NEWLINE: Regex = Regex::new(r" *\n *").unwrap();
    static ref RE_MULTI_NEWLINE: Regex = Regex::new(r"\n{3,}").unwrap();
}

/// Map an Arabic-specific letter to its Persian counterpart.
///
/// `Some(None)` means the character is dropped; `None` means it is kept as is.
fn unify_letter(c: char) -> Option<Option<char>> {
    match c {
        'ك' => Some(Some('ک')),
        'ي' | 'ى' => Some(Some('ی')),
        'ة' => Some(Some('ه')),
        'ؤ' => Some(Some('و')),
        'إ' | 'أ' | 'ٱ' => Some(Some('ا')),
        'ء' => Some(None),
        _ => None,
    }
}

/// Characters that render as nothing (or as a plain gap) and should become a space.
fn is_space_like(c: char, zwnj: ZwnjPolicy) -> bool {
    match c {
        ZWNJ => zwnj == ZwnjPolicy::ToSpace,
        '\u{200B}' | '\u{200D}' | '\u{2060}' | '\u{FEFF}' => true,
        '\u{00A0}' | '\u{2000}'..='\u{200A}' | '\u{202F}' | '\u{205F}' | '\u{3000}' => true,
        '\t' => true,
        _ => false,
    }
}

/// Canonicalizes extracted text. Pure and total.
#[derive(Debug, Clone, Default)]
pub struct TextNormalizer {
    config: NormalizerConfig,
}

impl TextNormalizer {
    /// Create a normalizer with default options.
    pub fn new() -> Self {
        Self::default()
    }

    /// Create a normalizer with explicit options.
    pub fn with_config(config: NormalizerConfig) -> Self {
        Self { config }
    }

    /// The active options.
    pub fn config(&self) -> &NormalizerConfig {
        &self.config
    }

    /// Normalize `text`. Returns an empty string for empty input.
    ///
    /// # Examples
    ///
    /// ```
    /// use docsift::text::TextNormalizer;
    ///
    /// let normalizer = TextNormalizer::new();
    /// assert_eq!(normalizer.normalize("  كتاب   علي\u{200B}٣  "), "کتاب علی ۳");
    /// assert_eq!(normalizer.normalize("a\n\n\n\nb"), "a\n\nb");
    /// assert_eq!(normalizer.normalize(""), "");
    /// ```
    pub fn normalize(&self, text: &str) -> String {
        if text.is_empty() {
            return String::new();
        }

        let mut current = self.canonicalize_once(text);
        loop {
            let next = self.canonicalize_once(&current);
            if next == current {
                break;
            }
            current = next;
        }

        self.unify_whitespace(&current)
    }

    /// One round of NFC, script unification and control-character removal.
    fn canonicalize_once(&self, text: &str) -> String {
        let composed: String = text.nfc().collect();
        let mut out = String::with_capacity(composed.len());
        for c in composed.chars() {
            if let Some(mapped) = unify_letter(c) {
                if let Some(m) = mapped {
                    out.push(m);
                }
                continue;
            }
            if self.config.persian_digits {
                if let Some(d) = to_persian_digit(c) {
                    out.push(d);
                    continue;
                }
            }
            out.push(c);
        }
        RE_CONTROL.replace_all(&out, "").into_owned()
    }

    fn unify_whitespace(&self, text: &str) -> String {
        let unified = text.replace("\r\n", "\n");
        let mut spaced = String::with_capacity(unified.len());
        for c in unified.chars() {
            match c {
                '\r' | '\u{2028}' | '\u{2029}' => spaced.push('\n'),
                c if is_space_like(c, self.config.zwnj) => spaced.push(' '),
                c => spaced.push(c),
            }
        }

        let collapsed = RE_MULTI_SPACE.replace_all(&spaced, " ");
        let tight = RE_SPACE_AROUND_NEWLINE.replace_all(&collapsed, "\n");
        let paragraphs = RE_MULTI_NEWLINE.replace_all(&tight, "\n\n");
        paragraphs.trim().to_string()
    }
}

/// Normalize with default options.
pub fn normalize(text: &str) -> String {
    TextNormalizer::new().normalize(text)
}

#[cfg(test)]
mod tests {
    use super::*;
    use proptest::prelude::*;

    #[test]
    fn test_empty_and_whitespace_only() {
        assert_eq!(normalize(""), "");
        assert_eq!(normalize("   \n\n  "), "");
        assert_eq!(normalize("\u{200B}\u{200C}\u{200D}\u{FEFF}"), "");
    }

    #[test]
    fn test_arabic_letters_unified() {
        assert_eq!(normalize("كيك"), "کیک");
        assert_eq!(normalize("مدرسة"), "مدرسه");
        assert_eq!(normalize("إيران"), "ایران");
        assert_eq!(normalize("مسؤول"), "مسوول");
        assert_eq!(normalize("شيء"), "شی");
    }

    #[test]
    fn test_digits_unified() {
        assert_eq!(normalize("٠١٢٣٤٥٦٧٨٩"), "۰۱۲۳۴۵۶۷۸۹");
        assert_eq!(normalize("123"), "123");

        let keep = TextNormalizer::with_config(NormalizerConfig {
            persian_digits: false,
            ..NormalizerConfig::default()
        });
        assert_eq!(keep.normalize("٣"), "٣");
    }

    #[test]
    fn test_nfc_composition() {
        // alef + hamza above composes to alef-with-hamza, which then unifies to alef
        assert_eq!(normalize("\u{0627}\u{0654}"), "ا");
        // latin e + combining acute
        assert_eq!(normalize("e\u{0301}"), "\u{00E9}");
    }

    #[test]
    fn test_control_chars_removed() {
        assert_eq!(normalize("a\u{0001}b\u{007F}c\u{0085}d"), "abcd");
        assert_eq!(normalize("line\r\nnext\rlast"), "line\nnext\nlast");
    }

    #[test]
    fn test_whitespace_collapsing() {
        assert_eq!(normalize("a   b\t\tc"), "a b c");
        assert_eq!(normalize("a \n b"), "a\nb");
        assert_eq!(normalize("a\n \n \n \nb"), "a\n\nb");
        assert_eq!(normalize("a\u{00A0}b"), "a b");
    }

    #[test]
    fn test_zwnj_policy() {
        assert_eq!(normalize("می\u{200C}روم"), "می روم");
        let keep = TextNormalizer::with_config(NormalizerConfig::default().with_zwnj(ZwnjPolicy::Keep));
        assert_eq!(keep.normalize("می\u{200C}روم"), "می\u{200C}روم");
    }

    #[test]
    fn test_removal_exposes_composition() {
        // Removing the control char puts alef next to hamza-above on the second round.
        let once = normalize("\u{0627}\u{0001}\u{0654}");
        assert_eq!(once, "ا");
        assert_eq!(normalize(&once), once);
    }

    proptest! {
        #[test]
        fn prop_normalize_is_idempotent(s in "\\PC*") {
            let once = normalize(&s);
            prop_assert_eq!(normalize(&once), once);
        }

        #[test]
        fn prop_normalize_is_idempotent_on_persian_mix(
            s in "[\\x{0600}-\\x{06FF}\\x{200B}-\\x{200D}\\x{FEFF} \\n\\t\\r\\x00-\\x1Fa-z0-9]{0,64}"
        ) {
            let once = normalize(&s);
            prop_assert_eq!(normalize(&once), once);
        }

        #[test]
        fn prop_normalize_has_no_edge_whitespace(s in "\\PC*") {
            let out = normalize(&s);
            prop_assert_eq!(out.trim(), out.as_str());
            prop_assert!(!out.contains("  "));
            prop_assert!(!out.contains("\n\n\n"));
        }
    }
}
