//! Recovery of logical text from shaped or visually ordered output.
//!
//! PDF generators that shape Arabic script themselves write pre-shaped
//! presentation-form glyphs and often lay them out in visual (left-to-right)
//! order. Extracting such a page yields reversed words made of presentation
//! forms. This module folds the glyphs back to logical letters and reorders
//! visual runs into logical order.

use crate::text::script::{bidi_class, is_presentation_form, BidiClass, Direction};
use unicode_normalization::UnicodeNormalization;

/// Frequent Persian function words; seeing their reversals is strong evidence
/// of visual ordering.
const COMMON_WORDS: &[&str] = &[
    "در", "به", "از", "که", "این", "را", "با", "است", "برای", "آن", "تا", "هر", "یک", "شده", "بود",
];

/// Replace every presentation-form code point by its compatibility decomposition.
///
/// # Examples
///
/// ```
/// use docsift::text::shaping::fold_presentation_forms;
///
/// // MEEM initial, SEEN medial, LAM-ALEF final
/// assert_eq!(fold_presentation_forms("\u{FEE3}\u{FEB4}\u{FEFC}"), "مسلا");
/// assert_eq!(fold_presentation_forms("plain"), "plain");
/// ```
pub fn fold_presentation_forms(text: &str) -> String {
    if !text.chars().any(is_presentation_form) {
        return text.to_string();
    }
    let mut out = String::with_capacity(text.len());
    for c in text.chars() {
        if is_presentation_form(c) {
            out.extend(std::iter::once(c).nfkc());
        } else {
            out.push(c);
        }
    }
    out
}

fn mirror(c: char) -> char {
    match c {
        '(' => ')',
        ')' => '(',
        '[' => ']',
        ']' => '[',
        '{' => '}',
        '}' => '{',
        '<' => '>',
        '>' => '<',
        '«' => '»',
        '»' => '«',
        other => other,
    }
}

fn mirror_unit(unit: &mut String) {
    let mut chars = unit.chars();
    if let (Some(c), None) = (chars.next(), chars.next()) {
        let m = mirror(c);
        if m != c {
            *unit = m.to_string();
        }
    }
}

/// Class of a multi-character unit: its first strong (or number) character.
fn unit_class(unit: &str) -> BidiClass {
    unit.chars()
        .map(bidi_class)
        .find(|c| *c != BidiClass::Neutral)
        .unwrap_or(BidiClass::Neutral)
}

/// Find maximal runs of units matching `strong`, allowing neutral units
/// between (but not around) them. Returns half-open ranges.
fn runs(classes: &[BidiClass], strong: impl Fn(BidiClass) -> bool) -> Vec<(usize, usize)> {
    let mut result = Vec::new();
    let mut i = 0;
    while i < classes.len() {
        if !strong(classes[i]) {
            i += 1;
            continue;
        }
        let start = i;
        let mut end = i + 1;
        let mut j = i + 1;
        while j < classes.len() {
            if strong(classes[j]) {
                end = j + 1;
            } else if classes[j] != BidiClass::Neutral {
                break;
            }
            j += 1;
        }
        result.push((start, end));
        i = end;
    }
    result
}

/// Reorder display-ordered units (glyphs, possibly multi-character ligatures)
/// into logical order. Units are never split.
///
/// On a right-to-left line the whole sequence is reversed, brackets are
/// mirrored, and embedded Latin words and numbers are flipped back so they
/// keep reading left to right. On a left-to-right line only the embedded
/// right-to-left runs are reversed.
pub fn visual_units_to_logical(mut units: Vec<String>, base: Direction) -> Vec<String> {
    match base {
        Direction::Rtl => {
            units.reverse();
            units.iter_mut().for_each(mirror_unit);
            let classes: Vec<BidiClass> = units.iter().map(|u| unit_class(u)).collect();
            for (start, end) in runs(&classes, |c| matches!(c, BidiClass::Ltr | BidiClass::Number)) {
                units[start..end].reverse();
                units[start..end].iter_mut().for_each(mirror_unit);
            }
        },
        Direction::Ltr => {
            let classes: Vec<BidiClass> = units.iter().map(|u| unit_class(u)).collect();
            for (start, end) in runs(&classes, |c| c == BidiClass::Rtl) {
                units[start..end].reverse();
            }
        },
    }
    units
}

/// Convert one line from visual (left-to-right display) order to logical order.
///
/// # Examples
///
/// ```
/// use docsift::text::script::Direction;
/// use docsift::text::shaping::visual_to_logical;
///
/// // "سال 1402" displayed right-to-left reads "1402 لاس" from the left edge
/// assert_eq!(visual_to_logical("1402 لاس", Direction::Rtl), "سال 1402");
/// assert_eq!(visual_to_logical("see ملاس here", Direction::Ltr), "see سلام here");
/// ```
pub fn visual_to_logical(visual: &str, base: Direction) -> String {
    let units: Vec<String> = visual.chars().map(String::from).collect();
    visual_units_to_logical(units, base).concat()
}

fn common_word_hits<'a>(words: impl Iterator<Item = &'a str>) -> (usize, usize) {
    let mut forward = 0;
    let mut reversed = 0;
    for word in words {
        if COMMON_WORDS.contains(&word) {
            forward += 1;
        }
        let flipped: String = word.chars().rev().collect();
        if COMMON_WORDS.contains(&flipped.as_str()) {
            reversed += 1;
        }
    }
    (forward, reversed)
}

/// Whether a line looks like right-to-left text stored in visual order.
pub fn looks_visually_ordered(line: &str) -> bool {
    let (forward, reversed) = common_word_hits(line.split_whitespace());
    reversed >= 2 && reversed > forward
}

/// Reorder every visually ordered line of `text` into logical order.
pub fn recover_logical_order(text: &str) -> String {
    text.lines()
        .map(|line| {
            if looks_visually_ordered(line) {
                visual_to_logical(line, Direction::Rtl)
            } else {
                line.to_string()
            }
        })
        .collect::<Vec<_>>()
        .join("\n")
}

/// Fold presentation forms, then restore logical order line by line.
pub fn reshape_extracted(text: &str) -> String {
    recover_logical_order(&fold_presentation_forms(text))
}

#[cfg(test)]
mod tests {
    use super::*;

    fn reverse(s: &str) -> String {
        s.chars().rev().collect()
    }

    #[test]
    fn test_fold_lam_alef_ligature() {
        assert_eq!(fold_presentation_forms("\u{FEFB}"), "لا");
        assert_eq!(fold_presentation_forms("ab\u{FE8D}cd"), "abاcd");
    }

    #[test]
    fn test_visual_to_logical_rtl_with_brackets() {
        let logical = "متن (نمونه) است";
        let visual = reverse(logical)
            .chars()
            .map(mirror)
            .collect::<String>();
        assert_eq!(visual_to_logical(&visual, Direction::Rtl), logical);
    }

    #[test]
    fn test_visual_to_logical_keeps_latin_runs() {
        let logical = "فایل PDF نسخه 2.5 است";
        // Display order: RTL words reversed, Latin and numbers kept LTR.
        let visual = "تسا 2.5 هخسن PDF لیاف";
        assert_eq!(visual_to_logical(visual, Direction::Rtl), logical);
    }

    #[test]
    fn test_ligature_units_stay_intact() {
        // Glyph units as they sit left to right on the page; "لا" is one ligature glyph.
        let units = vec!["م".to_string(), "لا".to_string(), "س".to_string()];
        assert_eq!(visual_units_to_logical(units, Direction::Rtl).concat(), "سلام");
    }

    #[test]
    fn test_ltr_line_with_rtl_run() {
        assert_eq!(visual_to_logical("name: یلع ok", Direction::Ltr), "name: علی ok");
    }

    #[test]
    fn test_visual_order_detection() {
        let logical = "این کتاب در کتابخانه به امانت است";
        let visual = visual_to_logical(logical, Direction::Rtl);
        assert!(looks_visually_ordered(&visual));
        assert!(!looks_visually_ordered(logical));
        assert_eq!(recover_logical_order(&visual), logical);
    }

    #[test]
    fn test_recover_leaves_ordinary_lines() {
        let text = "first line\nدر خانه به سر بردیم";
        assert_eq!(recover_logical_order(text), text);
    }
}
