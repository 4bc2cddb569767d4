//! Character classes for Persian text in Arabic script.
//!
//! These helpers are shared by the normalizer, the corruption detector, the
//! repairer and the layout-aware line assembly.

use serde::{Deserialize, Serialize};

/// Zero-width non-joiner, used inside Persian words.
pub const ZWNJ: char = '\u{200C}';

/// Whether `c` is a letter of the Persian alphabet (including the Arabic
/// letters that survive unification). The first range covers hamza to ghain,
/// alef with madda among them.
///
/// # Examples
///
/// ```
/// use docsift::text::script::is_persian_letter;
///
/// assert!(is_persian_letter('پ'));
/// assert!(is_persian_letter('ی'));
/// assert!(!is_persian_letter('۵'));
/// assert!(!is_persian_letter('a'));
/// ```
pub fn is_persian_letter(c: char) -> bool {
    matches!(c,
        '\u{0621}'..='\u{063A}'
        | '\u{0641}'..='\u{064A}'
        | '\u{067E}' // پ
        | '\u{0686}' // چ
        | '\u{0698}' // ژ
        | '\u{06A9}' // ک
        | '\u{06AF}' // گ
        | '\u{06CC}' // ی
    )
}

/// Whether `c` belongs to any Arabic-script block, including presentation forms.
pub fn is_arabic_script(c: char) -> bool {
    matches!(c,
        '\u{0600}'..='\u{06FF}'
        | '\u{0750}'..='\u{077F}'
        | '\u{08A0}'..='\u{08FF}'
    ) || is_presentation_form(c)
}

/// Whether `c` is an Arabic presentation form (a pre-shaped glyph code point).
///
/// Digital extraction from fonts without a proper ToUnicode map frequently
/// yields these instead of logical letters.
pub fn is_presentation_form(c: char) -> bool {
    matches!(c, '\u{FB50}'..='\u{FDFF}' | '\u{FE70}'..='\u{FEFC}')
}

/// Whether `c` is an Arabic-Indic or Persian (extended Arabic-Indic) digit.
pub fn is_eastern_digit(c: char) -> bool {
    matches!(c, '\u{0660}'..='\u{0669}' | '\u{06F0}'..='\u{06F9}')
}

/// Map an Arabic-Indic digit to the Persian digit of the same value.
pub fn to_persian_digit(c: char) -> Option<char> {
    match c {
        '\u{0660}'..='\u{0669}' => char::from_u32(c as u32 - 0x0660 + 0x06F0),
        _ => None,
    }
}

/// Coarse bidirectional class, enough to order runs inside a line.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum BidiClass {
    /// Strong right-to-left (Arabic script letters)
    Rtl,
    /// Strong left-to-right (Latin and other letters)
    Ltr,
    /// Digits of any script (laid out left-to-right inside RTL text)
    Number,
    /// Whitespace and punctuation
    Neutral,
}

/// Classify a character.
pub fn bidi_class(c: char) -> BidiClass {
    if c.is_ascii_digit() || is_eastern_digit(c) {
        BidiClass::Number
    } else if is_arabic_script(c) && c.is_alphabetic() {
        BidiClass::Rtl
    } else if c.is_alphabetic() {
        BidiClass::Ltr
    } else {
        BidiClass::Neutral
    }
}

/// Base direction of a line or page.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Default, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum Direction {
    /// Left to right
    #[default]
    Ltr,
    /// Right to left
    Rtl,
}

/// Majority direction over the strong characters of `chars`; ties and
/// texts without strong characters are left-to-right.
pub fn dominant_direction<I: IntoIterator<Item = char>>(chars: I) -> Direction {
    let (mut rtl, mut ltr) = (0usize, 0usize);
    for c in chars {
        match bidi_class(c) {
            BidiClass::Rtl => rtl += 1,
            BidiClass::Ltr => ltr += 1,
            _ => {},
        }
    }
    if rtl > ltr {
        Direction::Rtl
    } else {
        Direction::Ltr
    }
}

/// Number of Persian letters in `token`.
pub fn persian_letter_count(token: &str) -> usize {
    token.chars().filter(|&c| is_persian_letter(c)).count()
}

/// Whether `token` consists of Persian letters only (ignoring ZWNJ).
pub fn is_persian_word(token: &str) -> bool {
    let mut any = false;
    for c in token.chars() {
        if is_persian_letter(c) {
            any = true;
        } else if c != ZWNJ {
            return false;
        }
    }
    any
}
