//! ToUnicode CMap parser.
//!
//! A ToUnicode stream maps the character codes a font uses in content
//! streams to Unicode strings. Fonts built for Persian text almost always
//! need it: their codes are glyph ids, not code points.
//!
//! Supported sections:
//!
//! ```text
//! 1 begincodespacerange <0000> <FFFF> endcodespacerange
//! 2 beginbfchar <0041> <0041> <0003> <00660069> endbfchar
//! 1 beginbfrange <0020> <007E> <0020> endbfrange
//! 1 beginbfrange <005F> <0061> [<00660066> <00660069> <00660066006C>] endbfrange
//! ```

use lazy_static::lazy_static;
use regex::Regex;
use std::collections::HashMap;

/// Upper bound on a single bfrange, so a corrupt range cannot allocate without limit.
const MAX_RANGE: u32 = 0xFFFF;

lazy_static! {
    static ref RE_PAIR: Regex = Regex::new(r"<([0-9A-Fa-f]+)>\s*<([0-9A-Fa-f]+)>").unwrap();
    static ref RE_RANGE_SEQ: Regex =
        Regex::new(r"<([0-9A-Fa-f]+)>\s*<([0-9A-Fa-f]+)>\s*<([0-9A-Fa-f]+)>").unwrap();
    static ref RE_RANGE_ARRAY: Regex =
        Regex::new(r"<([0-9A-Fa-f]+)>\s*<([0-9A-Fa-f]+)>\s*\[([^\]]*)\]").unwrap();
    static ref RE_HEX: Regex = Regex::new(r"<([0-9A-Fa-f]+)>").unwrap();
}

/// Parsed ToUnicode mapping.
#[derive(Debug, Clone, Default, PartialEq)]
pub struct ToUnicodeMap {
    mappings: HashMap<u32, String>,
    code_bytes: Option<usize>,
}

impl ToUnicodeMap {
    /// Unicode text for a character code.
    pub fn get(&self, code: u32) -> Option<&str> {
        self.mappings.get(&code).map(String::as_str)
    }

    /// Byte width of codes declared by the codespace range, if any.
    pub fn code_bytes(&self) -> Option<usize> {
        self.code_bytes
    }

    /// Number of mapped codes.
    pub fn len(&self) -> usize {
        self.mappings.len()
    }

    /// Whether nothing is mapped.
    pub fn is_empty(&self) -> bool {
        self.mappings.is_empty()
    }
}

/// Decode a UTF-16BE hex destination string (surrogate pairs included).
///
/// Destinations that are not valid UTF-16 fall back to one code point per
/// four hex digits.
fn decode_destination(hex: &str) -> Option<String> {
    if hex.len() <= 4 {
        let code = u32::from_str_radix(hex, 16).ok()?;
        return char::from_u32(code).map(String::from);
    }

    let units: Vec<u16> = hex
        .as_bytes()
        .chunks(4)
        .filter_map(|chunk| std::str::from_utf8(chunk).ok())
        .filter_map(|chunk| u16::from_str_radix(chunk, 16).ok())
        .collect();

    match String::from_utf16(&units) {
        Ok(s) if !s.is_empty() => Some(s),
        _ => {
            let s: String = units
                .iter()
                .filter_map(|&u| char::from_u32(u as u32))
                .collect();
            (!s.is_empty()).then_some(s)
        },
    }
}

/// Add `offset` to the last UTF-16 unit of a destination (bfrange increment).
fn offset_destination(hex: &str, offset: u32) -> Option<String> {
    if hex.len() <= 4 {
        let base = u32::from_str_radix(hex, 16).ok()?;
        return char::from_u32(base + offset).map(String::from);
    }
    let split = hex.len() - 4;
    let last = u32::from_str_radix(&hex[split..], 16).ok()? + offset;
    if last > 0xFFFF {
        return None;
    }
    decode_destination(&format!("{}{:04X}", &hex[..split], last))
}

fn sections<'a>(content: &'a str, begin: &str, end: &str) -> Vec<&'a str> {
    let mut found = Vec::new();
    let mut rest = content;
    while let Some(start) = rest.find(begin) {
        let body = &rest[start + begin.len()..];
        match body.find(end) {
            Some(stop) => {
                found.push(&body[..stop]);
                rest = &body[stop + end.len()..];
            },
            None => break,
        }
    }
    found
}

/// Parse a (decompressed) ToUnicode CMap stream. Unparseable lines are skipped.
///
/// # Examples
///
/// ```
/// use docsift::fonts::cmap::parse_tounicode;
///
/// let cmap = parse_tounicode(b"beginbfchar\n<0041> <0627>\nendbfchar");
/// assert_eq!(cmap.get(0x41), Some("ا"));
/// ```
pub fn parse_tounicode(data: &[u8]) -> ToUnicodeMap {
    let content = String::from_utf8_lossy(data);
    let mut map = ToUnicodeMap::default();

    for section in sections(&content, "begincodespacerange", "endcodespacerange") {
        if let Some(caps) = RE_PAIR.captures(section) {
            map.code_bytes = Some(caps[1].len().div_ceil(2));
        }
    }

    for section in sections(&content, "beginbfchar", "endbfchar") {
        for caps in RE_PAIR.captures_iter(section) {
            let Ok(src) = u32::from_str_radix(&caps[1], 16) else {
                continue;
            };
            if map.code_bytes.is_none() {
                map.code_bytes = Some(caps[1].len().div_ceil(2));
            }
            if let Some(dst) = decode_destination(&caps[2]) {
                map.mappings.insert(src, dst);
            }
        }
    }

    for section in sections(&content, "beginbfrange", "endbfrange") {
        for line in section.lines() {
            parse_range_line(line, &mut map);
        }
    }

    log::trace!("ToUnicode CMap: {} mappings", map.mappings.len());
    map
}

fn parse_range_line(line: &str, map: &mut ToUnicodeMap) {
    if let Some(caps) = RE_RANGE_ARRAY.captures(line) {
        let (Ok(lo), Ok(hi)) = (u32::from_str_radix(&caps[1], 16), u32::from_str_radix(&caps[2], 16))
        else {
            return;
        };
        if map.code_bytes.is_none() {
            map.code_bytes = Some(caps[1].len().div_ceil(2));
        }
        let targets: Vec<&str> = RE_HEX
            .captures_iter(&caps[3])
            .filter_map(|c| c.get(1).map(|m| m.as_str()))
            .collect();
        let expected = hi.saturating_sub(lo) as usize + 1;
        if targets.len() != expected {
            log::warn!(
                "ToUnicode bfrange 0x{:X}-0x{:X}: expected {} destinations, found {}",
                lo,
                hi,
                expected,
                targets.len()
            );
        }
        for (offset, hex) in targets.into_iter().take(expected).enumerate() {
            if let Some(dst) = decode_destination(hex) {
                map.mappings.insert(lo + offset as u32, dst);
            }
        }
        return;
    }

    if let Some(caps) = RE_RANGE_SEQ.captures(line) {
        let (Ok(lo), Ok(hi)) = (u32::from_str_radix(&caps[1], 16), u32::from_str_radix(&caps[2], 16))
        else {
            return;
        };
        if map.code_bytes.is_none() {
            map.code_bytes = Some(caps[1].len().div_ceil(2));
        }
        let span = hi.saturating_sub(lo).min(MAX_RANGE);
        for offset in 0..=span {
            if let Some(dst) = offset_destination(&caps[3], offset) {
                map.mappings.insert(lo + offset, dst);
            }
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_bfchar() {
        let cmap = parse_tounicode(b"beginbfchar\n<0041> <0041>\n<0042> <06CC>\nendbfchar");
        assert_eq!(cmap.get(0x41), Some("A"));
        assert_eq!(cmap.get(0x42), Some("ی"));
        assert_eq!(cmap.len(), 2);
        assert_eq!(cmap.code_bytes(), Some(2));
    }

    #[test]
    fn test_bfchar_ligature_and_surrogates() {
        let cmap = parse_tounicode(
            b"beginbfchar\n<0C> <00660069>\n<0D> <D835DF0C>\n<0E> <06440627>\nendbfchar",
        );
        assert_eq!(cmap.get(0x0C), Some("fi"));
        assert_eq!(cmap.get(0x0D), Some("\u{1D70C}"));
        assert_eq!(cmap.get(0x0E), Some("لا"));
        assert_eq!(cmap.code_bytes(), Some(1));
    }

    #[test]
    fn test_bfrange_sequential() {
        let cmap = parse_tounicode(b"beginbfrange\n<0020> <007E> <0020>\nendbfrange");
        assert_eq!(cmap.get(0x20), Some(" "));
        assert_eq!(cmap.get(0x41), Some("A"));
        assert_eq!(cmap.get(0x7E), Some("~"));
        assert_eq!(cmap.len(), 0x5F);
    }

    #[test]
    fn test_bfrange_array() {
        let cmap = parse_tounicode(
            b"beginbfrange\n<005F> <0061> [<00660066> <00660069> <00660066006C>]\nendbfrange",
        );
        assert_eq!(cmap.get(0x5F), Some("ff"));
        assert_eq!(cmap.get(0x60), Some("fi"));
        assert_eq!(cmap.get(0x61), Some("ffl"));
    }

    #[test]
    fn test_bfrange_multi_unit_increment() {
        let cmap = parse_tounicode(b"beginbfrange\n<01> <02> <00660069>\nendbfrange");
        assert_eq!(cmap.get(0x01), Some("fi"));
        assert_eq!(cmap.get(0x02), Some("fj"));
    }

    #[test]
    fn test_codespace_declares_width() {
        let cmap = parse_tounicode(
            b"1 begincodespacerange\n<00> <FF>\nendcodespacerange\nbeginbfchar\n<0041> <0041>\nendbfchar",
        );
        assert_eq!(cmap.code_bytes(), Some(1));
    }

    #[test]
    fn test_garbage_is_ignored() {
        assert!(parse_tounicode(b"").is_empty());
        assert!(parse_tounicode(b"beginbfchar\nnot hex\nendbfchar").is_empty());
        assert!(parse_tounicode(b"beginbfchar\n<0041> <0041>").is_empty());
    }

    #[test]
    fn test_multiple_sections_merge() {
        let cmap = parse_tounicode(
            b"beginbfchar\n<0041> <0058>\nendbfchar\nbeginbfrange\n<0042> <0044> <0042>\nendbfrange\nbeginbfchar\n<0045> <0045>\nendbfchar",
        );
        assert_eq!(cmap.get(0x41), Some("X"));
        assert_eq!(cmap.get(0x43), Some("C"));
        assert_eq!(cmap.get(0x45), Some("E"));
    }
}
