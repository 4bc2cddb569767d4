//! Font decoding for positional text extraction.
//!
//! A [`FontDecoder`] turns the bytes of a PDF string operand into glyphs with
//! Unicode text and advance widths. Decoding prefers the font's ToUnicode
//! CMap, then a simple-font `Differences` table, then WinAnsi.

pub mod cmap;

use crate::pdf;
use cmap::{parse_tounicode, ToUnicodeMap};
use lopdf::{Dictionary, Document, Object};
use std::collections::HashMap;

/// Default advance (glyph space, 1/1000 em) when a font gives none.
const DEFAULT_WIDTH: f32 = 500.0;

/// One decoded glyph.
#[derive(Debug, Clone, PartialEq)]
pub struct DecodedGlyph {
    /// Unicode text (empty when the code cannot be mapped)
    pub text: String,
    /// Advance width in glyph space (1/1000 em)
    pub width: f32,
    /// Single-byte code 32, which receives word spacing (`Tw`)
    pub is_word_space: bool,
}

/// Decoder for one font resource.
#[derive(Debug, Clone, Default)]
pub struct FontDecoder {
    two_byte: bool,
    to_unicode: Option<ToUnicodeMap>,
    differences: HashMap<u32, String>,
    widths: HashMap<u32, f32>,
    default_width: f32,
}

impl FontDecoder {
    /// Build a decoder from a font dictionary.
    pub fn from_dict(doc: &Document, font: &Dictionary) -> Self {
        let subtype = pdf::get(doc, font, b"Subtype").and_then(pdf::name);
        let two_byte = subtype == Some(b"Type0".as_slice());

        let to_unicode = pdf::get(doc, font, b"ToUnicode")
            .and_then(pdf::stream_bytes)
            .map(|data| parse_tounicode(&data))
            .filter(|map| !map.is_empty());

        let mut decoder = FontDecoder {
            two_byte,
            to_unicode,
            default_width: DEFAULT_WIDTH,
            ..Default::default()
        };

        if two_byte {
            decoder.load_cid_widths(doc, font);
        } else {
            decoder.load_simple_widths(doc, font);
            decoder.load_differences(doc, font);
        }
        decoder
    }

    /// A decoder for a missing font resource: one byte per code, WinAnsi text.
    pub fn fallback() -> Self {
        Self {
            default_width: DEFAULT_WIDTH,
            ..Default::default()
        }
    }

    /// Whether this font uses multi-byte codes.
    pub fn is_two_byte(&self) -> bool {
        self.two_byte
    }

    fn load_simple_widths(&mut self, doc: &Document, font: &Dictionary) {
        let first = pdf::get(doc, font, b"FirstChar").and_then(pdf::number).unwrap_or(0.0) as u32;
        if let Some(Object::Array(widths)) = pdf::get(doc, font, b"Widths") {
            for (i, w) in widths.iter().enumerate() {
                let code = u32::try_from(i).ok().and_then(|i| first.checked_add(i));
                if let (Some(code), Some(w)) = (code, pdf::number(pdf::resolve(doc, w))) {
                    self.widths.insert(code, w);
                }
            }
        }
        if let Some(missing) = pdf::get_dict(doc, font, b"FontDescriptor")
            .and_then(|d| pdf::get(doc, d, b"MissingWidth"))
            .and_then(pdf::number)
        {
            self.default_width = missing;
        }
    }

    fn load_cid_widths(&mut self, doc: &Document, font: &Dictionary) {
        let Some(Object::Array(descendants)) = pdf::get(doc, font, b"DescendantFonts") else {
            return;
        };
        let Some(Object::Dictionary(cid_font)) = descendants.first().map(|d| pdf::resolve(doc, d))
        else {
            return;
        };
        self.default_width = pdf::get(doc, cid_font, b"DW").and_then(pdf::number).unwrap_or(1000.0);

        // W: [c [w1 w2 ...]  cfirst clast w ...]
        let Some(Object::Array(w)) = pdf::get(doc, cid_font, b"W") else {
            return;
        };
        let items: Vec<&Object> = w.iter().map(|o| pdf::resolve(doc, o)).collect();
        let mut i = 0;
        while i < items.len() {
            let Some(first) = pdf::number(items[i]) else {
                i += 1;
                continue;
            };
            match items.get(i + 1) {
                Some(Object::Array(list)) => {
                    for (k, width) in list.iter().enumerate() {
                        let code = u32::try_from(k).ok().and_then(|k| (first as u32).checked_add(k));
                        if let (Some(code), Some(width)) = (code, pdf::number(pdf::resolve(doc, width))) {
                            self.widths.insert(code, width);
                        }
                    }
                    i += 2;
                },
                Some(last) => {
                    let (Some(last), Some(width)) =
                        (pdf::number(last), items.get(i + 2).and_then(|o| pdf::number(o)))
                    else {
                        break;
                    };
                    let (lo, hi) = (first as u32, last as u32);
                    for code in lo..=hi.min(lo.saturating_add(0xFFFF)) {
                        self.widths.insert(code, width);
                    }
                    i += 3;
                },
                None => break,
            }
        }
    }

    fn load_differences(&mut self, doc: &Document, font: &Dictionary) {
        let Some(Object::Dictionary(encoding)) = pdf::get(doc, font, b"Encoding") else {
            return;
        };
        let Some(Object::Array(diffs)) = pdf::get(doc, encoding, b"Differences") else {
            return;
        };
        // None once the running code has passed u32::MAX
        let mut code = Some(0u32);
        for item in diffs {
            match pdf::resolve(doc, item) {
                obj @ (Object::Integer(_) | Object::Real(_)) => {
                    code = Some(pdf::number(obj).unwrap_or(0.0) as u32);
                },
                Object::Name(glyph) => {
                    if let (Some(c), Some(text)) = (code, glyph_name_to_unicode(glyph)) {
                        self.differences.insert(c, text);
                    }
                    code = code.and_then(|c| c.checked_add(1));
                },
                _ => {},
            }
        }
    }

    /// Split a string operand into codes and decode each one.
    ///
    /// # Examples
    ///
    /// ```
    /// use docsift::fonts::FontDecoder;
    ///
    /// let glyphs = FontDecoder::fallback().decode(b"Hi ");
    /// assert_eq!(glyphs.len(), 3);
    /// assert_eq!(glyphs[0].text, "H");
    /// assert!(glyphs[2].is_word_space);
    /// ```
    pub fn decode(&self, bytes: &[u8]) -> Vec<DecodedGlyph> {
        let code_len = if self.two_byte {
            self.to_unicode
                .as_ref()
                .and_then(|m| m.code_bytes())
                .unwrap_or(2)
                .clamp(1, 4)
        } else {
            1
        };

        bytes
            .chunks(code_len)
            .map(|chunk| {
                let code = chunk.iter().fold(0u32, |acc, &b| (acc << 8) | b as u32);
                DecodedGlyph {
                    text: self.code_to_text(code),
                    width: self.widths.get(&code).copied().unwrap_or(self.default_width),
                    is_word_space: code_len == 1 && code == 32,
                }
            })
            .collect()
    }

    fn code_to_text(&self, code: u32) -> String {
        if let Some(text) = self.to_unicode.as_ref().and_then(|m| m.get(code)) {
            return text.to_string();
        }
        if self.two_byte {
            // Identity-encoded CIDs are glyph ids, not code points.
            return String::new();
        }
        if let Some(text) = self.differences.get(&code) {
            return text.clone();
        }
        win_ansi(code as u8).map(String::from).unwrap_or_default()
    }
}

/// WinAnsiEncoding for the byte values where it differs from Latin-1.
fn win_ansi(byte: u8) -> Option<char> {
    let c = match byte {
        0x80 => '€',
        0x85 => '…',
        0x91 => '\u{2018}',
        0x92 => '\u{2019}',
        0x93 => '\u{201C}',
        0x94 => '\u{201D}',
        0x95 => '•',
        0x96 => '–',
        0x97 => '—',
        0x99 => '™',
        0x00..=0x1F | 0x7F..=0x9F => return None,
        b => b as char,
    };
    Some(c)
}

/// Unicode for an Adobe glyph name, covering `uniXXXX`, `uXXXX` and basic Latin names.
fn glyph_name_to_unicode(name: &[u8]) -> Option<String> {
    let name = std::str::from_utf8(name).ok()?;
    let base = name.split('.').next().unwrap_or(name);

    if let Some(hex) = base.strip_prefix("uni") {
        let units: Vec<u16> = hex
            .as_bytes()
            .chunks(4)
            .filter_map(|c| std::str::from_utf8(c).ok())
            .filter_map(|c| u16::from_str_radix(c, 16).ok())
            .collect();
        return String::from_utf16(&units).ok().filter(|s| !s.is_empty());
    }
    if let Some(hex) = base.strip_prefix('u') {
        if (4..=6).contains(&hex.len()) {
            if let Some(c) = u32::from_str_radix(hex, 16).ok().and_then(char::from_u32) {
                return Some(c.to_string());
            }
        }
    }

    let mut chars = base.chars();
    if let (Some(c), None) = (chars.next(), chars.next()) {
        if c.is_ascii_alphabetic() {
            return Some(c.to_string());
        }
    }

    let c = match base {
        "space" => ' ',
        "zero" => '0',
        "one" => '1',
        "two" => '2',
        "three" => '3',
        "four" => '4',
        "five" => '5',
        "six" => '6',
        "seven" => '7',
        "eight" => '8',
        "nine" => '9',
        "period" => '.',
        "comma" => ',',
        "colon" => ':',
        "semicolon" => ';',
        "hyphen" | "minus" => '-',
        "parenleft" => '(',
        "parenright" => ')',
        "slash" => '/',
        "question" => '?',
        "exclam" => '!',
        "quotesingle" => '\'',
        "quotedbl" => '"',
        "at" => '@',
        _ => return None,
    };
    Some(c.to_string())
}

/// Decoders for every font in a resources dictionary, keyed by resource name.
pub fn fonts_in_resources(doc: &Document, resources: &Dictionary) -> HashMap<Vec<u8>, FontDecoder> {
    let mut fonts = HashMap::new();
    if let Some(font_dict) = pdf::get_dict(doc, resources, b"Font") {
        for (name, obj) in font_dict.iter() {
            if let Object::Dictionary(font) = pdf::resolve(doc, obj) {
                fonts.insert(name.clone(), FontDecoder::from_dict(doc, font));
            }
        }
    }
    log::trace!("Loaded {} font decoders", fonts.len());
    fonts
}

#[cfg(test)]
mod tests {
    use super::*;
    use lopdf::{dictionary, Stream};

    #[test]
    fn test_fallback_decodes_win_ansi() {
        let glyphs = FontDecoder::fallback().decode(b"\x93ok\x94");
        let text: String = glyphs.iter().map(|g| g.text.as_str()).collect();
        assert_eq!(text, "\u{201C}ok\u{201D}");
        assert!(glyphs.iter().all(|g| g.width == DEFAULT_WIDTH));
    }

    #[test]
    fn test_glyph_names() {
        assert_eq!(glyph_name_to_unicode(b"uni0627"), Some("ا".to_string()));
        assert_eq!(glyph_name_to_unicode(b"uni06440627"), Some("لا".to_string()));
        assert_eq!(glyph_name_to_unicode(b"u1D70C"), Some("\u{1D70C}".to_string()));
        assert_eq!(glyph_name_to_unicode(b"A"), Some("A".to_string()));
        assert_eq!(glyph_name_to_unicode(b"seven"), Some("7".to_string()));
        assert_eq!(glyph_name_to_unicode(b"a.sc"), Some("a".to_string()));
        assert_eq!(glyph_name_to_unicode(b"g123"), None);
    }

    #[test]
    fn test_type0_font_with_tounicode_and_widths() {
        let mut doc = Document::with_version("1.5");
        let cmap = Stream::new(
            dictionary! {},
            b"1 begincodespacerange <0000> <FFFF> endcodespacerange\nbeginbfchar\n<0001> <0633>\n<0002> <0644>\nendbfchar"
                .to_vec(),
        );
        let cmap_id = doc.add_object(cmap);
        let cid_font = dictionary! {
            "Type" => "Font",
            "Subtype" => "CIDFontType2",
            "DW" => 600,
            "W" => vec![
                Object::Integer(1),
                Object::Array(vec![Object::Integer(450)]),
                Object::Integer(2),
                Object::Integer(3),
                Object::Integer(300),
            ],
        };
        let font = dictionary! {
            "Type" => "Font",
            "Subtype" => "Type0",
            "DescendantFonts" => vec![Object::Dictionary(cid_font)],
            "ToUnicode" => cmap_id,
        };

        let decoder = FontDecoder::from_dict(&doc, &font);
        assert!(decoder.is_two_byte());
        let glyphs = decoder.decode(&[0x00, 0x01, 0x00, 0x02, 0x00, 0x09]);
        assert_eq!(glyphs.len(), 3);
        assert_eq!(glyphs[0].text, "س");
        assert_eq!(glyphs[0].width, 450.0);
        assert_eq!(glyphs[1].text, "ل");
        assert_eq!(glyphs[1].width, 300.0);
        assert_eq!(glyphs[2].text, "");
        assert_eq!(glyphs[2].width, 600.0);
        assert!(!glyphs[0].is_word_space);
    }

    #[test]
    fn test_simple_font_differences_and_widths() {
        let doc = Document::with_version("1.5");
        let font = dictionary! {
            "Type" => "Font",
            "Subtype" => "Type1",
            "FirstChar" => 65,
            "Widths" => vec![Object::Integer(700), Object::Integer(710)],
            "Encoding" => dictionary! {
                "Type" => "Encoding",
                "Differences" => vec![Object::Integer(65), Object::Name(b"uni0645".to_vec())],
            },
        };
        let decoder = FontDecoder::from_dict(&doc, &font);
        let glyphs = decoder.decode(b"AB");
        assert_eq!(glyphs[0].text, "م");
        assert_eq!(glyphs[0].width, 700.0);
        assert_eq!(glyphs[1].text, "B");
        assert_eq!(glyphs[1].width, 710.0);
    }

    #[test]
    fn test_codes_past_u32_max_are_skipped() {
        let doc = Document::with_version("1.5");
        let top = Object::Integer(u32::MAX as i64);
        let simple = dictionary! {
            "Type" => "Font",
            "Subtype" => "Type1",
            "FirstChar" => top.clone(),
            "Widths" => vec![Object::Integer(700), Object::Integer(710)],
            "Encoding" => dictionary! {
                "Differences" => vec![top.clone(), Object::Name(b"a".to_vec()), Object::Name(b"b".to_vec())],
            },
        };
        let decoder = FontDecoder::from_dict(&doc, &simple);
        assert_eq!(decoder.widths.len(), 1);
        assert_eq!(decoder.widths.get(&u32::MAX), Some(&700.0));
        assert_eq!(decoder.differences.len(), 1);
        assert_eq!(decoder.differences.get(&u32::MAX).map(String::as_str), Some("a"));

        let cid_font = dictionary! {
            "Subtype" => "CIDFontType2",
            "W" => vec![top, Object::Array(vec![Object::Integer(450), Object::Integer(460)])],
        };
        let type0 = dictionary! {
            "Subtype" => "Type0",
            "DescendantFonts" => vec![Object::Dictionary(cid_font)],
        };
        let decoder = FontDecoder::from_dict(&doc, &type0);
        assert_eq!(decoder.widths.len(), 1);
    }
}
