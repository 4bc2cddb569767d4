//! Single-unit media: plain text, word-processor documents and JSON.
//!
//! These formats have no pages, so a page limit does not apply. Each yields
//! one block, finished like any PDF block.

use crate::document::{MediaType, PageLimit, SourceDocument};
use crate::error::{Error, Result};
use crate::extractors::{BlockFinisher, ExtractionMethod, ExtractionResult, Extractor};
use chardetng::EncodingDetector;
use quick_xml::events::Event;
use quick_xml::Reader;
use serde_json::Value;
use std::io::{Cursor, Read};

/// Decode text bytes, honouring a UTF-8 or UTF-16 byte order mark.
///
/// Without a BOM, valid UTF-8 is taken as is. Anything else goes through
/// charset detection (biased toward Persian legacy encodings) and is decoded
/// with the detected encoding.
///
/// # Examples
///
/// ```
/// use docsift::formats::decode_text;
///
/// assert_eq!(decode_text(b"\xEF\xBB\xBFhello"), "hello");
/// assert_eq!(decode_text(&[0xFF, 0xFE, b'h', 0, b'i', 0]), "hi");
/// ```
pub fn decode_text(bytes: &[u8]) -> String {
    if let Some(rest) = bytes.strip_prefix(&[0xEF, 0xBB, 0xBF]) {
        return String::from_utf8_lossy(rest).into_owned();
    }
    if let Some(rest) = bytes.strip_prefix(&[0xFF, 0xFE]) {
        return decode_utf16(rest, u16::from_le_bytes);
    }
    if let Some(rest) = bytes.strip_prefix(&[0xFE, 0xFF]) {
        return decode_utf16(rest, u16::from_be_bytes);
    }
    if let Ok(text) = std::str::from_utf8(bytes) {
        return text.to_string();
    }
    let mut detector = EncodingDetector::new();
    detector.feed(bytes, true);
    let encoding = detector.guess(Some(b"ir"), true);
    log::debug!("Text is not UTF-8, decoding as {}", encoding.name());
    encoding.decode_without_bom_handling(bytes).0.into_owned()
}

fn decode_utf16(bytes: &[u8], unit: fn([u8; 2]) -> u16) -> String {
    let units: Vec<u16> = bytes.chunks_exact(2).map(|pair| unit([pair[0], pair[1]])).collect();
    String::from_utf16_lossy(&units)
}

/// Paragraph texts of a `.docx` archive, in document order.
pub fn docx_paragraphs(bytes: &[u8]) -> Result<Vec<String>> {
    let mut archive = zip::ZipArchive::new(Cursor::new(bytes))?;
    let mut xml = String::new();
    archive.by_name("word/document.xml")?.read_to_string(&mut xml)?;
    paragraphs_from_document_xml(&xml)
}

fn paragraphs_from_document_xml(xml: &str) -> Result<Vec<String>> {
    let mut reader = Reader::from_str(xml);
    let mut paragraphs = Vec::new();
    let mut current = String::new();
    let mut in_text = false;

    loop {
        match reader.read_event() {
            Ok(Event::Start(e)) => {
                if e.local_name().as_ref() == b"t" {
                    in_text = true;
                }
            },
            Ok(Event::Empty(e)) => match e.local_name().as_ref() {
                b"tab" => current.push('\t'),
                b"br" | b"cr" => current.push('\n'),
                b"p" => paragraphs.push(String::new()),
                _ => {},
            },
            Ok(Event::Text(e)) => {
                if in_text {
                    match e.unescape() {
                        Ok(text) => current.push_str(&text),
                        Err(err) => {
                            log::debug!("Keeping unescaped run text: {}", err);
                            current.push_str(&String::from_utf8_lossy(&*e));
                        },
                    }
                }
            },
            Ok(Event::End(e)) => match e.local_name().as_ref() {
                b"t" => in_text = false,
                b"p" => paragraphs.push(std::mem::take(&mut current)),
                _ => {},
            },
            Ok(Event::Eof) => break,
            Err(e) => return Err(Error::Docx(format!("document.xml: {}", e))),
            _ => {},
        }
    }
    Ok(paragraphs)
}

/// Parse a JSON document.
pub fn parse_json(bytes: &[u8]) -> Result<Value> {
    Ok(serde_json::from_str(&decode_text(bytes))?)
}

/// Flatten every scalar leaf into a `path: value` line. Object keys are
/// visited in sorted order; nulls and blank strings are skipped.
///
/// # Examples
///
/// ```
/// use docsift::formats::flatten_json;
/// use serde_json::json;
///
/// let lines = flatten_json(&json!({"party": {"name": "Ali", "ids": [7, 9]}, "signed": true}));
/// assert_eq!(lines, vec!["party.ids[0]: 7", "party.ids[1]: 9", "party.name: Ali", "signed: true"]);
/// ```
pub fn flatten_json(value: &Value) -> Vec<String> {
    let mut lines = Vec::new();
    flatten_into(value, String::new(), &mut lines);
    lines
}

fn flatten_into(value: &Value, path: String, lines: &mut Vec<String>) {
    match value {
        Value::Object(map) => {
            for (key, child) in map {
                let child_path = if path.is_empty() { key.clone() } else { format!("{}.{}", path, key) };
                flatten_into(child, child_path, lines);
            }
        },
        Value::Array(items) => {
            for (i, child) in items.iter().enumerate() {
                flatten_into(child, format!("{}[{}]", path, i), lines);
            }
        },
        Value::Null => {},
        scalar => {
            let text = match scalar {
                Value::String(s) => s.clone(),
                other => other.to_string(),
            };
            if text.trim().is_empty() {
                return;
            }
            if path.is_empty() {
                lines.push(text);
            } else {
                lines.push(format!("{}: {}", path, text));
            }
        },
    }
}

fn single_block(
    finisher: &BlockFinisher,
    document: &SourceDocument,
    expected: MediaType,
    method: ExtractionMethod,
    raw: impl FnOnce(&[u8]) -> Result<String>,
) -> Result<ExtractionResult> {
    if document.media_type() != expected {
        return Err(Error::UnsupportedMediaType(document.media_type().to_string()));
    }
    let text = raw(document.bytes())?;
    let blocks = finisher.finish(1, &text, method).into_iter().collect();
    Ok(ExtractionResult::from_blocks(method, blocks, 1, 1))
}

/// Plain text files.
#[derive(Debug, Clone, Default)]
pub struct PlainTextExtractor {
    finisher: BlockFinisher,
}

impl PlainTextExtractor {
    /// Create the extractor.
    pub fn new(finisher: BlockFinisher) -> Self {
        Self { finisher }
    }
}

impl Extractor for PlainTextExtractor {
    fn method(&self) -> ExtractionMethod {
        ExtractionMethod::PlainText
    }

    fn extract(&self, document: &SourceDocument, _limit: PageLimit) -> Result<ExtractionResult> {
        single_block(&self.finisher, document, MediaType::Text, self.method(), |bytes| {
            Ok(decode_text(bytes))
        })
    }
}

/// Word-processor documents; paragraphs are joined with newlines.
#[derive(Debug, Clone, Default)]
pub struct DocxExtractor {
    finisher: BlockFinisher,
}

impl DocxExtractor {
    /// Create the extractor.
    pub fn new(finisher: BlockFinisher) -> Self {
        Self { finisher }
    }
}

impl Extractor for DocxExtractor {
    fn method(&self) -> ExtractionMethod {
        ExtractionMethod::Docx
    }

    fn extract(&self, document: &SourceDocument, _limit: PageLimit) -> Result<ExtractionResult> {
        single_block(&self.finisher, document, MediaType::Docx, self.method(), |bytes| {
            Ok(docx_paragraphs(bytes)?.join("\n"))
        })
    }
}

/// JSON documents, rendered as flattened `path: value` lines.
#[derive(Debug, Clone, Default)]
pub struct JsonExtractor {
    finisher: BlockFinisher,
}

impl JsonExtractor {
    /// Create the extractor.
    pub fn new(finisher: BlockFinisher) -> Self {
        Self { finisher }
    }
}

impl Extractor for JsonExtractor {
    fn method(&self) -> ExtractionMethod {
        ExtractionMethod::Json
    }

    fn extract(&self, document: &SourceDocument, _limit: PageLimit) -> Result<ExtractionResult> {
        single_block(&self.finisher, document, MediaType::Json, self.method(), |bytes| {
            Ok(flatten_json(&parse_json(bytes)?).join("\n"))
        })
    }
}
