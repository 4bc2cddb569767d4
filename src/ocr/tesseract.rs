//! Text recognition with the `tesseract` command-line tool.

use crate::error::{Error, Result};
use crate::geometry::Rect;
use crate::ocr::{RecognizedFragment, TextRecognizer};
use image::{DynamicImage, ImageFormat};
use std::process::Command;

/// TSV row level of a single word.
const WORD_LEVEL: &str = "5";

/// Runs `tesseract <image> stdout -l <languages> tsv` and reads word boxes.
#[derive(Debug, Clone)]
pub struct TesseractRecognizer {
    binary: String,
    languages: String,
    page_segmentation: u8,
}

impl TesseractRecognizer {
    /// Recognize `languages` (tesseract `-l` syntax, e.g. `fas+eng`).
    pub fn new(languages: &str) -> Self {
        Self {
            binary: "tesseract".to_string(),
            languages: languages.to_string(),
            page_segmentation: 3,
        }
    }

    /// Use an explicit tesseract binary.
    pub fn with_binary(mut self, binary: impl Into<String>) -> Self {
        self.binary = binary.into();
        self
    }

    /// Set the page segmentation mode (`--psm`).
    pub fn with_page_segmentation(mut self, psm: u8) -> Self {
        self.page_segmentation = psm;
        self
    }
}

/// Parse tesseract TSV output into word fragments.
///
/// Rows that are not words, have no text, or carry a negative confidence are
/// skipped. Malformed rows are ignored.
pub fn parse_tsv(tsv: &str) -> Vec<RecognizedFragment> {
    tsv.lines()
        .skip(1)
        .filter_map(|row| {
            let cols: Vec<&str> = row.split('\t').collect();
            if cols.len() < 12 || cols[0] != WORD_LEVEL {
                return None;
            }
            let text = cols[11..].join("\t");
            let text = text.trim();
            let confidence: f32 = cols[10].trim().parse().ok()?;
            if text.is_empty() || confidence < 0.0 {
                return None;
            }
            let left: f32 = cols[6].parse().ok()?;
            let top: f32 = cols[7].parse().ok()?;
            let width: f32 = cols[8].parse().ok()?;
            let height: f32 = cols[9].parse().ok()?;
            Some(RecognizedFragment::new(
                text,
                Rect::from_corners(left, top, left + width, top + height),
                confidence,
            ))
        })
        .collect()
}

impl TextRecognizer for TesseractRecognizer {
    fn name(&self) -> &str {
        "tesseract"
    }

    fn is_available(&self) -> bool {
        which::which(&self.binary).is_ok()
    }

    fn recognize(&self, image: &DynamicImage) -> Result<Vec<RecognizedFragment>> {
        let dir = tempfile::tempdir()?;
        let path = dir.path().join("page.png");
        image.save_with_format(&path, ImageFormat::Png)?;

        let output = Command::new(&self.binary)
            .arg(&path)
            .arg("stdout")
            .arg("-l")
            .arg(&self.languages)
            .arg("--psm")
            .arg(self.page_segmentation.to_string())
            .arg("tsv")
            .output()
            .map_err(|e| Error::EngineUnavailable(format!("{}: {}", self.binary, e)))?;

        if !output.status.success() {
            return Err(Error::Ocr(format!(
                "tesseract failed (exit code {}): {}",
                output.status.code().unwrap_or(-1),
                String::from_utf8_lossy(&output.stderr).trim()
            )));
        }

        let fragments = parse_tsv(&String::from_utf8_lossy(&output.stdout));
        log::debug!("tesseract recognized {} words", fragments.len());
        Ok(fragments)
    }
}
