//! Optical recognition backends.
//!
//! OCR is split into two capabilities so each can be replaced on its own:
//! a [`PageRasterizer`] turns PDF pages into images and a
//! [`TextRecognizer`] turns an image into positioned word fragments.
//! [`OcrBackend::detect`] resolves the installed command-line tools once, at
//! configuration time, and the result is injected into the pipeline.

pub mod poppler;
pub mod tesseract;

pub use poppler::PdftoppmRasterizer;
pub use tesseract::TesseractRecognizer;

use crate::config::OcrConfig;
use crate::error::Result;
use crate::geometry::Rect;
use crate::text::script::{dominant_direction, Direction};
use image::DynamicImage;
use std::sync::Arc;

/// A word (or line) recognized in a page image.
#[derive(Debug, Clone, PartialEq)]
pub struct RecognizedFragment {
    /// Recognized text
    pub text: String,
    /// Box in image pixels, y growing downwards
    pub bbox: Rect,
    /// Recognizer confidence in [0, 100]
    pub confidence: f32,
}

impl RecognizedFragment {
    /// Create a fragment.
    pub fn new(text: impl Into<String>, bbox: Rect, confidence: f32) -> Self {
        Self {
            text: text.into(),
            bbox,
            confidence,
        }
    }
}

/// An open document from which pages can be rendered.
///
/// Sessions own any scratch resources and release them when dropped.
pub trait RasterSession {
    /// Number of pages in the document.
    fn page_count(&self) -> usize;

    /// Render a 1-based page at `scale` times its natural 72 dpi size.
    fn render(&mut self, page: usize, scale: f32) -> Result<DynamicImage>;
}

/// Turns PDF bytes into page images.
pub trait PageRasterizer: Send + Sync {
    /// Backend name for logs.
    fn name(&self) -> &str;

    /// Whether the backend can run.
    fn is_available(&self) -> bool;

    /// Open a document for rendering.
    fn open(&self, pdf: &[u8]) -> Result<Box<dyn RasterSession>>;
}

/// Turns a page image into text fragments.
pub trait TextRecognizer: Send + Sync {
    /// Backend name for logs.
    fn name(&self) -> &str;

    /// Whether the backend can run.
    fn is_available(&self) -> bool;

    /// Recognize the fragments of one page image.
    fn recognize(&self, image: &DynamicImage) -> Result<Vec<RecognizedFragment>>;
}

/// A rasterizer and recognizer pair, or the reason none is usable.
#[derive(Clone)]
pub struct OcrBackend {
    rasterizer: Arc<dyn PageRasterizer>,
    recognizer: Arc<dyn TextRecognizer>,
    available: bool,
}

impl std::fmt::Debug for OcrBackend {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("OcrBackend")
            .field("rasterizer", &self.rasterizer.name())
            .field("recognizer", &self.recognizer.name())
            .field("available", &self.available)
            .finish()
    }
}

impl OcrBackend {
    /// Pair a rasterizer with a recognizer; availability is checked now.
    pub fn new(rasterizer: Arc<dyn PageRasterizer>, recognizer: Arc<dyn TextRecognizer>) -> Self {
        let available = rasterizer.is_available() && recognizer.is_available();
        Self {
            rasterizer,
            recognizer,
            available,
        }
    }

    /// Probe for `pdftoppm`/`pdfinfo` and `tesseract` on the PATH.
    pub fn detect(config: &OcrConfig) -> Self {
        let backend = Self::new(
            Arc::new(PdftoppmRasterizer::new()),
            Arc::new(TesseractRecognizer::new(&config.languages)),
        );
        if config.enabled && !backend.available {
            log::info!("OCR tools not found; optical recognition disabled");
        }
        backend
    }

    /// Whether both halves were found when the backend was built.
    pub fn is_available(&self) -> bool {
        self.available
    }

    /// The rasterizer.
    pub fn rasterizer(&self) -> &dyn PageRasterizer {
        self.rasterizer.as_ref()
    }

    /// The recognizer.
    pub fn recognizer(&self) -> &dyn TextRecognizer {
        self.recognizer.as_ref()
    }

    /// Human-readable reason the backend is unusable.
    pub fn unavailable_reason(&self) -> String {
        let mut missing = Vec::new();
        if !self.rasterizer.is_available() {
            missing.push(self.rasterizer.name().to_string());
        }
        if !self.recognizer.is_available() {
            missing.push(self.recognizer.name().to_string());
        }
        if missing.is_empty() {
            "engine not available".to_string()
        } else {
            format!("{} not installed", missing.join(" and "))
        }
    }
}

/// Reassemble fragments into page text in reading order.
///
/// Fragments whose vertical centers fall within half a line height of each
/// other form a line. Lines run top to bottom; each line is ordered left to
/// right, or right to left when its text is mostly right-to-left script.
/// A vertical gap larger than 1.5 line heights starts a new paragraph.
pub fn reassemble(fragments: &[RecognizedFragment]) -> String {
    let mut sorted: Vec<&RecognizedFragment> = fragments.iter().filter(|f| !f.text.trim().is_empty()).collect();
    sorted.sort_by(|a, b| crate::utils::safe_float_cmp(a.bbox.center().y, b.bbox.center().y));

    let mut lines: Vec<Vec<&RecognizedFragment>> = Vec::new();
    for fragment in sorted {
        let center = fragment.bbox.center().y;
        let joins = lines.last().is_some_and(|line| {
            let line_center = line.iter().map(|f| f.bbox.center().y).sum::<f32>() / line.len() as f32;
            let height = line.iter().map(|f| f.bbox.height()).fold(fragment.bbox.height(), f32::max);
            (center - line_center).abs() <= height / 2.0
        });
        match lines.last_mut() {
            Some(line) if joins => line.push(fragment),
            _ => lines.push(vec![fragment]),
        }
    }

    let mut out = String::new();
    let mut previous: Option<(f32, f32)> = None;
    for mut line in lines {
        let direction = dominant_direction(line.iter().flat_map(|f| f.text.chars()));
        line.sort_by(|a, b| crate::utils::safe_float_cmp(a.bbox.x0, b.bbox.x0));
        if direction == Direction::Rtl {
            line.reverse();
        }
        let top = line.iter().map(|f| f.bbox.y0).fold(f32::INFINITY, f32::min);
        let bottom = line.iter().map(|f| f.bbox.y1).fold(f32::NEG_INFINITY, f32::max);

        if let Some((prev_bottom, prev_height)) = previous {
            let gap = top - prev_bottom;
            out.push_str(if gap > 1.5 * prev_height { "\n\n" } else { "\n" });
        }
        let text: Vec<&str> = line.iter().map(|f| f.text.trim()).collect();
        out.push_str(&text.join(" "));
        previous = Some((bottom, bottom - top));
    }
    out
}

/// Mean confidence of the fragments, if any.
pub fn mean_confidence(fragments: &[RecognizedFragment]) -> Option<f32> {
    if fragments.is_empty() {
        return None;
    }
    Some(fragments.iter().map(|f| f.confidence).sum::<f32>() / fragments.len() as f32)
}
