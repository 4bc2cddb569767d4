//! Page rasterization with poppler's `pdftoppm`.

use crate::error::{Error, Result};
use crate::ocr::{PageRasterizer, RasterSession};
use image::DynamicImage;
use std::path::PathBuf;
use std::process::Command;
use tempfile::TempDir;

/// Renders pages by shelling out to `pdftoppm`; page counts come from `pdfinfo`.
#[derive(Debug, Clone)]
pub struct PdftoppmRasterizer {
    pdftoppm: String,
    pdfinfo: String,
}

impl Default for PdftoppmRasterizer {
    fn default() -> Self {
        Self::new()
    }
}

impl PdftoppmRasterizer {
    /// Use the tools found on the PATH.
    pub fn new() -> Self {
        Self {
            pdftoppm: "pdftoppm".to_string(),
            pdfinfo: "pdfinfo".to_string(),
        }
    }

    /// Use explicit tool paths.
    pub fn with_binaries(pdftoppm: impl Into<String>, pdfinfo: impl Into<String>) -> Self {
        Self {
            pdftoppm: pdftoppm.into(),
            pdfinfo: pdfinfo.into(),
        }
    }
}

/// Page count from `pdfinfo` output.
pub fn parse_page_count(info: &str) -> Option<usize> {
    info.lines()
        .find_map(|line| line.strip_prefix("Pages:"))
        .and_then(|count| count.trim().parse().ok())
}

impl PageRasterizer for PdftoppmRasterizer {
    fn name(&self) -> &str {
        "pdftoppm"
    }

    fn is_available(&self) -> bool {
        which::which(&self.pdftoppm).is_ok() && which::which(&self.pdfinfo).is_ok()
    }

    fn open(&self, pdf: &[u8]) -> Result<Box<dyn RasterSession>> {
        let dir = tempfile::tempdir()?;
        let input = dir.path().join("input.pdf");
        std::fs::write(&input, pdf)?;

        let output = Command::new(&self.pdfinfo)
            .arg(&input)
            .output()
            .map_err(|e| Error::EngineUnavailable(format!("{}: {}", self.pdfinfo, e)))?;
        if !output.status.success() {
            return Err(Error::Ocr(format!(
                "pdfinfo failed (exit code {}): {}",
                output.status.code().unwrap_or(-1),
                String::from_utf8_lossy(&output.stderr).trim()
            )));
        }
        let page_count = parse_page_count(&String::from_utf8_lossy(&output.stdout))
            .ok_or_else(|| Error::Ocr("pdfinfo reported no page count".to_string()))?;

        Ok(Box::new(PdftoppmSession {
            pdftoppm: self.pdftoppm.clone(),
            dir,
            input,
            page_count,
        }))
    }
}

/// A document copied into a scratch directory, removed on drop.
struct PdftoppmSession {
    pdftoppm: String,
    dir: TempDir,
    input: PathBuf,
    page_count: usize,
}

impl RasterSession for PdftoppmSession {
    fn page_count(&self) -> usize {
        self.page_count
    }

    fn render(&mut self, page: usize, scale: f32) -> Result<DynamicImage> {
        let dpi = (72.0 * scale).round().max(1.0) as u32;
        let prefix = self.dir.path().join(format!("page-{}", page));
        let output = Command::new(&self.pdftoppm)
            .arg("-r")
            .arg(dpi.to_string())
            .arg("-f")
            .arg(page.to_string())
            .arg("-l")
            .arg(page.to_string())
            .arg("-png")
            .arg("-singlefile")
            .arg(&self.input)
            .arg(&prefix)
            .output()
            .map_err(|e| Error::EngineUnavailable(format!("{}: {}", self.pdftoppm, e)))?;
        if !output.status.success() {
            return Err(Error::Ocr(format!(
                "pdftoppm failed on page {} (exit code {})",
                page,
                output.status.code().unwrap_or(-1)
            )));
        }

        let png = prefix.with_extension("png");
        let image = image::open(&png)?;
        // Pages are rendered one at a time; do not keep them on disk.
        let _ = std::fs::remove_file(&png);
        log::trace!("Rendered page {} at {} dpi ({}x{})", page, dpi, image.width(), image.height());
        Ok(image)
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_parse_page_count() {
        let info = "Title:          Report\nProducer:       x\nPages:          12\nEncrypted:      no\n";
        assert_eq!(parse_page_count(info), Some(12));
        assert_eq!(parse_page_count("Title: none"), None);
    }

    #[test]
    fn test_missing_binaries_are_unavailable() {
        let rasterizer = PdftoppmRasterizer::with_binaries("/nonexistent/pdftoppm", "/nonexistent/pdfinfo");
        assert!(!rasterizer.is_available());
        assert!(matches!(rasterizer.open(b"%PDF-1.4"), Err(Error::EngineUnavailable(_))));
    }

    #[cfg(unix)]
    #[test]
    fn test_non_executable_file_is_unavailable() {
        let plain = tempfile::NamedTempFile::new().unwrap();
        let path = plain.path().to_string_lossy().into_owned();
        let rasterizer = PdftoppmRasterizer::with_binaries(path.clone(), path);
        assert!(!rasterizer.is_available());
    }
}
