//! Geometric page analysis.
//!
//! A page is interpreted into positioned glyphs, which are grouped into
//! lines by baseline, split into columns at a vertical gutter, and
//! assembled into paragraphs and tables in reading order. Lines whose
//! strong characters are mostly right-to-left are read from the right edge.

pub mod content;
pub mod lines;

use crate::config::LayoutConfig;
use crate::geometry::Rect;
use crate::pdf;
use crate::text::script::Direction;
use crate::text::shaping::fold_presentation_forms;
use content::{dedupe_overlapping, ContentInterpreter};
use lines::{assemble_blocks, cluster_lines, find_gutter};
use lopdf::{Document, ObjectId};
use serde::{Deserialize, Serialize};

/// A glyph with its user-space position.
#[derive(Debug, Clone, PartialEq)]
pub struct PositionedGlyph {
    /// Unicode text of the glyph (may be a ligature of several characters)
    pub text: String,
    /// Glyph box
    pub bbox: Rect,
    /// Baseline y coordinate
    pub baseline: f32,
    /// Effective font size after all transforms
    pub size: f32,
}

/// Structural kind of an assembled block.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Default, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum BlockKind {
    /// Running text
    #[default]
    Paragraph,
    /// Rows of at least three aligned cells
    Table,
}

/// A paragraph or table recovered from page geometry.
#[derive(Debug, Clone, PartialEq)]
pub struct LayoutBlock {
    /// Logical-order text; table rows are rendered as `a | b | c`
    pub text: String,
    /// Paragraph or table
    pub kind: BlockKind,
    /// Union of the block's line boxes
    pub bbox: Rect,
    /// Number of lines in the block
    pub line_count: usize,
}

/// Interpret a page and return its glyphs with presentation forms folded.
pub fn page_glyphs(doc: &Document, page_id: ObjectId) -> Vec<PositionedGlyph> {
    let content = match doc.get_page_content(page_id) {
        Ok(c) => c,
        Err(e) => {
            log::warn!("Page {:?} has no readable content: {}", page_id, e);
            return Vec::new();
        },
    };
    let resources = pdf::page_resources(doc, page_id);
    let glyphs = ContentInterpreter::new(doc, resources).run(&content, resources);
    let mut glyphs = dedupe_overlapping(glyphs);
    for glyph in &mut glyphs {
        glyph.text = fold_presentation_forms(&glyph.text);
    }
    glyphs
}

/// Analyze one page into blocks in reading order.
pub fn analyze_page(doc: &Document, page_id: ObjectId, config: &LayoutConfig) -> Vec<LayoutBlock> {
    let [x0, y0, x1, y1] = pdf::media_box(doc, page_id);
    let glyphs = clip_to_page(page_glyphs(doc, page_id), &Rect::from_corners(x0, y0, x1, y1));
    analyze_glyphs(glyphs, config)
}

/// Drop glyphs that fall outside `page` and clamp the rest to its
/// horizontal extent.
pub fn clip_to_page(glyphs: Vec<PositionedGlyph>, page: &Rect) -> Vec<PositionedGlyph> {
    if !page.is_finite() {
        return glyphs;
    }
    let total = glyphs.len();
    let kept: Vec<PositionedGlyph> = glyphs
        .into_iter()
        .filter(|g| g.bbox.is_finite() && g.bbox.overlaps(page))
        .map(|mut g| {
            g.bbox.x0 = g.bbox.x0.max(page.x0);
            g.bbox.x1 = g.bbox.x1.min(page.x1);
            g
        })
        .collect();
    if kept.len() < total {
        log::debug!("Dropped {} glyphs outside the page", total - kept.len());
    }
    kept
}

/// Assemble already positioned glyphs into blocks in reading order.
pub fn analyze_glyphs(mut glyphs: Vec<PositionedGlyph>, config: &LayoutConfig) -> Vec<LayoutBlock> {
    glyphs.retain(|g| g.bbox.is_finite() && g.baseline.is_finite() && g.size.is_finite());
    if glyphs.is_empty() {
        return Vec::new();
    }

    let Some(gutter) = find_gutter(&glyphs, config) else {
        let lines = cluster_lines(glyphs, config);
        return assemble_blocks(&lines, config);
    };

    let (left, right): (Vec<_>, Vec<_>) = glyphs.into_iter().partition(|g| g.bbox.center().x < gutter);
    let left_lines = cluster_lines(left, config);
    let right_lines = cluster_lines(right, config);

    let rtl_lines = left_lines
        .iter()
        .chain(right_lines.iter())
        .filter(|l| l.direction() == Direction::Rtl)
        .count();
    let page_rtl = rtl_lines * 2 > left_lines.len() + right_lines.len();
    log::debug!("Two columns split at x={:.1} ({})", gutter, if page_rtl { "rtl" } else { "ltr" });

    let (first, second) = if page_rtl { (right_lines, left_lines) } else { (left_lines, right_lines) };
    let mut blocks = assemble_blocks(&first, config);
    blocks.extend(assemble_blocks(&second, config));
    blocks
}

#[cfg(test)]
mod tests {
    use super::*;

    fn word(text: &str, x: f32, baseline: f32) -> Vec<PositionedGlyph> {
        text.chars()
            .enumerate()
            .map(|(i, c)| PositionedGlyph {
                text: c.to_string(),
                bbox: Rect::from_corners(x + i as f32 * 5.0, baseline - 2.0, x + i as f32 * 5.0 + 5.0, baseline + 8.0),
                baseline,
                size: 10.0,
            })
            .collect()
    }

    #[test]
    fn test_empty_page_has_no_blocks() {
        assert!(analyze_glyphs(Vec::new(), &LayoutConfig::default()).is_empty());
    }

    #[test]
    fn test_ltr_columns_left_first() {
        let mut glyphs = Vec::new();
        for i in 0..6 {
            let y = 700.0 - i as f32 * 12.0;
            glyphs.extend(word("left", 50.0, y));
            glyphs.extend(word("right", 300.0, y));
        }
        let blocks = analyze_glyphs(glyphs, &LayoutConfig::default());
        assert_eq!(blocks.len(), 2);
        assert!(blocks[0].text.starts_with("left"));
        assert!(blocks[1].text.starts_with("right"));
    }

    #[test]
    fn test_rtl_columns_right_first() {
        // Visual glyph order for "سلام" and "دنیا" (logical text reversed on the page).
        let mut glyphs = Vec::new();
        for i in 0..6 {
            let y = 700.0 - i as f32 * 12.0;
            glyphs.extend(word("مالس", 50.0, y));
            glyphs.extend(word("ایند", 300.0, y));
        }
        let blocks = analyze_glyphs(glyphs, &LayoutConfig::default());
        assert_eq!(blocks.len(), 2);
        assert!(blocks[0].text.starts_with("دنیا"));
        assert!(blocks[1].text.starts_with("سلام"));
    }

    #[test]
    fn test_non_finite_and_far_glyphs_do_not_derail_layout() {
        let mut glyphs: Vec<_> = (0..5).flat_map(|i| word("hello", 50.0, 700.0 - i as f32 * 12.0)).collect();
        glyphs.extend(word("far", 1e10, 700.0));
        glyphs.push(PositionedGlyph {
            text: "n".to_string(),
            bbox: Rect::from_corners(f32::NAN, 0.0, 5.0, 10.0),
            baseline: f32::NAN,
            size: 10.0,
        });
        let blocks = analyze_glyphs(glyphs, &LayoutConfig::default());
        assert!(blocks.iter().any(|b| b.text.contains("hello")));
        assert!(!blocks.iter().any(|b| b.text.contains('n')));
    }

    #[test]
    fn test_clip_to_page() {
        let page = Rect::from_corners(0.0, 0.0, 612.0, 792.0);
        let mut glyphs = word("in", 605.0, 700.0);
        glyphs.extend(word("out", 1e10, 700.0));
        glyphs.extend(word("below", 50.0, -500.0));
        let kept = clip_to_page(glyphs, &page);
        let texts: Vec<&str> = kept.iter().map(|g| g.text.as_str()).collect();
        assert_eq!(texts, vec!["i", "n"]);
        assert_eq!(kept[1].bbox.x1, 612.0);
    }

    #[test]
    fn test_analyze_page_ignores_text_placed_off_page() {
        use lopdf::content::{Content, Operation};
        use lopdf::Object;

        let lines = vec!["Rent is due on the first day of each month"; 3];
        let mut doc = Document::load_mem(&pdf::fixtures::text_pdf(&[lines])).unwrap();
        let page_id = pdf::pages(&doc)[0].1;
        let mut content = Content::decode(&doc.get_page_content(page_id).unwrap()).unwrap();
        content.operations.extend(vec![
            Operation::new("BT", vec![]),
            Operation::new("Tf", vec!["F1".into(), 12.into()]),
            Operation::new(
                "Tm",
                vec![1.into(), 0.into(), 0.into(), 1.into(), Object::Real(1e10), 700.into()],
            ),
            Operation::new("Tj", vec![Object::string_literal("hidden")]),
            Operation::new("ET", vec![]),
        ]);
        doc.change_page_content(page_id, content.encode().unwrap()).unwrap();

        let blocks = analyze_page(&doc, page_id, &LayoutConfig::default());
        let text: String = blocks.iter().map(|b| b.text.as_str()).collect();
        assert!(text.contains("Rent is due"));
        assert!(!text.contains("hidden"));
    }
}
