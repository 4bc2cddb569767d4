//! Line, column, paragraph and table assembly from positioned glyphs.

use crate::config::LayoutConfig;
use crate::geometry::Rect;
use crate::layout::{BlockKind, LayoutBlock, PositionedGlyph};
use crate::text::script::{dominant_direction, Direction};
use crate::text::shaping::visual_units_to_logical;

/// A visual line: glyphs sharing a baseline, sorted left to right.
#[derive(Debug, Clone)]
pub struct Line {
    /// Glyphs in visual (left-to-right) order
    pub glyphs: Vec<PositionedGlyph>,
    /// Mean baseline
    pub baseline: f32,
    /// Largest glyph size on the line
    pub size: f32,
    /// Union of glyph boxes
    pub bbox: Rect,
}

impl Line {
    fn from_glyphs(mut glyphs: Vec<PositionedGlyph>) -> Self {
        glyphs.sort_by(|a, b| crate::utils::safe_float_cmp(a.bbox.x0, b.bbox.x0));
        let baseline = glyphs.iter().map(|g| g.baseline).sum::<f32>() / glyphs.len().max(1) as f32;
        let size = glyphs.iter().map(|g| g.size).fold(0.0, f32::max);
        let bbox = glyphs
            .iter()
            .skip(1)
            .fold(glyphs.first().map(|g| g.bbox).unwrap_or_default(), |acc, g| acc.union(&g.bbox));
        Self {
            glyphs,
            baseline,
            size,
            bbox,
        }
    }

    /// Base direction from the majority of strong characters.
    pub fn direction(&self) -> Direction {
        dominant_direction(self.glyphs.iter().flat_map(|g| g.text.chars()))
    }

    /// Split into cells at horizontal gaps wider than `cell_gap_ratio` × size.
    /// Cells are returned in visual order.
    pub fn cells(&self, config: &LayoutConfig) -> Vec<&[PositionedGlyph]> {
        let mut cells = Vec::new();
        let mut start = 0;
        for i in 1..self.glyphs.len() {
            let gap = self.glyphs[i].bbox.x0 - self.glyphs[i - 1].bbox.x1;
            let size = self.glyphs[i].size.max(self.glyphs[i - 1].size);
            if gap > config.cell_gap_ratio * size {
                cells.push(&self.glyphs[start..i]);
                start = i;
            }
        }
        if start < self.glyphs.len() {
            cells.push(&self.glyphs[start..]);
        }
        cells
    }

    /// Logical text of the whole line.
    pub fn text(&self, config: &LayoutConfig) -> String {
        glyph_run_text(&self.glyphs, self.direction(), config)
    }
}

/// Logical text of a run of visually ordered glyphs, with word spaces
/// inserted at gaps wider than `word_gap_ratio` × size.
pub fn glyph_run_text(glyphs: &[PositionedGlyph], base: Direction, config: &LayoutConfig) -> String {
    let mut units: Vec<String> = Vec::with_capacity(glyphs.len() * 2);
    for (i, glyph) in glyphs.iter().enumerate() {
        if i > 0 {
            let prev = &glyphs[i - 1];
            let gap = glyph.bbox.x0 - prev.bbox.x1;
            if gap > config.word_gap_ratio * glyph.size.max(prev.size) {
                units.push(" ".to_string());
            }
        }
        units.push(glyph.text.clone());
    }
    visual_units_to_logical(units, base).concat()
}

/// Group glyphs into lines by baseline, top of the page first.
pub fn cluster_lines(glyphs: Vec<PositionedGlyph>, config: &LayoutConfig) -> Vec<Line> {
    let mut sorted = glyphs;
    sorted.sort_by(|a, b| crate::utils::safe_float_cmp(b.baseline, a.baseline));

    let mut lines: Vec<Vec<PositionedGlyph>> = Vec::new();
    let mut current_baseline = f32::NAN;
    for glyph in sorted {
        let tolerance = config.baseline_tolerance * glyph.size.max(1.0);
        match lines.last_mut() {
            Some(line) if (glyph.baseline - current_baseline).abs() <= tolerance => {
                line.push(glyph);
            },
            _ => {
                current_baseline = glyph.baseline;
                lines.push(vec![glyph]);
            },
        }
    }
    lines.into_iter().map(Line::from_glyphs).collect()
}

/// Upper bound on coverage bins; wider extents are binned more coarsely.
const MAX_GUTTER_BINS: usize = 4096;

/// Find a vertical gutter splitting the page into two columns.
///
/// Returns the gutter's center x. A gutter is an empty vertical band at
/// least `min_gutter_width` wide, in the middle 60% of the text extent,
/// with a meaningful share of glyphs on each side.
pub fn find_gutter(glyphs: &[PositionedGlyph], config: &LayoutConfig) -> Option<f32> {
    if glyphs.len() < 20 {
        return None;
    }
    let x_min = glyphs.iter().map(|g| g.bbox.x0).fold(f32::INFINITY, f32::min);
    let x_max = glyphs.iter().map(|g| g.bbox.x1).fold(f32::NEG_INFINITY, f32::max);
    let extent = x_max - x_min;
    if !extent.is_finite() || extent < 3.0 * config.min_gutter_width {
        return None;
    }

    // Points per bin: one point for ordinary pages.
    let resolution = (extent / MAX_GUTTER_BINS as f32).max(1.0);
    let to_bin = |x: f32| ((x - x_min) / resolution).max(0.0);
    let bins = (to_bin(x_max).ceil() as usize).min(MAX_GUTTER_BINS) + 1;
    let mut covered = vec![false; bins];
    for g in glyphs {
        let lo = to_bin(g.bbox.x0) as usize;
        let hi = (to_bin(g.bbox.x1).ceil() as usize).min(bins - 1);
        for slot in covered.iter_mut().take(hi + 1).skip(lo) {
            *slot = true;
        }
    }

    let search_lo = (to_bin(x_min + extent * 0.2) as usize).min(bins - 1);
    let search_hi = (to_bin(x_min + extent * 0.8) as usize).min(bins - 1);
    let mut best: Option<(usize, usize)> = None;
    let mut run_start = None;
    for (i, &is_covered) in covered.iter().enumerate().take(search_hi + 1).skip(search_lo) {
        match (is_covered, run_start) {
            (false, None) => run_start = Some(i),
            (true, Some(start)) => {
                if best.map_or(true, |(s, e)| i - start > e - s) {
                    best = Some((start, i));
                }
                run_start = None;
            },
            _ => {},
        }
    }
    if let Some(start) = run_start {
        let end = search_hi + 1;
        if best.map_or(true, |(s, e)| end - start > e - s) {
            best = Some((start, end));
        }
    }

    let (start, end) = best?;
    if ((end - start) as f32 * resolution) < config.min_gutter_width {
        return None;
    }
    let gutter = x_min + (start + end) as f32 / 2.0 * resolution;
    let left = glyphs.iter().filter(|g| g.bbox.x1 <= gutter).count();
    let right = glyphs.len() - left;
    let min_side = glyphs.len() / 5;
    (left >= min_side && right >= min_side).then_some(gutter)
}

/// Assemble the blocks of one page (or one column) in reading order.
pub fn assemble_blocks(lines: &[Line], config: &LayoutConfig) -> Vec<LayoutBlock> {
    let mut blocks = Vec::new();
    let mut i = 0;
    while i < lines.len() {
        let table_end = table_run_end(lines, i, config);
        if table_end - i >= config.min_table_rows {
            blocks.push(table_block(&lines[i..table_end], config));
            i = table_end;
            continue;
        }

        let mut end = i + 1;
        while end < lines.len()
            && table_run_end(lines, end, config) - end < config.min_table_rows
            && continues_paragraph(&lines[end - 1], &lines[end], config)
        {
            end += 1;
        }
        blocks.push(paragraph_block(&lines[i..end], config));
        i = end;
    }
    blocks
}

fn continues_paragraph(prev: &Line, next: &Line, config: &LayoutConfig) -> bool {
    let gap = prev.baseline - next.baseline;
    let height = prev.size.max(next.size).max(1.0);
    gap > 0.0 && gap <= config.paragraph_gap_ratio * height
}

/// Index one past the last line of a table starting at `start` (== `start` when none).
fn table_run_end(lines: &[Line], start: usize, config: &LayoutConfig) -> usize {
    let mut end = start;
    while end < lines.len() && lines[end].cells(config).len() >= config.min_table_columns {
        if end > start && !continues_paragraph(&lines[end - 1], &lines[end], config) {
            break;
        }
        end += 1;
    }
    end
}

fn paragraph_block(lines: &[Line], config: &LayoutConfig) -> LayoutBlock {
    let text = lines
        .iter()
        .map(|l| l.text(config))
        .collect::<Vec<_>>()
        .join("\n");
    LayoutBlock {
        text,
        kind: BlockKind::Paragraph,
        bbox: union_of(lines),
        line_count: lines.len(),
    }
}

fn table_block(lines: &[Line], config: &LayoutConfig) -> LayoutBlock {
    let rows: Vec<String> = lines
        .iter()
        .map(|line| {
            let direction = line.direction();
            let mut cells: Vec<String> = line
                .cells(config)
                .into_iter()
                .map(|cell| {
                    let cell_dir = dominant_direction(cell.iter().flat_map(|g| g.text.chars()));
                    glyph_run_text(cell, cell_dir, config)
                })
                .collect();
            if direction == Direction::Rtl {
                cells.reverse();
            }
            cells.join(" | ")
        })
        .collect();
    LayoutBlock {
        text: rows.join("\n"),
        kind: BlockKind::Table,
        bbox: union_of(lines),
        line_count: lines.len(),
    }
}

fn union_of(lines: &[Line]) -> Rect {
    lines
        .iter()
        .skip(1)
        .fold(lines.first().map(|l| l.bbox).unwrap_or_default(), |acc, l| acc.union(&l.bbox))
}
