//! Content-stream interpreter producing positioned glyphs.
//!
//! Only the operators that affect where text lands are executed: graphics
//! state save/restore, `cm`, the text object, text state and text
//! positioning operators, the four text-showing operators, and `Do` for form
//! XObjects. Everything else is skipped.

use crate::fonts::{fonts_in_resources, FontDecoder};
use crate::geometry::{Matrix, Point, Rect};
use crate::layout::PositionedGlyph;
use crate::pdf;
use lopdf::content::Content;
use lopdf::{Dictionary, Document, Object};
use std::collections::HashMap;

/// Form XObjects nested deeper than this are ignored.
const MAX_FORM_DEPTH: usize = 4;
/// Ascent and descent as fractions of the em, for glyph boxes.
const ASCENT: f32 = 0.8;
const DESCENT: f32 = 0.2;

/// Graphics and text state saved by `q` and restored by `Q`.
#[derive(Debug, Clone)]
struct GraphicsState {
    ctm: Matrix,
    font: Option<Vec<u8>>,
    font_size: f32,
    char_spacing: f32,
    word_spacing: f32,
    horizontal_scale: f32,
    leading: f32,
    rise: f32,
}

impl Default for GraphicsState {
    fn default() -> Self {
        Self {
            ctm: Matrix::identity(),
            font: None,
            font_size: 0.0,
            char_spacing: 0.0,
            word_spacing: 0.0,
            horizontal_scale: 1.0,
            leading: 0.0,
            rise: 0.0,
        }
    }
}

/// Executes a page's content stream and records every visible glyph.
pub struct ContentInterpreter<'a> {
    doc: &'a Document,
    stack: Vec<GraphicsState>,
    state: GraphicsState,
    text_matrix: Matrix,
    line_matrix: Matrix,
    fonts: HashMap<Vec<u8>, FontDecoder>,
    fallback_font: FontDecoder,
    glyphs: Vec<PositionedGlyph>,
    depth: usize,
}

impl<'a> ContentInterpreter<'a> {
    /// Create an interpreter for content drawn with `resources`.
    pub fn new(doc: &'a Document, resources: Option<&Dictionary>) -> Self {
        let fonts = resources.map(|r| fonts_in_resources(doc, r)).unwrap_or_default();
        Self {
            doc,
            stack: Vec::new(),
            state: GraphicsState::default(),
            text_matrix: Matrix::identity(),
            line_matrix: Matrix::identity(),
            fonts,
            fallback_font: FontDecoder::fallback(),
            glyphs: Vec::new(),
            depth: 0,
        }
    }

    /// Run a decoded content stream and return the glyphs it drew.
    pub fn run(mut self, content: &[u8], resources: Option<&Dictionary>) -> Vec<PositionedGlyph> {
        self.execute(content, resources);
        self.glyphs
    }

    fn execute(&mut self, content: &[u8], resources: Option<&Dictionary>) {
        let content = match Content::decode(content) {
            Ok(c) => c,
            Err(e) => {
                log::warn!("Skipping undecodable content stream: {}", e);
                return;
            },
        };

        for op in &content.operations {
            let operands = &op.operands;
            let num = |i: usize| operands.get(i).and_then(pdf::number).unwrap_or(0.0);
            match op.operator.as_str() {
                "q" => self.stack.push(self.state.clone()),
                "Q" => {
                    if let Some(saved) = self.stack.pop() {
                        self.state = saved;
                    }
                },
                "cm" if operands.len() == 6 => {
                    let m = Matrix::new(num(0), num(1), num(2), num(3), num(4), num(5));
                    self.state.ctm = m.then(&self.state.ctm);
                },
                "BT" => {
                    self.text_matrix = Matrix::identity();
                    self.line_matrix = Matrix::identity();
                },
                "Tf" => {
                    self.state.font = operands.first().and_then(pdf::name).map(|n| n.to_vec());
                    self.state.font_size = num(1);
                },
                "Tc" => self.state.char_spacing = num(0),
                "Tw" => self.state.word_spacing = num(0),
                "Tz" => self.state.horizontal_scale = num(0) / 100.0,
                "TL" => self.state.leading = num(0),
                "Ts" => self.state.rise = num(0),
                "Td" => self.move_line(num(0), num(1)),
                "TD" => {
                    self.state.leading = -num(1);
                    self.move_line(num(0), num(1));
                },
                "Tm" if operands.len() == 6 => {
                    self.line_matrix = Matrix::new(num(0), num(1), num(2), num(3), num(4), num(5));
                    self.text_matrix = self.line_matrix;
                },
                "T*" => self.next_line(),
                "Tj" => {
                    if let Some(Object::String(bytes, _)) = operands.first() {
                        self.show(bytes);
                    }
                },
                "'" => {
                    self.next_line();
                    if let Some(Object::String(bytes, _)) = operands.first() {
                        self.show(bytes);
                    }
                },
                "\"" => {
                    self.state.word_spacing = num(0);
                    self.state.char_spacing = num(1);
                    self.next_line();
                    if let Some(Object::String(bytes, _)) = operands.get(2) {
                        self.show(bytes);
                    }
                },
                "TJ" => {
                    if let Some(Object::Array(items)) = operands.first() {
                        for item in items {
                            match item {
                                Object::String(bytes, _) => self.show(bytes),
                                other => {
                                    if let Some(adjust) = pdf::number(other) {
                                        let tx = -adjust / 1000.0
                                            * self.state.font_size
                                            * self.state.horizontal_scale;
                                        self.advance(tx);
                                    }
                                },
                            }
                        }
                    }
                },
                "Do" => {
                    if let (Some(name), Some(resources)) = (operands.first().and_then(pdf::name), resources) {
                        self.draw_form(name, resources);
                    }
                },
                _ => {},
            }
        }
    }

    fn move_line(&mut self, tx: f32, ty: f32) {
        self.line_matrix = Matrix::translation(tx, ty).then(&self.line_matrix);
        self.text_matrix = self.line_matrix;
    }

    fn next_line(&mut self) {
        self.move_line(0.0, -self.state.leading);
    }

    fn advance(&mut self, tx: f32) {
        self.text_matrix = Matrix::translation(tx, 0.0).then(&self.text_matrix);
    }

    fn show(&mut self, bytes: &[u8]) {
        let font = self
            .state
            .font
            .as_ref()
            .and_then(|name| self.fonts.get(name))
            .unwrap_or(&self.fallback_font);
        let decoded = font.decode(bytes);

        let size = self.state.font_size;
        let scale = self.state.horizontal_scale;
        for glyph in decoded {
            let render = Matrix::new(size * scale, 0.0, 0.0, size, 0.0, self.state.rise)
                .then(&self.text_matrix)
                .then(&self.state.ctm);
            let w0 = glyph.width / 1000.0;

            if !glyph.text.trim().is_empty() {
                let origin = render.apply(Point::new(0.0, 0.0));
                let end = render.apply(Point::new(w0, 0.0));
                let top = render.apply(Point::new(0.0, ASCENT));
                let bottom = render.apply(Point::new(0.0, -DESCENT));
                let x_min = origin.x.min(end.x);
                let x_max = origin.x.max(end.x);
                let bbox = Rect::from_corners(x_min, bottom.y.min(top.y), x_max, top.y.max(bottom.y));
                self.glyphs.push(PositionedGlyph {
                    text: glyph.text,
                    bbox,
                    baseline: origin.y,
                    size: render.vertical_scale(),
                });
            }

            let mut tx = w0 * size + self.state.char_spacing;
            if glyph.is_word_space {
                tx += self.state.word_spacing;
            }
            self.advance(tx * scale);
        }
    }

    fn draw_form(&mut self, name: &[u8], resources: &Dictionary) {
        if self.depth >= MAX_FORM_DEPTH {
            return;
        }
        let doc = self.doc;
        let Some(xobjects) = pdf::get_dict(doc, resources, b"XObject") else {
            return;
        };
        let Some(Object::Stream(stream)) = pdf::get(doc, xobjects, name) else {
            return;
        };
        if pdf::get(doc, &stream.dict, b"Subtype").and_then(pdf::name) != Some(b"Form".as_slice()) {
            return;
        }
        let data = stream.decompressed_content().unwrap_or_else(|_| stream.content.clone());

        let form_resources = pdf::get_dict(doc, &stream.dict, b"Resources").unwrap_or(resources);
        let form_matrix = match pdf::get(doc, &stream.dict, b"Matrix") {
            Some(Object::Array(m)) if m.len() == 6 => {
                let v: Vec<f32> = m.iter().map(|o| pdf::number(o).unwrap_or(0.0)).collect();
                Matrix::new(v[0], v[1], v[2], v[3], v[4], v[5])
            },
            _ => Matrix::identity(),
        };

        let saved_fonts = std::mem::replace(&mut self.fonts, fonts_in_resources(doc, form_resources));
        let saved_state = self.state.clone();
        let saved_text = (self.text_matrix, self.line_matrix);
        self.state.ctm = form_matrix.then(&self.state.ctm);
        self.depth += 1;

        self.execute(&data, Some(form_resources));

        self.depth -= 1;
        self.state = saved_state;
        (self.text_matrix, self.line_matrix) = saved_text;
        self.fonts = saved_fonts;
    }
}

/// Drop glyphs drawn twice at (almost) the same spot, as fake-bold rendering does.
pub fn dedupe_overlapping(glyphs: Vec<PositionedGlyph>) -> Vec<PositionedGlyph> {
    const WINDOW: usize = 8;
    let before = glyphs.len();
    let mut kept: Vec<PositionedGlyph> = Vec::with_capacity(glyphs.len());
    for glyph in glyphs {
        let area = glyph.bbox.area().max(f32::EPSILON);
        let duplicate = kept.iter().rev().take(WINDOW).any(|k| {
            k.text == glyph.text && k.bbox.intersection_area(&glyph.bbox) / area > 0.7
        });
        if !duplicate {
            kept.push(glyph);
        }
    }
    if kept.len() < before {
        log::debug!("Dropped {} overlapping glyphs", before - kept.len());
    }
    kept
}

#[cfg(test)]
mod tests {
    use super::*;
    use lopdf::content::Operation;
    use lopdf::dictionary;

    fn run_ops(ops: Vec<Operation>) -> Vec<PositionedGlyph> {
        let doc = Document::with_version("1.5");
        let bytes = Content { operations: ops }.encode().unwrap();
        ContentInterpreter::new(&doc, None).run(&bytes, None)
    }

    #[test]
    fn test_tj_positions_advance() {
        let glyphs = run_ops(vec![
            Operation::new("BT", vec![]),
            Operation::new("Tf", vec!["F1".into(), 10.into()]),
            Operation::new("Td", vec![100.into(), 700.into()]),
            Operation::new("Tj", vec![Object::string_literal("AB")]),
            Operation::new("ET", vec![]),
        ]);
        assert_eq!(glyphs.len(), 2);
        assert_eq!(glyphs[0].text, "A");
        assert!((glyphs[0].bbox.x0 - 100.0).abs() < 1e-3);
        // Fallback width is 500/1000 em at 10pt.
        assert!((glyphs[1].bbox.x0 - 105.0).abs() < 1e-3);
        assert!((glyphs[0].baseline - 700.0).abs() < 1e-3);
        assert!((glyphs[0].size - 10.0).abs() < 1e-3);
    }

    #[test]
    fn test_tj_array_kerning_and_spaces_skipped() {
        let glyphs = run_ops(vec![
            Operation::new("BT", vec![]),
            Operation::new("Tf", vec!["F1".into(), 10.into()]),
            Operation::new(
                "TJ",
                vec![Object::Array(vec![
                    Object::string_literal("A "),
                    Object::Integer(-1000),
                    Object::string_literal("B"),
                ])],
            ),
            Operation::new("ET", vec![]),
        ]);
        assert_eq!(glyphs.len(), 2);
        // A (5) + space (5) + kerning (10)
        assert!((glyphs[1].bbox.x0 - 20.0).abs() < 1e-3);
    }

    #[test]
    fn test_leading_and_next_line() {
        let glyphs = run_ops(vec![
            Operation::new("BT", vec![]),
            Operation::new("Tf", vec!["F1".into(), 12.into()]),
            Operation::new("TD", vec![50.into(), 500.into()]),
            Operation::new("Tj", vec![Object::string_literal("x")]),
            Operation::new("TL", vec![14.into()]),
            Operation::new("T*", vec![]),
            Operation::new("Tj", vec![Object::string_literal("y")]),
            Operation::new("ET", vec![]),
        ]);
        assert_eq!(glyphs.len(), 2);
        assert!((glyphs[1].baseline - 486.0).abs() < 1e-3);
        assert!((glyphs[1].bbox.x0 - 50.0).abs() < 1e-3);
    }

    #[test]
    fn test_ctm_and_state_restore() {
        let glyphs = run_ops(vec![
            Operation::new("q", vec![]),
            Operation::new("cm", vec![2.into(), 0.into(), 0.into(), 2.into(), 10.into(), 10.into()]),
            Operation::new("BT", vec![]),
            Operation::new("Tf", vec!["F1".into(), 10.into()]),
            Operation::new("Tj", vec![Object::string_literal("a")]),
            Operation::new("ET", vec![]),
            Operation::new("Q", vec![]),
            Operation::new("BT", vec![]),
            Operation::new("Tf", vec!["F1".into(), 10.into()]),
            Operation::new("Tj", vec![Object::string_literal("b")]),
            Operation::new("ET", vec![]),
        ]);
        assert_eq!(glyphs.len(), 2);
        assert!((glyphs[0].size - 20.0).abs() < 1e-3);
        assert!((glyphs[0].bbox.x0 - 10.0).abs() < 1e-3);
        assert!((glyphs[1].size - 10.0).abs() < 1e-3);
        assert!(glyphs[1].bbox.x0.abs() < 1e-3);
    }

    #[test]
    fn test_form_xobject_is_drawn() {
        let mut doc = Document::with_version("1.5");
        let form_content = Content {
            operations: vec![
                Operation::new("BT", vec![]),
                Operation::new("Tf", vec!["F1".into(), 10.into()]),
                Operation::new("Tj", vec![Object::string_literal("z")]),
                Operation::new("ET", vec![]),
            ],
        };
        let form = lopdf::Stream::new(
            dictionary! {
                "Type" => "XObject",
                "Subtype" => "Form",
                "Matrix" => vec![1.into(), 0.into(), 0.into(), 1.into(), 30.into(), 40.into()],
            },
            form_content.encode().unwrap(),
        );
        let form_id = doc.add_object(form);
        let resources = dictionary! { "XObject" => dictionary! { "X1" => form_id } };
        let page = Content { operations: vec![Operation::new("Do", vec!["X1".into()])] };

        let glyphs = ContentInterpreter::new(&doc, Some(&resources))
            .run(&page.encode().unwrap(), Some(&resources));
        assert_eq!(glyphs.len(), 1);
        assert_eq!(glyphs[0].text, "z");
        assert!((glyphs[0].bbox.x0 - 30.0).abs() < 1e-3);
        assert!((glyphs[0].baseline - 40.0).abs() < 1e-3);
    }

    #[test]
    fn test_dedupe_overlapping() {
        let glyph = |x: f32| PositionedGlyph {
            text: "a".to_string(),
            bbox: Rect::from_corners(x, 0.0, x + 5.0, 10.0),
            baseline: 2.0,
            size: 10.0,
        };
        let kept = dedupe_overlapping(vec![glyph(0.0), glyph(0.2), glyph(6.0)]);
        assert_eq!(kept.len(), 2);
    }
}
