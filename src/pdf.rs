//! Helpers over the lopdf object model shared by the PDF strategies.

use crate::document::PageLimit;
use crate::error::{Error, Result};
use lopdf::{Dictionary, Document, Object, ObjectId};

/// Maximum reference chain followed before giving up (cycles in broken files).
const MAX_INDIRECTION: usize = 16;

/// Load a PDF from memory, refusing files that need a password.
pub fn load(bytes: &[u8]) -> Result<Document> {
    if bytes.is_empty() {
        return Err(Error::Pdf("empty document".to_string()));
    }
    unlock(Document::load_mem(bytes)?)
}

/// Decrypt with the empty user password, which owner-only protection allows.
fn unlock(mut doc: Document) -> Result<Document> {
    if !doc.is_encrypted() {
        return Ok(doc);
    }
    match doc.decrypt("") {
        Ok(()) => {
            log::debug!("Opened encrypted PDF with the empty user password");
            Ok(doc)
        },
        Err(e) => {
            log::debug!("Empty user password rejected: {}", e);
            Err(Error::Encrypted)
        },
    }
}

/// Pages of the document in order, as `(1-based page number, object id)`.
pub fn pages(doc: &Document) -> Vec<(u32, ObjectId)> {
    doc.get_pages().into_iter().collect()
}

/// The leading pages allowed by `limit`, plus the total page count.
pub fn limited_pages(doc: &Document, limit: PageLimit) -> (Vec<(u32, ObjectId)>, usize) {
    let all = pages(doc);
    let total = all.len();
    let take = limit.pages_to_process(total);
    (all.into_iter().take(take).collect(), total)
}

/// Follow references until a direct object is reached.
pub fn resolve<'a>(doc: &'a Document, obj: &'a Object) -> &'a Object {
    let mut current = obj;
    for _ in 0..MAX_INDIRECTION {
        match current {
            Object::Reference(id) => match doc.get_object(*id) {
                Ok(next) => current = next,
                Err(_) => break,
            },
            _ => break,
        }
    }
    current
}

/// Look up `key` in `dict` and resolve it.
pub fn get<'a>(doc: &'a Document, dict: &'a Dictionary, key: &[u8]) -> Option<&'a Object> {
    dict.get(key).ok().map(|obj| resolve(doc, obj))
}

/// Look up `key` in `dict` and resolve it to a dictionary (stream dictionaries included).
pub fn get_dict<'a>(doc: &'a Document, dict: &'a Dictionary, key: &[u8]) -> Option<&'a Dictionary> {
    match get(doc, dict, key)? {
        Object::Dictionary(d) => Some(d),
        Object::Stream(s) => Some(&s.dict),
        _ => None,
    }
}

/// Numeric value of an integer or real object.
pub fn number(obj: &Object) -> Option<f32> {
    match obj {
        Object::Integer(i) => Some(*i as f32),
        Object::Real(r) => Some(*r as f32),
        _ => None,
    }
}

/// Name bytes of a name object.
pub fn name(obj: &Object) -> Option<&[u8]> {
    match obj {
        Object::Name(n) => Some(n.as_slice()),
        _ => None,
    }
}

/// Decoded content of a stream object; unfiltered streams are returned as is.
pub fn stream_bytes(obj: &Object) -> Option<Vec<u8>> {
    match obj {
        Object::Stream(s) => Some(s.decompressed_content().unwrap_or_else(|_| s.content.clone())),
        _ => None,
    }
}

/// Resources dictionary of a page, walking up the page tree for inherited resources.
pub fn page_resources(doc: &Document, page_id: ObjectId) -> Option<&Dictionary> {
    let mut node = doc.get_dictionary(page_id).ok()?;
    for _ in 0..MAX_INDIRECTION {
        if let Some(resources) = get_dict(doc, node, b"Resources") {
            return Some(resources);
        }
        node = get_dict(doc, node, b"Parent")?;
    }
    None
}

/// Page bounding box from the (inheritable) MediaBox, defaulting to US Letter.
pub fn media_box(doc: &Document, page_id: ObjectId) -> [f32; 4] {
    const LETTER: [f32; 4] = [0.0, 0.0, 612.0, 792.0];
    let Ok(mut node) = doc.get_dictionary(page_id) else {
        return LETTER;
    };
    for _ in 0..MAX_INDIRECTION {
        if let Some(Object::Array(values)) = get(doc, node, b"MediaBox") {
            let nums: Vec<f32> = values.iter().filter_map(|v| number(resolve(doc, v))).collect();
            if nums.len() == 4 {
                return [nums[0], nums[1], nums[2], nums[3]];
            }
        }
        match get_dict(doc, node, b"Parent") {
            Some(parent) => node = parent,
            None => break,
        }
    }
    LETTER
}

/// In-memory PDFs for unit tests.
#[cfg(test)]
pub(crate) mod fixtures {
    use lopdf::content::{Content, Operation};
    use lopdf::{dictionary, Document, Object, Stream};

    /// A PDF with one page per entry, each page drawing its lines top-down in
    /// 12pt Helvetica.
    pub fn text_pdf(pages: &[Vec<&str>]) -> Vec<u8> {
        let mut doc = Document::with_version("1.5");
        let pages_id = doc.new_object_id();
        let font_id = doc.add_object(dictionary! {
            "Type" => "Font",
            "Subtype" => "Type1",
            "BaseFont" => "Helvetica",
            "Encoding" => "WinAnsiEncoding",
        });
        let resources_id = doc.add_object(dictionary! {
            "Font" => dictionary! { "F1" => font_id },
        });

        let mut kids: Vec<Object> = Vec::new();
        for lines in pages {
            let mut operations = Vec::new();
            for (i, line) in lines.iter().enumerate() {
                operations.push(Operation::new("BT", vec![]));
                operations.push(Operation::new("Tf", vec!["F1".into(), 12.into()]));
                operations.push(Operation::new(
                    "Td",
                    vec![Object::Integer(72), Object::Integer(720 - 14 * i as i64)],
                ));
                operations.push(Operation::new("Tj", vec![Object::string_literal(*line)]));
                operations.push(Operation::new("ET", vec![]));
            }
            let content = Content { operations };
            let content_id = doc.add_object(Stream::new(dictionary! {}, content.encode().unwrap()));
            let page_id = doc.add_object(dictionary! {
                "Type" => "Page",
                "Parent" => pages_id,
                "Contents" => content_id,
            });
            kids.push(page_id.into());
        }

        doc.objects.insert(
            pages_id,
            Object::Dictionary(dictionary! {
                "Type" => "Pages",
                "Kids" => kids,
                "Count" => pages.len() as i64,
                "Resources" => resources_id,
                "MediaBox" => vec![0.into(), 0.into(), 612.into(), 792.into()],
            }),
        );
        let catalog_id = doc.add_object(dictionary! { "Type" => "Catalog", "Pages" => pages_id });
        doc.trailer.set("Root", catalog_id);
        let mut bytes = Vec::new();
        doc.save_to(&mut bytes).unwrap();
        bytes
    }
}
