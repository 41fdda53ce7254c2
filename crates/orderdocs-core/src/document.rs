//! PDF validation and page concatenation using lopdf
//!
//! A document is valid when it parses and has at least one page whose object
//! resolves. Concatenation flattens every page (copying inherited attributes
//! down from its page tree) and hangs all of them off one fresh page tree in
//! the caller's order.

use crate::blob::BlobStore;
use crate::error::{Error, Result};
use lopdf::{dictionary, Dictionary, Document, Object, ObjectId};
use std::collections::BTreeMap;

/// Page attributes a page may inherit from its ancestors in the page tree
const INHERITABLE_KEYS: [&[u8]; 4] = [b"Resources", b"MediaBox", b"CropBox", b"Rotate"];

/// Guard against cyclic `Parent` chains in malformed files
const MAX_TREE_DEPTH: usize = 64;

/// A parsed document that passed validation
pub struct ValidatedDocument {
    pub path: String,
    pub page_count: u32,
    document: Document,
}

impl std::fmt::Debug for ValidatedDocument {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("ValidatedDocument")
            .field("path", &self.path)
            .field("page_count", &self.page_count)
            .finish()
    }
}

/// Output of [`concatenate`]
#[derive(Debug)]
pub struct MergedDocument {
    pub bytes: Vec<u8>,
    pub page_count: u32,
}

/// Parse and validate document bytes
pub fn load(path: &str, bytes: &[u8]) -> Result<ValidatedDocument> {
    if bytes.is_empty() {
        return Err(Error::corrupt(path, "file is empty"));
    }
    let document = Document::load_mem(bytes).map_err(|e| Error::corrupt(path, e))?;

    let pages = document.get_pages();
    if pages.is_empty() {
        return Err(Error::corrupt(path, "document has no pages"));
    }
    for (number, page_id) in &pages {
        if document.get_dictionary(*page_id).is_err() {
            return Err(Error::corrupt(
                path,
                format!("page {number} does not resolve to a page object"),
            ));
        }
    }

    Ok(ValidatedDocument {
        path: path.to_string(),
        page_count: pages.len() as u32,
        document,
    })
}

/// Validate document bytes and return the page count
pub fn validate(path: &str, bytes: &[u8]) -> Result<u32> {
    load(path, bytes).map(|doc| doc.page_count)
}

/// Read a blob and validate it; a missing or unreadable blob counts as corrupt
pub fn load_blob(blobs: &dyn BlobStore, path: &str) -> Result<ValidatedDocument> {
    let bytes = blobs
        .retrieve_file(path)
        .map_err(|e| Error::corrupt(path, format!("unreadable: {e}")))?;
    let validated = load(path, &bytes)?;
    tracing::debug!("Validated {} ({} page(s))", path, validated.page_count);
    Ok(validated)
}

fn type_name(object: &Object) -> Option<&[u8]> {
    let dict = match object {
        Object::Dictionary(dict) => dict,
        Object::Stream(stream) => &stream.dict,
        _ => return None,
    };
    dict.get(b"Type").and_then(|t| t.as_name()).ok()
}

/// Objects rebuilt by concatenation rather than carried over
fn is_structural(object: &Object) -> bool {
    matches!(
        type_name(object),
        Some(b"Catalog" | b"Pages" | b"Page" | b"Outlines" | b"Outline" | b"XRef" | b"ObjStm")
    )
}

fn inherited_attribute(doc: &Document, page: &Dictionary, key: &[u8]) -> Option<Object> {
    let mut parent = page.get(b"Parent").and_then(|p| p.as_reference()).ok();
    for _ in 0..MAX_TREE_DEPTH {
        let node = doc.get_dictionary(parent?).ok()?;
        if let Ok(value) = node.get(key) {
            return Some(value.clone());
        }
        parent = node.get(b"Parent").and_then(|p| p.as_reference()).ok();
    }
    None
}

/// Concatenate the pages of every document, in the order given
pub fn concatenate(documents: Vec<ValidatedDocument>) -> Result<MergedDocument> {
    if documents.is_empty() {
        return Err(Error::Document("no documents to concatenate".to_string()));
    }

    let mut next_id = 1;
    let mut pages: Vec<(ObjectId, Dictionary)> = Vec::new();
    let mut objects: BTreeMap<ObjectId, Object> = BTreeMap::new();

    for validated in documents {
        let mut doc = validated.document;
        // Give every source a disjoint id range
        doc.renumber_objects_with(next_id);
        next_id = doc.max_id + 1;

        let page_ids: Vec<ObjectId> = doc.get_pages().into_values().collect();
        for page_id in page_ids {
            let mut page = doc
                .get_dictionary(page_id)
                .map_err(|e| Error::corrupt(&validated.path, e))?
                .clone();
            for key in INHERITABLE_KEYS {
                if !page.has(key) {
                    if let Some(value) = inherited_attribute(&doc, &page, key) {
                        page.set(key, value);
                    }
                }
            }
            pages.push((page_id, page));
        }

        objects.extend(
            doc.objects
                .into_iter()
                .filter(|(_, object)| !is_structural(object)),
        );
    }

    let page_count = pages.len() as u32;
    let mut output = Document::with_version("1.5");
    output.objects = objects;
    output.max_id = next_id - 1;

    let pages_id = output.new_object_id();
    let kids: Vec<Object> = pages.iter().map(|(id, _)| Object::Reference(*id)).collect();
    for (id, mut page) in pages {
        page.set("Parent", pages_id);
        output.objects.insert(id, Object::Dictionary(page));
    }
    output.objects.insert(
        pages_id,
        Object::Dictionary(dictionary! {
            "Type" => "Pages",
            "Kids" => kids,
            "Count" => i64::from(page_count),
        }),
    );
    let catalog_id = output.add_object(dictionary! {
        "Type" => "Catalog",
        "Pages" => pages_id,
    });
    output.trailer.set("Root", catalog_id);

    output.renumber_objects();
    output.compress();

    let mut bytes = Vec::new();
    output
        .save_to(&mut bytes)
        .map_err(|e| Error::Document(format!("failed to serialize output: {e}")))?;

    tracing::debug!("Concatenated {} page(s) into {} bytes", page_count, bytes.len());
    Ok(MergedDocument { bytes, page_count })
}

/// Synthesized PDFs for tests
#[cfg(test)]
pub(crate) mod fixtures {
    use lopdf::{dictionary, Dictionary, Document, Object, Stream};

    fn media_box(width: i64) -> Object {
        Object::Array(vec![
            Object::Integer(0),
            Object::Integer(0),
            Object::Integer(width),
            Object::Integer(100),
        ])
    }

    /// One page per entry; each page's MediaBox width is the entry
    pub fn pdf_with_widths(widths: &[i64]) -> Vec<u8> {
        let mut doc = Document::with_version("1.5");
        let pages_id = doc.new_object_id();
        let mut kids = Vec::new();
        for &width in widths {
            let content_id = doc.add_object(Stream::new(Dictionary::new(), Vec::new()));
            let page_id = doc.add_object(dictionary! {
                "Type" => "Page",
                "Parent" => pages_id,
                "MediaBox" => media_box(width),
                "Contents" => content_id,
            });
            kids.push(Object::Reference(page_id));
        }
        let count = kids.len() as i64;
        doc.objects.insert(
            pages_id,
            Object::Dictionary(dictionary! {
                "Type" => "Pages",
                "Kids" => kids,
                "Count" => count,
            }),
        );
        let catalog_id = doc.add_object(dictionary! {
            "Type" => "Catalog",
            "Pages" => pages_id,
        });
        doc.trailer.set("Root", catalog_id);
        let mut bytes = Vec::new();
        doc.save_to(&mut bytes).unwrap();
        bytes
    }

    pub fn pdf_with_pages(count: usize) -> Vec<u8> {
        let widths: Vec<i64> = (0..count as i64).map(|i| 100 + i).collect();
        pdf_with_widths(&widths)
    }

    /// Pages carry no MediaBox of their own; it lives on the page tree root
    pub fn pdf_with_inherited_box(count: usize, width: i64) -> Vec<u8> {
        let mut doc = Document::with_version("1.5");
        let pages_id = doc.new_object_id();
        let mut kids = Vec::new();
        for _ in 0..count {
            let page_id = doc.add_object(dictionary! {
                "Type" => "Page",
                "Parent" => pages_id,
            });
            kids.push(Object::Reference(page_id));
        }
        let total = kids.len() as i64;
        doc.objects.insert(
            pages_id,
            Object::Dictionary(dictionary! {
                "Type" => "Pages",
                "Kids" => kids,
                "Count" => total,
                "MediaBox" => media_box(width),
            }),
        );
        let catalog_id = doc.add_object(dictionary! {
            "Type" => "Catalog",
            "Pages" => pages_id,
        });
        doc.trailer.set("Root", catalog_id);
        let mut bytes = Vec::new();
        doc.save_to(&mut bytes).unwrap();
        bytes
    }

    /// MediaBox widths of every page, in page order
    pub fn page_widths(bytes: &[u8]) -> Vec<i64> {
        let doc = Document::load_mem(bytes).unwrap();
        doc.get_pages()
            .values()
            .map(|id| {
                let page = doc.get_dictionary(*id).unwrap();
                let media_box = page.get(b"MediaBox").unwrap().as_array().unwrap();
                media_box[2].as_i64().unwrap()
            })
            .collect()
    }
}

#[cfg(test)]
mod tests {
    use super::fixtures::*;
    use super::*;
    use crate::blob::MemBlobStore;

    #[test]
    fn test_validate_counts_pages() {
        assert_eq!(validate("a.pdf", &pdf_with_pages(3)).unwrap(), 3);
    }

    #[test]
    fn test_zero_page_document_is_corrupt() {
        let err = validate("empty.pdf", &pdf_with_widths(&[])).unwrap_err();
        match err {
            Error::CorruptArtifact { path, line, .. } => {
                assert_eq!(path, "empty.pdf");
                assert_eq!(line, None);
            }
            other => panic!("expected corrupt artifact, got {other:?}"),
        }
    }

    #[test]
    fn test_garbage_and_empty_bytes_are_corrupt() {
        assert!(matches!(
            validate("x.pdf", b"not a pdf at all"),
            Err(Error::CorruptArtifact { .. })
        ));
        assert!(matches!(
            validate("x.pdf", b""),
            Err(Error::CorruptArtifact { .. })
        ));
    }

    #[test]
    fn test_missing_blob_is_corrupt() {
        let blobs = MemBlobStore::new();
        let err = load_blob(&blobs, "converted/missing.pdf").unwrap_err();
        assert!(matches!(err, Error::CorruptArtifact { .. }));
    }

    #[test]
    fn test_concatenate_preserves_order_and_count() {
        let first = load("a.pdf", &pdf_with_widths(&[101, 102])).unwrap();
        let second = load("b.pdf", &pdf_with_widths(&[201])).unwrap();
        let third = load("c.pdf", &pdf_with_widths(&[301, 302, 303])).unwrap();

        let merged = concatenate(vec![third, first, second]).unwrap();
        assert_eq!(merged.page_count, 6);
        assert_eq!(
            page_widths(&merged.bytes),
            vec![301, 302, 303, 101, 102, 201]
        );
        assert_eq!(validate("merged.pdf", &merged.bytes).unwrap(), 6);
    }

    #[test]
    fn test_concatenate_same_source_twice() {
        let bytes = pdf_with_widths(&[150]);
        let merged = concatenate(vec![
            load("a.pdf", &bytes).unwrap(),
            load("a.pdf", &bytes).unwrap(),
        ])
        .unwrap();
        assert_eq!(page_widths(&merged.bytes), vec![150, 150]);
    }

    #[test]
    fn test_concatenate_copies_inherited_attributes() {
        let inherited = load("i.pdf", &pdf_with_inherited_box(2, 612)).unwrap();
        let plain = load("p.pdf", &pdf_with_widths(&[400])).unwrap();

        let merged = concatenate(vec![inherited, plain]).unwrap();
        assert_eq!(page_widths(&merged.bytes), vec![612, 612, 400]);
    }

    #[test]
    fn test_concatenate_nothing_is_an_error() {
        assert!(matches!(concatenate(Vec::new()), Err(Error::Document(_))));
    }
}
