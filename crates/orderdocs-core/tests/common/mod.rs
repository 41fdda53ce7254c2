//! Shared helpers for orderdocs-core integration tests

#![allow(dead_code)]

use lopdf::{dictionary, Dictionary, Document, Object, Stream};
use orderdocs_core::{Config, OrderDocs, StoragePaths};
use tempfile::TempDir;

/// A PDF with one page per width; each page's MediaBox width identifies it
pub fn pdf(widths: &[i64]) -> Vec<u8> {
    let mut doc = Document::with_version("1.5");
    let pages_id = doc.new_object_id();
    let mut kids = Vec::new();
    for &width in widths {
        let content_id = doc.add_object(Stream::new(Dictionary::new(), Vec::new()));
        let page_id = doc.add_object(dictionary! {
            "Type" => "Page",
            "Parent" => pages_id,
            "MediaBox" => Object::Array(vec![
                Object::Integer(0),
                Object::Integer(0),
                Object::Integer(width),
                Object::Integer(100),
            ]),
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

/// A file-backed store in a temporary directory
pub struct TestStore {
    pub dir: TempDir,
    pub paths: StoragePaths,
}

impl TestStore {
    pub fn new() -> Self {
        let dir = TempDir::new().unwrap();
        let paths = StoragePaths {
            database: dir.path().join("data").join("orderdocs.db"),
            blob_root: dir.path().join("data").join("blobs"),
        };
        Self { dir, paths }
    }

    /// Open a new service handle (its own connection) on the same files
    pub fn open(&self) -> OrderDocs {
        OrderDocs::open(&Config::default(), &self.paths).unwrap()
    }
}
