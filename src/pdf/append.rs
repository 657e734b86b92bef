//! PDF appending using lopdf

use std::collections::BTreeMap;
use std::path::Path;
use lopdf::{Dictionary, Document, Object, ObjectId};
use crate::error::{Error, Result};

/// Page attributes a page may take from an ancestor in the page tree
const INHERITABLE_ATTRIBUTES: [&[u8]; 4] = [b"Resources", b"MediaBox", b"CropBox", b"Rotate"];

/// Guard against cyclic Parent chains in damaged files
const MAX_TREE_DEPTH: usize = 64;

/// Page counts of a finished append
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct AppendStats {
    /// Pages taken from the source document
    pub source_pages: usize,
    /// Pages taken from the appended document
    pub appended_pages: usize,
}

impl AppendStats {
    pub fn total_pages(&self) -> usize {
        self.source_pages + self.appended_pages
    }
}

/// Write to `output_path` a PDF holding every page of `source_path`
/// followed by every page of `append_path`
///
/// Neither input is modified.
///
/// # Example
///
/// ```no_run
/// use form_export_fixer::pdf::append_pdf;
/// use std::path::Path;
///
/// let stats = append_pdf(
///     Path::new("U1_Smith_FormA.pdf"),
///     Path::new("attachment.pdf"),
///     Path::new("combined.pdf"),
/// ).expect("Failed to append");
/// println!("{} pages", stats.total_pages());
/// ```
pub fn append_pdf(source_path: &Path, append_path: &Path, output_path: &Path) -> Result<AppendStats> {
    let source = load_document(source_path)?;
    let appended = load_document(append_path)?;

    let source_pages = source.get_pages().len();
    let appended_pages = appended.get_pages().len();

    let mut combined = concatenate(vec![source, appended])?;
    combined.compress();
    combined.save(output_path)?;

    Ok(AppendStats { source_pages, appended_pages })
}

/// Load a document and make sure it has at least one page
fn load_document(path: &Path) -> Result<Document> {
    if !path.exists() {
        return Err(Error::FileNotFound(path.to_path_buf()));
    }

    let doc = Document::load(path)?;
    if doc.get_pages().is_empty() {
        return Err(Error::EmptyPdf(path.to_path_buf()));
    }

    Ok(doc)
}

/// Build one document whose page tree lists the pages of `documents` in order
fn concatenate(documents: Vec<Document>) -> Result<Document> {
    let mut max_id = 1;
    let mut page_ids: Vec<ObjectId> = Vec::new();
    let mut objects: BTreeMap<ObjectId, Object> = BTreeMap::new();

    for mut doc in documents {
        // Renumber so object ids from different inputs can't collide
        doc.renumber_objects_with(max_id);
        max_id = doc.max_id + 1;

        // get_pages walks the tree in page order, 1..=N
        let pages: Vec<ObjectId> = doc.get_pages().into_values().collect();
        for &page_id in &pages {
            inherit_page_attributes(&mut doc, page_id)?;
        }

        page_ids.extend(pages);
        objects.extend(doc.objects);
    }

    let mut combined = Document::with_version("1.5");
    combined.objects.extend(objects);

    // new_object_id() must hand out ids above everything we just copied in
    combined.max_id = max_id - 1;

    let pages_id = combined.new_object_id();
    let catalog_id = combined.new_object_id();

    let kids: Vec<Object> = page_ids.iter().map(|&id| Object::Reference(id)).collect();

    let mut pages = Dictionary::new();
    pages.set("Type", Object::Name(b"Pages".to_vec()));
    pages.set("Count", Object::Integer(page_ids.len() as i64));
    pages.set("Kids", Object::Array(kids));

    let mut catalog = Dictionary::new();
    catalog.set("Type", Object::Name(b"Catalog".to_vec()));
    catalog.set("Pages", Object::Reference(pages_id));

    combined.objects.insert(pages_id, Object::Dictionary(pages));
    combined.objects.insert(catalog_id, Object::Dictionary(catalog));
    combined.trailer.set("Root", Object::Reference(catalog_id));

    for &page_id in &page_ids {
        if let Ok(Object::Dictionary(page)) = combined.get_object_mut(page_id) {
            page.set("Parent", Object::Reference(pages_id));
        }
    }

    Ok(combined)
}

/// Copy inheritable attributes from the page's ancestors onto the page itself
///
/// Once the page is re-parented under a flat Pages node, anything it used to
/// inherit would otherwise be lost.
fn inherit_page_attributes(doc: &mut Document, page_id: ObjectId) -> Result<()> {
    let mut inherited: Vec<(Vec<u8>, Object)> = Vec::new();
    {
        let page = doc.get_dictionary(page_id)?;
        let mut missing: Vec<&[u8]> = INHERITABLE_ATTRIBUTES
            .iter()
            .copied()
            .filter(|key| !page.has(key))
            .collect();
        let mut parent = page.get(b"Parent").and_then(Object::as_reference).ok();

        for _ in 0..MAX_TREE_DEPTH {
            let (Some(parent_id), false) = (parent, missing.is_empty()) else {
                break;
            };
            let node = doc.get_dictionary(parent_id)?;
            missing.retain(|key| match node.get(key) {
                Ok(value) => {
                    inherited.push((key.to_vec(), value.clone()));
                    false
                }
                Err(_) => true,
            });
            parent = node.get(b"Parent").and_then(Object::as_reference).ok();
        }
    }

    if !inherited.is_empty() {
        let page = doc.get_dictionary_mut(page_id)?;
        for (key, value) in inherited {
            page.set(key, value);
        }
    }

    Ok(())
}
