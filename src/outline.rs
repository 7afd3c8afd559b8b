//! Document outline entries built on top of `lopdf`.

use std::collections::BTreeMap;

use lopdf::{Dictionary, Document, Object, ObjectId};
use thiserror::Error;

/// Errors that can occur while embedding an outline into a written PDF.
#[derive(Error, Debug)]
pub enum OutlineError {
    /// The PDF bytes could not be parsed or re-serialized by `lopdf`.
    #[error("failed to process PDF bytes for outline: {0}")]
    Parse(#[from] lopdf::Error),

    /// The outlined document could not be written back to memory.
    #[error("failed to save outlined PDF: {0}")]
    Save(#[from] std::io::Error),

    /// The trailer has no catalog reference.
    #[error("PDF catalog entry is missing")]
    MissingCatalog,

    /// The catalog object is not a dictionary.
    #[error("PDF catalog entry is not a dictionary")]
    InvalidCatalog,

    /// An entry points at a page the document does not have.
    #[error("outline entry '{title}' refers to missing page {page_number}")]
    MissingPage { title: String, page_number: u32 },
}

/// A top-level outline entry targeting a 1-indexed page.
#[derive(Clone, Debug, PartialEq, Eq)]
pub struct OutlineEntry {
    pub title: String,
    pub page_number: u32,
}

impl OutlineEntry {
    pub fn new(title: impl Into<String>, page_number: u32) -> Self {
        Self {
            title: title.into(),
            page_number,
        }
    }
}

struct LinkedEntry {
    object_id: ObjectId,
    page_ref: ObjectId,
    title: String,
}

/// Adds a flat `/Outlines` tree where each entry opens its page with `/Fit`.
pub fn apply_page_outline(pdf_bytes: &[u8], entries: &[OutlineEntry]) -> Result<Vec<u8>, OutlineError> {
    if entries.is_empty() {
        return Ok(pdf_bytes.to_vec());
    }

    let mut document = Document::load_mem(pdf_bytes)?;
    let pages = document.get_pages();
    let linked = resolve_entries(&mut document, entries, &pages)?;

    let outlines_id = document.new_object_id();
    link_entries(outlines_id, &mut document, &linked);
    insert_outlines_root(outlines_id, &mut document, &linked)?;

    let mut buffer = Vec::new();
    document.save_to(&mut buffer)?;
    Ok(buffer)
}

fn resolve_entries(
    document: &mut Document,
    entries: &[OutlineEntry],
    pages: &BTreeMap<u32, ObjectId>,
) -> Result<Vec<LinkedEntry>, OutlineError> {
    entries
        .iter()
        .map(|entry| {
            let page_ref = pages
                .get(&entry.page_number)
                .copied()
                .ok_or_else(|| OutlineError::MissingPage {
                    title: entry.title.clone(),
                    page_number: entry.page_number,
                })?;
            Ok(LinkedEntry {
                object_id: document.new_object_id(),
                page_ref,
                title: entry.title.clone(),
            })
        })
        .collect()
}

fn link_entries(outlines_id: ObjectId, document: &mut Document, entries: &[LinkedEntry]) {
    for (index, entry) in entries.iter().enumerate() {
        let mut dictionary = Dictionary::new();
        dictionary.set("Title", Object::string_literal(entry.title.as_str()));
        dictionary.set(
            "Dest",
            Object::Array(vec![
                Object::Reference(entry.page_ref),
                Object::Name("Fit".into()),
            ]),
        );
        dictionary.set("Parent", Object::Reference(outlines_id));

        if index > 0 {
            dictionary.set("Prev", Object::Reference(entries[index - 1].object_id));
        }
        if let Some(next) = entries.get(index + 1) {
            dictionary.set("Next", Object::Reference(next.object_id));
        }

        document
            .objects
            .insert(entry.object_id, Object::Dictionary(dictionary));
    }
}

fn insert_outlines_root(
    outlines_id: ObjectId,
    document: &mut Document,
    entries: &[LinkedEntry],
) -> Result<(), OutlineError> {
    let catalog_id = document
        .trailer
        .get(b"Root")
        .and_then(Object::as_reference)
        .map_err(|_| OutlineError::MissingCatalog)?;

    let mut dictionary = Dictionary::new();
    dictionary.set("Type", Object::Name("Outlines".into()));
    dictionary.set("Count", Object::Integer(entries.len() as i64));
    if let (Some(first), Some(last)) = (entries.first(), entries.last()) {
        dictionary.set("First", Object::Reference(first.object_id));
        dictionary.set("Last", Object::Reference(last.object_id));
    }
    document
        .objects
        .insert(outlines_id, Object::Dictionary(dictionary));

    let catalog = document
        .objects
        .get_mut(&catalog_id)
        .ok_or(OutlineError::MissingCatalog)?
        .as_dict_mut()
        .map_err(|_| OutlineError::InvalidCatalog)?;
    catalog.set("Outlines", Object::Reference(outlines_id));

    Ok(())
}
