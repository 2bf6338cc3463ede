//! Grouping and ordering of buffered scan pages.

use std::collections::BTreeMap;

use handoff_core::{ScanDocumentMode, ScanPageData};

/// Pages of one output document, in final order.
#[derive(Debug)]
pub struct PlannedDocument<'a> {
    pub document_index: u32,
    pub pages: Vec<&'a ScanPageData>,
}

/// Document index a page is filed under. Single-document sessions always
/// use document 0.
pub fn effective_document_index(mode: ScanDocumentMode, requested: u32) -> u32 {
    match mode {
        ScanDocumentMode::Single => 0,
        ScanDocumentMode::Multi => requested,
    }
}

/// Groups pages by document index and orders them by page index.
///
/// Groups come out in ascending document index. Within a group the sort is
/// stable, so pages sharing a page index keep their upload order.
pub fn plan_documents(pages: &[ScanPageData], mode: ScanDocumentMode) -> Vec<PlannedDocument<'_>> {
    let mut groups: BTreeMap<u32, Vec<&ScanPageData>> = BTreeMap::new();
    for page in pages {
        groups
            .entry(effective_document_index(mode, page.document_index))
            .or_default()
            .push(page);
    }

    groups
        .into_iter()
        .map(|(document_index, mut pages)| {
            pages.sort_by_key(|p| p.page_index);
            PlannedDocument {
                document_index,
                pages,
            }
        })
        .collect()
}
