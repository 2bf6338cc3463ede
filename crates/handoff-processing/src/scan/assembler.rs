use bytes::Bytes;
use handoff_core::{ScanDocumentMode, ScanOutputFormat, ScanPageData};

use super::plan::plan_documents;
use crate::document::Artifact;
use crate::traits::{CodecError, DocumentCodec, PageSource};

/// One finished document of a scan session.
#[derive(Debug, Clone)]
pub enum AssembledDocument {
    /// All pages combined into one PDF.
    Combined(Artifact),
    /// Each page kept as its own file, in order.
    Discrete(Vec<Artifact>),
}

/// Turns buffered scan pages into downloadable documents.
///
/// Rendering is all-or-nothing: the first codec failure aborts assembly and
/// nothing is returned.
pub fn assemble(
    codec: &dyn DocumentCodec,
    pages: &[ScanPageData],
    mode: ScanDocumentMode,
    output: ScanOutputFormat,
) -> Result<Vec<AssembledDocument>, CodecError> {
    let plan = plan_documents(pages, mode);
    let mut documents = Vec::with_capacity(plan.len());

    for doc in plan {
        let assembled = match output {
            ScanOutputFormat::Pdf => {
                let sources: Vec<PageSource<'_>> = doc
                    .pages
                    .iter()
                    .map(|p| PageSource {
                        data: &p.data,
                        content_type: &p.content_type,
                    })
                    .collect();
                let pdf = codec.images_to_pdf(&sources).map_err(|e| {
                    tracing::error!(
                        document_index = doc.document_index,
                        error = %e,
                        "scan: PDF assembly failed"
                    );
                    e
                })?;
                AssembledDocument::Combined(Artifact {
                    data: Bytes::from(pdf),
                    content_type: "application/pdf".to_string(),
                    filename: format!("document-{}.pdf", doc.document_index),
                })
            }
            ScanOutputFormat::Images => AssembledDocument::Discrete(
                doc.pages
                    .iter()
                    .enumerate()
                    .map(|(n, p)| Artifact {
                        data: p.data.clone(),
                        content_type: p.content_type.clone(),
                        filename: format!("document-{}-page-{}", doc.document_index, n),
                    })
                    .collect(),
            ),
        };
        documents.push(assembled);
    }

    Ok(documents)
}
