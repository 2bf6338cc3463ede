use bytes::Bytes;

use crate::traits::{CodecError, DocumentCodec, PageSource};

pub const PDF_CONTENT_TYPE: &str = "application/pdf";

/// A rendered file ready to be stored for download.
#[derive(Debug, Clone)]
pub struct Artifact {
    pub data: Bytes,
    pub content_type: String,
    pub filename: String,
}

/// Prepares one submitted file for storage.
///
/// When the session asks for PDF output, SVG sources are typeset and other
/// images are wrapped in a page of their own size; the filename extension
/// becomes `.pdf`. Anything else passes through untouched.
pub fn convert_for_output(
    codec: &dyn DocumentCodec,
    wants_pdf: bool,
    content_type: &str,
    filename: &str,
    data: Vec<u8>,
) -> Result<Artifact, CodecError> {
    if wants_pdf && content_type.starts_with("image/") {
        let pdf = if content_type.starts_with("image/svg") {
            codec.svg_to_pdf(&data)?
        } else {
            codec.image_to_pdf(PageSource {
                data: &data,
                content_type,
            })?
        };
        return Ok(Artifact {
            data: Bytes::from(pdf),
            content_type: PDF_CONTENT_TYPE.to_string(),
            filename: with_pdf_extension(filename),
        });
    }

    Ok(Artifact {
        data: Bytes::from(data),
        content_type: content_type.to_string(),
        filename: filename.to_string(),
    })
}

fn with_pdf_extension(filename: &str) -> String {
    match filename.rfind('.') {
        Some(idx) => format!("{}.pdf", &filename[..idx]),
        None => format!("{}.pdf", filename),
    }
}
