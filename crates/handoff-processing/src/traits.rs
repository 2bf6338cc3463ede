use thiserror::Error;

use handoff_core::AppError;

#[derive(Debug, Error)]
pub enum CodecError {
    #[error("unsupported content type for PDF conversion: {0}")]
    UnsupportedType(String),

    #[error("failed to decode image: {0}")]
    Decode(String),

    #[error("failed to encode document: {0}")]
    Encode(String),

    #[error("document has no pages")]
    Empty,
}

impl From<CodecError> for AppError {
    fn from(err: CodecError) -> Self {
        AppError::Codec(err.to_string())
    }
}

/// A raster page to place into a document.
#[derive(Debug, Clone, Copy)]
pub struct PageSource<'a> {
    pub data: &'a [u8],
    pub content_type: &'a str,
}

/// Converts captured images into downloadable documents.
///
/// Implementations are pure and CPU bound; async callers should run them on
/// a blocking thread.
pub trait DocumentCodec: Send + Sync {
    /// Wraps one image in a single-page document sized to its pixel dimensions.
    fn image_to_pdf(&self, page: PageSource<'_>) -> Result<Vec<u8>, CodecError> {
        self.images_to_pdf(&[page])
    }

    /// Concatenates images into one multi-page document, one page per image.
    fn images_to_pdf(&self, pages: &[PageSource<'_>]) -> Result<Vec<u8>, CodecError>;

    /// Renders SVG source into a printable document.
    fn svg_to_pdf(&self, svg: &[u8]) -> Result<Vec<u8>, CodecError>;
}
