//! Handoff Processing Library
//!
//! Scan page assembly and the image/document codec used to render session
//! results into downloadable files.

pub mod document;
pub mod image;
pub mod scan;
pub mod traits;

pub use self::document::{convert_for_output, Artifact, PdfCodec};
pub use self::image::{ImageProcessor, NormalizedImage};
pub use self::scan::{assemble, effective_document_index, plan_documents, AssembledDocument, PlannedDocument};
pub use self::traits::{CodecError, DocumentCodec, PageSource};
