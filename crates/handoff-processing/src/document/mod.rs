mod conversion;
mod pdf;

pub use conversion::{convert_for_output, Artifact};
pub use pdf::PdfCodec;
