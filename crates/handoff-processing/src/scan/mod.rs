mod assembler;
mod plan;

pub use assembler::{assemble, AssembledDocument};
pub use plan::{effective_document_index, plan_documents, PlannedDocument};
