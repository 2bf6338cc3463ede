use bytes::Bytes;
use serde::{Deserialize, Serialize};
use utoipa::ToSchema;

/// A buffered page upload, owned by the store until finalize or expiry.
#[derive(Debug, Clone)]
pub struct ScanPageData {
    pub document_index: u32,
    pub page_index: u32,
    pub data: Bytes,
    pub content_type: String,
}

#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize, ToSchema)]
pub struct ScanPage {
    pub url: String,
    pub content_type: String,
}

/// One assembled document: either a combined PDF or its discrete pages.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize, ToSchema)]
pub struct ScanDocument {
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub pdf_url: Option<String>,
    #[serde(default, skip_serializing_if = "Vec::is_empty")]
    pub pages: Vec<ScanPage>,
}

impl ScanDocument {
    pub fn combined(pdf_url: String) -> Self {
        ScanDocument {
            pdf_url: Some(pdf_url),
            pages: Vec::new(),
        }
    }

    pub fn discrete(pages: Vec<ScanPage>) -> Self {
        ScanDocument {
            pdf_url: None,
            pages,
        }
    }
}

#[derive(Debug, Clone, Default, PartialEq, Eq, Serialize, Deserialize, ToSchema)]
pub struct ScanResult {
    pub documents: Vec<ScanDocument>,
}

#[derive(Debug, Clone, Serialize, Deserialize, ToSchema)]
pub struct ScanUploadResponse {
    pub status: String,
    pub document_index: u32,
    pub page_index: u32,
}

#[derive(Debug, Clone, Serialize, Deserialize, ToSchema)]
pub struct ScanFinalizeResponse {
    pub status: String,
    pub scan_result: ScanResult,
}
