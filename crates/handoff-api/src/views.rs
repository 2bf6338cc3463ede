//! Descriptions of the phone-facing pages, handed to the rendering layer.

use handoff_core::{ActionType, OutputFormat, ScanDocumentMode, ScanOutputFormat, Session};
use serde::Serialize;
use utoipa::ToSchema;
use uuid::Uuid;

use crate::constants::PHONE_PREFIX;

#[derive(Debug, Clone, PartialEq, Serialize, ToSchema)]
#[serde(tag = "view", rename_all = "snake_case")]
pub enum PageView {
    /// The task is already done; nothing left to capture.
    Completed { session_id: Uuid },
    /// Intro text with a link on to the capture screen.
    Intro {
        session_id: Uuid,
        intro_text: String,
        action_url: String,
    },
    /// The capture screen itself.
    Action(ActionView),
}

#[derive(Debug, Clone, PartialEq, Serialize, ToSchema)]
pub struct ActionView {
    pub session_id: Uuid,
    pub action_type: ActionType,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub output_format: Option<OutputFormat>,
    pub submit_url: String,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub scan: Option<ScanView>,
}

#[derive(Debug, Clone, PartialEq, Serialize, ToSchema)]
pub struct ScanView {
    pub document_mode: ScanDocumentMode,
    pub output_format: ScanOutputFormat,
    pub upload_url: String,
    pub finalize_url: String,
}

fn phone_url(id: Uuid, suffix: &str) -> String {
    format!("{}/{}/{}", PHONE_PREFIX, id, suffix)
}

impl PageView {
    pub fn completed(session: &Session) -> Self {
        PageView::Completed {
            session_id: session.id,
        }
    }

    pub fn intro(session: &Session, intro_text: &str) -> Self {
        PageView::Intro {
            session_id: session.id,
            intro_text: intro_text.to_string(),
            action_url: phone_url(session.id, "action"),
        }
    }

    pub fn action(session: &Session) -> Self {
        let scan = session.is_scan().then(|| ScanView {
            document_mode: session.document_mode(),
            output_format: session.scan_output_format(),
            upload_url: phone_url(session.id, "scan/upload"),
            finalize_url: phone_url(session.id, "scan/finalize"),
        });
        PageView::Action(ActionView {
            session_id: session.id,
            action_type: session.action_type,
            output_format: session.output_format,
            submit_url: phone_url(session.id, "result"),
            scan,
        })
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use handoff_core::OutputSelection;
    use std::time::Duration;

    fn session(action: ActionType, output: OutputSelection) -> Session {
        Session::new(
            action,
            output,
            None,
            Duration::from_secs(60),
            Duration::from_secs(60),
            "http://localhost:8080",
        )
    }

    #[test]
    fn test_scan_action_view_carries_scan_urls() {
        let s = session(
            ActionType::Scan,
            OutputSelection::Scan {
                document_mode: ScanDocumentMode::Multi,
                output_format: ScanOutputFormat::Pdf,
            },
        );
        let json = serde_json::to_value(PageView::action(&s)).unwrap();
        assert_eq!(json["view"], "action");
        assert_eq!(json["scan"]["document_mode"], "multi");
        assert_eq!(json["scan"]["upload_url"], format!("/s/{}/scan/upload", s.id));
        assert_eq!(json["submit_url"], format!("/s/{}/result", s.id));
    }

    #[test]
    fn test_photo_action_view_has_no_scan_block() {
        let s = session(ActionType::Photo, OutputSelection::File(OutputFormat::Jpg));
        let json = serde_json::to_value(PageView::action(&s)).unwrap();
        assert!(json.get("scan").is_none());
        assert_eq!(json["output_format"], "jpg");
    }

    #[test]
    fn test_intro_view_links_to_action() {
        let s = session(ActionType::Signature, OutputSelection::File(OutputFormat::Svg));
        match PageView::intro(&s, "Please sign") {
            PageView::Intro { action_url, .. } => {
                assert_eq!(action_url, format!("/s/{}/action", s.id))
            }
            other => panic!("expected intro view, got {:?}", other),
        }
    }
}
