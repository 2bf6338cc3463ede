use std::fmt;
use std::str::FromStr;
use std::time::Duration;

use chrono::{DateTime, Utc};
use serde::{Deserialize, Serialize};
use utoipa::ToSchema;
use uuid::Uuid;
use validator::Validate;

use super::result::ResultItem;
use super::scan::ScanResult;
use crate::error::AppError;

const MAX_TTL_DAYS: i64 = 365 * 100;

/// The task the phone user is asked to perform.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize, ToSchema)]
#[serde(rename_all = "snake_case")]
pub enum ActionType {
    Photo,
    Signature,
    Scan,
}

impl ActionType {
    pub fn as_str(&self) -> &'static str {
        match self {
            ActionType::Photo => "photo",
            ActionType::Signature => "signature",
            ActionType::Scan => "scan",
        }
    }
}

impl fmt::Display for ActionType {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.as_str())
    }
}

impl FromStr for ActionType {
    type Err = AppError;

    fn from_str(s: &str) -> Result<Self, Self::Err> {
        match s {
            "photo" => Ok(ActionType::Photo),
            "signature" => Ok(ActionType::Signature),
            "scan" => Ok(ActionType::Scan),
            other => Err(AppError::InvalidInput(format!(
                "unknown action type {:?}: must be 'photo', 'signature', or 'scan'",
                other
            ))),
        }
    }
}

/// Lifecycle state of a session.
///
/// `Expired` is never written to a live record. It is derived from the TTL
/// clock and only ever appears on tombstones.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize, ToSchema)]
#[serde(rename_all = "snake_case")]
pub enum SessionStatus {
    Pending,
    Opened,
    ActionStarted,
    Completed,
    Expired,
}

impl SessionStatus {
    pub fn as_str(&self) -> &'static str {
        match self {
            SessionStatus::Pending => "pending",
            SessionStatus::Opened => "opened",
            SessionStatus::ActionStarted => "action_started",
            SessionStatus::Completed => "completed",
            SessionStatus::Expired => "expired",
        }
    }

    pub fn is_terminal(&self) -> bool {
        matches!(self, SessionStatus::Completed | SessionStatus::Expired)
    }

    /// Position on the forward path; status never moves to a lower rank.
    fn rank(&self) -> u8 {
        match self {
            SessionStatus::Pending => 0,
            SessionStatus::Opened => 1,
            SessionStatus::ActionStarted => 2,
            SessionStatus::Completed | SessionStatus::Expired => 3,
        }
    }

    pub fn can_advance_to(&self, next: SessionStatus) -> bool {
        !self.is_terminal() && next.rank() > self.rank()
    }
}

impl fmt::Display for SessionStatus {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.as_str())
    }
}

impl FromStr for SessionStatus {
    type Err = AppError;

    fn from_str(s: &str) -> Result<Self, Self::Err> {
        match s {
            "pending" => Ok(SessionStatus::Pending),
            "opened" => Ok(SessionStatus::Opened),
            "action_started" => Ok(SessionStatus::ActionStarted),
            "completed" => Ok(SessionStatus::Completed),
            "expired" => Ok(SessionStatus::Expired),
            other => Err(AppError::InvalidInput(format!(
                "unknown session status {:?}",
                other
            ))),
        }
    }
}

/// File format for photo and signature results.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize, ToSchema)]
#[serde(rename_all = "lowercase")]
pub enum OutputFormat {
    Jpg,
    Png,
    Pdf,
    Svg,
}

impl OutputFormat {
    pub fn as_str(&self) -> &'static str {
        match self {
            OutputFormat::Jpg => "jpg",
            OutputFormat::Png => "png",
            OutputFormat::Pdf => "pdf",
            OutputFormat::Svg => "svg",
        }
    }

    /// Resolves a requested format against the formats an action supports.
    pub fn for_action(action: ActionType, value: &str) -> Result<Self, AppError> {
        let format = match (action, value) {
            (ActionType::Photo, "jpg") => OutputFormat::Jpg,
            (ActionType::Photo | ActionType::Signature, "png") => OutputFormat::Png,
            (ActionType::Photo | ActionType::Signature, "pdf") => OutputFormat::Pdf,
            (ActionType::Signature, "svg") => OutputFormat::Svg,
            (ActionType::Photo, _) => {
                return Err(AppError::InvalidInput(format!(
                    "invalid output format {:?} for action type 'photo': must be 'jpg', 'png', or 'pdf'",
                    value
                )))
            }
            (ActionType::Signature, _) => {
                return Err(AppError::InvalidInput(format!(
                    "invalid output format {:?} for action type 'signature': must be 'svg', 'png', or 'pdf'",
                    value
                )))
            }
            (ActionType::Scan, _) => {
                return Err(AppError::InvalidInput(
                    "scan sessions use scan output formats".to_string(),
                ))
            }
        };
        Ok(format)
    }
}

#[derive(Debug, Clone, Copy, Default, PartialEq, Eq, Serialize, Deserialize, ToSchema)]
#[serde(rename_all = "lowercase")]
pub enum ScanDocumentMode {
    #[default]
    Single,
    Multi,
}

impl ScanDocumentMode {
    pub fn as_str(&self) -> &'static str {
        match self {
            ScanDocumentMode::Single => "single",
            ScanDocumentMode::Multi => "multi",
        }
    }
}

impl FromStr for ScanDocumentMode {
    type Err = AppError;

    fn from_str(s: &str) -> Result<Self, Self::Err> {
        match s {
            "" | "single" => Ok(ScanDocumentMode::Single),
            "multi" => Ok(ScanDocumentMode::Multi),
            other => Err(AppError::InvalidInput(format!(
                "unknown scan document mode {:?}: must be 'single' or 'multi'",
                other
            ))),
        }
    }
}

#[derive(Debug, Clone, Copy, Default, PartialEq, Eq, Serialize, Deserialize, ToSchema)]
#[serde(rename_all = "lowercase")]
pub enum ScanOutputFormat {
    #[default]
    Pdf,
    Images,
}

impl ScanOutputFormat {
    pub fn as_str(&self) -> &'static str {
        match self {
            ScanOutputFormat::Pdf => "pdf",
            ScanOutputFormat::Images => "images",
        }
    }
}

impl FromStr for ScanOutputFormat {
    type Err = AppError;

    fn from_str(s: &str) -> Result<Self, Self::Err> {
        match s {
            "" | "pdf" => Ok(ScanOutputFormat::Pdf),
            "images" => Ok(ScanOutputFormat::Images),
            other => Err(AppError::InvalidInput(format!(
                "unknown scan output format {:?}: must be 'pdf' or 'images'",
                other
            ))),
        }
    }
}

/// Output selection, dependent on the action kind.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum OutputSelection {
    File(OutputFormat),
    Scan {
        document_mode: ScanDocumentMode,
        output_format: ScanOutputFormat,
    },
}

/// A delegated unit of work.
#[derive(Debug, Clone, Serialize, Deserialize, ToSchema)]
pub struct Session {
    pub id: Uuid,
    pub action_type: ActionType,
    pub status: SessionStatus,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub intro_text: Option<String>,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub output_format: Option<OutputFormat>,
    /// Session lifetime in nanoseconds on the wire.
    #[serde(with = "duration_nanos")]
    #[schema(value_type = u64)]
    pub session_ttl: Duration,
    #[serde(with = "duration_nanos")]
    #[schema(value_type = u64)]
    pub result_ttl: Duration,
    pub url: String,
    pub created_at: DateTime<Utc>,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub completed_at: Option<DateTime<Utc>>,
    #[serde(default, skip_serializing_if = "Vec::is_empty")]
    pub result: Vec<ResultItem>,
    #[serde(skip)]
    pub opened: bool,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub document_mode: Option<ScanDocumentMode>,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub scan_output_format: Option<ScanOutputFormat>,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub scan_result: Option<ScanResult>,
}

impl Session {
    /// Builds a fresh pending session whose phone URL hangs off `base_url`.
    pub fn new(
        action_type: ActionType,
        output: OutputSelection,
        intro_text: Option<String>,
        session_ttl: Duration,
        result_ttl: Duration,
        base_url: &str,
    ) -> Self {
        let id = Uuid::new_v4();
        let (output_format, document_mode, scan_output_format) = match output {
            OutputSelection::File(format) => (Some(format), None, None),
            OutputSelection::Scan {
                document_mode,
                output_format,
            } => (None, Some(document_mode), Some(output_format)),
        };

        Session {
            id,
            action_type,
            status: SessionStatus::Pending,
            intro_text: intro_text.filter(|text| !text.trim().is_empty()),
            output_format,
            session_ttl,
            result_ttl,
            url: format!("{}/s/{}", base_url.trim_end_matches('/'), id),
            created_at: Utc::now(),
            completed_at: None,
            result: Vec::new(),
            opened: false,
            document_mode,
            scan_output_format,
            scan_result: None,
        }
    }

    pub fn is_scan(&self) -> bool {
        self.action_type == ActionType::Scan
    }

    pub fn expires_at(&self) -> DateTime<Utc> {
        let ttl = chrono::Duration::from_std(self.session_ttl)
            .unwrap_or_else(|_| chrono::Duration::days(MAX_TTL_DAYS));
        self.created_at
            .checked_add_signed(ttl)
            .unwrap_or(DateTime::<Utc>::MAX_UTC)
    }

    /// Lifetime left at `now`; zero once the TTL clock has elapsed.
    pub fn remaining_ttl(&self, now: DateTime<Utc>) -> Duration {
        (self.expires_at() - now).to_std().unwrap_or(Duration::ZERO)
    }

    pub fn document_mode(&self) -> ScanDocumentMode {
        self.document_mode.unwrap_or_default()
    }

    pub fn scan_output_format(&self) -> ScanOutputFormat {
        self.scan_output_format.unwrap_or_default()
    }

    /// Whether results must be converted to PDF before storage.
    pub fn wants_pdf(&self) -> bool {
        self.output_format == Some(OutputFormat::Pdf)
    }
}

/// Minimal record proving that a session existed and has expired.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize, ToSchema)]
pub struct Tombstone {
    pub id: Uuid,
    pub status: SessionStatus,
}

impl Tombstone {
    pub fn for_session(id: Uuid) -> Self {
        Tombstone {
            id,
            status: SessionStatus::Expired,
        }
    }
}

#[derive(Debug, Clone, Default, Serialize, Deserialize, Validate, ToSchema)]
pub struct CreateSessionRequest {
    #[validate(length(min = 1, message = "action_type is required"))]
    pub action_type: String,
    #[serde(default)]
    #[validate(length(max = 10000, message = "intro_text is too long"))]
    pub intro_text: Option<String>,
    /// Required for photo and signature; `pdf` (default) or `images` for scan.
    #[serde(default)]
    pub output_format: Option<String>,
    /// Scan only: `single` (default) or `multi`.
    #[serde(default)]
    pub document_mode: Option<String>,
    /// Duration string such as `30m`; overrides the server default.
    #[serde(default)]
    pub session_ttl: Option<String>,
    #[serde(default)]
    pub result_ttl: Option<String>,
}

impl CreateSessionRequest {
    pub fn action(&self) -> Result<ActionType, AppError> {
        self.action_type.parse()
    }

    pub fn output_selection(&self, action: ActionType) -> Result<OutputSelection, AppError> {
        let requested = self.output_format.as_deref().unwrap_or("");
        match action {
            ActionType::Scan => Ok(OutputSelection::Scan {
                document_mode: self.document_mode.as_deref().unwrap_or("").parse()?,
                output_format: requested.parse()?,
            }),
            _ if requested.is_empty() => Err(AppError::InvalidInput(
                "output_format is required".to_string(),
            )),
            _ => Ok(OutputSelection::File(OutputFormat::for_action(
                action, requested,
            )?)),
        }
    }

    pub fn session_ttl_or(&self, default: Duration) -> Result<Duration, AppError> {
        parse_ttl("session_ttl", self.session_ttl.as_deref(), default)
    }

    pub fn result_ttl_or(&self, default: Duration) -> Result<Duration, AppError> {
        parse_ttl("result_ttl", self.result_ttl.as_deref(), default)
    }
}

fn parse_ttl(field: &str, value: Option<&str>, default: Duration) -> Result<Duration, AppError> {
    match value.map(str::trim).filter(|v| !v.is_empty()) {
        None => Ok(default),
        Some(v) => {
            let ttl = crate::config::parse_duration(v)
                .map_err(|e| AppError::InvalidInput(format!("invalid {}: {}", field, e)))?;
            if ttl.is_zero() {
                return Err(AppError::InvalidInput(format!(
                    "invalid {}: must be greater than zero",
                    field
                )));
            }
            Ok(ttl)
        }
    }
}

/// Serializes a [`Duration`] as integer nanoseconds.
pub mod duration_nanos {
    use std::time::Duration;

    use serde::{Deserialize, Deserializer, Serializer};

    pub fn serialize<S: Serializer>(value: &Duration, serializer: S) -> Result<S::Ok, S::Error> {
        serializer.serialize_u64(u64::try_from(value.as_nanos()).unwrap_or(u64::MAX))
    }

    pub fn deserialize<'de, D: Deserializer<'de>>(deserializer: D) -> Result<Duration, D::Error> {
        Ok(Duration::from_nanos(u64::deserialize(deserializer)?))
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    fn photo_session() -> Session {
        Session::new(
            ActionType::Photo,
            OutputSelection::File(OutputFormat::Jpg),
            Some("Take a photo of the meter".to_string()),
            Duration::from_secs(1800),
            Duration::from_secs(300),
            "https://handoff.example.com/",
        )
    }

    #[test]
    fn test_new_session_is_pending() {
        let session = photo_session();
        assert_eq!(session.status, SessionStatus::Pending);
        assert!(!session.opened);
        assert!(session.completed_at.is_none());
        assert_eq!(
            session.url,
            format!("https://handoff.example.com/s/{}", session.id)
        );
    }

    #[test]
    fn test_opened_flag_is_not_serialized() {
        let mut session = photo_session();
        session.opened = true;
        let json = serde_json::to_value(&session).unwrap();
        assert!(json.get("opened").is_none());
        assert!(json.get("document_mode").is_none());
        assert!(json.get("scan_result").is_none());
        assert_eq!(json["session_ttl"], 1_800_000_000_000u64);
        assert_eq!(json["status"], "pending");
    }

    #[test]
    fn test_status_only_moves_forward() {
        assert!(SessionStatus::Pending.can_advance_to(SessionStatus::Opened));
        assert!(SessionStatus::Pending.can_advance_to(SessionStatus::ActionStarted));
        assert!(SessionStatus::Opened.can_advance_to(SessionStatus::Completed));
        assert!(!SessionStatus::ActionStarted.can_advance_to(SessionStatus::Opened));
        assert!(!SessionStatus::Completed.can_advance_to(SessionStatus::Completed));
        assert!(!SessionStatus::Expired.can_advance_to(SessionStatus::Opened));
    }

    #[test]
    fn test_remaining_ttl_saturates_at_zero() {
        let mut session = photo_session();
        session.created_at = Utc::now() - chrono::Duration::hours(1);
        assert_eq!(session.remaining_ttl(Utc::now()), Duration::ZERO);
    }

    #[test]
    fn test_output_selection_rules() {
        let mut req = CreateSessionRequest {
            action_type: "signature".to_string(),
            output_format: Some("svg".to_string()),
            ..Default::default()
        };
        let action = req.action().unwrap();
        assert_eq!(
            req.output_selection(action).unwrap(),
            OutputSelection::File(OutputFormat::Svg)
        );

        req.action_type = "photo".to_string();
        assert!(req.output_selection(ActionType::Photo).is_err());

        req.output_format = None;
        assert!(req.output_selection(ActionType::Photo).is_err());
        assert_eq!(
            req.output_selection(ActionType::Scan).unwrap(),
            OutputSelection::Scan {
                document_mode: ScanDocumentMode::Single,
                output_format: ScanOutputFormat::Pdf,
            }
        );

        req.document_mode = Some("double".to_string());
        assert!(req.output_selection(ActionType::Scan).is_err());
    }

    #[test]
    fn test_unknown_action_is_invalid_input() {
        let req = CreateSessionRequest {
            action_type: "video".to_string(),
            ..Default::default()
        };
        assert!(matches!(req.action(), Err(AppError::InvalidInput(_))));
    }

    #[test]
    fn test_ttl_overrides() {
        let req = CreateSessionRequest {
            action_type: "photo".to_string(),
            session_ttl: Some("1h".to_string()),
            result_ttl: Some("later".to_string()),
            ..Default::default()
        };
        assert_eq!(
            req.session_ttl_or(Duration::from_secs(60)).unwrap(),
            Duration::from_secs(3600)
        );
        assert!(req.result_ttl_or(Duration::from_secs(60)).is_err());
    }
}
