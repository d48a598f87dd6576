//! Plan request and response shapes
//!
//! The service-layer contract a transport would mount. Every response, error
//! or not, carries the run fingerprint and trace identifiers.

use std::collections::BTreeMap;

use serde::{Deserialize, Serialize};

use crate::domain::{DegradeLevel, Issue, Itinerary, RunFingerprint};
use crate::error::PlanError;
use crate::intake::{ConstraintDraft, FieldEvidence};
use crate::repair::EditPatch;

/// One planning request
#[derive(Debug, Clone, Default, Serialize, Deserialize)]
#[serde(default)]
pub struct PlanRequest {
    /// Free-form user message; may be empty when an edit patch is present
    pub message: String,

    /// Session to continue; a new session is created when absent
    pub session_id: Option<String>,

    /// Structured constraints supplied by the caller, merged before parsing
    pub constraints: Option<ConstraintDraft>,

    /// Local edit of the session's previous itinerary
    pub edit_patch: Option<EditPatch>,

    /// Rate-limiting key; falls back to the session id
    pub client_key: Option<String>,
}

impl PlanRequest {
    pub fn from_message(message: impl Into<String>) -> Self {
        Self {
            message: message.into(),
            ..Default::default()
        }
    }
}

/// Terminal status of a planning request
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum PlanStatus {
    /// An itinerary is attached
    Done,
    /// Required fields are missing; `next_questions` is non-empty
    Clarifying,
    /// A fatal error; `error_code` is set
    Error,
}

/// The full response surface
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct PlanResponse {
    pub status: PlanStatus,

    /// Human-readable summary or error text
    pub message: String,

    pub itinerary: Option<Itinerary>,

    pub session_id: String,

    /// Per-session monotonic sequence number
    pub session_seq: u64,

    pub request_id: String,
    pub trace_id: String,

    pub degrade_level: DegradeLevel,
    pub confidence_score: f64,

    /// Unresolved issues carried out of the repair loop
    pub issues: Vec<Issue>,

    /// Clarify questions, present only when status is `clarifying`
    pub next_questions: Vec<String>,

    /// Provenance of each extracted constraint field
    pub field_evidence: BTreeMap<String, FieldEvidence>,

    /// Machine-readable code when status is `error`
    pub error_code: Option<String>,

    pub run_fingerprint: RunFingerprint,
}

impl PlanResponse {
    /// Skeleton with identifiers filled in; stages complete the rest
    pub fn skeleton(session_id: &str, request_id: &str, trace_id: &str, fingerprint: RunFingerprint) -> Self {
        Self {
            status: PlanStatus::Error,
            message: String::new(),
            itinerary: None,
            session_id: session_id.to_string(),
            session_seq: 0,
            request_id: request_id.to_string(),
            trace_id: trace_id.to_string(),
            degrade_level: DegradeLevel::L3,
            confidence_score: 0.0,
            issues: Vec::new(),
            next_questions: Vec::new(),
            field_evidence: BTreeMap::new(),
            error_code: None,
            run_fingerprint: fingerprint,
        }
    }

    /// Structured error response; never leaks internals beyond the taxonomy
    pub fn from_error(mut skeleton: Self, error: &PlanError) -> Self {
        skeleton.status = PlanStatus::Error;
        skeleton.error_code = Some(error.code().to_string());
        skeleton.message = error.to_string();
        skeleton
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_status_serializes_lowercase() {
        assert_eq!(serde_json::to_string(&PlanStatus::Done).unwrap(), "\"done\"");
        assert_eq!(serde_json::to_string(&PlanStatus::Clarifying).unwrap(), "\"clarifying\"");
    }

    #[test]
    fn test_error_response_carries_code() {
        let skeleton = PlanResponse::skeleton("s", "r", "t", RunFingerprint::default());
        let response = PlanResponse::from_error(skeleton, &PlanError::DeadlineExceeded);
        assert_eq!(response.status, PlanStatus::Error);
        assert_eq!(response.error_code.as_deref(), Some("deadline_exceeded"));
        assert!(response.itinerary.is_none());
    }

    #[test]
    fn test_request_deserializes_with_edit_patch() {
        let json = r#"{
            "message": "",
            "session_id": "s-1",
            "edit_patch": {"replace_stop": {"day_number": 1, "old_poi": "A", "new_poi": "B"}}
        }"#;
        let request: PlanRequest = serde_json::from_str(json).unwrap();
        assert!(request.edit_patch.is_some());
        assert_eq!(request.session_id.as_deref(), Some("s-1"));
    }
}
