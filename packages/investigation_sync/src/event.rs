//! Stream event taxonomy.
//!
//! Classification happens in two steps. [`classify`] turns a named wire
//! message into a [`RawEvent`] (the unit of the audit log) or discards it.
//! [`InvestigationEvent::decode`] then reads the typed payload for the
//! projector; a decode failure there leaves the raw log entry in place.
//! `error` and `completed` always decode: their payloads are read field by
//! field so a bad field cannot hide the end of the investigation.
//!
//! Envelope: `{ "data": { ...event fields... } }`

use std::fmt;

use serde::de::DeserializeOwned;
use serde::{Deserialize, Serialize};
use serde_json::Value;
use tracing::{debug, trace};

use crate::error::{EnvelopeError, EventError};
use crate::hydration::TerminalPayload;
use crate::model::{Finding, HypothesisStatus, NegativeControl};

/// The twelve event names the backend emits.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum EventKind {
    HypothesisFormulated,
    ExperimentStarted,
    ExperimentCompleted,
    HypothesisEvaluated,
    NegativeControl,
    ToolCalled,
    ToolResult,
    FindingRecorded,
    Thinking,
    Error,
    Completed,
    OutputSummarized,
}

impl EventKind {
    pub const ALL: [EventKind; 12] = [
        Self::HypothesisFormulated,
        Self::ExperimentStarted,
        Self::ExperimentCompleted,
        Self::HypothesisEvaluated,
        Self::NegativeControl,
        Self::ToolCalled,
        Self::ToolResult,
        Self::FindingRecorded,
        Self::Thinking,
        Self::Error,
        Self::Completed,
        Self::OutputSummarized,
    ];

    pub fn as_str(&self) -> &'static str {
        match self {
            Self::HypothesisFormulated => "hypothesis_formulated",
            Self::ExperimentStarted => "experiment_started",
            Self::ExperimentCompleted => "experiment_completed",
            Self::HypothesisEvaluated => "hypothesis_evaluated",
            Self::NegativeControl => "negative_control",
            Self::ToolCalled => "tool_called",
            Self::ToolResult => "tool_result",
            Self::FindingRecorded => "finding_recorded",
            Self::Thinking => "thinking",
            Self::Error => "error",
            Self::Completed => "completed",
            Self::OutputSummarized => "output_summarized",
        }
    }

    pub fn from_name(name: &str) -> Option<Self> {
        Self::ALL.into_iter().find(|kind| kind.as_str() == name)
    }

    /// `completed` and `error` end the investigation.
    pub fn is_terminal(&self) -> bool {
        matches!(self, Self::Completed | Self::Error)
    }
}

impl fmt::Display for EventKind {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.as_str())
    }
}

/// One entry of the append-only event log: the event name and the unwrapped
/// `data` object, verbatim.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct RawEvent {
    pub event_type: EventKind,
    pub payload: Value,
}

/// Unwrap the `{data: {...}}` envelope of one wire payload.
pub fn unwrap_envelope(data: &str) -> Result<Value, EnvelopeError> {
    let trimmed = data.trim();
    if trimmed.is_empty() {
        return Err(EnvelopeError::Empty);
    }
    if trimmed == "undefined" {
        return Err(EnvelopeError::Undefined);
    }

    let envelope: Value = serde_json::from_str(trimmed)?;
    match envelope {
        Value::Object(mut map) => match map.remove("data") {
            Some(inner @ Value::Object(_)) => Ok(inner),
            _ => Err(EnvelopeError::MissingData),
        },
        _ => Err(EnvelopeError::MissingData),
    }
}

/// Turn a named wire message into a log entry.
///
/// Unknown event names and malformed payloads yield `None`; the message is
/// dropped without touching any state.
pub fn classify(event_name: &str, data: &str) -> Option<RawEvent> {
    let Some(event_type) = EventKind::from_name(event_name) else {
        trace!(event = %event_name, "ignoring unrecognized event name");
        return None;
    };

    match unwrap_envelope(data) {
        Ok(payload) => Some(RawEvent {
            event_type,
            payload,
        }),
        Err(e) => {
            debug!(event = %event_type, error = %e, "discarding malformed message");
            None
        }
    }
}

// =============================================================================
// Typed payloads
// =============================================================================

#[derive(Debug, Clone, PartialEq, Deserialize)]
pub struct HypothesisFormulated {
    pub id: String,
    #[serde(default)]
    pub statement: String,
    #[serde(default)]
    pub rationale: String,
    #[serde(default)]
    pub parent_id: Option<String>,
    #[serde(default)]
    pub confidence: Option<f64>,
}

#[derive(Debug, Clone, PartialEq, Deserialize)]
pub struct ExperimentStarted {
    pub id: String,
    pub hypothesis_id: String,
    #[serde(default)]
    pub description: String,
}

#[derive(Debug, Clone, PartialEq, Deserialize)]
pub struct ExperimentCompleted {
    pub id: String,
    #[serde(default)]
    pub tool_count: Option<u32>,
    #[serde(default)]
    pub finding_count: Option<u32>,
    /// Some backends report `failed` or `cancelled` here; kept as text so an
    /// unknown value does not make the whole event undecodable.
    #[serde(default)]
    pub status: Option<String>,
}

#[derive(Debug, Clone, PartialEq, Deserialize)]
pub struct HypothesisEvaluated {
    pub id: String,
    pub status: HypothesisStatus,
    #[serde(default)]
    pub confidence: f64,
}

#[derive(Debug, Clone, PartialEq, Deserialize)]
pub struct ToolCalled {
    #[serde(alias = "tool_name", alias = "name")]
    pub tool: String,
    #[serde(default)]
    pub experiment_id: Option<String>,
}

#[derive(Debug, Clone, PartialEq, Deserialize)]
pub struct ToolResult {
    #[serde(default, alias = "tool_name", alias = "name")]
    pub tool: Option<String>,
    #[serde(default)]
    pub experiment_id: Option<String>,
}

/// Failure reported by the backend itself.
#[derive(Debug, Clone, PartialEq)]
pub struct UpstreamError {
    pub message: String,
}

impl UpstreamError {
    /// Text of `message` (or `error`). A non-text value is kept as its JSON
    /// rendering; an absent one leaves the message empty.
    pub fn from_payload(payload: &Value) -> Self {
        let mut fallback = None;
        for key in ["message", "error"] {
            match payload.get(key) {
                Some(Value::String(text)) if !text.trim().is_empty() => {
                    return Self {
                        message: text.clone(),
                    };
                }
                None | Some(Value::Null) | Some(Value::String(_)) => {}
                Some(other) => {
                    fallback.get_or_insert_with(|| other.to_string());
                }
            }
        }
        Self {
            message: fallback.unwrap_or_default(),
        }
    }
}

/// A typed stream event, ready for the projector.
#[derive(Debug, Clone, PartialEq)]
pub enum InvestigationEvent {
    HypothesisFormulated(HypothesisFormulated),
    ExperimentStarted(ExperimentStarted),
    ExperimentCompleted(ExperimentCompleted),
    HypothesisEvaluated(HypothesisEvaluated),
    NegativeControl(NegativeControl),
    ToolCalled(ToolCalled),
    ToolResult(ToolResult),
    FindingRecorded(Finding),
    Thinking,
    Error(UpstreamError),
    Completed(Box<TerminalPayload>),
    OutputSummarized,
}

fn decode<T: DeserializeOwned>(kind: EventKind, payload: &Value) -> Result<T, EventError> {
    T::deserialize(payload).map_err(|source| EventError::Decode {
        event_type: kind.as_str(),
        source,
    })
}

impl InvestigationEvent {
    pub fn decode(raw: &RawEvent) -> Result<Self, EventError> {
        let kind = raw.event_type;
        let payload = &raw.payload;
        let event = match kind {
            EventKind::HypothesisFormulated => Self::HypothesisFormulated(decode(kind, payload)?),
            EventKind::ExperimentStarted => Self::ExperimentStarted(decode(kind, payload)?),
            EventKind::ExperimentCompleted => Self::ExperimentCompleted(decode(kind, payload)?),
            EventKind::HypothesisEvaluated => Self::HypothesisEvaluated(decode(kind, payload)?),
            EventKind::NegativeControl => Self::NegativeControl(decode(kind, payload)?),
            EventKind::ToolCalled => Self::ToolCalled(decode(kind, payload)?),
            EventKind::ToolResult => Self::ToolResult(decode(kind, payload)?),
            EventKind::FindingRecorded => Self::FindingRecorded(decode(kind, payload)?),
            EventKind::Thinking => Self::Thinking,
            EventKind::Error => Self::Error(UpstreamError::from_payload(payload)),
            EventKind::Completed => {
                Self::Completed(Box::new(TerminalPayload::from_payload(payload)))
            }
            EventKind::OutputSummarized => Self::OutputSummarized,
        };
        Ok(event)
    }

    pub fn kind(&self) -> EventKind {
        match self {
            Self::HypothesisFormulated(_) => EventKind::HypothesisFormulated,
            Self::ExperimentStarted(_) => EventKind::ExperimentStarted,
            Self::ExperimentCompleted(_) => EventKind::ExperimentCompleted,
            Self::HypothesisEvaluated(_) => EventKind::HypothesisEvaluated,
            Self::NegativeControl(_) => EventKind::NegativeControl,
            Self::ToolCalled(_) => EventKind::ToolCalled,
            Self::ToolResult(_) => EventKind::ToolResult,
            Self::FindingRecorded(_) => EventKind::FindingRecorded,
            Self::Thinking => EventKind::Thinking,
            Self::Error(_) => EventKind::Error,
            Self::Completed(_) => EventKind::Completed,
            Self::OutputSummarized => EventKind::OutputSummarized,
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use serde_json::json;

    #[test]
    fn every_kind_roundtrips_through_its_name() {
        for kind in EventKind::ALL {
            assert_eq!(EventKind::from_name(kind.as_str()), Some(kind));
            let json = serde_json::to_string(&kind).unwrap();
            assert_eq!(json, format!("\"{}\"", kind.as_str()));
        }
        assert_eq!(EventKind::from_name("message"), None);
    }

    #[test]
    fn terminal_kinds() {
        let terminal: Vec<_> = EventKind::ALL
            .into_iter()
            .filter(|k| k.is_terminal())
            .collect();
        assert_eq!(terminal, vec![EventKind::Error, EventKind::Completed]);
    }

    #[test]
    fn envelope_unwraps_data() {
        let payload = unwrap_envelope(r#"{"data":{"id":"h1"}}"#).unwrap();
        assert_eq!(payload, json!({"id": "h1"}));
    }

    #[test]
    fn envelope_rejections() {
        assert!(matches!(unwrap_envelope(""), Err(EnvelopeError::Empty)));
        assert!(matches!(unwrap_envelope("  \n"), Err(EnvelopeError::Empty)));
        assert!(matches!(
            unwrap_envelope("undefined"),
            Err(EnvelopeError::Undefined)
        ));
        assert!(matches!(
            unwrap_envelope("{not json"),
            Err(EnvelopeError::Json(_))
        ));
        assert!(matches!(
            unwrap_envelope(r#"{"id":"h1"}"#),
            Err(EnvelopeError::MissingData)
        ));
        assert!(matches!(
            unwrap_envelope(r#"{"data":null}"#),
            Err(EnvelopeError::MissingData)
        ));
        assert!(matches!(
            unwrap_envelope("[1,2]"),
            Err(EnvelopeError::MissingData)
        ));
    }

    #[test]
    fn classify_known_event() {
        let raw = classify("thinking", r#"{"data":{"content":"hmm"}}"#).unwrap();
        assert_eq!(raw.event_type, EventKind::Thinking);
        assert_eq!(raw.payload["content"], "hmm");
    }

    #[test]
    fn classify_drops_unknown_names_and_bad_payloads() {
        assert!(classify("heartbeat", r#"{"data":{}}"#).is_none());
        assert!(classify("thinking", "undefined").is_none());
        assert!(classify("thinking", "{").is_none());
    }

    #[test]
    fn decode_typed_payloads() {
        let raw = RawEvent {
            event_type: EventKind::ToolCalled,
            payload: json!({"tool_name": "search_literature", "experiment_id": "e1"}),
        };
        let event = InvestigationEvent::decode(&raw).unwrap();
        assert_eq!(
            event,
            InvestigationEvent::ToolCalled(ToolCalled {
                tool: "search_literature".to_string(),
                experiment_id: Some("e1".to_string()),
            })
        );
        assert_eq!(event.kind(), EventKind::ToolCalled);
    }

    #[test]
    fn decode_reports_missing_fields() {
        let raw = RawEvent {
            event_type: EventKind::ExperimentStarted,
            payload: json!({"id": "e1"}),
        };
        let err = InvestigationEvent::decode(&raw).unwrap_err();
        assert!(err.to_string().contains("experiment_started"));
    }

    #[test]
    fn error_event_accepts_error_alias() {
        let raw = RawEvent {
            event_type: EventKind::Error,
            payload: json!({"error": "model quota exceeded"}),
        };
        match InvestigationEvent::decode(&raw).unwrap() {
            InvestigationEvent::Error(e) => assert_eq!(e.message, "model quota exceeded"),
            other => panic!("unexpected event: {other:?}"),
        }
    }

    #[test]
    fn error_message_that_is_not_text() {
        let message = |payload: Value| UpstreamError::from_payload(&payload).message;
        assert_eq!(message(json!({"message": null})), "");
        assert_eq!(message(json!({"message": {"code": 7}})), r#"{"code":7}"#);
        assert_eq!(message(json!({"message": "", "error": "disk full"})), "disk full");
        assert_eq!(message(json!({"message": 42, "error": "disk full"})), "disk full");
    }

    #[test]
    fn terminal_events_decode_whatever_the_payload() {
        for payload in [
            json!({"message": [1, 2]}),
            json!({"candidates": "none", "cost": 3, "findings": [{"evidence": {}}]}),
        ] {
            for kind in [EventKind::Error, EventKind::Completed] {
                let raw = RawEvent {
                    event_type: kind,
                    payload: payload.clone(),
                };
                assert_eq!(InvestigationEvent::decode(&raw).unwrap().kind(), kind);
            }
        }
    }

    #[test]
    fn payload_free_events_decode_from_anything() {
        for kind in [EventKind::Thinking, EventKind::OutputSummarized] {
            let raw = RawEvent {
                event_type: kind,
                payload: json!({"whatever": [1, 2, 3]}),
            };
            assert_eq!(InvestigationEvent::decode(&raw).unwrap().kind(), kind);
        }
    }
}
