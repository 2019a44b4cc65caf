//! `PagerDuty` v2 webhook payload parsing and event classification.
//!
//! A webhook delivery is a JSON object with a `messages` array. Every
//! message carries an `event` name plus whatever incident and log entry
//! data the platform attached for that transition, so all nested fields
//! are optional and checked at the point of use.

use std::fmt;

use serde::Deserialize;
use serde_json::Value;

use crate::error::HookError;

/// Event category derived from a message's `event` name.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
pub enum EventKind {
    /// Incident newly created/triggered
    Trigger,
    /// Incident acknowledged by a responder
    Acknowledge,
    /// Acknowledgement timed out and the incident re-triggered
    Unacknowledge,
    /// Incident resolved
    Resolve,
    /// Incident assigned to another user
    Assign,
    /// Incident escalated within its escalation policy
    Escalate,
    /// Incident reassigned to another escalation policy
    Delegate,
    /// Note added to the incident
    Annotate,
    /// Anything else
    Unknown,
}

impl EventKind {
    /// All categories with a literal event name.
    pub const KNOWN: [Self; 8] = [
        Self::Trigger,
        Self::Acknowledge,
        Self::Unacknowledge,
        Self::Resolve,
        Self::Assign,
        Self::Escalate,
        Self::Delegate,
        Self::Annotate,
    ];

    /// Classify an event name. Matching is exact and case-sensitive.
    ///
    /// The literal names are disjoint, so a single match is equivalent to
    /// testing every category independently.
    #[must_use]
    pub fn from_event_name(name: &str) -> Self {
        match name {
            "incident.trigger" => Self::Trigger,
            "incident.acknowledge" => Self::Acknowledge,
            "incident.unacknowledge" => Self::Unacknowledge,
            "incident.resolve" => Self::Resolve,
            "incident.assign" => Self::Assign,
            "incident.escalate" => Self::Escalate,
            "incident.delegate" => Self::Delegate,
            "incident.annotate" => Self::Annotate,
            _ => Self::Unknown,
        }
    }

    /// Wire name of this category, `None` for [`EventKind::Unknown`].
    #[must_use]
    pub const fn event_name(self) -> Option<&'static str> {
        match self {
            Self::Trigger => Some("incident.trigger"),
            Self::Acknowledge => Some("incident.acknowledge"),
            Self::Unacknowledge => Some("incident.unacknowledge"),
            Self::Resolve => Some("incident.resolve"),
            Self::Assign => Some("incident.assign"),
            Self::Escalate => Some("incident.escalate"),
            Self::Delegate => Some("incident.delegate"),
            Self::Annotate => Some("incident.annotate"),
            Self::Unknown => None,
        }
    }
}

impl fmt::Display for EventKind {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.event_name().unwrap_or("unknown"))
    }
}

/// Ordered messages from one webhook delivery.
///
/// Messages stay untyped here; each one is decoded into an [`EventRecord`]
/// on its own when it is dispatched, so a bad message only affects itself.
pub type EventBatch = Vec<Value>;

/// Category of a raw message. A missing or non-string `event` is `Unknown`.
#[must_use]
pub fn classify(message: &Value) -> EventKind {
    message
        .get("event")
        .and_then(Value::as_str)
        .map_or(EventKind::Unknown, EventKind::from_event_name)
}

/// One webhook message.
#[derive(Debug, Clone, Default, Deserialize)]
pub struct EventRecord {
    /// Message id assigned by the platform
    #[serde(default)]
    pub id: Option<String>,
    /// Event name, e.g. `incident.trigger`
    #[serde(default)]
    pub event: Option<String>,
    /// Incident snapshot at the time of the event
    #[serde(default)]
    pub incident: Option<Incident>,
    /// Log entries describing the transition, newest first
    #[serde(default)]
    pub log_entries: Option<Vec<LogEntry>>,
}

/// Incident snapshot embedded in a message.
#[derive(Debug, Clone, Default, Deserialize)]
pub struct Incident {
    #[serde(default)]
    pub id: Option<String>,
    #[serde(default)]
    pub incident_number: Option<u64>,
    #[serde(default)]
    pub status: Option<String>,
    #[serde(default)]
    pub service: Option<Service>,
}

/// Service that owns an incident.
#[derive(Debug, Clone, Default, Deserialize)]
pub struct Service {
    #[serde(default)]
    pub name: Option<String>,
}

/// Log entry attached to a message.
#[derive(Debug, Clone, Default, Deserialize)]
pub struct LogEntry {
    #[serde(default)]
    pub summary: Option<String>,
    #[serde(default)]
    pub channel: Option<Channel>,
    #[serde(default)]
    pub incident: Option<IncidentReference>,
}

/// Channel through which a log entry was created.
#[derive(Debug, Clone, Default, Deserialize)]
pub struct Channel {
    #[serde(default)]
    pub summary: Option<String>,
}

/// Incident reference inside a log entry.
#[derive(Debug, Clone, Default, Deserialize)]
pub struct IncidentReference {
    #[serde(default)]
    pub id: Option<String>,
}

/// Identifier used to address an incident in the REST API.
#[derive(Debug, Clone, PartialEq, Eq, Hash)]
pub struct IncidentRef(String);

impl IncidentRef {
    #[must_use]
    pub fn new(id: impl Into<String>) -> Self {
        Self(id.into())
    }

    #[must_use]
    pub fn as_str(&self) -> &str {
        &self.0
    }
}

impl fmt::Display for IncidentRef {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(&self.0)
    }
}

impl EventRecord {
    /// Decode one raw message.
    ///
    /// # Errors
    /// `InvalidEvent` when a field is present with the wrong JSON type.
    pub fn from_message(message: &Value) -> Result<Self, HookError> {
        Self::deserialize(message).map_err(|e| HookError::InvalidEvent(e.to_string()))
    }

    /// Category of this event. Absent names classify as `Unknown`.
    #[must_use]
    pub fn kind(&self) -> EventKind {
        self.event
            .as_deref()
            .map_or(EventKind::Unknown, EventKind::from_event_name)
    }

    /// `incident.incident_number`
    #[must_use]
    pub fn incident_number(&self) -> Option<u64> {
        self.incident.as_ref()?.incident_number
    }

    /// `incident.status`
    #[must_use]
    pub fn incident_status(&self) -> Option<&str> {
        self.incident.as_ref()?.status.as_deref()
    }

    /// `incident.service.name`
    #[must_use]
    pub fn service_name(&self) -> Option<&str> {
        self.incident.as_ref()?.service.as_ref()?.name.as_deref()
    }

    /// `log_entries[0]`
    #[must_use]
    pub fn first_log_entry(&self) -> Option<&LogEntry> {
        self.log_entries.as_ref()?.first()
    }

    /// `log_entries[0].summary`
    #[must_use]
    pub fn first_log_summary(&self) -> Option<&str> {
        self.first_log_entry()?.summary.as_deref()
    }

    /// `log_entries[0].channel.summary`
    #[must_use]
    pub fn first_log_channel_summary(&self) -> Option<&str> {
        self.first_log_entry()?.channel.as_ref()?.summary.as_deref()
    }

    /// `log_entries[0].incident.id`
    #[must_use]
    pub fn first_log_incident(&self) -> Option<IncidentRef> {
        let id = self.first_log_entry()?.incident.as_ref()?.id.as_deref()?;
        Some(IncidentRef::new(id))
    }
}

/// A decoded webhook body: the untouched JSON plus its messages.
#[derive(Debug, Clone)]
pub struct ParsedPayload {
    /// Body exactly as received, echoed back to the caller
    pub raw: Value,
    /// Entries of `raw["messages"]`, in input order
    pub batch: EventBatch,
}

/// Whether a `Content-Type` header value denotes JSON.
///
/// Parameters such as `charset` are ignored.
#[must_use]
pub fn is_json_content_type(value: &str) -> bool {
    value
        .split(';')
        .next()
        .is_some_and(|essence| essence.trim().eq_ignore_ascii_case("application/json"))
}

/// Decode a webhook request body.
///
/// The content type is checked before the body is touched.
///
/// # Errors
/// `UnsupportedMediaType` when the content type is absent or not JSON,
/// `MalformedPayload` when the body is not a JSON object with a
/// `messages` array. The messages themselves are not inspected.
pub fn parse_payload(content_type: Option<&str>, body: &[u8]) -> Result<ParsedPayload, HookError> {
    match content_type {
        Some(ct) if is_json_content_type(ct) => {}
        Some(ct) => return Err(HookError::UnsupportedMediaType(ct.to_string())),
        None => return Err(HookError::UnsupportedMediaType("<none>".to_string())),
    }

    let raw: Value = serde_json::from_slice(body)
        .map_err(|e| HookError::MalformedPayload(format!("invalid JSON: {e}")))?;

    let messages = raw
        .get("messages")
        .ok_or_else(|| HookError::MalformedPayload("missing `messages` key".to_string()))?;

    let batch = messages
        .as_array()
        .cloned()
        .ok_or_else(|| HookError::MalformedPayload("`messages` is not an array".to_string()))?;

    Ok(ParsedPayload { raw, batch })
}

#[cfg(test)]
mod tests {
    use super::*;
    use serde_json::json;

    const JSON: Option<&str> = Some("application/json");

    #[test]
    fn test_classify_known_names() {
        for kind in EventKind::KNOWN {
            let name = kind.event_name().unwrap();
            assert_eq!(EventKind::from_event_name(name), kind);
        }
    }

    #[test]
    fn test_classify_is_case_sensitive() {
        assert_eq!(
            EventKind::from_event_name("INCIDENT.TRIGGER"),
            EventKind::Unknown
        );
        assert_eq!(
            EventKind::from_event_name("incident.triggered"),
            EventKind::Unknown
        );
        assert_eq!(EventKind::from_event_name(""), EventKind::Unknown);
    }

    #[test]
    fn test_absent_event_is_unknown() {
        assert_eq!(EventRecord::default().kind(), EventKind::Unknown);
    }

    #[test]
    fn test_kind_display() {
        assert_eq!(EventKind::Annotate.to_string(), "incident.annotate");
        assert_eq!(EventKind::Unknown.to_string(), "unknown");
    }

    #[test]
    fn test_json_content_type() {
        assert!(is_json_content_type("application/json"));
        assert!(is_json_content_type("application/json; charset=utf-8"));
        assert!(is_json_content_type("Application/JSON"));
        assert!(!is_json_content_type("text/plain"));
        assert!(!is_json_content_type("application/jsonl"));
    }

    #[test]
    fn test_rejects_non_json_without_parsing() {
        let err = parse_payload(Some("text/plain"), b"{not json").unwrap_err();
        assert!(matches!(err, HookError::UnsupportedMediaType(ct) if ct == "text/plain"));

        let err = parse_payload(None, b"{}").unwrap_err();
        assert!(matches!(err, HookError::UnsupportedMediaType(_)));
    }

    #[test]
    fn test_rejects_invalid_json() {
        let err = parse_payload(JSON, b"{\"messages\": [").unwrap_err();
        assert!(matches!(err, HookError::MalformedPayload(_)));
    }

    #[test]
    fn test_rejects_missing_messages() {
        let err = parse_payload(JSON, br#"{"events": []}"#).unwrap_err();
        assert!(matches!(err, HookError::MalformedPayload(msg) if msg.contains("messages")));

        let err = parse_payload(JSON, b"[]").unwrap_err();
        assert!(matches!(err, HookError::MalformedPayload(_)));
    }

    #[test]
    fn test_rejects_non_array_messages() {
        let err = parse_payload(JSON, br#"{"messages": "incident.trigger"}"#).unwrap_err();
        assert!(matches!(err, HookError::MalformedPayload(_)));
    }

    #[test]
    fn test_parses_batch_in_order() {
        let body = json!({
            "messages": [
                {"id": "m1", "event": "incident.trigger", "incident": {"incident_number": 7}},
                {"id": "m2", "event": "incident.resolve", "incident": {"status": "resolved"}},
                {"id": "m3", "event": "incident.custom"}
            ]
        });
        let parsed = parse_payload(JSON, body.to_string().as_bytes()).unwrap();

        assert_eq!(parsed.raw, body);
        let kinds: Vec<_> = parsed.batch.iter().map(classify).collect();
        assert_eq!(
            kinds,
            vec![EventKind::Trigger, EventKind::Resolve, EventKind::Unknown]
        );
        let first = EventRecord::from_message(&parsed.batch[0]).unwrap();
        assert_eq!(first.id.as_deref(), Some("m1"));
        assert_eq!(first.incident_number(), Some(7));
        let second = EventRecord::from_message(&parsed.batch[1]).unwrap();
        assert_eq!(second.incident_status(), Some("resolved"));
    }

    #[test]
    fn test_mistyped_messages_still_parse() {
        let body = json!({
            "messages": [
                {"event": "incident.trigger", "incident": {"incident_number": "PD-7"}},
                {"event": 42},
                "incident.trigger",
                {"event": "incident.resolve", "incident": "resolved"}
            ]
        });
        let parsed = parse_payload(JSON, body.to_string().as_bytes()).unwrap();

        assert_eq!(parsed.batch.len(), 4);
        let kinds: Vec<_> = parsed.batch.iter().map(classify).collect();
        assert_eq!(
            kinds,
            vec![
                EventKind::Trigger,
                EventKind::Unknown,
                EventKind::Unknown,
                EventKind::Resolve
            ]
        );
    }

    #[test]
    fn test_from_message_reports_wrong_field_type() {
        let err = EventRecord::from_message(
            &json!({"event": "incident.trigger", "incident": {"incident_number": "PD-7"}}),
        )
        .unwrap_err();
        assert!(matches!(err, HookError::InvalidEvent(_)));
    }

    #[test]
    fn test_nested_accessors() {
        let record: EventRecord = serde_json::from_value(json!({
            "event": "incident.annotate",
            "incident": {"service": {"name": "checkout"}},
            "log_entries": [
                {
                    "summary": "Note added",
                    "channel": {"summary": "Rolled back deploy"},
                    "incident": {"id": "PIJ90N7"}
                },
                {"summary": "older entry"}
            ]
        }))
        .unwrap();

        assert_eq!(record.service_name(), Some("checkout"));
        assert_eq!(record.first_log_summary(), Some("Note added"));
        assert_eq!(record.first_log_channel_summary(), Some("Rolled back deploy"));
        assert_eq!(record.first_log_incident(), Some(IncidentRef::new("PIJ90N7")));
    }

    #[test]
    fn test_accessors_tolerate_absent_fields() {
        let record: EventRecord =
            serde_json::from_value(json!({"event": "incident.assign", "log_entries": []}))
                .unwrap();

        assert!(record.incident_number().is_none());
        assert!(record.service_name().is_none());
        assert!(record.first_log_entry().is_none());
        assert!(record.first_log_summary().is_none());
        assert!(record.first_log_incident().is_none());
    }
}
