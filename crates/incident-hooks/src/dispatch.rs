//! Per-event actions for a webhook batch.
//!
//! Events run one after another in input order. A failing event is logged
//! and recorded in the [`BatchReport`]; the rest of the batch still runs.

use std::sync::Arc;

use serde_json::Value;
use tracing::{info, warn};

use crate::error::HookError;
use crate::events::{classify, EventKind, EventRecord, IncidentRef};
use crate::notes::IncidentNotes;

/// What an event's action did.
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum Outcome {
    /// Action only recorded the event in the logs
    Recorded,
    /// Event kind has no bound action
    Ignored,
    /// Acknowledgement note call completed with the given HTTP status
    NoteCreated { incident: IncidentRef, status: u16 },
}

/// Result of one event within a batch.
#[derive(Debug)]
pub struct EventReport {
    /// Position in the inbound `messages` array
    pub index: usize,
    pub kind: EventKind,
    pub result: Result<Outcome, HookError>,
}

/// Results for a whole batch, in input order.
#[derive(Debug, Default)]
pub struct BatchReport {
    pub events: Vec<EventReport>,
}

impl BatchReport {
    /// Number of events whose action failed.
    #[must_use]
    pub fn failed(&self) -> usize {
        self.events.iter().filter(|e| e.result.is_err()).count()
    }

    /// Number of note callbacks that completed.
    #[must_use]
    pub fn notes_created(&self) -> usize {
        self.events
            .iter()
            .filter(|e| matches!(e.result, Ok(Outcome::NoteCreated { .. })))
            .count()
    }
}

/// Runs the action bound to each event category.
#[derive(Clone)]
pub struct Dispatcher {
    notes: Arc<dyn IncidentNotes>,
}

impl Dispatcher {
    #[must_use]
    pub fn new(notes: Arc<dyn IncidentNotes>) -> Self {
        Self { notes }
    }

    /// Run every message in `batch`, isolating per-event failures.
    pub async fn process_batch(&self, batch: &[Value]) -> BatchReport {
        let mut report = BatchReport {
            events: Vec::with_capacity(batch.len()),
        };

        for (index, message) in batch.iter().enumerate() {
            let kind = classify(message);
            let result = self.dispatch_message(message).await;

            if let Err(e) = &result {
                warn!(
                    index,
                    kind = %kind,
                    message_id = message.get("id").and_then(serde_json::Value::as_str).unwrap_or("-"),
                    error = %e,
                    "Event processing failed"
                );
            }

            report.events.push(EventReport {
                index,
                kind,
                result,
            });
        }

        info!(
            events = report.events.len(),
            failed = report.failed(),
            notes = report.notes_created(),
            "Webhook batch processed"
        );

        report
    }

    /// Decode and run a single raw message.
    ///
    /// Unknown kinds are ignored without decoding, so their fields are
    /// never checked.
    ///
    /// # Errors
    /// `InvalidEvent` when a known event has a mistyped field, otherwise as
    /// [`Dispatcher::dispatch`].
    pub async fn dispatch_message(&self, message: &Value) -> Result<Outcome, HookError> {
        if classify(message) == EventKind::Unknown {
            info!(
                message_id = message.get("id").and_then(serde_json::Value::as_str).unwrap_or("-"),
                event = %message.get("event").unwrap_or(&serde_json::Value::Null),
                "Ignoring unhandled webhook event"
            );
            return Ok(Outcome::Ignored);
        }

        let record = EventRecord::from_message(message)?;
        self.dispatch(&record).await
    }

    /// Run the action bound to a single event.
    ///
    /// # Errors
    /// `MissingField` when the action needs a field the event lacks,
    /// `CallbackFailed` when the acknowledgement note call does not complete.
    pub async fn dispatch(&self, record: &EventRecord) -> Result<Outcome, HookError> {
        let message_id = record.id.as_deref().unwrap_or("-");

        match record.kind() {
            EventKind::Trigger => {
                let number = record
                    .incident_number()
                    .ok_or(HookError::MissingField("incident.incident_number"))?;
                info!(message_id, incident_number = number, "New triggered incident");
                Ok(Outcome::Recorded)
            }
            EventKind::Acknowledge => {
                let service = record.service_name();
                if service.is_none() {
                    warn!(message_id, "Acknowledged incident has no service name");
                }
                info!(
                    message_id,
                    service = service.unwrap_or("unknown"),
                    "Incident acknowledged on service"
                );

                record
                    .first_log_entry()
                    .ok_or(HookError::MissingField("log_entries[0]"))?;
                let incident = record
                    .first_log_incident()
                    .ok_or(HookError::MissingField("log_entries[0].incident.id"))?;

                let delivery = self.notes.create_incident_note(&incident).await?;
                Ok(Outcome::NoteCreated {
                    incident,
                    status: delivery.status,
                })
            }
            EventKind::Unacknowledge => {
                info!(
                    message_id,
                    "Incident acknowledgement has timed out and re-triggered"
                );
                Ok(Outcome::Recorded)
            }
            EventKind::Resolve => {
                let status = record
                    .incident_status()
                    .ok_or(HookError::MissingField("incident.status"))?;
                info!(message_id, status, "Incident status changed");
                Ok(Outcome::Recorded)
            }
            kind @ (EventKind::Assign | EventKind::Escalate | EventKind::Delegate) => {
                record
                    .first_log_entry()
                    .ok_or(HookError::MissingField("log_entries[0]"))?;
                let summary = record
                    .first_log_summary()
                    .ok_or(HookError::MissingField("log_entries[0].summary"))?;
                info!(message_id, kind = %kind, summary, "Incident reassigned");
                Ok(Outcome::Recorded)
            }
            EventKind::Annotate => {
                record
                    .first_log_entry()
                    .ok_or(HookError::MissingField("log_entries[0]"))?;
                let note = record
                    .first_log_channel_summary()
                    .ok_or(HookError::MissingField("log_entries[0].channel.summary"))?;
                info!(message_id, note, "Note added to incident");
                Ok(Outcome::Recorded)
            }
            EventKind::Unknown => {
                info!(
                    message_id,
                    event = record.event.as_deref().unwrap_or("<absent>"),
                    "Ignoring unhandled webhook event"
                );
                Ok(Outcome::Ignored)
            }
        }
    }
}
