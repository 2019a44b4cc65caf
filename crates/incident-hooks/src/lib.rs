//! `PagerDuty` incident webhook receiver.
//!
//! This crate provides:
//! - Parsing of v2 webhook deliveries, decoding each message on its own
//! - Classification of events by incident lifecycle transition
//! - Per-event actions, including an acknowledgement note posted back to
//!   the incident through the REST API
//! - HTTP server exposing the webhook endpoint and liveness probes
//!
//! # Configuration
//!
//! - `PAGERDUTY_API_KEY`: REST API token (required)
//! - `PAGERDUTY_FROM_EMAIL`: `From` identity for API calls (required)
//! - `PAGERDUTY_NOTE_CONTENT`: acknowledgement note text
//! - `PAGERDUTY_API_URL`: REST API base URL
//! - `PAGERDUTY_CALLBACK_TIMEOUT_SECS`: note call timeout
//! - `INCIDENT_HOOKS_PORT`: listening port (default 9004)

#![warn(clippy::pedantic)]
#![allow(clippy::module_name_repetitions)]

pub mod config;
pub mod dispatch;
pub mod error;
pub mod events;
pub mod notes;
pub mod server;

pub use config::Config;
pub use dispatch::{BatchReport, Dispatcher, EventReport, Outcome};
pub use error::{ConfigError, HookError};
pub use events::{
    classify, parse_payload, EventBatch, EventKind, EventRecord, IncidentRef, ParsedPayload,
};
pub use notes::{IncidentNotes, NoteDelivery, NotesClient};
pub use server::{build_router, run_server, AppState};
