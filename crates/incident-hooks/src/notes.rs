//! `PagerDuty` REST API client for incident notes.
//!
//! Acknowledged incidents get a note posted back to them through
//! `POST /incidents/{id}/notes`. The call is attempted once with a bounded
//! timeout. Any completed response counts as delivered; a non-2xx status is
//! logged and handed back to the caller rather than raised as an error.

use async_trait::async_trait;
use serde::Serialize;
use tracing::{debug, info, warn};

use crate::config::Config;
use crate::error::HookError;
use crate::events::IncidentRef;

/// Media type selecting version 2 of the REST API.
const ACCEPT_V2: &str = "application/vnd.pagerduty+json;version=2";

/// Result of a completed note request.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct NoteDelivery {
    /// HTTP status returned by the platform
    pub status: u16,
}

impl NoteDelivery {
    /// Whether the platform accepted the note.
    #[must_use]
    pub const fn accepted(&self) -> bool {
        self.status >= 200 && self.status < 300
    }
}

/// Anything that can post an acknowledgement note on an incident.
#[async_trait]
pub trait IncidentNotes: Send + Sync {
    /// Post the configured note on `incident`.
    async fn create_incident_note(&self, incident: &IncidentRef)
        -> Result<NoteDelivery, HookError>;
}

/// Client for the incident notes endpoint.
#[derive(Debug, Clone)]
pub struct NotesClient {
    client: reqwest::Client,
    base_url: String,
    authorization: String,
    from_email: String,
    content: String,
}

impl NotesClient {
    /// Build a client from service configuration.
    ///
    /// # Errors
    /// Returns an error if the HTTP client cannot be constructed.
    pub fn from_config(config: &Config) -> reqwest::Result<Self> {
        let client = reqwest::Client::builder()
            .timeout(config.callback_timeout)
            .build()?;

        debug!(
            base_url = %config.api_base_url,
            timeout = ?config.callback_timeout,
            "Incident notes client initialized"
        );

        Ok(Self {
            client,
            base_url: config.api_base_url.clone(),
            authorization: format!("Token token={}", config.api_key),
            from_email: config.from_email.clone(),
            content: config.note_content.clone(),
        })
    }

    /// URL of the notes collection for `incident`.
    #[must_use]
    pub fn notes_url(&self, incident: &IncidentRef) -> String {
        format!(
            "{}/incidents/{}/notes",
            self.base_url,
            urlencoding::encode(incident.as_str())
        )
    }
}

#[async_trait]
impl IncidentNotes for NotesClient {
    async fn create_incident_note(
        &self,
        incident: &IncidentRef,
    ) -> Result<NoteDelivery, HookError> {
        let body = NoteBody {
            note: Note {
                content: &self.content,
            },
        };

        debug!(incident_id = %incident, "Creating incident note");

        let response = self
            .client
            .post(self.notes_url(incident))
            .header(reqwest::header::ACCEPT, ACCEPT_V2)
            .header(reqwest::header::AUTHORIZATION, &self.authorization)
            .header(reqwest::header::FROM, &self.from_email)
            .json(&body)
            .send()
            .await?;

        let delivery = NoteDelivery {
            status: response.status().as_u16(),
        };

        if delivery.accepted() {
            info!(incident_id = %incident, status = delivery.status, "Incident note created");
        } else {
            let body = response.text().await.unwrap_or_default();
            warn!(
                incident_id = %incident,
                status = delivery.status,
                body = %body,
                "Incident note request was not accepted"
            );
        }

        Ok(delivery)
    }
}

#[derive(Debug, Serialize)]
struct NoteBody<'a> {
    note: Note<'a>,
}

#[derive(Debug, Serialize)]
struct Note<'a> {
    content: &'a str,
}
