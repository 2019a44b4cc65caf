//! HTTP server for incident webhooks.

use std::net::SocketAddr;
use std::sync::Arc;

use anyhow::{Context, Result};
use axum::{
    body::Bytes,
    extract::{DefaultBodyLimit, State},
    http::{header::CONTENT_TYPE, HeaderMap},
    response::Json,
    routing::{get, post},
    Router,
};
use serde_json::{json, Value};
use tokio::net::TcpListener;
use tokio::signal;
use tower_http::{limit::RequestBodyLimitLayer, trace::TraceLayer};
use tracing::{debug, info, warn};

use crate::config::Config;
use crate::dispatch::Dispatcher;
use crate::error::HookError;
use crate::events::parse_payload;
use crate::notes::{IncidentNotes, NotesClient};

/// Path of the webhook endpoint registered with the incident platform.
pub const WEBHOOK_PATH: &str = "/credit_card_application";

/// Plain-text body served on `/`.
pub const READINESS_MESSAGE: &str = "Incident webhook receiver is operational and accessible";

/// Largest accepted request body.
const MAX_BODY_BYTES: usize = 1024 * 1024;

/// Shared application state.
#[derive(Clone)]
pub struct AppState {
    /// Event dispatcher.
    pub dispatcher: Arc<Dispatcher>,
}

impl AppState {
    /// State backed by the given notes implementation.
    #[must_use]
    pub fn new(notes: Arc<dyn IncidentNotes>) -> Self {
        Self {
            dispatcher: Arc::new(Dispatcher::new(notes)),
        }
    }

    /// State backed by the `PagerDuty` REST API.
    ///
    /// # Errors
    /// Returns an error if the HTTP client cannot be constructed.
    pub fn from_config(config: &Config) -> Result<Self> {
        let notes = NotesClient::from_config(config).context("Failed to build notes client")?;
        Ok(Self::new(Arc::new(notes)))
    }
}

/// Build the HTTP router.
pub fn build_router(state: AppState) -> Router {
    Router::new()
        .route("/", get(readiness))
        .route("/health", get(health_check))
        .route(WEBHOOK_PATH, post(webhook_handler))
        .layer(DefaultBodyLimit::disable())
        .layer(RequestBodyLimitLayer::new(MAX_BODY_BYTES))
        .layer(TraceLayer::new_for_http())
        .with_state(state)
}

/// Readiness probe.
async fn readiness() -> &'static str {
    READINESS_MESSAGE
}

/// Health check endpoint.
async fn health_check() -> Json<Value> {
    Json(json!({
        "status": "healthy",
        "version": env!("CARGO_PKG_VERSION"),
    }))
}

/// Handle an incident webhook delivery.
///
/// Rejects the request only when the body itself cannot be decoded. Once it
/// decodes, every event is processed and the received body is echoed back
/// with 200, whatever happened to individual events.
pub async fn webhook_handler(
    State(state): State<AppState>,
    headers: HeaderMap,
    body: Bytes,
) -> Result<Json<Value>, HookError> {
    let content_type = headers.get(CONTENT_TYPE).and_then(|v| v.to_str().ok());

    let payload = parse_payload(content_type, &body).inspect_err(|e| {
        warn!(error = %e, "Rejected webhook delivery");
    })?;

    debug!(events = payload.batch.len(), "Received incident webhook");

    state.dispatcher.process_batch(&payload.batch).await;

    Ok(Json(payload.raw))
}

/// Bind to the configured port and serve until shutdown.
///
/// # Errors
/// Returns an error if the listener cannot be bound or the server fails.
pub async fn run_server(config: &Config) -> Result<()> {
    let state = AppState::from_config(config)?;
    let app = build_router(state);

    let addr = SocketAddr::from(([0, 0, 0, 0], config.port));
    let listener = TcpListener::bind(addr)
        .await
        .with_context(|| format!("Failed to bind to {addr}"))?;

    info!(port = config.port, "Incident webhook service listening");

    axum::serve(listener, app)
        .with_graceful_shutdown(shutdown_signal())
        .await
        .context("Server error")?;

    info!("Incident webhook service stopped");
    Ok(())
}

async fn shutdown_signal() {
    let ctrl_c = async {
        signal::ctrl_c()
            .await
            .expect("failed to install Ctrl+C handler");
    };

    #[cfg(unix)]
    let terminate = async {
        signal::unix::signal(signal::unix::SignalKind::terminate())
            .expect("failed to install signal handler")
            .recv()
            .await;
    };

    #[cfg(not(unix))]
    let terminate = std::future::pending::<()>();

    tokio::select! {
        () = ctrl_c => {
            info!("Received Ctrl+C, shutting down gracefully");
        },
        () = terminate => {
            info!("Received SIGTERM, shutting down gracefully");
        },
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::events::IncidentRef;
    use crate::notes::NoteDelivery;
    use async_trait::async_trait;
    use axum::body::Body;
    use axum::http::{header::CONTENT_LENGTH, Request, StatusCode};
    use tower::ServiceExt;

    struct NoNotes;

    #[async_trait]
    impl IncidentNotes for NoNotes {
        async fn create_incident_note(
            &self,
            _incident: &IncidentRef,
        ) -> Result<NoteDelivery, HookError> {
            Ok(NoteDelivery { status: 201 })
        }
    }

    fn app() -> Router {
        build_router(AppState::new(Arc::new(NoNotes)))
    }

    #[tokio::test]
    async fn test_readiness() {
        let response = app()
            .oneshot(Request::builder().uri("/").body(Body::empty()).unwrap())
            .await
            .unwrap();

        assert_eq!(response.status(), StatusCode::OK);
        let body = axum::body::to_bytes(response.into_body(), usize::MAX)
            .await
            .unwrap();
        assert_eq!(&body[..], READINESS_MESSAGE.as_bytes());
    }

    #[tokio::test]
    async fn test_health() {
        let response = app()
            .oneshot(
                Request::builder()
                    .uri("/health")
                    .body(Body::empty())
                    .unwrap(),
            )
            .await
            .unwrap();

        assert_eq!(response.status(), StatusCode::OK);
        let body = axum::body::to_bytes(response.into_body(), usize::MAX)
            .await
            .unwrap();
        let json: Value = serde_json::from_slice(&body).unwrap();
        assert_eq!(json["status"], "healthy");
    }

    #[tokio::test]
    async fn test_webhook_rejects_get() {
        let response = app()
            .oneshot(
                Request::builder()
                    .uri(WEBHOOK_PATH)
                    .body(Body::empty())
                    .unwrap(),
            )
            .await
            .unwrap();

        assert_eq!(response.status(), StatusCode::METHOD_NOT_ALLOWED);
    }

    #[tokio::test]
    async fn test_oversized_body_rejected() {
        let body = format!(
            r#"{{"messages": [], "padding": "{}"}}"#,
            "x".repeat(MAX_BODY_BYTES)
        );
        let response = app()
            .oneshot(
                Request::builder()
                    .method("POST")
                    .uri(WEBHOOK_PATH)
                    .header(CONTENT_TYPE, "application/json")
                    .header(CONTENT_LENGTH, body.len())
                    .body(Body::from(body))
                    .unwrap(),
            )
            .await
            .unwrap();

        assert_eq!(response.status(), StatusCode::PAYLOAD_TOO_LARGE);
    }
}
