//! HTTP handlers.
//!
//! `POST /webhook` runs one linear pass per request:
//! 1. Echo a verification challenge, if present, and stop
//! 2. Normalize and validate the payload (400 on failure)
//! 3. Persist the record (500 on failure)
//! 4. Send the thank-you email, best-effort
//! 5. Return 200 with the record id and email outcome

use std::sync::Arc;

use axum::{
    body::Bytes,
    extract::{RawQuery, State},
    http::{header, HeaderMap, HeaderName, HeaderValue, StatusCode},
    response::{IntoResponse, Response},
    Json,
};
use chrono::{SecondsFormat, Utc};
use serde::Serialize;
use serde_json::{json, Value};
use tracing::{error, info, warn};

use crate::error::RelayError;
use crate::intake::{normalize, validate, RawInboundPayload, Submission};
use crate::notify::{Delivery, Notifier};
use crate::sink::RecordSink;

/// Header carrying the webhook provider's ownership challenge.
pub const CHALLENGE_HEADER: &str = "x-notion-webhook-challenge";

/// Shared application state.
#[derive(Clone)]
pub struct AppState {
    pub sink: Arc<dyn RecordSink>,
    pub notifier: Option<Arc<dyn Notifier>>,
}

impl AppState {
    pub fn new(sink: Arc<dyn RecordSink>, notifier: Option<Arc<dyn Notifier>>) -> Self {
        Self { sink, notifier }
    }
}

// =============================================================================
// Health Checks
// =============================================================================

/// Plain-text liveness probe.
pub async fn root() -> &'static str {
    "Server is running and healthy."
}

/// Webhook liveness response.
#[derive(Serialize)]
pub struct WebhookStatus {
    pub status: &'static str,
    pub timestamp: String,
}

/// `GET /webhook` liveness probe.
pub async fn webhook_status() -> Json<WebhookStatus> {
    Json(WebhookStatus {
        status: "Webhook endpoint is active",
        timestamp: now_iso(),
    })
}

// =============================================================================
// Webhook
// =============================================================================

/// Successful submission response.
#[derive(Debug, Serialize)]
pub struct WebhookResponse {
    pub success: bool,
    pub message: &'static str,
    #[serde(rename = "notionId")]
    pub notion_id: String,
    pub received_data: Submission,
    pub email_sent: bool,
    pub email_details: Option<Delivery>,
}

/// Form submission endpoint.
pub async fn receive_webhook(
    State(state): State<AppState>,
    headers: HeaderMap,
    RawQuery(query): RawQuery,
    body: Bytes,
) -> Result<Response, RelayError> {
    // An empty challenge has nothing to echo and falls through to intake.
    if let Some(challenge) = headers.get(CHALLENGE_HEADER).filter(|v| !v.is_empty()) {
        info!(challenge_length = challenge.len(), "webhook_challenge_received");
        return Ok(challenge_response(challenge));
    }

    let raw = RawInboundPayload::from_parts(&headers, query.as_deref(), body);

    info!(
        content_type = ?raw.content_type,
        body_length = raw.body.len(),
        query_pairs = raw.query.len(),
        header_count = raw.headers.len(),
        "webhook_received"
    );

    let fields = normalize(&raw);
    let submission = validate(&fields)?;

    let record = submission.into_record(Utc::now());
    let notion_id = state.sink.create(&record).await.map_err(|e| {
        error!(error = %e, "submission_persist_failed");
        e
    })?;

    info!(notion_id = %notion_id, "submission_persisted");

    let submission = record.submission;
    let email_details = match &state.notifier {
        Some(notifier) => send_thank_you(notifier.as_ref(), &submission).await,
        None => {
            info!("thank_you_email_not_configured");
            None
        }
    };

    Ok((
        StatusCode::OK,
        Json(WebhookResponse {
            success: true,
            message: "Form data successfully submitted to Notion",
            notion_id,
            received_data: submission,
            email_sent: email_details.is_some(),
            email_details,
        }),
    )
        .into_response())
}

fn challenge_response(challenge: &HeaderValue) -> Response {
    (
        StatusCode::OK,
        [
            (
                header::CONTENT_TYPE,
                HeaderValue::from_static("text/plain; charset=utf-8"),
            ),
            (HeaderName::from_static(CHALLENGE_HEADER), challenge.clone()),
        ],
        Bytes::copy_from_slice(challenge.as_bytes()),
    )
        .into_response()
}

/// Send the thank-you email; failures are logged and reported as `None`.
async fn send_thank_you(notifier: &dyn Notifier, submission: &Submission) -> Option<Delivery> {
    match notifier
        .send(&submission.email, &submission.name, &submission.message)
        .await
    {
        Ok(delivery) => Some(delivery),
        Err(e) => {
            error!(
                service = notifier.kind(),
                recipient = %submission.email,
                error = %e,
                "thank_you_email_failed"
            );
            None
        }
    }
}

// =============================================================================
// Diagnostics
// =============================================================================

/// Force the notifier to build and verify a fresh session.
pub async fn test_email(State(state): State<AppState>) -> (StatusCode, Json<Value>) {
    let Some(notifier) = state.notifier.as_ref() else {
        warn!("test_email_not_configured");
        return (
            StatusCode::SERVICE_UNAVAILABLE,
            Json(json!({
                "success": false,
                "error": "Email service is not configured",
            })),
        );
    };

    match notifier.verify().await {
        Ok(()) => (
            StatusCode::OK,
            Json(json!({
                "success": true,
                "service": notifier.kind(),
            })),
        ),
        Err(e) => {
            error!(service = notifier.kind(), error = %e, "test_email_failed");
            (
                StatusCode::INTERNAL_SERVER_ERROR,
                Json(json!({
                    "success": false,
                    "service": notifier.kind(),
                    "error": e.to_string(),
                })),
            )
        }
    }
}

fn now_iso() -> String {
    Utc::now().to_rfc3339_opts(SecondsFormat::Millis, true)
}
