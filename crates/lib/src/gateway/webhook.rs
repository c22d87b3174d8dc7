//! Instagram webhook routes: Meta verification handshake, payload intake, debug relay.

use crate::gateway::server::GatewayState;
use crate::payload::InboundPayload;
use axum::{
    body::Bytes,
    extract::{Query, State},
    http::{header, StatusCode},
    response::{IntoResponse, Response},
    Json,
};
use serde::Deserialize;
use serde_json::{json, Value};

/// Query parameters Meta sends when registering the webhook.
#[derive(Debug, Default, Deserialize)]
pub struct VerifyParams {
    #[serde(rename = "hub.mode")]
    pub mode: Option<String>,
    #[serde(rename = "hub.verify_token")]
    pub verify_token: Option<String>,
    #[serde(rename = "hub.challenge")]
    pub challenge: Option<String>,
}

/// Result of the verification handshake.
#[derive(Debug, PartialEq, Eq)]
pub enum Verification {
    /// Echo the challenge back.
    Challenge(String),
    Forbidden,
    BadRequest,
}

/// A configured token must match; then a challenge is required.
pub fn verify_handshake(expected_token: Option<&str>, params: &VerifyParams) -> Verification {
    if let Some(expected) = expected_token {
        if params.verify_token.as_deref() != Some(expected) {
            return Verification::Forbidden;
        }
    }
    match &params.challenge {
        Some(c) => Verification::Challenge(c.clone()),
        None => Verification::BadRequest,
    }
}

/// GET /instagram/webhook
pub(crate) async fn verify(
    State(state): State<GatewayState>,
    Query(params): Query<VerifyParams>,
) -> Response {
    log::debug!("webhook verification (mode: {:?})", params.mode);
    match verify_handshake(state.verify_token.as_deref(), &params) {
        Verification::Challenge(challenge) => (
            StatusCode::OK,
            [(header::CONTENT_TYPE, "text/plain; charset=utf-8")],
            challenge,
        )
            .into_response(),
        Verification::Forbidden => (StatusCode::FORBIDDEN, "Forbidden").into_response(),
        Verification::BadRequest => (StatusCode::BAD_REQUEST, "Bad Request").into_response(),
    }
}

/// POST /instagram/webhook: accept the payload and forward it in the background.
pub(crate) async fn receive(State(state): State<GatewayState>, body: Bytes) -> Response {
    let value: Value = match serde_json::from_slice(&body) {
        Ok(v) => v,
        Err(e) => {
            log::debug!("webhook: invalid JSON body: {}", e);
            return (
                StatusCode::BAD_REQUEST,
                Json(json!({ "error": "Invalid JSON body" })),
            )
                .into_response();
        }
    };
    let payload = InboundPayload::from_value(&value);
    log::info!("webhook: received {} item(s)", payload.items.len());

    if state.config.forwarding.relay_raw_payload {
        let forwarder = state.forwarder.clone();
        state
            .supervisor
            .spawn("relay raw payload", async move { forwarder.relay_raw(&value).await });
    }

    let forwarder = state.forwarder.clone();
    state.supervisor.spawn("forward payload", async move {
        let report = forwarder.forward(&payload).await;
        log::info!(
            "forwarded payload: {} sent, {} skipped, {} failed",
            report.sent(),
            report.skipped(),
            report.failed()
        );
        if report.failed() > 0 {
            Err(format!(
                "{} of {} item(s) failed",
                report.failed(),
                report.outcomes.len()
            ))
        } else {
            Ok(report)
        }
    });

    Json(json!({ "status": "forwarded" })).into_response()
}

/// POST /instagram/webhook/debug: relay the raw body as text and wait for the result.
pub(crate) async fn debug_relay(State(state): State<GatewayState>, body: Bytes) -> Response {
    let value: Value = serde_json::from_slice(&body)
        .unwrap_or_else(|_| Value::String(String::from_utf8_lossy(&body).into_owned()));
    match state.forwarder.relay_raw(&value).await {
        Ok(_) => Json(json!({ "status": "sent_as_text" })).into_response(),
        Err(e) => {
            log::error!("error sending debug payload: {}", e);
            (
                StatusCode::INTERNAL_SERVER_ERROR,
                Json(json!({ "error": "Internal server error" })),
            )
                .into_response()
        }
    }
}
