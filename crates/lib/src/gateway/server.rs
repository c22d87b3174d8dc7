//! Gateway HTTP server (single port).

use crate::config::{self, Config};
use crate::forward::Forwarder;
use crate::gateway::webhook;
use crate::tasks::TaskSupervisor;
use anyhow::{Context, Result};
use axum::{
    extract::DefaultBodyLimit,
    response::Html,
    routing::{get, post},
    Json, Router,
};
use serde_json::json;
use std::sync::Arc;
use std::time::Duration;

/// How long shutdown waits for in-flight forwarding jobs.
const DRAIN_TIMEOUT: Duration = Duration::from_secs(30);

const PRIVACY_POLICY_HTML: &str = concat!(
    "<!DOCTYPE html><html><head><meta charset=\"utf-8\"><title>Privacy Policy</title></head>",
    "<body><h1>Privacy Policy</h1><p>We do not collect or store your personal data. ",
    "Incoming webhook data is used only to forward media to Telegram and is not retained.</p>",
    "</body></html>"
);

/// Shared state for the gateway handlers.
#[derive(Clone)]
pub struct GatewayState {
    pub config: Arc<Config>,
    /// Expected hub.verify_token; None accepts any.
    pub verify_token: Option<String>,
    pub forwarder: Forwarder,
    /// Background forwarding jobs; drained during graceful shutdown.
    pub supervisor: TaskSupervisor,
}

impl GatewayState {
    /// State with a Telegram-backed forwarder built from `config`.
    pub fn from_config(config: Config) -> Result<Self> {
        let forwarder = Forwarder::from_config(&config)?;
        Ok(Self {
            verify_token: config::resolve_verify_token(&config),
            config: Arc::new(config),
            forwarder,
            supervisor: TaskSupervisor::new(),
        })
    }
}

/// All gateway routes.
pub fn router(state: GatewayState) -> Router {
    let body_limit = state.config.gateway.body_limit_bytes;
    Router::new()
        .route("/", get(index))
        .route("/health", get(health_http))
        .route("/privacy-policy", get(privacy_policy))
        .route(
            "/instagram/webhook",
            get(webhook::verify).post(webhook::receive),
        )
        .route("/instagram/webhook/debug", post(webhook::debug_relay))
        .layer(DefaultBodyLimit::max(body_limit))
        .with_state(state)
}

/// Run the gateway server; binds to config.gateway.bind:config.gateway.port.
/// Blocks until shutdown (e.g. Ctrl+C), then waits for in-flight forwarding.
pub async fn run_gateway(config: Config) -> Result<()> {
    let bind_addr = format!("{}:{}", config.gateway.bind.trim(), config.gateway.port);
    let state = GatewayState::from_config(config)?;
    let supervisor = state.supervisor.clone();
    let app = router(state);

    let listener = tokio::net::TcpListener::bind(&bind_addr)
        .await
        .with_context(|| format!("binding to {}", bind_addr))?;
    log::info!("gateway listening on {}", bind_addr);

    axum::serve(listener, app)
        .with_graceful_shutdown(shutdown_signal())
        .await
        .context("gateway server exited")?;

    if supervisor.drain(DRAIN_TIMEOUT).await {
        log::info!("background jobs finished");
    } else {
        log::warn!(
            "gave up waiting for {} background job(s) after {:?}",
            supervisor.in_flight(),
            DRAIN_TIMEOUT
        );
    }
    log::info!("gateway stopped");
    Ok(())
}

/// Future that completes when the process should shut down (SIGINT or SIGTERM).
async fn shutdown_signal() {
    let ctrl_c = async {
        if let Err(e) = tokio::signal::ctrl_c().await {
            log::warn!("failed to install Ctrl+C handler: {}", e);
            std::future::pending::<()>().await;
        }
    };

    #[cfg(unix)]
    let terminate = async {
        match tokio::signal::unix::signal(tokio::signal::unix::SignalKind::terminate()) {
            Ok(mut sig) => {
                sig.recv().await;
            }
            Err(e) => {
                log::warn!("failed to install SIGTERM handler: {}", e);
                std::future::pending::<()>().await;
            }
        }
    };

    #[cfg(not(unix))]
    let terminate = std::future::pending::<()>();

    tokio::select! {
        _ = ctrl_c => {},
        _ = terminate => {},
    }
    log::info!("shutdown signal received, draining connections");
}

/// GET / returns the landing text.
async fn index() -> Html<&'static str> {
    Html("hehe")
}

/// GET /health returns a simple health JSON (for probes).
async fn health_http() -> Json<serde_json::Value> {
    Json(json!({ "status": "ok" }))
}

async fn privacy_policy() -> Html<&'static str> {
    Html(PRIVACY_POLICY_HTML)
}
