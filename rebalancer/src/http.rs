//! HTTP surface: liveness, balance, and webhook ingress. Handlers are
//! thin — they validate, dispatch to [`MarketRegistry`], and return;
//! all the interesting work happens in `Portfolio::send_order`.

use std::sync::Arc;

use axum::extract::State;
use axum::http::StatusCode;
use axum::routing::{get, post};
use axum::Router;
use log::warn;
use rebalancer_core::types::Side;
use serde::Deserialize;
use tower_http::trace::TraceLayer;

use crate::audit::AuditLog;
use crate::notify::{LineNotifier, Notifier};
use crate::registry::MarketRegistry;

#[derive(Clone)]
pub struct AppState {
    pub registry: Arc<MarketRegistry>,
    pub audit: Arc<AuditLog>,
    pub default_notifier: Arc<dyn Notifier>,
    /// `ORDER_EXECUTION_SECRET`, when non-empty. `None` means the
    /// webhook accepts requests without a `secret` field.
    pub required_secret: Option<String>,
}

/// The recognized fields of an inbound webhook payload (§6). Every
/// field is optional at the parse layer — a payload missing a field
/// this handler needs is dropped, not rejected, since §7 requires the
/// webhook to always return 200 once the body parses as JSON at all.
#[derive(Debug, Deserialize)]
struct WebhookPayload {
    exchange: Option<String>,
    symbol: Option<String>,
    side: Option<Side>,
    #[serde(default)]
    send_order: bool,
    line_token: Option<String>,
    secret: Option<String>,
}

pub fn router(state: AppState) -> Router {
    Router::new()
        .route("/", get(root))
        .route("/balance", get(balance))
        .route("/webhook", post(webhook))
        .layer(TraceLayer::new_for_http())
        .with_state(state)
}

async fn root() -> &'static str {
    "online"
}

async fn balance(State(state): State<AppState>) -> Result<String, StatusCode> {
    let balance = state.registry.get_balance();
    serde_json::to_string_pretty(&balance).map_err(|_| StatusCode::INTERNAL_SERVER_ERROR)
}

async fn webhook(State(state): State<AppState>, body: axum::body::Bytes) -> (StatusCode, &'static str) {
    let payload: WebhookPayload = match serde_json::from_slice(&body) {
        Ok(p) => p,
        Err(_) => {
            let raw = String::from_utf8_lossy(&body);
            state
                .default_notifier
                .notify(&format!("received an unparsable webhook body: {raw}"));
            let _ = crate::audit::webhook_rejected(&state.audit, "malformed body");
            return (StatusCode::OK, "ok");
        }
    };

    if let Some(required) = state.required_secret.as_deref() {
        if payload.secret.as_deref() != Some(required) {
            let _ = crate::audit::webhook_rejected(&state.audit, "secret mismatch");
            return (StatusCode::UNAUTHORIZED, "unauthorized");
        }
    }

    if !payload.send_order {
        return (StatusCode::OK, "ok");
    }

    let (Some(exchange), Some(symbol), Some(side)) = (payload.exchange, payload.symbol, payload.side) else {
        let _ = crate::audit::webhook_rejected(&state.audit, "missing exchange, symbol, or side");
        return (StatusCode::OK, "ok");
    };

    let notifier: Arc<dyn Notifier> = match payload.line_token.filter(|t| !t.is_empty()) {
        Some(token) => Arc::new(LineNotifier::new(&token)),
        None => state.default_notifier.clone(),
    };

    if let Err(e) = state
        .registry
        .send_order(&exchange, &symbol, side, &state.audit, &notifier)
    {
        warn!("{exchange}/{symbol}: webhook dispatch failed: {e}");
    }

    (StatusCode::OK, "ok")
}
