//! Signal ingestion boundary: a small axum app exposing the TradingView-style
//! webhook plus read-only position and health endpoints.
//!
//! Payload validation lives entirely here; malformed signals are answered
//! with 400 and never reach the engine.

use std::net::SocketAddr;
use std::sync::Arc;

use axum::extract::State;
use axum::http::StatusCode;
use axum::response::{IntoResponse, Json, Response};
use axum::routing::{get, post};
use axum::Router;
use serde::{Deserialize, Serialize};
use tokio::sync::watch;
use tracing::info;

use crate::engine::EnvelopeCalculator;
use crate::error::BotError;
use crate::models::{Position, Side, Signal};
use crate::position::PositionRegistry;

/// Shared application state for axum handlers.
#[derive(Clone)]
pub struct AppState {
    pub engine: Arc<EnvelopeCalculator>,
    pub registry: Arc<PositionRegistry>,
    pub default_quantity: f64,
}

/// Incoming webhook body. Everything is optional so validation errors come
/// back as a clean 400 instead of a deserialization rejection.
#[derive(Debug, Deserialize)]
pub struct WebhookPayload {
    pub action: Option<String>,
    pub symbol: Option<String>,
    pub quantity: Option<f64>,
}

#[derive(Debug, Serialize)]
struct WebhookResponse {
    status: &'static str,
    position: Position,
}

#[derive(Debug, Serialize)]
struct ErrorResponse {
    error: String,
}

/// Create the axum router.
pub fn create_router(state: AppState) -> Router {
    Router::new()
        .route("/webhook", post(handle_webhook))
        .route("/positions", get(get_positions))
        .route("/health", get(health))
        .with_state(state)
}

async fn health() -> &'static str {
    "ok"
}

/// Snapshot of all open positions.
async fn get_positions(State(state): State<AppState>) -> Json<Vec<Position>> {
    Json(state.registry.snapshot())
}

/// Validate the signal payload and hand it to the envelope engine.
async fn handle_webhook(
    State(state): State<AppState>,
    Json(payload): Json<WebhookPayload>,
) -> Response {
    let signal = match validate(payload, state.default_quantity) {
        Ok(signal) => signal,
        Err(message) => {
            return (
                StatusCode::BAD_REQUEST,
                Json(ErrorResponse { error: message }),
            )
                .into_response();
        }
    };

    info!(symbol = %signal.symbol, side = signal.side.as_str(), "Signal received");

    match state.engine.open(signal).await {
        Ok(position) => (
            StatusCode::OK,
            Json(WebhookResponse {
                status: "ok",
                position,
            }),
        )
            .into_response(),
        Err(err) => (
            status_for(&err),
            Json(ErrorResponse {
                error: err.to_string(),
            }),
        )
            .into_response(),
    }
}

fn validate(payload: WebhookPayload, default_quantity: f64) -> Result<Signal, String> {
    let action = payload.action.ok_or("missing field: action")?;
    let side: Side = action
        .parse()
        .map_err(|_| format!("invalid action: {}", action))?;

    let symbol = payload.symbol.ok_or("missing field: symbol")?;
    if symbol.trim().is_empty() {
        return Err("symbol must not be empty".to_string());
    }

    let quantity = payload.quantity.unwrap_or(default_quantity);
    if !(quantity > 0.0 && quantity.is_finite()) {
        return Err(format!("invalid quantity: {}", quantity));
    }

    Ok(Signal {
        side,
        symbol: symbol.trim().to_string(),
        quantity,
    })
}

fn status_for(err: &BotError) -> StatusCode {
    match err {
        BotError::DuplicatePosition(_) => StatusCode::CONFLICT,
        BotError::InsufficientData(_) | BotError::OrderRejected(_) => {
            StatusCode::UNPROCESSABLE_ENTITY
        }
        BotError::VenueUnavailable(_) => StatusCode::BAD_GATEWAY,
        BotError::NotFound(_) => StatusCode::NOT_FOUND,
    }
}

/// Run the webhook server until the shutdown channel fires.
pub async fn run_server(
    state: AppState,
    port: u16,
    mut shutdown: watch::Receiver<bool>,
) -> anyhow::Result<()> {
    let app = create_router(state);
    let addr = SocketAddr::from(([0, 0, 0, 0], port));

    info!(port, "Starting webhook server");
    let listener = tokio::net::TcpListener::bind(addr).await?;
    axum::serve(listener, app)
        .with_graceful_shutdown(async move {
            let _ = shutdown.changed().await;
        })
        .await?;

    Ok(())
}
