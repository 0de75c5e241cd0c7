//! REST API for host integration
//!
//! Exposes published variables, the snapshot, feedback results and the
//! action catalog over HTTP, plus a WebSocket that pushes changes.
//! Default port: 8126

use anyhow::{Context, Result};
use axum::{
    extract::{
        ws::{Message, WebSocket, WebSocketUpgrade},
        Path, Query, State,
    },
    http::StatusCode,
    response::{IntoResponse, Response},
    routing::{get, post},
    Json, Router,
};
use serde::{Deserialize, Serialize};
use std::sync::Arc;
use tokio::sync::broadcast;
use tower_http::cors::CorsLayer;
use tracing::{debug, info, warn};

use crate::actions::{Action, DispatchError};
use crate::feedback::Feedback;
use crate::gateway::Gateway;
use crate::state::ButtonStatus;
use crate::surface::{FeedbackState, SurfaceUpdate};
use crate::sync::PollOutcome;
use crate::variables::{self, VariableDefinition, VariableValue, VariableValues};

/// Default API port
pub const DEFAULT_API_PORT: u16 = 8126;

/// Shared state for API handlers
pub struct ApiState {
    pub gateway: Arc<Gateway>,
}

/// API error response
#[derive(Debug, Serialize)]
struct ApiError {
    #[serde(skip)]
    status: StatusCode,
    error: String,
}

impl ApiError {
    fn new(status: StatusCode, error: impl Into<String>) -> Self {
        Self {
            status,
            error: error.into(),
        }
    }

    fn not_found(error: impl Into<String>) -> Self {
        Self::new(StatusCode::NOT_FOUND, error)
    }
}

impl IntoResponse for ApiError {
    fn into_response(self) -> Response {
        (self.status, Json(self)).into_response()
    }
}

impl From<DispatchError> for ApiError {
    fn from(err: DispatchError) -> Self {
        match err {
            DispatchError::Invalid(e) => ApiError::new(StatusCode::BAD_REQUEST, e.to_string()),
            DispatchError::Transport(e) => ApiError::new(StatusCode::BAD_GATEWAY, e.to_string()),
        }
    }
}

#[derive(Debug, Deserialize)]
struct VariablesQuery {
    prefix: Option<String>,
}

#[derive(Debug, Serialize)]
struct ButtonEntry {
    button: u32,
    #[serde(flatten)]
    status: ButtonStatus,
}

#[derive(Debug, Serialize)]
struct EvaluateResponse {
    feedback: Feedback,
    value: bool,
}

#[derive(Debug, Serialize)]
struct PollResponse {
    outcome: &'static str,
    #[serde(skip_serializing_if = "Option::is_none")]
    active_clip: Option<u32>,
    #[serde(skip_serializing_if = "Option::is_none")]
    buttons: Option<usize>,
}

impl From<PollOutcome> for PollResponse {
    fn from(outcome: PollOutcome) -> Self {
        let (name, report) = match outcome {
            PollOutcome::Applied(report) => ("applied", Some(report)),
            PollOutcome::NoButtons => ("no_buttons", None),
            PollOutcome::Failed => ("failed", None),
            PollOutcome::Skipped => ("skipped", None),
            PollOutcome::Discarded => ("discarded", None),
        };
        Self {
            outcome: name,
            active_clip: report.as_ref().and_then(|r| r.active_clip),
            buttons: report.as_ref().map(|r| r.buttons),
        }
    }
}

/// Build the API router
pub fn build_router(state: Arc<ApiState>) -> Router {
    Router::new()
        .route("/api/health", get(health_check))
        .route("/api/variables", get(list_variables))
        .route("/api/variables/definitions", get(list_definitions))
        .route("/api/variables/:id", get(get_variable))
        .route("/api/buttons", get(list_buttons))
        .route("/api/buttons/:n", get(get_button))
        .route("/api/feedbacks", get(list_feedbacks))
        .route("/api/feedbacks/evaluate", post(evaluate_feedback))
        .route("/api/actions", post(run_action))
        .route("/api/poll", post(poll_now))
        .route("/api/ws/updates", get(updates_ws))
        .layer(CorsLayer::permissive())
        .with_state(state)
}

/// GET /api/health - Health check endpoint
async fn health_check() -> &'static str {
    "ok"
}

/// GET /api/variables?prefix= - Published variables
async fn list_variables(
    Query(query): Query<VariablesQuery>,
    State(state): State<Arc<ApiState>>,
) -> Json<VariableValues> {
    Json(state.gateway.surface().variables(query.prefix.as_deref()))
}

/// GET /api/variables/definitions - Variable catalog
async fn list_definitions() -> Json<Vec<VariableDefinition>> {
    Json(variables::definitions())
}

/// GET /api/variables/:id - One variable
async fn get_variable(
    Path(id): Path<String>,
    State(state): State<Arc<ApiState>>,
) -> Result<Json<VariableValue>, ApiError> {
    state
        .gateway
        .surface()
        .variable(&id)
        .map(Json)
        .ok_or_else(|| ApiError::not_found(format!("Variable '{}' has not been published", id)))
}

/// GET /api/buttons - Current snapshot
async fn list_buttons(State(state): State<Arc<ApiState>>) -> Json<Vec<ButtonEntry>> {
    let entries = state
        .gateway
        .store()
        .entries()
        .into_iter()
        .map(|(button, status)| ButtonEntry { button, status })
        .collect();
    Json(entries)
}

/// GET /api/buttons/:n - One button from the snapshot
async fn get_button(
    Path(n): Path<u32>,
    State(state): State<Arc<ApiState>>,
) -> Result<Json<ButtonEntry>, ApiError> {
    state
        .gateway
        .store()
        .get(n)
        .map(|status| Json(ButtonEntry { button: n, status }))
        .ok_or_else(|| ApiError::not_found(format!("Button {} is not in the current snapshot", n)))
}

/// GET /api/feedbacks - Registered feedbacks with their last result
async fn list_feedbacks(
    State(state): State<Arc<ApiState>>,
) -> Json<std::collections::BTreeMap<String, FeedbackState>> {
    Json(state.gateway.surface().feedback_states())
}

/// POST /api/feedbacks/evaluate - Evaluate an ad-hoc feedback query
async fn evaluate_feedback(
    State(state): State<Arc<ApiState>>,
    Json(feedback): Json<Feedback>,
) -> Json<EvaluateResponse> {
    let value = state.gateway.surface().evaluate(&feedback);
    Json(EvaluateResponse { feedback, value })
}

/// POST /api/actions - Send one action to the device
async fn run_action(
    State(state): State<Arc<ApiState>>,
    Json(action): Json<Action>,
) -> Result<Json<serde_json::Value>, ApiError> {
    let response = state.gateway.execute(&action).await?;
    Ok(Json(serde_json::json!({
        "ok": true,
        "action": action.name(),
        "response": response,
    })))
}

/// POST /api/poll - Poll the device now
async fn poll_now(State(state): State<Arc<ApiState>>) -> Json<PollResponse> {
    Json(state.gateway.poll_now().await.into())
}

/// GET /api/ws/updates - WebSocket for push notifications
async fn updates_ws(
    ws: WebSocketUpgrade,
    State(state): State<Arc<ApiState>>,
) -> impl IntoResponse {
    let rx = state.gateway.surface().subscribe();
    ws.on_upgrade(move |socket| handle_websocket(socket, rx))
}

/// Forward surface updates to one WebSocket client
async fn handle_websocket(mut socket: WebSocket, mut rx: broadcast::Receiver<SurfaceUpdate>) {
    debug!("WebSocket client connected for updates");

    loop {
        tokio::select! {
            result = rx.recv() => {
                match result {
                    Ok(update) => {
                        let msg = match serde_json::to_string(&update) {
                            Ok(msg) => msg,
                            Err(e) => {
                                warn!("Failed to serialize update: {}", e);
                                continue;
                            }
                        };
                        if socket.send(Message::Text(msg)).await.is_err() {
                            debug!("WebSocket client disconnected");
                            break;
                        }
                    }
                    Err(broadcast::error::RecvError::Closed) => {
                        debug!("Broadcast channel closed");
                        break;
                    }
                    Err(broadcast::error::RecvError::Lagged(n)) => {
                        warn!("WebSocket client lagged by {} messages", n);
                    }
                }
            }
            result = socket.recv() => {
                match result {
                    Some(Ok(Message::Close(_))) | None => {
                        debug!("WebSocket client closed connection");
                        break;
                    }
                    Some(Ok(Message::Ping(data))) => {
                        if socket.send(Message::Pong(data)).await.is_err() {
                            break;
                        }
                    }
                    Some(Ok(_)) => {}
                    Some(Err(e)) => {
                        warn!("WebSocket error: {}", e);
                        break;
                    }
                }
            }
        }
    }
}

/// Start the API server
pub async fn start_server(state: Arc<ApiState>, port: u16) -> Result<()> {
    let router = build_router(state);

    let addr = std::net::SocketAddr::from(([0, 0, 0, 0], port));
    info!("🌐 Starting API server on http://{}", addr);

    let listener = tokio::net::TcpListener::bind(addr)
        .await
        .context("Failed to bind API server")?;

    axum::serve(listener, router)
        .await
        .context("API server error")?;

    Ok(())
}
