use axum::{
    extract::{rejection::JsonRejection, State},
    http::Method,
    routing::{get, post},
    Json, Router,
};
use serde::{Deserialize, Serialize};
use tower_http::cors::{Any, CorsLayer};
use tower_http::trace::TraceLayer;
use tracing::debug;

use meshdash_bridge::{BridgeHandle, Command, StatusReport};
use meshdash_shared::types::{ChannelView, DisplayMessage, PeerView};

use crate::error::ServerError;
use crate::ws;

#[derive(Clone)]
pub struct AppState {
    pub bridge: BridgeHandle,
}

pub fn build_router(state: AppState) -> Router {
    let cors = CorsLayer::new()
        .allow_origin(Any)
        .allow_methods([Method::GET, Method::POST, Method::OPTIONS])
        .allow_headers(Any);

    Router::new()
        .route("/health", get(health_check))
        .route("/api/status", get(status))
        .route("/api/peers", get(peers))
        .route("/api/channels", get(channels))
        .route("/api/messages", get(messages))
        .route("/api/send_message", post(send_message))
        .route("/api/send_private", post(send_private))
        .route("/api/join_channel", post(join_channel))
        .route("/api/change_nickname", post(change_nickname))
        .route("/api/switch_mode", post(switch_mode))
        .route("/ws", get(ws::ws_handler))
        .layer(cors)
        .layer(TraceLayer::new_for_http())
        .with_state(state)
}

#[derive(Serialize)]
struct HealthResponse {
    status: &'static str,
    version: &'static str,
}

#[derive(Serialize)]
struct SubmitResponse {
    success: bool,
}

#[derive(Deserialize)]
struct SendMessageRequest {
    #[serde(default)]
    content: String,
}

#[derive(Deserialize)]
struct SendPrivateRequest {
    #[serde(default)]
    content: String,
    #[serde(default)]
    target: String,
}

#[derive(Deserialize)]
struct JoinChannelRequest {
    #[serde(default)]
    channel: String,
    password: Option<String>,
}

#[derive(Deserialize)]
struct ChangeNicknameRequest {
    #[serde(default)]
    nickname: String,
}

#[derive(Deserialize)]
struct SwitchModeRequest {
    #[serde(rename = "type", default)]
    kind: String,
    target: Option<String>,
}

async fn health_check() -> Json<HealthResponse> {
    Json(HealthResponse {
        status: "ok",
        version: env!("CARGO_PKG_VERSION"),
    })
}

async fn status(State(state): State<AppState>) -> Json<StatusReport> {
    Json(state.bridge.status_report())
}

async fn peers(State(state): State<AppState>) -> Json<Vec<PeerView>> {
    Json(state.bridge.peers())
}

async fn channels(State(state): State<AppState>) -> Json<Vec<ChannelView>> {
    Json(state.bridge.channels())
}

async fn messages(State(state): State<AppState>) -> Json<Vec<DisplayMessage>> {
    Json(state.bridge.recent_messages())
}

/// Validate, enqueue and acknowledge. The engine applies it on its next tick.
fn submit(state: &AppState, command: Command) -> Result<Json<SubmitResponse>, ServerError> {
    let label = command.label();
    state.bridge.submit(command)?;
    debug!(command = label, "Command queued");
    Ok(Json(SubmitResponse { success: true }))
}

async fn send_message(
    State(state): State<AppState>,
    payload: Result<Json<SendMessageRequest>, JsonRejection>,
) -> Result<Json<SubmitResponse>, ServerError> {
    let Json(req) = payload?;
    submit(&state, Command::send_broadcast(&req.content)?)
}

async fn send_private(
    State(state): State<AppState>,
    payload: Result<Json<SendPrivateRequest>, JsonRejection>,
) -> Result<Json<SubmitResponse>, ServerError> {
    let Json(req) = payload?;
    submit(&state, Command::send_direct(&req.content, &req.target)?)
}

async fn join_channel(
    State(state): State<AppState>,
    payload: Result<Json<JoinChannelRequest>, JsonRejection>,
) -> Result<Json<SubmitResponse>, ServerError> {
    let Json(req) = payload?;
    submit(
        &state,
        Command::join_channel(&req.channel, req.password.as_deref())?,
    )
}

async fn change_nickname(
    State(state): State<AppState>,
    payload: Result<Json<ChangeNicknameRequest>, JsonRejection>,
) -> Result<Json<SubmitResponse>, ServerError> {
    let Json(req) = payload?;
    submit(&state, Command::change_nickname(&req.nickname)?)
}

async fn switch_mode(
    State(state): State<AppState>,
    payload: Result<Json<SwitchModeRequest>, JsonRejection>,
) -> Result<Json<SubmitResponse>, ServerError> {
    let Json(req) = payload?;
    submit(
        &state,
        Command::switch_mode(&req.kind, req.target.as_deref())?,
    )
}
