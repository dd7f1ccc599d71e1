use std::sync::Arc;

use axum::{
    body::Bytes,
    extract::{
        ws::{Message, WebSocket, WebSocketUpgrade},
        Path, State,
    },
    http::StatusCode,
    response::{IntoResponse, Response},
    routing::{get, post},
    Json, Router,
};
use futures_util::{SinkExt, StreamExt};
use printdash_core::api::{ControlResponse, HomeRequest, JogRequest, UpdateEvent};
use printdash_core::{CombinedPayload, PrinterCommand};
use serde::de::DeserializeOwned;
use tower_http::{cors::CorsLayer, trace::TraceLayer};

use crate::gateway::{CommandError, CommandGateway};
use crate::hub::{Hub, Subscription};

#[derive(Clone)]
pub struct AppState {
    hub: Arc<Hub>,
    gateway: CommandGateway,
}

pub fn router(hub: Arc<Hub>, gateway: CommandGateway) -> Router {
    let state = AppState { hub, gateway };
    Router::new()
        .route("/healthz", get(healthz))
        .route("/ws", get(subscribe))
        .route("/api/status", get(latest_status))
        .route("/api/control/{printer}/jog", post(jog))
        .route("/api/control/{printer}/home", post(home))
        .route("/api/control/{printer}/{action}", post(job_action))
        .layer(TraceLayer::new_for_http())
        .layer(CorsLayer::permissive())
        .with_state(state)
}

async fn healthz() -> &'static str {
    "ok"
}

async fn latest_status(State(st): State<AppState>) -> Result<Json<CombinedPayload>, ApiError> {
    match st.hub.latest().await {
        Some(payload) => Ok(Json(CombinedPayload::clone(&payload))),
        None => Err(ApiError::NotReady),
    }
}

async fn subscribe(ws: WebSocketUpgrade, State(st): State<AppState>) -> Response {
    ws.on_upgrade(move |socket| stream_updates(socket, st.hub))
}

/// Pumps hub payloads into one socket until either side goes away.
async fn stream_updates(socket: WebSocket, hub: Arc<Hub>) {
    let Subscription { id, mut rx } = hub.subscribe().await;
    let (mut sink, mut incoming) = socket.split();

    loop {
        tokio::select! {
            payload = rx.recv() => {
                let Some(payload) = payload else { break };
                let frame = match serde_json::to_string(&UpdateEvent::update(&payload)) {
                    Ok(frame) => frame,
                    Err(e) => {
                        tracing::error!(error = %e, "failed to encode update");
                        continue;
                    }
                };
                if let Err(e) = sink.send(Message::Text(frame.into())).await {
                    tracing::debug!(subscriber = %id, error = %e, "socket write failed");
                    break;
                }
            }
            msg = incoming.next() => match msg {
                Some(Ok(Message::Close(_))) | Some(Err(_)) | None => break,
                Some(Ok(_)) => {}
            },
        }
    }

    hub.unsubscribe(id).await;
}

async fn job_action(
    State(st): State<AppState>,
    Path((printer, action)): Path<(String, String)>,
) -> Result<Json<ControlResponse>, ApiError> {
    ensure_known(&st.gateway, &printer)?;
    let command = PrinterCommand::from_action(&action).map_err(CommandError::from)?;
    st.gateway.execute(&printer, &command).await?;
    Ok(Json(ControlResponse::ok()))
}

async fn jog(
    State(st): State<AppState>,
    Path(printer): Path<String>,
    body: Bytes,
) -> Result<Json<ControlResponse>, ApiError> {
    ensure_known(&st.gateway, &printer)?;
    let req: JogRequest = parse_body(&body)?;
    st.gateway.execute(&printer, &req.into()).await?;
    Ok(Json(ControlResponse::ok()))
}

async fn home(
    State(st): State<AppState>,
    Path(printer): Path<String>,
    body: Bytes,
) -> Result<Json<ControlResponse>, ApiError> {
    ensure_known(&st.gateway, &printer)?;
    let req: HomeRequest = parse_body(&body)?;
    st.gateway.execute(&printer, &req.into()).await?;
    Ok(Json(ControlResponse::ok()))
}

fn ensure_known(gateway: &CommandGateway, printer: &str) -> Result<(), ApiError> {
    if gateway.knows(printer) {
        Ok(())
    } else {
        Err(CommandError::UnknownPrinter(printer.to_string()).into())
    }
}

/// An empty body means "all defaults".
fn parse_body<T: DeserializeOwned + Default>(body: &[u8]) -> Result<T, ApiError> {
    if body.iter().all(u8::is_ascii_whitespace) {
        return Ok(T::default());
    }
    serde_json::from_slice(body).map_err(|e| ApiError::BadRequest(e.to_string()))
}

#[derive(Debug)]
pub enum ApiError {
    Command(CommandError),
    BadRequest(String),
    NotReady,
}

impl From<CommandError> for ApiError {
    fn from(value: CommandError) -> Self {
        Self::Command(value)
    }
}

impl IntoResponse for ApiError {
    fn into_response(self) -> Response {
        let (status, message) = match &self {
            ApiError::Command(e @ (CommandError::UnknownPrinter(_) | CommandError::BadCommand(_))) => {
                (StatusCode::BAD_REQUEST, e.to_string())
            }
            ApiError::Command(e) => {
                tracing::error!(error = %e, "command failed");
                (StatusCode::INTERNAL_SERVER_ERROR, e.to_string())
            }
            ApiError::BadRequest(msg) => (StatusCode::BAD_REQUEST, msg.clone()),
            ApiError::NotReady => (
                StatusCode::SERVICE_UNAVAILABLE,
                "no payload collected yet".to_string(),
            ),
        };
        (status, Json(ControlResponse::failed(message))).into_response()
    }
}
