use axum::Router;
use axum::extract::State;
use axum::extract::ws::rejection::WebSocketUpgradeRejection;
use axum::extract::ws::{Message, WebSocket, WebSocketUpgrade};
use axum::http::StatusCode;
use axum::response::{IntoResponse, Response};
use axum::routing::get;
use futures::{SinkExt as _, StreamExt as _, future};
use serde::Serialize;
use tracing::{debug, info};

use crate::session::{Inbound, Session};
use crate::{LOG_TARGET, SharedState};

pub struct AppJson<T>(pub T);

impl<T> IntoResponse for AppJson<T>
where
    axum::Json<T>: IntoResponse,
{
    fn into_response(self) -> Response {
        axum::Json(self.0).into_response()
    }
}

#[derive(Serialize)]
pub struct ErrorResponse {
    pub message: String,
}

#[derive(Serialize)]
pub struct StatusResponse {
    pub status: &'static str,
    pub message: String,
    pub connections: usize,
}

pub fn route_handler(state: SharedState) -> Router {
    Router::new()
        .route("/", get(ws_upgrade))
        .route("/ws", get(ws_upgrade))
        .route("/status", get(status))
        .fallback(not_found)
        .with_state(state)
}

async fn status(State(state): State<SharedState>) -> AppJson<StatusResponse> {
    AppJson(StatusResponse {
        status: "ok",
        message: format!(
            "WebSocket server is running on ws://localhost:{}",
            state.local_addr.port()
        ),
        connections: state.connections(),
    })
}

async fn not_found() -> impl IntoResponse {
    (
        StatusCode::NOT_FOUND,
        AppJson(ErrorResponse {
            message: "Not Found".to_string(),
        }),
    )
}

/// Plain requests to a websocket path get the same 404 as any unknown path
async fn ws_upgrade(
    State(state): State<SharedState>,
    ws: Result<WebSocketUpgrade, WebSocketUpgradeRejection>,
) -> Response {
    match ws {
        Ok(ws) => ws
            .on_upgrade(move |socket| handle_socket(socket, state))
            .into_response(),
        Err(rejection) => {
            debug!(target: LOG_TARGET, %rejection, "Not a websocket request");
            not_found().await.into_response()
        }
    }
}

async fn handle_socket(socket: WebSocket, state: SharedState) {
    let connection = state.open_connection();
    info!(
        target: LOG_TARGET,
        conn_id = connection.id,
        connections = state.connections(),
        "Client connected"
    );

    let (tx, rx) = socket.split();
    let tx = tx.with(|text: String| future::ok::<_, axum::Error>(Message::Text(text.into())));
    let rx = rx.map(|msg| msg.map(Inbound::from));

    let end = Session::new(
        connection.id,
        state.feed.clone(),
        state.update_interval,
        tx,
        rx,
    )
    .run()
    .await;

    info!(
        target: LOG_TARGET,
        conn_id = connection.id,
        ?end,
        "Client disconnected"
    );
}
