//! HTTP and WebSocket surface for the session relay

use std::sync::Arc;

use axum::{
    Json, Router,
    extract::{
        DefaultBodyLimit, Query, State, WebSocketUpgrade,
        ws::{CloseFrame, Message, WebSocket, close_code},
    },
    http::StatusCode,
    response::IntoResponse,
    routing::{get, post},
};
use futures::{SinkExt, StreamExt};
use serde::{Deserialize, Serialize};
use serde_json::Value;
use tokio::net::TcpListener;
use tower_http::cors::{Any, CorsLayer};
use tower_http::trace::TraceLayer;

use super::{PEER_ROLE, SessionRelay, peer_channel};
use crate::config::RelayConfig;
use crate::{Error, Result};

/// Liveness response
#[derive(Serialize)]
struct HealthResponse {
    ok: bool,
}

/// Body of a notify request
#[derive(Debug, Deserialize)]
struct NotifyRequest {
    session: Option<String>,
    #[serde(rename = "type")]
    kind: Option<String>,
    payload: Option<Value>,
}

/// Response to a notify request
#[derive(Serialize)]
struct NotifyResponse {
    delivered: usize,
    #[serde(skip_serializing_if = "std::ops::Not::not")]
    throttled: bool,
}

/// Client-error response body
#[derive(Serialize)]
struct ErrorResponse {
    error: String,
}

/// Query parameters for a socket connection
#[derive(Debug, Deserialize)]
struct WsQuery {
    session: Option<String>,
    role: Option<String>,
}

/// Build the relay router
pub fn router(relay: Arc<SessionRelay>, body_limit: usize) -> Router {
    let cors = CorsLayer::new()
        .allow_origin(Any)
        .allow_methods(Any)
        .allow_headers(Any);

    Router::new()
        .route("/health", get(health))
        .route("/notify", post(notify))
        .route("/ws", get(ws_upgrade))
        .layer(DefaultBodyLimit::max(body_limit))
        .layer(cors)
        .layer(TraceLayer::new_for_http())
        .with_state(relay)
}

/// Liveness probe
async fn health() -> Json<HealthResponse> {
    Json(HealthResponse { ok: true })
}

/// Deliver a notification to a session's peers
///
/// A missing or empty `session` is rejected up front: no push record is
/// stamped and no delivery is attempted.
async fn notify(
    State(relay): State<Arc<SessionRelay>>,
    Json(request): Json<NotifyRequest>,
) -> impl IntoResponse {
    let Some(session) = request.session.filter(|s| !s.is_empty()) else {
        return (
            StatusCode::BAD_REQUEST,
            Json(ErrorResponse {
                error: "session required".to_string(),
            }),
        )
            .into_response();
    };

    let kind = request.kind.as_deref().unwrap_or("found");
    let payload = request.payload.unwrap_or_else(|| serde_json::json!({}));

    match relay.notify(&session, kind, &payload).await {
        Ok(outcome) => Json(NotifyResponse {
            delivered: outcome.delivered,
            throttled: outcome.throttled,
        })
        .into_response(),
        Err(e) => {
            tracing::error!(error = %e, session = %session, "notify failed");
            (
                StatusCode::INTERNAL_SERVER_ERROR,
                Json(ErrorResponse {
                    error: e.to_string(),
                }),
            )
                .into_response()
        }
    }
}

/// Handle a WebSocket upgrade request
async fn ws_upgrade(
    State(relay): State<Arc<SessionRelay>>,
    Query(query): Query<WsQuery>,
    ws: WebSocketUpgrade,
) -> impl IntoResponse {
    ws.on_upgrade(move |socket| handle_socket(socket, relay, query))
}

/// Close a socket with the protocol-violation code
async fn close_with_violation(mut socket: WebSocket, reason: &'static str) {
    tracing::warn!(reason, "closing socket");
    let _ = socket
        .send(Message::Close(Some(CloseFrame {
            code: close_code::POLICY,
            reason: reason.into(),
        })))
        .await;
}

/// Serve one peer connection for its lifetime
async fn handle_socket(socket: WebSocket, relay: Arc<SessionRelay>, query: WsQuery) {
    let Some(session) = query.session.filter(|s| !s.is_empty()) else {
        close_with_violation(socket, "missing session").await;
        return;
    };
    let role = query.role.unwrap_or_default();
    if role != PEER_ROLE {
        close_with_violation(socket, "invalid role").await;
        return;
    }

    let (tx, mut rx) = peer_channel();
    let peer_id = match relay.register(&session, &role, tx).await {
        Ok(id) => id,
        Err(e) => {
            tracing::warn!(error = %e, "registration rejected");
            close_with_violation(socket, "registration rejected").await;
            return;
        }
    };

    tracing::info!(session = %session, peer = %peer_id, "socket connected");

    let (mut sender, mut receiver) = socket.split();

    // Forward relay events to the socket
    let mut send_task = tokio::spawn(async move {
        while let Some(event) = rx.recv().await {
            if sender.send(Message::Text(event.into())).await.is_err() {
                break;
            }
        }
    });

    // Peers only receive; inbound traffic is drained until close
    let session_for_recv = session.clone();
    let mut recv_task = tokio::spawn(async move {
        while let Some(Ok(msg)) = receiver.next().await {
            match msg {
                Message::Close(_) => {
                    tracing::debug!(session = %session_for_recv, "socket closed by peer");
                    break;
                }
                Message::Ping(data) => {
                    tracing::trace!(len = data.len(), "received ping");
                }
                _ => {}
            }
        }
    });

    tokio::select! {
        _ = &mut send_task => recv_task.abort(),
        _ = &mut recv_task => send_task.abort(),
    }

    relay.unregister(&session, peer_id).await;
    tracing::info!(session = %session, peer = %peer_id, "socket disconnected");
}

/// Run the relay server until the process is stopped
///
/// # Errors
///
/// Returns error if the listener fails to bind or the server errors.
pub async fn serve(relay: Arc<SessionRelay>, config: &RelayConfig) -> Result<()> {
    let addr = format!("0.0.0.0:{}", config.port);
    let listener = TcpListener::bind(&addr)
        .await
        .map_err(|e| Error::Config(format!("failed to bind relay server: {e}")))?;

    tracing::info!(port = config.port, "relay listening");

    axum::serve(listener, router(relay, config.body_limit))
        .await
        .map_err(|e| Error::Config(format!("relay server error: {e}")))?;

    Ok(())
}
