use std::sync::Arc;
use std::time::{Duration, Instant};

use axum::body::Bytes;
use axum::extract::ws::{Message, WebSocket, WebSocketUpgrade};
use axum::extract::State;
use axum::http::{HeaderMap, StatusCode};
use axum::response::{IntoResponse, Response};
use futures_util::stream::SplitSink;
use futures_util::{SinkExt, StreamExt};
use tokio::sync::{broadcast, mpsc, oneshot, OwnedSemaphorePermit, Semaphore};

use brawl_shared::protocol::{
    ClientMsg, ExistingPlayersMsg, PlayerCountMsg, ServerMsg, WelcomeMsg, PROTOCOL_VERSION,
};

use crate::session_loop::{JoinReply, SessionBroadcast, SessionCommand};

/// Shared app state passed to each WebSocket handler
#[derive(Clone)]
pub struct AppState {
    pub session_tx: mpsc::Sender<SessionCommand>,
    pub broadcast_tx: broadcast::Sender<SessionBroadcast>,
    /// Caps concurrent sockets; every connection holds one permit, joined
    /// or not.
    pub connection_semaphore: Arc<Semaphore>,
    pub allowed_origins: Vec<String>,
    pub max_message_bytes: usize,
    pub heartbeat_interval: Duration,
    pub heartbeat_timeout: Duration,
}

/// HTTP handler for WebSocket upgrade
pub async fn ws_handler(
    ws: WebSocketUpgrade,
    headers: HeaderMap,
    State(app_state): State<AppState>,
) -> Response {
    if !origin_allowed(&app_state.allowed_origins, &headers) {
        tracing::warn!("Rejected connection from disallowed origin");
        return StatusCode::FORBIDDEN.into_response();
    }

    let permit = match app_state.connection_semaphore.clone().try_acquire_owned() {
        Ok(permit) => permit,
        Err(_) => {
            tracing::warn!("Connection limit reached, refusing upgrade");
            return StatusCode::SERVICE_UNAVAILABLE.into_response();
        }
    };

    ws.on_upgrade(move |socket| handle_socket(socket, app_state, permit))
}

/// Check the Origin header against the configured allowlist. Requests
/// without an Origin header (native clients, curl) always pass; the list
/// only guards against unknown browser pages.
fn origin_allowed(allowed: &[String], headers: &HeaderMap) -> bool {
    if allowed.is_empty() {
        return true;
    }
    match headers.get("origin").and_then(|value| value.to_str().ok()) {
        Some(origin) => allowed.iter().any(|candidate| candidate == origin),
        None => true,
    }
}

async fn handle_socket(socket: WebSocket, app_state: AppState, _permit: OwnedSemaphorePermit) {
    let (mut sink, mut stream) = socket.split();

    let Some((my_id, count, mut broadcast_rx)) = register_connection(&app_state).await else {
        return;
    };

    tracing::info!("Connection {} established", my_id);

    let welcome = ServerMsg::Welcome(WelcomeMsg {
        protocol_version: PROTOCOL_VERSION,
        server_version: env!("CARGO_PKG_VERSION").to_string(),
        self_id: my_id,
        count,
    });
    if send_msg(&mut sink, &welcome).await.is_err() {
        let _ = app_state
            .session_tx
            .send(SessionCommand::Disconnect { id: my_id })
            .await;
        return;
    }

    let mut ping_interval = tokio::time::interval(app_state.heartbeat_interval);
    ping_interval.set_missed_tick_behavior(tokio::time::MissedTickBehavior::Skip);
    let mut last_seen = Instant::now();

    loop {
        tokio::select! {
            // Client -> Server
            msg = stream.next() => {
                match msg {
                    Some(Ok(Message::Text(text))) => {
                        last_seen = Instant::now();
                        if text.len() > app_state.max_message_bytes {
                            tracing::warn!(
                                "Connection {} sent an oversized frame ({} bytes), closing",
                                my_id,
                                text.len()
                            );
                            break;
                        }
                        match serde_json::from_str::<ClientMsg>(&text) {
                            Ok(client_msg) => {
                                if !dispatch(&mut sink, &app_state, my_id, client_msg).await {
                                    break;
                                }
                            }
                            Err(e) => {
                                tracing::debug!("Connection {}: unparseable message: {}", my_id, e);
                            }
                        }
                    }
                    Some(Ok(Message::Pong(_))) => {
                        last_seen = Instant::now();
                    }
                    Some(Ok(Message::Close(_))) | None => break,
                    // Ping and binary frames carry no commands but still
                    // count as signs of life.
                    Some(Ok(_)) => {
                        last_seen = Instant::now();
                    }
                    Some(Err(e)) => {
                        tracing::debug!("Connection {}: socket error: {}", my_id, e);
                        break;
                    }
                }
            }

            // Server -> Client (fan-out)
            result = broadcast_rx.recv() => {
                match result {
                    Ok(bc) => {
                        if bc.except == Some(my_id) {
                            continue; // Own update, the client already applied it
                        }
                        if send_msg(&mut sink, &bc.msg).await.is_err() {
                            break;
                        }
                    }
                    Err(broadcast::error::RecvError::Lagged(n)) => {
                        // Deltas are stateful, a gap corrupts the client's view
                        tracing::warn!("Connection {} lagged by {} messages, closing", my_id, n);
                        break;
                    }
                    Err(broadcast::error::RecvError::Closed) => break,
                }
            }

            // Liveness probe
            _ = ping_interval.tick() => {
                if last_seen.elapsed() > app_state.heartbeat_timeout {
                    tracing::info!("Connection {} timed out", my_id);
                    break;
                }
                if sink.send(Message::Ping(Bytes::new())).await.is_err() {
                    break;
                }
            }
        }
    }

    // Cleanup on disconnect
    let _ = app_state
        .session_tx
        .send(SessionCommand::Disconnect { id: my_id })
        .await;
    tracing::info!("Connection {} closed", my_id);
}

/// Register with the session loop and hand back the broadcast subscription.
/// The subscription opens before the Connect command goes out, so an
/// admission the loop processes right after ours cannot emit a player_count
/// this connection never sees.
async fn register_connection(
    app_state: &AppState,
) -> Option<(u32, PlayerCountMsg, broadcast::Receiver<SessionBroadcast>)> {
    let broadcast_rx = app_state.broadcast_tx.subscribe();

    let (resp_tx, resp_rx) = oneshot::channel();
    if app_state
        .session_tx
        .send(SessionCommand::Connect { reply: resp_tx })
        .await
        .is_err()
    {
        tracing::error!("Failed to send Connect command");
        return None;
    }
    match resp_rx.await {
        Ok((my_id, count)) => Some((my_id, count, broadcast_rx)),
        Err(_) => {
            tracing::error!("Failed to receive connect reply");
            None
        }
    }
}

/// Forward one parsed client message to the session loop and relay any
/// direct reply. Returns false when the connection should close.
async fn dispatch(
    sink: &mut SplitSink<WebSocket, Message>,
    app_state: &AppState,
    my_id: u32,
    msg: ClientMsg,
) -> bool {
    match msg {
        ClientMsg::CheckCapacity => {
            let (resp_tx, resp_rx) = oneshot::channel();
            if app_state
                .session_tx
                .send(SessionCommand::CheckCapacity { reply: resp_tx })
                .await
                .is_err()
            {
                return false;
            }
            match resp_rx.await {
                Ok(capacity) => send_msg(sink, &ServerMsg::CapacityResponse(capacity))
                    .await
                    .is_ok(),
                Err(_) => false,
            }
        }
        ClientMsg::Join {
            position,
            rotation,
            color,
            name,
        } => {
            let (resp_tx, resp_rx) = oneshot::channel();
            if app_state
                .session_tx
                .send(SessionCommand::Join {
                    id: my_id,
                    position,
                    rotation,
                    color,
                    name,
                    reply: resp_tx,
                })
                .await
                .is_err()
            {
                return false;
            }
            match resp_rx.await {
                Ok(JoinReply::Admitted { players }) => send_msg(
                    sink,
                    &ServerMsg::ExistingPlayers(ExistingPlayersMsg { players }),
                )
                .await
                .is_ok(),
                // The connection stays open so the client can retry once a
                // slot opens up.
                Ok(JoinReply::Full) => send_msg(sink, &ServerMsg::ServerFull).await.is_ok(),
                Ok(JoinReply::Ignored) => true,
                Err(_) => false,
            }
        }
        ClientMsg::PlayerMove { position, rotation } => app_state
            .session_tx
            .send(SessionCommand::Move {
                id: my_id,
                position,
                rotation,
            })
            .await
            .is_ok(),
        ClientMsg::PlayerColorChange { color } => app_state
            .session_tx
            .send(SessionCommand::ColorChange { id: my_id, color })
            .await
            .is_ok(),
    }
}

async fn send_msg(
    sink: &mut SplitSink<WebSocket, Message>,
    msg: &ServerMsg,
) -> Result<(), axum::Error> {
    let json = serde_json::to_string(msg).unwrap();
    sink.send(Message::Text(json.into())).await
}
