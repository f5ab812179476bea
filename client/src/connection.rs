//! Connection to the presence server with automatic reconnect.
//!
//! The network task owns the socket and runs until the handle is dropped or
//! the server turns out to speak an incompatible protocol. Everything else
//! flows through two channels: commands in, events out. A dropped connection
//! comes back as a fresh session, the consumer re-joins on the next welcome.

use std::time::Duration;

use futures_util::{SinkExt, StreamExt};
use tokio::sync::mpsc::{self, UnboundedReceiver, UnboundedSender};
use tokio_tungstenite::tungstenite::Message;

use brawl_shared::protocol::{ClientMsg, Rotation, ServerMsg, PROTOCOL_VERSION};

const INITIAL_RECONNECT_DELAY: Duration = Duration::from_millis(1000);
const MAX_RECONNECT_DELAY: Duration = Duration::from_millis(30_000);

#[derive(Debug, Clone)]
pub enum NetEvent {
    Connected,
    Disconnected,
    Message(ServerMsg),
    ProtocolMismatch { server: u32, client: u32 },
}

/// Handle to the background network task.
pub struct ServerConnection {
    event_rx: UnboundedReceiver<NetEvent>,
    cmd_tx: UnboundedSender<ClientMsg>,
}

impl ServerConnection {
    /// Spawn the network task and start connecting to `url`.
    pub fn open(url: String) -> Self {
        let (event_tx, event_rx) = mpsc::unbounded_channel();
        let (cmd_tx, cmd_rx) = mpsc::unbounded_channel();
        tokio::spawn(run_network_task(url, event_tx, cmd_rx));
        Self { event_rx, cmd_tx }
    }

    /// Next network event. `None` once the network task has shut down.
    pub async fn next_event(&mut self) -> Option<NetEvent> {
        self.event_rx.recv().await
    }

    pub fn send_check_capacity(&self) {
        self.send(ClientMsg::CheckCapacity);
    }

    pub fn send_join(&self, position: [f64; 3], rotation: Rotation, color: String, name: String) {
        self.send(ClientMsg::Join {
            position,
            rotation,
            color,
            name,
        });
    }

    pub fn send_move(&self, position: [f64; 3], rotation: Rotation) {
        self.send(ClientMsg::PlayerMove { position, rotation });
    }

    pub fn send_color_change(&self, color: String) {
        self.send(ClientMsg::PlayerColorChange { color });
    }

    fn send(&self, msg: ClientMsg) {
        let _ = self.cmd_tx.send(msg);
    }
}

async fn run_network_task(
    url: String,
    event_tx: UnboundedSender<NetEvent>,
    mut cmd_rx: UnboundedReceiver<ClientMsg>,
) {
    let mut reconnect_delay = INITIAL_RECONNECT_DELAY;

    loop {
        if event_tx.is_closed() {
            return;
        }

        let (ws_stream, _) = match tokio_tungstenite::connect_async(url.as_str()).await {
            Ok(x) => x,
            Err(err) => {
                tracing::debug!(
                    error = %err,
                    delay_ms = reconnect_delay.as_millis() as u64,
                    "Connect failed, retrying"
                );
                tokio::time::sleep(reconnect_delay).await;
                reconnect_delay = (reconnect_delay.mul_f32(1.5)).min(MAX_RECONNECT_DELAY);
                continue;
            }
        };

        reconnect_delay = INITIAL_RECONNECT_DELAY;
        let _ = event_tx.send(NetEvent::Connected);

        let (mut write, mut read) = ws_stream.split();

        loop {
            tokio::select! {
                biased;

                cmd = cmd_rx.recv() => {
                    // The handle is gone, nothing left to do.
                    let Some(cmd) = cmd else {
                        let _ = write.close().await;
                        return;
                    };
                    if let Ok(text) = serde_json::to_string(&cmd) {
                        if write.send(Message::Text(text.into())).await.is_err() {
                            break;
                        }
                    }
                }

                msg = read.next() => {
                    match msg {
                        Some(Ok(Message::Text(txt))) => {
                            if let Ok(server_msg) =
                                serde_json::from_str::<ServerMsg>(txt.as_str())
                            {
                                if let ServerMsg::Welcome(w) = &server_msg {
                                    if w.protocol_version != PROTOCOL_VERSION {
                                        let _ = event_tx.send(NetEvent::ProtocolMismatch {
                                            server: w.protocol_version,
                                            client: PROTOCOL_VERSION,
                                        });
                                        let _ = write.close().await;
                                        // A mismatch will not heal by retrying.
                                        return;
                                    }
                                }
                                let _ = event_tx.send(NetEvent::Message(server_msg));
                            }
                        }
                        Some(Ok(Message::Ping(data))) => {
                            if write.send(Message::Pong(data)).await.is_err() {
                                break;
                            }
                        }
                        Some(Ok(Message::Close(_))) => {
                            break;
                        }
                        Some(Ok(_)) => {}
                        Some(Err(_)) => {
                            break;
                        }
                        None => {
                            break;
                        }
                    }
                }
            }
        }

        let _ = event_tx.send(NetEvent::Disconnected);
        tokio::time::sleep(reconnect_delay).await;
        reconnect_delay = (reconnect_delay.mul_f32(1.5)).min(MAX_RECONNECT_DELAY);
    }
}
