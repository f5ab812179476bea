use std::time::{Duration, Instant};

use tokio::sync::{broadcast, mpsc, oneshot};

use brawl_shared::protocol::{
    CapacityResponseMsg, ParticipantWire, PlayerColorChangedMsg, PlayerCountMsg, PlayerLeftMsg,
    PlayerMovedMsg, Rotation, ServerMsg,
};

use crate::config::ServerConfig;
use crate::registry::{JoinError, SessionRegistry};
use crate::throttle::MoveThrottle;

/// Commands from client connections to the session loop
pub enum SessionCommand {
    /// New WebSocket connection: reserve an id and report the current count.
    Connect {
        reply: oneshot::Sender<(u32, PlayerCountMsg)>,
    },
    CheckCapacity {
        reply: oneshot::Sender<CapacityResponseMsg>,
    },
    Join {
        id: u32,
        position: [f64; 3],
        rotation: Rotation,
        color: String,
        name: String,
        reply: oneshot::Sender<JoinReply>,
    },
    Move {
        id: u32,
        position: [f64; 3],
        rotation: Rotation,
    },
    ColorChange {
        id: u32,
        color: String,
    },
    Disconnect {
        id: u32,
    },
}

/// Outcome of a join attempt, sent back to the joining connection.
#[derive(Debug)]
pub enum JoinReply {
    /// Everyone already in the session, in join order, excluding the joiner.
    Admitted { players: Vec<ParticipantWire> },
    Full,
    /// Duplicate join from a connection that already holds a slot.
    Ignored,
}

/// One fan-out unit from the session loop. `except` suppresses delivery to
/// the originating connection, which already knows about its own update.
#[derive(Debug, Clone)]
pub struct SessionBroadcast {
    pub except: Option<u32>,
    pub msg: ServerMsg,
}

impl SessionBroadcast {
    fn to_all(msg: ServerMsg) -> Self {
        Self { except: None, msg }
    }

    fn to_others(origin: u32, msg: ServerMsg) -> Self {
        Self {
            except: Some(origin),
            msg,
        }
    }
}

/// Session state owned by the loop task. Methods are synchronous and take
/// the current time as an argument, so throttle and staleness behavior can
/// be tested without sleeping.
pub struct SessionHub {
    registry: SessionRegistry,
    throttle: MoveThrottle,
    liveness_window: Duration,
}

impl SessionHub {
    pub fn new(config: &ServerConfig) -> Self {
        Self {
            registry: SessionRegistry::new(config.max_players),
            throttle: MoveThrottle::new(config.movement_throttle()),
            liveness_window: config.liveness_window(),
        }
    }

    /// Register a connection: hand out its id and the current player count
    /// for the welcome message.
    pub fn connect(&mut self) -> (u32, PlayerCountMsg) {
        (self.registry.allocate_id(), self.registry.get_player_count())
    }

    /// Non-reserving capacity probe.
    pub fn capacity(&self) -> CapacityResponseMsg {
        let count = self.registry.get_player_count();
        CapacityResponseMsg {
            can_join: self.registry.can_join(),
            current: count.current,
            max: count.max,
        }
    }

    pub fn join(
        &mut self,
        id: u32,
        position: [f64; 3],
        rotation: Rotation,
        color: String,
        name: String,
        now: Instant,
    ) -> (JoinReply, Vec<SessionBroadcast>) {
        match self.registry.join(id, position, rotation, color, name, now) {
            Ok(wire) => {
                let players = self.registry.snapshot_excluding(id);
                let broadcasts = vec![
                    SessionBroadcast::to_others(id, ServerMsg::PlayerJoined(wire)),
                    SessionBroadcast::to_all(ServerMsg::PlayerCount(
                        self.registry.get_player_count(),
                    )),
                ];
                tracing::info!("Player {} joined", id);
                (JoinReply::Admitted { players }, broadcasts)
            }
            Err(JoinError::Full { current, max }) => {
                tracing::info!("Join refused for {}: session full ({}/{})", id, current, max);
                (JoinReply::Full, Vec::new())
            }
            Err(JoinError::AlreadyJoined) => {
                tracing::debug!("Duplicate join from {} ignored", id);
                (JoinReply::Ignored, Vec::new())
            }
        }
    }

    pub fn apply_move(
        &mut self,
        id: u32,
        position: [f64; 3],
        rotation: Rotation,
        now: Instant,
    ) -> Vec<SessionBroadcast> {
        // Senders outside the roster must not seed a throttle baseline.
        if !self.registry.contains(id) {
            return Vec::new();
        }
        if !self.throttle.should_accept(id, now) {
            return Vec::new();
        }
        self.registry.apply_move(id, position, rotation.clone(), now);
        vec![SessionBroadcast::to_others(
            id,
            ServerMsg::PlayerMoved(PlayerMovedMsg {
                id,
                position,
                rotation,
            }),
        )]
    }

    pub fn apply_color(&mut self, id: u32, color: String, now: Instant) -> Vec<SessionBroadcast> {
        if !self.registry.apply_color(id, color.clone(), now) {
            return Vec::new();
        }
        vec![SessionBroadcast::to_others(
            id,
            ServerMsg::PlayerColorChanged(PlayerColorChangedMsg { id, color }),
        )]
    }

    pub fn disconnect(&mut self, id: u32) -> Vec<SessionBroadcast> {
        self.throttle.forget(id);
        if self.registry.remove(id).is_none() {
            // Never joined, or already reaped.
            return Vec::new();
        }
        tracing::info!("Player {} left", id);
        self.departure_broadcasts(id)
    }

    /// Sweep out participants whose idle time exceeds the liveness window.
    /// Each one departs exactly as if it had disconnected.
    pub fn reap(&mut self, now: Instant) -> Vec<SessionBroadcast> {
        let mut out = Vec::new();
        for id in self.registry.stale_ids(now, self.liveness_window) {
            self.throttle.forget(id);
            if self.registry.remove(id).is_some() {
                tracing::info!("Reaped stale player {}", id);
                out.extend(self.departure_broadcasts(id));
            }
        }
        out
    }

    fn departure_broadcasts(&self, id: u32) -> Vec<SessionBroadcast> {
        vec![
            SessionBroadcast::to_all(ServerMsg::PlayerLeft(PlayerLeftMsg { id })),
            SessionBroadcast::to_all(ServerMsg::PlayerCount(self.registry.get_player_count())),
        ]
    }
}

/// Run the session loop. Owns all session state; connections talk to it
/// through the command channel and hear back through the broadcast channel.
pub async fn run_session_loop(
    mut cmd_rx: mpsc::Receiver<SessionCommand>,
    broadcast_tx: broadcast::Sender<SessionBroadcast>,
    config: ServerConfig,
) {
    let mut hub = SessionHub::new(&config);

    let mut sweep_interval = tokio::time::interval(config.sweep_period());
    sweep_interval.set_missed_tick_behavior(tokio::time::MissedTickBehavior::Skip);

    loop {
        tokio::select! {
            _ = sweep_interval.tick() => {
                fan_out(&broadcast_tx, hub.reap(Instant::now()));
            }

            Some(cmd) = cmd_rx.recv() => {
                match cmd {
                    SessionCommand::Connect { reply } => {
                        let _ = reply.send(hub.connect());
                    }
                    SessionCommand::CheckCapacity { reply } => {
                        let _ = reply.send(hub.capacity());
                    }
                    SessionCommand::Join { id, position, rotation, color, name, reply } => {
                        let (join_reply, broadcasts) =
                            hub.join(id, position, rotation, color, name, Instant::now());
                        let _ = reply.send(join_reply);
                        fan_out(&broadcast_tx, broadcasts);
                    }
                    SessionCommand::Move { id, position, rotation } => {
                        fan_out(
                            &broadcast_tx,
                            hub.apply_move(id, position, rotation, Instant::now()),
                        );
                    }
                    SessionCommand::ColorChange { id, color } => {
                        fan_out(&broadcast_tx, hub.apply_color(id, color, Instant::now()));
                    }
                    SessionCommand::Disconnect { id } => {
                        fan_out(&broadcast_tx, hub.disconnect(id));
                    }
                }
            }

            else => break,
        }
    }

    tracing::info!("Session loop ended");
}

fn fan_out(broadcast_tx: &broadcast::Sender<SessionBroadcast>, broadcasts: Vec<SessionBroadcast>) {
    for bc in broadcasts {
        let _ = broadcast_tx.send(bc);
    }
}
