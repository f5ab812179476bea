use serde::{Deserialize, Serialize};
use ts_rs::TS;

/// Protocol version - increment when making breaking changes.
/// Clients check this against the `welcome` message and refuse to play
/// against an incompatible server.
pub const PROTOCOL_VERSION: u32 = 1;

/// Interval at which a joined client pushes its own pose upstream (ms).
/// The server throttles accepted moves to the same cadence, so pushing
/// faster only produces updates that get dropped.
pub const MOVE_PUSH_INTERVAL_MS: u64 = 50;

/// Rotation with a mandatory yaw. `y` is the yaw angle in radians; `x` and
/// `z` are carried for clients that send full euler angles and round-trip
/// unchanged (absent axes are omitted from the JSON).
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize, TS)]
#[ts(export, export_to = "../../web/src/net/generated/")]
pub struct Rotation {
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub x: Option<f64>,
    pub y: f64,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub z: Option<f64>,
}

impl Rotation {
    /// Yaw-only rotation, the minimum a client has to send.
    pub fn yaw(y: f64) -> Self {
        Self { x: None, y, z: None }
    }
}

/// One participant as seen on the wire. Liveness bookkeeping stays
/// server-internal and never crosses the wire.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize, TS)]
#[ts(export, export_to = "../../web/src/net/generated/")]
pub struct ParticipantWire {
    pub id: u32,
    pub position: [f64; 3],
    pub rotation: Rotation,
    pub color: String,
    pub name: String,
}

// === Server -> Client ===

#[derive(Debug, Clone, Serialize, Deserialize, TS)]
#[ts(export, export_to = "../../web/src/net/generated/")]
#[serde(tag = "type")]
pub enum ServerMsg {
    #[serde(rename = "welcome")]
    Welcome(WelcomeMsg),
    #[serde(rename = "capacity_response")]
    CapacityResponse(CapacityResponseMsg),
    #[serde(rename = "server_full")]
    ServerFull,
    #[serde(rename = "existing_players")]
    ExistingPlayers(ExistingPlayersMsg),
    #[serde(rename = "player_joined")]
    PlayerJoined(ParticipantWire),
    #[serde(rename = "player_moved")]
    PlayerMoved(PlayerMovedMsg),
    #[serde(rename = "player_color_changed")]
    PlayerColorChanged(PlayerColorChangedMsg),
    #[serde(rename = "player_left")]
    PlayerLeft(PlayerLeftMsg),
    #[serde(rename = "player_count")]
    PlayerCount(PlayerCountMsg),
}

/// Connect handshake. `self_id` is the id this connection will occupy if it
/// joins; it is fixed at connect time and never reused while the server runs.
#[derive(Debug, Clone, Serialize, Deserialize, TS)]
#[ts(export, export_to = "../../web/src/net/generated/")]
#[serde(rename_all = "camelCase")]
pub struct WelcomeMsg {
    pub protocol_version: u32,
    pub server_version: String,
    pub self_id: u32,
    pub count: PlayerCountMsg,
}

#[derive(Debug, Clone, Serialize, Deserialize, TS)]
#[ts(export, export_to = "../../web/src/net/generated/")]
#[serde(rename_all = "camelCase")]
pub struct CapacityResponseMsg {
    pub can_join: bool,
    pub current: u32,
    pub max: u32,
}

/// Registry snapshot in join order, sent to a joiner exactly once. The
/// joiner's own record is excluded.
#[derive(Debug, Clone, Serialize, Deserialize, TS)]
#[ts(export, export_to = "../../web/src/net/generated/")]
pub struct ExistingPlayersMsg {
    pub players: Vec<ParticipantWire>,
}

#[derive(Debug, Clone, Serialize, Deserialize, TS)]
#[ts(export, export_to = "../../web/src/net/generated/")]
pub struct PlayerMovedMsg {
    pub id: u32,
    pub position: [f64; 3],
    pub rotation: Rotation,
}

#[derive(Debug, Clone, Serialize, Deserialize, TS)]
#[ts(export, export_to = "../../web/src/net/generated/")]
pub struct PlayerColorChangedMsg {
    pub id: u32,
    pub color: String,
}

#[derive(Debug, Clone, Serialize, Deserialize, TS)]
#[ts(export, export_to = "../../web/src/net/generated/")]
pub struct PlayerLeftMsg {
    pub id: u32,
}

#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize, TS)]
#[ts(export, export_to = "../../web/src/net/generated/")]
pub struct PlayerCountMsg {
    pub current: u32,
    pub max: u32,
}

// === Client -> Server ===

#[derive(Debug, Clone, Serialize, Deserialize, TS)]
#[ts(export, export_to = "../../web/src/net/generated/")]
#[serde(tag = "type")]
pub enum ClientMsg {
    #[serde(rename = "check_capacity")]
    CheckCapacity,
    #[serde(rename = "join")]
    Join {
        position: [f64; 3],
        rotation: Rotation,
        color: String,
        #[serde(default)]
        name: String,
    },
    #[serde(rename = "player_move")]
    PlayerMove {
        position: [f64; 3],
        rotation: Rotation,
    },
    #[serde(rename = "player_color_change")]
    PlayerColorChange { color: String },
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn server_msg_welcome_roundtrip() {
        let msg = ServerMsg::Welcome(WelcomeMsg {
            protocol_version: PROTOCOL_VERSION,
            server_version: "0.1.0".to_string(),
            self_id: 7,
            count: PlayerCountMsg { current: 2, max: 5 },
        });
        let json = serde_json::to_string(&msg).unwrap();
        assert!(json.contains("\"type\":\"welcome\""));
        assert!(json.contains("\"protocolVersion\":1"));
        assert!(json.contains("\"selfId\":7"));
        let parsed: ServerMsg = serde_json::from_str(&json).unwrap();
        match parsed {
            ServerMsg::Welcome(w) => {
                assert_eq!(w.protocol_version, PROTOCOL_VERSION);
                assert_eq!(w.self_id, 7);
                assert_eq!(w.count, PlayerCountMsg { current: 2, max: 5 });
            }
            _ => panic!("Expected Welcome"),
        }
    }

    #[test]
    fn capacity_response_uses_camel_case() {
        let msg = ServerMsg::CapacityResponse(CapacityResponseMsg {
            can_join: false,
            current: 5,
            max: 5,
        });
        let json = serde_json::to_string(&msg).unwrap();
        assert!(json.contains("\"type\":\"capacity_response\""));
        assert!(json.contains("\"canJoin\":false"));
        let parsed: ServerMsg = serde_json::from_str(&json).unwrap();
        match parsed {
            ServerMsg::CapacityResponse(c) => {
                assert!(!c.can_join);
                assert_eq!(c.current, 5);
                assert_eq!(c.max, 5);
            }
            _ => panic!("Expected CapacityResponse"),
        }
    }

    #[test]
    fn server_full_has_no_payload() {
        let json = serde_json::to_string(&ServerMsg::ServerFull).unwrap();
        assert_eq!(json, "{\"type\":\"server_full\"}");
        let parsed: ServerMsg = serde_json::from_str(&json).unwrap();
        assert!(matches!(parsed, ServerMsg::ServerFull));
    }

    #[test]
    fn player_moved_roundtrip() {
        let msg = ServerMsg::PlayerMoved(PlayerMovedMsg {
            id: 3,
            position: [1.5, 0.0, -8.25],
            rotation: Rotation::yaw(1.25),
        });
        let json = serde_json::to_string(&msg).unwrap();
        assert!(json.contains("\"type\":\"player_moved\""));
        let parsed: ServerMsg = serde_json::from_str(&json).unwrap();
        match parsed {
            ServerMsg::PlayerMoved(m) => {
                assert_eq!(m.id, 3);
                assert_eq!(m.position, [1.5, 0.0, -8.25]);
                assert!((m.rotation.y - 1.25).abs() < 1e-12);
            }
            _ => panic!("Expected PlayerMoved"),
        }
    }

    #[test]
    fn yaw_only_rotation_omits_extra_axes() {
        let json = serde_json::to_string(&Rotation::yaw(0.5)).unwrap();
        assert_eq!(json, "{\"y\":0.5}");
    }

    #[test]
    fn full_euler_rotation_roundtrips_unchanged() {
        let rot = Rotation {
            x: Some(0.1),
            y: 2.0,
            z: Some(-0.3),
        };
        let json = serde_json::to_string(&rot).unwrap();
        let parsed: Rotation = serde_json::from_str(&json).unwrap();
        assert_eq!(parsed, rot);
    }

    #[test]
    fn client_msg_join_roundtrip() {
        let msg = ClientMsg::Join {
            position: [0.0, 1.0, 0.0],
            rotation: Rotation::yaw(0.0),
            color: "#112233".to_string(),
            name: "ada".to_string(),
        };
        let json = serde_json::to_string(&msg).unwrap();
        assert!(json.contains("\"type\":\"join\""));
        let parsed: ClientMsg = serde_json::from_str(&json).unwrap();
        match parsed {
            ClientMsg::Join { color, name, .. } => {
                assert_eq!(color, "#112233");
                assert_eq!(name, "ada");
            }
            _ => panic!("Expected Join"),
        }
    }

    #[test]
    fn join_without_name_defaults_to_empty() {
        let json = r##"{"type":"join","position":[0,0,0],"rotation":{"y":0},"color":"#fff"}"##;
        let parsed: ClientMsg = serde_json::from_str(json).unwrap();
        match parsed {
            ClientMsg::Join { name, .. } => assert_eq!(name, ""),
            _ => panic!("Expected Join"),
        }
    }

    #[test]
    fn join_without_color_is_rejected() {
        let json = r#"{"type":"join","position":[0,0,0],"rotation":{"y":0},"name":"x"}"#;
        assert!(serde_json::from_str::<ClientMsg>(json).is_err());
    }

    #[test]
    fn player_move_without_position_is_rejected() {
        let json = r#"{"type":"player_move","rotation":{"y":1.0}}"#;
        assert!(serde_json::from_str::<ClientMsg>(json).is_err());
    }

    #[test]
    fn color_change_token_is_opaque() {
        let msg = ClientMsg::PlayerColorChange {
            color: "#112233".to_string(),
        };
        let json = serde_json::to_string(&msg).unwrap();
        assert!(json.contains("\"type\":\"player_color_change\""));
        let parsed: ClientMsg = serde_json::from_str(&json).unwrap();
        match parsed {
            ClientMsg::PlayerColorChange { color } => assert_eq!(color, "#112233"),
            _ => panic!("Expected PlayerColorChange"),
        }
    }

    #[test]
    fn existing_players_preserves_order() {
        let players: Vec<ParticipantWire> = (1..=3)
            .map(|id| ParticipantWire {
                id,
                position: [id as f64, 0.0, 0.0],
                rotation: Rotation::yaw(0.0),
                color: "#abcdef".to_string(),
                name: format!("p{id}"),
            })
            .collect();
        let msg = ServerMsg::ExistingPlayers(ExistingPlayersMsg { players });
        let json = serde_json::to_string(&msg).unwrap();
        let parsed: ServerMsg = serde_json::from_str(&json).unwrap();
        match parsed {
            ServerMsg::ExistingPlayers(e) => {
                let ids: Vec<u32> = e.players.iter().map(|p| p.id).collect();
                assert_eq!(ids, vec![1, 2, 3]);
            }
            _ => panic!("Expected ExistingPlayers"),
        }
    }
}
