//! Client-side mirror of the remote participants in a session.
//!
//! The server is the single source of truth for who is present; this set is
//! an eventually-consistent cache of it, rebuilt from scratch on every join.
//! Updates for ids the set has never heard of are dropped rather than
//! upserted, since the matching `player_joined` is either lost for good (its
//! owner already left) or still in flight and about to arrive.

use brawl_shared::protocol::{ParticipantWire, Rotation, ServerMsg};

/// Last-known state of one remote participant.
#[derive(Debug, Clone, PartialEq)]
pub struct ShadowEntity {
    pub id: u32,
    pub position: [f64; 3],
    pub rotation: Rotation,
    pub color: String,
    pub name: String,
}

impl ShadowEntity {
    fn from_wire(p: ParticipantWire) -> Self {
        Self {
            id: p.id,
            position: p.position,
            rotation: p.rotation,
            color: p.color,
            name: p.name,
        }
    }
}

/// The set of shadow entities one client knows about. Never contains the
/// client's own participant; the server excludes it from everything it sends.
#[derive(Debug, Default)]
pub struct ShadowSet {
    entities: Vec<ShadowEntity>,
}

impl ShadowSet {
    /// Apply one server message to the set. Messages that do not concern
    /// remote participants are ignored, so every received message can be
    /// passed through here unconditionally.
    pub fn apply(&mut self, msg: &ServerMsg) {
        match msg {
            ServerMsg::ExistingPlayers(e) => {
                self.entities = e
                    .players
                    .iter()
                    .cloned()
                    .map(ShadowEntity::from_wire)
                    .collect();
            }
            ServerMsg::PlayerJoined(p) => {
                let entity = ShadowEntity::from_wire(p.clone());
                match self.entities.iter_mut().find(|e| e.id == entity.id) {
                    Some(existing) => *existing = entity,
                    None => self.entities.push(entity),
                }
            }
            ServerMsg::PlayerMoved(m) => {
                if let Some(e) = self.entities.iter_mut().find(|e| e.id == m.id) {
                    e.position = m.position;
                    e.rotation = m.rotation.clone();
                }
            }
            ServerMsg::PlayerColorChanged(c) => {
                if let Some(e) = self.entities.iter_mut().find(|e| e.id == c.id) {
                    e.color = c.color.clone();
                }
            }
            ServerMsg::PlayerLeft(l) => {
                self.entities.retain(|e| e.id != l.id);
            }
            _ => {}
        }
    }

    pub fn get(&self, id: u32) -> Option<&ShadowEntity> {
        self.entities.iter().find(|e| e.id == id)
    }

    pub fn iter(&self) -> impl Iterator<Item = &ShadowEntity> {
        self.entities.iter()
    }

    pub fn len(&self) -> usize {
        self.entities.len()
    }

    pub fn is_empty(&self) -> bool {
        self.entities.is_empty()
    }

    /// Drop everything. Called when the connection is lost; the next join
    /// reseeds the set from a fresh `existing_players` snapshot.
    pub fn clear(&mut self) {
        self.entities.clear();
    }
}
