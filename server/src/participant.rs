use std::time::Instant;

use brawl_shared::protocol::{ParticipantWire, Rotation};

/// One joined player as the session sees it.
#[derive(Debug, Clone)]
pub struct Participant {
    pub id: u32,
    pub position: [f64; 3],
    pub rotation: Rotation,
    /// Opaque color token chosen by the client, forwarded verbatim.
    pub color: String,
    pub name: String,
    /// Liveness timestamp the reaper sweeps against. Moves on join, on every
    /// accepted move and on color changes. Throttled moves do not touch it.
    pub last_update: Instant,
}

impl Participant {
    pub fn new(
        id: u32,
        position: [f64; 3],
        rotation: Rotation,
        color: String,
        name: String,
        now: Instant,
    ) -> Self {
        Self {
            id,
            position,
            rotation,
            color,
            name,
            last_update: now,
        }
    }

    /// Snapshot for the wire. Liveness bookkeeping stays behind.
    pub fn wire(&self) -> ParticipantWire {
        ParticipantWire {
            id: self.id,
            position: self.position,
            rotation: self.rotation.clone(),
            color: self.color.clone(),
            name: self.name.clone(),
        }
    }
}
