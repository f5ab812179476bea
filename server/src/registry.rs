use std::collections::HashMap;
use std::time::{Duration, Instant};

use brawl_shared::protocol::{ParticipantWire, PlayerCountMsg, Rotation};

use crate::participant::Participant;

/// Why a join was refused.
#[derive(Debug, PartialEq, Eq)]
pub enum JoinError {
    /// Session is at capacity.
    Full { current: u32, max: u32 },
    /// This connection already holds a participant slot.
    AlreadyJoined,
}

/// Roster of joined participants, owned by the session loop task.
///
/// Ids are handed out at connect time from a monotonic counter and are never
/// reused for the lifetime of the process, so a stale broadcast can never be
/// misattributed to a later participant.
pub struct SessionRegistry {
    participants: HashMap<u32, Participant>,
    /// Insertion order, so snapshots list players oldest first.
    join_order: Vec<u32>,
    next_id: u32,
    max_players: u32,
}

impl SessionRegistry {
    pub fn new(max_players: u32) -> Self {
        Self {
            participants: HashMap::new(),
            join_order: Vec::new(),
            next_id: 1,
            max_players,
        }
    }

    /// Reserve the id a new connection will use if it joins.
    pub fn allocate_id(&mut self) -> u32 {
        let id = self.next_id;
        self.next_id += 1;
        id
    }

    pub fn can_join(&self) -> bool {
        (self.participants.len() as u32) < self.max_players
    }

    pub fn contains(&self, id: u32) -> bool {
        self.participants.contains_key(&id)
    }

    pub fn get_player_count(&self) -> PlayerCountMsg {
        PlayerCountMsg {
            current: self.participants.len() as u32,
            max: self.max_players,
        }
    }

    /// Admit a participant. The capacity check and the insert happen inside
    /// one call on the owning task, so two concurrent joiners can never both
    /// squeeze into the last slot.
    pub fn join(
        &mut self,
        id: u32,
        position: [f64; 3],
        rotation: Rotation,
        color: String,
        name: String,
        now: Instant,
    ) -> Result<ParticipantWire, JoinError> {
        if self.participants.contains_key(&id) {
            return Err(JoinError::AlreadyJoined);
        }
        let current = self.participants.len() as u32;
        if current >= self.max_players {
            return Err(JoinError::Full {
                current,
                max: self.max_players,
            });
        }

        let participant = Participant::new(id, position, rotation, color, name, now);
        let wire = participant.wire();
        self.participants.insert(id, participant);
        self.join_order.push(id);
        Ok(wire)
    }

    /// Remove a participant. Safe to call again for an id that is already
    /// gone (disconnect racing the reaper), which returns None.
    pub fn remove(&mut self, id: u32) -> Option<Participant> {
        let removed = self.participants.remove(&id);
        if removed.is_some() {
            self.join_order.retain(|other| *other != id);
        }
        removed
    }

    /// Overwrite a participant's pose, last write wins. Returns false if the
    /// id is not in the roster.
    pub fn apply_move(
        &mut self,
        id: u32,
        position: [f64; 3],
        rotation: Rotation,
        now: Instant,
    ) -> bool {
        if let Some(p) = self.participants.get_mut(&id) {
            p.position = position;
            p.rotation = rotation;
            p.last_update = now;
            return true;
        }
        false
    }

    /// Swap a participant's color token. Returns false if the id is not in
    /// the roster.
    pub fn apply_color(&mut self, id: u32, color: String, now: Instant) -> bool {
        if let Some(p) = self.participants.get_mut(&id) {
            p.color = color;
            p.last_update = now;
            return true;
        }
        false
    }

    /// Roster snapshot in join order, minus the requesting participant.
    pub fn snapshot_excluding(&self, id: u32) -> Vec<ParticipantWire> {
        self.join_order
            .iter()
            .filter(|other| **other != id)
            .filter_map(|other| self.participants.get(other))
            .map(Participant::wire)
            .collect()
    }

    /// Ids whose idle time strictly exceeds `window`, in join order.
    pub fn stale_ids(&self, now: Instant, window: Duration) -> Vec<u32> {
        self.join_order
            .iter()
            .filter(|id| {
                self.participants
                    .get(id)
                    .is_some_and(|p| now.duration_since(p.last_update) > window)
            })
            .copied()
            .collect()
    }
}
