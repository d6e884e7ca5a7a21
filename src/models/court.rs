//! Courts: idle, or active with four slots and a start time.

use crate::models::player::PlayerId;
use crate::models::queue::{QueueEntry, Slot};
use chrono::{DateTime, Utc};
use serde::{Deserialize, Serialize};
use uuid::Uuid;

/// Unique identifier for a court.
pub type CourtId = Uuid;

#[derive(Clone, Debug, Eq, PartialEq, Serialize, Deserialize)]
pub struct Court {
    pub id: CourtId,
    pub name: String,
    /// Empty when idle, exactly four slots when active.
    pub players: Vec<Slot>,
    pub is_active: bool,
    pub start_time: Option<DateTime<Utc>>,
}

impl Court {
    pub fn new(name: impl Into<String>) -> Self {
        Self {
            id: Uuid::new_v4(),
            name: name.into(),
            players: Vec::new(),
            is_active: false,
            start_time: None,
        }
    }

    /// Put a queue entry on this court.
    pub fn activate(&mut self, entry: &QueueEntry, now: DateTime<Utc>) {
        self.players = entry.slots.to_vec();
        self.is_active = true;
        self.start_time = Some(now);
    }

    /// Back to idle; returns the slots that were on court.
    pub fn clear(&mut self) -> Vec<Slot> {
        self.is_active = false;
        self.start_time = None;
        std::mem::take(&mut self.players)
    }

    /// Non-empty player ids currently on the court.
    pub fn player_ids(&self) -> impl Iterator<Item = PlayerId> + '_ {
        self.players.iter().flatten().copied()
    }

    pub fn contains(&self, id: PlayerId) -> bool {
        self.players.contains(&Some(id))
    }

    /// True when all four slots hold a player.
    pub fn is_full(&self) -> bool {
        self.players.len() == 4 && self.players.iter().all(Option::is_some)
    }

    /// The active players as a queue entry (missing slots stay empty).
    pub fn as_entry(&self) -> QueueEntry {
        let mut slots = [None; 4];
        for (slot, value) in slots.iter_mut().zip(self.players.iter()) {
            *slot = *value;
        }
        QueueEntry { slots }
    }
}
