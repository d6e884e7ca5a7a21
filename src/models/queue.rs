//! Pending rounds: QueueEntry (4 slots, 2 vs 2) and the ordered MatchQueue.

use crate::models::player::PlayerId;
use serde::{Deserialize, Serialize};

/// A queue or court slot: a player id, or empty pending manual fill.
pub type Slot = Option<PlayerId>;

/// One pending 2 vs 2 round. Slots 0 and 1 are team A, slots 2 and 3 are team B.
#[derive(Clone, Copy, Debug, Default, Eq, Hash, PartialEq, Serialize, Deserialize)]
#[serde(transparent)]
pub struct QueueEntry {
    pub slots: [Slot; 4],
}

impl QueueEntry {
    pub fn new(ids: [PlayerId; 4]) -> Self {
        Self {
            slots: ids.map(Some),
        }
    }

    /// Four empty slots, filled by hand later.
    pub fn blank() -> Self {
        Self::default()
    }

    /// Team A and team B as slot pairs.
    pub fn teams(&self) -> [[Slot; 2]; 2] {
        [
            [self.slots[0], self.slots[1]],
            [self.slots[2], self.slots[3]],
        ]
    }

    /// Fully filled teams; None while any slot is empty.
    pub fn full_teams(&self) -> Option<[[PlayerId; 2]; 2]> {
        match self.slots {
            [Some(a0), Some(a1), Some(b0), Some(b1)] => Some([[a0, a1], [b0, b1]]),
            _ => None,
        }
    }

    pub fn player_ids(&self) -> impl Iterator<Item = PlayerId> + '_ {
        self.slots.iter().flatten().copied()
    }

    pub fn contains(&self, id: PlayerId) -> bool {
        self.slots.contains(&Some(id))
    }

    pub fn position(&self, id: PlayerId) -> Option<usize> {
        self.slots.iter().position(|s| *s == Some(id))
    }

    pub fn is_complete(&self) -> bool {
        self.slots.iter().all(Option::is_some)
    }

    /// No player id appears twice within the entry.
    pub fn has_unique_players(&self) -> bool {
        let ids: Vec<PlayerId> = self.player_ids().collect();
        ids.iter()
            .enumerate()
            .all(|(i, id)| !ids[i + 1..].contains(id))
    }
}

/// Direction for moving a queue entry one step.
#[derive(Clone, Copy, Debug, Eq, PartialEq, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum Direction {
    Up,
    Down,
}

/// Ordered sequence of pending rounds; index 0 is the next to play.
#[derive(Clone, Debug, Default, Eq, PartialEq, Serialize, Deserialize)]
#[serde(transparent)]
pub struct MatchQueue {
    entries: Vec<QueueEntry>,
}

impl MatchQueue {
    pub fn new() -> Self {
        Self::default()
    }

    pub fn from_entries(entries: Vec<QueueEntry>) -> Self {
        Self { entries }
    }

    pub fn entries(&self) -> &[QueueEntry] {
        &self.entries
    }

    pub fn len(&self) -> usize {
        self.entries.len()
    }

    pub fn is_empty(&self) -> bool {
        self.entries.is_empty()
    }

    pub fn get(&self, index: usize) -> Option<&QueueEntry> {
        self.entries.get(index)
    }

    pub fn get_mut(&mut self, index: usize) -> Option<&mut QueueEntry> {
        self.entries.get_mut(index)
    }

    pub fn iter(&self) -> std::slice::Iter<'_, QueueEntry> {
        self.entries.iter()
    }

    pub fn append(&mut self, entry: QueueEntry) {
        self.entries.push(entry);
    }

    pub fn append_blank(&mut self) {
        self.entries.push(QueueEntry::blank());
    }

    /// Re-queue at the head (used when a match is cancelled).
    pub fn push_front(&mut self, entry: QueueEntry) {
        self.entries.insert(0, entry);
    }

    /// Drop one entry; out of range is a no-op.
    pub fn remove_at(&mut self, index: usize) -> Option<QueueEntry> {
        (index < self.entries.len()).then(|| self.entries.remove(index))
    }

    /// Same as `remove_at`; reads better at dispatch call sites.
    pub fn pop_at(&mut self, index: usize) -> Option<QueueEntry> {
        self.remove_at(index)
    }

    /// Swap with the neighbour in `direction`. Returns false at the boundaries.
    pub fn reorder(&mut self, index: usize, direction: Direction) -> bool {
        let target = match direction {
            Direction::Up => index.checked_sub(1),
            Direction::Down => index.checked_add(1),
        };
        match target {
            Some(t) if index < self.entries.len() && t < self.entries.len() => {
                self.entries.swap(index, t);
                true
            }
            _ => false,
        }
    }

    /// Indices of entries holding `id`, skipping `except`.
    pub fn indices_containing(&self, id: PlayerId, except: Option<usize>) -> Vec<usize> {
        self.entries
            .iter()
            .enumerate()
            .filter(|(i, e)| Some(*i) != except && e.contains(id))
            .map(|(i, _)| i)
            .collect()
    }

    /// Every non-empty slot value across the queue (with repeats).
    pub fn all_player_ids(&self) -> impl Iterator<Item = PlayerId> + '_ {
        self.entries.iter().flat_map(|e| e.player_ids())
    }
}
