//! Session state: roster, courts, pending queue and history.

use crate::models::court::{Court, CourtId};
use crate::models::history::MatchHistoryRecord;
use crate::models::player::{Gender, Player, PlayerId};
use crate::models::queue::{MatchQueue, Slot};
use serde::{Deserialize, Serialize};
use std::collections::HashSet;
use thiserror::Error;
use uuid::Uuid;

/// Errors that can occur during session operations.
#[derive(Clone, Debug, Eq, PartialEq, Error)]
pub enum SessionError {
    /// Fewer than 4 unpaused players: no round can be formed.
    #[error("Need at least 4 available players to form a round")]
    InsufficientPlayers,
    #[error("Player not found")]
    PlayerNotFound(PlayerId),
    #[error("Court not found")]
    CourtNotFound(CourtId),
    #[error("Asked for {requested} rounds, at most {max} per request")]
    TooManyRounds { requested: usize, max: usize },
    #[error("No queued match at position {0}")]
    QueueIndexOutOfRange(usize),
    /// The player is on a court or in the queue.
    #[error("Player is playing or queued; remove them from the queue first")]
    PlayerBusy(PlayerId),
    /// The court has a match in progress.
    #[error("Court has a match in progress")]
    CourtBusy(CourtId),
    #[error("Court has no match in progress")]
    CourtIdle(CourtId),
    #[error("A player with this name already exists")]
    DuplicatePlayerName,
    #[error("Name must not be empty")]
    InvalidName,
    /// The slot to replace could not be located.
    #[error("Slot to replace was not found")]
    SlotNotFound,
    /// A cross-entry swap named an entry that doesn't hold the incoming player.
    #[error("Queued match {index} does not contain that player")]
    PlayerNotInEntry { player: PlayerId, index: usize },
    /// The swap would put the same player twice into queued match `index`.
    #[error("Player is already in queued match {index}")]
    WouldDuplicate { player: PlayerId, index: usize },
    /// Dispatch refused because these players are still on court.
    #[error("{} queued player(s) are still on court", .players.len())]
    Blocked { players: Vec<PlayerId> },
    /// No full set of replacements exists for the blocked players.
    #[error("No swap can unblock this match")]
    Unresolvable,
    /// The state changed since the proposal was computed.
    #[error("Swap proposal no longer matches the queue")]
    StaleProposal,
}

pub const DEFAULT_INTERVAL_SECS: u64 = 30;

/// Auto-assign timer settings. Saved with the session so they survive a reload.
#[derive(Clone, Copy, Debug, Eq, PartialEq, Serialize, Deserialize)]
pub struct AutoAssignSettings {
    pub enabled: bool,
    pub interval_secs: u64,
}

impl Default for AutoAssignSettings {
    fn default() -> Self {
        Self {
            enabled: false,
            interval_secs: DEFAULT_INTERVAL_SECS,
        }
    }
}

/// Unique identifier for a session.
pub type SessionId = Uuid;

/// Full session state. This is also the persistence snapshot.
#[derive(Clone, Debug, Eq, PartialEq, Serialize, Deserialize)]
pub struct Session {
    pub id: SessionId,
    pub players: Vec<Player>,
    pub courts: Vec<Court>,
    pub queue: MatchQueue,
    pub history: Vec<MatchHistoryRecord>,
    /// Completed matches this session.
    pub games_counter: u32,
    /// Timer settings chosen for this session; `None` means the server default.
    #[serde(default)]
    pub auto_assign: Option<AutoAssignSettings>,
}

impl Default for Session {
    fn default() -> Self {
        Self::new()
    }
}

impl Session {
    /// New session with two idle courts and nobody on the roster.
    pub fn new() -> Self {
        Self {
            id: Uuid::new_v4(),
            players: Vec::new(),
            courts: default_courts(),
            queue: MatchQueue::new(),
            history: Vec::new(),
            games_counter: 0,
            auto_assign: None,
        }
    }

    pub fn with_players(players: Vec<Player>) -> Self {
        Self {
            players,
            ..Self::new()
        }
    }

    pub fn player(&self, id: PlayerId) -> Option<&Player> {
        self.players.iter().find(|p| p.id == id)
    }

    pub fn player_mut(&mut self, id: PlayerId) -> Option<&mut Player> {
        self.players.iter_mut().find(|p| p.id == id)
    }

    pub fn court(&self, id: CourtId) -> Option<&Court> {
        self.courts.iter().find(|c| c.id == id)
    }

    pub fn court_mut(&mut self, id: CourtId) -> Option<&mut Court> {
        self.courts.iter_mut().find(|c| c.id == id)
    }

    /// Players on any active court.
    pub fn playing_ids(&self) -> HashSet<PlayerId> {
        self.courts
            .iter()
            .filter(|c| c.is_active)
            .flat_map(|c| c.player_ids())
            .collect()
    }

    /// Players in any non-empty queue slot.
    pub fn queued_ids(&self) -> HashSet<PlayerId> {
        self.queue.all_player_ids().collect()
    }

    /// Playing or queued.
    pub fn busy_ids(&self) -> HashSet<PlayerId> {
        let mut busy = self.playing_ids();
        busy.extend(self.queued_ids());
        busy
    }

    /// Display names for a set of slots, skipping empty and unknown ones.
    pub fn names_for(&self, slots: &[Slot]) -> Vec<String> {
        slots
            .iter()
            .flatten()
            .filter_map(|id| self.player(*id))
            .map(|p| p.name.clone())
            .collect()
    }

    /// Add a player. Names are trimmed and must be unique (case-insensitive).
    pub fn add_player(
        &mut self,
        name: impl Into<String>,
        gender: Gender,
        level: u8,
    ) -> Result<PlayerId, SessionError> {
        let name = name.into();
        let name_trimmed = name.trim();
        if name_trimmed.is_empty() {
            return Err(SessionError::InvalidName);
        }
        let is_duplicate = self
            .players
            .iter()
            .any(|p| p.name.eq_ignore_ascii_case(name_trimmed));
        if is_duplicate {
            return Err(SessionError::DuplicatePlayerName);
        }
        let player = Player::new(name_trimmed, gender, level);
        let id = player.id;
        self.players.push(player);
        Ok(id)
    }

    /// Remove a player. Rejected while they are playing or queued.
    pub fn remove_player(&mut self, player_id: PlayerId) -> Result<Player, SessionError> {
        let idx = self
            .players
            .iter()
            .position(|p| p.id == player_id)
            .ok_or(SessionError::PlayerNotFound(player_id))?;
        if self.busy_ids().contains(&player_id) {
            return Err(SessionError::PlayerBusy(player_id));
        }
        Ok(self.players.remove(idx))
    }

    pub fn set_player_level(&mut self, player_id: PlayerId, level: u8) -> Result<(), SessionError> {
        self.player_mut(player_id)
            .ok_or(SessionError::PlayerNotFound(player_id))?
            .set_level(level);
        Ok(())
    }

    pub fn set_player_target(&mut self, player_id: PlayerId, target: u32) -> Result<(), SessionError> {
        self.player_mut(player_id)
            .ok_or(SessionError::PlayerNotFound(player_id))?
            .set_target_games(target);
        Ok(())
    }

    /// Flip the paused flag; returns the new value.
    pub fn toggle_pause(&mut self, player_id: PlayerId) -> Result<bool, SessionError> {
        let p = self
            .player_mut(player_id)
            .ok_or(SessionError::PlayerNotFound(player_id))?;
        p.toggle_pause();
        Ok(p.is_paused)
    }

    /// Add an idle court named after its position ("Court C" for the third).
    pub fn add_court(&mut self) -> CourtId {
        let court = Court::new(court_name(self.courts.len()));
        let id = court.id;
        self.courts.push(court);
        id
    }

    /// Remove an idle court.
    pub fn remove_court(&mut self, court_id: CourtId) -> Result<(), SessionError> {
        let idx = self
            .courts
            .iter()
            .position(|c| c.id == court_id)
            .ok_or(SessionError::CourtNotFound(court_id))?;
        if self.courts[idx].is_active {
            return Err(SessionError::CourtBusy(court_id));
        }
        self.courts.remove(idx);
        Ok(())
    }

    /// Rename a court. A blank name keeps the current one.
    pub fn rename_court(&mut self, court_id: CourtId, name: &str) -> Result<(), SessionError> {
        let court = self
            .court_mut(court_id)
            .ok_or(SessionError::CourtNotFound(court_id))?;
        let name = name.trim();
        if !name.is_empty() {
            court.name = name.to_string();
        }
        Ok(())
    }

    /// End of session, keep the roster: drop history and zero every game count.
    pub fn clear_history(&mut self) {
        self.history.clear();
        self.games_counter = 0;
        for p in &mut self.players {
            p.games_played = 0;
        }
    }

    /// End of session, clear everything. Keeps the session id and timer settings.
    pub fn reset(&mut self) {
        let (id, auto_assign) = (self.id, self.auto_assign);
        *self = Self {
            id,
            auto_assign,
            ..Self::new()
        };
    }
}

fn default_courts() -> Vec<Court> {
    vec![Court::new(court_name(0)), Court::new(court_name(1))]
}

fn court_name(index: usize) -> String {
    match u8::try_from(index).ok().filter(|i| *i < 26) {
        Some(i) => format!("Court {}", (b'A' + i) as char),
        None => format!("Court {}", index + 1),
    }
}
