//! Player data structures.

use serde::{Deserialize, Serialize};
use uuid::Uuid;

/// Unique identifier for a player (used in queue slots, courts and history).
pub type PlayerId = Uuid;

/// Games a player wants per session when they haven't said otherwise.
pub const DEFAULT_TARGET_GAMES: u32 = 6;

pub const MIN_LEVEL: u8 = 1;
pub const MAX_LEVEL: u8 = 15;

/// Gender is only consulted by the mixed doubles scoring mode.
#[derive(Clone, Copy, Debug, Default, Eq, Hash, PartialEq, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum Gender {
    #[default]
    Male,
    Female,
    Other,
}

/// A player in the session roster.
#[derive(Clone, Debug, Eq, PartialEq, Serialize, Deserialize)]
pub struct Player {
    pub id: PlayerId,
    pub name: String,
    pub gender: Gender,
    /// Strength, 1 (weakest) to 15. Edited by the organiser, never derived from results.
    pub level: u8,
    /// Completed games this session. Only match completion increments it.
    pub games_played: u32,
    /// Desired number of games for the session (at least 1).
    #[serde(default = "default_target_games")]
    pub target_games: u32,
    /// Paused players are skipped by round generation but keep their queue/court slots.
    #[serde(default)]
    pub is_paused: bool,
}

fn default_target_games() -> u32 {
    DEFAULT_TARGET_GAMES
}

impl Player {
    /// Create a new player. Level is clamped into range; counters start at zero.
    pub fn new(name: impl Into<String>, gender: Gender, level: u8) -> Self {
        Self {
            id: Uuid::new_v4(),
            name: name.into(),
            gender,
            level: clamp_level(level),
            games_played: 0,
            target_games: DEFAULT_TARGET_GAMES,
            is_paused: false,
        }
    }

    /// Builder-style target override (mostly for setting up rosters).
    pub fn with_target(mut self, target_games: u32) -> Self {
        self.set_target_games(target_games);
        self
    }

    pub fn set_level(&mut self, level: u8) {
        self.level = clamp_level(level);
    }

    pub fn set_target_games(&mut self, target_games: u32) {
        self.target_games = target_games.max(1);
    }

    /// Record one completed game.
    pub fn record_game(&mut self) {
        self.games_played += 1;
    }

    pub fn toggle_pause(&mut self) {
        self.is_paused = !self.is_paused;
    }
}

fn clamp_level(level: u8) -> u8 {
    level.clamp(MIN_LEVEL, MAX_LEVEL)
}
