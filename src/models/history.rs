//! Completed matches. Append-only during a session.

use crate::models::player::PlayerId;
use chrono::{DateTime, Utc};
use serde::{Deserialize, Serialize};

#[derive(Clone, Debug, Eq, PartialEq, Serialize, Deserialize)]
pub struct MatchHistoryRecord {
    pub timestamp: DateTime<Utc>,
    /// The four participants in original slot order.
    pub players: [PlayerId; 4],
    pub teams: [[PlayerId; 2]; 2],
    #[serde(default)]
    pub duration_seconds: Option<i64>,
    /// Team A score, team B score.
    #[serde(default)]
    pub score: Option<(u32, u32)>,
}

impl MatchHistoryRecord {
    pub fn new(players: [PlayerId; 4], timestamp: DateTime<Utc>) -> Self {
        Self {
            timestamp,
            players,
            teams: [[players[0], players[1]], [players[2], players[3]]],
            duration_seconds: None,
            score: None,
        }
    }

    /// True if `a` and `b` were on the same team.
    pub fn were_partners(&self, a: PlayerId, b: PlayerId) -> bool {
        self.teams.iter().any(|t| t.contains(&a) && t.contains(&b))
    }

    /// True if `a` and `b` were on opposite teams.
    pub fn were_opponents(&self, a: PlayerId, b: PlayerId) -> bool {
        let [t1, t2] = &self.teams;
        (t1.contains(&a) && t2.contains(&b)) || (t2.contains(&a) && t1.contains(&b))
    }
}
