//! Read-only views over a session: how many rounds to schedule, how a queued match
//! looks, who played with whom, and a CSV export of the history.

use crate::models::{PlayerId, Session, SessionError};
use serde::Serialize;
use std::collections::HashMap;

/// History records considered by [`analyze_entry`].
pub const ANALYSIS_WINDOW: usize = 15;

/// Rounds still needed for every unpaused player to reach their target, at least 1.
///
/// ceil(sum of targets / 4) minus matches played, in play and queued.
pub fn suggested_round_count(session: &Session) -> usize {
    let total_target: u64 = session
        .players
        .iter()
        .filter(|p| !p.is_paused)
        .map(|p| u64::from(p.target_games.max(1)))
        .sum();
    let target_matches = usize::try_from(total_target.div_ceil(4)).unwrap_or(usize::MAX);
    let active = session.courts.iter().filter(|c| c.is_active).count();
    target_matches
        .saturating_sub(session.history.len())
        .saturating_sub(active)
        .saturating_sub(session.queue.len())
        .max(1)
}

/// Balance and freshness of one queued match.
#[derive(Clone, Debug, Eq, PartialEq, Serialize)]
pub struct EntryAnalysis {
    pub team_a_level: u32,
    pub team_b_level: u32,
    pub level_diff: u32,
    /// A team partnered together in recent history.
    pub partner_repeat: bool,
    /// Both slot-aligned opponent pairs (0 vs 2 and 1 vs 3) faced each other in the same recent record.
    pub opponent_repeat: bool,
}

pub fn analyze_entry(session: &Session, index: usize) -> Result<EntryAnalysis, SessionError> {
    let entry = session
        .queue
        .get(index)
        .ok_or(SessionError::QueueIndexOutOfRange(index))?;
    let level = |slot: Option<PlayerId>| {
        slot.and_then(|id| session.player(id))
            .map_or(0, |p| u32::from(p.level))
    };
    let s = entry.slots;
    let team_a_level = level(s[0]) + level(s[1]);
    let team_b_level = level(s[2]) + level(s[3]);

    let recent = &session.history[session.history.len().saturating_sub(ANALYSIS_WINDOW)..];
    let pair = |a: Option<PlayerId>, b: Option<PlayerId>| a.zip(b);
    let partner_repeat = recent.iter().any(|h| {
        [pair(s[0], s[1]), pair(s[2], s[3])]
            .into_iter()
            .flatten()
            .any(|(a, b)| h.were_partners(a, b))
    });
    let opponent_repeat = recent.iter().any(|h| {
        let faced = |x: Option<(PlayerId, PlayerId)>| x.is_some_and(|(a, b)| h.were_opponents(a, b));
        faced(pair(s[0], s[2])) && faced(pair(s[1], s[3]))
    });

    Ok(EntryAnalysis {
        team_a_level,
        team_b_level,
        level_diff: team_a_level.abs_diff(team_b_level),
        partner_repeat,
        opponent_repeat,
    })
}

/// How often a player partnered or faced each other player, most frequent first.
#[derive(Clone, Debug, Default, Eq, PartialEq, Serialize)]
pub struct PlayerStats {
    pub games_played: u32,
    pub partners: Vec<(PlayerId, u32)>,
    pub opponents: Vec<(PlayerId, u32)>,
}

pub fn player_stats(session: &Session, player_id: PlayerId) -> Result<PlayerStats, SessionError> {
    let player = session
        .player(player_id)
        .ok_or(SessionError::PlayerNotFound(player_id))?;
    let mut partners: HashMap<PlayerId, u32> = HashMap::new();
    let mut opponents: HashMap<PlayerId, u32> = HashMap::new();

    for record in session.history.iter().filter(|h| h.players.contains(&player_id)) {
        for team in &record.teams {
            let target = if team.contains(&player_id) {
                &mut partners
            } else {
                &mut opponents
            };
            for id in team.iter().filter(|id| **id != player_id) {
                *target.entry(*id).or_default() += 1;
            }
        }
    }

    Ok(PlayerStats {
        games_played: player.games_played,
        partners: sorted_counts(partners),
        opponents: sorted_counts(opponents),
    })
}

fn sorted_counts(counts: HashMap<PlayerId, u32>) -> Vec<(PlayerId, u32)> {
    let mut v: Vec<_> = counts.into_iter().collect();
    v.sort_by(|a, b| b.1.cmp(&a.1).then(a.0.cmp(&b.0)));
    v
}

#[derive(Serialize)]
struct HistoryRow {
    timestamp: String,
    team_a: String,
    team_b: String,
    score_a: Option<u32>,
    score_b: Option<u32>,
    duration_seconds: Option<i64>,
}

/// History as CSV: one row per match with player names joined by " & ".
pub fn export_history_csv(session: &Session) -> Result<String, csv::Error> {
    let name = |id: &PlayerId| {
        session
            .player(*id)
            .map_or_else(|| "?".to_string(), |p| p.name.clone())
    };
    let mut writer = csv::Writer::from_writer(Vec::new());
    for record in &session.history {
        let [team_a, team_b] = &record.teams;
        writer.serialize(HistoryRow {
            timestamp: record.timestamp.to_rfc3339(),
            team_a: team_a.iter().map(name).collect::<Vec<_>>().join(" & "),
            team_b: team_b.iter().map(name).collect::<Vec<_>>().join(" & "),
            score_a: record.score.map(|s| s.0),
            score_b: record.score.map(|s| s.1),
            duration_seconds: record.duration_seconds,
        })?;
    }
    let bytes = writer
        .into_inner()
        .map_err(|e| csv::Error::from(e.into_error()))?;
    Ok(String::from_utf8_lossy(&bytes).into_owned())
}
