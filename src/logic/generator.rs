//! Round generation: pick the four players who most need a game, then choose the
//! team split with the lowest penalty.
//!
//! 1. Project each player's games: played + 1 if on court + 1 per queued slot.
//! 2. Players below their target come first (largest deficit first); players at or
//!    over target follow (smallest surplus first, higher target preferred).
//! 3. Random tie-break keys keep equal players from always landing in the same order.
//! 4. Of the three possible 2 vs 2 splits, keep the one with the lowest penalty
//!    (level imbalance, mixed-doubles mismatch, recent partner/opponent repeats,
//!    repeats within the rounds already queued).

use crate::models::{
    Gender, MatchHistoryRecord, Player, PlayerId, QueueEntry, Session, SessionError,
};
use rand::Rng;
use serde::{Deserialize, Serialize};
use std::cmp::Ordering;
use std::collections::{HashMap, HashSet};

/// How many recent history records the repeat checks look at.
pub const HISTORY_WINDOW: usize = 25;
/// Multiplier on the team level-sum difference.
pub const LEVEL_WEIGHT: i64 = 2;
/// Added per team that is not one man and one woman (mixed mode only).
pub const MIXED_TEAM_PENALTY: i64 = 500;

/// Upper bound on rounds generated by one scheduling request.
pub const MAX_ROUNDS_PER_REQUEST: usize = 100;

/// The three ways to split four players into two pairs, in tie-break order:
/// {01|23}, {02|13}, {03|12}.
pub const SPLITS: [[usize; 4]; 3] = [[0, 1, 2, 3], [0, 2, 1, 3], [0, 3, 1, 2]];

/// Scoring strategy for the team split.
#[derive(Clone, Copy, Debug, Default, Eq, Hash, PartialEq, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum SortMode {
    /// Level balance first, light repeat avoidance.
    #[default]
    Normal,
    /// Strongly prefer one man and one woman per team.
    Mixed,
    /// Heavy penalties on partner/opponent repeats.
    AvoidRepeat,
}

/// Per-occurrence repeat penalties.
#[derive(Clone, Copy, Debug, Eq, PartialEq)]
pub struct PenaltyWeights {
    pub partner: i64,
    pub opponent: i64,
    pub in_queue: i64,
}

impl SortMode {
    pub fn weights(self) -> PenaltyWeights {
        match self {
            SortMode::Normal | SortMode::Mixed => PenaltyWeights {
                partner: 15,
                opponent: 5,
                in_queue: 20,
            },
            SortMode::AvoidRepeat => PenaltyWeights {
                partner: 120,
                opponent: 40,
                in_queue: 200,
            },
        }
    }
}

/// Projected games per player: played, +1 if on court, +1 per slot in `queue_so_far`.
pub fn projected_games(
    players: &[Player],
    playing: &HashSet<PlayerId>,
    queue_so_far: &[QueueEntry],
) -> HashMap<PlayerId, u32> {
    let mut projected: HashMap<PlayerId, u32> = players
        .iter()
        .map(|p| (p.id, p.games_played + u32::from(playing.contains(&p.id))))
        .collect();
    for id in queue_so_far.iter().flat_map(|e| e.player_ids()) {
        if let Some(g) = projected.get_mut(&id) {
            *g += 1;
        }
    }
    projected
}

/// Order eligible players by how much they need a game. Paused players are dropped.
pub fn rank_candidates<'a, R: Rng + ?Sized>(
    players: &'a [Player],
    projected: &HashMap<PlayerId, u32>,
    rng: &mut R,
) -> Vec<&'a Player> {
    let mut with_tiebreak: Vec<(&Player, u32, u32)> = players
        .iter()
        .filter(|p| !p.is_paused)
        .map(|p| (p, projected.get(&p.id).copied().unwrap_or(p.games_played), rng.gen::<u32>()))
        .collect();
    with_tiebreak.sort_by(|(a, ga, ta), (b, gb, tb)| {
        compare_need(a, *ga, b, *gb).then(ta.cmp(tb))
    });
    with_tiebreak.into_iter().map(|(p, _, _)| p).collect()
}

fn compare_need(a: &Player, ga: u32, b: &Player, gb: u32) -> Ordering {
    let (target_a, target_b) = (a.target_games.max(1), b.target_games.max(1));
    let a_met = ga >= target_a;
    let b_met = gb >= target_b;
    a_met.cmp(&b_met).then_with(|| {
        if a_met {
            (ga - target_a)
                .cmp(&(gb - target_b))
                .then(target_b.cmp(&target_a))
        } else {
            (target_b - gb).cmp(&(target_a - ga)).then(ga.cmp(&gb))
        }
    })
}

/// Penalty of one split of `selected`; lower is better.
pub fn split_penalty(
    selected: &[&Player; 4],
    split: [usize; 4],
    recent_history: &[MatchHistoryRecord],
    queue_so_far: &[QueueEntry],
    mode: SortMode,
) -> i64 {
    let weights = mode.weights();
    let team_a = [selected[split[0]], selected[split[1]]];
    let team_b = [selected[split[2]], selected[split[3]]];

    let level_sum = |t: &[&Player; 2]| i64::from(t[0].level) + i64::from(t[1].level);
    let mut penalty = (level_sum(&team_a) - level_sum(&team_b)).abs() * LEVEL_WEIGHT;

    if mode == SortMode::Mixed {
        penalty += [&team_a, &team_b]
            .iter()
            .filter(|t| !is_mixed(t))
            .count() as i64
            * MIXED_TEAM_PENALTY;
    }

    let a = [team_a[0].id, team_a[1].id];
    let b = [team_b[0].id, team_b[1].id];

    for record in recent_history {
        for team in [a, b] {
            if record.were_partners(team[0], team[1]) {
                penalty += weights.partner;
            }
        }
        if faced_each_other(&a, &b, |x, y| record.were_opponents(x, y)) {
            penalty += weights.opponent;
        }
    }

    for entry in queue_so_far {
        let queued = entry.teams();
        for team in [a, b] {
            if queued.iter().any(|q| same_pair(q, &team)) {
                penalty += weights.in_queue;
            }
        }
        let opposed = |x: PlayerId, y: PlayerId| {
            let [q1, q2] = &queued;
            (q1.contains(&Some(x)) && q2.contains(&Some(y)))
                || (q2.contains(&Some(x)) && q1.contains(&Some(y)))
        };
        if faced_each_other(&a, &b, opposed) {
            penalty += weights.in_queue;
        }
    }

    penalty
}

fn is_mixed(team: &[&Player; 2]) -> bool {
    matches!(
        (team[0].gender, team[1].gender),
        (Gender::Male, Gender::Female) | (Gender::Female, Gender::Male)
    )
}

fn same_pair(queued: &[Option<PlayerId>; 2], team: &[PlayerId; 2]) -> bool {
    queued.contains(&Some(team[0])) && queued.contains(&Some(team[1]))
}

/// Some member of `a` and some member of `b` were on opposite sides.
fn faced_each_other(
    a: &[PlayerId; 2],
    b: &[PlayerId; 2],
    opposed: impl Fn(PlayerId, PlayerId) -> bool,
) -> bool {
    a.iter().any(|x| b.iter().any(|y| opposed(*x, *y)))
}

/// Lowest-penalty split of four selected players, as a queue entry `[A0, A1, B0, B1]`.
/// Ties keep the earlier split in `SPLITS` order.
pub fn best_split(
    selected: &[&Player; 4],
    history: &[MatchHistoryRecord],
    queue_so_far: &[QueueEntry],
    mode: SortMode,
) -> QueueEntry {
    let recent = &history[history.len().saturating_sub(HISTORY_WINDOW)..];
    let mut best = SPLITS[0];
    let mut min_penalty = i64::MAX;
    for split in SPLITS {
        let penalty = split_penalty(selected, split, recent, queue_so_far, mode);
        if penalty < min_penalty {
            min_penalty = penalty;
            best = split;
        }
    }
    QueueEntry::new(best.map(|i| selected[i].id))
}

/// Generate one round, or None when fewer than 4 unpaused players exist.
///
/// Players on court stay eligible; their projected count is one higher so they sort later.
pub fn generate_round<R: Rng + ?Sized>(
    players: &[Player],
    history: &[MatchHistoryRecord],
    queue_so_far: &[QueueEntry],
    playing: &HashSet<PlayerId>,
    mode: SortMode,
    rng: &mut R,
) -> Option<QueueEntry> {
    let projected = projected_games(players, playing, queue_so_far);
    let ranked = rank_candidates(players, &projected, rng);
    let selected: [&Player; 4] = match ranked.as_slice() {
        [a, b, c, d, ..] => [*a, *b, *c, *d],
        _ => return None,
    };
    Some(best_split(&selected, history, queue_so_far, mode))
}

/// Generate up to `count` rounds (at most [`MAX_ROUNDS_PER_REQUEST`]), feeding each one
/// into the next call's queue.
pub fn generate_batch<R: Rng + ?Sized>(
    players: &[Player],
    history: &[MatchHistoryRecord],
    existing_queue: &[QueueEntry],
    playing: &HashSet<PlayerId>,
    count: usize,
    mode: SortMode,
    rng: &mut R,
) -> Vec<QueueEntry> {
    let mut queue_so_far = existing_queue.to_vec();
    let mut rounds = Vec::new();
    for _ in 0..count.min(MAX_ROUNDS_PER_REQUEST) {
        match generate_round(players, history, &queue_so_far, playing, mode, rng) {
            Some(round) => {
                queue_so_far.push(round);
                rounds.push(round);
            }
            None => break,
        }
    }
    rounds
}

/// Generate `count` rounds for the session and append them to its queue.
/// Returns how many were added.
pub fn schedule_rounds<R: Rng + ?Sized>(
    session: &mut Session,
    count: usize,
    mode: SortMode,
    rng: &mut R,
) -> Result<usize, SessionError> {
    if count > MAX_ROUNDS_PER_REQUEST {
        return Err(SessionError::TooManyRounds {
            requested: count,
            max: MAX_ROUNDS_PER_REQUEST,
        });
    }
    let eligible = session.players.iter().filter(|p| !p.is_paused).count();
    if eligible < 4 {
        return Err(SessionError::InsufficientPlayers);
    }
    let playing = session.playing_ids();
    let rounds = generate_batch(
        &session.players,
        &session.history,
        session.queue.entries(),
        &playing,
        count,
        mode,
        rng,
    );
    let added = rounds.len();
    for round in rounds {
        session.queue.append(round);
    }
    log::info!("Scheduled {} round(s) ({:?} mode), queue length {}", added, mode, session.queue.len());
    Ok(added)
}
