//! Unblocking the head of the queue when some of its players are still on court.
//!
//! For each blocked player we look through the other queued matches for a free player
//! of similar level (level gap dominates, fewer games played breaks ties) and propose
//! trading the two. Either every blocked player gets a replacement or nothing is
//! proposed. Applying a proposal re-checks it against the current state first, then
//! performs all trades and dispatches the head match in one step.

use crate::logic::dispatch::{assign_to_court, Announcement};
use crate::models::{CourtId, Player, PlayerId, Session, SessionError};
use chrono::{DateTime, Utc};
use serde::{Deserialize, Serialize};
use std::collections::HashSet;

/// One trade: `blocked` leaves the head match, `replacement` takes their slot.
#[derive(Clone, Copy, Debug, Eq, PartialEq, Serialize, Deserialize)]
pub struct ReplacementSwap {
    pub blocked: PlayerId,
    pub blocked_slot: usize,
    pub replacement: PlayerId,
    pub from_entry: usize,
    pub from_slot: usize,
}

#[derive(Clone, Debug, Eq, PartialEq, Serialize, Deserialize)]
pub struct ConflictProposal {
    pub head_index: usize,
    pub swaps: Vec<ReplacementSwap>,
}

#[derive(Clone, Debug, Eq, PartialEq, Serialize, Deserialize)]
#[serde(rename_all = "snake_case", tag = "kind")]
pub enum Resolution {
    /// Nobody in the match is on court; dispatch directly.
    Clear,
    Swap(ConflictProposal),
}

/// A later queued match that can go on court as is.
#[derive(Clone, Copy, Debug, Eq, PartialEq, Serialize, Deserialize)]
pub struct SkipAhead {
    pub entry_index: usize,
    /// Matches passed over.
    pub skipped: usize,
}

/// Lower is a better stand-in for `blocked`.
pub fn replacement_score(candidate: &Player, blocked: &Player) -> u64 {
    u64::from(candidate.level.abs_diff(blocked.level)) * 1000 + u64::from(candidate.games_played)
}

/// Find replacements for every player of queued match `head_index` who is on court.
pub fn propose_resolution(session: &Session, head_index: usize) -> Result<Resolution, SessionError> {
    let head = session
        .queue
        .get(head_index)
        .ok_or(SessionError::QueueIndexOutOfRange(head_index))?;
    let playing = session.playing_ids();
    let blocked: Vec<(usize, PlayerId)> = head
        .slots
        .iter()
        .enumerate()
        .filter_map(|(i, s)| s.filter(|id| playing.contains(id)).map(|id| (i, id)))
        .collect();
    if blocked.is_empty() {
        return Ok(Resolution::Clear);
    }

    let mut chosen: HashSet<PlayerId> = HashSet::new();
    let mut swaps = Vec::with_capacity(blocked.len());

    for (blocked_slot, blocked_id) in blocked {
        let blocked_player = session
            .player(blocked_id)
            .ok_or(SessionError::PlayerNotFound(blocked_id))?;
        let mut best: Option<(u64, ReplacementSwap)> = None;

        for (entry_index, entry) in session.queue.iter().enumerate() {
            if entry_index == head_index || entry.contains(blocked_id) {
                continue;
            }
            for (slot_index, slot) in entry.slots.iter().enumerate() {
                let Some(candidate_id) = *slot else { continue };
                if playing.contains(&candidate_id)
                    || chosen.contains(&candidate_id)
                    || head.contains(candidate_id)
                {
                    continue;
                }
                let Some(candidate) = session.player(candidate_id) else { continue };
                let score = replacement_score(candidate, blocked_player);
                if best.map_or(true, |(s, _)| score < s) {
                    best = Some((
                        score,
                        ReplacementSwap {
                            blocked: blocked_id,
                            blocked_slot,
                            replacement: candidate_id,
                            from_entry: entry_index,
                            from_slot: slot_index,
                        },
                    ));
                }
            }
        }

        let (_, swap) = best.ok_or(SessionError::Unresolvable)?;
        chosen.insert(swap.replacement);
        swaps.push(swap);
    }

    Ok(Resolution::Swap(ConflictProposal { head_index, swaps }))
}

/// Apply every trade of `proposal` and dispatch the unblocked match to `court_id`.
///
/// The proposal is checked against the current state first; if anything moved, nothing
/// changes and `StaleProposal` is returned.
pub fn apply_resolution(
    session: &mut Session,
    court_id: CourtId,
    proposal: &ConflictProposal,
    now: DateTime<Utc>,
) -> Result<Announcement, SessionError> {
    let court = session
        .court(court_id)
        .ok_or(SessionError::CourtNotFound(court_id))?;
    if court.is_active {
        return Err(SessionError::CourtBusy(court_id));
    }
    validate(session, proposal)?;

    for swap in &proposal.swaps {
        if let Some(head) = session.queue.get_mut(proposal.head_index) {
            head.slots[swap.blocked_slot] = Some(swap.replacement);
        }
        if let Some(source) = session.queue.get_mut(swap.from_entry) {
            source.slots[swap.from_slot] = Some(swap.blocked);
        }
    }
    log::info!(
        "Resolved conflict with {} swap(s) for queued match {}",
        proposal.swaps.len(),
        proposal.head_index
    );
    assign_to_court(session, court_id, proposal.head_index, now)
}

fn validate(session: &Session, proposal: &ConflictProposal) -> Result<(), SessionError> {
    let head = session
        .queue
        .get(proposal.head_index)
        .ok_or(SessionError::StaleProposal)?;
    let playing = session.playing_ids();
    let mut replacements = HashSet::new();
    let mut blocked_slots = HashSet::new();

    for swap in &proposal.swaps {
        let source = session
            .queue
            .get(swap.from_entry)
            .ok_or(SessionError::StaleProposal)?;
        let consistent = swap.from_entry != proposal.head_index
            && head.slots.get(swap.blocked_slot) == Some(&Some(swap.blocked))
            && source.slots.get(swap.from_slot) == Some(&Some(swap.replacement))
            && !playing.contains(&swap.replacement)
            && !head.contains(swap.replacement)
            && !source.contains(swap.blocked)
            && replacements.insert(swap.replacement)
            && blocked_slots.insert(swap.blocked_slot);
        if !consistent {
            return Err(SessionError::StaleProposal);
        }
    }

    let still_blocked = head
        .slots
        .iter()
        .enumerate()
        .any(|(i, s)| !blocked_slots.contains(&i) && s.is_some_and(|id| playing.contains(&id)));
    if still_blocked {
        return Err(SessionError::StaleProposal);
    }
    Ok(())
}

/// When the head match is blocked, the first later match that can go on court unchanged.
pub fn find_skip_ahead(session: &Session) -> Option<SkipAhead> {
    let playing = session.playing_ids();
    let is_clear = |i: usize| {
        session
            .queue
            .get(i)
            .is_some_and(|e| e.is_complete() && e.player_ids().all(|id| !playing.contains(&id)))
    };
    if session.queue.is_empty() || is_clear(0) {
        return None;
    }
    (1..session.queue.len())
        .find(|i| is_clear(*i))
        .map(|entry_index| SkipAhead {
            entry_index,
            skipped: entry_index,
        })
}

/// Dispatch the match found by [`find_skip_ahead`] after the operator confirms.
pub fn apply_skip_ahead(
    session: &mut Session,
    court_id: CourtId,
    skip: SkipAhead,
    now: DateTime<Utc>,
) -> Result<Announcement, SessionError> {
    let playing = session.playing_ids();
    let still_clear = session
        .queue
        .get(skip.entry_index)
        .is_some_and(|e| e.is_complete() && e.player_ids().all(|id| !playing.contains(&id)));
    if !still_clear {
        return Err(SessionError::StaleProposal);
    }
    assign_to_court(session, court_id, skip.entry_index, now)
}
