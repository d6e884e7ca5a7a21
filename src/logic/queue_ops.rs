//! Player swaps inside queued matches and on active courts.
//!
//! Each swap resolves in one of three ways, tried in order:
//! 1. the incoming player is already in the same match: the two slots trade places;
//! 2. the caller named another queued match holding the incoming player: the two
//!    players trade places across matches;
//! 3. otherwise the slot is overwritten, even if the incoming player is queued elsewhere.
//!
//! Asking the operator which match to trade with is left to the caller; use
//! [`find_duplicate_entries`] / [`find_court_swap_targets`] to build that choice.

use crate::models::{CourtId, MatchQueue, PlayerId, Session, SessionError, Slot};
use serde::{Deserialize, Serialize};

/// Which slot a swap replaces.
#[derive(Clone, Copy, Debug, Eq, PartialEq, Serialize, Deserialize)]
#[serde(rename_all = "snake_case", tag = "kind", content = "value")]
pub enum SlotRef {
    /// The slot currently holding this player.
    Player(PlayerId),
    /// An empty slot; the position is the one the operator picked. If that slot is no
    /// longer empty the first empty slot is used.
    Empty(usize),
}

/// How a swap was applied.
#[derive(Clone, Copy, Debug, Eq, PartialEq, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum SwapOutcome {
    /// Two slots of the same match traded players.
    Transposed,
    /// Players traded places with the queued match at `target`.
    CrossEntry { target: usize },
    /// Slot overwritten. The incoming player may now be queued twice.
    Overwritten,
}

fn locate(slots: &[Slot], slot: SlotRef) -> Option<usize> {
    match slot {
        SlotRef::Player(id) => slots.iter().position(|s| *s == Some(id)),
        SlotRef::Empty(hint) => match slots.get(hint) {
            Some(None) => Some(hint),
            _ => slots.iter().position(Option::is_none),
        },
    }
}

/// Queued matches other than `except` that already hold `player`.
pub fn find_duplicate_entries(queue: &MatchQueue, player: PlayerId, except: usize) -> Vec<usize> {
    queue.indices_containing(player, Some(except))
}

/// Queued matches holding `player`, for swaps onto a court.
pub fn find_court_swap_targets(session: &Session, player: PlayerId) -> Vec<usize> {
    session.queue.indices_containing(player, None)
}

/// Put `new_value` into a slot of queued match `entry_index`.
///
/// `target` is the queued match to trade with when `new_value` is already queued
/// there; `None` means overwrite. On error nothing changes.
pub fn swap_slot(
    session: &mut Session,
    entry_index: usize,
    slot: SlotRef,
    new_value: PlayerId,
    target: Option<usize>,
) -> Result<SwapOutcome, SessionError> {
    let entry = session
        .queue
        .get(entry_index)
        .ok_or(SessionError::QueueIndexOutOfRange(entry_index))?;
    let pos = locate(&entry.slots, slot).ok_or(SessionError::SlotNotFound)?;
    let old_value = entry.slots[pos];

    if let Some(existing) = entry.position(new_value) {
        if let Some(entry) = session.queue.get_mut(entry_index) {
            entry.slots.swap(pos, existing);
        }
        return Ok(SwapOutcome::Transposed);
    }

    if let Some(t) = target {
        let target_entry = session
            .queue
            .get(t)
            .ok_or(SessionError::QueueIndexOutOfRange(t))?;
        let target_pos = target_entry
            .position(new_value)
            .ok_or(SessionError::PlayerNotInEntry {
                player: new_value,
                index: t,
            })?;
        if let Some(old) = old_value {
            if target_entry.contains(old) {
                return Err(SessionError::WouldDuplicate { player: old, index: t });
            }
        }
        if let Some(entry) = session.queue.get_mut(entry_index) {
            entry.slots[pos] = Some(new_value);
        }
        if let Some(target_entry) = session.queue.get_mut(t) {
            target_entry.slots[target_pos] = old_value;
        }
        log::debug!("Swapped queue match {} slot {} with match {}", entry_index, pos, t);
        return Ok(SwapOutcome::CrossEntry { target: t });
    }

    if let Some(entry) = session.queue.get_mut(entry_index) {
        entry.slots[pos] = Some(new_value);
    }
    Ok(SwapOutcome::Overwritten)
}

/// Put `new_value` onto an active court, following the same three outcomes as
/// [`swap_slot`]; `target` names a queued match to trade with.
///
/// A player already on a different court is rejected.
pub fn swap_court_player(
    session: &mut Session,
    court_id: CourtId,
    slot: SlotRef,
    new_value: PlayerId,
    target: Option<usize>,
) -> Result<SwapOutcome, SessionError> {
    let court = session
        .court(court_id)
        .ok_or(SessionError::CourtNotFound(court_id))?;
    let pos = locate(&court.players, slot).ok_or(SessionError::SlotNotFound)?;
    let old_value = court.players[pos];

    if let Some(existing) = court.players.iter().position(|s| *s == Some(new_value)) {
        if let Some(court) = session.court_mut(court_id) {
            court.players.swap(pos, existing);
        }
        return Ok(SwapOutcome::Transposed);
    }

    let on_other_court = session
        .courts
        .iter()
        .any(|c| c.id != court_id && c.is_active && c.contains(new_value));
    if on_other_court {
        return Err(SessionError::PlayerBusy(new_value));
    }

    if let Some(t) = target {
        let target_entry = session
            .queue
            .get(t)
            .ok_or(SessionError::QueueIndexOutOfRange(t))?;
        let target_pos = target_entry
            .position(new_value)
            .ok_or(SessionError::PlayerNotInEntry {
                player: new_value,
                index: t,
            })?;
        if let Some(old) = old_value {
            if target_entry.contains(old) {
                return Err(SessionError::WouldDuplicate { player: old, index: t });
            }
        }
        if let Some(court) = session.court_mut(court_id) {
            court.players[pos] = Some(new_value);
        }
        if let Some(target_entry) = session.queue.get_mut(t) {
            target_entry.slots[target_pos] = old_value;
        }
        return Ok(SwapOutcome::CrossEntry { target: t });
    }

    if let Some(court) = session.court_mut(court_id) {
        court.players[pos] = Some(new_value);
    }
    Ok(SwapOutcome::Overwritten)
}
