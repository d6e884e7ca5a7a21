//! Dispatch: moving queued matches onto courts, and taking them off again.

use crate::models::{
    CourtId, MatchHistoryRecord, PlayerId, QueueEntry, Session, SessionError,
};
use chrono::{DateTime, Utc};
use serde::{Deserialize, Serialize};
use std::collections::HashSet;

/// "These players, to this court." Emitted on every successful dispatch.
#[derive(Clone, Debug, Eq, PartialEq, Serialize, Deserialize)]
pub struct Announcement {
    pub player_names: Vec<String>,
    pub court_name: String,
}

/// Result of filling idle courts from the queue.
#[derive(Clone, Debug, Default, Eq, PartialEq, Serialize, Deserialize)]
pub struct AutoAssignReport {
    /// Courts that received a match.
    pub filled: usize,
    /// Courts that were idle when the pass started.
    pub eligible: usize,
    pub announcements: Vec<Announcement>,
}

fn announcement_for(session: &Session, court_id: CourtId) -> Option<Announcement> {
    let court = session.court(court_id)?;
    Some(Announcement {
        player_names: session.names_for(&court.players),
        court_name: court.name.clone(),
    })
}

/// Pop queued match `queue_index` onto an idle court.
pub fn assign_to_court(
    session: &mut Session,
    court_id: CourtId,
    queue_index: usize,
    now: DateTime<Utc>,
) -> Result<Announcement, SessionError> {
    let court = session
        .court(court_id)
        .ok_or(SessionError::CourtNotFound(court_id))?;
    if court.is_active {
        return Err(SessionError::CourtBusy(court_id));
    }
    let entry = session
        .queue
        .pop_at(queue_index)
        .ok_or(SessionError::QueueIndexOutOfRange(queue_index))?;
    activate(session, court_id, &entry, now)
}

fn activate(
    session: &mut Session,
    court_id: CourtId,
    entry: &QueueEntry,
    now: DateTime<Utc>,
) -> Result<Announcement, SessionError> {
    let court = session
        .court_mut(court_id)
        .ok_or(SessionError::CourtNotFound(court_id))?;
    court.activate(entry, now);
    let announcement =
        announcement_for(session, court_id).ok_or(SessionError::CourtNotFound(court_id))?;
    log::info!(
        "Assigned {} to {}",
        announcement.player_names.join(", "),
        announcement.court_name
    );
    Ok(announcement)
}

/// Players of queued match `queue_index` who are still on a court, in slot order.
pub fn blocked_players(session: &Session, queue_index: usize) -> Vec<PlayerId> {
    let playing = session.playing_ids();
    session
        .queue
        .get(queue_index)
        .map(|e| e.player_ids().filter(|id| playing.contains(id)).collect())
        .unwrap_or_default()
}

/// Assign the head of the queue, refusing with `Blocked` when any of its players is
/// still on court (the caller can then ask the conflict resolver for a swap).
pub fn dispatch_next(
    session: &mut Session,
    court_id: CourtId,
    now: DateTime<Utc>,
) -> Result<Announcement, SessionError> {
    let court = session
        .court(court_id)
        .ok_or(SessionError::CourtNotFound(court_id))?;
    if court.is_active {
        return Err(SessionError::CourtBusy(court_id));
    }
    if session.queue.is_empty() {
        return Err(SessionError::QueueIndexOutOfRange(0));
    }
    let blocked = blocked_players(session, 0);
    if !blocked.is_empty() {
        return Err(SessionError::Blocked { players: blocked });
    }
    assign_to_court(session, court_id, 0, now)
}

/// Fill every idle court with the first queued match whose players are all free.
///
/// Only complete matches are taken. Players assigned earlier in the same pass count as
/// busy, so two courts never share a player.
pub fn auto_assign_all(session: &mut Session, now: DateTime<Utc>) -> AutoAssignReport {
    let report = fill_idle_courts(session, now);
    log::info!(
        "Auto-assign filled {} of {} idle court(s)",
        report.filled,
        report.eligible
    );
    report
}

/// Timer variant of [`auto_assign_all`]: quiet when nothing could be assigned.
pub fn auto_assign_tick(session: &mut Session, now: DateTime<Utc>) -> AutoAssignReport {
    let report = fill_idle_courts(session, now);
    if report.filled > 0 {
        log::info!(
            "Auto-assign tick filled {} of {} idle court(s)",
            report.filled,
            report.eligible
        );
    } else {
        log::debug!("Auto-assign tick: nothing assignable");
    }
    report
}

fn fill_idle_courts(session: &mut Session, now: DateTime<Utc>) -> AutoAssignReport {
    let idle: Vec<CourtId> = session
        .courts
        .iter()
        .filter(|c| !c.is_active)
        .map(|c| c.id)
        .collect();
    let mut report = AutoAssignReport {
        eligible: idle.len(),
        ..Default::default()
    };
    let mut busy = session.playing_ids();

    for court_id in idle {
        let next = session
            .queue
            .iter()
            .position(|e| e.is_complete() && e.player_ids().all(|id| !busy.contains(&id)));
        let Some(index) = next else {
            continue;
        };
        let Some(entry) = session.queue.pop_at(index) else {
            continue;
        };
        busy.extend(entry.player_ids());
        if let Ok(announcement) = activate(session, court_id, &entry, now) {
            report.filled += 1;
            report.announcements.push(announcement);
        }
    }
    report
}

/// Finish the match on a court.
///
/// A full court gets a history record (with duration and optional score) and +1 game for
/// each player. The court is cleared either way.
pub fn end_match(
    session: &mut Session,
    court_id: CourtId,
    score: Option<(u32, u32)>,
    now: DateTime<Utc>,
) -> Result<Option<MatchHistoryRecord>, SessionError> {
    let court = session
        .court_mut(court_id)
        .ok_or(SessionError::CourtNotFound(court_id))?;
    let full = court.as_entry().full_teams();
    let started = court.start_time;
    court.clear();

    let Some([[a0, a1], [b0, b1]]) = full else {
        log::info!("Cleared partially filled court without recording a result");
        return Ok(None);
    };
    let mut record = MatchHistoryRecord::new([a0, a1, b0, b1], now);
    record.duration_seconds = started.map(|s| (now - s).num_seconds());
    record.score = score;

    for id in record.players {
        if let Some(p) = session.player_mut(id) {
            p.record_game();
        }
    }
    session.games_counter += 1;
    session.history.push(record.clone());
    Ok(Some(record))
}

/// Stop a match without a result: its players go back to the head of the queue.
/// History and game counts are untouched.
pub fn cancel_match(
    session: &mut Session,
    court_id: CourtId,
) -> Result<Option<QueueEntry>, SessionError> {
    let court = session
        .court_mut(court_id)
        .ok_or(SessionError::CourtNotFound(court_id))?;
    let entry = court.as_entry();
    court.clear();
    if entry.player_ids().next().is_none() {
        return Ok(None);
    }
    session.queue.push_front(entry);
    log::info!("Cancelled match, players returned to the front of the queue");
    Ok(Some(entry))
}

/// Rebuild the announcement for a court that is in play.
pub fn replay_announcement(session: &Session, court_id: CourtId) -> Result<Announcement, SessionError> {
    let court = session
        .court(court_id)
        .ok_or(SessionError::CourtNotFound(court_id))?;
    if !court.is_active || court.player_ids().next().is_none() {
        return Err(SessionError::CourtIdle(court_id));
    }
    announcement_for(session, court_id).ok_or(SessionError::CourtNotFound(court_id))
}
