//! Integration tests for moving matches onto courts and off again.

use chrono::{Duration, Utc};
use shuttle_scheduler::logic::{
    assign_to_court, auto_assign_all, cancel_match, dispatch_next, end_match, replay_announcement,
};
use shuttle_scheduler::{Gender, Player, PlayerId, QueueEntry, Session, SessionError};
use std::collections::HashSet;

fn session_with(n: usize, rounds: &[[usize; 4]]) -> (Session, Vec<PlayerId>) {
    let players: Vec<Player> = (0..n)
        .map(|i| Player::new(format!("P{i}"), Gender::Male, 5))
        .collect();
    let ids: Vec<PlayerId> = players.iter().map(|p| p.id).collect();
    let mut session = Session::with_players(players);
    for r in rounds {
        session.queue.append(QueueEntry::new(r.map(|i| ids[i])));
    }
    (session, ids)
}

fn games(session: &Session, id: PlayerId) -> u32 {
    session.player(id).unwrap().games_played
}

#[test]
fn assign_moves_entry_to_court_and_announces() {
    let (mut s, p) = session_with(8, &[[0, 1, 2, 3], [4, 5, 6, 7]]);
    let court = s.courts[1].id;
    let now = Utc::now();

    let a = assign_to_court(&mut s, court, 1, now).unwrap();

    assert_eq!(a.court_name, "Court B");
    assert_eq!(a.player_names, vec!["P4", "P5", "P6", "P7"]);
    assert_eq!(s.queue.len(), 1);
    let c = s.court(court).unwrap();
    assert!(c.is_active);
    assert_eq!(c.start_time, Some(now));
    assert!(c.contains(p[4]));
}

#[test]
fn assign_rejects_busy_court_and_bad_index() {
    let (mut s, _) = session_with(8, &[[0, 1, 2, 3], [4, 5, 6, 7]]);
    let court = s.courts[0].id;
    assert_eq!(
        assign_to_court(&mut s, court, 5, Utc::now()),
        Err(SessionError::QueueIndexOutOfRange(5))
    );
    assign_to_court(&mut s, court, 0, Utc::now()).unwrap();
    assert_eq!(
        assign_to_court(&mut s, court, 0, Utc::now()),
        Err(SessionError::CourtBusy(court))
    );
    assert_eq!(s.queue.len(), 1);
}

#[test]
fn dispatch_next_reports_blocked_players() {
    let (mut s, p) = session_with(8, &[[0, 1, 2, 3], [0, 4, 5, 6]]);
    let (a, b) = (s.courts[0].id, s.courts[1].id);
    dispatch_next(&mut s, a, Utc::now()).unwrap();

    assert_eq!(
        dispatch_next(&mut s, b, Utc::now()),
        Err(SessionError::Blocked { players: vec![p[0]] })
    );
    assert_eq!(s.queue.len(), 1);
    assert!(!s.court(b).unwrap().is_active);
}

#[test]
fn auto_assign_never_double_books() {
    // Second entry shares P0 with the first; the third is free.
    let (mut s, p) = session_with(12, &[[0, 1, 2, 3], [0, 4, 5, 6], [7, 8, 9, 10]]);
    s.add_court();

    let report = auto_assign_all(&mut s, Utc::now());

    assert_eq!(report.eligible, 3);
    assert_eq!(report.filled, 2);
    assert_eq!(report.announcements.len(), 2);
    let mut seen = HashSet::new();
    for court in s.courts.iter().filter(|c| c.is_active) {
        for id in court.player_ids() {
            assert!(seen.insert(id), "player on two courts");
        }
    }
    assert_eq!(s.queue.len(), 1);
    assert!(s.queue.get(0).unwrap().contains(p[0]));
}

#[test]
fn auto_assign_skips_incomplete_entries() {
    let (mut s, _) = session_with(4, &[]);
    s.queue.append_blank();
    let report = auto_assign_all(&mut s, Utc::now());
    assert_eq!(report.filled, 0);
    assert_eq!(s.queue.len(), 1);
}

#[test]
fn end_match_records_history_and_games() {
    let (mut s, p) = session_with(4, &[[0, 1, 2, 3]]);
    let court = s.courts[0].id;
    let started = Utc::now();
    assign_to_court(&mut s, court, 0, started).unwrap();

    let record = end_match(&mut s, court, Some((21, 17)), started + Duration::seconds(600))
        .unwrap()
        .unwrap();

    assert_eq!(record.players, [p[0], p[1], p[2], p[3]]);
    assert_eq!(record.teams, [[p[0], p[1]], [p[2], p[3]]]);
    assert_eq!(record.duration_seconds, Some(600));
    assert_eq!(record.score, Some((21, 17)));
    assert_eq!(s.history.len(), 1);
    assert_eq!(s.games_counter, 1);
    assert!(p[..4].iter().all(|id| games(&s, *id) == 1));
    assert!(!s.court(court).unwrap().is_active);
}

#[test]
fn end_match_on_partial_court_records_nothing() {
    let (mut s, p) = session_with(4, &[]);
    let court = s.courts[0].id;
    let mut entry = QueueEntry::blank();
    entry.slots[0] = Some(p[0]);
    entry.slots[1] = Some(p[1]);
    s.court_mut(court).unwrap().activate(&entry, Utc::now());

    assert_eq!(end_match(&mut s, court, None, Utc::now()), Ok(None));
    assert!(s.history.is_empty());
    assert_eq!(games(&s, p[0]), 0);
    assert!(!s.court(court).unwrap().is_active);
}

#[test]
fn cancel_returns_players_to_front_without_accounting() {
    let (mut s, p) = session_with(8, &[[0, 1, 2, 3], [4, 5, 6, 7]]);
    let court = s.courts[0].id;
    let original = *s.queue.get(0).unwrap();
    assign_to_court(&mut s, court, 0, Utc::now()).unwrap();

    let returned = cancel_match(&mut s, court).unwrap();

    assert_eq!(returned, Some(original));
    assert_eq!(s.queue.get(0), Some(&original));
    assert_eq!(s.queue.len(), 2);
    assert!(s.history.is_empty());
    assert_eq!(s.games_counter, 0);
    assert_eq!(games(&s, p[0]), 0);
    assert!(!s.court(court).unwrap().is_active);
}

#[test]
fn cancel_on_idle_court_changes_nothing() {
    let (mut s, _) = session_with(4, &[[0, 1, 2, 3]]);
    let court = s.courts[0].id;
    assert_eq!(cancel_match(&mut s, court), Ok(None));
    assert_eq!(s.queue.len(), 1);
}

#[test]
fn replay_needs_an_active_court() {
    let (mut s, _) = session_with(4, &[[0, 1, 2, 3]]);
    let court = s.courts[0].id;
    assert_eq!(replay_announcement(&s, court), Err(SessionError::CourtIdle(court)));
    let first = assign_to_court(&mut s, court, 0, Utc::now()).unwrap();
    assert_eq!(replay_announcement(&s, court), Ok(first));
}
