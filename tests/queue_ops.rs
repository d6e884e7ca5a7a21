//! Integration tests for manual queue editing: swaps, blank rounds, reordering.

use chrono::Utc;
use shuttle_scheduler::logic::{find_court_swap_targets, find_duplicate_entries, swap_court_player, swap_slot};
use shuttle_scheduler::{
    Direction, Gender, Player, PlayerId, QueueEntry, Session, SessionError, SlotRef, SwapOutcome,
};

/// Session with `n` players and the queue built from `rounds` (player indices).
fn session_with(n: usize, rounds: &[[usize; 4]]) -> (Session, Vec<PlayerId>) {
    let players: Vec<Player> = (0..n)
        .map(|i| Player::new(format!("P{i}"), Gender::Female, 5))
        .collect();
    let ids: Vec<PlayerId> = players.iter().map(|p| p.id).collect();
    let mut session = Session::with_players(players);
    for r in rounds {
        session.queue.append(QueueEntry::new(r.map(|i| ids[i])));
    }
    (session, ids)
}

fn sorted_queue_ids(session: &Session) -> Vec<PlayerId> {
    let mut all: Vec<PlayerId> = session.queue.all_player_ids().collect();
    all.sort();
    all
}

#[test]
fn swapping_within_an_entry_transposes() {
    let (mut s, p) = session_with(4, &[[0, 1, 2, 3]]);
    let out = swap_slot(&mut s, 0, SlotRef::Player(p[0]), p[3], None).unwrap();
    assert_eq!(out, SwapOutcome::Transposed);
    assert_eq!(s.queue.get(0).unwrap().slots, [Some(p[3]), Some(p[1]), Some(p[2]), Some(p[0])]);
}

#[test]
fn cross_entry_swap_conserves_players() {
    let (mut s, p) = session_with(8, &[[0, 1, 2, 3], [4, 5, 6, 7]]);
    let before = sorted_queue_ids(&s);

    assert_eq!(find_duplicate_entries(&s.queue, p[5], 0), vec![1]);
    let out = swap_slot(&mut s, 0, SlotRef::Player(p[1]), p[5], Some(1)).unwrap();

    assert_eq!(out, SwapOutcome::CrossEntry { target: 1 });
    assert_eq!(s.queue.get(0).unwrap().slots[1], Some(p[5]));
    assert_eq!(s.queue.get(1).unwrap().slots[1], Some(p[1]));
    assert_eq!(sorted_queue_ids(&s), before);
    assert!(s.queue.iter().all(|e| e.has_unique_players()));
}

#[test]
fn overwrite_may_leave_a_player_queued_twice() {
    let (mut s, p) = session_with(8, &[[0, 1, 2, 3], [4, 5, 6, 7]]);
    let out = swap_slot(&mut s, 0, SlotRef::Player(p[0]), p[4], None).unwrap();
    assert_eq!(out, SwapOutcome::Overwritten);
    assert!(!s.queued_ids().contains(&p[0]));
    assert_eq!(s.queue.indices_containing(p[4], None), vec![0, 1]);
}

#[test]
fn cross_swap_rejects_target_without_player() {
    let (mut s, p) = session_with(8, &[[0, 1, 2, 3], [4, 5, 6, 7]]);
    s.queue.append_blank();
    let before = s.clone();
    assert_eq!(
        swap_slot(&mut s, 0, SlotRef::Player(p[0]), p[4], Some(2)),
        Err(SessionError::PlayerNotInEntry { player: p[4], index: 2 })
    );
    assert_eq!(s, before);
}

#[test]
fn cross_swap_rejects_duplicate_in_target() {
    let (mut s, p) = session_with(8, &[[0, 1, 2, 3], [4, 0, 6, 7]]);
    let before = s.clone();
    assert_eq!(
        swap_slot(&mut s, 0, SlotRef::Player(p[0]), p[4], Some(1)),
        Err(SessionError::WouldDuplicate { player: p[0], index: 1 })
    );
    assert_eq!(s, before);
}

#[test]
fn blank_round_fills_slot_by_slot() {
    let (mut s, p) = session_with(5, &[]);
    s.queue.append_blank();
    assert!(!s.queue.get(0).unwrap().is_complete());

    swap_slot(&mut s, 0, SlotRef::Empty(2), p[0], None).unwrap();
    assert_eq!(s.queue.get(0).unwrap().slots[2], Some(p[0]));

    // Slot 2 is taken now; the first empty slot is used instead.
    swap_slot(&mut s, 0, SlotRef::Empty(2), p[1], None).unwrap();
    assert_eq!(s.queue.get(0).unwrap().slots[0], Some(p[1]));

    for id in [p[2], p[3]] {
        swap_slot(&mut s, 0, SlotRef::Empty(0), id, None).unwrap();
    }
    assert!(s.queue.get(0).unwrap().is_complete());
    assert_eq!(
        swap_slot(&mut s, 0, SlotRef::Empty(0), p[4], None),
        Err(SessionError::SlotNotFound)
    );
}

#[test]
fn swap_errors_on_missing_entry_or_slot() {
    let (mut s, p) = session_with(5, &[[0, 1, 2, 3]]);
    assert_eq!(
        swap_slot(&mut s, 3, SlotRef::Player(p[0]), p[4], None),
        Err(SessionError::QueueIndexOutOfRange(3))
    );
    assert_eq!(
        swap_slot(&mut s, 0, SlotRef::Player(p[4]), p[4], None),
        Err(SessionError::SlotNotFound)
    );
}

#[test]
fn reorder_respects_boundaries() {
    let (mut s, _) = session_with(12, &[[0, 1, 2, 3], [4, 5, 6, 7], [8, 9, 10, 11]]);
    let first = *s.queue.get(0).unwrap();
    let last = *s.queue.get(2).unwrap();

    assert!(!s.queue.reorder(0, Direction::Up));
    assert!(!s.queue.reorder(2, Direction::Down));
    assert!(!s.queue.reorder(7, Direction::Up));
    assert_eq!(s.queue.get(0), Some(&first));

    assert!(s.queue.reorder(0, Direction::Down));
    assert_eq!(s.queue.get(1), Some(&first));
    assert!(s.queue.reorder(2, Direction::Up));
    assert_eq!(s.queue.get(1), Some(&last));
}

#[test]
fn reorder_with_huge_index_is_a_no_op() {
    let (mut s, _) = session_with(4, &[[0, 1, 2, 3]]);
    let before = s.clone();
    assert!(!s.queue.reorder(usize::MAX, Direction::Down));
    assert!(!s.queue.reorder(usize::MAX, Direction::Up));
    assert_eq!(s, before);
}

#[test]
fn remove_out_of_range_is_a_no_op() {
    let (mut s, _) = session_with(4, &[[0, 1, 2, 3]]);
    assert!(s.queue.remove_at(1).is_none());
    assert_eq!(s.queue.len(), 1);
    assert!(s.queue.remove_at(0).is_some());
    assert!(s.queue.is_empty());
}

#[test]
fn court_swap_trades_with_queued_match() {
    let (mut s, p) = session_with(8, &[[0, 1, 2, 3], [4, 5, 6, 7]]);
    let court_id = s.courts[0].id;
    let entry = s.queue.pop_at(0).unwrap();
    s.court_mut(court_id).unwrap().activate(&entry, Utc::now());

    assert_eq!(find_court_swap_targets(&s, p[6]), vec![0]);
    let out = swap_court_player(&mut s, court_id, SlotRef::Player(p[2]), p[6], Some(0)).unwrap();

    assert_eq!(out, SwapOutcome::CrossEntry { target: 0 });
    assert!(s.court(court_id).unwrap().contains(p[6]));
    assert!(!s.court(court_id).unwrap().contains(p[2]));
    assert_eq!(s.queue.get(0).unwrap().slots[2], Some(p[2]));
}

#[test]
fn court_swap_rejects_player_on_another_court() {
    let (mut s, p) = session_with(8, &[[0, 1, 2, 3], [4, 5, 6, 7]]);
    let (a, b) = (s.courts[0].id, s.courts[1].id);
    let first = s.queue.pop_at(0).unwrap();
    let second = s.queue.pop_at(0).unwrap();
    s.court_mut(a).unwrap().activate(&first, Utc::now());
    s.court_mut(b).unwrap().activate(&second, Utc::now());

    assert_eq!(
        swap_court_player(&mut s, a, SlotRef::Player(p[0]), p[4], None),
        Err(SessionError::PlayerBusy(p[4]))
    );
    // Same court: plain transposition.
    assert_eq!(
        swap_court_player(&mut s, a, SlotRef::Player(p[0]), p[3], None),
        Ok(SwapOutcome::Transposed)
    );
}
