//! Integration tests for roster and court management, and the read-only reports.

use chrono::{Duration, Utc};
use shuttle_scheduler::logic::{
    analyze_entry, assign_to_court, end_match, export_history_csv, player_stats, suggested_round_count,
};
use shuttle_scheduler::{
    AutoAssignSettings, Gender, MatchHistoryRecord, Player, QueueEntry, Session, SessionError,
};

#[test]
fn new_session_has_two_idle_courts() {
    let s = Session::new();
    let names: Vec<&str> = s.courts.iter().map(|c| c.name.as_str()).collect();
    assert_eq!(names, ["Court A", "Court B"]);
    assert!(s.courts.iter().all(|c| !c.is_active));
}

#[test]
fn add_player_trims_clamps_and_rejects_duplicates() {
    let mut s = Session::new();
    let id = s.add_player("  Ann  ", Gender::Female, 40).unwrap();
    let ann = s.player(id).unwrap();
    assert_eq!(ann.name, "Ann");
    assert_eq!(ann.level, 15);
    assert_eq!(ann.target_games, 6);

    assert_eq!(s.add_player("ann", Gender::Female, 3), Err(SessionError::DuplicatePlayerName));
    assert_eq!(s.add_player("   ", Gender::Male, 3), Err(SessionError::InvalidName));
    assert_eq!(s.players.len(), 1);
}

#[test]
fn busy_players_cannot_be_removed() {
    let mut s = Session::new();
    let ids: Vec<_> = (0..5)
        .map(|i| s.add_player(format!("P{i}"), Gender::Male, 5).unwrap())
        .collect();
    s.queue.append(QueueEntry::new([ids[0], ids[1], ids[2], ids[3]]));

    assert_eq!(s.remove_player(ids[0]), Err(SessionError::PlayerBusy(ids[0])));
    assert_eq!(s.remove_player(ids[4]).unwrap().name, "P4");

    let court = s.courts[0].id;
    assign_to_court(&mut s, court, 0, Utc::now()).unwrap();
    assert_eq!(s.remove_player(ids[1]), Err(SessionError::PlayerBusy(ids[1])));
}

#[test]
fn player_settings_update_in_place() {
    let mut s = Session::new();
    let id = s.add_player("Bo", Gender::Male, 5).unwrap();
    s.set_player_level(id, 0).unwrap();
    s.set_player_target(id, 0).unwrap();
    assert_eq!(s.toggle_pause(id), Ok(true));

    let bo = s.player(id).unwrap();
    assert_eq!(bo.level, 1);
    assert_eq!(bo.target_games, 1);
    assert!(bo.is_paused);
    assert_eq!(s.toggle_pause(id), Ok(false));

    let ghost = uuid::Uuid::new_v4();
    assert_eq!(s.set_player_level(ghost, 3), Err(SessionError::PlayerNotFound(ghost)));
}

#[test]
fn courts_can_be_added_renamed_and_removed_when_idle() {
    let mut s = Session::new();
    let c = s.add_court();
    assert_eq!(s.court(c).unwrap().name, "Court C");

    s.rename_court(c, "Centre").unwrap();
    s.rename_court(c, "   ").unwrap();
    assert_eq!(s.court(c).unwrap().name, "Centre");

    let ids: Vec<_> = (0..4)
        .map(|i| s.add_player(format!("P{i}"), Gender::Male, 5).unwrap())
        .collect();
    s.queue.append(QueueEntry::new([ids[0], ids[1], ids[2], ids[3]]));
    assign_to_court(&mut s, c, 0, Utc::now()).unwrap();
    assert_eq!(s.remove_court(c), Err(SessionError::CourtBusy(c)));

    let idle = s.courts[0].id;
    s.remove_court(idle).unwrap();
    assert_eq!(s.courts.len(), 2);
}

#[test]
fn reset_keeps_auto_assign_settings() {
    let mut s = played_session();
    let settings = AutoAssignSettings {
        enabled: true,
        interval_secs: 45,
    };
    s.auto_assign = Some(settings);
    s.reset();
    assert_eq!(s.auto_assign, Some(settings));
}

#[test]
fn snapshot_without_auto_assign_settings_still_loads() {
    let s = played_session();
    let mut json = serde_json::to_value(&s).unwrap();
    json.as_object_mut().unwrap().remove("auto_assign");
    let back: Session = serde_json::from_value(json).unwrap();
    assert_eq!(back.auto_assign, None);
    assert_eq!(back.players, s.players);
}

fn played_session() -> Session {
    let mut s = Session::with_players(
        (0..4)
            .map(|i| Player::new(format!("P{i}"), Gender::Male, 3 + i as u8))
            .collect(),
    );
    let ids: Vec<_> = s.players.iter().map(|p| p.id).collect();
    let court = s.courts[0].id;
    let start = Utc::now();
    s.queue.append(QueueEntry::new([ids[0], ids[1], ids[2], ids[3]]));
    assign_to_court(&mut s, court, 0, start).unwrap();
    end_match(&mut s, court, Some((21, 15)), start + Duration::seconds(90)).unwrap();
    s
}

#[test]
fn clear_history_keeps_roster_and_zeroes_counts() {
    let mut s = played_session();
    s.clear_history();
    assert!(s.history.is_empty());
    assert_eq!(s.games_counter, 0);
    assert_eq!(s.players.len(), 4);
    assert!(s.players.iter().all(|p| p.games_played == 0));
}

#[test]
fn reset_keeps_the_id_and_clears_the_rest() {
    let mut s = played_session();
    let id = s.id;
    s.add_court();
    s.reset();
    assert_eq!(s.id, id);
    assert!(s.players.is_empty());
    assert!(s.history.is_empty());
    assert_eq!(s.courts.len(), 2);
}

#[test]
fn suggested_count_covers_remaining_targets() {
    let mut s = Session::with_players((0..8).map(|i| Player::new(format!("P{i}"), Gender::Male, 5)).collect());
    // 8 players x 6 games / 4 per match.
    assert_eq!(suggested_round_count(&s), 12);
    s.players.iter_mut().for_each(|p| p.target_games = 1);
    assert_eq!(suggested_round_count(&s), 2);
    s.queue.append_blank();
    s.queue.append_blank();
    s.queue.append_blank();
    assert_eq!(suggested_round_count(&s), 1);
}

#[test]
fn suggested_count_handles_huge_targets() {
    let mut s = Session::with_players((0..2).map(|i| Player::new(format!("P{i}"), Gender::Male, 5)).collect());
    s.players.iter_mut().for_each(|p| p.target_games = u32::MAX);
    let expected = (2 * u64::from(u32::MAX)).div_ceil(4);
    assert_eq!(suggested_round_count(&s) as u64, expected);
}

#[test]
fn analysis_flags_repeats() {
    let mut s = played_session();
    let ids: Vec<_> = s.players.iter().map(|p| p.id).collect();
    s.queue.append(QueueEntry::new([ids[0], ids[1], ids[3], ids[2]]));
    s.queue.append(QueueEntry::new([ids[0], ids[3], ids[1], ids[2]]));

    let same_pairs = analyze_entry(&s, 0).unwrap();
    assert!(same_pairs.partner_repeat);
    assert!(same_pairs.opponent_repeat);
    assert_eq!((same_pairs.team_a_level, same_pairs.team_b_level), (7, 11));
    assert_eq!(same_pairs.level_diff, 4);

    let fresh = analyze_entry(&s, 1).unwrap();
    assert!(!fresh.partner_repeat);
    assert!(!fresh.opponent_repeat);
    assert_eq!(fresh.level_diff, 0);

    assert_eq!(analyze_entry(&s, 2), Err(SessionError::QueueIndexOutOfRange(2)));
}

#[test]
fn stats_count_partners_and_opponents() {
    let s = played_session();
    let ids: Vec<_> = s.players.iter().map(|p| p.id).collect();
    let stats = player_stats(&s, ids[0]).unwrap();
    assert_eq!(stats.games_played, 1);
    assert_eq!(stats.partners, vec![(ids[1], 1)]);
    assert_eq!(stats.opponents.len(), 2);
}

#[test]
fn history_exports_as_csv() {
    let mut s = played_session();
    let ids: Vec<_> = s.players.iter().map(|p| p.id).collect();
    s.history.push(MatchHistoryRecord::new([ids[3], ids[2], ids[1], ids[0]], Utc::now()));

    let csv = export_history_csv(&s).unwrap();
    let lines: Vec<&str> = csv.lines().collect();
    assert_eq!(lines.len(), 3);
    assert!(lines[0].starts_with("timestamp,team_a,team_b"));
    assert!(lines[1].contains("P0 & P1") && lines[1].contains("21") && lines[1].contains("90"));
    assert!(lines[2].contains("P3 & P2"));
}

#[test]
fn session_survives_json_round_trip() {
    let s = played_session();
    let json = serde_json::to_string(&s).unwrap();
    let back: Session = serde_json::from_str(&json).unwrap();
    assert_eq!(back, s);
}
