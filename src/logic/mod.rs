//! Scheduling logic: round generation, queue swaps, dispatch, conflict resolution.

pub mod conflict;
pub mod dispatch;
pub mod generator;
pub mod queue_ops;
pub mod report;

pub use conflict::{
    apply_resolution, apply_skip_ahead, find_skip_ahead, propose_resolution, ConflictProposal,
    ReplacementSwap, Resolution, SkipAhead,
};
pub use dispatch::{
    assign_to_court, auto_assign_all, auto_assign_tick, blocked_players, cancel_match,
    dispatch_next, end_match, replay_announcement, Announcement, AutoAssignReport,
};
pub use generator::{
    generate_batch, generate_round, schedule_rounds, SortMode, MAX_ROUNDS_PER_REQUEST,
};
pub use queue_ops::{
    find_court_swap_targets, find_duplicate_entries, swap_court_player, swap_slot, SlotRef,
    SwapOutcome,
};
pub use report::{analyze_entry, export_history_csv, player_stats, suggested_round_count};
