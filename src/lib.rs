//! Court rotation scheduler for doubles sessions: models, scheduling logic, and the async
//! engine the web server drives.

pub mod config;
pub mod engine;
pub mod logic;
pub mod models;

pub use config::Config;
pub use engine::{
    AnnouncementBus, AutoAssignSettings, AutoAssigner, InMemorySessionStore, JsonFileStore,
    ScheduleReport, ScheduleSource, SessionHandle, SessionStore,
};
pub use logic::{Announcement, AutoAssignReport, ConflictProposal, Resolution, SkipAhead, SlotRef, SortMode, SwapOutcome};
pub use models::{
    Court, CourtId, Direction, Gender, MatchHistoryRecord, MatchQueue, Player, PlayerId, QueueEntry,
    Session, SessionError, SessionId, Slot,
};
