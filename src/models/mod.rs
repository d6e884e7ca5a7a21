//! Data structures for a court rotation session: players, courts, queue, history.

mod court;
mod history;
mod player;
mod queue;
mod session;

pub use court::{Court, CourtId};
pub use history::MatchHistoryRecord;
pub use player::{Gender, Player, PlayerId, DEFAULT_TARGET_GAMES, MAX_LEVEL, MIN_LEVEL};
pub use queue::{Direction, MatchQueue, QueueEntry, Slot};
pub use session::{AutoAssignSettings, Session, SessionError, SessionId, DEFAULT_INTERVAL_SECS};
