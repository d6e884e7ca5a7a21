//! Async runtime around the scheduling logic: shared session state, the auto-assign
//! timer, persistence, announcements and external suggestions.

pub mod announce;
pub mod auto_assign;
pub mod handle;
pub mod store;
pub mod strategy;

pub use announce::AnnouncementBus;
pub use auto_assign::{AutoAssignSettings, AutoAssigner};
pub use handle::{ScheduleReport, ScheduleSource, SessionHandle};
pub use store::{InMemorySessionStore, JsonFileStore, SessionStore, StoreError};
pub use strategy::{HttpSuggestionStrategy, StrategyError, SuggestionStrategy};
