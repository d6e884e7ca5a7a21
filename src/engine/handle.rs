//! Shared, async entry point to one session.
//!
//! The handle owns the live state. Every operation locks it once, runs the pure
//! logic to completion, saves the snapshot and then publishes announcements, so each
//! call is atomic and the timer always sees the latest committed state.

use chrono::Utc;
use log::{info, warn};
use rand::rngs::StdRng;
use rand::SeedableRng;
use serde::Serialize;
use std::sync::Arc;
use std::time::Duration;
use tokio::sync::Mutex;

use crate::engine::announce::AnnouncementBus;
use crate::engine::store::SessionStore;
use crate::engine::strategy::{validate_suggestions, StrategyError, SuggestionStrategy};
use crate::logic::{
    self, Announcement, AutoAssignReport, ConflictProposal, Resolution, SkipAhead, SlotRef,
    SortMode, SwapOutcome,
};
use crate::models::{
    AutoAssignSettings, CourtId, Direction, Gender, MatchHistoryRecord, Player, PlayerId, QueueEntry, Session,
    SessionError, SessionId,
};

/// Default bound on an external suggestion call.
pub const DEFAULT_STRATEGY_TIMEOUT: Duration = Duration::from_secs(20);

/// Where the rounds of a scheduling request came from.
#[derive(Clone, Debug, Eq, PartialEq, Serialize)]
#[serde(rename_all = "snake_case", tag = "kind", content = "reason")]
pub enum ScheduleSource {
    Local,
    External,
    /// The external strategy failed; the local generator ran instead.
    LocalFallback(String),
}

#[derive(Clone, Debug, Eq, PartialEq, Serialize)]
pub struct ScheduleReport {
    pub added: usize,
    pub source: ScheduleSource,
}

struct Live {
    session: Session,
    rng: StdRng,
}

struct Inner {
    id: SessionId,
    live: Mutex<Live>,
    store: Arc<dyn SessionStore>,
    bus: AnnouncementBus,
    strategy: Option<Arc<dyn SuggestionStrategy>>,
    strategy_timeout: Duration,
}

#[derive(Clone)]
pub struct SessionHandle {
    inner: Arc<Inner>,
}

impl SessionHandle {
    pub fn new(session: Session, store: Arc<dyn SessionStore>, bus: AnnouncementBus) -> Self {
        Self::with_rng(session, store, bus, StdRng::from_entropy())
    }

    /// Same as [`SessionHandle::new`] with a fixed RNG, for reproducible scheduling.
    pub fn with_rng(
        session: Session,
        store: Arc<dyn SessionStore>,
        bus: AnnouncementBus,
        rng: StdRng,
    ) -> Self {
        Self {
            inner: Arc::new(Inner {
                id: session.id,
                live: Mutex::new(Live { session, rng }),
                store,
                bus,
                strategy: None,
                strategy_timeout: DEFAULT_STRATEGY_TIMEOUT,
            }),
        }
    }

    /// Attach an external suggestion strategy. Must be called before the handle is cloned.
    pub fn with_strategy(self, strategy: Arc<dyn SuggestionStrategy>, timeout: Duration) -> Self {
        match Arc::try_unwrap(self.inner) {
            Ok(mut inner) => {
                inner.strategy = Some(strategy);
                inner.strategy_timeout = timeout;
                Self {
                    inner: Arc::new(inner),
                }
            }
            Err(inner) => {
                warn!("Strategy not attached: session handle already shared");
                Self { inner }
            }
        }
    }

    /// Load a saved session, or start a fresh one under that id.
    pub async fn load_or_new(
        id: SessionId,
        store: Arc<dyn SessionStore>,
        bus: AnnouncementBus,
    ) -> Self {
        let session = match store.load(id).await {
            Ok(Some(session)) => session,
            Ok(None) => Session { id, ..Session::new() },
            Err(e) => {
                warn!("Could not load session {}: {}; starting empty", id, e);
                Session { id, ..Session::new() }
            }
        };
        Self::new(session, store, bus)
    }

    pub fn id(&self) -> SessionId {
        self.inner.id
    }

    pub fn bus(&self) -> &AnnouncementBus {
        &self.inner.bus
    }

    /// Copy of the current state.
    pub async fn snapshot(&self) -> Session {
        self.inner.live.lock().await.session.clone()
    }

    /// Run one read-only query against the current state.
    pub async fn read<T>(&self, query: impl FnOnce(&Session) -> T) -> T {
        query(&self.inner.live.lock().await.session)
    }

    /// Run one mutating operation and persist the result. Errors leave the state as it was.
    async fn commit<T>(
        &self,
        op: impl FnOnce(&mut Session, &mut StdRng) -> Result<T, SessionError>,
    ) -> Result<T, SessionError> {
        let mut live = self.inner.live.lock().await;
        let Live { session, rng } = &mut *live;
        let out = op(session, rng)?;
        if let Err(e) = self.inner.store.save(session).await {
            warn!("Failed to save session {}: {}", self.inner.id, e);
        }
        Ok(out)
    }

    fn publish(&self, announcements: impl IntoIterator<Item = Announcement>) {
        for a in announcements {
            self.inner.bus.announce(a);
        }
    }

    // --- roster and courts ---

    pub async fn add_player(&self, name: String, gender: Gender, level: u8) -> Result<PlayerId, SessionError> {
        self.commit(|s, _| s.add_player(name, gender, level)).await
    }

    pub async fn remove_player(&self, id: PlayerId) -> Result<Player, SessionError> {
        self.commit(|s, _| s.remove_player(id)).await
    }

    pub async fn set_player_level(&self, id: PlayerId, level: u8) -> Result<(), SessionError> {
        self.commit(|s, _| s.set_player_level(id, level)).await
    }

    pub async fn set_player_target(&self, id: PlayerId, target: u32) -> Result<(), SessionError> {
        self.commit(|s, _| s.set_player_target(id, target)).await
    }

    pub async fn toggle_pause(&self, id: PlayerId) -> Result<bool, SessionError> {
        self.commit(|s, _| s.toggle_pause(id)).await
    }

    pub async fn add_court(&self) -> Result<CourtId, SessionError> {
        self.commit(|s, _| Ok(s.add_court())).await
    }

    pub async fn remove_court(&self, id: CourtId) -> Result<(), SessionError> {
        self.commit(|s, _| s.remove_court(id)).await
    }

    pub async fn rename_court(&self, id: CourtId, name: String) -> Result<(), SessionError> {
        self.commit(|s, _| s.rename_court(id, &name)).await
    }

    pub async fn clear_history(&self) -> Result<(), SessionError> {
        self.commit(|s, _| {
            s.clear_history();
            Ok(())
        })
        .await
    }

    pub async fn reset(&self) -> Result<(), SessionError> {
        self.commit(|s, _| {
            s.reset();
            Ok(())
        })
        .await
    }

    /// Remember the timer settings in the saved snapshot.
    pub async fn set_auto_assign(&self, settings: AutoAssignSettings) -> Result<(), SessionError> {
        self.commit(|s, _| {
            s.auto_assign = Some(settings);
            Ok(())
        })
        .await
    }

    // --- queue ---

    /// Generate `count` rounds with the local algorithm.
    pub async fn schedule(&self, count: usize, mode: SortMode) -> Result<ScheduleReport, SessionError> {
        let added = self
            .commit(|s, rng| logic::schedule_rounds(s, count, mode, rng))
            .await?;
        Ok(ScheduleReport {
            added,
            source: ScheduleSource::Local,
        })
    }

    /// Ask the external strategy for `count` rounds; on any failure fall back to the
    /// local algorithm with `fallback_mode`.
    pub async fn schedule_external(
        &self,
        count: usize,
        fallback_mode: SortMode,
    ) -> Result<ScheduleReport, SessionError> {
        let (eligible, history, queue) = self
            .read(|s| {
                let eligible: Vec<Player> =
                    s.players.iter().filter(|p| !p.is_paused).cloned().collect();
                (eligible, s.history.clone(), s.queue.entries().to_vec())
            })
            .await;
        if eligible.len() < 4 {
            return Err(SessionError::InsufficientPlayers);
        }
        if count > logic::MAX_ROUNDS_PER_REQUEST {
            return Err(SessionError::TooManyRounds {
                requested: count,
                max: logic::MAX_ROUNDS_PER_REQUEST,
            });
        }

        let suggested = self.ask_strategy(&eligible, &history, count, &queue).await;
        let failure = match suggested {
            Ok(rounds) => {
                let applied = self
                    .commit(move |s, _| {
                        let current: Vec<Player> =
                            s.players.iter().filter(|p| !p.is_paused).cloned().collect();
                        Ok(validate_suggestions(&current, count, rounds).map(|rounds| {
                            let added = rounds.len();
                            for round in rounds {
                                s.queue.append(round);
                            }
                            added
                        }))
                    })
                    .await?;
                match applied {
                    Ok(added) => {
                        info!("External strategy scheduled {} round(s)", added);
                        return Ok(ScheduleReport {
                            added,
                            source: ScheduleSource::External,
                        });
                    }
                    Err(e) => e,
                }
            }
            Err(e) => e,
        };

        warn!("External suggestions unavailable ({}), using local algorithm", failure);
        let local = self.schedule(count, fallback_mode).await?;
        Ok(ScheduleReport {
            added: local.added,
            source: ScheduleSource::LocalFallback(failure.to_string()),
        })
    }

    async fn ask_strategy(
        &self,
        eligible: &[Player],
        history: &[MatchHistoryRecord],
        count: usize,
        queue: &[QueueEntry],
    ) -> Result<Vec<QueueEntry>, StrategyError> {
        let strategy = self
            .inner
            .strategy
            .as_ref()
            .ok_or(StrategyError::NotConfigured)?;
        let timeout = self.inner.strategy_timeout;
        let rounds = tokio::time::timeout(timeout, strategy.suggest(eligible, history, count, queue))
            .await
            .map_err(|_| StrategyError::Timeout(timeout))??;
        validate_suggestions(eligible, count, rounds)
    }

    pub async fn append_blank(&self) -> Result<(), SessionError> {
        self.commit(|s, _| {
            s.queue.append_blank();
            Ok(())
        })
        .await
    }

    pub async fn remove_queued(&self, index: usize) -> Result<QueueEntry, SessionError> {
        self.commit(|s, _| {
            s.queue
                .remove_at(index)
                .ok_or(SessionError::QueueIndexOutOfRange(index))
        })
        .await
    }

    /// Move a queued match one step. Returns false at the boundaries.
    pub async fn reorder(&self, index: usize, direction: Direction) -> Result<bool, SessionError> {
        self.commit(|s, _| Ok(s.queue.reorder(index, direction))).await
    }

    pub async fn swap_slot(
        &self,
        entry_index: usize,
        slot: SlotRef,
        new_value: PlayerId,
        target: Option<usize>,
    ) -> Result<SwapOutcome, SessionError> {
        self.commit(|s, _| logic::swap_slot(s, entry_index, slot, new_value, target))
            .await
    }

    pub async fn swap_court_player(
        &self,
        court_id: CourtId,
        slot: SlotRef,
        new_value: PlayerId,
        target: Option<usize>,
    ) -> Result<SwapOutcome, SessionError> {
        self.commit(|s, _| logic::swap_court_player(s, court_id, slot, new_value, target))
            .await
    }

    // --- dispatch ---

    pub async fn assign(&self, court_id: CourtId, queue_index: usize) -> Result<Announcement, SessionError> {
        let a = self
            .commit(|s, _| logic::assign_to_court(s, court_id, queue_index, Utc::now()))
            .await?;
        self.publish([a.clone()]);
        Ok(a)
    }

    pub async fn dispatch_next(&self, court_id: CourtId) -> Result<Announcement, SessionError> {
        let a = self
            .commit(|s, _| logic::dispatch_next(s, court_id, Utc::now()))
            .await?;
        self.publish([a.clone()]);
        Ok(a)
    }

    pub async fn auto_assign_all(&self) -> AutoAssignReport {
        self.auto_assign(false).await
    }

    /// Timer entry point; reads the state as it is right now.
    pub async fn auto_assign_tick(&self) -> AutoAssignReport {
        self.auto_assign(true).await
    }

    async fn auto_assign(&self, quiet: bool) -> AutoAssignReport {
        let report = {
            let mut live = self.inner.live.lock().await;
            let now = Utc::now();
            let report = if quiet {
                logic::auto_assign_tick(&mut live.session, now)
            } else {
                logic::auto_assign_all(&mut live.session, now)
            };
            if report.filled > 0 {
                if let Err(e) = self.inner.store.save(&live.session).await {
                    warn!("Failed to save session {}: {}", self.inner.id, e);
                }
            }
            report
        };
        self.publish(report.announcements.iter().cloned());
        report
    }

    pub async fn end_match(
        &self,
        court_id: CourtId,
        score: Option<(u32, u32)>,
    ) -> Result<Option<MatchHistoryRecord>, SessionError> {
        self.commit(|s, _| logic::end_match(s, court_id, score, Utc::now()))
            .await
    }

    pub async fn cancel_match(&self, court_id: CourtId) -> Result<Option<QueueEntry>, SessionError> {
        self.commit(|s, _| logic::cancel_match(s, court_id)).await
    }

    pub async fn replay_announcement(&self, court_id: CourtId) -> Result<Announcement, SessionError> {
        let a = self
            .read(|s| logic::replay_announcement(s, court_id))
            .await?;
        self.publish([a.clone()]);
        Ok(a)
    }

    // --- conflicts ---

    pub async fn propose_resolution(&self, head_index: usize) -> Result<Resolution, SessionError> {
        self.read(|s| logic::propose_resolution(s, head_index)).await
    }

    pub async fn apply_resolution(
        &self,
        court_id: CourtId,
        proposal: ConflictProposal,
    ) -> Result<Announcement, SessionError> {
        let a = self
            .commit(|s, _| logic::apply_resolution(s, court_id, &proposal, Utc::now()))
            .await?;
        self.publish([a.clone()]);
        Ok(a)
    }

    pub async fn find_skip_ahead(&self) -> Option<SkipAhead> {
        self.read(logic::find_skip_ahead).await
    }

    pub async fn apply_skip_ahead(&self, court_id: CourtId, skip: SkipAhead) -> Result<Announcement, SessionError> {
        let a = self
            .commit(|s, _| logic::apply_skip_ahead(s, court_id, skip, Utc::now()))
            .await?;
        self.publish([a.clone()]);
        Ok(a)
    }
}
