//! Web server: the scheduling engine behind a JSON REST API.
//! Run with: cargo run --bin web
//! Listens on 0.0.0.0:8080 by default. See `Config::from_env` for the environment
//! variables (HOST, PORT, DATA_DIR, AUTO_ASSIGN_*, SUGGESTION_*, SESSION_INACTIVITY_HOURS).

use actix_web::{
    delete, get, post, put,
    web::{Data, Json, Path},
    App, HttpResponse, HttpServer, Responder,
};
use serde::{Deserialize, Serialize};
use shuttle_scheduler::engine::HttpSuggestionStrategy;
use shuttle_scheduler::logic::{
    analyze_entry, export_history_csv, player_stats, suggested_round_count, MAX_ROUNDS_PER_REQUEST,
};
use shuttle_scheduler::{
    AnnouncementBus, AutoAssignSettings, AutoAssigner, Config, ConflictProposal, CourtId, Direction,
    Gender, InMemorySessionStore, JsonFileStore, PlayerId, Session, SessionError, SessionHandle,
    SessionId, SessionStore, SkipAhead, SlotRef, SortMode,
};
use std::collections::HashMap;
use std::sync::{Arc, RwLock};
use std::time::{Duration, Instant};
use tokio::sync::broadcast::error::RecvError;

/// Live session: its handle, its timer and the last time a request touched it.
struct SessionEntry {
    handle: SessionHandle,
    assigner: AutoAssigner,
    last_activity: Instant,
}

struct Registry {
    sessions: RwLock<HashMap<SessionId, SessionEntry>>,
    store: Arc<dyn SessionStore>,
    config: Config,
}

type AppState = Data<Registry>;

#[derive(Serialize)]
struct HealthResponse {
    ok: bool,
    service: &'static str,
}

#[derive(Deserialize)]
struct AddPlayerBody {
    name: String,
    #[serde(default)]
    gender: Gender,
    #[serde(default = "default_level")]
    level: u8,
}

fn default_level() -> u8 {
    5
}

#[derive(Deserialize)]
struct LevelBody {
    level: u8,
}

#[derive(Deserialize)]
struct TargetBody {
    target_games: u32,
}

#[derive(Deserialize)]
struct RenameBody {
    name: String,
}

#[derive(Deserialize)]
struct GenerateBody {
    /// Defaults to the suggested round count.
    count: Option<usize>,
    #[serde(default)]
    mode: SortMode,
    /// Ask the external strategy first.
    #[serde(default)]
    external: bool,
}

#[derive(Deserialize)]
struct MoveBody {
    direction: Direction,
}

#[derive(Deserialize)]
struct SwapBody {
    slot: SlotRef,
    new_player: PlayerId,
    /// Queued match to trade with; omitted means overwrite.
    target: Option<usize>,
}

#[derive(Deserialize)]
struct AssignBody {
    queue_index: usize,
}

#[derive(Deserialize, Default)]
struct EndBody {
    score: Option<(u32, u32)>,
}

#[derive(Deserialize)]
struct SessionPath {
    id: SessionId,
}

#[derive(Deserialize)]
struct PlayerPath {
    id: SessionId,
    player_id: PlayerId,
}

#[derive(Deserialize)]
struct CourtPath {
    id: SessionId,
    court_id: CourtId,
}

#[derive(Deserialize)]
struct QueuePath {
    id: SessionId,
    index: usize,
}

fn error_body(e: impl ToString) -> serde_json::Value {
    serde_json::json!({ "error": e.to_string() })
}

fn session_error(e: SessionError) -> HttpResponse {
    match e {
        SessionError::PlayerNotFound(_)
        | SessionError::CourtNotFound(_)
        | SessionError::QueueIndexOutOfRange(_) => HttpResponse::NotFound().json(error_body(e)),
        _ => HttpResponse::BadRequest().json(error_body(e)),
    }
}

fn no_session() -> HttpResponse {
    HttpResponse::NotFound().json(error_body("No session"))
}

/// Ok responses carry the full session so the client can re-render.
async fn respond<T>(handle: &SessionHandle, result: Result<T, SessionError>) -> HttpResponse {
    match result {
        Ok(_) => HttpResponse::Ok().json(handle.snapshot().await),
        Err(e) => session_error(e),
    }
}

fn build_handle(state: &Registry, session: Session) -> SessionHandle {
    let handle = SessionHandle::new(session, state.store.clone(), AnnouncementBus::default());
    let Some(endpoint) = state.config.suggestion_endpoint.clone() else {
        return handle;
    };
    let strategy = HttpSuggestionStrategy::new(endpoint, state.config.suggestion_api_key.clone());
    handle.with_strategy(Arc::new(strategy), state.config.suggestion_timeout)
}

/// Log every announcement; the server has no speaker of its own.
fn spawn_announcer(handle: &SessionHandle) {
    let mut rx = handle.bus().subscribe();
    let id = handle.id();
    tokio::spawn(async move {
        loop {
            match rx.recv().await {
                Ok(a) => log::info!(
                    "[{}] {} to {}",
                    id,
                    a.player_names.join(", "),
                    a.court_name
                ),
                Err(RecvError::Lagged(n)) => log::warn!("[{}] {} announcement(s) missed", id, n),
                Err(RecvError::Closed) => break,
            }
        }
    });
}

/// `settings` is what the snapshot remembered, if anything.
fn register(state: &Registry, handle: SessionHandle, settings: Option<AutoAssignSettings>) -> SessionHandle {
    let mut g = match state.sessions.write() {
        Ok(guard) => guard,
        Err(poisoned) => poisoned.into_inner(),
    };
    let id = handle.id();
    // A concurrent request may have loaded it first.
    if let Some(entry) = g.get_mut(&id) {
        entry.last_activity = Instant::now();
        return entry.handle.clone();
    }
    spawn_announcer(&handle);
    let settings = settings.unwrap_or(state.config.auto_assign);
    let assigner = AutoAssigner::spawn(handle.clone(), settings);
    g.insert(
        id,
        SessionEntry {
            handle: handle.clone(),
            assigner,
            last_activity: Instant::now(),
        },
    );
    handle
}

/// Find a live session, or load it from the store. Refreshes last_activity.
async fn session(state: &AppState, id: SessionId) -> Option<SessionHandle> {
    {
        let mut g = match state.sessions.write() {
            Ok(guard) => guard,
            Err(poisoned) => poisoned.into_inner(),
        };
        if let Some(entry) = g.get_mut(&id) {
            entry.last_activity = Instant::now();
            return Some(entry.handle.clone());
        }
    }
    match state.store.load(id).await {
        Ok(Some(saved)) => {
            log::info!("Restored session {} from storage", id);
            let settings = saved.auto_assign;
            Some(register(state, build_handle(state, saved), settings))
        }
        Ok(None) => None,
        Err(e) => {
            log::warn!("Could not load session {}: {}", id, e);
            None
        }
    }
}

macro_rules! session_or_404 {
    ($state:expr, $id:expr) => {
        match session(&$state, $id).await {
            Some(handle) => handle,
            None => return no_session(),
        }
    };
}

#[get("/api/health")]
async fn api_health() -> impl Responder {
    HttpResponse::Ok().json(HealthResponse {
        ok: true,
        service: "shuttle-scheduler",
    })
}

/// Create a new session (returns it with id; the client keeps the id).
#[post("/api/sessions")]
async fn api_create_session(state: AppState) -> HttpResponse {
    let handle = register(&state, build_handle(&state, Session::new()), None);
    let snapshot = handle.snapshot().await;
    if let Err(e) = state.store.save(&snapshot).await {
        log::warn!("Failed to save new session {}: {}", snapshot.id, e);
    }
    HttpResponse::Ok().json(snapshot)
}

#[get("/api/sessions/{id}")]
async fn api_get_session(state: AppState, path: Path<SessionPath>) -> HttpResponse {
    let handle = session_or_404!(state, path.id);
    HttpResponse::Ok().json(handle.snapshot().await)
}

/// Drop a session from memory and storage.
#[delete("/api/sessions/{id}")]
async fn api_delete_session(state: AppState, path: Path<SessionPath>) -> HttpResponse {
    let removed = match state.sessions.write() {
        Ok(mut g) => g.remove(&path.id),
        Err(poisoned) => poisoned.into_inner().remove(&path.id),
    };
    if let Some(entry) = removed {
        entry.assigner.shutdown();
    }
    match state.store.delete(path.id).await {
        Ok(()) => HttpResponse::NoContent().finish(),
        Err(e) => HttpResponse::InternalServerError().json(error_body(e)),
    }
}

/// Back to an empty roster and two courts; same id.
#[post("/api/sessions/{id}/reset")]
async fn api_reset(state: AppState, path: Path<SessionPath>) -> HttpResponse {
    let handle = session_or_404!(state, path.id);
    respond(&handle, handle.reset().await).await
}

// --- players ---

#[post("/api/sessions/{id}/players")]
async fn api_add_player(state: AppState, path: Path<SessionPath>, body: Json<AddPlayerBody>) -> HttpResponse {
    let handle = session_or_404!(state, path.id);
    let AddPlayerBody { name, gender, level } = body.into_inner();
    respond(&handle, handle.add_player(name, gender, level).await).await
}

#[delete("/api/sessions/{id}/players/{player_id}")]
async fn api_remove_player(state: AppState, path: Path<PlayerPath>) -> HttpResponse {
    let handle = session_or_404!(state, path.id);
    respond(&handle, handle.remove_player(path.player_id).await).await
}

#[put("/api/sessions/{id}/players/{player_id}/level")]
async fn api_set_level(state: AppState, path: Path<PlayerPath>, body: Json<LevelBody>) -> HttpResponse {
    let handle = session_or_404!(state, path.id);
    respond(&handle, handle.set_player_level(path.player_id, body.level).await).await
}

#[put("/api/sessions/{id}/players/{player_id}/target")]
async fn api_set_target(state: AppState, path: Path<PlayerPath>, body: Json<TargetBody>) -> HttpResponse {
    let handle = session_or_404!(state, path.id);
    respond(&handle, handle.set_player_target(path.player_id, body.target_games).await).await
}

#[post("/api/sessions/{id}/players/{player_id}/pause")]
async fn api_toggle_pause(state: AppState, path: Path<PlayerPath>) -> HttpResponse {
    let handle = session_or_404!(state, path.id);
    respond(&handle, handle.toggle_pause(path.player_id).await).await
}

#[get("/api/sessions/{id}/players/{player_id}/stats")]
async fn api_player_stats(state: AppState, path: Path<PlayerPath>) -> HttpResponse {
    let handle = session_or_404!(state, path.id);
    match handle.read(|s| player_stats(s, path.player_id)).await {
        Ok(stats) => HttpResponse::Ok().json(stats),
        Err(e) => session_error(e),
    }
}

// --- courts ---

#[post("/api/sessions/{id}/courts")]
async fn api_add_court(state: AppState, path: Path<SessionPath>) -> HttpResponse {
    let handle = session_or_404!(state, path.id);
    respond(&handle, handle.add_court().await).await
}

#[delete("/api/sessions/{id}/courts/{court_id}")]
async fn api_remove_court(state: AppState, path: Path<CourtPath>) -> HttpResponse {
    let handle = session_or_404!(state, path.id);
    respond(&handle, handle.remove_court(path.court_id).await).await
}

#[put("/api/sessions/{id}/courts/{court_id}/name")]
async fn api_rename_court(state: AppState, path: Path<CourtPath>, body: Json<RenameBody>) -> HttpResponse {
    let handle = session_or_404!(state, path.id);
    let name = body.into_inner().name;
    respond(&handle, handle.rename_court(path.court_id, name).await).await
}

#[post("/api/sessions/{id}/courts/{court_id}/assign")]
async fn api_assign(state: AppState, path: Path<CourtPath>, body: Json<AssignBody>) -> HttpResponse {
    let handle = session_or_404!(state, path.id);
    respond(&handle, handle.assign(path.court_id, body.queue_index).await).await
}

/// Put the head of the queue on the court, or report who is blocking it.
#[post("/api/sessions/{id}/courts/{court_id}/next")]
async fn api_dispatch_next(state: AppState, path: Path<CourtPath>) -> HttpResponse {
    let handle = session_or_404!(state, path.id);
    respond(&handle, handle.dispatch_next(path.court_id).await).await
}

#[post("/api/sessions/{id}/courts/{court_id}/end")]
async fn api_end_match(state: AppState, path: Path<CourtPath>, body: Option<Json<EndBody>>) -> HttpResponse {
    let handle = session_or_404!(state, path.id);
    let score = body.map(|b| b.into_inner()).unwrap_or_default().score;
    respond(&handle, handle.end_match(path.court_id, score).await).await
}

#[post("/api/sessions/{id}/courts/{court_id}/cancel")]
async fn api_cancel_match(state: AppState, path: Path<CourtPath>) -> HttpResponse {
    let handle = session_or_404!(state, path.id);
    respond(&handle, handle.cancel_match(path.court_id).await).await
}

#[post("/api/sessions/{id}/courts/{court_id}/announce")]
async fn api_replay_announcement(state: AppState, path: Path<CourtPath>) -> HttpResponse {
    let handle = session_or_404!(state, path.id);
    match handle.replay_announcement(path.court_id).await {
        Ok(a) => HttpResponse::Ok().json(a),
        Err(e) => session_error(e),
    }
}

#[post("/api/sessions/{id}/courts/{court_id}/swap")]
async fn api_swap_court_player(state: AppState, path: Path<CourtPath>, body: Json<SwapBody>) -> HttpResponse {
    let handle = session_or_404!(state, path.id);
    let SwapBody { slot, new_player, target } = body.into_inner();
    respond(
        &handle,
        handle.swap_court_player(path.court_id, slot, new_player, target).await,
    )
    .await
}

#[post("/api/sessions/{id}/courts/{court_id}/resolve")]
async fn api_apply_resolution(
    state: AppState,
    path: Path<CourtPath>,
    body: Json<ConflictProposal>,
) -> HttpResponse {
    let handle = session_or_404!(state, path.id);
    respond(&handle, handle.apply_resolution(path.court_id, body.into_inner()).await).await
}

#[post("/api/sessions/{id}/courts/{court_id}/skip-ahead")]
async fn api_apply_skip_ahead(state: AppState, path: Path<CourtPath>, body: Json<SkipAhead>) -> HttpResponse {
    let handle = session_or_404!(state, path.id);
    respond(&handle, handle.apply_skip_ahead(path.court_id, body.into_inner()).await).await
}

// --- queue ---

#[post("/api/sessions/{id}/queue/generate")]
async fn api_generate(state: AppState, path: Path<SessionPath>, body: Option<Json<GenerateBody>>) -> HttpResponse {
    let handle = session_or_404!(state, path.id);
    let (count, mode, external) = match body {
        Some(b) => (b.count, b.mode, b.external),
        None => (None, SortMode::default(), false),
    };
    let count = match count {
        Some(n) => n,
        None => handle
            .read(suggested_round_count)
            .await
            .min(MAX_ROUNDS_PER_REQUEST),
    };
    let result = if external {
        handle.schedule_external(count, mode).await
    } else {
        handle.schedule(count, mode).await
    };
    match result {
        Ok(report) => HttpResponse::Ok().json(serde_json::json!({
            "report": report,
            "session": handle.snapshot().await,
        })),
        Err(e) => session_error(e),
    }
}

#[get("/api/sessions/{id}/queue/suggested-count")]
async fn api_suggested_count(state: AppState, path: Path<SessionPath>) -> HttpResponse {
    let handle = session_or_404!(state, path.id);
    let count = handle.read(suggested_round_count).await;
    HttpResponse::Ok().json(serde_json::json!({ "count": count }))
}

#[post("/api/sessions/{id}/queue/blank")]
async fn api_append_blank(state: AppState, path: Path<SessionPath>) -> HttpResponse {
    let handle = session_or_404!(state, path.id);
    respond(&handle, handle.append_blank().await).await
}

#[delete("/api/sessions/{id}/queue/{index}")]
async fn api_remove_queued(state: AppState, path: Path<QueuePath>) -> HttpResponse {
    let handle = session_or_404!(state, path.id);
    respond(&handle, handle.remove_queued(path.index).await).await
}

#[post("/api/sessions/{id}/queue/{index}/move")]
async fn api_reorder(state: AppState, path: Path<QueuePath>, body: Json<MoveBody>) -> HttpResponse {
    let handle = session_or_404!(state, path.id);
    respond(&handle, handle.reorder(path.index, body.direction).await).await
}

#[post("/api/sessions/{id}/queue/{index}/swap")]
async fn api_swap_slot(state: AppState, path: Path<QueuePath>, body: Json<SwapBody>) -> HttpResponse {
    let handle = session_or_404!(state, path.id);
    let SwapBody { slot, new_player, target } = body.into_inner();
    respond(&handle, handle.swap_slot(path.index, slot, new_player, target).await).await
}

#[get("/api/sessions/{id}/queue/{index}/analysis")]
async fn api_analyze_entry(state: AppState, path: Path<QueuePath>) -> HttpResponse {
    let handle = session_or_404!(state, path.id);
    match handle.read(|s| analyze_entry(s, path.index)).await {
        Ok(analysis) => HttpResponse::Ok().json(analysis),
        Err(e) => session_error(e),
    }
}

#[get("/api/sessions/{id}/queue/{index}/resolution")]
async fn api_propose_resolution(state: AppState, path: Path<QueuePath>) -> HttpResponse {
    let handle = session_or_404!(state, path.id);
    match handle.propose_resolution(path.index).await {
        Ok(resolution) => HttpResponse::Ok().json(resolution),
        Err(e) => session_error(e),
    }
}

/// `null` when the head match is free or no later match can go instead.
#[get("/api/sessions/{id}/skip-ahead")]
async fn api_find_skip_ahead(state: AppState, path: Path<SessionPath>) -> HttpResponse {
    let handle = session_or_404!(state, path.id);
    HttpResponse::Ok().json(handle.find_skip_ahead().await)
}

// --- auto-assign ---

#[post("/api/sessions/{id}/auto-assign")]
async fn api_auto_assign(state: AppState, path: Path<SessionPath>) -> HttpResponse {
    let handle = session_or_404!(state, path.id);
    let report = handle.auto_assign_all().await;
    HttpResponse::Ok().json(serde_json::json!({
        "report": report,
        "session": handle.snapshot().await,
    }))
}

#[get("/api/sessions/{id}/auto-assign/settings")]
async fn api_get_auto_assign(state: AppState, path: Path<SessionPath>) -> HttpResponse {
    let _ = session_or_404!(state, path.id);
    let g = match state.sessions.read() {
        Ok(guard) => guard,
        Err(poisoned) => poisoned.into_inner(),
    };
    match g.get(&path.id) {
        Some(entry) => HttpResponse::Ok().json(entry.assigner.settings()),
        None => no_session(),
    }
}

#[put("/api/sessions/{id}/auto-assign/settings")]
async fn api_set_auto_assign(
    state: AppState,
    path: Path<SessionPath>,
    body: Json<AutoAssignSettings>,
) -> HttpResponse {
    let handle = session_or_404!(state, path.id);
    if let Err(e) = handle.set_auto_assign(*body).await {
        return session_error(e);
    }
    let g = match state.sessions.read() {
        Ok(guard) => guard,
        Err(poisoned) => poisoned.into_inner(),
    };
    match g.get(&path.id) {
        Some(entry) => {
            entry.assigner.update(*body);
            HttpResponse::Ok().json(entry.assigner.settings())
        }
        None => no_session(),
    }
}

// --- history ---

#[get("/api/sessions/{id}/history.csv")]
async fn api_history_csv(state: AppState, path: Path<SessionPath>) -> HttpResponse {
    let handle = session_or_404!(state, path.id);
    match handle.read(export_history_csv).await {
        Ok(csv) => HttpResponse::Ok().content_type("text/csv; charset=utf-8").body(csv),
        Err(e) => HttpResponse::InternalServerError().json(error_body(e)),
    }
}

#[post("/api/sessions/{id}/history/clear")]
async fn api_clear_history(state: AppState, path: Path<SessionPath>) -> HttpResponse {
    let handle = session_or_404!(state, path.id);
    respond(&handle, handle.clear_history().await).await
}

#[actix_web::main]
async fn main() -> std::io::Result<()> {
    env_logger::init_from_env(env_logger::Env::new().default_filter_or("info"));

    let config = Config::from_env();
    let store: Arc<dyn SessionStore> = match &config.data_dir {
        Some(dir) => {
            log::info!("Saving sessions under {}", dir.display());
            Arc::new(JsonFileStore::new(dir.clone()))
        }
        None => {
            log::info!("DATA_DIR not set; sessions are kept in memory only");
            Arc::new(InMemorySessionStore::new())
        }
    };
    if config.suggestion_endpoint.is_some() {
        log::info!("External suggestions enabled");
    }

    let bind = (config.host.clone(), config.port);
    log::info!("Starting server at http://{}:{}", bind.0, bind.1);

    let inactivity = config.inactivity_timeout;
    let state = Data::new(Registry {
        sessions: RwLock::new(HashMap::new()),
        store,
        config,
    });

    // Every 30 minutes, drop sessions nobody has touched for the inactivity timeout.
    // They stay in storage and are reloaded on the next request.
    let state_cleanup = state.clone();
    actix_web::rt::spawn(async move {
        let mut interval = actix_web::rt::time::interval(Duration::from_secs(30 * 60));
        loop {
            interval.tick().await;
            let mut g = match state_cleanup.sessions.write() {
                Ok(guard) => guard,
                Err(_) => continue,
            };
            let before = g.len();
            g.retain(|_, entry| entry.last_activity.elapsed() < inactivity);
            let removed = before - g.len();
            if removed > 0 {
                log::info!("Unloaded {} inactive session(s)", removed);
            }
        }
    });

    HttpServer::new(move || {
        App::new()
            .app_data(state.clone())
            .service(api_health)
            .service(api_create_session)
            .service(api_get_session)
            .service(api_delete_session)
            .service(api_reset)
            .service(api_add_player)
            .service(api_remove_player)
            .service(api_set_level)
            .service(api_set_target)
            .service(api_toggle_pause)
            .service(api_player_stats)
            .service(api_add_court)
            .service(api_remove_court)
            .service(api_rename_court)
            .service(api_assign)
            .service(api_dispatch_next)
            .service(api_end_match)
            .service(api_cancel_match)
            .service(api_replay_announcement)
            .service(api_swap_court_player)
            .service(api_apply_resolution)
            .service(api_apply_skip_ahead)
            .service(api_generate)
            .service(api_suggested_count)
            .service(api_append_blank)
            .service(api_remove_queued)
            .service(api_reorder)
            .service(api_swap_slot)
            .service(api_analyze_entry)
            .service(api_propose_resolution)
            .service(api_find_skip_ahead)
            .service(api_auto_assign)
            .service(api_get_auto_assign)
            .service(api_set_auto_assign)
            .service(api_history_csv)
            .service(api_clear_history)
    })
    .bind(bind)?
    .run()
    .await
}
