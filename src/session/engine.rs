//! Game Engine
//!
//! Async front of the session world. One mutex guards the world; every
//! command and every scheduled task takes it for a short synchronous step
//! and publishes the result on watch channels before letting go.
//!
//! Each session is a generation. Starting or resetting bumps the
//! generation under the lock and cancels the previous generation's tasks,
//! then aborts and awaits their handles once the lock is released. A task
//! that wakes after being superseded sees the new generation and exits
//! without touching the world.

use std::sync::Arc;

use tokio::sync::{broadcast, watch, Mutex};
use tokio::task::JoinHandle;
use tokio::time::Instant;
use tokio_util::sync::CancellationToken;
use tracing::{debug, info, instrument, trace, warn};
use uuid::Uuid;

use crate::core::geometry::{Point, Viewport};
use crate::game::chicken::ChickenState;
use crate::game::events::GameEvent;
use crate::game::powerup::PowerUp;
use crate::game::rules::GameRules;
use crate::game::state::{GameState, Millis};
use crate::game::world::{TapOutcome, World};
use crate::persistence::{PersistenceGateway, Progression};
use crate::session::config::{ConfigError, EngineConfig};
use crate::session::tasks;
use crate::shop::resolve_skin;

/// Tasks belonging to one session generation.
pub(crate) struct SessionTasks {
    pub(crate) cancel: CancellationToken,
    pub(crate) handles: Vec<JoinHandle<()>>,
}

impl SessionTasks {
    /// Number of tasks still running.
    fn running(&self) -> usize {
        self.handles.iter().filter(|h| !h.is_finished()).count()
    }

    /// Abort every task and wait for all of them to stop.
    async fn join(self) {
        self.cancel.cancel();
        for handle in self.handles {
            handle.abort();
            let _ = handle.await;
        }
    }
}

/// Everything behind the world lock.
pub(crate) struct Shared {
    pub(crate) world: World,
    pub(crate) generation: u64,
    pub(crate) tasks: Option<SessionTasks>,
}

/// Engine internals shared with the scheduled tasks.
pub(crate) struct Inner {
    pub(crate) shared: Mutex<Shared>,
    pub(crate) rules: GameRules,
    pub(crate) progression: Progression,
    epoch: Instant,
    state_tx: watch::Sender<GameState>,
    chicken_tx: watch::Sender<ChickenState>,
    power_ups_tx: watch::Sender<Vec<PowerUp>>,
    events_tx: broadcast::Sender<GameEvent>,
}

impl Inner {
    /// Logical engine time.
    pub(crate) fn now_ms(&self) -> Millis {
        self.epoch.elapsed().as_millis() as Millis
    }

    pub(crate) fn publish_state(&self, shared: &Shared) {
        self.state_tx.send_replace(shared.world.state().clone());
    }

    pub(crate) fn publish_chicken(&self, shared: &Shared) {
        self.chicken_tx.send_replace(shared.world.chicken().clone());
    }

    pub(crate) fn publish_power_ups(&self, shared: &Shared) {
        self.power_ups_tx.send_replace(shared.world.power_up_snapshot());
    }

    /// Fan out events produced by the last world step.
    pub(crate) fn publish_events(&self, shared: &mut Shared) {
        for event in shared.world.take_events() {
            if event.is_chatty() {
                trace!(at = event.at, data = ?event.data, "Game event");
            } else {
                debug!(at = event.at, data = ?event.data, "Game event");
            }
            // No subscribers is fine
            let _ = self.events_tx.send(event);
        }
    }

    /// Publish every observable output.
    pub(crate) fn publish(&self, shared: &mut Shared) {
        self.publish_state(shared);
        self.publish_chicken(shared);
        self.publish_power_ups(shared);
        self.publish_events(shared);
    }

    /// Write progression to durable storage off the async workers.
    pub(crate) fn flush_in_background(&self) {
        let progression = self.progression.clone();
        tokio::task::spawn_blocking(move || {
            if let Err(e) = progression.flush() {
                warn!(error = %e, "Failed to flush progression");
            }
        });
    }
}

/// Handle to a running game engine. Cheap to clone.
#[derive(Clone)]
pub struct GameEngine {
    inner: Arc<Inner>,
}

impl GameEngine {
    /// Create an engine in the Ready state.
    pub fn new(config: EngineConfig, store: Arc<dyn PersistenceGateway>) -> Result<Self, ConfigError> {
        config.validate()?;

        let progression = Progression::new(store);
        let seed = config.resolve_seed();
        let skin = resolve_skin(&progression.selected_skin()).id;
        let world = World::new(config.rules.clone(), seed, skin);

        let (state_tx, _) = watch::channel(world.state().clone());
        let (chicken_tx, _) = watch::channel(world.chicken().clone());
        let (power_ups_tx, _) = watch::channel(Vec::new());
        let (events_tx, _) = broadcast::channel(config.event_capacity);

        info!(seed, skin, "Game engine created");

        Ok(Self {
            inner: Arc::new(Inner {
                shared: Mutex::new(Shared {
                    world,
                    generation: 0,
                    tasks: None,
                }),
                rules: config.rules,
                progression,
                epoch: Instant::now(),
                state_tx,
                chicken_tx,
                power_ups_tx,
                events_tx,
            }),
        })
    }

    /// Player progression backing this engine.
    pub fn progression(&self) -> &Progression {
        &self.inner.progression
    }

    /// Logical time since the engine was created.
    pub fn now_ms(&self) -> Millis {
        self.inner.now_ms()
    }

    // =========================================================================
    // LIFECYCLE
    // =========================================================================

    /// Start a new session, replacing any session in progress.
    ///
    /// Returns the new session's id.
    #[instrument(skip(self), fields(session_id = tracing::field::Empty))]
    pub async fn start(&self) -> Uuid {
        let session_id = Uuid::new_v4();
        tracing::Span::current().record("session_id", tracing::field::display(session_id));
        let skin = resolve_skin(&self.inner.progression.selected_skin()).id;

        let stale = {
            let mut shared = self.inner.shared.lock().await;
            let stale = Self::supersede(&mut shared);
            let generation = shared.generation;

            shared.world.set_skin(skin);
            shared.world.start(self.inner.now_ms(), session_id);
            shared.tasks = Some(tasks::spawn(&self.inner, generation));
            self.inner.publish(&mut shared);
            stale
        };

        if let Some(stale) = stale {
            stale.join().await;
        }
        info!(skin, "Session started");
        session_id
    }

    /// Abandon any session and return to Ready.
    ///
    /// Returns once every task of the old session has stopped.
    #[instrument(skip(self))]
    pub async fn reset(&self) {
        let stale = {
            let mut shared = self.inner.shared.lock().await;
            let stale = Self::supersede(&mut shared);
            shared.world.reset(self.inner.now_ms());
            self.inner.publish(&mut shared);
            stale
        };

        if let Some(stale) = stale {
            stale.join().await;
        }
        info!("Session reset");
    }

    /// Retire the current generation. Caller holds the lock.
    fn supersede(shared: &mut Shared) -> Option<SessionTasks> {
        shared.generation += 1;
        let stale = shared.tasks.take();
        if let Some(tasks) = &stale {
            tasks.cancel.cancel();
        }
        stale
    }

    /// Re-read the selected skin and apply it to the chicken.
    pub async fn refresh_skin(&self) {
        let skin = resolve_skin(&self.inner.progression.selected_skin()).id;
        let mut shared = self.inner.shared.lock().await;
        shared.world.set_skin(skin);
        self.inner.publish_chicken(&shared);
        debug!(skin, "Skin refreshed");
    }

    // =========================================================================
    // INPUT
    // =========================================================================

    /// Tap against the live power-up and the target.
    pub async fn on_tap(&self, point: Point, viewport: Viewport) -> TapOutcome {
        let mut shared = self.inner.shared.lock().await;
        let outcome = shared.world.on_tap(point, viewport, self.inner.now_ms());
        if outcome != TapOutcome::Ignored {
            self.inner.publish_state(&shared);
            self.inner.publish_power_ups(&shared);
            self.inner.publish_events(&mut shared);
        }
        outcome
    }

    /// Tap against the chicken. Returns true if the chicken took the tap.
    pub async fn on_chicken_tap(&self, point: Point, viewport: Viewport, density: f32) -> bool {
        let mut shared = self.inner.shared.lock().await;
        let hit = shared
            .world
            .chicken_tap(point, viewport, density, self.inner.now_ms());
        if hit {
            self.inner.publish_state(&shared);
            self.inner.publish_chicken(&shared);
            self.inner.publish_events(&mut shared);
        }
        hit
    }

    /// Tap against the chicken, then power-ups and the target, as one step.
    pub async fn tap(&self, point: Point, viewport: Viewport, density: f32) -> TapOutcome {
        let mut shared = self.inner.shared.lock().await;
        let outcome = shared
            .world
            .tap(point, viewport, density, self.inner.now_ms());
        if outcome != TapOutcome::Ignored {
            self.inner.publish(&mut shared);
        }
        outcome
    }

    // =========================================================================
    // OBSERVATION
    // =========================================================================

    /// Watch the session state.
    pub fn subscribe_state(&self) -> watch::Receiver<GameState> {
        self.inner.state_tx.subscribe()
    }

    /// Watch the chicken.
    pub fn subscribe_chicken(&self) -> watch::Receiver<ChickenState> {
        self.inner.chicken_tx.subscribe()
    }

    /// Watch the live power-ups.
    pub fn subscribe_power_ups(&self) -> watch::Receiver<Vec<PowerUp>> {
        self.inner.power_ups_tx.subscribe()
    }

    /// Receive game events from now on.
    pub fn subscribe_events(&self) -> broadcast::Receiver<GameEvent> {
        self.inner.events_tx.subscribe()
    }

    /// Latest published session state.
    pub fn state(&self) -> GameState {
        self.inner.state_tx.borrow().clone()
    }

    /// Latest published chicken.
    pub fn chicken(&self) -> ChickenState {
        self.inner.chicken_tx.borrow().clone()
    }

    /// Latest published power-ups.
    pub fn power_ups(&self) -> Vec<PowerUp> {
        self.inner.power_ups_tx.borrow().clone()
    }

    /// Number of session tasks still running.
    pub async fn active_task_count(&self) -> usize {
        let shared = self.inner.shared.lock().await;
        shared.tasks.as_ref().map_or(0, SessionTasks::running)
    }
}

// =============================================================================
// TESTS
// =============================================================================

#[cfg(test)]
mod tests {
    use super::*;
    use std::collections::BTreeSet;
    use std::time::Duration;

    use crate::game::events::GameEventData;
    use crate::game::state::GameOverState;
    use crate::persistence::{
        MemoryStore, PersistenceError, COIN_KEY, HIGH_SCORE_KEY, SELECTED_SKIN_KEY,
    };

    const VIEW: Viewport = Viewport::new(1000.0, 1000.0);

    fn engine_with(store: Arc<dyn PersistenceGateway>) -> GameEngine {
        let config = EngineConfig {
            rng_seed: Some(99),
            ..EngineConfig::default()
        };
        GameEngine::new(config, store).unwrap()
    }

    fn engine() -> (Arc<MemoryStore>, GameEngine) {
        let store = Arc::new(MemoryStore::new());
        let engine = engine_with(store.clone());
        (store, engine)
    }

    fn target_center(engine: &GameEngine) -> Point {
        let state = engine.state();
        let target = state.playing().unwrap().target;
        VIEW.to_pixels(target.x, target.y)
    }

    fn time_left(engine: &GameEngine) -> f32 {
        engine.state().playing().unwrap().time_left
    }

    struct OfflineStore;

    impl PersistenceGateway for OfflineStore {
        fn get_int(&self, _: &str, _: i64) -> Result<i64, PersistenceError> {
            Err(PersistenceError::Unavailable("offline".into()))
        }
        fn set_int(&self, _: &str, _: i64) -> Result<(), PersistenceError> {
            Err(PersistenceError::Unavailable("offline".into()))
        }
        fn get_string(&self, _: &str, _: &str) -> Result<String, PersistenceError> {
            Err(PersistenceError::Unavailable("offline".into()))
        }
        fn set_string(&self, _: &str, _: &str) -> Result<(), PersistenceError> {
            Err(PersistenceError::Unavailable("offline".into()))
        }
        fn get_string_set(
            &self,
            _: &str,
            _: &BTreeSet<String>,
        ) -> Result<BTreeSet<String>, PersistenceError> {
            Err(PersistenceError::Unavailable("offline".into()))
        }
        fn set_string_set(&self, _: &str, _: &BTreeSet<String>) -> Result<(), PersistenceError> {
            Err(PersistenceError::Unavailable("offline".into()))
        }
        fn flush(&self) -> Result<(), PersistenceError> {
            Err(PersistenceError::Unavailable("offline".into()))
        }
    }

    #[tokio::test(start_paused = true)]
    async fn test_start_then_tap_target_center() {
        let (_, engine) = engine();
        engine.start().await;
        assert_eq!(engine.active_task_count().await, 3);

        let before = engine.state().playing().unwrap().target;
        let outcome = engine.on_tap(target_center(&engine), VIEW).await;
        assert_eq!(outcome, TapOutcome::Target { combo: 1, points: 1 });

        let state = engine.state();
        let playing = state.playing().unwrap();
        assert_eq!(playing.score, 1);
        assert_eq!(playing.combo.count, 1);
        assert_ne!(playing.target, before);
    }

    #[tokio::test(start_paused = true)]
    async fn test_tap_ignored_when_ready() {
        let (_, engine) = engine();
        let outcome = engine.on_tap(Point::new(500.0, 500.0), VIEW).await;
        assert_eq!(outcome, TapOutcome::Ignored);
        assert_eq!(engine.state(), GameState::Ready);
    }

    #[tokio::test(start_paused = true)]
    async fn test_reset_twice() {
        let (_, engine) = engine();
        engine.start().await;

        engine.reset().await;
        assert_eq!(engine.state(), GameState::Ready);
        assert_eq!(engine.active_task_count().await, 0);

        engine.reset().await;
        assert_eq!(engine.state(), GameState::Ready);
        assert_eq!(engine.active_task_count().await, 0);
    }

    #[tokio::test(start_paused = true)]
    async fn test_restart_cancels_old_clock() {
        let (_, engine) = engine();
        engine.start().await;
        tokio::time::sleep(Duration::from_millis(550)).await;
        engine.start().await;
        assert_eq!(engine.active_task_count().await, 3);
        assert_eq!(time_left(&engine), 30.0);

        // A leftover clock would make time run twice as fast
        tokio::time::sleep(Duration::from_millis(1050)).await;
        let left = time_left(&engine);
        assert!((28.95..=29.05).contains(&left), "time_left = {left}");
    }

    #[tokio::test(start_paused = true)]
    async fn test_clock_counts_down() {
        let (_, engine) = engine();
        engine.start().await;
        tokio::time::sleep(Duration::from_millis(2050)).await;
        assert!((time_left(&engine) - 28.0).abs() < 1e-4);
    }

    #[tokio::test(start_paused = true)]
    async fn test_power_up_spawns_after_seven_seconds() {
        let (_, engine) = engine();
        engine.start().await;

        tokio::time::sleep(Duration::from_millis(6950)).await;
        assert!(engine.power_ups().is_empty());

        tokio::time::sleep(Duration::from_millis(100)).await;
        let live = engine.power_ups();
        assert_eq!(live.len(), 1);
        assert_eq!(live[0].radius, 40.0);
    }

    #[tokio::test(start_paused = true)]
    async fn test_session_ends_and_records_progression() {
        let (store, engine) = engine();
        store.set_int(HIGH_SCORE_KEY, 20).unwrap();

        engine.start().await;
        // Twelve quick hits: 1+1+1+1+2+2+2+2+2+3+3+3
        for _ in 0..12 {
            engine.on_tap(target_center(&engine), VIEW).await;
        }
        assert_eq!(engine.state().playing().unwrap().score, 23);

        tokio::time::sleep(Duration::from_secs(31)).await;
        assert_eq!(
            engine.state(),
            GameState::GameOver(GameOverState { final_score: 23, high_score: 23 })
        );
        assert_eq!(store.get_int(HIGH_SCORE_KEY, 0).unwrap(), 23);
        assert_eq!(store.get_int(COIN_KEY, 0).unwrap(), 2);
        assert_eq!(engine.active_task_count().await, 0);
        assert!(engine.power_ups().is_empty());
    }

    #[tokio::test(start_paused = true)]
    async fn test_offline_store_still_reaches_game_over() {
        let engine = engine_with(Arc::new(OfflineStore));
        engine.start().await;
        assert_eq!(engine.chicken().skin_id, "default");

        tokio::time::sleep(Duration::from_secs(31)).await;
        assert_eq!(
            engine.state(),
            GameState::GameOver(GameOverState { final_score: 0, high_score: 0 })
        );
    }

    #[tokio::test(start_paused = true)]
    async fn test_chicken_moves_only_while_playing() {
        let (_, engine) = engine();
        let resting = engine.chicken();
        tokio::time::sleep(Duration::from_millis(500)).await;
        assert_eq!(engine.chicken(), resting);

        engine.start().await;
        tokio::time::sleep(Duration::from_millis(500)).await;
        assert_ne!(engine.chicken().x, resting.x);

        engine.reset().await;
        let parked = engine.chicken();
        tokio::time::sleep(Duration::from_millis(500)).await;
        assert_eq!(engine.chicken(), parked);
    }

    #[tokio::test(start_paused = true)]
    async fn test_chicken_tap_breaks_combo() {
        let (_, engine) = engine();
        engine.start().await;
        engine.on_tap(target_center(&engine), VIEW).await;

        let chicken = engine.chicken();
        let center = VIEW.to_pixels(chicken.x, chicken.y);
        assert!(engine.on_chicken_tap(center, VIEW, 1.0).await);
        assert!(engine.chicken().rage.active);
        assert_eq!(engine.state().playing().unwrap().combo.count, 0);

        let far = Point::new(center.x + 300.0, center.y);
        assert!(!engine.on_chicken_tap(far, VIEW, 1.0).await);
    }

    #[tokio::test(start_paused = true)]
    async fn test_events_are_broadcast() {
        let (_, engine) = engine();
        let mut events = engine.subscribe_events();

        let session_id = engine.start().await;
        let first = events.recv().await.unwrap();
        assert_eq!(first.data, GameEventData::SessionStarted { session_id });

        engine.reset().await;
        let second = events.recv().await.unwrap();
        assert_eq!(second.data, GameEventData::SessionReset);
    }

    #[tokio::test(start_paused = true)]
    async fn test_state_watch_sees_transitions() {
        let (_, engine) = engine();
        let mut rx = engine.subscribe_state();
        assert_eq!(*rx.borrow_and_update(), GameState::Ready);

        engine.start().await;
        rx.changed().await.unwrap();
        assert!(rx.borrow_and_update().is_playing());
    }

    #[tokio::test(start_paused = true)]
    async fn test_skin_applied_on_start() {
        let (store, engine) = engine();
        store.set_string(SELECTED_SKIN_KEY, "ninja").unwrap();
        assert_eq!(engine.chicken().skin_id, "default");

        engine.start().await;
        assert_eq!(engine.chicken().skin_id, "ninja");

        store.set_string(SELECTED_SKIN_KEY, "no-such-skin").unwrap();
        engine.refresh_skin().await;
        assert_eq!(engine.chicken().skin_id, "default");
    }
}
