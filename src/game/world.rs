//! Session World
//!
//! The synchronous heart of the engine. Every mutation of a session goes
//! through one of the methods here, called by the session layer while it
//! holds the world lock. Nothing in this module knows about tasks, channels
//! or wall-clock time: callers pass `now` in, and read state and events out.

use tracing::{debug, trace};
use uuid::Uuid;

use crate::core::geometry::{Point, Viewport};
use crate::core::rng::DeterministicRng;
use crate::game::chicken::ChickenState;
use crate::game::combo::{broken, score_hit, touched};
use crate::game::events::{GameEvent, GameEventData};
use crate::game::powerup::{PowerUp, PowerUpField, PowerUpType};
use crate::game::rules::GameRules;
use crate::game::state::{EffectKind, GameOverState, GameState, Millis, PlayingState};
use crate::game::target::{is_hit, random_target};
use crate::persistence::{Progression, SessionRecord};

/// Result of a clock tick.
#[derive(Clone, Copy, Debug, PartialEq, Eq)]
pub enum ClockStep {
    /// Time remains
    Running,
    /// The clock has run out; the session should finish
    Expired,
    /// No session is in progress
    Inactive,
}

/// What a tap resolved to.
#[derive(Clone, Copy, Debug, PartialEq, Eq)]
pub enum TapOutcome {
    /// No session in progress
    Ignored,
    /// The chicken absorbed the tap
    Chicken,
    /// A power-up was consumed
    PowerUp(PowerUpType),
    /// The target was hit
    Target {
        /// Combo after the hit
        combo: u32,
        /// Points awarded
        points: u32,
    },
    /// Nothing was hit
    Miss,
}

/// All mutable state of the engine.
#[derive(Debug)]
pub struct World {
    rules: GameRules,
    base_seed: u64,
    state: GameState,
    chicken: ChickenState,
    power_ups: PowerUpField,
    rng: DeterministicRng,
    events: Vec<GameEvent>,
}

impl World {
    /// Create a world in the Ready state.
    pub fn new(rules: GameRules, base_seed: u64, skin_id: impl Into<String>) -> Self {
        let chicken = ChickenState::new(&rules.chicken, skin_id);
        Self {
            rules,
            base_seed,
            state: GameState::Ready,
            chicken,
            power_ups: PowerUpField::new(),
            rng: DeterministicRng::new(base_seed),
            events: Vec::new(),
        }
    }

    /// Gameplay rules in force.
    pub fn rules(&self) -> &GameRules {
        &self.rules
    }

    /// Current session state.
    pub fn state(&self) -> &GameState {
        &self.state
    }

    /// Current chicken.
    pub fn chicken(&self) -> &ChickenState {
        &self.chicken
    }

    /// Live power-ups (zero or one).
    pub fn power_up_snapshot(&self) -> Vec<PowerUp> {
        self.power_ups.snapshot()
    }

    /// Drain events produced since the last call.
    pub fn take_events(&mut self) -> Vec<GameEvent> {
        std::mem::take(&mut self.events)
    }

    /// Change the chicken's skin.
    pub fn set_skin(&mut self, skin_id: impl Into<String>) {
        self.chicken.skin_id = skin_id.into();
    }

    // =========================================================================
    // LIFECYCLE
    // =========================================================================

    /// Begin a new session, discarding whatever was in progress.
    pub fn start(&mut self, now: Millis, session_id: Uuid) {
        self.rng = DeterministicRng::for_session(self.base_seed, session_id.as_bytes());
        self.power_ups.clear();

        let target = random_target(&mut self.rng, &self.rules.target);
        self.state = GameState::Playing(PlayingState::new(
            self.rules.clock.session_seconds,
            target,
            now,
        ));
        self.events
            .push(GameEvent::new(now, GameEventData::SessionStarted { session_id }));
    }

    /// Abandon any session and return to Ready.
    pub fn reset(&mut self, now: Millis) {
        self.power_ups.clear();
        self.state = GameState::Ready;
        self.events.push(GameEvent::new(now, GameEventData::SessionReset));
    }

    /// Close the session: record progression and move to GameOver.
    ///
    /// Returns `None` if no session was in progress.
    pub fn finish(&mut self, now: Millis, progression: &Progression) -> Option<SessionRecord> {
        let final_score = self.state.playing()?.score;
        let record = progression.record_session(final_score);

        self.power_ups.clear();
        self.state = GameState::GameOver(GameOverState {
            final_score,
            high_score: record.high_score,
        });
        self.events.push(GameEvent::session_ended(
            now,
            final_score,
            record.high_score,
            record.coins_earned,
        ));
        Some(record)
    }

    // =========================================================================
    // TICKS
    // =========================================================================

    /// Advance the countdown by one clock period.
    pub fn clock_tick(&mut self) -> ClockStep {
        let tick_ms = self.rules.clock.tick_ms;
        let Some(playing) = self.state.playing_mut() else {
            return ClockStep::Inactive;
        };

        // Whole milliseconds, so repeated decrements never drift
        let mut remaining_ms = (playing.time_left.max(0.0) * 1000.0).round() as u64;
        if !playing.effects.is_active(EffectKind::TimeFreeze) {
            remaining_ms = remaining_ms.saturating_sub(tick_ms);
            playing.time_left = remaining_ms as f32 / 1000.0;
        }
        trace!(remaining_ms, "Clock tick");

        if remaining_ms <= tick_ms {
            ClockStep::Expired
        } else {
            ClockStep::Running
        }
    }

    /// Advance the chicken by one movement period.
    ///
    /// Rage is checked every tick; motion is skipped while ChickenStop holds.
    pub fn chicken_tick(&mut self, now: Millis) {
        if self.chicken.calm_if_expired(now) {
            debug!("Chicken calmed down");
            self.events.push(GameEvent::new(now, GameEventData::ChickenCalmed));
        }

        let stopped = self
            .state
            .playing()
            .is_some_and(|p| p.effects.is_active(EffectKind::ChickenStop));
        if !stopped {
            self.chicken.step(&mut self.rng, &self.rules.chicken);
        }
    }

    /// Run one power-up manager period: spawn, expire effects, expire the
    /// live power-up, in that order.
    pub fn power_up_tick(&mut self, now: Millis) {
        let Some(playing) = self.state.playing_mut() else {
            return;
        };

        if let Some(spawned) = self.power_ups.spawn_if_empty(&mut self.rng, &self.rules.power_up, now) {
            debug!(id = spawned.id, kind = ?spawned.power_up_type, "Power-up spawned");
            self.events
                .push(GameEvent::power_up_spawned(now, spawned.id, spawned.power_up_type));
        }

        for effect in playing.effects.expire(now) {
            debug!(?effect, "Effect expired");
            self.events
                .push(GameEvent::new(now, GameEventData::EffectExpired { effect }));
        }

        if let Some(gone) = self.power_ups.expire(now, self.rules.power_up.display_ms) {
            debug!(id = gone.id, "Power-up expired unconsumed");
            self.events
                .push(GameEvent::new(now, GameEventData::PowerUpExpired { id: gone.id }));
        }
    }

    // =========================================================================
    // INPUT
    // =========================================================================

    /// Resolve a tap against the chicken, then power-ups and the target.
    pub fn tap(&mut self, point: Point, viewport: Viewport, density: f32, now: Millis) -> TapOutcome {
        if self.chicken_tap(point, viewport, density, now) {
            return TapOutcome::Chicken;
        }
        self.on_tap(point, viewport, now)
    }

    /// Resolve a tap against the live power-up, then the target.
    pub fn on_tap(&mut self, point: Point, viewport: Viewport, now: Millis) -> TapOutcome {
        if !self.state.is_playing() {
            return TapOutcome::Ignored;
        }

        if let Some(power_up) = self.power_ups.take_hit(point, viewport, self.rules.power_up.hit_slop) {
            self.apply_power_up(&power_up, now);
            return TapOutcome::PowerUp(power_up.power_up_type);
        }

        let Self { rules, state, rng, events, .. } = self;
        let Some(playing) = state.playing_mut() else {
            return TapOutcome::Ignored;
        };

        if is_hit(&playing.target, point, viewport, &rules.target) {
            let multiplier = playing.effects.is_active(EffectKind::ScoreMultiplier);
            let hit = score_hit(playing.combo, now, rules.target.combo_window_ms, multiplier);
            playing.combo = hit.combo;
            playing.score = playing.score.saturating_add(hit.points);
            playing.target = random_target(rng, &rules.target);

            trace!(combo = hit.combo.count, points = hit.points, score = playing.score, "Target hit");
            events.push(GameEvent::target_hit(now, hit.combo.count, hit.points, playing.score));
            return TapOutcome::Target {
                combo: hit.combo.count,
                points: hit.points,
            };
        }

        playing.combo = broken(playing.combo);
        events.push(GameEvent::new(now, GameEventData::TapMissed));
        TapOutcome::Miss
    }

    /// Resolve a tap against the chicken.
    ///
    /// Returns true if the chicken absorbed the tap.
    pub fn chicken_tap(&mut self, point: Point, viewport: Viewport, density: f32, now: Millis) -> bool {
        if !self.chicken.is_hit(point, viewport, density) {
            return false;
        }

        if self.chicken.enrage(now, &self.rules.chicken) {
            debug!(until = self.chicken.rage.end_at, "Chicken enraged");
            self.events.push(GameEvent::new(now, GameEventData::ChickenEnraged));
        }
        if let Some(playing) = self.state.playing_mut() {
            playing.combo = broken(playing.combo);
        }
        true
    }

    /// Apply a consumed power-up to the running session.
    pub fn apply_power_up(&mut self, power_up: &PowerUp, now: Millis) {
        let Some(playing) = self.state.playing_mut() else {
            return;
        };

        match power_up.power_up_type.timed_effect(&self.rules.power_up) {
            Some((effect, duration)) => {
                playing.effects.activate(effect, now.saturating_add(duration));
            }
            None => {
                playing.target = random_target(&mut self.rng, &self.rules.target);
            }
        }
        playing.combo = touched(playing.combo, now);

        debug!(id = power_up.id, kind = ?power_up.power_up_type, "Power-up consumed");
        self.events.push(GameEvent::power_up_consumed(
            now,
            power_up.id,
            power_up.power_up_type,
        ));
    }
}

// =============================================================================
// TESTS
// =============================================================================

#[cfg(test)]
mod tests {
    use super::*;
    use crate::game::state::Target;
    use crate::persistence::{MemoryStore, PersistenceGateway, HIGH_SCORE_KEY, COIN_KEY};
    use std::sync::Arc;

    const VIEW: Viewport = Viewport::new(1000.0, 1000.0);

    fn playing_world() -> World {
        let mut world = World::new(GameRules::default(), 42, "default");
        world.start(0, Uuid::from_u128(1));
        world
    }

    fn playing(world: &World) -> &PlayingState {
        world.state().playing().unwrap()
    }

    fn target_center(world: &World) -> Point {
        let t = playing(world).target;
        VIEW.to_pixels(t.x, t.y)
    }

    fn power_up(power_up_type: PowerUpType) -> PowerUp {
        PowerUp {
            id: 99,
            x: 0.1,
            y: 0.1,
            radius: 40.0,
            power_up_type,
            spawned_at: 0,
        }
    }

    #[test]
    fn test_start_state() {
        let mut world = playing_world();
        let p = playing(&world);
        assert_eq!(p.score, 0);
        assert_eq!(p.time_left, 30.0);
        assert_eq!(p.combo.count, 0);
        assert!(p.target.radius >= 30.0 && p.target.radius <= 70.0);
        assert!(world.power_up_snapshot().is_empty());

        let events = world.take_events();
        assert!(matches!(events[0].data, GameEventData::SessionStarted { .. }));
    }

    #[test]
    fn test_tap_target_center() {
        let mut world = playing_world();
        let before = playing(&world).target;

        let outcome = world.on_tap(target_center(&world), VIEW, 200);
        assert_eq!(outcome, TapOutcome::Target { combo: 1, points: 1 });

        let p = playing(&world);
        assert_eq!(p.score, 1);
        assert_eq!(p.combo.count, 1);
        assert_eq!(p.combo.last_tap_at, 200);
        assert_ne!(p.target, before);
    }

    #[test]
    fn test_combo_window() {
        let mut world = playing_world();

        world.on_tap(target_center(&world), VIEW, 1000);
        world.on_tap(target_center(&world), VIEW, 2500);
        assert_eq!(playing(&world).combo.count, 2);

        world.on_tap(target_center(&world), VIEW, 4001);
        assert_eq!(playing(&world).combo.count, 1);
    }

    #[test]
    fn test_combo_bonus_points() {
        let mut world = playing_world();
        for i in 1..=5u64 {
            world.on_tap(target_center(&world), VIEW, i * 100);
        }
        // 1 + 1 + 1 + 1 + 2
        assert_eq!(playing(&world).score, 6);
    }

    #[test]
    fn test_miss_breaks_combo() {
        let mut world = playing_world();
        world.on_tap(target_center(&world), VIEW, 100);
        world.on_tap(target_center(&world), VIEW, 200);

        let t = playing(&world).target;
        let center = VIEW.to_pixels(t.x, t.y);
        let dx = if t.x > 0.5 { -200.0 } else { 200.0 };
        let before = playing(&world).clone();

        let outcome = world.on_tap(Point::new(center.x + dx, center.y), VIEW, 300);
        assert_eq!(outcome, TapOutcome::Miss);

        let p = playing(&world);
        assert_eq!(p.score, before.score);
        assert_eq!(p.target, before.target);
        assert_eq!(p.combo.count, 0);
    }

    #[test]
    fn test_tap_ignored_when_not_playing() {
        let mut world = World::new(GameRules::default(), 1, "default");
        let outcome = world.on_tap(Point::new(500.0, 500.0), VIEW, 0);
        assert_eq!(outcome, TapOutcome::Ignored);
        assert_eq!(world.state(), &GameState::Ready);
    }

    #[test]
    fn test_power_up_has_priority_over_target() {
        let mut world = playing_world();
        world.power_up_tick(7000);
        let live = world.power_up_snapshot().pop().unwrap();

        // Put the target under the power-up
        world.state.playing_mut().unwrap().target = Target::new(live.x, live.y, 50.0);
        world.state.playing_mut().unwrap().combo.count = 3;

        let outcome = world.on_tap(VIEW.to_pixels(live.x, live.y), VIEW, 7100);
        assert_eq!(outcome, TapOutcome::PowerUp(live.power_up_type));

        let p = playing(&world);
        assert_eq!(p.score, 0);
        assert_eq!(p.combo.count, 3);
        assert_eq!(p.combo.last_tap_at, 7100);
        assert!(world.power_up_snapshot().is_empty());
    }

    #[test]
    fn test_score_multiplier_doubles_points() {
        let mut world = playing_world();
        world.apply_power_up(&power_up(PowerUpType::ScoreMultiplier), 0);

        world.on_tap(target_center(&world), VIEW, 100);
        assert_eq!(playing(&world).score, 2);
    }

    #[test]
    fn test_time_freeze_holds_clock() {
        let mut world = playing_world();
        world.clock_tick();
        assert!((playing(&world).time_left - 29.9).abs() < 1e-4);

        world.apply_power_up(&power_up(PowerUpType::TimeFreeze), 100);
        for _ in 0..10 {
            assert_eq!(world.clock_tick(), ClockStep::Running);
        }
        assert!((playing(&world).time_left - 29.9).abs() < 1e-4);
    }

    #[test]
    fn test_target_refresh_moves_target() {
        let mut world = playing_world();
        let before = playing(&world).target;
        world.apply_power_up(&power_up(PowerUpType::TargetRefresh), 10);

        let p = playing(&world);
        assert_ne!(p.target, before);
        assert_eq!(p.effects, Default::default());
    }

    #[test]
    fn test_effects_expire_on_power_up_tick() {
        let mut world = playing_world();
        world.apply_power_up(&power_up(PowerUpType::ChickenStop), 0);
        assert!(playing(&world).effects.is_active(EffectKind::ChickenStop));

        world.power_up_tick(3000);
        assert!(playing(&world).effects.is_active(EffectKind::ChickenStop));

        world.power_up_tick(7000);
        assert!(!playing(&world).effects.is_active(EffectKind::ChickenStop));
    }

    #[test]
    fn test_clock_expires_after_299_ticks() {
        let mut world = playing_world();
        let mut ticks = 0;
        loop {
            ticks += 1;
            match world.clock_tick() {
                ClockStep::Running => continue,
                ClockStep::Expired => break,
                ClockStep::Inactive => panic!("session ended early"),
            }
        }
        assert_eq!(ticks, 299);
        assert!((playing(&world).time_left - 0.1).abs() < 1e-6);
    }

    #[test]
    fn test_finish_records_progression() {
        let store = Arc::new(MemoryStore::new());
        store.set_int(HIGH_SCORE_KEY, 20).unwrap();
        let progression = Progression::new(store.clone());

        let mut world = playing_world();
        world.state.playing_mut().unwrap().score = 37;

        let record = world.finish(30_000, &progression).unwrap();
        assert_eq!(record.coins_earned, 3);
        assert_eq!(
            world.state(),
            &GameState::GameOver(GameOverState { final_score: 37, high_score: 37 })
        );
        assert_eq!(store.get_int(HIGH_SCORE_KEY, 0).unwrap(), 37);
        assert_eq!(store.get_int(COIN_KEY, 0).unwrap(), 3);

        // Not playing any more
        assert!(world.finish(30_100, &progression).is_none());
        assert_eq!(world.clock_tick(), ClockStep::Inactive);
    }

    #[test]
    fn test_chicken_tap_enrages_and_breaks_combo() {
        let mut world = playing_world();
        world.state.playing_mut().unwrap().combo.count = 4;

        let center = VIEW.to_pixels(world.chicken().x, world.chicken().y);
        let outcome = world.tap(center, VIEW, 1.0, 500);
        assert_eq!(outcome, TapOutcome::Chicken);
        assert!(world.chicken().rage.active);
        assert_eq!(playing(&world).combo.count, 0);
        assert_eq!(playing(&world).score, 0);
    }

    #[test]
    fn test_chicken_stop_freezes_motion() {
        let mut world = playing_world();
        world.apply_power_up(&power_up(PowerUpType::ChickenStop), 0);
        let before = (world.chicken().x, world.chicken().y);

        for i in 0..20 {
            world.chicken_tick(i * 16);
        }
        assert_eq!((world.chicken().x, world.chicken().y), before);
    }

    #[test]
    fn test_at_most_one_power_up() {
        let mut world = playing_world();
        let mut spawned = 0;
        for i in 1..=20u64 {
            world.power_up_tick(i * 7000);
            assert!(world.power_up_snapshot().len() <= 1);
            spawned += world
                .take_events()
                .iter()
                .filter(|e| matches!(e.data, GameEventData::PowerUpSpawned { .. }))
                .count();
        }
        assert!(spawned > 0);
    }

    #[test]
    fn test_power_up_types_deal_before_repeating() {
        let mut world = playing_world();
        let mut kinds = Vec::new();
        // Each unconsumed power-up expires on the following tick
        for i in 1..=16u64 {
            world.power_up_tick(i * 7000);
            for event in world.take_events() {
                if let GameEventData::PowerUpSpawned { power_up_type, .. } = event.data {
                    kinds.push(power_up_type);
                }
            }
        }
        assert_eq!(kinds.len(), 8);

        for deal in kinds.chunks(4) {
            for kind in PowerUpType::ALL {
                assert!(deal.contains(&kind), "{kind:?} missing from {deal:?}");
            }
        }
    }

    #[test]
    fn test_consumed_power_ups_still_deal_every_type() {
        let mut world = playing_world();
        let mut kinds = Vec::new();
        for i in 1..=4u64 {
            let now = i * 7000;
            world.power_up_tick(now);
            let live = world.power_up_snapshot().remove(0);
            let at = VIEW.to_pixels(live.x, live.y);
            assert_eq!(world.on_tap(at, VIEW, now + 10), TapOutcome::PowerUp(live.power_up_type));
            kinds.push(live.power_up_type);
        }

        for kind in PowerUpType::ALL {
            assert!(kinds.contains(&kind), "{kind:?} missing from {kinds:?}");
        }
    }

    #[test]
    fn test_reset_clears_session() {
        let mut world = playing_world();
        world.power_up_tick(7000);
        world.reset(7100);
        assert_eq!(world.state(), &GameState::Ready);
        assert!(world.power_up_snapshot().is_empty());

        // Manager does nothing outside a session
        world.power_up_tick(14_000);
        assert!(world.power_up_snapshot().is_empty());
    }
}
