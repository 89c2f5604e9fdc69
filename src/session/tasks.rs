//! Scheduled session tasks.
//!
//! Three loops per session generation: the clock, the chicken and the
//! power-up manager. Each waits for its next tick or for cancellation,
//! then takes the world lock for one synchronous step.

use std::sync::Arc;
use std::time::Duration;

use tokio::time::{interval_at, Instant, Interval, MissedTickBehavior};
use tokio_util::sync::CancellationToken;
use tracing::{debug, info};

use crate::game::world::ClockStep;
use crate::session::engine::{Inner, SessionTasks};

/// Spawn the tasks of one session generation.
pub(crate) fn spawn(inner: &Arc<Inner>, generation: u64) -> SessionTasks {
    let cancel = CancellationToken::new();
    let handles = vec![
        tokio::spawn(run_clock(inner.clone(), generation, cancel.clone())),
        tokio::spawn(run_chicken(inner.clone(), generation, cancel.clone())),
        tokio::spawn(run_power_ups(inner.clone(), generation, cancel.clone())),
    ];
    debug!(generation, "Session tasks spawned");
    SessionTasks { cancel, handles }
}

/// Interval whose first tick is one full period away.
fn ticker(period_ms: u64, behavior: MissedTickBehavior) -> Interval {
    let period = Duration::from_millis(period_ms);
    let mut ticker = interval_at(Instant::now() + period, period);
    ticker.set_missed_tick_behavior(behavior);
    ticker
}

/// Wait for the next tick. Returns false once cancelled.
async fn next_tick(ticker: &mut Interval, cancel: &CancellationToken) -> bool {
    tokio::select! {
        biased;
        _ = cancel.cancelled() => false,
        _ = ticker.tick() => true,
    }
}

async fn run_clock(inner: Arc<Inner>, generation: u64, cancel: CancellationToken) {
    let mut ticker = ticker(inner.rules.clock.tick_ms, MissedTickBehavior::Delay);

    while next_tick(&mut ticker, &cancel).await {
        let mut shared = inner.shared.lock().await;
        if shared.generation != generation {
            break;
        }

        match shared.world.clock_tick() {
            ClockStep::Running => inner.publish_state(&shared),
            ClockStep::Inactive => break,
            ClockStep::Expired => {
                let record = shared.world.finish(inner.now_ms(), &inner.progression);
                inner.publish(&mut shared);
                cancel.cancel();
                drop(shared);

                if let Some(record) = record {
                    info!(
                        final_score = record.final_score,
                        high_score = record.high_score,
                        coins_earned = record.coins_earned,
                        new_record = record.new_record,
                        "Session ended"
                    );
                }
                inner.flush_in_background();
                break;
            }
        }
    }
}

async fn run_chicken(inner: Arc<Inner>, generation: u64, cancel: CancellationToken) {
    let mut ticker = ticker(inner.rules.chicken.tick_ms, MissedTickBehavior::Skip);

    while next_tick(&mut ticker, &cancel).await {
        let mut shared = inner.shared.lock().await;
        if shared.generation != generation || !shared.world.state().is_playing() {
            break;
        }

        shared.world.chicken_tick(inner.now_ms());
        #[cfg(feature = "debug-tracing")]
        {
            let chicken = shared.world.chicken();
            tracing::trace!(x = chicken.x, y = chicken.y, rotation = chicken.rotation, "Chicken tick");
        }
        inner.publish_chicken(&shared);
        inner.publish_events(&mut shared);
    }
}

async fn run_power_ups(inner: Arc<Inner>, generation: u64, cancel: CancellationToken) {
    let mut ticker = ticker(inner.rules.power_up.tick_ms, MissedTickBehavior::Delay);

    while next_tick(&mut ticker, &cancel).await {
        let mut shared = inner.shared.lock().await;
        if shared.generation != generation || !shared.world.state().is_playing() {
            break;
        }

        shared.world.power_up_tick(inner.now_ms());
        inner.publish_state(&shared);
        inner.publish_power_ups(&shared);
        inner.publish_events(&mut shared);
    }
}
