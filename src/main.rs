//! TapTapTap Demo
//!
//! Plays one scripted session against the engine and prints the result.
//!
//! Usage: `taptaptap [config.json] [save.json]`

use std::sync::Arc;
use std::time::Duration;

use anyhow::Context;
use tracing::info;
use tracing_subscriber::{EnvFilter, FmtSubscriber};

use taptaptap::{
    EngineConfig, GameEngine, GameState, JsonFileStore, Shop, TapOutcome, Viewport, VERSION,
};

const VIEWPORT: Viewport = Viewport::new(1080.0, 1920.0);
const DENSITY: f32 = 2.75;
const TAP_EVERY: Duration = Duration::from_millis(250);

#[tokio::main]
async fn main() -> anyhow::Result<()> {
    let filter = EnvFilter::try_from_default_env().unwrap_or_else(|_| EnvFilter::new("info"));
    let subscriber = FmtSubscriber::builder().with_env_filter(filter).finish();
    tracing::subscriber::set_global_default(subscriber)
        .context("Failed to set tracing subscriber")?;

    info!("TapTapTap engine v{}", VERSION);

    let mut args = std::env::args().skip(1);
    let config = match args.next() {
        Some(path) => EngineConfig::load(&path).with_context(|| format!("loading {path}"))?,
        None => EngineConfig::default(),
    };
    let save_path = args.next().unwrap_or_else(|| "taptaptap-save.json".to_string());

    let store = Arc::new(JsonFileStore::open(&save_path));
    let engine = GameEngine::new(config, store)?;
    let shop = Shop::new(engine.progression().clone());

    info!(
        high_score = engine.progression().high_score(),
        coins = engine.progression().coins(),
        "Progress loaded"
    );

    let mut state_rx = engine.subscribe_state();
    engine.start().await;
    play(&engine).await;

    // Wait for the clock to close the session
    let game_over = state_rx
        .wait_for(|s| matches!(s, GameState::GameOver(_)))
        .await
        .context("engine dropped")?
        .clone();

    if let GameState::GameOver(result) = game_over {
        info!(
            final_score = result.final_score,
            high_score = result.high_score,
            "=== Game Over ==="
        );
    }

    for listing in shop.listings().skins {
        info!(
            skin = listing.skin.id,
            price = listing.skin.price,
            owned = listing.owned,
            selected = listing.selected,
            "Shop"
        );
    }

    // Waits out the engine's own game-over flush if it is still writing
    shop.flush()?;
    Ok(())
}

/// Tap the target until the session is over, poking the chicken and
/// grabbing power-ups along the way.
async fn play(engine: &GameEngine) {
    let mut ticker = tokio::time::interval(TAP_EVERY);
    let mut taps: u32 = 0;

    loop {
        ticker.tick().await;
        let state = engine.state();
        let Some(playing) = state.playing() else {
            break;
        };
        taps += 1;

        let point = if taps % 9 == 0 {
            let chicken = engine.chicken();
            VIEWPORT.to_pixels(chicken.x, chicken.y)
        } else if let Some(power_up) = engine.power_ups().first() {
            VIEWPORT.to_pixels(power_up.x, power_up.y)
        } else {
            VIEWPORT.to_pixels(playing.target.x, playing.target.y)
        };

        match engine.tap(point, VIEWPORT, DENSITY).await {
            TapOutcome::PowerUp(kind) => info!(?kind, "Grabbed power-up"),
            TapOutcome::Chicken => info!("Poked the chicken"),
            TapOutcome::Target { combo, .. } if combo % 5 == 0 => info!(combo, "Combo"),
            _ => {}
        }
    }
}
