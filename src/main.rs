//! Ironhaven Simulation Host
//!
//! Boots the simulation, drops a hero into a biome and runs a fixed-rate
//! frame loop, logging the state hash at the end.
//!
//! Usage: `ironhaven-sim [content.json] [frames]`

use std::path::PathBuf;
use std::time::Duration;

use tokio::time::{interval, Instant, MissedTickBehavior};
use tracing::{info, warn};
use tracing_subscriber::EnvFilter;

use ironhaven::{
    core::hash::short_hex,
    game::{actor::Category, SimConfig},
    runtime::{ContentSource, Simulation},
    Vec2, TICK_MS, VERSION,
};

const DEFAULT_CONTENT: &str = "data/content.json";
const DEFAULT_FRAMES: u64 = 600;

fn init_tracing() {
    let filter = EnvFilter::try_from_default_env().unwrap_or_else(|_| EnvFilter::new("info"));
    tracing_subscriber::fmt().with_env_filter(filter).with_target(false).compact().init();
}

#[tokio::main(flavor = "current_thread")]
async fn main() -> anyhow::Result<()> {
    init_tracing();

    let mut args = std::env::args().skip(1);
    let content_path = PathBuf::from(args.next().unwrap_or_else(|| DEFAULT_CONTENT.to_string()));
    let frames: u64 = match args.next() {
        Some(arg) => arg.parse()?,
        None => DEFAULT_FRAMES,
    };

    info!("Ironhaven simulation v{}", VERSION);

    let source = if tokio::fs::try_exists(&content_path).await.unwrap_or(false) {
        ContentSource::File(content_path)
    } else {
        warn!("{} not found, using bundled content", content_path.display());
        ContentSource::Bundled
    };

    let config = SimConfig { tick_ms: TICK_MS, ..SimConfig::default() };
    let mut sim = Simulation::new(config, source);
    sim.boot().await?;

    let hero = sim.spawn_hero(Vec2::new(14000.0, 12800.0), 500.0);
    info!("Hero {} spawned", hero);
    sim.enter_biome("grasslands");

    run_frames(&mut sim, frames).await;

    {
        let reg = sim.registry().borrow();
        info!(
            "After {} frames: {} actors ({} enemies, {} bosses)",
            sim.frame(),
            reg.len(),
            reg.all().filter(|a| a.category.is_hostile() && a.category != Category::Boss).count(),
            reg.by_type(Category::Boss).count()
        );
    }
    info!("State hash: {}", short_hex(&sim.state_hash()));
    if sim.bus().failure_count() > 0 {
        warn!("{} listener failures during the run", sim.bus().failure_count());
    }

    sim.shutdown();
    Ok(())
}

/// Drive the simulation from a wall-clock interval until `frames` steps ran.
async fn run_frames(sim: &mut Simulation, frames: u64) {
    let mut ticker = interval(Duration::from_secs_f32(TICK_MS / 1000.0));
    ticker.set_missed_tick_behavior(MissedTickBehavior::Skip);

    let mut last = Instant::now();
    while sim.frame() < frames {
        ticker.tick().await;
        let now = Instant::now();
        let elapsed_ms = now.duration_since(last).as_secs_f32() * 1000.0;
        last = now;

        let steps = sim.advance(elapsed_ms);
        if steps > 0 && sim.frame() % 100 == 0 {
            info!("Frame {} (alpha {:.2})", sim.frame(), sim.clock().alpha());
        }
    }
}
