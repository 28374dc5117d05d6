//! Headless side-scroller simulation
//!
//! Runs one map at a fixed timestep:
//! - terrain from a JSON layout or the built-in demo map
//! - a scripted walker standing in for keyboard input
//! - outbound records logged as JSON, as a server connection would receive them

use std::time::Duration;

use anyhow::Context;
use tokio::sync::{broadcast, mpsc};
use tracing::{debug, info, warn};
use tracing_subscriber::{layer::SubscriberExt, util::SubscriberInitExt};

use sidescroll_sim::config::SimConfig;
use sidescroll_sim::game::{
    CharStats, KeyAction, KeyInput, MobCatalog, Player, Session, SessionHandle, SessionInput, World,
};
use sidescroll_sim::net::{ChannelDispatcher, InboundEvent, OutboundRecord};
use sidescroll_sim::terrain::MapLayout;
use sidescroll_sim::util::random::Randomizer;
use sidescroll_sim::util::time::SimContext;

#[tokio::main]
async fn main() -> anyhow::Result<()> {
    // Load environment variables
    dotenvy::dotenv().ok();

    // Load configuration
    let config = SimConfig::from_env()?;

    // Initialize tracing
    init_tracing(&config.log_level);

    info!("Starting sidescroll simulation");
    info!(timestep_ms = config.timestep_ms, seed = config.seed, "Simulation settings");

    let (layout, demo) = match &config.terrain_path {
        Some(path) => {
            let source = tokio::fs::read_to_string(path)
                .await
                .with_context(|| format!("reading terrain from {}", path.display()))?;
            (MapLayout::from_json(&source)?, false)
        }
        None => (MapLayout::demo(), true),
    };

    let mut world = World::new(
        &layout,
        MobCatalog::demo(),
        Player::new(1, CharStats::default()),
        Box::new(Randomizer::new(config.seed)),
    );

    let tree = world.physics().tree();
    info!(footholds = tree.len(), ladders = layout.ladders.len(), "Terrain loaded");
    let walls = tree.walls();
    let spawn_x = (walls.low + walls.high) as f64 / 2.0;
    let spawn_y = tree.borders().low as f64;
    world.spawn_player(spawn_x, spawn_y);

    if demo {
        for event in demo_spawns() {
            world.push_event(event);
        }
    }

    // Outbound records go to a sink task standing in for the server
    let (record_tx, record_rx) = mpsc::channel(config.outbound_capacity);
    tokio::spawn(record_sink(record_rx));

    let (session, handle) = Session::new(
        world,
        SimContext::new(config.timestep_ms),
        ChannelDispatcher::new(record_tx),
        config.snapshot_interval,
        config.max_ticks,
    );

    tokio::spawn(snapshot_log(handle.snapshot_tx.subscribe()));
    tokio::spawn(scripted_walker(handle.clone()));

    tokio::select! {
        world = session.run() => {
            info!(ticks = world.tick(), hp = world.player().stats.hp, "Simulation finished");
        }
        _ = shutdown_signal() => {}
    }

    // Keep the handle alive until the session has stopped
    drop(handle);

    info!("Shutdown complete");
    Ok(())
}

/// Initialize tracing/logging
fn init_tracing(log_level: &str) {
    let env_filter = tracing_subscriber::EnvFilter::try_from_default_env()
        .unwrap_or_else(|_| tracing_subscriber::EnvFilter::new(log_level));

    tracing_subscriber::registry()
        .with(env_filter)
        .with(tracing_subscriber::fmt::layer().with_target(true))
        .init();
}

fn demo_spawns() -> Vec<InboundEvent> {
    vec![
        InboundEvent::SpawnMob {
            oid: 1000,
            mob_id: 100100,
            x: 900,
            y: 400,
            fh: 3,
            stance: 4,
            control: true,
            new_spawn: true,
        },
        InboundEvent::SpawnMob {
            oid: 1001,
            mob_id: 2300100,
            x: 300,
            y: 250,
            fh: 0,
            stance: 2,
            control: true,
            new_spawn: false,
        },
        InboundEvent::SpawnDrop {
            oid: 2000,
            item_id: 4000019,
            meso: false,
            owner: 0,
            start_x: 900,
            start_y: 400,
            dest_x: 940,
            dest_y: 400,
            mode: 0,
            player_drop: false,
        },
        InboundEvent::SpawnPet {
            slot: 0,
            item_id: 5000007,
            name: "Puppy".to_string(),
        },
    ]
}

/// Walk right, jump, attack, then walk back
async fn scripted_walker(handle: SessionHandle) {
    let steps = [
        (KeyInput::press(KeyAction::Right), 1500),
        (KeyInput::press(KeyAction::Jump), 50),
        (KeyInput::release(KeyAction::Jump), 600),
        (KeyInput::release(KeyAction::Right), 200),
        (KeyInput::press(KeyAction::Return), 50),
        (KeyInput::release(KeyAction::Return), 800),
        (KeyInput::press(KeyAction::Left), 1500),
        (KeyInput::release(KeyAction::Left), 0),
    ];

    for (input, pause_ms) in steps {
        if handle.input_tx.send(SessionInput::Key(input)).await.is_err() {
            return;
        }
        tokio::time::sleep(Duration::from_millis(pause_ms)).await;
    }
    debug!("Scripted input finished");
}

async fn record_sink(mut rx: mpsc::Receiver<OutboundRecord>) {
    while let Some(record) = rx.recv().await {
        match serde_json::to_string(&record) {
            Ok(json) => info!(kind = record.kind(), %json, "Outbound record"),
            Err(e) => warn!(kind = record.kind(), error = %e, "Failed to encode record"),
        }
    }
}

async fn snapshot_log(mut rx: broadcast::Receiver<sidescroll_sim::game::FrameSnapshot>) {
    loop {
        match rx.recv().await {
            Ok(frame) => debug!(
                tick = frame.tick,
                x = frame.player.x,
                y = frame.player.y,
                state = ?frame.player.state,
                mobs = frame.mobs.len(),
                drops = frame.drops.len(),
                "Frame"
            ),
            Err(broadcast::error::RecvError::Lagged(skipped)) => {
                debug!(skipped, "Snapshot log lagging");
            }
            Err(broadcast::error::RecvError::Closed) => break,
        }
    }
}

/// Graceful shutdown signal handler
async fn shutdown_signal() {
    let ctrl_c = async {
        if let Err(e) = tokio::signal::ctrl_c().await {
            warn!(error = %e, "Failed to install Ctrl+C handler");
            std::future::pending::<()>().await;
        }
    };

    #[cfg(unix)]
    let terminate = async {
        match tokio::signal::unix::signal(tokio::signal::unix::SignalKind::terminate()) {
            Ok(mut signal) => {
                signal.recv().await;
            }
            Err(e) => {
                warn!(error = %e, "Failed to install signal handler");
                std::future::pending::<()>().await;
            }
        }
    };

    #[cfg(not(unix))]
    let terminate = std::future::pending::<()>();

    tokio::select! {
        _ = ctrl_c => {
            info!("Received Ctrl+C, starting graceful shutdown");
        }
        _ = terminate => {
            info!("Received terminate signal, starting graceful shutdown");
        }
    }
}
