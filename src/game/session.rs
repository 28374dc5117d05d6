//! Fixed-rate driver for a world

use std::time::Duration;

use tokio::sync::{broadcast, mpsc};
use tokio::sync::mpsc::error::TryRecvError;
use tokio::time::interval;
use tracing::{debug, info};

use crate::game::input::KeyInput;
use crate::game::snapshot::{FrameSnapshot, SnapshotBuilder};
use crate::game::world::World;
use crate::net::{ChannelDispatcher, InboundEvent};
use crate::util::time::SimContext;

/// Input accepted by a running session
#[derive(Debug, Clone)]
pub enum SessionInput {
    Key(KeyInput),
    Event(InboundEvent),
    Pause(bool),
}

/// Handle to a running session
#[derive(Clone)]
pub struct SessionHandle {
    pub input_tx: mpsc::Sender<SessionInput>,
    pub snapshot_tx: broadcast::Sender<FrameSnapshot>,
}

/// Owns a world and ticks it from a tokio interval
pub struct Session {
    world: World,
    ctx: SimContext,
    input_rx: mpsc::Receiver<SessionInput>,
    snapshot_tx: broadcast::Sender<FrameSnapshot>,
    snapshot_builder: SnapshotBuilder,
    dispatcher: ChannelDispatcher,
    max_ticks: Option<u64>,
}

impl Session {
    pub fn new(
        world: World,
        ctx: SimContext,
        dispatcher: ChannelDispatcher,
        snapshot_interval: u32,
        max_ticks: Option<u64>,
    ) -> (Self, SessionHandle) {
        let (input_tx, input_rx) = mpsc::channel(256);
        let (snapshot_tx, _) = broadcast::channel(64);

        let handle = SessionHandle {
            input_tx,
            snapshot_tx: snapshot_tx.clone(),
        };

        let session = Self {
            world,
            ctx,
            input_rx,
            snapshot_tx,
            snapshot_builder: SnapshotBuilder::new(snapshot_interval),
            dispatcher,
            max_ticks,
        };

        (session, handle)
    }

    /// Run the tick loop until the tick limit or until every handle is gone
    pub async fn run(mut self) -> World {
        info!(timestep_ms = self.ctx.timestep_ms, "Session started");

        let tick_duration = Duration::from_millis(self.ctx.timestep_ms.max(1) as u64);
        let mut tick_interval = interval(tick_duration);
        tick_interval.set_missed_tick_behavior(tokio::time::MissedTickBehavior::Skip);

        loop {
            tick_interval.tick().await;

            // Drain input queue
            if !self.process_inputs() {
                info!("All session handles dropped, stopping");
                break;
            }

            self.world.update(&self.ctx, &mut self.dispatcher);

            if self.snapshot_builder.should_send() {
                let snapshot = self.world.snapshot(&self.snapshot_builder, 1.0);
                // No subscribers is fine
                let _ = self.snapshot_tx.send(snapshot);
            }

            if self.max_ticks.is_some_and(|max| self.world.tick() >= max) {
                info!(ticks = self.world.tick(), "Tick limit reached");
                break;
            }
        }

        self.world
    }

    /// Hand pending input to the world; false once the channel is closed
    fn process_inputs(&mut self) -> bool {
        loop {
            match self.input_rx.try_recv() {
                Ok(SessionInput::Key(input)) => self.world.push_key(input),
                Ok(SessionInput::Event(event)) => self.world.push_event(event),
                Ok(SessionInput::Pause(paused)) => {
                    debug!(paused, "Pause toggled");
                    self.ctx.set_paused(paused);
                    if !paused {
                        self.snapshot_builder.force_next();
                    }
                }
                Err(TryRecvError::Empty) => return true,
                Err(TryRecvError::Disconnected) => return false,
            }
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::game::input::KeyAction;
    use crate::game::mob::MobCatalog;
    use crate::game::player::Player;
    use crate::game::stats::CharStats;
    use crate::net::OutboundRecord;
    use crate::terrain::MapLayout;
    use crate::util::random::Randomizer;

    fn session(max_ticks: Option<u64>) -> (Session, SessionHandle, mpsc::Receiver<OutboundRecord>) {
        let mut world = World::new(
            &MapLayout::demo(),
            MobCatalog::demo(),
            Player::new(1, CharStats::default()),
            Box::new(Randomizer::new(7)),
        );
        world.spawn_player(600.0, 400.0);

        let (tx, rx) = mpsc::channel(1024);
        let (session, handle) = Session::new(
            world,
            SimContext::new(1),
            ChannelDispatcher::new(tx),
            5,
            max_ticks,
        );
        (session, handle, rx)
    }

    #[tokio::test]
    async fn test_runs_to_tick_limit() {
        let (session, handle, mut rx) = session(Some(20));
        let mut snapshots = handle.snapshot_tx.subscribe();

        handle
            .input_tx
            .send(SessionInput::Key(KeyInput::press(KeyAction::Right)))
            .await
            .unwrap();

        let world = session.run().await;
        assert_eq!(world.tick(), 20);
        assert!(world.player().position().0 > 600);

        let snapshot = snapshots.recv().await.unwrap();
        assert_eq!(snapshot.tick, 5);

        let mut moved = 0;
        while let Ok(record) = rx.try_recv() {
            if matches!(record, OutboundRecord::PlayerMoved { .. }) {
                moved += 1;
            }
        }
        assert!(moved > 0);
    }

    #[test]
    fn test_stops_when_handles_dropped() {
        let (session, handle, _rx) = session(None);
        drop(handle);

        let world = tokio_test::block_on(session.run());
        assert_eq!(world.tick(), 0);
    }

    #[tokio::test]
    async fn test_pause_halts_ticks() {
        let (session, handle, _rx) = session(Some(3));
        handle.input_tx.send(SessionInput::Pause(true)).await.unwrap();

        let runner = tokio::spawn(session.run());
        tokio::time::sleep(Duration::from_millis(20)).await;
        handle.input_tx.send(SessionInput::Pause(false)).await.unwrap();

        let world = runner.await.unwrap();
        assert_eq!(world.tick(), 3);
    }
}
