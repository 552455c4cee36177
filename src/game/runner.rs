//! The tick loop task and the handle sessions use to reach it

use std::sync::atomic::{AtomicU64, AtomicUsize, Ordering};
use std::sync::Arc;
use std::time::Duration;

use tokio::sync::{broadcast, mpsc, watch};
use tokio::time::interval;
use tracing::{debug, info, warn};

use crate::util::time::{clamp_delta, Timer};
use crate::ws::protocol::ServerMsg;

use super::geometry::{MapDescription, Wall};
use super::snapshot::SnapshotBuilder;
use super::world::World;
use super::Intent;

/// Capacity of the staged intent queue
const INTENT_CAPACITY: usize = 1024;

/// Events buffered per subscriber before it starts lagging
const EVENT_CAPACITY: usize = 256;

/// Cheap, cloneable access to the running world
#[derive(Clone)]
pub struct WorldHandle {
    pub intent_tx: mpsc::Sender<Intent>,
    pub snapshot_rx: watch::Receiver<Arc<ServerMsg>>,
    pub events_tx: broadcast::Sender<ServerMsg>,
    pub map: Arc<MapDescription>,
    pub walls: Arc<Vec<Wall>>,
    player_count: Arc<AtomicUsize>,
    tick: Arc<AtomicU64>,
}

impl WorldHandle {
    pub fn player_count(&self) -> usize {
        self.player_count.load(Ordering::Relaxed)
    }

    pub fn tick(&self) -> u64 {
        self.tick.load(Ordering::Relaxed)
    }

    /// Subscribe to gameplay events; call before joining so nothing is missed
    pub fn subscribe_events(&self) -> broadcast::Receiver<ServerMsg> {
        self.events_tx.subscribe()
    }

    /// Receiver that always holds the latest snapshot
    pub fn snapshots(&self) -> watch::Receiver<Arc<ServerMsg>> {
        self.snapshot_rx.clone()
    }
}

/// Owns the world and advances it at a fixed rate
pub struct GameLoop {
    world: World,
    intent_rx: mpsc::Receiver<Intent>,
    snapshot_tx: watch::Sender<Arc<ServerMsg>>,
    events_tx: broadcast::Sender<ServerMsg>,
    snapshot_builder: SnapshotBuilder,
    player_count: Arc<AtomicUsize>,
    tick: Arc<AtomicU64>,
    tick_rate: u32,
}

impl GameLoop {
    pub fn new(world: World, snapshot_interval: u32) -> (Self, WorldHandle) {
        let (intent_tx, intent_rx) = mpsc::channel(INTENT_CAPACITY);
        let (events_tx, _) = broadcast::channel(EVENT_CAPACITY);

        let snapshot_builder = SnapshotBuilder::new(snapshot_interval);
        let (snapshot_tx, snapshot_rx) = watch::channel(Arc::new(snapshot_builder.build(&world)));

        let player_count = Arc::new(AtomicUsize::new(0));
        let tick = Arc::new(AtomicU64::new(0));
        let tick_rate = world.tick_rate();

        let handle = WorldHandle {
            intent_tx,
            snapshot_rx,
            events_tx: events_tx.clone(),
            map: world.map().clone(),
            walls: world.walls().clone(),
            player_count: player_count.clone(),
            tick: tick.clone(),
        };

        let game_loop = Self {
            world,
            intent_rx,
            snapshot_tx,
            events_tx,
            snapshot_builder,
            player_count,
            tick,
            tick_rate,
        };

        (game_loop, handle)
    }

    /// Run the authoritative tick loop until every handle is dropped
    pub async fn run(mut self) {
        info!(tick_rate = self.tick_rate, "World loop started");

        let tick_duration = Duration::from_micros(1_000_000 / self.tick_rate.max(1) as u64);
        let mut tick_interval = interval(tick_duration);
        tick_interval.set_missed_tick_behavior(tokio::time::MissedTickBehavior::Skip);
        let mut timer = Timer::new();

        loop {
            tick_interval.tick().await;

            let dt = clamp_delta(timer.elapsed_secs(), self.tick_rate);
            timer.reset();

            if !self.process_intents() {
                info!("All world handles dropped, stopping loop");
                break;
            }

            self.world.step(dt);
            self.publish();
        }
    }

    /// Drain staged intents. Returns false once no sender is left.
    fn process_intents(&mut self) -> bool {
        loop {
            match self.intent_rx.try_recv() {
                Ok(intent) => self.apply(intent),
                Err(mpsc::error::TryRecvError::Empty) => return true,
                Err(mpsc::error::TryRecvError::Disconnected) => return false,
            }
        }
    }

    fn apply(&mut self, intent: Intent) {
        match intent {
            Intent::Join {
                player_id,
                name,
                class,
                reply,
            } => {
                if let Some(welcome) = self.world.join(player_id, name, class) {
                    self.snapshot_builder.force_next();
                    // Session may already be gone
                    let _ = reply.send(welcome);
                } else {
                    debug!(player_id = %player_id, "Join produced no welcome");
                }
            }
            Intent::Input { player_id, seq, x, y } => {
                self.world.apply_input(player_id, seq, x, y);
            }
            Intent::Cast {
                player_id,
                slot,
                aim_x,
                aim_y,
            } => {
                self.world.queue_cast(player_id, slot, aim_x, aim_y);
            }
            Intent::Chat { player_id, text } => {
                self.world.chat(player_id, text);
            }
            Intent::Equip {
                player_id,
                item_id,
                slot,
            } => {
                self.world.equip(player_id, item_id.as_deref(), slot);
            }
            Intent::Heartbeat { player_id } => {
                self.world.touch(player_id);
            }
            Intent::Leave { player_id } => {
                self.world.leave(player_id, "disconnected");
            }
        }
    }

    /// Fan out this tick's events and the latest snapshot; never blocks
    fn publish(&mut self) {
        for event in self.world.drain_events() {
            // No subscribers is fine
            let _ = self.events_tx.send(event);
        }

        self.player_count.store(self.world.players.len(), Ordering::Relaxed);
        self.tick.store(self.world.tick, Ordering::Relaxed);

        if self.snapshot_builder.should_send() {
            let snapshot = self.snapshot_builder.build(&self.world);
            if self.snapshot_tx.send(Arc::new(snapshot)).is_err() {
                warn!("No snapshot receivers left");
            }
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::game::geometry::MapDescription;
    use crate::game::world::WorldSettings;
    use crate::ws::protocol::PlayerClass;
    use tokio::sync::oneshot;
    use uuid::Uuid;

    fn spawn_loop() -> WorldHandle {
        let world = World::new(
            MapDescription::default_arena(2400.0),
            WorldSettings {
                seed: 3,
                tick_rate: 50,
                session_timeout_ms: 30_000,
                max_players: 4,
            },
        );
        let (game_loop, handle) = GameLoop::new(world, 1);
        tokio::spawn(game_loop.run());
        handle
    }

    #[tokio::test]
    async fn test_join_gets_welcome_then_snapshot() {
        let handle = spawn_loop();
        let mut events = handle.subscribe_events();
        let mut snapshots = handle.snapshots();

        let player_id = Uuid::new_v4();
        let (reply, welcome) = oneshot::channel();
        handle
            .intent_tx
            .send(Intent::Join {
                player_id,
                name: "ana".into(),
                class: PlayerClass::Mage,
                reply,
            })
            .await
            .unwrap();

        match welcome.await.unwrap() {
            ServerMsg::Welcome {
                player_id: id,
                tick_rate,
                ..
            } => {
                assert_eq!(id, player_id);
                assert_eq!(tick_rate, 50);
            }
            other => panic!("unexpected {other:?}"),
        }

        let joined = events.recv().await.unwrap();
        assert!(matches!(joined, ServerMsg::PlayerJoined { ref player } if player.id == player_id));

        snapshots.changed().await.unwrap();
        let snapshot = snapshots.borrow_and_update().clone();
        match snapshot.as_ref() {
            ServerMsg::Snapshot { players, .. } => {
                assert!(players.iter().any(|p| p.id == player_id));
            }
            other => panic!("unexpected {other:?}"),
        }
        assert_eq!(handle.player_count(), 1);
    }

    #[tokio::test]
    async fn test_leave_broadcasts_player_left() {
        let handle = spawn_loop();
        let mut events = handle.subscribe_events();

        let player_id = Uuid::new_v4();
        let (reply, welcome) = oneshot::channel();
        handle
            .intent_tx
            .send(Intent::Join {
                player_id,
                name: "bo".into(),
                class: PlayerClass::Warrior,
                reply,
            })
            .await
            .unwrap();
        welcome.await.unwrap();

        tokio_test::assert_ok!(handle.intent_tx.send(Intent::Leave { player_id }).await);

        loop {
            match events.recv().await.unwrap() {
                ServerMsg::PlayerLeft { player_id: id, reason } => {
                    assert_eq!(id, player_id);
                    assert_eq!(reason, "disconnected");
                    break;
                }
                _ => continue,
            }
        }
    }

    #[tokio::test]
    async fn test_loop_stops_when_handles_drop() {
        let world = World::new(
            MapDescription::default_arena(2400.0),
            WorldSettings {
                seed: 3,
                tick_rate: 50,
                session_timeout_ms: 30_000,
                max_players: 4,
            },
        );
        let (game_loop, handle) = GameLoop::new(world, 1);
        let task = tokio::spawn(game_loop.run());
        drop(handle);
        tokio::time::timeout(Duration::from_secs(2), task)
            .await
            .expect("loop should stop")
            .unwrap();
    }
}
