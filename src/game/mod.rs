//! Game simulation modules

pub mod combat;
pub mod entity;
pub mod geometry;
pub mod physics;
pub mod progression;
pub mod runner;
pub mod snapshot;
pub mod spatial;
pub mod world;

pub use runner::{GameLoop, WorldHandle};
pub use world::{World, WorldSettings};

use tokio::sync::oneshot;
use uuid::Uuid;

use crate::ws::protocol::{PlayerClass, ServerMsg};

/// A validated request staged by a session, consumed at the next tick boundary
#[derive(Debug)]
pub enum Intent {
    Join {
        player_id: Uuid,
        name: String,
        class: PlayerClass,
        /// Receives the welcome if the join succeeds
        reply: oneshot::Sender<ServerMsg>,
    },
    Input {
        player_id: Uuid,
        seq: u32,
        x: f32,
        y: f32,
    },
    Cast {
        player_id: Uuid,
        slot: usize,
        aim_x: f32,
        aim_y: f32,
    },
    Chat {
        player_id: Uuid,
        text: String,
    },
    Equip {
        player_id: Uuid,
        item_id: Option<String>,
        slot: usize,
    },
    /// Connection is alive even if the player is idle
    Heartbeat {
        player_id: Uuid,
    },
    Leave {
        player_id: Uuid,
    },
}
