//! WebSocket protocol message definitions
//! These are the wire types for client-server communication

use chrono::{DateTime, Utc};
use serde::{Deserialize, Serialize};
use uuid::Uuid;

use crate::game::geometry::{MapDescription, Point, Wall};

/// Player archetypes
#[derive(Debug, Clone, Copy, Default, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum PlayerClass {
    /// Close range, tanky
    #[default]
    Warrior,
    /// Projectiles at range
    Ranger,
    /// Area control and utility
    Mage,
}

/// Mob archetypes
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum MobType {
    Slime,
    Wolf,
    Brute,
}

/// Messages sent from client to server
#[derive(Debug, Clone, Serialize, Deserialize)]
#[serde(tag = "type", rename_all = "camelCase")]
pub enum ClientMsg {
    /// Enter the world (or respawn after death)
    Join {
        name: String,
        #[serde(default)]
        class: PlayerClass,
    },

    /// Movement intent
    Input {
        /// Must be strictly increasing per connection
        seq: u32,
        /// Desired direction; longer than 1 is normalized
        vector: Point,
    },

    /// Activate a skill slot
    #[serde(rename_all = "camelCase")]
    Cast {
        skill_slot: usize,
        aim_direction: Point,
    },

    Chat {
        text: String,
    },

    /// Put an item into an equipment slot; a null item clears the slot
    #[serde(rename_all = "camelCase")]
    Equip {
        item_id: Option<String>,
        slot: usize,
    },

    /// Ping for latency measurement
    Ping {
        /// Client timestamp
        t: u64,
    },
}

impl ClientMsg {
    /// Parse a text frame, rejecting non-finite vectors
    pub fn decode(text: &str) -> Result<Self, ProtocolError> {
        let msg: ClientMsg = serde_json::from_str(text)?;
        match &msg {
            ClientMsg::Input { vector, .. } if !vector.is_finite() => {
                Err(ProtocolError::NonFinite("vector"))
            }
            ClientMsg::Cast { aim_direction, .. } if !aim_direction.is_finite() => {
                Err(ProtocolError::NonFinite("aimDirection"))
            }
            _ => Ok(msg),
        }
    }
}

/// Client frame decode errors
#[derive(Debug, thiserror::Error)]
pub enum ProtocolError {
    #[error("Malformed message: {0}")]
    Malformed(#[from] serde_json::Error),

    #[error("Non-finite value in field {0}")]
    NonFinite(&'static str),
}

/// Reference to any damageable entity
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(tag = "kind", content = "id", rename_all = "snake_case")]
pub enum EntityRef {
    Player(Uuid),
    Mob(u32),
}

/// Messages sent from server to client
#[derive(Debug, Clone, Serialize, Deserialize)]
#[serde(tag = "type", rename_all = "camelCase")]
pub enum ServerMsg {
    /// Reply to a successful join
    #[serde(rename_all = "camelCase")]
    Welcome {
        player_id: Uuid,
        spawn_position: Point,
        map_description: MapDescription,
        walls: Vec<Wall>,
        tick_rate: u32,
    },

    /// World state, sent every snapshot interval
    Snapshot {
        /// Server tick number
        tick: u64,
        /// Simulation clock in milliseconds
        time: u64,
        players: Vec<PlayerSnapshot>,
        mobs: Vec<MobSnapshot>,
        projectiles: Vec<ProjectileSnapshot>,
    },

    PlayerJoined {
        player: PlayerInfo,
    },

    #[serde(rename_all = "camelCase")]
    PlayerLeft {
        player_id: Uuid,
        reason: String,
    },

    #[serde(rename_all = "camelCase")]
    DamageEvent {
        source: EntityRef,
        target: EntityRef,
        amount: f32,
        remaining_hp: f32,
    },

    DeathEvent {
        victim: EntityRef,
        killer: Option<EntityRef>,
    },

    #[serde(rename_all = "camelCase")]
    LevelUpEvent {
        player_id: Uuid,
        level: u32,
        max_hp: f32,
    },

    #[serde(rename_all = "camelCase")]
    ChatEvent {
        player_id: Uuid,
        name: String,
        text: String,
        sent_at: DateTime<Utc>,
    },

    /// Pong response
    Pong {
        /// Echo back client timestamp
        t: u64,
    },
}

/// Player identity for join notifications
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct PlayerInfo {
    pub id: Uuid,
    pub name: String,
    pub class: PlayerClass,
}

/// Player state in a snapshot
#[derive(Debug, Clone, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct PlayerSnapshot {
    pub id: Uuid,
    pub name: String,
    pub class: PlayerClass,
    pub x: f32,
    pub y: f32,
    pub vel_x: f32,
    pub vel_y: f32,
    pub radius: f32,
    pub hp: f32,
    pub max_hp: f32,
    pub alive: bool,
    pub level: u32,
    pub xp: u32,
    pub next_level_xp: u32,
    pub gold: u32,
    /// Last processed input sequence
    pub last_input_seq: u32,
    /// Remaining cooldown per skill slot, in milliseconds
    pub cooldowns: Vec<u64>,
    pub buffs: Vec<BuffSnapshot>,
    pub equipment: Vec<Option<String>>,
}

#[derive(Debug, Clone, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct BuffSnapshot {
    pub kind: BuffKind,
    pub multiplier: f32,
    pub remaining_ms: u64,
}

/// What a buff multiplies
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum BuffKind {
    Damage,
    Speed,
}

#[derive(Debug, Clone, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct MobSnapshot {
    pub id: u32,
    pub mob_type: MobType,
    pub x: f32,
    pub y: f32,
    pub radius: f32,
    pub hp: f32,
    pub max_hp: f32,
    pub stunned: bool,
    pub target: Option<Uuid>,
}

#[derive(Debug, Clone, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct ProjectileSnapshot {
    pub id: u64,
    pub owner: Uuid,
    pub x: f32,
    pub y: f32,
    pub vel_x: f32,
    pub vel_y: f32,
    pub radius: f32,
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_decode_client_messages() {
        let msg = ClientMsg::decode(r#"{"type":"join","name":"ana","class":"mage"}"#).unwrap();
        assert!(matches!(msg, ClientMsg::Join { ref name, class: PlayerClass::Mage } if name == "ana"));

        let msg = ClientMsg::decode(r#"{"type":"input","seq":4,"vector":{"x":1.0,"y":0.0}}"#).unwrap();
        assert!(matches!(msg, ClientMsg::Input { seq: 4, .. }));

        let msg =
            ClientMsg::decode(r#"{"type":"cast","skillSlot":2,"aimDirection":{"x":0.0,"y":-1.0}}"#)
                .unwrap();
        assert!(matches!(msg, ClientMsg::Cast { skill_slot: 2, .. }));

        let msg = ClientMsg::decode(r#"{"type":"equip","itemId":null,"slot":1}"#).unwrap();
        assert!(matches!(msg, ClientMsg::Equip { item_id: None, slot: 1 }));
    }

    #[test]
    fn test_join_class_defaults() {
        let msg = ClientMsg::decode(r#"{"type":"join","name":"x"}"#).unwrap();
        assert!(matches!(msg, ClientMsg::Join { class: PlayerClass::Warrior, .. }));
    }

    #[test]
    fn test_decode_rejects_garbage() {
        assert!(matches!(
            ClientMsg::decode("not json"),
            Err(ProtocolError::Malformed(_))
        ));
        assert!(ClientMsg::decode(r#"{"type":"teleport"}"#).is_err());
    }

    #[test]
    fn test_server_msg_tags() {
        let msg = ServerMsg::DeathEvent {
            victim: EntityRef::Mob(3),
            killer: None,
        };
        let json = serde_json::to_value(&msg).unwrap();
        assert_eq!(json["type"], "deathEvent");
        assert_eq!(json["victim"]["kind"], "mob");
        assert_eq!(json["victim"]["id"], 3);

        let msg = ServerMsg::LevelUpEvent {
            player_id: Uuid::nil(),
            level: 2,
            max_hp: 130.0,
        };
        let json = serde_json::to_value(&msg).unwrap();
        assert_eq!(json["type"], "levelUpEvent");
        assert_eq!(json["maxHp"], 130.0);
    }
}
