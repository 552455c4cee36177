//! Players, mobs and their static stat tables

use std::collections::HashMap;
use uuid::Uuid;

use crate::ws::protocol::{BuffKind, MobType, PlayerClass};

/// Number of equipment slots per player
pub const EQUIPMENT_SLOTS: usize = 4;

/// Number of skill slots per class
pub const SKILL_SLOTS: usize = 3;

/// Starting next-level threshold
pub const BASE_LEVEL_XP: u32 = 100;

/// Pending casts kept per player between ticks
pub const MAX_PENDING_CASTS: usize = 4;

/// Base stats per class
#[derive(Debug, Clone, Copy)]
pub struct ClassStats {
    pub max_hp: f32,
    /// Units per second at full input
    pub move_speed: f32,
    pub radius: f32,
}

impl ClassStats {
    pub fn for_class(class: PlayerClass) -> Self {
        match class {
            PlayerClass::Warrior => Self {
                max_hp: 160.0,
                move_speed: 210.0,
                radius: 18.0,
            },
            PlayerClass::Ranger => Self {
                max_hp: 110.0,
                move_speed: 240.0,
                radius: 16.0,
            },
            PlayerClass::Mage => Self {
                max_hp: 100.0,
                move_speed: 225.0,
                radius: 16.0,
            },
        }
    }
}

/// Stats per mob type
#[derive(Debug, Clone, Copy)]
pub struct MobStats {
    pub max_hp: f32,
    pub speed: f32,
    pub radius: f32,
    pub aggro_radius: f32,
    /// Damage per melee hit
    pub damage: f32,
    /// Seconds of contact between melee hits
    pub attack_interval: f32,
    pub xp_reward: u32,
    pub gold_reward: u32,
    pub respawn_secs: u64,
}

impl MobStats {
    pub fn for_type(mob_type: MobType) -> Self {
        match mob_type {
            MobType::Slime => Self {
                max_hp: 60.0,
                speed: 90.0,
                radius: 16.0,
                aggro_radius: 220.0,
                damage: 6.0,
                attack_interval: 1.0,
                xp_reward: 15,
                gold_reward: 2,
                respawn_secs: 8,
            },
            MobType::Wolf => Self {
                max_hp: 120.0,
                speed: 170.0,
                radius: 20.0,
                aggro_radius: 320.0,
                damage: 10.0,
                attack_interval: 0.8,
                xp_reward: 35,
                gold_reward: 5,
                respawn_secs: 15,
            },
            MobType::Brute => Self {
                max_hp: 260.0,
                speed: 110.0,
                radius: 28.0,
                aggro_radius: 260.0,
                damage: 22.0,
                attack_interval: 1.5,
                xp_reward: 80,
                gold_reward: 12,
                respawn_secs: 30,
            },
        }
    }
}

/// Equippable item with additive stat modifiers
#[derive(Debug, Clone, Copy, PartialEq)]
pub struct ItemDef {
    pub id: &'static str,
    pub name: &'static str,
    pub max_hp_bonus: f32,
    /// Fraction added to the damage multiplier
    pub damage_bonus: f32,
    /// Units per second added to move speed
    pub speed_bonus: f32,
}

pub static ITEM_CATALOG: [ItemDef; 5] = [
    ItemDef {
        id: "iron_helm",
        name: "Iron Helm",
        max_hp_bonus: 30.0,
        damage_bonus: 0.0,
        speed_bonus: 0.0,
    },
    ItemDef {
        id: "chain_mail",
        name: "Chain Mail",
        max_hp_bonus: 50.0,
        damage_bonus: 0.0,
        speed_bonus: -10.0,
    },
    ItemDef {
        id: "war_axe",
        name: "War Axe",
        max_hp_bonus: 0.0,
        damage_bonus: 0.15,
        speed_bonus: 0.0,
    },
    ItemDef {
        id: "swift_boots",
        name: "Swift Boots",
        max_hp_bonus: 0.0,
        damage_bonus: 0.0,
        speed_bonus: 30.0,
    },
    ItemDef {
        id: "amulet_of_power",
        name: "Amulet of Power",
        max_hp_bonus: 20.0,
        damage_bonus: 0.10,
        speed_bonus: 0.0,
    },
];

impl ItemDef {
    pub fn find(id: &str) -> Option<&'static ItemDef> {
        ITEM_CATALOG.iter().find(|item| item.id == id)
    }
}

/// Timed stat multiplier
#[derive(Debug, Clone, Copy, PartialEq)]
pub struct Buff {
    pub kind: BuffKind,
    pub multiplier: f32,
    /// Simulation time in ms
    pub expires_at: u64,
}

/// A skill activation waiting for the next tick
#[derive(Debug, Clone, Copy, PartialEq)]
pub struct CastRequest {
    pub slot: usize,
    pub aim_x: f32,
    pub aim_y: f32,
}

/// Player state in the world (authoritative)
#[derive(Debug, Clone)]
pub struct PlayerState {
    pub id: Uuid,
    pub name: String,
    pub class: PlayerClass,

    // Position and movement
    pub x: f32,
    pub y: f32,
    pub vel_x: f32,
    pub vel_y: f32,
    pub radius: f32,
    pub facing_x: f32,
    pub facing_y: f32,
    pub spawn_x: f32,
    pub spawn_y: f32,

    // Health; max_hp is always base_max_hp plus equipment
    pub hp: f32,
    pub base_max_hp: f32,
    pub max_hp: f32,
    pub alive: bool,

    // Progression
    pub level: u32,
    pub xp: u32,
    pub next_level_xp: u32,
    /// Permanent multiplier on skill damage and buff duration
    pub power: f32,
    pub gold: u32,

    // Combat
    /// Simulation time (ms) at which each slot is ready again
    pub cooldowns: [u64; SKILL_SLOTS],
    pub buffs: Vec<Buff>,
    pub pending_casts: Vec<CastRequest>,

    // Equipment and the stats derived from it
    pub equipment: [Option<&'static ItemDef>; EQUIPMENT_SLOTS],
    pub damage_bonus: f32,
    pub speed_bonus: f32,

    // Input tracking
    pub last_input_seq: u32,
    pub input_x: f32,
    pub input_y: f32,
    pub last_input_at: u64,
    pub last_activity: u64,
}

impl PlayerState {
    pub fn new(id: Uuid, name: String, class: PlayerClass, x: f32, y: f32, now: u64) -> Self {
        let stats = ClassStats::for_class(class);
        Self {
            id,
            name,
            class,
            x,
            y,
            vel_x: 0.0,
            vel_y: 0.0,
            radius: stats.radius,
            facing_x: 1.0,
            facing_y: 0.0,
            spawn_x: x,
            spawn_y: y,
            hp: stats.max_hp,
            base_max_hp: stats.max_hp,
            max_hp: stats.max_hp,
            alive: true,
            level: 1,
            xp: 0,
            next_level_xp: BASE_LEVEL_XP,
            power: 1.0,
            gold: 0,
            cooldowns: [0; SKILL_SLOTS],
            buffs: Vec::new(),
            pending_casts: Vec::new(),
            equipment: [None; EQUIPMENT_SLOTS],
            damage_bonus: 0.0,
            speed_bonus: 0.0,
            last_input_seq: 0,
            input_x: 0.0,
            input_y: 0.0,
            last_input_at: now,
            last_activity: now,
        }
    }

    /// Product of all active buffs of a kind
    pub fn buff_multiplier(&self, kind: BuffKind, now: u64) -> f32 {
        self.buffs
            .iter()
            .filter(|b| b.kind == kind && b.expires_at > now)
            .map(|b| b.multiplier)
            .product()
    }

    pub fn damage_multiplier(&self, now: u64) -> f32 {
        self.power * (1.0 + self.damage_bonus) * self.buff_multiplier(BuffKind::Damage, now)
    }

    pub fn move_speed(&self, now: u64) -> f32 {
        let base = ClassStats::for_class(self.class).move_speed + self.speed_bonus;
        base.max(0.0) * self.buff_multiplier(BuffKind::Speed, now)
    }

    /// Add or refresh a buff; same-kind buffs replace each other
    pub fn apply_buff(&mut self, buff: Buff) {
        self.buffs.retain(|b| b.kind != buff.kind);
        self.buffs.push(buff);
    }

    pub fn expire_buffs(&mut self, now: u64) {
        self.buffs.retain(|b| b.expires_at > now);
    }

    /// Bring a dead player back at a new spawn point
    pub fn respawn(&mut self, x: f32, y: f32, now: u64) {
        self.x = x;
        self.y = y;
        self.spawn_x = x;
        self.spawn_y = y;
        self.vel_x = 0.0;
        self.vel_y = 0.0;
        self.input_x = 0.0;
        self.input_y = 0.0;
        self.hp = self.max_hp;
        self.alive = true;
        self.buffs.clear();
        self.pending_casts.clear();
        self.last_activity = now;
    }
}

/// Mob state in the world; never removed, only marked dead
#[derive(Debug, Clone)]
pub struct MobState {
    /// Stable index into the world's mob arena
    pub id: u32,
    pub mob_type: MobType,
    pub x: f32,
    pub y: f32,
    pub vel_x: f32,
    pub vel_y: f32,
    pub radius: f32,
    pub hp: f32,
    pub max_hp: f32,
    pub aggro_radius: f32,
    /// Cumulative damage dealt by each player since the last respawn
    pub damage_by: HashMap<Uuid, f32>,
    pub stunned_until: u64,
    pub spawn_x: f32,
    pub spawn_y: f32,
    pub dead: bool,
    pub respawn_at: u64,
    /// Seconds of melee contact accumulated toward the next hit
    pub attack_timer: f32,
    pub target: Option<Uuid>,
}

impl MobState {
    pub fn new(id: u32, mob_type: MobType, spawn_x: f32, spawn_y: f32) -> Self {
        let stats = MobStats::for_type(mob_type);
        Self {
            id,
            mob_type,
            x: spawn_x,
            y: spawn_y,
            vel_x: 0.0,
            vel_y: 0.0,
            radius: stats.radius,
            hp: stats.max_hp,
            max_hp: stats.max_hp,
            aggro_radius: stats.aggro_radius,
            damage_by: HashMap::new(),
            stunned_until: 0,
            spawn_x,
            spawn_y,
            dead: false,
            respawn_at: 0,
            attack_timer: 0.0,
            target: None,
        }
    }

    pub fn stats(&self) -> MobStats {
        MobStats::for_type(self.mob_type)
    }

    pub fn is_stunned(&self, now: u64) -> bool {
        now < self.stunned_until
    }

    /// Highest cumulative contributor among `present`; ties go to the lowest id
    pub fn kill_credit(&self, present: impl Fn(&Uuid) -> bool) -> Option<Uuid> {
        self.damage_by
            .iter()
            .filter(|(id, _)| present(id))
            .max_by(|a, b| a.1.total_cmp(b.1).then_with(|| b.0.cmp(a.0)))
            .map(|(id, _)| *id)
    }

    /// Reactivate at a position with full health and no history
    pub fn revive(&mut self, x: f32, y: f32) {
        self.x = x;
        self.y = y;
        self.vel_x = 0.0;
        self.vel_y = 0.0;
        self.hp = self.max_hp;
        self.dead = false;
        self.damage_by.clear();
        self.stunned_until = 0;
        self.attack_timer = 0.0;
        self.target = None;
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_kill_credit_highest_contributor() {
        let mut mob = MobState::new(0, MobType::Wolf, 0.0, 0.0);
        let a = Uuid::from_u128(1);
        let b = Uuid::from_u128(2);
        mob.damage_by.insert(a, 40.0);
        mob.damage_by.insert(b, 80.0);
        assert_eq!(mob.kill_credit(|_| true), Some(b));
        // Contributors who left are skipped
        assert_eq!(mob.kill_credit(|id| *id != b), Some(a));
    }

    #[test]
    fn test_kill_credit_tie_goes_to_lowest_id() {
        let mut mob = MobState::new(0, MobType::Slime, 0.0, 0.0);
        let low = Uuid::from_u128(5);
        let high = Uuid::from_u128(9);
        mob.damage_by.insert(high, 30.0);
        mob.damage_by.insert(low, 30.0);
        assert_eq!(mob.kill_credit(|_| true), Some(low));
    }

    #[test]
    fn test_buffs_refresh_and_expire() {
        let mut player = PlayerState::new(Uuid::nil(), "p".into(), PlayerClass::Mage, 0.0, 0.0, 0);
        player.apply_buff(Buff {
            kind: BuffKind::Speed,
            multiplier: 1.4,
            expires_at: 1000,
        });
        player.apply_buff(Buff {
            kind: BuffKind::Speed,
            multiplier: 1.2,
            expires_at: 2000,
        });
        assert_eq!(player.buffs.len(), 1);
        assert_eq!(player.buff_multiplier(BuffKind::Speed, 1500), 1.2);
        assert_eq!(player.buff_multiplier(BuffKind::Damage, 1500), 1.0);

        player.expire_buffs(2000);
        assert!(player.buffs.is_empty());
    }

    #[test]
    fn test_item_lookup() {
        assert_eq!(ItemDef::find("chain_mail").map(|i| i.max_hp_bonus), Some(50.0));
        assert!(ItemDef::find("excalibur").is_none());
    }
}
