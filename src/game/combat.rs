//! Combat system - skills, projectiles, damage

use std::collections::HashSet;
use uuid::Uuid;

use crate::ws::protocol::{BuffKind, PlayerClass};

use super::entity::SKILL_SLOTS;
use super::physics::PhysicsSystem;

/// What a projectile does to the target it touches
#[derive(Debug, Clone, Copy, PartialEq)]
pub enum OnHit {
    Damage,
    Stun { ms: u64 },
    /// Damage the target, then splash every other mob within `radius` of the impact
    Burst { radius: f32, splash_fraction: f32 },
}

/// Closed set of skill behaviours
#[derive(Debug, Clone, Copy, PartialEq)]
pub enum SkillKind {
    /// Hits every mob within `range` inside a frontal arc
    Melee { damage: f32, range: f32, arc_deg: f32 },
    /// Hits every mob within `radius` of the caster
    Area {
        damage: f32,
        radius: f32,
        stun_ms: Option<u64>,
    },
    Projectile {
        damage: f32,
        speed: f32,
        radius: f32,
        /// Seconds
        ttl: f32,
        on_hit: OnHit,
        pierce: bool,
    },
    /// `count` projectiles fanned across `spread_deg` around the aim
    Burst {
        count: u32,
        spread_deg: f32,
        damage: f32,
        speed: f32,
        radius: f32,
        ttl: f32,
    },
    /// Self buff
    Buff {
        kind: BuffKind,
        multiplier: f32,
        duration_ms: u64,
    },
}

/// Immutable per-class, per-slot skill configuration
#[derive(Debug, Clone, Copy, PartialEq)]
pub struct SkillDef {
    pub name: &'static str,
    pub cooldown_ms: u64,
    pub kind: SkillKind,
}

static WARRIOR_SKILLS: [SkillDef; SKILL_SLOTS] = [
    SkillDef {
        name: "Cleave",
        cooldown_ms: 600,
        kind: SkillKind::Melee {
            damage: 30.0,
            range: 50.0,
            arc_deg: 120.0,
        },
    },
    SkillDef {
        name: "Ground Slam",
        cooldown_ms: 8_000,
        kind: SkillKind::Area {
            damage: 25.0,
            radius: 120.0,
            stun_ms: Some(1_200),
        },
    },
    SkillDef {
        name: "War Cry",
        cooldown_ms: 12_000,
        kind: SkillKind::Buff {
            kind: BuffKind::Damage,
            multiplier: 1.5,
            duration_ms: 5_000,
        },
    },
];

static RANGER_SKILLS: [SkillDef; SKILL_SLOTS] = [
    SkillDef {
        name: "Arrow",
        cooldown_ms: 400,
        kind: SkillKind::Projectile {
            damage: 20.0,
            speed: 600.0,
            radius: 5.0,
            ttl: 1.2,
            on_hit: OnHit::Damage,
            pierce: false,
        },
    },
    SkillDef {
        name: "Volley",
        cooldown_ms: 5_000,
        kind: SkillKind::Burst {
            count: 5,
            spread_deg: 40.0,
            damage: 12.0,
            speed: 550.0,
            radius: 5.0,
            ttl: 0.9,
        },
    },
    SkillDef {
        name: "Piercing Shot",
        cooldown_ms: 6_000,
        kind: SkillKind::Projectile {
            damage: 35.0,
            speed: 750.0,
            radius: 6.0,
            ttl: 1.0,
            on_hit: OnHit::Damage,
            pierce: true,
        },
    },
];

static MAGE_SKILLS: [SkillDef; SKILL_SLOTS] = [
    SkillDef {
        name: "Firebolt",
        cooldown_ms: 900,
        kind: SkillKind::Projectile {
            damage: 28.0,
            speed: 480.0,
            radius: 8.0,
            ttl: 1.5,
            on_hit: OnHit::Burst {
                radius: 60.0,
                splash_fraction: 0.5,
            },
            pierce: false,
        },
    },
    SkillDef {
        name: "Frost Bolt",
        cooldown_ms: 4_000,
        kind: SkillKind::Projectile {
            damage: 15.0,
            speed: 520.0,
            radius: 7.0,
            ttl: 1.2,
            on_hit: OnHit::Stun { ms: 1_500 },
            pierce: false,
        },
    },
    SkillDef {
        name: "Haste",
        cooldown_ms: 10_000,
        kind: SkillKind::Buff {
            kind: BuffKind::Speed,
            multiplier: 1.4,
            duration_ms: 4_000,
        },
    },
];

impl SkillDef {
    pub fn for_slot(class: PlayerClass, slot: usize) -> Option<&'static SkillDef> {
        let table = match class {
            PlayerClass::Warrior => &WARRIOR_SKILLS,
            PlayerClass::Ranger => &RANGER_SKILLS,
            PlayerClass::Mage => &MAGE_SKILLS,
        };
        table.get(slot)
    }
}

/// Active projectile in the world
#[derive(Debug, Clone)]
pub struct Projectile {
    pub id: u64,
    pub owner_id: Uuid,
    pub x: f32,
    pub y: f32,
    pub vel_x: f32,
    pub vel_y: f32,
    pub radius: f32,
    /// Seconds left to live
    pub ttl: f32,
    pub damage: f32,
    pub on_hit: OnHit,
    pub pierce: bool,
    /// Mobs this projectile already hit
    pub hit: HashSet<u32>,
}

impl Projectile {
    /// Create a projectile travelling along a unit direction
    #[allow(clippy::too_many_arguments)]
    pub fn new(
        id: u64,
        owner_id: Uuid,
        x: f32,
        y: f32,
        dir_x: f32,
        dir_y: f32,
        speed: f32,
        radius: f32,
        ttl: f32,
        damage: f32,
        on_hit: OnHit,
        pierce: bool,
    ) -> Self {
        Self {
            id,
            owner_id,
            x,
            y,
            vel_x: dir_x * speed,
            vel_y: dir_y * speed,
            radius,
            ttl,
            damage,
            on_hit,
            pierce,
            hit: HashSet::new(),
        }
    }

    /// Update projectile position, returns false if expired
    pub fn update(&mut self, dt: f32) -> bool {
        let (x, y) = PhysicsSystem::integrate(self.x, self.y, self.vel_x, self.vel_y, dt);
        self.x = x;
        self.y = y;
        self.ttl -= dt;
        self.ttl > 0.0
    }

    /// Check collision with a target
    pub fn check_hit(&self, target_x: f32, target_y: f32, target_radius: f32) -> bool {
        PhysicsSystem::circles_overlap(self.x, self.y, self.radius, target_x, target_y, target_radius)
    }
}

/// Combat system for cooldowns and damage
pub struct CombatSystem;

impl CombatSystem {
    /// Check whether a slot's cooldown has elapsed
    pub fn can_cast(ready_at: u64, now: u64) -> bool {
        now >= ready_at
    }

    /// Apply damage to health, returns (new_health, is_dead)
    pub fn apply_damage(current_health: f32, damage: f32) -> (f32, bool) {
        let new_health = (current_health - damage.max(0.0)).max(0.0);
        (new_health, new_health <= 0.0)
    }

    /// Unit directions fanned evenly across `spread_deg`, centered on the aim
    pub fn burst_directions(aim_x: f32, aim_y: f32, count: u32, spread_deg: f32) -> Vec<(f32, f32)> {
        let base = aim_y.atan2(aim_x);
        if count <= 1 {
            return vec![(base.cos(), base.sin())];
        }

        let spread = spread_deg.to_radians();
        let step = spread / (count - 1) as f32;
        (0..count)
            .map(|i| {
                let angle = base - spread / 2.0 + step * i as f32;
                (angle.cos(), angle.sin())
            })
            .collect()
    }

    /// Whether a target lies inside a frontal arc of `arc_deg` around the aim
    pub fn in_arc(aim_x: f32, aim_y: f32, dx: f32, dy: f32, arc_deg: f32) -> bool {
        match PhysicsSystem::unit(dx, dy) {
            // Overlapping centers always count
            None => true,
            Some((ux, uy)) => {
                let cos = (aim_x * ux + aim_y * uy).clamp(-1.0, 1.0);
                cos.acos() <= (arc_deg / 2.0).to_radians() + f32::EPSILON
            }
        }
    }
}
