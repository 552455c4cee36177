//! World state and the authoritative tick step

use chrono::Utc;
use rand::{Rng, SeedableRng};
use rand_chacha::ChaCha8Rng;
use std::collections::BTreeMap;
use std::sync::Arc;
use tracing::{debug, info, warn};
use uuid::Uuid;

use crate::ws::protocol::{EntityRef, PlayerClass, PlayerInfo, ServerMsg};

use super::combat::{CombatSystem, OnHit, Projectile, SkillDef, SkillKind};
use super::entity::{
    Buff, CastRequest, ClassStats, ItemDef, MobState, MobStats, PlayerState, MAX_PENDING_CASTS,
};
use super::geometry::{build_walls, MapDescription, Point, Wall};
use super::physics::PhysicsSystem;
use super::progression::ProgressionSystem;
use super::spatial::SpatialGrid;

/// Extra reach beyond the mob's radius for its melee hits
pub const MOB_MELEE_RANGE: f32 = 8.0;

/// Max random offset from the spawn point on mob respawn
pub const MOB_SPAWN_JITTER: f32 = 40.0;

/// Movement input older than this no longer drives the player
pub const INPUT_HOLD_MS: u64 = 500;

/// Attempts at finding a wall-free player spawn
const SPAWN_ATTEMPTS: usize = 32;

/// Runtime knobs for the world
#[derive(Debug, Clone)]
pub struct WorldSettings {
    pub seed: u64,
    pub tick_rate: u32,
    /// Players silent for longer than this are removed
    pub session_timeout_ms: u64,
    pub max_players: usize,
}

/// Outcome of advancing one projectile
enum ProjectileOutcome {
    Keep,
    Expire,
    Hit { mob: u32, keep: bool },
}

/// The single owner of all game truth
pub struct World {
    pub tick: u64,
    /// Simulation clock in milliseconds
    pub now: u64,
    pub players: BTreeMap<Uuid, PlayerState>,
    pub mobs: Vec<MobState>,
    pub projectiles: Vec<Projectile>,
    map: Arc<MapDescription>,
    walls: Arc<Vec<Wall>>,
    grid: SpatialGrid,
    settings: WorldSettings,
    rng: ChaCha8Rng,
    next_projectile_id: u64,
    outbox: Vec<ServerMsg>,
}

impl World {
    pub fn new(map: MapDescription, settings: WorldSettings) -> Self {
        let layout = build_walls(&map);
        if layout.used_fallback {
            warn!("World is using the fallback wall layout");
        }

        let mut grid = SpatialGrid::new(map.size);
        grid.build(&layout.walls);

        let mut world = Self {
            tick: 0,
            now: 0,
            players: BTreeMap::new(),
            mobs: Vec::with_capacity(map.mob_spawns.len()),
            projectiles: Vec::new(),
            walls: Arc::new(layout.walls),
            grid,
            rng: ChaCha8Rng::seed_from_u64(settings.seed),
            settings,
            next_projectile_id: 1,
            outbox: Vec::new(),
            map: Arc::new(map),
        };

        let spawns = world.map.mob_spawns.clone();
        for (index, spawn) in spawns.iter().enumerate() {
            let mut mob = MobState::new(index as u32, spawn.mob_type, spawn.x, spawn.y);
            let (x, y) = world.jittered_spawn(spawn.x, spawn.y, mob.radius);
            mob.x = x;
            mob.y = y;
            world.mobs.push(mob);
        }

        info!(
            walls = world.walls.len(),
            mobs = world.mobs.len(),
            seed = world.settings.seed,
            "World created"
        );
        world
    }

    pub fn map(&self) -> &Arc<MapDescription> {
        &self.map
    }

    pub fn walls(&self) -> &Arc<Vec<Wall>> {
        &self.walls
    }

    pub fn tick_rate(&self) -> u32 {
        self.settings.tick_rate
    }

    /// Take every event produced since the last call
    pub fn drain_events(&mut self) -> Vec<ServerMsg> {
        std::mem::take(&mut self.outbox)
    }

    // ------------------------------------------------------------------
    // Intents staged by sessions, consumed at the tick boundary
    // ------------------------------------------------------------------

    /// Add a player, or respawn them if they are dead. Returns the welcome reply.
    pub fn join(&mut self, player_id: Uuid, name: String, class: PlayerClass) -> Option<ServerMsg> {
        let now = self.now;

        if let Some((alive, radius)) = self.players.get(&player_id).map(|p| (p.alive, p.radius)) {
            if alive {
                debug!(player_id = %player_id, "Join ignored, player already alive");
                return None;
            }
            let (x, y) = self.find_player_spawn(radius);
            if let Some(player) = self.players.get_mut(&player_id) {
                player.respawn(x, y, now);
            }
            info!(player_id = %player_id, "Player respawned");
            return Some(self.welcome(player_id, x, y));
        }

        if self.players.len() >= self.settings.max_players {
            warn!(player_id = %player_id, "World is full, join rejected");
            return None;
        }

        let (x, y) = self.find_player_spawn(ClassStats::for_class(class).radius);
        let player = PlayerState::new(player_id, name, class, x, y, now);
        let info = PlayerInfo {
            id: player.id,
            name: player.name.clone(),
            class: player.class,
        };
        self.players.insert(player_id, player);
        self.outbox.push(ServerMsg::PlayerJoined { player: info });

        info!(
            player_id = %player_id,
            player_count = self.players.len(),
            "Player joined world"
        );
        Some(self.welcome(player_id, x, y))
    }

    fn welcome(&self, player_id: Uuid, x: f32, y: f32) -> ServerMsg {
        ServerMsg::Welcome {
            player_id,
            spawn_position: Point::new(x, y),
            map_description: self.map.as_ref().clone(),
            walls: self.walls.as_ref().clone(),
            tick_rate: self.settings.tick_rate,
        }
    }

    /// Record a movement intent. Stale or replayed sequence numbers are dropped.
    pub fn apply_input(&mut self, player_id: Uuid, seq: u32, x: f32, y: f32) -> bool {
        let now = self.now;
        let Some(player) = self.players.get_mut(&player_id) else {
            return false;
        };
        if seq <= player.last_input_seq || !x.is_finite() || !y.is_finite() {
            return false;
        }

        let (ix, iy) = PhysicsSystem::normalize_intent(x, y);
        player.last_input_seq = seq;
        player.input_x = ix;
        player.input_y = iy;
        player.last_input_at = now;
        player.last_activity = now;
        if let Some((fx, fy)) = PhysicsSystem::unit(ix, iy) {
            player.facing_x = fx;
            player.facing_y = fy;
        }
        true
    }

    /// Keep-alive from a connected session that is not otherwise acting
    pub fn touch(&mut self, player_id: Uuid) -> bool {
        let now = self.now;
        let Some(player) = self.players.get_mut(&player_id) else {
            return false;
        };
        player.last_activity = now;
        true
    }

    /// Queue a skill activation for the next step
    pub fn queue_cast(&mut self, player_id: Uuid, slot: usize, aim_x: f32, aim_y: f32) -> bool {
        let now = self.now;
        let Some(player) = self.players.get_mut(&player_id) else {
            return false;
        };
        player.last_activity = now;
        if !player.alive
            || SkillDef::for_slot(player.class, slot).is_none()
            || player.pending_casts.len() >= MAX_PENDING_CASTS
        {
            return false;
        }
        player.pending_casts.push(CastRequest { slot, aim_x, aim_y });
        true
    }

    /// Broadcast a chat line from a player
    pub fn chat(&mut self, player_id: Uuid, text: String) -> bool {
        let now = self.now;
        let Some(player) = self.players.get_mut(&player_id) else {
            return false;
        };
        player.last_activity = now;
        let name = player.name.clone();
        self.outbox.push(ServerMsg::ChatEvent {
            player_id,
            name,
            text,
            sent_at: Utc::now(),
        });
        true
    }

    /// Equip or clear an item slot. Unknown items and slots are no-ops.
    pub fn equip(&mut self, player_id: Uuid, item_id: Option<&str>, slot: usize) -> bool {
        let now = self.now;
        let Some(player) = self.players.get_mut(&player_id) else {
            return false;
        };
        player.last_activity = now;

        let item = match item_id {
            Some(id) => match ItemDef::find(id) {
                Some(item) => Some(item),
                None => return false,
            },
            None => None,
        };
        ProgressionSystem::equip(player, slot, item)
    }

    /// Remove a player and announce it
    pub fn leave(&mut self, player_id: Uuid, reason: &str) -> bool {
        if self.players.remove(&player_id).is_none() {
            return false;
        }
        self.projectiles.retain(|p| p.owner_id != player_id);
        for mob in &mut self.mobs {
            if mob.target == Some(player_id) {
                mob.target = None;
            }
        }

        self.outbox.push(ServerMsg::PlayerLeft {
            player_id,
            reason: reason.to_string(),
        });
        info!(player_id = %player_id, reason, "Player left world");
        true
    }

    // ------------------------------------------------------------------
    // Tick
    // ------------------------------------------------------------------

    /// Advance the simulation by `dt` seconds (already clamped by the caller)
    pub fn step(&mut self, dt: f32) {
        self.tick += 1;
        self.now += (dt * 1000.0).round() as u64;

        self.reap_idle_players();
        for player in self.players.values_mut() {
            player.expire_buffs(self.now);
        }

        self.respawn_mobs();
        self.update_mobs(dt);
        self.update_players(dt);
        self.resolve_casts();
        self.update_projectiles(dt);
        self.sanitize();
    }

    fn reap_idle_players(&mut self) {
        let cutoff = self.now.saturating_sub(self.settings.session_timeout_ms);
        let idle: Vec<Uuid> = self
            .players
            .values()
            .filter(|p| p.last_activity < cutoff)
            .map(|p| p.id)
            .collect();

        for player_id in idle {
            warn!(player_id = %player_id, "Session timed out");
            self.leave(player_id, "timeout");
        }
    }

    fn respawn_mobs(&mut self) {
        for i in 0..self.mobs.len() {
            let mob = &self.mobs[i];
            if !mob.dead || self.now < mob.respawn_at {
                continue;
            }
            let (sx, sy, radius) = (mob.spawn_x, mob.spawn_y, mob.radius);
            let (x, y) = self.jittered_spawn(sx, sy, radius);
            self.mobs[i].revive(x, y);
            debug!(mob_id = i, "Mob respawned");
        }
    }

    /// Chase the nearest living player in aggro range and hit them on contact
    fn update_mobs(&mut self, dt: f32) {
        let now = self.now;
        let half = self.map.half_size();

        // BTreeMap order makes the strict `<` below break ties toward the lowest id
        let targets: Vec<(Uuid, f32, f32, f32)> = self
            .players
            .values()
            .filter(|p| p.alive)
            .map(|p| (p.id, p.x, p.y, p.radius))
            .collect();

        let mut melee_hits: Vec<(u32, Uuid, f32)> = Vec::new();

        for mob in self.mobs.iter_mut().filter(|m| !m.dead) {
            if mob.is_stunned(now) {
                mob.vel_x = 0.0;
                mob.vel_y = 0.0;
                mob.attack_timer = 0.0;
                continue;
            }

            let stats = mob.stats();
            let mut nearest: Option<(Uuid, f32, f32, f32, f32)> = None;
            for &(id, px, py, pr) in &targets {
                let dist = ((px - mob.x).powi(2) + (py - mob.y).powi(2)).sqrt();
                if dist <= mob.aggro_radius && nearest.map_or(true, |n| dist < n.4) {
                    nearest = Some((id, px, py, pr, dist));
                }
            }

            mob.target = nearest.map(|n| n.0);
            let Some((target_id, px, py, pr, dist)) = nearest else {
                mob.vel_x = 0.0;
                mob.vel_y = 0.0;
                mob.attack_timer = 0.0;
                continue;
            };

            let contact = mob.radius + MOB_MELEE_RANGE;
            match PhysicsSystem::unit(px - mob.x, py - mob.y) {
                Some((ux, uy)) if dist - pr > contact => {
                    mob.vel_x = ux * stats.speed;
                    mob.vel_y = uy * stats.speed;
                }
                _ => {
                    mob.vel_x = 0.0;
                    mob.vel_y = 0.0;
                }
            }

            let (x, y) = PhysicsSystem::integrate(mob.x, mob.y, mob.vel_x, mob.vel_y, dt);
            let candidates = self.grid.query(x, y, mob.radius);
            let (x, y, vel_x, vel_y) =
                PhysicsSystem::resolve_walls(x, y, mob.vel_x, mob.vel_y, mob.radius, &self.walls, &candidates);
            let (x, y) = PhysicsSystem::clamp_to_bounds(x, y, mob.radius, half);
            mob.x = x;
            mob.y = y;
            mob.vel_x = vel_x;
            mob.vel_y = vel_y;

            let gap = ((px - mob.x).powi(2) + (py - mob.y).powi(2)).sqrt() - pr;
            if gap <= contact {
                mob.attack_timer += dt;
                if mob.attack_timer >= stats.attack_interval {
                    mob.attack_timer = 0.0;
                    melee_hits.push((mob.id, target_id, stats.damage));
                }
            } else {
                mob.attack_timer = 0.0;
            }
        }

        for (mob_id, player_id, damage) in melee_hits {
            self.damage_player(player_id, EntityRef::Mob(mob_id), damage);
        }
    }

    /// Velocity is rebuilt from the held input every tick
    fn update_players(&mut self, dt: f32) {
        let now = self.now;
        let half = self.map.half_size();

        for player in self.players.values_mut().filter(|p| p.alive) {
            let fresh = now.saturating_sub(player.last_input_at) <= INPUT_HOLD_MS;
            let speed = player.move_speed(now);
            let (ix, iy) = if fresh {
                (player.input_x, player.input_y)
            } else {
                (0.0, 0.0)
            };
            player.vel_x = ix * speed;
            player.vel_y = iy * speed;

            let (x, y) = PhysicsSystem::integrate(player.x, player.y, player.vel_x, player.vel_y, dt);
            let candidates = self.grid.query(x, y, player.radius);
            let (x, y, vel_x, vel_y) = PhysicsSystem::resolve_walls(
                x,
                y,
                player.vel_x,
                player.vel_y,
                player.radius,
                &self.walls,
                &candidates,
            );
            let (x, y) = PhysicsSystem::clamp_to_bounds(x, y, player.radius, half);
            player.x = x;
            player.y = y;
            player.vel_x = vel_x;
            player.vel_y = vel_y;
        }
    }

    fn resolve_casts(&mut self) {
        let casters: Vec<(Uuid, Vec<CastRequest>)> = self
            .players
            .values_mut()
            .filter(|p| !p.pending_casts.is_empty())
            .map(|p| (p.id, std::mem::take(&mut p.pending_casts)))
            .collect();

        for (player_id, casts) in casters {
            for cast in casts {
                self.cast(player_id, cast);
            }
        }
    }

    /// Execute one skill activation if the slot is off cooldown
    fn cast(&mut self, player_id: Uuid, request: CastRequest) -> bool {
        let now = self.now;
        let Some(player) = self.players.get_mut(&player_id) else {
            return false;
        };
        if !player.alive {
            return false;
        }
        let Some(skill) = SkillDef::for_slot(player.class, request.slot) else {
            return false;
        };
        if !CombatSystem::can_cast(player.cooldowns[request.slot], now) {
            return false;
        }
        player.cooldowns[request.slot] = now + skill.cooldown_ms;

        let (aim_x, aim_y) = PhysicsSystem::unit(request.aim_x, request.aim_y)
            .unwrap_or((player.facing_x, player.facing_y));
        player.facing_x = aim_x;
        player.facing_y = aim_y;

        let multiplier = player.damage_multiplier(now);
        let power = player.power;
        let (px, py, pr) = (player.x, player.y, player.radius);

        match skill.kind {
            SkillKind::Melee {
                damage,
                range,
                arc_deg,
            } => {
                let hits: Vec<u32> = self
                    .live_mobs()
                    .filter(|m| {
                        let (dx, dy) = (m.x - px, m.y - py);
                        (dx * dx + dy * dy).sqrt() <= pr + range + m.radius
                            && CombatSystem::in_arc(aim_x, aim_y, dx, dy, arc_deg)
                    })
                    .map(|m| m.id)
                    .collect();
                for mob_id in hits {
                    self.damage_mob(mob_id, player_id, damage * multiplier);
                }
            }
            SkillKind::Area {
                damage,
                radius,
                stun_ms,
            } => {
                let hits: Vec<u32> = self
                    .live_mobs()
                    .filter(|m| PhysicsSystem::circles_overlap(px, py, radius, m.x, m.y, m.radius))
                    .map(|m| m.id)
                    .collect();
                for mob_id in hits {
                    if let Some(ms) = stun_ms {
                        self.stun_mob(mob_id, ms);
                    }
                    self.damage_mob(mob_id, player_id, damage * multiplier);
                }
            }
            SkillKind::Projectile {
                damage,
                speed,
                radius,
                ttl,
                on_hit,
                pierce,
            } => {
                self.spawn_projectile(
                    player_id,
                    (px, py, pr),
                    (aim_x, aim_y),
                    (speed, radius, ttl),
                    damage * multiplier,
                    on_hit,
                    pierce,
                );
            }
            SkillKind::Burst {
                count,
                spread_deg,
                damage,
                speed,
                radius,
                ttl,
            } => {
                for dir in CombatSystem::burst_directions(aim_x, aim_y, count, spread_deg) {
                    self.spawn_projectile(
                        player_id,
                        (px, py, pr),
                        dir,
                        (speed, radius, ttl),
                        damage * multiplier,
                        OnHit::Damage,
                        false,
                    );
                }
            }
            SkillKind::Buff {
                kind,
                multiplier: buff_multiplier,
                duration_ms,
            } => {
                let duration = (duration_ms as f32 * power).round() as u64;
                if let Some(player) = self.players.get_mut(&player_id) {
                    player.apply_buff(Buff {
                        kind,
                        multiplier: buff_multiplier,
                        expires_at: now + duration,
                    });
                }
            }
        }

        debug!(player_id = %player_id, skill = skill.name, "Skill cast");
        true
    }

    #[allow(clippy::too_many_arguments)]
    fn spawn_projectile(
        &mut self,
        owner_id: Uuid,
        (px, py, pr): (f32, f32, f32),
        (dir_x, dir_y): (f32, f32),
        (speed, radius, ttl): (f32, f32, f32),
        damage: f32,
        on_hit: OnHit,
        pierce: bool,
    ) {
        let offset = pr + radius;
        let id = self.next_projectile_id;
        self.next_projectile_id += 1;
        self.projectiles.push(Projectile::new(
            id,
            owner_id,
            px + dir_x * offset,
            py + dir_y * offset,
            dir_x,
            dir_y,
            speed,
            radius,
            ttl,
            damage,
            on_hit,
            pierce,
        ));
    }

    fn update_projectiles(&mut self, dt: f32) {
        let half = self.map.half_size();
        let mut outcomes = Vec::with_capacity(self.projectiles.len());

        for projectile in &mut self.projectiles {
            if !projectile.update(dt) || PhysicsSystem::out_of_bounds(projectile.x, projectile.y, half) {
                outcomes.push(ProjectileOutcome::Expire);
                continue;
            }

            let candidates = self.grid.query(projectile.x, projectile.y, projectile.radius);
            let hits_wall = candidates.iter().filter_map(|&i| self.walls.get(i)).any(|wall| {
                PhysicsSystem::circle_overlaps_wall(projectile.x, projectile.y, projectile.radius, wall)
            });
            if hits_wall {
                outcomes.push(ProjectileOutcome::Expire);
                continue;
            }

            let target = self
                .mobs
                .iter()
                .filter(|m| !m.dead && !projectile.hit.contains(&m.id))
                .find(|m| projectile.check_hit(m.x, m.y, m.radius));

            match target {
                Some(mob) => {
                    projectile.hit.insert(mob.id);
                    outcomes.push(ProjectileOutcome::Hit {
                        mob: mob.id,
                        keep: projectile.pierce,
                    });
                }
                None => outcomes.push(ProjectileOutcome::Keep),
            }
        }

        let projectiles = std::mem::take(&mut self.projectiles);
        let mut survivors = Vec::with_capacity(projectiles.len());

        for (projectile, outcome) in projectiles.into_iter().zip(outcomes) {
            match outcome {
                ProjectileOutcome::Keep => survivors.push(projectile),
                ProjectileOutcome::Expire => {}
                ProjectileOutcome::Hit { mob, keep } => {
                    self.apply_on_hit(&projectile, mob);
                    if keep {
                        survivors.push(projectile);
                    }
                }
            }
        }

        self.projectiles = survivors;
    }

    fn apply_on_hit(&mut self, projectile: &Projectile, mob_id: u32) {
        let owner = projectile.owner_id;
        match projectile.on_hit {
            OnHit::Damage => self.damage_mob(mob_id, owner, projectile.damage),
            OnHit::Stun { ms } => {
                self.stun_mob(mob_id, ms);
                self.damage_mob(mob_id, owner, projectile.damage);
            }
            OnHit::Burst {
                radius,
                splash_fraction,
            } => {
                self.damage_mob(mob_id, owner, projectile.damage);
                let (x, y) = (projectile.x, projectile.y);
                let splashed: Vec<u32> = self
                    .live_mobs()
                    .filter(|m| m.id != mob_id && PhysicsSystem::circles_overlap(x, y, radius, m.x, m.y, m.radius))
                    .map(|m| m.id)
                    .collect();
                for other in splashed {
                    self.damage_mob(other, owner, projectile.damage * splash_fraction);
                }
            }
        }
    }

    // ------------------------------------------------------------------
    // Damage, death and rewards
    // ------------------------------------------------------------------

    fn live_mobs(&self) -> impl Iterator<Item = &MobState> {
        self.mobs.iter().filter(|m| !m.dead)
    }

    fn stun_mob(&mut self, mob_id: u32, ms: u64) {
        let now = self.now;
        if let Some(mob) = self.mobs.get_mut(mob_id as usize).filter(|m| !m.dead) {
            mob.stunned_until = mob.stunned_until.max(now + ms);
        }
    }

    /// Damage a mob on behalf of a player; kills credit the top contributor
    pub fn damage_mob(&mut self, mob_id: u32, attacker: Uuid, amount: f32) {
        let now = self.now;
        let Some(mob) = self.mobs.get_mut(mob_id as usize) else {
            return;
        };
        if mob.dead {
            return;
        }

        let (hp, killed) = CombatSystem::apply_damage(mob.hp, amount);
        let dealt = mob.hp - hp;
        mob.hp = hp;
        *mob.damage_by.entry(attacker).or_insert(0.0) += dealt;

        self.outbox.push(ServerMsg::DamageEvent {
            source: EntityRef::Player(attacker),
            target: EntityRef::Mob(mob_id),
            amount: dealt,
            remaining_hp: hp,
        });

        if !killed {
            return;
        }

        let stats: MobStats = mob.stats();
        mob.dead = true;
        mob.vel_x = 0.0;
        mob.vel_y = 0.0;
        mob.target = None;
        mob.respawn_at = now + stats.respawn_secs * 1000;

        let players = &self.players;
        let killer = mob.kill_credit(|id| players.contains_key(id));

        self.outbox.push(ServerMsg::DeathEvent {
            victim: EntityRef::Mob(mob_id),
            killer: killer.map(EntityRef::Player),
        });

        if let Some(killer_id) = killer {
            self.reward(killer_id, stats.xp_reward, stats.gold_reward);
        }
    }

    fn reward(&mut self, player_id: Uuid, xp: u32, gold: u32) {
        let Some(player) = self.players.get_mut(&player_id) else {
            return;
        };
        player.gold = player.gold.saturating_add(gold);
        let gained = ProgressionSystem::award_xp(player, xp);
        if gained > 0 {
            info!(player_id = %player_id, level = player.level, "Player leveled up");
            self.outbox.push(ServerMsg::LevelUpEvent {
                player_id,
                level: player.level,
                max_hp: player.max_hp,
            });
        }
    }

    /// Damage a player; at zero hp the player is dead until they join again
    pub fn damage_player(&mut self, player_id: Uuid, source: EntityRef, amount: f32) {
        let Some(player) = self.players.get_mut(&player_id) else {
            return;
        };
        if !player.alive {
            return;
        }

        let (hp, killed) = CombatSystem::apply_damage(player.hp, amount);
        let dealt = player.hp - hp;
        player.hp = hp;

        self.outbox.push(ServerMsg::DamageEvent {
            source,
            target: EntityRef::Player(player_id),
            amount: dealt,
            remaining_hp: hp,
        });

        if killed {
            player.alive = false;
            player.vel_x = 0.0;
            player.vel_y = 0.0;
            player.pending_casts.clear();
            info!(player_id = %player_id, "Player died");
            self.outbox.push(ServerMsg::DeathEvent {
                victim: EntityRef::Player(player_id),
                killer: Some(source),
            });
        }
    }

    // ------------------------------------------------------------------
    // Spawning and fault isolation
    // ------------------------------------------------------------------

    fn spot_is_clear(&self, x: f32, y: f32, radius: f32) -> bool {
        self.grid
            .query(x, y, radius)
            .iter()
            .filter_map(|&i| self.walls.get(i))
            .all(|wall| !PhysicsSystem::circle_overlaps_wall(x, y, radius, wall))
    }

    /// Random wall-free position; falls back to the map center
    fn find_player_spawn(&mut self, radius: f32) -> (f32, f32) {
        let range = (self.map.half_size() * 0.8).max(1.0);
        for _ in 0..SPAWN_ATTEMPTS {
            let x = self.rng.gen_range(-range..range);
            let y = self.rng.gen_range(-range..range);
            if self.spot_is_clear(x, y, radius) {
                return (x, y);
            }
        }
        (0.0, 0.0)
    }

    /// Spawn point plus random jitter, pushed out of walls and kept on the map
    fn jittered_spawn(&mut self, x: f32, y: f32, radius: f32) -> (f32, f32) {
        let jx = self.rng.gen_range(-MOB_SPAWN_JITTER..=MOB_SPAWN_JITTER);
        let jy = self.rng.gen_range(-MOB_SPAWN_JITTER..=MOB_SPAWN_JITTER);
        let (x, y) = (x + jx, y + jy);
        let candidates = self.grid.query(x, y, radius);
        let (x, y, _, _) = PhysicsSystem::resolve_walls(x, y, 0.0, 0.0, radius, &self.walls, &candidates);
        PhysicsSystem::clamp_to_bounds(x, y, radius, self.map.half_size())
    }

    /// Reset any entity whose state went non-finite instead of poisoning the world
    fn sanitize(&mut self) {
        for player in self.players.values_mut() {
            if !(player.x.is_finite() && player.y.is_finite() && player.hp.is_finite()) {
                warn!(player_id = %player.id, "Non-finite player state, resetting to spawn");
                player.x = player.spawn_x;
                player.y = player.spawn_y;
                player.vel_x = 0.0;
                player.vel_y = 0.0;
                player.input_x = 0.0;
                player.input_y = 0.0;
                if !player.hp.is_finite() {
                    player.hp = player.max_hp;
                }
            }
        }

        for mob in &mut self.mobs {
            if !(mob.x.is_finite() && mob.y.is_finite() && mob.hp.is_finite()) {
                warn!(mob_id = mob.id, "Non-finite mob state, resetting to spawn");
                mob.revive(mob.spawn_x, mob.spawn_y);
            }
        }

        self.projectiles
            .retain(|p| p.x.is_finite() && p.y.is_finite() && p.ttl.is_finite());
    }
}
