//! Snapshot building

use crate::ws::protocol::{BuffSnapshot, MobSnapshot, PlayerSnapshot, ProjectileSnapshot, ServerMsg};

use super::world::World;

/// Builds snapshots for network transmission
pub struct SnapshotBuilder {
    /// Tick counter since last snapshot
    ticks_since_snapshot: u32,
    /// Snapshot interval in ticks
    snapshot_interval: u32,
}

impl SnapshotBuilder {
    pub fn new(snapshot_interval: u32) -> Self {
        Self {
            ticks_since_snapshot: 0,
            snapshot_interval: snapshot_interval.max(1),
        }
    }

    /// Check if it's time to send a snapshot
    pub fn should_send(&mut self) -> bool {
        self.ticks_since_snapshot += 1;
        if self.ticks_since_snapshot >= self.snapshot_interval {
            self.ticks_since_snapshot = 0;
            true
        } else {
            false
        }
    }

    /// Force snapshot on next check (used after joins)
    pub fn force_next(&mut self) {
        self.ticks_since_snapshot = self.snapshot_interval;
    }

    /// Build a full snapshot of the world. Dead mobs are left out.
    pub fn build(&self, world: &World) -> ServerMsg {
        let now = world.now;

        let players = world
            .players
            .values()
            .map(|p| PlayerSnapshot {
                id: p.id,
                name: p.name.clone(),
                class: p.class,
                x: p.x,
                y: p.y,
                vel_x: p.vel_x,
                vel_y: p.vel_y,
                radius: p.radius,
                hp: p.hp,
                max_hp: p.max_hp,
                alive: p.alive,
                level: p.level,
                xp: p.xp,
                next_level_xp: p.next_level_xp,
                gold: p.gold,
                last_input_seq: p.last_input_seq,
                cooldowns: p.cooldowns.iter().map(|ready| ready.saturating_sub(now)).collect(),
                buffs: p
                    .buffs
                    .iter()
                    .map(|b| BuffSnapshot {
                        kind: b.kind,
                        multiplier: b.multiplier,
                        remaining_ms: b.expires_at.saturating_sub(now),
                    })
                    .collect(),
                equipment: p
                    .equipment
                    .iter()
                    .map(|slot| slot.map(|item| item.id.to_string()))
                    .collect(),
            })
            .collect();

        let mobs = world
            .mobs
            .iter()
            .filter(|m| !m.dead)
            .map(|m| MobSnapshot {
                id: m.id,
                mob_type: m.mob_type,
                x: m.x,
                y: m.y,
                radius: m.radius,
                hp: m.hp,
                max_hp: m.max_hp,
                stunned: m.is_stunned(now),
                target: m.target,
            })
            .collect();

        let projectiles = world
            .projectiles
            .iter()
            .map(|p| ProjectileSnapshot {
                id: p.id,
                owner: p.owner_id,
                x: p.x,
                y: p.y,
                vel_x: p.vel_x,
                vel_y: p.vel_y,
                radius: p.radius,
            })
            .collect();

        ServerMsg::Snapshot {
            tick: world.tick,
            time: now,
            players,
            mobs,
            projectiles,
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::game::geometry::{MapDescription, MobSpawn};
    use crate::game::world::WorldSettings;
    use crate::ws::protocol::{MobType, PlayerClass};
    use uuid::Uuid;

    fn world() -> World {
        let mut map = MapDescription::default_arena(2400.0);
        map.mob_spawns = vec![
            MobSpawn {
                x: 300.0,
                y: 300.0,
                mob_type: MobType::Slime,
            },
            MobSpawn {
                x: -300.0,
                y: 300.0,
                mob_type: MobType::Wolf,
            },
        ];
        World::new(
            map,
            WorldSettings {
                seed: 1,
                tick_rate: 20,
                session_timeout_ms: 30_000,
                max_players: 4,
            },
        )
    }

    #[test]
    fn test_interval() {
        let mut builder = SnapshotBuilder::new(3);
        assert!(!builder.should_send());
        assert!(!builder.should_send());
        assert!(builder.should_send());
        builder.force_next();
        assert!(builder.should_send());
    }

    #[test]
    fn test_snapshot_skips_dead_mobs() {
        let mut world = world();
        let id = Uuid::from_u128(1);
        world.join(id, "ana".into(), PlayerClass::Ranger);
        world.damage_mob(0, id, 1000.0);

        let builder = SnapshotBuilder::new(1);
        match builder.build(&world) {
            ServerMsg::Snapshot { players, mobs, .. } => {
                assert_eq!(players.len(), 1);
                assert_eq!(players[0].cooldowns, vec![0, 0, 0]);
                assert_eq!(players[0].equipment, vec![None, None, None, None]);
                assert_eq!(mobs.len(), 1);
                assert_eq!(mobs[0].id, 1);
            }
            other => panic!("unexpected {other:?}"),
        }
    }

    #[test]
    fn test_cooldowns_report_remaining_time() {
        let mut world = world();
        let id = Uuid::from_u128(1);
        world.join(id, "ana".into(), PlayerClass::Ranger);
        world.players.get_mut(&id).unwrap().cooldowns[1] = world.now + 1500;

        let builder = SnapshotBuilder::new(1);
        let ServerMsg::Snapshot { players, .. } = builder.build(&world) else {
            panic!("expected snapshot");
        };
        assert_eq!(players[0].cooldowns[1], 1500);
    }
}
