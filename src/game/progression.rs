//! XP, leveling and equipment stat aggregation

use super::entity::{ItemDef, PlayerState, EQUIPMENT_SLOTS};

/// Base max hp (and current hp) granted per level
pub const LEVEL_HP_BONUS: f32 = 20.0;

/// Growth factor of the next-level threshold
pub const LEVEL_XP_GROWTH: f32 = 1.5;

/// Every this many levels grants a power bonus
pub const POWER_LEVEL_INTERVAL: u32 = 5;

/// Multiplicative power bonus on those levels
pub const POWER_BONUS: f32 = 1.10;

pub struct ProgressionSystem;

impl ProgressionSystem {
    /// Add XP and apply every level-up it crosses. Returns levels gained.
    pub fn award_xp(player: &mut PlayerState, amount: u32) -> u32 {
        player.xp = player.xp.saturating_add(amount);

        let mut gained = 0;
        while player.xp >= player.next_level_xp {
            player.xp -= player.next_level_xp;
            player.level += 1;
            gained += 1;

            player.base_max_hp += LEVEL_HP_BONUS;
            if player.alive {
                player.hp += LEVEL_HP_BONUS;
            }
            player.next_level_xp = Self::next_threshold(player.next_level_xp);

            if player.level % POWER_LEVEL_INTERVAL == 0 {
                player.power *= POWER_BONUS;
            }
        }

        if gained > 0 {
            Self::refresh_max_hp(player);
        }
        gained
    }

    pub fn next_threshold(current: u32) -> u32 {
        ((current as f32 * LEVEL_XP_GROWTH).round() as u32).max(current + 1)
    }

    /// Put an item into a slot (or clear it). Returns false for an invalid slot.
    pub fn equip(player: &mut PlayerState, slot: usize, item: Option<&'static ItemDef>) -> bool {
        if slot >= EQUIPMENT_SLOTS {
            return false;
        }
        player.equipment[slot] = item;
        Self::recompute_stats(player);
        true
    }

    /// Rebuild equipment-derived stats. Current hp shifts by the max hp delta
    /// so a gear change never kills or overheals.
    pub fn recompute_stats(player: &mut PlayerState) {
        let equipped = player.equipment.iter().flatten();
        let (hp_bonus, damage_bonus, speed_bonus) = equipped.fold((0.0, 0.0, 0.0), |acc, item| {
            (
                acc.0 + item.max_hp_bonus,
                acc.1 + item.damage_bonus,
                acc.2 + item.speed_bonus,
            )
        });

        player.damage_bonus = damage_bonus;
        player.speed_bonus = speed_bonus;

        let old_max = player.max_hp;
        player.max_hp = player.base_max_hp + hp_bonus;
        if player.alive {
            let shifted = player.hp + (player.max_hp - old_max);
            player.hp = shifted.clamp(1.0_f32.min(player.max_hp), player.max_hp);
        }
    }

    fn refresh_max_hp(player: &mut PlayerState) {
        let hp_bonus: f32 = player
            .equipment
            .iter()
            .flatten()
            .map(|item| item.max_hp_bonus)
            .sum();
        player.max_hp = player.base_max_hp + hp_bonus;
        player.hp = player.hp.min(player.max_hp);
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::ws::protocol::PlayerClass;
    use proptest::prelude::*;
    use uuid::Uuid;

    fn player() -> PlayerState {
        PlayerState::new(Uuid::nil(), "p".into(), PlayerClass::Ranger, 0.0, 0.0, 0)
    }

    #[test]
    fn test_single_level_up() {
        let mut p = player();
        assert_eq!(ProgressionSystem::award_xp(&mut p, 130), 1);
        assert_eq!(p.level, 2);
        assert_eq!(p.xp, 30);
        assert_eq!(p.next_level_xp, 150);
        assert_eq!(p.max_hp, 130.0);
        assert_eq!(p.hp, 130.0);
    }

    #[test]
    fn test_large_award_crosses_several_levels() {
        let mut p = player();
        // 100 + 150 + 225 = 475
        let gained = ProgressionSystem::award_xp(&mut p, 480);
        assert_eq!(gained, 3);
        assert_eq!(p.level, 4);
        assert_eq!(p.xp, 5);
        assert_eq!(p.next_level_xp, 338);
    }

    #[test]
    fn test_fifth_level_grants_power() {
        let mut p = player();
        ProgressionSystem::award_xp(&mut p, 100 + 150 + 225 + 338);
        assert_eq!(p.level, 5);
        assert!((p.power - POWER_BONUS).abs() < 1e-6);
    }

    #[test]
    fn test_equip_at_full_health_keeps_full_health() {
        let mut p = player();
        let before = p.max_hp;
        let mail = ItemDef::find("chain_mail");
        assert!(ProgressionSystem::equip(&mut p, 1, mail));
        assert_eq!(p.max_hp, before + 50.0);
        assert_eq!(p.hp, p.max_hp);
        assert_eq!(p.speed_bonus, -10.0);
    }

    #[test]
    fn test_unequip_never_kills() {
        let mut p = player();
        ProgressionSystem::equip(&mut p, 0, ItemDef::find("chain_mail"));
        p.hp = 20.0;
        ProgressionSystem::equip(&mut p, 0, None);
        assert_eq!(p.max_hp, 110.0);
        assert_eq!(p.hp, 1.0);
    }

    #[test]
    fn test_equip_invalid_slot_is_noop() {
        let mut p = player();
        assert!(!ProgressionSystem::equip(&mut p, EQUIPMENT_SLOTS, ItemDef::find("iron_helm")));
        assert_eq!(p.max_hp, 110.0);
    }

    #[test]
    fn test_level_hp_stacks_with_equipment() {
        let mut p = player();
        ProgressionSystem::equip(&mut p, 0, ItemDef::find("iron_helm"));
        ProgressionSystem::award_xp(&mut p, 100);
        assert_eq!(p.max_hp, 110.0 + 20.0 + 30.0);
        assert_eq!(p.hp, p.max_hp);
    }

    proptest! {
        #[test]
        fn prop_batched_xp_matches_incremental(chunks in prop::collection::vec(1u32..400, 1..20)) {
            let total: u32 = chunks.iter().sum();

            let mut batched = player();
            ProgressionSystem::award_xp(&mut batched, total);

            let mut incremental = player();
            for chunk in &chunks {
                ProgressionSystem::award_xp(&mut incremental, *chunk);
            }

            prop_assert_eq!(batched.level, incremental.level);
            prop_assert_eq!(batched.xp, incremental.xp);
            prop_assert_eq!(batched.next_level_xp, incremental.next_level_xp);
            prop_assert_eq!(batched.max_hp, incremental.max_hp);
            prop_assert_eq!(batched.hp, incremental.hp);
        }
    }
}
