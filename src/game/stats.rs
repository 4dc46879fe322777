//! Combat Content Tables
//!
//! Every kind of combatant, damage type, status, ability and upgrade, with the
//! level-1 numbers the pipeline reads. Durations are stored in milliseconds and
//! converted to ticks with [`ms_to_ticks`](crate::core::fixed::ms_to_ticks) at
//! the configured tick rate; speeds are in units per second and converted to
//! per-tick steps at spawn.

use serde::{Deserialize, Serialize};

use crate::core::fixed::Fixed;

// =============================================================================
// SIDES & KINDS
// =============================================================================

/// Which side of the field a combatant fights for.
#[derive(Clone, Copy, Debug, PartialEq, Eq, PartialOrd, Ord, Hash, Serialize, Deserialize)]
#[repr(u8)]
pub enum Side {
    /// The player (or the PvP build that sorts first).
    Home = 0,
    /// Enemies (or the mirrored PvP build).
    Away = 1,
}

impl Side {
    /// The other side.
    #[inline]
    pub const fn opponent(self) -> Side {
        match self {
            Side::Home => Side::Away,
            Side::Away => Side::Home,
        }
    }

    /// Array index (0 or 1).
    #[inline]
    pub const fn index(self) -> usize {
        self as usize
    }
}

/// Mobile player units.
#[derive(Clone, Copy, Debug, PartialEq, Eq, PartialOrd, Ord, Hash, Serialize, Deserialize)]
#[repr(u8)]
pub enum UnitKind {
    /// Melee bruiser.
    Knight = 0,
    /// Ranged, marks its targets.
    Archer = 1,
    /// Ranged frost caster, slows its targets.
    Mage = 2,
}

/// Static structures.
#[derive(Clone, Copy, Debug, PartialEq, Eq, PartialOrd, Ord, Hash, Serialize, Deserialize)]
#[repr(u8)]
pub enum DefenseKind {
    /// Fast single-target tower with a crit chance.
    ArrowTower = 0,
    /// Slow tower with splash damage.
    CannonTower = 1,
    /// Weak tower that slows.
    FrostTower = 2,
    /// Short-range fire, applies burn.
    Brazier = 3,
    /// Does not attack; boosts nearby allies' damage.
    Beacon = 4,
}

/// Wave enemies.
#[derive(Clone, Copy, Debug, PartialEq, Eq, PartialOrd, Ord, Hash, Serialize, Deserialize)]
#[repr(u8)]
pub enum EnemyKind {
    /// Baseline melee.
    Grunt = 0,
    /// Fast and fragile.
    Runner = 1,
    /// Slow and heavy.
    Brute = 2,
    /// Ranged fire spitter.
    Spitter = 3,
}

impl EnemyKind {
    /// Kinds available in a wave, in draw order.
    pub fn pool_for_wave(wave: u32) -> &'static [EnemyKind] {
        const W1: &[EnemyKind] = &[EnemyKind::Grunt];
        const W2: &[EnemyKind] = &[EnemyKind::Grunt, EnemyKind::Runner];
        const W3: &[EnemyKind] = &[EnemyKind::Grunt, EnemyKind::Runner, EnemyKind::Spitter];
        const W4: &[EnemyKind] =
            &[EnemyKind::Grunt, EnemyKind::Runner, EnemyKind::Spitter, EnemyKind::Brute];
        match wave {
            0 | 1 => W1,
            2 => W2,
            3 => W3,
            _ => W4,
        }
    }
}

/// Tagged kind of every combatant in the world.
#[derive(Clone, Copy, Debug, PartialEq, Eq, PartialOrd, Ord, Hash, Serialize, Deserialize)]
pub enum CombatantKind {
    /// Player unit.
    Unit(UnitKind),
    /// Player structure.
    Defense(DefenseKind),
    /// Wave enemy.
    Enemy(EnemyKind),
    /// The base a side must protect.
    Objective,
}

impl CombatantKind {
    /// Stable byte code used by the canonical state hash.
    pub const fn code(self) -> u8 {
        match self {
            CombatantKind::Objective => 0x01,
            CombatantKind::Unit(k) => 0x10 | k as u8,
            CombatantKind::Defense(k) => 0x20 | k as u8,
            CombatantKind::Enemy(k) => 0x30 | k as u8,
        }
    }

    /// Can this combatant move?
    pub fn is_mobile(self) -> bool {
        matches!(self, CombatantKind::Unit(_) | CombatantKind::Enemy(_))
    }
}

/// Damage element.
#[derive(Clone, Copy, Debug, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[repr(u8)]
pub enum DamageType {
    /// Blades, arrows, cannonballs.
    Physical = 0,
    /// Fire.
    Fire = 1,
    /// Frost.
    Frost = 2,
}

/// Status effect kinds. At most one instance of each per combatant.
#[derive(Clone, Copy, Debug, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[repr(u8)]
pub enum StatusKind {
    /// Periodic fire damage.
    Burn = 0,
    /// Movement speed reduction.
    Slow = 1,
    /// Increases damage taken.
    Mark = 2,
}

/// Castable abilities.
#[derive(Clone, Copy, Debug, PartialEq, Eq, PartialOrd, Ord, Hash, Serialize, Deserialize)]
#[repr(u8)]
pub enum AbilityKind {
    /// Delayed fire impact in an area.
    Meteor = 0,
    /// Leaves a persistent slowing field.
    FrostNova = 1,
    /// Heals the objective.
    Repair = 2,
}

/// Upgrades offered after a wave is cleared.
#[derive(Clone, Copy, Debug, PartialEq, Eq, PartialOrd, Ord, Hash, Serialize, Deserialize)]
#[repr(u8)]
pub enum UpgradeKind {
    /// +15% damage for the player side.
    Sharpen = 0,
    /// -10% attack cooldown for the player side.
    Haste = 1,
    /// +10% objective max health (and heal by the same amount).
    Fortify = 2,
    /// +25% resources from kills.
    Bounty = 3,
    /// Spawn a knight next to the objective.
    Reinforce = 4,
}

impl UpgradeKind {
    /// The full pool in canonical order. Prompts shuffle a copy of this.
    pub const ALL: [UpgradeKind; 5] = [
        UpgradeKind::Sharpen,
        UpgradeKind::Haste,
        UpgradeKind::Fortify,
        UpgradeKind::Bounty,
        UpgradeKind::Reinforce,
    ];
}

// =============================================================================
// STAT TABLES
// =============================================================================

/// How a combatant attacks.
#[derive(Clone, Copy, Debug, PartialEq, Eq)]
pub struct AttackProfile {
    /// Damage per hit
    pub damage: Fixed,
    /// Attack range
    pub range: Fixed,
    /// Time between attacks
    pub cooldown_ms: u32,
    /// Projectile speed in units/s; zero means the hit lands instantly
    pub projectile_speed: Fixed,
    /// Element
    pub damage_type: DamageType,
    /// Secondary targets within this radius of the impact take splash damage
    pub splash_radius: Fixed,
    /// Crit chance in whole percent
    pub crit_percent: u32,
    /// Status applied to the primary target
    pub on_hit: Option<StatusKind>,
}

/// Damage bonus granted to nearby allies.
#[derive(Clone, Copy, Debug, PartialEq, Eq, Serialize, Deserialize)]
pub struct AuraProfile {
    /// Radius of effect
    pub radius: Fixed,
    /// Bonus in whole percent
    pub bonus_percent: i32,
}

/// Level-1 stats of one combatant kind.
#[derive(Clone, Copy, Debug, PartialEq, Eq)]
pub struct BaseStats {
    /// Maximum health (objective health comes from the balance knobs instead)
    pub max_health: Fixed,
    /// Movement speed in units per second
    pub speed: Fixed,
    /// Attack, if the kind attacks at all
    pub attack: Option<AttackProfile>,
    /// Aura, if the kind emits one
    pub aura: Option<AuraProfile>,
    /// Element this kind takes extra damage from
    pub weakness: Option<DamageType>,
    /// Resources granted when killed
    pub bounty: u32,
}

const fn attack(
    damage: i32,
    range_milli: i32,
    cooldown_ms: u32,
    projectile_speed: i32,
    damage_type: DamageType,
) -> AttackProfile {
    AttackProfile {
        damage: Fixed::from_int(damage),
        range: Fixed::from_milli(range_milli),
        cooldown_ms,
        projectile_speed: Fixed::from_int(projectile_speed),
        damage_type,
        splash_radius: Fixed::ZERO,
        crit_percent: 0,
        on_hit: None,
    }
}

const fn stationary(max_health: i32, attack: Option<AttackProfile>) -> BaseStats {
    BaseStats {
        max_health: Fixed::from_int(max_health),
        speed: Fixed::ZERO,
        attack,
        aura: None,
        weakness: None,
        bounty: 0,
    }
}

/// Level-1 stats for a unit.
pub const fn unit_stats(kind: UnitKind) -> BaseStats {
    match kind {
        UnitKind::Knight => BaseStats {
            max_health: Fixed::from_int(120),
            speed: Fixed::from_int(3),
            attack: Some(attack(12, 1000, 1000, 0, DamageType::Physical)),
            aura: None,
            weakness: None,
            bounty: 0,
        },
        UnitKind::Archer => BaseStats {
            max_health: Fixed::from_int(70),
            speed: Fixed::from_int(3),
            attack: Some(AttackProfile {
                on_hit: Some(StatusKind::Mark),
                ..attack(9, 7000, 900, 14, DamageType::Physical)
            }),
            aura: None,
            weakness: None,
            bounty: 0,
        },
        UnitKind::Mage => BaseStats {
            max_health: Fixed::from_int(60),
            speed: Fixed::from_milli(2500),
            attack: Some(AttackProfile {
                on_hit: Some(StatusKind::Slow),
                ..attack(7, 6000, 1200, 10, DamageType::Frost)
            }),
            aura: None,
            weakness: None,
            bounty: 0,
        },
    }
}

/// Level-1 stats for a defense.
pub const fn defense_stats(kind: DefenseKind) -> BaseStats {
    match kind {
        DefenseKind::ArrowTower => stationary(
            200,
            Some(AttackProfile {
                crit_percent: 10,
                ..attack(8, 9000, 700, 16, DamageType::Physical)
            }),
        ),
        DefenseKind::CannonTower => stationary(
            260,
            Some(AttackProfile {
                splash_radius: Fixed::from_milli(1500),
                ..attack(18, 8000, 2000, 9, DamageType::Physical)
            }),
        ),
        DefenseKind::FrostTower => stationary(
            180,
            Some(AttackProfile {
                on_hit: Some(StatusKind::Slow),
                ..attack(4, 7000, 1000, 12, DamageType::Frost)
            }),
        ),
        DefenseKind::Brazier => stationary(
            160,
            Some(AttackProfile {
                on_hit: Some(StatusKind::Burn),
                ..attack(5, 5000, 800, 0, DamageType::Fire)
            }),
        ),
        DefenseKind::Beacon => BaseStats {
            aura: Some(AuraProfile { radius: Fixed::from_int(5), bonus_percent: 15 }),
            ..stationary(150, None)
        },
    }
}

/// Level-1 stats for an enemy (wave 1, non-elite).
pub const fn enemy_stats(kind: EnemyKind) -> BaseStats {
    match kind {
        EnemyKind::Grunt => BaseStats {
            max_health: Fixed::from_int(40),
            speed: Fixed::from_int(2),
            attack: Some(attack(6, 1000, 1000, 0, DamageType::Physical)),
            aura: None,
            weakness: Some(DamageType::Fire),
            bounty: 5,
        },
        EnemyKind::Runner => BaseStats {
            max_health: Fixed::from_int(25),
            speed: Fixed::from_int(4),
            attack: Some(attack(4, 1000, 700, 0, DamageType::Physical)),
            aura: None,
            weakness: Some(DamageType::Physical),
            bounty: 4,
        },
        EnemyKind::Brute => BaseStats {
            max_health: Fixed::from_int(140),
            speed: Fixed::from_milli(1200),
            attack: Some(attack(16, 1200, 1600, 0, DamageType::Physical)),
            aura: None,
            weakness: Some(DamageType::Frost),
            bounty: 12,
        },
        EnemyKind::Spitter => BaseStats {
            max_health: Fixed::from_int(35),
            speed: Fixed::from_milli(1800),
            attack: Some(attack(7, 6000, 1500, 8, DamageType::Fire)),
            aura: None,
            weakness: Some(DamageType::Physical),
            bounty: 8,
        },
    }
}

/// Stats for any non-objective kind. The objective has no table entry:
/// its health comes from the balance knobs.
pub const fn base_stats(kind: CombatantKind) -> Option<BaseStats> {
    match kind {
        CombatantKind::Unit(k) => Some(unit_stats(k)),
        CombatantKind::Defense(k) => Some(defense_stats(k)),
        CombatantKind::Enemy(k) => Some(enemy_stats(k)),
        CombatantKind::Objective => None,
    }
}

// =============================================================================
// MODIFIERS
// =============================================================================

/// Percent bonus per level above 1 (health and damage).
pub const LEVEL_BONUS_PERCENT: i32 = 10;
/// Highest level accepted in a loadout.
pub const MAX_LEVEL: u8 = 10;

/// Elite health multiplier (percent).
pub const ELITE_HEALTH_PERCENT: i32 = 250;
/// Elite damage multiplier (percent).
pub const ELITE_DAMAGE_PERCENT: i32 = 150;
/// Elite bounty multiplier.
pub const ELITE_BOUNTY_MULT: u32 = 3;

/// Damage multiplier when the element matches the target's weakness.
pub const WEAKNESS_PERCENT: i32 = 150;
/// Crit damage multiplier.
pub const CRIT_PERCENT: i32 = 150;
/// Splash damage dealt to secondary targets.
pub const SPLASH_PERCENT: i32 = 60;

/// Combo bonus per stack.
pub const COMBO_PERCENT_PER_STACK: i32 = 5;
/// Combo stack cap.
pub const COMBO_MAX_STACKS: u8 = 10;
/// Hits further apart than this reset the combo.
pub const COMBO_WINDOW_MS: u32 = 2500;

/// Burn damage per pulse.
pub const BURN_DAMAGE: Fixed = Fixed::from_int(3);
/// Ticks between burn pulses.
pub const BURN_PERIOD_TICKS: u32 = 10;
/// Burn duration.
pub const BURN_DURATION_MS: u32 = 3000;
/// Slow strength from on-hit slows (percent).
pub const SLOW_PERCENT: i32 = 40;
/// On-hit slow duration.
pub const SLOW_DURATION_MS: u32 = 2000;
/// Mark damage amplification (percent).
pub const MARK_PERCENT: i32 = 15;
/// Mark duration.
pub const MARK_DURATION_MS: u32 = 3000;

/// Sharpen damage bonus per stack (percent).
pub const SHARPEN_PERCENT: i32 = 15;
/// Haste cooldown reduction per stack (percent).
pub const HASTE_PERCENT: u32 = 10;
/// Haste stacks beyond this have no effect.
pub const HASTE_MAX_STACKS: u32 = 5;
/// Fortify objective health bonus (percent of base health).
pub const FORTIFY_PERCENT: i32 = 10;
/// Bounty resource bonus per stack (percent).
pub const BOUNTY_PERCENT: u32 = 25;

// =============================================================================
// ABILITIES
// =============================================================================

/// Tunables for the castable abilities.
#[derive(Clone, Copy, Debug, PartialEq, Eq)]
pub struct AbilityProfile {
    /// Cooldown after a cast
    pub cooldown_ms: u32,
    /// Effect radius (zero for untargeted)
    pub radius: Fixed,
    /// Damage or healing amount
    pub power: Fixed,
    /// Delay for meteor, field lifetime for frost nova
    pub duration_ms: u32,
    /// Slow strength for frost nova (percent)
    pub slow_percent: i32,
}

/// Abilities must target a point within this distance of the caster's objective.
pub const ABILITY_RANGE: Fixed = Fixed::from_int(30);

/// Meteor impact delay, in ticks (not scaled by tick rate).
pub const METEOR_DELAY_TICKS: u32 = 20;

/// Tunables for an ability.
pub const fn ability_profile(kind: AbilityKind) -> AbilityProfile {
    match kind {
        AbilityKind::Meteor => AbilityProfile {
            cooldown_ms: 20_000,
            radius: Fixed::from_int(3),
            power: Fixed::from_int(60),
            duration_ms: 0,
            slow_percent: 0,
        },
        AbilityKind::FrostNova => AbilityProfile {
            cooldown_ms: 25_000,
            radius: Fixed::from_int(4),
            power: Fixed::ZERO,
            duration_ms: 4_000,
            slow_percent: 50,
        },
        AbilityKind::Repair => AbilityProfile {
            cooldown_ms: 40_000,
            radius: Fixed::ZERO,
            power: Fixed::from_int(150),
            duration_ms: 0,
            slow_percent: 0,
        },
    }
}

/// Percent multiplier for a level (level 1 is 100).
#[inline]
pub const fn level_percent(level: u8) -> i32 {
    let above = if level > 1 { level as i32 - 1 } else { 0 };
    100 + LEVEL_BONUS_PERCENT * above
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_kind_codes_are_unique() {
        let mut codes = vec![CombatantKind::Objective.code()];
        for k in [UnitKind::Knight, UnitKind::Archer, UnitKind::Mage] {
            codes.push(CombatantKind::Unit(k).code());
        }
        for k in [
            DefenseKind::ArrowTower,
            DefenseKind::CannonTower,
            DefenseKind::FrostTower,
            DefenseKind::Brazier,
            DefenseKind::Beacon,
        ] {
            codes.push(CombatantKind::Defense(k).code());
        }
        for k in [EnemyKind::Grunt, EnemyKind::Runner, EnemyKind::Brute, EnemyKind::Spitter] {
            codes.push(CombatantKind::Enemy(k).code());
        }
        let total = codes.len();
        codes.sort();
        codes.dedup();
        assert_eq!(codes.len(), total);
    }

    #[test]
    fn test_elite_scaling_does_not_saturate() {
        let objective_sized = Fixed::from_int(1000);
        assert_eq!(objective_sized.mul_percent(ELITE_HEALTH_PERCENT), Fixed::from_int(2500));
        assert_eq!(Fixed::from_int(10).mul_percent(SPLASH_PERCENT), Fixed::from_int(6));
    }

    #[test]
    fn test_level_percent() {
        assert_eq!(level_percent(0), 100);
        assert_eq!(level_percent(1), 100);
        assert_eq!(level_percent(3), 120);
    }

    #[test]
    fn test_enemy_pool_grows() {
        assert_eq!(EnemyKind::pool_for_wave(1), &[EnemyKind::Grunt]);
        assert_eq!(EnemyKind::pool_for_wave(9).len(), 4);
    }

    #[test]
    fn test_beacon_has_aura_not_attack() {
        let beacon = defense_stats(DefenseKind::Beacon);
        assert!(beacon.attack.is_none());
        assert_eq!(beacon.aura.map(|a| a.bonus_percent), Some(15));
    }
}
