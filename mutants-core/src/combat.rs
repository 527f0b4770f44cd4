//! Damage resolution seam.
//!
//! The cascade only decides *that* a creature attacks and with what; the
//! arithmetic behind a hit belongs to a [`DamageEngine`].
use rand::{Rng, RngCore};
use serde::{Deserialize, Serialize};
use std::fmt;

use crate::catalog::ItemCatalog;
use crate::creature::Creature;
use crate::items::ItemRecord;
use crate::player::Player;

#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum AttackSource {
    Melee,
    Bolt,
    Innate,
}

impl AttackSource {
    #[must_use]
    pub const fn as_str(self) -> &'static str {
        match self {
            Self::Melee => "melee",
            Self::Bolt => "bolt",
            Self::Innate => "innate",
        }
    }
}

impl fmt::Display for AttackSource {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.as_str())
    }
}

#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
pub struct DamageResult {
    pub damage: i32,
    pub source: AttackSource,
    /// The weapon degraded to its broken placeholder during this hit.
    pub weapon_worn: bool,
}

pub trait DamageEngine {
    /// Resolve one attack against the player.
    fn resolve_attack(
        &mut self,
        weapon: Option<&ItemRecord>,
        source: AttackSource,
        attacker: &Creature,
        defender: &Player,
        catalog: &ItemCatalog,
        rng: &mut dyn RngCore,
    ) -> DamageResult;
}

/// Weapon or innate power, less a point per defender level, with a chance
/// that a non-broken weapon wears out.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct StandardDamage {
    pub wear_pct: i32,
}

impl Default for StandardDamage {
    fn default() -> Self {
        Self { wear_pct: 5 }
    }
}

impl DamageEngine for StandardDamage {
    fn resolve_attack(
        &mut self,
        weapon: Option<&ItemRecord>,
        source: AttackSource,
        attacker: &Creature,
        defender: &Player,
        catalog: &ItemCatalog,
        rng: &mut dyn RngCore,
    ) -> DamageResult {
        let power = match (source, weapon) {
            (AttackSource::Innate, _) | (_, None) => {
                attacker.innate_attack.as_ref().map_or(1, |innate| innate.power)
            }
            (_, Some(record)) => catalog.base_damage(record),
        };
        let damage = power.saturating_sub(defender.level.max(1) - 1).max(0);
        let weapon_worn = match weapon {
            Some(record) if source != AttackSource::Innate && !record.is_broken() => {
                rng.gen_range(0..100) < self.wear_pct
            }
            _ => false,
        };
        DamageResult {
            damage,
            source,
            weapon_worn,
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::catalog::ItemTemplate;
    use crate::creature::InnateAttack;
    use crate::items::{ItemArena, Owner};
    use crate::world::Pos;
    use rand::rngs::mock::StepRng;

    #[test]
    fn weapon_power_drives_damage() {
        let mut catalog = ItemCatalog::with_placeholders();
        catalog.insert(ItemTemplate::new("club", 6, 10));
        let attacker = Creature::new("m1", "ogre", Pos::new(2000, 0, 0), 20);
        let mut defender = Player::new("p1", Pos::new(2000, 0, 0), 30);
        defender.level = 3;
        let mut items = ItemArena::default();
        let club = items.mint("club", 1, Owner::Bag(attacker.id.clone()));
        let mut engine = StandardDamage { wear_pct: 0 };
        let mut rng = StepRng::new(0, 1);
        let result = engine.resolve_attack(
            items.get(club),
            AttackSource::Melee,
            &attacker,
            &defender,
            &catalog,
            &mut rng,
        );
        assert_eq!(result.damage, 8);
        assert!(!result.weapon_worn);
    }

    #[test]
    fn innate_ignores_weapon_and_never_wears() {
        let catalog = ItemCatalog::with_placeholders();
        let mut attacker = Creature::new("m1", "wyrm", Pos::new(2000, 0, 0), 20);
        attacker.innate_attack = Some(InnateAttack {
            name: "bite".to_string(),
            power: 4,
        });
        let defender = Player::new("p1", Pos::new(2000, 0, 0), 30);
        let mut engine = StandardDamage { wear_pct: 100 };
        let mut rng = StepRng::new(0, 1);
        let result =
            engine.resolve_attack(None, AttackSource::Innate, &attacker, &defender, &catalog, &mut rng);
        assert_eq!(result.damage, 4);
        assert_eq!(result.source.as_str(), "innate");
        assert!(!result.weapon_worn);
    }
}
