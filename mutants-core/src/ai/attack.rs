//! Melee, bolt or innate: which attack a creature uses.
use rand::{Rng, RngCore};
use serde::{Deserialize, Serialize};

use crate::catalog::ItemCatalog;
use crate::combat::AttackSource;
use crate::constants::{
    BARE_HANDED_ID, CRACKED_POWER_DEN, CRACKED_POWER_NUM, INNATE_BASELINE_WEIGHT,
    INNATE_PREFERENCE_FACTOR, RANGED_PREFERENCE_FACTOR, WEAPON_WEIGHT_FLOOR,
};
use crate::context::{Context, ContextExt, ContextKey};
use crate::creature::Creature;
use crate::items::{ItemId, ItemRecord};
use crate::numbers::round_f64_to_i32;
use crate::state::SimState;

#[derive(Debug, Clone, Copy, Default, PartialEq, Eq, Serialize, Deserialize)]
pub struct AttackWeights {
    pub melee: i32,
    pub bolt: i32,
    pub innate: i32,
}

impl AttackWeights {
    fn weighted(self) -> impl Iterator<Item = (AttackSource, i32)> {
        [
            (AttackSource::Melee, self.melee),
            (AttackSource::Bolt, self.bolt),
            (AttackSource::Innate, self.innate),
        ]
        .into_iter()
        .filter(|(_, weight)| *weight > 0)
    }

    #[must_use]
    pub fn total(self) -> i32 {
        self.weighted().map(|(_, weight)| weight).sum()
    }
}

#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
pub struct AttackPlan {
    pub source: AttackSource,
    /// Weapon used for melee and bolt attacks.
    pub item: Option<ItemId>,
    pub weights: AttackWeights,
    /// `None` when only one source was available.
    pub roll: Option<i32>,
}

#[derive(Debug, Clone, Copy)]
struct Candidate {
    id: ItemId,
    power: i32,
    bare_handed: bool,
}

/// Power score of a weapon; cracked weapons score three quarters of the
/// template they were cracked from.
#[must_use]
pub fn weapon_power(catalog: &ItemCatalog, record: &ItemRecord) -> i32 {
    if !record.is_cracked_weapon() {
        return catalog.base_damage(record);
    }
    let intact = record
        .cracked_from
        .as_deref()
        .and_then(|id| catalog.get(id))
        .map_or_else(|| catalog.base_damage(record), |template| template.base_power.max(0));
    intact.saturating_mul(CRACKED_POWER_NUM) / CRACKED_POWER_DEN
}

fn strongest<'a>(
    records: impl Iterator<Item = &'a ItemRecord>,
    catalog: &ItemCatalog,
    wielded: Option<ItemId>,
) -> Option<Candidate> {
    let mut best: Option<Candidate> = None;
    for record in records {
        let candidate = Candidate {
            id: record.id,
            power: weapon_power(catalog, record),
            bare_handed: record.catalog_id == BARE_HANDED_ID,
        };
        best = match best {
            None => Some(candidate),
            Some(current) if candidate.power > current.power => Some(candidate),
            Some(current)
                if candidate.power == current.power && Some(candidate.id) == wielded =>
            {
                Some(candidate)
            }
            keep => keep,
        };
    }
    best
}

/// `prefers_ranged`: context override, creature field, then species.
fn resolve_prefers_ranged(creature: &Creature, state: &SimState, ctx: &dyn Context) -> bool {
    ctx.flag(ContextKey::PrefersRanged)
        .or(creature.prefers_ranged)
        .or_else(|| state.species.prefers_ranged(&creature.template))
        .unwrap_or(false)
}

/// Pick the attack source for `creature`.
///
/// Draws once from `rng` only when more than one source carries weight.
pub fn select_attack(
    creature: &Creature,
    state: &SimState,
    ctx: &dyn Context,
    rng: &mut dyn RngCore,
) -> AttackPlan {
    let catalog = &state.catalog;
    let bag = state.items.bag(&creature.id);
    let weapons: Vec<&ItemRecord> = bag
        .into_iter()
        .filter(|record| catalog.is_weapon(record) && !catalog.is_armour(record))
        .collect();
    let mut melee = strongest(
        weapons.iter().copied().filter(|r| !catalog.is_ranged(r)),
        catalog,
        creature.wielded,
    );
    let bolt = strongest(
        weapons.iter().copied().filter(|r| catalog.is_ranged(r)),
        catalog,
        creature.wielded,
    );

    let innate_power = creature.innate_attack.as_ref().map(|innate| innate.power.max(0));
    if let (Some(candidate), Some(innate)) = (melee, innate_power)
        && candidate.bare_handed
        && innate >= candidate.power
    {
        melee = None;
    }

    let prefers_ranged = resolve_prefers_ranged(creature, state, ctx);
    let prefers_innate = state.species.prefers_innate(&creature.template);

    let mut weights = AttackWeights {
        melee: melee.map_or(0, |c| c.power),
        bolt: bolt.map_or(0, |c| {
            if prefers_ranged {
                round_f64_to_i32(f64::from(c.power) * RANGED_PREFERENCE_FACTOR)
            } else {
                c.power
            }
        }),
        innate: innate_power.map_or(0, |power| {
            if prefers_innate {
                round_f64_to_i32(f64::from(power) * INNATE_PREFERENCE_FACTOR)
            } else {
                power
            }
        }),
    };

    match (melee.is_some(), bolt.is_some()) {
        (true, true) => {
            weights.melee = weights.melee.max(WEAPON_WEIGHT_FLOOR);
            weights.bolt = weights.bolt.max(WEAPON_WEIGHT_FLOOR);
        }
        (true, false) => weights.melee = 2 * weights.melee.max(WEAPON_WEIGHT_FLOOR),
        (false, true) => weights.bolt = 2 * weights.bolt.max(WEAPON_WEIGHT_FLOOR),
        (false, false) => {
            if innate_power.is_some() {
                weights.innate = INNATE_BASELINE_WEIGHT;
            }
        }
    }

    let item_for = |source: AttackSource| match source {
        AttackSource::Melee => melee.map(|c| c.id),
        AttackSource::Bolt => bolt.map(|c| c.id),
        AttackSource::Innate => None,
    };

    let available: Vec<(AttackSource, i32)> = weights.weighted().collect();
    match available.as_slice() {
        [] => AttackPlan {
            source: AttackSource::Innate,
            item: None,
            weights,
            roll: None,
        },
        [(source, _)] => AttackPlan {
            source: *source,
            item: item_for(*source),
            weights,
            roll: None,
        },
        _ => {
            let total = weights.total();
            let roll = rng.gen_range(0..total);
            let mut cumulative = 0;
            let mut chosen = available[available.len() - 1].0;
            for (source, weight) in &available {
                cumulative += weight;
                if roll < cumulative {
                    chosen = *source;
                    break;
                }
            }
            AttackPlan {
                source: chosen,
                item: item_for(chosen),
                weights,
                roll: Some(roll),
            }
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::catalog::ItemTemplate;
    use crate::config::CombatConfig;
    use crate::constants::BROKEN_WEAPON_ID;
    use crate::context::{ContextMap, ContextValue};
    use crate::creature::InnateAttack;
    use crate::items::Owner;
    use crate::player::{MemoryPlayerStore, Player};
    use crate::rng::CountingRng;
    use crate::store::MemoryCreatureStore;
    use crate::world::Pos;
    use rand::rngs::mock::StepRng;

    fn state_with(bag: &[(&str, i32)], creature: &Creature) -> (SimState, Vec<ItemId>) {
        let mut catalog = ItemCatalog::with_placeholders();
        catalog.insert(ItemTemplate::new("sword", 12, 100));
        catalog.insert(ItemTemplate::new("dagger", 4, 20));
        catalog.insert(ItemTemplate::new("crossbow", 10, 80).ranged());
        catalog.insert(ItemTemplate::new("mail", 0, 60).armour());
        catalog.insert(ItemTemplate::new(BARE_HANDED_ID, 2, 0));
        let mut state = SimState::new(
            CombatConfig::default(),
            Box::new(MemoryCreatureStore::from_creatures([creature.clone()])),
            Box::new(MemoryPlayerStore::with_active(Player::new(
                "p1",
                Pos::new(2000, 0, 0),
                20,
            ))),
        )
        .with_catalog(catalog);
        let ids = bag
            .iter()
            .map(|(item, enchant)| {
                state
                    .items
                    .mint(item, *enchant, Owner::Bag(creature.id.clone()))
            })
            .collect();
        (state, ids)
    }

    fn ogre() -> Creature {
        Creature::new("m1", "ogre", Pos::new(2000, 0, 0), 20)
    }

    #[test]
    fn single_weapon_needs_no_roll() {
        let creature = ogre();
        let (state, ids) = state_with(&[("dagger", 0), ("sword", 0), ("mail", 0)], &creature);
        let mut rng = CountingRng::new(StepRng::new(0, 1));
        let plan = select_attack(&creature, &state, &ContextMap::new(), &mut rng);
        assert_eq!(plan.source, AttackSource::Melee);
        assert_eq!(plan.item, Some(ids[1]));
        assert_eq!(plan.weights.melee, 24);
        assert_eq!(plan.roll, None);
        assert_eq!(rng.draws(), 0);
    }

    #[test]
    fn ties_prefer_the_wielded_weapon() {
        let mut creature = ogre();
        let (state, ids) = state_with(&[("dagger", 0), ("dagger", 0)], &creature);
        creature.wielded = Some(ids[1]);
        let plan = select_attack(&creature, &state, &ContextMap::new(), &mut StepRng::new(0, 1));
        assert_eq!(plan.item, Some(ids[1]));
        assert_eq!(plan.weights.melee, 20);
    }

    #[test]
    fn mixed_bag_rolls_over_weights() {
        let creature = ogre();
        let (state, ids) = state_with(&[("dagger", 0), ("crossbow", 0)], &creature);
        let mut ctx = ContextMap::new();
        ctx.set(ContextKey::PrefersRanged, Some(ContextValue::Flag(true)));
        let plan = select_attack(&creature, &state, &ctx, &mut StepRng::new(0, 0));
        assert_eq!(plan.weights.melee, 10);
        assert_eq!(plan.weights.bolt, 12);
        assert_eq!(plan.roll, Some(0));
        assert_eq!(plan.source, AttackSource::Melee);
        assert_eq!(plan.item, Some(ids[0]));
    }

    #[test]
    fn cracked_weapon_scores_three_quarters() {
        let mut catalog = ItemCatalog::with_placeholders();
        catalog.insert(ItemTemplate::new("sword", 12, 0));
        let mut items = crate::items::ItemArena::default();
        let id = items.mint("sword", 0, Owner::Ground(Pos::new(2000, 0, 0)));
        assert_eq!(weapon_power(&catalog, items.get(id).unwrap()), 12);
        items.crack(id, BROKEN_WEAPON_ID).unwrap();
        assert_eq!(weapon_power(&catalog, items.get(id).unwrap()), 9);

        let bare = items.mint(BROKEN_WEAPON_ID, 0, Owner::Ground(Pos::new(2000, 0, 0)));
        assert_eq!(weapon_power(&catalog, items.get(bare).unwrap()), 0);
    }

    #[test]
    fn skull_yields_to_strong_innate() {
        let mut creature = ogre();
        creature.innate_attack = Some(InnateAttack {
            name: "maul".to_string(),
            power: 6,
        });
        let (state, _) = state_with(&[(BARE_HANDED_ID, 0)], &creature);
        let plan = select_attack(&creature, &state, &ContextMap::new(), &mut StepRng::new(0, 1));
        assert_eq!(plan.weights.melee, 0);
        assert_eq!(plan.weights.innate, INNATE_BASELINE_WEIGHT);
        assert_eq!(plan.source, AttackSource::Innate);
        assert_eq!(plan.item, None);
    }

    #[test]
    fn empty_handed_creature_falls_back_to_innate() {
        let creature = ogre();
        let (state, _) = state_with(&[("mail", 0)], &creature);
        let plan = select_attack(&creature, &state, &ContextMap::new(), &mut StepRng::new(0, 1));
        assert_eq!(plan.source, AttackSource::Innate);
        assert_eq!(plan.weights, AttackWeights::default());
        assert_eq!(plan.roll, None);
    }
}
