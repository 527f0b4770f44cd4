//! Creature records and their per-creature AI scratch state.
use serde::{Deserialize, Serialize};
use std::collections::{BTreeMap, BTreeSet};
use std::fmt;

use crate::items::{ItemArena, ItemId};
use crate::numbers::percent_of;
use crate::player::PlayerId;
use crate::world::Pos;

#[derive(Debug, Clone, PartialEq, Eq, Hash, PartialOrd, Ord, Serialize, Deserialize)]
#[serde(transparent)]
pub struct CreatureId(pub String);

impl CreatureId {
    #[must_use]
    pub fn new(value: &str) -> Self {
        Self(value.trim().to_string())
    }

    #[must_use]
    pub fn as_str(&self) -> &str {
        &self.0
    }
}

impl fmt::Display for CreatureId {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(&self.0)
    }
}

/// Current and maximum hit points; `current` never drops below zero.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
pub struct Health {
    pub current: i32,
    pub max: i32,
}

impl Health {
    #[must_use]
    pub const fn new(current: i32, max: i32) -> Self {
        let current = if current < 0 { 0 } else { current };
        Self { current, max }
    }

    #[must_use]
    pub const fn full(max: i32) -> Self {
        Self::new(max, max)
    }

    #[must_use]
    pub const fn is_alive(&self) -> bool {
        self.current > 0
    }

    #[must_use]
    pub fn pct(&self) -> i32 {
        percent_of(i64::from(self.current), i64::from(self.max))
    }

    #[must_use]
    pub const fn missing(&self) -> i32 {
        let gap = self.max - self.current;
        if gap < 0 { 0 } else { gap }
    }

    /// Subtract `amount`, saturating at zero; returns the damage applied.
    pub fn damage(&mut self, amount: i32) -> i32 {
        let applied = amount.clamp(0, self.current);
        self.current -= applied;
        applied
    }

    /// Add up to `amount`, capped at `max`; returns the amount restored.
    pub fn heal(&mut self, amount: i32) -> i32 {
        let applied = amount.clamp(0, self.missing());
        self.current += applied;
        applied
    }
}

/// Natural attack a creature can use without a weapon.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct InnateAttack {
    pub name: String,
    pub power: i32,
}

/// Last known whereabouts of a tracked target.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
pub struct TargetSighting {
    pub pos: Pos,
    pub co_located: bool,
}

/// Broken gear waiting to be shed.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(tag = "slot", content = "item", rename_all = "snake_case")]
pub enum PendingDrop {
    Weapon(ItemId),
    Armour(ItemId),
}

/// Ephemeral AI bookkeeping; never consulted by non-AI code.
#[derive(Debug, Clone, Default, PartialEq, Eq, Serialize, Deserialize)]
pub struct AiScratch {
    /// Items this creature picked up itself; only these may be converted.
    #[serde(default)]
    pub picked_up: BTreeSet<ItemId>,
    #[serde(default)]
    pub pending_drops: Vec<PendingDrop>,
    #[serde(default)]
    pub target_positions: BTreeMap<PlayerId, TargetSighting>,
}

#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct Creature {
    pub id: CreatureId,
    /// Species key used for species overrides.
    pub template: String,
    #[serde(default)]
    pub name: String,
    /// `None` marks a malformed record that cannot act.
    #[serde(default)]
    pub pos: Option<Pos>,
    pub hp: Health,
    #[serde(default = "Creature::default_level")]
    pub level: i32,
    #[serde(default)]
    pub ions: i64,
    #[serde(default)]
    pub ions_max: i64,
    #[serde(default)]
    pub riblets: i64,
    #[serde(default)]
    pub wielded: Option<ItemId>,
    #[serde(default)]
    pub target_player_id: Option<PlayerId>,
    #[serde(default)]
    pub innate_attack: Option<InnateAttack>,
    #[serde(default)]
    pub prefers_ranged: Option<bool>,
    #[serde(default)]
    pub wake_on_look: Option<i32>,
    #[serde(default)]
    pub wake_on_entry: Option<i32>,
    #[serde(default)]
    pub ai: AiScratch,
}

impl Creature {
    const fn default_level() -> i32 {
        1
    }

    /// Minimal healthy creature at `pos`.
    #[must_use]
    pub fn new(id: &str, template: &str, pos: Pos, hp: i32) -> Self {
        Self {
            id: CreatureId::new(id),
            template: template.to_string(),
            name: template.replace('_', " "),
            pos: Some(pos),
            hp: Health::full(hp),
            level: 1,
            ions: 0,
            ions_max: 0,
            riblets: 0,
            wielded: None,
            target_player_id: None,
            innate_attack: None,
            prefers_ranged: None,
            wake_on_look: None,
            wake_on_entry: None,
            ai: AiScratch::default(),
        }
    }

    #[must_use]
    pub const fn is_alive(&self) -> bool {
        self.hp.is_alive()
    }

    #[must_use]
    pub fn display_name(&self) -> &str {
        if self.name.is_empty() {
            self.id.as_str()
        } else {
            &self.name
        }
    }

    /// Ion percentage; creatures without a pool read as full.
    #[must_use]
    pub fn ions_pct(&self) -> i32 {
        if self.ions_max <= 0 {
            return 100;
        }
        percent_of(self.ions, self.ions_max)
    }

    #[must_use]
    pub fn is_low_on_ions(&self, cutoff_pct: i32) -> bool {
        self.ions_max > 0 && self.ions_pct() < cutoff_pct
    }

    /// Whether the wielded item is a cracked weapon still in the bag.
    #[must_use]
    pub fn wielded_is_cracked(&self, items: &ItemArena) -> bool {
        self.wielded.is_some_and(|id| {
            items.in_bag(id, &self.id) && items.get(id).is_some_and(|r| r.is_cracked_weapon())
        })
    }

    /// Drop a dangling `wielded` reference; returns true if one was cleared.
    pub fn reconcile_wielded(&mut self, items: &ItemArena) -> bool {
        if let Some(id) = self.wielded
            && !items.in_bag(id, &self.id)
        {
            self.wielded = None;
            return true;
        }
        false
    }

    #[must_use]
    pub fn is_targeting(&self, player: &PlayerId) -> bool {
        self.target_player_id.as_ref() == Some(player)
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::constants::BROKEN_WEAPON_ID;
    use crate::items::Owner;

    #[test]
    fn health_never_drops_below_zero() {
        let mut hp = Health::new(4, 20);
        assert_eq!(hp.damage(10), 4);
        assert_eq!(hp.current, 0);
        assert!(!hp.is_alive());
        assert_eq!(hp.heal(50), 20);
        assert_eq!(Health::new(-3, 10).current, 0);
        assert_eq!(Health::new(4, 20).pct(), 20);
    }

    #[test]
    fn ions_pct_treats_missing_pool_as_full() {
        let mut creature = Creature::new("m1", "rat", Pos::new(2000, 0, 0), 10);
        assert_eq!(creature.ions_pct(), 100);
        assert!(!creature.is_low_on_ions(50));
        creature.ions = 10;
        creature.ions_max = 400;
        assert!(creature.is_low_on_ions(50));
    }

    #[test]
    fn wielded_crack_detection_requires_bag_membership() {
        let mut items = ItemArena::default();
        let mut creature = Creature::new("m1", "rat", Pos::new(2000, 0, 0), 10);
        let broken = items.mint(BROKEN_WEAPON_ID, 0, Owner::Bag(creature.id.clone()));
        creature.wielded = Some(broken);
        assert!(creature.wielded_is_cracked(&items));

        let stray = items.mint(BROKEN_WEAPON_ID, 0, Owner::Ground(Pos::new(2000, 0, 0)));
        creature.wielded = Some(stray);
        assert!(!creature.wielded_is_cracked(&items));
        assert!(creature.reconcile_wielded(&items));
        assert_eq!(creature.wielded, None);
    }

    #[test]
    fn creature_deserializes_with_defaults() {
        let creature: Creature = serde_json::from_str(
            r#"{ "id": "m7", "template": "ghoul", "hp": { "current": 3, "max": 9 } }"#,
        )
        .unwrap();
        assert_eq!(creature.level, 1);
        assert_eq!(creature.pos, None);
        assert!(creature.ai.picked_up.is_empty());
    }
}
