//! World container threaded through the scheduler and the AI.
use std::rc::Rc;

use crate::catalog::ItemCatalog;
use crate::combat::{DamageEngine, StandardDamage};
use crate::config::CombatConfig;
use crate::creature::{Creature, CreatureId};
use crate::feedback::FeedbackBus;
use crate::items::{ItemArena, ItemId, Owner};
use crate::player::{Player, PlayerStore};
use crate::scheduler::FreeActionQueue;
use crate::spawner::Spawner;
use crate::species::SpeciesTable;
use crate::status::StatusManager;
use crate::store::CreatureStore;
use crate::turnlog::TurnLog;
use crate::world::{EdgeResolver, GridMap, Pos};

/// Creature record removed by [`SimState::kill_creature`] and what it dropped.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct KilledCreature {
    pub creature: Creature,
    pub drops: Vec<ItemId>,
    pub pos: Option<Pos>,
}

/// Everything one tick reads or writes.
pub struct SimState {
    pub config: Rc<CombatConfig>,
    pub species: SpeciesTable,
    pub catalog: ItemCatalog,
    pub creatures: Box<dyn CreatureStore>,
    pub players: Box<dyn PlayerStore>,
    pub items: ItemArena,
    pub damage: Box<dyn DamageEngine>,
    pub edges: Box<dyn EdgeResolver>,
    pub feedback: FeedbackBus,
    pub turnlog: TurnLog,
    pub status: Option<StatusManager>,
    pub spawner: Option<Box<dyn Spawner>>,
    /// Where a dead player comes back.
    pub respawn_point: Option<Pos>,
    pub free_actions: FreeActionQueue,
}

impl SimState {
    /// State with default catalog, grid and damage engine.
    #[must_use]
    pub fn new(
        config: CombatConfig,
        creatures: Box<dyn CreatureStore>,
        players: Box<dyn PlayerStore>,
    ) -> Self {
        Self {
            config: Rc::new(config),
            species: SpeciesTable::default(),
            catalog: ItemCatalog::with_placeholders(),
            creatures,
            players,
            items: ItemArena::default(),
            damage: Box::new(StandardDamage::default()),
            edges: Box::new(GridMap::default()),
            feedback: FeedbackBus::default(),
            turnlog: TurnLog::default(),
            status: None,
            spawner: None,
            respawn_point: None,
            free_actions: FreeActionQueue::default(),
        }
    }

    #[must_use]
    pub fn with_species(mut self, species: SpeciesTable) -> Self {
        self.species = species;
        self
    }

    #[must_use]
    pub fn with_catalog(mut self, catalog: ItemCatalog) -> Self {
        self.catalog = catalog;
        self
    }

    #[must_use]
    pub fn with_items(mut self, items: ItemArena) -> Self {
        self.items = items;
        self
    }

    #[must_use]
    pub fn with_damage(mut self, damage: Box<dyn DamageEngine>) -> Self {
        self.damage = damage;
        self
    }

    #[must_use]
    pub fn with_edges(mut self, edges: Box<dyn EdgeResolver>) -> Self {
        self.edges = edges;
        self
    }

    #[must_use]
    pub fn with_status(mut self, status: StatusManager) -> Self {
        self.status = Some(status);
        self
    }

    #[must_use]
    pub fn with_spawner(mut self, spawner: Box<dyn Spawner>) -> Self {
        self.spawner = Some(spawner);
        self
    }

    #[must_use]
    pub const fn with_respawn_point(mut self, pos: Pos) -> Self {
        self.respawn_point = Some(pos);
        self
    }

    #[must_use]
    pub fn creature(&self, id: &CreatureId) -> Option<&Creature> {
        self.creatures.get(id)
    }

    #[must_use]
    pub fn active_player(&self) -> Option<&Player> {
        self.players.active()
    }

    /// Whether a non-broken item lies on `pos`.
    #[must_use]
    pub fn has_ground_loot(&self, pos: Pos) -> bool {
        self.items.ground_at(pos).iter().any(|item| !item.is_broken())
    }

    /// Remove a creature, spilling its bag and armour onto its tile.
    ///
    /// Items of a creature without a position stay where they are.
    pub fn kill_creature(&mut self, id: &CreatureId) -> Option<KilledCreature> {
        let mut creature = self.creatures.remove(id)?;
        let pos = creature.pos;
        let mut drops = Vec::new();
        if let Some(pos) = pos {
            let ground = Owner::Ground(pos);
            drops.extend(self.items.release_all(&Owner::Bag(id.clone()), &ground));
            drops.extend(self.items.release_all(&Owner::Armour(id.clone()), &ground));
        }
        creature.wielded = None;
        creature.target_player_id = None;
        creature.ai = crate::creature::AiScratch::default();
        if let Some(player) = self.players.active_mut()
            && player.ready_target.as_ref() == Some(id)
        {
            player.ready_target = None;
        }
        self.creatures.mark_dirty();
        Some(KilledCreature {
            creature,
            drops,
            pos,
        })
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::player::MemoryPlayerStore;
    use crate::store::MemoryCreatureStore;

    #[test]
    fn kill_spills_bag_and_armour_to_ground() {
        let here = Pos::new(2000, 2, 2);
        let mut creature = Creature::new("m1", "ogre", here, 10);
        let mut items = ItemArena::default();
        let sword = items.mint("sword", 0, Owner::Bag(creature.id.clone()));
        let mail = items.mint("mail", 0, Owner::Armour(creature.id.clone()));
        creature.wielded = Some(sword);
        let mut player = Player::new("p1", here, 20);
        player.ready_target = Some(creature.id.clone());

        let mut state = SimState::new(
            CombatConfig::default(),
            Box::new(MemoryCreatureStore::from_creatures([creature])),
            Box::new(MemoryPlayerStore::with_active(player)),
        )
        .with_items(items);

        let killed = state.kill_creature(&CreatureId::new("m1")).unwrap();
        assert_eq!(killed.drops, vec![sword, mail]);
        assert_eq!(killed.pos, Some(here));
        assert_eq!(killed.creature.wielded, None);
        assert_eq!(state.items.ground_at(here).len(), 2);
        assert!(state.creature(&CreatureId::new("m1")).is_none());
        assert_eq!(state.active_player().unwrap().ready_target, None);
        assert!(state.kill_creature(&CreatureId::new("m1")).is_none());
    }
}
