//! Creature store contract and its in-memory implementation.
use std::collections::BTreeMap;
use thiserror::Error;

use crate::creature::{Creature, CreatureId};
use crate::world::Pos;

#[derive(Debug, Error)]
pub enum StoreError {
    #[error("store I/O failed")]
    Io(#[from] std::io::Error),
    #[error("store serialization failed")]
    Serde(#[from] serde_json::Error),
    #[error("store backend rejected the write: {0}")]
    Backend(String),
}

/// Cache of live creatures, flushed explicitly at the end of each tick.
pub trait CreatureStore {
    /// Every creature id in stable order.
    fn list_all(&self) -> Vec<CreatureId>;

    /// Ids of creatures standing on `pos`, in stable order.
    fn list_at(&self, pos: Pos) -> Vec<CreatureId>;

    fn get(&self, id: &CreatureId) -> Option<&Creature>;

    fn get_mut(&mut self, id: &CreatureId) -> Option<&mut Creature>;

    fn insert(&mut self, creature: Creature);

    /// Remove a creature outright, returning its record.
    fn remove(&mut self, id: &CreatureId) -> Option<Creature>;

    fn mark_dirty(&mut self);

    fn is_dirty(&self) -> bool;

    /// Persist dirty creatures and clear the dirty flag.
    ///
    /// # Errors
    ///
    /// Returns `StoreError` when the backing store rejects the write.
    fn save(&mut self) -> Result<(), StoreError>;
}

/// `BTreeMap`-backed store; `save` snapshots the current roster as JSON.
#[derive(Debug, Clone, Default)]
pub struct MemoryCreatureStore {
    creatures: BTreeMap<CreatureId, Creature>,
    dirty: bool,
    snapshot: Option<String>,
    saves: u32,
}

impl MemoryCreatureStore {
    #[must_use]
    pub fn from_creatures(creatures: impl IntoIterator<Item = Creature>) -> Self {
        let mut store = Self::default();
        for creature in creatures {
            store.creatures.insert(creature.id.clone(), creature);
        }
        store
    }

    #[must_use]
    pub const fn saves(&self) -> u32 {
        self.saves
    }

    /// JSON written by the latest `save`.
    #[must_use]
    pub fn snapshot(&self) -> Option<&str> {
        self.snapshot.as_deref()
    }
}

impl CreatureStore for MemoryCreatureStore {
    fn list_all(&self) -> Vec<CreatureId> {
        self.creatures.keys().cloned().collect()
    }

    fn list_at(&self, pos: Pos) -> Vec<CreatureId> {
        self.creatures
            .values()
            .filter(|creature| creature.pos == Some(pos))
            .map(|creature| creature.id.clone())
            .collect()
    }

    fn get(&self, id: &CreatureId) -> Option<&Creature> {
        self.creatures.get(id)
    }

    fn get_mut(&mut self, id: &CreatureId) -> Option<&mut Creature> {
        self.creatures.get_mut(id)
    }

    fn insert(&mut self, creature: Creature) {
        self.creatures.insert(creature.id.clone(), creature);
        self.dirty = true;
    }

    fn remove(&mut self, id: &CreatureId) -> Option<Creature> {
        let removed = self.creatures.remove(id);
        if removed.is_some() {
            self.dirty = true;
        }
        removed
    }

    fn mark_dirty(&mut self) {
        self.dirty = true;
    }

    fn is_dirty(&self) -> bool {
        self.dirty
    }

    fn save(&mut self) -> Result<(), StoreError> {
        let roster: Vec<&Creature> = self.creatures.values().collect();
        self.snapshot = Some(serde_json::to_string(&roster)?);
        self.saves = self.saves.saturating_add(1);
        self.dirty = false;
        Ok(())
    }
}
