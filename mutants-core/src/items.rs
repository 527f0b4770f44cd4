//! Item arena with exclusive, tagged ownership.
//!
//! Every item instance lives in exactly one place: a creature's bag, a
//! creature's armour slot, the ground at a tile, or a player's inventory.
//! Moves go through [`ItemArena::transfer`], which checks the current owner
//! before re-tagging, so no caller ever has to sweep other containers.
use serde::{Deserialize, Serialize};
use std::collections::BTreeMap;
use std::fmt;
use thiserror::Error;

use crate::constants::{BROKEN_ARMOUR_ID, BROKEN_WEAPON_ID};
use crate::creature::CreatureId;
use crate::player::PlayerId;
use crate::world::Pos;

#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, PartialOrd, Ord, Serialize, Deserialize)]
#[serde(transparent)]
pub struct ItemId(pub u64);

impl fmt::Display for ItemId {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "i{}", self.0)
    }
}

/// Current holder of an item.
#[derive(Debug, Clone, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(tag = "kind", content = "ref", rename_all = "snake_case")]
pub enum Owner {
    Bag(CreatureId),
    Armour(CreatureId),
    Ground(Pos),
    Player(PlayerId),
}

impl fmt::Display for Owner {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            Self::Bag(id) => write!(f, "bag:{id}"),
            Self::Armour(id) => write!(f, "armour:{id}"),
            Self::Ground(pos) => write!(f, "ground:{pos}"),
            Self::Player(id) => write!(f, "player:{id}"),
        }
    }
}

/// Where a bag item came from.
#[derive(Debug, Clone, Copy, Default, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum ItemOrigin {
    #[default]
    Native,
    /// Picked up from the world by the current holder.
    World,
}

#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct ItemRecord {
    pub id: ItemId,
    pub catalog_id: String,
    #[serde(default)]
    pub enchant: i32,
    #[serde(default)]
    pub origin: ItemOrigin,
    /// Template the item had before it cracked.
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub cracked_from: Option<String>,
    owner: Owner,
    /// Arrival order within the owner; bags list items by it.
    seq: u64,
}

impl ItemRecord {
    #[must_use]
    pub const fn owner(&self) -> &Owner {
        &self.owner
    }

    /// Either broken placeholder.
    #[must_use]
    pub fn is_broken(&self) -> bool {
        self.catalog_id == BROKEN_WEAPON_ID || self.catalog_id == BROKEN_ARMOUR_ID
    }

    /// A broken weapon with no enchant left to hold it together.
    #[must_use]
    pub fn is_cracked_weapon(&self) -> bool {
        self.catalog_id == BROKEN_WEAPON_ID && self.enchant <= 0
    }
}

#[derive(Debug, Clone, PartialEq, Eq, Error)]
pub enum ItemError {
    #[error("unknown item {0}")]
    UnknownItem(ItemId),
    #[error("item {item} is held by {actual}, not {expected}")]
    OwnershipMismatch {
        item: ItemId,
        expected: Owner,
        actual: Owner,
    },
}

/// Arena owning every item instance.
#[derive(Debug, Clone, Default, PartialEq, Eq, Serialize, Deserialize)]
pub struct ItemArena {
    items: BTreeMap<ItemId, ItemRecord>,
    next_id: u64,
    next_seq: u64,
}

impl ItemArena {
    /// Create a new item held by `owner`.
    pub fn mint(&mut self, catalog_id: &str, enchant: i32, owner: Owner) -> ItemId {
        self.next_id = self.next_id.saturating_add(1);
        let id = ItemId(self.next_id);
        let seq = self.bump_seq();
        self.items.insert(
            id,
            ItemRecord {
                id,
                catalog_id: catalog_id.to_string(),
                enchant,
                origin: ItemOrigin::Native,
                cracked_from: None,
                owner,
                seq,
            },
        );
        id
    }

    #[must_use]
    pub fn get(&self, id: ItemId) -> Option<&ItemRecord> {
        self.items.get(&id)
    }

    #[must_use]
    pub fn contains(&self, id: ItemId) -> bool {
        self.items.contains_key(&id)
    }

    #[must_use]
    pub fn len(&self) -> usize {
        self.items.len()
    }

    #[must_use]
    pub fn is_empty(&self) -> bool {
        self.items.is_empty()
    }

    /// Move `id` from `from` to `to`.
    ///
    /// # Errors
    ///
    /// Returns `ItemError::UnknownItem` for a stale id and
    /// `ItemError::OwnershipMismatch` when `from` is not the current holder.
    pub fn transfer(&mut self, id: ItemId, from: &Owner, to: Owner) -> Result<(), ItemError> {
        self.check_owner(id, from)?;
        let seq = self.bump_seq();
        let record = self.items.get_mut(&id).ok_or(ItemError::UnknownItem(id))?;
        record.owner = to;
        record.seq = seq;
        Ok(())
    }

    /// Delete `id`, which must currently be held by `from`.
    ///
    /// # Errors
    ///
    /// Same conditions as [`ItemArena::transfer`].
    pub fn remove(&mut self, id: ItemId, from: &Owner) -> Result<ItemRecord, ItemError> {
        self.check_owner(id, from)?;
        self.items.remove(&id).ok_or(ItemError::UnknownItem(id))
    }

    /// Tag where an item came from.
    ///
    /// # Errors
    ///
    /// Returns `ItemError::UnknownItem` for a stale id.
    pub fn set_origin(&mut self, id: ItemId, origin: ItemOrigin) -> Result<(), ItemError> {
        let record = self.items.get_mut(&id).ok_or(ItemError::UnknownItem(id))?;
        record.origin = origin;
        Ok(())
    }

    /// Replace an item with its broken placeholder in place, remembering the
    /// template it was cracked from.
    ///
    /// # Errors
    ///
    /// Returns `ItemError::UnknownItem` for a stale id.
    pub fn crack(&mut self, id: ItemId, placeholder: &str) -> Result<(), ItemError> {
        let record = self.items.get_mut(&id).ok_or(ItemError::UnknownItem(id))?;
        if !record.is_broken() {
            record.cracked_from = Some(record.catalog_id.clone());
        }
        record.catalog_id = placeholder.to_string();
        record.enchant = 0;
        Ok(())
    }

    /// Items held by `owner`, in arrival order.
    #[must_use]
    pub fn owned_by(&self, owner: &Owner) -> Vec<&ItemRecord> {
        let mut held: Vec<&ItemRecord> = self
            .items
            .values()
            .filter(|record| &record.owner == owner)
            .collect();
        held.sort_by_key(|record| record.seq);
        held
    }

    #[must_use]
    pub fn bag(&self, creature: &CreatureId) -> Vec<&ItemRecord> {
        self.owned_by(&Owner::Bag(creature.clone()))
    }

    #[must_use]
    pub fn armour(&self, creature: &CreatureId) -> Option<&ItemRecord> {
        self.owned_by(&Owner::Armour(creature.clone()))
            .into_iter()
            .next()
    }

    #[must_use]
    pub fn ground_at(&self, pos: Pos) -> Vec<&ItemRecord> {
        self.owned_by(&Owner::Ground(pos))
    }

    /// True when `id` sits in `creature`'s bag.
    #[must_use]
    pub fn in_bag(&self, id: ItemId, creature: &CreatureId) -> bool {
        self.items
            .get(&id)
            .is_some_and(|record| matches!(&record.owner, Owner::Bag(holder) if holder == creature))
    }

    /// Move everything `from` holds to `to`, returning the moved ids.
    pub fn release_all(&mut self, from: &Owner, to: &Owner) -> Vec<ItemId> {
        let ids: Vec<ItemId> = self.owned_by(from).iter().map(|record| record.id).collect();
        for id in &ids {
            if let Err(err) = self.transfer(*id, from, to.clone()) {
                log::error!("release of {id} from {from} failed: {err}");
            }
        }
        ids
    }

    fn check_owner(&self, id: ItemId, expected: &Owner) -> Result<(), ItemError> {
        let record = self.items.get(&id).ok_or(ItemError::UnknownItem(id))?;
        if &record.owner != expected {
            return Err(ItemError::OwnershipMismatch {
                item: id,
                expected: expected.clone(),
                actual: record.owner.clone(),
            });
        }
        Ok(())
    }

    fn bump_seq(&mut self) -> u64 {
        self.next_seq = self.next_seq.saturating_add(1);
        self.next_seq
    }
}
