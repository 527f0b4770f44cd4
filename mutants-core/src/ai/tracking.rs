//! Last known target positions and re-entry detection.
use std::collections::BTreeSet;

use crate::creature::{CreatureId, TargetSighting};
use crate::player::PlayerId;
use crate::store::CreatureStore;
use crate::world::Pos;

/// Record `player_pos` for every creature targeting `player_id`.
///
/// Returns the creatures whose target just arrived on their tile: a prior
/// sighting existed, was not co-located, and the new one is.
pub fn update_target_positions(
    creatures: &mut dyn CreatureStore,
    player_id: &PlayerId,
    player_pos: Pos,
) -> BTreeSet<CreatureId> {
    let mut reentered = BTreeSet::new();
    let mut touched = false;
    for id in creatures.list_all() {
        let Some(creature) = creatures.get_mut(&id) else {
            continue;
        };
        if !creature.is_targeting(player_id) {
            continue;
        }
        let co_located = creature.pos == Some(player_pos);
        let sighting = TargetSighting {
            pos: player_pos,
            co_located,
        };
        let previous = creature.ai.target_positions.insert(player_id.clone(), sighting);
        if previous != Some(sighting) {
            touched = true;
        }
        if previous.is_some_and(|prior| !prior.co_located) && co_located {
            reentered.insert(id);
        }
    }
    if touched {
        creatures.mark_dirty();
    }
    reentered
}
