//! Single-step pursuit of a tracked target.
use rand::RngCore;
use serde_json::json;
use smallvec::SmallVec;

use crate::constants::{
    LOG_AI_PURSUIT, PURSUIT_BASE_CHANCE, PURSUIT_CRACKED_PENALTY, PURSUIT_HP_DISTRACTION_PCT,
    PURSUIT_HP_PENALTY, PURSUIT_ION_PENALTY, PURSUIT_LOOT_PENALTY,
};
use crate::creature::CreatureId;
use crate::numbers::clamp_pct;
use crate::rng::percent_roll;
use crate::state::SimState;
use crate::world::{Direction, Pos};

#[derive(Debug, Clone, PartialEq, Eq)]
pub struct PursuitAttempt {
    pub moved: bool,
    pub reason: String,
    pub roll: Option<i32>,
    pub threshold: Option<i32>,
    pub modifiers: SmallVec<[&'static str; 4]>,
    pub mode: Option<&'static str>,
    pub path_len: Option<usize>,
    /// Position after the attempt.
    pub pos: Option<Pos>,
}

impl PursuitAttempt {
    fn refused(reason: &str, pos: Option<Pos>) -> Self {
        Self {
            moved: false,
            reason: reason.to_string(),
            roll: None,
            threshold: None,
            modifiers: SmallVec::new(),
            mode: None,
            path_len: None,
            pos,
        }
    }
}

/// Move `creature_id` one step toward `target` if the distraction roll allows.
///
/// Returns true iff the creature moved.
pub fn attempt_pursuit(
    state: &mut SimState,
    creature_id: &CreatureId,
    target: Pos,
    rng: &mut dyn RngCore,
) -> bool {
    pursue(state, creature_id, target, rng).moved
}

/// [`attempt_pursuit`] with the full attempt record.
pub fn pursue(
    state: &mut SimState,
    creature_id: &CreatureId,
    target: Pos,
    rng: &mut dyn RngCore,
) -> PursuitAttempt {
    let attempt = plan_pursuit(state, creature_id, target, rng);
    if attempt.moved {
        if let Some(creature) = state.creatures.get_mut(creature_id) {
            creature.pos = attempt.pos;
        }
        state.creatures.mark_dirty();
    }
    state.turnlog.emit(
        LOG_AI_PURSUIT,
        json!({
            "monster": creature_id.as_str(),
            "success": attempt.moved,
            "reason": attempt.reason,
            "roll": attempt.roll,
            "threshold": attempt.threshold,
            "modifiers": attempt.modifiers.to_vec(),
            "mode": attempt.mode,
            "path_len": attempt.path_len,
            "pos": attempt.pos.map(|p| p.to_string()),
            "target": target.to_string(),
        }),
    );
    attempt
}

fn plan_pursuit(
    state: &SimState,
    creature_id: &CreatureId,
    target: Pos,
    rng: &mut dyn RngCore,
) -> PursuitAttempt {
    let Some(creature) = state.creatures.get(creature_id) else {
        return PursuitAttempt::refused("missing-monster", None);
    };
    let Some(start) = creature.pos else {
        return PursuitAttempt::refused("invalid-pos", None);
    };
    if !start.same_year(&target) {
        return PursuitAttempt::refused("cross-year", Some(start));
    }
    if start == target {
        return PursuitAttempt::refused("co-located", Some(start));
    }

    let mut modifiers: SmallVec<[&'static str; 4]> = SmallVec::new();
    let mut chance = PURSUIT_BASE_CHANCE;
    if state.has_ground_loot(start) {
        chance -= PURSUIT_LOOT_PENALTY;
        modifiers.push("loot");
    }
    if creature.is_low_on_ions(state.config.low_ion_pct) {
        chance -= PURSUIT_ION_PENALTY;
        modifiers.push("low_ions");
    }
    if creature.hp.pct() < PURSUIT_HP_DISTRACTION_PCT {
        chance -= PURSUIT_HP_PENALTY;
        modifiers.push("low_hp");
    }
    if creature.wielded_is_cracked(&state.items) {
        chance -= PURSUIT_CRACKED_PENALTY;
        modifiers.push("cracked");
    }
    let threshold = clamp_pct(chance);
    let roll = percent_roll(rng);

    let mut attempt = PursuitAttempt {
        moved: false,
        reason: format!("roll={roll} threshold={threshold}"),
        roll: Some(roll),
        threshold: Some(threshold),
        modifiers,
        mode: None,
        path_len: None,
        pos: Some(start),
    };
    if roll >= threshold {
        return attempt;
    }

    if let Some(dir) = Direction::from_delta(target.x - start.x, target.y - start.y) {
        let edge = state.edges.resolve(start, dir, creature_id);
        if edge.passable {
            attempt.moved = true;
            attempt.reason = "moved".to_string();
            attempt.mode = Some("direct");
            attempt.pos = Some(target);
            return attempt;
        }
        attempt.reason = edge.reason.to_string();
    }

    let path = state
        .edges
        .find_path_between(start.year, (start.x, start.y), (target.x, target.y));
    attempt.path_len = Some(path.len());
    if let Some(&(x, y)) = path.get(1) {
        attempt.moved = true;
        attempt.reason = "moved".to_string();
        attempt.mode = Some("path");
        attempt.pos = Some(start.with_xy(x, y));
    } else {
        attempt.mode = Some("blocked");
        if attempt.reason.starts_with("roll=") {
            attempt.reason = "blocked".to_string();
        }
    }
    attempt
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::config::CombatConfig;
    use crate::creature::Creature;
    use crate::items::Owner;
    use crate::player::{MemoryPlayerStore, Player};
    use crate::rng::CountingRng;
    use crate::store::MemoryCreatureStore;
    use crate::world::GridMap;
    use rand::rngs::mock::StepRng;

    fn state_with(creature: Creature, grid: GridMap) -> SimState {
        SimState::new(
            CombatConfig::default(),
            Box::new(MemoryCreatureStore::from_creatures([creature])),
            Box::new(MemoryPlayerStore::with_active(Player::new(
                "p1",
                Pos::new(2000, 0, 0),
                20,
            ))),
        )
        .with_edges(Box::new(grid))
    }

    fn id() -> CreatureId {
        CreatureId::new("m1")
    }

    #[test]
    fn cross_year_never_rolls_or_moves() {
        let start = Pos::new(2000, 0, 0);
        let mut state = state_with(Creature::new("m1", "rat", start, 10), GridMap::default());
        let mut rng = CountingRng::new(StepRng::new(0, 0));
        assert!(!attempt_pursuit(&mut state, &id(), Pos::new(2100, 1, 0), &mut rng));
        assert_eq!(rng.draws(), 0);
        assert_eq!(state.creature(&id()).unwrap().pos, Some(start));
        let entry = state.turnlog.of_kind(LOG_AI_PURSUIT).next().unwrap();
        assert_eq!(entry.get("reason"), Some(&json!("cross-year")));
    }

    #[test]
    fn adjacent_target_steps_directly() {
        let mut state = state_with(
            Creature::new("m1", "rat", Pos::new(2000, 0, 0), 10),
            GridMap::default(),
        );
        let mut rng = StepRng::new(0, 0);
        assert!(attempt_pursuit(&mut state, &id(), Pos::new(2000, 1, 0), &mut rng));
        assert_eq!(state.creature(&id()).unwrap().pos, Some(Pos::new(2000, 1, 0)));
        let entry = state.turnlog.of_kind(LOG_AI_PURSUIT).next().unwrap();
        assert_eq!(entry.get("mode"), Some(&json!("direct")));
    }

    #[test]
    fn walled_edge_falls_back_to_path() {
        let start = Pos::new(2000, 0, 0);
        let mut grid = GridMap::default();
        grid.wall(start, Direction::East);
        let mut state = state_with(Creature::new("m1", "rat", start, 10), grid);
        let mut rng = StepRng::new(0, 0);
        let attempt = pursue(&mut state, &id(), Pos::new(2000, 1, 0), &mut rng);
        assert!(attempt.moved);
        assert_eq!(attempt.mode, Some("path"));
        assert!(attempt.path_len.is_some_and(|len| len > 2));
        assert_ne!(attempt.pos, Some(start));
    }

    #[test]
    fn penalties_stack_and_floor_at_zero() {
        let start = Pos::new(2000, 0, 0);
        let mut creature = Creature::new("m1", "rat", start, 10);
        creature.hp.current = 1;
        creature.ions = 1;
        creature.ions_max = 100;
        let mut state = state_with(creature, GridMap::default());
        state.items.mint("sword", 0, Owner::Ground(start));
        let broken = state.items.mint(
            crate::constants::BROKEN_WEAPON_ID,
            0,
            Owner::Bag(id()),
        );
        state.creatures.get_mut(&id()).unwrap().wielded = Some(broken);

        let mut rng = CountingRng::new(StepRng::new(0, 0));
        let attempt = pursue(&mut state, &id(), Pos::new(2000, 1, 0), &mut rng);
        assert_eq!(attempt.threshold, Some(0));
        assert_eq!(attempt.modifiers.as_slice(), &["loot", "low_ions", "low_hp", "cracked"]);
        assert!(!attempt.moved);
        assert_eq!(rng.draws(), 1);
    }

    #[test]
    fn unreachable_target_is_blocked_after_successful_roll() {
        let start = Pos::new(2000, 0, 0);
        let mut grid = GridMap::default();
        for dir in Direction::ALL {
            grid.wall(start, dir);
        }
        let mut state = state_with(Creature::new("m1", "rat", start, 10), grid);
        let attempt = pursue(&mut state, &id(), Pos::new(2000, 3, 3), &mut StepRng::new(0, 0));
        assert!(!attempt.moved);
        assert_eq!(attempt.mode, Some("blocked"));
        assert_eq!(attempt.path_len, Some(0));
        assert_eq!(state.creature(&id()).unwrap().pos, Some(start));
    }
}
