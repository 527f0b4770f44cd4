//! Executor that turns a cascade decision into world changes.
use rand::RngCore;
use serde::Serialize;
use serde_json::{Value, json};
use thiserror::Error;

use crate::ai::attack::{select_attack, weapon_power};
use crate::ai::cascade::{Decision, GateDetail, evaluate_cascade};
use crate::ai::emote::{EmoteLine, emit_emote};
use crate::ai::pursuit::pursue;
use crate::ai::Action;
use crate::combat::AttackSource;
use crate::constants::{
    BROKEN_WEAPON_ID, CAST_LEVEL_BONUS, HEAL_LEVEL_BONUS, LOG_AI_ACT_PREFIX, LOG_COMBAT_HIT,
    LOG_COMBAT_KILL, LOG_ITEM_CONVERT, LOG_ITEM_DROP, LOG_ITEM_PICKUP, PICKUP_DAMAGE_WEIGHT,
    WEAPON_DROP_PCT,
};
use crate::context::Context;
use crate::creature::{Creature, CreatureId, PendingDrop};
use crate::feedback::FeedbackKind;
use crate::items::{ItemError, ItemId, ItemOrigin, Owner};
use crate::player::PlayerId;
use crate::rng::percent_roll;
use crate::scheduler::FreeAction;
use crate::state::SimState;
use crate::world::{Direction, Pos};

#[derive(Debug, Error)]
pub enum ActionError {
    #[error("creature {0} is not in the store")]
    MissingCreature(CreatureId),
    #[error("creature {0} cannot act (dead or without a position)")]
    Incapacitated(CreatureId),
    #[error("no active player")]
    MissingPlayer,
    #[error(transparent)]
    Item(#[from] ItemError),
}

/// What an executed action changed.
#[derive(Debug, Clone, PartialEq, Eq, Serialize)]
#[serde(tag = "effect", rename_all = "snake_case")]
pub enum ActionEffect {
    Moved { to: Pos },
    Stayed { reason: String },
    Healed { amount: i32, cost: i64 },
    FullHealth,
    Converted { item: ItemId, value: i64 },
    NothingToConvert,
    Cast { success: bool, cost: i64, spell: String, amount: i32 },
    Attacked { source: AttackSource, damage: i32, killed: bool, weapon_worn: bool },
    NoTarget,
    PickedUp { item: ItemId, wielded: bool },
    NothingToPickUp,
    Emoted { template: usize },
    Taunted,
    Idle,
}

#[derive(Debug, Clone, PartialEq, Eq)]
pub struct ActionOutcome {
    pub decision: Decision,
    pub effect: ActionEffect,
}

/// Evaluate the cascade for `creature_id` and carry out the chosen action.
///
/// Broken gear queued for dropping on earlier turns is shed first.
///
/// # Errors
///
/// Returns `ActionError` when the creature cannot act or an item move fails;
/// the dispatcher treats this as the end of the creature's credits.
pub fn execute_random_action(
    state: &mut SimState,
    ctx: &dyn Context,
    rng: &mut dyn RngCore,
    creature_id: &CreatureId,
) -> Result<ActionOutcome, ActionError> {
    let mut creature = state
        .creatures
        .get(creature_id)
        .cloned()
        .ok_or_else(|| ActionError::MissingCreature(creature_id.clone()))?;
    if !creature.is_alive() || creature.pos.is_none() {
        return Err(ActionError::Incapacitated(creature_id.clone()));
    }

    process_pending_drops(state, &mut creature, rng);
    creature.reconcile_wielded(&state.items);
    state.creatures.insert(creature.clone());

    let decision = evaluate_cascade(&creature, state, ctx, rng);
    let effect = match decision.action {
        Action::Flee => flee(state, &mut creature),
        Action::Pursue => {
            let &GateDetail::Pursue { target, .. } = &decision.detail else {
                return Err(ActionError::MissingPlayer);
            };
            let attempt = pursue(state, creature_id, target, rng);
            if let Some(pos) = state.creatures.get(creature_id).and_then(|c| c.pos) {
                creature.pos = Some(pos);
            }
            if attempt.moved {
                ActionEffect::Moved {
                    to: attempt.pos.unwrap_or(target),
                }
            } else {
                ActionEffect::Stayed {
                    reason: attempt.reason,
                }
            }
        }
        Action::Heal => heal(state, &mut creature),
        Action::Convert => convert(state, &mut creature)?,
        Action::Cast => cast(state, &mut creature, rng),
        Action::Attack => attack(state, ctx, &mut creature, rng)?,
        Action::Pickup => pickup(state, &mut creature)?,
        Action::Emote => {
            let target = state
                .players
                .active()
                .filter(|player| creature.is_targeting(&player.id))
                .map(|player| player.name.clone());
            match emit_emote(&creature, target.as_deref(), &mut state.feedback, rng) {
                EmoteLine::Emote(template) => ActionEffect::Emoted { template },
                EmoteLine::Taunt => ActionEffect::Taunted,
            }
        }
        Action::Idle => ActionEffect::Idle,
    };
    state.creatures.insert(creature);
    state.creatures.mark_dirty();

    let mut meta = match serde_json::to_value(&effect) {
        Ok(Value::Object(map)) => map,
        _ => serde_json::Map::new(),
    };
    meta.insert("monster".to_string(), json!(creature_id.as_str()));
    let kind = format!("{LOG_AI_ACT_PREFIX}{}", decision.gate.as_str());
    state.turnlog.emit(&kind, Value::Object(meta));

    Ok(ActionOutcome { decision, effect })
}

/// Shed broken armour at once and broken weapons most of the time.
fn process_pending_drops(
    state: &mut SimState,
    creature: &mut Creature,
    rng: &mut dyn RngCore,
) {
    if creature.ai.pending_drops.is_empty() {
        return;
    }
    let Some(pos) = creature.pos else {
        return;
    };
    let pending = std::mem::take(&mut creature.ai.pending_drops);
    for drop in pending {
        let (item, from, slot) = match drop {
            PendingDrop::Armour(item) => (item, Owner::Armour(creature.id.clone()), "armour"),
            PendingDrop::Weapon(item) => {
                if percent_roll(rng) >= WEAPON_DROP_PCT {
                    creature.ai.pending_drops.push(drop);
                    continue;
                }
                (item, Owner::Bag(creature.id.clone()), "weapon")
            }
        };
        if let Err(err) = state.items.transfer(item, &from, Owner::Ground(pos)) {
            log::debug!("pending drop for {} skipped: {err}", creature.id.as_str());
            continue;
        }
        if creature.wielded == Some(item) {
            creature.wielded = None;
        }
        creature.ai.picked_up.remove(&item);
        state.turnlog.emit(
            LOG_ITEM_DROP,
            json!({ "monster": creature.id.as_str(), "item": item.to_string(), "slot": slot, "pos": pos.to_string() }),
        );
    }
}

fn manhattan(a: Pos, b: Pos) -> i32 {
    (a.x - b.x).abs() + (a.y - b.y).abs()
}

fn flee(state: &mut SimState, creature: &mut Creature) -> ActionEffect {
    let Some(start) = creature.pos else {
        return ActionEffect::Stayed {
            reason: "invalid-pos".to_string(),
        };
    };
    let threat = state.players.canonical_pos().filter(|pos| pos.same_year(&start));
    let away = |dir: Direction| {
        threat.is_none_or(|threat| manhattan(start.step(dir), threat) >= manhattan(start, threat))
    };
    for dir in Direction::ALL.into_iter().filter(|dir| away(*dir)) {
        if state.edges.resolve(start, dir, &creature.id).passable {
            let to = start.step(dir);
            creature.pos = Some(to);
            return ActionEffect::Moved { to };
        }
    }
    ActionEffect::Stayed {
        reason: "cornered".to_string(),
    }
}

fn heal(state: &mut SimState, creature: &mut Creature) -> ActionEffect {
    if creature.hp.missing() == 0 {
        return ActionEffect::FullHealth;
    }
    let cost = i64::from(creature.level.max(1)) * i64::from(state.config.heal_cost);
    creature.ions = (creature.ions - cost).max(0);
    let amount = creature.hp.heal(creature.level.max(1) + HEAL_LEVEL_BONUS);
    state.feedback.push(
        FeedbackKind::Status,
        "{monster} looks healthier.",
        json!({ "monster": creature.display_name(), "amount": amount }),
    );
    ActionEffect::Healed { amount, cost }
}

fn convert(state: &mut SimState, creature: &mut Creature) -> Result<ActionEffect, ActionError> {
    let mut best: Option<(ItemId, i64)> = None;
    for id in &creature.ai.picked_up {
        let Some(record) = state.items.get(*id) else {
            continue;
        };
        if record.is_broken() || !state.items.in_bag(*id, &creature.id) {
            continue;
        }
        let value = state.catalog.convert_value(record);
        if best.is_none_or(|(_, top)| value > top) {
            best = Some((*id, value));
        }
    }
    let Some((item, value)) = best else {
        return Ok(ActionEffect::NothingToConvert);
    };
    let record = state.items.remove(item, &Owner::Bag(creature.id.clone()))?;
    creature.ai.picked_up.remove(&item);
    if creature.wielded == Some(item) {
        creature.wielded = None;
    }
    creature.ions = creature.ions.saturating_add(value);
    state.turnlog.emit(
        LOG_ITEM_CONVERT,
        json!({ "monster": creature.id.as_str(), "item": item.to_string(), "catalog_id": record.catalog_id, "value": value }),
    );
    Ok(ActionEffect::Converted { item, value })
}

fn cast(state: &mut SimState, creature: &mut Creature, rng: &mut dyn RngCore) -> ActionEffect {
    let cost = i64::from(state.config.spell_cost);
    if percent_roll(rng) >= state.config.spell_success_pct {
        let half = cost / 2;
        creature.ions = (creature.ions - half).max(0);
        return ActionEffect::Cast {
            success: false,
            cost: half,
            spell: "fizzle".to_string(),
            amount: 0,
        };
    }
    creature.ions = (creature.ions - cost).max(0);
    let power = creature.level.max(1) + CAST_LEVEL_BONUS;
    if creature.hp.pct() < state.config.heal_at_pct {
        let amount = creature.hp.heal(power);
        return ActionEffect::Cast {
            success: true,
            cost,
            spell: "mend".to_string(),
            amount,
        };
    }
    let mut amount = 0;
    let mut killed = None;
    if let Some(player) = state.players.active_mut()
        && player.hp.is_alive()
        && Some(player.pos) == creature.pos
    {
        amount = player.hp.damage(power);
        if !player.hp.is_alive() {
            killed = Some(player.id.clone());
        }
    }
    if amount > 0 {
        state.players.mark_dirty();
        state.turnlog.emit(
            LOG_COMBAT_HIT,
            json!({ "monster": creature.id.as_str(), "source": "arcane-burst", "damage": amount }),
        );
    }
    if let Some(player_id) = killed {
        player_killed(state, creature, &player_id);
    }
    ActionEffect::Cast {
        success: true,
        cost,
        spell: "arcane-burst".to_string(),
        amount,
    }
}

fn attack(
    state: &mut SimState,
    ctx: &dyn Context,
    creature: &mut Creature,
    rng: &mut dyn RngCore,
) -> Result<ActionEffect, ActionError> {
    let defender = state.players.active().cloned().ok_or(ActionError::MissingPlayer)?;
    if !defender.hp.is_alive() || creature.pos != Some(defender.pos) {
        return Ok(ActionEffect::NoTarget);
    }
    if creature.target_player_id.is_none() {
        creature.target_player_id = Some(defender.id.clone());
    }

    let plan = select_attack(creature, state, ctx, rng);
    let weapon = plan.item.and_then(|id| state.items.get(id).cloned());
    let result = state.damage.resolve_attack(
        weapon.as_ref(),
        plan.source,
        creature,
        &defender,
        &state.catalog,
        rng,
    );
    let mut damage = result.damage.max(0);
    if matches!(plan.source, AttackSource::Innate | AttackSource::Bolt) {
        damage = damage.max(1);
    }

    let mut killed = false;
    if let Some(player) = state.players.active_mut() {
        damage = player.hp.damage(damage);
        killed = !player.hp.is_alive();
    }
    state.players.mark_dirty();
    state.turnlog.emit(
        LOG_COMBAT_HIT,
        json!({
            "monster": creature.id.as_str(),
            "source": plan.source.as_str(),
            "item": plan.item.map(|id| id.to_string()),
            "damage": damage,
            "roll": plan.roll,
        }),
    );

    let mut weapon_worn = false;
    if result.weapon_worn
        && let Some(record) = weapon.as_ref()
        && !record.is_broken()
    {
        state.items.crack(record.id, BROKEN_WEAPON_ID)?;
        creature.ai.pending_drops.push(PendingDrop::Weapon(record.id));
        weapon_worn = true;
    }

    if killed {
        player_killed(state, creature, &defender.id);
    }
    Ok(ActionEffect::Attacked {
        source: plan.source,
        damage,
        killed,
        weapon_worn,
    })
}

/// Loot the fallen player and schedule the respawn and a bonus action.
fn player_killed(state: &mut SimState, creature: &mut Creature, player_id: &PlayerId) {
    let mut ions = 0;
    let mut riblets = 0;
    let mut pos = creature.pos;
    if let Some(player) = state.players.active_mut() {
        ions = std::mem::take(&mut player.ions);
        riblets = std::mem::take(&mut player.riblets);
        pos = Some(player.pos);
        player.ready_target = None;
    }
    state.players.mark_dirty();
    creature.ions = creature.ions.saturating_add(ions);
    creature.riblets = creature.riblets.saturating_add(riblets);
    creature.target_player_id = None;
    creature.ai.target_positions.remove(player_id);

    let mut dropped = Vec::new();
    if let Some(pos) = pos {
        dropped = state
            .items
            .release_all(&Owner::Player(player_id.clone()), &Owner::Ground(pos));
    }
    state.turnlog.emit(
        LOG_COMBAT_KILL,
        json!({
            "monster": creature.id.as_str(),
            "player": player_id.0,
            "ions": ions,
            "riblets": riblets,
            "drops": dropped.iter().map(ToString::to_string).collect::<Vec<_>>(),
        }),
    );
    state.feedback.push(
        FeedbackKind::Combat,
        "{monster} has slain {player}!",
        json!({ "monster": creature.display_name(), "player": player_id.0 }),
    );
    state.free_actions.push(FreeAction::PlayerRespawn {
        player: player_id.clone(),
    });
    state.free_actions.push(FreeAction::Bonus {
        monster: creature.id.clone(),
    });
}

fn pickup(state: &mut SimState, creature: &mut Creature) -> Result<ActionEffect, ActionError> {
    let Some(pos) = creature.pos else {
        return Ok(ActionEffect::NothingToPickUp);
    };
    let mut best: Option<(ItemId, i64)> = None;
    for record in state.items.ground_at(pos) {
        if record.is_broken() {
            continue;
        }
        let score = i64::from(state.catalog.base_damage(record)) * PICKUP_DAMAGE_WEIGHT
            + state.catalog.convert_value(record);
        if best.is_none_or(|(_, top)| score > top) {
            best = Some((record.id, score));
        }
    }
    let Some((item, _)) = best else {
        return Ok(ActionEffect::NothingToPickUp);
    };
    state
        .items
        .transfer(item, &Owner::Ground(pos), Owner::Bag(creature.id.clone()))?;
    state.items.set_origin(item, ItemOrigin::World)?;
    creature.ai.picked_up.insert(item);

    let mut wielded = false;
    if let Some(record) = state.items.get(item)
        && state.catalog.is_weapon(record)
        && !state.catalog.is_armour(record)
    {
        let new_power = weapon_power(&state.catalog, record);
        let current = creature
            .wielded
            .and_then(|id| state.items.get(id))
            .map(|held| weapon_power(&state.catalog, held));
        if current.is_none_or(|power| new_power > power) {
            creature.wielded = Some(item);
            wielded = true;
        }
    }
    state.turnlog.emit(
        LOG_ITEM_PICKUP,
        json!({ "monster": creature.id.as_str(), "item": item.to_string(), "pos": pos.to_string(), "wielded": wielded }),
    );
    Ok(ActionEffect::PickedUp { item, wielded })
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::ai::Gate;
    use crate::catalog::{ItemCatalog, ItemTemplate};
    use crate::config::CombatConfig;
    use crate::context::ContextMap;
    use crate::creature::InnateAttack;
    use crate::player::{MemoryPlayerStore, Player};
    use crate::store::MemoryCreatureStore;
    use rand::rngs::mock::StepRng;

    const HOME: Pos = Pos::new(2000, 0, 0);

    fn world(creature: Creature, player: Player, config: CombatConfig) -> SimState {
        let mut catalog = ItemCatalog::with_placeholders();
        catalog.insert(ItemTemplate::new("gem", 0, 4000));
        catalog.insert(ItemTemplate::new("sword", 12, 100));
        catalog.insert(ItemTemplate::new("dagger", 4, 20));
        SimState::new(
            config,
            Box::new(MemoryCreatureStore::from_creatures([creature])),
            Box::new(MemoryPlayerStore::with_active(player)),
        )
        .with_catalog(catalog)
    }

    fn id() -> CreatureId {
        CreatureId::new("m1")
    }

    #[test]
    fn convert_turns_tracked_loot_into_ions() {
        let mut creature = Creature::new("m1", "rat", HOME, 20);
        creature.ions = 10;
        creature.ions_max = 400;
        let mut state = world(creature, Player::new("p1", HOME, 30), CombatConfig::default());
        let gem = state.items.mint("gem", 0, Owner::Bag(id()));
        state.creatures.get_mut(&id()).unwrap().ai.picked_up.insert(gem);

        let outcome =
            execute_random_action(&mut state, &ContextMap::new(), &mut StepRng::new(0, 0), &id())
                .unwrap();
        assert_eq!(outcome.decision.gate, Gate::Convert);
        assert_eq!(outcome.effect, ActionEffect::Converted { item: gem, value: 4000 });
        let after = state.creature(&id()).unwrap();
        assert_eq!(after.ions, 4010);
        assert!(after.ai.picked_up.is_empty());
        assert!(!state.items.contains(gem));
        assert_eq!(state.turnlog.of_kind(LOG_ITEM_CONVERT).count(), 1);
        assert_eq!(state.turnlog.of_kind("AI/ACT/CONVERT").count(), 1);
    }

    #[test]
    fn pickup_prefers_damage_then_value_and_wields() {
        let creature = Creature::new("m1", "rat", HOME, 20);
        let config = CombatConfig {
            attack_pct: 0,
            pickup_pct: 100,
            ..CombatConfig::default()
        };
        let mut state = world(creature, Player::new("p1", Pos::new(2000, 0, 1), 30), config);
        state.items.mint("gem", 0, Owner::Ground(HOME));
        let sword = state.items.mint("sword", 0, Owner::Ground(HOME));

        let outcome =
            execute_random_action(&mut state, &ContextMap::new(), &mut StepRng::new(0, 0), &id())
                .unwrap();
        assert_eq!(outcome.effect, ActionEffect::PickedUp { item: sword, wielded: true });
        let after = state.creature(&id()).unwrap();
        assert_eq!(after.wielded, Some(sword));
        assert!(after.ai.picked_up.contains(&sword));
        assert_eq!(state.items.get(sword).unwrap().origin, ItemOrigin::World);
    }

    #[test]
    fn lethal_attack_loots_player_and_queues_follow_ups() {
        let mut creature = Creature::new("m1", "wyrm", HOME, 20);
        creature.innate_attack = Some(InnateAttack {
            name: "bite".to_string(),
            power: 50,
        });
        let mut player = Player::new("p1", HOME, 10);
        player.ions = 70;
        player.riblets = 5;
        let config = CombatConfig {
            attack_pct: 100,
            ..CombatConfig::default()
        };
        let mut state = world(creature, player, config);
        let cloak = state.items.mint("cloak", 0, Owner::Player(PlayerId::new("p1")));

        let outcome =
            execute_random_action(&mut state, &ContextMap::new(), &mut StepRng::new(0, 0), &id())
                .unwrap();
        assert!(matches!(
            outcome.effect,
            ActionEffect::Attacked { source: AttackSource::Innate, killed: true, .. }
        ));
        let after = state.creature(&id()).unwrap();
        assert_eq!(after.ions, 70);
        assert_eq!(after.riblets, 5);
        assert_eq!(after.target_player_id, None);
        assert_eq!(state.items.get(cloak).unwrap().owner(), &Owner::Ground(HOME));
        assert_eq!(state.free_actions.len(), 2);
    }

    #[test]
    fn worn_weapon_cracks_and_drops_next_turn() {
        let creature = Creature::new("m1", "ogre", HOME, 20);
        let config = CombatConfig {
            attack_pct: 100,
            ..CombatConfig::default()
        };
        let mut state = world(creature, Player::new("p1", HOME, 500), config)
            .with_damage(Box::new(crate::combat::StandardDamage { wear_pct: 100 }));
        let sword = state.items.mint("sword", 0, Owner::Bag(id()));
        state.creatures.get_mut(&id()).unwrap().wielded = Some(sword);

        let mut rng = StepRng::new(0, 0);
        let outcome =
            execute_random_action(&mut state, &ContextMap::new(), &mut rng, &id()).unwrap();
        assert!(matches!(outcome.effect, ActionEffect::Attacked { weapon_worn: true, .. }));
        assert_eq!(state.items.get(sword).unwrap().catalog_id, BROKEN_WEAPON_ID);
        assert_eq!(
            state.creature(&id()).unwrap().ai.pending_drops,
            vec![PendingDrop::Weapon(sword)]
        );

        execute_random_action(&mut state, &ContextMap::new(), &mut rng, &id()).unwrap();
        assert_eq!(state.items.get(sword).unwrap().owner(), &Owner::Ground(HOME));
        assert_eq!(state.creature(&id()).unwrap().wielded, None);
        assert_eq!(state.turnlog.of_kind(LOG_ITEM_DROP).count(), 1);
    }

    #[test]
    fn dead_creature_cannot_act() {
        let mut creature = Creature::new("m1", "rat", HOME, 20);
        creature.hp.current = 0;
        let mut state = world(creature, Player::new("p1", HOME, 30), CombatConfig::default());
        let err = execute_random_action(&mut state, &ContextMap::new(), &mut StepRng::new(0, 0), &id())
            .unwrap_err();
        assert!(matches!(err, ActionError::Incapacitated(_)));
    }

    #[test]
    fn full_health_heal_is_a_no_op() {
        let mut creature = Creature::new("m1", "rat", HOME, 20);
        creature.ions = 5;
        let mut state = world(creature.clone(), Player::new("p1", HOME, 30), CombatConfig::default());
        assert_eq!(heal(&mut state, &mut creature), ActionEffect::FullHealth);
        creature.hp.current = 18;
        assert_eq!(heal(&mut state, &mut creature), ActionEffect::Healed { amount: 2, cost: 5 });
        assert_eq!(creature.ions, 0);
    }
}
