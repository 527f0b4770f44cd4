//! Per-command creature reactions: who acts, how often, and in what order.
use std::collections::BTreeSet;

use rand::{Rng, RngCore};
use serde::Serialize;
use serde_json::json;

use crate::ai::actions::execute_random_action;
use crate::ai::tracking::update_target_positions;
use crate::ai::wake::{WakeCheck, check_wake, wake_events};
use crate::ai::WakeEvent;
use crate::config::sanitize_credit_weights;
use crate::constants::{LOG_AI_REENTRY, LOG_AI_TARGET, LOG_AI_TICK, LOG_AI_WAKE};
use crate::context::{Context, ContextExt, ContextKey};
use crate::creature::{Creature, CreatureId};
use crate::player::PlayerId;
use crate::rng::RngHandle;
use crate::state::SimState;
use crate::world::Pos;

/// Fallback seed for a dispatch that runs without a bound stream.
const UNBOUND_STREAM_SEED: u64 = 0;

/// Credits one creature received and spent this tick.
#[derive(Debug, Clone, PartialEq, Eq, Serialize)]
pub struct CreatureTurn {
    pub monster: CreatureId,
    pub rolled: u32,
    pub credits: u32,
    pub executed: u32,
    pub reentry: bool,
    pub error: Option<String>,
}

#[derive(Debug, Clone, Default, PartialEq, Eq, Serialize)]
pub struct DispatchSummary {
    pub player: Option<PlayerId>,
    pub turns: Vec<CreatureTurn>,
    /// Creatures that stayed dormant after failing every wake check.
    pub dormant: Vec<CreatureId>,
}

impl DispatchSummary {
    #[must_use]
    pub fn turn_of(&self, id: &CreatureId) -> Option<&CreatureTurn> {
        self.turns.iter().find(|turn| &turn.monster == id)
    }
}

/// Draw an action-credit count (0..=3) from `weights`.
///
/// Weights are sanitised first; the draw is `uniform[0,1) * total` scanned
/// cumulatively.
pub fn roll_credits(rng: &mut dyn RngCore, weights: &[f64]) -> u32 {
    let weights = sanitize_credit_weights(weights);
    let total: f64 = weights.iter().sum();
    if total <= 0.0 {
        return 0;
    }
    let pick = rng.r#gen::<f64>() * total;
    let mut cumulative = 0.0;
    for (credits, weight) in (0u32..).zip(weights.iter()) {
        cumulative += weight;
        if pick < cumulative {
            return credits;
        }
    }
    3
}

/// Let a co-located, untargeted creature adopt `player` as its target.
///
/// The adoption is an ENTRY wake check; returns true when the target was set.
pub fn roll_entry_target(
    state: &mut SimState,
    creature_id: &CreatureId,
    player: &PlayerId,
    player_pos: Pos,
    rng: &mut dyn RngCore,
) -> bool {
    let Some(creature) = state.creatures.get(creature_id) else {
        return false;
    };
    if creature.target_player_id.is_some() || creature.pos != Some(player_pos) {
        return false;
    }
    let check = check_wake(
        creature,
        WakeEvent::Entry.as_str(),
        rng,
        &state.config,
        Some(&state.species),
    );
    if !check.woke {
        return false;
    }
    if let Some(creature) = state.creatures.get_mut(creature_id) {
        creature.target_player_id = Some(player.clone());
    }
    state.creatures.mark_dirty();
    state.turnlog.emit(
        LOG_AI_TARGET,
        json!({
            "monster": creature_id.as_str(),
            "player": player.0,
            "roll": check.roll,
            "threshold": check.threshold,
        }),
    );
    true
}

fn can_act(creature: &Creature, year: i32) -> bool {
    creature.is_alive() && creature.pos.is_some_and(|pos| pos.year == year)
}

/// React every relevant creature to the command `token` (and its resolved form).
///
/// Creatures already targeting the player act first, then untargeted ones on
/// the player's tile. Failures stop the failing creature's credits only.
pub fn on_player_command(
    state: &mut SimState,
    ctx: &dyn Context,
    token: &str,
    resolved: Option<&str>,
) -> DispatchSummary {
    let mut summary = DispatchSummary::default();
    let Some((player_id, player_pos)) = state
        .players
        .active()
        .map(|player| player.id.clone())
        .zip(state.players.canonical_pos())
    else {
        return summary;
    };
    summary.player = Some(player_id.clone());

    let ai_handle = ctx.rng(ContextKey::AiRng).unwrap_or_else(|| {
        log::warn!("no AI stream bound; dispatching with an unbound generator");
        RngHandle::from_seed(UNBOUND_STREAM_SEED)
    });
    let wake_handle = ctx
        .rng(ContextKey::WakeRng)
        .filter(|handle| !handle.same_stream(&ai_handle));
    let mut rng = ai_handle.borrow_mut();

    let reentered = update_target_positions(state.creatures.as_mut(), &player_id, player_pos);

    let hunters: Vec<CreatureId> = state
        .creatures
        .list_all()
        .into_iter()
        .filter(|id| {
            state.creatures.get(id).is_some_and(|creature| {
                creature.is_targeting(&player_id)
                    && creature.pos.is_some_and(|pos| pos.same_year(&player_pos))
            })
        })
        .collect();
    let handled: BTreeSet<CreatureId> = hunters.iter().cloned().collect();
    let newcomers: Vec<CreatureId> = state
        .creatures
        .list_at(player_pos)
        .into_iter()
        .filter(|id| !handled.contains(id))
        .filter(|id| {
            state
                .creatures
                .get(id)
                .is_some_and(|creature| creature.target_player_id.is_none())
        })
        .collect();

    let events = wake_events(token, resolved);
    let weights = ctx
        .credit_weights()
        .unwrap_or_else(|| sanitize_credit_weights(&state.config.credit_weights));

    let queue = hunters
        .into_iter()
        .map(|id| (id, false))
        .chain(newcomers.into_iter().map(|id| (id, true)));
    for (id, needs_wake) in queue {
        let Some(creature) = state.creatures.get(&id) else {
            continue;
        };
        if !can_act(creature, player_pos.year) {
            log::debug!("{} cannot act this tick", id.as_str());
            continue;
        }

        if needs_wake {
            roll_entry_target(state, &id, &player_id, player_pos, &mut *rng);
            if !events.is_empty() {
                let woke = match &wake_handle {
                    Some(handle) => run_wake_checks(state, &id, &events, &mut *handle.borrow_mut()),
                    None => run_wake_checks(state, &id, &events, &mut *rng),
                };
                if !woke {
                    summary.dormant.push(id);
                    continue;
                }
            }
        }

        let Some(creature) = state.creatures.get(&id) else {
            continue;
        };
        let separated = creature.is_targeting(&player_id) && creature.pos != Some(player_pos);
        let rolled = roll_credits(&mut *rng, &weights);
        let mut credits = rolled;
        if credits == 0 && separated {
            credits = 1;
        }
        let reentry = reentered.contains(&id);
        if reentry && credits == 0 {
            credits = 1;
            state.turnlog.emit(
                LOG_AI_REENTRY,
                json!({ "monster": id.as_str(), "player": player_id.0 }),
            );
        }
        state.turnlog.emit(
            LOG_AI_TICK,
            json!({ "monster": id.as_str(), "credits": credits, "rolled": rolled }),
        );

        let mut turn = CreatureTurn {
            monster: id.clone(),
            rolled,
            credits,
            executed: 0,
            reentry,
            error: None,
        };
        for _ in 0..credits {
            match execute_random_action(state, ctx, &mut *rng, &id) {
                Ok(_) => turn.executed += 1,
                Err(err) => {
                    log::error!("creature {} action failed: {err}", id.as_str());
                    turn.error = Some(err.to_string());
                    break;
                }
            }
        }
        summary.turns.push(turn);
    }
    summary
}

/// Run wake checks for `events` until one wakes the creature.
fn run_wake_checks(
    state: &mut SimState,
    creature_id: &CreatureId,
    events: &[WakeEvent],
    rng: &mut dyn RngCore,
) -> bool {
    let Some(creature) = state.creatures.get(creature_id) else {
        return false;
    };
    let mut checks: Vec<WakeCheck> = Vec::with_capacity(events.len());
    for event in events {
        let check = check_wake(
            creature,
            event.as_str(),
            rng,
            &state.config,
            Some(&state.species),
        );
        checks.push(check);
        if check.woke {
            break;
        }
    }
    let woke = checks.last().is_some_and(|check| check.woke);
    state.turnlog.emit(
        LOG_AI_WAKE,
        json!({
            "monster": creature_id.as_str(),
            "woke": woke,
            "events": checks.iter().filter_map(|c| c.event.map(WakeEvent::as_str)).collect::<Vec<_>>(),
            "rolls": checks.iter().map(|c| c.roll).collect::<Vec<_>>(),
        }),
    );
    woke
}
