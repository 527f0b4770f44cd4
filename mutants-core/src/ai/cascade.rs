//! Priority-ordered, probability-gated decision cascade.
//!
//! Gates run in [`Gate::ORDER`]; the first one that triggers wins. Every
//! probability gate draws exactly one percentile roll, PURSUE draws none, and
//! a gate whose threshold is zero fails without touching the stream.
use rand::RngCore;
use serde::Serialize;
use serde_json::json;

use crate::ai::{Action, Gate};
use crate::config::CombatConfig;
use crate::constants::{
    CRACKED_ATTACK_FACTOR, LEVEL_DELTA_FLEE_SHIFT, LOG_AI_GATE, LOW_ION_CONVERT_BONUS,
    LOW_ION_SPEND_FACTOR, PANIC_LEVEL_DELTA,
};
use crate::context::{Context, ContextExt, ContextKey};
use crate::creature::Creature;
use crate::numbers::scale_floor;
use crate::rng::percent_roll;
use crate::state::SimState;
use crate::world::Pos;

/// Inputs derived once per evaluation.
#[derive(Debug, Clone, PartialEq, Eq, Serialize)]
pub struct DecisionSnapshot {
    pub hp_pct: i32,
    pub level: i32,
    pub opponent_level: i32,
    pub level_delta: i32,
    pub ions: i64,
    pub ions_pct: i32,
    pub low_ions: bool,
    pub cracked_weapon: bool,
    pub convertible_loot: bool,
    pub pickup_ready: bool,
    pub target_pos: Option<Pos>,
    pub tags: Vec<String>,
}

/// Gate-specific facts behind a decision.
#[derive(Debug, Clone, PartialEq, Eq, Serialize)]
#[serde(tag = "gate", rename_all = "UPPERCASE")]
pub enum GateDetail {
    Flee { panicked: bool, hp_pct: i32 },
    Pursue { from: Pos, target: Pos },
    Heal { cost: i64 },
    Convert { ions_pct: i32 },
    Cast { cost: i64 },
    Attack { cracked_weapon: bool },
    Pickup { forced: bool },
    Emote,
    Idle,
}

/// One line of the per-gate trail.
#[derive(Debug, Clone, PartialEq, Eq, Serialize)]
pub struct GateTrace {
    pub gate: Gate,
    pub reason: String,
    pub triggered: bool,
}

/// Immutable result of one cascade evaluation.
#[derive(Debug, Clone, PartialEq, Eq, Serialize)]
pub struct Decision {
    pub gate: Gate,
    pub action: Action,
    pub triggered: bool,
    pub reason: String,
    pub roll: Option<i32>,
    pub threshold: Option<i32>,
    pub detail: GateDetail,
    pub snapshot: DecisionSnapshot,
    pub trail: Vec<GateTrace>,
}

struct Winner {
    gate: Gate,
    roll: Option<i32>,
    threshold: Option<i32>,
    reason: String,
    detail: GateDetail,
}

struct GateRunner<'a> {
    rng: &'a mut dyn RngCore,
    trail: Vec<GateTrace>,
}

impl GateRunner<'_> {
    /// Roll `gate` when eligible; returns `(roll, reason)` if it triggered.
    fn try_gate(
        &mut self,
        gate: Gate,
        eligible: bool,
        threshold: i32,
        facts: &str,
    ) -> Option<(i32, String)> {
        if !eligible || threshold <= 0 {
            self.fail(gate, with_facts(facts, &format!("threshold={threshold}")));
            return None;
        }
        let roll = percent_roll(self.rng);
        let reason = with_facts(facts, &format!("roll={roll} threshold={threshold}"));
        let triggered = roll < threshold;
        self.trail.push(GateTrace {
            gate,
            reason: reason.clone(),
            triggered,
        });
        triggered.then_some((roll, reason))
    }

    fn fail(&mut self, gate: Gate, reason: String) {
        self.trail.push(GateTrace {
            gate,
            reason,
            triggered: false,
        });
    }
}

fn with_facts(facts: &str, tail: &str) -> String {
    if facts.is_empty() {
        tail.to_string()
    } else {
        format!("{facts} {tail}")
    }
}

fn snapshot(creature: &Creature, state: &SimState, ctx: &dyn Context) -> DecisionSnapshot {
    let config = &state.config;
    let level = creature.level.max(1);
    let opponent = state
        .players
        .active()
        .filter(|player| creature.target_player_id.is_none() || creature.is_targeting(&player.id));
    let opponent_level = opponent.map_or(1, |player| player.level.max(1));
    let target_pos = match (&creature.target_player_id, opponent) {
        (Some(_), Some(_)) => state.players.canonical_pos(),
        (Some(target), None) => creature.ai.target_positions.get(target).map(|s| s.pos),
        (None, _) => None,
    };
    let allow_pickup = ctx.flag(ContextKey::AllowPickup).unwrap_or(true);
    let convertible_loot = creature.ai.picked_up.iter().any(|id| {
        state.items.in_bag(*id, &creature.id) && state.items.get(*id).is_some_and(|r| !r.is_broken())
    });
    DecisionSnapshot {
        hp_pct: creature.hp.pct(),
        level,
        opponent_level,
        level_delta: opponent_level - level,
        ions: creature.ions.max(0),
        ions_pct: creature.ions_pct(),
        low_ions: creature.is_low_on_ions(config.low_ion_pct),
        cracked_weapon: creature.wielded_is_cracked(&state.items),
        convertible_loot,
        pickup_ready: allow_pickup && creature.pos.is_some_and(|pos| state.has_ground_loot(pos)),
        target_pos,
        tags: state
            .species
            .get(&creature.template)
            .map(|profile| profile.tags.clone())
            .unwrap_or_default(),
    }
}

/// Per-gate thresholds after adjustments and species overrides.
struct Thresholds {
    flee: i32,
    heal: i32,
    convert: i32,
    cast: i32,
    attack: i32,
    pickup: i32,
    emote: i32,
}

fn thresholds(creature: &Creature, state: &SimState, snap: &DecisionSnapshot) -> Thresholds {
    let config: &CombatConfig = &state.config;
    let species = |gate: Gate, base: i32| state.species.threshold(&creature.template, gate, base);

    let mut flee = config.flee_pct;
    if snap.cracked_weapon {
        flee += config.cracked_flee_bonus;
    }
    if snap.level_delta >= PANIC_LEVEL_DELTA {
        flee += LEVEL_DELTA_FLEE_SHIFT;
    } else if snap.level_delta <= -PANIC_LEVEL_DELTA {
        flee -= LEVEL_DELTA_FLEE_SHIFT;
    }

    let mut heal = config.heal_pct;
    let mut convert = config.convert_pct;
    let mut cast = config.cast_pct;
    if snap.low_ions {
        heal = scale_floor(heal, LOW_ION_SPEND_FACTOR);
        cast = scale_floor(cast, LOW_ION_SPEND_FACTOR);
        convert += LOW_ION_CONVERT_BONUS;
    }

    let mut attack = config.attack_pct;
    let mut pickup = config.pickup_pct;
    if snap.cracked_weapon {
        attack = scale_floor(attack, CRACKED_ATTACK_FACTOR);
        pickup += config.cracked_pickup_bonus;
    }

    Thresholds {
        flee: species(Gate::Flee, flee),
        heal: species(Gate::Heal, heal),
        convert: species(Gate::Convert, convert),
        cast: species(Gate::Cast, cast),
        attack: species(Gate::Attack, attack),
        pickup: species(Gate::Pickup, pickup),
        emote: species(Gate::Emote, config.emote_pct),
    }
}

/// Choose one action for `creature`.
///
/// `creature` is read, never written; the only side effect is a single
/// `AI/GATE` entry in the turn log.
pub fn evaluate_cascade(
    creature: &Creature,
    state: &mut SimState,
    ctx: &dyn Context,
    rng: &mut dyn RngCore,
) -> Decision {
    let snap = snapshot(creature, state, ctx);
    let mut runner = GateRunner {
        rng,
        trail: Vec::with_capacity(Gate::ORDER.len()),
    };
    let winner = run_gates(creature, state, ctx, &snap, &mut runner);
    let decision = Decision {
        gate: winner.gate,
        action: winner.gate.action(),
        triggered: true,
        reason: winner.reason,
        roll: winner.roll,
        threshold: winner.threshold,
        detail: winner.detail,
        snapshot: snap,
        trail: runner.trail,
    };
    state.turnlog.emit(
        LOG_AI_GATE,
        json!({
            "monster": creature.id.as_str(),
            "gate": decision.gate.as_str(),
            "triggered": decision.triggered,
            "roll": decision.roll,
            "threshold": decision.threshold,
            "reason": decision.reason,
        }),
    );
    decision
}

fn run_gates(
    creature: &Creature,
    state: &SimState,
    ctx: &dyn Context,
    snap: &DecisionSnapshot,
    runner: &mut GateRunner<'_>,
) -> Winner {
    let config = &state.config;
    let limits = thresholds(creature, state, snap);

    let forced = ctx
        .bonus_action()
        .is_some_and(|bonus| bonus.force_pickup && bonus.monster_id == creature.id);
    if forced && snap.pickup_ready {
        let reason = "bonus-force-pickup".to_string();
        runner.trail.push(GateTrace {
            gate: Gate::Pickup,
            reason: reason.clone(),
            triggered: true,
        });
        return Winner {
            gate: Gate::Pickup,
            roll: None,
            threshold: Some(100),
            reason,
            detail: GateDetail::Pickup { forced: true },
        };
    }

    // FLEE
    let panicked = snap.cracked_weapon && snap.level_delta >= PANIC_LEVEL_DELTA;
    let flee_ready = snap.hp_pct < config.flee_hp_pct || panicked;
    let facts = format!("hp_pct={} panicked={panicked}", snap.hp_pct);
    if let Some((roll, reason)) = runner.try_gate(Gate::Flee, flee_ready, limits.flee, &facts) {
        return Winner {
            gate: Gate::Flee,
            roll: Some(roll),
            threshold: Some(limits.flee),
            reason,
            detail: GateDetail::Flee {
                panicked,
                hp_pct: snap.hp_pct,
            },
        };
    }

    // PURSUE
    match (creature.pos, snap.target_pos) {
        (Some(from), Some(target)) if from.same_year(&target) && from != target => {
            let reason = format!("target={target} from={from}");
            runner.trail.push(GateTrace {
                gate: Gate::Pursue,
                reason: reason.clone(),
                triggered: true,
            });
            return Winner {
                gate: Gate::Pursue,
                roll: None,
                threshold: None,
                reason,
                detail: GateDetail::Pursue { from, target },
            };
        }
        (_, Some(_)) => runner.fail(Gate::Pursue, "target-co-located-or-away".to_string()),
        (_, None) => runner.fail(Gate::Pursue, "no-target".to_string()),
    }

    // HEAL
    let allow_heal = ctx.flag(ContextKey::AllowHeal).unwrap_or(true);
    let heal_cost = i64::from(snap.level) * i64::from(config.heal_cost);
    let heal_ready = allow_heal && snap.hp_pct < config.heal_at_pct && snap.ions >= heal_cost;
    let facts = format!(
        "hp_pct={} ions={} cost={heal_cost} allow_heal={allow_heal}",
        snap.hp_pct, snap.ions
    );
    if let Some((roll, reason)) = runner.try_gate(Gate::Heal, heal_ready, limits.heal, &facts) {
        return Winner {
            gate: Gate::Heal,
            roll: Some(roll),
            threshold: Some(limits.heal),
            reason,
            detail: GateDetail::Heal { cost: heal_cost },
        };
    }

    // CONVERT
    let convert_ready = snap.low_ions && snap.convertible_loot;
    let facts = format!(
        "ions_pct={} low_ions={} convertible={}",
        snap.ions_pct, snap.low_ions, snap.convertible_loot
    );
    if let Some((roll, reason)) = runner.try_gate(Gate::Convert, convert_ready, limits.convert, &facts)
    {
        return Winner {
            gate: Gate::Convert,
            roll: Some(roll),
            threshold: Some(limits.convert),
            reason,
            detail: GateDetail::Convert {
                ions_pct: snap.ions_pct,
            },
        };
    }

    // CAST
    let spell_cost = i64::from(config.spell_cost);
    let facts = format!("ions={} cost={spell_cost}", snap.ions);
    if let Some((roll, reason)) =
        runner.try_gate(Gate::Cast, snap.ions >= spell_cost, limits.cast, &facts)
    {
        return Winner {
            gate: Gate::Cast,
            roll: Some(roll),
            threshold: Some(limits.cast),
            reason,
            detail: GateDetail::Cast { cost: spell_cost },
        };
    }

    // ATTACK
    let facts = format!("cracked={}", snap.cracked_weapon);
    if let Some((roll, reason)) = runner.try_gate(Gate::Attack, true, limits.attack, &facts) {
        return Winner {
            gate: Gate::Attack,
            roll: Some(roll),
            threshold: Some(limits.attack),
            reason,
            detail: GateDetail::Attack {
                cracked_weapon: snap.cracked_weapon,
            },
        };
    }

    // PICKUP
    let facts = format!("pickup_ready={}", snap.pickup_ready);
    if let Some((roll, reason)) =
        runner.try_gate(Gate::Pickup, snap.pickup_ready, limits.pickup, &facts)
    {
        return Winner {
            gate: Gate::Pickup,
            roll: Some(roll),
            threshold: Some(limits.pickup),
            reason,
            detail: GateDetail::Pickup { forced: false },
        };
    }

    // EMOTE
    if let Some((roll, reason)) = runner.try_gate(Gate::Emote, true, limits.emote, "") {
        return Winner {
            gate: Gate::Emote,
            roll: Some(roll),
            threshold: Some(limits.emote),
            reason,
            detail: GateDetail::Emote,
        };
    }

    let failures: Vec<String> = runner
        .trail
        .iter()
        .filter(|trace| !trace.triggered)
        .map(|trace| format!("{}:{}", trace.gate, trace.reason))
        .collect();
    let reason = if failures.is_empty() {
        "no-gate-triggered".to_string()
    } else {
        failures.join(", ")
    };
    runner.trail.push(GateTrace {
        gate: Gate::Idle,
        reason: "fallback".to_string(),
        triggered: true,
    });
    Winner {
        gate: Gate::Idle,
        roll: None,
        threshold: None,
        reason,
        detail: GateDetail::Idle,
    }
}
