use anyhow::{Context, Result, bail, ensure};
use mutants_core::rng::StreamRng;
use mutants_core::spawner::{FloorSpawner, SpawnTemplate, YearFloor};
use mutants_core::{
    BROKEN_WEAPON_ID, CombatConfig, ContextMap, Creature, CreatureId, Direction, GameSession,
    Gate, GridMap, Health, ItemCatalog, ItemTemplate, MemoryCreatureStore, MemoryPlayerStore,
    Owner, Player, PlayerId, Pos, SimState, StatusManager, TurnLog, evaluate_cascade,
    execute_random_action,
};
use serde::{Deserialize, Serialize};
use sha2::{Digest, Sha256};
use std::collections::BTreeMap;

use crate::script::Script;

pub const SMOKE_SCRIPT: &str = "\
# default walk around the rat warren
look
n -> north
wait
l -> look
e -> east
s -> south
travel -> travel:entry
w -> west
4x wait
2x n -> north
look
";

const HOME_YEAR: i32 = 2000;
const WARREN: Pos = Pos::new(HOME_YEAR, 0, 0);

/// Per-iteration input shared by every scenario.
pub struct RunInput<'a> {
    pub seed: u64,
    pub script: &'a Script,
}

/// Observable outcome of one scenario iteration.
#[derive(Debug, Clone, Default, PartialEq, Eq, Serialize, Deserialize)]
pub struct ScenarioRun {
    pub ticks: u64,
    pub log_entries: usize,
    pub digest: u64,
    pub fingerprint: String,
    pub gates: BTreeMap<String, usize>,
    pub stage_failures: usize,
}

impl ScenarioRun {
    pub fn from_log(log: &TurnLog, ticks: u64, stage_failures: usize) -> Self {
        let mut gates = BTreeMap::new();
        for entry in log.of_kind("AI/GATE") {
            if let Some(gate) = entry.get("gate").and_then(|v| v.as_str()) {
                *gates.entry(gate.to_string()).or_insert(0) += 1;
            }
        }
        Self {
            ticks,
            log_entries: log.len(),
            digest: log.digest(),
            fingerprint: fingerprint(&log.render()),
            gates,
            stage_failures,
        }
    }
}

/// SHA-256 of the rendered turn log, hex encoded.
pub fn fingerprint(rendered: &str) -> String {
    let digest = Sha256::digest(rendered.as_bytes());
    digest.iter().map(|byte| format!("{byte:02x}")).collect()
}

pub struct Scenario {
    pub key: &'static str,
    pub description: &'static str,
    run: fn(&RunInput<'_>) -> Result<ScenarioRun>,
}

impl Scenario {
    pub fn run(&self, input: &RunInput<'_>) -> Result<ScenarioRun> {
        (self.run)(input).with_context(|| format!("scenario {}", self.key))
    }
}

static SCENARIOS: &[Scenario] = &[
    Scenario {
        key: "smoke",
        description: "Walk the warren with the smoke script",
        run: run_smoke,
    },
    Scenario {
        key: "replay",
        description: "Same seed and commands give an identical turn log",
        run: run_replay,
    },
    Scenario {
        key: "script",
        description: "Play the supplied command script (--script) over the warren",
        run: run_script,
    },
    Scenario {
        key: "flee",
        description: "A badly wounded creature takes the FLEE gate",
        run: run_flee,
    },
    Scenario {
        key: "cracked-attack",
        description: "A cracked weapon halves the ATTACK threshold",
        run: run_cracked_attack,
    },
    Scenario {
        key: "convert",
        description: "A creature short on ions converts tracked loot",
        run: run_convert,
    },
    Scenario {
        key: "pursuit",
        description: "A separated hunter closes in on its target",
        run: run_pursuit,
    },
    Scenario {
        key: "reentry",
        description: "A target returning to the hunter's tile forces a credit",
        run: run_reentry,
    },
];

pub fn list_scenarios() -> impl Iterator<Item = (&'static str, &'static str)> {
    SCENARIOS.iter().map(|s| (s.key, s.description))
}

pub fn get_scenario(key: &str) -> Option<&'static Scenario> {
    SCENARIOS.iter().find(|s| s.key == key)
}

pub fn all_keys() -> Vec<String> {
    SCENARIOS.iter().map(|s| s.key.to_string()).collect()
}

fn rat(index: usize, x: i32, y: i32) -> Creature {
    let mut creature = Creature::new(&format!("rat{index}"), "tunnel_rat", Pos::new(HOME_YEAR, x, y), 14);
    creature.ions = 20;
    creature.ions_max = 60;
    creature.wake_on_look = Some(60);
    creature.wake_on_entry = Some(70);
    creature
}

/// Rat warren on a small walled grid with loot, a status effect and a spawner.
pub fn warren() -> SimState {
    let mut grid = GridMap::new(-6, 6);
    grid.wall(Pos::new(HOME_YEAR, 1, 0), Direction::East);
    grid.wall(Pos::new(HOME_YEAR, 0, 1), Direction::South);

    let mut catalog = ItemCatalog::with_placeholders();
    catalog.insert(ItemTemplate::new("club", 5, 30));
    catalog.insert(ItemTemplate::new("sling", 4, 25).ranged());
    catalog.insert(ItemTemplate::new("ruby", 0, 900));

    let creatures: Vec<Creature> = [(0, 0), (1, 0), (2, 2), (-3, 1), (0, -4)]
        .into_iter()
        .enumerate()
        .map(|(index, (x, y))| rat(index, x, y))
        .collect();

    let spawner = FloorSpawner::default().with_floor(
        HOME_YEAR,
        YearFloor {
            minimum: 5,
            templates: vec![SpawnTemplate::new("tunnel_rat", 10)],
            spawn_points: vec![(5, 5), (-5, -5)],
        },
    );
    let mut status = StatusManager::default();
    status.apply("hero", "dazed", 3);

    let mut state = SimState::new(
        CombatConfig::default(),
        Box::new(MemoryCreatureStore::from_creatures(creatures)),
        Box::new(MemoryPlayerStore::with_active(Player::new("hero", WARREN, 400))),
    )
    .with_catalog(catalog)
    .with_edges(Box::new(grid))
    .with_spawner(Box::new(spawner))
    .with_status(status)
    .with_respawn_point(WARREN);
    state.items.mint("club", 1, Owner::Ground(WARREN));
    state.items.mint("sling", 0, Owner::Ground(Pos::new(HOME_YEAR, 1, 0)));
    state.items.mint("ruby", 0, Owner::Ground(WARREN));
    state
}

fn play_script(seed: u64, script: &Script) -> Result<(GameSession, usize)> {
    let mut session = GameSession::new(warren(), seed);
    let reports = script.play(&mut session)?;
    let failures = reports.iter().map(|r| r.failures.len()).sum();
    Ok((session, failures))
}

fn run_smoke(input: &RunInput<'_>) -> Result<ScenarioRun> {
    let script = Script::parse(SMOKE_SCRIPT)?;
    let (session, failures) = play_script(input.seed, &script)?;
    let log = &session.state().turnlog;
    let ticks = session.current_tick();
    ensure!(
        ticks == script.len() as u64,
        "expected {} ticks, scheduler reports {ticks}",
        script.len()
    );
    ensure!(
        log.of_kind("TURN/TICK").count() == script.len(),
        "every command must log exactly one TURN/TICK"
    );
    ensure!(log.of_kind("AI/GATE").count() > 0, "no creature ever acted");
    Ok(ScenarioRun::from_log(log, ticks, failures))
}

fn run_replay(input: &RunInput<'_>) -> Result<ScenarioRun> {
    let script = Script::parse(SMOKE_SCRIPT)?;
    let (first, failures) = play_script(input.seed, &script)?;
    let (second, _) = play_script(input.seed, &script)?;
    let a = first.state().turnlog.render();
    let b = second.state().turnlog.render();
    if a != b {
        let line = a
            .lines()
            .zip(b.lines())
            .position(|(x, y)| x != y)
            .map_or_else(|| "length".to_string(), |i| format!("line {}", i + 1));
        bail!("replay diverged at {line}");
    }
    Ok(ScenarioRun::from_log(
        &first.state().turnlog,
        first.current_tick(),
        failures,
    ))
}

fn run_script(input: &RunInput<'_>) -> Result<ScenarioRun> {
    ensure!(!input.script.is_empty(), "script has no commands");
    let (session, failures) = play_script(input.seed, input.script)?;
    Ok(ScenarioRun::from_log(
        &session.state().turnlog,
        session.current_tick(),
        failures,
    ))
}

fn duel(creature: &Creature, player_pos: Pos, config: CombatConfig) -> SimState {
    let mut catalog = ItemCatalog::with_placeholders();
    catalog.insert(ItemTemplate::new("opal", 0, 4000));
    SimState::new(
        config,
        Box::new(MemoryCreatureStore::from_creatures([creature.clone()])),
        Box::new(MemoryPlayerStore::with_active(Player::new(
            "hero", player_pos, 400,
        ))),
    )
    .with_catalog(catalog)
}

/// Config where every rolled gate is closed.
fn quiet_config() -> CombatConfig {
    CombatConfig {
        flee_pct: 0,
        heal_pct: 0,
        convert_pct: 0,
        cast_pct: 0,
        attack_pct: 0,
        pickup_pct: 0,
        emote_pct: 0,
        cracked_pickup_bonus: 0,
        cracked_flee_bonus: 0,
        ..CombatConfig::default()
    }
}

fn run_flee(input: &RunInput<'_>) -> Result<ScenarioRun> {
    let mut creature = Creature::new("ogre", "ogre", Pos::new(HOME_YEAR, 2, 2), 20);
    creature.hp = Health::new(2, 20);
    let config = CombatConfig {
        flee_pct: 100,
        ..quiet_config()
    };
    let mut state = duel(&creature, Pos::new(HOME_YEAR, 2, 2), config);
    let mut rng = StreamRng::from_seed(input.seed);
    let outcome = execute_random_action(&mut state, &ContextMap::new(), &mut rng, &creature.id)?;
    ensure!(
        outcome.decision.gate == Gate::Flee,
        "expected FLEE, got {}",
        outcome.decision.gate
    );
    ensure!(
        state.turnlog.of_kind("AI/ACT/FLEE").count() == 1,
        "flee was decided but never acted on"
    );
    Ok(ScenarioRun::from_log(&state.turnlog, 1, 0))
}

fn run_cracked_attack(input: &RunInput<'_>) -> Result<ScenarioRun> {
    let lair = Pos::new(HOME_YEAR, 3, 3);
    let mut creature = Creature::new("ogre", "ogre", lair, 20);
    let config = CombatConfig {
        attack_pct: 100,
        ..quiet_config()
    };
    let mut state = duel(&creature, lair, config);
    let broken = state
        .items
        .mint(BROKEN_WEAPON_ID, 0, Owner::Bag(creature.id.clone()));
    creature.wielded = Some(broken);
    state.creatures.insert(creature.clone());

    let mut rng = StreamRng::from_seed(input.seed);
    for attempt in 1..=64_u64 {
        let decision = evaluate_cascade(&creature, &mut state, &ContextMap::new(), &mut rng);
        if decision.gate == Gate::Attack {
            ensure!(
                decision.threshold == Some(50),
                "cracked attack threshold was {:?}",
                decision.threshold
            );
            ensure!(decision.snapshot.cracked_weapon, "snapshot missed the cracked weapon");
            return Ok(ScenarioRun::from_log(&state.turnlog, attempt, 0));
        }
    }
    bail!("ATTACK never triggered in 64 evaluations")
}

fn run_convert(input: &RunInput<'_>) -> Result<ScenarioRun> {
    let mut creature = Creature::new("ogre", "ogre", Pos::new(HOME_YEAR, 4, 4), 20);
    creature.ions = 10;
    creature.ions_max = 400;
    let config = CombatConfig {
        convert_pct: 100,
        ..quiet_config()
    };
    let mut state = duel(&creature, WARREN, config);
    let opal = state.items.mint("opal", 0, Owner::Bag(creature.id.clone()));
    creature.ai.picked_up.insert(opal);
    state.creatures.insert(creature.clone());

    let mut rng = StreamRng::from_seed(input.seed);
    let outcome = execute_random_action(&mut state, &ContextMap::new(), &mut rng, &creature.id)?;
    ensure!(
        outcome.decision.gate == Gate::Convert,
        "expected CONVERT, got {}",
        outcome.decision.gate
    );
    let ions = state.creature(&creature.id).map_or(0, |c| c.ions);
    ensure!(ions == 4010, "converted ions should be 4010, found {ions}");
    ensure!(!state.items.contains(opal), "converted item still exists");
    Ok(ScenarioRun::from_log(&state.turnlog, 1, 0))
}

fn hunter(pos: Pos) -> Creature {
    let mut hunter = Creature::new("stalker", "stalker", pos, 18);
    hunter.target_player_id = Some(PlayerId::new("hero"));
    hunter
}

fn chase(hunter_pos: Pos, player_pos: Pos, seed: u64) -> GameSession {
    let state = SimState::new(
        quiet_config(),
        Box::new(MemoryCreatureStore::from_creatures([hunter(hunter_pos)])),
        Box::new(MemoryPlayerStore::with_active(Player::new(
            "hero", player_pos, 400,
        ))),
    );
    GameSession::new(state, seed)
}

fn run_pursuit(input: &RunInput<'_>) -> Result<ScenarioRun> {
    let target = Pos::new(HOME_YEAR, 4, 0);
    let mut session = chase(WARREN, target, input.seed);
    let id = CreatureId::new("stalker");
    for _ in 0..8 {
        session.command("wait")?;
        let pos = session.state().creature(&id).and_then(|c| c.pos);
        if pos == Some(target) {
            let log = &session.state().turnlog;
            ensure!(
                log.of_kind("AI/PURSUIT").count() > 0,
                "hunter arrived without logging a pursuit step"
            );
            return Ok(ScenarioRun::from_log(log, session.current_tick(), 0));
        }
    }
    bail!("hunter failed to reach its target in 8 ticks")
}

fn run_reentry(input: &RunInput<'_>) -> Result<ScenarioRun> {
    let den = Pos::new(HOME_YEAR, 1, 1);
    let mut session = chase(den, Pos::new(HOME_YEAR + 100, 1, 1), input.seed);
    let script = Script::parse(&format!("wait\ntravel -> travel:{HOME_YEAR}"))?;
    let reports = script.play(&mut session)?;
    let id = CreatureId::new("stalker");
    let Some(turn) = reports.last().and_then(|r| r.dispatch.turn_of(&id)) else {
        bail!("hunter never got a turn after its target returned");
    };
    ensure!(turn.reentry, "return was not flagged as a re-entry");
    ensure!(turn.credits >= 1, "re-entry must grant at least one credit");
    let log = &session.state().turnlog;
    ensure!(
        log.of_kind("AI/REENTRY").count() == 1,
        "expected exactly one AI/REENTRY entry"
    );
    Ok(ScenarioRun::from_log(log, session.current_tick(), 0))
}
